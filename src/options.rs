use crate::consts::DEFAULT_JPEG_EXTENSIONS;

/// Controls how far the header parser reads into a file.
#[derive(Debug, Clone)]
pub struct ParseOptions {
    /// stop scanning once the first frame header was seen, every quantization table it
    /// references has been defined and tables 0 and 1 are both known
    pub stop_early: bool,

    /// files larger than this are not read at all (reported as unreadable)
    pub max_file_size: u64,
}

impl Default for ParseOptions {
    fn default() -> Self {
        Self {
            stop_early: true,
            max_file_size: 256 * 1024 * 1024,
        }
    }
}

impl ParseOptions {
    /// parameters that read every segment of every file, regardless of size
    pub fn exhaustive() -> Self {
        Self {
            stop_early: false,
            max_file_size: u64::MAX,
        }
    }
}

/// Options for building a database from a labeled dataset directory.
#[derive(Debug, Clone)]
pub struct BuildOptions {
    /// number of files extracted concurrently, 0 or 1 processes files on the calling thread
    pub workers: usize,

    /// lowercase file extensions (without dot) treated as JPEG
    pub extensions: Vec<String>,

    /// include JPEGs in nested directories below each label directory
    pub recursive: bool,

    pub parse: ParseOptions,
}

impl Default for BuildOptions {
    fn default() -> Self {
        Self {
            workers: 4,
            extensions: DEFAULT_JPEG_EXTENSIONS
                .iter()
                .map(|e| e.to_string())
                .collect(),
            recursive: false,
            parse: ParseOptions::default(),
        }
    }
}

impl BuildOptions {
    /// single threaded build, useful for tests and reproducible timing
    pub fn sequential() -> Self {
        Self {
            workers: 1,
            ..Self::default()
        }
    }

    /// returns true if the path carries one of the configured extensions (case-insensitive)
    pub fn accepts_extension(&self, path: &std::path::Path) -> bool {
        match path.extension().and_then(|e| e.to_str()) {
            Some(ext) => {
                let ext = ext.to_lowercase();
                self.extensions.iter().any(|e| *e == ext)
            }
            None => false,
        }
    }
}

/// Options for matching a query against a database.
#[derive(Debug, Clone)]
pub struct MatchOptions {
    /// number of hits kept after sorting
    pub top_k: usize,

    /// number of threads scanning database shards, 1 scans on the calling thread
    pub threads: usize,

    pub parse: ParseOptions,
}

impl Default for MatchOptions {
    fn default() -> Self {
        Self {
            top_k: 10,
            threads: 1,
            parse: ParseOptions::default(),
        }
    }
}

#[test]
fn extension_filter_is_case_insensitive() {
    use std::path::Path;

    let options = BuildOptions::default();
    assert!(options.accepts_extension(Path::new("a/b/90.JPG")));
    assert!(options.accepts_extension(Path::new("x.jpeg")));
    assert!(!options.accepts_extension(Path::new("x.png")));
    assert!(!options.accepts_extension(Path::new("jpg")));
}
