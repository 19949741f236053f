/// A simple thread pool used to extract fingerprints from many files concurrently.
///
/// Threads are spawned on demand and parked as idle once their closure has run, so a
/// following build reuses them. The number of parked threads is bounded by the number
/// of CPUs, anything beyond that exits.
///
/// No unsafe code is used.
use std::{
    sync::{
        mpsc::{channel, Sender},
        Arc, LazyLock, Mutex,
    },
    thread::{self, spawn},
};

type Job = Box<dyn FnOnce() + Send + 'static>;

/// Interface the database builder uses to run its workers. It is fire-and-forget: results
/// travel back over channels owned by the caller, so the pool needs no lifetime beyond
/// `'static` closures.
pub trait FingerprintThreadPool: Sync {
    /// Returns the maximum parallelism supported by the thread pool.
    fn max_parallelism(&self) -> usize;

    /// Runs a closure on a thread from the thread pool.
    fn run(&self, f: Job);
}

/// A thread pool that spawns threads on demand and reuses them for executing closures.
#[derive(Default)]
pub struct SimpleThreadPool {
    idle_threads: LazyLock<Arc<Mutex<Vec<Sender<Job>>>>>,
}

impl SimpleThreadPool {
    pub const fn new() -> Self {
        SimpleThreadPool {
            idle_threads: LazyLock::new(|| Arc::new(Mutex::new(Vec::new()))),
        }
    }

    /// Returns the number of idle threads in the thread pool.
    #[allow(dead_code)]
    pub fn get_idle_threads(&self) -> usize {
        self.idle_threads.lock().map(|i| i.len()).unwrap_or(0)
    }

    /// Executes a closure on a thread from the thread pool. Does not block or return any result.
    fn execute(&self, f: Job) {
        let mut f = Some(f);

        // an idle thread whose receiver is gone just gets dropped, try the next one
        while let Some(sender) = self.idle_threads.lock().ok().and_then(|mut i| i.pop()) {
            match f.take() {
                Some(job) => match sender.send(job) {
                    Ok(()) => return,
                    Err(e) => f = Some(e.0),
                },
                None => return,
            }
        }

        let Some(f) = f else { return };

        // channel for receiving future work on this thread
        let (tx_schedule, rx_schedule) = channel::<Job>();
        let idle_threads = self.idle_threads.clone();

        spawn(move || {
            f();

            loop {
                if let Ok(mut i) = idle_threads.lock() {
                    // only park if there aren't more than the number of cpus already waiting
                    if i.len() > *NUM_CPUS {
                        break;
                    }
                    i.push(tx_schedule.clone());
                } else {
                    break;
                }

                match rx_schedule.recv() {
                    Ok(f) => f(),
                    // channel broken, exit thread
                    Err(_) => break,
                }
            }
        });
    }
}

/// Pool used by the database builder unless the caller supplies another one.
pub static DEFAULT_THREAD_POOL: SimpleThreadPool = SimpleThreadPool::new();

impl FingerprintThreadPool for SimpleThreadPool {
    fn max_parallelism(&self) -> usize {
        *NUM_CPUS
    }

    fn run(&self, f: Job) {
        self.execute(f);
    }
}

/// Runs the workers on rayon's global pool instead of our own threads.
#[cfg(feature = "use_rayon")]
#[derive(Default)]
pub struct RayonThreadPool {}

#[cfg(feature = "use_rayon")]
impl FingerprintThreadPool for RayonThreadPool {
    fn max_parallelism(&self) -> usize {
        rayon_core::current_num_threads()
    }

    fn run(&self, f: Job) {
        rayon_core::spawn(f);
    }
}

static NUM_CPUS: LazyLock<usize> =
    LazyLock::new(|| thread::available_parallelism().map_or(1, |n| n.get()));

#[test]
fn test_threadpool() {
    use std::sync::atomic::{AtomicU32, Ordering};

    let pool = SimpleThreadPool::new();
    let a: Arc<AtomicU32> = Arc::new(AtomicU32::new(0));

    for _i in 0usize..100 {
        let aref = a.clone();
        pool.run(Box::new(move || {
            aref.fetch_add(1, Ordering::AcqRel);
        }));
    }

    while a.load(Ordering::Acquire) < 100 {
        thread::yield_now();
    }

    assert!(pool.get_idle_threads() <= *NUM_CPUS + 1);
}
