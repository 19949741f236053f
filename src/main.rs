/*---------------------------------------------------------------------------------------------
 *  Copyright (c) Microsoft Corporation. All rights reserved.
 *  Licensed under the Apache License, Version 2.0. See LICENSE.txt in the project root for license information.
 *  This software incorporates material from third parties. See NOTICE.txt for details.
 *--------------------------------------------------------------------------------------------*/

use std::io::{stdout, Write};
use std::path::PathBuf;

use jpeg_qtable_fingerprint::fingerprint_error::{err_exit_code, AddContext};
use jpeg_qtable_fingerprint::{
    build_database, compare_by_quality, get_version_string, inspect_file, match_file,
    summarize_database, BuildOptions, ExitCode, MatchOptions, ParseOptions, QuantDatabase, Result,
};
use log::{info, LevelFilter};
use serde::Serialize;
use simple_logger::SimpleLogger;

const USAGE: &str = "\
usage:
  qext build-db --dataset DIR --out FILE [--workers N] [--recursive] [--exhaustive]
  qext match    --db FILE --input FILE [--topk K] [--threads N]
  qext inspect  --input FILE
  qext summary  --db FILE
  qext compare  --db FILE

global options: --verbose | --quiet, --version";

/// writes a value as indented JSON to stdout, logs go to stderr so the two never mix
fn print_json<T: Serialize>(value: &T) -> Result<()> {
    let mut out = stdout().lock();
    serde_json::to_writer_pretty(&mut out, value).context()?;
    writeln!(out).context()?;
    Ok(())
}

fn build_db(mut args: pico_args::Arguments) -> Result<()> {
    let dataset: PathBuf = args.value_from_str("--dataset")?;
    let out: PathBuf = args.value_from_str("--out")?;

    let mut options = BuildOptions::default();
    if let Some(workers) = args.opt_value_from_str("--workers")? {
        options.workers = workers;
    }
    options.recursive = args.contains("--recursive");
    if args.contains("--exhaustive") {
        options.parse = ParseOptions::exhaustive();
    }
    finish(args)?;

    let (db, report) = build_database(&dataset, &options)?;
    db.save(&out)?;

    for s in &report.skipped {
        info!("skipped {0} ({1}): {2}", s.path.display(), s.exit_code, s.message);
    }

    println!(
        "OK: database saved to {0} (items={1}, skipped={2})",
        out.display(),
        report.processed,
        report.skipped.len()
    );
    Ok(())
}

fn match_cmd(mut args: pico_args::Arguments) -> Result<()> {
    let db_path: PathBuf = args.value_from_str("--db")?;
    let input: PathBuf = args.value_from_str("--input")?;

    let mut options = MatchOptions::default();
    if let Some(top_k) = args.opt_value_from_str("--topk")? {
        options.top_k = top_k;
    }
    if let Some(threads) = args.opt_value_from_str("--threads")? {
        options.threads = threads;
    }
    finish(args)?;

    let db = QuantDatabase::load(&db_path)?;
    let result = match_file(&input, &db, &options)?;
    print_json(&result)
}

fn inspect(mut args: pico_args::Arguments) -> Result<()> {
    let input: PathBuf = args.value_from_str("--input")?;
    finish(args)?;

    let inspection = inspect_file(&input, &ParseOptions::exhaustive())?;
    print_json(&inspection)
}

fn summary(mut args: pico_args::Arguments) -> Result<()> {
    let db_path: PathBuf = args.value_from_str("--db")?;
    finish(args)?;

    let db = QuantDatabase::load(&db_path)?;
    let summaries = summarize_database(&db);

    println!("dataset: {0}", db.dataset_root);
    println!("records: {0}", db.len());
    for s in &summaries {
        let qualities: Vec<String> = s.qualities.iter().map(|q| q.to_string()).collect();
        println!(
            "{0}: records={1} qualities=[{2}] unique_Y={3} unique_C={4}",
            s.software,
            s.records,
            qualities.join(","),
            s.unique_luma,
            s.unique_chroma
        );
    }
    Ok(())
}

fn compare(mut args: pico_args::Arguments) -> Result<()> {
    let db_path: PathBuf = args.value_from_str("--db")?;
    finish(args)?;

    let db = QuantDatabase::load(&db_path)?;
    for c in compare_by_quality(&db) {
        println!("{0}", c);
    }
    Ok(())
}

/// rejects anything left on the command line after a command took its arguments
fn finish(args: pico_args::Arguments) -> Result<()> {
    let remaining = args.finish();
    if !remaining.is_empty() {
        return err_exit_code(
            ExitCode::SyntaxError,
            format!("unexpected arguments {0:?}\n{1}", remaining, USAGE),
        );
    }
    Ok(())
}

// wrap main so that errors get printed nicely without a panic
fn main_with_result() -> Result<()> {
    let mut args = pico_args::Arguments::from_env();

    if args.contains("--version") {
        println!("qext {0}", get_version_string());
        return Ok(());
    }

    let level = if args.contains(["-v", "--verbose"]) {
        LevelFilter::Debug
    } else if args.contains(["-q", "--quiet"]) {
        LevelFilter::Warn
    } else {
        LevelFilter::Info
    };

    // logs go to stderr (simple_logger "stderr" feature), stdout carries the results
    if let Err(e) = SimpleLogger::new().with_level(level).init() {
        eprintln!("unable to initialize logging: {0}", e);
    }

    match args.subcommand()?.as_deref() {
        Some("build-db") => build_db(args),
        Some("match") => match_cmd(args),
        Some("inspect") => inspect(args),
        Some("summary") => summary(args),
        Some("compare") => compare(args),
        Some(other) => err_exit_code(
            ExitCode::SyntaxError,
            format!("unknown command {0}\n{1}", other, USAGE),
        ),
        None => err_exit_code(ExitCode::SyntaxError, USAGE),
    }
}

fn main() {
    match main_with_result() {
        Ok(_) => {}
        Err(e) => {
            eprintln!(
                "error code: {0} {1} {2}",
                e.exit_code(),
                e.exit_code().as_integer_error_code(),
                e.message()
            );
            std::process::exit(e.exit_code().as_integer_error_code());
        }
    }
}
