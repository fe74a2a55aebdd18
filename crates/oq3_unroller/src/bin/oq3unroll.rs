// Copyright contributors to the openqasm-unroller project
// SPDX-License-Identifier: Apache-2.0

// Command line front end: validate or unroll OpenQASM files in place, in a
// directory tree, or into an output directory.

use std::path::{Path, PathBuf};
use std::process::ExitCode;

use ariadne::{Label, Report, ReportKind, Source};
use clap::{Parser, Subcommand};

use oq3_unroller::{load, Error};

const SKIP_TAG: &str = "// oq3unroll: ignore";

#[derive(Parser)]
#[command(name = "oq3unroll", about = "Validate and unroll OpenQASM programs")]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Check OpenQASM files for semantic errors.
    Validate {
        /// Files or directories to check.
        paths: Vec<PathBuf>,
        /// Files to skip.
        #[arg(long)]
        skip: Vec<PathBuf>,
    },
    /// Unroll OpenQASM files into basic operations.
    Unroll {
        /// Files or directories to unroll.
        paths: Vec<PathBuf>,
        /// Files to skip.
        #[arg(long)]
        skip: Vec<PathBuf>,
        /// Directory for the unrolled output files.
        #[arg(long, conflicts_with = "overwrite")]
        output: Option<PathBuf>,
        /// Overwrite the input files in place.
        #[arg(long)]
        overwrite: bool,
    },
}

fn main() -> ExitCode {
    env_logger::init();
    let cli = Cli::parse();
    match cli.command {
        Command::Validate { paths, skip } => run_validate(&paths, &skip),
        Command::Unroll {
            paths,
            skip,
            output,
            overwrite,
        } => run_unroll(&paths, &skip, output.as_deref(), overwrite),
    }
}

fn collect_qasm_files(paths: &[PathBuf]) -> Vec<PathBuf> {
    let mut files = Vec::new();
    for path in paths {
        if path.is_dir() {
            collect_from_dir(path, &mut files);
        } else if path.extension().is_some_and(|ext| ext == "qasm") {
            files.push(path.clone());
        }
    }
    files
}

fn collect_from_dir(dir: &Path, files: &mut Vec<PathBuf>) {
    let entries = match std::fs::read_dir(dir) {
        Ok(entries) => entries,
        Err(_) => return,
    };
    for entry in entries.flatten() {
        let path = entry.path();
        if path.is_dir() {
            collect_from_dir(&path, files);
        } else if path.extension().is_some_and(|ext| ext == "qasm") {
            files.push(path);
        }
    }
}

// The skip tag must appear before the version line.
fn should_skip(path: &Path, skip: &[PathBuf], content: &str) -> bool {
    if skip.iter().any(|s| s == path) {
        return true;
    }
    for line in content.lines() {
        if line.contains(SKIP_TAG) {
            return true;
        }
        if line.contains("OPENQASM") {
            break;
        }
    }
    false
}

fn report_error(path: &Path, source: &str, err: &Error) {
    let id = path.display().to_string();
    match err.span() {
        Some(range) => {
            let span = usize::from(range.start())..usize::from(range.end());
            let _ = Report::build(ReportKind::Error, &id, span.start)
                .with_message(err.to_string())
                .with_label(Label::new((&id, span)).with_message(err.kind().to_string()))
                .finish()
                .eprint((&id, Source::from(source)));
        }
        None => eprintln!("{id}: error: {err}"),
    }
}

fn run_validate(paths: &[PathBuf], skip: &[PathBuf]) -> ExitCode {
    let files = collect_qasm_files(paths);
    if files.is_empty() {
        println!("No .qasm files present. Nothing to do.");
        return ExitCode::SUCCESS;
    }
    let mut checked = 0usize;
    let mut failed = 0usize;
    for file in &files {
        let content = match std::fs::read_to_string(file) {
            Ok(content) => content,
            Err(err) => {
                eprintln!("{}: error: {err}", file.display());
                failed += 1;
                continue;
            }
        };
        if should_skip(file, skip, &content) {
            continue;
        }
        checked += 1;
        let outcome = load(file).and_then(|mut module| module.validate());
        if let Err(err) = outcome {
            report_error(file, &content, &err);
            failed += 1;
        }
    }
    if failed > 0 {
        eprintln!("Found errors in {failed} of {checked} checked source file(s)");
        return ExitCode::FAILURE;
    }
    println!("Success: no issues found in {checked} source file(s)");
    ExitCode::SUCCESS
}

fn run_unroll(
    paths: &[PathBuf],
    skip: &[PathBuf],
    output: Option<&Path>,
    overwrite: bool,
) -> ExitCode {
    let files = collect_qasm_files(paths);
    if files.is_empty() {
        println!("No .qasm files present. Nothing to do.");
        return ExitCode::SUCCESS;
    }
    let mut failed = 0usize;
    for file in &files {
        let content = match std::fs::read_to_string(file) {
            Ok(content) => content,
            Err(err) => {
                eprintln!("{}: error: {err}", file.display());
                failed += 1;
                continue;
            }
        };
        if should_skip(file, skip, &content) {
            continue;
        }
        let outcome = load(file).and_then(|mut module| {
            module.unroll()?;
            let target = match output {
                Some(dir) => dir.join(file.file_name().unwrap()),
                None if overwrite => file.clone(),
                None => file.with_extension("unrolled.qasm"),
            };
            if let Some(parent) = target.parent() {
                let _ = std::fs::create_dir_all(parent);
            }
            oq3_unroller::dump(&module, &target)?;
            println!("unrolled {} -> {}", file.display(), target.display());
            Ok(())
        });
        if let Err(err) = outcome {
            report_error(file, &content, &err);
            failed += 1;
        }
    }
    if failed > 0 {
        return ExitCode::FAILURE;
    }
    ExitCode::SUCCESS
}
