//! JSON transaction cases for kestrel.

use std::path::PathBuf;

use kestrel_test::Case;
use libtest_mimic::{Arguments, Trial};

/// Glob pattern to find all case files
const PATTERN: &str = "cases/**/[!_]*.json";
const PREFIX: &str = "cases";

fn discover_cases() -> Vec<PathBuf> {
    glob::glob(PATTERN)
        .expect("failed to read glob pattern")
        .filter_map(|p| p.ok())
        .collect()
}

/// Runs every case file under `cases/`, skipping files that start with '_'.
///
/// Run `cargo test --test cases -- --nocapture` to see the transaction logs.
#[test]
fn run_cases() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_test_writer()
        .try_init();

    let files = discover_cases();
    if files.is_empty() {
        panic!("No case files found by pattern `{PATTERN}`");
    }

    let trials: Vec<_> = files
        .into_iter()
        .map(|p| {
            let name = p.strip_prefix(PREFIX).unwrap().display().to_string();
            Trial::test(format!("kestrel::{name}"), move || {
                Case::from_file(&p)
                    .and_then(|case| case.run())
                    .map_err(|e| libtest_mimic::Failed::from(e.to_string()))
            })
        })
        .collect();

    let arguments = Arguments {
        test_threads: Some(1),
        ..Arguments::default()
    };
    if libtest_mimic::run(&arguments, trials).exit_code() != std::process::ExitCode::SUCCESS {
        panic!("Some kestrel cases failed");
    }
}
