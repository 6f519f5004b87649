//! shtest - run tests with embedded RUN-line shell scripts
//!
//! Usage:
//!   shtest test.c                 Run one test with the internal shell
//!   shtest --external test.c      Run via the host shell instead
//!   shtest --feature gpu test.c   Satisfy a REQUIRES: clause
//!   shtest --param %x=value ...   Add an extra substitution

use std::path::PathBuf;
use std::process::ExitCode;

use shtest::{execute_sh_test, RunnerConfig, RunnerError, Substitution, Test, TestConfig};

const VERSION: &str = env!("CARGO_PKG_VERSION");

fn print_help() {
    println!(
        r#"shtest {} - test driver for sources with embedded shell scripts

USAGE:
    shtest [OPTIONS] <test-file>...

OPTIONS:
    --external          Run scripts under the host shell (bash, /bin/sh, cmd)
    --no-execute        Parse and substitute only; report PASS without running
    --feature <NAME>    Add an available feature for REQUIRES: clauses
    --param <PAT=SUB>   Add an extra substitution (regex pattern = replacement)
    --no-pipefail       Let pipelines succeed when only an early stage fails
    --bash <PATH>       Use this shell for --external instead of searching PATH
    --verbose           Print the report for passing tests too
    --help              Show this help message
    --version           Show version

Directives recognized in test sources: RUN:, XFAIL:, REQUIRES:, END.
Substitution tokens include %s %S %p %t %T %{{pathsep}} %% and %(line+N)."#,
        VERSION
    );
}

struct Options {
    external: bool,
    no_execute: bool,
    no_pipefail: bool,
    verbose: bool,
    bash: Option<PathBuf>,
    features: Vec<String>,
    params: Vec<Substitution>,
    tests: Vec<PathBuf>,
}

fn parse_args(args: &[String]) -> Result<Options, String> {
    let mut opts = Options {
        external: false,
        no_execute: false,
        no_pipefail: false,
        verbose: false,
        bash: None,
        features: Vec::new(),
        params: Vec::new(),
        tests: Vec::new(),
    };

    let mut iter = args.iter();
    while let Some(arg) = iter.next() {
        match arg.as_str() {
            "--external" => opts.external = true,
            "--no-execute" => opts.no_execute = true,
            "--no-pipefail" => opts.no_pipefail = true,
            "--verbose" | "-v" => opts.verbose = true,
            "--bash" => {
                let value = iter.next().ok_or("--bash requires a path")?;
                opts.bash = Some(PathBuf::from(value));
            }
            "--feature" => {
                let value = iter.next().ok_or("--feature requires a name")?;
                opts.features.push(value.clone());
            }
            "--param" => {
                let value = iter.next().ok_or("--param requires PATTERN=REPLACEMENT")?;
                let (pattern, replacement) = value
                    .split_once('=')
                    .ok_or("--param requires PATTERN=REPLACEMENT")?;
                opts.params.push(Substitution::new(pattern, replacement));
            }
            other if other.starts_with('-') => {
                return Err(format!("unknown option: {}", other));
            }
            _ => opts.tests.push(PathBuf::from(arg)),
        }
    }

    if opts.tests.is_empty() {
        return Err("no test files given".to_string());
    }
    Ok(opts)
}

fn main() -> ExitCode {
    env_logger::init();

    let args: Vec<String> = std::env::args().skip(1).collect();
    if args.iter().any(|a| a == "--help" || a == "-h") {
        print_help();
        return ExitCode::SUCCESS;
    }
    if args.iter().any(|a| a == "--version") {
        println!("shtest {}", VERSION);
        return ExitCode::SUCCESS;
    }

    let opts = match parse_args(&args) {
        Ok(opts) => opts,
        Err(message) => {
            eprintln!("shtest: {}", message);
            eprintln!("Try 'shtest --help'.");
            return ExitCode::FAILURE;
        }
    };

    let mut config = TestConfig::from_env();
    config.pipefail = !opts.no_pipefail;
    config.available_features.extend(opts.features.iter().cloned());

    let path = config
        .environment
        .get("PATH")
        .cloned()
        .unwrap_or_default();
    let mut runner = RunnerConfig::detect(&path);
    runner.no_execute = opts.no_execute;
    if opts.bash.is_some() {
        runner.bash_path = opts.bash.clone();
    }

    let mut failures = 0usize;
    for test_path in &opts.tests {
        let mut test = Test::new(test_path.clone(), test_path.clone(), config.clone());
        let result = match execute_sh_test(&mut test, &runner, opts.external, &opts.params) {
            Ok(result) => result,
            Err(RunnerError::Interrupted) => {
                eprintln!("shtest: interrupted");
                return ExitCode::from(130);
            }
            Err(RunnerError::Io(e)) => {
                eprintln!("shtest: {}: {}", test_path.display(), e);
                failures += 1;
                continue;
            }
        };

        println!("{}: {}", result.status, test_path.display());
        if result.status.is_failure() || opts.verbose {
            if !result.output.is_empty() {
                println!("{}", "*".repeat(20));
                println!("{}", result.output.trim_end());
                println!("{}", "*".repeat(20));
            }
        }
        if result.status.is_failure() {
            failures += 1;
        }
    }

    if failures > 0 {
        eprintln!("shtest: {} test(s) failed", failures);
        ExitCode::FAILURE
    } else {
        ExitCode::SUCCESS
    }
}
