use anyhow::Result;
use clap::Parser;
use std::process::ExitCode;
use tracing_subscriber::EnvFilter;
use validate_launcher::cli::RootArgs;
use validate_launcher::interrupt;
use validate_launcher::launcher::{self, RunResult};

const EXIT_FAILED: u8 = 1;
const EXIT_INTERRUPTED: u8 = 130;

fn init_tracing(verbose: bool) {
    let default = if verbose { "debug" } else { "info" };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default));
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .try_init();
}

fn main() -> ExitCode {
    let args = RootArgs::parse();
    init_tracing(args.verbose);
    interrupt::install_handler();

    match run(&args) {
        Ok(code) => code,
        Err(err) if interrupt::is_interrupted(&err) => {
            eprintln!("error: {err}");
            ExitCode::from(EXIT_INTERRUPTED)
        }
        Err(err) => {
            eprintln!("error: {err:#}");
            ExitCode::from(EXIT_FAILED)
        }
    }
}

fn run(args: &RootArgs) -> Result<ExitCode> {
    match launcher::run(args, interrupt::flag())? {
        RunResult::Listed(classnames) => {
            for classname in &classnames {
                println!("{classname}");
            }
            Ok(ExitCode::SUCCESS)
        }
        RunResult::Executed(summary) if summary.all_passed() => Ok(ExitCode::SUCCESS),
        RunResult::Executed(_) => Ok(ExitCode::from(EXIT_FAILED)),
    }
}
