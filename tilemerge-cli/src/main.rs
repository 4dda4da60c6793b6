//! Entry point for the command-line interface.
#![forbid(unsafe_code)]

use std::process::ExitCode;

use clap::error::ErrorKind;
use env_logger::Env;
use tilemerge_cli::{CliError, run, usage};
use tilemerge_pipeline::ErrorChain;

fn main() -> ExitCode {
    env_logger::Builder::from_env(Env::default().default_filter_or("info")).init();
    match run() {
        Ok(_) => ExitCode::SUCCESS,
        Err(CliError::ArgumentParsing(err)) => {
            let informational = matches!(
                err.kind(),
                ErrorKind::DisplayHelp | ErrorKind::DisplayVersion
            );
            // Help and version go to stdout; usage errors include the usage line.
            if err.print().is_err() || !informational {
                return ExitCode::FAILURE;
            }
            ExitCode::SUCCESS
        }
        Err(err) => {
            eprintln!("tilemerge: {}", ErrorChain(&err));
            if err.wants_usage() {
                eprintln!("{}", usage());
            }
            ExitCode::FAILURE
        }
    }
}
