use std::process::ExitCode;

use clap::Parser;
use seirmix::runner::{run_with_args, RunArgs};

fn main() -> ExitCode {
    let args = RunArgs::parse();
    match run_with_args(&args) {
        Ok(_) => ExitCode::SUCCESS,
        Err(error) => {
            eprintln!("seirmix: {error}");
            ExitCode::FAILURE
        }
    }
}
