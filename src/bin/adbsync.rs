#![deny(unsafe_code)]

use std::{env, process::ExitCode};

fn main() -> ExitCode {
    cli::run_with(env::args_os())
}
