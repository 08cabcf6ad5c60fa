mod cli;
mod terminal;

use std::process::ExitCode;

use clap::Parser;

fn main() -> ExitCode {
    let args = cli::Args::parse();
    sweep_logging::initialize(args.log_settings());

    match terminal::run(args) {
        Ok(code) => code,
        Err(err) => {
            eprintln!("inbox-sweep: {err:#}");
            ExitCode::FAILURE
        }
    }
}
