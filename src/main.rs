use clap::Parser;
use filterscan::cli::{run, Cli};

fn main() -> std::process::ExitCode {
    run(Cli::parse())
}
