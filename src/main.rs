//! vulnurl CLI entrypoint

use clap::Parser;

use vulnurl::cli::Cli;
use vulnurl::output;

fn main() {
    let cli = Cli::parse();

    if let Err(e) = cli.execute() {
        output::error(&format!("Error: {:#}", e));
        std::process::exit(1);
    }
}
