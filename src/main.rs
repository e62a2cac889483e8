use std::process;

use clap::Parser;
use tracing::Level;

use stagescan::cli::{self, Cli};

fn main() {
    let args = Cli::parse();

    tracing_subscriber::fmt()
        .with_max_level(if args.verbose { Level::DEBUG } else { Level::INFO })
        .with_writer(std::io::stderr)
        .init();

    if let Err(e) = cli::run(args) {
        eprintln!("Error: {e}");
        process::exit(1);
    }
}
