mod args;
mod atlas;

use clap::Parser;
use log::{debug, info};
use std::error::Error;

use crate::args::Args;

fn main() {
    let args = Args::parse();

    let default_filter = if args.verbose { "debug" } else { "info" };
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(default_filter))
        .init();
    debug!("args: {:?}", args);

    match atlas::run_analysis(&args.config, args.out, args.reference) {
        Ok(_) => {
            info!("Analysis {} completed", args.config);
        }
        Err(e) => {
            eprintln!("Error: {}", e);
            let mut source = e.source();
            while let Some(s) = source {
                eprintln!("  caused by: {}", s);
                source = s.source();
            }
            std::process::exit(1);
        }
    }
}
