use anyhow::Result;
use clap::Parser;
use tracing_subscriber::EnvFilter;

mod checks;
mod cli;
mod commands;
mod config;
mod exec;
mod git;
mod manifest;
mod output;
mod patch;
mod util;
mod workspace;

fn main() -> Result<()> {
    init_tracing();
    let args = cli::RootArgs::parse();
    commands::run(args)
}

fn init_tracing() {
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("labctl=info"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}
