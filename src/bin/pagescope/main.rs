use clap::Parser;
use env_logger::{Builder, Env};
use log::error;

use anyhow::Result;

mod cli;
mod cmd_demo;
mod cmd_fill;
mod cmd_init;
mod cmd_pages;
mod cmd_stats;

fn init_logger() {
    // Level comes from RUST_LOG, default info.
    Builder::from_env(Env::default().default_filter_or("info"))
        .format_timestamp_millis()
        .init();
}

fn main() {
    init_logger();

    if let Err(e) = run() {
        error!("{:?}", e);
        std::process::exit(1);
    }
}

fn run() -> Result<()> {
    let cli = cli::Cli::parse();
    match cli.cmd {
        cli::Cmd::Init { path, page_size } => cmd_init::exec(path, page_size),

        cli::Cmd::Fill {
            path,
            count,
            value_size,
        } => cmd_fill::exec(path, count, value_size),

        cli::Cmd::Stats { path } => cmd_stats::exec(path),

        cli::Cmd::Pages { path } => cmd_pages::exec(path),

        cli::Cmd::Demo { path, count } => cmd_demo::exec(path, count),
    }
}
