use clap::{Parser, Subcommand};
use std::path::PathBuf;

/// CLI for the pagescope inspector.
#[derive(Parser, Debug)]
#[command(
    name = "pagescope",
    version,
    about = "Inspector for paged KV stores: tx stats and page directory dumps",
    arg_required_else_help = true
)]
pub struct Cli {
    #[command(subcommand)]
    pub cmd: Cmd,
}

#[derive(Subcommand, Debug)]
pub enum Cmd {
    /// Initialize a new store
    Init {
        #[arg(long)]
        path: PathBuf,
        #[arg(long, default_value_t = 4096)]
        page_size: u32,
    },
    /// Insert random records (workload generator)
    Fill {
        #[arg(long)]
        path: PathBuf,
        #[arg(long, default_value_t = 300)]
        count: u32,
        /// Value size in bytes; 0 means "the key digits themselves"
        #[arg(long, default_value_t = 0)]
        value_size: usize,
    },
    /// Print the two-line transaction stats summary
    Stats {
        #[arg(long)]
        path: PathBuf,
    },
    /// Print the page directory table
    Pages {
        #[arg(long)]
        path: PathBuf,
    },
    /// Before/after run: fill, report, fill again, report again
    Demo {
        #[arg(long)]
        path: PathBuf,
        #[arg(long, default_value_t = 300)]
        count: u32,
    },
}
