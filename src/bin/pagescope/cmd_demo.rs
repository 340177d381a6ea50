use anyhow::Result;
use std::io::Write;
use std::path::PathBuf;

use pagescope::{render_pages, render_stats, Store};

use crate::cmd_fill::fill;

/// Before/after inspection run: fill, report, fill a little more,
/// report again. Mirrors how the reports are used when chasing page
/// churn across transactions.
pub fn exec(path: PathBuf, count: u32) -> Result<()> {
    let mut store = if path.join("meta").exists() {
        Store::open(&path)?
    } else {
        Store::create(&path, 4096)?
    };

    fill(&mut store, count, 0)?;
    report(&store)?;

    println!("======== round two ==========");
    fill(&mut store, 10, 0)?;
    report(&store)?;

    Ok(())
}

fn report(store: &Store) -> Result<()> {
    let stdout = std::io::stdout();
    let mut out = stdout.lock();
    writeln!(out, "======== stats ==============")?;
    render_stats(store, &mut out)?;
    writeln!(out, "======== pages ==============")?;
    render_pages(store, &mut out)?;
    out.flush()?;
    Ok(())
}
