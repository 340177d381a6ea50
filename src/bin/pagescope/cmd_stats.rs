use anyhow::Result;
use std::io::Write;
use std::path::PathBuf;

use pagescope::{render_stats, Store};

pub fn exec(path: PathBuf) -> Result<()> {
    let store = Store::open(&path)?;
    let stdout = std::io::stdout();
    let mut out = stdout.lock();
    render_stats(&store, &mut out)?;
    out.flush()?;
    Ok(())
}
