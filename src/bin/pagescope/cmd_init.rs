use anyhow::Result;
use std::path::PathBuf;

use pagescope::Store;

pub fn exec(path: PathBuf, page_size: u32) -> Result<()> {
    Store::create(&path, page_size)?;
    println!("Initialized store at {}", path.display());
    Ok(())
}
