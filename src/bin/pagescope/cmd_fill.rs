use anyhow::Result;
use rand::Rng;
use std::path::PathBuf;

use pagescope::Store;

/// Insert `count` random records: the key is the decimal form of a
/// random integer and doubles as the value unless an explicit value
/// size is requested.
pub fn exec(path: PathBuf, count: u32, value_size: usize) -> Result<()> {
    let mut store = Store::open(&path)?;
    fill(&mut store, count, value_size)?;
    println!("Inserted {} record(s)", count);
    Ok(())
}

pub fn fill(store: &mut Store, count: u32, value_size: usize) -> Result<()> {
    let mut rng = rand::thread_rng();
    for _ in 0..count {
        let key = rng.gen::<u64>().to_string();
        if value_size == 0 {
            store.put(key.as_bytes(), key.as_bytes())?;
        } else {
            let val = vec![0xAB_u8; value_size];
            store.put(key.as_bytes(), &val)?;
        }
    }
    Ok(())
}
