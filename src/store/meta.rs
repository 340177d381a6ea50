//! store/meta — superblock file `<root>/meta` (LE):
//!
//! MAGIC8 = "PSMETA01"
//! u32 version       = 1
//! u32 page_size     (512..=1 MiB, power of two)
//! u64 next_page_id
//! u64 tail_page_id  (NO_PAGE when no tail leaf yet)
//!
//! Rewrites are atomic: tmp + rename, then fsync of the parent
//! directory (best-effort off unix).

use anyhow::{anyhow, Context, Result};
use byteorder::{LittleEndian, ReadBytesExt, WriteBytesExt};
use std::fs::{self, OpenOptions};
#[cfg(unix)]
use std::fs::File;
use std::io::{Read, Write};
use std::path::{Path, PathBuf};

const META_MAGIC: &[u8; 8] = b"PSMETA01";
const META_FILE: &str = "meta";

pub const META_VERSION: u32 = 1;

/// Sentinel for "no page".
pub const NO_PAGE: u64 = u64::MAX;

#[derive(Debug, Clone)]
pub struct MetaHeader {
    pub version: u32,
    pub page_size: u32,
    pub next_page_id: u64,
    pub tail_page_id: u64,
}

impl MetaHeader {
    pub fn new(page_size: u32) -> Self {
        Self {
            version: META_VERSION,
            page_size,
            next_page_id: 0,
            tail_page_id: NO_PAGE,
        }
    }
}

#[inline]
fn meta_path(root: &Path) -> PathBuf {
    root.join(META_FILE)
}

#[cfg(unix)]
fn fsync_dir(path: &Path) -> std::io::Result<()> {
    if let Some(parent) = path.parent() {
        if !parent.as_os_str().is_empty() {
            let dir = File::open(parent)?;
            dir.sync_all()?;
        }
    }
    Ok(())
}
#[cfg(not(unix))]
fn fsync_dir(_path: &Path) -> std::io::Result<()> {
    Ok(())
}

/// Page size must be a power of two in 512 B ..= 1 MiB.
pub fn validate_page_size(page_size: u32) -> Result<()> {
    const MIN: u32 = 512;
    const MAX: u32 = 1 << 20;
    if page_size < MIN || page_size > MAX || !page_size.is_power_of_two() {
        return Err(anyhow!(
            "invalid page_size {} (want a power of two in {}..={})",
            page_size,
            MIN,
            MAX
        ));
    }
    Ok(())
}

/// Write a brand-new meta file. Fails if one already exists.
pub fn write_meta_new(root: &Path, meta: &MetaHeader) -> Result<()> {
    let path = meta_path(root);
    if path.exists() {
        return Err(anyhow!("meta already exists at {}", path.display()));
    }
    write_meta_at(&path, meta)
}

/// Atomically replace the meta file.
pub fn write_meta_overwrite(root: &Path, meta: &MetaHeader) -> Result<()> {
    write_meta_at(&meta_path(root), meta)
}

fn write_meta_at(path: &Path, meta: &MetaHeader) -> Result<()> {
    validate_page_size(meta.page_size)?;

    let tmp = path.with_extension("tmp");
    let mut f = OpenOptions::new()
        .create(true)
        .write(true)
        .truncate(true)
        .open(&tmp)
        .with_context(|| format!("create meta tmp {}", tmp.display()))?;

    f.write_all(META_MAGIC)?;
    f.write_u32::<LittleEndian>(meta.version)?;
    f.write_u32::<LittleEndian>(meta.page_size)?;
    f.write_u64::<LittleEndian>(meta.next_page_id)?;
    f.write_u64::<LittleEndian>(meta.tail_page_id)?;
    f.sync_all()
        .with_context(|| format!("fsync meta tmp {}", tmp.display()))?;
    drop(f);

    fs::rename(&tmp, path)
        .with_context(|| format!("rename {} -> {}", tmp.display(), path.display()))?;
    let _ = fsync_dir(path);
    Ok(())
}

/// Read and validate the meta file.
pub fn read_meta(root: &Path) -> Result<MetaHeader> {
    let path = meta_path(root);
    let mut f = OpenOptions::new()
        .read(true)
        .open(&path)
        .with_context(|| format!("open meta {}", path.display()))?;

    let mut magic = [0u8; 8];
    f.read_exact(&mut magic)
        .with_context(|| format!("read meta magic {}", path.display()))?;
    if &magic != META_MAGIC {
        return Err(anyhow!("bad meta magic in {}", path.display()));
    }
    let version = f.read_u32::<LittleEndian>()?;
    if version != META_VERSION {
        return Err(anyhow!(
            "unsupported meta version {} in {}",
            version,
            path.display()
        ));
    }
    let page_size = f.read_u32::<LittleEndian>()?;
    validate_page_size(page_size)?;
    let next_page_id = f.read_u64::<LittleEndian>()?;
    let tail_page_id = f.read_u64::<LittleEndian>()?;

    Ok(MetaHeader {
        version,
        page_size,
        next_page_id,
        tail_page_id,
    })
}
