//! store/free — free-list file `<root>/free` (LE):
//!
//! - Header (16 B): [magic8 "PSFREE01"][ver u32 = 1][reserved u32 = 0]
//! - Tail: u64 page ids, one per entry.
//!
//! The entry count derives from the file length; push/pop adjust the
//! length and fsync best-effort. Callers synchronize externally at the
//! Store level.

use anyhow::{anyhow, Context, Result};
use byteorder::{ByteOrder, LittleEndian};
use std::fs::OpenOptions;
use std::io::{Read, Seek, SeekFrom, Write};
use std::path::{Path, PathBuf};

const FREE_FILE: &str = "free";
const FREE_MAGIC: &[u8; 8] = b"PSFREE01";
const FREE_VER: u32 = 1;
const FREE_HDR_SIZE: u64 = 16;

#[derive(Debug)]
pub struct FreeList {
    path: PathBuf,
}

impl FreeList {
    /// Create a new, empty free list. Fails if one already exists.
    pub fn create(root: &Path) -> Result<Self> {
        let path = root.join(FREE_FILE);
        if path.exists() {
            return Err(anyhow!("free list already exists at {}", path.display()));
        }
        let mut f = OpenOptions::new()
            .create_new(true)
            .read(true)
            .write(true)
            .open(&path)
            .with_context(|| format!("create free {}", path.display()))?;

        let mut hdr = [0u8; FREE_HDR_SIZE as usize];
        hdr[..8].copy_from_slice(FREE_MAGIC);
        LittleEndian::write_u32(&mut hdr[8..], FREE_VER);
        f.write_all(&hdr)?;
        let _ = f.sync_all();

        Ok(Self { path })
    }

    /// Open an existing free list and validate its header.
    pub fn open(root: &Path) -> Result<Self> {
        let path = root.join(FREE_FILE);
        let mut f = OpenOptions::new()
            .read(true)
            .open(&path)
            .with_context(|| format!("open free {}", path.display()))?;

        let mut hdr = [0u8; FREE_HDR_SIZE as usize];
        f.read_exact(&mut hdr)?;
        if &hdr[..8] != FREE_MAGIC {
            return Err(anyhow!("bad FREE magic in {}", path.display()));
        }
        let ver = LittleEndian::read_u32(&hdr[8..]);
        if ver != FREE_VER {
            return Err(anyhow!(
                "unsupported FREE version {} in {}",
                ver,
                path.display()
            ));
        }

        Ok(Self { path })
    }

    /// Number of free pages currently on the list.
    pub fn count(&self) -> Result<u64> {
        let len = std::fs::metadata(&self.path)?.len();
        if len < FREE_HDR_SIZE {
            return Err(anyhow!(
                "free file too small (< header): {}",
                self.path.display()
            ));
        }
        Ok((len - FREE_HDR_SIZE) / 8)
    }

    /// Append a page id to the tail.
    pub fn push(&self, page_id: u64) -> Result<()> {
        let mut f = OpenOptions::new()
            .read(true)
            .write(true)
            .open(&self.path)
            .with_context(|| format!("open free for push {}", self.path.display()))?;
        f.seek(SeekFrom::End(0))?;
        let mut buf8 = [0u8; 8];
        LittleEndian::write_u64(&mut buf8, page_id);
        f.write_all(&buf8)?;
        let _ = f.sync_all();
        Ok(())
    }

    /// Pop the most recently freed page. None when the list is empty.
    pub fn pop(&self) -> Result<Option<u64>> {
        let mut f = OpenOptions::new()
            .read(true)
            .write(true)
            .open(&self.path)
            .with_context(|| format!("open free for pop {}", self.path.display()))?;
        let len = f.metadata()?.len();
        if len < FREE_HDR_SIZE + 8 {
            return Ok(None);
        }
        f.seek(SeekFrom::Start(len - 8))?;
        let mut buf8 = [0u8; 8];
        f.read_exact(&mut buf8)?;
        let page_id = LittleEndian::read_u64(&buf8);
        f.set_len(len - 8)?;
        let _ = f.sync_all();
        Ok(Some(page_id))
    }
}
