//! store/pager — page I/O on `<root>/pages` plus allocation.
//!
//! Pages live at offset `id * page_size`. Reads and writes are
//! positional so readers never contend over a shared cursor; the
//! allocator pops the free list for single slots and bumps
//! `next_page_id` for contiguous spans, persisting meta on every bump.

use anyhow::{anyhow, Context, Result};
use log::debug;
use std::fs::{File, OpenOptions};
use std::path::{Path, PathBuf};

use super::free::FreeList;
use super::meta::{read_meta, write_meta_overwrite, MetaHeader};

const PAGES_FILE: &str = "pages";

#[cfg(unix)]
fn read_exact_at(f: &File, buf: &mut [u8], off: u64) -> std::io::Result<()> {
    use std::os::unix::fs::FileExt;
    f.read_exact_at(buf, off)
}
#[cfg(windows)]
fn read_exact_at(f: &File, buf: &mut [u8], off: u64) -> std::io::Result<()> {
    use std::os::windows::fs::FileExt;
    let mut done = 0usize;
    while done < buf.len() {
        let n = f.seek_read(&mut buf[done..], off + done as u64)?;
        if n == 0 {
            return Err(std::io::ErrorKind::UnexpectedEof.into());
        }
        done += n;
    }
    Ok(())
}

#[cfg(unix)]
fn write_all_at(f: &File, buf: &[u8], off: u64) -> std::io::Result<()> {
    use std::os::unix::fs::FileExt;
    f.write_all_at(buf, off)
}
#[cfg(windows)]
fn write_all_at(f: &File, buf: &[u8], off: u64) -> std::io::Result<()> {
    use std::os::windows::fs::FileExt;
    let mut done = 0usize;
    while done < buf.len() {
        done += f.seek_write(&buf[done..], off + done as u64)?;
    }
    Ok(())
}

#[derive(Debug)]
pub struct Pager {
    pub root: PathBuf,
    pub meta: MetaHeader,
    file: File,
}

impl Pager {
    /// Open the pager for an initialized store root.
    pub fn open(root: &Path) -> Result<Self> {
        let meta = read_meta(root)?;
        let path = root.join(PAGES_FILE);
        let file = OpenOptions::new()
            .read(true)
            .write(true)
            .open(&path)
            .with_context(|| format!("open pages file {}", path.display()))?;
        Ok(Self {
            root: root.to_path_buf(),
            meta,
            file,
        })
    }

    /// Create an empty pages file for a fresh store.
    pub fn create_pages_file(root: &Path) -> Result<()> {
        let path = root.join(PAGES_FILE);
        let f = OpenOptions::new()
            .create_new(true)
            .read(true)
            .write(true)
            .open(&path)
            .with_context(|| format!("create pages file {}", path.display()))?;
        let _ = f.sync_all();
        Ok(())
    }

    #[inline]
    pub fn page_size(&self) -> usize {
        self.meta.page_size as usize
    }

    fn offset(&self, page_id: u64) -> u64 {
        page_id * self.meta.page_size as u64
    }

    /// Read one page. `buf` must be exactly one page long.
    pub fn read_page(&self, page_id: u64, buf: &mut [u8]) -> Result<()> {
        if buf.len() != self.page_size() {
            return Err(anyhow!("read buffer is not page-sized"));
        }
        if page_id >= self.meta.next_page_id {
            return Err(anyhow!(
                "page {} not allocated yet (next_page_id = {})",
                page_id,
                self.meta.next_page_id
            ));
        }
        read_exact_at(&self.file, buf, self.offset(page_id))
            .with_context(|| format!("read page {}", page_id))
    }

    /// Read `len` raw bytes starting at an arbitrary in-file offset of
    /// `page_id`. Used to pull overflow payload out of owned slots.
    pub fn read_raw(&self, page_id: u64, within: usize, buf: &mut [u8]) -> Result<()> {
        read_exact_at(&self.file, buf, self.offset(page_id) + within as u64)
            .with_context(|| format!("read raw bytes at page {}", page_id))
    }

    /// Write one page-sized buffer.
    pub fn write_page(&self, page_id: u64, buf: &[u8]) -> Result<()> {
        if buf.len() != self.page_size() {
            return Err(anyhow!("write buffer is not page-sized"));
        }
        write_all_at(&self.file, buf, self.offset(page_id))
            .with_context(|| format!("write page {}", page_id))
    }

    /// Write a multi-page span starting at `page_id`. `buf` must be a
    /// whole number of pages.
    pub fn write_span(&self, page_id: u64, buf: &[u8]) -> Result<()> {
        if buf.is_empty() || buf.len() % self.page_size() != 0 {
            return Err(anyhow!("span buffer is not a whole number of pages"));
        }
        write_all_at(&self.file, buf, self.offset(page_id))
            .with_context(|| format!("write span at page {}", page_id))
    }

    /// Allocate one slot: reuse a freed page when possible, otherwise
    /// bump the end of the file. Returns (id, reused).
    pub fn allocate(&mut self, free: &FreeList) -> Result<(u64, bool)> {
        if let Some(id) = free.pop()? {
            debug!("alloc: reuse freed page {}", id);
            return Ok((id, true));
        }
        Ok((self.allocate_span(1)?, false))
    }

    /// Allocate `n` contiguous slots at the end of the file.
    pub fn allocate_span(&mut self, n: u64) -> Result<u64> {
        if n == 0 {
            return Err(anyhow!("cannot allocate an empty span"));
        }
        let start = self.meta.next_page_id;
        self.meta.next_page_id = start
            .checked_add(n)
            .ok_or_else(|| anyhow!("page id space exhausted"))?;
        self.file
            .set_len(self.offset(self.meta.next_page_id))
            .context("grow pages file")?;
        write_meta_overwrite(&self.root, &self.meta)?;
        debug!("alloc: span [{}..{}]", start, self.meta.next_page_id - 1);
        Ok(start)
    }

    /// Persist a tail change in meta.
    pub fn set_tail(&mut self, tail_page_id: u64) -> Result<()> {
        self.meta.tail_page_id = tail_page_id;
        write_meta_overwrite(&self.root, &self.meta)
    }
}
