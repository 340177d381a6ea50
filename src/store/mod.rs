//! store — compact file-backed reference engine for the inspector.
//!
//! Layout of a store root:
//! - `meta`  — superblock (meta.rs)
//! - `pages` — page heap, page 0 is a meta page (pager.rs, page.rs)
//! - `free`  — free list (free.rs)
//! - `LOCK`  — single-writer advisory lock (lock.rs)
//!
//! Leaves are append-only record pages; a value past `page_size / 4`
//! gets a dedicated leaf spanning `1 + k` contiguous slots with
//! `overflow = k`. Transactions capture the directory extent at begin,
//! which is what gives the page walk its consistent view.

pub mod free;
pub mod lock;
pub mod meta;
pub mod page;
pub mod pager;
pub mod stats;

use std::path::{Path, PathBuf};
use std::time::Instant;

use anyhow::{anyhow, bail, Context, Result};
use byteorder::{ByteOrder, LittleEndian};
use log::{debug, info};

use crate::engine::{Engine, PageInfo, PageKind, Tx, TxStats};

use self::free::FreeList;
use self::lock::{acquire_exclusive_lock, LockGuard};
use self::meta::{validate_page_size, write_meta_new, MetaHeader, NO_PAGE};
use self::page::{
    header_read, header_write, rec_append, rec_decode_all, rec_size, PageHeader, PAGE_HDR_SIZE,
    REC_HDR, REC_OFF_KLEN, REC_OFF_SEQ, REC_OFF_VLEN,
};
use self::pager::Pager;
use self::stats::StatsRegistry;

#[derive(Debug)]
pub struct Store {
    pub root: PathBuf,
    pub pager: Pager,
    free: FreeList,
    stats: StatsRegistry,
    /// Next write sequence. Recovered at open as the highest sequence
    /// on disk plus one; free-list reuse can place a newer record on a
    /// lower page id, so recency lives in the records, not the ids.
    next_seq: u64,
    _lock: LockGuard,
}

impl Store {
    /// Initialize a fresh store at `root` and open it. Page 0 is
    /// stamped as the meta page so the directory never starts empty.
    pub fn create(root: &Path, page_size: u32) -> Result<Self> {
        validate_page_size(page_size)?;
        std::fs::create_dir_all(root)
            .with_context(|| format!("create store root {}", root.display()))?;
        write_meta_new(root, &MetaHeader::new(page_size))?;
        Pager::create_pages_file(root)?;
        FreeList::create(root)?;

        let mut store = Self::open(root)?;
        let id = store.pager.allocate_span(1)?;
        let mut buf = vec![0u8; store.pager.page_size()];
        header_write(
            &mut buf,
            &PageHeader {
                page_id: id,
                kind: PageKind::Meta,
                count: 0,
                overflow: 0,
                used: 0,
            },
        );
        store.pager.write_page(id, &buf)?;
        store.stats.record_pages_allocated(1);
        store.stats.record_pages_written(1);

        info!("store created at {} (page_size {})", root.display(), page_size);
        Ok(store)
    }

    /// Open an existing store, taking the exclusive store lock.
    pub fn open(root: &Path) -> Result<Self> {
        let lock = acquire_exclusive_lock(root)?;
        debug!("holding {}", lock.path().display());
        let pager = Pager::open(root)?;
        let free = FreeList::open(root)?;
        let next_seq = scan_max_seq(&pager)? + 1;
        info!(
            "store opened at {} ({} page(s), {} free, seq {})",
            root.display(),
            pager.meta.next_page_id,
            free.count().unwrap_or(0),
            next_seq
        );
        Ok(Self {
            root: root.to_path_buf(),
            pager,
            free,
            stats: StatsRegistry::default(),
            next_seq,
            _lock: lock,
        })
    }

    #[inline]
    fn payload_cap(&self) -> usize {
        self.pager.page_size() - PAGE_HDR_SIZE
    }

    /// Insert a record. Duplicate keys are allowed; readers see the
    /// one with the highest write sequence.
    pub fn put(&mut self, key: &[u8], val: &[u8]) -> Result<()> {
        let start = Instant::now();
        if key.is_empty() {
            bail!("empty key");
        }
        if key.len() > u16::MAX as usize {
            bail!("key too large ({} B)", key.len());
        }
        if val.len() > u32::MAX as usize {
            bail!("value too large ({} B)", val.len());
        }
        if REC_HDR + key.len() > self.payload_cap() {
            bail!(
                "key ({} B) does not fit the first slot of a page",
                key.len()
            );
        }

        let seq = self.next_seq;
        let rec = rec_size(key, val);
        if val.len() >= self.pager.page_size() / 4 || rec > self.payload_cap() {
            self.put_span(key, val, seq)?;
        } else {
            self.put_tail(key, val, seq, start)?;
        }
        self.next_seq = seq + 1;
        self.stats.record_nodes(1);
        self.stats.record_write(start.elapsed());
        Ok(())
    }

    /// Append into the tail leaf, rolling over to a fresh leaf when the
    /// record does not fit (counted as a spill).
    fn put_tail(&mut self, key: &[u8], val: &[u8], seq: u64, start: Instant) -> Result<()> {
        let ps = self.pager.page_size();
        let rec = rec_size(key, val);
        let mut buf = vec![0u8; ps];

        let tail = self.pager.meta.tail_page_id;
        if tail != NO_PAGE {
            self.pager.read_page(tail, &mut buf)?;
            let hdr = header_read(&buf, tail)?;
            if hdr.kind == PageKind::Leaf
                && hdr.overflow == 0
                && hdr.used as usize + rec <= self.payload_cap()
            {
                let off = PAGE_HDR_SIZE + hdr.used as usize;
                let mut bytes = Vec::with_capacity(rec);
                rec_append(&mut bytes, key, val, seq);
                buf[off..off + rec].copy_from_slice(&bytes);
                header_write(
                    &mut buf,
                    &PageHeader {
                        page_id: tail,
                        kind: PageKind::Leaf,
                        count: hdr.count + 1,
                        overflow: 0,
                        used: hdr.used + rec as u32,
                    },
                );
                self.pager.write_page(tail, &buf)?;
                self.stats.record_pages_written(1);
                return Ok(());
            }
        }

        // No usable tail: spill into a fresh leaf.
        let (id, _reused) = self.pager.allocate(&self.free)?;
        let mut bytes = Vec::with_capacity(rec);
        rec_append(&mut bytes, key, val, seq);
        buf.iter_mut().for_each(|b| *b = 0);
        buf[PAGE_HDR_SIZE..PAGE_HDR_SIZE + rec].copy_from_slice(&bytes);
        header_write(
            &mut buf,
            &PageHeader {
                page_id: id,
                kind: PageKind::Leaf,
                count: 1,
                overflow: 0,
                used: rec as u32,
            },
        );
        self.pager.write_page(id, &buf)?;
        self.pager.set_tail(id)?;
        self.stats.record_pages_allocated(1);
        self.stats.record_pages_written(1);
        self.stats.record_spill(start.elapsed());
        Ok(())
    }

    /// Large value: dedicated leaf spanning `1 + k` contiguous slots.
    fn put_span(&mut self, key: &[u8], val: &[u8], seq: u64) -> Result<()> {
        let ps = self.pager.page_size();
        let rec = rec_size(key, val);
        let extra = rec.saturating_sub(self.payload_cap());
        let k = (extra as u64 + ps as u64 - 1) / ps as u64;

        let id = self.pager.allocate_span(1 + k)?;
        let mut buf = vec![0u8; (1 + k as usize) * ps];
        let mut bytes = Vec::with_capacity(rec);
        rec_append(&mut bytes, key, val, seq);
        buf[PAGE_HDR_SIZE..PAGE_HDR_SIZE + rec].copy_from_slice(&bytes);
        header_write(
            &mut buf[..ps],
            &PageHeader {
                page_id: id,
                kind: PageKind::Leaf,
                count: 1,
                overflow: k as u32,
                used: rec as u32,
            },
        );
        self.pager.write_span(id, &buf)?;
        self.stats.record_pages_allocated(1 + k);
        self.stats.record_pages_written(1 + k);
        debug!("put: span leaf {} (+{} slot(s)) for {} B record", id, k, rec);
        Ok(())
    }

    /// Look a key up with a linear cursor scan. The record with the
    /// highest write sequence wins; page order says nothing about
    /// recency once freed pages get reused.
    pub fn get(&self, key: &[u8]) -> Result<Option<Vec<u8>>> {
        self.stats.record_cursor();
        let ps = self.pager.page_size();
        let mut buf = vec![0u8; ps];
        let mut found: Option<(u64, Vec<u8>)> = None;

        let mut id = 0u64;
        while id < self.pager.meta.next_page_id {
            self.pager.read_page(id, &mut buf)?;
            let hdr = header_read(&buf, id)?;
            if hdr.kind == PageKind::Leaf {
                if hdr.overflow == 0 {
                    let recs = rec_decode_all(&buf[PAGE_HDR_SIZE..], hdr.used as usize)?;
                    for rec in recs {
                        if rec.key == key
                            && found.as_ref().map_or(true, |(s, _)| rec.seq > *s)
                        {
                            found = Some((rec.seq, rec.val));
                        }
                    }
                } else if let Some((seq, v)) = self.read_span_value(id, &buf, &hdr, key)? {
                    if found.as_ref().map_or(true, |(s, _)| seq > *s) {
                        found = Some((seq, v));
                    }
                }
            }
            id += 1;
            if !hdr.kind.is_free() {
                id += hdr.overflow as u64;
            }
        }
        Ok(found.map(|(_, v)| v))
    }

    /// Match and extract the single record of a span leaf, returning
    /// its write sequence alongside the value.
    fn read_span_value(
        &self,
        id: u64,
        first_slot: &[u8],
        hdr: &PageHeader,
        key: &[u8],
    ) -> Result<Option<(u64, Vec<u8>)>> {
        let klen = LittleEndian::read_u16(&first_slot[PAGE_HDR_SIZE + REC_OFF_KLEN..]) as usize;
        let vlen = LittleEndian::read_u32(&first_slot[PAGE_HDR_SIZE + REC_OFF_VLEN..]) as usize;
        let seq = LittleEndian::read_u64(&first_slot[PAGE_HDR_SIZE + REC_OFF_SEQ..]);
        let kend = PAGE_HDR_SIZE + REC_HDR + klen;
        if kend > first_slot.len() {
            return Err(anyhow!("span leaf {} has a key overrunning its first slot", id));
        }
        if &first_slot[PAGE_HDR_SIZE + REC_HDR..kend] != key {
            return Ok(None);
        }
        let total = REC_HDR + klen + vlen;
        if total != hdr.used as usize {
            return Err(anyhow!(
                "span leaf {} record length {} disagrees with used {}",
                id,
                total,
                hdr.used
            ));
        }
        let mut rec = vec![0u8; total];
        self.pager.read_raw(id, PAGE_HDR_SIZE, &mut rec)?;
        Ok(Some((seq, rec[REC_HDR + klen..].to_vec())))
    }

    /// Delete the newest record for a key. Emptied pages are stamped
    /// free (every slot of a span individually) and pushed to the free
    /// list.
    pub fn del(&mut self, key: &[u8]) -> Result<bool> {
        let start = Instant::now();
        let ps = self.pager.page_size();
        let mut buf = vec![0u8; ps];

        // Find the page and sequence of the newest match.
        let mut target: Option<(u64, u64)> = None;
        let mut id = 0u64;
        while id < self.pager.meta.next_page_id {
            self.pager.read_page(id, &mut buf)?;
            let hdr = header_read(&buf, id)?;
            if hdr.kind == PageKind::Leaf {
                if hdr.overflow == 0 {
                    for rec in rec_decode_all(&buf[PAGE_HDR_SIZE..], hdr.used as usize)? {
                        if rec.key == key && target.map_or(true, |(_, s)| rec.seq > s) {
                            target = Some((id, rec.seq));
                        }
                    }
                } else if let Some((seq, _)) = self.read_span_value(id, &buf, &hdr, key)? {
                    if target.map_or(true, |(_, s)| seq > s) {
                        target = Some((id, seq));
                    }
                }
            }
            id += 1;
            if !hdr.kind.is_free() {
                id += hdr.overflow as u64;
            }
        }
        let Some((id, seq)) = target else {
            return Ok(false);
        };

        self.pager.read_page(id, &mut buf)?;
        let hdr = header_read(&buf, id)?;

        if hdr.overflow > 0 {
            self.free_span(id, hdr.overflow)?;
            self.stats.record_node_deref(1);
            self.stats.record_rebalance(start.elapsed());
            return Ok(true);
        }

        let mut recs = rec_decode_all(&buf[PAGE_HDR_SIZE..], hdr.used as usize)?;
        let last = recs
            .iter()
            .rposition(|r| r.seq == seq && r.key == key)
            .ok_or_else(|| anyhow!("record vanished during delete on page {}", id))?;
        recs.remove(last);
        self.stats.record_node_deref(1);

        if recs.is_empty() {
            self.free_span(id, 0)?;
            self.stats.record_rebalance(start.elapsed());
            return Ok(true);
        }

        let mut bytes = Vec::new();
        for r in &recs {
            rec_append(&mut bytes, &r.key, &r.val, r.seq);
        }
        buf.iter_mut().for_each(|b| *b = 0);
        buf[PAGE_HDR_SIZE..PAGE_HDR_SIZE + bytes.len()].copy_from_slice(&bytes);
        header_write(
            &mut buf,
            &PageHeader {
                page_id: id,
                kind: PageKind::Leaf,
                count: recs.len() as u32,
                overflow: 0,
                used: bytes.len() as u32,
            },
        );
        self.pager.write_page(id, &buf)?;
        self.stats.record_pages_written(1);
        self.stats.record_rebalance(start.elapsed());
        Ok(true)
    }

    /// Stamp every slot of `[id, id + overflow]` as an addressable free
    /// page and push it to the free list.
    fn free_span(&mut self, id: u64, overflow: u32) -> Result<()> {
        let ps = self.pager.page_size();
        let mut buf = vec![0u8; ps];
        for slot in id..=id + overflow as u64 {
            buf.iter_mut().for_each(|b| *b = 0);
            header_write(
                &mut buf,
                &PageHeader {
                    page_id: slot,
                    kind: PageKind::Free,
                    count: 0,
                    overflow: 0,
                    used: 0,
                },
            );
            self.pager.write_page(slot, &buf)?;
            self.free.push(slot)?;
            self.stats.record_pages_written(1);
        }
        if self.pager.meta.tail_page_id >= id
            && self.pager.meta.tail_page_id <= id + overflow as u64
        {
            self.pager.set_tail(NO_PAGE)?;
        }
        debug!("freed slots [{}..={}]", id, id + overflow as u64);
        Ok(())
    }
}

/// Highest write sequence present in the page directory, 0 when the
/// store holds no records.
fn scan_max_seq(pager: &Pager) -> Result<u64> {
    let mut buf = vec![0u8; pager.page_size()];
    let mut max = 0u64;
    let mut id = 0u64;
    while id < pager.meta.next_page_id {
        pager.read_page(id, &mut buf)?;
        let hdr = header_read(&buf, id)?;
        if hdr.kind == PageKind::Leaf {
            if hdr.overflow == 0 {
                for rec in rec_decode_all(&buf[PAGE_HDR_SIZE..], hdr.used as usize)? {
                    max = max.max(rec.seq);
                }
            } else {
                max = max.max(LittleEndian::read_u64(&buf[PAGE_HDR_SIZE + REC_OFF_SEQ..]));
            }
        }
        id += 1;
        if !hdr.kind.is_free() {
            id += hdr.overflow as u64;
        }
    }
    Ok(max)
}

/// Read view of the store: the directory extent is captured at begin,
/// so pages allocated later stay invisible for the transaction's whole
/// lifetime.
pub struct StoreTx<'a> {
    store: &'a Store,
    extent: u64,
}

impl Tx for StoreTx<'_> {
    fn page(&self, id: u64) -> Result<Option<PageInfo>> {
        if id >= self.extent {
            return Ok(None);
        }
        let mut buf = vec![0u8; self.store.pager.page_size()];
        self.store.pager.read_page(id, &mut buf)?;
        let hdr = header_read(&buf, id)?;
        if !hdr.kind.is_free() {
            let span_end = id + 1 + hdr.overflow as u64;
            if span_end > self.extent {
                bail!(
                    "page {} declares overflow {} running past directory end {}",
                    id,
                    hdr.overflow,
                    self.extent
                );
            }
        }
        Ok(Some(PageInfo {
            id,
            kind: hdr.kind,
            count: hdr.count,
            overflow: hdr.overflow,
        }))
    }
}

impl Engine for Store {
    type Tx<'a>
        = StoreTx<'a>
    where
        Self: 'a;

    fn begin(&self, write: bool) -> Result<StoreTx<'_>> {
        // The store already holds the process-exclusive lock; a write
        // transaction needs no extra setup and discards trivially.
        let extent = self.pager.meta.next_page_id;
        debug!(
            "begin {} tx, extent {}",
            if write { "rw" } else { "ro" },
            extent
        );
        Ok(StoreTx {
            store: self,
            extent,
        })
    }

    fn stats(&self) -> TxStats {
        self.stats.snapshot()
    }
}
