//! engine — the storage-engine surface the inspector consumes.
//!
//! The inspector never touches a concrete store directly: everything it
//! needs is expressed through [`Engine`] and [`Tx`]. A page walk runs
//! inside one transaction so the directory keeps a single shape from
//! the first row to the last; stats are a one-shot copy and need no
//! transaction at all.

use std::time::Duration;

use anyhow::Result;

/// Closed set of page kinds with stable on-disk codes.
///
/// The inspector only distinguishes `Free` from everything else; the
/// remaining kinds matter to the store, not to the walk.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PageKind {
    Free,
    Meta,
    Branch,
    Leaf,
}

impl PageKind {
    pub fn code(self) -> u16 {
        match self {
            PageKind::Free => 0,
            PageKind::Meta => 1,
            PageKind::Branch => 2,
            PageKind::Leaf => 3,
        }
    }

    pub fn from_code(code: u16) -> Option<PageKind> {
        match code {
            0 => Some(PageKind::Free),
            1 => Some(PageKind::Meta),
            2 => Some(PageKind::Branch),
            3 => Some(PageKind::Leaf),
            _ => None,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            PageKind::Free => "free",
            PageKind::Meta => "meta",
            PageKind::Branch => "branch",
            PageKind::Leaf => "leaf",
        }
    }

    pub fn is_free(self) -> bool {
        matches!(self, PageKind::Free)
    }
}

/// Descriptor of one logical page as reported by the engine.
///
/// A non-free page with `overflow = k` owns physical slots
/// `id+1 ..= id+k`; those slots are not separately addressable and an
/// engine must never hand out descriptors for them.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PageInfo {
    pub id: u64,
    pub kind: PageKind,
    /// Item count; meaningful only for non-free pages.
    pub count: u32,
    /// Additional contiguous slots owned by this page. 0 for free pages.
    pub overflow: u32,
}

/// Cumulative transaction counters since the store was opened.
///
/// A value, not a live reference: each call to [`Engine::stats`]
/// returns a fresh copy and later store activity never mutates it.
#[derive(Debug, Clone, Default)]
pub struct TxStats {
    pub page_count: u64,
    pub page_alloc: u64,
    pub cursor_count: u64,
    pub node_count: u64,
    pub node_deref: u64,
    pub rebalance_count: u64,
    pub rebalance_time: Duration,
    pub spill_count: u64,
    pub spill_time: Duration,
    pub write_count: u64,
    pub write_time: Duration,
}

/// Read surface of one transaction.
pub trait Tx {
    /// Fetch the descriptor for `id`.
    ///
    /// `Ok(None)` means the directory is exhausted — the normal end of
    /// a walk. `Err` is an engine fault and fatal to the caller.
    fn page(&self, id: u64) -> Result<Option<PageInfo>>;
}

/// An open store as seen by the inspector.
///
/// `open`/`close` stay inherent on the concrete engine (constructor and
/// `Drop`); the trait carries only what the reports consume.
pub trait Engine {
    type Tx<'a>: Tx
    where
        Self: 'a;

    /// Begin a transaction. The inspector always passes `write = false`
    /// and performs no mutation either way.
    fn begin(&self, write: bool) -> Result<Self::Tx<'_>>;

    /// Copy out the cumulative transaction stats.
    fn stats(&self) -> TxStats;
}
