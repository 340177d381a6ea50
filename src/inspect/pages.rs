//! inspect/pages — page directory walk.
//!
//! One read-only transaction, one linear pass from page 0. The cursor
//! advances by a computed stride: 1 for free pages, 1 + overflow for
//! everything else, so the slots owned by an overflow span are never
//! fetched or rendered on their own. `Ok(None)` from the engine ends
//! the walk; a genuine fetch error aborts it after a diagnostic row.

use std::io::Write;

use anyhow::{Context, Result};
use log::debug;

use crate::engine::{Engine, PageKind, Tx};

const HEADER: &str = "ID       TYPE       ITEMS  OVRFLW";
const RULE: &str = "======== ========== ====== ======";

/// Cursor advance for a page of the given kind and overflow span.
pub fn stride(kind: PageKind, overflow: u32) -> u64 {
    if kind.is_free() {
        1
    } else {
        1 + overflow as u64
    }
}

/// Render the page directory table for an open engine.
pub fn render_pages<E: Engine, W: Write>(engine: &E, out: &mut W) -> Result<()> {
    let tx = engine.begin(false).context("begin read tx for page walk")?;

    writeln!(out, "{}", HEADER)?;
    writeln!(out, "{}", RULE)?;

    let mut id: u64 = 0;
    let mut rows: u64 = 0;
    loop {
        let info = match tx.page(id) {
            Ok(Some(info)) => info,
            Ok(None) => break,
            Err(e) => {
                writeln!(out, "page error: id={} err={:#}", id, e)?;
                return Err(e.context(format!("fetch page {}", id)));
            }
        };

        // Free pages render blank ITEMS/OVRFLW fields; overflow only
        // shows up when the span is non-empty.
        let mut count = String::new();
        let mut overflow = String::new();
        if !info.kind.is_free() {
            count = info.count.to_string();
            if info.overflow > 0 {
                overflow = info.overflow.to_string();
            }
        }

        writeln!(
            out,
            "{:<8} {:<10} {:<6} {:<6}",
            info.id,
            info.kind.as_str(),
            count,
            overflow
        )?;

        rows += 1;
        id += stride(info.kind, info.overflow);
    }

    debug!("page walk: {} row(s), stopped at id {}", rows, id);
    Ok(())
}
