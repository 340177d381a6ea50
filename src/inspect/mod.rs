//! inspect — the report renderers.
//!
//! Two read-only consumers of an [`Engine`](crate::engine::Engine):
//! - stats.rs — two-line transaction stats summary
//! - pages.rs — page directory table walked under one transaction

pub mod pages;
pub mod stats;

pub use pages::{render_pages, stride};
pub use stats::{format_duration, render_stats, trunc_duration, write_stats};
