pub mod engine;  // src/engine.rs — Engine/Tx traits, PageKind, PageInfo, TxStats
pub mod inspect; // src/inspect/{mod,stats,pages}.rs — the reports
pub mod store;   // src/store/{mod,meta,page,pager,free,lock,stats}.rs — reference engine

// Convenience re-exports
pub use engine::{Engine, PageInfo, PageKind, Tx, TxStats};
pub use inspect::{render_pages, render_stats};
pub use store::Store;
