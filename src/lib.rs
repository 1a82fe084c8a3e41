//! # threadkeep
//!
//! Archives hierarchical discussion threads (a root post plus its nested
//! comment tree) into an embedded SQLite store, and reconstructs archived
//! pages as ranked, nested HTML views.
//!
//! ## Architecture
//!
//! ```text
//! ┌──────────┐   ┌──────────────┐   ┌──────────┐
//! │ Fetcher  │──▶│  Ingest (tx)  │──▶│  SQLite   │
//! │ listing  │   │  tree → rows │   │ 2 tables  │
//! └──────────┘   └──────────────┘   └────┬─────┘
//!                                        │ BFS, score-ranked
//!                     ┌──────────┐  ┌────▼────────┐
//!                     │   HTML   │◀─│ Reconstruct  │
//!                     └──────────┘  └─────────────┘
//! ```
//!
//! Writes go through a single-connection pool so concurrent archive requests
//! serialize; a whole thread, continuation pages included, commits in one
//! transaction or not at all. Reads use a separate pool and see only
//! committed archives.
//!
//! ## Modules
//!
//! | Module | Purpose |
//! |--------|---------|
//! | [`config`] | TOML configuration parsing |
//! | [`error`] | Error taxonomy |
//! | [`db`] | Connection pools and the write transaction scope |
//! | [`migrate`] | Schema creation |
//! | [`models`] | Row and view types |
//! | [`document`] | Tree-walk accessors over fetched listings |
//! | [`fetch`] | Content-API fetch collaborator |
//! | [`ingest`] | Recursive tree flattening and the duplicate guard |
//! | [`reconstruct`] | Breadth-first tree reconstruction |
//! | [`html`] | Entity escaping helpers |
//! | [`templates`] | HTML rendering |
//! | [`server`] | HTTP surface |

pub mod config;
pub mod db;
pub mod document;
pub mod error;
pub mod fetch;
pub mod html;
pub mod ingest;
pub mod migrate;
pub mod models;
pub mod reconstruct;
pub mod server;
pub mod templates;
