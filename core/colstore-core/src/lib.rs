//! # colstore-core
//!
//! The execution engine of a single-node, column-oriented analytical
//! database: indexed columnar storage, a select/fetch/aggregate/join/
//! update/delete query executor, and a batched shared-scan subsystem.
//!
//! The line-oriented command parser, the stream-socket client/server
//! wrapper and the bulk loader are boundary glue around this engine — see
//! [`net`] — and are deliberately thin: they exist so the crate is a
//! runnable system, not because their implementation affects the engine's
//! semantics.
//!
//! ## Module structure
//! - [`types`] — shared scalar types (`ElementType`, `IndexKind`, fixed constants)
//! - [`error`] — `DbxError`/`DbxResult` and the wire-level `StatusCode`
//! - [`storage`] — columns, tables, the database/catalog, and the B+ tree /
//!   sorted / extendible-hash index structures
//! - [`engine`] — the `Engine` context, the query executor, joins, batching
//!   and persistence
//! - [`net`] — command parsing, wire framing and the socket server
//! - [`logging`] — `tracing` subscriber initialisation, gated by the
//!   `logging` feature

pub mod engine;
pub mod error;
pub mod logging;
pub mod net;
pub mod storage;
pub mod types;

pub use engine::Engine;
pub use error::{DbxError, DbxResult};
