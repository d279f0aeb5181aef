//! Columnar storage: columns, tables, the database/catalog, and the index
//! structures (B+ tree, sorted array, extendible hash table) that back them.
//!
//! This module owns data layout and point/range access only; query
//! dispatch, joins and batching live in [`crate::engine`].

pub mod bplus;
pub mod client;
pub mod column;
pub mod database;
pub mod hash_table;
pub mod sorted_index;
pub mod sorted_primitives;
pub mod table;

pub use client::{ClientContext, ResultData};
pub use column::Column;
pub use database::{Catalog, Database, EntryKind};
pub use hash_table::ExtendibleHashTable;
pub use table::{Row, Table};
