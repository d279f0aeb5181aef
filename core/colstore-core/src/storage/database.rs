//! The active database and the process-wide catalog (section 3/4.4).
//!
//! Grounded in `original_source/db_manager.c`'s `create_db`/`create_table`
//! and `cs165_api.h`'s `Db`/`Table` records. Only one database is active at
//! a time; per the REDESIGN FLAG in section 9 ("process-wide current
//! database and catalog"), both are owned by an explicit [`Engine`] rather
//! than file-scope globals — see `crate::engine`.

use std::collections::HashMap;

use super::table::Table;
use crate::error::{DbxError, DbxResult};

/// A single active database: a name and its ordered tables.
#[derive(Debug, Clone)]
pub struct Database {
    pub name: String,
    pub tables: Vec<Table>,
}

impl Database {
    pub fn new(name: impl Into<String>) -> Self {
        Database { name: name.into(), tables: Vec::new() }
    }

    pub fn table(&self, name: &str) -> Option<&Table> {
        self.tables.iter().find(|t| t.name == name)
    }

    pub fn table_mut(&mut self, name: &str) -> Option<&mut Table> {
        self.tables.iter_mut().find(|t| t.name == name)
    }

    pub fn create_table(&mut self, name: impl Into<String>, col_capacity: usize) -> DbxResult<()> {
        let name = name.into();
        if self.table(&name).is_some() {
            return Err(DbxError::ObjectAlreadyExists { name: format!("{}.{}", self.name, name) });
        }
        self.tables.push(Table::new(name, col_capacity));
        Ok(())
    }
}

/// What a fully-qualified name resolves to in the catalog.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EntryKind {
    Table,
    Column,
    Result,
}

/// Process-wide name→object mapping (section 3's "Catalog"), keyed by
/// fully-qualified name (`db.table` or `db.table.column`).
///
/// The reference resolves collisions by open chaining into a fixed-size
/// hash table; a `std::collections::HashMap` is the idiomatic Rust
/// equivalent of the same contract (amortised O(1) lookup/insert, no
/// ordering guarantee) without hand-rolling probe sequences — see
/// DESIGN.md.
#[derive(Debug, Clone, Default)]
pub struct Catalog {
    entries: HashMap<String, EntryKind>,
}

impl Catalog {
    pub fn new() -> Self {
        Catalog::default()
    }

    pub fn register(&mut self, fq_name: impl Into<String>, kind: EntryKind) {
        self.entries.insert(fq_name.into(), kind);
    }

    pub fn unregister(&mut self, fq_name: &str) {
        self.entries.remove(fq_name);
    }

    pub fn lookup(&self, fq_name: &str) -> Option<EntryKind> {
        self.entries.get(fq_name).copied()
    }

    pub fn contains(&self, fq_name: &str) -> bool {
        self.entries.contains_key(fq_name)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn create_table_rejects_duplicate_name() {
        let mut db = Database::new("d");
        db.create_table("t", 2).unwrap();
        assert!(db.create_table("t", 3).is_err());
    }

    #[test]
    fn catalog_round_trips_entries() {
        let mut cat = Catalog::new();
        cat.register("d.t", EntryKind::Table);
        cat.register("d.t.x", EntryKind::Column);
        assert_eq!(cat.lookup("d.t"), Some(EntryKind::Table));
        assert_eq!(cat.lookup("d.t.x"), Some(EntryKind::Column));
        assert_eq!(cat.lookup("d.missing"), None);
        cat.unregister("d.t.x");
        assert!(!cat.contains("d.t.x"));
    }
}
