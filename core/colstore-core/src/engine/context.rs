//! The `Engine`: the process's catalog and (at most one) active database,
//! threaded explicitly through every executor entry point.
//!
//! Grounded in `original_source/db_manager.c`'s `create_db`/`create_table`/
//! `create_column`/`create_idx`, which in the reference operate on the
//! file-scope globals `current_db` and `db_catalog`. Per section 9's design
//! note ("pass a typed engine context explicitly into every operator rather
//! than relying on ambient state"), those globals become fields of this
//! ordinary owned struct — there is no `static`/`lazy_static` anywhere in
//! this crate.

use crate::error::{DbxError, DbxResult};
use crate::storage::database::{Catalog, Database, EntryKind};
use crate::types::IndexKind;

#[cfg(feature = "logging")]
use tracing::{debug, info};

/// The catalog plus the single active database. One `Engine` exists per
/// server process in the reference; nothing stops a test (or a future
/// multi-tenant server) from owning several.
#[derive(Debug, Default)]
pub struct Engine {
    pub catalog: Catalog,
    pub current_db: Option<Database>,
}

impl Engine {
    pub fn new() -> Self {
        Engine { catalog: Catalog::new(), current_db: None }
    }

    /// `create(db,"name")`. The reference rejects a second `create_db` while
    /// one is already active (`db_manager.c: create_db` checks `current_db
    /// != NULL`).
    pub fn create_db(&mut self, name: &str) -> DbxResult<()> {
        if self.current_db.is_some() {
            return Err(DbxError::ObjectAlreadyExists { name: name.to_string() });
        }
        #[cfg(feature = "logging")]
        info!(db = name, "create_db");
        self.current_db = Some(Database::new(name));
        self.catalog.register(name.to_string(), EntryKind::Table);
        Ok(())
    }

    fn db(&self) -> DbxResult<&Database> {
        self.current_db.as_ref().ok_or_else(|| DbxError::ObjectDoesNotExist { name: "<no active db>".into() })
    }

    fn db_mut(&mut self) -> DbxResult<&mut Database> {
        self.current_db.as_mut().ok_or_else(|| DbxError::ObjectDoesNotExist { name: "<no active db>".into() })
    }

    /// `create(tbl,"name",db,ncols)`. Registers the table's fully-qualified
    /// name (`db.table`) in the catalog alongside creating it in the active
    /// database.
    pub fn create_table(&mut self, table_name: &str, col_capacity: usize) -> DbxResult<()> {
        let db_name = self.db()?.name.clone();
        let fq = format!("{}.{}", db_name, table_name);
        if self.catalog.contains(&fq) {
            return Err(DbxError::ObjectAlreadyExists { name: fq });
        }
        self.db_mut()?.create_table(table_name, col_capacity)?;
        self.catalog.register(fq, EntryKind::Table);
        #[cfg(feature = "logging")]
        info!(table = table_name, col_capacity, "create_table");
        Ok(())
    }

    /// `create(col,"name",db.tbl)`. Registers the column's fully-qualified
    /// name (`db.table.column`).
    pub fn create_column(&mut self, table_name: &str, col_name: &str) -> DbxResult<()> {
        let db_name = self.db()?.name.clone();
        let table = self
            .db_mut()?
            .table_mut(table_name)
            .ok_or_else(|| DbxError::ObjectDoesNotExist { name: table_name.to_string() })?;
        table.add_column(col_name)?;
        let fq = format!("{}.{}.{}", db_name, table_name, col_name);
        self.catalog.register(fq, EntryKind::Column);
        #[cfg(feature = "logging")]
        debug!(table = table_name, col = col_name, "create_column");
        Ok(())
    }

    /// `create(idx,db.tbl.col,{sorted|btree},{clustered|unclustered})`.
    pub fn create_index(&mut self, table_name: &str, col_name: &str, kind: IndexKind) -> DbxResult<()> {
        let table = self
            .db_mut()?
            .table_mut(table_name)
            .ok_or_else(|| DbxError::ObjectDoesNotExist { name: table_name.to_string() })?;
        table.create_index(col_name, kind)?;
        #[cfg(feature = "logging")]
        debug!(table = table_name, col = col_name, ?kind, "create_index");
        Ok(())
    }

    pub fn table(&self, name: &str) -> DbxResult<&crate::storage::Table> {
        self.db()?.table(name).ok_or_else(|| DbxError::ObjectDoesNotExist { name: name.to_string() })
    }

    pub fn table_mut(&mut self, name: &str) -> DbxResult<&mut crate::storage::Table> {
        self.db_mut()?.table_mut(name).ok_or_else(|| DbxError::ObjectDoesNotExist { name: name.to_string() })
    }

    /// Splits a fully-qualified `db.table.column` (or `db.table`) name into
    /// its `(table, column)` parts, stripping the leading `db.` prefix. The
    /// engine keeps at most one active database, so the `db` segment is
    /// informational only; it is still validated against the active
    /// database's name to catch stale handles early.
    pub fn split_fq_name<'a>(&self, fq: &'a str) -> DbxResult<(&'a str, Option<&'a str>)> {
        let db_name = self.db()?.name.as_str();
        let rest = fq
            .strip_prefix(db_name)
            .and_then(|r| r.strip_prefix('.'))
            .ok_or_else(|| DbxError::ObjectDoesNotExist { name: fq.to_string() })?;
        match rest.split_once('.') {
            Some((table, col)) => Ok((table, Some(col))),
            None => Ok((rest, None)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn create_db_rejects_second_create() {
        let mut engine = Engine::new();
        engine.create_db("d").unwrap();
        assert!(engine.create_db("d2").is_err());
    }

    #[test]
    fn create_table_and_column_register_fq_names() {
        let mut engine = Engine::new();
        engine.create_db("d").unwrap();
        engine.create_table("t", 1).unwrap();
        engine.create_column("t", "x").unwrap();
        assert_eq!(engine.catalog.lookup("d.t"), Some(EntryKind::Table));
        assert_eq!(engine.catalog.lookup("d.t.x"), Some(EntryKind::Column));
    }

    #[test]
    fn create_index_propagates_clustered_flag() {
        let mut engine = Engine::new();
        engine.create_db("d").unwrap();
        engine.create_table("t", 2).unwrap();
        engine.create_column("t", "x").unwrap();
        engine.create_column("t", "y").unwrap();
        engine.create_index("t", "x", IndexKind::BTreeClustered).unwrap();
        assert!(engine.table("t").unwrap().clustered);
        assert!(engine.table("t").unwrap().column("y").unwrap().clustered);
    }

    #[test]
    fn split_fq_name_separates_table_and_column() {
        let mut engine = Engine::new();
        engine.create_db("d").unwrap();
        let (table, col) = engine.split_fq_name("d.t.x").unwrap();
        assert_eq!(table, "t");
        assert_eq!(col, Some("x"));
        let (table, col) = engine.split_fq_name("d.t").unwrap();
        assert_eq!(table, "t");
        assert_eq!(col, None);
    }
}
