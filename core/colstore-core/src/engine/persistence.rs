//! One-shot dump/load of the entire database to a single binary file
//! (section 4.2's "Persistence", section 6's "Persisted state layout").
//!
//! Grounded in `original_source/db_manager.c`'s `dump_server_data`/
//! `load_server_data`. The reference writes raw C struct memory
//! (`fwrite(db, sizeof(Db), 1, fd)`), which is not portable across compilers
//! or architectures; this crate instead writes the explicit little-endian,
//! length-prefixed layout section 6 documents, matching the design note in
//! section 9 that "the dump format is explicit about which bytes belong to
//! which case" rather than relying on an in-memory byte overlay.

use std::fs::File;
use std::io::{self, BufReader, BufWriter, Read, Write};
use std::path::Path;

use crate::engine::context::Engine;
use crate::error::DbxResult;
use crate::storage::column::{read_i32_vec, Column};
use crate::storage::database::{Catalog, Database, EntryKind};
use crate::storage::table::Table;
use crate::types::IndexKind;

/// Default dump file name (section 6: "a single file `dbdump.bin` in the
/// server's working directory").
pub const DUMP_FILE_NAME: &str = "dbdump.bin";

fn write_str(w: &mut impl Write, s: &str) -> io::Result<()> {
    let bytes = s.as_bytes();
    w.write_all(&(bytes.len() as u32).to_le_bytes())?;
    w.write_all(bytes)
}

fn read_str(r: &mut impl Read) -> io::Result<String> {
    let mut len_buf = [0u8; 4];
    r.read_exact(&mut len_buf)?;
    let len = u32::from_le_bytes(len_buf) as usize;
    let mut buf = vec![0u8; len];
    r.read_exact(&mut buf)?;
    String::from_utf8(buf).map_err(|e| io::Error::new(io::ErrorKind::InvalidData, e))
}

fn write_u32(w: &mut impl Write, v: u32) -> io::Result<()> {
    w.write_all(&v.to_le_bytes())
}

fn read_u32(r: &mut impl Read) -> io::Result<u32> {
    let mut buf = [0u8; 4];
    r.read_exact(&mut buf)?;
    Ok(u32::from_le_bytes(buf))
}

fn write_bool(w: &mut impl Write, v: bool) -> io::Result<()> {
    w.write_all(&[v as u8])
}

fn read_bool(r: &mut impl Read) -> io::Result<bool> {
    let mut buf = [0u8; 1];
    r.read_exact(&mut buf)?;
    Ok(buf[0] != 0)
}

/// Dumps `engine`'s active database to `path`, overwriting any existing
/// file. A process with no active database dumps a single empty marker
/// byte; `net::server`'s `shutdown` handling calls this unconditionally
/// before returning `OkDone` (`dump_server_data`'s call site in
/// `server.c`'s accept loop is likewise unconditional).
pub fn dump_to_path(engine: &Engine, path: impl AsRef<Path>) -> DbxResult<()> {
    let mut w = BufWriter::new(File::create(path)?);
    match &engine.current_db {
        None => write_bool(&mut w, false)?,
        Some(db) => {
            write_bool(&mut w, true)?;
            dump_database(db, &mut w)?;
        }
    }
    w.flush()?;
    Ok(())
}

fn dump_database(db: &Database, w: &mut impl Write) -> io::Result<()> {
    write_str(w, &db.name)?;
    write_u32(w, db.tables.len() as u32)?;
    for table in &db.tables {
        dump_table(table, w)?;
    }
    Ok(())
}

fn dump_table(table: &Table, w: &mut impl Write) -> io::Result<()> {
    write_str(w, &table.name)?;
    write_u32(w, table.col_capacity() as u32)?;
    write_bool(w, table.clustered)?;
    write_u32(w, table.columns.len() as u32)?;
    for col in &table.columns {
        dump_column(col, w)?;
    }
    Ok(())
}

fn dump_column(col: &Column, w: &mut impl Write) -> io::Result<()> {
    write_str(w, &col.name)?;
    write_bool(w, col.clustered)?;
    w.write_all(&[col.index_kind.wire_tag()])?;
    write_u32(w, col.data.len() as u32)?;
    for &v in &col.data {
        w.write_all(&v.to_le_bytes())?;
    }
    col.dump_index(w)
}

/// Loads `path` into `engine`, replacing its current database and
/// rebuilding the catalog from the loaded schema. A missing file leaves
/// `engine` untouched and succeeds — `load_server_data`'s boot path treats
/// "no dump yet" as "start fresh", not an error.
pub fn load_from_path(engine: &mut Engine, path: impl AsRef<Path>) -> DbxResult<()> {
    let path = path.as_ref();
    if !path.exists() {
        return Ok(());
    }

    let mut r = BufReader::new(File::open(path)?);
    if !read_bool(&mut r)? {
        engine.current_db = None;
        engine.catalog = Catalog::new();
        return Ok(());
    }

    let db = load_database(&mut r)?;
    let mut catalog = Catalog::new();
    catalog.register(db.name.clone(), EntryKind::Table);
    for table in &db.tables {
        let fq_table = format!("{}.{}", db.name, table.name);
        catalog.register(fq_table.clone(), EntryKind::Table);
        for col in &table.columns {
            catalog.register(format!("{}.{}", fq_table, col.name), EntryKind::Column);
        }
    }
    engine.current_db = Some(db);
    engine.catalog = catalog;
    Ok(())
}

fn load_database(r: &mut impl Read) -> io::Result<Database> {
    let name = read_str(r)?;
    let mut db = Database::new(name);
    let n_tables = read_u32(r)?;
    for _ in 0..n_tables {
        db.tables.push(load_table(r)?);
    }
    Ok(db)
}

fn load_table(r: &mut impl Read) -> io::Result<Table> {
    let name = read_str(r)?;
    let col_capacity = read_u32(r)? as usize;
    let clustered = read_bool(r)?;
    let n_cols = read_u32(r)?;
    let mut table = Table::new(name, col_capacity);
    for _ in 0..n_cols {
        table.columns.push(load_column(r)?);
    }
    table.clustered = clustered;
    Ok(table)
}

fn load_column(r: &mut impl Read) -> io::Result<Column> {
    let name = read_str(r)?;
    let clustered = read_bool(r)?;
    let mut kind_buf = [0u8; 1];
    r.read_exact(&mut kind_buf)?;
    let kind = IndexKind::from_wire_tag(kind_buf[0])
        .ok_or_else(|| io::Error::new(io::ErrorKind::InvalidData, "corrupt dump: unknown index kind tag"))?;
    let n = read_u32(r)? as usize;
    let data = read_i32_vec(r, n)?;

    let mut col = Column::new(name);
    col.data = data;
    col.clustered = clustered;
    col.index_kind = kind;
    col.load_index(r)?;
    Ok(col)
}
