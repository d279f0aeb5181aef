//! The UNIX-domain socket accept/handle/close loop (section 5's
//! "Scheduling model": single-threaded, one client at a time).
//!
//! Grounded in `original_source/server.c`'s `setup_server`/`handle_client`.
//! The reference loops `accept` → `handle_client` → `close` on one socket
//! for the whole process lifetime; this keeps that shape, swapping the raw
//! `message` struct wire format for [`crate::net::wire`]'s explicit framing
//! and the reference's `current_db`/`db_catalog` globals for an explicit
//! [`Engine`].

use std::io::{BufReader, BufWriter, Write};
use std::os::unix::net::{UnixListener, UnixStream};
use std::path::{Path, PathBuf};

use crate::engine::batch::BatchQueue;
use crate::engine::context::Engine;
use crate::engine::executor::{execute, run_batch, ExecOutcome, OperatorDescriptor, SelectSource};
use crate::engine::persistence;
use crate::error::{DbxError, DbxResult, StatusCode};
use crate::net::command::{parse_line, ParsedCommand};
use crate::net::wire;
use crate::storage::{ClientContext, Row};

/// Default socket path, analogous to the reference's `SOCK_PATH` constant.
pub const DEFAULT_SOCK_PATH: &str = "colstore_server.sock";

/// A bound, listening server. One exists per process; it owns no `Engine`
/// itself (`run` is handed one explicitly, per section 9's REDESIGN FLAG)
/// so a caller can restore from a dump before the first `accept`.
pub struct Server {
    listener: UnixListener,
    path: PathBuf,
}

impl Server {
    /// Binds a fresh socket at `path`, removing any stale socket file left
    /// by a previous run (`setup_server`'s `unlink(local.sun_path)` before
    /// `bind`).
    pub fn bind(path: impl AsRef<Path>) -> DbxResult<Self> {
        let path = path.as_ref().to_path_buf();
        if path.exists() {
            std::fs::remove_file(&path)?;
        }
        let listener = UnixListener::bind(&path)?;
        Ok(Server { listener, path })
    }

    /// Runs the accept loop until a client issues `shutdown`, dumping
    /// `engine` to `dump_path` before returning either way (section 7: "The
    /// shutdown path always attempts to persist before returning
    /// `OkDone`").
    pub fn run(&self, engine: &mut Engine, dump_path: impl AsRef<Path>) -> DbxResult<()> {
        loop {
            let (stream, _) = self.listener.accept()?;
            #[cfg(feature = "logging")]
            tracing::info!("client connected");
            let shutdown = handle_client(engine, stream)?;
            #[cfg(feature = "logging")]
            tracing::info!("client disconnected");
            if shutdown {
                persistence::dump_to_path(engine, &dump_path)?;
                return Ok(());
            }
        }
    }
}

impl Drop for Server {
    fn drop(&mut self) {
        let _ = std::fs::remove_file(&self.path);
    }
}

/// Services one connection until the client disconnects or issues
/// `shutdown`. Returns `true` in the latter case so [`Server::run`] knows to
/// persist and stop accepting (`handle_client`'s `int shutdown` return
/// value).
fn handle_client(engine: &mut Engine, stream: UnixStream) -> DbxResult<bool> {
    let mut reader = BufReader::new(stream.try_clone()?);
    let mut writer = BufWriter::new(stream);
    let mut client = ClientContext::new();
    let mut batch = BatchQueue::new();
    let mut batch_column: Option<String> = None;

    loop {
        let line = match wire::read_request(&mut reader)? {
            None => return Ok(false),
            Some(line) => line,
        };

        let parsed = match parse_line(&line) {
            Ok(parsed) => parsed,
            Err(err) => {
                send_status(&mut writer, StatusCode::from(&err))?;
                continue;
            }
        };

        let command = match parsed {
            None => {
                send_status(&mut writer, StatusCode::OkDone)?;
                continue;
            }
            Some(ParsedCommand::Load { table, num_cols }) => {
                handle_load(engine, &mut reader, &table, num_cols)?;
                send_status(&mut writer, StatusCode::OkDone)?;
                continue;
            }
            Some(ParsedCommand::Op(op)) => op,
        };

        if client.batching {
            if let OperatorDescriptor::Select { source: SelectSource::Column(ref fq), .. } = command {
                batch_column = Some(fq.clone());
            }
        }

        if matches!(command, OperatorDescriptor::BatchExecute) {
            if let Err(err) = run_queued_batch(engine, &mut client, &mut batch, &batch_column) {
                send_status(&mut writer, StatusCode::from(&err))?;
                continue;
            }
            batch_column = None;
        }

        match execute(engine, &mut client, &mut batch, command) {
            Ok(ExecOutcome::Done) => send_status(&mut writer, StatusCode::OkDone)?,
            Ok(ExecOutcome::Print(columns)) => {
                wire::write_print_response(&mut writer, &columns)?;
                writer.flush()?;
            }
            Ok(ExecOutcome::Shutdown) => {
                send_status(&mut writer, StatusCode::OkDone)?;
                return Ok(true);
            }
            Err(err) => send_status(&mut writer, StatusCode::from(&err))?,
        }
    }
}

fn send_status(writer: &mut impl Write, status: StatusCode) -> DbxResult<()> {
    wire::write_status(writer, status)?;
    writer.flush()?;
    Ok(())
}

/// Drains `batch` through [`run_batch`] over the column the queued selects
/// were scanning. The executor's own `BatchExecute` arm cannot do this
/// itself (queued selects do not carry their source column — only
/// `lo`/`hi`/`out`), so the server tracks the most recently batched
/// column and supplies it here, exactly as `execute_shared_scan` resolves
/// its scanned column from the queue's own stored `GeneralizedColumnHandle`.
fn run_queued_batch(
    engine: &Engine,
    client: &mut ClientContext,
    batch: &mut BatchQueue,
    batch_column: &Option<String>,
) -> DbxResult<()> {
    if batch.is_empty() {
        return Ok(());
    }
    let fq = batch_column
        .as_ref()
        .ok_or_else(|| DbxError::QueryUnsupported("batch_execute() with no batched column".into()))?;
    let (table, col) = engine.split_fq_name(fq)?;
    let col_name = col.ok_or_else(|| DbxError::ObjectDoesNotExist { name: fq.clone() })?;
    let data = engine
        .table(table)?
        .column(col_name)
        .ok_or_else(|| DbxError::ObjectDoesNotExist { name: fq.clone() })?
        .data
        .clone();
    run_batch(client, batch, &data);
    Ok(())
}

/// The bulk-load handshake (section 6): after the `load(db.table,num_cols)`
/// command line, the client sends a 4-byte row count followed by
/// `num_rows * num_cols` packed little-endian 32-bit integers, row-major.
fn handle_load(
    engine: &mut Engine,
    reader: &mut impl std::io::Read,
    table: &str,
    num_cols: usize,
) -> DbxResult<()> {
    let mut count_buf = [0u8; 4];
    reader.read_exact(&mut count_buf)?;
    let num_rows = u32::from_le_bytes(count_buf) as usize;

    let mut rows = Vec::with_capacity(num_rows);
    let mut val_buf = [0u8; 4];
    for _ in 0..num_rows {
        let mut row: Row = Row::with_capacity(num_cols);
        for _ in 0..num_cols {
            reader.read_exact(&mut val_buf)?;
            row.push(i32::from_le_bytes(val_buf));
        }
        rows.push(row);
    }

    engine.table_mut(table)?.bulk_load(rows)
}
