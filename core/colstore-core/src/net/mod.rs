//! Boundary glue: the line-oriented command parser, wire framing, and the
//! UNIX-domain socket server loop.
//!
//! None of this module's contents participate in the storage invariants or
//! the laws of the query executor — it is glue between the executor
//! (`crate::engine`) and a textual client protocol, grounded directly in
//! `original_source/server.c`, `message.h` and `parse.c`.

pub mod command;
pub mod server;
pub mod wire;

pub use command::ParsedCommand;
pub use server::Server;
