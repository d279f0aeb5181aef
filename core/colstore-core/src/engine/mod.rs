//! The query engine: an explicit [`Engine`] context plus the executor, join
//! strategies, batching/shared-scan subsystem and persistence to disk.
//!
//! There is no process-wide global state anywhere in this module — every
//! operation takes `&mut Engine` explicitly, so multiple engines can coexist
//! in the same process (useful for tests) and nothing here depends on
//! initialization order.

pub mod batch;
pub mod context;
pub mod executor;
pub mod join;
pub mod persistence;

pub use context::Engine;
pub use executor::OperatorDescriptor;
