//! Per-client result namespace (section 3's "Handle"/"Result", section 5's
//! "client context").
//!
//! Grounded in `original_source/client_context.h`'s `ClientContext`: a small
//! private catalog of named Result handles, freed in full when the
//! connection closes (nothing here outlives the `ClientContext` value).

use std::collections::HashMap;

use crate::error::{DbxError, DbxResult};
use crate::types::ElementType;

/// A typed, immutable intermediate produced by an operator (section 3's
/// "Result"). Once installed under a name it is never mutated — a later
/// operator that wants to change it produces a new named Result instead.
#[derive(Debug, Clone, PartialEq)]
pub enum ResultData {
    Int32(Vec<i32>),
    Int64(Vec<i64>),
    Float64(Vec<f64>),
}

impl ResultData {
    pub fn element_type(&self) -> ElementType {
        match self {
            ResultData::Int32(_) => ElementType::Int32,
            ResultData::Int64(_) => ElementType::Int64,
            ResultData::Float64(_) => ElementType::Float64,
        }
    }

    pub fn tuple_count(&self) -> usize {
        match self {
            ResultData::Int32(v) => v.len(),
            ResultData::Int64(v) => v.len(),
            ResultData::Float64(v) => v.len(),
        }
    }

    pub fn as_i32_slice(&self) -> DbxResult<&[i32]> {
        match self {
            ResultData::Int32(v) => Ok(v),
            _ => Err(DbxError::QueryUnsupported("expected an Int32 result".into())),
        }
    }
}

/// A connection-scoped namespace of named Results. Dropping the
/// `ClientContext` frees every Result it owns — there is no further
/// bookkeeping needed on disconnect, unlike the reference's manual
/// `free(chandle_table)` walk.
#[derive(Debug, Clone, Default)]
pub struct ClientContext {
    results: HashMap<String, ResultData>,
    /// Set by `batch_queries()`; cleared by `batch_execute()`.
    pub batching: bool,
}

impl ClientContext {
    pub fn new() -> Self {
        ClientContext::default()
    }

    pub fn install(&mut self, name: impl Into<String>, data: ResultData) {
        self.results.insert(name.into(), data);
    }

    pub fn get(&self, name: &str) -> DbxResult<&ResultData> {
        self.results
            .get(name)
            .ok_or_else(|| DbxError::ObjectDoesNotExist { name: name.to_string() })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn install_and_fetch_named_result() {
        let mut ctx = ClientContext::new();
        ctx.install("p", ResultData::Int32(vec![1, 2, 3]));
        assert_eq!(ctx.get("p").unwrap().tuple_count(), 3);
        assert!(ctx.get("missing").is_err());
    }

    #[test]
    fn read_after_write_sees_latest_value() {
        let mut ctx = ClientContext::new();
        ctx.install("r", ResultData::Int32(vec![1]));
        ctx.install("r", ResultData::Int32(vec![1, 2]));
        assert_eq!(ctx.get("r").unwrap().tuple_count(), 2);
    }
}
