//! Batched selects and the shared-scan subsystem (section 4.6).
//!
//! Grounded in `original_source/db_operator.c`'s `execute_shared_scan` /
//! `execute_shared_select_operator`: `batch_queries()` defers subsequent
//! `select` operators instead of running them; `batch_execute()` drains the
//! queue through one pass over the scanned column, testing a global
//! `{min(los), max(his)}` envelope first and then each query's own bounds,
//! appending qualifying positions to that query's own output buffer.

use rayon::prelude::*;

use crate::types::NUM_CHUNK_WORKERS;

/// One deferred `select` over the shared-scanned column: its bounds and the
/// name of the Result it will populate on `batch_execute()`.
#[derive(Debug, Clone)]
pub struct QueuedSelect {
    pub lo: Option<i32>,
    pub hi: Option<i32>,
    pub out: String,
}

/// Per-client queue of deferred selects, filled while
/// [`crate::storage::ClientContext::batching`] is set.
#[derive(Debug, Clone, Default)]
pub struct BatchQueue {
    queries: Vec<QueuedSelect>,
}

impl BatchQueue {
    pub fn new() -> Self {
        BatchQueue::default()
    }

    pub fn push(&mut self, query: QueuedSelect) {
        self.queries.push(query);
    }

    pub fn is_empty(&self) -> bool {
        self.queries.is_empty()
    }

    /// Drains the queue, returning the queued selects for the caller to pair
    /// with their computed positions. Leaves the queue empty (`batch_execute`
    /// clears the batching flag separately on the `ClientContext`).
    pub fn drain(&mut self) -> Vec<QueuedSelect> {
        std::mem::take(&mut self.queries)
    }
}

/// One pass over `data` (optionally indirected through `indices`, for a
/// shared scan over an intermediate result rather than a base column),
/// testing the global envelope of all queued bounds first and then each
/// query's own `(lo, hi)`. Returns one position vector per query, in the
/// same order as `queries`.
pub fn shared_scan(data: &[i32], indices: Option<&[i32]>, queries: &[QueuedSelect]) -> Vec<Vec<i32>> {
    let envelope_lo = queries.iter().filter_map(|q| q.lo).min();
    let envelope_hi = queries.iter().filter_map(|q| q.hi).max();

    let mut out: Vec<Vec<i32>> = vec![Vec::new(); queries.len()];
    for (i, &val) in data.iter().enumerate() {
        if envelope_lo.is_some_and(|lo| val < lo) || envelope_hi.is_some_and(|hi| val > hi) {
            continue;
        }
        let position = indices.map(|idx| idx[i]).unwrap_or(i as i32);
        for (q, query) in queries.iter().enumerate() {
            let matches = query.lo.is_none_or(|lo| lo <= val) && query.hi.is_none_or(|hi| val < hi);
            if matches {
                out[q].push(position);
            }
        }
    }
    out
}

/// The optional chunked-parallel variant of [`shared_scan`] (section 4.6,
/// disabled by default in the reference flow): slices `data` into
/// [`NUM_CHUNK_WORKERS`] contiguous chunks, runs [`shared_scan`] on each
/// chunk concurrently via `rayon`, then sequentially concatenates the
/// per-query, per-chunk outputs (translating chunk-local positions back to
/// column-global ones when the scan is over base data rather than an
/// already-indirected intermediate).
pub fn shared_scan_chunked(data: &[i32], indices: Option<&[i32]>, queries: &[QueuedSelect]) -> Vec<Vec<i32>> {
    if data.is_empty() || queries.is_empty() {
        return vec![Vec::new(); queries.len()];
    }

    let num_workers = NUM_CHUNK_WORKERS.clamp(1, data.len());
    let chunk_size = data.len().div_ceil(num_workers);

    let chunk_starts: Vec<usize> = (0..data.len()).step_by(chunk_size).collect();
    let per_chunk: Vec<Vec<Vec<i32>>> = chunk_starts
        .into_par_iter()
        .map(|start| {
            let end = (start + chunk_size).min(data.len());
            let chunk_data = &data[start..end];
            let chunk_indices = indices.map(|idx| &idx[start..end]);
            let local = shared_scan(chunk_data, chunk_indices, queries);
            if chunk_indices.is_some() {
                local
            } else {
                local
                    .into_iter()
                    .map(|positions| positions.into_iter().map(|p| p + start as i32).collect())
                    .collect()
            }
        })
        .collect();

    let mut out = vec![Vec::new(); queries.len()];
    for chunk_result in per_chunk {
        for (q, positions) in chunk_result.into_iter().enumerate() {
            out[q].extend(positions);
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    fn q(lo: Option<i32>, hi: Option<i32>) -> QueuedSelect {
        QueuedSelect { lo, hi, out: "r".into() }
    }

    #[test]
    fn shared_scan_matches_individual_scans() {
        let data = vec![3, 1, 4, 1, 5, 9, 2, 6];
        let queries = vec![q(Some(2), Some(6)), q(None, Some(4)), q(Some(5), None)];
        let results = shared_scan(&data, None, &queries);

        let expected: Vec<Vec<i32>> = queries
            .iter()
            .map(|query| {
                data.iter()
                    .enumerate()
                    .filter(|&(_, &v)| {
                        query.lo.is_none_or(|lo| lo <= v) && query.hi.is_none_or(|hi| v < hi)
                    })
                    .map(|(i, _)| i as i32)
                    .collect()
            })
            .collect();

        assert_eq!(results, expected);
    }

    #[test]
    fn shared_scan_over_indirected_positions_preserves_positions() {
        let data = vec![10, 20, 30];
        let indices = vec![100, 200, 300];
        let results = shared_scan(&data, Some(&indices), &[q(Some(15), None)]);
        assert_eq!(results, vec![vec![200, 300]]);
    }

    #[test]
    fn chunked_shared_scan_matches_sequential() {
        let data: Vec<i32> = (0..500).map(|i| i % 17).collect();
        let queries = vec![q(Some(3), Some(10)), q(None, Some(5)), q(Some(12), None)];

        let mut sequential = shared_scan(&data, None, &queries);
        let mut chunked = shared_scan_chunked(&data, None, &queries);
        for v in sequential.iter_mut().chain(chunked.iter_mut()) {
            v.sort_unstable();
        }
        assert_eq!(sequential, chunked);
    }
}
