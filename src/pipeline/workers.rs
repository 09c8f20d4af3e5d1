//! Fixed worker pool for the match stage.
//!
//! The reader (the caller's thread) submits row batches into a bounded
//! channel. Workers classify each batch and forward the outcomes to a single
//! accumulator thread, which owns all aggregation state.

use std::thread::{self, JoinHandle};

use crossbeam_channel::{bounded, Receiver, Sender};
use tracing::debug;

use crate::error::{SeatmapError, SeatmapResult};
use crate::matcher::Matcher;
use crate::source::SourceRow;

use super::stage::{RowMatcher, RowOutcome};
use super::stats::Accumulator;

pub(crate) struct MatchPool {
    tx: Sender<Vec<SourceRow>>,
    workers: Vec<JoinHandle<()>>,
    accumulator: JoinHandle<Accumulator>,
}

fn spawn_failed(what: &str, e: &std::io::Error) -> SeatmapError {
    SeatmapError::internal(format!("failed to spawn {what}: {e}"))
}

impl MatchPool {
    pub fn start(
        workers: usize,
        queue_capacity: usize,
        matcher: &Matcher,
        mut accumulator: Accumulator,
    ) -> SeatmapResult<Self> {
        let workers = workers.max(1);
        let queue_capacity = queue_capacity.max(1);
        let (tx, rx) = bounded::<Vec<SourceRow>>(queue_capacity);
        let (out_tx, out_rx) = bounded::<Vec<RowOutcome>>(queue_capacity);

        let accumulator = thread::Builder::new()
            .name("seatmap-accumulate".to_string())
            .spawn(move || {
                for batch in out_rx {
                    for outcome in batch {
                        accumulator.record(outcome);
                    }
                }
                accumulator
            })
            .map_err(|e| spawn_failed("accumulator", &e))?;

        let mut handles = Vec::with_capacity(workers);
        for idx in 0..workers {
            let rx: Receiver<Vec<SourceRow>> = rx.clone();
            let out_tx = out_tx.clone();
            let mut rows = RowMatcher::new(matcher.clone());
            let handle = thread::Builder::new()
                .name(format!("seatmap-match-{idx}"))
                .spawn(move || {
                    for batch in rx {
                        let outcomes: Vec<RowOutcome> = batch.into_iter().map(|row| rows.classify(row)).collect();
                        if out_tx.send(outcomes).is_err() {
                            break;
                        }
                    }
                })
                .map_err(|e| spawn_failed("match worker", &e))?;
            handles.push(handle);
        }
        drop(out_tx);
        debug!(workers, queue_capacity, "match pool started");

        Ok(Self {
            tx,
            workers: handles,
            accumulator,
        })
    }

    /// Blocks while the queue is full.
    pub fn submit(&self, batch: Vec<SourceRow>) -> SeatmapResult<()> {
        self.tx
            .send(batch)
            .map_err(|_| SeatmapError::internal("match workers exited early"))
    }

    /// Drains queued batches, stops the workers and hands back the
    /// accumulator.
    pub fn finish(self) -> SeatmapResult<Accumulator> {
        // Closing the queue ends each worker loop once it is drained; the
        // accumulator loop ends when the last worker drops its sender.
        drop(self.tx);
        let mut panicked = false;
        for handle in self.workers {
            panicked |= handle.join().is_err();
        }
        let accumulator = self
            .accumulator
            .join()
            .map_err(|_| SeatmapError::internal("accumulator thread panicked"))?;
        if panicked {
            return Err(SeatmapError::internal("match worker panicked"));
        }
        Ok(accumulator)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    use std::sync::Arc;

    use crate::alias::AliasTable;
    use crate::index::RepresentativeIndex;
    use crate::pipeline::stats::ReportSettings;
    use crate::pipeline::ArtifactGranularity;
    use crate::representative::Representative;
    use crate::source::PostcodeRecord;

    #[test]
    fn test_every_submitted_row_reaches_the_accumulator() {
        let index = RepresentativeIndex::build(&[Representative::new("1", "A", "Ipswich", "X")]).unwrap();
        let matcher = Matcher::new(Arc::new(index), Arc::new(AliasTable::new()));
        let pool = MatchPool::start(3, 2, &matcher, Accumulator::new(false, 0)).unwrap();

        for b in 0..20u64 {
            let batch = (0..50u64)
                .map(|i| {
                    SourceRow::Record(PostcodeRecord {
                        row: b * 50 + i + 2,
                        postcode: format!("IP{b} {}AA", i % 10),
                        area_name: if i % 2 == 0 { "Ipswich" } else { "Atlantis" }.to_string(),
                        is_active: true,
                        auxiliary: Vec::new(),
                    })
                })
                .collect();
            pool.submit(batch).unwrap();
        }

        let settings = ReportSettings {
            granularity: ArtifactGranularity::Postcode,
            top_unmatched: 5,
            elapsed_ms: 0,
        };
        let done = pool.finish().unwrap().finish(&matcher, settings).unwrap();
        let totals = done.report.totals;
        assert_eq!(totals.rows_scanned, 1000);
        assert_eq!((totals.matched, totals.unmatched), (500, 500));
        assert_eq!(done.unmatched.get("atlantis"), Some(&500));
    }
}
