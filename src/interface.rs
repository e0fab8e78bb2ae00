//! Threaded interface for running beam searches in the background.
//!
//! Each search runs on its own thread against a shared, read-only
//! [`StatementMatrix`]. Cancellation is cooperative through a shared
//! `Arc<AtomicBool>` and is observed between search depths; a cancelled search
//! still returns the candidates found so far, flagged as cancelled.

use std::sync::{Arc, atomic::{AtomicBool, Ordering}};
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};

use tracing::debug;

use crate::error::Result;
use crate::measure::MeasureRegistry;
use crate::search::{BeamSearch, SearchParams, SearchResult};
use crate::statements::StatementMatrix;

/// Cancellation token shared with the worker thread.
#[derive(Debug, Clone, Default)]
pub struct CancelToken(Arc<AtomicBool>);
impl CancelToken {
    pub fn new() -> Self { Self::default() }
    pub fn cancel(&self) { self.0.store(true, Ordering::SeqCst); }
    pub fn is_cancelled(&self) -> bool { self.0.load(Ordering::Relaxed) }
}

/// Handle to a running or completed search.
pub struct SearchHandle {
    cancel: CancelToken,
    started: Instant,
    join: JoinHandle<Result<SearchResult>>,
}
impl SearchHandle {
    /// Request cancellation. The worker notices it before starting the next depth.
    pub fn cancel(&self) { self.cancel.cancel(); }
    /// Wait for the search to finish.
    pub fn join(self) -> Result<SearchResult> {
        match self.join.join() {
            Ok(result) => result,
            Err(panic) => std::panic::resume_unwind(panic),
        }
    }
    pub fn is_finished(&self) -> bool { self.join.is_finished() }
    /// Elapsed time since start.
    pub fn elapsed(&self) -> Duration { self.started.elapsed() }
}

/// Starts searches over shared matrices.
#[derive(Debug, Clone, Default)]
pub struct SearchInterface {
    measures: Arc<MeasureRegistry>,
}

impl SearchInterface {
    pub fn new(measures: Arc<MeasureRegistry>) -> Self { Self { measures } }

    /// Validates the parameters, then runs the search on a new thread.
    pub fn start(&self, matrix: Arc<StatementMatrix>, params: SearchParams) -> Result<SearchHandle> {
        let search = BeamSearch::new(params, &self.measures)?;
        let cancel = CancelToken::new();
        let token = cancel.clone();
        let started = Instant::now();
        debug!(matrix = matrix.id(), "starting background search");
        let join = thread::spawn(move || search.run(&matrix, &token));
        Ok(SearchHandle { cancel, started, join })
    }
}
