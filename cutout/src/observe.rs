//! Run observability: a run id plus named phase timers.
//!
//! An [`Observer`] is handed explicitly to the pipeline and the smart
//! controller. Each [`PhaseGuard`] opens a `tracing` span and logs its elapsed
//! time when dropped; finished phases are also collected so callers can put
//! them in their results.

use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PhaseTiming {
    pub phase: String,
    pub iteration: usize,
    pub elapsed_ms: f64,
}

#[derive(Debug, Clone)]
pub struct Observer {
    run_id: String,
    iteration: usize,
    timings: Arc<Mutex<Vec<PhaseTiming>>>,
}

impl Default for Observer {
    fn default() -> Self {
        Self::new()
    }
}

impl Observer {
    pub fn new() -> Self {
        Self {
            run_id: uuid::Uuid::new_v4().to_string(),
            iteration: 0,
            timings: Arc::new(Mutex::new(Vec::new())),
        }
    }

    pub fn run_id(&self) -> &str {
        &self.run_id
    }

    pub fn iteration(&self) -> usize {
        self.iteration
    }

    /// Same run, tagged with a new iteration number. Timings are shared.
    pub fn for_iteration(&self, iteration: usize) -> Self {
        Self {
            run_id: self.run_id.clone(),
            iteration,
            timings: Arc::clone(&self.timings),
        }
    }

    pub fn phase(&self, name: &'static str) -> PhaseGuard {
        let span = tracing::info_span!(
            "phase",
            phase = name,
            run = %self.run_id,
            iteration = self.iteration
        );
        PhaseGuard {
            name,
            iteration: self.iteration,
            started: Instant::now(),
            span,
            sink: Arc::clone(&self.timings),
        }
    }

    /// Timings recorded so far, oldest first.
    pub fn timings(&self) -> Vec<PhaseTiming> {
        self.timings
            .lock()
            .map(|t| t.clone())
            .unwrap_or_default()
    }

    /// Timings recorded for one iteration.
    pub fn timings_for(&self, iteration: usize) -> Vec<PhaseTiming> {
        self.timings()
            .into_iter()
            .filter(|t| t.iteration == iteration)
            .collect()
    }
}

pub struct PhaseGuard {
    name: &'static str,
    iteration: usize,
    started: Instant,
    span: tracing::Span,
    sink: Arc<Mutex<Vec<PhaseTiming>>>,
}

impl PhaseGuard {
    pub fn span(&self) -> &tracing::Span {
        &self.span
    }

    pub fn elapsed(&self) -> Duration {
        self.started.elapsed()
    }
}

impl Drop for PhaseGuard {
    fn drop(&mut self) {
        let elapsed_ms = self.started.elapsed().as_secs_f64() * 1000.0;
        self.span.in_scope(|| {
            tracing::debug!(phase = self.name, elapsed_ms, "phase finished");
        });
        if let Ok(mut sink) = self.sink.lock() {
            sink.push(PhaseTiming {
                phase: self.name.to_string(),
                iteration: self.iteration,
                elapsed_ms,
            });
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_phase_guard_records_timing() {
        let observer = Observer::new();
        {
            let _read = observer.phase("read");
        }
        let second = observer.for_iteration(2);
        {
            let _write = second.phase("write");
        }
        let timings = observer.timings();
        assert_eq!(timings.len(), 2);
        assert_eq!(timings[0].phase, "read");
        assert_eq!(observer.timings_for(2)[0].phase, "write");
        assert_eq!(second.run_id(), observer.run_id());
    }
}
