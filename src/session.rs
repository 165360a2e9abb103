//! Phase-timed execution sessions and the audit entry they produce.
//!
//! A session brackets one pipeline invocation: it stamps the wall-clock
//! start, times each phase on a monotonic clock, and classifies whatever
//! error escapes into a closed taxonomy. Classified faults are *swallowed* —
//! the caller gets `Ok(None)` and reads the audit entry — while anything
//! outside the taxonomy propagates, on the theory that an unrecognized
//! failure is a bug to surface, not an operational condition to log.

use crate::executor::VariantExecutor;
use crate::paths::VariantBasePath;
use crate::pipeline::PipelineError;
use crate::plan::VariantPlan;
use crate::types::{OriginalFile, VariantCommitResult, VariantPolicy};
use chrono::{DateTime, Utc};
use log::warn;
use serde::Serialize;
use std::path::Path;
use std::time::{Duration, Instant};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Phase {
    Inspect,
    Collect,
    Plan,
    Preprocess,
    Commit,
    Postprocess,
    Store,
}

const PHASE_COUNT: usize = 7;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ExecutionStatus {
    Success,
    ImageError,
    IoError,
    DbError,
    UnknownError,
}

/// One pipeline invocation's audit record.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ExecutionEntry {
    pub status: ExecutionStatus,
    pub error_kind: Option<String>,
    pub error_message: Option<String>,
    pub executed_at: DateTime<Utc>,
    pub inspect: Option<Duration>,
    pub collect: Option<Duration>,
    pub plan: Option<Duration>,
    pub preprocess: Option<Duration>,
    pub commit: Option<Duration>,
    pub postprocess: Option<Duration>,
    pub store: Option<Duration>,
    pub overall: Option<Duration>,
}

pub struct ExecutionSession {
    executed_at: DateTime<Utc>,
    started: Instant,
    status: ExecutionStatus,
    error_kind: Option<String>,
    error_message: Option<String>,
    timings: [Option<Duration>; PHASE_COUNT],
    overall: Option<Duration>,
}

impl ExecutionSession {
    /// Start a session, stamping the wall clock.
    pub fn begin() -> Self {
        Self {
            executed_at: Utc::now(),
            started: Instant::now(),
            status: ExecutionStatus::Success,
            error_kind: None,
            error_message: None,
            timings: [None; PHASE_COUNT],
            overall: None,
        }
    }

    /// Run one phase, recording its duration on success. A failing phase
    /// leaves its slot empty so the entry shows where execution stopped.
    pub fn phase<T>(
        &mut self,
        phase: Phase,
        f: impl FnOnce() -> Result<T, PipelineError>,
    ) -> Result<T, PipelineError> {
        let mark = Instant::now();
        let value = f()?;
        self.timings[phase as usize] = Some(mark.elapsed());
        Ok(value)
    }

    /// The preprocess → commit → postprocess triple, dispatched through the
    /// executor with each leg timed as its own phase.
    pub fn execute<E: VariantExecutor>(
        &mut self,
        executor: &E,
        media_root: &Path,
        base: &VariantBasePath,
        file: &OriginalFile,
        plan: &VariantPlan,
        policy: VariantPolicy,
    ) -> Result<Vec<VariantCommitResult>, PipelineError> {
        let image = self.phase(Phase::Preprocess, || executor.preprocess(file))?;
        let results = self.phase(Phase::Commit, || {
            executor.commit(&image, media_root, base, plan, policy)
        })?;
        self.phase(Phase::Postprocess, || executor.postprocess(image))?;
        Ok(results)
    }

    /// Close the session: stamp the overall duration and classify the
    /// outcome. Faults inside the taxonomy are swallowed into the entry;
    /// unknown faults set `UnknownError` and propagate.
    pub fn finish<T>(
        &mut self,
        outcome: Result<T, PipelineError>,
    ) -> Result<Option<T>, PipelineError> {
        self.overall = Some(self.started.elapsed());
        match outcome {
            Ok(value) => {
                self.status = ExecutionStatus::Success;
                Ok(Some(value))
            }
            Err(error) => {
                self.error_kind = Some(error.kind().to_string());
                self.error_message = Some(error.to_string());
                match error.classification() {
                    Some(status) => {
                        self.status = status;
                        warn!("pipeline fault ({}): {error}", error.kind());
                        Ok(None)
                    }
                    None => {
                        self.status = ExecutionStatus::UnknownError;
                        Err(error)
                    }
                }
            }
        }
    }

    pub fn status(&self) -> ExecutionStatus {
        self.status
    }

    pub fn to_entry(&self) -> ExecutionEntry {
        ExecutionEntry {
            status: self.status,
            error_kind: self.error_kind.clone(),
            error_message: self.error_message.clone(),
            executed_at: self.executed_at,
            inspect: self.timings[Phase::Inspect as usize],
            collect: self.timings[Phase::Collect as usize],
            plan: self.timings[Phase::Plan as usize],
            preprocess: self.timings[Phase::Preprocess as usize],
            commit: self.timings[Phase::Commit as usize],
            postprocess: self.timings[Phase::Postprocess as usize],
            store: self.timings[Phase::Store as usize],
            overall: self.overall,
        }
    }
}
