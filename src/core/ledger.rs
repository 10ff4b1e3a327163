//! Resumable step ledger for side-effecting operations.
//!
//! A run wraps each externally visible operation (process launch, file
//! rewrite) in [`StepLedger::guard`]. The step about to run is persisted to a
//! stamp file *before* it executes, and the stamp is deleted only by
//! [`StepLedger::end`] after the whole sequence succeeded. A failed run
//! therefore leaves the stamp naming the failing step; the next run skips
//! everything before it and retries from there.
//!
//! Precondition: a resumed run must issue the exact same guarded operations
//! in the same order as the interrupted one. The ledger only counts steps; it
//! cannot detect a changed sequence. Only one run may use a stamp file at a
//! time.

use serde::Serialize;
use std::fs;
use std::path::{Path, PathBuf};

use crate::config::LedgerConfig;
use crate::error::{Error, ErrorCode, Result};
use crate::paths;
use crate::utils::io;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum LedgerState {
    Idle,
    Active,
    Completed,
    Failed,
}

/// What happened to a guarded operation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StepOutcome<T> {
    /// The operation executed and returned a value.
    Ran(T),
    /// Already completed by an earlier run.
    Resumed,
    /// Dry run: counted but not executed.
    Planned,
}

impl<T> StepOutcome<T> {
    pub fn ran(&self) -> bool {
        matches!(self, StepOutcome::Ran(_))
    }
}

#[derive(Debug)]
pub struct StepLedger {
    stamp_path: PathBuf,
    execute: bool,
    verbose: bool,
    state: LedgerState,
    current_step: u64,
    resume_from: Option<u64>,
}

impl StepLedger {
    pub fn new(stamp_path: impl Into<PathBuf>, execute: bool, verbose: bool) -> Self {
        Self {
            stamp_path: stamp_path.into(),
            execute,
            verbose,
            state: LedgerState::Idle,
            current_step: 0,
            resume_from: None,
        }
    }

    pub fn from_config(config: &LedgerConfig) -> Result<Self> {
        let stamp_path = paths::expand(&config.stamp_file, "ledger.stampFile")?;
        Ok(Self::new(stamp_path, config.execute, config.verbose))
    }

    pub fn stamp_path(&self) -> &Path {
        &self.stamp_path
    }

    pub fn state(&self) -> LedgerState {
        self.state
    }

    pub fn current_step(&self) -> u64 {
        self.current_step
    }

    pub fn resume_from(&self) -> Option<u64> {
        self.resume_from
    }

    pub fn executes(&self) -> bool {
        self.execute
    }

    pub fn verbose(&self) -> bool {
        self.verbose
    }

    /// Reads the persisted step, `None` when no stamp exists.
    pub fn read_stamp(path: &Path) -> Result<Option<u64>> {
        if !path.exists() {
            return Ok(None);
        }

        let content = io::read_file(path, "read step stamp")?;
        let step = content.trim().parse::<u64>().map_err(|_| {
            Error::config_invalid_value(
                "ledger.stampFile",
                Some(content.trim().to_string()),
                format!("{} does not hold a step number", path.display()),
            )
            .with_hint("Run 'grokrefactor ledger reset' to discard the stamp")
        })?;

        Ok(Some(step))
    }

    /// Idle -> Active. Loads the resume point and marks step 0 in progress.
    ///
    /// A dry run reads the stamp for reporting but never writes or deletes
    /// it, so planning never clobbers the resume point of a real run.
    pub fn begin(&mut self) -> Result<()> {
        if self.state != LedgerState::Idle {
            return Err(Error::internal_unexpected(format!(
                "Step ledger cannot begin from state {:?}",
                self.state
            )));
        }

        // A stamp of 0 means the last run died before its first step.
        self.resume_from = Self::read_stamp(&self.stamp_path)?.filter(|step| *step > 0);
        if let Some(step) = self.resume_from {
            log_status!("ledger", "Resuming interrupted run at step {}", step);
        }

        self.current_step = 0;
        self.persist()?;
        self.state = LedgerState::Active;
        Ok(())
    }

    /// Increments and persists the step counter. Call once per guarded
    /// operation, before its side effect.
    pub fn advance(&mut self) -> Result<u64> {
        self.require_active("advance")?;
        self.current_step += 1;
        self.persist()?;
        Ok(self.current_step)
    }

    /// Whether the operation at the current step should execute.
    pub fn should_run(&mut self) -> bool {
        if !self.execute {
            return false;
        }

        match self.resume_from {
            Some(step) if step == self.current_step => {
                self.resume_from = None;
                true
            }
            Some(_) => false,
            None => true,
        }
    }

    /// Runs `op` as the next guarded step.
    ///
    /// On failure the ledger moves to `Failed`, the stamp keeps naming this
    /// step, and the error is returned: tool failures as-is (tagged with the
    /// step), anything else wrapped as `StepFailed`.
    pub fn guard<T>(
        &mut self,
        label: &str,
        op: impl FnOnce() -> Result<T>,
    ) -> Result<StepOutcome<T>> {
        let step = self.advance()?;

        if self.verbose {
            log_status!("ledger", "step {}: {}", step, label);
        }

        if !self.should_run() {
            return Ok(if self.execute {
                StepOutcome::Resumed
            } else {
                StepOutcome::Planned
            });
        }

        match op() {
            Ok(value) => Ok(StepOutcome::Ran(value)),
            Err(err) => {
                self.state = LedgerState::Failed;
                log_status!("ledger", "Step {} failed; stamp kept for replay", step);
                Err(match err.code {
                    ErrorCode::ToolFailed => err.with_resume_hint(step),
                    _ => Error::step_failed(step, label, &err),
                })
            }
        }
    }

    /// Active -> Completed. Deletes the stamp. Must only be called when every
    /// guarded operation succeeded.
    pub fn end(&mut self) -> Result<()> {
        self.require_active("end")?;

        if self.execute && self.stamp_path.exists() {
            fs::remove_file(&self.stamp_path).map_err(|e| {
                Error::internal_io(
                    e.to_string(),
                    Some(format!("delete {}", self.stamp_path.display())),
                )
            })?;
        }

        self.state = LedgerState::Completed;
        Ok(())
    }

    /// Deletes a stamp left by an interrupted run. Returns whether one existed.
    pub fn reset(path: &Path) -> Result<bool> {
        if !path.exists() {
            return Ok(false);
        }
        fs::remove_file(path).map_err(|e| {
            Error::internal_io(e.to_string(), Some(format!("delete {}", path.display())))
        })?;
        Ok(true)
    }

    fn persist(&self) -> Result<()> {
        if !self.execute {
            return Ok(());
        }
        io::write_file_atomic(
            &self.stamp_path,
            &self.current_step.to_string(),
            "write step stamp",
        )
    }

    fn require_active(&self, operation: &str) -> Result<()> {
        if self.state == LedgerState::Active {
            Ok(())
        } else {
            Err(Error::internal_unexpected(format!(
                "Step ledger cannot {} from state {:?}",
                operation, self.state
            )))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::cell::RefCell;
    use tempfile::TempDir;

    fn ledger_in(dir: &TempDir) -> StepLedger {
        StepLedger::new(dir.path().join("step.txt"), true, false)
    }

    /// Runs `n` guarded ops, failing at 1-indexed `fail_at`. Returns the ops
    /// that actually executed and the run result.
    fn run_sequence(
        ledger: &mut StepLedger,
        n: u64,
        fail_at: Option<u64>,
    ) -> (Vec<u64>, Result<()>) {
        let executed = RefCell::new(Vec::new());
        let result = (|| {
            ledger.begin()?;
            for op in 1..=n {
                ledger.guard(&format!("op {}", op), || {
                    executed.borrow_mut().push(op);
                    if Some(op) == fail_at {
                        Err(Error::internal_io("simulated", None))
                    } else {
                        Ok(())
                    }
                })?;
            }
            ledger.end()
        })();
        (executed.into_inner(), result)
    }

    #[test]
    fn resume_skips_completed_and_retries_failed_step() {
        let dir = TempDir::new().unwrap();

        let mut first = ledger_in(&dir);
        let (ran, result) = run_sequence(&mut first, 5, Some(3));
        assert_eq!(ran, vec![1, 2, 3]);
        let err = result.unwrap_err();
        assert_eq!(err.code, ErrorCode::StepFailed);
        assert_eq!(err.details["step"], 3);
        assert_eq!(first.state(), LedgerState::Failed);
        assert_eq!(StepLedger::read_stamp(first.stamp_path()).unwrap(), Some(3));

        let mut second = ledger_in(&dir);
        let (ran, result) = run_sequence(&mut second, 5, None);
        assert!(result.is_ok());
        assert_eq!(ran, vec![3, 4, 5]);
        assert!(!second.stamp_path().exists());
    }

    #[test]
    fn completed_sequence_removes_stamp() {
        let dir = TempDir::new().unwrap();
        let mut ledger = ledger_in(&dir);

        let (ran, result) = run_sequence(&mut ledger, 3, None);

        assert!(result.is_ok());
        assert_eq!(ran, vec![1, 2, 3]);
        assert_eq!(ledger.state(), LedgerState::Completed);
        assert!(!ledger.stamp_path().exists());
    }

    #[test]
    fn stamp_is_written_before_step_runs() {
        let dir = TempDir::new().unwrap();
        let mut ledger = ledger_in(&dir);
        let stamp = ledger.stamp_path().to_path_buf();
        ledger.begin().unwrap();

        let seen = ledger
            .guard("peek", || StepLedger::read_stamp(&stamp))
            .unwrap();

        assert_eq!(seen, StepOutcome::Ran(Some(1)));
    }

    #[test]
    fn zero_stamp_does_not_skip_everything() {
        let dir = TempDir::new().unwrap();
        fs::write(dir.path().join("step.txt"), "0").unwrap();
        let mut ledger = ledger_in(&dir);

        let (ran, result) = run_sequence(&mut ledger, 2, None);

        assert!(result.is_ok());
        assert_eq!(ran, vec![1, 2]);
    }

    #[test]
    fn dry_run_plans_without_touching_stamp() {
        let dir = TempDir::new().unwrap();
        fs::write(dir.path().join("step.txt"), "2").unwrap();
        let mut ledger = StepLedger::new(dir.path().join("step.txt"), false, false);

        let (ran, result) = run_sequence(&mut ledger, 3, None);

        assert!(result.is_ok());
        assert!(ran.is_empty());
        assert_eq!(StepLedger::read_stamp(ledger.stamp_path()).unwrap(), Some(2));
    }

    #[test]
    fn end_refused_after_failure() {
        let dir = TempDir::new().unwrap();
        let mut ledger = ledger_in(&dir);
        ledger.begin().unwrap();
        let _ = ledger.guard("boom", || -> Result<()> { Err(Error::internal_io("x", None)) });

        assert!(ledger.end().is_err());
        assert!(ledger.stamp_path().exists());
    }

    #[test]
    fn corrupt_stamp_is_reported() {
        let dir = TempDir::new().unwrap();
        fs::write(dir.path().join("step.txt"), "three").unwrap();
        let mut ledger = ledger_in(&dir);

        let err = ledger.begin().unwrap_err();
        assert_eq!(err.code.as_str(), "config.invalid_value");
    }

    #[test]
    fn reset_reports_whether_stamp_existed() {
        let dir = TempDir::new().unwrap();
        let stamp = dir.path().join("step.txt");
        fs::write(&stamp, "4").unwrap();

        assert!(StepLedger::reset(&stamp).unwrap());
        assert!(!StepLedger::reset(&stamp).unwrap());
    }
}
