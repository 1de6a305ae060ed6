//! Transfer state machine.
//!
//! `Queued → Running → {Completed | Paused | Failed}`, `Paused → Queued | Running`,
//! `Failed → Queued`. `Completed` is terminal. Every method leaves the record
//! untouched when it returns `Err`.

use super::types::{ResumeToken, TransferRecord, TransferStatus, MAX_INCOMPLETE_FRACTION};

/// An operation was attempted from a status that does not allow it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
#[error("cannot {operation} a {from} transfer")]
pub struct InvalidTransition {
    pub from: TransferStatus,
    pub operation: &'static str,
}

fn reject(from: TransferStatus, operation: &'static str) -> InvalidTransition {
    InvalidTransition { from, operation }
}

impl TransferRecord {
    /// `Queued | Paused → Running`. Takes the stored resume token (if any) so the
    /// transport can continue from it; the record no longer holds it afterwards.
    pub fn admit(&mut self) -> Result<Option<ResumeToken>, InvalidTransition> {
        match self.status {
            TransferStatus::Queued | TransferStatus::Paused => {
                self.status = TransferStatus::Running;
                self.last_error = None;
                Ok(self.resume_token.take())
            }
            other => Err(reject(other, "start")),
        }
    }

    /// Applies a byte-level progress report. The fraction never decreases while
    /// running and stays below `1.0` until completion.
    pub fn apply_progress(
        &mut self,
        bytes_written: u64,
        bytes_expected: u64,
    ) -> Result<(), InvalidTransition> {
        if self.status != TransferStatus::Running {
            return Err(reject(self.status, "report progress for"));
        }
        self.bytes_written = bytes_written;
        if bytes_expected > 0 {
            self.bytes_expected = bytes_expected;
        }
        let fraction = if self.bytes_expected > 0 {
            (self.bytes_written as f64 / self.bytes_expected as f64).min(MAX_INCOMPLETE_FRACTION)
        } else {
            0.0
        };
        if fraction > self.progress_fraction {
            self.progress_fraction = fraction;
        }
        Ok(())
    }

    /// `Running → Completed`. Counters and fraction are set to their final values.
    pub fn complete(&mut self) -> Result<(), InvalidTransition> {
        if self.status != TransferStatus::Running {
            return Err(reject(self.status, "complete"));
        }
        if self.bytes_expected > 0 {
            self.bytes_written = self.bytes_expected;
        } else {
            self.bytes_expected = self.bytes_written;
        }
        self.progress_fraction = 1.0;
        self.resume_token = None;
        self.last_error = None;
        self.status = TransferStatus::Completed;
        Ok(())
    }

    /// `Running → Failed`. Any resume state is discarded.
    pub fn fail(&mut self, reason: impl Into<String>) -> Result<(), InvalidTransition> {
        if self.status != TransferStatus::Running {
            return Err(reject(self.status, "fail"));
        }
        self.resume_token = None;
        self.last_error = Some(reason.into());
        self.status = TransferStatus::Failed;
        Ok(())
    }

    /// `Running → Paused`, keeping the fraction and storing the token (if any).
    pub fn interrupt(&mut self, token: Option<ResumeToken>) -> Result<(), InvalidTransition> {
        if self.status != TransferStatus::Running {
            return Err(reject(self.status, "pause"));
        }
        self.resume_token = token;
        self.status = TransferStatus::Paused;
        Ok(())
    }

    /// `Queued | Paused | Failed → Queued` for re-admission. A paused record keeps
    /// its token so admission resumes rather than restarts.
    pub fn requeue(&mut self) -> Result<(), InvalidTransition> {
        match self.status {
            TransferStatus::Queued | TransferStatus::Paused | TransferStatus::Failed => {
                self.status = TransferStatus::Queued;
                Ok(())
            }
            other => Err(reject(other, "resume")),
        }
    }

    /// Cancel-and-retry: back to a fresh `Queued` record with no progress.
    pub fn reset(&mut self) -> Result<(), InvalidTransition> {
        if self.status == TransferStatus::Completed {
            return Err(reject(self.status, "cancel"));
        }
        self.status = TransferStatus::Queued;
        self.progress_fraction = 0.0;
        self.bytes_written = 0;
        self.bytes_expected = 0;
        self.resume_token = None;
        self.last_error = None;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::record::TransferId;

    fn record() -> TransferRecord {
        TransferRecord::new(TransferId(1), "https://example.com/files/movie.mp4")
    }

    fn token() -> ResumeToken {
        ResumeToken::new(b"offset=400".to_vec())
    }

    #[test]
    fn new_record_is_queued_without_token() {
        let r = record();
        assert_eq!(r.status(), TransferStatus::Queued);
        assert_eq!(r.display_name(), "movie.mp4");
        assert_eq!(r.progress_fraction(), 0.0);
        assert!(r.resume_token().is_none());
        assert_eq!(r.bytes_expected(), 0);
    }

    #[test]
    fn progress_is_monotonic_and_capped_below_one() {
        let mut r = record();
        r.admit().unwrap();
        r.apply_progress(40, 100).unwrap();
        assert!((r.progress_fraction() - 0.4).abs() < 1e-9);
        r.apply_progress(30, 100).unwrap();
        assert!((r.progress_fraction() - 0.4).abs() < 1e-9);
        r.apply_progress(100, 100).unwrap();
        assert!(r.progress_fraction() < 1.0);
        r.complete().unwrap();
        assert_eq!(r.progress_fraction(), 1.0);
        assert_eq!(r.bytes_written(), 100);
    }

    #[test]
    fn unknown_expected_size_keeps_fraction_at_zero() {
        let mut r = record();
        r.admit().unwrap();
        r.apply_progress(512, 0).unwrap();
        assert_eq!(r.progress_fraction(), 0.0);
        r.complete().unwrap();
        assert_eq!(r.bytes_expected(), 512);
        assert_eq!(r.progress_fraction(), 1.0);
    }

    #[test]
    fn interrupt_stores_token_and_admit_hands_it_back_once() {
        let mut r = record();
        r.admit().unwrap();
        r.apply_progress(40, 100).unwrap();
        r.interrupt(Some(token())).unwrap();
        assert_eq!(r.status(), TransferStatus::Paused);
        assert!((r.progress_fraction() - 0.4).abs() < 1e-9);
        assert_eq!(r.resume_token(), Some(&token()));

        let handed = r.admit().unwrap();
        assert_eq!(handed, Some(token()));
        assert!(r.resume_token().is_none());
        assert_eq!(r.status(), TransferStatus::Running);
    }

    #[test]
    fn completed_is_terminal() {
        let mut r = record();
        r.admit().unwrap();
        r.complete().unwrap();
        assert!(r.admit().is_err());
        assert!(r.requeue().is_err());
        assert!(r.reset().is_err());
        assert!(r.fail("late").is_err());
        assert!(r.interrupt(None).is_err());
        assert_eq!(r.status(), TransferStatus::Completed);
    }

    #[test]
    fn completion_requires_running() {
        let mut r = record();
        let err = r.complete().unwrap_err();
        assert_eq!(err.from, TransferStatus::Queued);
        assert_eq!(r.status(), TransferStatus::Queued);
    }

    #[test]
    fn failed_can_be_requeued_and_drops_token() {
        let mut r = record();
        r.admit().unwrap();
        r.fail("HTTP 500").unwrap();
        assert_eq!(r.last_error(), Some("HTTP 500"));
        r.requeue().unwrap();
        assert_eq!(r.status(), TransferStatus::Queued);
        r.admit().unwrap();
        assert!(r.last_error().is_none());
    }

    #[test]
    fn reset_clears_progress_and_token() {
        let mut r = record();
        r.admit().unwrap();
        r.apply_progress(70, 100).unwrap();
        r.interrupt(Some(token())).unwrap();
        r.reset().unwrap();
        assert_eq!(r.status(), TransferStatus::Queued);
        assert_eq!(r.progress_fraction(), 0.0);
        assert_eq!(r.bytes_written(), 0);
        assert!(r.resume_token().is_none());
    }

    #[test]
    fn running_record_cannot_be_requeued() {
        let mut r = record();
        r.admit().unwrap();
        let err = r.requeue().unwrap_err();
        assert_eq!(err.to_string(), "cannot resume a running transfer");
    }
}
