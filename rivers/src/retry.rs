//! Bounded retry of grouped inserts on the transient geometry union failure.
//!
//! PostGIS occasionally fails `ST_Union` on some platforms with a low level
//! `Invalid argument` error that does not reproduce when the same statement is
//! issued again. [`ResilientInsertExecutor`] retries an insert immediately while a
//! [`TransientErrorClassifier`] recognizes that failure, up to a fixed number of
//! attempts. Every other error is returned at once.

use std::future::Future;

use config::shared::MergeConfig;
use tracing::warn;

use crate::error::{ErrorKind, RiversError, RiversResult};

/// Decides whether a failed insert may succeed when issued again unchanged.
pub trait TransientErrorClassifier {
    /// Returns `true` if `error` is the transient failure worth retrying.
    fn is_transient(&self, error: &RiversError) -> bool;
}

impl<F> TransientErrorClassifier for F
where
    F: Fn(&RiversError) -> bool,
{
    fn is_transient(&self, error: &RiversError) -> bool {
        self(error)
    }
}

/// SQLSTATE class of internal errors, which GEOS failures are reported as.
const INTERNAL_ERROR_SQL_STATE_CLASS: &str = "XX";

/// Recognizes the geometry union defect.
///
/// Matches store query errors reported as internal errors (SQLSTATE class `XX`)
/// whose database message ends with a configured suffix.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GeometryUnionDefect {
    message_suffix: String,
}

impl GeometryUnionDefect {
    /// Creates a classifier matching messages ending with `message_suffix`.
    pub fn new(message_suffix: impl Into<String>) -> Self {
        Self {
            message_suffix: message_suffix.into(),
        }
    }
}

impl Default for GeometryUnionDefect {
    fn default() -> Self {
        Self::new(MergeConfig::DEFAULT_TRANSIENT_ERROR_SUFFIX)
    }
}

impl TransientErrorClassifier for GeometryUnionDefect {
    fn is_transient(&self, error: &RiversError) -> bool {
        error.kind() == ErrorKind::DestinationQueryFailed
            && error
                .sql_state()
                .is_some_and(|code| code.starts_with(INTERNAL_ERROR_SQL_STATE_CLASS))
            && error
                .detail()
                .is_some_and(|detail| detail.trim().ends_with(self.message_suffix.as_str()))
    }
}

/// Result of an insert that did not fail fatally.
#[derive(Debug)]
pub enum InsertOutcome {
    /// The insert succeeded after `attempts` attempts.
    Inserted { rows: u64, attempts: u32 },
    /// Every attempt hit the transient failure; the group was not inserted.
    Exhausted { attempts: u32, last_error: RiversError },
}

impl InsertOutcome {
    /// Returns the number of attempts that were made.
    pub fn attempts(&self) -> u32 {
        match self {
            InsertOutcome::Inserted { attempts, .. } | InsertOutcome::Exhausted { attempts, .. } => {
                *attempts
            }
        }
    }
}

/// Runs grouped inserts with a bounded number of immediate retries.
#[derive(Debug, Clone)]
pub struct ResilientInsertExecutor<C = GeometryUnionDefect> {
    max_attempts: u32,
    classifier: C,
}

impl ResilientInsertExecutor<GeometryUnionDefect> {
    /// Creates an executor from the merge configuration.
    pub fn from_config(config: &MergeConfig) -> Self {
        Self::new(
            config.max_insert_attempts,
            GeometryUnionDefect::new(config.transient_error_suffix.clone()),
        )
    }
}

impl<C> ResilientInsertExecutor<C>
where
    C: TransientErrorClassifier,
{
    /// Creates an executor making at most `max_attempts` attempts per insert.
    ///
    /// A bound of zero is treated as one attempt.
    pub fn new(max_attempts: u32, classifier: C) -> Self {
        Self {
            max_attempts: max_attempts.max(1),
            classifier,
        }
    }

    /// Returns the maximum number of attempts per insert.
    pub fn max_attempts(&self) -> u32 {
        self.max_attempts
    }

    /// Runs `insert` until it succeeds, fails fatally or runs out of attempts.
    ///
    /// Returns `Err` for errors the classifier does not consider transient; those
    /// are never retried. Exhausting the attempts is not an error, it is reported
    /// as [`InsertOutcome::Exhausted`] so that the caller can skip the group.
    pub async fn execute<F, Fut>(&self, insert: F) -> RiversResult<InsertOutcome>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = RiversResult<u64>>,
    {
        self.execute_with(insert, |err, attempts_left| {
            warn!(
                attempts_left,
                error = err.detail().unwrap_or_else(|| err.description()),
                "transient geometry union failure, retrying insert"
            );
        })
        .await
    }

    /// Like [`ResilientInsertExecutor::execute`], calling `on_retry` with the error
    /// and the number of attempts left before every retry.
    pub async fn execute_with<F, Fut, R>(
        &self,
        mut insert: F,
        mut on_retry: R,
    ) -> RiversResult<InsertOutcome>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = RiversResult<u64>>,
        R: FnMut(&RiversError, u32),
    {
        let mut attempt = 1;
        loop {
            match insert().await {
                Ok(rows) => {
                    return Ok(InsertOutcome::Inserted {
                        rows,
                        attempts: attempt,
                    });
                }
                Err(err) if self.classifier.is_transient(&err) => {
                    if attempt >= self.max_attempts {
                        return Ok(InsertOutcome::Exhausted {
                            attempts: attempt,
                            last_error: err,
                        });
                    }

                    on_retry(&err, self.max_attempts - attempt);
                    attempt += 1;
                }
                Err(err) => return Err(err),
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicU32, Ordering};

    use super::*;
    use crate::rivers_error;

    fn transient() -> RiversError {
        rivers_error!(
            ErrorKind::DestinationQueryFailed,
            "Failed to merge rivers by HUC8",
            "GEOSUnaryUnion: TopologyException: Invalid argument\n"
        )
        .with_sql_state("XX000")
    }

    fn fatal() -> RiversError {
        rivers_error!(
            ErrorKind::DestinationQueryFailed,
            "Failed to merge rivers by HUC8",
            "column \"strahler\" does not exist"
        )
    }

    #[test]
    fn classifier_matches_suffix_on_query_errors_only() {
        let classifier = GeometryUnionDefect::default();

        assert!(classifier.is_transient(&transient()));
        assert!(!classifier.is_transient(&fatal()));
        assert!(!classifier.is_transient(&rivers_error!(
            ErrorKind::SourceConnectionFailed,
            "Lost connection",
            "Invalid argument"
        )));
    }

    #[test]
    fn classifier_requires_internal_error_sql_state() {
        let classifier = GeometryUnionDefect::default();
        let message = "GEOSUnaryUnion: TopologyException: Invalid argument";

        let invalid_parameter = rivers_error!(
            ErrorKind::DestinationQueryFailed,
            "Failed to merge rivers by HUC8",
            message
        )
        .with_sql_state("22023");
        let without_code =
            rivers_error!(ErrorKind::DestinationQueryFailed, "Failed to merge rivers by HUC8", message);

        assert!(!classifier.is_transient(&invalid_parameter));
        assert!(!classifier.is_transient(&without_code));
        assert!(classifier.is_transient(&without_code.with_sql_state("XX000")));
    }

    #[tokio::test]
    async fn retry_hook_reports_attempts_left() {
        let executor = ResilientInsertExecutor::new(3, GeometryUnionDefect::default());
        let mut retries = Vec::new();

        let outcome = executor
            .execute_with(
                || async { Err(transient()) },
                |err, attempts_left| retries.push((err.kind(), attempts_left)),
            )
            .await
            .unwrap();

        assert_eq!(outcome.attempts(), 3);
        assert_eq!(
            retries,
            vec![
                (ErrorKind::DestinationQueryFailed, 2),
                (ErrorKind::DestinationQueryFailed, 1)
            ]
        );
    }

    #[tokio::test]
    async fn always_transient_failure_stops_after_three_attempts() {
        let executor = ResilientInsertExecutor::new(3, GeometryUnionDefect::default());
        let calls = AtomicU32::new(0);

        let outcome = executor
            .execute(|| {
                calls.fetch_add(1, Ordering::SeqCst);
                async { Err(transient()) }
            })
            .await
            .unwrap();

        assert!(matches!(outcome, InsertOutcome::Exhausted { attempts: 3, .. }));
        assert_eq!(calls.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn other_failure_is_returned_after_one_attempt() {
        let executor = ResilientInsertExecutor::new(3, GeometryUnionDefect::default());
        let calls = AtomicU32::new(0);

        let err = executor
            .execute(|| {
                calls.fetch_add(1, Ordering::SeqCst);
                async { Err(fatal()) }
            })
            .await
            .unwrap_err();

        assert_eq!(err.detail(), Some("column \"strahler\" does not exist"));
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn success_after_two_transient_failures() {
        let executor = ResilientInsertExecutor::new(3, GeometryUnionDefect::default());
        let calls = AtomicU32::new(0);

        let outcome = executor
            .execute(|| {
                let previous_calls = calls.fetch_add(1, Ordering::SeqCst);
                async move {
                    if previous_calls < 2 {
                        Err(transient())
                    } else {
                        Ok(4)
                    }
                }
            })
            .await
            .unwrap();

        assert!(matches!(
            outcome,
            InsertOutcome::Inserted {
                rows: 4,
                attempts: 3
            }
        ));
    }

    #[tokio::test]
    async fn closures_can_classify_errors() {
        let executor = ResilientInsertExecutor::new(2, |err: &RiversError| {
            err.kind() == ErrorKind::SourceConnectionFailed
        });
        let calls = AtomicU32::new(0);

        let outcome = executor
            .execute(|| {
                calls.fetch_add(1, Ordering::SeqCst);
                async { Err(rivers_error!(ErrorKind::SourceConnectionFailed, "Lost connection")) }
            })
            .await
            .unwrap();

        assert_eq!(outcome.attempts(), 2);
        assert_eq!(calls.load(Ordering::SeqCst), 2);
    }

    #[test]
    fn zero_attempt_bound_still_attempts_once() {
        let executor = ResilientInsertExecutor::new(0, GeometryUnionDefect::default());

        assert_eq!(executor.max_attempts(), 1);
    }
}
