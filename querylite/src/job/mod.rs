// Copyright (c) 2024-2025 DeepGraph Inc.
// SPDX-License-Identifier: Apache-2.0
//
//! Query jobs tracked from submission to settlement
//!
//! A [`QueryJob`] carries the SQL text, its positional parameters and the
//! [`Deferred`] handed to the submitter. The executor thread owns the job
//! while it is queued or running and records the outcome on it; the engine
//! settles the deferred when it drains the finished job on its own thread.

mod kind;
mod params;
mod template;

pub use kind::{leading_keyword, placeholder_count, QueryKind};
pub use params::{ParamValue, Params};
pub use template::QueryTemplate;

use std::sync::Arc;
use std::time::{Duration, Instant};

use crate::deferred::Deferred;
use crate::error::{QueryError, SettleError};
use crate::result::ResultSet;

/// Deferred handed out for every submitted query
pub type DeferredResultSet = Deferred<ResultSet, QueryError>;

/// One query, its parameters and, once executed, its outcome
pub struct QueryJob {
    id: u64,
    sql: Arc<str>,
    params: Params,
    kind: QueryKind,
    timeout: Option<Duration>,
    deferred: DeferredResultSet,
    outcome: Option<Result<ResultSet, QueryError>>,
    attempts: u32,
    created_at: Instant,
}

impl QueryJob {
    pub fn new(sql: impl Into<Arc<str>>, params: Params) -> Self {
        let sql = sql.into();
        let kind = QueryKind::classify(&sql);
        Self::with_kind(sql, params, kind)
    }

    /// Build a job whose classification is already known
    pub(crate) fn with_kind(sql: Arc<str>, params: Params, kind: QueryKind) -> Self {
        Self {
            id: 0,
            sql,
            params,
            kind,
            timeout: None,
            deferred: Deferred::new(),
            outcome: None,
            attempts: 0,
            created_at: Instant::now(),
        }
    }

    /// Override the engine-wide execution ceiling for this job
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }

    /// Sequence number assigned by the executor on enqueue; 0 before that
    pub fn id(&self) -> u64 {
        self.id
    }

    pub(crate) fn assign_id(&mut self, id: u64) {
        self.id = id;
    }

    pub fn sql(&self) -> &str {
        &self.sql
    }

    pub fn params(&self) -> &Params {
        &self.params
    }

    pub fn kind(&self) -> QueryKind {
        self.kind
    }

    pub fn timeout(&self) -> Option<Duration> {
        self.timeout
    }

    /// Handle to the job's deferred result
    pub fn deferred(&self) -> DeferredResultSet {
        self.deferred.clone()
    }

    /// Execution attempts so far, including requeued ones
    pub fn attempts(&self) -> u32 {
        self.attempts
    }

    pub(crate) fn record_attempt(&mut self) {
        self.attempts += 1;
    }

    pub fn age(&self) -> Duration {
        self.created_at.elapsed()
    }

    pub fn outcome(&self) -> Option<&Result<ResultSet, QueryError>> {
        self.outcome.as_ref()
    }

    pub fn is_finished(&self) -> bool {
        self.outcome.is_some()
    }

    pub fn complete(&mut self, result: ResultSet) {
        self.outcome = Some(Ok(result));
    }

    pub fn fail(&mut self, error: QueryError) {
        self.outcome = Some(Err(error));
    }

    /// Settle the deferred with the recorded outcome, consuming the job
    ///
    /// Handlers run on the calling thread.
    pub fn settle(self) -> Result<(), SettleError> {
        match self.outcome {
            Some(Ok(result)) => self.deferred.resolve(result),
            Some(Err(error)) => self.deferred.reject(error),
            None => self.deferred.reject(QueryError::Execution(
                "job finished without an outcome".to_string(),
            )),
        }
    }
}

impl std::fmt::Debug for QueryJob {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("QueryJob")
            .field("id", &self.id)
            .field("sql", &self.sql)
            .field("params", &self.params.len())
            .field("kind", &self.kind)
            .field("attempts", &self.attempts)
            .field("finished", &self.is_finished())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::deferred::DeferredState;

    #[test]
    fn test_new_job_is_unassigned() {
        let job = QueryJob::new("SELECT 1", Params::new());
        assert_eq!(job.id(), 0);
        assert_eq!(job.kind(), QueryKind::Read);
        assert_eq!(job.attempts(), 0);
    }

    #[test]
    fn test_settle_resolves_deferred() {
        let mut job = QueryJob::new("DELETE FROM t", Params::new());
        let deferred = job.deferred();
        job.complete(ResultSet::with_changes(3, None));
        job.settle().unwrap();

        assert_eq!(deferred.state(), DeferredState::Fulfilled);
        assert_eq!(deferred.outcome().unwrap().unwrap().affected_rows, 3);
    }

    #[test]
    fn test_settle_rejects_deferred() {
        let mut job = QueryJob::new("SELEC 1", Params::new());
        let deferred = job.deferred();
        job.fail(QueryError::Execution("syntax error".into()));
        job.settle().unwrap();

        assert_eq!(
            *deferred.outcome().unwrap().unwrap_err(),
            QueryError::Execution("syntax error".into())
        );
    }

    #[test]
    fn test_per_job_timeout() {
        let job = QueryJob::new("SELECT 1", Params::new()).with_timeout(Duration::from_secs(2));
        assert_eq!(job.timeout(), Some(Duration::from_secs(2)));
    }
}
