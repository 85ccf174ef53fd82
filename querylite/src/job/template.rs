// Copyright (c) 2024-2025 DeepGraph Inc.
// SPDX-License-Identifier: Apache-2.0
//
//! Reusable query templates
//!
//! A feature component builds its templates once and keeps them alongside
//! its other state; there is no process-wide statement registry.

use std::sync::Arc;

use super::kind::{placeholder_count, QueryKind};
use super::params::Params;
use super::{DeferredResultSet, QueryJob};
use crate::deferred::Deferred;
use crate::engine::Engine;
use crate::error::QueryError;

/// SQL text classified and checked once, submitted many times
#[derive(Debug, Clone)]
pub struct QueryTemplate {
    sql: Arc<str>,
    kind: QueryKind,
    placeholders: usize,
}

impl QueryTemplate {
    pub fn new(sql: impl Into<Arc<str>>) -> Self {
        let sql = sql.into();
        Self {
            kind: QueryKind::classify(&sql),
            placeholders: placeholder_count(&sql),
            sql,
        }
    }

    pub fn sql(&self) -> &str {
        &self.sql
    }

    pub fn kind(&self) -> QueryKind {
        self.kind
    }

    pub fn placeholders(&self) -> usize {
        self.placeholders
    }

    /// Check that `params` covers exactly the template's placeholders
    pub fn check(&self, params: &Params) -> Result<(), QueryError> {
        params.validate()?;
        if params.len() != self.placeholders || params.max_position() > self.placeholders {
            return Err(QueryError::InvalidParameter(format!(
                "expected {} parameter(s) at positions 1..={}, got {}",
                self.placeholders,
                self.placeholders,
                params.len()
            )));
        }
        Ok(())
    }

    /// Build a job for this template without submitting it
    pub fn job(&self, params: Params) -> Result<QueryJob, QueryError> {
        self.check(&params)?;
        Ok(QueryJob::with_kind(Arc::clone(&self.sql), params, self.kind))
    }

    /// Submit through `engine`; mismatched parameters reject immediately
    pub fn submit(&self, engine: &Engine, params: Params) -> DeferredResultSet {
        match self.job(params) {
            Ok(job) => engine.submit_job(job),
            Err(error) => {
                log::debug!("Template parameters rejected for '{}': {}", self.sql, error);
                Deferred::rejected(error)
            }
        }
    }
}
