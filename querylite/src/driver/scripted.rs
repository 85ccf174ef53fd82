// Copyright (c) 2024-2025 DeepGraph Inc.
// SPDX-License-Identifier: Apache-2.0
//
//! Scripted connector for exercising the executor without a database
//!
//! Responses are consumed in order by whichever connection executes next;
//! with nothing scripted a statement succeeds with an empty mutation result.

use parking_lot::Mutex;
use std::collections::VecDeque;
use std::sync::Arc;
use std::time::{Duration, Instant};

use super::{Connection, Connector, DriverError, DriverResult};
use crate::config::ConnectionConfig;
use crate::job::Params;
use crate::result::ResultSet;

/// A scripted statement outcome
#[derive(Debug, Clone)]
pub enum Response {
    Succeed(ResultSet),
    Fail(DriverError),
    /// Sleep, then succeed with an empty result
    Delay(Duration),
}

#[derive(Default)]
struct Script {
    connect_failures: usize,
    responses: VecDeque<Response>,
    executed: Vec<String>,
    connects: usize,
    closes: usize,
    attempts: Vec<Instant>,
}

/// Shared handle: clones observe and drive the same script
#[derive(Clone, Default)]
pub struct ScriptedConnector {
    script: Arc<Mutex<Script>>,
}

impl ScriptedConnector {
    pub fn new() -> Self {
        Self::default()
    }

    /// Make the next `count` connection attempts fail
    pub fn fail_connects(&self, count: usize) {
        self.script.lock().connect_failures = count;
    }

    pub fn push_response(&self, response: Response) {
        self.script.lock().responses.push_back(response);
    }

    /// SQL text of every statement handed to a connection, in order
    pub fn executed(&self) -> Vec<String> {
        self.script.lock().executed.clone()
    }

    /// Successful connection attempts
    pub fn connects(&self) -> usize {
        self.script.lock().connects
    }

    pub fn closes(&self) -> usize {
        self.script.lock().closes
    }

    /// When each connection attempt was made, failed ones included
    pub fn connect_attempts(&self) -> Vec<Instant> {
        self.script.lock().attempts.clone()
    }
}

impl Connector for ScriptedConnector {
    fn connect(&self, _config: &ConnectionConfig) -> DriverResult<Box<dyn Connection>> {
        let mut script = self.script.lock();
        script.attempts.push(Instant::now());
        if script.connect_failures > 0 {
            script.connect_failures -= 1;
            return Err(DriverError::Connect("scripted connect failure".to_string()));
        }
        script.connects += 1;
        Ok(Box::new(ScriptedConnection {
            script: Arc::clone(&self.script),
        }))
    }

    fn name(&self) -> &'static str {
        "scripted"
    }
}

struct ScriptedConnection {
    script: Arc<Mutex<Script>>,
}

impl Connection for ScriptedConnection {
    fn execute(&mut self, sql: &str, _params: &Params, _timeout: Duration) -> DriverResult<ResultSet> {
        let response = {
            let mut script = self.script.lock();
            script.executed.push(sql.to_string());
            script.responses.pop_front()
        };
        match response {
            None => Ok(ResultSet::with_changes(0, None)),
            Some(Response::Succeed(result)) => Ok(result),
            Some(Response::Fail(error)) => Err(error),
            Some(Response::Delay(delay)) => {
                std::thread::sleep(delay);
                Ok(ResultSet::with_changes(0, None))
            }
        }
    }

    fn close(self: Box<Self>) -> DriverResult<()> {
        self.script.lock().closes += 1;
        Ok(())
    }
}
