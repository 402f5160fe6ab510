// SPDX-FileCopyrightText: 2026 Holdfast Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Operation handler with scripted outcomes.

use std::collections::VecDeque;
use std::sync::{Arc, Mutex, PoisonError};

use async_trait::async_trait;
use holdfast_core::{ExecutionError, Operation, OperationId};
use holdfast_queue::OperationHandler;

type Outcome = Result<(), ExecutionError>;

#[derive(Default)]
struct State {
    script: VecDeque<Outcome>,
    fallback: Option<ExecutionError>,
    executed: Vec<Operation>,
}

/// Handler that pops outcomes from a script and records what it ran.
///
/// With the script empty it returns the fallback: success unless
/// [`always_fail`](Self::always_fail) set an error.
#[derive(Clone, Default)]
pub struct ScriptedHandler {
    state: Arc<Mutex<State>>,
}

impl ScriptedHandler {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_script(script: Vec<Outcome>) -> Self {
        let handler = Self::new();
        handler.lock().script = VecDeque::from(script);
        handler
    }

    /// A handler that fails every call with `error`.
    pub fn always_fail(error: ExecutionError) -> Self {
        let handler = Self::new();
        handler.lock().fallback = Some(error);
        handler
    }

    pub fn push(&self, outcome: Outcome) {
        self.lock().script.push_back(outcome);
    }

    /// Operations executed so far, in call order, as they were when run.
    pub fn executed(&self) -> Vec<Operation> {
        self.lock().executed.clone()
    }

    pub fn executed_ids(&self) -> Vec<OperationId> {
        self.lock().executed.iter().map(|op| op.id.clone()).collect()
    }

    pub fn call_count(&self) -> usize {
        self.lock().executed.len()
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, State> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

#[async_trait]
impl OperationHandler for ScriptedHandler {
    async fn execute(&self, operation: &Operation) -> Result<(), ExecutionError> {
        let mut state = self.lock();
        state.executed.push(operation.clone());
        match state.script.pop_front() {
            Some(outcome) => outcome,
            None => match &state.fallback {
                Some(error) => Err(error.clone()),
                None => Ok(()),
            },
        }
    }
}
