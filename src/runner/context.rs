//! Accumulated context carried across iterations.
//!
//! Two parts: per-task result slots keyed by task id, kept in insertion
//! order and capped (oldest evicted first), and a small set of annotations
//! that are overwritten in place.

use std::collections::{BTreeMap, VecDeque};

use serde::Serialize;
use serde_json::{Map, Value};

/// Description of the most recent task that produced a result
pub const LAST_COMPLETED_TASK: &str = "lastCompletedTask";
/// Number of finished iterations
pub const ITERATION: &str = "iteration";
/// Goal of the previous iteration
pub const LAST_GOAL: &str = "lastGoal";

/// A key/value pair shown to the planner as a hint
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ContextEntry {
    pub key: String,
    pub value: String,
}

#[derive(Debug, Clone)]
pub struct AccumulatedContext {
    results: VecDeque<(String, String)>,
    annotations: BTreeMap<String, String>,
    max_entries: usize,
    evicted: u64,
}

impl AccumulatedContext {
    pub fn new(max_entries: usize) -> Self {
        Self {
            results: VecDeque::new(),
            annotations: BTreeMap::new(),
            max_entries: max_entries.max(1),
            evicted: 0,
        }
    }

    /// Store a task's result, evicting the oldest slot when full
    pub fn record_result(&mut self, task_id: &str, result: &str) {
        if let Some(slot) = self.results.iter_mut().find(|(id, _)| id == task_id) {
            slot.1 = result.to_string();
            return;
        }
        while self.results.len() >= self.max_entries {
            self.results.pop_front();
            self.evicted += 1;
        }
        self.results.push_back((task_id.to_string(), result.to_string()));
    }

    pub fn annotate(&mut self, key: &str, value: impl Into<String>) {
        self.annotations.insert(key.to_string(), value.into());
    }

    pub fn annotation(&self, key: &str) -> Option<&str> {
        self.annotations.get(key).map(String::as_str)
    }

    pub fn result_for(&self, task_id: &str) -> Option<&str> {
        self.results
            .iter()
            .find(|(id, _)| id == task_id)
            .map(|(_, r)| r.as_str())
    }

    /// Number of result slots currently held
    pub fn len(&self) -> usize {
        self.results.len()
    }

    pub fn is_empty(&self) -> bool {
        self.results.is_empty() && self.annotations.is_empty()
    }

    /// Result slots dropped so far
    pub fn evicted(&self) -> u64 {
        self.evicted
    }

    pub fn max_entries(&self) -> usize {
        self.max_entries
    }

    /// Annotations as planner hints
    pub fn hints(&self) -> Vec<ContextEntry> {
        self.annotations
            .iter()
            .map(|(k, v)| ContextEntry {
                key: k.clone(),
                value: v.clone(),
            })
            .collect()
    }

    /// Flat JSON object: annotations plus one key per task result
    pub fn to_json(&self) -> Value {
        let mut map = Map::new();
        for (k, v) in &self.annotations {
            map.insert(k.clone(), Value::String(v.clone()));
        }
        for (id, result) in &self.results {
            map.insert(id.clone(), Value::String(result.clone()));
        }
        Value::Object(map)
    }

    /// Pretty JSON for prompts
    pub fn render(&self) -> String {
        serde_json::to_string_pretty(&self.to_json()).unwrap_or_else(|_| "{}".to_string())
    }
}
