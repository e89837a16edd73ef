// tests/common/mod.rs
// Shared mocks for integration tests.
#![allow(dead_code)]

use anyhow::Result;
use async_trait::async_trait;
use std::collections::HashSet;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use wildfire_watch::{Incident, IncidentSource, Notifier};

pub fn incident(id: &str, source: &str) -> Incident {
    Incident {
        id: id.to_string(),
        title: format!("{id} title"),
        link: "https://example.test/".to_string(),
        source: source.to_string(),
        published_at: None,
        details: None,
    }
}

/// Source that returns a fixed script, one batch per call (last batch repeats).
pub struct ScriptedSource {
    pub name: &'static str,
    pub batches: Vec<Vec<Incident>>,
    pub calls: AtomicUsize,
}

impl ScriptedSource {
    pub fn new(name: &'static str, batches: Vec<Vec<Incident>>) -> Self {
        Self {
            name,
            batches,
            calls: AtomicUsize::new(0),
        }
    }

    pub fn constant(name: &'static str, batch: Vec<Incident>) -> Self {
        Self::new(name, vec![batch])
    }
}

#[async_trait]
impl IncidentSource for ScriptedSource {
    async fn fetch_latest(&self) -> Result<Vec<Incident>> {
        let n = self.calls.fetch_add(1, Ordering::SeqCst);
        let idx = n.min(self.batches.len().saturating_sub(1));
        Ok(self.batches.get(idx).cloned().unwrap_or_default())
    }
    fn name(&self) -> &str {
        self.name
    }
}

pub struct FailingSource;

#[async_trait]
impl IncidentSource for FailingSource {
    async fn fetch_latest(&self) -> Result<Vec<Incident>> {
        anyhow::bail!("upstream timed out")
    }
    fn name(&self) -> &str {
        "Failing"
    }
}

/// Records delivered ids; ids in `fail_ids` fail while `failures_left` > 0.
#[derive(Default)]
pub struct RecordingNotifier {
    pub delivered: Mutex<Vec<String>>,
    pub attempts: Mutex<Vec<String>>,
    pub fail_ids: Mutex<HashSet<String>>,
}

impl RecordingNotifier {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn failing_for(ids: &[&str]) -> Arc<Self> {
        let n = Self::default();
        *n.fail_ids.lock().unwrap() = ids.iter().map(|s| s.to_string()).collect();
        Arc::new(n)
    }

    pub fn heal(&self) {
        self.fail_ids.lock().unwrap().clear();
    }

    pub fn delivered(&self) -> Vec<String> {
        self.delivered.lock().unwrap().clone()
    }

    pub fn attempts(&self) -> Vec<String> {
        self.attempts.lock().unwrap().clone()
    }
}

#[async_trait]
impl Notifier for RecordingNotifier {
    async fn deliver(&self, incident: &Incident) -> Result<()> {
        self.attempts.lock().unwrap().push(incident.id.clone());
        if self.fail_ids.lock().unwrap().contains(&incident.id) {
            anyhow::bail!("discord 503");
        }
        self.delivered.lock().unwrap().push(incident.id.clone());
        Ok(())
    }
    fn name(&self) -> &'static str {
        "recording"
    }
}
