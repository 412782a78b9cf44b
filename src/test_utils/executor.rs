//! A [`PhaseExecutor`] that records instead of running anything.

use anyhow::{Result, bail};
use std::collections::{HashMap, HashSet};
use std::sync::Mutex;
use std::time::Duration;

use crate::installer::PhaseExecutor;
use crate::resolver::{BuildTask, Phase};

/// One recorded phase boundary.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Event {
    Start(String, Phase),
    End(String, Phase),
}

#[derive(Debug, Default)]
struct Recording {
    events: Vec<Event>,
    active: usize,
    max_active: usize,
}

/// Records the order of phase starts and ends across tasks.
///
/// Delays simulate long builds so overlapping tasks can be observed;
/// failures are injected per dependency and phase.
#[derive(Debug, Default)]
pub struct RecordingExecutor {
    recording: Mutex<Recording>,
    delays: HashMap<String, Duration>,
    failures: HashSet<(String, Phase)>,
}

impl RecordingExecutor {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Sleep for `delay` in every phase of `name`
    #[must_use]
    pub fn with_delay(mut self, name: &str, delay: Duration) -> Self {
        self.delays.insert(name.to_string(), delay);
        self
    }

    /// Fail `phase` of `name`
    #[must_use]
    pub fn fail_on(mut self, name: &str, phase: Phase) -> Self {
        self.failures.insert((name.to_string(), phase));
        self
    }

    pub fn events(&self) -> Vec<Event> {
        self.lock().events.clone()
    }

    /// Index of `event` in the recording
    pub fn position(&self, event: &Event) -> Option<usize> {
        self.lock().events.iter().position(|e| e == event)
    }

    /// Phases of `name` that started, in order
    pub fn phases_run(&self, name: &str) -> Vec<Phase> {
        self.lock()
            .events
            .iter()
            .filter_map(|e| match e {
                Event::Start(n, phase) if n == name => Some(*phase),
                _ => None,
            })
            .collect()
    }

    /// Highest number of phases that were in flight at once
    pub fn max_concurrency(&self) -> usize {
        self.lock().max_active
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, Recording> {
        self.recording.lock().unwrap_or_else(std::sync::PoisonError::into_inner)
    }
}

impl PhaseExecutor for RecordingExecutor {
    async fn run_phase(&self, task: &BuildTask, phase: Phase) -> Result<()> {
        {
            let mut recording = self.lock();
            recording.events.push(Event::Start(task.name.clone(), phase));
            recording.active += 1;
            recording.max_active = recording.max_active.max(recording.active);
        }

        if let Some(delay) = self.delays.get(&task.name) {
            tokio::time::sleep(*delay).await;
        } else {
            tokio::task::yield_now().await;
        }

        let fail = self.failures.contains(&(task.name.clone(), phase));
        {
            let mut recording = self.lock();
            recording.active -= 1;
            recording.events.push(Event::End(task.name.clone(), phase));
        }
        if fail {
            bail!("injected {phase} failure for {}", task.name);
        }
        Ok(())
    }
}
