//! Session status tracking.
//!
//! Derives a per-session idle/working/waiting signal for chrome coloring:
//! Idle → Working when the user submits a line, Working → Waiting after
//! `SILENCE_MS` without PTY output (the wrapped agent has stopped talking and
//! is presumably waiting on the user). Deadlines are polled by the
//! controller's event loop rather than armed as free-running timers, so the
//! whole tracker stays on one thread and tests drive it with explicit
//! instants.

use std::collections::HashMap;
use std::time::{Duration, Instant};

/// Silence window after which a Working session is considered Waiting.
pub const SILENCE_MS: u64 = 3000;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SessionStatus {
    #[default]
    Idle,
    Working,
    Waiting,
}

#[derive(Debug)]
struct StatusEntry {
    status: SessionStatus,
    silence_deadline: Option<Instant>,
}

#[derive(Debug, Default)]
pub struct StatusTracker {
    entries: HashMap<String, StatusEntry>,
}

impl StatusTracker {
    pub fn new() -> Self {
        Self::default()
    }

    /// Reconcile tracked entries with the current session set: missing ids
    /// are created Idle, removed ids are dropped.
    pub fn sync<'a>(&mut self, ids: impl Iterator<Item = &'a str>) {
        let live: Vec<String> = ids.map(str::to_string).collect();
        self.entries.retain(|id, _| live.iter().any(|l| l == id));
        for id in live {
            self.entries.entry(id).or_insert(StatusEntry {
                status: SessionStatus::Idle,
                silence_deadline: None,
            });
        }
    }

    pub fn status(&self, id: &str) -> SessionStatus {
        self.entries
            .get(id)
            .map(|e| e.status)
            .unwrap_or_default()
    }

    /// A submit was forwarded to this session. Returns true when the status
    /// visibly changed (chrome should recolor).
    pub fn note_submit(&mut self, id: &str, now: Instant) -> bool {
        let Some(entry) = self.entries.get_mut(id) else {
            return false;
        };
        entry.silence_deadline = Some(now + Duration::from_millis(SILENCE_MS));
        if entry.status != SessionStatus::Working {
            entry.status = SessionStatus::Working;
            return true;
        }
        false
    }

    /// PTY output arrived: push the silence deadline out.
    pub fn note_output(&mut self, id: &str, now: Instant) {
        if let Some(entry) = self.entries.get_mut(id) {
            if entry.silence_deadline.is_some() {
                entry.silence_deadline = Some(now + Duration::from_millis(SILENCE_MS));
            }
        }
    }

    /// Earliest pending silence deadline, for the event loop's timer arm.
    pub fn next_deadline(&self) -> Option<Instant> {
        self.entries
            .values()
            .filter_map(|e| e.silence_deadline)
            .min()
    }

    /// Fire due deadlines; returns ids whose status changed to Waiting.
    pub fn fire_due(&mut self, now: Instant) -> Vec<String> {
        let mut changed = Vec::new();
        for (id, entry) in &mut self.entries {
            let due = matches!(entry.silence_deadline, Some(d) if d <= now);
            if !due {
                continue;
            }
            entry.silence_deadline = None;
            if entry.status == SessionStatus::Working {
                entry.status = SessionStatus::Waiting;
                changed.push(id.clone());
            }
        }
        changed
    }
}
