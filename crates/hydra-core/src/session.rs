//! Session lifecycle manager.
//!
//! Owns the live (Emulator, PTY child, checkout path) triple per session, in
//! a map parallel to the store's metadata records so no I/O handle ever sits
//! inside state. PTY output is coalesced on an 8 ms deadline before it
//! reaches the emulator (bursts amortize VT parsing) while the raw bytes
//! take the unbatched hot path to the compositor.

use std::collections::HashMap;
use std::path::PathBuf;
use std::time::{Duration, Instant};

use anyhow::Result;
use chrono::Utc;
use tokio::sync::mpsc;
use tracing::{debug, info, warn};

use crate::checkout::CheckoutManager;
use crate::pty::{PtyChild, PtyEvent, PtyOptions};
use crate::store::Session;
use crate::term::Emulator;

/// Coalescing window for PTY → emulator batches.
pub const PTY_BATCH_MS: u64 = 8;

/// How the wrapped child is launched, resolved from configuration.
#[derive(Debug, Clone)]
pub struct SpawnSpec {
    pub command: String,
    pub args: Vec<String>,
    pub env: Vec<(String, String)>,
}

/// Coalescing output buffer: collect while pending, flush on deadline.
/// The deadline is re-armed on every chunk rather than ticking at a rate.
#[derive(Debug, Default)]
struct BatchBuffer {
    pending: Vec<u8>,
    deadline: Option<Instant>,
}

impl BatchBuffer {
    fn push(&mut self, chunk: &[u8], now: Instant) {
        self.pending.extend_from_slice(chunk);
        self.deadline = Some(now + Duration::from_millis(PTY_BATCH_MS));
    }

    fn deadline(&self) -> Option<Instant> {
        self.deadline
    }

    fn take_due(&mut self, now: Instant) -> Option<Vec<u8>> {
        match self.deadline {
            Some(d) if d <= now => {
                self.deadline = None;
                Some(std::mem::take(&mut self.pending))
            }
            _ => None,
        }
    }

    fn take_all(&mut self) -> Option<Vec<u8>> {
        self.deadline = None;
        if self.pending.is_empty() {
            None
        } else {
            Some(std::mem::take(&mut self.pending))
        }
    }
}

struct SessionRuntime {
    emulator: Emulator,
    pty: PtyChild,
    checkout_path: PathBuf,
    batch: BatchBuffer,
    exited: bool,
}

pub struct SessionManager {
    runtimes: HashMap<String, SessionRuntime>,
    checkouts: CheckoutManager,
    spawn: SpawnSpec,
    event_tx: mpsc::UnboundedSender<PtyEvent>,
    counter: u64,
}

impl SessionManager {
    pub fn new(
        checkouts: CheckoutManager,
        spawn: SpawnSpec,
        event_tx: mpsc::UnboundedSender<PtyEvent>,
    ) -> Self {
        Self {
            runtimes: HashMap::new(),
            checkouts,
            spawn,
            event_tx,
            counter: 0,
        }
    }

    /// Create a session for `branch`: checkout (unless re-attaching to an
    /// existing path), emulator, PTY child. Returns the store record.
    pub async fn create_session(
        &mut self,
        branch: &str,
        cols: u16,
        rows: u16,
        existing_path: Option<PathBuf>,
    ) -> Result<Session> {
        let checkout_path = match existing_path {
            Some(path) => path,
            None => self.checkouts.add(branch).await?,
        };

        let emulator = Emulator::new(cols, rows);

        self.counter += 1;
        let id = make_session_id(self.counter);

        let pty = PtyChild::spawn(
            &id,
            &PtyOptions {
                command: self.spawn.command.clone(),
                args: self.spawn.args.clone(),
                cwd: checkout_path.clone(),
                env: self.spawn.env.clone(),
                cols,
                rows,
            },
            self.event_tx.clone(),
        )?;

        info!(session_id = %id, branch = %branch, cwd = %checkout_path.display(), "Session created");

        self.runtimes.insert(
            id.clone(),
            SessionRuntime {
                emulator,
                pty,
                checkout_path: checkout_path.clone(),
                batch: BatchBuffer::default(),
                exited: false,
            },
        );

        Ok(Session {
            id,
            branch: branch.to_string(),
            checkout_path,
            exit_code: None,
        })
    }

    /// Re-attach a session to every checkout left on disk.
    pub async fn restore_existing_sessions(&mut self, cols: u16, rows: u16) -> Vec<Session> {
        let mut restored = Vec::new();
        for checkout in self.checkouts.list() {
            match self
                .create_session(&checkout.branch, cols, rows, Some(checkout.path.clone()))
                .await
            {
                Ok(session) => restored.push(session),
                Err(e) => {
                    warn!(branch = %checkout.branch, error = %e, "failed to restore session");
                }
            }
        }
        restored
    }

    pub async fn cleanup_orphans(&self) {
        self.checkouts.prune_orphans().await;
    }

    /// Queue a raw output chunk for the emulator, (re)arming the 8 ms flush.
    pub fn buffer_output(&mut self, id: &str, chunk: &[u8], now: Instant) {
        if let Some(runtime) = self.runtimes.get_mut(id) {
            runtime.batch.push(chunk, now);
        }
    }

    /// Earliest pending flush deadline across sessions.
    pub fn next_flush_deadline(&self) -> Option<Instant> {
        self.runtimes
            .values()
            .filter_map(|r| r.batch.deadline())
            .min()
    }

    /// Write every due batch into its emulator; returns the flushed ids.
    pub fn flush_due(&mut self, now: Instant) -> Vec<String> {
        let mut flushed = Vec::new();
        for (id, runtime) in &mut self.runtimes {
            if let Some(batch) = runtime.batch.take_due(now) {
                runtime.emulator.write(&batch);
                flushed.push(id.clone());
            }
        }
        flushed
    }

    /// Flush immediately regardless of deadline (used on exit events).
    pub fn flush_now(&mut self, id: &str) {
        if let Some(runtime) = self.runtimes.get_mut(id) {
            if let Some(batch) = runtime.batch.take_all() {
                runtime.emulator.write(&batch);
            }
        }
    }

    /// Forward input to a live session's PTY. Exited sessions drop input.
    pub fn write_input(&mut self, id: &str, bytes: &[u8]) -> Result<()> {
        if let Some(runtime) = self.runtimes.get_mut(id) {
            if !runtime.exited {
                runtime.pty.write(bytes)?;
            }
        }
        Ok(())
    }

    pub fn mark_exited(&mut self, id: &str) {
        if let Some(runtime) = self.runtimes.get_mut(id) {
            runtime.exited = true;
        }
    }

    /// Resize every live session: emulator first, then the PTY, so the child
    /// never writes for a grid larger than the emulator has.
    pub fn resize_all(&mut self, cols: u16, rows: u16) {
        for (id, runtime) in &mut self.runtimes {
            if runtime.exited {
                continue;
            }
            runtime.emulator.resize(cols, rows);
            if let Err(e) = runtime.pty.resize(cols, rows) {
                warn!(session_id = %id, error = %e, "PTY resize failed");
            }
        }
    }

    /// Kill the PTY, drop the runtime, and remove the checkout (best-effort:
    /// a failed removal is logged, the session is gone either way).
    pub async fn close_session(&mut self, id: &str) {
        let Some(mut runtime) = self.runtimes.remove(id) else {
            return;
        };
        runtime.pty.kill();
        if let Err(e) = self.checkouts.remove(&runtime.checkout_path).await {
            warn!(session_id = %id, error = %e, "checkout removal failed");
        }
        info!(session_id = %id, "Session closed");
    }

    pub fn emulator(&self, id: &str) -> Option<&Emulator> {
        self.runtimes.get(id).map(|r| &r.emulator)
    }

    /// Kill all PTYs. Checkouts are preserved for the next launch; pending
    /// batches are dropped intentionally since the children are going away.
    pub fn shutdown(&mut self) {
        debug!(sessions = self.runtimes.len(), "Killing all PTY children");
        for runtime in self.runtimes.values_mut() {
            runtime.pty.kill();
        }
        self.runtimes.clear();
    }
}

fn make_session_id(counter: u64) -> String {
    format!("session-{}-{}", counter, Utc::now().timestamp_millis())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_session_id_shape() {
        let id = make_session_id(7);
        let mut parts = id.splitn(3, '-');
        assert_eq!(parts.next(), Some("session"));
        assert_eq!(parts.next(), Some("7"));
        let epoch: i64 = parts.next().unwrap().parse().unwrap();
        assert!(epoch > 1_600_000_000_000);
    }

    #[test]
    fn test_batch_rearms_deadline_per_chunk() {
        let mut batch = BatchBuffer::default();
        let t0 = Instant::now();
        batch.push(b"ab", t0);
        let d0 = batch.deadline().unwrap();
        assert_eq!(d0, t0 + Duration::from_millis(PTY_BATCH_MS));

        let t1 = t0 + Duration::from_millis(5);
        batch.push(b"cd", t1);
        assert_eq!(batch.deadline().unwrap(), t1 + Duration::from_millis(PTY_BATCH_MS));
    }

    #[test]
    fn test_batch_flush_joins_in_order() {
        let mut batch = BatchBuffer::default();
        let t0 = Instant::now();
        batch.push(b"ab", t0);
        batch.push(b"cd", t0);

        assert!(batch.take_due(t0).is_none());
        let due = t0 + Duration::from_millis(PTY_BATCH_MS);
        assert_eq!(batch.take_due(due).unwrap(), b"abcd");
        assert!(batch.deadline().is_none());
        assert!(batch.take_due(due + Duration::from_millis(20)).is_none());
    }

    #[test]
    fn test_batch_take_all() {
        let mut batch = BatchBuffer::default();
        batch.push(b"xy", Instant::now());
        assert_eq!(batch.take_all().unwrap(), b"xy");
        assert!(batch.take_all().is_none());
    }
}
