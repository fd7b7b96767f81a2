//! Input router.
//!
//! Raw-mode stdin feeds byte chunks into the event loop; the router turns
//! them into commands. A tmux-style prefix key (CTRL_B) opens a 500 ms window
//! in which the next chunk is interpreted as a multiplexer command instead of
//! being forwarded; on timeout a single literal CTRL_B goes to the active
//! PTY so the byte is still reachable. Modal modes take priority and receive
//! chunks verbatim.
//!
//! A lone ESC keystroke may arrive bundled with the following keystroke in
//! one chunk, so modal cancel tests "chunk begins with ESC", never equality.

use std::io::Read;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

use anyhow::{Context, Result};
use crossterm::terminal::{disable_raw_mode, enable_raw_mode};
use tokio::sync::mpsc;
use tracing::debug;

use hydra_core::Mode;

/// The prefix byte: CTRL_B.
pub const PREFIX_KEY: u8 = 0x02;
/// How long the prefix window stays open.
pub const PREFIX_TIMEOUT_MS: u64 = 500;
/// Lines per scroll command.
pub const SCROLL_STEP: usize = 5;

/// What a stdin chunk resolved to.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RouterAction {
    Quit,
    BeginCreate,
    BeginClose,
    NextTab,
    PrevTab,
    JumpTab(usize),
    ScrollUp(usize),
    ScrollDown(usize),
    /// Pass-through to the active PTY.
    Forward(Vec<u8>),
    /// Deliver to the current modal's input handler.
    ModalChunk(Vec<u8>),
    Ignored,
}

#[derive(Debug, Default)]
pub struct InputRouter {
    prefix_deadline: Option<Instant>,
}

impl InputRouter {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn prefix_deadline(&self) -> Option<Instant> {
        self.prefix_deadline
    }

    /// The prefix window expired: returns true exactly once, and the caller
    /// forwards one literal CTRL_B to the active PTY.
    pub fn take_timeout(&mut self, now: Instant) -> bool {
        match self.prefix_deadline {
            Some(deadline) if deadline <= now => {
                self.prefix_deadline = None;
                true
            }
            _ => false,
        }
    }

    /// Clear any pending prefix window (shutdown path).
    pub fn reset(&mut self) {
        self.prefix_deadline = None;
    }

    pub fn route(&mut self, chunk: &[u8], mode: Mode, now: Instant) -> RouterAction {
        if chunk.is_empty() {
            return RouterAction::Ignored;
        }

        // Modal dispatch has priority; modal handlers own ESC/Enter/edit keys.
        if mode != Mode::Normal {
            self.prefix_deadline = None;
            return RouterAction::ModalChunk(chunk.to_vec());
        }

        if self.prefix_deadline.is_some() {
            self.prefix_deadline = None;
            return command_for(chunk);
        }

        if chunk[0] == PREFIX_KEY {
            if chunk.len() > 1 {
                // Command keystroke arrived bundled with the prefix.
                return command_for(&chunk[1..]);
            }
            self.prefix_deadline = Some(now + Duration::from_millis(PREFIX_TIMEOUT_MS));
            return RouterAction::Ignored;
        }

        RouterAction::Forward(chunk.to_vec())
    }
}

/// Interpret one chunk inside the prefix window. Unknown keys are dropped.
fn command_for(chunk: &[u8]) -> RouterAction {
    match chunk {
        b"\x1b[A" => return RouterAction::ScrollUp(SCROLL_STEP),
        b"\x1b[B" => return RouterAction::ScrollDown(SCROLL_STEP),
        _ => {}
    }
    match chunk[0] {
        b'q' | b'Q' => RouterAction::Quit,
        b'n' | b'N' => RouterAction::BeginCreate,
        b'w' | b'W' => RouterAction::BeginClose,
        b']' => RouterAction::NextTab,
        b'[' => RouterAction::PrevTab,
        b'1'..=b'9' => RouterAction::JumpTab((chunk[0] - b'1') as usize),
        b'A' => RouterAction::ScrollUp(SCROLL_STEP),
        b'B' => RouterAction::ScrollDown(SCROLL_STEP),
        _ => RouterAction::Ignored,
    }
}

/// Raw-mode stdin: a blocking reader task sends chunks to the event loop.
pub struct StdinReader {
    running: Arc<AtomicBool>,
}

impl StdinReader {
    pub fn start(tx: mpsc::UnboundedSender<Vec<u8>>) -> Result<Self> {
        enable_raw_mode().context("failed to enable raw mode")?;

        let running = Arc::new(AtomicBool::new(true));
        let running_reader = Arc::clone(&running);
        tokio::task::spawn_blocking(move || {
            let mut stdin = std::io::stdin().lock();
            let mut buf = [0u8; 1024];
            while running_reader.load(Ordering::SeqCst) {
                match stdin.read(&mut buf) {
                    Ok(0) => break,
                    Ok(n) => {
                        if tx.send(buf[..n].to_vec()).is_err() {
                            break;
                        }
                    }
                    Err(e) => {
                        debug!(error = %e, "stdin read ended");
                        break;
                    }
                }
            }
        });

        Ok(Self { running })
    }

    /// Unset raw mode and let the reader task wind down.
    pub fn stop(&self) {
        self.running.store(false, Ordering::SeqCst);
        let _ = disable_raw_mode();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn route(router: &mut InputRouter, chunk: &[u8]) -> RouterAction {
        router.route(chunk, Mode::Normal, Instant::now())
    }

    #[test]
    fn test_plain_chunk_forwards() {
        let mut r = InputRouter::new();
        assert_eq!(route(&mut r, b"hello"), RouterAction::Forward(b"hello".to_vec()));
        assert_eq!(route(&mut r, b"\r"), RouterAction::Forward(b"\r".to_vec()));
    }

    #[test]
    fn test_prefix_opens_window() {
        let mut r = InputRouter::new();
        let now = Instant::now();
        assert_eq!(r.route(&[PREFIX_KEY], Mode::Normal, now), RouterAction::Ignored);
        assert_eq!(
            r.prefix_deadline(),
            Some(now + Duration::from_millis(PREFIX_TIMEOUT_MS))
        );
    }

    #[test]
    fn test_prefix_then_command() {
        let mut r = InputRouter::new();
        route(&mut r, &[PREFIX_KEY]);
        assert_eq!(route(&mut r, b"n"), RouterAction::BeginCreate);
        // Window consumed: the next chunk forwards again.
        assert!(r.prefix_deadline().is_none());
        assert_eq!(route(&mut r, b"n"), RouterAction::Forward(b"n".to_vec()));
    }

    #[test]
    fn test_prefix_timeout_forwards_exactly_one_ctrl_b() {
        // CTRL_B with nothing after it within the window → one literal 0x02
        // to the PTY, and the machine is back to pass-through.
        let mut r = InputRouter::new();
        let now = Instant::now();
        r.route(&[PREFIX_KEY], Mode::Normal, now);

        let before = now + Duration::from_millis(PREFIX_TIMEOUT_MS - 1);
        assert!(!r.take_timeout(before));

        let due = now + Duration::from_millis(PREFIX_TIMEOUT_MS);
        assert!(r.take_timeout(due));
        assert!(!r.take_timeout(due));
        assert!(r.prefix_deadline().is_none());
    }

    #[test]
    fn test_command_consumed_cancels_timer() {
        let mut r = InputRouter::new();
        let now = Instant::now();
        r.route(&[PREFIX_KEY], Mode::Normal, now);
        r.route(b"]", Mode::Normal, now);
        assert!(!r.take_timeout(now + Duration::from_millis(PREFIX_TIMEOUT_MS)));
    }

    #[test]
    fn test_bundled_prefix_and_command() {
        let mut r = InputRouter::new();
        assert_eq!(route(&mut r, &[PREFIX_KEY, b'q']), RouterAction::Quit);
        assert!(r.prefix_deadline().is_none());
    }

    #[test]
    fn test_all_commands() {
        let mut r = InputRouter::new();
        for (chunk, expected) in [
            (&b"q"[..], RouterAction::Quit),
            (b"Q", RouterAction::Quit),
            (b"n", RouterAction::BeginCreate),
            (b"w", RouterAction::BeginClose),
            (b"]", RouterAction::NextTab),
            (b"[", RouterAction::PrevTab),
            (b"1", RouterAction::JumpTab(0)),
            (b"9", RouterAction::JumpTab(8)),
            (b"\x1b[A", RouterAction::ScrollUp(SCROLL_STEP)),
            (b"\x1b[B", RouterAction::ScrollDown(SCROLL_STEP)),
            (b"A", RouterAction::ScrollUp(SCROLL_STEP)),
            (b"B", RouterAction::ScrollDown(SCROLL_STEP)),
        ] {
            route(&mut r, &[PREFIX_KEY]);
            assert_eq!(route(&mut r, chunk), expected, "chunk {chunk:?}");
        }
    }

    #[test]
    fn test_unknown_command_dropped() {
        let mut r = InputRouter::new();
        route(&mut r, &[PREFIX_KEY]);
        assert_eq!(route(&mut r, b"x"), RouterAction::Ignored);
        // Not forwarded either: the chunk was consumed by the window.
        assert_eq!(route(&mut r, b"x"), RouterAction::Forward(b"x".to_vec()));
    }

    #[test]
    fn test_modal_mode_takes_priority() {
        let mut r = InputRouter::new();
        let action = r.route(b"abc", Mode::CreatingSession, Instant::now());
        assert_eq!(action, RouterAction::ModalChunk(b"abc".to_vec()));

        // Even the prefix byte goes to the modal.
        let action = r.route(&[PREFIX_KEY], Mode::ConfirmingClose, Instant::now());
        assert_eq!(action, RouterAction::ModalChunk(vec![PREFIX_KEY]));
    }

    #[test]
    fn test_empty_chunk_ignored() {
        let mut r = InputRouter::new();
        assert_eq!(route(&mut r, b""), RouterAction::Ignored);
    }
}
