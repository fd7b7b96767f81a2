//! App controller.
//!
//! Wires the store, session manager, status tracker, compositor and input
//! router into one event loop: a single task selects over PTY events, stdin
//! chunks, signals and the earliest coalesced timer deadline (8 ms PTY batch,
//! 500 ms prefix window, 3 s silence). Every piece of mutable state is
//! touched from this loop only, so ordering between a dispatch and the render
//! it triggers is plain program order.
//!
//! Signals set the quit flag; the real shutdown runs in the loop and is
//! guarded so repeated signals cannot run it twice.

use std::time::Instant;

use anyhow::Result;
use tokio::signal::unix::{signal, SignalKind};
use tokio::sync::mpsc;
use tracing::{info, warn};

use hydra_core::store::AppState;
use hydra_core::{Action, Mode, PtyEvent, SessionManager, StatusTracker, Store};

use crate::chrome;
use crate::compositor::{Compositor, ViewportGeometry};
use crate::input::{InputRouter, RouterAction, StdinReader, PREFIX_KEY};

pub struct App {
    store: Store,
    sessions: SessionManager,
    statuses: StatusTracker,
    compositor: Compositor<std::io::Stdout>,
    router: InputRouter,
    stdin: StdinReader,
    pty_rx: mpsc::UnboundedReceiver<PtyEvent>,
    stdin_rx: mpsc::UnboundedReceiver<Vec<u8>>,
    geometry: ViewportGeometry,

    create_buffer: String,
    error: Option<String>,
    last_rendered_session_id: Option<String>,
    last_mode: Mode,
    last_scroll_offset: usize,
    quit: bool,
    cleaning: bool,
}

impl App {
    pub fn new(
        sessions: SessionManager,
        compositor: Compositor<std::io::Stdout>,
        stdin: StdinReader,
        pty_rx: mpsc::UnboundedReceiver<PtyEvent>,
        stdin_rx: mpsc::UnboundedReceiver<Vec<u8>>,
        geometry: ViewportGeometry,
    ) -> Self {
        Self {
            store: Store::new(),
            sessions,
            statuses: StatusTracker::new(),
            compositor,
            router: InputRouter::new(),
            stdin,
            pty_rx,
            stdin_rx,
            geometry,
            create_buffer: String::new(),
            error: None,
            last_rendered_session_id: None,
            last_mode: Mode::Normal,
            last_scroll_offset: 0,
            quit: false,
            cleaning: false,
        }
    }

    pub async fn run(&mut self) -> Result<()> {
        let mut sigint = signal(SignalKind::interrupt())?;
        let mut sigterm = signal(SignalKind::terminate())?;
        let mut sighup = signal(SignalKind::hangup())?;
        let mut sigwinch = signal(SignalKind::window_change())?;

        // Reconcile the checkout base with reality, then re-attach a session
        // to every surviving checkout. All of this happens on the loop thread
        // before the first event, so restore always precedes the first render
        // driven by input or PTY output.
        self.sessions.cleanup_orphans().await;
        let restored = self
            .sessions
            .restore_existing_sessions(self.geometry.total_cols, self.geometry.inner_rows)
            .await;
        for session in restored {
            self.dispatch(Action::AddSession(session));
        }
        if self.store.state().sessions.is_empty() {
            self.compositor.repaint_placeholder();
            let state = self.store.state().clone();
            self.draw_chrome_for(&state);
        }

        while !self.quit {
            let deadline = self.next_deadline();
            tokio::select! {
                Some(event) = self.pty_rx.recv() => self.on_pty_event(event),
                Some(chunk) = self.stdin_rx.recv() => self.on_stdin(chunk).await,
                _ = sigwinch.recv() => self.on_resize(),
                _ = sigint.recv() => self.quit = true,
                _ = sigterm.recv() => self.quit = true,
                _ = sighup.recv() => self.quit = true,
                _ = sleep_until_opt(deadline) => self.on_timer(Instant::now()),
            }
        }

        self.shutdown();
        Ok(())
    }

    // ========== Event handlers ==========

    fn on_pty_event(&mut self, event: PtyEvent) {
        match event {
            PtyEvent::Data { session_id, chunk } => {
                let now = Instant::now();
                self.statuses.note_output(&session_id, now);
                // Hot path: the active session's bytes go straight to the
                // host terminal. While scrolled back the viewport shows
                // history, so the stream is withheld until offset 0.
                let state = self.store.state();
                if state.active_session_id.as_deref() == Some(session_id.as_str())
                    && state.scroll_offset == 0
                {
                    self.compositor.write_passthrough(&chunk);
                }
                self.sessions.buffer_output(&session_id, &chunk, now);
            }
            PtyEvent::Exited { session_id, code } => {
                info!(session_id = %session_id, exit_code = code, "session exited");
                self.sessions.flush_now(&session_id);
                self.sessions.mark_exited(&session_id);
                self.dispatch(Action::SessionExited {
                    id: session_id,
                    code,
                });
            }
        }
    }

    async fn on_stdin(&mut self, chunk: Vec<u8>) {
        let mode = self.store.state().mode;
        match self.router.route(&chunk, mode, Instant::now()) {
            RouterAction::Quit => self.quit = true,
            RouterAction::BeginCreate => {
                self.create_buffer.clear();
                self.dispatch(Action::SetMode(Mode::CreatingSession));
            }
            RouterAction::BeginClose => {
                if self.store.state().active_session_id.is_some() {
                    self.dispatch(Action::SetMode(Mode::ConfirmingClose));
                }
            }
            RouterAction::NextTab => self.dispatch(Action::NextTab),
            RouterAction::PrevTab => self.dispatch(Action::PrevTab),
            RouterAction::JumpTab(index) => self.dispatch(Action::JumpToTab(index)),
            RouterAction::ScrollUp(n) => self.dispatch(Action::ScrollUp(n)),
            RouterAction::ScrollDown(n) => self.dispatch(Action::ScrollDown(n)),
            RouterAction::Forward(bytes) => self.forward(&bytes),
            RouterAction::ModalChunk(bytes) => self.on_modal_chunk(bytes).await,
            RouterAction::Ignored => {}
        }
    }

    fn on_timer(&mut self, now: Instant) {
        self.sessions.flush_due(now);
        if self.router.take_timeout(now) {
            self.forward(&[PREFIX_KEY]);
        }
        if !self.statuses.fire_due(now).is_empty() {
            let state = self.store.state().clone();
            self.draw_chrome_for(&state);
        }
    }

    fn on_resize(&mut self) {
        let Ok((cols, rows)) = crossterm::terminal::size() else {
            return;
        };
        let geometry = ViewportGeometry::new(cols, rows);
        if geometry == self.geometry {
            return;
        }
        info!(cols = cols, rows = rows, "terminal resized");
        self.geometry = geometry;
        self.compositor.set_geometry(geometry);
        self.sessions.resize_all(cols, geometry.inner_rows);

        let state = self.store.state().clone();
        if state.mode == Mode::Normal {
            self.repaint_active(&state);
        } else {
            let lines = self.modal_lines(&state);
            self.compositor.enter_modal(&lines);
        }
        self.draw_chrome_for(&state);
    }

    // ========== Dispatch and render policy ==========

    fn dispatch(&mut self, action: Action) {
        if self.store.dispatch(action) {
            // Any successful state change supersedes a stale error line.
            self.error = None;
            self.on_state_change();
        }
    }

    fn on_state_change(&mut self) {
        let state = self.store.state().clone();
        self.statuses.sync(state.sessions.iter().map(|s| s.id.as_str()));

        match state.mode {
            Mode::CreatingSession | Mode::ConfirmingClose => {
                let lines = self.modal_lines(&state);
                self.compositor.enter_modal(&lines);
                self.draw_chrome_for(&state);
            }
            Mode::Normal if self.last_mode != Mode::Normal => {
                self.repaint_active(&state);
                self.draw_chrome_for(&state);
            }
            Mode::Normal if state.active_session_id != self.last_rendered_session_id => {
                self.compositor.session_switched();
                self.repaint_active(&state);
                self.draw_chrome_for(&state);
            }
            Mode::Normal if state.scroll_offset != self.last_scroll_offset => {
                self.repaint_active(&state);
                self.draw_chrome_for(&state);
            }
            Mode::Normal => {
                self.draw_chrome_for(&state);
            }
        }

        self.last_mode = state.mode;
        self.last_rendered_session_id = state.active_session_id.clone();
        self.last_scroll_offset = state.scroll_offset;
    }

    fn repaint_active(&mut self, state: &AppState) {
        let emulator = state
            .active_session_id
            .as_deref()
            .and_then(|id| self.sessions.emulator(id));
        match emulator {
            Some(emulator) => self.compositor.repaint(emulator, state.scroll_offset),
            None => self.compositor.repaint_placeholder(),
        }
    }

    fn draw_chrome_for(&mut self, state: &AppState) {
        let lines = chrome::build(state, &self.statuses, &self.geometry, self.error.as_deref());
        self.compositor.draw_chrome(lines);
    }

    // ========== Pass-through ==========

    fn forward(&mut self, bytes: &[u8]) {
        let Some(active) = self.store.state().active() else {
            return;
        };
        if active.exit_code.is_some() {
            return;
        }
        let id = active.id.clone();

        // A lone carriage return is the submit gesture: the agent starts
        // working and the chrome recolors.
        if bytes == b"\r" && self.statuses.note_submit(&id, Instant::now()) {
            let state = self.store.state().clone();
            self.draw_chrome_for(&state);
        }

        if let Err(e) = self.sessions.write_input(&id, bytes) {
            warn!(session_id = %id, error = %e, "PTY write failed");
        }
    }

    // ========== Modals ==========

    async fn on_modal_chunk(&mut self, chunk: Vec<u8>) {
        match self.store.state().mode {
            Mode::CreatingSession => self.on_create_input(&chunk).await,
            Mode::ConfirmingClose => self.on_close_input(&chunk).await,
            Mode::Normal => {}
        }
    }

    async fn on_create_input(&mut self, chunk: &[u8]) {
        // A real ESC keypress may arrive bundled with following bytes, so
        // anything starting with ESC cancels.
        if chunk.first() == Some(&0x1b) {
            self.create_buffer.clear();
            self.dispatch(Action::SetMode(Mode::Normal));
            return;
        }
        match chunk.first() {
            Some(&b'\r') | Some(&b'\n') => {
                let branch = self.create_buffer.trim().to_string();
                if !branch.is_empty() {
                    self.create_session(&branch).await;
                }
            }
            Some(&0x7f) | Some(&0x08) => {
                self.create_buffer.pop();
                self.refresh_modal();
            }
            _ => {
                for c in String::from_utf8_lossy(chunk).chars() {
                    if !c.is_control() {
                        self.create_buffer.push(c);
                    }
                }
                self.refresh_modal();
            }
        }
    }

    async fn on_close_input(&mut self, chunk: &[u8]) {
        match chunk.first() {
            Some(&0x1b) | Some(&b'n') | Some(&b'N') => {
                self.dispatch(Action::SetMode(Mode::Normal));
            }
            Some(&b'y') | Some(&b'Y') | Some(&b'\r') => {
                let Some(id) = self.store.state().active_session_id.clone() else {
                    self.dispatch(Action::SetMode(Mode::Normal));
                    return;
                };
                self.sessions.close_session(&id).await;
                self.dispatch(Action::RemoveSession(id));
            }
            _ => {}
        }
    }

    async fn create_session(&mut self, branch: &str) {
        let result = self
            .sessions
            .create_session(branch, self.geometry.total_cols, self.geometry.inner_rows, None)
            .await;
        self.create_buffer.clear();
        match result {
            Ok(session) => self.dispatch(Action::AddSession(session)),
            Err(e) => {
                warn!(branch = %branch, error = %e, "session create failed");
                self.dispatch(Action::SetMode(Mode::Normal));
                self.error = Some(format!("create failed: {e}"));
                let state = self.store.state().clone();
                self.draw_chrome_for(&state);
            }
        }
    }

    fn refresh_modal(&mut self) {
        let state = self.store.state().clone();
        let lines = self.modal_lines(&state);
        self.compositor.enter_modal(&lines);
    }

    fn modal_lines(&self, state: &AppState) -> Vec<String> {
        match state.mode {
            Mode::CreatingSession => vec![
                "Create new session".to_string(),
                String::new(),
                format!("branch: {}_", self.create_buffer),
                String::new(),
                "Enter to create, Esc to cancel".to_string(),
            ],
            Mode::ConfirmingClose => {
                let branch = state.active().map(|s| s.branch.as_str()).unwrap_or("?");
                vec![
                    format!("Close session '{branch}'?"),
                    String::new(),
                    "The checkout and its changes will be removed.".to_string(),
                    String::new(),
                    "y/Enter to close, Esc to cancel".to_string(),
                ]
            }
            Mode::Normal => Vec::new(),
        }
    }

    // ========== Timers and shutdown ==========

    fn next_deadline(&self) -> Option<Instant> {
        [
            self.sessions.next_flush_deadline(),
            self.router.prefix_deadline(),
            self.statuses.next_deadline(),
        ]
        .into_iter()
        .flatten()
        .min()
    }

    fn shutdown(&mut self) {
        if self.cleaning {
            return;
        }
        self.cleaning = true;
        info!("shutting down");
        self.router.reset();
        self.stdin.stop();
        // Checkouts stay on disk; the next launch restores them.
        self.sessions.shutdown();
        self.compositor.cleanup();
    }
}

/// Sleep until the deadline, or forever when no timer is armed.
async fn sleep_until_opt(deadline: Option<Instant>) {
    match deadline {
        Some(deadline) => tokio::time::sleep_until(tokio::time::Instant::from_std(deadline)).await,
        None => std::future::pending().await,
    }
}
