//! Event-sourced state store.
//!
//! A single `AppState` value replaced atomically by a pure reducer. The store
//! holds session *metadata* only (id, branch, path, exit code); the live
//! emulator and PTY child live in the session manager's parallel map, keyed
//! by id, so state stays trivially cloneable and free of I/O handles.
//!
//! Invariants maintained by the reducer:
//! - non-empty sessions ⇒ `active_session_id` is Some and present in the list
//! - mode returns to Normal whenever the session list changes
//! - `scroll_offset` resets to 0 on any session-list or active-id change

use std::path::PathBuf;

/// UI mode: Normal pass-through, or one of the two modals.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Mode {
    #[default]
    Normal,
    CreatingSession,
    ConfirmingClose,
}

/// Store-side record of one session.
#[derive(Debug, Clone, PartialEq)]
pub struct Session {
    pub id: String,
    pub branch: String,
    pub checkout_path: PathBuf,
    pub exit_code: Option<i32>,
}

#[derive(Debug, Clone, PartialEq, Default)]
pub struct AppState {
    pub sessions: Vec<Session>,
    pub active_session_id: Option<String>,
    pub mode: Mode,
    pub scroll_offset: usize,
}

impl AppState {
    pub fn active(&self) -> Option<&Session> {
        let id = self.active_session_id.as_deref()?;
        self.sessions.iter().find(|s| s.id == id)
    }

    fn index_of(&self, id: &str) -> Option<usize> {
        self.sessions.iter().position(|s| s.id == id)
    }
}

#[derive(Debug, Clone)]
pub enum Action {
    AddSession(Session),
    RemoveSession(String),
    SetActive(String),
    NextTab,
    PrevTab,
    JumpToTab(usize),
    SetMode(Mode),
    SessionExited { id: String, code: i32 },
    ScrollUp(usize),
    ScrollDown(usize),
}

#[derive(Debug, Default)]
pub struct Store {
    state: AppState,
}

impl Store {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn state(&self) -> &AppState {
        &self.state
    }

    /// Apply an action. Returns true iff the reducer produced a distinct
    /// state, which is the controller's cue to run its render policy.
    pub fn dispatch(&mut self, action: Action) -> bool {
        let next = reduce(&self.state, &action);
        if next == self.state {
            return false;
        }
        self.state = next;
        true
    }
}

fn reduce(state: &AppState, action: &Action) -> AppState {
    let mut next = state.clone();
    match action {
        Action::AddSession(session) => {
            next.active_session_id = Some(session.id.clone());
            next.sessions.push(session.clone());
            next.mode = Mode::Normal;
            next.scroll_offset = 0;
        }
        Action::RemoveSession(id) => {
            let Some(index) = state.index_of(id) else {
                return next;
            };
            next.sessions.remove(index);
            if state.active_session_id.as_deref() == Some(id.as_str()) {
                next.active_session_id = if next.sessions.is_empty() {
                    None
                } else {
                    let i = index.min(next.sessions.len() - 1);
                    Some(next.sessions[i].id.clone())
                };
            }
            next.mode = Mode::Normal;
            next.scroll_offset = 0;
        }
        Action::SetActive(id) => {
            if state.index_of(id).is_some() {
                next.active_session_id = Some(id.clone());
                next.scroll_offset = 0;
            }
        }
        Action::NextTab | Action::PrevTab => {
            if let Some(current) = state
                .active_session_id
                .as_deref()
                .and_then(|id| state.index_of(id))
            {
                let len = state.sessions.len();
                let target = match action {
                    Action::NextTab => (current + 1) % len,
                    _ => (current + len - 1) % len,
                };
                next.active_session_id = Some(state.sessions[target].id.clone());
                next.scroll_offset = 0;
            }
        }
        Action::JumpToTab(index) => {
            if let Some(session) = state.sessions.get(*index) {
                next.active_session_id = Some(session.id.clone());
                next.scroll_offset = 0;
            }
        }
        Action::SetMode(mode) => {
            next.mode = *mode;
        }
        Action::SessionExited { id, code } => {
            if let Some(session) = next.sessions.iter_mut().find(|s| s.id == *id) {
                session.exit_code = Some(*code);
            }
        }
        Action::ScrollUp(n) => {
            next.scroll_offset += n;
        }
        Action::ScrollDown(n) => {
            next.scroll_offset = next.scroll_offset.saturating_sub(*n);
        }
    }
    next
}

#[cfg(test)]
mod tests {
    use super::*;

    fn session(id: &str) -> Session {
        Session {
            id: id.to_string(),
            branch: id.to_string(),
            checkout_path: PathBuf::from(format!("/tmp/{id}")),
            exit_code: None,
        }
    }

    fn store_with(ids: &[&str]) -> Store {
        let mut store = Store::new();
        for id in ids {
            store.dispatch(Action::AddSession(session(id)));
        }
        store
    }

    fn assert_active_invariant(state: &AppState) {
        if state.sessions.is_empty() {
            assert_eq!(state.active_session_id, None);
        } else {
            let id = state.active_session_id.as_deref().expect("active set");
            assert!(state.sessions.iter().any(|s| s.id == id));
        }
    }

    #[test]
    fn test_add_activates_and_resets() {
        let mut store = store_with(&["a"]);
        store.dispatch(Action::ScrollUp(4));
        store.dispatch(Action::SetMode(Mode::CreatingSession));
        assert!(store.dispatch(Action::AddSession(session("b"))));

        let state = store.state();
        assert_eq!(state.active_session_id.as_deref(), Some("b"));
        assert_eq!(state.mode, Mode::Normal);
        assert_eq!(state.scroll_offset, 0);
        assert_active_invariant(state);
    }

    #[test]
    fn test_remove_active_mid_list() {
        // Literal scenario: sessions [a,b,c], active b, remove b → active c.
        let mut store = store_with(&["a", "b", "c"]);
        store.dispatch(Action::SetActive("b".to_string()));
        assert!(store.dispatch(Action::RemoveSession("b".to_string())));

        let state = store.state();
        let ids: Vec<&str> = state.sessions.iter().map(|s| s.id.as_str()).collect();
        assert_eq!(ids, vec!["a", "c"]);
        assert_eq!(state.active_session_id.as_deref(), Some("c"));
        assert_active_invariant(state);
    }

    #[test]
    fn test_remove_active_last() {
        let mut store = store_with(&["a", "b"]);
        assert!(store.dispatch(Action::RemoveSession("b".to_string())));
        assert_eq!(store.state().active_session_id.as_deref(), Some("a"));
        assert_active_invariant(store.state());
    }

    #[test]
    fn test_remove_only_session_clears_active() {
        let mut store = store_with(&["a"]);
        store.dispatch(Action::RemoveSession("a".to_string()));
        assert_eq!(store.state().active_session_id, None);
        assert!(store.state().sessions.is_empty());
    }

    #[test]
    fn test_remove_inactive_keeps_active() {
        let mut store = store_with(&["a", "b", "c"]);
        store.dispatch(Action::SetActive("a".to_string()));
        store.dispatch(Action::RemoveSession("c".to_string()));
        assert_eq!(store.state().active_session_id.as_deref(), Some("a"));
    }

    #[test]
    fn test_remove_is_idempotent_after_first() {
        let mut store = store_with(&["a", "b"]);
        assert!(store.dispatch(Action::RemoveSession("a".to_string())));
        assert!(!store.dispatch(Action::RemoveSession("a".to_string())));
    }

    #[test]
    fn test_set_mode_idempotent() {
        let mut store = store_with(&["a"]);
        assert!(store.dispatch(Action::SetMode(Mode::CreatingSession)));
        assert!(!store.dispatch(Action::SetMode(Mode::CreatingSession)));
    }

    #[test]
    fn test_set_active_idempotent() {
        let mut store = store_with(&["a", "b"]);
        assert!(store.dispatch(Action::SetActive("a".to_string())));
        assert!(!store.dispatch(Action::SetActive("a".to_string())));
    }

    #[test]
    fn test_tab_cycling_circular() {
        let mut store = store_with(&["a", "b", "c"]);
        assert_eq!(store.state().active_session_id.as_deref(), Some("c"));
        store.dispatch(Action::NextTab);
        assert_eq!(store.state().active_session_id.as_deref(), Some("a"));
        store.dispatch(Action::PrevTab);
        assert_eq!(store.state().active_session_id.as_deref(), Some("c"));
        store.dispatch(Action::PrevTab);
        assert_eq!(store.state().active_session_id.as_deref(), Some("b"));
    }

    #[test]
    fn test_tab_cycling_empty_noop() {
        let mut store = Store::new();
        assert!(!store.dispatch(Action::NextTab));
        assert!(!store.dispatch(Action::PrevTab));
    }

    #[test]
    fn test_jump_out_of_range_emits_no_change() {
        // Literal scenario: [main, dev], jump to tab 5 → no state change.
        let mut store = store_with(&["main", "dev"]);
        store.dispatch(Action::SetActive("main".to_string()));
        assert!(!store.dispatch(Action::JumpToTab(4)));
        assert_eq!(store.state().active_session_id.as_deref(), Some("main"));
    }

    #[test]
    fn test_jump_in_range() {
        let mut store = store_with(&["a", "b", "c"]);
        assert!(store.dispatch(Action::JumpToTab(0)));
        assert_eq!(store.state().active_session_id.as_deref(), Some("a"));
    }

    #[test]
    fn test_scroll_accumulates_and_underflows() {
        // Literal scenario: offset 3, scroll down 5 → 0.
        let mut store = store_with(&["a"]);
        store.dispatch(Action::ScrollUp(3));
        assert_eq!(store.state().scroll_offset, 3);
        store.dispatch(Action::ScrollDown(5));
        assert_eq!(store.state().scroll_offset, 0);
    }

    #[test]
    fn test_scroll_resets_on_active_change() {
        let mut store = store_with(&["a", "b"]);
        store.dispatch(Action::ScrollUp(10));
        store.dispatch(Action::NextTab);
        assert_eq!(store.state().scroll_offset, 0);

        store.dispatch(Action::ScrollUp(10));
        store.dispatch(Action::SetActive("b".to_string()));
        assert_eq!(store.state().scroll_offset, 0);

        store.dispatch(Action::ScrollUp(10));
        store.dispatch(Action::JumpToTab(0));
        assert_eq!(store.state().scroll_offset, 0);
    }

    #[test]
    fn test_scroll_resets_on_list_change() {
        let mut store = store_with(&["a", "b"]);
        store.dispatch(Action::ScrollUp(7));
        store.dispatch(Action::RemoveSession("a".to_string()));
        assert_eq!(store.state().scroll_offset, 0);
    }

    #[test]
    fn test_session_exited_sets_code() {
        let mut store = store_with(&["a"]);
        assert!(store.dispatch(Action::SessionExited {
            id: "a".to_string(),
            code: 2,
        }));
        assert_eq!(store.state().sessions[0].exit_code, Some(2));
        // Same code again: no distinct state.
        assert!(!store.dispatch(Action::SessionExited {
            id: "a".to_string(),
            code: 2,
        }));
    }

    #[test]
    fn test_mode_normal_whenever_sessions_change() {
        let mut store = store_with(&["a", "b"]);
        store.dispatch(Action::SetMode(Mode::ConfirmingClose));
        store.dispatch(Action::RemoveSession("b".to_string()));
        assert_eq!(store.state().mode, Mode::Normal);

        store.dispatch(Action::SetMode(Mode::CreatingSession));
        store.dispatch(Action::AddSession(session("c")));
        assert_eq!(store.state().mode, Mode::Normal);
    }
}
