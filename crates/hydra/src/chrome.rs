//! Chrome rendering.
//!
//! Builds the three bottom rows (border, status line, border) as styled
//! strings exactly `total_cols` visible columns wide. Escape sequences inside
//! colored tokens are not counted when measuring; the gap between the left
//! side and the right-hand key hint is filled with spaces so the pad is
//! exact.

use once_cell::sync::Lazy;
use regex::Regex;

use hydra_core::store::AppState;
use hydra_core::{SessionStatus, StatusTracker};

use crate::compositor::ViewportGeometry;

const LABEL: &str = " hydra | ";
const HINT: &str = " ^B n:new w:close [ ]:tabs 1-9:jump q:quit ";

const SGR_RESET: &str = "\x1b[0m";
const SGR_GRAY: &str = "\x1b[90m";
const SGR_RED: &str = "\x1b[31m";
const SGR_YELLOW: &str = "\x1b[33m";
const SGR_GREEN: &str = "\x1b[32m";
const SGR_ACTIVE: &str = "\x1b[1;37;44m";
const SGR_MODE: &str = "\x1b[1;33m";

static SGR_PATTERN: Lazy<Regex> = Lazy::new(|| Regex::new(r"\x1b\[[0-9;]*m").unwrap());

/// The three chrome rows, ready for the compositor to position.
#[derive(Debug, Clone, PartialEq)]
pub struct ChromeLines {
    pub top: String,
    pub status: String,
    pub bottom: String,
}

/// Visible length of a styled string: CSI-SGR sequences count for nothing.
pub fn visible_len(s: &str) -> usize {
    SGR_PATTERN.replace_all(s, "").chars().count()
}

/// Truncate to `max` visible columns, keeping embedded SGR sequences intact.
fn truncate_visible(s: &str, max: usize) -> String {
    let mut out = String::new();
    let mut visible = 0;
    let mut rest = s;
    while !rest.is_empty() {
        if let Some(m) = SGR_PATTERN.find(rest) {
            if m.start() == 0 {
                out.push_str(m.as_str());
                rest = &rest[m.end()..];
                continue;
            }
        }
        let mut chars = rest.chars();
        let c = chars.next().unwrap();
        if visible == max {
            break;
        }
        out.push(c);
        visible += 1;
        rest = chars.as_str();
    }
    out
}

pub fn build(
    state: &AppState,
    statuses: &StatusTracker,
    geom: &ViewportGeometry,
    error: Option<&str>,
) -> ChromeLines {
    let cols = geom.total_cols as usize;
    ChromeLines {
        top: border_line(cols, error),
        status: status_line(state, statuses, cols),
        bottom: border_line(cols, None),
    }
}

fn border_line(cols: usize, error: Option<&str>) -> String {
    match error {
        Some(msg) => {
            let token = format!(" {msg} ");
            let token = truncate_visible(&token, cols);
            let used = visible_len(&token);
            let left = (cols - used) / 2;
            let right = cols - used - left;
            format!(
                "{SGR_GRAY}{}{SGR_RESET}{SGR_RED}{token}{SGR_RESET}{SGR_GRAY}{}{SGR_RESET}",
                "─".repeat(left),
                "─".repeat(right),
            )
        }
        None => format!("{SGR_GRAY}{}{SGR_RESET}", "─".repeat(cols)),
    }
}

fn tab_style(session: &hydra_core::Session, active: bool, status: SessionStatus) -> &'static str {
    if active {
        SGR_ACTIVE
    } else if session.exit_code.is_some() {
        SGR_RED
    } else {
        match status {
            SessionStatus::Idle => SGR_GRAY,
            SessionStatus::Working => SGR_YELLOW,
            SessionStatus::Waiting => SGR_GREEN,
        }
    }
}

fn status_line(state: &AppState, statuses: &StatusTracker, cols: usize) -> String {
    let mut left = String::new();
    left.push_str(SGR_GRAY);
    left.push_str(LABEL);
    left.push_str(SGR_RESET);

    match state.mode {
        hydra_core::Mode::CreatingSession => {
            left.push_str(&format!("{SGR_MODE}[CREATE]{SGR_RESET} "));
        }
        hydra_core::Mode::ConfirmingClose => {
            left.push_str(&format!("{SGR_MODE}[CLOSE?]{SGR_RESET} "));
        }
        hydra_core::Mode::Normal => {}
    }

    for (i, session) in state.sessions.iter().enumerate() {
        if i > 0 {
            left.push_str(&format!("{SGR_GRAY}|{SGR_RESET}"));
        }
        let active = state.active_session_id.as_deref() == Some(session.id.as_str());
        let style = tab_style(session, active, statuses.status(&session.id));
        left.push_str(&format!(
            "{style} {}:{} {SGR_RESET}",
            i + 1,
            session.branch
        ));
    }

    if state.scroll_offset > 0 {
        left.push_str(&format!(
            " {SGR_YELLOW}[scroll: -{}]{SGR_RESET}",
            state.scroll_offset
        ));
    }

    if let Some(active) = state.active() {
        if let Some(code) = active.exit_code {
            left.push_str(&format!(" {SGR_RED}exited({code}){SGR_RESET}"));
        }
    }

    let right = format!("{SGR_GRAY}{HINT}{SGR_RESET}");
    let left_len = visible_len(&left);
    let right_len = visible_len(&right);

    if left_len + right_len <= cols {
        let gap = cols - left_len - right_len;
        format!("{left}{}{right}", " ".repeat(gap))
    } else if left_len <= cols {
        format!("{left}{}", " ".repeat(cols - left_len))
    } else {
        let truncated = truncate_visible(&left, cols);
        format!("{truncated}{SGR_RESET}")
    }
}
