//! ANSI escape primitives.
//!
//! Pure builders for the control sequences the compositor writes to the host
//! terminal. Nothing here performs I/O; callers own the byte sink.

/// Reset all SGR attributes.
pub const RESET: &str = "\x1b[0m";
/// DECSC: save cursor position and attributes.
pub const SAVE_CURSOR: &str = "\x1b7";
/// DECRC: restore cursor position and attributes.
pub const RESTORE_CURSOR: &str = "\x1b8";
pub const SHOW_CURSOR: &str = "\x1b[?25h";
pub const HIDE_CURSOR: &str = "\x1b[?25l";
/// Erase the whole screen (cursor does not move).
pub const CLEAR_SCREEN: &str = "\x1b[2J";
/// Erase the whole current line.
pub const CLEAR_LINE: &str = "\x1b[2K";
/// DECSTBM with no params, margins back to the full screen.
pub const RESET_SCROLL_REGION: &str = "\x1b[r";
/// DECRST 1004: stop the terminal from reporting focus in/out.
pub const DISABLE_FOCUS_REPORTING: &str = "\x1b[?1004l";
/// DECRST 1049: back to the primary screen buffer.
pub const LEAVE_ALT_SCREEN: &str = "\x1b[?1049l";

/// Move the cursor to 1-based (row, col).
pub fn cursor_to(row: u16, col: u16) -> String {
    format!("\x1b[{row};{col}H")
}

/// DECSTBM: set the scroll region to 1-based rows [top, bottom].
/// The terminal homes the cursor as a side effect.
pub fn set_scroll_region(top: u16, bottom: u16) -> String {
    format!("\x1b[{top};{bottom}r")
}
