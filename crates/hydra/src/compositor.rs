//! Screen compositor.
//!
//! Owns the physical terminal. A DECSTBM scroll region reserves the bottom
//! three rows for chrome; the active session's PTY bytes stream into the
//! region (filtered) so the host terminal renders them and pushes off-screen
//! lines into its native scrollback. Repaints from the emulator buffer happen
//! only on switch, resize, scroll, and modal exit.
//!
//! Every write is best-effort: the host terminal may already be in an
//! inconsistent state, so failures are logged and swallowed rather than
//! propagated (the next render tries again).

use std::io::Write;

use tracing::debug;

use hydra_core::ansi;
use hydra_core::term::{render_buffer, Emulator, PassthroughFilter};

use crate::chrome::ChromeLines;

/// Rows reserved at the bottom: top border, status line, bottom border.
pub const CHROME_ROWS: u16 = 3;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ViewportGeometry {
    pub total_cols: u16,
    pub total_rows: u16,
    /// Scroll-region height; always at least 1.
    pub inner_rows: u16,
}

impl ViewportGeometry {
    pub fn new(total_cols: u16, total_rows: u16) -> Self {
        Self {
            total_cols,
            total_rows,
            inner_rows: total_rows.saturating_sub(CHROME_ROWS).max(1),
        }
    }
}

pub struct Compositor<W: Write> {
    out: W,
    geometry: ViewportGeometry,
    filter: PassthroughFilter,
    chrome: Option<ChromeLines>,
    chrome_dirty: bool,
    in_modal: bool,
}

impl Compositor<std::io::Stdout> {
    pub fn stdout(geometry: ViewportGeometry) -> Self {
        Self::new(std::io::stdout(), geometry)
    }
}

impl<W: Write> Compositor<W> {
    pub fn new(out: W, geometry: ViewportGeometry) -> Self {
        Self {
            out,
            geometry,
            filter: PassthroughFilter::new(),
            chrome: None,
            chrome_dirty: false,
            in_modal: false,
        }
    }

    pub fn geometry(&self) -> ViewportGeometry {
        self.geometry
    }

    fn emit(&mut self, bytes: &[u8]) {
        if let Err(e) = self.out.write_all(bytes) {
            debug!(error = %e, "stdout write dropped");
        }
    }

    fn emit_str(&mut self, s: &str) {
        self.emit(s.as_bytes());
    }

    fn flush(&mut self) {
        if let Err(e) = self.out.flush() {
            debug!(error = %e, "stdout flush dropped");
        }
    }

    /// Claim the terminal: clear, install the scroll region, home the
    /// cursor, disable stale focus reporting. Idempotent under repeated
    /// geometry changes.
    pub fn initialize(&mut self) {
        self.emit_str(ansi::CLEAR_SCREEN);
        self.emit_str(&ansi::set_scroll_region(1, self.geometry.inner_rows));
        self.emit_str(&ansi::cursor_to(1, 1));
        self.emit_str(ansi::DISABLE_FOCUS_REPORTING);
        self.chrome_dirty = true;
        self.flush();
    }

    /// Hand the terminal back: primary screen (in case a child's alt-screen
    /// toggle ever slipped through), full scroll region, visible cursor,
    /// cursor on the bottom row with a fresh line for the shell prompt.
    pub fn cleanup(&mut self) {
        self.emit_str(ansi::LEAVE_ALT_SCREEN);
        self.emit_str(ansi::RESET_SCROLL_REGION);
        self.emit_str(ansi::SHOW_CURSOR);
        self.emit_str(&ansi::cursor_to(self.geometry.total_rows, 1));
        self.emit_str("\r\n");
        self.flush();
    }

    /// Adopt new dimensions and re-install the scroll region.
    pub fn set_geometry(&mut self, geometry: ViewportGeometry) {
        self.geometry = geometry;
        self.emit_str(&ansi::set_scroll_region(1, geometry.inner_rows));
        self.chrome_dirty = true;
        self.flush();
    }

    /// Forget pass-through parser state so the next session's stream starts
    /// clean.
    pub fn session_switched(&mut self) {
        self.filter.reset();
    }

    /// Hot path: filtered PTY bytes straight to the host terminal. Dropped
    /// (but still fed to the filter for continuity) while a modal covers the
    /// viewport. A dirty chrome is redrawn first so its rows are never left
    /// stale behind fresh output.
    pub fn write_passthrough(&mut self, chunk: &[u8]) {
        let filtered = self.filter.feed(chunk, self.geometry.inner_rows);
        if self.in_modal {
            return;
        }
        if self.chrome_dirty {
            self.draw_cached_chrome();
        }
        if !filtered.is_empty() {
            self.emit(&filtered);
        }
        self.flush();
    }

    /// Full viewport repaint from the emulator buffer. Used on session
    /// switch, modal exit, scroll and resize.
    pub fn repaint(&mut self, emulator: &Emulator, scroll_offset: usize) {
        self.in_modal = false;
        let inner = self.geometry.inner_rows;
        let lines = render_buffer(emulator, scroll_offset, inner as usize);

        self.emit_str(ansi::RESET_SCROLL_REGION);
        for (i, line) in lines.iter().enumerate() {
            self.emit_str(&ansi::cursor_to(i as u16 + 1, 1));
            self.emit_str(ansi::CLEAR_LINE);
            self.emit(line);
        }
        for i in lines.len()..inner as usize {
            self.emit_str(&ansi::cursor_to(i as u16 + 1, 1));
            self.emit_str(ansi::CLEAR_LINE);
        }
        self.emit_str(ansi::RESET);
        self.emit_str(&ansi::set_scroll_region(1, inner));
        self.emit_str(ansi::SHOW_CURSOR);

        let (cx, cy) = emulator.cursor();
        let row = (cy as u16 + 1).min(inner);
        self.emit_str(&ansi::cursor_to(row, cx as u16 + 1));
        self.flush();
    }

    /// Viewport content when no session exists.
    pub fn repaint_placeholder(&mut self) {
        self.in_modal = false;
        self.emit_str(ansi::SHOW_CURSOR);
        self.clear_viewport();
        let row = (self.geometry.inner_rows / 2).max(1);
        let text = "no active sessions. press ^B n to create one";
        self.emit_str(&ansi::cursor_to(row, 1));
        self.emit_str(&self.centered(text));
        self.flush();
    }

    /// Cover the viewport with centered modal content and hide the cursor
    /// until the next repaint. Chrome stays intact.
    pub fn enter_modal(&mut self, lines: &[String]) {
        self.in_modal = true;
        self.emit_str(ansi::HIDE_CURSOR);
        self.clear_viewport();
        let inner = self.geometry.inner_rows as usize;
        let first = inner.saturating_sub(lines.len()) / 2;
        for (i, line) in lines.iter().enumerate().take(inner) {
            let row = (first + i) as u16 + 1;
            self.emit_str(&ansi::cursor_to(row, 1));
            self.emit_str(&self.centered(line));
        }
        self.flush();
    }

    fn centered(&self, text: &str) -> String {
        let cols = self.geometry.total_cols as usize;
        let len = crate::chrome::visible_len(text);
        let pad = cols.saturating_sub(len) / 2;
        format!("{}{}", " ".repeat(pad), text)
    }

    fn clear_viewport(&mut self) {
        for row in 1..=self.geometry.inner_rows {
            self.emit_str(&ansi::cursor_to(row, 1));
            self.emit_str(ansi::CLEAR_LINE);
        }
    }

    /// Draw (and cache) the chrome rows. Cursor save/restore brackets the
    /// excursion so the in-region cursor is undisturbed.
    pub fn draw_chrome(&mut self, lines: ChromeLines) {
        self.chrome = Some(lines);
        self.draw_cached_chrome();
        self.flush();
    }

    pub fn mark_chrome_dirty(&mut self) {
        self.chrome_dirty = true;
    }

    fn draw_cached_chrome(&mut self) {
        let Some(lines) = self.chrome.clone() else {
            return;
        };
        let geom = self.geometry;
        self.emit_str(ansi::SAVE_CURSOR);
        self.emit_str(ansi::RESET_SCROLL_REGION);
        for (offset, line) in [&lines.top, &lines.status, &lines.bottom]
            .into_iter()
            .enumerate()
        {
            let row = geom.inner_rows + offset as u16 + 1;
            self.emit_str(&ansi::cursor_to(row, 1));
            self.emit_str(ansi::CLEAR_LINE);
            self.emit_str(line);
        }
        self.emit_str(&ansi::set_scroll_region(1, geom.inner_rows));
        self.emit_str(ansi::RESTORE_CURSOR);
        self.chrome_dirty = false;
    }
}
