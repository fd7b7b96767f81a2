//! Headless terminal emulator.
//!
//! Thin wrapper around alacritty_terminal's `Term`: one instance per session,
//! fed raw PTY bytes, read back by the buffer renderer on repaints. The
//! surface is deliberately narrow (write, resize, geometry, cursor, and
//! absolute-row line access) so any VT-compatible emulator could back it.

use alacritty_terminal::event::{Event as TermEvent, EventListener};
use alacritty_terminal::grid::{Dimensions, Row};
use alacritty_terminal::index::Line;
use alacritty_terminal::term::cell::Cell;
use alacritty_terminal::term::{Config as TermConfig, Term};
use alacritty_terminal::vte::ansi::Processor;

/// Scrollback lines kept per session.
pub const MAX_SCROLLBACK: usize = 5000;

/// Terminal size for creating and resizing the Term.
struct TermSize {
    cols: usize,
    rows: usize,
}

impl Dimensions for TermSize {
    fn total_lines(&self) -> usize {
        self.rows + MAX_SCROLLBACK
    }

    fn screen_lines(&self) -> usize {
        self.rows
    }

    fn columns(&self) -> usize {
        self.cols
    }
}

/// The emulator is polled, never event-driven; terminal events are dropped.
struct VoidListener;

impl EventListener for VoidListener {
    fn send_event(&self, _event: TermEvent) {}
}

pub struct Emulator {
    term: Term<VoidListener>,
    processor: Processor,
    cols: u16,
    rows: u16,
}

impl Emulator {
    pub fn new(cols: u16, rows: u16) -> Self {
        let config = TermConfig {
            scrolling_history: MAX_SCROLLBACK,
            ..TermConfig::default()
        };
        let size = TermSize {
            cols: cols as usize,
            rows: rows as usize,
        };
        let term = Term::new(config, &size, VoidListener);

        Self {
            term,
            processor: Processor::new(),
            cols,
            rows,
        }
    }

    /// Feed raw PTY bytes through the VT parser into the grid.
    pub fn write(&mut self, bytes: &[u8]) {
        for &byte in bytes {
            self.processor.advance(&mut self.term, byte);
        }
    }

    pub fn resize(&mut self, cols: u16, rows: u16) {
        if cols == self.cols && rows == self.rows {
            return;
        }
        self.cols = cols;
        self.rows = rows;
        self.term.resize(TermSize {
            cols: cols as usize,
            rows: rows as usize,
        });
    }

    pub fn cols(&self) -> u16 {
        self.cols
    }

    pub fn rows(&self) -> u16 {
        self.rows
    }

    /// Count of lines that have scrolled above the viewport top.
    pub fn base_y(&self) -> usize {
        self.term.grid().history_size()
    }

    /// Total addressable lines: scrollback plus the visible screen.
    pub fn total_lines(&self) -> usize {
        self.base_y() + self.rows as usize
    }

    /// Cursor position relative to the viewport, (col, row), 0-based.
    pub fn cursor(&self) -> (usize, usize) {
        let point = self.term.grid().cursor.point;
        (point.column.0, point.line.0.max(0) as usize)
    }

    /// Row at an absolute index where 0 is the oldest scrollback line and
    /// `base_y()` is the viewport top. None when out of range.
    pub fn line(&self, abs_row: usize) -> Option<&Row<Cell>> {
        if abs_row >= self.total_lines() {
            return None;
        }
        let history = self.base_y() as i32;
        Some(&self.term.grid()[Line(abs_row as i32 - history)])
    }
}
