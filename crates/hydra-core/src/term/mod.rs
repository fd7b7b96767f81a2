//! Terminal emulation and rendering.
//!
//! # Components
//! - `Emulator`: headless VT state machine per session (alacritty_terminal)
//! - `renderer`: cell grid → styled bytes with SGR run-length compression
//! - `PassthroughFilter`: host-destabilizing sequences rewritten or dropped

mod emulator;
mod filter;
mod renderer;

pub use emulator::{Emulator, MAX_SCROLLBACK};
pub use filter::PassthroughFilter;
pub use renderer::{render_buffer, render_line, sgr, style_of, CellStyle, Color};
