//! Buffer renderer.
//!
//! Walks an emulator's cell grid and emits styled byte sequences for
//! repaints. SGR output is run-length compressed: a sequence is written only
//! when the effective style differs from the previously emitted cell's, and
//! every sequence starts from a reset so no attribute leaks between runs.

use alacritty_terminal::term::cell::{Cell, Flags};
use alacritty_terminal::vte::ansi::{Color as AnsiColor, NamedColor};

use super::emulator::Emulator;

/// A fully resolved cell color.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Color {
    Default,
    /// ANSI palette 0-15.
    Palette16(u8),
    /// Extended palette 16-255.
    Palette256(u8),
    Rgb { r: u8, g: u8, b: u8 },
}

/// Style of a single cell, compared structurally for run-length compression.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CellStyle {
    pub fg: Color,
    pub bg: Color,
    pub bold: bool,
    pub dim: bool,
    pub italic: bool,
    pub underline: bool,
    pub inverse: bool,
    pub strikethrough: bool,
}

impl CellStyle {
    pub const DEFAULT: CellStyle = CellStyle {
        fg: Color::Default,
        bg: Color::Default,
        bold: false,
        dim: false,
        italic: false,
        underline: false,
        inverse: false,
        strikethrough: false,
    };

    pub fn is_default(&self) -> bool {
        *self == Self::DEFAULT
    }
}

fn resolve_color(color: AnsiColor) -> Color {
    match color {
        AnsiColor::Spec(rgb) => Color::Rgb {
            r: rgb.r,
            g: rgb.g,
            b: rgb.b,
        },
        AnsiColor::Indexed(idx) if idx < 16 => Color::Palette16(idx),
        AnsiColor::Indexed(idx) => Color::Palette256(idx),
        AnsiColor::Named(name) => named_to_color(name),
    }
}

fn named_to_color(name: NamedColor) -> Color {
    match name {
        NamedColor::Black | NamedColor::DimBlack => Color::Palette16(0),
        NamedColor::Red | NamedColor::DimRed => Color::Palette16(1),
        NamedColor::Green | NamedColor::DimGreen => Color::Palette16(2),
        NamedColor::Yellow | NamedColor::DimYellow => Color::Palette16(3),
        NamedColor::Blue | NamedColor::DimBlue => Color::Palette16(4),
        NamedColor::Magenta | NamedColor::DimMagenta => Color::Palette16(5),
        NamedColor::Cyan | NamedColor::DimCyan => Color::Palette16(6),
        NamedColor::White | NamedColor::DimWhite => Color::Palette16(7),
        NamedColor::BrightBlack => Color::Palette16(8),
        NamedColor::BrightRed => Color::Palette16(9),
        NamedColor::BrightGreen => Color::Palette16(10),
        NamedColor::BrightYellow => Color::Palette16(11),
        NamedColor::BrightBlue => Color::Palette16(12),
        NamedColor::BrightMagenta => Color::Palette16(13),
        NamedColor::BrightCyan => Color::Palette16(14),
        NamedColor::BrightWhite => Color::Palette16(15),
        _ => Color::Default,
    }
}

/// Extract the renderable style of a cell.
pub fn style_of(cell: &Cell) -> CellStyle {
    CellStyle {
        fg: resolve_color(cell.fg),
        bg: resolve_color(cell.bg),
        bold: cell.flags.contains(Flags::BOLD),
        dim: cell.flags.contains(Flags::DIM),
        italic: cell.flags.contains(Flags::ITALIC),
        underline: cell.flags.contains(Flags::UNDERLINE),
        inverse: cell.flags.contains(Flags::INVERSE),
        strikethrough: cell.flags.contains(Flags::STRIKEOUT),
    }
}

fn push_color_params(params: &mut Vec<String>, color: Color, is_fg: bool) {
    let (base, bright_base, extended) = if is_fg { (30, 90, 38) } else { (40, 100, 48) };
    match color {
        Color::Default => {}
        Color::Palette16(n) if n < 8 => params.push((base + n as u16).to_string()),
        Color::Palette16(n) => params.push((bright_base + (n & 7) as u16).to_string()),
        Color::Palette256(n) => params.push(format!("{extended};5;{n}")),
        Color::Rgb { r, g, b } => params.push(format!("{extended};2;{r};{g};{b}")),
    }
}

/// SGR sequence for a style: always a reset prefix, then explicit attributes.
pub fn sgr(style: &CellStyle) -> String {
    let mut params = vec!["0".to_string()];
    if style.bold {
        params.push("1".to_string());
    }
    if style.dim {
        params.push("2".to_string());
    }
    if style.italic {
        params.push("3".to_string());
    }
    if style.underline {
        params.push("4".to_string());
    }
    if style.inverse {
        params.push("7".to_string());
    }
    if style.strikethrough {
        params.push("9".to_string());
    }
    push_color_params(&mut params, style.fg, true);
    push_color_params(&mut params, style.bg, false);
    format!("\x1b[{}m", params.join(";"))
}

/// Render one absolute row of the emulator's buffer to styled bytes.
///
/// Entirely empty lines (default-styled spaces) render to an empty slice so
/// repaints of blank regions stay free of SGR noise. Non-empty output is
/// terminated with a reset.
pub fn render_line(emu: &Emulator, abs_row: usize) -> Vec<u8> {
    let Some(row) = emu.line(abs_row) else {
        return Vec::new();
    };

    let cols = emu.cols() as usize;
    let mut out = String::new();
    let mut last_style: Option<CellStyle> = None;
    let mut all_empty = true;

    for cell in row.into_iter().take(cols) {
        // Zero-width continuation of a wide glyph; the glyph itself already
        // covered this column.
        if cell.flags.contains(Flags::WIDE_CHAR_SPACER) {
            continue;
        }

        let style = style_of(cell);
        let ch = if cell.c == '\0' { ' ' } else { cell.c };
        if ch != ' ' || !style.is_default() {
            all_empty = false;
        }

        if last_style != Some(style) {
            out.push_str(&sgr(&style));
            last_style = Some(style);
        }
        out.push(ch);
        if let Some(extra) = cell.zerowidth() {
            out.extend(extra);
        }
    }

    if all_empty {
        return Vec::new();
    }

    out.push_str(crate::ansi::RESET);
    out.into_bytes()
}

/// Render the visible window of the buffer.
///
/// `start = max(0, base_y - scroll_offset)`; produces
/// `min(visible_rows, emulator.rows)` lines, absent rows as empty slices.
pub fn render_buffer(emu: &Emulator, scroll_offset: usize, visible_rows: usize) -> Vec<Vec<u8>> {
    let start = emu.base_y().saturating_sub(scroll_offset);
    let count = visible_rows.min(emu.rows() as usize);
    (0..count).map(|i| render_line(emu, start + i)).collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn render_str(emu: &Emulator, abs_row: usize) -> String {
        String::from_utf8(render_line(emu, abs_row)).unwrap()
    }

    #[test]
    fn test_plain_text_single_sgr_run() {
        let mut emu = Emulator::new(10, 3);
        emu.write(b"ab");
        let line = render_str(&emu, 0);
        // One default SGR for the whole run, a trailing reset.
        assert!(line.starts_with("\x1b[0mab"));
        assert!(line.ends_with("\x1b[0m"));
        assert_eq!(line.matches("\x1b[0m").count(), 2);
    }

    #[test]
    fn test_empty_line_suppressed() {
        let emu = Emulator::new(10, 3);
        assert!(render_line(&emu, 1).is_empty());
    }

    #[test]
    fn test_style_change_emits_new_sgr() {
        let mut emu = Emulator::new(16, 3);
        emu.write(b"\x1b[1;31mX\x1b[0mY");
        let line = render_str(&emu, 0);
        assert!(line.contains("\x1b[0;1;31mX"));
        assert!(line.contains("\x1b[0mY"));
    }

    #[test]
    fn test_palette16_bright_mapping() {
        let mut emu = Emulator::new(10, 3);
        emu.write(b"\x1b[91mE");
        let line = render_str(&emu, 0);
        assert!(line.contains("\x1b[0;91mE"));
    }

    #[test]
    fn test_palette256_mapping() {
        let mut emu = Emulator::new(10, 3);
        emu.write(b"\x1b[38;5;196mQ");
        let line = render_str(&emu, 0);
        assert!(line.contains("\x1b[0;38;5;196mQ"));
    }

    #[test]
    fn test_truecolor_mapping() {
        let mut emu = Emulator::new(10, 3);
        emu.write(b"\x1b[38;2;12;34;56mT\x1b[48;2;1;2;3mU");
        let line = render_str(&emu, 0);
        assert!(line.contains("\x1b[0;38;2;12;34;56mT"));
        assert!(line.contains("\x1b[0;38;2;12;34;56;48;2;1;2;3mU"));
    }

    #[test]
    fn test_attribute_params() {
        let style = CellStyle {
            bold: true,
            underline: true,
            inverse: true,
            fg: Color::Palette16(2),
            bg: Color::Palette16(12),
            ..CellStyle::DEFAULT
        };
        assert_eq!(sgr(&style), "\x1b[0;1;4;7;32;104m");
    }

    #[test]
    fn test_style_roundtrip_through_emulator() {
        // Render, feed the output back through a fresh emulator, and check
        // that cell styles survive the round trip.
        let mut emu = Emulator::new(16, 3);
        emu.write(b"\x1b[3;9;33mst\x1b[0m ok");
        let rendered = render_line(&emu, 0);

        let mut decoded = Emulator::new(16, 3);
        decoded.write(&rendered);

        let orig = emu.line(0).unwrap();
        let redone = decoded.line(0).unwrap();
        for (a, b) in orig.into_iter().zip(redone.into_iter()).take(8) {
            assert_eq!(style_of(a), style_of(b));
            assert_eq!(a.c, b.c);
        }
    }

    #[test]
    fn test_render_buffer_window() {
        let mut emu = Emulator::new(10, 3);
        for i in 0..6 {
            emu.write(format!("l{i}\r\n").as_bytes());
        }
        // base_y = 4; live viewport starts at "l4".
        let live = render_buffer(&emu, 0, 3);
        assert_eq!(live.len(), 3);
        assert!(String::from_utf8_lossy(&live[0]).contains("l4"));

        // Scrolled back by 2: window starts at "l2".
        let back = render_buffer(&emu, 2, 3);
        assert!(String::from_utf8_lossy(&back[0]).contains("l2"));

        // Underflow clamps to the top of the buffer.
        let top = render_buffer(&emu, 100, 3);
        assert!(String::from_utf8_lossy(&top[0]).contains("l0"));
    }

    #[test]
    fn test_visible_rows_clamped_to_emulator_rows() {
        let emu = Emulator::new(10, 3);
        assert_eq!(render_buffer(&emu, 0, 10).len(), 3);
    }
}
