//! Pass-through byte filter.
//!
//! The compositor streams raw PTY bytes straight to the host terminal. A
//! small set of sequences would destabilize the shared screen and are
//! rewritten or dropped before they reach stdout:
//!
//! - DECSTBM is replaced with the compositor's own scroll region, so a child
//!   can never widen the region into the chrome rows.
//! - Alternate-screen toggles (1049/47/1047) are stripped; the host stays on
//!   the primary buffer where its native scrollback lives.
//! - Focus reporting (1004), Kitty keyboard protocol, cursor-position report
//!   and device-attribute queries are stripped; replies would land in the
//!   multiplexer's stdin, not the child's.
//!
//! The filter is resumable: a CSI sequence split across read chunks is held
//! in `pending` until its final byte arrives. Everything else, including OSC
//! payloads, passes through untouched.

/// Stateful filter for one pass-through stream.
#[derive(Debug, Default)]
pub struct PassthroughFilter {
    pending: Vec<u8>,
}

impl PassthroughFilter {
    pub fn new() -> Self {
        Self::default()
    }

    /// Drop any buffered partial sequence. Called on session switch so the
    /// next stream starts from a known state.
    pub fn reset(&mut self) {
        self.pending.clear();
    }

    /// Filter a chunk, rewriting DECSTBM to `[1, inner_rows]`.
    pub fn feed(&mut self, chunk: &[u8], inner_rows: u16) -> Vec<u8> {
        let data: Vec<u8> = if self.pending.is_empty() {
            chunk.to_vec()
        } else {
            let mut joined = std::mem::take(&mut self.pending);
            joined.extend_from_slice(chunk);
            joined
        };

        let mut out = Vec::with_capacity(data.len());
        let mut i = 0;

        while i < data.len() {
            if data[i] != 0x1b {
                // Copy a plain run up to the next ESC.
                let start = i;
                while i < data.len() && data[i] != 0x1b {
                    i += 1;
                }
                out.extend_from_slice(&data[start..i]);
                continue;
            }

            // ESC at the very end: can't classify yet.
            if i + 1 >= data.len() {
                self.pending.extend_from_slice(&data[i..]);
                break;
            }

            if data[i + 1] != b'[' {
                // Not CSI (OSC, charset, DECSC, ...): pass the introducer and
                // let the payload flow as plain bytes.
                out.extend_from_slice(&data[i..i + 2]);
                i += 2;
                continue;
            }

            // CSI: scan parameter/intermediate bytes to the final byte.
            let seq_start = i;
            let mut j = i + 2;
            while j < data.len() && (0x20..0x40).contains(&data[j]) {
                j += 1;
            }
            if j >= data.len() {
                // Incomplete sequence; hold it for the next chunk.
                self.pending.extend_from_slice(&data[seq_start..]);
                break;
            }

            let body = &data[i + 2..j];
            let final_byte = data[j];
            i = j + 1;

            match classify(body, final_byte) {
                CsiAction::Pass => out.extend_from_slice(&data[seq_start..i]),
                CsiAction::Drop => {}
                CsiAction::RewriteScrollRegion => {
                    out.extend_from_slice(
                        crate::ansi::set_scroll_region(1, inner_rows).as_bytes(),
                    );
                }
            }
        }

        out
    }
}

enum CsiAction {
    Pass,
    Drop,
    RewriteScrollRegion,
}

/// Private modes that must never reach the host terminal.
const STRIPPED_PRIVATE_MODES: &[&[u8]] = &[b"1049", b"47", b"1047", b"1004"];

fn classify(body: &[u8], final_byte: u8) -> CsiAction {
    match final_byte {
        // DECSTBM in any form.
        b'r' => CsiAction::RewriteScrollRegion,
        // DECSET/DECRST: strip alt-screen and focus-reporting toggles only.
        b'h' | b'l' if body.first() == Some(&b'?') => {
            let params = &body[1..];
            let stripped = params
                .split(|&b| b == b';')
                .any(|p| STRIPPED_PRIVATE_MODES.contains(&p));
            if stripped {
                CsiAction::Drop
            } else {
                CsiAction::Pass
            }
        }
        // Kitty keyboard protocol (CSI > flags u / CSI < u / CSI = u / CSI ? u).
        b'u' if matches!(body.first(), Some(&(b'>' | b'<' | b'=' | b'?'))) => CsiAction::Drop,
        // DSR 6, cursor position report request; the reply would hit our stdin.
        b'n' if body == b"6" => CsiAction::Drop,
        // DA1/DA2/DA3 queries.
        b'c' if body.is_empty() || matches!(body.first(), Some(&(b'>' | b'=' | b'0'))) => {
            CsiAction::Drop
        }
        _ => CsiAction::Pass,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn feed_str(filter: &mut PassthroughFilter, input: &str, inner: u16) -> String {
        String::from_utf8(filter.feed(input.as_bytes(), inner)).unwrap()
    }

    #[test]
    fn test_plain_text_untouched() {
        let mut f = PassthroughFilter::new();
        assert_eq!(feed_str(&mut f, "hello world", 21), "hello world");
    }

    #[test]
    fn test_alt_screen_stripped() {
        // Literal scenario: the host terminal never enters the alt screen.
        let mut f = PassthroughFilter::new();
        assert_eq!(feed_str(&mut f, "X\x1b[?1049hY\x1b[?1049lZ", 21), "XYZ");
        assert_eq!(feed_str(&mut f, "\x1b[?47h\x1b[?1047l", 21), "");
    }

    #[test]
    fn test_focus_reporting_stripped() {
        let mut f = PassthroughFilter::new();
        assert_eq!(feed_str(&mut f, "\x1b[?1004ha\x1b[?1004l", 21), "a");
    }

    #[test]
    fn test_decstbm_rewritten() {
        let mut f = PassthroughFilter::new();
        assert_eq!(feed_str(&mut f, "\x1b[5;20r", 30), "\x1b[1;30r");
        assert_eq!(feed_str(&mut f, "\x1b[r", 30), "\x1b[1;30r");
    }

    #[test]
    fn test_kitty_keyboard_stripped() {
        let mut f = PassthroughFilter::new();
        assert_eq!(feed_str(&mut f, "\x1b[>1u.\x1b[<u.\x1b[?u", 21), "..");
    }

    #[test]
    fn test_dsr_and_da_stripped() {
        let mut f = PassthroughFilter::new();
        assert_eq!(feed_str(&mut f, "a\x1b[6nb\x1b[cc\x1b[>cd\x1b[0ce", 21), "abcde");
    }

    #[test]
    fn test_sgr_and_cursor_pass() {
        let mut f = PassthroughFilter::new();
        let input = "\x1b[1;31mred\x1b[0m\x1b[2J\x1b[3;4H";
        assert_eq!(feed_str(&mut f, input, 21), input);
    }

    #[test]
    fn test_other_private_modes_pass() {
        // Cursor-key mode, bracketed paste, mouse tracking stay with the child.
        let mut f = PassthroughFilter::new();
        let input = "\x1b[?1h\x1b[?2004h\x1b[?1000l";
        assert_eq!(feed_str(&mut f, input, 21), input);
    }

    #[test]
    fn test_sequence_split_across_chunks() {
        let mut f = PassthroughFilter::new();
        assert_eq!(feed_str(&mut f, "A\x1b[?10", 21), "A");
        assert_eq!(feed_str(&mut f, "49hB", 21), "B");
    }

    #[test]
    fn test_lone_esc_held_then_flushed() {
        let mut f = PassthroughFilter::new();
        assert_eq!(feed_str(&mut f, "x\x1b", 21), "x");
        assert_eq!(feed_str(&mut f, "[5;10r", 21), "\x1b[1;21r");
    }

    #[test]
    fn test_osc_passes_through() {
        let mut f = PassthroughFilter::new();
        let input = "\x1b]0;title\x07after";
        assert_eq!(feed_str(&mut f, input, 21), input);
    }

    #[test]
    fn test_reset_drops_partial() {
        let mut f = PassthroughFilter::new();
        feed_str(&mut f, "\x1b[?10", 21);
        f.reset();
        assert_eq!(feed_str(&mut f, "plain", 21), "plain");
    }
}
