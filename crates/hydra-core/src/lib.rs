//! hydra-core: engine for the hydra terminal multiplexer.
//!
//! Architecture: portable-pty (process) + alacritty_terminal (emulation) +
//! git worktrees (per-session isolation), coordinated through an
//! event-sourced state store.
//!
//! # Components
//! - `term`: headless emulator, buffer renderer, pass-through filter
//! - `pty`: spawn/write/resize/kill for one child behind a PTY
//! - `checkout` / `git`: isolated working copies per session branch
//! - `store`: `AppState` + pure reducer
//! - `session`: per-session (emulator, PTY, checkout) runtimes and batching
//! - `status`: idle/working/waiting signal for chrome coloring

pub mod ansi;
pub mod checkout;
pub mod config;
pub mod git;
pub mod pty;
pub mod session;
pub mod status;
pub mod store;
pub mod term;

pub use checkout::{Checkout, CheckoutManager};
pub use config::HydraConfig;
pub use pty::{PtyChild, PtyEvent, PtyOptions};
pub use session::{SessionManager, SpawnSpec, PTY_BATCH_MS};
pub use status::{SessionStatus, StatusTracker, SILENCE_MS};
pub use store::{Action, AppState, Mode, Session, Store};
pub use term::{Emulator, PassthroughFilter, MAX_SCROLLBACK};
