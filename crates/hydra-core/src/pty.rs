//! PTY adapter.
//!
//! Spawn, write, resize, kill for one child process behind a pseudo-terminal,
//! on top of portable-pty. Output bytes and the exit code are read on
//! blocking tasks and delivered to the owner's event channel; all policy
//! (batching, routing, state) lives with the consumer.

use std::io::{Read, Write};
use std::path::PathBuf;

use anyhow::{Context, Result};
use portable_pty::{native_pty_system, ChildKiller, CommandBuilder, MasterPty, PtySize};
use tokio::sync::mpsc;
use tracing::{debug, error, info};

/// Events delivered from the PTY read/wait tasks.
#[derive(Debug)]
pub enum PtyEvent {
    /// Raw output bytes, in FIFO order per session.
    Data { session_id: String, chunk: Vec<u8> },
    /// Child exited; no further Data events follow for this session.
    Exited { session_id: String, code: i32 },
}

/// How to spawn the wrapped child.
#[derive(Debug, Clone)]
pub struct PtyOptions {
    pub command: String,
    pub args: Vec<String>,
    pub cwd: PathBuf,
    pub env: Vec<(String, String)>,
    pub cols: u16,
    pub rows: u16,
}

/// A live PTY child: master side handles plus a kill handle.
pub struct PtyChild {
    master: Box<dyn MasterPty + Send>,
    writer: Box<dyn Write + Send>,
    killer: Box<dyn ChildKiller + Send + Sync>,
}

impl PtyChild {
    /// Spawn the configured command under a fresh PTY and start the blocking
    /// reader and exit-wait tasks. Must be called within a tokio runtime.
    pub fn spawn(
        session_id: &str,
        options: &PtyOptions,
        event_tx: mpsc::UnboundedSender<PtyEvent>,
    ) -> Result<Self> {
        let pty_system = native_pty_system();
        let pair = pty_system
            .openpty(PtySize {
                rows: options.rows,
                cols: options.cols,
                pixel_width: 0,
                pixel_height: 0,
            })
            .context("failed to open PTY")?;

        let mut cmd = CommandBuilder::new(&options.command);
        cmd.args(&options.args);
        cmd.cwd(&options.cwd);

        // portable-pty's CommandBuilder starts with an empty environment, so
        // inherit everything from the parent before applying overrides.
        for (key, value) in std::env::vars() {
            cmd.env(key, value);
        }
        cmd.env("TERM", "xterm-256color");
        cmd.env("COLORTERM", "truecolor");
        for (key, value) in &options.env {
            cmd.env(key, value);
        }

        let mut child = pair
            .slave
            .spawn_command(cmd)
            .with_context(|| format!("failed to spawn `{}`", options.command))?;
        let pid = child.process_id();
        let killer = child.clone_killer();

        let writer = pair.master.take_writer().context("PTY writer unavailable")?;
        let reader = pair
            .master
            .try_clone_reader()
            .context("PTY reader unavailable")?;

        info!(session_id = %session_id, pid = ?pid, command = %options.command, "PTY spawned");

        Self::spawn_read_task(session_id.to_string(), reader, event_tx.clone());

        // Wait for child exit in the blocking pool.
        let exit_session = session_id.to_string();
        tokio::task::spawn_blocking(move || {
            let code = match child.wait() {
                Ok(status) => status.exit_code() as i32,
                Err(e) => {
                    error!(session_id = %exit_session, error = %e, "PTY wait failed");
                    -1
                }
            };
            info!(session_id = %exit_session, exit_code = code, "PTY exited");
            let _ = event_tx.send(PtyEvent::Exited {
                session_id: exit_session,
                code,
            });
        });

        Ok(Self {
            master: pair.master,
            writer,
            killer,
        })
    }

    fn spawn_read_task(
        session_id: String,
        mut reader: Box<dyn Read + Send>,
        event_tx: mpsc::UnboundedSender<PtyEvent>,
    ) {
        tokio::task::spawn_blocking(move || {
            let mut buf = [0u8; 4096];
            loop {
                match reader.read(&mut buf) {
                    Ok(0) => break,
                    Ok(n) => {
                        if event_tx
                            .send(PtyEvent::Data {
                                session_id: session_id.clone(),
                                chunk: buf[..n].to_vec(),
                            })
                            .is_err()
                        {
                            break;
                        }
                    }
                    Err(e) => {
                        debug!(session_id = %session_id, error = %e, "PTY read ended");
                        break;
                    }
                }
            }
        });
    }

    pub fn write(&mut self, bytes: &[u8]) -> Result<()> {
        self.writer.write_all(bytes)?;
        self.writer.flush()?;
        Ok(())
    }

    pub fn resize(&mut self, cols: u16, rows: u16) -> Result<()> {
        self.master
            .resize(PtySize {
                rows,
                cols,
                pixel_width: 0,
                pixel_height: 0,
            })
            .context("PTY resize failed")
    }

    /// Best-effort kill; the exit-wait task reports the final code.
    pub fn kill(&mut self) {
        if let Err(e) = self.killer.kill() {
            debug!(error = %e, "PTY kill failed (child may already be gone)");
        }
    }
}
