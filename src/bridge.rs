use crate::{NetcamError, Result};
use crossbeam_channel::{Receiver, RecvTimeoutError, Sender};
use std::time::{Duration, Instant};

/// Default wait for a command completion before giving up.
pub const DEFAULT_COMMAND_TIMEOUT: Duration = Duration::from_secs(5);

/// One completion as delivered by the engine's event context.
struct Completion {
    epoch: u64,
    status: i32,
    body: Option<String>,
}

/// Single-use token the engine consumes to report a command's outcome.
///
/// `complete` takes `self`, so the engine cannot signal the same command
/// twice. Dropping an un-completed slot leaves the caller to time out.
pub struct CompletionSlot {
    sender: Sender<Completion>,
    epoch: u64,
}

impl CompletionSlot {
    /// Report the command outcome. Status 0 means success; any other value
    /// is the engine's error code. `body` carries the response payload text,
    /// if the command has one.
    pub fn complete(self, status: i32, body: Option<String>) {
        // The receiver may be gone if the session was dropped mid-command.
        let _ = self.sender.send(Completion {
            epoch: self.epoch,
            status,
            body,
        });
    }
}

/// Turns the engine's one-async-completion-per-command model into blocking,
/// timeout-bounded calls.
///
/// The bridge keeps one long-lived channel for the whole session. Each
/// `execute` tags its command with a fresh epoch; completions carrying an
/// older epoch (a late reply to a command we already abandoned) are
/// discarded, never matched to the current command.
pub struct CommandBridge {
    sender: Sender<Completion>,
    receiver: Receiver<Completion>,
    epoch: u64,
    timeout: Duration,
}

impl CommandBridge {
    pub fn new() -> Self {
        let (sender, receiver) = crossbeam_channel::unbounded();
        Self {
            sender,
            receiver,
            epoch: 0,
            timeout: DEFAULT_COMMAND_TIMEOUT,
        }
    }

    pub fn timeout(&self) -> Duration {
        self.timeout
    }

    pub fn set_timeout(&mut self, timeout: Duration) {
        self.timeout = timeout;
    }

    /// Issue one command and block until its completion or the timeout.
    ///
    /// `send` must hand the slot to the engine, which triggers exactly one
    /// asynchronous completion. On success the response body (if any) is
    /// returned; a non-zero engine status maps to `Protocol`; no completion
    /// within the deadline maps to `Timeout`. The bridge stays usable after
    /// any outcome, including timeout.
    pub fn execute<F>(&mut self, send: F) -> Result<Option<String>>
    where
        F: FnOnce(CompletionSlot),
    {
        self.epoch += 1;

        // Drain completions left behind by commands that timed out.
        while let Ok(stray) = self.receiver.try_recv() {
            log::warn!(
                "discarding stray completion for abandoned command {} (status {})",
                stray.epoch,
                stray.status
            );
        }

        send(CompletionSlot {
            sender: self.sender.clone(),
            epoch: self.epoch,
        });

        let deadline = Instant::now() + self.timeout;
        loop {
            match self.receiver.recv_deadline(deadline) {
                Ok(completion) if completion.epoch == self.epoch => {
                    log::debug!(
                        "command {} completed with status {}",
                        completion.epoch,
                        completion.status
                    );
                    return if completion.status == 0 {
                        Ok(completion.body)
                    } else {
                        Err(NetcamError::Protocol {
                            code: completion.status,
                            message: completion
                                .body
                                .unwrap_or_else(|| "command failed".to_string()),
                        })
                    };
                }
                Ok(stale) => {
                    log::warn!(
                        "discarding stale completion for command {} while waiting on {}",
                        stale.epoch,
                        self.epoch
                    );
                }
                // Disconnected cannot happen while we hold a sender clone.
                Err(RecvTimeoutError::Timeout) | Err(RecvTimeoutError::Disconnected) => {
                    return Err(NetcamError::Timeout);
                }
            }
        }
    }
}

impl Default for CommandBridge {
    fn default() -> Self {
        Self::new()
    }
}
