//! The plugin worker pipe.
//!
//! Long-running plugin work must not stall the control loop, so it runs
//! on its own task or thread and hands finished lines back through this
//! one-directional pipe. `push_data` never blocks; the loop drains at
//! most one message per tick, which also rate-limits chatty workers.

use tokio::sync::mpsc;

/// Sending half of the worker pipe. Cheap to clone, safe to hand to
/// background tasks and threads.
#[derive(Debug, Clone)]
pub struct WorkerPipe {
    tx: mpsc::UnboundedSender<String>,
}

impl WorkerPipe {
    /// Queue a raw protocol line for the loop to send.
    ///
    /// Never blocks. If the connection is gone the line is dropped,
    /// which is the correct outcome for a worker outliving its session.
    pub fn push_data(&self, line: impl Into<String>) {
        let _ = self.tx.send(line.into());
    }
}

/// Create a connected pipe: the handle for workers and the receiving
/// end for the control loop.
pub fn worker_pipe() -> (WorkerPipe, mpsc::UnboundedReceiver<String>) {
    let (tx, rx) = mpsc::unbounded_channel();
    (WorkerPipe { tx }, rx)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_push_never_blocks() {
        let (pipe, mut rx) = worker_pipe();
        for i in 0..1000 {
            pipe.push_data(format!("PRIVMSG #c :line {}", i));
        }
        assert_eq!(rx.try_recv().unwrap(), "PRIVMSG #c :line 0");
    }

    #[test]
    fn test_push_after_receiver_dropped_is_ignored() {
        let (pipe, rx) = worker_pipe();
        drop(rx);
        pipe.push_data("PRIVMSG #c :too late");
    }
}
