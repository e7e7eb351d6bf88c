// shutdown.rs — one cancellation signal for every loop
//
// Triggering closes the internal channel, so any thread selecting on
// `channel()` wakes immediately; pollers read the flag. Triggering twice
// is a no-op.

use crossbeam::channel::{bounded, Receiver, Sender};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};

pub struct ShutdownTrigger {
    flag: Arc<AtomicBool>,
    tx: Mutex<Option<Sender<()>>>,
}

#[derive(Clone)]
pub struct ShutdownToken {
    flag: Arc<AtomicBool>,
    rx: Receiver<()>,
}

pub fn shutdown_pair() -> (ShutdownTrigger, ShutdownToken) {
    let flag = Arc::new(AtomicBool::new(false));
    let (tx, rx) = bounded::<()>(0);
    (
        ShutdownTrigger {
            flag: Arc::clone(&flag),
            tx: Mutex::new(Some(tx)),
        },
        ShutdownToken { flag, rx },
    )
}

impl ShutdownTrigger {
    pub fn trigger(&self) {
        self.flag.store(true, Ordering::SeqCst);
        // Dropping the sole sender closes the channel and wakes every
        // selector.
        if let Ok(mut tx) = self.tx.lock() {
            tx.take();
        }
    }
}

impl ShutdownToken {
    pub fn is_shutdown(&self) -> bool {
        self.flag.load(Ordering::SeqCst)
    }

    /// Receiver that errors out (and therefore fires in a select) once
    /// shutdown is triggered.
    pub fn channel(&self) -> &Receiver<()> {
        &self.rx
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crossbeam::channel::RecvTimeoutError;
    use std::time::Duration;

    #[test]
    fn trigger_is_observable_and_idempotent() {
        let (trigger, token) = shutdown_pair();
        assert!(!token.is_shutdown());
        assert_eq!(
            token.channel().recv_timeout(Duration::from_millis(10)),
            Err(RecvTimeoutError::Timeout)
        );

        trigger.trigger();
        trigger.trigger();
        assert!(token.is_shutdown());
        // Closed channel: recv fails immediately.
        assert_eq!(
            token.channel().recv_timeout(Duration::from_millis(10)),
            Err(RecvTimeoutError::Disconnected)
        );
    }

    #[test]
    fn clones_share_the_signal() {
        let (trigger, token) = shutdown_pair();
        let other = token.clone();
        trigger.trigger();
        assert!(other.is_shutdown());
    }
}
