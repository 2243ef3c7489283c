//! Single-fire stop signal
//!
//! [`StopSignal`] is the writer half and may be fired any number of times;
//! only the first call has an effect. [`StopListener`] is the single reader.
//! Dropping every writer without firing also releases the listener, so a
//! run that unwinds early never leaves the sampler waiting forever.

use parking_lot::Mutex;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tokio::sync::oneshot;

/// Create a connected signal/listener pair
pub fn stop_signal() -> (StopSignal, StopListener) {
    let (tx, rx) = oneshot::channel();
    let fired = Arc::new(AtomicBool::new(false));

    let signal = StopSignal {
        fired: fired.clone(),
        tx: Arc::new(Mutex::new(Some(tx))),
    };
    let listener = StopListener {
        fired,
        rx: Some(rx),
    };

    (signal, listener)
}

/// Writer half of the stop signal
#[derive(Clone)]
pub struct StopSignal {
    fired: Arc<AtomicBool>,
    tx: Arc<Mutex<Option<oneshot::Sender<()>>>>,
}

impl StopSignal {
    /// Fire the signal.
    ///
    /// Returns `true` for the call that actually fired it and `false` for
    /// every later call.
    pub fn fire(&self) -> bool {
        let Some(tx) = self.tx.lock().take() else {
            return false;
        };
        self.fired.store(true, Ordering::SeqCst);
        // Listener may already be gone; the flag still records the fire.
        let _ = tx.send(());
        true
    }

    pub fn is_fired(&self) -> bool {
        self.fired.load(Ordering::SeqCst)
    }
}

impl std::fmt::Debug for StopSignal {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("StopSignal")
            .field("fired", &self.is_fired())
            .finish()
    }
}

/// Reader half of the stop signal
#[derive(Debug)]
pub struct StopListener {
    fired: Arc<AtomicBool>,
    rx: Option<oneshot::Receiver<()>>,
}

impl StopListener {
    /// Wait until the signal fires or every writer is dropped.
    ///
    /// Cancel safe, and returns immediately on every call after the first
    /// completion.
    pub async fn fired(&mut self) {
        if let Some(rx) = self.rx.as_mut() {
            let _ = rx.await;
            self.rx = None;
        }
    }

    /// Whether the signal has fired, without waiting
    pub fn is_fired(&self) -> bool {
        self.rx.is_none() || self.fired.load(Ordering::SeqCst)
    }
}
