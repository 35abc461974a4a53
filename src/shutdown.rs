//! Shutdown requests and interrupt handling.

use tokio::sync::{mpsc, watch};
use tokio::task::JoinHandle;

/// Exit code used when a second interrupt forces the process down.
pub const FORCED_EXIT_CODE: i32 = 130;

/// A one-way "please shut down" flag shared across tasks.
///
/// Clones observe the same flag. Once requested it stays requested.
///
/// # Example
///
/// ```
/// use render_drain::ShutdownSignal;
///
/// let signal = ShutdownSignal::new();
/// let observer = signal.clone();
/// signal.request();
/// assert!(observer.is_requested());
/// ```
#[derive(Debug, Clone)]
pub struct ShutdownSignal {
    tx: watch::Sender<bool>,
    rx: watch::Receiver<bool>,
}

impl Default for ShutdownSignal {
    fn default() -> Self {
        Self::new()
    }
}

impl ShutdownSignal {
    /// Creates a signal that has not been requested.
    pub fn new() -> Self {
        let (tx, rx) = watch::channel(false);
        Self { tx, rx }
    }

    /// Requests shutdown. Idempotent.
    pub fn request(&self) {
        self.tx.send_replace(true);
    }

    /// Returns `true` once shutdown was requested.
    pub fn is_requested(&self) -> bool {
        *self.rx.borrow()
    }

    /// Waits until shutdown is requested.
    pub async fn wait(&self) {
        let mut rx = self.rx.clone();
        // The sender lives in `self`, so the channel cannot close here
        let _ = rx.wait_for(|requested| *requested).await;
    }
}

/// Listens for Ctrl-C on a background task.
///
/// The first interrupt requests shutdown. A second interrupt, arriving while
/// teardown is still in progress, exits the process immediately with
/// [`FORCED_EXIT_CODE`]. One OS listener stays installed for the whole
/// process, so an interrupt between the two is never lost.
pub fn listen_for_interrupt(signal: ShutdownSignal) -> JoinHandle<()> {
    let (tx, rx) = mpsc::unbounded_channel();
    tokio::spawn(forward_os_interrupts(tx));

    tokio::spawn(async move {
        if handle_interrupts(rx, signal).await {
            std::process::exit(FORCED_EXIT_CODE);
        }
    })
}

#[cfg(unix)]
async fn forward_os_interrupts(tx: mpsc::UnboundedSender<()>) {
    use tokio::signal::unix::{signal, SignalKind};

    let mut interrupts = match signal(SignalKind::interrupt()) {
        Ok(interrupts) => interrupts,
        Err(e) => {
            tracing::error!(error = %e, "could not listen for interrupt");
            return;
        }
    };
    while interrupts.recv().await.is_some() {
        if tx.send(()).is_err() {
            break;
        }
    }
}

#[cfg(not(unix))]
async fn forward_os_interrupts(tx: mpsc::UnboundedSender<()>) {
    loop {
        if let Err(e) = tokio::signal::ctrl_c().await {
            tracing::error!(error = %e, "could not listen for interrupt");
            return;
        }
        if tx.send(()).is_err() {
            break;
        }
    }
}

/// Requests shutdown on the first interrupt. Returns `true` if a second one
/// arrives, meaning the process should exit now.
async fn handle_interrupts(
    mut interrupts: mpsc::UnboundedReceiver<()>,
    signal: ShutdownSignal,
) -> bool {
    if interrupts.recv().await.is_none() {
        return false;
    }
    tracing::warn!("interrupt received, shutting down; press Ctrl-C again to exit");
    signal.request();

    if interrupts.recv().await.is_none() {
        return false;
    }
    tracing::warn!("second interrupt received, exiting immediately");
    true
}
