//! Process-wide dev server flags.
//!
//! `SERVING` flips once the first route snapshot is ready; `SHUTDOWN` flips
//! on Ctrl+C. Request threads check both before touching the dispatcher.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, OnceLock};

use crossbeam::channel::Sender;
use tiny_http::Server;

static SERVING: AtomicBool = AtomicBool::new(false);
static SHUTDOWN: AtomicBool = AtomicBool::new(false);

/// Unblocked on Ctrl+C so `incoming_requests` returns.
static SERVER: OnceLock<Arc<Server>> = OnceLock::new();
/// Wakes the watcher thread on Ctrl+C.
static WATCHER_STOP: OnceLock<Sender<()>> = OnceLock::new();

pub fn is_serving() -> bool {
    SERVING.load(Ordering::SeqCst)
}

pub fn set_serving() {
    SERVING.store(true, Ordering::SeqCst);
}

pub fn is_shutdown() -> bool {
    SHUTDOWN.load(Ordering::Relaxed)
}

/// Install the Ctrl+C handler.
///
/// Without a registered server (build, routes) the process exits at once;
/// with one, the request loop and the watcher are asked to stop.
pub fn setup_shutdown_handler() -> anyhow::Result<()> {
    ctrlc::set_handler(|| {
        SHUTDOWN.store(true, Ordering::SeqCst);
        if let Some(stop) = WATCHER_STOP.get() {
            let _ = stop.send(());
        }
        match SERVER.get() {
            Some(server) => {
                crate::log!("serve"; "shutting down...");
                server.unblock();
            }
            None => std::process::exit(130),
        }
    })
    .map_err(|e| anyhow::anyhow!("failed to set Ctrl+C handler: {}", e))
}

/// Hand the bound server and the watcher's stop channel to the Ctrl+C
/// handler. Only the first registration counts.
pub fn register_server(server: Arc<Server>, watcher_stop: Sender<()>) {
    let _ = SERVER.set(server);
    let _ = WATCHER_STOP.set(watcher_stop);
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_serving_flag() {
        set_serving();
        assert!(is_serving());
        assert!(!is_shutdown());
    }
}
