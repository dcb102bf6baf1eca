//! Session teardown
//!
//! Owns the resources that must be released however the shell ends: the
//! command history and, in simulation mode, the device loop. Normal exit and
//! the Ctrl-C watcher both call [`Session::shutdown`]; only the first call
//! does any work.

use std::io::{self, Write};
use std::sync::{Arc, Mutex, MutexGuard};
use std::thread::{self, JoinHandle};

use mm_sim::{DeviceLoopHandle, LoopHealth};
use tracing::{debug, info, warn};

use crate::error::ShellError;
use crate::history::History;

/// Resources released when the shell ends, shared with the Ctrl-C watcher
pub struct Session {
    history: History,
    device: Mutex<Option<DeviceLoopHandle>>,
}

impl Session {
    /// `device` is the simulated device loop, if any
    pub fn new(history: History, device: Option<DeviceLoopHandle>) -> Self {
        Self {
            history,
            device: Mutex::new(device),
        }
    }

    /// Command history saved on shutdown
    pub fn history(&self) -> &History {
        &self.history
    }

    fn device(&self) -> MutexGuard<'_, Option<DeviceLoopHandle>> {
        self.device.lock().unwrap_or_else(|e| e.into_inner())
    }

    /// Health of the simulated device loop
    pub fn health(&self) -> Option<LoopHealth> {
        self.device().as_ref().map(DeviceLoopHandle::health)
    }

    /// Whether a simulated device loop is still running
    pub fn device_running(&self) -> bool {
        self.device()
            .as_ref()
            .is_some_and(DeviceLoopHandle::is_running)
    }

    /// Write the history and stop the device loop
    ///
    /// Safe to call more than once and from more than one thread. A history
    /// write failure is logged; a device loop failure is returned.
    pub fn shutdown(&self) -> Result<(), ShellError> {
        match self.history.write_once() {
            Ok(true) => debug!("History saved"),
            Ok(false) => {}
            Err(e) => warn!("Could not save history: {}", e),
        }

        match self.device().as_mut() {
            Some(handle) => handle.stop().map_err(ShellError::from),
            None => Ok(()),
        }
    }
}

/// Shut the session down after an interrupt
///
/// Prints a blank line so the shell prompt is not left dangling.
pub fn handle_interrupt(session: &Session, out: &mut dyn Write) -> Result<(), ShellError> {
    info!("Interrupted");
    let result = session.shutdown();
    writeln!(out)?;
    out.flush()?;
    result
}

/// Watch for Ctrl-C on a background thread
///
/// On interrupt the session is shut down and the process exits with status 0.
pub fn spawn_interrupt_watcher(session: Arc<Session>) -> io::Result<JoinHandle<()>> {
    thread::Builder::new()
        .name("interrupt-watcher".to_string())
        .spawn(move || {
            let runtime = match tokio::runtime::Builder::new_current_thread()
                .enable_all()
                .build()
            {
                Ok(runtime) => runtime,
                Err(e) => {
                    warn!("Interrupt handling unavailable: {}", e);
                    return;
                }
            };

            if let Err(e) = runtime.block_on(tokio::signal::ctrl_c()) {
                warn!("Failed to listen for Ctrl-C: {}", e);
                return;
            }

            let code = match handle_interrupt(&session, &mut io::stdout()) {
                Ok(()) => 0,
                Err(e) => {
                    eprintln!("Error: {}", e);
                    2
                }
            };
            std::process::exit(code);
        })
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::time::Duration;

    use mm_sim::DeviceLoop;
    use tempfile::TempDir;

    fn idle_loop(iterations: Arc<AtomicUsize>) -> DeviceLoopHandle {
        DeviceLoop::start((), move |_: &mut ()| {
            iterations.fetch_add(1, Ordering::SeqCst);
            thread::sleep(Duration::from_millis(5));
            Ok(())
        })
        .unwrap()
    }

    #[test]
    fn test_shutdown_twice() {
        let dir = TempDir::new().unwrap();
        let history = History::load(dir.path().join("hist"));
        history.push("version");

        let iterations = Arc::new(AtomicUsize::new(0));
        let session = Session::new(history.clone(), Some(idle_loop(iterations.clone())));
        assert!(session.device_running());

        session.shutdown().unwrap();
        session.shutdown().unwrap();

        assert!(!session.device_running());
        assert_eq!(history.write_count(), 1);

        let after = iterations.load(Ordering::SeqCst);
        thread::sleep(Duration::from_millis(30));
        assert_eq!(iterations.load(Ordering::SeqCst), after);
    }

    #[test]
    fn test_interrupt_prints_blank_line() {
        let session = Session::new(History::in_memory(), None);
        let mut out = Vec::new();
        handle_interrupt(&session, &mut out).unwrap();
        assert_eq!(out, b"\n");
        assert!(session.health().is_none());
    }
}
