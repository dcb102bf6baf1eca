//! Background device loop
//!
//! Runs a device-emulation body repeatedly on its own thread, bound to one
//! transport endpoint, until cancelled. Cancellation is cooperative: the body
//! finishes its current iteration, then the thread exits.
//!
//! A body that returns an error or panics terminates the loop. The failure is
//! recorded and reported through [`LoopHealth::check`] and
//! [`DeviceLoopHandle::stop`]; the loop is never restarted.

use std::any::Any;
use std::panic::{self, AssertUnwindSafe};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use std::thread::{self, JoinHandle};

use tracing::{debug, error, info};

use crate::error::SimError;

/// Shared cancellation flag
#[derive(Debug, Clone, Default)]
pub struct CancelToken(Arc<AtomicBool>);

impl CancelToken {
    /// Create a token that is not cancelled
    pub fn new() -> Self {
        Self::default()
    }

    /// Request cancellation; returns `true` only for the first request
    pub fn cancel(&self) -> bool {
        !self.0.swap(true, Ordering::SeqCst)
    }

    /// Whether cancellation was requested
    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }
}

#[derive(Debug, Default)]
struct LoopState {
    failure: Mutex<Option<String>>,
    finished: AtomicBool,
}

impl LoopState {
    fn fail(&self, reason: String) {
        let mut failure = self.failure.lock().unwrap_or_else(|e| e.into_inner());
        failure.get_or_insert(reason);
    }

    fn failure(&self) -> Option<String> {
        self.failure
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .clone()
    }
}

/// Marks the loop finished however the thread exits
struct FinishGuard(Arc<LoopState>);

impl Drop for FinishGuard {
    fn drop(&mut self) {
        self.0.finished.store(true, Ordering::SeqCst);
    }
}

/// Cloneable observer of a running device loop
#[derive(Debug, Clone)]
pub struct LoopHealth {
    state: Arc<LoopState>,
    cancel: CancelToken,
}

impl LoopHealth {
    /// Report a crashed or unexpectedly exited loop
    pub fn check(&self) -> Result<(), SimError> {
        if let Some(reason) = self.state.failure() {
            return Err(SimError::DeviceFailed(reason));
        }
        if self.state.finished.load(Ordering::SeqCst) && !self.cancel.is_cancelled() {
            return Err(SimError::DeviceFailed(
                "device loop exited unexpectedly".to_string(),
            ));
        }
        Ok(())
    }

    /// Whether the loop thread is still running
    pub fn is_running(&self) -> bool {
        !self.state.finished.load(Ordering::SeqCst)
    }
}

/// Entry point for starting device loops
pub struct DeviceLoop;

impl DeviceLoop {
    /// Start running `body` against `endpoint` on a new thread
    ///
    /// Returns immediately. The thread owns the endpoint until it exits.
    pub fn start<E, F>(endpoint: E, body: F) -> Result<DeviceLoopHandle, SimError>
    where
        E: Send + 'static,
        F: FnMut(&mut E) -> Result<(), SimError> + Send + 'static,
    {
        let cancel = CancelToken::new();
        let state = Arc::new(LoopState::default());

        let thread = thread::Builder::new()
            .name("mock-device".to_string())
            .spawn({
                let cancel = cancel.clone();
                let state = state.clone();
                move || run_loop(endpoint, body, cancel, state)
            })
            .map_err(|e| SimError::Spawn(e.to_string()))?;

        info!("Device loop started");
        Ok(DeviceLoopHandle {
            cancel,
            state,
            thread: Some(thread),
        })
    }
}

fn run_loop<E, F>(mut endpoint: E, mut body: F, cancel: CancelToken, state: Arc<LoopState>)
where
    F: FnMut(&mut E) -> Result<(), SimError>,
{
    let _guard = FinishGuard(state.clone());

    while !cancel.is_cancelled() {
        match panic::catch_unwind(AssertUnwindSafe(|| body(&mut endpoint))) {
            Ok(Ok(())) => {}
            Ok(Err(e)) => {
                error!("Device loop failed: {}", e);
                state.fail(e.to_string());
                break;
            }
            Err(payload) => {
                let reason = format!(
                    "device loop panicked: {}",
                    panic_message(payload.as_ref())
                );
                error!("{}", reason);
                state.fail(reason);
                break;
            }
        }
    }

    debug!("Device loop thread exiting");
}

fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        s.to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "unknown panic".to_string()
    }
}

/// Owning handle to a running device loop
///
/// Dropping the handle stops the loop.
#[derive(Debug)]
pub struct DeviceLoopHandle {
    cancel: CancelToken,
    state: Arc<LoopState>,
    thread: Option<JoinHandle<()>>,
}

impl DeviceLoopHandle {
    /// Observer that can be shared with the shell
    pub fn health(&self) -> LoopHealth {
        LoopHealth {
            state: self.state.clone(),
            cancel: self.cancel.clone(),
        }
    }

    /// Whether the loop thread is still running
    pub fn is_running(&self) -> bool {
        !self.state.finished.load(Ordering::SeqCst)
    }

    /// Cancel the loop and wait for its thread to exit
    ///
    /// Idempotent: later calls only report the recorded failure, if any.
    pub fn stop(&mut self) -> Result<(), SimError> {
        if let Some(thread) = self.thread.take() {
            if self.cancel.cancel() {
                debug!("Device loop cancellation requested");
            }
            if thread.join().is_err() {
                self.state.fail("device thread panicked".to_string());
            }
            info!("Device loop stopped");
        }

        match self.state.failure() {
            Some(reason) => Err(SimError::DeviceFailed(reason)),
            None => Ok(()),
        }
    }
}

impl Drop for DeviceLoopHandle {
    fn drop(&mut self) {
        if self.thread.is_some() {
            let _ = self.stop();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::AtomicUsize;
    use std::time::{Duration, Instant};

    fn idle(_: &mut ()) -> Result<(), SimError> {
        thread::sleep(Duration::from_millis(1));
        Ok(())
    }

    fn wait_until(mut cond: impl FnMut() -> bool) -> bool {
        let deadline = Instant::now() + Duration::from_secs(2);
        while Instant::now() < deadline {
            if cond() {
                return true;
            }
            thread::sleep(Duration::from_millis(5));
        }
        false
    }

    #[test]
    fn test_cancel_token_reports_first_cancel() {
        let token = CancelToken::new();
        assert!(!token.is_cancelled());
        assert!(token.cancel());
        assert!(!token.cancel());
        assert!(token.clone().is_cancelled());
    }

    #[test]
    fn test_start_then_stop_is_bounded() {
        let mut handle = DeviceLoop::start((), idle).unwrap();
        let health = handle.health();
        assert!(handle.is_running());

        let started = Instant::now();
        handle.stop().unwrap();
        assert!(started.elapsed() < Duration::from_secs(1));
        assert!(!handle.is_running());
        assert!(!health.is_running());
        assert!(health.check().is_ok());
    }

    #[test]
    fn test_stop_is_idempotent() {
        let mut handle = DeviceLoop::start((), idle).unwrap();
        handle.stop().unwrap();
        handle.stop().unwrap();
    }

    #[test]
    fn test_body_runs_repeatedly_on_endpoint() {
        let counter = Arc::new(AtomicUsize::new(0));
        let mut handle = DeviceLoop::start(counter.clone(), |c: &mut Arc<AtomicUsize>| {
            c.fetch_add(1, Ordering::SeqCst);
            thread::sleep(Duration::from_millis(1));
            Ok(())
        })
        .unwrap();

        assert!(wait_until(|| counter.load(Ordering::SeqCst) >= 3));
        handle.stop().unwrap();

        let after_stop = counter.load(Ordering::SeqCst);
        thread::sleep(Duration::from_millis(20));
        assert_eq!(counter.load(Ordering::SeqCst), after_stop);
    }

    #[test]
    fn test_error_in_body_is_observable() {
        let mut handle = DeviceLoop::start((), |_: &mut ()| {
            Err(SimError::Io(std::io::Error::other("endpoint gone")))
        })
        .unwrap();
        let health = handle.health();

        assert!(wait_until(|| !health.is_running()));
        let err = health.check().unwrap_err();
        assert!(matches!(err, SimError::DeviceFailed(ref r) if r.contains("endpoint gone")));

        assert!(matches!(handle.stop(), Err(SimError::DeviceFailed(_))));
        assert!(matches!(handle.stop(), Err(SimError::DeviceFailed(_))));
    }

    #[test]
    fn test_panic_in_body_is_observable() {
        let mut handle = DeviceLoop::start((), |_: &mut ()| -> Result<(), SimError> {
            panic!("decoder exploded")
        })
        .unwrap();
        let health = handle.health();

        assert!(wait_until(|| !health.is_running()));
        let err = health.check().unwrap_err();
        assert!(err.to_string().contains("decoder exploded"));
        assert!(handle.stop().is_err());
    }

    #[test]
    fn test_drop_stops_loop() {
        let handle = DeviceLoop::start((), idle).unwrap();
        let health = handle.health();
        drop(handle);
        assert!(!health.is_running());
        assert!(health.check().is_ok());
    }
}
