//! Mutation workers and shutdown coordination
//!
//! Filtered rewrites run on a dedicated, named thread while the caller
//! blocks on it. Every mutating store operation holds a [`MutationToken`] for
//! its whole duration so a host shutting down can wait for it to finish.
//!
//! The store never installs a signal handler. A host that wants graceful
//! termination wires its own handler to the [`ShutdownHook`]:
//!
//! ```no_run
//! # fn demo(store: &rowvault::RowStore) {
//! let hook = store.shutdown_hook();
//! // from the host's termination handler:
//! hook.request_shutdown();
//! hook.await_in_flight_mutation();
//! std::process::exit(0);
//! # }
//! ```

use std::any::Any;
use std::sync::Arc;

use parking_lot::{Condvar, Mutex};
use tracing::debug;

use crate::error::{Result, VaultError};

#[derive(Debug, Default)]
struct GateState {
    in_flight: usize,
    shutdown_requested: bool,
}

/// Counts in-flight mutations and refuses new ones after shutdown
#[derive(Debug, Default)]
pub(crate) struct MutationGate {
    state: Mutex<GateState>,
    idle: Condvar,
}

impl MutationGate {
    /// Register a mutation; fails `ShuttingDown` once shutdown was requested
    pub(crate) fn begin(&self) -> Result<MutationToken<'_>> {
        let mut state = self.state.lock();
        if state.shutdown_requested {
            return Err(VaultError::ShuttingDown);
        }
        state.in_flight += 1;
        Ok(MutationToken { gate: self })
    }

    fn finish(&self) {
        let mut state = self.state.lock();
        state.in_flight -= 1;
        if state.in_flight == 0 {
            self.idle.notify_all();
        }
    }
}

/// Held by a mutating operation for its whole duration
pub(crate) struct MutationToken<'a> {
    gate: &'a MutationGate,
}

impl Drop for MutationToken<'_> {
    fn drop(&mut self) {
        self.gate.finish();
    }
}

/// Cloneable handle a host uses to shut the store down gracefully
#[derive(Debug, Clone)]
pub struct ShutdownHook {
    gate: Arc<MutationGate>,
}

impl ShutdownHook {
    pub(crate) fn new(gate: Arc<MutationGate>) -> Self {
        Self { gate }
    }

    /// Refuse every mutation that has not started yet
    pub fn request_shutdown(&self) {
        self.gate.state.lock().shutdown_requested = true;
        debug!("Shutdown requested");
    }

    pub fn is_shutdown_requested(&self) -> bool {
        self.gate.state.lock().shutdown_requested
    }

    /// Number of mutations currently running
    pub fn in_flight(&self) -> usize {
        self.gate.state.lock().in_flight
    }

    /// Block until no mutation is running. In-flight rewrites are never
    /// cancelled; this only waits for them.
    pub fn await_in_flight_mutation(&self) {
        let mut state = self.gate.state.lock();
        while state.in_flight > 0 {
            self.gate.idle.wait(&mut state);
        }
    }
}

/// Run `f` on a dedicated worker thread and block until it returns
pub(crate) fn run_on_worker<T, F>(label: &str, f: F) -> Result<T>
where
    T: Send,
    F: FnOnce() -> Result<T> + Send,
{
    let outcome = crossbeam::thread::scope(|scope| -> Result<T> {
        let handle = scope
            .builder()
            .name(format!("rowvault-{}", label))
            .spawn(move |_| f())?;

        handle
            .join()
            .map_err(|panic| VaultError::WorkerPanicked(panic_message(panic.as_ref())))?
    });

    match outcome {
        Ok(result) => result,
        Err(panic) => Err(VaultError::WorkerPanicked(panic_message(panic.as_ref()))),
    }
}

fn panic_message(panic: &(dyn Any + Send)) -> String {
    if let Some(s) = panic.downcast_ref::<&str>() {
        s.to_string()
    } else if let Some(s) = panic.downcast_ref::<String>() {
        s.clone()
    } else {
        "unknown panic".to_string()
    }
}
