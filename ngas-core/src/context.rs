//! `ServerContext` models the process-wide state the original Python server
//! kept as mutable globals (§9 Design Notes): online/offline state, the
//! idle/busy substate, whether archiving is currently permitted, and the
//! host identity used to scope volume queries.

use std::sync::atomic::{AtomicBool, Ordering};

use tokio::sync::Mutex;

/// Top-level server state. The core only ever requires `Online`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ServerState {
    Offline,
    Online,
}

/// Server substate. Archive requests require `Idle` or `Busy`; a request
/// transitions the substate to `Busy` for its duration (not persisted to
/// the catalog, per §4.7 step 1).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ServerSubstate {
    Idle,
    Busy,
}

/// Shared, explicit replacement for the original's global server object.
/// Cloning is cheap; all fields are `Arc`-friendly interior-mutability
/// primitives so handlers can share one instance.
pub struct ServerContext {
    host_id: String,
    archiving_allowed: AtomicBool,
    state: Mutex<ServerState>,
    substate: Mutex<ServerSubstate>,
}

impl ServerContext {
    pub fn new(host_id: impl Into<String>, archiving_allowed: bool) -> Self {
        Self {
            host_id: host_id.into(),
            archiving_allowed: AtomicBool::new(archiving_allowed),
            state: Mutex::new(ServerState::Online),
            substate: Mutex::new(ServerSubstate::Idle),
        }
    }

    pub fn host_id(&self) -> &str {
        &self.host_id
    }

    pub fn archiving_allowed(&self) -> bool {
        self.archiving_allowed.load(Ordering::Relaxed)
    }

    pub fn set_archiving_allowed(&self, allowed: bool) {
        self.archiving_allowed.store(allowed, Ordering::Relaxed);
    }

    pub async fn state(&self) -> ServerState {
        *self.state.lock().await
    }

    pub async fn substate(&self) -> ServerSubstate {
        *self.substate.lock().await
    }

    pub async fn set_state(&self, state: ServerState) {
        *self.state.lock().await = state;
    }

    /// Implements the §4.7 step 1 precondition/transition: requires
    /// `Online` + (`Idle` or `Busy`), then moves the substate to `Busy`.
    /// Returns an error describing which precondition failed.
    pub async fn enter_archive_request(&self) -> Result<(), String> {
        if self.state().await != ServerState::Online {
            return Err("server is not in ONLINE state".to_string());
        }
        // Idle or Busy are both acceptable entry substates; parallel
        // handlers may already have moved the substate to Busy.
        let mut substate = self.substate.lock().await;
        *substate = ServerSubstate::Busy;
        Ok(())
    }

    /// Returns the substate to `Idle` once a request finishes, mirroring
    /// the original's `srvObj.setSubState(NGAMS_IDLE_SUBSTATE)` at the tail
    /// of a successful handler.
    pub async fn leave_archive_request(&self) {
        *self.substate.lock().await = ServerSubstate::Idle;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn archive_request_requires_online() {
        let ctx = ServerContext::new("host1", true);
        ctx.set_state(ServerState::Offline).await;
        assert!(ctx.enter_archive_request().await.is_err());
    }

    #[tokio::test]
    async fn archive_request_moves_to_busy() {
        let ctx = ServerContext::new("host1", true);
        ctx.enter_archive_request().await.unwrap();
        assert_eq!(ctx.substate().await, ServerSubstate::Busy);
        ctx.leave_archive_request().await;
        assert_eq!(ctx.substate().await, ServerSubstate::Idle);
    }
}
