//! Kill-switch coordination
//!
//! Serializes every firewall-affecting operation and keeps the remembered
//! connection state consistent with what the backend has been told. The
//! daemon creates one [`FirewallCoordinator`] and shares it between request
//! handlers.

pub mod backend;

use std::collections::BTreeSet;
use std::net::IpAddr;
use std::sync::{Mutex, MutexGuard, PoisonError};

use tracing::{error, info};

use crate::error::FirewallError;
use backend::{BackendError, FirewallBackend};

/// Remembered kill-switch state
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FirewallState {
    pub enabled: bool,
    pub persistent: bool,

    /// Local tunnel address of the connected client
    pub connected_client_addr: Option<IpAddr>,

    /// Client connection is paused: its allow-rule must not be restored
    pub client_paused: bool,

    /// Hosts allowed for the lifetime of the current connection
    ///
    /// Cleared when the client disconnects or the kill-switch is disabled
    /// (the backend drops them); never re-applied on enable.
    pub ad_hoc_exceptions: BTreeSet<IpAddr>,
}

/// Thread-safe kill-switch coordinator
///
/// Each operation holds the state lock for its whole duration, including the
/// backend call, so state and backend rules always change together. State is
/// only updated after the backend call it depends on succeeded.
pub struct FirewallCoordinator<B: FirewallBackend> {
    backend: B,
    state: Mutex<FirewallState>,
}

impl<B: FirewallBackend> FirewallCoordinator<B> {
    pub fn new(backend: B) -> Self {
        Self {
            backend,
            state: Mutex::new(FirewallState::default()),
        }
    }

    pub fn backend(&self) -> &B {
        &self.backend
    }

    /// Snapshot of the current state
    pub fn state(&self) -> FirewallState {
        self.lock().clone()
    }

    /// Enable or disable the kill-switch
    ///
    /// After enabling, a remembered client that is not paused gets its
    /// allow-rule back (the backend drops it on disable). Disabling forgets
    /// the ad-hoc host exceptions.
    pub fn set_enabled(&self, enable: bool) -> Result<(), FirewallError> {
        let mut state = self.lock();

        if enable {
            info!("Enabling...");
            self.backend
                .enable()
                .map_err(|e| backend_failed("enable", e))?;
        } else {
            info!("Disabling...");
            self.backend
                .disable()
                .map_err(|e| backend_failed("disable", e))?;
            state.ad_hoc_exceptions.clear();
        }
        state.enabled = enable;

        if enable && !state.client_paused {
            if let Some(addr) = state.connected_client_addr {
                info!("Restoring client exception: {}", addr);
                self.backend
                    .allow_client(addr)
                    .map_err(|e| backend_failed("allow client", e))?;
            }
        }

        Ok(())
    }

    /// Keep the kill-switch active across disable requests and reboots
    pub fn set_persistent(&self, persistent: bool) -> Result<(), FirewallError> {
        let mut state = self.lock();
        info!("Persistent:{}", persistent);

        self.backend
            .set_persistent(persistent)
            .map_err(|e| backend_failed("set persistent", e))?;
        state.persistent = persistent;
        Ok(())
    }

    /// Query the backend; does not touch remembered state
    pub fn get_enabled(&self) -> Result<bool, FirewallError> {
        let _state = self.lock();
        info!("Getting status...");

        let enabled = self
            .backend
            .is_enabled()
            .map_err(|e| backend_failed("query status", e))?;
        info!("\t{}", enabled);
        Ok(enabled)
    }

    /// Tunnel is up with local address `addr`
    ///
    /// Replaces any previously remembered address without removing it from
    /// the backend first.
    pub fn client_connected(&self, addr: IpAddr) -> Result<(), FirewallError> {
        let mut state = self.lock();
        info!("Client connected: {}", addr);

        self.backend
            .allow_client(addr)
            .map_err(|e| backend_failed("allow client", e))?;
        state.client_paused = false;
        state.connected_client_addr = Some(addr);
        Ok(())
    }

    /// Tunnel is down; drops the client rule and connection-scoped hosts
    pub fn client_disconnected(&self) -> Result<(), FirewallError> {
        let mut state = self.lock();

        if state.connected_client_addr.is_some() {
            info!("Client disconnected");
            self.backend
                .remove_client()
                .map_err(|e| backend_failed("remove client", e))?;
            state.connected_client_addr = None;
            state.ad_hoc_exceptions.clear();
        }
        state.client_paused = false;
        Ok(())
    }

    /// Connection paused: stop restoring the client rule on re-enable
    pub fn client_paused(&self) {
        let mut state = self.lock();
        info!("Client paused");
        state.client_paused = true;
    }

    pub fn client_resumed(&self) {
        let mut state = self.lock();
        info!("Client resumed");
        state.client_paused = false;
    }

    /// Allow `hosts` for the lifetime of the current connection
    pub fn add_hosts_to_exceptions(&self, hosts: &[IpAddr]) -> Result<(), FirewallError> {
        let mut state = self.lock();
        info!("Adding hosts to exceptions: {:?}", hosts);

        self.backend
            .allow_hosts(hosts)
            .map_err(|e| backend_failed("add hosts to exceptions", e))?;
        state.ad_hoc_exceptions.extend(hosts.iter().copied());
        Ok(())
    }

    pub fn allow_lan(&self, allow_lan: bool, allow_multicast: bool) -> Result<(), FirewallError> {
        let _state = self.lock();
        info!("allowLan:{} allowMulticast:{}", allow_lan, allow_multicast);

        self.backend
            .allow_lan(allow_lan, allow_multicast)
            .map_err(|e| backend_failed("allow LAN", e))
    }

    /// Let a manually configured DNS server bypass the kill-switch
    pub fn set_manual_dns(&self, addr: IpAddr) -> Result<(), FirewallError> {
        let _state = self.lock();
        info!("Manual DNS: {}", addr);

        self.backend
            .allow_dns(addr)
            .map_err(|e| backend_failed("allow DNS", e))
    }

    // State is written only after backend success, so a poisoned lock
    // still guards consistent data.
    fn lock(&self) -> MutexGuard<'_, FirewallState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

fn backend_failed(operation: &'static str, source: BackendError) -> FirewallError {
    error!("Failed to {}: {}", operation, source);
    FirewallError::BackendOperationFailed { operation, source }
}
