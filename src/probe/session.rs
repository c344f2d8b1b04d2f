//! # Session capability.
//!
//! A [`Session`] owns backend discovery, probe geolocation and experiment
//! construction. It is created once per run by a [`SessionBuilder`] from a
//! [`SessionConfig`] derived from the host settings.

use std::path::PathBuf;
use std::sync::Arc;

use async_trait::async_trait;
use tokio_util::sync::CancellationToken;

use crate::error::ProbeError;
use crate::probe::experiment::ExperimentBuilder;
use crate::probe::kvstore::KeyValueStore;
use crate::probe::proxy::ProxyUrl;

/// A backend service entry.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProbeService {
    /// Transport kind (`"https"`, ...).
    pub kind: String,
    /// Base URL.
    pub address: String,
}

impl ProbeService {
    /// Creates an `https` service entry.
    pub fn https(address: impl Into<String>) -> Self {
        Self {
            kind: "https".to_string(),
            address: address.into(),
        }
    }
}

/// Everything a session needs to bootstrap.
#[derive(Clone)]
pub struct SessionConfig {
    /// Persistent key-value store rooted at `state_dir`.
    pub kv_store: Arc<dyn KeyValueStore>,
    /// Validated proxy, if any.
    pub proxy: Option<ProxyUrl>,
    pub software_name: String,
    pub software_version: String,
    pub temp_dir: PathBuf,
    pub tunnel_dir: PathBuf,
    /// Explicit backends; empty means "discover them".
    pub available_probe_services: Vec<ProbeService>,
}

impl std::fmt::Debug for SessionConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SessionConfig")
            .field("proxy", &self.proxy)
            .field("software_name", &self.software_name)
            .field("software_version", &self.software_version)
            .field("temp_dir", &self.temp_dir)
            .field("tunnel_dir", &self.tunnel_dir)
            .field("available_probe_services", &self.available_probe_services)
            .finish_non_exhaustive()
    }
}

/// Facts resolved by [`Session::lookup_location`].
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ProbeLocation {
    pub probe_ip: String,
    pub probe_asn: String,
    pub probe_cc: String,
    pub probe_network_name: String,
    pub resolver_asn: String,
    pub resolver_ip: String,
    pub resolver_network_name: String,
}

/// # Creates sessions.
///
/// Injected into [`Task`](crate::Task) and [`TaskArena`](crate::TaskArena); the
/// runner calls it once per run after validating the settings.
#[async_trait]
pub trait SessionBuilder: Send + Sync + 'static {
    /// Builds a new session, honoring cancellation of `ctx`.
    async fn new_session(
        &self,
        ctx: &CancellationToken,
        config: SessionConfig,
    ) -> Result<Box<dyn Session>, ProbeError>;
}

/// # Bootstrap, lookup and experiment factory.
#[async_trait]
pub trait Session: Send + Sync {
    /// Discovers the backends (or validates the configured override).
    async fn lookup_backends(&self, ctx: &CancellationToken) -> Result<(), ProbeError>;

    /// Resolves probe IP/ASN/CC and resolver facts.
    ///
    /// One lookup backs all derived facts, so a failure invalidates all of them.
    async fn lookup_location(&self, ctx: &CancellationToken) -> Result<(), ProbeError>;

    /// Returns the facts resolved by [`lookup_location`](Self::lookup_location).
    fn location(&self) -> ProbeLocation;

    /// Creates the builder for experiment `name`.
    fn new_experiment_builder(&self, name: &str) -> Result<Box<dyn ExperimentBuilder>, ProbeError>;

    /// Releases session resources.
    async fn close(&self) -> Result<(), ProbeError>;
}
