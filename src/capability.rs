//! Capability Probe - Runtime detection of backend storage features
//!
//! Resolves backend-conditional behavior into an explicit [`CapabilitySet`]
//! once per run, so step logic branches on data instead of scattering
//! backend-name string comparisons.

use serde::Serialize;

use crate::backends::{DatabaseDriver, FEATURE_BINARY_JSON};

/// Features the connected backend supports, derived per connection.
///
/// Never persisted and never cached across runs: the backend can change
/// between environments.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CapabilitySet {
    /// Backend name as reported by the driver
    pub backend_name: String,
    /// Whether a distinct binary JSON column type (with indexing) is available
    pub supports_binary_json: bool,
}

impl CapabilitySet {
    /// Probe the connected backend. Read-only, side-effect-free, infallible:
    /// unknown or unreachable features resolve to the conservative default.
    pub async fn detect(driver: &dyn DatabaseDriver) -> Self {
        Self {
            backend_name: driver.backend_name().to_string(),
            supports_binary_json: driver.supports_feature(FEATURE_BINARY_JSON).await,
        }
    }

    /// Conservative capability set for an unknown backend
    pub fn conservative(backend_name: impl Into<String>) -> Self {
        Self {
            backend_name: backend_name.into(),
            supports_binary_json: false,
        }
    }
}
