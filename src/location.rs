//! One-shot device location used to seed the viewport at startup.

use async_trait::async_trait;

use crate::core::geo::LatLng;
use crate::{MapError, Result};

/// Source of the initial geographic fix.
///
/// Implementations may use any callback or permission plumbing internally;
/// the engine awaits the result exactly once during startup.
#[async_trait]
pub trait LocationProvider: Send + Sync {
    /// Current position, or [`MapError::LocationUnavailable`].
    async fn current_position(&self) -> Result<LatLng>;
}

/// Always reports the same position.
#[derive(Debug, Clone, Copy)]
pub struct FixedLocation(pub LatLng);

impl FixedLocation {
    pub fn new(lat: f64, lng: f64) -> Self {
        Self(LatLng::new(lat, lng))
    }
}

#[async_trait]
impl LocationProvider for FixedLocation {
    async fn current_position(&self) -> Result<LatLng> {
        if !self.0.is_valid() {
            return Err(MapError::LocationUnavailable(format!(
                "fixed position {} is out of range",
                self.0
            )));
        }
        Ok(self.0)
    }
}

/// Provider for devices without positioning; always unavailable.
#[derive(Debug, Clone, Default)]
pub struct NoLocation {
    pub reason: String,
}

impl NoLocation {
    pub fn new(reason: impl Into<String>) -> Self {
        Self {
            reason: reason.into(),
        }
    }
}

#[async_trait]
impl LocationProvider for NoLocation {
    async fn current_position(&self) -> Result<LatLng> {
        let reason = if self.reason.is_empty() {
            "no location provider configured"
        } else {
            self.reason.as_str()
        };
        Err(MapError::LocationUnavailable(reason.to_string()))
    }
}

/// Tries `primary` first and falls back to a default position.
pub struct WithFallback<P> {
    primary: P,
    fallback: LatLng,
}

impl<P: LocationProvider> WithFallback<P> {
    pub fn new(primary: P, fallback: LatLng) -> Self {
        Self { primary, fallback }
    }
}

#[async_trait]
impl<P: LocationProvider> LocationProvider for WithFallback<P> {
    async fn current_position(&self) -> Result<LatLng> {
        match self.primary.current_position().await {
            Ok(position) => Ok(position),
            Err(e) => {
                log::warn!("location unavailable ({}), using fallback {}", e, self.fallback);
                Ok(self.fallback)
            }
        }
    }
}
