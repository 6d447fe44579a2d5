//! Solar Forecast Arbiter API module
//!
//! `ApiSession` is the seam the reference data flows talk through;
//! `HttpApiSession` implements it over HTTPS with a bearer token.

mod http;

pub use http::HttpApiSession;

use async_trait::async_trait;

use crate::error::Result;
use crate::models::{Observation, ObservationValue, Site};

/// Operations the reference data tooling needs from the API
#[async_trait]
pub trait ApiSession: Send + Sync {
    /// All sites visible to the user
    async fn list_sites(&self) -> Result<Vec<Site>>;

    /// All observations visible to the user, with their sites resolved
    async fn list_observations(&self) -> Result<Vec<Observation>>;

    /// Create a site and return it as stored by the API
    async fn create_site(&self, site: &Site) -> Result<Site>;

    /// Create an observation and return it as stored by the API
    async fn create_observation(&self, observation: &Observation) -> Result<Observation>;

    /// Upload values for an observation
    async fn post_observation_values(
        &self,
        observation_id: &str,
        values: &[ObservationValue],
    ) -> Result<()>;
}
