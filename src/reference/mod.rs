//! Reference data module
//!
//! Registers reference sites and observations with the API and keeps them
//! supplied with data from their public measurement networks.
//!
//! Each network implements [`NetworkHandler`] and is registered in
//! [`NetworkHandlers`]; networks listed in [`NETWORK_OPTIONS`] without a
//! handler are accepted on the command line but skipped.

pub mod common;
pub mod crn;
pub mod sites;

pub use crn::CrnHandler;
pub use sites::{read_site_csv, site_records_to_definitions};

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use tracing::{debug, error, info, warn};

use crate::api::ApiSession;
use crate::config::Config;
use crate::error::Result;
use crate::models::{Observation, Site, SiteDefinition};

/// Networks that may be named in the site list or on the command line
pub const NETWORK_OPTIONS: [&str; 6] = [
    "NOAA SURFRAD",
    "NOAA SOLRAD",
    "NOAA USCRN",
    "NREL MIDC",
    "UO SRML",
    "SANDIA",
];

/// Per-network behavior for creating observations and pushing data
#[async_trait]
pub trait NetworkHandler: Send + Sync {
    /// Network name as it appears in extra_parameters
    fn network(&self) -> &'static str;

    /// Create every observation this network measures at `site`
    async fn initialize_site_observations(&self, api: &dyn ApiSession, site: &Site) -> Result<()>;

    /// Fetch `[start, end]` for this network's sites and post it
    async fn update_observation_data(
        &self,
        api: &dyn ApiSession,
        sites: &[Site],
        observations: &[Observation],
        start: DateTime<Utc>,
        end: DateTime<Utc>,
    ) -> Result<()>;
}

/// Registry mapping network names to handlers
pub struct NetworkHandlers {
    handlers: Vec<Box<dyn NetworkHandler>>,
}

impl NetworkHandlers {
    pub fn new(handlers: Vec<Box<dyn NetworkHandler>>) -> Self {
        Self { handlers }
    }

    /// Handlers for every supported network, wired from the config
    pub fn from_config(config: &Config) -> Result<Self> {
        let crn = CrnHandler::new(config.crn.base_url.clone())?;
        Ok(Self::new(vec![Box::new(crn)]))
    }

    pub fn handler_for(&self, network: &str) -> Option<&dyn NetworkHandler> {
        self.handlers
            .iter()
            .find(|h| h.network() == network)
            .map(|h| h.as_ref())
    }

    /// Whether `network` has a handler
    pub fn supports(&self, network: &str) -> bool {
        self.handler_for(network).is_some()
    }
}

/// Outcome of initializing reference metadata
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct InitSummary {
    pub created: Vec<String>,
    pub failures: usize,
}

/// Outcome of an update run
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct UpdateSummary {
    pub start: Option<DateTime<Utc>>,
    pub end: Option<DateTime<Utc>>,
    pub observations: usize,
    pub updated: Vec<String>,
    pub not_configured: Vec<String>,
}

/// Create a reference site and its observations
///
/// The site is named `"<network> <clean name>"`. An existing site with that
/// name is reused. Returns `None` when the network has no handler or the
/// API rejects the site.
pub async fn create_site(
    api: &dyn ApiSession,
    handlers: &NetworkHandlers,
    definition: SiteDefinition,
) -> Result<Option<Site>> {
    let network = definition.network().unwrap_or_default().to_string();
    let Some(handler) = handlers.handler_for(&network) else {
        warn!(
            "Unrecognized network, {} on Site {} Observations cannot be automatically generated.",
            network, definition.name
        );
        return Ok(None);
    };

    let site_name = format!("{} {}", network, common::clean_name(&definition.name));
    let mut existing = common::existing_sites(api).await?;

    let created = match existing.remove(&site_name) {
        Some(site) => {
            info!("Site, {}, already exists", site_name);
            site
        }
        None => {
            let site = definition.into_site(site_name);
            match api.create_site(&site).await {
                Ok(created) => {
                    info!("Created Site {} successfully.", created.name);
                    created
                }
                Err(e) if e.is_transport() => {
                    error!("Failed to create Site {}.", site.name);
                    debug!("HTTP Error: {}", e);
                    return Ok(None);
                }
                Err(e) => return Err(e),
            }
        }
    };

    handler.initialize_site_observations(api, &created).await?;
    Ok(Some(created))
}

/// Create every site in `definitions` along with its observations
pub async fn initialize_reference_metadata_objects(
    api: &dyn ApiSession,
    handlers: &NetworkHandlers,
    definitions: Vec<SiteDefinition>,
) -> InitSummary {
    info!("Initializing reference metadata...");
    let mut summary = InitSummary::default();

    for definition in definitions {
        let name = definition.name.clone();
        match create_site(api, handlers, definition).await {
            Ok(Some(site)) => summary.created.push(site.name),
            Ok(None) => summary.failures += 1,
            Err(e) => {
                error!("Failed to initialize site {}: {}", name, e);
                summary.failures += 1;
            }
        }
    }

    info!(
        "Created {} sites successfully, with {} failures.",
        summary.created.len(),
        summary.failures
    );
    summary
}

/// Update all existing reference observations of `networks`
pub async fn update_reference_observations(
    api: &dyn ApiSession,
    handlers: &NetworkHandlers,
    start: DateTime<Utc>,
    end: DateTime<Utc>,
    networks: &[String],
) -> Result<UpdateSummary> {
    let observations = api.list_observations().await?;
    let sites = unique_sites(&observations);

    let mut summary = UpdateSummary {
        start: Some(start),
        end: Some(end),
        observations: observations.len(),
        ..Default::default()
    };

    for network in networks {
        match handlers.handler_for(network) {
            Some(handler) => {
                handler
                    .update_observation_data(api, &sites, &observations, start, end)
                    .await?;
                summary.updated.push(network.clone());
            }
            None => {
                info!("{} observation updates not configured.", network);
                summary.not_configured.push(network.clone());
            }
        }
    }

    Ok(summary)
}

/// Sites of `observations`, each once, in first-seen order
fn unique_sites(observations: &[Observation]) -> Vec<Site> {
    let mut sites: Vec<Site> = Vec::new();
    for observation in observations {
        if !sites.iter().any(|s| common::same_site(s, &observation.site)) {
            sites.push(observation.site.clone());
        }
    }
    sites
}
