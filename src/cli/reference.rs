use chrono::{DateTime, Utc};
use std::path::{Path, PathBuf};
use tracing::info;

use crate::api::HttpApiSession;
use crate::config::{self, Config};
use crate::display;
use crate::error::{Result, SolarFetchError};
use crate::reference::{self, NetworkHandlers, NETWORK_OPTIONS};
use crate::renderer::Renderer;

fn load_config(config_path: Option<PathBuf>, base_url: Option<String>) -> Result<Config> {
    let mut config = config::load_or_default(config_path)?;
    if let Some(url) = base_url {
        config.api.base_url = url;
    }
    Ok(config)
}

fn session(config: &Config) -> Result<HttpApiSession> {
    let token = config::api_token(config)?;
    HttpApiSession::new(token, config.api.base_url.clone())
}

/// Parse an RFC 3339 timestamp given on the command line
pub fn parse_time(value: &str) -> Result<DateTime<Utc>> {
    DateTime::parse_from_rfc3339(value)
        .map(|dt| dt.with_timezone(&Utc))
        .map_err(|e| SolarFetchError::Config(format!("Invalid timestamp '{}': {}", value, e)))
}

/// Register every site in the CSV file along with its observations
pub async fn init(
    sites: &Path,
    config_path: Option<PathBuf>,
    base_url: Option<String>,
) -> Result<()> {
    let config = load_config(config_path, base_url)?;
    let api = session(&config)?;

    let records = reference::read_site_csv(sites)?;
    info!("Read {} site records from {}", records.len(), sites.display());
    let definitions = reference::site_records_to_definitions(&records);

    let handlers = NetworkHandlers::from_config(&config)?;
    let summary =
        reference::initialize_reference_metadata_objects(&api, &handlers, definitions).await;

    display::print_markdown(&Renderer::new(&config).render_init(&summary));
    Ok(())
}

/// Post `[start, end]` data for every reference observation of `networks`
///
/// No networks means all of them.
pub async fn update(
    start: &str,
    end: &str,
    networks: Vec<String>,
    config_path: Option<PathBuf>,
    base_url: Option<String>,
) -> Result<()> {
    let start = parse_time(start)?;
    let end = parse_time(end)?;
    if start > end {
        return Err(SolarFetchError::Config(format!(
            "Start {} is after end {}",
            start, end
        )));
    }

    let networks = if networks.is_empty() {
        NETWORK_OPTIONS.iter().map(|n| n.to_string()).collect()
    } else {
        networks
    };

    let config = load_config(config_path, base_url)?;
    let api = session(&config)?;
    let handlers = NetworkHandlers::from_config(&config)?;

    let summary =
        reference::update_reference_observations(&api, &handlers, start, end, &networks).await?;

    display::print_markdown(&Renderer::new(&config).render_update(&summary));
    Ok(())
}

/// List the networks and which of them can be updated
pub fn networks(config_path: Option<PathBuf>) -> Result<()> {
    let config = config::load_or_default(config_path)?;
    let handlers = NetworkHandlers::from_config(&config)?;
    display::print_markdown(&Renderer::new(&config).render_networks(&handlers));
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn test_parse_time() {
        assert_eq!(
            parse_time("2019-01-01T06:00:00-06:00").unwrap(),
            Utc.with_ymd_and_hms(2019, 1, 1, 12, 0, 0).unwrap()
        );
        assert!(parse_time("yesterday").is_err());
    }

    #[tokio::test]
    async fn test_update_rejects_reversed_range() {
        let err = update(
            "2019-01-02T00:00:00Z",
            "2019-01-01T00:00:00Z",
            vec![],
            None,
            None,
        )
        .await
        .unwrap_err();
        assert!(err.to_string().contains("is after end"));
    }
}
