//! Helpers shared by every reference network

use chrono::{DateTime, Utc};
use serde_json::{Map, Value};
use std::collections::HashMap;
use tracing::{debug, error, info, warn};

use crate::api::ApiSession;
use crate::error::{Result, SolarFetchError};
use crate::models::{
    Frame, IntervalLabel, IntervalValueType, Metadata, Observation, Site,
};

/// Observation names longer than this are rejected by the API
pub const MAX_OBSERVATION_NAME: usize = 64;

const DISALLOWED_NAME_CHARS: &str = "(){}/\\[]@-.";

/// Parse the extra_parameters JSON document of a site or observation
///
/// Returns `None` (and logs a warning) when it is not a JSON object.
pub fn decode_extra_parameters<M: Metadata + ?Sized>(metadata: &M) -> Option<Map<String, Value>> {
    match serde_json::from_str::<Value>(metadata.extra_parameters()) {
        Ok(Value::Object(params)) => Some(params),
        _ => {
            warn!("Could not read extra parameters of {}", metadata.name());
            None
        }
    }
}

/// Whether the object's `network` extra parameter is one of `networks`
pub fn check_network<M: Metadata + ?Sized>(networks: &[&str], metadata: &M) -> bool {
    decode_extra_parameters(metadata)
        .and_then(|params| {
            params
                .get("network")
                .and_then(Value::as_str)
                .map(|network| networks.iter().any(|n| *n == network))
        })
        .unwrap_or(false)
}

/// Copy of `objects` keeping only those that belong to one of `networks`
pub fn filter_by_networks<M: Metadata + Clone>(objects: &[M], networks: &[&str]) -> Vec<M> {
    objects
        .iter()
        .filter(|obj| check_network(networks, *obj))
        .cloned()
        .collect()
}

/// Remove characters the API rejects and turn underscores into spaces
pub fn clean_name(name: &str) -> String {
    name.chars()
        .filter(|c| !DISALLOWED_NAME_CHARS.contains(*c))
        .map(|c| if c == '_' { ' ' } else { c })
        .collect()
}

/// Site name without its `"<network> "` prefix
pub fn site_name_no_network(site: &Site) -> String {
    let network = decode_extra_parameters(site)
        .and_then(|p| p.get("network").and_then(Value::as_str).map(str::to_string));

    match network {
        Some(network) => site
            .name
            .strip_prefix(network.as_str())
            .map(|rest| rest.strip_prefix(' ').unwrap_or(rest).to_string())
            .unwrap_or_else(|| site.name.clone()),
        None => site.name.clone(),
    }
}

/// Fields that replace the defaults of [`create_observation`]
#[derive(Debug, Clone, Default)]
pub struct ObservationOverrides {
    pub name: Option<String>,
    pub interval_label: Option<IntervalLabel>,
    pub interval_value_type: Option<IntervalValueType>,
    pub uncertainty: Option<f64>,
}

/// Create an observation of `variable` at `site`
///
/// `extra_params` becomes the observation's extra_parameters; without it
/// the site's are copied. Either must carry `observation_interval_length`.
pub async fn create_observation(
    api: &dyn ApiSession,
    site: &Site,
    variable: &str,
    extra_params: Option<&Map<String, Value>>,
    overrides: &ObservationOverrides,
) -> Result<Observation> {
    let extra = match extra_params {
        Some(params) => params.clone(),
        None => decode_extra_parameters(site).ok_or_else(|| {
            SolarFetchError::Parse(format!(
                "Site {} has no readable extra parameters",
                site.name
            ))
        })?,
    };

    let name = match &overrides.name {
        Some(name) => name.clone(),
        None => default_observation_name(site, variable, &extra)?,
    };

    let interval_length = extra
        .get("observation_interval_length")
        .and_then(|v| v.as_i64().or_else(|| v.as_f64().map(|f| f.round() as i64)))
        .ok_or_else(|| {
            SolarFetchError::Parse(format!(
                "Site {} is missing observation_interval_length",
                site.name
            ))
        })?;

    let observation = Observation {
        observation_id: String::new(),
        name,
        variable: variable.to_string(),
        interval_label: overrides.interval_label.unwrap_or(IntervalLabel::Ending),
        interval_length,
        interval_value_type: overrides
            .interval_value_type
            .unwrap_or(IntervalValueType::IntervalMean),
        site: site.clone(),
        uncertainty: overrides.uncertainty.unwrap_or(0.0),
        extra_parameters: Value::Object(extra).to_string(),
    };

    let created = api.create_observation(&observation).await?;
    info!("{} created successfully.", created.name);
    Ok(created)
}

fn default_observation_name(
    site: &Site,
    variable: &str,
    extra: &Map<String, Value>,
) -> Result<String> {
    let name = format!("{} {}", site_name_no_network(site), variable);
    if name.chars().count() <= MAX_OBSERVATION_NAME {
        return Ok(name);
    }
    // too long for the API, fall back to the network's abbreviation
    let abbreviation = extra
        .get("network_api_abbreviation")
        .and_then(Value::as_str)
        .ok_or_else(|| {
            SolarFetchError::Parse(format!(
                "Observation name '{}' is too long and site {} has no network_api_abbreviation",
                name, site.name
            ))
        })?;
    Ok(format!("{} {}", abbreviation, variable))
}

/// Post the observation's column of `data`, skipping missing values
///
/// API failures are logged, not returned, so one bad observation does not
/// stop a network update.
pub async fn post_observation_data(api: &dyn ApiSession, observation: &Observation, data: &Frame) {
    let (Some(first), Some(last)) = (data.first_timestamp(), data.last_timestamp()) else {
        warn!("{} has no data to post.", observation.name);
        return;
    };
    info!("Updating {} from {} to {}.", observation.name, first, last);

    let Some(values) = data.values(&observation.variable) else {
        error!(
            "Data for {} has no {} column.",
            observation.name, observation.variable
        );
        return;
    };
    if values.is_empty() {
        warn!("{} data empty from {} to {}.", observation.name, first, last);
        return;
    }

    if let Err(e) = api
        .post_observation_values(&observation.observation_id, &values)
        .await
    {
        error!("Posting data to {} failed.", observation.name);
        debug!("HTTP Error: {}.", e);
    }
}

/// Post `[start, end]` of `data` to every observation at `site`
pub async fn update_site_observations(
    api: &dyn ApiSession,
    data: &Frame,
    site: &Site,
    observations: &[Observation],
    start: DateTime<Utc>,
    end: DateTime<Utc>,
) {
    let data_in_range = data.slice(start, end);
    if data_in_range.is_empty() {
        warn!(
            "Data for site {} contained no entries from {} to {}.",
            site.name, start, end
        );
        return;
    }
    for observation in observations.iter().filter(|o| same_site(&o.site, site)) {
        post_observation_data(api, observation, &data_in_range).await;
    }
}

/// Sites compare by id once created, structurally before that
pub fn same_site(a: &Site, b: &Site) -> bool {
    if !a.site_id.is_empty() && !b.site_id.is_empty() {
        a.site_id == b.site_id
    } else {
        a == b
    }
}

/// Existing sites keyed by name
pub async fn existing_sites(api: &dyn ApiSession) -> Result<HashMap<String, Site>> {
    Ok(api
        .list_sites()
        .await?
        .into_iter()
        .map(|site| (site.name.clone(), site))
        .collect())
}
