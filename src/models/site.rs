use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

// ============================================================================
// Labels
// ============================================================================

/// Which end of an interval a timestamp refers to
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum IntervalLabel {
    Beginning,
    Ending,
    Instant,
}

/// How a value summarizes its interval
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum IntervalValueType {
    IntervalMean,
    IntervalMax,
    IntervalMin,
    IntervalMedian,
    Instantaneous,
}

// ============================================================================
// Metadata
// ============================================================================

/// A measurement site as known to the API
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Site {
    /// API identifier, empty until the site is created
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub site_id: String,
    pub name: String,
    pub latitude: f64,
    pub longitude: f64,
    pub elevation: f64,
    pub timezone: String,
    /// JSON document with network metadata
    #[serde(default)]
    pub extra_parameters: String,
}

/// A measured variable at a site
#[derive(Debug, Clone, PartialEq)]
pub struct Observation {
    /// API identifier, empty until the observation is created
    pub observation_id: String,
    pub name: String,
    pub variable: String,
    pub interval_label: IntervalLabel,
    /// Interval length in minutes
    pub interval_length: i64,
    pub interval_value_type: IntervalValueType,
    pub site: Site,
    pub uncertainty: f64,
    pub extra_parameters: String,
}

/// Anything carrying a name and an extra_parameters JSON document
pub trait Metadata {
    fn name(&self) -> &str;
    fn extra_parameters(&self) -> &str;
}

impl Metadata for Site {
    fn name(&self) -> &str {
        &self.name
    }

    fn extra_parameters(&self) -> &str {
        &self.extra_parameters
    }
}

impl Metadata for Observation {
    fn name(&self) -> &str {
        &self.name
    }

    fn extra_parameters(&self) -> &str {
        &self.extra_parameters
    }
}

/// One value posted to an observation
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ObservationValue {
    pub timestamp: DateTime<Utc>,
    pub value: f64,
    pub quality_flag: u32,
}

// ============================================================================
// Site list input
// ============================================================================

/// A row of the reference site list CSV
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct SiteRecord {
    /// Observation interval length in minutes
    pub interval_length: i64,
    pub name: String,
    pub latitude: f64,
    pub longitude: f64,
    pub elevation: f64,
    pub timezone: String,
    pub network: String,
    pub network_api_id: String,
    pub network_api_abbreviation: String,
}

/// A site waiting to be created, with structured extra parameters
#[derive(Debug, Clone, PartialEq)]
pub struct SiteDefinition {
    pub name: String,
    pub latitude: f64,
    pub longitude: f64,
    pub elevation: f64,
    pub timezone: String,
    pub extra_parameters: Map<String, Value>,
}

impl SiteRecord {
    /// Build a site definition with the network metadata nested
    pub fn to_site_definition(&self) -> SiteDefinition {
        let mut extra = Map::new();
        extra.insert("network".to_string(), Value::from(self.network.clone()));
        extra.insert(
            "network_api_id".to_string(),
            Value::from(self.network_api_id.clone()),
        );
        extra.insert(
            "network_api_abbreviation".to_string(),
            Value::from(self.network_api_abbreviation.clone()),
        );
        extra.insert(
            "observation_interval_length".to_string(),
            Value::from(self.interval_length),
        );

        SiteDefinition {
            name: self.name.clone(),
            latitude: self.latitude,
            longitude: self.longitude,
            elevation: self.elevation,
            timezone: self.timezone.clone(),
            extra_parameters: extra,
        }
    }
}

impl SiteDefinition {
    /// Network name from the extra parameters
    pub fn network(&self) -> Option<&str> {
        self.extra_parameters.get("network").and_then(Value::as_str)
    }

    /// Turn into a site with the given name and serialized extra parameters
    pub fn into_site(self, name: String) -> Site {
        Site {
            site_id: String::new(),
            name,
            latitude: self.latitude,
            longitude: self.longitude,
            elevation: self.elevation,
            timezone: self.timezone,
            extra_parameters: Value::Object(self.extra_parameters).to_string(),
        }
    }
}
