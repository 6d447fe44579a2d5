//! NOAA U.S. Climate Reference Network (USCRN)
//!
//! Subhourly data is published as one whitespace-separated text file per
//! station per year.

use async_trait::async_trait;
use chrono::{DateTime, Datelike, NaiveDateTime, Utc};
use reqwest::Client;
use serde_json::Value;
use std::time::Duration;
use tracing::{debug, info, warn};

use super::common::{self, ObservationOverrides};
use super::NetworkHandler;
use crate::api::ApiSession;
use crate::error::{Result, SolarFetchError};
use crate::models::{Frame, Observation, Site};

pub const CRN_NETWORK: &str = "NOAA USCRN";

/// Variables each CRN site gets an observation for
pub const CRN_VARIABLES: [&str; 4] = ["ghi", "air_temperature", "relative_humidity", "wind_speed"];

const CONNECT_TIMEOUT: Duration = Duration::from_secs(30);
/// A yearly file is a few MB
const REQUEST_TIMEOUT: Duration = Duration::from_secs(300);

/// Number of fields on a subhourly line
const CRN_FIELDS: usize = 23;

/// (field index, column name) of the values we keep
const CRN_COLUMNS: [(usize, &str); 4] = [
    (8, "temp_air"),
    (10, "ghi"),
    (15, "relative_humidity"),
    (21, "wind_speed"),
];

const MISSING_SENTINELS: [f64; 3] = [-9999.0, -99999.0, -99.0];

/// URL of the yearly file for a site
pub fn crn_url(base_url: &str, site: &Site, year: i32) -> Result<String> {
    let network_api_id = common::decode_extra_parameters(site)
        .and_then(|p| p.get("network_api_id").and_then(Value::as_str).map(str::to_string))
        .ok_or_else(|| {
            SolarFetchError::Parse(format!("Site {} has no network_api_id", site.name))
        })?;
    Ok(format!(
        "{}{}/CRNS0101-05-{}-{}.txt",
        base_url, year, year, network_api_id
    ))
}

/// Parse a subhourly CRN file
///
/// The index comes from the UTC date and time fields. Columns are
/// `temp_air`, `ghi`, `relative_humidity` and `wind_speed`; sentinel
/// values become missing cells.
pub fn parse_crn(text: &str) -> Result<Frame> {
    let mut frame = Frame::with_columns(CRN_COLUMNS.iter().map(|(_, name)| *name));

    for (line_num, line) in text.lines().enumerate() {
        let fields: Vec<&str> = line.split_whitespace().collect();
        if fields.is_empty() {
            continue;
        }
        if fields.len() < CRN_FIELDS {
            return Err(SolarFetchError::Parse(format!(
                "CRN line {} has {} fields, expected {}",
                line_num + 1,
                fields.len(),
                CRN_FIELDS
            )));
        }

        let stamp = format!("{}{}", fields[1], fields[2]);
        let timestamp = NaiveDateTime::parse_from_str(&stamp, "%Y%m%d%H%M")
            .map_err(|e| {
                SolarFetchError::Parse(format!("CRN line {}: bad timestamp: {}", line_num + 1, e))
            })?
            .and_utc();

        let mut row = Vec::with_capacity(CRN_COLUMNS.len());
        for (idx, name) in CRN_COLUMNS {
            let value: f64 = fields[idx].parse().map_err(|_| {
                SolarFetchError::Parse(format!(
                    "CRN line {}: {} is not a number: '{}'",
                    line_num + 1,
                    name,
                    fields[idx]
                ))
            })?;
            row.push((name, clean_value(value)));
        }
        frame.push_row(timestamp, &row);
    }

    Ok(frame)
}

fn clean_value(value: f64) -> Option<f64> {
    if MISSING_SENTINELS.contains(&value) {
        None
    } else {
        Some(value)
    }
}

/// Handler for NOAA USCRN sites
#[derive(Debug, Clone)]
pub struct CrnHandler {
    client: Client,
    base_url: String,
}

impl CrnHandler {
    pub fn new(base_url: impl Into<String>) -> Result<Self> {
        Self::with_timeout(base_url, REQUEST_TIMEOUT)
    }

    /// Handler whose requests give up after `timeout`
    pub fn with_timeout(base_url: impl Into<String>, timeout: Duration) -> Result<Self> {
        let client = Client::builder()
            .connect_timeout(CONNECT_TIMEOUT)
            .timeout(timeout)
            .build()?;
        Ok(Self {
            client,
            base_url: base_url.into(),
        })
    }

    /// Fetch every yearly file overlapping `[start, end]`
    ///
    /// Years that cannot be retrieved are skipped. Returns `None` when no
    /// year could be read.
    pub async fn fetch(
        &self,
        site: &Site,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
    ) -> Result<Option<Frame>> {
        let mut year_frames = Vec::new();

        for year in start.year()..=end.year() {
            let url = crn_url(&self.base_url, site, year)?;
            info!("requesting data for {} on {}", site.name, year);
            debug!("CRN filename: {}", url);

            match self.fetch_year(&url).await {
                Ok(frame) => year_frames.push(frame),
                Err(e) => {
                    warn!(
                        "Could not retrieve CRN data for site {} for year {}.",
                        site.name, year
                    );
                    debug!("Failed CRN URL: {}: {}", url, e);
                }
            }
        }

        if year_frames.is_empty() {
            warn!(
                "No data available for site {} from {} to {}.",
                site.name, start, end
            );
            return Ok(None);
        }

        let mut data = Frame::concat(year_frames);
        data.rename_column("temp_air", "air_temperature");
        Ok(Some(data))
    }

    async fn fetch_year(&self, url: &str) -> Result<Frame> {
        let response = self.client.get(url).send().await?;
        let status = response.status();
        if !status.is_success() {
            return Err(SolarFetchError::Api {
                status: status.as_u16(),
                body: String::new(),
            });
        }
        let text = response.text().await?;
        parse_crn(&text)
    }
}

#[async_trait]
impl NetworkHandler for CrnHandler {
    fn network(&self) -> &'static str {
        CRN_NETWORK
    }

    async fn initialize_site_observations(&self, api: &dyn ApiSession, site: &Site) -> Result<()> {
        for variable in CRN_VARIABLES {
            common::create_observation(api, site, variable, None, &ObservationOverrides::default())
                .await?;
        }
        Ok(())
    }

    async fn update_observation_data(
        &self,
        api: &dyn ApiSession,
        sites: &[Site],
        observations: &[Observation],
        start: DateTime<Utc>,
        end: DateTime<Utc>,
    ) -> Result<()> {
        for site in common::filter_by_networks(sites, &[CRN_NETWORK]) {
            match self.fetch(&site, start, end).await {
                Ok(Some(data)) => {
                    common::update_site_observations(api, &data, &site, observations, start, end)
                        .await
                }
                Ok(None) => {}
                Err(e) => warn!("Skipping CRN site {}: {}", site.name, e),
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::reference::common::tests::{site, RecordingApi};
    use chrono::TimeZone;

    const SAMPLE: &str = "\
53131 20190101 0005 20181231 1705      2.422  -111.74    31.59    10.4     0.0      0 0    12.6 C 0    44     0 -99.000 -9999.0   990 0     1.44 0
53131 20190101 0010 20181231 1710      2.422  -111.74    31.59 -9999.0     0.0    150 0    12.5 C 0    45     0 -99.000 -9999.0   990 0     1.60 0
";

    fn crn_site() -> Site {
        site(
            "NOAA USCRN Tucson AZ",
            r#"{"network": "NOAA USCRN", "network_api_id": "AZ_Tucson_11_W", "network_api_abbreviation": "tucson", "observation_interval_length": 5}"#,
        )
    }

    #[test]
    fn test_crn_url() {
        let url = crn_url("https://example.com/subhourly01/", &crn_site(), 2019).unwrap();
        assert_eq!(
            url,
            "https://example.com/subhourly01/2019/CRNS0101-05-2019-AZ_Tucson_11_W.txt"
        );
    }

    #[test]
    fn test_crn_url_requires_api_id() {
        let bare = site("NOAA USCRN bare", r#"{"network": "NOAA USCRN"}"#);
        assert!(crn_url("https://example.com/", &bare, 2019).is_err());
    }

    #[test]
    fn test_parse_crn() {
        let frame = parse_crn(SAMPLE).unwrap();
        assert_eq!(frame.len(), 2);
        assert_eq!(
            frame.first_timestamp(),
            Some(Utc.with_ymd_and_hms(2019, 1, 1, 0, 5, 0).unwrap())
        );
        assert_eq!(frame.column("temp_air").unwrap(), &[Some(10.4), None]);
        assert_eq!(frame.column("ghi").unwrap(), &[Some(0.0), Some(150.0)]);
        assert_eq!(
            frame.column("relative_humidity").unwrap(),
            &[Some(44.0), Some(45.0)]
        );
        assert_eq!(frame.column("wind_speed").unwrap(), &[Some(1.44), Some(1.6)]);
    }

    #[test]
    fn test_parse_crn_short_line() {
        let err = parse_crn("53131 20190101 0005\n").unwrap_err();
        assert!(err.to_string().contains("line 1"));
    }

    #[test]
    fn test_parse_crn_skips_blank_lines() {
        let frame = parse_crn(&format!("\n{}\n\n", SAMPLE)).unwrap();
        assert_eq!(frame.len(), 2);
    }

    #[tokio::test]
    async fn test_initialize_site_observations() {
        let api = RecordingApi::default();
        let handler = CrnHandler::new("http://localhost/").unwrap();
        handler
            .initialize_site_observations(&api, &crn_site())
            .await
            .unwrap();

        let created = api.created_observations.lock().unwrap();
        let names: Vec<&str> = created.iter().map(|o| o.name.as_str()).collect();
        assert_eq!(
            names,
            vec![
                "Tucson AZ ghi",
                "Tucson AZ air_temperature",
                "Tucson AZ relative_humidity",
                "Tucson AZ wind_speed"
            ]
        );
        assert!(created.iter().all(|o| o.interval_length == 5));
    }
}
