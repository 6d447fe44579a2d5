use serde::{Deserialize, Serialize};

/// solarfetch configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    /// Solar Forecast Arbiter API settings
    #[serde(default)]
    pub api: ApiSettings,

    /// NOAA USCRN data source
    #[serde(default)]
    pub crn: CrnSettings,

    /// NCEP NOMADS fetcher settings
    #[serde(default)]
    pub nwp: NwpSettings,
}

/// Solar Forecast Arbiter API settings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ApiSettings {
    /// Base URL of the API
    pub base_url: String,

    /// Access token; SFA_API_TOKEN takes precedence when set
    #[serde(default)]
    pub token: String,
}

/// NOAA USCRN settings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CrnSettings {
    /// Directory holding the yearly subhourly files
    pub base_url: String,
}

/// NOMADS fetcher settings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NwpSettings {
    /// Base of the grib filter CGI endpoints
    pub base_url: String,

    /// Template for the production directory listing, `{}` is the model name
    pub check_url: String,

    /// Size of a chunk (in KB) to save at one time
    pub chunksize_kb: usize,

    /// Attempts before a failing request is given up
    pub retries: u32,

    /// Seconds to wait between attempts
    pub retry_delay_secs: u64,
}

impl Default for ApiSettings {
    fn default() -> Self {
        Self {
            base_url: "https://api.solarforecastarbiter.org".to_string(),
            token: String::new(),
        }
    }
}

impl Default for CrnSettings {
    fn default() -> Self {
        Self {
            base_url: "https://www1.ncdc.noaa.gov/pub/data/uscrn/products/subhourly01/"
                .to_string(),
        }
    }
}

impl Default for NwpSettings {
    fn default() -> Self {
        Self {
            base_url: "https://nomads.ncep.noaa.gov/cgi-bin/".to_string(),
            check_url: "https://nomads.ncep.noaa.gov/pub/data/nccf/com/{}/prod".to_string(),
            chunksize_kb: 128,
            retries: 5,
            retry_delay_secs: 60,
        }
    }
}
