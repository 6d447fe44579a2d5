//! NOMADS model catalogue
//!
//! Each model lists the grib filter endpoint and query it needs plus the
//! timing used to decide when files should be requested:
//! - `update_freq_hours`: time between full model runs
//! - `valid_hours`: forecast hours produced for a given init hour
//! - `time_between_fcst_hrs`: seconds it typically takes to produce the next hour
//! - `delay_to_first_forecast_min`: minutes after init time until the first file
//! - `avg_max_run_length_min`: minutes from the first to the last file of a run
//!
//! Timings follow https://www.nco.ncep.noaa.gov/pmb/nwprod/prodstat/

use chrono::{DateTime, Duration, Utc};

/// Region requested from every model
pub const DOMAIN: [(&str, &str); 5] = [
    ("subregion", ""),
    ("leftlon", "-126"),
    ("rightlon", "-66"),
    ("toplat", "50"),
    ("bottomlat", "24"),
];

/// Static description of one NOMADS model
#[derive(Debug)]
pub struct ModelSpec {
    /// Name used on the command line and as the save subdirectory
    pub key: &'static str,
    pub endpoint: &'static str,
    /// File template with `{init_hr}`, `{valid_hr}` and `{member}` tokens
    pub file: &'static str,
    /// Zero padding of `{valid_hr}`
    pub valid_hr_width: usize,
    /// Directory template with `{init_date}`, `{init_dt}` and `{init_hr}` tokens
    pub dir: &'static str,
    pub levels: &'static [&'static str],
    pub variables: &'static [&'static str],
    pub update_freq_hours: u32,
    pub valid_hours: fn(u32) -> Vec<u32>,
    pub time_between_fcst_hrs: u64,
    pub delay_to_first_forecast_min: i64,
    pub avg_max_run_length_min: i64,
    /// Output netCDF name, may contain `{member}`
    pub filename: &'static str,
    /// Ensemble members fetched as independent runs
    pub members: &'static [&'static str],
    /// Name in the production directory when it differs from the dir prefix
    pub check_url_name: Option<&'static str>,
}

const COMMON_LEVELS: &[&str] = &[
    "lev_2_m_above_ground",
    "lev_10_m_above_ground",
    "lev_entire_atmosphere",
    "lev_surface",
];

fn gfs_hours(_init_hr: u32) -> Vec<u32> {
    (0..120)
        .chain((120..240).step_by(3))
        .chain((240..385).step_by(12))
        .collect()
}

fn nam_hours(_init_hr: u32) -> Vec<u32> {
    (0..36).chain((36..85).step_by(3)).collect()
}

fn rap_hours(init_hr: u32) -> Vec<u32> {
    if matches!(init_hr, 3 | 9 | 15 | 21) {
        (0..40).collect()
    } else {
        (0..22).collect()
    }
}

fn hrrr_hourly_hours(init_hr: u32) -> Vec<u32> {
    if matches!(init_hr, 0 | 6 | 12 | 18) {
        (0..37).collect()
    } else {
        (0..19).collect()
    }
}

fn hrrr_subhourly_hours(_init_hr: u32) -> Vec<u32> {
    (0..19).collect()
}

fn gefs_hours(_init_hr: u32) -> Vec<u32> {
    (0..192).step_by(3).chain((192..385).step_by(6)).collect()
}

pub static GFS_0P25_1HR: ModelSpec = ModelSpec {
    key: "gfs_0p25",
    endpoint: "filter_gfs_0p25_1hr.pl",
    file: "gfs.t{init_hr}z.pgrb2.0p25.f{valid_hr}",
    valid_hr_width: 3,
    dir: "/gfs.{init_dt}",
    levels: COMMON_LEVELS,
    variables: &["var_DSWRF", "var_TCDC", "var_TMP", "var_UGRD", "var_VGRD"],
    update_freq_hours: 6,
    valid_hours: gfs_hours,
    time_between_fcst_hrs: 60,
    delay_to_first_forecast_min: 200,
    avg_max_run_length_min: 100,
    filename: "gfs_0p25.nc",
    members: &[],
    check_url_name: None,
};

pub static NAM_CONUS: ModelSpec = ModelSpec {
    key: "nam_12km",
    endpoint: "filter_nam.pl",
    file: "nam.t{init_hr}z.awphys{valid_hr}.tm00.grib2",
    valid_hr_width: 2,
    dir: "/nam.{init_date}",
    levels: &[
        "lev_2_m_above_ground",
        "lev_10_m_above_ground",
        r"lev_entire_atmosphere_\(considered_as_a_single_layer\)",
        "lev_surface",
    ],
    variables: &["var_DSWRF", "var_TCDC", "var_TMP", "var_UGRD", "var_VGRD"],
    update_freq_hours: 6,
    valid_hours: nam_hours,
    time_between_fcst_hrs: 60,
    delay_to_first_forecast_min: 90,
    avg_max_run_length_min: 80,
    filename: "nam_12km.nc",
    members: &[],
    check_url_name: None,
};

// RAP has no DSWRF through the grib filter
pub static RAP: ModelSpec = ModelSpec {
    key: "rap",
    endpoint: "filter_rap.pl",
    file: "rap.t{init_hr}z.awp130pgrbf{valid_hr}.grib2",
    valid_hr_width: 2,
    dir: "/rap.{init_date}",
    levels: COMMON_LEVELS,
    variables: &["var_TCDC", "var_TMP", "var_UGRD", "var_VGRD"],
    update_freq_hours: 1,
    valid_hours: rap_hours,
    time_between_fcst_hrs: 60,
    delay_to_first_forecast_min: 50,
    avg_max_run_length_min: 30,
    filename: "rap.nc",
    members: &[],
    check_url_name: None,
};

pub static HRRR_HOURLY: ModelSpec = ModelSpec {
    key: "hrrr_hourly",
    endpoint: "filter_hrrr_2d.pl",
    file: "hrrr.t{init_hr}z.wrfsfcf{valid_hr}.grib2",
    valid_hr_width: 2,
    dir: "/hrrr.{init_date}/conus",
    levels: COMMON_LEVELS,
    variables: &[
        "var_DSWRF",
        "var_VBDSF",
        "var_VDDSF",
        "var_TCDC",
        "var_TMP",
        "var_UGRD",
        "var_VGRD",
    ],
    update_freq_hours: 1,
    valid_hours: hrrr_hourly_hours,
    time_between_fcst_hrs: 120,
    delay_to_first_forecast_min: 45,
    avg_max_run_length_min: 70,
    filename: "hrrr_hourly.nc",
    members: &[],
    check_url_name: None,
};

pub static HRRR_SUBHOURLY: ModelSpec = ModelSpec {
    key: "hrrr_subhourly",
    endpoint: "filter_hrrr_sub.pl",
    file: "hrrr.t{init_hr}z.wrfsubhf{valid_hr}.grib2",
    valid_hr_width: 2,
    dir: "/hrrr.{init_date}/conus",
    levels: COMMON_LEVELS,
    variables: &[
        "var_DSWRF",
        "var_VBDSF",
        "var_VDDSF",
        "var_TMP",
        "var_UGRD",
        "var_VGRD",
    ],
    update_freq_hours: 1,
    valid_hours: hrrr_subhourly_hours,
    time_between_fcst_hrs: 120,
    delay_to_first_forecast_min: 45,
    avg_max_run_length_min: 50,
    filename: "hrrr_subhourly.nc",
    members: &[],
    check_url_name: None,
};

// each GEFS member is fetched as its own run
pub static GEFS_0P50_RAW: ModelSpec = ModelSpec {
    key: "gefs",
    endpoint: "filter_gens_0p50.pl",
    file: "ge{member}.t{init_hr}z.pgrb2a.0p50.f{valid_hr}",
    valid_hr_width: 3,
    dir: "/gefs.{init_date}/{init_hr}/pgrb2ap5",
    levels: COMMON_LEVELS,
    variables: &["var_DSWRF", "var_TCDC", "var_TMP", "var_UGRD", "var_VGRD"],
    update_freq_hours: 6,
    valid_hours: gefs_hours,
    time_between_fcst_hrs: 60,
    delay_to_first_forecast_min: 280,
    avg_max_run_length_min: 60,
    filename: "gefs_{member}.nc",
    members: &[
        "avg", "c00", "spr", "p01", "p02", "p03", "p04", "p05", "p06", "p07", "p08", "p09", "p10",
        "p11", "p12", "p13", "p14", "p15", "p16", "p17", "p18", "p19", "p20",
    ],
    check_url_name: Some("gens"),
};

/// Every model, in command line order
pub static MODELS: [&ModelSpec; 6] = [
    &GFS_0P25_1HR,
    &NAM_CONUS,
    &RAP,
    &HRRR_HOURLY,
    &HRRR_SUBHOURLY,
    &GEFS_0P50_RAW,
];

/// Look up a model by its command line key
pub fn find_model(key: &str) -> Option<&'static ModelSpec> {
    MODELS.iter().copied().find(|m| m.key == key)
}

impl ModelSpec {
    /// Name of the model in directory listings, e.g. `gfs` for `/gfs.{init_dt}`
    pub fn simple_model(&self) -> &'static str {
        let prefix = self.dir.split('.').next().unwrap_or(self.dir);
        prefix.trim_start_matches('/')
    }

    /// Whether directories are per day rather than per init time
    pub fn dirs_by_date(&self) -> bool {
        self.dir.contains("{init_date}")
    }

    pub fn update_freq(&self) -> Duration {
        Duration::hours(i64::from(self.update_freq_hours))
    }

    pub fn delay_to_first_forecast(&self) -> Duration {
        Duration::minutes(self.delay_to_first_forecast_min)
    }

    pub fn avg_max_run_length(&self) -> Duration {
        Duration::minutes(self.avg_max_run_length_min)
    }

    /// Directory of the run initialized at `init_time`
    pub fn render_dir(&self, init_time: DateTime<Utc>) -> String {
        self.dir
            .replace("{init_date}", &init_time.format("%Y%m%d").to_string())
            .replace("{init_dt}", &init_time.format("%Y%m%d%H").to_string())
            .replace("{init_hr}", &init_time.format("%H").to_string())
    }

    /// One run per member, or a single run for deterministic models
    pub fn runs(&'static self) -> Vec<ModelRun> {
        if self.members.is_empty() {
            vec![ModelRun {
                spec: self,
                member: None,
            }]
        } else {
            self.members
                .iter()
                .map(|m| ModelRun {
                    spec: self,
                    member: Some((*m).to_string()),
                })
                .collect()
        }
    }
}

/// A model, narrowed to one ensemble member when it has members
#[derive(Debug, Clone)]
pub struct ModelRun {
    pub spec: &'static ModelSpec,
    pub member: Option<String>,
}

impl ModelRun {
    /// Member name for log lines, empty for deterministic models
    pub fn label(&self) -> &str {
        self.member.as_deref().unwrap_or("")
    }

    pub fn file_name(&self, init_hr: u32, valid_hr: u32) -> String {
        self.spec
            .file
            .replace("{init_hr}", &format!("{:02}", init_hr))
            .replace(
                "{valid_hr}",
                &format!("{:0width$}", valid_hr, width = self.spec.valid_hr_width),
            )
            .replace("{member}", self.label())
    }

    /// Name of the netCDF file a finished run is saved as
    pub fn output_filename(&self) -> String {
        self.spec.filename.replace("{member}", self.label())
    }

    /// Leading part of the grib file names, e.g. `gfs` or `gep01`
    pub fn grib_prefix(&self) -> String {
        let name = self.file_name(0, 0);
        name.split('.').next().unwrap_or_default().to_string()
    }

    pub fn check_url_name(&self) -> &'static str {
        self.spec
            .check_url_name
            .unwrap_or_else(|| self.spec.simple_model())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn init(hour: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2019, 1, 1, hour, 0, 0).unwrap()
    }

    #[test]
    fn test_valid_hours() {
        assert_eq!((GFS_0P25_1HR.valid_hours)(0).len(), 173);
        assert_eq!((NAM_CONUS.valid_hours)(0).len(), 53);
        assert_eq!((RAP.valid_hours)(3).len(), 40);
        assert_eq!((RAP.valid_hours)(4).len(), 22);
        assert_eq!((HRRR_HOURLY.valid_hours)(6).len(), 37);
        assert_eq!((HRRR_HOURLY.valid_hours)(7).len(), 19);
        assert_eq!((GEFS_0P50_RAW.valid_hours)(0).len(), 97);
        assert_eq!((GFS_0P25_1HR.valid_hours)(0).last(), Some(&384));
    }

    #[test]
    fn test_file_names() {
        let gfs = GFS_0P25_1HR.runs();
        assert_eq!(gfs[0].file_name(6, 3), "gfs.t06z.pgrb2.0p25.f003");
        let nam = NAM_CONUS.runs();
        assert_eq!(nam[0].file_name(6, 3), "nam.t06z.awphys03.tm00.grib2");
        let gefs = GEFS_0P50_RAW.runs();
        assert_eq!(gefs[4].file_name(0, 3), "gep02.t00z.pgrb2a.0p50.f003");
    }

    #[test]
    fn test_render_dir() {
        assert_eq!(GFS_0P25_1HR.render_dir(init(6)), "/gfs.2019010106");
        assert_eq!(HRRR_HOURLY.render_dir(init(6)), "/hrrr.20190101/conus");
        assert_eq!(GEFS_0P50_RAW.render_dir(init(6)), "/gefs.20190101/06/pgrb2ap5");
    }

    #[test]
    fn test_simple_model() {
        assert_eq!(GFS_0P25_1HR.simple_model(), "gfs");
        assert_eq!(HRRR_SUBHOURLY.simple_model(), "hrrr");
        assert_eq!(GEFS_0P50_RAW.simple_model(), "gefs");
        assert!(!GFS_0P25_1HR.dirs_by_date());
        assert!(NAM_CONUS.dirs_by_date());
    }

    #[test]
    fn test_gefs_runs() {
        let runs = GEFS_0P50_RAW.runs();
        assert_eq!(runs.len(), 23);
        assert_eq!(runs[0].output_filename(), "gefs_avg.nc");
        assert_eq!(runs[0].grib_prefix(), "geavg");
        assert_eq!(runs[0].check_url_name(), "gens");
        assert_eq!(runs[22].label(), "p20");
    }

    #[test]
    fn test_find_model() {
        assert_eq!(find_model("rap").map(|m| m.filename), Some("rap.nc"));
        assert!(find_model("ecmwf").is_none());
        let runs = find_model("hrrr_hourly").unwrap().runs();
        assert_eq!(runs.len(), 1);
        assert_eq!(runs[0].grib_prefix(), "hrrr");
        assert_eq!(runs[0].check_url_name(), "hrrr");
        assert_eq!(runs[0].label(), "");
    }
}
