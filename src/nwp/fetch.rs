use chrono::{DateTime, NaiveDate, NaiveDateTime, Timelike, Utc};
use regex::Regex;
use reqwest::{Client, Response};
use std::collections::BTreeSet;
use std::future::Future;
use std::path::{Path, PathBuf};
use std::time::Duration;
use tokio::io::{AsyncWriteExt, BufWriter};
use tokio::task::{JoinError, JoinSet};
use tracing::{debug, info, warn};

use super::convert;
use super::models::{find_model, ModelRun, ModelSpec, DOMAIN};
use crate::config::NwpSettings;
use crate::error::{Result, SolarFetchError};

/// Timeout for a single grib download
const DOWNLOAD_TIMEOUT: Duration = Duration::from_secs(660);
const CONNECT_TIMEOUT: Duration = Duration::from_secs(60);

/// Parameters of one grib file request
#[derive(Debug, Clone, PartialEq)]
pub struct FileRequest {
    pub endpoint: String,
    pub dir: String,
    pub file: String,
    /// Full query string for the grib filter endpoint
    pub query: Vec<(String, String)>,
}

/// Outcome of waiting for a file to appear on NOMADS
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FileStatus {
    Ready,
    /// The next run is out; stop waiting on this one
    SkipRun,
}

/// Build the requests for every file of the run initialized at `init_time`
pub fn process_params(run: &ModelRun, init_time: DateTime<Utc>) -> Vec<FileRequest> {
    let spec = run.spec;
    let dir = spec.render_dir(init_time);

    let mut base: Vec<(String, String)> = DOMAIN
        .iter()
        .map(|(k, v)| ((*k).to_string(), (*v).to_string()))
        .collect();
    base.extend(
        spec.levels
            .iter()
            .chain(spec.variables.iter())
            .map(|k| ((*k).to_string(), "on".to_string())),
    );
    base.push(("dir".to_string(), dir.clone()));

    (spec.valid_hours)(init_time.hour())
        .into_iter()
        .map(|valid_hr| {
            let file = run.file_name(init_time.hour(), valid_hr);
            let mut query = base.clone();
            query.push(("file".to_string(), file.clone()));
            FileRequest {
                endpoint: spec.endpoint.to_string(),
                dir: dir.clone(),
                file,
                query,
            }
        })
        .collect()
}

/// Fetches model runs from NOMADS
#[derive(Debug, Clone)]
pub struct NwpFetcher {
    client: Client,
    base_url: String,
    check_url: String,
    retries: u32,
    retry_delay: Duration,
}

impl NwpFetcher {
    pub fn new(settings: &NwpSettings) -> Result<Self> {
        let client = Client::builder().connect_timeout(CONNECT_TIMEOUT).build()?;
        Ok(Self {
            client,
            base_url: settings.base_url.clone(),
            check_url: settings.check_url.clone(),
            retries: settings.retries,
            retry_delay: Duration::from_secs(settings.retry_delay_secs),
        })
    }

    /// URL of a file in the production directory tree
    fn production_url(&self, run: &ModelRun, dir: &str, file: &str) -> String {
        format!(
            "{}{}/{}",
            self.check_url.replace("{}", run.check_url_name()),
            dir,
            file
        )
    }

    /// Run `op`, retrying transport failures
    ///
    /// Gives up with the last error after `retries` failed attempts.
    pub async fn with_retries<T, F, Fut>(&self, mut op: F) -> Result<T>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<T>>,
    {
        let mut retried = 0;
        loop {
            match op().await {
                Ok(value) => return Ok(value),
                Err(e) if e.is_transport() => {
                    warn!("Request failed ({}), retrying", e);
                    retried += 1;
                    if retried >= self.retries {
                        return Err(e);
                    }
                    tokio::time::sleep(self.retry_delay).await;
                }
                Err(e) => return Err(e),
            }
        }
    }

    async fn get_text(&self, url: &str) -> Result<String> {
        let response = error_for_status(self.client.get(url).send().await?)?;
        Ok(response.text().await?)
    }

    /// Date or date+hour directories currently listed for the model
    pub async fn get_available_dirs(&self, spec: &ModelSpec) -> Result<BTreeSet<String>> {
        let url = format!("{}{}", self.base_url, spec.endpoint);
        let url = url.as_str();
        let page = self.with_retries(move || self.get_text(url)).await?;

        let digits = if spec.dirs_by_date() { 8 } else { 10 };
        let pattern = format!(r"{}\.([0-9]{{{}}})", regex::escape(spec.simple_model()), digits);
        let re = Regex::new(&pattern)
            .map_err(|e| SolarFetchError::Nwp(format!("Bad directory pattern: {}", e)))?;

        Ok(re
            .captures_iter(&page)
            .filter_map(|c| c.get(1).map(|m| m.as_str().to_string()))
            .collect())
    }

    /// Whether the first file of the following run is already published
    pub async fn check_next_inittime(&self, run: &ModelRun, init_time: DateTime<Utc>) -> bool {
        let next_inittime = init_time + run.spec.update_freq();
        let url = self.production_url(
            run,
            &run.spec.render_dir(next_inittime),
            &run.file_name(next_inittime.hour(), 0),
        );

        match self.client.head(&url).send().await {
            Ok(r) if r.status() == reqwest::StatusCode::OK => {
                warn!(
                    "Skipping to next init time at {} for {} {}",
                    next_inittime,
                    run.spec.simple_model(),
                    run.label()
                );
                true
            }
            _ => false,
        }
    }

    /// Poll until `request`'s file is published
    ///
    /// `first_modified` carries the publish time of the run's first file
    /// between calls. Once the run has been going longer than its usual
    /// length and the next run is out, the current run is abandoned.
    pub async fn wait_for_file(
        &self,
        run: &ModelRun,
        request: &FileRequest,
        init_time: DateTime<Utc>,
        first_modified: &mut Option<DateTime<Utc>>,
    ) -> FileStatus {
        let url = self.production_url(run, &request.dir, &request.file);
        loop {
            match self.client.head(&url).send().await {
                Ok(r) if r.status().is_success() => {
                    if first_modified.is_none() {
                        let modified = last_modified(&r).unwrap_or_else(Utc::now);
                        debug!("First file was available at {} {}", modified, run.label());
                        *first_modified = Some(modified);
                    }
                    debug!("{}/{} is ready for download", request.dir, request.file);
                    return FileStatus::Ready;
                }
                _ => debug!(
                    "Next file not ready yet for {} at {} {}",
                    run.spec.simple_model(),
                    init_time,
                    run.label()
                ),
            }

            if let Some(first) = *first_modified {
                if Utc::now() > first + run.spec.avg_max_run_length()
                    && self.check_next_inittime(run, init_time).await
                {
                    return FileStatus::SkipRun;
                }
            }
            tokio::time::sleep(Duration::from_secs(run.spec.time_between_fcst_hrs)).await;
        }
    }

    /// Download the grib file for `request` under `basepath`
    ///
    /// Files land in `basepath/YYYY/MM/DD/HH/` and always end in `.grib2`.
    /// An existing file is not downloaded again.
    pub async fn fetch_grib_file(
        &self,
        request: &FileRequest,
        basepath: &Path,
        init_time: DateTime<Utc>,
        chunksize_kb: usize,
    ) -> Result<PathBuf> {
        let mut name = request.file.clone();
        if !name.ends_with(".grib2") {
            name.push_str(".grib2");
        }
        let folder = basepath.join(init_time.format("%Y/%m/%d/%H").to_string());
        let filename = folder.join(&name);
        if filename.exists() {
            return Ok(filename);
        }
        tokio::fs::create_dir_all(&folder).await?;

        info!("Getting file {}", filename.display());
        let tmpfile = folder.join(format!(".tmp_{}", name));
        let url = format!("{}{}", self.base_url, request.endpoint);
        let (url, query, target) = (url.as_str(), request.query.as_slice(), tmpfile.as_path());
        self.with_retries(move || self.download(url, query, target, chunksize_kb))
            .await?;
        tokio::fs::rename(&tmpfile, &filename).await?;
        debug!("Successfully saved {}", filename.display());
        Ok(filename)
    }

    async fn download(
        &self,
        url: &str,
        query: &[(String, String)],
        target: &Path,
        chunksize_kb: usize,
    ) -> Result<()> {
        let mut response = error_for_status(
            self.client
                .get(url)
                .query(query)
                .timeout(DOWNLOAD_TIMEOUT)
                .send()
                .await?,
        )?;

        let file = tokio::fs::File::create(target).await?;
        let mut writer = BufWriter::with_capacity(chunksize_kb.max(1) * 1024, file);
        while let Some(chunk) = response.chunk().await? {
            writer.write_all(&chunk).await?;
        }
        writer.flush().await?;
        Ok(())
    }

    /// Download every file of one run, concurrently as they are published
    ///
    /// Finished downloads are collected while later files are polled for, so
    /// the first failure aborts the others and ends the run right away.
    pub async fn fetch_run(
        &self,
        run: &ModelRun,
        basepath: &Path,
        init_time: DateTime<Utc>,
        chunksize_kb: usize,
    ) -> Result<Vec<PathBuf>> {
        let mut downloads = JoinSet::new();
        let mut first_modified = None;
        let mut files = Vec::new();

        for request in process_params(run, init_time) {
            let status = {
                let wait = self.wait_for_file(run, &request, init_time, &mut first_modified);
                tokio::pin!(wait);
                loop {
                    tokio::select! {
                        status = &mut wait => break status,
                        Some(joined) = downloads.join_next(), if !downloads.is_empty() => {
                            match finished_download(joined) {
                                Ok(path) => files.push(path),
                                Err(e) => {
                                    downloads.abort_all();
                                    return Err(e);
                                }
                            }
                        }
                    }
                }
            };

            match status {
                FileStatus::Ready => {
                    let fetcher = self.clone();
                    let basepath = basepath.to_path_buf();
                    downloads.spawn(async move {
                        fetcher
                            .fetch_grib_file(&request, &basepath, init_time, chunksize_kb)
                            .await
                    });
                }
                FileStatus::SkipRun => break,
            }
        }

        while let Some(joined) = downloads.join_next().await {
            match finished_download(joined) {
                Ok(path) => files.push(path),
                Err(e) => {
                    downloads.abort_all();
                    return Err(e);
                }
            }
        }
        files.sort();
        Ok(files)
    }

    /// Pick the first init time to fetch
    ///
    /// The earliest listed run without a converted file wins; when every
    /// listed run is converted, the one after the latest.
    pub async fn startup_find_next_runtime(
        &self,
        model_path: &Path,
        run: &ModelRun,
    ) -> Result<DateTime<Utc>> {
        let dirs = self.get_available_dirs(run.spec).await?;
        let filename = run.output_filename();
        let mut max_time: Option<DateTime<Utc>> = None;
        let mut no_file = Vec::new();

        for dir in &dirs {
            for init_time in init_times_for_dir(dir, run.spec)? {
                if run_path(model_path, init_time).join(&filename).exists() {
                    max_time = max_time.max(Some(init_time));
                } else {
                    no_file.push(init_time);
                }
            }
        }

        let init_time = match no_file.into_iter().min() {
            Some(earliest) => earliest,
            None => match max_time {
                Some(latest) => latest + run.spec.update_freq(),
                None => {
                    return Err(SolarFetchError::Nwp(format!(
                        "Failed to find next available model from NOMADS {}",
                        run.label()
                    )))
                }
            },
        };
        sleep_until_inittime(init_time, run).await;
        Ok(init_time)
    }

    /// Advance to the next init time that has not been converted yet
    pub async fn next_run_time(
        &self,
        init_time: DateTime<Utc>,
        model_path: &Path,
        run: &ModelRun,
    ) -> DateTime<Utc> {
        let filename = run.output_filename();
        let mut next = init_time + run.spec.update_freq();
        while run_path(model_path, next).join(&filename).exists() {
            next += run.spec.update_freq();
        }
        sleep_until_inittime(next, run).await;
        next
    }

    /// Fetch, convert and optimize runs of one model (member)
    pub async fn run_loop(
        &self,
        run: &ModelRun,
        model_path: &Path,
        chunksize_kb: usize,
        once: bool,
    ) -> Result<()> {
        let mut init_time = self.startup_find_next_runtime(model_path, run).await?;
        loop {
            let files = self
                .fetch_run(run, model_path, init_time, chunksize_kb)
                .await?;
            if let Some(folder) = files.first().and_then(|f| f.parent()) {
                let nctmp = convert::process_grib_to_netcdf(folder, run).await?;
                convert::optimize_netcdf(&nctmp, &folder.join(run.output_filename())).await?;
                for file in &files {
                    tokio::fs::remove_file(file).await?;
                }
            }
            if once {
                break;
            }
            info!("Moving on to next model run");
            init_time = self.next_run_time(init_time, model_path, run).await;
        }
        Ok(())
    }

    /// Keep `basepath/<model>` supplied with converted runs
    ///
    /// Ensemble models run one loop per member concurrently.
    pub async fn run(
        &self,
        basepath: &Path,
        model_key: &str,
        chunksize_kb: usize,
        once: bool,
    ) -> Result<()> {
        let spec = find_model(model_key)
            .ok_or_else(|| SolarFetchError::Config(format!("Unknown model: {}", model_key)))?;
        let model_path = basepath.join(model_key);
        let mut runs = spec.runs();

        if runs.len() == 1 {
            let run = runs.remove(0);
            return self.run_loop(&run, &model_path, chunksize_kb, once).await;
        }

        let mut loops = JoinSet::new();
        for run in runs {
            let fetcher = self.clone();
            let model_path = model_path.clone();
            loops.spawn(async move {
                let result = fetcher.run_loop(&run, &model_path, chunksize_kb, once).await;
                (run.label().to_string(), result)
            });
        }

        let mut first_error = None;
        while let Some(joined) = loops.join_next().await {
            match joined {
                Ok((_, Ok(()))) => {}
                Ok((member, Err(e))) => {
                    warn!("Run loop for member {} failed: {}", member, e);
                    first_error.get_or_insert(e);
                }
                Err(e) => {
                    first_error.get_or_insert(SolarFetchError::Nwp(format!(
                        "Run loop task failed: {}",
                        e
                    )));
                }
            }
        }
        match first_error {
            Some(e) => Err(e),
            None => Ok(()),
        }
    }
}

fn finished_download(
    joined: std::result::Result<Result<PathBuf>, JoinError>,
) -> Result<PathBuf> {
    joined.map_err(|e| SolarFetchError::Nwp(format!("Download task failed: {}", e)))?
}

fn error_for_status(response: Response) -> Result<Response> {
    let status = response.status();
    if status.is_success() {
        Ok(response)
    } else {
        Err(SolarFetchError::Api {
            status: status.as_u16(),
            body: format!("request to {} failed", response.url()),
        })
    }
}

fn last_modified(response: &Response) -> Option<DateTime<Utc>> {
    let value = response.headers().get(reqwest::header::LAST_MODIFIED)?;
    DateTime::parse_from_rfc2822(value.to_str().ok()?)
        .ok()
        .map(|dt| dt.with_timezone(&Utc))
}

/// Directory of a run under the model path: `YYYY/MM/DD/HH`
pub fn run_path(model_path: &Path, init_time: DateTime<Utc>) -> PathBuf {
    model_path.join(init_time.format("%Y/%m/%d/%H").to_string())
}

/// Init times a listed directory stands for
fn init_times_for_dir(dir: &str, spec: &ModelSpec) -> Result<Vec<DateTime<Utc>>> {
    let bad = |e: chrono::ParseError| {
        SolarFetchError::Nwp(format!("Unexpected directory name '{}': {}", dir, e))
    };
    if dir.len() == 8 {
        let date = NaiveDate::parse_from_str(dir, "%Y%m%d").map_err(bad)?;
        Ok((0u32..24)
            .step_by(spec.update_freq_hours.max(1) as usize)
            .filter_map(|hr| date.and_hms_opt(hr, 0, 0))
            .map(|dt| dt.and_utc())
            .collect())
    } else {
        let dt = NaiveDateTime::parse_from_str(&format!("{}00", dir), "%Y%m%d%H%M").map_err(bad)?;
        Ok(vec![dt.and_utc()])
    }
}

/// Sleep until the first file of the run is likely published
pub async fn sleep_until_inittime(init_time: DateTime<Utc>, run: &ModelRun) {
    let likely_ready = init_time + run.spec.delay_to_first_forecast();
    let now = Utc::now();
    if likely_ready > now {
        let wait = (likely_ready - now).to_std().unwrap_or_default();
        info!(
            "Sleeping {:.1}s for next model run {}",
            wait.as_secs_f64(),
            run.label()
        );
        tokio::time::sleep(wait).await;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::nwp::models::{GEFS_0P50_RAW, GFS_0P25_1HR, NAM_CONUS};
    use chrono::TimeZone;

    fn init(hour: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2019, 1, 1, hour, 0, 0).unwrap()
    }

    fn value<'a>(request: &'a FileRequest, key: &str) -> Option<&'a str> {
        request
            .query
            .iter()
            .find(|(k, _)| k == key)
            .map(|(_, v)| v.as_str())
    }

    #[test]
    fn test_process_params() {
        let runs = GFS_0P25_1HR.runs();
        let requests = process_params(&runs[0], init(6));
        assert_eq!(requests.len(), 173);

        let first = &requests[0];
        assert_eq!(first.endpoint, "filter_gfs_0p25_1hr.pl");
        assert_eq!(first.dir, "/gfs.2019010106");
        assert_eq!(first.file, "gfs.t06z.pgrb2.0p25.f000");
        assert_eq!(value(first, "file"), Some("gfs.t06z.pgrb2.0p25.f000"));
        assert_eq!(value(first, "dir"), Some("/gfs.2019010106"));
        assert_eq!(value(first, "var_DSWRF"), Some("on"));
        assert_eq!(value(first, "leftlon"), Some("-126"));
        assert_eq!(value(first, "subregion"), Some(""));
        assert_eq!(requests[172].file, "gfs.t06z.pgrb2.0p25.f384");
    }

    #[test]
    fn test_process_params_member() {
        let runs = GEFS_0P50_RAW.runs();
        let requests = process_params(&runs[1], init(0));
        assert_eq!(requests[1].file, "gec00.t00z.pgrb2a.0p50.f003");
        assert_eq!(requests[1].dir, "/gefs.20190101/00/pgrb2ap5");
    }

    #[test]
    fn test_init_times_for_dir() {
        let by_date = init_times_for_dir("20190101", &NAM_CONUS).unwrap();
        assert_eq!(by_date, vec![init(0), init(6), init(12), init(18)]);

        let by_hour = init_times_for_dir("2019010106", &GFS_0P25_1HR).unwrap();
        assert_eq!(by_hour, vec![init(6)]);

        assert!(init_times_for_dir("2019xx01", &NAM_CONUS).is_err());
    }

    #[test]
    fn test_run_path() {
        let path = run_path(Path::new("/data/gfs_0p25"), init(6));
        assert_eq!(path, PathBuf::from("/data/gfs_0p25/2019/01/01/06"));
    }
}
