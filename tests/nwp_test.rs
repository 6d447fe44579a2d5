use chrono::{DateTime, TimeZone, Utc};
use solarfetch::config::NwpSettings;
use solarfetch::nwp::fetch::process_params;
use solarfetch::nwp::fetch::run_path;
use solarfetch::nwp::models::{GFS_0P25_1HR, NAM_CONUS, RAP};
use solarfetch::nwp::{FileStatus, NwpFetcher};
use solarfetch::SolarFetchError;
use std::fs;
use std::path::Path;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;
use tempfile::TempDir;
use wiremock::matchers::{method, path, path_regex, query_param};
use wiremock::{Mock, MockServer, ResponseTemplate};

fn settings(server: &MockServer) -> NwpSettings {
    NwpSettings {
        base_url: format!("{}/cgi-bin/", server.uri()),
        check_url: format!("{}/pub/{{}}/prod", server.uri()),
        chunksize_kb: 1,
        retries: 2,
        retry_delay_secs: 0,
    }
}

fn init(hour: u32) -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2019, 1, 1, hour, 0, 0).unwrap()
}

/// Mark the run at `init_time` as already converted
fn converted(model_path: &Path, init_time: DateTime<Utc>, filename: &str) {
    let folder = run_path(model_path, init_time);
    fs::create_dir_all(&folder).unwrap();
    fs::write(folder.join(filename), b"netcdf").unwrap();
}

async fn gfs_listing() -> MockServer {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/cgi-bin/filter_gfs_0p25_1hr.pl"))
        .respond_with(
            ResponseTemplate::new(200).set_body_string("gfs.2019010100 gfs.2019010106"),
        )
        .mount(&server)
        .await;
    server
}

#[tokio::test]
async fn test_get_available_dirs() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/cgi-bin/filter_gfs_0p25_1hr.pl"))
        .respond_with(ResponseTemplate::new(200).set_body_string(
            r#"<a href="?dir=/gfs.2019010100">gfs.2019010100</a>
<a href="?dir=/gfs.2019010106">gfs.2019010106</a>
<a href="?dir=/gfs.20190101">gfs.20190101</a>"#,
        ))
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/cgi-bin/filter_nam.pl"))
        .respond_with(
            ResponseTemplate::new(200).set_body_string("nam.20190101 nam.20181231 namer.20190101"),
        )
        .mount(&server)
        .await;

    let fetcher = NwpFetcher::new(&settings(&server)).unwrap();

    let gfs: Vec<String> = fetcher
        .get_available_dirs(&GFS_0P25_1HR)
        .await
        .unwrap()
        .into_iter()
        .collect();
    assert_eq!(gfs, vec!["2019010100", "2019010106"]);

    let nam: Vec<String> = fetcher
        .get_available_dirs(&NAM_CONUS)
        .await
        .unwrap()
        .into_iter()
        .collect();
    assert_eq!(nam, vec!["20181231", "20190101"]);
}

#[tokio::test]
async fn test_fetch_grib_file_downloads_once() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/cgi-bin/filter_gfs_0p25_1hr.pl"))
        .and(query_param("file", "gfs.t06z.pgrb2.0p25.f000"))
        .and(query_param("dir", "/gfs.2019010106"))
        .and(query_param("var_DSWRF", "on"))
        .respond_with(ResponseTemplate::new(200).set_body_bytes(b"GRIB-bytes".to_vec()))
        .expect(1)
        .mount(&server)
        .await;

    let fetcher = NwpFetcher::new(&settings(&server)).unwrap();
    let runs = GFS_0P25_1HR.runs();
    let requests = process_params(&runs[0], init(6));
    let dir = TempDir::new().unwrap();

    let saved = fetcher
        .fetch_grib_file(&requests[0], dir.path(), init(6), 1)
        .await
        .unwrap();
    assert_eq!(
        saved,
        dir.path().join("2019/01/01/06/gfs.t06z.pgrb2.0p25.f000.grib2")
    );
    assert_eq!(fs::read(&saved).unwrap(), b"GRIB-bytes");
    assert!(!dir
        .path()
        .join("2019/01/01/06/.tmp_gfs.t06z.pgrb2.0p25.f000.grib2")
        .exists());

    let again = fetcher
        .fetch_grib_file(&requests[0], dir.path(), init(6), 1)
        .await
        .unwrap();
    assert_eq!(again, saved);
}

#[tokio::test]
async fn test_fetch_grib_file_gives_up_after_retries() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/cgi-bin/filter_gfs_0p25_1hr.pl"))
        .respond_with(ResponseTemplate::new(500))
        .expect(2)
        .mount(&server)
        .await;

    let fetcher = NwpFetcher::new(&settings(&server)).unwrap();
    let runs = GFS_0P25_1HR.runs();
    let requests = process_params(&runs[0], init(6));
    let dir = TempDir::new().unwrap();

    let err = fetcher
        .fetch_grib_file(&requests[0], dir.path(), init(6), 1)
        .await
        .unwrap_err();
    assert!(matches!(err, SolarFetchError::Api { status: 500, .. }));
    assert!(!dir
        .path()
        .join("2019/01/01/06/gfs.t06z.pgrb2.0p25.f000.grib2")
        .exists());
}

#[tokio::test]
async fn test_with_retries_passes_through_other_errors() {
    let server = MockServer::start().await;
    let fetcher = NwpFetcher::new(&settings(&server)).unwrap();
    let counter = AtomicUsize::new(0);
    let calls = &counter;

    let result: solarfetch::Result<()> = fetcher
        .with_retries(move || async move {
            calls.fetch_add(1, Ordering::SeqCst);
            Err(SolarFetchError::Parse("bad".to_string()))
        })
        .await;

    assert!(result.is_err());
    assert_eq!(counter.load(Ordering::SeqCst), 1);
}

#[tokio::test]
async fn test_with_retries_recovers() {
    let server = MockServer::start().await;
    let fetcher = NwpFetcher::new(&settings(&server)).unwrap();
    let counter = AtomicUsize::new(0);
    let calls = &counter;

    let result = fetcher
        .with_retries(move || async move {
            if calls.fetch_add(1, Ordering::SeqCst) == 0 {
                Err(SolarFetchError::Api {
                    status: 503,
                    body: String::new(),
                })
            } else {
                Ok(7)
            }
        })
        .await;

    assert_eq!(result.unwrap(), 7);
    assert_eq!(counter.load(Ordering::SeqCst), 2);
}

#[tokio::test]
async fn test_check_next_inittime() {
    let server = MockServer::start().await;
    Mock::given(method("HEAD"))
        .and(path("/pub/gfs/prod/gfs.2019010112/gfs.t12z.pgrb2.0p25.f000"))
        .respond_with(ResponseTemplate::new(200))
        .mount(&server)
        .await;

    let fetcher = NwpFetcher::new(&settings(&server)).unwrap();
    let runs = GFS_0P25_1HR.runs();

    assert!(fetcher.check_next_inittime(&runs[0], init(6)).await);
    assert!(!fetcher.check_next_inittime(&runs[0], init(12)).await);
}

#[tokio::test]
async fn test_wait_for_file_records_first_modified() {
    let server = MockServer::start().await;
    Mock::given(method("HEAD"))
        .and(path("/pub/rap/prod/rap.20190101/rap.t04z.awp130pgrbf00.grib2"))
        .respond_with(
            ResponseTemplate::new(200)
                .insert_header("Last-Modified", "Tue, 01 Jan 2019 04:50:00 GMT"),
        )
        .mount(&server)
        .await;

    let fetcher = NwpFetcher::new(&settings(&server)).unwrap();
    let runs = RAP.runs();
    let requests = process_params(&runs[0], init(4));
    let mut first_modified = None;

    let status = fetcher
        .wait_for_file(&runs[0], &requests[0], init(4), &mut first_modified)
        .await;

    assert_eq!(status, FileStatus::Ready);
    assert_eq!(
        first_modified,
        Some(Utc.with_ymd_and_hms(2019, 1, 1, 4, 50, 0).unwrap())
    );
}

#[tokio::test]
async fn test_fetch_run_downloads_every_hour() {
    let server = MockServer::start().await;
    Mock::given(method("HEAD"))
        .and(path_regex(
            r"^/pub/rap/prod/rap\.20190101/rap\.t04z\.awp130pgrbf\d{2}\.grib2$",
        ))
        .respond_with(ResponseTemplate::new(200))
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/cgi-bin/filter_rap.pl"))
        .respond_with(ResponseTemplate::new(200).set_body_bytes(b"GRIB".to_vec()))
        .expect(22)
        .mount(&server)
        .await;

    let fetcher = NwpFetcher::new(&settings(&server)).unwrap();
    let runs = RAP.runs();
    let dir = TempDir::new().unwrap();

    let files = fetcher
        .fetch_run(&runs[0], dir.path(), init(4), 1)
        .await
        .unwrap();

    assert_eq!(files.len(), 22);
    assert_eq!(
        files[0],
        dir.path().join("2019/01/01/04/rap.t04z.awp130pgrbf00.grib2")
    );
    assert!(files.iter().all(|f| f.exists()));
}

#[tokio::test]
async fn test_wait_for_file_skips_to_next_run() {
    let server = MockServer::start().await;
    Mock::given(method("HEAD"))
        .and(path("/pub/rap/prod/rap.20190101/rap.t05z.awp130pgrbf00.grib2"))
        .respond_with(ResponseTemplate::new(200))
        .expect(1)
        .mount(&server)
        .await;

    let fetcher = NwpFetcher::new(&settings(&server)).unwrap();
    let runs = RAP.runs();
    let requests = process_params(&runs[0], init(4));
    let mut first_modified = Some(init(4));

    let status = fetcher
        .wait_for_file(&runs[0], &requests[1], init(4), &mut first_modified)
        .await;

    assert_eq!(status, FileStatus::SkipRun);
}

#[tokio::test]
async fn test_fetch_run_stops_at_next_run() {
    let server = MockServer::start().await;
    Mock::given(method("HEAD"))
        .and(path("/pub/rap/prod/rap.20190101/rap.t04z.awp130pgrbf00.grib2"))
        .respond_with(
            ResponseTemplate::new(200)
                .insert_header("Last-Modified", "Tue, 01 Jan 2019 04:50:00 GMT"),
        )
        .mount(&server)
        .await;
    Mock::given(method("HEAD"))
        .and(path("/pub/rap/prod/rap.20190101/rap.t05z.awp130pgrbf00.grib2"))
        .respond_with(ResponseTemplate::new(200))
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/cgi-bin/filter_rap.pl"))
        .respond_with(ResponseTemplate::new(200).set_body_bytes(b"GRIB".to_vec()))
        .expect(1)
        .mount(&server)
        .await;

    let fetcher = NwpFetcher::new(&settings(&server)).unwrap();
    let runs = RAP.runs();
    let dir = TempDir::new().unwrap();

    let files = fetcher
        .fetch_run(&runs[0], dir.path(), init(4), 1)
        .await
        .unwrap();

    assert_eq!(
        files,
        vec![dir.path().join("2019/01/01/04/rap.t04z.awp130pgrbf00.grib2")]
    );
}

#[tokio::test]
async fn test_fetch_run_fails_while_later_files_are_pending() {
    let server = MockServer::start().await;
    Mock::given(method("HEAD"))
        .and(path("/pub/rap/prod/rap.20190101/rap.t04z.awp130pgrbf00.grib2"))
        .respond_with(ResponseTemplate::new(200))
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/cgi-bin/filter_rap.pl"))
        .respond_with(ResponseTemplate::new(500))
        .expect(2)
        .mount(&server)
        .await;

    let fetcher = NwpFetcher::new(&settings(&server)).unwrap();
    let runs = RAP.runs();
    let dir = TempDir::new().unwrap();

    let result = tokio::time::timeout(
        Duration::from_secs(20),
        fetcher.fetch_run(&runs[0], dir.path(), init(4), 1),
    )
    .await
    .expect("fetch_run kept polling after a download failed");

    assert!(matches!(result, Err(SolarFetchError::Api { status: 500, .. })));
}

#[tokio::test]
async fn test_startup_picks_earliest_unconverted_run() {
    let server = gfs_listing().await;
    let fetcher = NwpFetcher::new(&settings(&server)).unwrap();
    let runs = GFS_0P25_1HR.runs();
    let dir = TempDir::new().unwrap();
    converted(dir.path(), init(0), "gfs_0p25.nc");

    let next = fetcher
        .startup_find_next_runtime(dir.path(), &runs[0])
        .await
        .unwrap();

    assert_eq!(next, init(6));
}

#[tokio::test]
async fn test_startup_after_latest_converted_run() {
    let server = gfs_listing().await;
    let fetcher = NwpFetcher::new(&settings(&server)).unwrap();
    let runs = GFS_0P25_1HR.runs();
    let dir = TempDir::new().unwrap();
    converted(dir.path(), init(0), "gfs_0p25.nc");
    converted(dir.path(), init(6), "gfs_0p25.nc");

    let next = fetcher
        .startup_find_next_runtime(dir.path(), &runs[0])
        .await
        .unwrap();

    assert_eq!(next, init(12));
}

#[tokio::test]
async fn test_startup_without_listed_runs() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/cgi-bin/filter_gfs_0p25_1hr.pl"))
        .respond_with(ResponseTemplate::new(200).set_body_string("<html></html>"))
        .mount(&server)
        .await;
    let fetcher = NwpFetcher::new(&settings(&server)).unwrap();
    let runs = GFS_0P25_1HR.runs();
    let dir = TempDir::new().unwrap();

    let err = fetcher
        .startup_find_next_runtime(dir.path(), &runs[0])
        .await
        .unwrap_err();

    assert!(err
        .to_string()
        .contains("Failed to find next available model"));
}

#[tokio::test]
async fn test_next_run_time_skips_converted_runs() {
    let server = MockServer::start().await;
    let fetcher = NwpFetcher::new(&settings(&server)).unwrap();
    let runs = RAP.runs();
    let dir = TempDir::new().unwrap();
    converted(dir.path(), init(5), "rap.nc");
    converted(dir.path(), init(6), "rap.nc");

    assert_eq!(
        fetcher.next_run_time(init(4), dir.path(), &runs[0]).await,
        init(7)
    );
    assert_eq!(
        fetcher.next_run_time(init(7), dir.path(), &runs[0]).await,
        init(8)
    );
}

#[tokio::test]
async fn test_run_starts_a_loop_per_member() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/cgi-bin/filter_gens_0p50.pl"))
        .respond_with(ResponseTemplate::new(200).set_body_string("<html></html>"))
        .expect(23)
        .mount(&server)
        .await;
    let fetcher = NwpFetcher::new(&settings(&server)).unwrap();
    let dir = TempDir::new().unwrap();

    let err = fetcher.run(dir.path(), "gefs", 1, true).await.unwrap_err();

    assert!(err
        .to_string()
        .contains("Failed to find next available model"));
}

#[tokio::test]
async fn test_run_unknown_model() {
    let server = MockServer::start().await;
    let fetcher = NwpFetcher::new(&settings(&server)).unwrap();
    let dir = TempDir::new().unwrap();

    let err = fetcher.run(dir.path(), "ecmwf", 1, true).await.unwrap_err();
    assert!(matches!(err, SolarFetchError::Config(_)));
}
