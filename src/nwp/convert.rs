//! grib2 to netCDF conversion
//!
//! `wgrib2` turns the downloaded grib files into one netCDF file per run and
//! `nccopy` then rewrites it compressed and chunked for time-series reads.

use std::os::unix::fs::PermissionsExt;
use std::path::{Path, PathBuf};
use std::process::Stdio;
use tokio::process::Command;
use tracing::{error, info, warn};
use walkdir::WalkDir;

use super::models::{find_model, ModelRun};
use crate::error::{Result, SolarFetchError};

/// Runs with `bash`: folder, output file, grib prefix and an optional
/// wgrib2 match expression
pub const GRIB_TO_NC4: &str = r#"
set -e

FOLDER=$1
NCFILENAME=$2
GRIBPREFIX=$3
AVGFMT="${4:-}"

pushd $FOLDER > /dev/null

nctbl=$(mktemp -p . nc.tbl.XXXX)

function finish {
   rm $nctbl
   popd > /dev/null
}

trap finish EXIT

cat <<EOF > $nctbl
TMP:surface:ignore
TMP:2 m above ground:t2m
UGRD:10 m above ground:ignore
VGRD:10 m above ground:ignore
TCDC:entire atmosphere:tcdc
TCDC:entire atmosphere (considered as a single layer):tcdc
DSWRF:surface:dswrf
VBDSF:surface:vbdsf
VDDSF:surface:vddsf
WIND:10 m above ground:si10
EOF

for file in $(ls -1 $GRIBPREFIX*.grib2); do
    wgrib2 $file -wind_speed - -match "(UGRD|VGRD)" | \
        wgrib2 - -append -grib_out $file;
    done;

cat $GRIBPREFIX*.grib2 | \
    wgrib2 - -nc4 -nc_table $nctbl $AVGFMT -append -netcdf $NCFILENAME
"#;

/// Tools that must be on `PATH` to convert runs
pub const REQUIRED_TOOLS: [&str; 2] = ["wgrib2", "nccopy"];

/// Subhourly HRRR only averages some fields; keep those plus the instantaneous ones
fn match_filter(run: &ModelRun) -> Option<&'static str> {
    (run.spec.key == "hrrr_subhourly").then_some("-match ave|TMP|VDDSF")
}

/// Locate an executable in `PATH`
pub fn find_in_path(program: &str) -> Option<PathBuf> {
    let path = std::env::var_os("PATH")?;
    std::env::split_paths(&path)
        .map(|dir| dir.join(program))
        .find(|candidate| candidate.is_file())
}

/// Fail early when a conversion tool is missing
pub fn check_tools() -> Result<()> {
    for tool in REQUIRED_TOOLS {
        if find_in_path(tool).is_none() {
            return Err(SolarFetchError::Nwp(format!(
                "{} was not found in PATH and is required",
                tool
            )));
        }
    }
    Ok(())
}

/// grib files of one run in `folder`, sorted by name
pub fn grib_files(folder: &Path, prefix: &str) -> Vec<PathBuf> {
    let mut files: Vec<PathBuf> = WalkDir::new(folder)
        .min_depth(1)
        .max_depth(1)
        .into_iter()
        .filter_map(|e| e.ok())
        .filter(|e| e.file_type().is_file())
        .filter(|e| {
            let name = e.file_name().to_string_lossy();
            name.starts_with(prefix) && name.ends_with(".grib2")
        })
        .map(|e| e.into_path())
        .collect();
    files.sort();
    files
}

/// Convert the run's grib files in `folder` into a temporary netCDF file
///
/// Returns the path of the temporary file, which the caller owns.
pub async fn process_grib_to_netcdf(folder: &Path, run: &ModelRun) -> Result<PathBuf> {
    let nctmp = tempfile::Builder::new()
        .prefix(".nc")
        .tempfile_in(folder)?
        .into_temp_path()
        .keep()
        .map_err(|e| e.error)?;
    let grib_prefix = run.grib_prefix();
    info!("Converting GRIB files to NetCDF with wgrib2 {}", run.label());

    let mut script = tempfile::NamedTempFile::new()?;
    std::io::Write::write_all(&mut script, GRIB_TO_NC4.as_bytes())?;

    let mut command = Command::new("bash");
    command
        .arg(script.path())
        .arg(folder)
        .arg(&nctmp)
        .arg(&grib_prefix)
        .stdout(Stdio::null())
        .stderr(Stdio::piped());
    if let Some(filter) = match_filter(run) {
        command.arg(filter);
    }

    let output = match command.output().await {
        Ok(output) => output,
        Err(e) => {
            remove_intermediate(&nctmp).await;
            return Err(e.into());
        }
    };
    if !output.status.success() {
        error!(
            "Error converting grib files {}*.grib2 to netCDF\n{}",
            grib_prefix,
            String::from_utf8_lossy(&output.stderr)
        );
        remove_intermediate(&nctmp).await;
        return Err(SolarFetchError::Nwp(format!(
            "wgrib2 conversion of {}*.grib2 in {} failed",
            grib_prefix,
            folder.display()
        )));
    }
    Ok(nctmp)
}

/// Compress and rechunk `nctmp` into `final_path`
///
/// `nctmp` is removed whether or not this succeeds.
pub async fn optimize_netcdf(nctmp: &Path, final_path: &Path) -> Result<()> {
    let result = rewrite_netcdf(nctmp, final_path).await;
    remove_intermediate(nctmp).await;
    result
}

async fn remove_intermediate(path: &Path) {
    if let Err(e) = tokio::fs::remove_file(path).await {
        warn!("Could not remove intermediate file {}: {}", path.display(), e);
    }
}

async fn rewrite_netcdf(nctmp: &Path, final_path: &Path) -> Result<()> {
    info!("Optimizing NetCDF file to save at {}", final_path.display());
    let parent = final_path.parent().unwrap_or_else(|| Path::new("."));
    let tmp_path = tempfile::Builder::new()
        .prefix(".opt")
        .tempfile_in(parent)?
        .into_temp_path();

    let output = Command::new("nccopy")
        .args(["-k", "nc4", "-d", "1", "-s", "-u", "-c", "latitude/50,longitude/50"])
        .arg(nctmp)
        .arg(&tmp_path)
        .stdout(Stdio::null())
        .stderr(Stdio::piped())
        .output()
        .await?;
    if !output.status.success() {
        error!(
            "nccopy failed for {}\n{}",
            nctmp.display(),
            String::from_utf8_lossy(&output.stderr)
        );
        return Err(SolarFetchError::Nwp(format!(
            "Failed to optimize {}",
            nctmp.display()
        )));
    }

    tmp_path
        .persist(final_path)
        .map_err(|e| SolarFetchError::Io(e.error))?;
    tokio::fs::set_permissions(final_path, std::fs::Permissions::from_mode(0o644)).await?;
    info!("Done optimizing NetCDF at {}", final_path.display());
    Ok(())
}

/// Convert grib files already present in `path` for the given model
///
/// Each member of an ensemble model is converted to its own file. Grib
/// files are removed once their netCDF file is written.
pub async fn optimize_only(path: &Path, model_key: &str) -> Result<Vec<PathBuf>> {
    let spec = find_model(model_key)
        .ok_or_else(|| SolarFetchError::Config(format!("Unknown model: {}", model_key)))?;

    let mut written = Vec::new();
    for run in spec.runs() {
        let files = grib_files(path, &run.grib_prefix());
        if files.is_empty() {
            continue;
        }
        let nctmp = process_grib_to_netcdf(path, &run).await?;
        let final_path = path.join(run.output_filename());
        optimize_netcdf(&nctmp, &final_path).await?;
        for file in files {
            tokio::fs::remove_file(file).await?;
        }
        written.push(final_path);
    }

    if written.is_empty() {
        return Err(SolarFetchError::Nwp(format!(
            "No {} grib files found in {}",
            model_key,
            path.display()
        )));
    }
    Ok(written)
}
