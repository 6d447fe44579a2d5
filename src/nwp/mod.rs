//! Numerical weather prediction fetcher for NCEP NOMADS
//!
//! Polls the grib filter for each forecast hour of a model run, downloads
//! the files as they are published and converts the finished run to netCDF.

pub mod convert;
pub mod fetch;
pub mod models;

pub use fetch::{FileRequest, FileStatus, NwpFetcher};
pub use models::{find_model, ModelRun, ModelSpec, MODELS};
