//! solarfetch
//!
//! Reference data and weather model fetching for the Solar Forecast Arbiter:
//! registers reference sites and observations with the API, posts network
//! measurements to them, and downloads NOMADS model runs as netCDF.

pub mod api;
pub mod cli;
pub mod config;
pub mod display;
pub mod error;
pub mod forecast;
pub mod models;
pub mod nwp;
pub mod reference;
pub mod renderer;

pub use error::{Result, SolarFetchError};
