//! Command-line interface module
//!
//! Implements all CLI commands using clap:
//! - config init: Initialize configuration file
//! - reference init / update / networks: Reference sites and data
//! - nwp fetch / models: NOMADS model runs

pub mod config;
pub mod nwp;
pub mod reference;
