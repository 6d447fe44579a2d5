//! Data models module
//!
//! Defines the reference datamodel: Site, Observation, interval labels,
//! site list records, and the Frame time table used to move measurements.

pub mod frame;
pub mod site;

pub use frame::Frame;
pub use site::{
    IntervalLabel, IntervalValueType, Metadata, Observation, ObservationValue, Site,
    SiteDefinition, SiteRecord,
};
