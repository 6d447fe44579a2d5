use std::fs::File;
use std::path::Path;

use crate::error::{Result, SolarFetchError};
use crate::models::{SiteDefinition, SiteRecord};

/// Read the reference site list CSV
pub fn read_site_csv(path: &Path) -> Result<Vec<SiteRecord>> {
    let file = File::open(path).map_err(|e| {
        SolarFetchError::Config(format!(
            "Cannot read site list '{}': {}",
            path.display(),
            e
        ))
    })?;
    read_site_records(file)
}

/// Parse site records from any reader holding the CSV with a header row
pub fn read_site_records<R: std::io::Read>(reader: R) -> Result<Vec<SiteRecord>> {
    let mut reader = csv::ReaderBuilder::new().trim(csv::Trim::All).from_reader(reader);
    let mut records = Vec::new();
    for record in reader.deserialize() {
        records.push(record?);
    }
    Ok(records)
}

/// Site definitions ready to be posted, one per record
pub fn site_records_to_definitions(records: &[SiteRecord]) -> Vec<SiteDefinition> {
    records.iter().map(SiteRecord::to_site_definition).collect()
}
