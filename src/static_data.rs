use crate::api_types::{PlatformList, StationList};
use crate::logging::log_info;
use anyhow::{Context, Result};
use serde::de::DeserializeOwned;
use std::fs::File;
use std::io::BufReader;
use std::path::Path;

fn load_json<T: DeserializeOwned>(path: &Path) -> Result<T> {
    let f = File::open(path).with_context(|| format!("opening {}", path.display()))?;
    serde_json::from_reader(BufReader::new(f))
        .with_context(|| format!("parsing {}", path.display()))
}

pub fn load_stations(path: &Path) -> Result<StationList> {
    let stations: StationList = load_json(path)?;
    log_info(&format!("Loaded {} stations from {}", stations.len(), path.display()));
    Ok(stations)
}

pub fn load_platforms(path: &Path) -> Result<PlatformList> {
    let platforms: PlatformList = load_json(path)?;
    log_info(&format!(
        "Loaded platforms for {} stations from {}",
        platforms.len(),
        path.display()
    ));
    Ok(platforms)
}
