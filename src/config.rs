use crate::logging::log_info;
use crate::train::{ColourTable, Interchange};
use std::path::{Path, PathBuf};
use std::time::Duration;

pub const API_BASE: &str = "https://metro-rti.nexus.org.uk/api/";
pub const STATIONS_FILE: &str = "stations.json";
pub const PLATFORMS_FILE: &str = "platforms.json";
pub const BASE_MAP: &str = "map.png";
pub const OUTPUT_MAP: &str = "map-annoted.png";

/// Where the station and platform metadata comes from.
#[derive(Debug, Clone)]
pub enum StaticSource {
    Files {
        stations: PathBuf,
        platforms: PathBuf,
    },
    /// The `stations` and `stations/platforms` endpoints of the API.
    Remote,
}

impl StaticSource {
    /// Local metadata files when both exist, otherwise the API.
    pub fn local_or_remote(stations: &Path, platforms: &Path) -> Self {
        if stations.exists() && platforms.exists() {
            return StaticSource::Files {
                stations: stations.to_path_buf(),
                platforms: platforms.to_path_buf(),
            };
        }
        log_info(&format!(
            "{} or {} missing, fetching network metadata from the API",
            stations.display(),
            platforms.display()
        ));
        StaticSource::Remote
    }
}

#[derive(Debug, Clone)]
pub struct NetworkConfig {
    pub colours: ColourTable,
    pub interchanges: Vec<Interchange>,
}

impl Default for NetworkConfig {
    fn default() -> Self {
        Self {
            colours: ColourTable::default(),
            interchanges: vec![Interchange::monument()],
        }
    }
}

/// On-disk response cache. Off unless set on the config.
#[derive(Debug, Clone, PartialEq)]
pub struct CacheConfig {
    pub dir: PathBuf,
    pub ttl: Duration,
}

#[derive(Debug, Clone)]
pub struct Config {
    pub api_base: String,
    pub static_source: StaticSource,
    pub base_map: PathBuf,
    pub output_map: PathBuf,
    pub network: NetworkConfig,
    pub cache: Option<CacheConfig>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            api_base: API_BASE.to_string(),
            static_source: StaticSource::local_or_remote(
                Path::new(STATIONS_FILE),
                Path::new(PLATFORMS_FILE),
            ),
            base_map: PathBuf::from(BASE_MAP),
            output_map: PathBuf::from(OUTPUT_MAP),
            network: NetworkConfig::default(),
            cache: None,
        }
    }
}
