use crate::api_types::{PlatformList, StationList, TrainArrival};
use crate::cache::ResponseCache;
use crate::config::{Config, StaticSource};
use crate::static_data::{load_platforms, load_stations};
use anyhow::{Context, Result};
use reqwest::blocking::Client;
use serde::de::DeserializeOwned;
use std::cell::RefCell;
use std::time::Duration;

/// Supplies the static network and live arrivals. Any error is fatal to the
/// refresh cycle that hit it.
pub trait ArrivalsSource {
    fn stations(&self) -> Result<StationList>;
    fn platforms(&self) -> Result<PlatformList>;
    fn arrivals(&self, station_code: &str, platform_number: &str) -> Result<Vec<TrainArrival>>;
}

pub struct MetroApi {
    base: String,
    client: Client,
    static_source: StaticSource,
    cache: Option<RefCell<Box<dyn ResponseCache>>>,
}

impl MetroApi {
    pub fn new(config: &Config) -> Result<Self> {
        let client = Client::builder()
            .timeout(Duration::from_secs(30))
            .build()
            .context("building HTTP client")?;
        Ok(Self {
            base: config.api_base.clone(),
            client,
            static_source: config.static_source.clone(),
            cache: None,
        })
    }

    pub fn with_cache(mut self, cache: Box<dyn ResponseCache>) -> Self {
        self.cache = Some(RefCell::new(cache));
        self
    }

    pub fn flush_cache(&self) -> Result<()> {
        match &self.cache {
            Some(cache) => cache.borrow_mut().flush(),
            None => Ok(()),
        }
    }

    fn get_json<T: DeserializeOwned>(&self, path: &str) -> Result<T> {
        if let Some(cache) = &self.cache {
            if let Some(body) = cache.borrow_mut().get(path) {
                return serde_json::from_str(&body)
                    .with_context(|| format!("parsing cached response for {}", path));
            }
        }

        let url = format!("{}{}", self.base, path);
        let body = self
            .client
            .get(&url)
            .send()
            .and_then(|r| r.error_for_status())
            .and_then(|r| r.text())
            .with_context(|| format!("GET {}", url))?;
        let parsed = serde_json::from_str(&body).with_context(|| format!("parsing {}", url))?;

        if let Some(cache) = &self.cache {
            cache.borrow_mut().put(path, body);
        }
        Ok(parsed)
    }
}

impl ArrivalsSource for MetroApi {
    fn stations(&self) -> Result<StationList> {
        match &self.static_source {
            StaticSource::Files { stations, .. } => load_stations(stations),
            StaticSource::Remote => self.get_json("stations"),
        }
    }

    fn platforms(&self) -> Result<PlatformList> {
        match &self.static_source {
            StaticSource::Files { platforms, .. } => load_platforms(platforms),
            StaticSource::Remote => self.get_json("stations/platforms"),
        }
    }

    fn arrivals(&self, station_code: &str, platform_number: &str) -> Result<Vec<TrainArrival>> {
        self.get_json(&format!("times/{}/{}", station_code, platform_number))
    }
}

#[cfg(test)]
pub(crate) mod testing {
    use super::*;
    use anyhow::anyhow;
    use compact_str::{CompactString, format_compact};
    use std::collections::{HashMap, HashSet};

    /// In-memory source built from raw JSON, the same shapes the API returns.
    pub struct FixtureSource {
        stations: String,
        platforms: String,
        arrivals: HashMap<CompactString, String>,
        failing: HashSet<CompactString>,
    }

    impl FixtureSource {
        pub fn new(stations: &str, platforms: &str) -> Self {
            Self {
                stations: stations.to_string(),
                platforms: platforms.to_string(),
                arrivals: HashMap::new(),
                failing: HashSet::new(),
            }
        }

        pub fn with_arrivals(mut self, code: &str, platform: &str, json: &str) -> Self {
            self.set_arrivals(code, platform, json);
            self
        }

        pub fn set_arrivals(&mut self, code: &str, platform: &str, json: &str) {
            self.arrivals
                .insert(format_compact!("{}/{}", code, platform), json.to_string());
        }

        pub fn failing(mut self, code: &str, platform: &str) -> Self {
            self.failing.insert(format_compact!("{}/{}", code, platform));
            self
        }
    }

    impl ArrivalsSource for FixtureSource {
        fn stations(&self) -> Result<StationList> {
            Ok(serde_json::from_str(&self.stations)?)
        }

        fn platforms(&self) -> Result<PlatformList> {
            Ok(serde_json::from_str(&self.platforms)?)
        }

        fn arrivals(&self, station_code: &str, platform_number: &str) -> Result<Vec<TrainArrival>> {
            let key = format_compact!("{}/{}", station_code, platform_number);
            if self.failing.contains(&key) {
                return Err(anyhow!("connection refused for times/{}", key));
            }
            match self.arrivals.get(&key) {
                Some(json) => Ok(serde_json::from_str(json)?),
                None => Ok(Vec::new()),
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cache::MemoryCache;

    #[test]
    fn test_cached_response_skips_network() {
        // Nothing listens here; only the cache can answer.
        let config = Config {
            api_base: "http://127.0.0.1:9/".to_string(),
            static_source: StaticSource::Remote,
            ..Config::default()
        };
        let mut cache = MemoryCache::new(Duration::from_secs(600));
        cache.put("stations", r#"{"WTL":"Wallsend"}"#.to_string());
        cache.put("times/WTL/1", "[]".to_string());
        let api = MetroApi::new(&config).unwrap().with_cache(Box::new(cache));

        let stations = api.stations().unwrap();
        assert_eq!(stations["WTL"], "Wallsend");
        assert!(api.arrivals("WTL", "1").unwrap().is_empty());
        assert!(api.arrivals("WTL", "2").is_err());
    }
}
