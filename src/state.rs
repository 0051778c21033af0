use crate::api::ArrivalsSource;
use crate::api_types::{Coordinates, PlatformList, PlatformRecord, StationList, TrainArrival};
use crate::config::NetworkConfig;
use crate::error::PositionError;
use crate::logging::{log_info, log_warn};
use crate::train::{ColourTable, Direction, LocationGrammar, TrainMarker, TrainState};
use anyhow::{Result, anyhow};
use chrono::DateTime;
use chrono_tz::Tz;
use compact_str::CompactString;
use std::collections::BTreeMap;
use std::collections::btree_map::Entry;
use std::fmt;

// Used when a platform comes without any coordinates block.
const FALLBACK_LATITUDE: f64 = 55.0135612487793;
const FALLBACK_LONGITUDE: f64 = -1.64502501487732;

/// Station name -> Station. Ordered so refreshes walk the network the same
/// way every cycle.
pub type Stations = BTreeMap<CompactString, Station>;

/// Global platform key: (station code, platform number).
#[derive(Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct PlatformKey {
    pub station: CompactString,
    pub number: CompactString,
}

/// One prediction of a train's due time at a platform. Replaced wholesale by
/// the next prediction for the same platform.
#[derive(Clone, Debug, PartialEq)]
pub struct ArrivalRecord {
    pub station: CompactString,
    pub platform: CompactString,
    pub due_in: i64,
    pub actual_predicted_time: DateTime<Tz>,
}

impl ArrivalRecord {
    pub fn new(key: &PlatformKey, arrival: &TrainArrival) -> Self {
        Self {
            station: key.station.clone(),
            platform: key.number.clone(),
            due_in: arrival.due_in,
            actual_predicted_time: arrival.actual_predicted_time,
        }
    }

    pub fn key(&self) -> PlatformKey {
        PlatformKey {
            station: self.station.clone(),
            number: self.platform.clone(),
        }
    }
}

/// A train seen in a platform's departure board, by id.
#[derive(Clone, Debug, PartialEq)]
pub struct PlatformArrival {
    pub train: CompactString,
    pub record: ArrivalRecord,
}

#[derive(Clone, Debug)]
pub struct Platform {
    pub station_code: CompactString,
    pub station_name: CompactString,
    pub number: CompactString,
    pub direction: Direction,
    pub helper_text: String,
    pub lat: f64,
    pub lon: f64,
    pub x: f64,
    pub y: f64,
    /// Map orientation used for offsets and arrows. Kept apart from
    /// `direction`, which comes from a different field of the feed.
    pub d: Direction,
    pub arrivals: Vec<PlatformArrival>,
}

impl Platform {
    pub fn from_record(station_code: &str, station_name: &str, record: &PlatformRecord) -> Self {
        let fallback = Coordinates {
            latitude: Some(FALLBACK_LATITUDE),
            longitude: Some(FALLBACK_LONGITUDE),
            ..Default::default()
        };
        let coords = record.coordinates.as_ref().unwrap_or(&fallback);
        Self {
            station_code: station_code.into(),
            station_name: station_name.into(),
            number: record
                .platform_number
                .clone()
                .unwrap_or_else(crate::api_types::unknown_text),
            direction: record
                .direction
                .as_deref()
                .map_or(Direction::Unknown, Direction::parse),
            helper_text: record.helper_text.clone().unwrap_or_else(|| "???".to_string()),
            lat: coords.latitude.unwrap_or(0.0),
            lon: coords.longitude.unwrap_or(0.0),
            x: coords.x.unwrap_or(0.0),
            y: coords.y.unwrap_or(0.0),
            d: coords.d.as_deref().map_or(Direction::Unknown, Direction::parse),
            arrivals: Vec::new(),
        }
    }

    pub fn key(&self) -> PlatformKey {
        PlatformKey {
            station: self.station_code.clone(),
            number: self.number.clone(),
        }
    }

    pub fn label(&self) -> String {
        format!("Platform {}: {}", self.number, self.helper_text)
    }
}

impl fmt::Display for Platform {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} ({:.5}, {:.5})", self.label(), self.lat, self.lon)?;
        for a in &self.arrivals {
            write!(
                f,
                "\n        Train {} in {} mins ({})",
                a.train,
                a.record.due_in,
                a.record.actual_predicted_time.format("%H:%M")
            )?;
        }
        Ok(())
    }
}

#[derive(Clone, Debug)]
pub struct Station {
    pub name: CompactString,
    pub code: CompactString,
    pub platforms: BTreeMap<CompactString, Platform>,
}

impl Station {
    pub fn new(code: &str, name: &str, platforms: &[PlatformRecord]) -> Self {
        let platforms = platforms
            .iter()
            .map(|r| {
                let p = Platform::from_record(code, name, r);
                (p.number.clone(), p)
            })
            .collect();
        Self {
            name: name.into(),
            code: code.into(),
            platforms,
        }
    }
}

impl fmt::Display for Station {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} ({})", self.name, self.code)?;
        for p in self.platforms.values() {
            write!(f, "\n    {}", p)?;
        }
        Ok(())
    }
}

pub struct NetworkState {
    pub stations: Stations,
    pub trains: BTreeMap<CompactString, TrainState>,
    grammar: LocationGrammar,
    colours: ColourTable,
}

impl NetworkState {
    /// Builds the station/platform skeleton without fetching any arrivals.
    pub fn new(stations: &StationList, platforms: &PlatformList, config: &NetworkConfig) -> Self {
        let mut by_name = Stations::new();
        for (code, name) in stations {
            let records = platforms.get(code).map(Vec::as_slice).unwrap_or(&[]);
            if records.is_empty() {
                log_warn(&format!("Station {} ({}) has no platforms", name, code));
            }
            let station = Station::new(code, name, records);
            for p in station.platforms.values() {
                if p.direction != Direction::Unknown
                    && p.d != Direction::Unknown
                    && p.direction != p.d
                {
                    log_warn(&format!(
                        "{} platform {}: direction {} but map orientation {}, drawing with {}",
                        name, p.number, p.direction, p.d, p.d
                    ));
                }
            }
            by_name.insert(name.clone(), station);
        }
        let grammar = LocationGrammar::new(by_name.keys().cloned(), config.interchanges.clone());
        Self {
            stations: by_name,
            trains: BTreeMap::new(),
            grammar,
            colours: config.colours.clone(),
        }
    }

    /// Loads the static network from `source` and pulls arrivals for every platform.
    pub fn initialize(source: &dyn ArrivalsSource, config: &NetworkConfig) -> Result<Self> {
        let stations = source.stations()?;
        let platforms = source.platforms()?;
        let mut network = Self::new(&stations, &platforms, config);
        log_info(&format!(
            "Network has {} stations, {} platforms",
            network.stations.len(),
            network.stations.values().map(|s| s.platforms.len()).sum::<usize>()
        ));
        network.refresh_all(source)?;
        Ok(network)
    }

    /// Refreshes every platform, stations in name order then platforms in
    /// number order. Trains carry over between calls.
    pub fn refresh_all(&mut self, source: &dyn ArrivalsSource) -> Result<()> {
        let keys: Vec<(CompactString, CompactString)> = self
            .stations
            .values()
            .flat_map(|s| s.platforms.keys().map(|n| (s.name.clone(), n.clone())))
            .collect();
        let mut seen = 0;
        for (station, number) in &keys {
            seen += self.refresh_platform(source, station, number)?;
        }
        log_info(&format!(
            "Refreshed {} platforms: {} arrivals, {} trains known",
            keys.len(),
            seen,
            self.trains.len()
        ));
        Ok(())
    }

    /// Replaces one platform's live arrivals with a fresh fetch, merging each
    /// into the train records. Returns the number of arrivals seen.
    pub fn refresh_platform(
        &mut self,
        source: &dyn ArrivalsSource,
        station_name: &str,
        number: &str,
    ) -> Result<usize> {
        let key = self
            .stations
            .get(station_name)
            .and_then(|s| s.platforms.get(number))
            .map(Platform::key)
            .ok_or_else(|| anyhow!("No platform {} at {}", number, station_name))?;

        let fetched = source.arrivals(&key.station, &key.number)?;
        let arrivals: Vec<PlatformArrival> =
            fetched.iter().map(|a| self.upsert_train(a, &key)).collect();

        let count = arrivals.len();
        if let Some(platform) = self
            .stations
            .get_mut(station_name)
            .and_then(|s| s.platforms.get_mut(number))
        {
            platform.arrivals = arrivals;
        }
        Ok(count)
    }

    /// Creates or updates the train named in `arrival`. Position failures are
    /// logged and leave the train's last good position in place.
    pub fn upsert_train(&mut self, arrival: &TrainArrival, key: &PlatformKey) -> PlatformArrival {
        let train = match self.trains.entry(arrival.trn.clone()) {
            Entry::Occupied(o) => o.into_mut(),
            Entry::Vacant(v) => {
                let colour = self.colours.colour_for(&arrival.trn);
                v.insert(TrainState::new(arrival, colour))
            }
        };

        let record = ArrivalRecord::new(key, arrival);
        if let Err(e) = train.update(arrival, record.clone(), &self.stations, &self.grammar) {
            log_warn(&format!(
                "Train {}: cannot place {:?} ({})",
                train.id, arrival.last_event_location, e
            ));
        }

        PlatformArrival {
            train: train.id.clone(),
            record,
        }
    }

    /// Everything the map needs. Trains that have never been placed, or sit
    /// on a platform with no usable orientation, are left off.
    pub fn snapshot(&self) -> Vec<TrainMarker> {
        self.trains
            .values()
            .filter_map(|train| match train.marker() {
                Ok(m) => Some(m),
                Err(PositionError::Unplaced { .. }) => None,
                Err(e) => {
                    log_warn(&format!("Skipping train {} on map: {}", train.id, e));
                    None
                }
            })
            .collect()
    }

}

impl fmt::Display for NetworkState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut first = true;
        for station in self.stations.values() {
            if !first {
                f.write_str("\n\n")?;
            }
            first = false;
            write!(f, "{}", station)?;
        }
        Ok(())
    }
}
