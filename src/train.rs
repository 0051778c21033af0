use crate::api_types::TrainArrival;
use crate::error::PositionError;
use crate::state::{ArrivalRecord, PlatformKey, Stations};
use chrono::DateTime;
use chrono_tz::Tz;
use compact_str::{CompactString, format_compact};
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashMap};
use std::fmt;
use std::sync::LazyLock;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Event {
    ReadyToStart,
    Approaching,
    Arrived,
    Departed,
}

impl fmt::Display for Event {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Event::ReadyToStart => "READY_TO_START",
            Event::Approaching => "APPROACHING",
            Event::Arrived => "ARRIVED",
            Event::Departed => "DEPARTED",
        })
    }
}

/// Travel orientation at a platform. `U`/`D` are for stretches of line that
/// don't run along a compass axis on the map.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub enum Direction {
    N,
    S,
    E,
    W,
    U,
    D,
    #[serde(rename = "???")]
    Unknown,
}

impl Direction {
    pub fn parse(raw: &str) -> Self {
        match raw.trim() {
            "N" => Direction::N,
            "S" => Direction::S,
            "E" => Direction::E,
            "W" => Direction::W,
            "U" => Direction::U,
            "D" => Direction::D,
            _ => Direction::Unknown,
        }
    }
}

impl fmt::Display for Direction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Direction::N => "N",
            Direction::S => "S",
            Direction::E => "E",
            Direction::W => "W",
            Direction::U => "U",
            Direction::D => "D",
            Direction::Unknown => "???",
        })
    }
}

// Pixel nudge for a train that is APPROACHING a platform facing each
// direction. DEPARTED is the exact opposite; the stationary events sit on
// the anchor.
const APPROACH_NUDGE: [(Direction, (f64, f64)); 6] = [
    (Direction::N, (0.0, 20.0)),
    (Direction::S, (0.0, -20.0)),
    (Direction::E, (-20.0, 0.0)),
    (Direction::W, (20.0, 0.0)),
    (Direction::U, (9.0, 15.0)),
    (Direction::D, (-7.0, -15.0)),
];

/// Offset from the platform anchor at which a train in `event` is drawn.
pub fn offset(event: Event, direction: Direction) -> Option<(f64, f64)> {
    let (_, (dx, dy)) = APPROACH_NUDGE.iter().find(|(d, _)| *d == direction)?;
    Some(match event {
        Event::ReadyToStart | Event::Arrived => (0.0, 0.0),
        Event::Approaching => (*dx, *dy),
        Event::Departed => (-*dx, -*dy),
    })
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Colour {
    Red,
    Blue,
}

impl Colour {
    pub fn rgba(self) -> [u8; 4] {
        match self {
            Colour::Red => [255, 0, 0, 255],
            Colour::Blue => [0, 0, 255, 255],
        }
    }
}

/// Per-train colour overrides; everything else gets the default.
#[derive(Debug, Clone)]
pub struct ColourTable {
    pub default: Colour,
    pub overrides: HashMap<CompactString, Colour>,
}

impl Default for ColourTable {
    fn default() -> Self {
        Self {
            default: Colour::Red,
            overrides: HashMap::from([(CompactString::const_new("121"), Colour::Blue)]),
        }
    }
}

impl ColourTable {
    pub fn colour_for(&self, train_id: &str) -> Colour {
        self.overrides.get(train_id).copied().unwrap_or(self.default)
    }
}

/// A station whose platforms are drawn at two separate anchors. Locations
/// reported against `name` are remapped to `"<name> W-E"` when the platform
/// is one of `west_east_platforms`, and to `"<name> N-S"` otherwise.
#[derive(Debug, Clone)]
pub struct Interchange {
    pub name: CompactString,
    pub west_east_platforms: Vec<CompactString>,
}

impl Interchange {
    pub fn monument() -> Self {
        Self {
            name: CompactString::const_new("Monument"),
            west_east_platforms: vec![CompactString::const_new("3"), CompactString::const_new("4")],
        }
    }

    pub fn station_for(&self, platform: &str) -> CompactString {
        if self.west_east_platforms.iter().any(|p| p == platform) {
            format_compact!("{} W-E", self.name)
        } else {
            format_compact!("{} N-S", self.name)
        }
    }
}

/// Station name and platform extracted from a `lastEventLocation` string.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LocationRef {
    pub station: CompactString,
    pub platform: CompactString,
}

// Suffix length of the "<direction><separator><platform>" tail in live data.
// Only used to report a best guess when no known station matches.
const LEGACY_SUFFIX_LEN: usize = 11;

static TRAILING_PLATFORM: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^(?P<head>.*?)(?P<platform>[0-9A-Za-z])$").expect("valid platform pattern")
});

// What may sit between the station name and the platform character:
// " Platform " in live data, or X padding in fixed-width test strings.
static LOCATION_TAIL: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^(?:\s*Platform\s*|X*)$").expect("valid tail pattern")
});

/// Parses `<stationName><separator><platformChar>` against the set of
/// station names the network knows about.
#[derive(Debug, Clone)]
pub struct LocationGrammar {
    // Longest first so "West Jesmond" wins over "Jesmond"-style prefixes.
    names: Vec<CompactString>,
    interchanges: Vec<Interchange>,
}

impl LocationGrammar {
    pub fn new<I>(station_names: I, interchanges: Vec<Interchange>) -> Self
    where
        I: IntoIterator<Item = CompactString>,
    {
        let mut names: Vec<CompactString> = station_names
            .into_iter()
            .chain(interchanges.iter().map(|i| i.name.clone()))
            .collect();
        names.sort_by(|a, b| b.len().cmp(&a.len()).then_with(|| a.cmp(b)));
        names.dedup();
        Self {
            names,
            interchanges,
        }
    }

    pub fn parse(&self, location: &str) -> Result<LocationRef, PositionError> {
        let caps =
            TRAILING_PLATFORM
                .captures(location)
                .ok_or_else(|| PositionError::MalformedLocation {
                    location: location.to_string(),
                })?;
        let head = &caps["head"];
        let platform = CompactString::from(&caps["platform"]);

        // A known name followed by anything but a tail is a different
        // station, e.g. "Gateshead Stadium" is not "Gateshead".
        let matched = self.names.iter().find(|n| {
            head.strip_prefix(n.as_str())
                .is_some_and(|tail| LOCATION_TAIL.is_match(tail))
        });
        let Some(name) = matched else {
            let guess: String = {
                let keep = location.chars().count().saturating_sub(LEGACY_SUFFIX_LEN);
                location.chars().take(keep).collect()
            };
            return Err(PositionError::UnknownStation {
                station: guess,
                location: location.to_string(),
            });
        };

        let station = match self.interchanges.iter().find(|i| i.name == *name) {
            Some(interchange) => interchange.station_for(&platform),
            None => name.clone(),
        };
        Ok(LocationRef { station, platform })
    }
}

/// Where a train was last resolved to, with the anchor geometry copied from
/// the platform at resolution time.
#[derive(Debug, Clone, PartialEq)]
pub struct Position {
    pub event: Event,
    pub station: CompactString,
    pub platform: CompactString,
    pub x: f64,
    pub y: f64,
    pub d: Direction,
}

/// What the renderer needs for one train.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TrainMarker {
    pub id: CompactString,
    pub x: f64,
    pub y: f64,
    pub direction: Direction,
    pub colour: Colour,
}

#[derive(Debug, Clone)]
pub struct TrainState {
    pub id: CompactString,
    pub colour: Colour,
    pub destination: CompactString,
    pub line: CompactString,
    pub last_event: Event,
    pub last_event_location: String,
    pub last_event_time: DateTime<Tz>,
    pub arrivals: BTreeMap<PlatformKey, ArrivalRecord>,
    position: Option<Position>,
}

impl TrainState {
    pub fn new(arrival: &TrainArrival, colour: Colour) -> Self {
        Self {
            id: arrival.trn.clone(),
            colour,
            destination: arrival.destination.clone(),
            line: arrival.line.clone(),
            last_event: arrival.last_event,
            last_event_location: arrival.last_event_location.clone(),
            last_event_time: arrival.last_event_time,
            arrivals: BTreeMap::new(),
            position: None,
        }
    }

    /// Takes in a new sighting. The arrival is always recorded; the position
    /// only moves if the reported location resolves, otherwise the previous
    /// one is kept and the error returned.
    pub fn update(
        &mut self,
        arrival: &TrainArrival,
        record: ArrivalRecord,
        stations: &Stations,
        grammar: &LocationGrammar,
    ) -> Result<(), PositionError> {
        self.last_event = arrival.last_event;
        self.last_event_location = arrival.last_event_location.clone();
        self.last_event_time = arrival.last_event_time;

        self.arrivals.insert(record.key(), record);

        let location = grammar.parse(&self.last_event_location)?;
        let station =
            stations
                .get(&location.station)
                .ok_or_else(|| PositionError::UnknownStation {
                    station: location.station.to_string(),
                    location: self.last_event_location.clone(),
                })?;
        let platform = station.platforms.get(&location.platform).ok_or_else(|| {
            PositionError::UnknownPlatform {
                station: location.station.to_string(),
                platform: location.platform.to_string(),
            }
        })?;

        self.position = Some(Position {
            event: self.last_event,
            station: station.name.clone(),
            platform: platform.number.clone(),
            x: platform.x,
            y: platform.y,
            d: platform.d,
        });
        Ok(())
    }

    pub fn position(&self) -> Option<&Position> {
        self.position.as_ref()
    }

    pub fn x(&self) -> Option<f64> {
        let p = self.position.as_ref()?;
        Some(p.x + offset(p.event, p.d)?.0)
    }

    pub fn y(&self) -> Option<f64> {
        let p = self.position.as_ref()?;
        Some(p.y + offset(p.event, p.d)?.1)
    }

    pub fn marker(&self) -> Result<TrainMarker, PositionError> {
        let p = self.position().ok_or_else(|| PositionError::Unplaced {
            id: self.id.to_string(),
        })?;
        let (Some(x), Some(y)) = (self.x(), self.y()) else {
            return Err(PositionError::NoOffset {
                event: p.event,
                direction: p.d,
            });
        };
        Ok(TrainMarker {
            id: self.id.clone(),
            x,
            y,
            direction: p.d,
            colour: self.colour,
        })
    }
}

impl fmt::Display for TrainState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "Train {}, {} line towards {}, ",
            self.id, self.line, self.destination
        )?;
        match &self.position {
            Some(p) => write!(
                f,
                "last reported {} {}, Platform {}",
                p.event, p.station, p.platform
            ),
            None => write!(
                f,
                "last reported {} at unresolved {:?}",
                self.last_event, self.last_event_location
            ),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::api_types::{Coordinates, PlatformRecord, parse_timestamp};
    use crate::state::Station;

    fn arrival(trn: &str, event: Event, location: &str) -> TrainArrival {
        TrainArrival {
            trn: trn.into(),
            destination: "St James".into(),
            line: "Green".into(),
            last_event: event,
            last_event_location: location.to_string(),
            last_event_time: parse_timestamp("2024-01-01T10:00:00").unwrap(),
            due_in: 2,
            actual_predicted_time: parse_timestamp("2024-01-01T10:02:00").unwrap(),
        }
    }

    fn platform(number: &str, d: &str, x: f64, y: f64) -> PlatformRecord {
        PlatformRecord {
            platform_number: Some(number.into()),
            direction: Some(d.to_string()),
            helper_text: None,
            coordinates: Some(Coordinates {
                x: Some(x),
                y: Some(y),
                d: Some(d.to_string()),
                ..Default::default()
            }),
        }
    }

    fn stations() -> Stations {
        let mut s = Stations::new();
        for station in [
            Station::new("WTL", "Wallsend", &[platform("1", "N", 100.0, 200.0), platform("2", "S", 104.0, 200.0)]),
            Station::new("MTW", "Monument W-E", &[platform("3", "E", 50.0, 60.0), platform("4", "W", 50.0, 64.0)]),
            Station::new("MTS", "Monument N-S", &[platform("1", "U", 70.0, 80.0), platform("2", "D", 74.0, 80.0)]),
            Station::new("JES", "Jesmond", &[platform("1", "N", 10.0, 10.0)]),
            Station::new("WJS", "West Jesmond", &[platform("1", "N", 20.0, 20.0)]),
        ] {
            s.insert(station.name.clone(), station);
        }
        s
    }

    fn grammar(stations: &Stations) -> LocationGrammar {
        LocationGrammar::new(stations.keys().cloned(), vec![Interchange::monument()])
    }

    fn key(code: &str, n: &str) -> PlatformKey {
        PlatformKey {
            station: code.into(),
            number: n.into(),
        }
    }

    const COMPASS: [Direction; 6] = [
        Direction::N,
        Direction::S,
        Direction::E,
        Direction::W,
        Direction::U,
        Direction::D,
    ];

    #[test]
    fn test_offsets_mirror_between_approaching_and_departed() {
        for d in COMPASS {
            let (ax, ay) = offset(Event::Approaching, d).unwrap();
            let (dx, dy) = offset(Event::Departed, d).unwrap();
            assert_eq!((ax, ay), (-dx, -dy), "direction {}", d);
            assert_eq!(offset(Event::Arrived, d), Some((0.0, 0.0)));
            assert_eq!(offset(Event::ReadyToStart, d), Some((0.0, 0.0)));
        }
        assert_eq!(offset(Event::Approaching, Direction::N), Some((0.0, 20.0)));
        assert_eq!(offset(Event::Arrived, Direction::Unknown), None);
    }

    #[test]
    fn test_monument_disambiguation() {
        let s = stations();
        let g = grammar(&s);
        assert_eq!(
            g.parse("MonumentXXXXXXXXXXX3").unwrap(),
            LocationRef {
                station: "Monument W-E".into(),
                platform: "3".into()
            }
        );
        assert_eq!(g.parse("Monument Platform 4").unwrap().station, "Monument W-E");
        assert_eq!(g.parse("Monument Platform 1").unwrap().station, "Monument N-S");
        assert_eq!(g.parse("MonumentXXXXXXXXXXXA").unwrap().station, "Monument N-S");
    }

    #[test]
    fn test_location_prefers_longest_station_name() {
        let s = stations();
        let g = grammar(&s);
        let loc = g.parse("West Jesmond Platform 1").unwrap();
        assert_eq!(loc.station, "West Jesmond");
        assert_eq!(g.parse("Jesmond Platform 1").unwrap().station, "Jesmond");
        assert_eq!(g.parse("WallsendXXXXXXXXXXX1").unwrap().station, "Wallsend");
    }

    #[test]
    fn test_location_errors() {
        let s = stations();
        let g = grammar(&s);
        assert!(matches!(
            g.parse("Wallsend Platform "),
            Err(PositionError::MalformedLocation { .. })
        ));
        match g.parse("Tynemouth Platform 1") {
            Err(PositionError::UnknownStation { station, .. }) => assert_eq!(station, "Tynemouth"),
            other => panic!("unexpected {:?}", other),
        }
    }

    #[test]
    fn test_longer_unknown_name_is_not_a_known_station() {
        let mut s = stations();
        s.insert(
            "Gateshead".into(),
            Station::new("GHD", "Gateshead", &[platform("1", "N", 100.0, 200.0)]),
        );
        let g = grammar(&s);
        assert_eq!(g.parse("Gateshead Platform 1").unwrap().station, "Gateshead");
        match g.parse("Gateshead Stadium Platform 1") {
            Err(PositionError::UnknownStation { station, location }) => {
                assert_eq!(station, "Gateshead Stadium");
                assert_eq!(location, "Gateshead Stadium Platform 1");
            }
            other => panic!("unexpected {:?}", other),
        }
        assert!(matches!(
            g.parse("WallsendXXXXXXXXXXY1"),
            Err(PositionError::UnknownStation { .. })
        ));
    }

    #[test]
    fn test_update_resolves_position_with_offset() {
        let s = stations();
        let g = grammar(&s);
        let a = arrival("121", Event::Approaching, "WallsendXXXXXXXXXXX1");
        let mut train = TrainState::new(&a, ColourTable::default().colour_for("121"));
        let k = key("WTL", "1");
        train.update(&a, ArrivalRecord::new(&k, &a), &s, &g).unwrap();

        assert_eq!(train.x(), Some(100.0));
        assert_eq!(train.y(), Some(220.0));
        assert_eq!(train.position().unwrap().d, Direction::N);
        let m = train.marker().unwrap();
        assert_eq!(m.colour, Colour::Blue);
        assert_eq!(train.arrivals[&k].due_in, 2);
    }

    #[test]
    fn test_failed_resolution_keeps_previous_position() {
        let s = stations();
        let g = grammar(&s);
        let k = key("WTL", "2");
        let first = arrival("7", Event::Departed, "Wallsend Platform 2");
        let mut train = TrainState::new(&first, Colour::Red);
        train.update(&first, ArrivalRecord::new(&k, &first), &s, &g).unwrap();
        assert_eq!(train.y(), Some(220.0));

        let second = arrival("7", Event::Arrived, "Wallsend Platform 9");
        let err = train
            .update(&second, ArrivalRecord::new(&k, &second), &s, &g)
            .unwrap_err();
        assert_eq!(
            err,
            PositionError::UnknownPlatform {
                station: "Wallsend".into(),
                platform: "9".into()
            }
        );
        assert_eq!(train.last_event, Event::Arrived);
        assert_eq!(train.position().unwrap().event, Event::Departed);
        assert_eq!(train.y(), Some(220.0));
    }

    #[test]
    fn test_unplaced_train_has_no_marker() {
        let s = stations();
        let g = grammar(&s);
        let a = arrival("9", Event::Arrived, "Nowhere Platform 1");
        let mut train = TrainState::new(&a, Colour::Red);
        assert!(train.update(&a, ArrivalRecord::new(&key("WTL", "1"), &a), &s, &g).is_err());
        assert_eq!(train.arrivals.len(), 1);
        assert!(matches!(train.marker(), Err(PositionError::Unplaced { .. })));
        assert_eq!(train.x(), None);
    }

    #[test]
    fn test_colour_default_is_red() {
        let colours = ColourTable::default();
        assert_eq!(colours.colour_for("121"), Colour::Blue);
        for id in ["101", "120", "122", "1210", ""] {
            assert_eq!(colours.colour_for(id), Colour::Red);
        }
        assert_eq!(Colour::Red.rgba(), [255, 0, 0, 255]);
        assert_eq!(Colour::Blue.rgba(), [0, 0, 255, 255]);
        assert!(serde_json::from_str::<Colour>(r#""green""#).is_err());
    }

    #[test]
    fn test_display() {
        let s = stations();
        let g = grammar(&s);
        let a = arrival("104", Event::Arrived, "Monument Platform 2");
        let mut train = TrainState::new(&a, Colour::Red);
        train.update(&a, ArrivalRecord::new(&key("MTS", "2"), &a), &s, &g).unwrap();
        assert_eq!(
            train.to_string(),
            "Train 104, Green line towards St James, last reported ARRIVED Monument N-S, Platform 2"
        );
    }
}
