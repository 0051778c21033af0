use crate::train::{Direction, Event};
use thiserror::Error;

/// Why a train's reported location could not be turned into map coordinates.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum PositionError {
    #[error("Malformed event location {location:?}")]
    MalformedLocation { location: String },

    #[error("No such Station {station:?} (from location {location:?})")]
    UnknownStation { station: String, location: String },

    #[error("No such Platform {platform:?} at Station {station:?}")]
    UnknownPlatform { station: String, platform: String },

    #[error("No offset for event {event} in direction {direction}")]
    NoOffset { event: Event, direction: Direction },

    #[error("Train {id:?} has never been placed on the map")]
    Unplaced { id: String },
}
