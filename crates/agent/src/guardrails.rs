use std::collections::BTreeSet;

use chrono::{DateTime, NaiveDateTime, Utc};
use serde_json::Value;
use thiserror::Error;

use itinera_core::domain::trip::{NewTripItem, TripId, TripItemLocation, TripItemType};

use crate::tools::{CreateTripItemArgs, LocationArgs, PlannerToolCall};

const NAIVE_DATETIME_FORMATS: [&str; 3] = ["%Y-%m-%dT%H:%M:%S", "%Y-%m-%dT%H:%M", "%Y-%m-%d %H:%M:%S"];

#[derive(Clone, Debug, Error, PartialEq, Eq)]
#[error("{message}")]
pub struct GuardrailViolation {
    pub reason_code: &'static str,
    pub message: String,
}

impl GuardrailViolation {
    fn new(reason_code: &'static str, message: impl Into<String>) -> Self {
        Self { reason_code, message: message.into() }
    }
}

/// A tool call that passed validation and may reach storage.
#[derive(Clone, Debug, PartialEq)]
pub enum AdmittedCall {
    CreateTripItem(NewTripItem),
    ListTripItems(TripId),
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct GuardrailPolicy {
    pub max_locations_per_item: usize,
}

impl Default for GuardrailPolicy {
    fn default() -> Self {
        Self { max_locations_per_item: 20 }
    }
}

impl GuardrailPolicy {
    /// Checks model-issued arguments and binds them to the session trip.
    pub fn admit(
        &self,
        call: PlannerToolCall,
        session_trip: &TripId,
    ) -> Result<AdmittedCall, GuardrailViolation> {
        match call {
            PlannerToolCall::CreateTripItem(args) => {
                ensure_same_trip(args.trip_id.as_deref(), session_trip)?;
                self.admit_create(args, session_trip).map(AdmittedCall::CreateTripItem)
            }
            PlannerToolCall::GetTripItems(args) => {
                ensure_same_trip(args.trip_id.as_deref(), session_trip)?;
                Ok(AdmittedCall::ListTripItems(session_trip.clone()))
            }
        }
    }

    fn admit_create(
        &self,
        args: CreateTripItemArgs,
        session_trip: &TripId,
    ) -> Result<NewTripItem, GuardrailViolation> {
        let name = args.name.trim();
        if name.is_empty() {
            return Err(GuardrailViolation::new("blank_name", "item name must not be blank"));
        }

        let item_type = args
            .item_type
            .parse::<TripItemType>()
            .map_err(|message| GuardrailViolation::new("unsupported_item_type", message))?;

        let start_datetime = parse_item_datetime("start_datetime", &args.start_datetime)?;
        let end_datetime = parse_item_datetime("end_datetime", &args.end_datetime)?;
        if end_datetime < start_datetime {
            return Err(GuardrailViolation::new(
                "end_before_start",
                format!("end_datetime {end_datetime} is before start_datetime {start_datetime}"),
            ));
        }

        match &args.metadata {
            None | Some(Value::Null) | Some(Value::Object(_)) => {}
            Some(other) => {
                return Err(GuardrailViolation::new(
                    "metadata_not_object",
                    format!("metadata must be an object, got {other}"),
                ));
            }
        }

        let locations = self.admit_locations(args.locations)?;

        Ok(NewTripItem {
            trip_id: session_trip.clone(),
            name: name.to_string(),
            item_type,
            start_datetime,
            end_datetime,
            metadata: Value::Object(serde_json::Map::new()),
            locations,
        })
    }

    fn admit_locations(
        &self,
        locations: Vec<LocationArgs>,
    ) -> Result<Vec<TripItemLocation>, GuardrailViolation> {
        if locations.is_empty() {
            return Err(GuardrailViolation::new(
                "missing_location",
                "at least one location is required",
            ));
        }
        if locations.len() > self.max_locations_per_item {
            return Err(GuardrailViolation::new(
                "too_many_locations",
                format!("at most {} locations are allowed per item", self.max_locations_per_item),
            ));
        }

        let mut sequences = BTreeSet::new();
        locations
            .into_iter()
            .map(|location| {
                if !sequences.insert(location.sequence) {
                    return Err(GuardrailViolation::new(
                        "duplicate_sequence",
                        format!("location sequence {} is used twice", location.sequence),
                    ));
                }
                if location.name.trim().is_empty() {
                    return Err(GuardrailViolation::new(
                        "blank_location_name",
                        "location name must not be blank",
                    ));
                }
                if !(-90.0..=90.0).contains(&location.latitude) {
                    return Err(GuardrailViolation::new(
                        "latitude_out_of_range",
                        format!("latitude {} is outside [-90, 90]", location.latitude),
                    ));
                }
                if !(-180.0..=180.0).contains(&location.longitude) {
                    return Err(GuardrailViolation::new(
                        "longitude_out_of_range",
                        format!("longitude {} is outside [-180, 180]", location.longitude),
                    ));
                }

                Ok(TripItemLocation {
                    sequence: location.sequence,
                    name: location.name.trim().to_string(),
                    address: location
                        .address
                        .map(|address| address.trim().to_string())
                        .filter(|address| !address.is_empty()),
                    latitude: location.latitude,
                    longitude: location.longitude,
                })
            })
            .collect()
    }
}

fn ensure_same_trip(requested: Option<&str>, session_trip: &TripId) -> Result<(), GuardrailViolation> {
    match requested.map(str::trim) {
        None | Some("") => Ok(()),
        Some(requested) if requested == session_trip.as_str() => Ok(()),
        Some(_) => Err(GuardrailViolation::new(
            "trip_scope_violation",
            "only the current trip can be accessed",
        )),
    }
}

/// RFC 3339, or a zone-less timestamp read as UTC.
fn parse_item_datetime(field: &str, raw: &str) -> Result<DateTime<Utc>, GuardrailViolation> {
    let trimmed = raw.trim();
    if let Ok(timestamp) = DateTime::parse_from_rfc3339(trimmed) {
        return Ok(timestamp.with_timezone(&Utc));
    }

    NAIVE_DATETIME_FORMATS
        .iter()
        .find_map(|format| NaiveDateTime::parse_from_str(trimmed, format).ok())
        .map(|naive| naive.and_utc())
        .ok_or_else(|| {
            GuardrailViolation::new(
                "invalid_datetime",
                format!("{field} `{raw}` is not an ISO-8601 timestamp"),
            )
        })
}
