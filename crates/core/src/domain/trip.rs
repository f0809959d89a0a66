use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct TripId(pub String);

impl TripId {
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for TripId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct TripItemId(pub String);

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TripItemType {
    Activity,
    Restaurant,
}

impl TripItemType {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Activity => "activity",
            Self::Restaurant => "restaurant",
        }
    }
}

impl std::str::FromStr for TripItemType {
    type Err = String;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.trim().to_ascii_lowercase().as_str() {
            "activity" => Ok(Self::Activity),
            "restaurant" => Ok(Self::Restaurant),
            other => Err(format!("unsupported item type `{other}` (expected activity|restaurant)")),
        }
    }
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct TripItemLocation {
    pub sequence: i32,
    pub name: String,
    pub address: Option<String>,
    pub latitude: f64,
    pub longitude: f64,
}

/// A validated item ready to be written for a trip.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct NewTripItem {
    pub trip_id: TripId,
    pub name: String,
    pub item_type: TripItemType,
    pub start_datetime: DateTime<Utc>,
    pub end_datetime: DateTime<Utc>,
    pub metadata: serde_json::Value,
    pub locations: Vec<TripItemLocation>,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct TripItem {
    pub id: TripItemId,
    pub trip_id: TripId,
    pub name: String,
    pub item_type: TripItemType,
    pub start_datetime: DateTime<Utc>,
    pub end_datetime: DateTime<Utc>,
    pub metadata: serde_json::Value,
    pub locations: Vec<TripItemLocation>,
    pub created_at: DateTime<Utc>,
}

impl TripItem {
    pub fn from_new(id: TripItemId, item: NewTripItem, created_at: DateTime<Utc>) -> Self {
        let mut locations = item.locations;
        locations.sort_by_key(|location| location.sequence);

        Self {
            id,
            trip_id: item.trip_id,
            name: item.name,
            item_type: item.item_type,
            start_datetime: item.start_datetime,
            end_datetime: item.end_datetime,
            metadata: item.metadata,
            locations,
            created_at,
        }
    }
}
