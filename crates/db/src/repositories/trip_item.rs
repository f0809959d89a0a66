use std::collections::HashMap;

use chrono::{DateTime, SecondsFormat, SubsecRound, Utc};
use sqlx::{sqlite::SqliteRow, Row};
use uuid::Uuid;

use itinera_core::domain::trip::{
    NewTripItem, TripId, TripItem, TripItemId, TripItemLocation, TripItemType,
};

use super::{RepositoryError, TripItemRepository};
use crate::DbPool;

pub struct SqlTripItemRepository {
    pool: DbPool,
}

impl SqlTripItemRepository {
    pub fn new(pool: DbPool) -> Self {
        Self { pool }
    }
}

#[async_trait::async_trait]
impl TripItemRepository for SqlTripItemRepository {
    async fn create_trip_item(&self, mut item: NewTripItem) -> Result<TripItem, RepositoryError> {
        let id = TripItemId(Uuid::new_v4().to_string());
        // Stored precision: seconds for the schedule, milliseconds for created_at.
        let created_at = Utc::now().trunc_subsecs(3);
        item.start_datetime = item.start_datetime.trunc_subsecs(0);
        item.end_datetime = item.end_datetime.trunc_subsecs(0);
        let metadata_json = serde_json::to_string(&item.metadata)
            .map_err(|error| RepositoryError::Decode(format!("metadata encode: {error}")))?;

        let mut tx = self.pool.begin().await?;

        sqlx::query(
            "INSERT INTO trip_item (
                id,
                trip_id,
                name,
                item_type,
                start_datetime,
                end_datetime,
                metadata_json,
                created_at
             ) VALUES (?, ?, ?, ?, ?, ?, ?, ?)",
        )
        .bind(&id.0)
        .bind(item.trip_id.as_str())
        .bind(&item.name)
        .bind(item.item_type.as_str())
        .bind(format_timestamp(&item.start_datetime))
        .bind(format_timestamp(&item.end_datetime))
        .bind(&metadata_json)
        .bind(created_at.to_rfc3339_opts(SecondsFormat::Millis, true))
        .execute(&mut *tx)
        .await?;

        for location in &item.locations {
            sqlx::query(
                "INSERT INTO trip_item_location (
                    trip_item_id,
                    sequence,
                    name,
                    address,
                    latitude,
                    longitude
                 ) VALUES (?, ?, ?, ?, ?, ?)",
            )
            .bind(&id.0)
            .bind(location.sequence)
            .bind(&location.name)
            .bind(location.address.as_deref())
            .bind(location.latitude)
            .bind(location.longitude)
            .execute(&mut *tx)
            .await?;
        }

        tx.commit().await?;

        Ok(TripItem::from_new(id, item, created_at))
    }

    async fn list_trip_items(&self, trip_id: &TripId) -> Result<Vec<TripItem>, RepositoryError> {
        let item_rows = sqlx::query(
            "SELECT id, trip_id, name, item_type, start_datetime, end_datetime, metadata_json, created_at
             FROM trip_item
             WHERE trip_id = ?
             ORDER BY start_datetime ASC, created_at ASC",
        )
        .bind(trip_id.as_str())
        .fetch_all(&self.pool)
        .await?;

        let location_rows = sqlx::query(
            "SELECT l.trip_item_id, l.sequence, l.name, l.address, l.latitude, l.longitude
             FROM trip_item_location l
             JOIN trip_item i ON i.id = l.trip_item_id
             WHERE i.trip_id = ?
             ORDER BY l.trip_item_id ASC, l.sequence ASC",
        )
        .bind(trip_id.as_str())
        .fetch_all(&self.pool)
        .await?;

        let mut locations_by_item: HashMap<String, Vec<TripItemLocation>> = HashMap::new();
        for row in location_rows {
            let (item_id, location) = location_from_row(row)?;
            locations_by_item.entry(item_id).or_default().push(location);
        }

        item_rows
            .into_iter()
            .map(|row| {
                let mut item = item_from_row(row)?;
                item.locations = locations_by_item.remove(&item.id.0).unwrap_or_default();
                Ok(item)
            })
            .collect()
    }
}

fn item_from_row(row: SqliteRow) -> Result<TripItem, RepositoryError> {
    let item_type_raw = row.try_get::<String, _>("item_type")?;
    let item_type = item_type_raw.parse::<TripItemType>().map_err(RepositoryError::Decode)?;
    let metadata_raw = row.try_get::<String, _>("metadata_json")?;
    let metadata = serde_json::from_str(&metadata_raw).map_err(|error| {
        RepositoryError::Decode(format!("invalid metadata_json `{metadata_raw}` ({error})"))
    })?;

    Ok(TripItem {
        id: TripItemId(row.try_get("id")?),
        trip_id: TripId(row.try_get("trip_id")?),
        name: row.try_get("name")?,
        item_type,
        start_datetime: parse_timestamp("start_datetime", row.try_get("start_datetime")?)?,
        end_datetime: parse_timestamp("end_datetime", row.try_get("end_datetime")?)?,
        metadata,
        locations: Vec::new(),
        created_at: parse_timestamp("created_at", row.try_get("created_at")?)?,
    })
}

fn location_from_row(row: SqliteRow) -> Result<(String, TripItemLocation), RepositoryError> {
    let item_id = row.try_get::<String, _>("trip_item_id")?;
    let location = TripItemLocation {
        sequence: row.try_get("sequence")?,
        name: row.try_get("name")?,
        address: row.try_get("address")?,
        latitude: row.try_get("latitude")?,
        longitude: row.try_get("longitude")?,
    };
    Ok((item_id, location))
}

fn format_timestamp(value: &DateTime<Utc>) -> String {
    value.to_rfc3339_opts(SecondsFormat::Secs, true)
}

fn parse_timestamp(column: &str, value: String) -> Result<DateTime<Utc>, RepositoryError> {
    DateTime::parse_from_rfc3339(&value).map(|timestamp| timestamp.with_timezone(&Utc)).map_err(
        |error| {
            RepositoryError::Decode(format!("invalid timestamp in `{column}`: `{value}` ({error})"))
        },
    )
}
