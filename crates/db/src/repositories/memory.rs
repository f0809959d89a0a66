use std::collections::HashMap;

use chrono::{NaiveDate, Utc};
use tokio::sync::RwLock;
use uuid::Uuid;

use itinera_core::domain::trip::{NewTripItem, TripId, TripItem, TripItemId};

use super::{QuotaDecision, QuotaRepository, RepositoryError, TripItemRepository};

#[derive(Default)]
pub struct InMemoryTripItemRepository {
    items: RwLock<Vec<TripItem>>,
}

impl InMemoryTripItemRepository {
    /// Items stored across every trip.
    pub async fn stored_count(&self) -> usize {
        self.items.read().await.len()
    }
}

#[async_trait::async_trait]
impl TripItemRepository for InMemoryTripItemRepository {
    async fn create_trip_item(&self, item: NewTripItem) -> Result<TripItem, RepositoryError> {
        let created = TripItem::from_new(TripItemId(Uuid::new_v4().to_string()), item, Utc::now());
        let mut items = self.items.write().await;
        items.push(created.clone());
        Ok(created)
    }

    async fn list_trip_items(&self, trip_id: &TripId) -> Result<Vec<TripItem>, RepositoryError> {
        let items = self.items.read().await;
        let mut matching: Vec<TripItem> =
            items.iter().filter(|item| &item.trip_id == trip_id).cloned().collect();
        matching.sort_by_key(|item| (item.start_datetime, item.created_at));
        Ok(matching)
    }
}

#[derive(Default)]
pub struct InMemoryQuotaRepository {
    usage: RwLock<HashMap<(String, NaiveDate), u32>>,
}

#[async_trait::async_trait]
impl QuotaRepository for InMemoryQuotaRepository {
    async fn check_and_consume(
        &self,
        user_id: &str,
        daily_limit: u32,
        day: NaiveDate,
    ) -> Result<QuotaDecision, RepositoryError> {
        let mut usage = self.usage.write().await;
        let used = usage.entry((user_id.to_string(), day)).or_insert(0);
        if *used >= daily_limit {
            return Ok(QuotaDecision::Exhausted);
        }

        *used += 1;
        Ok(QuotaDecision::Remaining(daily_limit - *used))
    }
}
