use async_trait::async_trait;
use chrono::NaiveDate;
use thiserror::Error;

use itinera_core::domain::trip::{NewTripItem, TripId, TripItem};

pub mod memory;
pub mod quota;
pub mod trip_item;

pub use memory::{InMemoryQuotaRepository, InMemoryTripItemRepository};
pub use quota::SqlQuotaRepository;
pub use trip_item::SqlTripItemRepository;

#[derive(Debug, Error)]
pub enum RepositoryError {
    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),
    #[error("decode error: {0}")]
    Decode(String),
}

/// Storage for itinerary entries, always scoped by trip.
#[async_trait]
pub trait TripItemRepository: Send + Sync {
    async fn create_trip_item(&self, item: NewTripItem) -> Result<TripItem, RepositoryError>;

    async fn list_trip_items(&self, trip_id: &TripId) -> Result<Vec<TripItem>, RepositoryError>;
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum QuotaDecision {
    Remaining(u32),
    Exhausted,
}

impl QuotaDecision {
    /// Maps the wire sentinel used by usage counters: `-1` means exhausted.
    pub fn from_sentinel(value: i64) -> Self {
        if value < 0 {
            Self::Exhausted
        } else {
            Self::Remaining(u32::try_from(value).unwrap_or(u32::MAX))
        }
    }
}

/// Per-user daily chat allowance. Implementations consume atomically.
#[async_trait]
pub trait QuotaRepository: Send + Sync {
    async fn check_and_consume(
        &self,
        user_id: &str,
        daily_limit: u32,
        day: NaiveDate,
    ) -> Result<QuotaDecision, RepositoryError>;
}
