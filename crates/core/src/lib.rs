pub mod config;
pub mod domain;
pub mod errors;
pub mod planning;

pub use domain::conversation::{ConversationTurn, TurnRole};
pub use domain::profile::{age_on, parse_birth_date, ProfileContext, ProfileError, UserProfile};
pub use domain::trip::{
    NewTripItem, TripId, TripItem, TripItemId, TripItemLocation, TripItemType,
};
pub use errors::{ApplicationError, DomainError, InterfaceError};
pub use planning::{PlanningProtocol, PlanningStage};
