pub mod protocol;
pub mod stages;

pub use protocol::PlanningProtocol;
pub use stages::PlanningStage;
