use serde::{Deserialize, Serialize};

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum PlanningStage {
    Greet,
    GatherDates,
    GatherTimes,
    DetermineSeason,
    GatherBudget,
    ProposeItinerary,
    ConfirmOrRevise,
    PersistItems,
    Success,
    Error,
}

impl PlanningStage {
    pub const ALL: [PlanningStage; 10] = [
        Self::Greet,
        Self::GatherDates,
        Self::GatherTimes,
        Self::DetermineSeason,
        Self::GatherBudget,
        Self::ProposeItinerary,
        Self::ConfirmOrRevise,
        Self::PersistItems,
        Self::Success,
        Self::Error,
    ];

    pub fn key(&self) -> &'static str {
        match self {
            Self::Greet => "GREET",
            Self::GatherDates => "GATHER_DATES",
            Self::GatherTimes => "GATHER_TIMES",
            Self::DetermineSeason => "DETERMINE_SEASON",
            Self::GatherBudget => "GATHER_BUDGET",
            Self::ProposeItinerary => "PROPOSE_ITINERARY",
            Self::ConfirmOrRevise => "CONFIRM_OR_REVISE",
            Self::PersistItems => "PERSIST_ITEMS",
            Self::Success => "SUCCESS",
            Self::Error => "ERROR",
        }
    }

    /// What must be true before the conversation may leave this stage.
    pub fn gate(&self) -> &'static str {
        match self {
            Self::Greet => "Greet the traveller and learn the destination.",
            Self::GatherDates => {
                "Exact calendar start and end dates are known. Vague ranges such as \
                 \"mid June\" or \"next week\" do not satisfy this gate."
            }
            Self::GatherTimes => "Arrival and departure clock times are known.",
            Self::DetermineSeason => {
                "Season is derived from destination and dates, accounting for the hemisphere."
            }
            Self::GatherBudget => "A budget tier is chosen: budget, mid-range or luxury.",
            Self::ProposeItinerary => {
                "A day-by-day itinerary has been presented using the proposal template."
            }
            Self::ConfirmOrRevise => {
                "The traveller explicitly approved the itinerary or asked for changes."
            }
            Self::PersistItems => "Every approved item was saved with create_trip_item.",
            Self::Success => "Items are saved; reply with the success template.",
            Self::Error => "Saving failed; reply with the error template.",
        }
    }
}

impl std::fmt::Display for PlanningStage {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.key())
    }
}
