use crate::planning::stages::PlanningStage;

/// The gate graph the assistant is instructed to follow.
///
/// The server never forces the model through these stages; the graph only
/// feeds the system instructions.
#[derive(Clone, Debug, Default)]
pub struct PlanningProtocol;

impl PlanningProtocol {
    pub fn new() -> Self {
        Self
    }

    pub fn transitions(&self, from: PlanningStage) -> &'static [PlanningStage] {
        use PlanningStage::*;

        match from {
            Greet => &[GatherDates],
            GatherDates => &[GatherDates, GatherTimes],
            GatherTimes => &[GatherTimes, DetermineSeason],
            DetermineSeason => &[GatherBudget],
            GatherBudget => &[GatherBudget, ProposeItinerary],
            ProposeItinerary => &[ConfirmOrRevise],
            ConfirmOrRevise => &[ProposeItinerary, PersistItems],
            PersistItems => &[Success, Error],
            Success | Error => &[],
        }
    }

    /// Stages in the order they are presented to the model.
    pub fn ordered_stages(&self) -> &'static [PlanningStage] {
        &PlanningStage::ALL
    }
}
