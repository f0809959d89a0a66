use serde::Serialize;
use tera::{Context, Tera};
use thiserror::Error;

use itinera_core::domain::profile::ProfileContext;
use itinera_core::domain::trip::TripId;
use itinera_core::planning::PlanningProtocol;

const SYSTEM_TEMPLATE_NAME: &str = "planner_system.tera";
const SYSTEM_TEMPLATE: &str = include_str!("../../../templates/prompts/planner_system.tera");

pub const ASSISTANT_NAME: &str = "Itinera";

pub const GREETING_TEMPLATE: &str = "Hi! I'm Itinera and I'll help you plan this trip. \
Where are you headed, and what are your exact travel dates?";
pub const MISSING_DATES_TEMPLATE: &str = "Great, [destination] it is! To plan properly I need \
exact dates. Which day do you arrive and which day do you leave (for example 2025-06-01 to 2025-06-03)?";
pub const MISSING_TIMES_TEMPLATE: &str = "Thanks! What time do you arrive on [start date] and \
what time do you leave on [end date]?";
pub const BUDGET_TEMPLATE: &str = "[Destination] will be in [season] during your stay. \
Which budget tier suits you: budget, mid-range or luxury?";
pub const PROPOSAL_TEMPLATE: &str = "Here is your itinerary for [destination]:\n\n\
Day [n] ([date])\n- [time] Breakfast: [place]\n- [time] [activity]\n- [time] Lunch: [place]\n\
- [time] [activity]\n- [time] Dinner: [place]\n\n\
Would you like me to save this itinerary, or should I change anything?";
pub const SUCCESS_TEMPLATE: &str = "All set! Your itinerary has been saved to this trip. \
Open your trip timeline to review every stop, and let me know if you would like to change anything.";
pub const ERROR_TEMPLATE: &str = "Sorry, something went wrong while saving your itinerary. \
Please try again in a moment.";

#[derive(Debug, Error)]
pub enum PromptError {
    #[error("prompt template is invalid: {0}")]
    Template(#[source] tera::Error),
    #[error("prompt rendering failed: {0}")]
    Render(#[source] tera::Error),
}

#[derive(Serialize)]
struct StageView {
    key: &'static str,
    gate: &'static str,
    next: Vec<&'static str>,
}

#[derive(Serialize)]
struct TemplateCatalogue {
    greeting: &'static str,
    missing_dates: &'static str,
    missing_times: &'static str,
    budget: &'static str,
    proposal: &'static str,
    success: &'static str,
    error: &'static str,
}

const CATALOGUE: TemplateCatalogue = TemplateCatalogue {
    greeting: GREETING_TEMPLATE,
    missing_dates: MISSING_DATES_TEMPLATE,
    missing_times: MISSING_TIMES_TEMPLATE,
    budget: BUDGET_TEMPLATE,
    proposal: PROPOSAL_TEMPLATE,
    success: SUCCESS_TEMPLATE,
    error: ERROR_TEMPLATE,
};

/// Renders the system instructions for one planning request.
pub struct PromptEngine {
    tera: Tera,
    protocol: PlanningProtocol,
}

impl PromptEngine {
    pub fn new() -> Result<Self, PromptError> {
        let mut tera = Tera::default();
        tera.add_raw_template(SYSTEM_TEMPLATE_NAME, SYSTEM_TEMPLATE)
            .map_err(PromptError::Template)?;
        Ok(Self { tera, protocol: PlanningProtocol::new() })
    }

    pub fn render_system_instructions(
        &self,
        trip_id: &TripId,
        profile: &ProfileContext,
    ) -> Result<String, PromptError> {
        let stages: Vec<StageView> = self
            .protocol
            .ordered_stages()
            .iter()
            .map(|stage| StageView {
                key: stage.key(),
                gate: stage.gate(),
                next: self.protocol.transitions(*stage).iter().map(|next| next.key()).collect(),
            })
            .collect();

        let mut context = Context::new();
        context.insert("assistant_name", ASSISTANT_NAME);
        context.insert("age", &profile.age);
        context.insert("gender", &profile.gender);
        context.insert("interests", &profile.interest_list());
        context.insert("trip_id", trip_id.as_str());
        context.insert("stages", &stages);
        context.insert("templates", &CATALOGUE);

        self.tera.render(SYSTEM_TEMPLATE_NAME, &context).map_err(PromptError::Render)
    }
}
