pub mod dialog;
pub mod intent;
pub mod models;
pub mod planner;

pub use dialog::{
    parse_date_range, parse_travel_date, plan_turn, DateIssue, DialogSettings, SideQuery,
    SideQueryKind, TurnInput, TurnPlan,
};
pub use intent::{classify, normalize_text, rules, IntentRule};
pub use models::*;
