use std::collections::{BTreeMap, BTreeSet};

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;

pub const ENTITY_CITY: &str = "city";
pub const ENTITY_START_DATE: &str = "start_date";
pub const ENTITY_END_DATE: &str = "end_date";
pub const ENTITY_BUDGET: &str = "budget";

/// Extracted entity name -> raw value as typed by the user.
pub type Entities = BTreeMap<String, String>;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Intent {
    Greet,
    ProvideDestination,
    ProvideDates,
    ProvideBudget,
    AskWeather,
    AskFlight,
    AskHotel,
    AskAdvice,
    CreatePlan,
    ContinueTrip,
    Goodbye,
    Reset,
    Unknown,
}

impl Intent {
    pub const ALL: [Intent; 13] = [
        Intent::Greet,
        Intent::ProvideDestination,
        Intent::ProvideDates,
        Intent::ProvideBudget,
        Intent::AskWeather,
        Intent::AskFlight,
        Intent::AskHotel,
        Intent::AskAdvice,
        Intent::CreatePlan,
        Intent::ContinueTrip,
        Intent::Goodbye,
        Intent::Reset,
        Intent::Unknown,
    ];

    pub fn as_code(self) -> &'static str {
        match self {
            Self::Greet => "greet",
            Self::ProvideDestination => "provide_destination",
            Self::ProvideDates => "provide_dates",
            Self::ProvideBudget => "provide_budget",
            Self::AskWeather => "ask_weather",
            Self::AskFlight => "ask_flight",
            Self::AskHotel => "ask_hotel",
            Self::AskAdvice => "ask_advice",
            Self::CreatePlan => "create_plan",
            Self::ContinueTrip => "continue_trip",
            Self::Goodbye => "goodbye",
            Self::Reset => "reset",
            Self::Unknown => "unknown",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Slot {
    Destination,
    Dates,
    Budget,
}

impl Slot {
    pub const ORDER: [Slot; 3] = [Slot::Destination, Slot::Dates, Slot::Budget];
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum DialogState {
    NeedDestination,
    NeedDates,
    NeedBudget,
    Ready,
}

impl DialogState {
    pub fn pending_slot(self) -> Option<Slot> {
        match self {
            Self::NeedDestination => Some(Slot::Destination),
            Self::NeedDates => Some(Slot::Dates),
            Self::NeedBudget => Some(Slot::Budget),
            Self::Ready => None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Classification {
    pub intent: Intent,
    pub entities: Entities,
    /// Id of the rule that matched; `"fallback"` when none did.
    pub rule: String,
    /// The utterance named its slot explicitly ("nach Paris", "500€")
    /// instead of a bare value ("Paris", "500").
    pub explicit: bool,
}

impl Classification {
    pub fn unknown() -> Self {
        Self {
            intent: Intent::Unknown,
            entities: Entities::new(),
            rule: "fallback".to_string(),
            explicit: false,
        }
    }

    pub fn entity(&self, name: &str) -> Option<&str> {
        self.entities.get(name).map(String::as_str)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Session {
    pub user_id: String,
    pub destination: Option<String>,
    pub start_date: Option<NaiveDate>,
    pub end_date: Option<NaiveDate>,
    pub budget: Option<u32>,
    pub asked_slots: BTreeSet<Slot>,
    pub last_intent: Option<Intent>,
    pub ready_announced: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Session {
    pub fn new(user_id: impl Into<String>) -> Self {
        let now = Utc::now();
        Self {
            user_id: user_id.into(),
            destination: None,
            start_date: None,
            end_date: None,
            budget: None,
            asked_slots: BTreeSet::new(),
            last_intent: None,
            ready_announced: false,
            created_at: now,
            updated_at: now,
        }
    }

    pub fn is_filled(&self, slot: Slot) -> bool {
        match slot {
            Slot::Destination => self.destination.is_some(),
            Slot::Dates => self.start_date.is_some() && self.end_date.is_some(),
            Slot::Budget => self.budget.is_some(),
        }
    }

    pub fn state(&self) -> DialogState {
        match Slot::ORDER.into_iter().find(|slot| !self.is_filled(*slot)) {
            Some(Slot::Destination) => DialogState::NeedDestination,
            Some(Slot::Dates) => DialogState::NeedDates,
            Some(Slot::Budget) => DialogState::NeedBudget,
            None => DialogState::Ready,
        }
    }

    pub fn dates(&self) -> Option<(NaiveDate, NaiveDate)> {
        self.start_date.zip(self.end_date)
    }

    /// Drops every slot and flag; the identifier and creation time survive.
    pub fn clear(&mut self) {
        self.destination = None;
        self.start_date = None;
        self.end_date = None;
        self.budget = None;
        self.asked_slots.clear();
        self.last_intent = None;
        self.ready_announced = false;
        self.updated_at = Utc::now();
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ResponseKind {
    WeatherInfo,
    FlightResults,
    HotelResults,
    Success,
    Error,
    Plain,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DialogResponse {
    pub message: String,
    pub suggestions: Vec<String>,
    pub kind: ResponseKind,
    pub intent: Intent,
    pub state: DialogState,
    pub payload: Value,
}

impl DialogResponse {
    pub fn new(kind: ResponseKind, message: impl Into<String>, suggestions: Vec<String>) -> Self {
        Self {
            message: message.into(),
            suggestions,
            kind,
            intent: Intent::Unknown,
            state: DialogState::NeedDestination,
            payload: Value::Null,
        }
    }

    pub fn with_payload(mut self, payload: Value) -> Self {
        self.payload = payload;
        self
    }

    /// Stamps the turn's intent and the dialog state after the turn.
    pub fn for_turn(mut self, intent: Intent, state: DialogState) -> Self {
        self.intent = intent;
        self.state = state;
        self
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WeatherQuery {
    pub location: String,
    pub date: Option<NaiveDate>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WeatherForecast {
    pub date: NaiveDate,
    pub temperature_c: i32,
    pub description: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WeatherReport {
    pub location: String,
    pub temperature_c: i32,
    pub feels_like_c: i32,
    pub humidity: u8,
    pub description: String,
    pub wind_kmh: f32,
    pub visibility_km: f32,
    pub forecast: Option<WeatherForecast>,
    pub simulated: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FlightQuery {
    pub origin: String,
    pub destination: String,
    pub start_date: Option<NaiveDate>,
    pub end_date: Option<NaiveDate>,
    pub budget: Option<u32>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FlightOffer {
    pub airline: String,
    pub price_eur: f64,
    #[serde(default)]
    pub departure_time: String,
    #[serde(default)]
    pub duration_hours: f64,
    #[serde(default)]
    pub stops: u8,
    #[serde(default)]
    pub booking_url: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HotelQuery {
    pub location: String,
    pub check_in: Option<NaiveDate>,
    pub check_out: Option<NaiveDate>,
    pub guests: u8,
    pub budget: Option<u32>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HotelOffer {
    pub name: String,
    pub price_per_night_eur: f64,
    #[serde(default)]
    pub rating: Option<f32>,
    #[serde(default)]
    pub address: Option<String>,
    #[serde(default)]
    pub amenities: Vec<String>,
    #[serde(default)]
    pub booking_url: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AdviceRequest {
    pub message: String,
    /// Slot summary for free-text models.
    pub context: String,
    pub destination: Option<String>,
    pub start_date: Option<NaiveDate>,
    pub end_date: Option<NaiveDate>,
    pub budget: Option<u32>,
    pub guests: u8,
    /// Month of the trip start, or of today while no dates are known.
    pub travel_month: u32,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Advice {
    pub text: String,
    pub model: String,
}
