use chrono::{Datelike, NaiveDate, Utc};
use serde::{Deserialize, Serialize};

use crate::models::{
    AdviceRequest, Classification, DialogResponse, FlightQuery, HotelQuery, Intent, Session,
    Slot, WeatherQuery, ENTITY_BUDGET, ENTITY_CITY, ENTITY_END_DATE, ENTITY_START_DATE,
};
use crate::planner;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DialogSettings {
    /// Departure airport used for every flight search.
    pub flight_origin: String,
    pub guests: u8,
}

impl Default for DialogSettings {
    fn default() -> Self {
        Self {
            flight_origin: "BER".to_string(),
            guests: 1,
        }
    }
}

#[derive(Debug, Clone, Copy)]
pub struct TurnInput<'a> {
    pub utterance: &'a str,
    pub classification: &'a Classification,
    pub today: NaiveDate,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SideQueryKind {
    Weather,
    Flights,
    Hotels,
    Advice,
}

impl SideQueryKind {
    pub fn as_code(self) -> &'static str {
        match self {
            Self::Weather => "weather",
            Self::Flights => "flights",
            Self::Hotels => "hotels",
            Self::Advice => "advice",
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum SideQuery {
    Weather(WeatherQuery),
    Flights(FlightQuery),
    Hotels(HotelQuery),
    Advice(AdviceRequest),
}

impl SideQuery {
    pub fn kind(&self) -> SideQueryKind {
        match self {
            Self::Weather(_) => SideQueryKind::Weather,
            Self::Flights(_) => SideQueryKind::Flights,
            Self::Hotels(_) => SideQueryKind::Hotels,
            Self::Advice(_) => SideQueryKind::Advice,
        }
    }
}

/// What a turn needs after the session has been updated.
#[derive(Debug, Clone)]
pub enum TurnPlan {
    Reply(DialogResponse),
    Query(SideQuery),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DateIssue {
    Malformed,
    EndBeforeStart,
    InPast,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum FillDecision {
    Fill,
    Replace,
    Duplicate,
    Refuse,
}

fn decide_fill(filled: bool, same_value: bool, explicit: bool) -> FillDecision {
    match (filled, same_value, explicit) {
        (false, _, _) => FillDecision::Fill,
        (true, true, _) => FillDecision::Duplicate,
        (true, false, true) => FillDecision::Replace,
        (true, false, false) => FillDecision::Refuse,
    }
}

/// Applies one classified turn to the session.
///
/// Slot fills and resets are resolved here; weather, flight, hotel and advice
/// lookups are handed back as a [`SideQuery`] without touching any slot.
/// `last_intent` is recorded for every turn.
pub fn plan_turn(session: &mut Session, turn: TurnInput<'_>, settings: &DialogSettings) -> TurnPlan {
    let classification = turn.classification;
    let intent = classification.intent;

    let plan = match intent {
        Intent::Reset => {
            session.clear();
            TurnPlan::Reply(planner::reset_reply())
        }
        Intent::AskWeather | Intent::AskFlight | Intent::AskHotel => {
            side_query(session, classification, settings)
        }
        Intent::AskAdvice => TurnPlan::Query(SideQuery::Advice(advice_request(
            session,
            classification,
            turn,
            settings,
        ))),
        Intent::ProvideDestination => {
            TurnPlan::Reply(fill_destination(session, classification, turn.today))
        }
        Intent::ProvideDates => TurnPlan::Reply(fill_dates(session, classification, turn.today)),
        Intent::ProvideBudget => TurnPlan::Reply(fill_budget(session, classification, turn.today)),
        Intent::Greet => {
            if session.destination.is_none() {
                session.asked_slots.insert(Slot::Destination);
            }
            TurnPlan::Reply(planner::greeting(session, turn.today))
        }
        Intent::Goodbye => TurnPlan::Reply(planner::goodbye()),
        Intent::ContinueTrip => {
            mark_pending_asked(session);
            TurnPlan::Reply(planner::continue_trip(session, turn.today))
        }
        Intent::CreatePlan => TurnPlan::Reply(match session.destination {
            Some(_) => planner::trip_plan(session),
            None => {
                session.asked_slots.insert(Slot::Destination);
                planner::missing_destination()
            }
        }),
        Intent::Unknown => {
            mark_pending_asked(session);
            TurnPlan::Reply(planner::clarify(session, turn.today))
        }
    };

    session.last_intent = Some(intent);
    session.updated_at = Utc::now();

    match plan {
        TurnPlan::Reply(response) => TurnPlan::Reply(response.for_turn(intent, session.state())),
        query => query,
    }
}

fn mark_pending_asked(session: &mut Session) {
    if let Some(slot) = session.state().pending_slot() {
        session.asked_slots.insert(slot);
    }
}

fn side_query(
    session: &Session,
    classification: &Classification,
    settings: &DialogSettings,
) -> TurnPlan {
    let location = classification
        .entity(ENTITY_CITY)
        .map(str::to_string)
        .or_else(|| session.destination.clone());

    let Some(location) = location else {
        return TurnPlan::Reply(planner::missing_location(classification.intent));
    };

    let query = match classification.intent {
        Intent::AskWeather => SideQuery::Weather(WeatherQuery {
            location,
            date: session.start_date,
        }),
        Intent::AskFlight => SideQuery::Flights(FlightQuery {
            origin: settings.flight_origin.clone(),
            destination: location,
            start_date: session.start_date,
            end_date: session.end_date,
            budget: session.budget,
        }),
        _ => SideQuery::Hotels(HotelQuery {
            location,
            check_in: session.start_date,
            check_out: session.end_date,
            guests: settings.guests,
            budget: session.budget,
        }),
    };

    TurnPlan::Query(query)
}

fn advice_request(
    session: &Session,
    classification: &Classification,
    turn: TurnInput<'_>,
    settings: &DialogSettings,
) -> AdviceRequest {
    AdviceRequest {
        message: turn.utterance.to_string(),
        context: planner::session_context(session),
        destination: classification
            .entity(ENTITY_CITY)
            .map(str::to_string)
            .or_else(|| session.destination.clone()),
        start_date: session.start_date,
        end_date: session.end_date,
        budget: session.budget,
        guests: settings.guests,
        travel_month: session.start_date.unwrap_or(turn.today).month(),
    }
}

fn fill_destination(
    session: &mut Session,
    classification: &Classification,
    today: NaiveDate,
) -> DialogResponse {
    let Some(city) = classification.entity(ENTITY_CITY) else {
        session.asked_slots.insert(Slot::Destination);
        return planner::clarify(session, today);
    };

    let same = session
        .destination
        .as_deref()
        .map(|current| current.to_lowercase() == city.to_lowercase())
        .unwrap_or(false);

    match decide_fill(session.destination.is_some(), same, classification.explicit) {
        FillDecision::Duplicate => planner::already_known(session, Slot::Destination, today),
        FillDecision::Refuse => planner::implicit_change_refused(session, Slot::Destination, city),
        decision => {
            session.destination = Some(city.to_string());
            after_fill(session, Slot::Destination, decision == FillDecision::Replace, today)
        }
    }
}

fn fill_dates(
    session: &mut Session,
    classification: &Classification,
    today: NaiveDate,
) -> DialogResponse {
    let parsed = match (
        classification.entity(ENTITY_START_DATE),
        classification.entity(ENTITY_END_DATE),
    ) {
        (Some(start), Some(end)) => parse_date_range(start, end, today),
        _ => Err(DateIssue::Malformed),
    };

    let (start, end) = match parsed {
        Ok(range) => range,
        Err(issue) => {
            session.asked_slots.insert(Slot::Dates);
            return planner::invalid_dates(issue, today);
        }
    };

    let same = session.dates() == Some((start, end));
    match decide_fill(session.is_filled(Slot::Dates), same, classification.explicit) {
        FillDecision::Duplicate => planner::already_known(session, Slot::Dates, today),
        FillDecision::Refuse => planner::implicit_change_refused(
            session,
            Slot::Dates,
            &planner::format_range(start, end),
        ),
        decision => {
            session.start_date = Some(start);
            session.end_date = Some(end);
            after_fill(session, Slot::Dates, decision == FillDecision::Replace, today)
        }
    }
}

fn fill_budget(
    session: &mut Session,
    classification: &Classification,
    today: NaiveDate,
) -> DialogResponse {
    let amount = classification
        .entity(ENTITY_BUDGET)
        .and_then(|raw| raw.parse::<u32>().ok())
        .filter(|amount| *amount > 0);

    let Some(amount) = amount else {
        session.asked_slots.insert(Slot::Budget);
        return planner::invalid_budget();
    };

    let same = session.budget == Some(amount);
    match decide_fill(session.budget.is_some(), same, classification.explicit) {
        FillDecision::Duplicate => planner::already_known(session, Slot::Budget, today),
        FillDecision::Refuse => {
            planner::implicit_change_refused(session, Slot::Budget, &amount.to_string())
        }
        decision => {
            session.budget = Some(amount);
            after_fill(session, Slot::Budget, decision == FillDecision::Replace, today)
        }
    }
}

fn after_fill(session: &mut Session, slot: Slot, replaced: bool, today: NaiveDate) -> DialogResponse {
    let confirmation = planner::slot_confirmation(session, slot, replaced);

    match session.state().pending_slot() {
        Some(next) => {
            session.asked_slots.insert(next);
            planner::prompt_after_fill(&confirmation, next, today)
        }
        None if !session.ready_announced => {
            session.ready_announced = true;
            planner::ready_summary(session, &confirmation)
        }
        None => planner::ready_confirmation(session, &confirmation),
    }
}

/// Parses `DD.MM.YYYY`, `DD.MM.` or `DD.MM`.
///
/// Without a year the next occurrence on or after `reference` is used.
pub fn parse_travel_date(raw: &str, reference: NaiveDate) -> Option<NaiveDate> {
    let parts = raw
        .trim()
        .trim_end_matches('.')
        .split('.')
        .map(str::trim)
        .collect::<Vec<_>>();

    let (day, month) = match parts.as_slice() {
        [day, month] | [day, month, _] => (day.parse::<u32>().ok()?, month.parse::<u32>().ok()?),
        _ => return None,
    };

    if let [_, _, year] = parts.as_slice() {
        if year.len() != 4 {
            return None;
        }
        return NaiveDate::from_ymd_opt(year.parse().ok()?, month, day);
    }

    let this_year = NaiveDate::from_ymd_opt(reference.year(), month, day);
    match this_year {
        Some(date) if date >= reference => Some(date),
        _ => NaiveDate::from_ymd_opt(reference.year() + 1, month, day),
    }
}

pub fn parse_date_range(
    start_raw: &str,
    end_raw: &str,
    today: NaiveDate,
) -> Result<(NaiveDate, NaiveDate), DateIssue> {
    let start = parse_travel_date(start_raw, today).ok_or(DateIssue::Malformed)?;
    let end = parse_travel_date(end_raw, start).ok_or(DateIssue::Malformed)?;

    if end < start {
        return Err(DateIssue::EndBeforeStart);
    }
    if start < today {
        return Err(DateIssue::InPast);
    }
    Ok((start, end))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::intent::classify;
    use crate::models::{DialogState, ResponseKind};

    fn today() -> NaiveDate {
        NaiveDate::from_ymd_opt(2030, 3, 1).expect("valid date")
    }

    fn turn(session: &mut Session, text: &str) -> TurnPlan {
        let classification = classify(text);
        plan_turn(
            session,
            TurnInput {
                utterance: text,
                classification: &classification,
                today: today(),
            },
            &DialogSettings::default(),
        )
    }

    fn reply(session: &mut Session, text: &str) -> DialogResponse {
        match turn(session, text) {
            TurnPlan::Reply(response) => response,
            TurnPlan::Query(query) => panic!("expected a reply, got {query:?}"),
        }
    }

    fn ready_session() -> Session {
        let mut session = Session::new("u1");
        reply(&mut session, "Ich möchte nach Paris reisen");
        reply(&mut session, "15.07.2030 bis 22.07.2030");
        reply(&mut session, "500€");
        session
    }

    #[test]
    fn slot_order_drives_states() {
        let mut session = Session::new("u1");

        let first = reply(&mut session, "Ich möchte nach Paris reisen");
        assert_eq!(first.state, DialogState::NeedDates);
        assert_eq!(first.intent, Intent::ProvideDestination);
        assert!(first.message.contains("Wann möchten Sie reisen?"));
        assert!(session.asked_slots.contains(&Slot::Dates));

        let second = reply(&mut session, "15.07.2030 bis 22.07.2030");
        assert_eq!(second.state, DialogState::NeedBudget);

        let third = reply(&mut session, "500€");
        assert_eq!(third.state, DialogState::Ready);
        assert_eq!(third.kind, ResponseKind::Success);
        assert!(third.message.contains("Alle Informationen sind vollständig"));
        assert!(third
            .suggestions
            .iter()
            .any(|s| s == "Flüge nach Paris suchen"));
        assert!(session.ready_announced);
    }

    #[test]
    fn budget_first_does_not_reach_ready() {
        let mut session = Session::new("u1");
        let response = reply(&mut session, "800 Euro");
        assert_eq!(response.state, DialogState::NeedDestination);
        assert_eq!(session.budget, Some(800));

        reply(&mut session, "Rom");
        let response = reply(&mut session, "01.06.2030 bis 10.06.2030");
        assert_eq!(response.state, DialogState::Ready);
        assert!(response.message.contains("Alle Informationen sind vollständig"));
    }

    #[test]
    fn summary_is_announced_once() {
        let mut session = ready_session();
        let response = reply(&mut session, "Mein Budget ist 900 Euro");
        assert_eq!(session.budget, Some(900));
        assert_eq!(response.state, DialogState::Ready);
        assert!(!response.message.contains("Alle Informationen sind vollständig"));
        assert!(response.message.contains("geändert"));
    }

    #[test]
    fn repeated_answer_is_not_applied_twice() {
        let mut session = Session::new("u1");
        reply(&mut session, "Ich möchte nach Paris reisen");
        let before = session.clone();

        let response = reply(&mut session, "Ich möchte nach paris reisen");
        assert_eq!(response.kind, ResponseKind::Plain);
        assert!(response.message.contains("bereits Paris"));
        assert_eq!(session.destination, before.destination);
    }

    #[test]
    fn bare_city_does_not_overwrite_destination() {
        let mut session = Session::new("u1");
        reply(&mut session, "Ich möchte nach Paris reisen");

        let response = reply(&mut session, "London");
        assert_eq!(session.destination.as_deref(), Some("Paris"));
        assert!(response
            .suggestions
            .iter()
            .any(|s| s == "Ich möchte nach London reisen"));

        reply(&mut session, "Ich möchte nach London reisen");
        assert_eq!(session.destination.as_deref(), Some("London"));
    }

    #[test]
    fn bare_number_does_not_overwrite_budget() {
        let mut session = ready_session();
        reply(&mut session, "1500");
        assert_eq!(session.budget, Some(500));
    }

    #[test]
    fn reset_clears_from_any_state() {
        let mut session = ready_session();
        let response = reply(&mut session, "Alles zurücksetzen");

        assert_eq!(response.state, DialogState::NeedDestination);
        assert_eq!(response.intent, Intent::Reset);
        assert_eq!(session.destination, None);
        assert_eq!(session.dates(), None);
        assert_eq!(session.budget, None);
        assert!(!session.ready_announced);
        assert!(response.suggestions.iter().any(|s| s.contains("Rom")));
        assert_eq!(session.last_intent, Some(Intent::Reset));
    }

    #[test]
    fn side_queries_leave_slots_untouched() {
        let mut session = Session::new("u1");
        reply(&mut session, "Ich möchte nach Paris reisen");
        let before = session.clone();

        match turn(&mut session, "Wie ist das Wetter in Berlin?") {
            TurnPlan::Query(SideQuery::Weather(query)) => assert_eq!(query.location, "Berlin"),
            other => panic!("unexpected plan {other:?}"),
        }
        match turn(&mut session, "Flüge suchen") {
            TurnPlan::Query(SideQuery::Flights(query)) => {
                assert_eq!(query.destination, "Paris");
                assert_eq!(query.origin, "BER");
            }
            other => panic!("unexpected plan {other:?}"),
        }

        assert_eq!(session.destination, before.destination);
        assert_eq!(session.dates(), before.dates());
        assert_eq!(session.budget, before.budget);
        assert_eq!(session.state(), DialogState::NeedDates);
        assert_eq!(session.last_intent, Some(Intent::AskFlight));
    }

    #[test]
    fn side_query_without_location_asks_for_one() {
        let mut session = Session::new("u1");
        let response = reply(&mut session, "Hotels suchen");
        assert_eq!(response.kind, ResponseKind::Plain);
        assert_eq!(response.intent, Intent::AskHotel);
        assert!(response.suggestions.iter().any(|s| s.starts_with("Hotels in")));
    }

    #[test]
    fn oversized_budget_reprompts() {
        let mut session = Session::new("u1");
        reply(&mut session, "Ich möchte nach Paris reisen");
        reply(&mut session, "15.07.2030 bis 22.07.2030");

        let response = reply(&mut session, "Mein Budget ist 99999999999 Euro");
        assert_eq!(response.intent, Intent::ProvideBudget);
        assert_eq!(response.state, DialogState::NeedBudget);
        assert!(response.message.contains("gültiges Budget"));
        assert_eq!(session.budget, None);

        reply(&mut session, "12345678€");
        assert_eq!(session.budget, Some(12_345_678));
    }

    #[test]
    fn malformed_dates_reprompt() {
        let mut session = Session::new("u1");
        reply(&mut session, "Ich möchte nach Paris reisen");

        let response = reply(&mut session, "31.02.2030 bis 05.03.2030");
        assert_eq!(response.state, DialogState::NeedDates);
        assert_eq!(session.dates(), None);

        let response = reply(&mut session, "20.07.2030 bis 10.07.2030");
        assert_eq!(response.state, DialogState::NeedDates);
        assert!(response.message.contains("Enddatum"));
    }

    #[test]
    fn unknown_reasks_pending_slot() {
        let mut session = Session::new("u1");
        reply(&mut session, "Ich möchte nach Paris reisen");

        let response = reply(&mut session, "Wie geht es dir heute so?");
        assert_eq!(response.intent, Intent::Unknown);
        assert_eq!(response.kind, ResponseKind::Plain);
        assert!(response.message.contains("Wann möchten Sie reisen?"));
        assert_eq!(response.suggestions.len(), 3);
    }

    #[test]
    fn advice_is_handed_to_provider_with_context() {
        let mut session = ready_session();
        match turn(&mut session, "Was kann ich in Paris unternehmen?") {
            TurnPlan::Query(SideQuery::Advice(request)) => {
                assert!(request.context.contains("Paris"));
                assert!(request.context.contains("500"));
                assert_eq!(request.destination.as_deref(), Some("Paris"));
                assert_eq!(request.budget, Some(500));
                assert_eq!(request.travel_month, 7);
            }
            other => panic!("unexpected plan {other:?}"),
        }
    }

    #[test]
    fn create_plan_requires_destination() {
        let mut session = Session::new("u1");
        let response = reply(&mut session, "Reiseplan erstellen");
        assert!(response.message.contains("Reiseziel"));

        let mut session = ready_session();
        let response = reply(&mut session, "Reiseplan erstellen");
        assert_eq!(response.kind, ResponseKind::Success);
        assert!(response.message.contains("Reiseplan für Paris"));
    }

    #[test]
    fn year_less_dates_roll_forward() {
        let reference = NaiveDate::from_ymd_opt(2030, 8, 1).expect("valid date");
        assert_eq!(
            parse_travel_date("15.07", reference),
            NaiveDate::from_ymd_opt(2031, 7, 15)
        );
        assert_eq!(
            parse_travel_date("15.09.", reference),
            NaiveDate::from_ymd_opt(2030, 9, 15)
        );
        assert_eq!(parse_travel_date("15.09.30", reference), None);

        let range = parse_date_range("28.12", "04.01", reference).expect("valid range");
        assert_eq!(range.0, NaiveDate::from_ymd_opt(2030, 12, 28).expect("valid date"));
        assert_eq!(range.1, NaiveDate::from_ymd_opt(2031, 1, 4).expect("valid date"));
    }

    #[test]
    fn past_ranges_are_rejected() {
        assert_eq!(
            parse_date_range("01.01.2020", "05.01.2020", today()),
            Err(DateIssue::InPast)
        );
    }
}
