use std::sync::Arc;

use async_trait::async_trait;
use chrono::NaiveDate;
use parking_lot::Mutex;
use travelguide_agents::TravelAgent;
use travelguide_core::{
    Advice, AdviceRequest, DialogSettings, DialogState, FlightOffer, FlightQuery, HotelOffer,
    HotelQuery, Intent, ResponseKind, WeatherQuery, WeatherReport,
};
use travelguide_observability::AppMetrics;
use travelguide_providers::{
    AdvisoryProvider, FlightProvider, HotelProvider, LocalAdvisor, ProviderError, ProviderSet,
    SimulatedWeatherProvider, WeatherProvider,
};
use travelguide_storage::MemorySessionStore;

#[derive(Default)]
struct RecordingWeather {
    queries: Mutex<Vec<WeatherQuery>>,
}

#[async_trait]
impl WeatherProvider for RecordingWeather {
    async fn current(&self, query: &WeatherQuery) -> Result<WeatherReport, ProviderError> {
        self.queries.lock().push(query.clone());
        if query.location == "Atlantis" {
            return Err(ProviderError::UnknownLocation(query.location.clone()));
        }
        SimulatedWeatherProvider.current(query).await
    }
}

struct FailingFlights;

#[async_trait]
impl FlightProvider for FailingFlights {
    async fn search(&self, _query: &FlightQuery) -> Result<Vec<FlightOffer>, ProviderError> {
        Err(ProviderError::Status {
            provider: "flights",
            status: 502,
        })
    }
}

#[derive(Default)]
struct StaticHotels {
    queries: Mutex<Vec<HotelQuery>>,
}

#[async_trait]
impl HotelProvider for StaticHotels {
    async fn search(&self, query: &HotelQuery) -> Result<Vec<HotelOffer>, ProviderError> {
        self.queries.lock().push(query.clone());
        Ok(vec![
            HotelOffer {
                name: "Hotel du Louvre".to_string(),
                price_per_night_eur: 240.0,
                rating: Some(4.6),
                address: None,
                amenities: Vec::new(),
                booking_url: None,
            },
            HotelOffer {
                name: "Generator Paris".to_string(),
                price_per_night_eur: 65.0,
                rating: Some(4.0),
                address: None,
                amenities: vec!["WLAN".to_string()],
                booking_url: None,
            },
        ])
    }
}

struct EchoAdvisor;

#[async_trait]
impl AdvisoryProvider for EchoAdvisor {
    async fn advise(&self, request: &AdviceRequest) -> Result<Advice, ProviderError> {
        Ok(Advice {
            text: format!("Tipp für {}", request.context),
            model: "echo".to_string(),
        })
    }
}

struct Harness {
    agent: TravelAgent<MemorySessionStore>,
    weather: Arc<RecordingWeather>,
    hotels: Arc<StaticHotels>,
    metrics: Arc<AppMetrics>,
}

fn fixed_today() -> NaiveDate {
    NaiveDate::from_ymd_opt(2030, 3, 1).expect("valid date")
}

fn harness_with(advisor: Arc<dyn AdvisoryProvider>) -> Harness {
    let weather = Arc::new(RecordingWeather::default());
    let hotels = Arc::new(StaticHotels::default());
    let metrics = AppMetrics::shared();
    let providers = ProviderSet {
        weather: weather.clone(),
        flights: Arc::new(FailingFlights),
        hotels: hotels.clone(),
        advisor,
    };
    let agent = TravelAgent::new(
        Arc::new(MemorySessionStore::new()),
        providers,
        DialogSettings::default(),
        metrics.clone(),
    )
    .with_clock(fixed_today);

    Harness {
        agent,
        weather,
        hotels,
        metrics,
    }
}

fn harness() -> Harness {
    harness_with(Arc::new(LocalAdvisor))
}

async fn plan_paris(agent: &TravelAgent<MemorySessionStore>, user: &str) {
    agent.handle_turn(user, "Ich möchte nach Paris reisen").await;
    agent.handle_turn(user, "15.07.2030 bis 22.07.2030").await;
    agent.handle_turn(user, "500€").await;
}

#[tokio::test]
async fn destination_on_fresh_session_prompts_for_dates() {
    let h = harness();
    let response = h.agent.handle_turn("u1", "Ich möchte nach Paris reisen").await;

    assert_eq!(response.intent, Intent::ProvideDestination);
    assert_eq!(response.state, DialogState::NeedDates);
    assert_eq!(response.kind, ResponseKind::Success);
    assert!(response.message.contains("Wann möchten Sie reisen?"));

    let session = h.agent.session("u1").await.expect("session");
    assert_eq!(session.destination.as_deref(), Some("Paris"));
}

#[tokio::test]
async fn weather_question_calls_adapter_without_touching_slots() {
    let h = harness();
    let response = h.agent.handle_turn("u1", "Wie ist das Wetter in Berlin?").await;

    assert_eq!(response.intent, Intent::AskWeather);
    assert_eq!(response.kind, ResponseKind::WeatherInfo);
    assert_eq!(response.state, DialogState::NeedDestination);
    assert_eq!(response.payload["weather"]["location"], "Berlin");

    let queries = h.weather.queries.lock().clone();
    assert_eq!(queries.len(), 1);
    assert_eq!(queries[0].location, "Berlin");

    let session = h.agent.session("u1").await.expect("session");
    assert_eq!(session.destination, None);
    assert_eq!(session.last_intent, Some(Intent::AskWeather));
}

#[tokio::test]
async fn weather_uses_destination_and_travel_date() {
    let h = harness();
    plan_paris(&h.agent, "u1").await;

    let response = h.agent.handle_turn("u1", "Wie wird das Wetter?").await;
    assert_eq!(response.kind, ResponseKind::WeatherInfo);
    assert_eq!(response.state, DialogState::Ready);

    let query = h.weather.queries.lock()[0].clone();
    assert_eq!(query.location, "Paris");
    assert_eq!(query.date, NaiveDate::from_ymd_opt(2030, 7, 15));
}

#[tokio::test]
async fn failing_flight_adapter_yields_apology() {
    let h = harness();
    h.agent.handle_turn("u1", "Ich möchte nach Paris reisen").await;
    let before = h.agent.session("u1").await.expect("session");

    let response = h.agent.handle_turn("u1", "Flüge nach Mars suchen").await;

    assert_eq!(response.intent, Intent::AskFlight);
    assert_eq!(response.kind, ResponseKind::Error);
    assert_eq!(
        response.message,
        "Entschuldigung, bei der Flugsuche ist ein Fehler aufgetreten."
    );
    assert_eq!(response.state, DialogState::NeedDates);

    let after = h.agent.session("u1").await.expect("session");
    assert_eq!(after.destination, before.destination);
    assert_eq!(after.dates(), before.dates());
    assert_eq!(after.budget, before.budget);

    let snapshot = h.metrics.snapshot();
    assert_eq!(snapshot.adapter_calls_total, 1);
    assert_eq!(snapshot.adapter_failures_total, 1);
}

#[tokio::test]
async fn unknown_location_is_an_error_reply() {
    let h = harness();
    plan_paris(&h.agent, "u1").await;
    let before = h.agent.session("u1").await.expect("session");

    let response = h.agent.handle_turn("u1", "Wie ist das Wetter in Atlantis?").await;
    assert_eq!(response.kind, ResponseKind::Error);
    assert_eq!(response.intent, Intent::AskWeather);
    assert!(response.message.starts_with("Entschuldigung"));
    assert!(response.message.contains("Atlantis"));

    let after = h.agent.session("u1").await.expect("session");
    assert_eq!(after.destination, before.destination);
    assert_eq!(after.state(), DialogState::Ready);
    assert_eq!(h.metrics.snapshot().adapter_failures_total, 1);
}

#[tokio::test]
async fn slot_filling_reaches_ready_and_announces_once() {
    let h = harness();
    let first = h.agent.handle_turn("u1", "Ich möchte nach Paris reisen").await;
    assert_eq!(first.state, DialogState::NeedDates);

    let second = h.agent.handle_turn("u1", "15.07.2030 bis 22.07.2030").await;
    assert_eq!(second.state, DialogState::NeedBudget);
    assert!(second.message.contains("Budget"));

    let third = h.agent.handle_turn("u1", "500€").await;
    assert_eq!(third.state, DialogState::Ready);
    assert!(third.message.contains("Alle Informationen sind vollständig"));
    assert!(third.message.contains("7 Nächte"));
    assert!(third.suggestions.contains(&"Hotels in Paris finden".to_string()));

    let again = h.agent.handle_turn("u1", "Mein Budget ist 600 Euro").await;
    assert_eq!(again.state, DialogState::Ready);
    assert!(!again.message.contains("Alle Informationen sind vollständig"));
}

#[tokio::test]
async fn budget_before_destination_does_not_reach_ready() {
    let h = harness();
    let response = h.agent.handle_turn("u1", "Mein Budget ist 800 Euro").await;
    assert_eq!(response.intent, Intent::ProvideBudget);
    assert_eq!(response.state, DialogState::NeedDestination);
    assert!(response.message.contains("Wohin möchten Sie reisen?"));
}

#[tokio::test]
async fn implicit_values_never_overwrite_filled_slots() {
    let h = harness();
    plan_paris(&h.agent, "u1").await;

    h.agent.handle_turn("u1", "London").await;
    h.agent.handle_turn("u1", "900").await;

    let session = h.agent.session("u1").await.expect("session");
    assert_eq!(session.destination.as_deref(), Some("Paris"));
    assert_eq!(session.budget, Some(500));
}

#[tokio::test]
async fn reset_after_ready_clears_everything() {
    let h = harness();
    plan_paris(&h.agent, "u1").await;

    let response = h.agent.handle_turn("u1", "Alles zurücksetzen").await;
    assert_eq!(response.intent, Intent::Reset);
    assert_eq!(response.state, DialogState::NeedDestination);
    assert_eq!(response.kind, ResponseKind::Success);
    assert!(response
        .suggestions
        .contains(&"Ich möchte nach Rom reisen".to_string()));

    let session = h.agent.session("u1").await.expect("session");
    assert_eq!(session.destination, None);
    assert_eq!(session.dates(), None);
    assert_eq!(session.budget, None);
    assert!(!session.ready_announced);
    assert_eq!(h.metrics.snapshot().resets_total, 1);
}

#[tokio::test]
async fn hotel_search_receives_session_context() {
    let h = harness();
    plan_paris(&h.agent, "u1").await;

    let response = h.agent.handle_turn("u1", "Hotels suchen").await;
    assert_eq!(response.kind, ResponseKind::HotelResults);
    assert_eq!(response.payload["total"], 2);
    assert_eq!(response.payload["offers"][0]["name"], "Generator Paris");

    let query = h.hotels.queries.lock()[0].clone();
    assert_eq!(query.location, "Paris");
    assert_eq!(query.check_in, NaiveDate::from_ymd_opt(2030, 7, 15));
    assert_eq!(query.check_out, NaiveDate::from_ymd_opt(2030, 7, 22));
    assert_eq!(query.budget, Some(500));
    assert_eq!(query.guests, 1);
}

#[tokio::test]
async fn advice_uses_local_recommendations_by_default() {
    let local = harness();
    let response = local
        .agent
        .handle_turn("u1", "Was kann ich in Paris unternehmen?")
        .await;
    assert_eq!(response.intent, Intent::AskAdvice);
    assert_eq!(response.kind, ResponseKind::Success);
    assert_eq!(response.payload["model"], "local");
    assert!(response.message.contains("Eiffelturm"));
    assert_eq!(local.metrics.snapshot().adapter_calls_total, 1);

    let session = local.agent.session("u1").await.expect("session");
    assert_eq!(session.destination, None);
}

#[tokio::test]
async fn advice_goes_to_the_configured_advisor() {
    let with = harness_with(Arc::new(EchoAdvisor));
    plan_paris(&with.agent, "u1").await;
    let response = with.agent.handle_turn("u1", "Hast du Tipps?").await;
    assert_eq!(response.kind, ResponseKind::Success);
    assert!(response.message.starts_with("Tipp für Reiseziel: Paris"));
    assert_eq!(response.payload["model"], "echo");
}

#[tokio::test]
async fn blank_user_ids_still_get_a_reply() {
    let h = harness();
    let response = h.agent.handle_turn("   ", "Hallo").await;
    assert_eq!(response.intent, Intent::Greet);
    assert_eq!(h.agent.session_count().await.expect("count"), 1);
}

#[tokio::test]
async fn users_are_isolated_under_concurrency() {
    let h = harness();
    let mut tasks = Vec::new();
    for (index, city) in ["Paris", "Rom", "London", "Berlin"].into_iter().enumerate() {
        let agent = h.agent.clone();
        tasks.push(tokio::spawn(async move {
            let user = format!("user-{index}");
            agent
                .handle_turn(&user, &format!("Ich möchte nach {city} reisen"))
                .await;
            agent.handle_turn(&user, "01.08.2030 bis 05.08.2030").await;
            (user, city)
        }));
    }

    for task in tasks {
        let (user, city) = task.await.expect("task");
        let session = h.agent.session(&user).await.expect("session");
        assert_eq!(session.destination.as_deref(), Some(city));
        assert_eq!(session.state(), DialogState::NeedBudget);
    }
}

#[tokio::test]
async fn concurrent_turns_of_one_user_both_apply() {
    let h = harness();
    let first = {
        let agent = h.agent.clone();
        tokio::spawn(async move { agent.handle_turn("u1", "Ich möchte nach Rom reisen").await })
    };
    let second = {
        let agent = h.agent.clone();
        tokio::spawn(async move { agent.handle_turn("u1", "Mein Budget ist 700 Euro").await })
    };
    first.await.expect("first turn");
    second.await.expect("second turn");

    let session = h.agent.session("u1").await.expect("session");
    assert_eq!(session.destination.as_deref(), Some("Rom"));
    assert_eq!(session.budget, Some(700));
    assert_eq!(session.state(), DialogState::NeedDates);
}
