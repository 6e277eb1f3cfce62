use chrono::{Duration, NaiveDate};
use serde_json::json;
use url::Url;

use crate::dialog::{DateIssue, SideQueryKind};
use crate::models::{
    Advice, DialogResponse, FlightOffer, FlightQuery, HotelOffer, HotelQuery, Intent,
    ResponseKind, Session, Slot, WeatherReport,
};

const MAX_OFFERS: usize = 5;
const DATE_FORMAT: &str = "%d.%m.%Y";

pub fn format_date(date: NaiveDate) -> String {
    date.format(DATE_FORMAT).to_string()
}

pub fn format_range(start: NaiveDate, end: NaiveDate) -> String {
    format!("{} bis {}", format_date(start), format_date(end))
}

pub fn destination_suggestions() -> Vec<String> {
    ["Ich möchte nach Rom reisen", "Paris", "London", "Berlin", "München"]
        .into_iter()
        .map(str::to_string)
        .collect()
}

/// Three week-long trips starting 30, 60 and 90 days from `today`.
pub fn date_suggestions(today: NaiveDate) -> Vec<String> {
    [30, 60, 90]
        .into_iter()
        .map(|offset| {
            let start = today + Duration::days(offset);
            format_range(start, start + Duration::days(7))
        })
        .collect()
}

pub fn budget_suggestions() -> Vec<String> {
    ["300€", "500€", "1000€", "2000€"]
        .into_iter()
        .map(str::to_string)
        .collect()
}

pub fn ready_suggestions(destination: &str) -> Vec<String> {
    vec![
        format!("Wie ist das Wetter in {destination}?"),
        format!("Flüge nach {destination} suchen"),
        format!("Hotels in {destination} finden"),
        "Reiseplan erstellen".to_string(),
        "Alles zurücksetzen".to_string(),
    ]
}

fn slot_prompt(slot: Slot, today: NaiveDate) -> (String, Vec<String>) {
    match slot {
        Slot::Destination => ("Wohin möchten Sie reisen?".to_string(), destination_suggestions()),
        Slot::Dates => {
            let suggestions = date_suggestions(today);
            let example = suggestions.first().cloned().unwrap_or_default();
            (
                format!("Wann möchten Sie reisen? (z.B. {example})"),
                suggestions,
            )
        }
        Slot::Budget => (
            "Was ist Ihr Budget? (z.B. 500€)".to_string(),
            budget_suggestions(),
        ),
    }
}

/// Prompt for the pending slot, or the ready menu once every slot is set.
fn next_step(session: &Session, today: NaiveDate) -> (String, Vec<String>) {
    match (session.state().pending_slot(), session.destination.as_deref()) {
        (Some(slot), _) => slot_prompt(slot, today),
        (None, destination) => (
            "Ihre Reiseplanung ist vollständig. Was möchten Sie als Nächstes tun?".to_string(),
            ready_suggestions(destination.unwrap_or_default()),
        ),
    }
}

fn slot_value(session: &Session, slot: Slot) -> Option<String> {
    match slot {
        Slot::Destination => session.destination.clone(),
        Slot::Dates => session.dates().map(|(start, end)| format_range(start, end)),
        Slot::Budget => session.budget.map(|budget| format!("{budget}€")),
    }
}

fn slot_label(slot: Slot) -> &'static str {
    match slot {
        Slot::Destination => "Ihr Reiseziel",
        Slot::Dates => "Ihr Reisezeitraum",
        Slot::Budget => "Ihr Budget",
    }
}

/// One-line summary of the slots handed to the advisory model.
pub fn session_context(session: &Session) -> String {
    let open = || "noch offen".to_string();
    format!(
        "Reiseziel: {}; Zeitraum: {}; Budget: {}",
        slot_value(session, Slot::Destination).unwrap_or_else(open),
        slot_value(session, Slot::Dates).unwrap_or_else(open),
        slot_value(session, Slot::Budget).unwrap_or_else(open),
    )
}

pub fn slot_confirmation(session: &Session, slot: Slot, replaced: bool) -> String {
    let value = slot_value(session, slot).unwrap_or_default();
    match (slot, replaced) {
        (_, true) => format!("Alles klar! {} wurde auf {value} geändert.", slot_label(slot)),
        (Slot::Destination, false) => format!("Perfekt! {value} ist ein tolles Reiseziel!"),
        (Slot::Dates, false) => format!("Verstanden! Reisezeitraum: {value}."),
        (Slot::Budget, false) => format!("Verstanden! Budget: {value}."),
    }
}

pub fn prompt_after_fill(confirmation: &str, next: Slot, today: NaiveDate) -> DialogResponse {
    let (prompt, suggestions) = slot_prompt(next, today);
    DialogResponse::new(
        ResponseKind::Success,
        format!("{confirmation} {prompt}"),
        suggestions,
    )
}

pub fn ready_summary(session: &Session, confirmation: &str) -> DialogResponse {
    let destination = session.destination.clone().unwrap_or_default();
    let mut lines = vec![
        confirmation.to_string(),
        String::new(),
        "Alle Informationen sind vollständig!".to_string(),
        format!("• Reiseziel: {destination}"),
    ];
    if let Some((start, end)) = session.dates() {
        lines.push(format!(
            "• Zeitraum: {} ({} Nächte)",
            format_range(start, end),
            (end - start).num_days()
        ));
    }
    if let Some(budget) = session.budget {
        lines.push(format!("• Budget: {budget}€"));
    }
    lines.push(String::new());
    lines.push("Was möchten Sie als Nächstes tun?".to_string());

    DialogResponse::new(
        ResponseKind::Success,
        lines.join("\n"),
        ready_suggestions(&destination),
    )
    .with_payload(trip_payload(session))
}

pub fn ready_confirmation(session: &Session, confirmation: &str) -> DialogResponse {
    DialogResponse::new(
        ResponseKind::Success,
        format!("{confirmation} Ihre Reiseplanung bleibt vollständig."),
        ready_suggestions(session.destination.as_deref().unwrap_or_default()),
    )
    .with_payload(trip_payload(session))
}

pub fn already_known(session: &Session, slot: Slot, today: NaiveDate) -> DialogResponse {
    let value = slot_value(session, slot).unwrap_or_default();
    let (prompt, suggestions) = next_step(session, today);
    DialogResponse::new(
        ResponseKind::Plain,
        format!("{} ist bereits {value}. {prompt}", slot_label(slot)),
        suggestions,
    )
}

/// A bare value arrived for a slot that is already set.
pub fn implicit_change_refused(session: &Session, slot: Slot, attempted: &str) -> DialogResponse {
    let current = slot_value(session, slot).unwrap_or_default();
    let (hint, phrase) = match slot {
        Slot::Destination => (
            format!("Wenn Sie stattdessen nach {attempted} reisen möchten, sagen Sie es bitte ausdrücklich."),
            format!("Ich möchte nach {attempted} reisen"),
        ),
        Slot::Dates => (
            "Wenn Sie den Zeitraum ändern möchten, nennen Sie bitte den neuen Zeitraum.".to_string(),
            attempted.to_string(),
        ),
        Slot::Budget => (
            format!("Wenn Sie Ihr Budget auf {attempted}€ ändern möchten, sagen Sie es bitte ausdrücklich."),
            format!("Mein Budget ist {attempted}€"),
        ),
    };

    let mut suggestions = vec![phrase];
    if let Some(destination) = session.destination.as_deref() {
        if session.state().pending_slot().is_none() {
            suggestions.extend(ready_suggestions(destination).into_iter().take(3));
        }
    }

    DialogResponse::new(
        ResponseKind::Plain,
        format!("{} ist bereits {current}. {hint}", slot_label(slot)),
        suggestions,
    )
}

pub fn clarify(session: &Session, today: NaiveDate) -> DialogResponse {
    let (prompt, suggestions) = match session.state().pending_slot() {
        Some(slot) => slot_prompt(slot, today),
        None => (
            "Sie können nach Wetter, Flügen oder Hotels fragen oder einen Reiseplan erstellen."
                .to_string(),
            ready_suggestions(session.destination.as_deref().unwrap_or_default()),
        ),
    };
    DialogResponse::new(
        ResponseKind::Plain,
        format!("Das habe ich leider nicht verstanden. {prompt}"),
        suggestions,
    )
}

pub fn invalid_dates(issue: DateIssue, today: NaiveDate) -> DialogResponse {
    let message = match issue {
        DateIssue::Malformed => {
            "Das Datum konnte ich leider nicht verstehen. Bitte nennen Sie den Zeitraum im Format TT.MM.JJJJ bis TT.MM.JJJJ."
        }
        DateIssue::EndBeforeStart => {
            "Das Enddatum liegt vor dem Startdatum. Bitte nennen Sie den Zeitraum noch einmal."
        }
        DateIssue::InPast => {
            "Dieser Zeitraum liegt in der Vergangenheit. Bitte wählen Sie Daten in der Zukunft."
        }
    };
    DialogResponse::new(ResponseKind::Plain, message, date_suggestions(today))
}

pub fn invalid_budget() -> DialogResponse {
    DialogResponse::new(
        ResponseKind::Plain,
        "Bitte nennen Sie ein gültiges Budget größer als 0 (z.B. 500€).",
        budget_suggestions(),
    )
}

pub fn reset_reply() -> DialogResponse {
    DialogResponse::new(
        ResponseKind::Success,
        "Perfekt! Lassen Sie uns eine neue Reise planen! Wohin möchten Sie reisen?",
        destination_suggestions(),
    )
}

pub fn greeting(session: &Session, today: NaiveDate) -> DialogResponse {
    match session.destination.as_deref() {
        None => DialogResponse::new(
            ResponseKind::Success,
            "Hallo! Ich bin Ihr Reiseassistent und helfe Ihnen bei der Planung. Wohin möchten Sie reisen?",
            destination_suggestions(),
        ),
        Some(destination) => {
            let (prompt, mut suggestions) = next_step(session, today);
            suggestions.insert(0, "Aktuelle Reise fortsetzen".to_string());
            suggestions.push("Neue Reise planen".to_string());
            suggestions.dedup();
            DialogResponse::new(
                ResponseKind::Success,
                format!("Willkommen zurück! Sie planen eine Reise nach {destination}. {prompt}"),
                suggestions,
            )
        }
    }
}

pub fn goodbye() -> DialogResponse {
    DialogResponse::new(
        ResponseKind::Plain,
        "Auf Wiedersehen! Ich wünsche Ihnen eine wunderbare Reise!",
        vec!["Neue Reise planen".to_string()],
    )
}

pub fn continue_trip(session: &Session, today: NaiveDate) -> DialogResponse {
    let (prompt, suggestions) = next_step(session, today);
    let message = match session.destination.as_deref() {
        Some(destination) => {
            format!("Gerne, wir machen mit Ihrer Reise nach {destination} weiter. {prompt}")
        }
        None => format!("Es gibt noch keine laufende Reiseplanung. {prompt}"),
    };
    DialogResponse::new(ResponseKind::Plain, message, suggestions)
}

pub fn missing_destination() -> DialogResponse {
    DialogResponse::new(
        ResponseKind::Plain,
        "Für einen Reiseplan brauche ich zuerst ein Reiseziel. Wohin möchten Sie reisen?",
        destination_suggestions(),
    )
}

pub fn missing_location(intent: Intent) -> DialogResponse {
    let (message, template) = match intent {
        Intent::AskFlight => ("Wohin möchten Sie fliegen?", "Flüge nach {}"),
        Intent::AskHotel => ("In welcher Stadt suchen Sie ein Hotel?", "Hotels in {}"),
        _ => ("Für welchen Ort möchten Sie das Wetter wissen?", "Wetter in {}"),
    };
    let suggestions = ["Paris", "Rom", "London"]
        .into_iter()
        .map(|city| template.replace("{}", city))
        .collect();
    DialogResponse::new(ResponseKind::Plain, message, suggestions)
}

pub fn trip_plan(session: &Session) -> DialogResponse {
    let destination = session.destination.clone().unwrap_or_default();
    let open = || "noch offen".to_string();
    let mut lines = vec![
        format!("Reiseplan für {destination}"),
        format!(
            "• Zeitraum: {}",
            slot_value(session, Slot::Dates).unwrap_or_else(open)
        ),
        format!(
            "• Budget: {}",
            slot_value(session, Slot::Budget).unwrap_or_else(open)
        ),
        String::new(),
        "Nächste Schritte:".to_string(),
        "1. Flüge vergleichen und buchen".to_string(),
        "2. Unterkunft reservieren".to_string(),
        "3. Wetter kurz vor der Abreise prüfen".to_string(),
    ];
    if let (Some(budget), Some((start, end))) = (session.budget, session.dates()) {
        let nights = (end - start).num_days().max(1);
        lines.push(format!(
            "Tipp: Bei {budget}€ stehen Ihnen etwa {}€ pro Nacht zur Verfügung.",
            i64::from(budget) / nights
        ));
    }

    DialogResponse::new(
        ResponseKind::Success,
        lines.join("\n"),
        ready_suggestions(&destination),
    )
    .with_payload(trip_payload(session))
}

fn trip_payload(session: &Session) -> serde_json::Value {
    json!({
        "destination": session.destination,
        "start_date": session.start_date.map(format_date),
        "end_date": session.end_date.map(format_date),
        "budget": session.budget,
    })
}

fn location_suggestions(location: &str, skip: SideQueryKind) -> Vec<String> {
    [
        (SideQueryKind::Weather, format!("Wie ist das Wetter in {location}?")),
        (SideQueryKind::Flights, format!("Flüge nach {location} suchen")),
        (SideQueryKind::Hotels, format!("Hotels in {location} finden")),
    ]
    .into_iter()
    .filter(|(kind, _)| *kind != skip)
    .map(|(_, text)| text)
    .collect()
}

pub fn weather_reply(report: &WeatherReport) -> DialogResponse {
    let mut message = format!(
        "Wetter in {}: {}°C, {}\nGefühlt: {}°C · Luftfeuchtigkeit: {}% · Wind: {:.0} km/h · Sicht: {:.0} km",
        report.location,
        report.temperature_c,
        report.description,
        report.feels_like_c,
        report.humidity,
        report.wind_kmh,
        report.visibility_km,
    );
    if let Some(forecast) = &report.forecast {
        message.push_str(&format!(
            "\nVorhersage für {}: {}°C, {}",
            format_date(forecast.date),
            forecast.temperature_c,
            forecast.description
        ));
    }
    if report.simulated {
        message.push_str("\n(Simulierte Wetterdaten, kein Wetterdienst konfiguriert)");
    }

    DialogResponse::new(
        ResponseKind::WeatherInfo,
        message,
        location_suggestions(&report.location, SideQueryKind::Weather),
    )
    .with_payload(json!({ "weather": report }))
}

fn google_travel_link(path: &str, query: String) -> Option<String> {
    Url::parse_with_params(&format!("https://www.google.com/travel/{path}"), &[("q", query)])
        .ok()
        .map(String::from)
}

fn format_duration(hours: f64) -> String {
    let minutes = (hours * 60.0).round().max(0.0) as u64;
    format!("{}h {:02}min", minutes / 60, minutes % 60)
}

fn format_stops(stops: u8) -> String {
    match stops {
        0 => "Direktflug".to_string(),
        1 => "1 Stopp".to_string(),
        n => format!("{n} Stopps"),
    }
}

fn cheapest<T: Clone>(offers: &[T], price: impl Fn(&T) -> f64) -> Vec<T> {
    let mut sorted = offers.to_vec();
    sorted.sort_by(|a, b| price(a).total_cmp(&price(b)));
    sorted.truncate(MAX_OFFERS);
    sorted
}

pub fn flights_reply(query: &FlightQuery, offers: &[FlightOffer]) -> DialogResponse {
    let link = google_travel_link(
        "flights",
        format!("Flüge von {} nach {}", query.origin, query.destination),
    );
    let suggestions = location_suggestions(&query.destination, SideQueryKind::Flights);

    if offers.is_empty() {
        let mut message = format!(
            "Keine Flüge gefunden. ({} → {})",
            query.origin, query.destination
        );
        if let Some(link) = &link {
            message.push_str(&format!("\nWeitere Suche: {link}"));
        }
        return DialogResponse::new(ResponseKind::FlightResults, message, suggestions)
            .with_payload(json!({ "query": query, "offers": [], "total": 0, "source_url": link }));
    }

    let top = cheapest(offers, |offer| offer.price_eur);
    let mut lines = vec![format!(
        "Flüge von {} nach {}: {} gefunden (sortiert nach Preis)",
        query.origin,
        query.destination,
        offers.len()
    )];
    if let Some((start, end)) = query.start_date.zip(query.end_date) {
        lines.push(format!("Zeitraum: {}", format_range(start, end)));
    }
    for (index, offer) in top.iter().enumerate() {
        let over_budget = query
            .budget
            .map(|budget| offer.price_eur > f64::from(budget))
            .unwrap_or(false);
        lines.push(format!(
            "{}. {} · {:.0} EUR{}",
            index + 1,
            offer.airline,
            offer.price_eur,
            if over_budget { " (über Budget)" } else { "" }
        ));
        let mut details = vec![
            format!("Dauer: {}", format_duration(offer.duration_hours)),
            format_stops(offer.stops),
        ];
        if !offer.departure_time.is_empty() {
            details.insert(0, format!("Abflug: {}", offer.departure_time));
        }
        lines.push(format!("   {}", details.join(" · ")));
    }
    if let Some(link) = &link {
        lines.push(format!("Quelle: {link}"));
    }

    DialogResponse::new(ResponseKind::FlightResults, lines.join("\n"), suggestions).with_payload(
        json!({ "query": query, "offers": top, "total": offers.len(), "source_url": link }),
    )
}

pub fn hotels_reply(query: &HotelQuery, offers: &[HotelOffer]) -> DialogResponse {
    let link = google_travel_link("hotels", format!("Hotels in {}", query.location));
    let suggestions = location_suggestions(&query.location, SideQueryKind::Hotels);

    if offers.is_empty() {
        let mut message = format!("Keine Hotels in {} gefunden.", query.location);
        if let Some(link) = &link {
            message.push_str(&format!("\nWeitere Suche: {link}"));
        }
        return DialogResponse::new(ResponseKind::HotelResults, message, suggestions)
            .with_payload(json!({ "query": query, "offers": [], "total": 0, "source_url": link }));
    }

    let nights = query
        .check_in
        .zip(query.check_out)
        .map(|(start, end)| (end - start).num_days().max(1));
    let top = cheapest(offers, |offer| offer.price_per_night_eur);
    let mut lines = vec![format!(
        "Hotels in {}: {} gefunden (sortiert nach Preis)",
        query.location,
        offers.len()
    )];
    for (index, offer) in top.iter().enumerate() {
        let mut line = format!(
            "{}. {} · {:.0} EUR/Nacht",
            index + 1,
            offer.name,
            offer.price_per_night_eur
        );
        if let Some(nights) = nights {
            let total = offer.price_per_night_eur * nights as f64;
            line.push_str(&format!(" · {total:.0} EUR für {nights} Nächte"));
            if query.budget.map(|budget| total > f64::from(budget)).unwrap_or(false) {
                line.push_str(" (über Budget)");
            }
        }
        lines.push(line);

        let mut details = Vec::new();
        if let Some(rating) = offer.rating {
            details.push(format!("Bewertung: {rating:.1}"));
        }
        if let Some(address) = &offer.address {
            details.push(address.clone());
        }
        if !offer.amenities.is_empty() {
            details.push(offer.amenities.join(", "));
        }
        if !details.is_empty() {
            lines.push(format!("   {}", details.join(" · ")));
        }
    }
    if let Some(link) = &link {
        lines.push(format!("Quelle: {link}"));
    }

    DialogResponse::new(ResponseKind::HotelResults, lines.join("\n"), suggestions).with_payload(
        json!({ "query": query, "offers": top, "total": offers.len(), "source_url": link }),
    )
}

pub fn advice_reply(session: &Session, advice: &Advice) -> DialogResponse {
    let suggestions = match session.destination.as_deref() {
        Some(destination) => ready_suggestions(destination),
        None => destination_suggestions(),
    };
    DialogResponse::new(ResponseKind::Success, advice.text.trim(), suggestions)
        .with_payload(json!({ "model": advice.model }))
}

pub fn unknown_location(location: &str) -> DialogResponse {
    DialogResponse::new(
        ResponseKind::Error,
        format!("Entschuldigung, den Ort \"{location}\" konnte ich leider nicht finden. Bitte prüfen Sie die Schreibweise."),
        ["Paris", "Rom", "London"]
            .into_iter()
            .map(|city| format!("Wetter in {city}"))
            .collect(),
    )
}

pub fn side_query_failure(kind: SideQueryKind) -> DialogResponse {
    let message = match kind {
        SideQueryKind::Weather => "Entschuldigung, beim Abrufen der Wetterdaten ist ein Fehler aufgetreten.",
        SideQueryKind::Flights => "Entschuldigung, bei der Flugsuche ist ein Fehler aufgetreten.",
        SideQueryKind::Hotels => "Entschuldigung, bei der Hotelsuche ist ein Fehler aufgetreten.",
        SideQueryKind::Advice => "Entschuldigung, bei der Empfehlung ist ein Fehler aufgetreten.",
    };
    DialogResponse::new(
        ResponseKind::Error,
        message,
        vec!["Reiseplan erstellen".to_string(), "Alles zurücksetzen".to_string()],
    )
}

pub fn internal_error() -> DialogResponse {
    DialogResponse::new(
        ResponseKind::Error,
        "Entschuldigung, es ist ein unerwarteter Fehler aufgetreten. Bitte versuchen Sie es erneut.",
        vec!["Alles zurücksetzen".to_string()],
    )
}
