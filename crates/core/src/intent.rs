use once_cell::sync::Lazy;
use regex::Regex;

use crate::models::{
    Classification, Entities, Intent, ENTITY_BUDGET, ENTITY_CITY, ENTITY_END_DATE,
    ENTITY_START_DATE,
};

const CITY: &str = r"(\p{L}[\p{L}'\-]*(?:\s+\p{L}[\p{L}'\-]*){0,3})";
const BARE_CITY: &str = r"^\s*(\p{L}[\p{L}'\-]*(?:\s+\p{L}[\p{L}'\-]*){0,2})\s*[.!?]?\s*$";
const DATE: &str = r"(\d{1,2}\.\d{1,2}\.(?:\d{4})?|\d{1,2}\.\d{1,2})";

/// A location capture ends at the first of these words.
const LOCATION_STOP_WORDS: &[&str] = &[
    "suchen", "finden", "buchen", "reisen", "fliegen", "fahren", "gehen", "sein", "bleiben",
    "abfragen", "anzeigen", "zeigen", "planen", "machen", "unternehmen", "besuchen", "heute",
    "morgen", "jetzt", "bitte", "aus", "im", "am", "um", "ab", "vom", "bis", "und", "mit",
    "von", "für", "in", "nach", "zu", "über", "unter", "während", "ist", "sind", "wird",
    "hause",
];

/// Words that are never a destination when typed on their own.
const BARE_STOP_WORDS: &[&str] = &[
    "ja", "nein", "ok", "okay", "hilfe", "help", "was", "wie", "wo", "wann", "warum", "wer",
    "ich", "du", "sie", "wir", "es", "das", "der", "die", "und", "oder", "nicht", "gut", "super",
    "toll", "egal", "weiter", "vielleicht", "keine", "ahnung", "test", "alles", "klar", "vielen",
    "dank", "genau", "perfekt",
];

static LOCATION_IN: Lazy<Regex> = Lazy::new(|| {
    Regex::new(&format!(r"(?i)\b(?:in|für|fuer|von|at)\s+{CITY}")).expect("valid location regex")
});
static LOCATION_TO: Lazy<Regex> = Lazy::new(|| {
    Regex::new(&format!(r"(?i)\b(?:nach|zu|to)\s+{CITY}")).expect("valid location regex")
});
static LOCATION_NEAR: Lazy<Regex> = Lazy::new(|| {
    Regex::new(&format!(r"(?i)\b(?:in|für|fuer|nahe|bei)\s+{CITY}")).expect("valid location regex")
});
static WEATHER_KEYWORD_CITY: Lazy<Regex> = Lazy::new(|| {
    Regex::new(&format!(r"(?i)\b(?:wetter|temperatur)\s+{CITY}")).expect("valid weather regex")
});
static DESTINATION_NACH: Lazy<Regex> = Lazy::new(|| {
    Regex::new(&format!(r"(?i)\bnach\s+{CITY}")).expect("valid destination regex")
});
/// `zu` only introduces a destination when a capitalized name follows.
static DESTINATION_ZU: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?i)\bzu\s+((?-i:\p{Lu})[\p{L}'\-]*(?:\s+\p{L}[\p{L}'\-]*){0,3})")
        .expect("valid destination regex")
});
static DESTINATION_TRIP_IN: Lazy<Regex> = Lazy::new(|| {
    Regex::new(&format!(
        r"(?i)\b(?:urlaub|reise|reisen|ferien|fahren)\s+(?:in|auf)\s+{CITY}"
    ))
    .expect("valid destination regex")
});
static DESTINATION_GOAL: Lazy<Regex> = Lazy::new(|| {
    Regex::new(&format!(r"(?i)\b(?:reiseziel|ziel)(?:\s+ist)?:?\s+{CITY}"))
        .expect("valid destination regex")
});
static DATE_RANGE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(&format!(r"(?i){DATE}\s*(?:bis(?:\s+zum)?|-|–)\s*{DATE}"))
        .expect("valid date range regex")
});
static BUDGET_AMOUNT: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?i)\b(\d+)\s*(?:€|euro\b|eur\b)").expect("valid budget regex")
});
static BUDGET_KEYWORD: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?i)\b(?:budget|preis|kosten|maximal|max)\b\D{0,20}?(\d+)")
        .expect("valid budget regex")
});
static BARE_NUMBER: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^\s*(\d+)\s*$").expect("valid number regex"));
static BARE_CITY_NAME: Lazy<Regex> =
    Lazy::new(|| Regex::new(BARE_CITY).expect("valid bare city regex"));

/// One entry of the ordered rule table.
pub struct IntentRule {
    pub id: &'static str,
    pub intent: Intent,
    pub explicit: bool,
    /// The rule is skipped when its extractor cannot produce this entity.
    pub required_entity: Option<&'static str>,
    /// Utterances this rule is meant to catch.
    pub samples: &'static [&'static str],
    pattern: Regex,
    extract: fn(&str) -> Entities,
}

impl IntentRule {
    fn new(
        id: &'static str,
        intent: Intent,
        explicit: bool,
        pattern: &str,
        extract: fn(&str) -> Entities,
    ) -> Self {
        Self {
            id,
            intent,
            explicit,
            required_entity: None,
            samples: &[],
            pattern: Regex::new(pattern).expect("valid intent rule regex"),
            extract,
        }
    }

    fn requires(mut self, entity: &'static str) -> Self {
        self.required_entity = Some(entity);
        self
    }

    fn samples(mut self, samples: &'static [&'static str]) -> Self {
        self.samples = samples;
        self
    }

    pub fn apply(&self, text: &str) -> Option<Classification> {
        if !self.pattern.is_match(text) {
            return None;
        }

        let entities = (self.extract)(text);
        if let Some(required) = self.required_entity {
            if !entities.contains_key(required) {
                return None;
            }
        }

        Some(Classification {
            intent: self.intent,
            entities,
            rule: self.id.to_string(),
            explicit: self.explicit,
        })
    }
}

static RULES: Lazy<Vec<IntentRule>> = Lazy::new(|| {
    vec![
        IntentRule::new(
            "reset",
            Intent::Reset,
            true,
            r"(?i)\b(?:alles zurücksetzen|zurücksetzen|neu starten|neustart|neue reise|von vorne beginnen|alles löschen|reset|start over|new trip)\b",
            no_entities,
        )
        .samples(&["Alles zurücksetzen", "Neue Reise planen"]),
        IntentRule::new(
            "weather",
            Intent::AskWeather,
            true,
            r"(?i)\b(?:wetter\w*|temperatur\w*|klima|regnet|sonnig|weather)\b",
            extract_weather_location,
        )
        .samples(&["Wie ist das Wetter in Berlin?", "Wetter abfragen"]),
        IntentRule::new(
            "flight",
            Intent::AskFlight,
            true,
            r"(?i)\b(?:flug|flüge|fluege|flügen|fliegen|flugticket\w*|flugpreis\w*|flugverbindung\w*|flight|flights)\b",
            extract_flight_location,
        )
        .samples(&["Flüge nach Mars suchen", "Flüge suchen"]),
        IntentRule::new(
            "hotel",
            Intent::AskHotel,
            true,
            r"(?i)\b(?:hotels?|unterkunft|unterkünfte|zimmer|übernachtung\w*)\b",
            extract_hotel_location,
        )
        .samples(&["Hotels in München finden", "Hotels suchen"]),
        IntentRule::new(
            "date_range",
            Intent::ProvideDates,
            true,
            DATE_RANGE.as_str(),
            extract_date_range,
        )
        .requires(ENTITY_START_DATE)
        .samples(&["15.07.2030 bis 22.07.2030", "vom 01.08. bis 08.08."]),
        IntentRule::new(
            "budget_amount",
            Intent::ProvideBudget,
            true,
            r"(?i)(?:\b\d+\s*(?:€|euro\b|eur\b)|\b(?:budget|preis|kosten|maximal|max)\b\D{0,20}?\d+)",
            extract_budget,
        )
        .requires(ENTITY_BUDGET)
        .samples(&["500€", "Mein Budget ist 800 Euro"]),
        IntentRule::new(
            "create_plan",
            Intent::CreatePlan,
            true,
            r"(?i)\b(?:reiseplan|plan erstellen|plan machen|planung erstellen|zusammenfassung|übersicht)\b",
            no_entities,
        )
        .samples(&["Reiseplan erstellen"]),
        IntentRule::new(
            "continue_trip",
            Intent::ContinueTrip,
            true,
            r"(?i)\b(?:fortsetzen|weitermachen|weiter planen|aktuelle reise)\b",
            no_entities,
        )
        .samples(&["Aktuelle Reise fortsetzen"]),
        IntentRule::new(
            "advice",
            Intent::AskAdvice,
            true,
            r"(?i)\b(?:empfehlung\w*|empfiehlst|empfehlen|vorschlag|vorschläge|tipps?|sollte ich|was kann ich)\b",
            extract_advice_location,
        )
        .samples(&["Was kann ich in Rom unternehmen?", "Hast du Tipps?"]),
        IntentRule::new(
            "destination",
            Intent::ProvideDestination,
            true,
            r"(?i)(?:\bnach\s+\p{L}|\bzu\s+(?-i:\p{Lu})|\b(?:urlaub|reise|reisen|ferien|fahren)\s+(?:in|auf)\s+\p{L}|\b(?:reiseziel|ziel)\b)",
            extract_destination,
        )
        .requires(ENTITY_CITY)
        .samples(&["Ich möchte nach Paris reisen", "Urlaub in Rom", "Reise zu Lissabon"]),
        IntentRule::new(
            "goodbye",
            Intent::Goodbye,
            true,
            r"(?i)\b(?:tschüss|tschüs|auf wiedersehen|bye|ciao|danke)\b",
            no_entities,
        )
        .samples(&["Tschüss", "Danke"]),
        IntentRule::new(
            "greet",
            Intent::Greet,
            true,
            r"(?i)\b(?:hallo|hi|hey|servus|moin|guten (?:tag|morgen|abend))\b",
            no_entities,
        )
        .samples(&["Hallo", "Guten Morgen"]),
        IntentRule::new(
            "bare_number_budget",
            Intent::ProvideBudget,
            false,
            BARE_NUMBER.as_str(),
            extract_budget,
        )
        .requires(ENTITY_BUDGET)
        .samples(&["500"]),
        // Lowest priority: a lone city name with no other signal.
        IntentRule::new(
            "bare_city_destination",
            Intent::ProvideDestination,
            false,
            BARE_CITY,
            extract_bare_city,
        )
        .requires(ENTITY_CITY)
        .samples(&["Paris", "New York"]),
    ]
});

/// The rule table in priority order.
pub fn rules() -> &'static [IntentRule] {
    RULES.as_slice()
}

pub fn normalize_text(input: &str) -> String {
    input
        .split_whitespace()
        .collect::<Vec<_>>()
        .join(" ")
        .trim()
        .to_string()
}

/// First matching rule wins; anything else is `Intent::Unknown`.
pub fn classify(utterance: &str) -> Classification {
    let text = normalize_text(utterance);
    if text.is_empty() {
        return Classification::unknown();
    }

    rules()
        .iter()
        .find_map(|rule| rule.apply(&text))
        .unwrap_or_else(Classification::unknown)
}

/// `"new york"` -> `"New York"`, `"baden-baden"` -> `"Baden-Baden"`.
pub fn title_case(value: &str) -> String {
    value
        .split_whitespace()
        .map(|word| {
            word.split('-')
                .map(capitalize)
                .collect::<Vec<_>>()
                .join("-")
        })
        .collect::<Vec<_>>()
        .join(" ")
}

fn capitalize(part: &str) -> String {
    let mut chars = part.chars();
    match chars.next() {
        Some(first) => first
            .to_uppercase()
            .chain(chars.flat_map(char::to_lowercase))
            .collect(),
        None => String::new(),
    }
}

fn clean_location(raw: &str) -> Option<String> {
    let kept = raw
        .split_whitespace()
        .take_while(|word| !LOCATION_STOP_WORDS.contains(&word.to_lowercase().as_str()))
        .collect::<Vec<_>>();

    if kept.is_empty() {
        None
    } else {
        Some(title_case(&kept.join(" ")))
    }
}

fn first_location(text: &str, patterns: &[&Regex]) -> Option<String> {
    patterns.iter().find_map(|pattern| {
        pattern
            .captures_iter(text)
            .filter_map(|caps| caps.get(1))
            .find_map(|m| clean_location(m.as_str()))
    })
}

fn with_city(city: Option<String>) -> Entities {
    let mut entities = Entities::new();
    if let Some(city) = city {
        entities.insert(ENTITY_CITY.to_string(), city);
    }
    entities
}

fn no_entities(_text: &str) -> Entities {
    Entities::new()
}

fn extract_weather_location(text: &str) -> Entities {
    with_city(first_location(text, &[&*LOCATION_IN, &*WEATHER_KEYWORD_CITY]))
}

fn extract_flight_location(text: &str) -> Entities {
    with_city(first_location(text, &[&*LOCATION_TO]))
}

fn extract_hotel_location(text: &str) -> Entities {
    with_city(first_location(text, &[&*LOCATION_NEAR]))
}

fn extract_advice_location(text: &str) -> Entities {
    with_city(first_location(text, &[&*LOCATION_IN, &*LOCATION_TO]))
}

fn extract_destination(text: &str) -> Entities {
    with_city(first_location(
        text,
        &[
            &*DESTINATION_NACH,
            &*DESTINATION_ZU,
            &*DESTINATION_TRIP_IN,
            &*DESTINATION_GOAL,
        ],
    ))
}

fn extract_bare_city(text: &str) -> Entities {
    let Some(raw) = BARE_CITY_NAME
        .captures(text)
        .and_then(|caps| caps.get(1))
        .map(|m| m.as_str())
    else {
        return Entities::new();
    };

    let rejected = raw.split_whitespace().any(|word| {
        let lower = word.to_lowercase();
        BARE_STOP_WORDS.contains(&lower.as_str()) || LOCATION_STOP_WORDS.contains(&lower.as_str())
    });

    if rejected {
        Entities::new()
    } else {
        with_city(Some(title_case(raw)))
    }
}

fn extract_date_range(text: &str) -> Entities {
    let mut entities = Entities::new();
    if let Some(caps) = DATE_RANGE.captures(text) {
        if let (Some(start), Some(end)) = (caps.get(1), caps.get(2)) {
            entities.insert(
                ENTITY_START_DATE.to_string(),
                start.as_str().trim_end_matches('.').to_string(),
            );
            entities.insert(
                ENTITY_END_DATE.to_string(),
                end.as_str().trim_end_matches('.').to_string(),
            );
        }
    }
    entities
}

fn extract_budget(text: &str) -> Entities {
    let mut entities = Entities::new();
    let amount = [&*BUDGET_AMOUNT, &*BUDGET_KEYWORD, &*BARE_NUMBER]
        .iter()
        .find_map(|pattern| pattern.captures(text).and_then(|caps| caps.get(1)));

    if let Some(amount) = amount {
        entities.insert(ENTITY_BUDGET.to_string(), amount.as_str().to_string());
    }
    entities
}
