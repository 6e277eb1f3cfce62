use async_trait::async_trait;
use chrono::NaiveDate;
use tracing::debug;
use travelguide_core::{Advice, AdviceRequest};

use crate::{AdvisoryProvider, ProviderError};
use Season::{Autumn, Spring, Summer};

pub const MODEL: &str = "local";

const DEFAULT_NIGHTS: u32 = 7;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Season {
    Winter,
    Spring,
    Summer,
    Autumn,
}

impl Season {
    pub fn from_month(month: u32) -> Self {
        match month {
            12 | 1 | 2 => Self::Winter,
            3..=5 => Self::Spring,
            6..=8 => Self::Summer,
            _ => Self::Autumn,
        }
    }

    fn label(self) -> &'static str {
        match self {
            Self::Winter => "Winter",
            Self::Spring => "Frühling",
            Self::Summer => "Sommer",
            Self::Autumn => "Herbst",
        }
    }

    fn tips(self) -> &'static [&'static str] {
        match self {
            Self::Winter => &["Skifahren", "Weihnachtsmärkte", "Thermalbäder", "Winterwanderungen"],
            Self::Spring => &["Blütenfeste", "Frühlingswanderungen", "Gartenbesuche", "Outdoor-Aktivitäten"],
            Self::Summer => &["Strandurlaub", "Wassersport", "Festivals", "Sommeraktivitäten"],
            Self::Autumn => &["Weinlese", "Herbstwanderungen", "Kulturfestivals", "Gemütlichkeit"],
        }
    }
}

struct Destination {
    name: &'static str,
    country: &'static str,
    aliases: &'static [&'static str],
    best_seasons: &'static [Season],
    activities: &'static [&'static str],
    hotel_per_night: u32,
    flight: u32,
    daily: u32,
}

static CATALOG: &[Destination] = &[
    Destination {
        name: "Paris",
        country: "Frankreich",
        aliases: &["paris"],
        best_seasons: &[Spring, Autumn],
        activities: &["Eiffelturm", "Louvre", "Seine-Fahrt"],
        hotel_per_night: 150,
        flight: 200,
        daily: 120,
    },
    Destination {
        name: "London",
        country: "Großbritannien",
        aliases: &["london"],
        best_seasons: &[Spring, Summer],
        activities: &["Tower Bridge", "British Museum", "West End Shows"],
        hotel_per_night: 180,
        flight: 180,
        daily: 140,
    },
    Destination {
        name: "Rom",
        country: "Italien",
        aliases: &["rom", "rome", "roma"],
        best_seasons: &[Spring, Autumn],
        activities: &["Kolosseum", "Vatikan", "Trevi-Brunnen"],
        hotel_per_night: 130,
        flight: 160,
        daily: 100,
    },
    Destination {
        name: "Barcelona",
        country: "Spanien",
        aliases: &["barcelona"],
        best_seasons: &[Spring, Autumn],
        activities: &["Sagrada Família", "Park Güell", "Tapas in der Altstadt"],
        hotel_per_night: 120,
        flight: 150,
        daily: 90,
    },
    Destination {
        name: "Amsterdam",
        country: "Niederlande",
        aliases: &["amsterdam"],
        best_seasons: &[Spring, Summer],
        activities: &["Van Gogh Museum", "Grachtenfahrt", "Anne Frank Haus"],
        hotel_per_night: 140,
        flight: 140,
        daily: 110,
    },
    Destination {
        name: "Berlin",
        country: "Deutschland",
        aliases: &["berlin"],
        best_seasons: &[Spring, Summer, Autumn],
        activities: &["Brandenburger Tor", "Reichstag", "Kreuzberg"],
        hotel_per_night: 100,
        flight: 120,
        daily: 80,
    },
    Destination {
        name: "Prag",
        country: "Tschechien",
        aliases: &["prag", "prague", "praha"],
        best_seasons: &[Spring, Autumn],
        activities: &["Karlsbrücke", "Prager Burg", "Altstadt"],
        hotel_per_night: 80,
        flight: 100,
        daily: 60,
    },
    Destination {
        name: "Wien",
        country: "Österreich",
        aliases: &["wien", "vienna"],
        best_seasons: &[Spring, Autumn],
        activities: &["Schloss Schönbrunn", "Stephansdom", "Kaffeehäuser"],
        hotel_per_night: 130,
        flight: 140,
        daily: 100,
    },
    Destination {
        name: "Budapest",
        country: "Ungarn",
        aliases: &["budapest"],
        best_seasons: &[Spring, Autumn],
        activities: &["Parlament", "Thermalbäder", "Burgberg"],
        hotel_per_night: 70,
        flight: 90,
        daily: 50,
    },
    Destination {
        name: "Krakau",
        country: "Polen",
        aliases: &["krakau", "krakow", "kraków"],
        best_seasons: &[Spring, Autumn],
        activities: &["Marktplatz", "Wawel-Burg", "Jüdisches Viertel"],
        hotel_per_night: 60,
        flight: 80,
        daily: 40,
    },
];

fn lookup(name: &str) -> Option<&'static Destination> {
    let key = name.trim().to_lowercase();
    CATALOG
        .iter()
        .find(|destination| destination.aliases.contains(&key.as_str()))
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CostEstimate {
    pub nights: u32,
    pub hotel_per_night: u32,
    pub flight_per_person: u32,
    pub daily_per_person: u32,
    pub total: u32,
}

fn nights(start: Option<NaiveDate>, end: Option<NaiveDate>) -> u32 {
    match (start, end) {
        (Some(start), Some(end)) => u32::try_from((end - start).num_days())
            .ok()
            .filter(|nights| *nights > 0)
            .unwrap_or(DEFAULT_NIGHTS),
        _ => DEFAULT_NIGHTS,
    }
}

/// Hotel rooms scale with the group, daily spending gets a group discount.
fn estimate(destination: &Destination, nights: u32, guests: u8) -> CostEstimate {
    let guests = u32::from(guests.max(1));
    let discount = match guests {
        1 => 1.0,
        2 | 3 => 0.9,
        _ => 0.8,
    };
    let daily_per_person = (f64::from(destination.daily) * discount).round() as u32;
    let hotel_per_night = destination.hotel_per_night * guests;

    CostEstimate {
        nights,
        hotel_per_night,
        flight_per_person: destination.flight,
        daily_per_person,
        total: hotel_per_night * nights + daily_per_person * guests * nights + destination.flight * guests,
    }
}

fn join_names(names: &[&str]) -> String {
    match names {
        [] => String::new(),
        [single] => single.to_string(),
        [init @ .., last] => format!("{} und {last}", init.join(", ")),
    }
}

/// Catalog entries that fit `budget` for the trip length, cheapest first.
fn affordable(budget: u32, nights: u32, guests: u8, exclude: Option<&str>) -> Vec<&'static str> {
    let mut fits = CATALOG
        .iter()
        .filter(|destination| Some(destination.name) != exclude)
        .map(|destination| (estimate(destination, nights, guests).total, destination.name))
        .filter(|(total, _)| *total <= budget)
        .collect::<Vec<_>>();
    fits.sort_unstable();
    fits.into_iter().take(3).map(|(_, name)| name).collect()
}

fn in_season(season: Season) -> Vec<&'static str> {
    CATALOG
        .iter()
        .filter(|destination| destination.best_seasons.contains(&season))
        .map(|destination| destination.name)
        .take(3)
        .collect()
}

fn seasonal_line(season: Season) -> String {
    format!("Saisontipps für den {}: {}.", season.label(), join_names(season.tips()))
}

/// Rule-based recommendations from a small destination catalog. Used when
/// no language model is configured; never fails.
#[derive(Debug, Clone, Copy, Default)]
pub struct LocalAdvisor;

impl LocalAdvisor {
    pub fn recommend(&self, request: &AdviceRequest) -> String {
        let season = Season::from_month(request.travel_month);
        let nights = nights(request.start_date, request.end_date);
        let mut lines = Vec::new();

        match request.destination.as_deref().map(|name| (name, lookup(name))) {
            Some((_, Some(destination))) => {
                lines.push(format!(
                    "{} ({}): Nicht verpassen sollten Sie {}.",
                    destination.name,
                    destination.country,
                    join_names(destination.activities)
                ));

                let best = destination
                    .best_seasons
                    .iter()
                    .map(|season| season.label())
                    .collect::<Vec<_>>();
                let mut timing = format!("Beste Reisezeit: {}.", join_names(&best));
                if !destination.best_seasons.contains(&season) {
                    timing.push_str(" Ihr Reisezeitraum liegt außerhalb der besten Saison.");
                }
                lines.push(timing);

                let cost = estimate(destination, nights, request.guests);
                lines.push(format!(
                    "Geschätzte Kosten für {} Nächte: ca. {}€ (Hotel ca. {}€ pro Nacht, Flug ca. {}€, Tagesbudget ca. {}€ pro Person).",
                    cost.nights, cost.total, cost.hotel_per_night, cost.flight_per_person, cost.daily_per_person
                ));

                if let Some(budget) = request.budget {
                    if budget >= cost.total {
                        lines.push(format!("Ihr Budget von {budget}€ reicht dafür aus."));
                    } else {
                        let cheaper = affordable(budget, nights, request.guests, Some(destination.name));
                        if cheaper.is_empty() {
                            lines.push(format!(
                                "Ihr Budget von {budget}€ liegt unter dieser Schätzung. Hostels oder Pensionen senken die Kosten deutlich."
                            ));
                        } else {
                            lines.push(format!(
                                "Ihr Budget von {budget}€ liegt unter dieser Schätzung. Günstigere Alternativen: {}.",
                                join_names(&cheaper)
                            ));
                        }
                    }
                }
            }
            other => {
                if let Some((name, None)) = other {
                    lines.push(format!("Für {name} habe ich leider keine Detaildaten."));
                }
                let picks = match request.budget {
                    Some(budget) => affordable(budget, nights, request.guests, None),
                    None => Vec::new(),
                };
                if picks.is_empty() {
                    lines.push(format!(
                        "Im {} besonders schön: {}.",
                        season.label(),
                        join_names(&in_season(season))
                    ));
                } else {
                    lines.push(format!(
                        "Zu Ihrem Budget passen zum Beispiel {}.",
                        join_names(&picks)
                    ));
                }
            }
        }

        lines.push(seasonal_line(season));
        lines.join(" ")
    }
}

#[async_trait]
impl AdvisoryProvider for LocalAdvisor {
    async fn advise(&self, request: &AdviceRequest) -> Result<Advice, ProviderError> {
        debug!(destination = ?request.destination, "local recommendation");
        Ok(Advice {
            text: self.recommend(request),
            model: MODEL.to_string(),
        })
    }
}
