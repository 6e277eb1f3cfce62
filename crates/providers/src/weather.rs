use async_trait::async_trait;
use chrono::{DateTime, NaiveDate, Timelike};
use reqwest::Client;
use serde::Deserialize;
use tracing::{debug, instrument};
use travelguide_core::{WeatherForecast, WeatherQuery, WeatherReport};

use crate::{fetch_json, ProviderError, WeatherProvider};

const PROVIDER: &str = "openweather";
const GEOCODING_URL: &str = "https://api.openweathermap.org/geo/1.0/direct";
const DATA_URL: &str = "https://api.openweathermap.org/data/2.5";

#[derive(Debug, Deserialize)]
struct GeoHit {
    lat: f64,
    lon: f64,
}

#[derive(Debug, Deserialize)]
struct MainBlock {
    temp: f64,
    #[serde(default)]
    feels_like: Option<f64>,
    #[serde(default)]
    humidity: Option<f64>,
}

#[derive(Debug, Deserialize)]
struct Condition {
    description: String,
}

#[derive(Debug, Default, Deserialize)]
struct Wind {
    #[serde(default)]
    speed: f64,
}

#[derive(Debug, Deserialize)]
struct CurrentPayload {
    main: MainBlock,
    #[serde(default)]
    weather: Vec<Condition>,
    #[serde(default)]
    wind: Wind,
    /// Metres.
    #[serde(default)]
    visibility: Option<f64>,
}

#[derive(Debug, Deserialize)]
struct ForecastEntry {
    dt: i64,
    main: MainBlock,
    #[serde(default)]
    weather: Vec<Condition>,
}

#[derive(Debug, Deserialize)]
struct ForecastPayload {
    #[serde(default)]
    list: Vec<ForecastEntry>,
}

fn describe(conditions: &[Condition]) -> String {
    conditions
        .first()
        .map(|condition| travelguide_core::intent::title_case(&condition.description))
        .unwrap_or_else(|| "Keine Beschreibung".to_string())
}

fn to_report(location: &str, payload: CurrentPayload) -> WeatherReport {
    let temperature = payload.main.temp.round() as i32;
    WeatherReport {
        location: location.to_string(),
        temperature_c: temperature,
        feels_like_c: payload
            .main
            .feels_like
            .map(|value| value.round() as i32)
            .unwrap_or(temperature),
        humidity: payload.main.humidity.unwrap_or_default().clamp(0.0, 100.0) as u8,
        description: describe(&payload.weather),
        // m/s -> km/h
        wind_kmh: (payload.wind.speed * 3.6) as f32,
        visibility_km: (payload.visibility.unwrap_or(10_000.0) / 1000.0) as f32,
        forecast: None,
        simulated: false,
    }
}

/// Entry for `date` closest to midday, if the 5-day forecast covers it.
fn pick_forecast(payload: &ForecastPayload, date: NaiveDate) -> Option<WeatherForecast> {
    payload
        .list
        .iter()
        .filter_map(|entry| {
            let at = DateTime::from_timestamp(entry.dt, 0)?;
            (at.date_naive() == date).then_some((at.hour().abs_diff(12), entry))
        })
        .min_by_key(|(distance, _)| *distance)
        .map(|(_, entry)| WeatherForecast {
            date,
            temperature_c: entry.main.temp.round() as i32,
            description: describe(&entry.weather),
        })
}

/// OpenWeatherMap geocoding, current conditions and the 5-day forecast.
#[derive(Clone)]
pub struct OpenWeatherProvider {
    client: Client,
    api_key: String,
}

impl OpenWeatherProvider {
    pub fn new(client: Client, api_key: &str) -> Self {
        Self {
            client,
            api_key: api_key.to_string(),
        }
    }

    async fn coordinates(&self, location: &str) -> Result<(f64, f64), ProviderError> {
        let hits: Vec<GeoHit> = fetch_json(
            PROVIDER,
            self.client.get(GEOCODING_URL).query(&[
                ("q", location),
                ("limit", "1"),
                ("appid", self.api_key.as_str()),
            ]),
        )
        .await?;

        hits.first()
            .map(|hit| (hit.lat, hit.lon))
            .ok_or_else(|| ProviderError::UnknownLocation(location.to_string()))
    }

    async fn data<T: serde::de::DeserializeOwned>(
        &self,
        endpoint: &str,
        (lat, lon): (f64, f64),
    ) -> Result<T, ProviderError> {
        fetch_json(
            PROVIDER,
            self.client.get(format!("{DATA_URL}/{endpoint}")).query(&[
                ("lat", lat.to_string()),
                ("lon", lon.to_string()),
                ("appid", self.api_key.clone()),
                ("units", "metric".to_string()),
                ("lang", "de".to_string()),
            ]),
        )
        .await
    }
}

#[async_trait]
impl WeatherProvider for OpenWeatherProvider {
    #[instrument(skip_all, fields(location = %query.location))]
    async fn current(&self, query: &WeatherQuery) -> Result<WeatherReport, ProviderError> {
        let coordinates = self.coordinates(&query.location).await?;
        let current: CurrentPayload = self.data("weather", coordinates).await?;
        let mut report = to_report(&query.location, current);

        if let Some(date) = query.date {
            // Forecast is best effort.
            match self.data::<ForecastPayload>("forecast", coordinates).await {
                Ok(forecast) => report.forecast = pick_forecast(&forecast, date),
                Err(err) => debug!(error = %err, "forecast lookup failed"),
            }
        }

        Ok(report)
    }
}

/// Fixed mild weather for setups without an OpenWeatherMap key.
#[derive(Debug, Clone, Copy, Default)]
pub struct SimulatedWeatherProvider;

#[async_trait]
impl WeatherProvider for SimulatedWeatherProvider {
    async fn current(&self, query: &WeatherQuery) -> Result<WeatherReport, ProviderError> {
        let description = "Leicht bewölkt".to_string();
        Ok(WeatherReport {
            location: query.location.clone(),
            temperature_c: 20,
            feels_like_c: 20,
            humidity: 60,
            description: description.clone(),
            wind_kmh: 10.0,
            visibility_km: 10.0,
            forecast: query.date.map(|date| WeatherForecast {
                date,
                temperature_c: 20,
                description,
            }),
            simulated: true,
        })
    }
}
