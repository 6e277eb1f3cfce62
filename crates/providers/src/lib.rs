pub mod advisory;
pub mod local;
pub mod search;
pub mod weather;

use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use async_trait::async_trait;
use reqwest::{Client, RequestBuilder};
use serde::de::DeserializeOwned;
use thiserror::Error;
use travelguide_core::{
    Advice, AdviceRequest, FlightOffer, FlightQuery, HotelOffer, HotelQuery, WeatherQuery,
    WeatherReport,
};

pub use advisory::OpenRouterAdvisor;
pub use local::LocalAdvisor;
pub use search::{HttpFlightProvider, HttpHotelProvider, UnavailableProvider};
pub use weather::{OpenWeatherProvider, SimulatedWeatherProvider};

pub const DEFAULT_OPENROUTER_MODEL: &str = "anthropic/claude-3.5-sonnet";

#[derive(Debug, Error)]
pub enum ProviderError {
    #[error("{provider} is not configured")]
    NotConfigured { provider: &'static str },
    #[error("{provider} request failed")]
    Transport {
        provider: &'static str,
        #[source]
        source: reqwest::Error,
    },
    #[error("{provider} responded with status {status}")]
    Status { provider: &'static str, status: u16 },
    #[error("{provider} returned an unusable payload: {detail}")]
    Payload { provider: &'static str, detail: String },
    #[error("location not found: {0}")]
    UnknownLocation(String),
}

#[async_trait]
pub trait WeatherProvider: Send + Sync {
    async fn current(&self, query: &WeatherQuery) -> Result<WeatherReport, ProviderError>;
}

#[async_trait]
pub trait FlightProvider: Send + Sync {
    async fn search(&self, query: &FlightQuery) -> Result<Vec<FlightOffer>, ProviderError>;
}

#[async_trait]
pub trait HotelProvider: Send + Sync {
    async fn search(&self, query: &HotelQuery) -> Result<Vec<HotelOffer>, ProviderError>;
}

#[async_trait]
pub trait AdvisoryProvider: Send + Sync {
    async fn advise(&self, request: &AdviceRequest) -> Result<Advice, ProviderError>;
}

/// Sends `request` and decodes a JSON body, mapping every failure onto `provider`.
pub(crate) async fn fetch_json<T: DeserializeOwned>(
    provider: &'static str,
    request: RequestBuilder,
) -> Result<T, ProviderError> {
    let response = request
        .send()
        .await
        .map_err(|source| ProviderError::Transport { provider, source })?;

    let status = response.status();
    if !status.is_success() {
        return Err(ProviderError::Status {
            provider,
            status: status.as_u16(),
        });
    }

    response
        .json::<T>()
        .await
        .map_err(|err| ProviderError::Payload {
            provider,
            detail: err.to_string(),
        })
}

#[derive(Debug, Clone)]
pub struct ProviderConfig {
    pub openweather_api_key: Option<String>,
    pub flight_api_url: Option<String>,
    pub hotel_api_url: Option<String>,
    pub openrouter_api_key: Option<String>,
    pub openrouter_model: String,
    pub http_timeout: Duration,
}

impl Default for ProviderConfig {
    fn default() -> Self {
        Self {
            openweather_api_key: None,
            flight_api_url: None,
            hotel_api_url: None,
            openrouter_api_key: None,
            openrouter_model: DEFAULT_OPENROUTER_MODEL.to_string(),
            http_timeout: Duration::from_secs(20),
        }
    }
}

fn env_value(name: &str) -> Option<String> {
    std::env::var(name)
        .ok()
        .map(|value| value.trim().to_string())
        .filter(|value| !value.is_empty())
}

impl ProviderConfig {
    pub fn from_env() -> Self {
        let defaults = Self::default();
        Self {
            openweather_api_key: env_value("TRAVELGUIDE_OPENWEATHER_API_KEY"),
            flight_api_url: env_value("TRAVELGUIDE_FLIGHT_API_URL"),
            hotel_api_url: env_value("TRAVELGUIDE_HOTEL_API_URL"),
            openrouter_api_key: env_value("TRAVELGUIDE_OPENROUTER_API_KEY"),
            openrouter_model: env_value("TRAVELGUIDE_OPENROUTER_MODEL")
                .unwrap_or(defaults.openrouter_model),
            http_timeout: env_value("TRAVELGUIDE_HTTP_TIMEOUT_SECONDS")
                .and_then(|value| value.parse::<u64>().ok())
                .filter(|seconds| *seconds > 0)
                .map(Duration::from_secs)
                .unwrap_or(defaults.http_timeout),
        }
    }
}

#[derive(Clone)]
pub struct ProviderSet {
    pub weather: Arc<dyn WeatherProvider>,
    pub flights: Arc<dyn FlightProvider>,
    pub hotels: Arc<dyn HotelProvider>,
    pub advisor: Arc<dyn AdvisoryProvider>,
}

impl ProviderSet {
    /// Simulated weather, no flight or hotel search, rule-based advice.
    pub fn offline() -> Self {
        let unavailable = Arc::new(UnavailableProvider);
        Self {
            weather: Arc::new(SimulatedWeatherProvider),
            flights: unavailable.clone(),
            hotels: unavailable,
            advisor: Arc::new(LocalAdvisor),
        }
    }

    pub fn from_config(config: &ProviderConfig) -> Result<Self> {
        let client = Client::builder()
            .connect_timeout(Duration::from_secs(6))
            .timeout(config.http_timeout)
            .build()
            .context("failed to build HTTP client")?;

        let mut providers = Self::offline();

        if let Some(api_key) = &config.openweather_api_key {
            providers.weather = Arc::new(OpenWeatherProvider::new(client.clone(), api_key));
        }
        if let Some(endpoint) = &config.flight_api_url {
            let provider = HttpFlightProvider::new(client.clone(), endpoint)
                .with_context(|| format!("invalid flight search url {endpoint}"))?;
            providers.flights = Arc::new(provider);
        }
        if let Some(endpoint) = &config.hotel_api_url {
            let provider = HttpHotelProvider::new(client.clone(), endpoint)
                .with_context(|| format!("invalid hotel search url {endpoint}"))?;
            providers.hotels = Arc::new(provider);
        }
        if let Some(api_key) = &config.openrouter_api_key {
            providers.advisor = Arc::new(OpenRouterAdvisor::new(
                client,
                api_key,
                &config.openrouter_model,
            ));
        }

        Ok(providers)
    }

    /// Names of the live backends, for health output and startup logs.
    pub fn describe(config: &ProviderConfig) -> serde_json::Value {
        serde_json::json!({
            "weather": if config.openweather_api_key.is_some() { "openweather" } else { "simulated" },
            "flights": config.flight_api_url.is_some(),
            "hotels": config.hotel_api_url.is_some(),
            "advisor": match config.openrouter_api_key {
                Some(_) => config.openrouter_model.as_str(),
                None => local::MODEL,
            },
        })
    }
}
