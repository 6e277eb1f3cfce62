use async_trait::async_trait;
use chrono::NaiveDate;
use reqwest::Client;
use serde::de::DeserializeOwned;
use serde_json::Value;
use tracing::instrument;
use travelguide_core::{FlightOffer, FlightQuery, HotelOffer, HotelQuery};
use url::Url;

use crate::{fetch_json, FlightProvider, HotelProvider, ProviderError};

/// Accepts either a bare JSON array or an object holding the array under `key`.
fn parse_offers<T: DeserializeOwned>(
    provider: &'static str,
    key: &str,
    body: Value,
) -> Result<Vec<T>, ProviderError> {
    let list = match body {
        Value::Array(_) => body,
        Value::Object(mut object) => object.remove(key).ok_or_else(|| ProviderError::Payload {
            provider,
            detail: format!("missing `{key}` list"),
        })?,
        other => {
            return Err(ProviderError::Payload {
                provider,
                detail: format!("expected a list, got {other}"),
            })
        }
    };

    serde_json::from_value(list).map_err(|err| ProviderError::Payload {
        provider,
        detail: err.to_string(),
    })
}

fn iso(date: Option<NaiveDate>) -> Option<String> {
    date.map(|value| value.format("%Y-%m-%d").to_string())
}

fn push_param(params: &mut Vec<(&'static str, String)>, name: &'static str, value: Option<String>) {
    if let Some(value) = value {
        params.push((name, value));
    }
}

/// Flight search against a JSON endpoint speaking `?origin=&destination=&departure_date=...`.
#[derive(Clone)]
pub struct HttpFlightProvider {
    client: Client,
    endpoint: Url,
}

impl HttpFlightProvider {
    pub fn new(client: Client, endpoint: &str) -> Result<Self, url::ParseError> {
        Ok(Self {
            client,
            endpoint: Url::parse(endpoint)?,
        })
    }

    fn params(query: &FlightQuery) -> Vec<(&'static str, String)> {
        let mut params = vec![
            ("origin", query.origin.clone()),
            ("destination", query.destination.clone()),
        ];
        push_param(&mut params, "departure_date", iso(query.start_date));
        push_param(&mut params, "return_date", iso(query.end_date));
        push_param(&mut params, "max_price", query.budget.map(|b| b.to_string()));
        params
    }
}

#[async_trait]
impl FlightProvider for HttpFlightProvider {
    #[instrument(skip_all, fields(destination = %query.destination))]
    async fn search(&self, query: &FlightQuery) -> Result<Vec<FlightOffer>, ProviderError> {
        let body: Value = fetch_json(
            "flights",
            self.client
                .get(self.endpoint.clone())
                .query(&Self::params(query)),
        )
        .await?;
        parse_offers("flights", "flights", body)
    }
}

#[derive(Clone)]
pub struct HttpHotelProvider {
    client: Client,
    endpoint: Url,
}

impl HttpHotelProvider {
    pub fn new(client: Client, endpoint: &str) -> Result<Self, url::ParseError> {
        Ok(Self {
            client,
            endpoint: Url::parse(endpoint)?,
        })
    }

    fn params(query: &HotelQuery) -> Vec<(&'static str, String)> {
        let mut params = vec![
            ("location", query.location.clone()),
            ("guests", query.guests.to_string()),
        ];
        push_param(&mut params, "check_in", iso(query.check_in));
        push_param(&mut params, "check_out", iso(query.check_out));
        push_param(&mut params, "max_price", query.budget.map(|b| b.to_string()));
        params
    }
}

#[async_trait]
impl HotelProvider for HttpHotelProvider {
    #[instrument(skip_all, fields(location = %query.location))]
    async fn search(&self, query: &HotelQuery) -> Result<Vec<HotelOffer>, ProviderError> {
        let body: Value = fetch_json(
            "hotels",
            self.client
                .get(self.endpoint.clone())
                .query(&Self::params(query)),
        )
        .await?;
        parse_offers("hotels", "hotels", body)
    }
}

/// Stands in for a search backend that has no endpoint configured.
#[derive(Debug, Clone, Copy, Default)]
pub struct UnavailableProvider;

#[async_trait]
impl FlightProvider for UnavailableProvider {
    async fn search(&self, _query: &FlightQuery) -> Result<Vec<FlightOffer>, ProviderError> {
        Err(ProviderError::NotConfigured {
            provider: "flights",
        })
    }
}

#[async_trait]
impl HotelProvider for UnavailableProvider {
    async fn search(&self, _query: &HotelQuery) -> Result<Vec<HotelOffer>, ProviderError> {
        Err(ProviderError::NotConfigured { provider: "hotels" })
    }
}
