use std::sync::Arc;
use std::time::Instant;

use anyhow::Result;
use chrono::{Local, NaiveDate};
use tracing::{error, info, instrument, warn};
use travelguide_core::{
    classify, plan_turn, planner, Classification, DialogResponse, DialogSettings, DialogState,
    Intent, Session, SideQuery, TurnInput, TurnPlan,
};
use travelguide_observability::AppMetrics;
use travelguide_providers::{ProviderError, ProviderSet};
use travelguide_storage::{SessionRepository, UserLocks};
use uuid::Uuid;

/// Trims a caller-supplied id; blank or missing ids get a fresh guest id.
pub fn resolve_user_id(raw: Option<&str>) -> String {
    raw.map(str::trim)
        .filter(|value| !value.is_empty())
        .map(str::to_string)
        .unwrap_or_else(|| format!("guest-{}", Uuid::new_v4()))
}

#[derive(Clone)]
pub struct TravelAgent<S>
where
    S: SessionRepository,
{
    store: Arc<S>,
    providers: ProviderSet,
    settings: DialogSettings,
    locks: UserLocks,
    metrics: Arc<AppMetrics>,
    today: fn() -> NaiveDate,
}

fn local_today() -> NaiveDate {
    Local::now().date_naive()
}

impl<S> TravelAgent<S>
where
    S: SessionRepository,
{
    pub fn new(
        store: Arc<S>,
        providers: ProviderSet,
        settings: DialogSettings,
        metrics: Arc<AppMetrics>,
    ) -> Self {
        Self {
            store,
            providers,
            settings,
            locks: UserLocks::new(),
            metrics,
            today: local_today,
        }
    }

    /// Pins the calendar used for date parsing and suggestions.
    pub fn with_clock(mut self, today: fn() -> NaiveDate) -> Self {
        self.today = today;
        self
    }

    pub async fn session(&self, user_id: &str) -> Result<Session> {
        self.store.get_or_create(user_id).await
    }

    pub async fn session_count(&self) -> Result<usize> {
        self.store.session_count().await
    }

    /// Runs one dialog turn. Always produces a reply; internal failures
    /// surface as a generic error response.
    #[instrument(skip(self, utterance))]
    pub async fn handle_turn(&self, user_id: &str, utterance: &str) -> DialogResponse {
        let started = Instant::now();
        let user_id = resolve_user_id(Some(user_id));
        let _turn = self.locks.acquire(&user_id).await;

        let classification = classify(utterance);
        self.metrics.inc_turn(classification.intent);

        let response = match self.try_handle_turn(&user_id, utterance, &classification).await {
            Ok(response) => response,
            Err(err) => {
                self.metrics.inc_internal_error();
                error!(user_id = %user_id, error = ?err, "turn failed");
                let state = self
                    .store
                    .get_or_create(&user_id)
                    .await
                    .map(|session| session.state())
                    .unwrap_or(DialogState::NeedDestination);
                planner::internal_error().for_turn(classification.intent, state)
            }
        };

        self.metrics.observe_latency(started.elapsed());
        info!(
            user_id = %user_id,
            intent = classification.intent.as_code(),
            rule = %classification.rule,
            state = ?response.state,
            kind = ?response.kind,
            "turn handled"
        );

        response
    }

    async fn try_handle_turn(
        &self,
        user_id: &str,
        utterance: &str,
        classification: &Classification,
    ) -> Result<DialogResponse> {
        if classification.intent == Intent::Reset {
            self.store.reset(user_id).await?;
        }

        let turn = TurnInput {
            utterance,
            classification,
            today: (self.today)(),
        };
        let settings = &self.settings;
        let plan = self
            .store
            .update(user_id, |session| plan_turn(session, turn, settings))
            .await?;

        match plan {
            TurnPlan::Reply(response) => Ok(response),
            TurnPlan::Query(query) => {
                let session = self.store.get_or_create(user_id).await?;
                let response = self.run_side_query(&session, query).await;
                Ok(response.for_turn(classification.intent, session.state()))
            }
        }
    }

    async fn run_side_query(&self, session: &Session, query: SideQuery) -> DialogResponse {
        let kind = query.kind();

        self.metrics.inc_adapter_call();
        let result = match &query {
            SideQuery::Weather(query) => self
                .providers
                .weather
                .current(query)
                .await
                .map(|report| planner::weather_reply(&report)),
            SideQuery::Flights(query) => self
                .providers
                .flights
                .search(query)
                .await
                .map(|offers| planner::flights_reply(query, &offers)),
            SideQuery::Hotels(query) => self
                .providers
                .hotels
                .search(query)
                .await
                .map(|offers| planner::hotels_reply(query, &offers)),
            SideQuery::Advice(request) => self
                .providers
                .advisor
                .advise(request)
                .await
                .map(|advice| planner::advice_reply(session, &advice)),
        };

        result.unwrap_or_else(|err| {
            self.metrics.inc_adapter_failure();
            warn!(adapter = kind.as_code(), error = %err, "adapter call failed");
            match err {
                ProviderError::UnknownLocation(location) => planner::unknown_location(&location),
                _ => planner::side_query_failure(kind),
            }
        })
    }
}
