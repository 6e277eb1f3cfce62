use std::collections::BTreeMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use once_cell::sync::OnceCell;
use serde::Serialize;
use travelguide_core::Intent;
use tracing_subscriber::EnvFilter;

static TRACING_INIT: OnceCell<()> = OnceCell::new();

#[derive(Debug, Default)]
pub struct AppMetrics {
    turns_total: AtomicU64,
    resets_total: AtomicU64,
    unknown_total: AtomicU64,
    adapter_calls_total: AtomicU64,
    adapter_failures_total: AtomicU64,
    internal_errors_total: AtomicU64,
    total_latency_millis: AtomicU64,
    intents: [AtomicU64; Intent::ALL.len()],
}

#[derive(Debug, Clone, Serialize)]
pub struct MetricsSnapshot {
    pub turns_total: u64,
    pub resets_total: u64,
    pub unknown_total: u64,
    pub adapter_calls_total: u64,
    pub adapter_failures_total: u64,
    pub internal_errors_total: u64,
    pub avg_latency_millis: f64,
    /// Turns per classified intent; intents never seen are omitted.
    pub intents: BTreeMap<&'static str, u64>,
}

impl AppMetrics {
    pub fn shared() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn inc_turn(&self, intent: Intent) {
        self.turns_total.fetch_add(1, Ordering::Relaxed);
        if let Some(index) = Intent::ALL.iter().position(|known| *known == intent) {
            self.intents[index].fetch_add(1, Ordering::Relaxed);
        }
        match intent {
            Intent::Reset => {
                self.resets_total.fetch_add(1, Ordering::Relaxed);
            }
            Intent::Unknown => {
                self.unknown_total.fetch_add(1, Ordering::Relaxed);
            }
            _ => {}
        }
    }

    pub fn inc_adapter_call(&self) {
        self.adapter_calls_total.fetch_add(1, Ordering::Relaxed);
    }

    pub fn inc_adapter_failure(&self) {
        self.adapter_failures_total.fetch_add(1, Ordering::Relaxed);
    }

    pub fn inc_internal_error(&self) {
        self.internal_errors_total.fetch_add(1, Ordering::Relaxed);
    }

    pub fn observe_latency(&self, duration: Duration) {
        self.total_latency_millis
            .fetch_add(duration.as_millis() as u64, Ordering::Relaxed);
    }

    pub fn snapshot(&self) -> MetricsSnapshot {
        let turns = self.turns_total.load(Ordering::Relaxed);
        let latency = self.total_latency_millis.load(Ordering::Relaxed);

        let intents = Intent::ALL
            .iter()
            .zip(self.intents.iter())
            .map(|(intent, count)| (intent.as_code(), count.load(Ordering::Relaxed)))
            .filter(|(_, count)| *count > 0)
            .collect();

        MetricsSnapshot {
            turns_total: turns,
            resets_total: self.resets_total.load(Ordering::Relaxed),
            unknown_total: self.unknown_total.load(Ordering::Relaxed),
            adapter_calls_total: self.adapter_calls_total.load(Ordering::Relaxed),
            adapter_failures_total: self.adapter_failures_total.load(Ordering::Relaxed),
            internal_errors_total: self.internal_errors_total.load(Ordering::Relaxed),
            avg_latency_millis: if turns == 0 {
                0.0
            } else {
                latency as f64 / turns as f64
            },
            intents,
        }
    }
}

pub fn init_tracing(service_name: &str) {
    TRACING_INIT.get_or_init(|| {
        let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| {
            EnvFilter::new(format!(
                "{}=info,travelguide_api=info,travelguide_agents=info",
                service_name
            ))
        });

        tracing_subscriber::fmt()
            .json()
            .with_env_filter(filter)
            .with_current_span(true)
            .with_span_list(true)
            .with_writer(std::io::stderr)
            .init();
    });
}
