use async_trait::async_trait;
use reqwest::Client;
use serde_json::{json, Value};
use tracing::instrument;
use travelguide_core::{Advice, AdviceRequest};

use crate::{fetch_json, AdvisoryProvider, ProviderError};

const PROVIDER: &str = "openrouter";
const COMPLETIONS_URL: &str = "https://openrouter.ai/api/v1/chat/completions";

const SYSTEM_PROMPT: &str = "Du bist ein freundlicher, kompetenter Reiseassistent. \
Antworte immer auf Deutsch, kurz und konkret. Gib praktische Empfehlungen zu \
Sehenswürdigkeiten, Essen, Anreise und Budget und berücksichtige die bekannten \
Reisedaten des Nutzers. Erfinde keine Preise oder Buchungsbestätigungen.";

/// Chat completions through OpenRouter.
#[derive(Clone)]
pub struct OpenRouterAdvisor {
    client: Client,
    api_key: String,
    model: String,
}

impl OpenRouterAdvisor {
    pub fn new(client: Client, api_key: &str, model: &str) -> Self {
        Self {
            client,
            api_key: api_key.to_string(),
            model: model.to_string(),
        }
    }

    fn payload(&self, request: &AdviceRequest) -> Value {
        json!({
            "model": self.model,
            "messages": [
                { "role": "system", "content": SYSTEM_PROMPT },
                {
                    "role": "user",
                    "content": format!("Reisekontext: {}\n\nFrage: {}", request.context, request.message)
                }
            ],
            "max_tokens": 1000,
            "temperature": 0.7,
            "stream": false
        })
    }
}

fn extract_completion_text(body: &Value) -> Option<String> {
    body.get("choices")?
        .as_array()?
        .iter()
        .filter_map(|choice| choice.pointer("/message/content")?.as_str())
        .map(str::trim)
        .find(|text| !text.is_empty())
        .map(str::to_string)
}

#[async_trait]
impl AdvisoryProvider for OpenRouterAdvisor {
    #[instrument(skip_all, fields(model = %self.model))]
    async fn advise(&self, request: &AdviceRequest) -> Result<Advice, ProviderError> {
        let body: Value = fetch_json(
            PROVIDER,
            self.client
                .post(COMPLETIONS_URL)
                .bearer_auth(self.api_key.as_str())
                .header("X-Title", "TravelGuide Assistant")
                .json(&self.payload(request)),
        )
        .await?;

        let text = extract_completion_text(&body).ok_or_else(|| ProviderError::Payload {
            provider: PROVIDER,
            detail: "completion text missing".to_string(),
        })?;
        let model = body
            .get("model")
            .and_then(Value::as_str)
            .unwrap_or(self.model.as_str())
            .to_string();

        Ok(Advice { text, model })
    }
}
