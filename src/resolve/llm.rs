//! OpenAI-compatible chat-completion resolver.
//!
//! Talks to `POST {endpoint}/v1/chat/completions` (Groq, OpenAI and most
//! local gateways speak this dialect). Non-streaming; one request per call.

use super::prompt::{build_prompt, SYSTEM_PROMPT};
use super::response::parse_bindings;
use super::{ExternalResolver, ResolveRequest, ResolverReply};
use crate::domain::{AnalysisConfig, DependencyRecord, Origin, SymbolKind};
use crate::error::ResolverError;
use crate::utils::estimate_tokens;
use async_trait::async_trait;
use reqwest::header;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::time::{Duration, Instant};
use tracing::{debug, error, info};

const TEMPERATURE: f32 = 0.1;
const MAX_TOKENS: u32 = 1000;

#[derive(Debug)]
pub struct ChatCompletionResolver {
    client: reqwest::Client,
    url_chat: String,
    model: String,
    price_per_1k_tokens: f64,
}

impl ChatCompletionResolver {
    pub fn new(
        endpoint: &str,
        model: &str,
        api_key: &str,
        price_per_1k_tokens: f64,
        timeout: Duration,
    ) -> Result<Self, ResolverError> {
        let endpoint = endpoint.trim();
        if !(endpoint.starts_with("http://") || endpoint.starts_with("https://")) {
            return Err(ResolverError::Transport(format!("invalid endpoint '{endpoint}'")));
        }

        let mut headers = header::HeaderMap::new();
        let auth = header::HeaderValue::from_str(&format!("Bearer {api_key}"))
            .map_err(|e| ResolverError::Transport(format!("invalid API key header: {e}")))?;
        headers.insert(header::AUTHORIZATION, auth);
        headers.insert(header::CONTENT_TYPE, header::HeaderValue::from_static("application/json"));

        let client = reqwest::Client::builder()
            .timeout(timeout)
            .default_headers(headers)
            .build()
            .map_err(|e| ResolverError::Transport(e.to_string()))?;

        let url_chat = format!("{}/v1/chat/completions", endpoint.trim_end_matches('/'));
        info!(
            model,
            endpoint,
            timeout_secs = timeout.as_secs_f64(),
            "chat completion resolver ready"
        );

        Ok(Self { client, url_chat, model: model.to_string(), price_per_1k_tokens })
    }

    /// Build from config; `Ok(None)` when the API key variable is unset.
    pub fn from_config(config: &AnalysisConfig) -> Result<Option<Self>, ResolverError> {
        let key = std::env::var(&config.external_api_key_env).ok().filter(|k| !k.trim().is_empty());
        let Some(key) = key else {
            debug!(var = %config.external_api_key_env, "no API key; external resolver disabled");
            return Ok(None);
        };
        Self::new(
            &config.external_endpoint,
            &config.external_model,
            key.trim(),
            config.external_price_per_1k_tokens,
            config.external_timeout(),
        )
        .map(Some)
    }

    fn cost_of(&self, tokens: usize) -> f64 {
        tokens as f64 / 1000.0 * self.price_per_1k_tokens
    }
}

/// Prompt plus the completion ceiling.
fn prompt_tokens(prompt: &str) -> usize {
    estimate_tokens(SYSTEM_PROMPT) + estimate_tokens(prompt) + MAX_TOKENS as usize
}

#[async_trait]
impl ExternalResolver for ChatCompletionResolver {
    async fn propose(&self, request: &ResolveRequest) -> Result<ResolverReply, ResolverError> {
        let started = Instant::now();
        let prompt = build_prompt(request);

        let estimated_tokens = prompt_tokens(&prompt);
        let estimated_cost = self.cost_of(estimated_tokens);
        if estimated_cost > request.budget_remaining {
            return Err(ResolverError::BudgetExhausted {
                needed: estimated_cost,
                remaining: request.budget_remaining,
            });
        }

        let body = ChatCompletionRequest {
            model: &self.model,
            messages: vec![
                ChatMessage { role: "system", content: SYSTEM_PROMPT },
                ChatMessage { role: "user", content: &prompt },
            ],
            temperature: TEMPERATURE,
            max_tokens: MAX_TOKENS,
        };
        debug!(
            model = %self.model,
            snippet = request.target.index,
            prompt_len = prompt.len(),
            "POST {}", self.url_chat
        );

        let resp = self.client.post(&self.url_chat).json(&body).send().await.map_err(|e| {
            if e.is_timeout() {
                ResolverError::Timeout { attempts: 1 }
            } else {
                ResolverError::Transport(e.to_string())
            }
        })?;

        let status = resp.status();
        if status == reqwest::StatusCode::TOO_MANY_REQUESTS {
            let retry_after = resp
                .headers()
                .get(header::RETRY_AFTER)
                .and_then(|v| v.to_str().ok())
                .and_then(|v| v.trim().parse::<f64>().ok())
                .map(Duration::from_secs_f64);
            return Err(ResolverError::RateLimited { retry_after });
        }
        if !status.is_success() {
            let text = resp.text().await.unwrap_or_default();
            let body: String = text.chars().take(200).collect();
            error!(
                %status,
                url = %self.url_chat,
                latency_ms = started.elapsed().as_millis(),
                "chat completion returned non-success status"
            );
            return Err(ResolverError::Http { status: status.as_u16(), body });
        }

        let out: ChatCompletionResponse = resp.json().await.map_err(|e| {
            ResolverError::Malformed(format!(
                "serde error: {e}; expected `choices[0].message.content`"
            ))
        })?;
        let content = out
            .choices
            .into_iter()
            .find_map(|c| c.message.content)
            .ok_or_else(|| ResolverError::Malformed("empty choices".to_string()))?;

        let used_tokens = out.usage.map(|u| u.total_tokens as usize).unwrap_or(estimated_tokens);
        let cost_usd = self.cost_of(used_tokens);

        let kinds: HashMap<&str, SymbolKind> =
            request.unresolved.iter().map(|s| (s.name.as_str(), s.kind)).collect();
        let proposals = parse_bindings(&content)?
            .into_iter()
            .map(|binding| DependencyRecord {
                kind: kinds.get(binding.symbol.as_str()).copied().unwrap_or(SymbolKind::Variable),
                symbol: binding.symbol,
                source_index: binding.source_index,
                confidence: binding.confidence,
                origin: Origin::External,
                required_by: None,
            })
            .collect::<Vec<_>>();

        info!(
            model = %self.model,
            snippet = request.target.index,
            proposals = proposals.len(),
            tokens = used_tokens,
            cost_usd,
            latency_ms = started.elapsed().as_millis(),
            "chat completion completed"
        );

        Ok(ResolverReply { proposals, cost_usd })
    }

    fn estimate_cost(&self, request: &ResolveRequest) -> f64 {
        self.cost_of(prompt_tokens(&build_prompt(request)))
    }

    fn name(&self) -> &str {
        "chat-completion"
    }
}

#[derive(Debug, Serialize)]
struct ChatCompletionRequest<'a> {
    model: &'a str,
    messages: Vec<ChatMessage<'a>>,
    temperature: f32,
    max_tokens: u32,
}

#[derive(Debug, Serialize)]
struct ChatMessage<'a> {
    role: &'a str,
    content: &'a str,
}

#[derive(Debug, Deserialize)]
struct ChatCompletionResponse {
    choices: Vec<Choice>,
    #[serde(default)]
    usage: Option<Usage>,
}

#[derive(Debug, Deserialize)]
struct Choice {
    message: ChoiceMessage,
}

#[derive(Debug, Deserialize)]
struct ChoiceMessage {
    #[serde(default)]
    content: Option<String>,
}

#[derive(Debug, Deserialize)]
struct Usage {
    total_tokens: u64,
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::analysis::Window;
    use crate::domain::Snippet;

    fn request(budget: f64) -> ResolveRequest {
        ResolveRequest {
            target: Snippet::new(1, "print(x)"),
            window: Window { lower: 0, upper: 1 },
            snippets: vec![Snippet::new(0, "x = 1"), Snippet::new(1, "print(x)")],
            unresolved: vec![],
            pattern_hints: vec![],
            budget_remaining: budget,
        }
    }

    #[test]
    fn rejects_non_http_endpoint() {
        let err = ChatCompletionResolver::new("ftp://x", "m", "k", 0.1, Duration::from_secs(1))
            .unwrap_err();
        assert!(matches!(err, ResolverError::Transport(_)));
    }

    #[tokio::test]
    async fn budget_precheck_skips_the_network() {
        let resolver =
            ChatCompletionResolver::new("http://127.0.0.1:9", "m", "k", 1.0, Duration::from_secs(1))
                .expect("client");
        let err = resolver.propose(&request(0.0001)).await.unwrap_err();
        assert!(matches!(err, ResolverError::BudgetExhausted { .. }));
    }

    #[test]
    fn estimate_covers_prompt_and_completion_ceiling() {
        let resolver =
            ChatCompletionResolver::new("http://127.0.0.1:9", "m", "k", 0.1, Duration::from_secs(1))
                .expect("client");
        let estimate = resolver.estimate_cost(&request(1.0));
        assert!(estimate >= MAX_TOKENS as f64 / 1000.0 * 0.1);
        assert!(estimate < 0.5);
    }

    #[test]
    fn missing_api_key_disables_resolver() {
        let cfg = AnalysisConfig {
            external_api_key_env: "SNIPPET_CONTEXT_TEST_UNSET_KEY_VAR".to_string(),
            ..Default::default()
        };
        assert!(ChatCompletionResolver::from_config(&cfg).expect("no error").is_none());
    }

    #[test]
    fn decodes_chat_completion_payload() {
        let raw = r#"{"choices":[{"message":{"content":"{\"bindings\":[]}"}}],"usage":{"prompt_tokens":10,"completion_tokens":5,"total_tokens":15}}"#;
        let parsed: ChatCompletionResponse = serde_json::from_str(raw).expect("decode");
        assert_eq!(parsed.usage.map(|u| u.total_tokens), Some(15));
        assert_eq!(parsed.choices[0].message.content.as_deref(), Some("{\"bindings\":[]}"));
    }
}
