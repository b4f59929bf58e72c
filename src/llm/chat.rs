//! Chat-completions scorer client.
//!
//! Sends the candidate batch to an OpenAI-shaped chat endpoint and parses
//! the JSON array the model is instructed to return. Parsing is tolerant of
//! a `results`/`clips` wrapper object and of JSON embedded in surrounding
//! prose, but anything not structurally a list of objects is rejected.

use serde_json::{json, Value};
use std::time::Duration;
use tracing::{info, warn};

use super::{ClipScorer, LlmClientError, ScoreRequest, ScoreResponse, ScoredClip};
use crate::models::{LlmTrim, TokenUsage};

pub const PROMPT_COST_PER_1M: f64 = 0.14;
pub const COMPLETION_COST_PER_1M: f64 = 0.28;

const CANDIDATE_TEXT_LIMIT: usize = 1500;

pub struct ChatCompletionsScorer {
    api_key: String,
    base_url: String,
    model: String,
    client: reqwest::Client,
}

impl ChatCompletionsScorer {
    pub fn new(
        api_key: impl Into<String>,
        base_url: impl Into<String>,
        model: impl Into<String>,
        timeout: Duration,
    ) -> Result<Self, LlmClientError> {
        let api_key = api_key.into();
        let base_url = base_url.into();
        let model = model.into();

        if api_key.trim().is_empty() {
            return Err(LlmClientError::NotConfigured("api key"));
        }
        if base_url.trim().is_empty() {
            return Err(LlmClientError::NotConfigured("base url"));
        }
        if model.trim().is_empty() {
            return Err(LlmClientError::NotConfigured("model"));
        }

        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| LlmClientError::Request(e.to_string()))?;

        Ok(Self {
            api_key,
            base_url,
            model,
            client,
        })
    }

    fn endpoint(&self) -> String {
        resolve_endpoint(&self.base_url)
    }

    fn build_payload(&self, candidates: &[ScoreRequest]) -> Value {
        let prompt_candidates: Vec<Value> = candidates
            .iter()
            .map(|item| {
                json!({
                    "id": item.id,
                    "text": trim_text(&item.text, CANDIDATE_TEXT_LIMIT),
                    "approx_duration_sec": item.approx_duration_sec,
                })
            })
            .collect();

        let system_prompt = "Eres un experto en evaluar clips de sermones para redes sociales. \
            Criterios de evaluacion (0-100): \
            1. HOOK (0-25): captura atencion en los primeros segundos. \
            2. CLARIDAD (0-25): se entiende sin contexto previo. \
            3. APLICABILIDAD (0-25): relevante para la vida diaria. \
            4. EMOCION (0-25): genera respuesta emocional. \
            Prioriza clips que sean autonomos, con conclusion clara, \
            compartibles en redes sociales y conecten emocionalmente. \
            Devuelve SOLO JSON (sin markdown) como una lista de objetos con: \
            id, score (0-100), reason, y opcional trim_suggestion \
            (start_offset_sec, end_offset_sec, confidence). \
            Los offsets son segundos a recortar desde inicio y fin (>=0), \
            confidence es de 0 a 1. \
            Si sugieres recortes, mantenlos pequenos y evita cortar palabras.";

        let user_prompt = format!(
            "Candidates JSON:\n{}\n\nReturn a JSON array with one entry per candidate id.",
            serde_json::to_string(&prompt_candidates).unwrap_or_default()
        );

        json!({
            "model": self.model,
            "messages": [
                {"role": "system", "content": system_prompt},
                {"role": "user", "content": user_prompt},
            ],
            "temperature": 0.2,
        })
    }
}

#[async_trait::async_trait]
impl ClipScorer for ChatCompletionsScorer {
    async fn score(&self, candidates: &[ScoreRequest]) -> Result<ScoreResponse, LlmClientError> {
        let payload = self.build_payload(candidates);

        let response = self
            .client
            .post(self.endpoint())
            .header("Authorization", format!("Bearer {}", self.api_key))
            .header("Content-Type", "application/json")
            .json(&payload)
            .send()
            .await
            .map_err(|e| LlmClientError::Request(e.to_string()))?;

        let status = response.status();
        let body = response
            .text()
            .await
            .map_err(|e| LlmClientError::Request(e.to_string()))?;

        if status.as_u16() >= 300 {
            warn!(
                status = status.as_u16(),
                body = %head(&body, 500),
                "LLM scorer HTTP error"
            );
            return Err(LlmClientError::Http {
                status: status.as_u16(),
            });
        }

        let data: Value = serde_json::from_str(&body).map_err(|e| {
            warn!(body = %head(&body, 500), "LLM response not JSON");
            LlmClientError::InvalidJson(e.to_string())
        })?;

        let token_usage = extract_token_usage(&data);
        let content = extract_message_content(&data)?;
        let parsed = coerce_json(content).map_err(|e| {
            warn!(content = %head(content, 500), "LLM content not JSON");
            LlmClientError::InvalidJson(e.to_string())
        })?;

        let items = match parsed {
            Value::Array(items) => items,
            Value::Object(map) => ["results", "clips"]
                .iter()
                .find_map(|key| {
                    map.get(*key)
                        .and_then(Value::as_array)
                        .filter(|items| !items.is_empty())
                })
                .cloned()
                .unwrap_or_default(),
            _ => return Err(LlmClientError::MissingContent("result list")),
        };

        let clips = validate_items(&items);
        if clips.len() < candidates.len() {
            return Err(LlmClientError::Incomplete {
                expected: candidates.len(),
                got: clips.len(),
            });
        }

        log_token_usage("LLM scoring", &token_usage);
        Ok(ScoreResponse { clips, token_usage })
    }
}

pub(crate) fn resolve_endpoint(base_url: &str) -> String {
    let base = base_url.trim_end_matches('/');
    if base.ends_with("/chat/completions") {
        base.to_string()
    } else {
        format!("{base}/chat/completions")
    }
}

/// Normalise whitespace; past `limit` chars, collapse to a head/middle/tail
/// summary joined by " ... ".
pub(crate) fn trim_text(text: &str, limit: usize) -> String {
    let normalized: String = text.split_whitespace().collect::<Vec<_>>().join(" ");
    let chars: Vec<char> = normalized.chars().collect();
    if chars.len() <= limit {
        return normalized;
    }
    if limit < 300 {
        return chars[..limit].iter().collect();
    }

    let sep = " ... ";
    let sep_len = sep.len();
    let part_len = std::cmp::max(200, (limit - 2 * sep_len) / 3);
    let middle_len = std::cmp::max(50, limit.saturating_sub(part_len * 2 + 2 * sep_len));
    let middle_start = (chars.len() / 2).saturating_sub(middle_len / 2);
    let middle_end = std::cmp::min(chars.len(), middle_start + middle_len);

    let head: String = chars[..part_len].iter().collect();
    let middle: String = chars[middle_start..middle_end].iter().collect();
    let tail: String = chars[chars.len() - part_len..].iter().collect();
    let combined = format!("{head}{sep}{middle}{sep}{tail}");
    combined.chars().take(limit).collect()
}

fn extract_message_content(payload: &Value) -> Result<&str, LlmClientError> {
    let content = payload
        .get("choices")
        .and_then(Value::as_array)
        .and_then(|choices| choices.first())
        .ok_or(LlmClientError::MissingContent("choices"))?
        .get("message")
        .and_then(|message| message.get("content"))
        .and_then(Value::as_str)
        .ok_or(LlmClientError::MissingContent("content"))?;

    if content.is_empty() {
        return Err(LlmClientError::MissingContent("content"));
    }
    Ok(content)
}

/// Parse `content` as JSON; when it fails, extract the fragment between the
/// outermost `[...]` (or `{...}`) and parse that.
pub(crate) fn coerce_json(content: &str) -> Result<Value, serde_json::Error> {
    match serde_json::from_str(content) {
        Ok(value) => Ok(value),
        Err(original) => {
            if let (Some(start), Some(end)) = (content.find('['), content.rfind(']')) {
                if end > start {
                    return serde_json::from_str(&content[start..=end]);
                }
            }
            if let (Some(start), Some(end)) = (content.find('{'), content.rfind('}')) {
                if end > start {
                    return serde_json::from_str(&content[start..=end]);
                }
            }
            Err(original)
        }
    }
}

fn validate_items(items: &[Value]) -> Vec<ScoredClip> {
    let mut results = Vec::new();
    for item in items {
        let Some(map) = item.as_object() else {
            continue;
        };

        let id = match map.get("id") {
            Some(Value::String(s)) => s.trim().to_string(),
            Some(Value::Number(n)) => n.to_string(),
            _ => continue,
        };
        if id.is_empty() {
            continue;
        }

        let Some(score) = map.get("score").and_then(coerce_f64) else {
            continue;
        };

        let reason = map
            .get("reason")
            .and_then(Value::as_str)
            .unwrap_or_default()
            .trim()
            .to_string();

        let trim = map
            .get("trim_suggestion")
            .filter(|v| v.is_object())
            .and_then(|v| serde_json::from_value::<LlmTrim>(v.clone()).ok());
        let trim_confidence = map
            .get("trim_confidence")
            .and_then(coerce_f64)
            .or_else(|| trim.as_ref().and_then(|t| t.confidence));

        results.push(ScoredClip {
            id,
            score: score.clamp(0.0, 100.0),
            reason,
            trim,
            trim_confidence,
        });
    }
    results
}

fn coerce_f64(value: &Value) -> Option<f64> {
    match value {
        Value::Number(n) => n.as_f64(),
        Value::String(s) => s.trim().parse().ok(),
        _ => None,
    }
}

fn usage_value(usage: &Value, keys: &[&str]) -> Option<i64> {
    keys.iter()
        .find_map(|key| usage.get(key).and_then(Value::as_i64))
}

/// Pull token counts out of the response envelope, tolerating the naming
/// variants different providers use.
pub(crate) fn extract_token_usage(payload: &Value) -> TokenUsage {
    let empty = json!({});
    let usage = payload.get("usage").unwrap_or(&empty);

    let prompt_tokens = usage_value(usage, &["prompt_tokens", "input_tokens"]).unwrap_or(0);
    let completion_tokens =
        usage_value(usage, &["completion_tokens", "output_tokens"]).unwrap_or(0);
    let total_tokens =
        usage_value(usage, &["total_tokens"]).unwrap_or(prompt_tokens + completion_tokens);
    let output_tokens = usage_value(usage, &["output_tokens"]).unwrap_or(completion_tokens);
    let cache_hit_tokens = usage_value(
        usage,
        &["prompt_cache_hit_tokens", "cache_hit_tokens", "cache_hit"],
    );
    let cache_miss_tokens = usage_value(
        usage,
        &["prompt_cache_miss_tokens", "cache_miss_tokens", "cache_miss"],
    );

    let estimated_cost_usd = (prompt_tokens as f64 / 1_000_000.0) * PROMPT_COST_PER_1M
        + (completion_tokens as f64 / 1_000_000.0) * COMPLETION_COST_PER_1M;

    TokenUsage {
        prompt_tokens,
        completion_tokens,
        output_tokens,
        cache_hit_tokens,
        cache_miss_tokens,
        total_tokens,
        estimated_cost_usd,
    }
}

fn log_token_usage(label: &str, usage: &TokenUsage) {
    info!(
        label,
        prompt = usage.prompt_tokens,
        output = usage.output_tokens,
        total = usage.total_tokens,
        cache_hit = ?usage.cache_hit_tokens,
        cache_miss = ?usage.cache_miss_tokens,
        cost_usd = usage.estimated_cost_usd,
        "LLM token usage"
    );
}

fn head(text: &str, limit: usize) -> String {
    text.chars().take(limit).collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_resolve_endpoint() {
        assert_eq!(
            resolve_endpoint("https://api.example.com/v1"),
            "https://api.example.com/v1/chat/completions"
        );
        assert_eq!(
            resolve_endpoint("https://api.example.com/v1/chat/completions/"),
            "https://api.example.com/v1/chat/completions"
        );
    }

    #[test]
    fn test_trim_text_short_passthrough() {
        assert_eq!(trim_text("  hola   mundo \n", 1500), "hola mundo");
    }

    #[test]
    fn test_trim_text_summarises_long_input() {
        let text = "palabra ".repeat(400);
        let trimmed = trim_text(&text, 1500);
        assert!(trimmed.chars().count() <= 1500);
        assert_eq!(trimmed.matches(" ... ").count(), 2);
    }

    #[test]
    fn test_trim_text_tiny_limit_truncates() {
        let text = "palabra ".repeat(100);
        let trimmed = trim_text(&text, 100);
        assert_eq!(trimmed.chars().count(), 100);
        assert!(!trimmed.contains(" ... "));
    }

    #[test]
    fn test_coerce_json_direct() {
        let value = coerce_json(r#"[{"id": "c0"}]"#).unwrap();
        assert!(value.is_array());
    }

    #[test]
    fn test_coerce_json_embedded_in_prose() {
        let value = coerce_json("Claro, aqui tienes:\n[{\"id\": \"c0\"}]\nEspero que sirva.")
            .unwrap();
        assert_eq!(value[0]["id"], "c0");

        let value = coerce_json("Resultado: {\"results\": []} listo").unwrap();
        assert!(value["results"].is_array());
    }

    #[test]
    fn test_coerce_json_rejects_garbage() {
        assert!(coerce_json("no json here").is_err());
    }

    #[test]
    fn test_validate_items_filters_and_clamps() {
        let items = vec![
            json!({"id": "c0", "score": 140, "reason": " bueno "}),
            json!({"id": "", "score": 50}),
            json!({"id": "c1", "score": "not a number"}),
            json!("just a string"),
            json!({"id": "c2", "score": "88.5", "trim_suggestion": {
                "start_offset_sec": 1.5, "end_offset_sec": 0.5, "confidence": 0.9
            }}),
        ];

        let clips = validate_items(&items);
        assert_eq!(clips.len(), 2);
        assert_eq!(clips[0].score, 100.0);
        assert_eq!(clips[0].reason, "bueno");
        assert_eq!(clips[1].score, 88.5);
        assert_eq!(clips[1].trim_confidence, Some(0.9));
        assert_eq!(clips[1].trim.as_ref().unwrap().start_offset_sec, 1.5);
    }

    #[test]
    fn test_validate_items_top_level_trim_confidence_wins() {
        let items = vec![json!({"id": "c0", "score": 70, "trim_confidence": 0.4,
            "trim_suggestion": {"start_offset_sec": 2.0, "confidence": 0.95}})];
        let clips = validate_items(&items);
        assert_eq!(clips[0].trim_confidence, Some(0.4));
    }

    #[test]
    fn test_extract_token_usage_aliases() {
        let usage = extract_token_usage(&json!({
            "usage": {
                "input_tokens": 1000,
                "output_tokens": 500,
                "prompt_cache_hit_tokens": 200
            }
        }));
        assert_eq!(usage.prompt_tokens, 1000);
        assert_eq!(usage.completion_tokens, 500);
        assert_eq!(usage.total_tokens, 1500);
        assert_eq!(usage.cache_hit_tokens, Some(200));
        assert!(usage.cache_miss_tokens.is_none());
        let expected_cost = 1000.0 / 1e6 * 0.14 + 500.0 / 1e6 * 0.28;
        assert!((usage.estimated_cost_usd - expected_cost).abs() < 1e-12);
    }

    #[test]
    fn test_extract_token_usage_missing_envelope() {
        let usage = extract_token_usage(&json!({}));
        assert_eq!(usage, TokenUsage::default());
    }

    #[test]
    fn test_constructor_requires_configuration() {
        let result = ChatCompletionsScorer::new(
            " ",
            "https://api.example.com/v1",
            "scorer-1",
            Duration::from_secs(60),
        );
        assert!(matches!(result, Err(LlmClientError::NotConfigured("api key"))));
    }
}
