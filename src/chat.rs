//! OpenAI-compatible chat-completions client backing the reasoning oracles.
//!
//! Requests ask for JSON output (`response_format: json_object`). Replies are
//! parsed leniently since models wrap arrays in objects or return a single
//! object where a list was asked for.

use std::fmt::Write as _;
use std::sync::Arc;

use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::{debug, info, warn};

use crate::backoff::{BackoffPolicy, Sleeper, ThreadSleeper};
use crate::error::OracleError;
use crate::traits::{CandidateSummary, Judgment, TransitChoice, TransitChooser, TransitRequest, ValueJudge};

const JUDGE_SYSTEM_PROMPT: &str = "You are a senior investment advisor planning company visits. \
Score every company in the table. Reply with JSON only: an array of objects with the fields \
\"name\" (company name, verbatim), \"S_attract\" (attractiveness 0-10), \"S_feas\" \
(feasibility 0-10 given the travel times and the available time) and \"reasoning\" (one short sentence).";

const CHOOSER_SYSTEM_PROMPT: &str = "You are a travel planner choosing one inter-city train or flight. \
Prefer offers that reach the arrival hub no later than the latest hub arrival, then shorter door-to-door \
time, then lower price. Reply with JSON only: {\"type\": \"Flight\" or \"Train\", \"id\": \"<offer id>\", \
\"reasoning\": \"<one short sentence>\"}.";

#[derive(Debug, Clone)]
pub struct ChatConfig {
    pub api_key: String,
    pub base_url: String,
    pub model: String,
    pub temperature: f32,
    pub timeout_secs: u64,
}

impl Default for ChatConfig {
    fn default() -> Self {
        Self {
            api_key: String::new(),
            base_url: "https://api.deepseek.com".to_string(),
            model: "deepseek-chat".to_string(),
            temperature: 0.5,
            timeout_secs: 60,
        }
    }
}

impl ChatConfig {
    pub fn with_api_key(mut self, key: impl Into<String>) -> Self {
        self.api_key = key.into();
        self
    }

    pub fn with_base_url(mut self, url: impl Into<String>) -> Self {
        self.base_url = url.into();
        self
    }

    pub fn with_model(mut self, model: impl Into<String>) -> Self {
        self.model = model.into();
        self
    }
}

pub struct ChatClient {
    config: ChatConfig,
    client: reqwest::blocking::Client,
    policy: BackoffPolicy,
    sleeper: Arc<dyn Sleeper>,
}

impl ChatClient {
    pub fn new(config: ChatConfig) -> Result<Self, reqwest::Error> {
        let client = reqwest::blocking::Client::builder()
            .timeout(std::time::Duration::from_secs(config.timeout_secs))
            .build()?;

        Ok(Self {
            config,
            client,
            policy: BackoffPolicy::default(),
            sleeper: Arc::new(ThreadSleeper),
        })
    }

    pub fn with_policy(mut self, policy: BackoffPolicy) -> Self {
        self.policy = policy;
        self
    }

    pub fn with_sleeper(mut self, sleeper: Arc<dyn Sleeper>) -> Self {
        self.sleeper = sleeper;
        self
    }

    fn complete(&self, system: &str, user: &str) -> Result<String, OracleError> {
        self.policy
            .retry(self.sleeper.as_ref(), OracleError::is_retryable, |attempt| {
                debug!(model = %self.config.model, attempt, "chat completion request");
                self.send(system, user)
            })
    }

    fn send(&self, system: &str, user: &str) -> Result<String, OracleError> {
        let request = ChatRequest {
            model: &self.config.model,
            messages: vec![
                ChatMessage {
                    role: "system",
                    content: system,
                },
                ChatMessage {
                    role: "user",
                    content: user,
                },
            ],
            temperature: self.config.temperature,
            response_format: ResponseFormat { kind: "json_object" },
        };

        let response = self
            .client
            .post(format!(
                "{}/chat/completions",
                self.config.base_url.trim_end_matches('/')
            ))
            .bearer_auth(&self.config.api_key)
            .json(&request)
            .send()?;

        let status = response.status();
        if status.as_u16() == 429 {
            return Err(OracleError::RateLimited("chat endpoint returned 429".to_string()));
        }
        if status.is_server_error() {
            return Err(OracleError::TransientNetwork(format!(
                "chat endpoint returned {status}"
            )));
        }
        if !status.is_success() {
            let body = response.text().unwrap_or_default();
            return Err(OracleError::Permanent(format!("chat endpoint returned {status}: {body}")));
        }

        let body: ChatResponse = response.json()?;
        body.choices
            .into_iter()
            .next()
            .map(|choice| choice.message.content)
            .ok_or_else(|| OracleError::Permanent("chat response has no choices".to_string()))
    }
}

impl ValueJudge for ChatClient {
    fn score(
        &self,
        candidates: &[CandidateSummary],
        available_minutes: f64,
    ) -> Result<Vec<Judgment>, OracleError> {
        let prompt = judge_prompt(candidates, available_minutes);
        let content = self.complete(JUDGE_SYSTEM_PROMPT, &prompt)?;
        let judgments = parse_judgments(&content)?;
        info!(asked = candidates.len(), answered = judgments.len(), "value judgments received");
        Ok(judgments)
    }
}

impl TransitChooser for ChatClient {
    fn choose(&self, request: &TransitRequest<'_>) -> Result<TransitChoice, OracleError> {
        let prompt = serde_json::to_string_pretty(request)
            .map_err(|e| OracleError::Permanent(format!("cannot encode transit request: {e}")))?;
        let content = self.complete(CHOOSER_SYSTEM_PROMPT, &prompt)?;
        parse_choice(&content)
    }
}

fn judge_prompt(candidates: &[CandidateSummary], available_minutes: f64) -> String {
    let mut prompt = format!(
        "Available time between hub arrival and the meeting deadline: {available_minutes:.1} min. \
         Each visit takes a fixed slot on top of the drive times below.\n\n\
         | Company | Industry | Description | Hub to company (min) | Company to venue (min) | Total drive (min) |\n\
         | :--- | :--- | :--- | :--- | :--- | :--- |\n"
    );
    for c in candidates {
        let _ = writeln!(
            prompt,
            "| {} | {} | {} | {:.1} | {:.1} | {:.1} |",
            c.name, c.industry, c.description, c.hub_minutes, c.venue_minutes, c.total_minutes
        );
    }
    prompt
}

/// Accepts `[...]`, `{"<any key>": [...]}`, or a single judgment object.
/// Entries that do not deserialize are skipped.
pub fn parse_judgments(content: &str) -> Result<Vec<Judgment>, OracleError> {
    let value: Value = serde_json::from_str(content)
        .map_err(|e| OracleError::Permanent(format!("judgments are not JSON: {e}")))?;

    let entries = match value {
        Value::Array(items) => items,
        Value::Object(map) => {
            match map.values().find_map(|v| v.as_array().cloned()) {
                Some(items) => items,
                None => vec![Value::Object(map)],
            }
        }
        other => {
            return Err(OracleError::Permanent(format!(
                "unexpected judgments payload: {other}"
            )));
        }
    };

    Ok(entries
        .into_iter()
        .filter_map(|entry| match serde_json::from_value::<Judgment>(entry) {
            Ok(judgment) => Some(judgment),
            Err(err) => {
                warn!(error = %err, "skipping malformed judgment");
                None
            }
        })
        .collect())
}

pub fn parse_choice(content: &str) -> Result<TransitChoice, OracleError> {
    serde_json::from_str(content)
        .map_err(|e| OracleError::Permanent(format!("transit choice is not valid JSON: {e}")))
}

#[derive(Serialize)]
struct ChatRequest<'a> {
    model: &'a str,
    messages: Vec<ChatMessage<'a>>,
    temperature: f32,
    response_format: ResponseFormat,
}

#[derive(Serialize)]
struct ChatMessage<'a> {
    role: &'a str,
    content: &'a str,
}

#[derive(Serialize)]
struct ResponseFormat {
    #[serde(rename = "type")]
    kind: &'static str,
}

#[derive(Deserialize)]
struct ChatResponse {
    choices: Vec<ChatChoice>,
}

#[derive(Deserialize)]
struct ChatChoice {
    message: ChatReply,
}

#[derive(Deserialize)]
struct ChatReply {
    #[serde(default)]
    content: String,
}
