pub mod structurizer;

use crate::ai::structurizer::{
    FieldConfidence, StructureSource, StructuredTask, TaskParser, TaskPriority,
};
use crate::analyzer::mentor::{AdviceSource, MentorAdvice};
use crate::config::Config;
use anyhow::{Context, Result, anyhow, bail};
use reqwest::blocking::Client;
use reqwest::header::{AUTHORIZATION, CONTENT_TYPE, HeaderMap, HeaderValue};
use serde::Deserialize;
use serde_json::json;
use std::time::Duration;
use tracing::warn;

const API_KEY_ENV: &str = "TEAMPULSE_AI_API_KEY";
const MAX_MENTOR_ITEMS: usize = 3;

#[derive(Debug, Deserialize)]
struct ChatCompletionResponse {
    choices: Vec<ChatChoice>,
}

#[derive(Debug, Deserialize)]
struct ChatChoice {
    message: ChatMessage,
}

#[derive(Debug, Deserialize)]
struct ChatMessage {
    content: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct AiStructuredTaskPayload {
    title: Option<String>,
    outcome: Option<String>,
    steps: Option<Vec<String>>,
    dod: Option<Vec<String>>,
    priority: Option<TaskPriority>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default, rename_all = "camelCase")]
struct AiMentorPayload {
    actions: Option<Vec<String>>,
    warnings: Option<Vec<String>>,
    insights: Option<Vec<String>>,
    main_focus: Option<String>,
    summary: Option<String>,
}

pub fn structure_task(config: &Config, raw_text: &str) -> Result<StructuredTask> {
    if raw_text.trim().is_empty() {
        bail!("rawText is required");
    }

    let parser = TaskParser::new()?;
    let Some(api_key) = active_api_key(config) else {
        return Ok(parser.parse(raw_text));
    };

    match structure_task_with_llm(config, &api_key, raw_text) {
        Ok(task) => Ok(task),
        Err(error) => {
            warn!(error = %error, "AI task structuring failed, using rule-based parser");
            Ok(parser.parse(raw_text))
        }
    }
}

fn structure_task_with_llm(config: &Config, api_key: &str, raw_text: &str) -> Result<StructuredTask> {
    let system_prompt = r#"You are a task structuring assistant. Return JSON only: {"title":"concise task title","outcome":"what success looks like","steps":["..."],"dod":["definition of done item"],"priority":"LOW|MEDIUM|HIGH|URGENT"}"#;
    let user_prompt = format!("Parse this task:\n\n{raw_text}");

    let content = chat_completion(config, api_key, system_prompt, &user_prompt)?;
    let parsed: AiStructuredTaskPayload = parse_ai_payload(&content)?;

    let title = parsed
        .title
        .map(|title| title.trim().to_string())
        .filter(|title| !title.is_empty())
        .unwrap_or_else(|| raw_text.trim().chars().take(100).collect());

    Ok(StructuredTask {
        raw_text: raw_text.to_string(),
        outcome: parsed
            .outcome
            .filter(|outcome| !outcome.trim().is_empty())
            .unwrap_or_else(|| format!("Complete: {title}")),
        steps: non_empty_items(parsed.steps)
            .unwrap_or_else(|| vec![format!("Complete the task: {title}")]),
        dod: non_empty_items(parsed.dod)
            .unwrap_or_else(|| vec!["Task completed successfully".to_string()]),
        priority: parsed.priority.unwrap_or_default(),
        confidence: FieldConfidence {
            title: 0.95,
            outcome: 0.9,
            steps: 0.9,
            dod: 0.85,
            priority: 0.8,
        },
        source: StructureSource::Llm,
        title,
    })
}

pub fn enhance_mentor_advice(config: &Config, advice: MentorAdvice, tone: &str) -> MentorAdvice {
    let Some(api_key) = active_api_key(config) else {
        return advice;
    };

    match mentor_with_llm(config, &api_key, &advice, tone) {
        Ok(enhanced) => enhanced,
        Err(error) => {
            warn!(error = %error, "AI mentor enhancement failed, keeping rule-based advice");
            advice
        }
    }
}

fn mentor_with_llm(
    config: &Config,
    api_key: &str,
    advice: &MentorAdvice,
    tone: &str,
) -> Result<MentorAdvice> {
    let system_prompt = format!(
        r#"You are a {tone} work mentor. Rewrite the given daily advice for the employee. Return JSON only: {{"actions":["at most 3"],"warnings":["..."],"insights":["..."],"mainFocus":"...","summary":"one sentence"}}"#
    );
    let user_payload = serde_json::to_string(advice).context("Failed to serialize advice")?;

    let content = chat_completion(config, api_key, &system_prompt, &user_payload)?;
    let parsed: AiMentorPayload = parse_ai_payload(&content)?;

    let mut actions = non_empty_items(parsed.actions).unwrap_or_else(|| advice.actions.clone());
    actions.truncate(MAX_MENTOR_ITEMS);

    Ok(MentorAdvice {
        date: advice.date,
        summary: parsed
            .summary
            .filter(|summary| !summary.trim().is_empty())
            .or_else(|| actions.first().cloned())
            .unwrap_or_else(|| advice.summary.clone()),
        actions,
        warnings: non_empty_items(parsed.warnings).unwrap_or_else(|| advice.warnings.clone()),
        insights: non_empty_items(parsed.insights).unwrap_or_else(|| advice.insights.clone()),
        main_focus: parsed
            .main_focus
            .filter(|focus| !focus.trim().is_empty())
            .unwrap_or_else(|| advice.main_focus.clone()),
        task_count: advice.task_count,
        completion_rate: advice.completion_rate,
        source: AdviceSource::Llm,
    })
}

pub fn test_connection(config: &Config) -> Result<String> {
    let api_key = resolve_api_key(config).with_context(|| {
        format!("AI API key is missing. Set `teampulse config set ai.api_key <KEY>` or `{API_KEY_ENV}`.")
    })?;

    let system_prompt = "Return exactly one short sentence confirming AI API connectivity is healthy.";
    let user_prompt = "Health check for TeamPulse.";

    chat_completion(config, &api_key, system_prompt, user_prompt)
}

pub fn has_api_key(config: &Config) -> bool {
    resolve_api_key(config).is_some()
}

fn active_api_key(config: &Config) -> Option<String> {
    if !config.ai_enabled {
        return None;
    }
    resolve_api_key(config)
}

fn resolve_api_key(config: &Config) -> Option<String> {
    std::env::var(API_KEY_ENV)
        .ok()
        .filter(|value| !value.trim().is_empty())
        .or_else(|| {
            config
                .ai_api_key
                .clone()
                .filter(|value| !value.trim().is_empty())
        })
}

fn non_empty_items(items: Option<Vec<String>>) -> Option<Vec<String>> {
    let items = items?
        .into_iter()
        .map(|item| item.trim().to_string())
        .filter(|item| !item.is_empty())
        .collect::<Vec<_>>();

    (!items.is_empty()).then_some(items)
}

fn chat_completion(config: &Config, api_key: &str, system: &str, user: &str) -> Result<String> {
    let base_url = config.ai_api_base_url.clone();
    let model = config.ai_model.clone();
    let timeout_seconds = config.ai_timeout_seconds.max(5);
    let api_key = api_key.to_string();
    let system = system.to_string();
    let user = user.to_string();

    std::thread::spawn(move || {
        chat_completion_blocking(&base_url, &model, timeout_seconds, &api_key, &system, &user)
    })
    .join()
    .map_err(|_| anyhow!("AI worker thread panicked"))?
}

fn chat_completion_blocking(
    base_url: &str,
    model: &str,
    timeout_seconds: u64,
    api_key: &str,
    system: &str,
    user: &str,
) -> Result<String> {
    if api_key.trim().is_empty() {
        bail!("AI API key is empty");
    }

    let endpoint = format!("{}/chat/completions", base_url.trim_end_matches('/'));

    let mut headers = HeaderMap::new();
    headers.insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));
    headers.insert(
        AUTHORIZATION,
        HeaderValue::from_str(&format!("Bearer {api_key}"))
            .context("Failed to build Authorization header")?,
    );

    let client = Client::builder()
        .timeout(Duration::from_secs(timeout_seconds))
        .default_headers(headers)
        .build()
        .context("Failed to create AI HTTP client")?;

    let request_body = json!({
        "model": model,
        "temperature": 0.3,
        "messages": [
            {"role": "system", "content": system},
            {"role": "user", "content": user}
        ]
    });

    let response = client
        .post(endpoint)
        .json(&request_body)
        .send()
        .context("AI API request failed")?;

    let status = response.status();
    let body = response.text().context("Failed to read AI response body")?;

    if !status.is_success() {
        bail!("AI API error {}: {}", status, body);
    }

    let parsed: ChatCompletionResponse = serde_json::from_str(&body)
        .with_context(|| format!("Failed to parse AI response: {body}"))?;

    parsed
        .choices
        .first()
        .and_then(|choice| choice.message.content.clone())
        .map(|content| content.trim().to_string())
        .filter(|content| !content.is_empty())
        .ok_or_else(|| anyhow!("AI response did not include message.content"))
}

fn parse_ai_payload<T: serde::de::DeserializeOwned>(content: &str) -> Result<T> {
    let extracted = extract_json_block(content);
    serde_json::from_str(&extracted)
        .with_context(|| format!("Failed to parse AI JSON payload. content: {content}"))
}

fn extract_json_block(content: &str) -> String {
    let fenced = content.split("```").map(str::trim).find_map(|block| {
        block
            .strip_prefix("json")
            .map(str::trim)
            .or_else(|| block.starts_with('{').then_some(block))
    });

    match fenced {
        Some(block) => block.to_string(),
        None => {
            let first = content.find('{');
            let last = content.rfind('}');

            match (first, last) {
                (Some(start), Some(end)) if end > start => content[start..=end].to_string(),
                _ => content.trim().to_string(),
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn extracts_fenced_and_inline_json() {
        let fenced = "Here you go:\n```json\n{\"title\":\"Ship\"}\n```";
        assert_eq!(extract_json_block(fenced), "{\"title\":\"Ship\"}");

        let inline = "Sure! {\"summary\":\"ok\"} hope it helps";
        assert_eq!(extract_json_block(inline), "{\"summary\":\"ok\"}");
    }

    #[test]
    fn partial_llm_payload_parses_with_missing_fields() {
        let parsed: AiStructuredTaskPayload =
            parse_ai_payload("```json\n{\"title\":\"Ship\",\"priority\":\"URGENT\"}\n```")
                .expect("payload");

        assert_eq!(parsed.title.as_deref(), Some("Ship"));
        assert_eq!(parsed.priority, Some(TaskPriority::Urgent));
        assert!(parsed.steps.is_none());
    }

    #[test]
    fn disabled_ai_uses_rule_based_structuring() {
        let config = Config {
            ai_enabled: false,
            ..Config::default()
        };

        let task = structure_task(&config, "Add CSV export\n1. Build endpoint").expect("task");
        assert_eq!(task.source, StructureSource::RuleBased);
        assert_eq!(task.steps, vec!["Build endpoint"]);
        assert!(structure_task(&config, "   ").is_err());
    }

    #[test]
    fn blank_items_are_dropped() {
        assert_eq!(
            non_empty_items(Some(vec![" a ".into(), "  ".into()])),
            Some(vec!["a".to_string()])
        );
        assert_eq!(non_empty_items(Some(vec![" ".into()])), None);
        assert_eq!(non_empty_items(None), None);
    }
}
