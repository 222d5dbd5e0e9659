use anyhow::{Context, Result};
use regex::Regex;
use serde::{Deserialize, Serialize};

const MAX_TITLE_CHARS: usize = 100;

const URGENT_KEYWORDS: [&str; 4] = ["urgent", "critical", "asap", "blocker"];
const HIGH_KEYWORDS: [&str; 3] = ["important", "priority", "soon"];
const LOW_KEYWORDS: [&str; 3] = ["nice to have", "optional", "later"];

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum TaskPriority {
    Low,
    #[default]
    Medium,
    High,
    Urgent,
}

impl TaskPriority {
    pub fn detect(text: &str) -> Self {
        let lower = text.to_lowercase();
        let contains_any = |keywords: &[&str]| keywords.iter().any(|kw| lower.contains(kw));

        if contains_any(&URGENT_KEYWORDS) {
            TaskPriority::Urgent
        } else if contains_any(&HIGH_KEYWORDS) {
            TaskPriority::High
        } else if contains_any(&LOW_KEYWORDS) {
            TaskPriority::Low
        } else {
            TaskPriority::Medium
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum StructureSource {
    RuleBased,
    Llm,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct FieldConfidence {
    pub title: f64,
    pub outcome: f64,
    pub steps: f64,
    pub dod: f64,
    pub priority: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StructuredTask {
    pub raw_text: String,
    pub title: String,
    pub outcome: String,
    pub steps: Vec<String>,
    pub dod: Vec<String>,
    pub priority: TaskPriority,
    pub confidence: FieldConfidence,
    pub source: StructureSource,
}

pub struct TaskParser {
    outcome_patterns: Vec<Regex>,
    step_patterns: Vec<Regex>,
    bullet_prefix: Regex,
}

impl TaskParser {
    pub fn new() -> Result<Self> {
        let compile = |pattern: &str| {
            Regex::new(pattern).with_context(|| format!("Invalid task pattern: {pattern}"))
        };

        Ok(Self {
            outcome_patterns: vec![
                compile(r"(?i)\b(?:so that|to ensure|in order to)\s+(.+)")?,
                compile(r"(?i)\b(?:goal|outcome|result):\s*(.+)")?,
            ],
            step_patterns: vec![compile(r"^\d+[.)]\s*(.+)")?, compile(r"^[-•*]\s*(.+)")?],
            bullet_prefix: compile(r"^[-•*\d.)]+\s*")?,
        })
    }

    pub fn parse(&self, raw_text: &str) -> StructuredTask {
        let lines = raw_text
            .lines()
            .map(str::trim)
            .filter(|line| !line.is_empty())
            .collect::<Vec<_>>();

        let first_line = lines.first().copied().unwrap_or_else(|| raw_text.trim());
        let title = self
            .bullet_prefix
            .replace(first_line, "")
            .trim()
            .chars()
            .take(MAX_TITLE_CHARS)
            .collect::<String>();

        let outcome = lines.iter().find_map(|line| {
            self.outcome_patterns
                .iter()
                .find_map(|pattern| pattern.captures(line))
                .and_then(|captures| captures.get(1))
                .map(|found| found.as_str().trim().to_string())
        });

        let steps = lines
            .iter()
            .skip(1)
            .filter_map(|line| {
                self.step_patterns
                    .iter()
                    .find_map(|pattern| pattern.captures(line))
                    .and_then(|captures| captures.get(1))
                    .map(|found| found.as_str().trim().to_string())
            })
            .collect::<Vec<_>>();

        let confidence = FieldConfidence {
            title: 0.9,
            outcome: if outcome.is_some() { 0.7 } else { 0.4 },
            steps: if steps.is_empty() { 0.3 } else { 0.8 },
            dod: 0.6,
            priority: 0.5,
        };

        StructuredTask {
            raw_text: raw_text.to_string(),
            outcome: outcome.unwrap_or_else(|| format!("Complete: {title}")),
            steps: if steps.is_empty() {
                vec![format!("Complete the task: {title}")]
            } else {
                steps
            },
            dod: default_dod(&title),
            priority: TaskPriority::detect(raw_text),
            confidence,
            source: StructureSource::RuleBased,
            title,
        }
    }
}

pub fn default_dod(title: &str) -> Vec<String> {
    let lower = title.to_lowercase();
    let (first, second) = if lower.contains("fix") || lower.contains("bug") {
        (
            "Bug is no longer reproducible",
            "Tests added to prevent regression",
        )
    } else if lower.contains("implement") || lower.contains("add") {
        ("Feature works as expected", "Code reviewed and merged")
    } else {
        ("Task completed successfully", "All acceptance criteria met")
    };

    vec![first.to_string(), second.to_string()]
}
