use crate::model::DailyReport;
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

const RECENT_REPORTS: usize = 5;
const MANY_TASKS: u32 = 8;
const MAX_ACTIONS: usize = 3;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum AdviceSource {
    RuleBased,
    Llm,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MentorAdvice {
    pub date: NaiveDate,
    pub actions: Vec<String>,
    pub warnings: Vec<String>,
    pub insights: Vec<String>,
    pub main_focus: String,
    pub summary: String,
    pub task_count: u32,
    pub completion_rate: f64,
    pub source: AdviceSource,
}

pub fn recent_reports(date: NaiveDate, reports: &[DailyReport]) -> Vec<&DailyReport> {
    let mut recent = reports
        .iter()
        .filter(|report| report.is_published() && report.date <= date)
        .collect::<Vec<_>>();
    recent.sort_by(|left, right| right.date.cmp(&left.date));
    recent.truncate(RECENT_REPORTS);
    recent
}

pub fn completion_rate(recent: &[&DailyReport]) -> f64 {
    if recent.is_empty() {
        return 0.0;
    }

    let total = recent
        .iter()
        .map(|report| match report.yesterday_total() {
            0 => 0.0,
            planned => report.yesterday_completed() as f64 / planned as f64,
        })
        .sum::<f64>();

    total / recent.len() as f64
}

pub fn advise(date: NaiveDate, mission: Option<&str>, reports: &[DailyReport]) -> MentorAdvice {
    let recent = recent_reports(date, reports);
    let today = recent.iter().copied().find(|report| report.date == date);
    let rate = completion_rate(&recent);

    let mut actions = Vec::new();
    let mut warnings = Vec::new();
    let mut insights = Vec::new();

    let task_count = today
        .map(|report| {
            let big = u32::try_from(report.today_big.len()).unwrap_or(u32::MAX);
            big.saturating_add(report.planned_task_count())
        })
        .unwrap_or_default();

    match today {
        None => {
            warnings.push("No daily report submitted for today yet.".to_string());
            actions.push("Fill in today's report with one big task first".to_string());
        }
        Some(report) => {
            if task_count > MANY_TASKS {
                warnings.push(
                    "You have many tasks today. Consider prioritizing the top 3.".to_string(),
                );
                actions.push("Mark 2-3 tasks as must-do for today".to_string());
            }

            if task_count == 0 {
                warnings.push("No tasks planned yet. Start with a clear plan for the day.".to_string());
                actions.push("Add one big task and 2-3 medium tasks".to_string());
            } else if !report.has_big_task() {
                actions.push("Pick one big task as today's main focus".to_string());
            }

            if !report.help_requests.is_empty() {
                warnings.push(format!(
                    "{} open help request(s): follow up so they do not block the day.",
                    report.help_requests.len()
                ));
            }

            if report.mood.is_some_and(|mood| mood <= 2) {
                insights.push(
                    "Energy looks low today. A lighter plan and a short break can help."
                        .to_string(),
                );
            }
        }
    }

    if rate < 0.5 && recent.len() >= 3 {
        insights.push(
            "Your completion rate has been low recently. Focus on smaller, achievable tasks."
                .to_string(),
        );
        actions.push("Break complex tasks into smaller steps".to_string());
    } else if rate > 0.8 {
        insights.push("Great job! Your completion rate is strong.".to_string());
    }

    if let Some(mission) = mission.map(str::trim).filter(|mission| !mission.is_empty()) {
        insights.push(format!("Remember your mission: \"{mission}\""));
    }

    if actions.is_empty() {
        if today.is_some_and(|report| report.yesterday_completed() > 0) {
            actions.push("Continue your momentum and tackle the next priority task".to_string());
        } else {
            actions.push("Start your day by tackling your most important task".to_string());
            actions.push("Block 2 hours of focused time for deep work".to_string());
            actions.push("Review your progress before end of day".to_string());
        }
    }
    actions.truncate(MAX_ACTIONS);

    let main_focus = today
        .and_then(|report| {
            let big = report.today_big.iter().map(|task| task.title.trim());
            let medium = report.today_medium.iter().map(|task| task.title.trim());
            big.chain(medium).find(|title| !title.is_empty())
        })
        .map(str::to_string)
        .unwrap_or_else(|| "Not set".to_string());

    let summary = actions
        .first()
        .cloned()
        .unwrap_or_else(|| "Focus on your most important task today".to_string());

    MentorAdvice {
        date,
        actions,
        warnings,
        insights,
        main_focus,
        summary,
        task_count,
        completion_rate: rate,
        source: AdviceSource::RuleBased,
    }
}
