use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Deserializer, Serialize};
use std::fmt;

#[derive(
    Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
#[serde(rename_all = "lowercase")]
pub enum RiskLevel {
    #[default]
    None,
    Low,
    Medium,
    High,
}

impl RiskLevel {
    pub fn as_str(self) -> &'static str {
        match self {
            RiskLevel::None => "none",
            RiskLevel::Low => "low",
            RiskLevel::Medium => "medium",
            RiskLevel::High => "high",
        }
    }

    pub fn needs_attention(self) -> bool {
        self >= RiskLevel::Medium
    }
}

impl fmt::Display for RiskLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TaskStatus {
    Done,
    Partial,
    Moved,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum ReportStatus {
    Draft,
    #[default]
    Published,
}

impl ReportStatus {
    pub fn as_str(self) -> &'static str {
        match self {
            ReportStatus::Draft => "DRAFT",
            ReportStatus::Published => "PUBLISHED",
        }
    }

    pub fn parse(raw: &str) -> Self {
        if raw.eq_ignore_ascii_case("draft") {
            ReportStatus::Draft
        } else {
            ReportStatus::Published
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum HelpPriority {
    Low,
    Medium,
    High,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct BigTask {
    #[serde(deserialize_with = "null_as_default")]
    pub title: String,
    pub project: Option<String>,
    #[serde(deserialize_with = "null_as_default")]
    pub timebox_h: f64,
    pub artifact: Option<String>,
    pub status: Option<TaskStatus>,
    pub note: Option<String>,
    #[serde(deserialize_with = "null_as_default")]
    pub tags: Vec<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct MediumTask {
    #[serde(deserialize_with = "null_as_default")]
    pub title: String,
    pub project: Option<String>,
    #[serde(deserialize_with = "null_as_default")]
    pub timebox_h: f64,
    pub artifact: Option<String>,
    pub status: Option<TaskStatus>,
    #[serde(deserialize_with = "null_as_default")]
    pub tags: Vec<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct SmallTasks {
    pub count: Option<u32>,
    #[serde(deserialize_with = "null_as_default")]
    pub items: Vec<String>,
}

impl SmallTasks {
    pub fn total(&self) -> u32 {
        let listed = u32::try_from(self.items.len()).unwrap_or(u32::MAX);
        self.count.unwrap_or(0).max(listed)
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct HelpRequest {
    pub id: Option<String>,
    #[serde(deserialize_with = "null_as_default")]
    pub text: String,
    pub link: Option<String>,
    pub assignee_id: Option<String>,
    pub due_date: Option<NaiveDate>,
    pub priority: Option<HelpPriority>,
    pub status: Option<String>,
}

/// Clients send `null` for sections they left empty.
fn null_as_default<'de, D, T>(deserializer: D) -> Result<T, D::Error>
where
    D: Deserializer<'de>,
    T: Default + Deserialize<'de>,
{
    Option::<T>::deserialize(deserializer).map(Option::unwrap_or_default)
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DailyReport {
    #[serde(default, deserialize_with = "null_as_default")]
    pub user_id: String,
    pub date: NaiveDate,
    #[serde(default, deserialize_with = "null_as_default")]
    pub yesterday_big: Vec<BigTask>,
    #[serde(default, deserialize_with = "null_as_default")]
    pub yesterday_medium: Vec<MediumTask>,
    #[serde(default, deserialize_with = "null_as_default")]
    pub yesterday_small: SmallTasks,
    #[serde(default)]
    pub yesterday_note: Option<String>,
    #[serde(default, deserialize_with = "null_as_default")]
    pub today_big: Vec<BigTask>,
    #[serde(default, deserialize_with = "null_as_default")]
    pub today_medium: Vec<MediumTask>,
    #[serde(default, deserialize_with = "null_as_default")]
    pub today_small: SmallTasks,
    #[serde(default)]
    pub today_note: Option<String>,
    #[serde(default)]
    pub expected_metrics: Option<String>,
    #[serde(default, deserialize_with = "null_as_default")]
    pub help_requests: Vec<HelpRequest>,
    #[serde(default)]
    pub mood: Option<u8>,
    #[serde(default)]
    pub wellbeing: Option<String>,
    #[serde(default)]
    pub mood_comment: Option<String>,
    #[serde(default, deserialize_with = "null_as_default")]
    pub status: ReportStatus,
    #[serde(default)]
    pub submitted_at: Option<DateTime<Utc>>,
}

impl DailyReport {
    pub fn empty(user_id: &str, date: NaiveDate) -> Self {
        Self {
            user_id: user_id.to_string(),
            date,
            yesterday_big: Vec::new(),
            yesterday_medium: Vec::new(),
            yesterday_small: SmallTasks::default(),
            yesterday_note: None,
            today_big: Vec::new(),
            today_medium: Vec::new(),
            today_small: SmallTasks::default(),
            today_note: None,
            expected_metrics: None,
            help_requests: Vec::new(),
            mood: None,
            wellbeing: None,
            mood_comment: None,
            status: ReportStatus::Published,
            submitted_at: None,
        }
    }

    pub fn is_published(&self) -> bool {
        self.status == ReportStatus::Published
    }

    pub fn has_big_task(&self) -> bool {
        self.today_big
            .iter()
            .any(|task| !task.title.trim().is_empty())
    }

    pub fn planned_hours(&self) -> f64 {
        let big = self
            .today_big
            .iter()
            .map(|task| task.timebox_h.max(0.0))
            .sum::<f64>();
        let medium = self
            .today_medium
            .iter()
            .map(|task| task.timebox_h.max(0.0))
            .sum::<f64>();

        big + medium
    }

    pub fn planned_task_count(&self) -> u32 {
        let medium = u32::try_from(self.today_medium.len()).unwrap_or(u32::MAX);
        medium.saturating_add(self.today_small.total())
    }

    pub fn yesterday_completed(&self) -> usize {
        let big = self
            .yesterday_big
            .iter()
            .filter(|task| task.status == Some(TaskStatus::Done))
            .count();
        let medium = self
            .yesterday_medium
            .iter()
            .filter(|task| task.status == Some(TaskStatus::Done))
            .count();

        big + medium
    }

    pub fn yesterday_total(&self) -> usize {
        self.yesterday_big.len() + self.yesterday_medium.len()
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Member {
    pub id: String,
    pub org_id: String,
    pub full_name: String,
    pub email: String,
    #[serde(default)]
    pub position: String,
    #[serde(default)]
    pub role_name: Option<String>,
    #[serde(default)]
    pub department_id: Option<String>,
    #[serde(default)]
    pub department_name: Option<String>,
    #[serde(default)]
    pub team_id: Option<String>,
    #[serde(default)]
    pub started_on: Option<NaiveDate>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AiFlags {
    pub risk_level: RiskLevel,
    pub has_blocker: bool,
    pub no_big_task: bool,
    pub no_big_task_days: u32,
    pub overloaded: bool,
    pub planned_hours: f64,
    pub not_submitted_days: u32,
    pub suggestion: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SubmissionStatus {
    Submitted,
    NotSubmitted,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TeamMemberReport {
    pub user_id: String,
    pub user_name: String,
    pub email: String,
    pub position: String,
    pub role: Option<String>,
    pub department: Option<String>,
    pub team_id: Option<String>,
    pub status: SubmissionStatus,
    pub submitted_at: Option<DateTime<Utc>>,
    pub has_big_task: bool,
    pub has_help_request: bool,
    pub help_requests_count: usize,
    pub ai_flags: AiFlags,
    pub report: Option<DailyReport>,
}

impl TeamMemberReport {
    pub fn new(member: &Member, report: Option<DailyReport>, ai_flags: AiFlags) -> Self {
        let help_requests_count = report
            .as_ref()
            .map(|report| report.help_requests.len())
            .unwrap_or_default();

        Self {
            user_id: member.id.clone(),
            user_name: member.full_name.clone(),
            email: member.email.clone(),
            position: member.position.clone(),
            role: member.role_name.clone(),
            department: member.department_name.clone(),
            team_id: member.team_id.clone(),
            status: if report.is_some() {
                SubmissionStatus::Submitted
            } else {
                SubmissionStatus::NotSubmitted
            },
            submitted_at: report.as_ref().and_then(|report| report.submitted_at),
            has_big_task: report.as_ref().is_some_and(DailyReport::has_big_task),
            has_help_request: help_requests_count > 0,
            help_requests_count,
            ai_flags,
            report,
        }
    }

    pub fn is_submitted(&self) -> bool {
        self.status == SubmissionStatus::Submitted
    }

    pub fn risk_level(&self) -> RiskLevel {
        self.ai_flags.risk_level
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TeamSummary {
    pub date: NaiveDate,
    pub team_size: usize,
    pub reports_submitted: usize,
    pub not_submitted: usize,
    pub report_rate: f64,
    pub with_big_task: usize,
    pub with_help_request: usize,
    pub high_risk: usize,
    pub needing_attention: usize,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AttentionEntry {
    pub user_id: String,
    pub name: String,
    pub role: Option<String>,
    pub risk_level: RiskLevel,
    pub reasons: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DigestData {
    pub date: NaiveDate,
    pub summary: String,
    pub highlights: Vec<String>,
    pub concerns: Vec<String>,
    pub people_needing_attention: Vec<AttentionEntry>,
    pub metrics: TeamSummary,
}
