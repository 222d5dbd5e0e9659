use crate::model::{RiskLevel, TeamMemberReport, TeamSummary};
use anyhow::{Result, bail};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StatusFilter {
    #[default]
    All,
    Submitted,
    NotSubmitted,
}

impl FromStr for StatusFilter {
    type Err = anyhow::Error;

    fn from_str(raw: &str) -> Result<Self> {
        match raw.trim() {
            "" | "all" => Ok(Self::All),
            "submitted" => Ok(Self::Submitted),
            "not_submitted" => Ok(Self::NotSubmitted),
            other => bail!("Unknown status filter: {other}. Use all|submitted|not_submitted"),
        }
    }
}

impl fmt::Display for StatusFilter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::All => "all",
            Self::Submitted => "submitted",
            Self::NotSubmitted => "not_submitted",
        })
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum QuickFilter {
    Submitted,
    HighRisk,
    NeedsAttention,
    BigTask,
    Unassigned,
}

impl FromStr for QuickFilter {
    type Err = anyhow::Error;

    fn from_str(raw: &str) -> Result<Self> {
        match raw.trim() {
            "submitted" => Ok(Self::Submitted),
            "highRisk" | "high_risk" => Ok(Self::HighRisk),
            "needsAttention" | "needs_attention" => Ok(Self::NeedsAttention),
            "bigTask" | "big_task" => Ok(Self::BigTask),
            "unassigned" => Ok(Self::Unassigned),
            other => bail!(
                "Unknown quick filter: {other}. Use submitted|highRisk|needsAttention|bigTask|unassigned"
            ),
        }
    }
}

impl fmt::Display for QuickFilter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Submitted => "submitted",
            Self::HighRisk => "highRisk",
            Self::NeedsAttention => "needsAttention",
            Self::BigTask => "bigTask",
            Self::Unassigned => "unassigned",
        })
    }
}

impl QuickFilter {
    fn matches(self, report: &TeamMemberReport) -> bool {
        match self {
            Self::Submitted => report.is_submitted(),
            Self::HighRisk => report.risk_level() == RiskLevel::High,
            Self::NeedsAttention => report.risk_level().needs_attention(),
            Self::BigTask => report.has_big_task,
            Self::Unassigned => report.team_id.is_none(),
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FilterState {
    pub search: String,
    pub status: StatusFilter,
    pub attention_only: bool,
    pub quick: Option<QuickFilter>,
}

impl FilterState {
    pub fn toggle_quick(&mut self, filter: QuickFilter) {
        self.quick = if self.quick == Some(filter) {
            None
        } else {
            Some(filter)
        };
        self.status = StatusFilter::All;
        self.attention_only = false;
    }

    pub fn matches(&self, report: &TeamMemberReport) -> bool {
        if self.quick.is_some_and(|quick| !quick.matches(report)) {
            return false;
        }

        let status_ok = match self.status {
            StatusFilter::All => true,
            StatusFilter::Submitted => report.is_submitted(),
            StatusFilter::NotSubmitted => !report.is_submitted(),
        };
        if !status_ok || (self.attention_only && !report.has_help_request) {
            return false;
        }

        let query = self.search.trim().to_lowercase();
        query.is_empty()
            || [&report.user_name, &report.email, &report.position]
                .iter()
                .any(|field| field.to_lowercase().contains(&query))
    }

    pub fn apply<'a>(&self, reports: &'a [TeamMemberReport]) -> Vec<&'a TeamMemberReport> {
        reports.iter().filter(|report| self.matches(report)).collect()
    }

    pub fn from_query_string(query: &str) -> Result<Self> {
        let mut state = Self::default();

        for (key, value) in url::form_urlencoded::parse(query.trim_start_matches('?').as_bytes())
        {
            match key.as_ref() {
                "filter" if !value.is_empty() => state.quick = Some(value.parse()?),
                "status" => state.status = value.parse()?,
                "attention" => state.attention_only = value == "true" || value == "1",
                "q" => state.search = value.into_owned(),
                _ => {}
            }
        }

        Ok(state)
    }

    pub fn to_query_string(&self) -> String {
        let mut serializer = url::form_urlencoded::Serializer::new(String::new());

        if let Some(quick) = self.quick {
            serializer.append_pair("filter", &quick.to_string());
        }
        if self.status != StatusFilter::All {
            serializer.append_pair("status", &self.status.to_string());
        }
        if self.attention_only {
            serializer.append_pair("attention", "true");
        }
        if !self.search.trim().is_empty() {
            serializer.append_pair("q", self.search.trim());
        }

        serializer.finish()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct RequestToken(pub u64);

#[derive(Debug, Default)]
pub struct RequestSequencer {
    latest: u64,
}

impl RequestSequencer {
    pub fn issue(&mut self) -> RequestToken {
        self.latest += 1;
        RequestToken(self.latest)
    }

    pub fn is_current(&self, token: RequestToken) -> bool {
        token.0 == self.latest
    }
}

#[derive(Debug, Default)]
pub struct DashboardView {
    pub filters: FilterState,
    reports: Vec<TeamMemberReport>,
    summary: Option<TeamSummary>,
    sequencer: RequestSequencer,
}

impl DashboardView {
    pub fn with_filters(filters: FilterState) -> Self {
        Self {
            filters,
            ..Self::default()
        }
    }

    pub fn begin_refresh(&mut self) -> RequestToken {
        self.sequencer.issue()
    }

    /// Returns false and leaves state untouched when a newer refresh has
    /// been issued since `token`.
    pub fn apply_response(
        &mut self,
        token: RequestToken,
        reports: Vec<TeamMemberReport>,
        summary: TeamSummary,
    ) -> bool {
        if !self.sequencer.is_current(token) {
            return false;
        }

        self.reports = reports;
        self.summary = Some(summary);
        true
    }

    pub fn visible(&self) -> Vec<&TeamMemberReport> {
        self.filters.apply(&self.reports)
    }

    pub fn summary(&self) -> Option<&TeamSummary> {
        self.summary.as_ref()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::analyzer::summary::summarize;
    use crate::model::{AiFlags, BigTask, DailyReport, HelpRequest, Member};
    use chrono::NaiveDate;

    fn day() -> NaiveDate {
        NaiveDate::from_ymd_opt(2026, 2, 18).unwrap()
    }

    fn row(
        id: &str,
        name: &str,
        position: &str,
        submitted: bool,
        risk_level: RiskLevel,
    ) -> TeamMemberReport {
        let member = Member {
            id: id.to_string(),
            org_id: "org".to_string(),
            full_name: name.to_string(),
            email: format!("{}@acme.io", name.to_lowercase()),
            position: position.to_string(),
            role_name: None,
            department_id: None,
            department_name: None,
            team_id: (id != "u4").then(|| "t1".to_string()),
            started_on: None,
        };
        let report = submitted.then(|| {
            let mut report = DailyReport::empty(id, day());
            if id == "u1" {
                report.today_big.push(BigTask {
                    title: "Release".to_string(),
                    ..BigTask::default()
                });
                report.help_requests.push(HelpRequest {
                    text: "Need QA".to_string(),
                    ..HelpRequest::default()
                });
            }
            report
        });

        TeamMemberReport::new(
            &member,
            report,
            AiFlags {
                risk_level,
                ..AiFlags::default()
            },
        )
    }

    fn team() -> Vec<TeamMemberReport> {
        vec![
            row("u1", "Iryna", "Designer", true, RiskLevel::Medium),
            row("u2", "Taras", "Backend Engineer", true, RiskLevel::None),
            row("u3", "Sofia", "QA Engineer", false, RiskLevel::High),
            row("u4", "Petro", "Analyst", false, RiskLevel::Low),
        ]
    }

    fn ids(reports: &[&TeamMemberReport]) -> Vec<String> {
        reports.iter().map(|report| report.user_id.clone()).collect()
    }

    #[test]
    fn search_matches_name_email_and_position_case_insensitively() {
        let team = team();
        let mut filters = FilterState {
            search: "ENGINEER".to_string(),
            ..FilterState::default()
        };
        assert_eq!(ids(&filters.apply(&team)), vec!["u2", "u3"]);

        filters.search = "iryna@ACME".to_string();
        assert_eq!(ids(&filters.apply(&team)), vec!["u1"]);

        filters.search = "   ".to_string();
        assert_eq!(filters.apply(&team).len(), 4);
    }

    #[test]
    fn status_filter_partitions_the_team() {
        let team = team();
        let submitted = FilterState {
            status: StatusFilter::Submitted,
            ..FilterState::default()
        };
        let missing = FilterState {
            status: StatusFilter::NotSubmitted,
            ..FilterState::default()
        };

        let mut all = ids(&submitted.apply(&team));
        all.extend(ids(&missing.apply(&team)));
        all.sort();
        assert_eq!(all, vec!["u1", "u2", "u3", "u4"]);
        assert_eq!(ids(&submitted.apply(&team)), vec!["u1", "u2"]);
    }

    #[test]
    fn quick_filters_are_mutually_exclusive_and_reset_other_filters() {
        let mut filters = FilterState {
            status: StatusFilter::NotSubmitted,
            attention_only: true,
            quick: Some(QuickFilter::NeedsAttention),
            ..FilterState::default()
        };

        filters.toggle_quick(QuickFilter::HighRisk);
        assert_eq!(filters.quick, Some(QuickFilter::HighRisk));
        assert_eq!(filters.status, StatusFilter::All);
        assert!(!filters.attention_only);

        filters.toggle_quick(QuickFilter::BigTask);
        assert_eq!(filters.quick, Some(QuickFilter::BigTask));

        filters.toggle_quick(QuickFilter::BigTask);
        assert_eq!(filters.quick, None);
    }

    #[test]
    fn quick_filters_select_expected_members() {
        let team = team();
        let pick = |quick| {
            let filters = FilterState {
                quick: Some(quick),
                ..FilterState::default()
            };
            ids(&filters.apply(&team))
        };

        assert_eq!(pick(QuickFilter::HighRisk), vec!["u3"]);
        assert_eq!(pick(QuickFilter::NeedsAttention), vec!["u1", "u3"]);
        assert_eq!(pick(QuickFilter::BigTask), vec!["u1"]);
        assert_eq!(pick(QuickFilter::Submitted), vec!["u1", "u2"]);
        assert_eq!(pick(QuickFilter::Unassigned), vec!["u4"]);
    }

    #[test]
    fn attention_toggle_keeps_help_requests_only() {
        let team = team();
        let filters = FilterState {
            attention_only: true,
            ..FilterState::default()
        };

        assert_eq!(ids(&filters.apply(&team)), vec!["u1"]);
    }

    #[test]
    fn filter_state_round_trips_through_query_string() {
        let state = FilterState::from_query_string("?filter=unassigned").expect("parse");
        assert_eq!(state.quick, Some(QuickFilter::Unassigned));

        let state = FilterState {
            search: "olena k".to_string(),
            status: StatusFilter::Submitted,
            attention_only: true,
            quick: Some(QuickFilter::HighRisk),
        };
        let query = state.to_query_string();
        assert_eq!(query, "filter=highRisk&status=submitted&attention=true&q=olena+k");
        assert_eq!(FilterState::from_query_string(&query).expect("parse"), state);

        assert!(FilterState::from_query_string("filter=everyone").is_err());
    }

    #[test]
    fn stale_responses_are_discarded() {
        let mut view = DashboardView::default();
        let first = view.begin_refresh();
        let second = view.begin_refresh();

        let fresh = team();
        let fresh_summary = summarize(day(), &fresh);
        assert!(view.apply_response(second, fresh.clone(), fresh_summary.clone()));

        let stale = vec![fresh[0].clone()];
        let stale_summary = summarize(day(), &stale);
        assert!(!view.apply_response(first, stale, stale_summary));

        assert_eq!(view.visible().len(), 4);
        assert_eq!(view.summary(), Some(&fresh_summary));
    }

    #[test]
    fn view_applies_filters_to_latest_data() {
        let mut view = DashboardView::with_filters(FilterState {
            quick: Some(QuickFilter::HighRisk),
            ..FilterState::default()
        });
        let token = view.begin_refresh();
        let team = team();
        let summary = summarize(day(), &team);

        assert!(view.apply_response(token, team, summary));
        assert_eq!(ids(&view.visible()), vec!["u3"]);
    }
}
