pub mod digest;
pub mod filter;
pub mod mentor;
pub mod merge;
pub mod risk;
pub mod summary;

use crate::analyzer::digest::SavedDigest;
use crate::analyzer::mentor::MentorAdvice;
use crate::analyzer::risk::MemberHistory;
use crate::config::{Config, MAX_LOOKBACK_DAYS, TenantSettings};
use crate::db::Database;
use crate::error::PipelineError;
use crate::model::{AiFlags, DailyReport, DigestData, Member, TeamMemberReport, TeamSummary};
use anyhow::{Context, Result};
use chrono::{Duration, NaiveDate, Utc};
use serde::Serialize;
use tracing::{debug, info, warn};
use url::Url;

const MAX_HISTORY_DAYS: u32 = 31;
const MENTOR_HISTORY_DAYS: i64 = 30;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TeamScope {
    Team(String),
    Department(String),
}

impl TeamScope {
    pub fn key(&self) -> String {
        match self {
            TeamScope::Team(id) => format!("team-{id}"),
            TeamScope::Department(id) => format!("dept-{id}"),
        }
    }
}

#[derive(Debug, Clone)]
pub struct ScopeContext {
    pub scope: TeamScope,
    pub title: String,
    pub org_id: String,
    pub settings: TenantSettings,
    pub members: Vec<Member>,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TeamDashboard {
    pub scope: String,
    pub title: String,
    pub date: NaiveDate,
    pub reports: Vec<TeamMemberReport>,
    pub summary: TeamSummary,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct HistoryDay {
    pub date: NaiveDate,
    pub submitted: bool,
    pub ai_flags: AiFlags,
    pub report: Option<DailyReport>,
}

pub fn load_scope(database: &Database, scope: &TeamScope) -> Result<ScopeContext> {
    let (title, org_id, members) = match scope {
        TeamScope::Team(id) => {
            let team = database
                .team(id)?
                .ok_or_else(|| PipelineError::not_found("Team", id))?;
            (team.name, team.org_id, database.members_for_team(id)?)
        }
        TeamScope::Department(id) => {
            let department = database
                .department(id)?
                .ok_or_else(|| PipelineError::not_found("Department", id))?;
            (
                department.name,
                department.org_id,
                database.members_for_department(id)?,
            )
        }
    };

    let settings = tenant_settings(database, &org_id)?;

    Ok(ScopeContext {
        scope: scope.clone(),
        title,
        org_id,
        settings,
        members,
    })
}

pub fn tenant_settings(database: &Database, org_id: &str) -> Result<TenantSettings> {
    match database.organization(org_id)? {
        Some(org) => Ok(org.settings),
        None => {
            warn!(org = %org_id, "organization not found, using default tenant settings");
            Ok(TenantSettings::default())
        }
    }
}

pub fn member_settings(database: &Database, user_id: &str) -> Result<(Member, TenantSettings)> {
    let member = database
        .member(user_id)?
        .ok_or_else(|| PipelineError::not_found("Member", user_id))?;
    let settings = tenant_settings(database, &member.org_id)?;

    Ok((member, settings))
}

fn history_span(settings: &TenantSettings) -> Duration {
    Duration::days(i64::from(settings.thresholds.lookback_days.min(MAX_LOOKBACK_DAYS)) * 2 + 7)
}

// The classifier bounds streaks by the employment start. When that is
// unknown the member's first published report stands in for it.
fn with_effective_start(database: &Database, member: &Member) -> Result<Member> {
    let mut member = member.clone();
    if member.started_on.is_none() {
        member.started_on = database.first_report_date(&member.id)?;
    }

    Ok(member)
}

pub fn classify_member(
    database: &Database,
    settings: &TenantSettings,
    member: &Member,
    date: NaiveDate,
) -> Result<(Option<DailyReport>, AiFlags)> {
    let effective = with_effective_start(database, member)?;
    let from = date
        .checked_sub_signed(history_span(settings))
        .unwrap_or(NaiveDate::MIN);
    let reports = database.published_reports_between(&member.id, from, date)?;

    let history = MemberHistory {
        member: &effective,
        date,
        reports: &reports,
    };
    let flags = risk::classify(history, settings);
    let today = history.today().cloned();

    Ok((today, flags))
}

pub fn build_team_reports(
    database: &Database,
    settings: &TenantSettings,
    members: &[Member],
    date: NaiveDate,
) -> Result<Vec<TeamMemberReport>> {
    members
        .iter()
        .map(|member| {
            let (today, flags) = classify_member(database, settings, member, date)
                .with_context(|| format!("Failed to classify member {}", member.id))?;
            Ok(TeamMemberReport::new(member, today, flags))
        })
        .collect()
}

pub fn team_dashboard(
    database: &Database,
    scope: &TeamScope,
    date: Option<NaiveDate>,
) -> Result<TeamDashboard> {
    let context = load_scope(database, scope)?;
    let date = match date {
        Some(date) => date,
        None => context.settings.today()?,
    };

    let reports = build_team_reports(database, &context.settings, &context.members, date)?;
    let summary = summary::summarize(date, &reports);
    debug!(
        org = %context.org_id,
        scope = %context.scope.key(),
        members = reports.len(),
        "team dashboard built"
    );

    Ok(TeamDashboard {
        scope: context.scope.key(),
        title: context.title,
        date,
        reports,
        summary,
    })
}

pub fn generate_digest(
    database: &Database,
    scope: &TeamScope,
    date: Option<NaiveDate>,
) -> Result<(TeamDashboard, DigestData)> {
    let context = load_scope(database, scope)?;
    if !context.settings.ai_policy.manager_digest_enabled {
        return Err(PipelineError::FeatureDisabled {
            feature: "Manager digest",
        }
        .into());
    }

    let date = match date {
        Some(date) => date,
        None => context.settings.today()?,
    };
    let reports = build_team_reports(database, &context.settings, &context.members, date)?;
    let summary = summary::summarize(date, &reports);
    let digest = digest::compose(date, &reports, &summary, &context.settings.thresholds);

    let dashboard = TeamDashboard {
        scope: scope.key(),
        title: context.title,
        date,
        reports,
        summary,
    };

    Ok((dashboard, digest))
}

pub fn generate_and_store_digest(
    config: &Config,
    scope: &TeamScope,
    date: Option<NaiveDate>,
) -> Result<(DigestData, SavedDigest)> {
    let database = Database::open(&config.db_path)?;
    let (dashboard, digest) = generate_digest(&database, scope, date)?;

    let saved = digest::save_digest_files(
        &dashboard.scope,
        &dashboard.title,
        &digest,
        &config.digest_dir,
    )?;

    database.upsert_digest(
        &dashboard.scope,
        &digest,
        Utc::now().timestamp(),
        Some(&saved.markdown_path.display().to_string()),
        Some(&saved.json_path.display().to_string()),
    )?;

    info!(
        scope = %dashboard.scope,
        date = %digest.date,
        attention = digest.people_needing_attention.len(),
        "digest stored"
    );

    Ok((digest, saved))
}

pub fn digest_all_teams(config: &Config) -> Result<usize> {
    digest_all_teams_on(config, None)
}

fn digest_all_teams_on(config: &Config, date: Option<NaiveDate>) -> Result<usize> {
    let database = Database::open(&config.db_path)?;
    let mut written = 0;

    for team in database.list_teams()? {
        let settings = tenant_settings(&database, &team.org_id)?;
        if !settings.ai_policy.manager_digest_enabled {
            continue;
        }

        let today = match date {
            Some(date) => date,
            None => settings.today()?,
        };
        if !settings.is_work_day(today) {
            debug!(team = %team.id, date = %today, "not a work day, digest skipped");
            continue;
        }

        let scope = TeamScope::Team(team.id.clone());
        match generate_and_store_digest(config, &scope, Some(today)) {
            Ok(_) => written += 1,
            Err(error) => warn!(team = %team.id, error = %error, "team digest failed"),
        }
    }

    Ok(written)
}

pub fn member_history(
    database: &Database,
    user_id: &str,
    date: Option<NaiveDate>,
    days: u32,
) -> Result<Vec<HistoryDay>> {
    let (member, settings) = member_settings(database, user_id)?;
    let date = match date {
        Some(date) => date,
        None => settings.today()?,
    };
    let days = days.clamp(1, MAX_HISTORY_DAYS);

    let effective = with_effective_start(database, &member)?;
    let oldest = date - Duration::days(i64::from(days - 1));
    let reports =
        database.published_reports_between(user_id, oldest - history_span(&settings), date)?;

    let history = (0..days)
        .map(|offset| {
            let day = date - Duration::days(i64::from(offset));
            let history = MemberHistory {
                member: &effective,
                date: day,
                reports: &reports,
            };
            let report = history.today().cloned();

            HistoryDay {
                date: day,
                submitted: report.is_some(),
                ai_flags: risk::classify(history, &settings),
                report,
            }
        })
        .collect();

    Ok(history)
}

pub fn mentor_advice(
    database: &Database,
    user_id: &str,
    date: Option<NaiveDate>,
) -> Result<MentorAdvice> {
    let (_, settings) = member_settings(database, user_id)?;
    if !settings.ai_policy.ai_mentor_enabled {
        return Err(PipelineError::FeatureDisabled {
            feature: "AI mentor",
        }
        .into());
    }

    let date = match date {
        Some(date) => date,
        None => settings.today()?,
    };
    let reports = database.published_reports_between(
        user_id,
        date - Duration::days(MENTOR_HISTORY_DAYS),
        date,
    )?;
    let mission = database.member_mission(user_id)?;

    Ok(mentor::advise(date, mission.as_deref(), &reports))
}

pub fn submit_report(
    database: &Database,
    user_id: &str,
    date: NaiveDate,
    mut report: DailyReport,
) -> Result<DailyReport> {
    let (member, settings) = member_settings(database, user_id)?;
    let today = settings.today()?;

    if date < today {
        return Err(PipelineError::Conflict(format!(
            "Report for {date} is read-only: only {today} or later can be edited"
        ))
        .into());
    }
    validate_report(&report)?;

    report.user_id = member.id.clone();
    report.date = date;
    if report.is_published() && report.submitted_at.is_none() {
        report.submitted_at = Some(
            database
                .report(user_id, date)?
                .and_then(|existing| existing.submitted_at)
                .unwrap_or_else(Utc::now),
        );
    }

    database.upsert_report(&report, Utc::now().timestamp())?;
    info!(user = %user_id, date = %date, status = report.status.as_str(), "daily report saved");

    Ok(report)
}

pub fn validate_report(report: &DailyReport) -> Result<()> {
    if let Some(mood) = report.mood.filter(|mood| !(1..=5).contains(mood)) {
        return Err(PipelineError::Validation(format!("mood must be 1..5, got {mood}")).into());
    }

    for request in &report.help_requests {
        let Some(link) = request.link.as_deref().map(str::trim) else {
            continue;
        };
        if link.is_empty() {
            continue;
        }

        let valid = Url::parse(link)
            .map(|url| matches!(url.scheme(), "http" | "https"))
            .unwrap_or(false);
        if !valid {
            return Err(PipelineError::Validation(format!(
                "help request link must be an http(s) URL: {link}"
            ))
            .into());
        }
    }

    Ok(())
}
