use crate::config::TenantSettings;
use crate::db::{Database, DepartmentRow, TeamRow};
use crate::model::{
    BigTask, DailyReport, HelpRequest, Member, MediumTask, ReportStatus, TaskStatus,
};
use anyhow::{Context, Result};
use chrono::{Duration, NaiveDate, Utc};
use serde::Deserialize;
use tracing::info;

const DEMO_SEED: &str = include_str!("../../assets/seed.json");

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct SeedData {
    organization: SeedOrganization,
    departments: Vec<SeedDepartment>,
    teams: Vec<SeedTeam>,
    members: Vec<SeedMember>,
    reports: Vec<SeedReport>,
}

#[derive(Debug, Deserialize)]
struct SeedOrganization {
    id: String,
    name: String,
    #[serde(default)]
    settings: TenantSettings,
}

#[derive(Debug, Deserialize)]
struct SeedDepartment {
    id: String,
    name: String,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct SeedTeam {
    id: String,
    department_id: Option<String>,
    name: String,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct SeedMember {
    id: String,
    full_name: String,
    email: String,
    position: String,
    role_name: Option<String>,
    department_id: Option<String>,
    team_id: Option<String>,
    started_on: Option<NaiveDate>,
    mission: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct SeedReport {
    user_id: String,
    days_ago: u32,
    big_task: Option<String>,
    #[serde(default)]
    timebox_h: f64,
    #[serde(default)]
    medium_tasks: Vec<String>,
    #[serde(default)]
    medium_timebox_h: f64,
    small_count: Option<u32>,
    #[serde(default)]
    help: Vec<String>,
    mood: Option<u8>,
    #[serde(default)]
    yesterday_done: usize,
    #[serde(default)]
    yesterday_planned: usize,
    #[serde(default)]
    draft: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SeedSummary {
    pub departments: usize,
    pub teams: usize,
    pub members: usize,
    pub reports: usize,
}

pub fn seed_demo(database: &Database, today: NaiveDate) -> Result<SeedSummary> {
    let data: SeedData = serde_json::from_str(DEMO_SEED).context("Failed to parse demo seed")?;
    let org = &data.organization;
    let settings = &org.settings;
    settings.validate().context("Demo seed has invalid tenant settings")?;

    let now = Utc::now();
    if !database.insert_organization_if_missing(&org.id, &org.name, settings, now.timestamp())? {
        info!(org = %org.id, "organization exists, keeping its name and settings");
    }

    for department in &data.departments {
        database.upsert_department(&DepartmentRow {
            id: department.id.clone(),
            org_id: org.id.clone(),
            name: department.name.clone(),
        })?;
    }

    for team in &data.teams {
        database.upsert_team(&TeamRow {
            id: team.id.clone(),
            org_id: org.id.clone(),
            department_id: team.department_id.clone(),
            name: team.name.clone(),
            member_count: 0,
        })?;
    }

    for seed in &data.members {
        let member = Member {
            id: seed.id.clone(),
            org_id: org.id.clone(),
            full_name: seed.full_name.clone(),
            email: seed.email.clone(),
            position: seed.position.clone(),
            role_name: seed.role_name.clone(),
            department_id: seed.department_id.clone(),
            department_name: None,
            team_id: seed.team_id.clone(),
            started_on: seed.started_on,
        };
        database.upsert_member(&member, seed.mission.as_deref())?;
    }

    for seed in &data.reports {
        let date = work_days_back(settings, today, seed.days_ago);
        database.upsert_report(&build_report(seed, date, now), now.timestamp())?;
    }

    let summary = SeedSummary {
        departments: data.departments.len(),
        teams: data.teams.len(),
        members: data.members.len(),
        reports: data.reports.len(),
    };
    info!(
        org = %org.id,
        teams = summary.teams,
        members = summary.members,
        reports = summary.reports,
        "demo data seeded"
    );

    Ok(summary)
}

fn work_days_back(settings: &TenantSettings, today: NaiveDate, days_ago: u32) -> NaiveDate {
    let mut date = today;
    let mut remaining = days_ago;

    while remaining > 0 {
        date -= Duration::days(1);
        if settings.is_work_day(date) {
            remaining -= 1;
        }
    }

    date
}

fn build_report(seed: &SeedReport, date: NaiveDate, now: chrono::DateTime<Utc>) -> DailyReport {
    let mut report = DailyReport::empty(&seed.user_id, date);

    report.today_big = seed
        .big_task
        .iter()
        .map(|title| BigTask {
            title: title.clone(),
            timebox_h: seed.timebox_h,
            ..BigTask::default()
        })
        .collect();
    report.today_medium = seed
        .medium_tasks
        .iter()
        .map(|title| MediumTask {
            title: title.clone(),
            timebox_h: seed.medium_timebox_h,
            ..MediumTask::default()
        })
        .collect();
    report.today_small.count = seed.small_count;

    report.yesterday_medium = (0..seed.yesterday_planned)
        .map(|index| MediumTask {
            title: format!("Planned task {}", index + 1),
            status: Some(if index < seed.yesterday_done {
                TaskStatus::Done
            } else {
                TaskStatus::Moved
            }),
            ..MediumTask::default()
        })
        .collect();

    report.help_requests = seed
        .help
        .iter()
        .map(|text| HelpRequest {
            text: text.clone(),
            ..HelpRequest::default()
        })
        .collect();
    report.mood = seed.mood;

    if seed.draft {
        report.status = ReportStatus::Draft;
    } else {
        report.status = ReportStatus::Published;
        report.submitted_at = Some(now);
    }

    report
}
