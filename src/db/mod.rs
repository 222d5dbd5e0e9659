pub mod queries;
pub mod seed;

use crate::config::TenantSettings;
use crate::model::{DailyReport, DigestData, Member, ReportStatus};
use anyhow::{Context, Result};
use chrono::NaiveDate;
use rusqlite::{Connection, OptionalExtension, Row, params};
use serde::Serialize;
use std::fs;
use std::path::Path;

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct OrganizationRow {
    pub id: String,
    pub name: String,
    pub settings: TenantSettings,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DepartmentRow {
    pub id: String,
    pub org_id: String,
    pub name: String,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TeamRow {
    pub id: String,
    pub org_id: String,
    pub department_id: Option<String>,
    pub name: String,
    pub member_count: usize,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DigestMetaRow {
    pub id: i64,
    pub scope: String,
    pub date: String,
    pub summary: String,
    pub md_path: Option<String>,
    pub json_path: Option<String>,
    pub generated_at: i64,
}

pub struct Database {
    conn: Connection,
}

impl Database {
    pub fn open(path: &Path) -> Result<Self> {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)
                .with_context(|| format!("Failed to create DB directory: {}", parent.display()))?;
        }

        let conn = Connection::open(path)
            .with_context(|| format!("Failed to open SQLite DB: {}", path.display()))?;

        let database = Self { conn };
        database.init_schema()?;

        Ok(database)
    }

    pub fn init_schema(&self) -> Result<()> {
        queries::schema_statements()
            .iter()
            .try_for_each(|statement| {
                self.conn
                    .execute(statement, [])
                    .context("Failed to initialize schema")
                    .map(|_| ())
            })
    }

    pub fn upsert_organization(
        &self,
        id: &str,
        name: &str,
        settings: &TenantSettings,
        created_at: i64,
    ) -> Result<()> {
        let settings_json =
            serde_json::to_string(settings).context("Failed to serialize tenant settings")?;

        self.conn
            .execute(
                "INSERT INTO organizations (id, name, settings, created_at)
                 VALUES (?1, ?2, ?3, ?4)
                 ON CONFLICT(id)
                 DO UPDATE SET name=excluded.name, settings=excluded.settings",
                params![id, name, settings_json, created_at],
            )
            .context("Failed to upsert organization")?;

        Ok(())
    }

    pub fn insert_organization_if_missing(
        &self,
        id: &str,
        name: &str,
        settings: &TenantSettings,
        created_at: i64,
    ) -> Result<bool> {
        let settings_json =
            serde_json::to_string(settings).context("Failed to serialize tenant settings")?;

        let inserted = self
            .conn
            .execute(
                "INSERT INTO organizations (id, name, settings, created_at)
                 VALUES (?1, ?2, ?3, ?4)
                 ON CONFLICT(id) DO NOTHING",
                params![id, name, settings_json, created_at],
            )
            .context("Failed to insert organization")?;

        Ok(inserted > 0)
    }

    pub fn organization(&self, id: &str) -> Result<Option<OrganizationRow>> {
        let row = self
            .conn
            .query_row(
                "SELECT id, name, settings FROM organizations WHERE id = ?1",
                params![id],
                |row| {
                    Ok((
                        row.get::<_, String>(0)?,
                        row.get::<_, String>(1)?,
                        row.get::<_, String>(2)?,
                    ))
                },
            )
            .optional()
            .context("Failed to query organization")?;

        row.map(|(id, name, settings)| {
            let settings = serde_json::from_str(&settings)
                .with_context(|| format!("Failed to parse tenant settings of organization {id}"))?;
            Ok(OrganizationRow { id, name, settings })
        })
        .transpose()
    }

    pub fn update_tenant_settings(&self, org_id: &str, settings: &TenantSettings) -> Result<bool> {
        let settings_json =
            serde_json::to_string(settings).context("Failed to serialize tenant settings")?;

        let updated = self
            .conn
            .execute(
                "UPDATE organizations SET settings = ?2 WHERE id = ?1",
                params![org_id, settings_json],
            )
            .context("Failed to update tenant settings")?;

        Ok(updated > 0)
    }

    pub fn upsert_department(&self, department: &DepartmentRow) -> Result<()> {
        self.conn
            .execute(
                "INSERT INTO departments (id, org_id, name) VALUES (?1, ?2, ?3)
                 ON CONFLICT(id) DO UPDATE SET org_id=excluded.org_id, name=excluded.name",
                params![department.id, department.org_id, department.name],
            )
            .context("Failed to upsert department")?;

        Ok(())
    }

    pub fn department(&self, id: &str) -> Result<Option<DepartmentRow>> {
        self.conn
            .query_row(
                "SELECT id, org_id, name FROM departments WHERE id = ?1",
                params![id],
                |row| {
                    Ok(DepartmentRow {
                        id: row.get(0)?,
                        org_id: row.get(1)?,
                        name: row.get(2)?,
                    })
                },
            )
            .optional()
            .context("Failed to query department")
    }

    pub fn upsert_team(&self, team: &TeamRow) -> Result<()> {
        self.conn
            .execute(
                "INSERT INTO teams (id, org_id, department_id, name) VALUES (?1, ?2, ?3, ?4)
                 ON CONFLICT(id)
                 DO UPDATE SET org_id=excluded.org_id, department_id=excluded.department_id, name=excluded.name",
                params![team.id, team.org_id, team.department_id, team.name],
            )
            .context("Failed to upsert team")?;

        Ok(())
    }

    pub fn team(&self, id: &str) -> Result<Option<TeamRow>> {
        self.conn
            .query_row(
                "SELECT t.id, t.org_id, t.department_id, t.name,
                        (SELECT COUNT(*) FROM members m WHERE m.team_id = t.id AND m.active = 1)
                 FROM teams t WHERE t.id = ?1",
                params![id],
                team_from_row,
            )
            .optional()
            .context("Failed to query team")
    }

    pub fn list_teams(&self) -> Result<Vec<TeamRow>> {
        let mut statement = self.conn.prepare(
            "SELECT t.id, t.org_id, t.department_id, t.name,
                    (SELECT COUNT(*) FROM members m WHERE m.team_id = t.id AND m.active = 1)
             FROM teams t
             ORDER BY t.name ASC, t.id ASC",
        )?;

        let rows = statement
            .query_map([], team_from_row)?
            .collect::<Result<Vec<_>, _>>()
            .context("Failed to list teams")?;

        Ok(rows)
    }

    pub fn upsert_member(&self, member: &Member, mission: Option<&str>) -> Result<()> {
        self.conn
            .execute(
                "INSERT INTO members
                   (id, org_id, full_name, email, position, role_name, mission, department_id, team_id, started_on, active)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, 1)
                 ON CONFLICT(id) DO UPDATE SET
                   org_id=excluded.org_id, full_name=excluded.full_name, email=excluded.email,
                   position=excluded.position, role_name=excluded.role_name, mission=excluded.mission,
                   department_id=excluded.department_id, team_id=excluded.team_id,
                   started_on=excluded.started_on, active=1",
                params![
                    member.id,
                    member.org_id,
                    member.full_name,
                    member.email,
                    member.position,
                    member.role_name,
                    mission,
                    member.department_id,
                    member.team_id,
                    member.started_on,
                ],
            )
            .context("Failed to upsert member")?;

        Ok(())
    }

    pub fn member(&self, id: &str) -> Result<Option<Member>> {
        self.conn
            .query_row(
                &format!("{} WHERE m.id = ?1", queries::SELECT_MEMBER),
                params![id],
                member_from_row,
            )
            .optional()
            .context("Failed to query member")
    }

    pub fn member_mission(&self, id: &str) -> Result<Option<String>> {
        let mission = self
            .conn
            .query_row(
                "SELECT mission FROM members WHERE id = ?1",
                params![id],
                |row| row.get::<_, Option<String>>(0),
            )
            .optional()
            .context("Failed to query member mission")?;

        Ok(mission.flatten())
    }

    pub fn members_for_team(&self, team_id: &str) -> Result<Vec<Member>> {
        self.members_where("m.team_id = ?1", team_id)
    }

    pub fn members_for_department(&self, department_id: &str) -> Result<Vec<Member>> {
        self.members_where("m.department_id = ?1", department_id)
    }

    fn members_where(&self, condition: &str, value: &str) -> Result<Vec<Member>> {
        let sql = format!(
            "{} WHERE {condition} AND m.active = 1 ORDER BY m.full_name ASC, m.id ASC",
            queries::SELECT_MEMBER
        );
        let mut statement = self.conn.prepare(&sql)?;

        let rows = statement
            .query_map(params![value], member_from_row)?
            .collect::<Result<Vec<_>, _>>()
            .context("Failed to query members")?;

        Ok(rows)
    }

    pub fn upsert_report(&self, report: &DailyReport, updated_at: i64) -> Result<()> {
        let payload = serde_json::to_string(report).context("Failed to serialize daily report")?;
        let submitted_at = report.submitted_at.map(|timestamp| timestamp.to_rfc3339());

        self.conn
            .execute(
                "INSERT INTO daily_reports (user_id, date, status, payload, submitted_at, updated_at)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6)
                 ON CONFLICT(user_id, date)
                 DO UPDATE SET status=excluded.status, payload=excluded.payload,
                               submitted_at=excluded.submitted_at, updated_at=excluded.updated_at",
                params![
                    report.user_id,
                    report.date,
                    report.status.as_str(),
                    payload,
                    submitted_at,
                    updated_at
                ],
            )
            .context("Failed to upsert daily report")?;

        Ok(())
    }

    pub fn report(&self, user_id: &str, date: NaiveDate) -> Result<Option<DailyReport>> {
        let row = self
            .conn
            .query_row(
                "SELECT user_id, date, status, payload FROM daily_reports WHERE user_id = ?1 AND date = ?2",
                params![user_id, date],
                report_columns,
            )
            .optional()
            .context("Failed to query daily report")?;

        row.map(decode_report).transpose()
    }

    pub fn published_reports_between(
        &self,
        user_id: &str,
        from: NaiveDate,
        to: NaiveDate,
    ) -> Result<Vec<DailyReport>> {
        let mut statement = self.conn.prepare(
            "SELECT user_id, date, status, payload
             FROM daily_reports
             WHERE user_id = ?1 AND date >= ?2 AND date <= ?3 AND status = 'PUBLISHED'
             ORDER BY date ASC",
        )?;

        let rows = statement
            .query_map(params![user_id, from, to], report_columns)?
            .collect::<Result<Vec<_>, _>>()
            .context("Failed to query daily reports")?;

        rows.into_iter().map(decode_report).collect()
    }

    pub fn first_report_date(&self, user_id: &str) -> Result<Option<NaiveDate>> {
        self.conn
            .query_row(
                "SELECT MIN(date) FROM daily_reports WHERE user_id = ?1 AND status = 'PUBLISHED'",
                params![user_id],
                |row| row.get::<_, Option<NaiveDate>>(0),
            )
            .context("Failed to query first report date")
    }

    pub fn count_reports(&self) -> Result<i64> {
        self.conn
            .query_row("SELECT COUNT(*) FROM daily_reports", [], |row| row.get(0))
            .context("Failed to count daily reports")
    }

    pub fn upsert_digest(
        &self,
        scope: &str,
        digest: &DigestData,
        generated_at: i64,
        md_path: Option<&str>,
        json_path: Option<&str>,
    ) -> Result<()> {
        let payload = serde_json::to_string(digest).context("Failed to serialize digest")?;

        self.conn
            .execute(
                "INSERT INTO digests (scope, date, summary, payload, md_path, json_path, generated_at)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)
                 ON CONFLICT(scope, date)
                 DO UPDATE SET summary=excluded.summary, payload=excluded.payload,
                               md_path=excluded.md_path, json_path=excluded.json_path,
                               generated_at=excluded.generated_at",
                params![
                    scope,
                    digest.date,
                    digest.summary,
                    payload,
                    md_path,
                    json_path,
                    generated_at
                ],
            )
            .context("Failed to upsert digest")?;

        Ok(())
    }

    pub fn digest(&self, scope: &str, date: NaiveDate) -> Result<Option<DigestData>> {
        let payload = self
            .conn
            .query_row(
                "SELECT payload FROM digests WHERE scope = ?1 AND date = ?2",
                params![scope, date],
                |row| row.get::<_, String>(0),
            )
            .optional()
            .context("Failed to query digest")?;

        payload
            .map(|payload| serde_json::from_str(&payload).context("Failed to parse stored digest"))
            .transpose()
    }

    pub fn latest_digest_meta(&self) -> Result<Option<DigestMetaRow>> {
        self.conn
            .query_row(
                "SELECT id, scope, date, summary, md_path, json_path, generated_at
                 FROM digests ORDER BY date DESC, generated_at DESC LIMIT 1",
                [],
                |row| {
                    Ok(DigestMetaRow {
                        id: row.get(0)?,
                        scope: row.get(1)?,
                        date: row.get(2)?,
                        summary: row.get(3)?,
                        md_path: row.get(4)?,
                        json_path: row.get(5)?,
                        generated_at: row.get(6)?,
                    })
                },
            )
            .optional()
            .context("Failed to query latest digest")
    }
}

fn team_from_row(row: &Row<'_>) -> rusqlite::Result<TeamRow> {
    Ok(TeamRow {
        id: row.get(0)?,
        org_id: row.get(1)?,
        department_id: row.get(2)?,
        name: row.get(3)?,
        member_count: row.get::<_, i64>(4)?.max(0) as usize,
    })
}

fn member_from_row(row: &Row<'_>) -> rusqlite::Result<Member> {
    Ok(Member {
        id: row.get(0)?,
        org_id: row.get(1)?,
        full_name: row.get(2)?,
        email: row.get(3)?,
        position: row.get(4)?,
        role_name: row.get(5)?,
        department_id: row.get(6)?,
        department_name: row.get(7)?,
        team_id: row.get(8)?,
        started_on: row.get(9)?,
    })
}

type ReportColumns = (String, NaiveDate, String, String);

fn report_columns(row: &Row<'_>) -> rusqlite::Result<ReportColumns> {
    Ok((row.get(0)?, row.get(1)?, row.get(2)?, row.get(3)?))
}

// The row's key columns win over whatever the stored payload says.
fn decode_report((user_id, date, status, payload): ReportColumns) -> Result<DailyReport> {
    let mut report: DailyReport = serde_json::from_str(&payload)
        .with_context(|| format!("Failed to parse daily report of {user_id} on {date}"))?;
    report.user_id = user_id;
    report.date = date;
    report.status = ReportStatus::parse(&status);

    Ok(report)
}
