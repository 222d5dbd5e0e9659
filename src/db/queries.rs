pub const CREATE_ORGANIZATIONS: &str = r#"
CREATE TABLE IF NOT EXISTS organizations (
  id         TEXT PRIMARY KEY,
  name       TEXT NOT NULL,
  settings   TEXT NOT NULL DEFAULT '{}',
  created_at INTEGER NOT NULL DEFAULT 0
);
"#;

pub const CREATE_DEPARTMENTS: &str = r#"
CREATE TABLE IF NOT EXISTS departments (
  id     TEXT PRIMARY KEY,
  org_id TEXT NOT NULL REFERENCES organizations(id),
  name   TEXT NOT NULL
);
"#;

pub const CREATE_TEAMS: &str = r#"
CREATE TABLE IF NOT EXISTS teams (
  id            TEXT PRIMARY KEY,
  org_id        TEXT NOT NULL REFERENCES organizations(id),
  department_id TEXT REFERENCES departments(id),
  name          TEXT NOT NULL
);
"#;

pub const CREATE_MEMBERS: &str = r#"
CREATE TABLE IF NOT EXISTS members (
  id            TEXT PRIMARY KEY,
  org_id        TEXT NOT NULL REFERENCES organizations(id),
  full_name     TEXT NOT NULL,
  email         TEXT NOT NULL,
  position      TEXT NOT NULL DEFAULT '',
  role_name     TEXT,
  mission       TEXT,
  department_id TEXT REFERENCES departments(id),
  team_id       TEXT REFERENCES teams(id),
  started_on    TEXT,
  active        INTEGER NOT NULL DEFAULT 1
);
"#;

pub const CREATE_DAILY_REPORTS: &str = r#"
CREATE TABLE IF NOT EXISTS daily_reports (
  id           INTEGER PRIMARY KEY AUTOINCREMENT,
  user_id      TEXT NOT NULL REFERENCES members(id),
  date         TEXT NOT NULL,
  status       TEXT NOT NULL DEFAULT 'PUBLISHED',
  payload      TEXT NOT NULL,
  submitted_at TEXT,
  updated_at   INTEGER NOT NULL,
  UNIQUE(user_id, date)
);
"#;

pub const CREATE_DIGESTS: &str = r#"
CREATE TABLE IF NOT EXISTS digests (
  id           INTEGER PRIMARY KEY AUTOINCREMENT,
  scope        TEXT NOT NULL,
  date         TEXT NOT NULL,
  summary      TEXT NOT NULL,
  payload      TEXT NOT NULL,
  md_path      TEXT,
  json_path    TEXT,
  generated_at INTEGER NOT NULL,
  UNIQUE(scope, date)
);
"#;

pub const INDEX_MEMBERS_TEAM: &str =
    "CREATE INDEX IF NOT EXISTS idx_members_team ON members(team_id);";

pub const INDEX_MEMBERS_DEPARTMENT: &str =
    "CREATE INDEX IF NOT EXISTS idx_members_department ON members(department_id);";

pub const INDEX_DAILY_REPORTS_USER_DATE: &str =
    "CREATE INDEX IF NOT EXISTS idx_daily_reports_user_date ON daily_reports(user_id, date);";

pub const INDEX_DIGESTS_DATE: &str =
    "CREATE INDEX IF NOT EXISTS idx_digests_date ON digests(date);";

pub const SELECT_MEMBER: &str = r#"
SELECT m.id, m.org_id, m.full_name, m.email, m.position, m.role_name,
       m.department_id, d.name, m.team_id, m.started_on
FROM members m
LEFT JOIN departments d ON d.id = m.department_id
"#;

pub fn schema_statements() -> Vec<&'static str> {
    vec![
        CREATE_ORGANIZATIONS,
        CREATE_DEPARTMENTS,
        CREATE_TEAMS,
        CREATE_MEMBERS,
        CREATE_DAILY_REPORTS,
        CREATE_DIGESTS,
        INDEX_MEMBERS_TEAM,
        INDEX_MEMBERS_DEPARTMENT,
        INDEX_DAILY_REPORTS_USER_DATE,
        INDEX_DIGESTS_DATE,
    ]
}
