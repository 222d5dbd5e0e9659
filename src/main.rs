mod ai;
mod analyzer;
mod api;
mod cli;
mod config;
mod db;
mod error;
mod model;
mod scheduler;

use crate::analyzer::TeamScope;
use crate::analyzer::filter::{DashboardView, FilterState};
use crate::analyzer::summary::percent;
use crate::cli::onboard::run_onboarding;
use crate::cli::{AiCommands, Cli, Commands, ConfigCommands};
use crate::config::Config;
use crate::db::Database;
use crate::db::seed::seed_demo;
use anyhow::{Context, Result, bail};
use chrono::NaiveDate;
use clap::Parser;
use std::net::{Ipv4Addr, SocketAddr, TcpStream};
use std::sync::Arc;
use std::time::Duration;
use tokio::signal;
use tracing::info;
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env().add_directive("info".parse()?))
        .with_target(false)
        .compact()
        .init();

    let cli = Cli::parse();

    match cli.command {
        Commands::Onboard { seed_demo: with_demo } => {
            let _ = run_onboarding(with_demo)?;
            Ok(())
        }
        Commands::Config { command } => handle_config_command(command),
        Commands::Seed => handle_seed(),
        Commands::Serve => {
            let config = load_config()?;
            run_service(config).await
        }
        Commands::Status => handle_status(),
        Commands::Doctor => handle_doctor(),
        Commands::Team => handle_team(),
        Commands::Summary {
            team,
            dept,
            date,
            filter,
        } => handle_summary(scope_from_args(team, dept)?, date, filter),
        Commands::Digest { team, dept, date } => {
            handle_digest(scope_from_args(team, dept)?, date)
        }
        Commands::Mentor { user, date } => handle_mentor(&user, date),
        Commands::Structure { text } => handle_structure(&text),
        Commands::Ai { command } => handle_ai_command(command),
    }
}

fn handle_config_command(command: ConfigCommands) -> Result<()> {
    match command {
        ConfigCommands::Set { key, value } => {
            let mut config = load_or_default_config()?;
            config.set_value(&key, &value)?;
            config.ensure_bootstrap_files()?;
            config.save()?;

            let masked = if key.contains("api_key") {
                "***hidden***".to_string()
            } else {
                value
            };
            println!("Config saved: {key} = {masked}");
            Ok(())
        }
        ConfigCommands::Get { key } => {
            let config = load_config()?;
            let value = config
                .get_value(&key)
                .with_context(|| format!("Unsupported config key: {key}"))?;

            println!("{value}");
            Ok(())
        }
    }
}

fn handle_seed() -> Result<()> {
    let config = load_or_default_config()?;
    let database = Database::open(&config.db_path)?;
    let today = analyzer::tenant_settings(&database, &config.default_org_id)?.today()?;

    let summary = seed_demo(&database, today)?;
    println!(
        "Demo data loaded: {} departments, {} teams, {} members, {} reports",
        summary.departments, summary.teams, summary.members, summary.reports
    );

    Ok(())
}

fn handle_status() -> Result<()> {
    let config = load_config()?;
    let database = Database::open(&config.db_path)?;

    println!("TeamPulse status");
    println!("- db_path: {}", config.db_path.display());
    println!("- api_listening: {}", is_port_open(config.api_port));
    println!("- default_org: {}", config.default_org_id);
    println!("- teams: {}", database.list_teams()?.len());
    println!("- reports_stored: {}", database.count_reports()?);
    println!(
        "- latest_digest: {}",
        database
            .latest_digest_meta()?
            .map(|meta| format!("{} ({})", meta.date, meta.scope))
            .unwrap_or_else(|| "none".to_string())
    );
    println!("- digest_time: {}", config.digest_time);

    Ok(())
}

fn handle_doctor() -> Result<()> {
    let config_path = Config::config_path()?;
    let mut issues = Vec::new();

    if config_path.exists() {
        println!("[OK] config.json found: {}", config_path.display());
    } else {
        println!("[WARN] config.json not found: {}", config_path.display());
        issues.push("config missing".to_string());
    }

    let config = load_or_default_config()?;

    match Database::open(&config.db_path) {
        Ok(database) => {
            println!("[OK] SQLite reachable: {}", config.db_path.display());
            match database.organization(&config.default_org_id) {
                Ok(Some(org)) => match org.settings.validate() {
                    Ok(()) => println!(
                        "[OK] organization {} settings valid ({})",
                        org.id, org.settings.timezone
                    ),
                    Err(error) => {
                        println!("[WARN] organization {} settings invalid: {error}", org.id);
                        issues.push("invalid tenant settings".to_string());
                    }
                },
                Ok(None) => {
                    println!(
                        "[WARN] organization {} not found (run `teampulse onboard` or `teampulse seed`)",
                        config.default_org_id
                    );
                    issues.push("organization missing".to_string());
                }
                Err(error) => {
                    println!("[WARN] organization check failed: {error}");
                    issues.push("organization unreadable".to_string());
                }
            }
        }
        Err(error) => {
            println!("[WARN] SQLite check failed: {error}");
            issues.push("db unreachable".to_string());
        }
    }

    if config.digest_dir.exists() {
        println!("[OK] digest dir exists: {}", config.digest_dir.display());
    } else {
        println!("[WARN] digest dir missing: {}", config.digest_dir.display());
        issues.push("digest dir missing".to_string());
    }

    if let Err(error) = config.parse_digest_time() {
        println!("[WARN] invalid digest_time setting: {error}");
        issues.push("invalid digest_time".to_string());
    } else {
        println!("[OK] digest_time format valid: {}", config.digest_time);
    }

    if config.ai_enabled {
        if ai::has_api_key(&config) {
            println!("[OK] AI API key is configured");
        } else {
            println!("[WARN] AI is enabled but API key is missing");
            issues.push("ai api key missing".to_string());
        }
    } else {
        println!("[OK] AI disabled (rule-based mentor and structurizer)");
    }

    if issues.is_empty() {
        println!("doctor result: no issues");
    } else {
        println!("doctor result: {} warning(s)", issues.len());
    }

    Ok(())
}

fn handle_team() -> Result<()> {
    let config = load_config()?;
    let database = Database::open(&config.db_path)?;
    let teams = database.list_teams()?;

    if teams.is_empty() {
        println!("No teams yet. Run `teampulse seed` to load demo data.");
        return Ok(());
    }

    for team in teams {
        println!(
            "{}\t{}\t{} member(s)\t{}",
            team.id,
            team.name,
            team.member_count,
            team.department_id.as_deref().unwrap_or("-")
        );
    }

    Ok(())
}

fn handle_summary(scope: TeamScope, date: Option<String>, filter: Option<String>) -> Result<()> {
    let config = load_config()?;
    let database = Database::open(&config.db_path)?;
    let filters = FilterState::from_query_string(filter.as_deref().unwrap_or_default())?;

    let mut view = DashboardView::with_filters(filters);
    let token = view.begin_refresh();
    let dashboard = analyzer::team_dashboard(&database, &scope, parse_optional_date(date)?)?;
    view.apply_response(token, dashboard.reports, dashboard.summary);

    let Some(summary) = view.summary() else {
        bail!("No summary available for {}", dashboard.title);
    };

    println!("{} ({})", dashboard.title, dashboard.date);
    println!(
        "- submitted: {}/{} ({}%)",
        summary.reports_submitted,
        summary.team_size,
        percent(summary.report_rate)
    );
    println!("- with big task: {}", summary.with_big_task);
    println!("- with help request: {}", summary.with_help_request);
    println!(
        "- needing attention: {} ({} high risk)",
        summary.needing_attention, summary.high_risk
    );

    let visible = view.visible();
    println!();
    if visible.is_empty() {
        println!("No members match the current filters.");
    }
    for member in visible {
        println!(
            "[{:<6}] {:<24} {:<13} {}",
            member.risk_level().as_str(),
            member.user_name,
            if member.is_submitted() {
                "submitted"
            } else {
                "not submitted"
            },
            member.ai_flags.suggestion
        );
    }

    Ok(())
}

fn handle_digest(scope: TeamScope, date: Option<String>) -> Result<()> {
    let config = load_config()?;
    let (digest, saved) =
        analyzer::generate_and_store_digest(&config, &scope, parse_optional_date(date)?)?;

    println!("Digest generated: {} ({})", digest.date, scope.key());
    println!("{}", digest.summary);
    println!("- Markdown: {}", saved.markdown_path.display());
    println!("- JSON: {}", saved.json_path.display());

    Ok(())
}

fn handle_mentor(user_id: &str, date: Option<String>) -> Result<()> {
    let config = load_config()?;
    let database = Database::open(&config.db_path)?;
    let (member, settings) = analyzer::member_settings(&database, user_id)?;

    let advice = analyzer::mentor_advice(&database, user_id, parse_optional_date(date)?)?;
    let advice = ai::enhance_mentor_advice(&config, advice, &settings.ai_policy.tone);

    println!("Mentor for {} ({})", member.full_name, advice.date);
    println!("Main focus: {}", advice.main_focus);
    for (index, action) in advice.actions.iter().enumerate() {
        println!("{}. {action}", index + 1);
    }
    for warning in &advice.warnings {
        println!("! {warning}");
    }
    for insight in &advice.insights {
        println!("* {insight}");
    }

    Ok(())
}

fn handle_structure(text: &str) -> Result<()> {
    let config = load_or_default_config()?;
    let task = ai::structure_task(&config, text)?;

    println!(
        "{}",
        serde_json::to_string_pretty(&task).context("Failed to serialize structured task")?
    );

    Ok(())
}

fn handle_ai_command(command: AiCommands) -> Result<()> {
    match command {
        AiCommands::Test {
            key,
            base_url,
            model,
        } => {
            let mut config = load_or_default_config()?;

            if let Some(value) = key {
                config.ai_api_key = Some(value);
            }
            if let Some(value) = base_url {
                config.ai_api_base_url = value;
            }
            if let Some(value) = model {
                config.ai_model = value;
            }

            let response = ai::test_connection(&config)?;
            println!("AI API connection successful");
            println!("{response}");

            Ok(())
        }
    }
}

async fn run_service(config: Config) -> Result<()> {
    config.ensure_bootstrap_files()?;
    let _ = Database::open(&config.db_path)?;

    let shared_config = Arc::new(config);
    let scheduler_config = Arc::clone(&shared_config);
    let scheduler_time_fallback = Arc::clone(&shared_config);
    let api_config = Arc::clone(&shared_config);

    info!("TeamPulse service started");

    tokio::select! {
        scheduler_result = scheduler::run_daily_scheduler(move || {
            Config::load()
                .unwrap_or_else(|_| (*scheduler_time_fallback).clone())
                .parse_digest_time()
        }, move || {
            let config = Arc::clone(&scheduler_config);
            async move {
                let runtime_config = Config::load().unwrap_or_else(|_| (*config).clone());
                tokio::task::spawn_blocking(move || analyzer::digest_all_teams(&runtime_config))
                    .await
                    .context("Digest worker failed")?
            }
        }) => {
            scheduler_result?;
        }
        api_result = api::run_server(api_config) => {
            api_result?;
        }
        _ = signal::ctrl_c() => {
            info!("shutdown signal received");
        }
    }

    Ok(())
}

fn scope_from_args(team: Option<String>, dept: Option<String>) -> Result<TeamScope> {
    match (team, dept) {
        (Some(team), _) => Ok(TeamScope::Team(team)),
        (None, Some(dept)) => Ok(TeamScope::Department(dept)),
        (None, None) => bail!("Pass --team <ID> or --dept <ID>. List teams with `teampulse team`."),
    }
}

fn parse_optional_date(input: Option<String>) -> Result<Option<NaiveDate>> {
    input
        .as_deref()
        .map(|date| {
            NaiveDate::parse_from_str(date, "%Y-%m-%d")
                .with_context(|| format!("Invalid date format: {date}. Example: 2026-02-18"))
        })
        .transpose()
}

fn load_or_default_config() -> Result<Config> {
    Config::load().or_else(|_| {
        let config = Config::default();
        config.ensure_bootstrap_files()?;
        config.save()?;
        Ok(config)
    })
}

fn load_config() -> Result<Config> {
    Config::load()
        .with_context(|| "Config file not found. Run `teampulse onboard` first.".to_string())
}

fn is_port_open(port: u16) -> bool {
    let addr = SocketAddr::from((Ipv4Addr::LOCALHOST, port));
    TcpStream::connect_timeout(&addr, Duration::from_millis(250)).is_ok()
}
