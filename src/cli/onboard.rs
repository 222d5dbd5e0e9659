use crate::config::{Config, DEFAULT_ORG_ID, TenantSettings, default_digest_dir, expand_home, parse_hhmm};
use crate::db::Database;
use crate::db::seed::seed_demo;
use anyhow::{Context, Result};
use chrono::Utc;
use dialoguer::{Confirm, Input, Select, theme::ColorfulTheme};

const WORK_WEEK_PRESETS: [(&str, [u8; 5]); 2] = [
    ("Monday - Friday", [1, 2, 3, 4, 5]),
    ("Sunday - Thursday", [7, 1, 2, 3, 4]),
];

pub fn run_onboarding(seed_demo_flag: bool) -> Result<Config> {
    println!("──────────────────────────────────────────");
    println!("  Welcome to TeamPulse onboarding.");
    println!("──────────────────────────────────────────");

    let theme = ColorfulTheme::default();

    println!("\n[1/5] Organization");
    let org_id: String = Input::with_theme(&theme)
        .with_prompt("  Organization id")
        .default(DEFAULT_ORG_ID.to_string())
        .interact_text()
        .context("Failed to read organization id")?;
    let org_name: String = Input::with_theme(&theme)
        .with_prompt("  Organization name")
        .default("My Company".to_string())
        .interact_text()
        .context("Failed to read organization name")?;

    println!("\n[2/5] Working calendar");
    let timezone: String = Input::with_theme(&theme)
        .with_prompt("  IANA timezone")
        .default(TenantSettings::default().timezone)
        .validate_with(|input: &String| -> std::result::Result<(), &str> {
            input
                .parse::<chrono_tz::Tz>()
                .map(|_| ())
                .map_err(|_| "Unknown timezone (example: Europe/Kyiv)")
        })
        .interact_text()
        .context("Failed to read timezone")?;
    let work_start = prompt_time(&theme, "  Work day starts at", "09:00")?;
    let work_end = prompt_time(&theme, "  Work day ends at", "18:00")?;
    let break_minutes: u32 = Input::with_theme(&theme)
        .with_prompt("  Break length in minutes")
        .default(60)
        .interact_text()
        .context("Failed to read break length")?;

    let preset_labels = WORK_WEEK_PRESETS
        .iter()
        .map(|(label, _)| *label)
        .collect::<Vec<_>>();
    let preset_index = Select::with_theme(&theme)
        .with_prompt("  Work week")
        .default(0)
        .items(&preset_labels)
        .interact()
        .context("Failed to select work week")?;
    let work_days = WORK_WEEK_PRESETS
        .get(preset_index)
        .map(|(_, days)| days.to_vec())
        .unwrap_or_else(|| TenantSettings::default().work_days);

    println!("\n[3/5] AI features");
    let mut settings = TenantSettings {
        timezone,
        work_start,
        work_end,
        break_minutes,
        work_days,
        ..TenantSettings::default()
    };
    settings.ai_policy.manager_digest_enabled = Confirm::with_theme(&theme)
        .with_prompt("  Enable the manager digest?")
        .default(true)
        .interact()
        .context("Failed to read digest choice")?;
    settings.ai_policy.ai_mentor_enabled = Confirm::with_theme(&theme)
        .with_prompt("  Enable the AI mentor for employees?")
        .default(false)
        .interact()
        .context("Failed to read mentor choice")?;
    settings.validate()?;

    println!("\n[4/5] Digest schedule");
    let digest_time = prompt_time(&theme, "  Daily digest time", "08:30")?;
    let digest_dir_input: String = Input::with_theme(&theme)
        .with_prompt("  Folder where digests will be saved")
        .default(default_digest_dir().display().to_string())
        .interact_text()
        .context("Failed to read digest directory")?;
    let digest_dir = expand_home(&digest_dir_input);
    println!("  ✓ Digests at {digest_time} into {}", digest_dir.display());

    println!("\n[5/5] Demo data");
    let with_demo = if seed_demo_flag {
        true
    } else {
        Confirm::with_theme(&theme)
            .with_prompt("  Load the demo organization with sample reports?")
            .default(false)
            .interact()
            .context("Failed to read demo data choice")?
    };

    let config = Config {
        digest_time,
        digest_dir,
        default_org_id: org_id.trim().to_string(),
        ..Config::default()
    };

    config.ensure_bootstrap_files()?;
    config.save()?;
    let database = Database::open(&config.db_path)?;

    if with_demo {
        let summary = seed_demo(&database, settings.today()?)?;
        println!(
            "  ✓ Demo data loaded: {} teams, {} members, {} reports",
            summary.teams, summary.members, summary.reports
        );
    }

    database.upsert_organization(
        &config.default_org_id,
        org_name.trim(),
        &settings,
        Utc::now().timestamp(),
    )?;

    println!("\n──────────────────────────────────────────");
    println!("  Onboarding complete!");
    println!("  Run `teampulse serve` to start the API.");
    println!("  Run `teampulse status` to check current state.");
    println!("──────────────────────────────────────────");

    Ok(config)
}

fn prompt_time(theme: &ColorfulTheme, prompt: &str, default: &str) -> Result<String> {
    Input::with_theme(theme)
        .with_prompt(prompt)
        .default(default.to_string())
        .validate_with(|input: &String| -> std::result::Result<(), &str> {
            parse_hhmm(input)
                .map(|_| ())
                .map_err(|_| "Use HH:MM format (example: 09:00)")
        })
        .interact_text()
        .with_context(|| format!("Failed to read {}", prompt.trim()))
}
