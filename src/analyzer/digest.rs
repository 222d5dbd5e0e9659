use crate::analyzer::summary::percent;
use crate::config::RiskThresholds;
use crate::model::{AttentionEntry, DigestData, TeamMemberReport, TeamSummary};
use anyhow::{Context, Result};
use chrono::NaiveDate;
use std::cmp::Reverse;
use std::fs;
use std::path::{Path, PathBuf};

const MAX_HIGHLIGHTS: usize = 5;
const POSITIVE_MOOD: u8 = 4;
const LOW_MOOD: u8 = 2;
const PRODUCTIVE_DAY_TASKS: usize = 5;

#[derive(Debug)]
pub struct SavedDigest {
    pub markdown_path: PathBuf,
    pub json_path: PathBuf,
}

/// Builds the manager digest. Pure: no clock, no randomness, no hash-order
/// iteration, so identical input gives identical output.
pub fn compose(
    date: NaiveDate,
    reports: &[TeamMemberReport],
    summary: &TeamSummary,
    thresholds: &RiskThresholds,
) -> DigestData {
    let mut by_name = reports.iter().collect::<Vec<_>>();
    by_name.sort_by(|left, right| {
        left.user_name
            .cmp(&right.user_name)
            .then_with(|| left.user_id.cmp(&right.user_id))
    });

    let highlights = collect_highlights(&by_name, summary);
    let concerns = collect_concerns(&by_name, summary, thresholds);
    let people_needing_attention = people_needing_attention(reports);

    DigestData {
        date,
        summary: summary_sentence(summary, highlights.len()),
        highlights,
        concerns,
        people_needing_attention,
        metrics: summary.clone(),
    }
}

fn summary_sentence(summary: &TeamSummary, highlight_count: usize) -> String {
    if summary.team_size == 0 {
        return format!("No team members to report on for {}.", summary.date);
    }

    format!(
        "Team of {}: {} of {} reports submitted ({}%), {} need attention, {} highlights.",
        summary.team_size,
        summary.reports_submitted,
        summary.team_size,
        percent(summary.report_rate),
        summary.needing_attention,
        highlight_count
    )
}

fn collect_highlights(by_name: &[&TeamMemberReport], summary: &TeamSummary) -> Vec<String> {
    let team_wide = [
        (summary.team_size > 0 && summary.reports_submitted == summary.team_size).then(|| {
            "100% submission: every team member filed a daily report".to_string()
        }),
        (summary.team_size > 0 && summary.needing_attention == 0)
            .then(|| "Nobody needs manager attention today".to_string()),
        (summary.team_size > 0 && summary.with_big_task == summary.team_size)
            .then(|| "Everyone planned a big task for today".to_string()),
    ];

    let moods = by_name.iter().filter_map(|member| {
        let mood = member.report.as_ref()?.mood?;
        (mood >= POSITIVE_MOOD)
            .then(|| format!("{} reported positive mood ({mood}/5)", member.user_name))
    });

    let productive = by_name.iter().filter_map(|member| {
        let completed = member.report.as_ref()?.yesterday_completed();
        (completed >= PRODUCTIVE_DAY_TASKS)
            .then(|| format!("{} completed {completed} tasks yesterday", member.user_name))
    });

    team_wide
        .into_iter()
        .flatten()
        .chain(productive)
        .chain(moods)
        .take(MAX_HIGHLIGHTS)
        .collect()
}

fn collect_concerns(
    by_name: &[&TeamMemberReport],
    summary: &TeamSummary,
    thresholds: &RiskThresholds,
) -> Vec<String> {
    if summary.team_size == 0 {
        return Vec::new();
    }

    let stalled_big_task = by_name
        .iter()
        .filter(|member| member.ai_flags.no_big_task_days >= thresholds.no_big_task_medium_days)
        .count();
    let overloaded = by_name
        .iter()
        .filter(|member| member.ai_flags.overloaded)
        .count();
    let open_requests = by_name
        .iter()
        .map(|member| member.help_requests_count)
        .sum::<usize>();
    let low_mood = by_name
        .iter()
        .filter(|member| {
            member
                .report
                .as_ref()
                .and_then(|report| report.mood)
                .is_some_and(|mood| mood <= LOW_MOOD)
        })
        .count();

    [
        (summary.needing_attention > 0).then(|| {
            format!(
                "{} team member(s) need attention",
                summary.needing_attention
            )
        }),
        (summary.report_rate < thresholds.low_report_rate).then(|| {
            format!(
                "Only {}% of the team submitted reports",
                percent(summary.report_rate)
            )
        }),
        (stalled_big_task > 0).then(|| {
            format!(
                "{stalled_big_task} {} no big task {} days running",
                people(stalled_big_task),
                thresholds.no_big_task_medium_days
            )
        }),
        (open_requests > 0).then(|| format!("{open_requests} open help request(s) across the team")),
        (overloaded > 0).then(|| format!("{overloaded} {} overloaded", people_are(overloaded))),
        (low_mood > 0).then(|| format!("{low_mood} {} low mood", people_reported(low_mood))),
    ]
    .into_iter()
    .flatten()
    .collect()
}

fn people_needing_attention(reports: &[TeamMemberReport]) -> Vec<AttentionEntry> {
    let mut flagged = reports
        .iter()
        .filter(|member| member.risk_level().needs_attention())
        .collect::<Vec<_>>();

    flagged.sort_by(|left, right| {
        Reverse(left.risk_level())
            .cmp(&Reverse(right.risk_level()))
            .then_with(|| left.user_name.cmp(&right.user_name))
            .then_with(|| left.user_id.cmp(&right.user_id))
    });

    flagged
        .into_iter()
        .map(|member| AttentionEntry {
            user_id: member.user_id.clone(),
            name: member.user_name.clone(),
            role: member.role.clone().or_else(|| {
                (!member.position.is_empty()).then(|| member.position.clone())
            }),
            risk_level: member.risk_level(),
            reasons: attention_reasons(member),
        })
        .collect()
}

pub fn attention_reasons(member: &TeamMemberReport) -> Vec<String> {
    let flags = &member.ai_flags;
    let low_mood = member
        .report
        .as_ref()
        .and_then(|report| report.mood)
        .filter(|mood| *mood <= LOW_MOOD);

    [
        (flags.not_submitted_days > 0).then(|| {
            format!(
                "No daily report for {} work day(s)",
                flags.not_submitted_days
            )
        }),
        flags.has_blocker.then(|| {
            format!(
                "{} open help request(s)",
                member.help_requests_count.max(1)
            )
        }),
        flags.overloaded.then(|| {
            format!(
                "Overloaded: {:.1}h planned for the day",
                flags.planned_hours
            )
        }),
        (flags.no_big_task_days > 0 && flags.not_submitted_days == 0).then(|| {
            format!("No big task for {} day(s)", flags.no_big_task_days)
        }),
        low_mood.map(|mood| format!("Low mood reported ({mood}/5)")),
    ]
    .into_iter()
    .flatten()
    .collect()
}

pub fn render_markdown(title: &str, digest: &DigestData) -> String {
    let bullets = |items: &[String], empty: &str| {
        if items.is_empty() {
            format!("- {empty}")
        } else {
            items
                .iter()
                .map(|item| format!("- {item}"))
                .collect::<Vec<_>>()
                .join("\n")
        }
    };

    let people = if digest.people_needing_attention.is_empty() {
        "- Nobody flagged".to_string()
    } else {
        digest
            .people_needing_attention
            .iter()
            .map(|entry| {
                format!(
                    "- **{}** ({}, {} risk): {}",
                    entry.name,
                    entry.role.as_deref().unwrap_or("no role"),
                    entry.risk_level,
                    entry.reasons.join("; ")
                )
            })
            .collect::<Vec<_>>()
            .join("\n")
    };

    let metrics = &digest.metrics;

    format!(
        "# Manager Digest - {title} - {}\n\n{}\n\n## Metrics\n| Metric | Value |\n|--------|-------|\n| Team size | {} |\n| Reports submitted | {} |\n| Report rate | {}% |\n| With big task | {} |\n| With help request | {} |\n| High risk | {} |\n| Needing attention | {} |\n\n## Highlights\n{}\n\n## Concerns\n{}\n\n## People Needing Attention\n{}\n",
        digest.date,
        digest.summary,
        metrics.team_size,
        metrics.reports_submitted,
        percent(metrics.report_rate),
        metrics.with_big_task,
        metrics.with_help_request,
        metrics.high_risk,
        metrics.needing_attention,
        bullets(&digest.highlights, "No highlights"),
        bullets(&digest.concerns, "No concerns"),
        people
    )
}

pub fn save_digest_files(
    scope_key: &str,
    title: &str,
    digest: &DigestData,
    digest_dir: &Path,
) -> Result<SavedDigest> {
    fs::create_dir_all(digest_dir).with_context(|| {
        format!(
            "Failed to create digest directory: {}",
            digest_dir.display()
        )
    })?;

    let stem = format!("{}-{}", digest.date.format("%Y-%m-%d"), file_safe(scope_key));
    let markdown_path = digest_dir.join(format!("{stem}.md"));
    let json_path = digest_dir.join(format!("{stem}.json"));

    fs::write(&markdown_path, render_markdown(title, digest)).with_context(|| {
        format!(
            "Failed to write Markdown digest: {}",
            markdown_path.display()
        )
    })?;

    let json_content =
        serde_json::to_string_pretty(digest).context("Failed to serialize digest JSON")?;
    fs::write(&json_path, json_content)
        .with_context(|| format!("Failed to write JSON digest: {}", json_path.display()))?;

    Ok(SavedDigest {
        markdown_path,
        json_path,
    })
}

fn file_safe(raw: &str) -> String {
    raw.chars()
        .map(|ch| {
            if ch.is_ascii_alphanumeric() || ch == '-' || ch == '_' {
                ch
            } else {
                '_'
            }
        })
        .collect()
}

fn people(count: usize) -> &'static str {
    if count == 1 { "person has" } else { "people have" }
}

fn people_are(count: usize) -> &'static str {
    if count == 1 { "person is" } else { "people are" }
}

fn people_reported(count: usize) -> &'static str {
    if count == 1 {
        "person reported"
    } else {
        "people reported"
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::analyzer::summary::summarize;
    use crate::model::{AiFlags, BigTask, DailyReport, HelpRequest, Member, RiskLevel};

    fn day() -> NaiveDate {
        NaiveDate::from_ymd_opt(2026, 2, 18).unwrap()
    }

    fn member(id: &str, name: &str) -> Member {
        Member {
            id: id.to_string(),
            org_id: "org".to_string(),
            full_name: name.to_string(),
            email: format!("{id}@example.com"),
            position: "Engineer".to_string(),
            role_name: Some("Backend Engineer".to_string()),
            department_id: None,
            department_name: None,
            team_id: Some("t1".to_string()),
            started_on: None,
        }
    }

    fn healthy(id: &str, name: &str) -> TeamMemberReport {
        let mut report = DailyReport::empty(id, day());
        report.today_big.push(BigTask {
            title: "Focus work".to_string(),
            timebox_h: 3.0,
            ..BigTask::default()
        });
        TeamMemberReport::new(&member(id, name), Some(report), AiFlags::default())
    }

    fn missing(id: &str, name: &str, days: u32, risk_level: RiskLevel) -> TeamMemberReport {
        TeamMemberReport::new(
            &member(id, name),
            None,
            AiFlags {
                risk_level,
                no_big_task: true,
                no_big_task_days: days,
                not_submitted_days: days,
                ..AiFlags::default()
            },
        )
    }

    fn digest_for(reports: &[TeamMemberReport]) -> DigestData {
        let summary = summarize(day(), reports);
        compose(day(), reports, &summary, &RiskThresholds::default())
    }

    #[test]
    fn full_submission_team_gets_highlight_and_no_attention() {
        let reports = ["Anna", "Bohdan", "Chen", "Dana", "Emil"]
            .iter()
            .enumerate()
            .map(|(index, name)| healthy(&format!("u{index}"), name))
            .collect::<Vec<_>>();

        let digest = digest_for(&reports);
        assert_eq!(digest.metrics.report_rate, 1.0);
        assert_eq!(digest.metrics.needing_attention, 0);
        assert!(digest.people_needing_attention.is_empty());
        assert!(
            digest
                .highlights
                .iter()
                .any(|highlight| highlight.contains("100% submission"))
        );
        assert!(digest.concerns.is_empty());
    }

    #[test]
    fn high_risk_non_submitter_is_listed_first() {
        let mut blocked = healthy("u2", "Anna");
        blocked.ai_flags.risk_level = RiskLevel::Medium;
        blocked.ai_flags.has_blocker = true;
        blocked.help_requests_count = 1;

        let reports = vec![
            healthy("u1", "Zoe"),
            blocked,
            missing("u3", "Yurii", 3, RiskLevel::High),
        ];

        let digest = digest_for(&reports);
        let first = &digest.people_needing_attention[0];
        assert_eq!(first.name, "Yurii");
        assert_eq!(first.risk_level, RiskLevel::High);
        assert_eq!(first.reasons, vec!["No daily report for 3 work day(s)"]);
        assert_eq!(digest.people_needing_attention[1].name, "Anna");
    }

    #[test]
    fn equal_risk_is_ordered_by_name() {
        let reports = vec![
            missing("u1", "Marta", 2, RiskLevel::Medium),
            missing("u2", "Andrii", 2, RiskLevel::Medium),
            missing("u3", "Zlata", 4, RiskLevel::High),
            missing("u4", "Borys", 5, RiskLevel::High),
        ];

        let names = digest_for(&reports)
            .people_needing_attention
            .into_iter()
            .map(|entry| entry.name)
            .collect::<Vec<_>>();
        assert_eq!(names, vec!["Borys", "Zlata", "Andrii", "Marta"]);
    }

    #[test]
    fn digest_is_deterministic_regardless_of_input_order() {
        let mut reports = vec![
            healthy("u1", "Anna"),
            missing("u2", "Bohdan", 2, RiskLevel::Medium),
            missing("u3", "Chen", 3, RiskLevel::High),
        ];
        reports[0].report.as_mut().unwrap().mood = Some(5);

        let first = digest_for(&reports);
        let second = digest_for(&reports);
        assert_eq!(
            serde_json::to_string(&first).unwrap(),
            serde_json::to_string(&second).unwrap()
        );

        reports.reverse();
        assert_eq!(digest_for(&reports), first);
    }

    #[test]
    fn empty_team_says_no_members() {
        let digest = digest_for(&[]);

        assert!(digest.summary.starts_with("No team members"));
        assert!(!digest.summary.contains("NaN"));
        assert_eq!(digest.metrics.report_rate, 0.0);
        assert!(digest.concerns.is_empty());
        assert!(digest.highlights.is_empty());
    }

    #[test]
    fn concerns_cover_rate_stalls_and_requests() {
        let mut asking = healthy("u1", "Anna");
        asking
            .report
            .as_mut()
            .unwrap()
            .help_requests
            .push(HelpRequest {
                text: "Need review".to_string(),
                ..HelpRequest::default()
            });
        asking.help_requests_count = 1;
        asking.has_help_request = true;
        asking.ai_flags.has_blocker = true;
        asking.ai_flags.risk_level = RiskLevel::Medium;

        let reports = vec![
            asking,
            missing("u2", "Bohdan", 2, RiskLevel::Medium),
            missing("u3", "Chen", 2, RiskLevel::Medium),
            missing("u4", "Dana", 2, RiskLevel::Medium),
        ];

        let digest = digest_for(&reports);
        assert_eq!(
            digest.concerns,
            vec![
                "4 team member(s) need attention".to_string(),
                "Only 25% of the team submitted reports".to_string(),
                "3 people have no big task 2 days running".to_string(),
                "1 open help request(s) across the team".to_string(),
            ]
        );
        assert_eq!(
            digest.summary,
            "Team of 4: 1 of 4 reports submitted (25%), 4 need attention, 0 highlights."
        );
    }

    #[test]
    fn highlights_are_capped() {
        let reports = (0..8)
            .map(|index| {
                let mut member = healthy(&format!("u{index}"), &format!("Person {index}"));
                member.report.as_mut().unwrap().mood = Some(5);
                member
            })
            .collect::<Vec<_>>();

        assert_eq!(digest_for(&reports).highlights.len(), MAX_HIGHLIGHTS);
    }

    #[test]
    fn markdown_lists_people_and_metrics() {
        let reports = vec![missing("u3", "Chen", 3, RiskLevel::High)];
        let markdown = render_markdown("Platform", &digest_for(&reports));

        assert!(markdown.starts_with("# Manager Digest - Platform - 2026-02-18"));
        assert!(markdown.contains("| Team size | 1 |"));
        assert!(markdown.contains("**Chen** (Backend Engineer, high risk)"));
    }

    #[test]
    fn save_digest_files_writes_both_formats() {
        let dir = tempfile::tempdir().expect("tempdir");
        let digest = digest_for(&[healthy("u1", "Anna")]);

        let saved = save_digest_files("team:core/1", "Core", &digest, dir.path()).expect("save");
        assert!(saved.markdown_path.ends_with("2026-02-18-team_core_1.md"));
        assert!(saved.json_path.exists());

        let stored: DigestData =
            serde_json::from_str(&fs::read_to_string(&saved.json_path).unwrap()).unwrap();
        assert_eq!(stored, digest);
    }
}
