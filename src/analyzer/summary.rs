use crate::model::{RiskLevel, TeamMemberReport, TeamSummary};
use chrono::NaiveDate;

pub fn summarize(date: NaiveDate, reports: &[TeamMemberReport]) -> TeamSummary {
    let team_size = reports.len();
    let count = |predicate: fn(&TeamMemberReport) -> bool| {
        reports.iter().filter(|report| predicate(report)).count()
    };

    let reports_submitted = count(TeamMemberReport::is_submitted);
    let needing_attention = count(|report| report.risk_level().needs_attention());

    TeamSummary {
        date,
        team_size,
        reports_submitted,
        not_submitted: team_size - reports_submitted,
        report_rate: report_rate(reports_submitted, team_size),
        with_big_task: count(|report| report.has_big_task),
        with_help_request: count(|report| report.has_help_request),
        high_risk: count(|report| report.risk_level() == RiskLevel::High),
        needing_attention,
    }
}

pub fn report_rate(submitted: usize, team_size: usize) -> f64 {
    if team_size == 0 {
        return 0.0;
    }

    (submitted.min(team_size) as f64 / team_size as f64).clamp(0.0, 1.0)
}

pub fn percent(rate: f64) -> u32 {
    (rate.clamp(0.0, 1.0) * 100.0).round() as u32
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{AiFlags, DailyReport, Member};

    fn member(id: &str) -> Member {
        Member {
            id: id.to_string(),
            org_id: "org".to_string(),
            full_name: format!("Member {id}"),
            email: format!("{id}@example.com"),
            position: "Analyst".to_string(),
            role_name: None,
            department_id: None,
            department_name: None,
            team_id: Some("t1".to_string()),
            started_on: None,
        }
    }

    fn row(id: &str, submitted: bool, risk_level: RiskLevel) -> TeamMemberReport {
        let date = NaiveDate::from_ymd_opt(2026, 2, 18).unwrap();
        let report = submitted.then(|| DailyReport::empty(id, date));
        TeamMemberReport::new(
            &member(id),
            report,
            AiFlags {
                risk_level,
                ..AiFlags::default()
            },
        )
    }

    fn day() -> NaiveDate {
        NaiveDate::from_ymd_opt(2026, 2, 18).unwrap()
    }

    #[test]
    fn empty_team_has_zero_rate() {
        let summary = summarize(day(), &[]);

        assert_eq!(summary.team_size, 0);
        assert_eq!(summary.report_rate, 0.0);
        assert_eq!(summary.needing_attention, 0);
    }

    #[test]
    fn counts_submissions_and_attention() {
        let reports = vec![
            row("a", true, RiskLevel::None),
            row("b", true, RiskLevel::Medium),
            row("c", false, RiskLevel::High),
            row("d", false, RiskLevel::Low),
        ];

        let summary = summarize(day(), &reports);
        assert_eq!(summary.team_size, 4);
        assert_eq!(summary.reports_submitted, 2);
        assert_eq!(summary.not_submitted, 2);
        assert_eq!(summary.report_rate, 0.5);
        assert_eq!(summary.needing_attention, 2);
        assert_eq!(summary.high_risk, 1);
    }

    #[test]
    fn summary_is_order_independent() {
        let mut reports = vec![
            row("a", true, RiskLevel::None),
            row("b", false, RiskLevel::High),
            row("c", true, RiskLevel::Medium),
        ];
        let forward = summarize(day(), &reports);
        reports.reverse();

        assert_eq!(summarize(day(), &reports), forward);
    }

    #[test]
    fn rate_stays_within_bounds_for_all_sizes() {
        for team_size in 0..25 {
            for submitted in 0..=team_size {
                let rate = report_rate(submitted, team_size);
                assert!((0.0..=1.0).contains(&rate));
            }
        }

        let reports = (0..7)
            .map(|index| row(&index.to_string(), index % 2 == 0, RiskLevel::High))
            .collect::<Vec<_>>();
        let summary = summarize(day(), &reports);
        assert!(summary.needing_attention <= summary.team_size);
    }

    #[test]
    fn percent_rounds_to_whole_numbers() {
        assert_eq!(percent(2.0 / 3.0), 67);
        assert_eq!(percent(1.0), 100);
        assert_eq!(percent(0.0), 0);
    }
}
