use crate::config::{MAX_LOOKBACK_DAYS, RiskThresholds, TenantSettings};
use crate::model::{AiFlags, DailyReport, Member, RiskLevel};
use chrono::{Duration, NaiveDate};
use std::collections::BTreeMap;

#[derive(Debug, Clone, Copy)]
pub struct MemberHistory<'a> {
    pub member: &'a Member,
    pub date: NaiveDate,
    pub reports: &'a [DailyReport],
}

impl<'a> MemberHistory<'a> {
    pub fn today(&self) -> Option<&'a DailyReport> {
        self.reports
            .iter()
            .find(|report| report.date == self.date && report.is_published())
    }
}

pub fn classify(history: MemberHistory<'_>, settings: &TenantSettings) -> AiFlags {
    let by_date = history
        .reports
        .iter()
        .filter(|report| report.is_published() && report.date <= history.date)
        .map(|report| (report.date, report))
        .collect::<BTreeMap<_, _>>();

    let window = lookback_window(&history, &by_date, settings);
    let today = by_date.get(&history.date).copied();

    let has_blocker = today.is_some_and(|report| !report.help_requests.is_empty());
    let not_submitted_days = trailing_count(&window, |date| !by_date.contains_key(date));
    let no_big_task_days = trailing_count(&window, |date| {
        by_date
            .get(date)
            .is_none_or(|report| !report.has_big_task())
    });

    let planned_hours = today.map(DailyReport::planned_hours).unwrap_or_default();
    let overloaded = today.is_some_and(|report| {
        report.planned_hours() > settings.workday_hours()
            || report.planned_task_count() > settings.thresholds.max_planned_tasks
    });

    let signals = Signals {
        has_blocker,
        overloaded,
        no_big_task_days,
        not_submitted_days,
    };
    let risk_level = signals.risk_level(&settings.thresholds);
    let suggestion = signals.suggestion(&settings.thresholds);

    AiFlags {
        risk_level,
        has_blocker,
        no_big_task: no_big_task_days > 0,
        no_big_task_days,
        overloaded,
        planned_hours,
        not_submitted_days,
        suggestion,
    }
}

#[derive(Debug, Clone, Copy)]
struct Signals {
    has_blocker: bool,
    overloaded: bool,
    no_big_task_days: u32,
    not_submitted_days: u32,
}

impl Signals {
    fn risk_level(&self, thresholds: &RiskThresholds) -> RiskLevel {
        if self.not_submitted_days >= thresholds.not_submitted_high_days
            || (self.has_blocker && self.overloaded)
        {
            RiskLevel::High
        } else if self.has_blocker
            || self.no_big_task_days >= thresholds.no_big_task_medium_days
            || self.overloaded
        {
            RiskLevel::Medium
        } else if self.no_big_task_days >= 1 {
            RiskLevel::Low
        } else {
            RiskLevel::None
        }
    }

    fn suggestion(&self, thresholds: &RiskThresholds) -> String {
        if self.not_submitted_days >= thresholds.not_submitted_high_days {
            format!(
                "Reach out personally: no daily report for {} work days",
                self.not_submitted_days
            )
        } else if self.has_blocker && self.overloaded {
            "Unblock the open request first, then rebalance today's workload".to_string()
        } else if self.has_blocker {
            "Check in about the blocker".to_string()
        } else if self.no_big_task_days >= thresholds.no_big_task_medium_days {
            format!(
                "Help define a big task: none planned for {} days running",
                self.no_big_task_days
            )
        } else if self.overloaded {
            "Ask about workload and agree on what can move".to_string()
        } else if self.not_submitted_days > 0 {
            "Remind to submit today's report".to_string()
        } else if self.no_big_task_days > 0 {
            "Confirm today's main focus".to_string()
        } else {
            "No action needed".to_string()
        }
    }
}

/// Dates considered for streaks, newest first. The query date always counts;
/// earlier dates must be work days, inside the lookback cap and not before
/// the employment start (or the earliest known report when that is unknown).
fn lookback_window(
    history: &MemberHistory<'_>,
    by_date: &BTreeMap<NaiveDate, &DailyReport>,
    settings: &TenantSettings,
) -> Vec<NaiveDate> {
    let earliest_known = history
        .member
        .started_on
        .or_else(|| by_date.keys().next().copied())
        .unwrap_or(history.date);
    let lookback = settings.thresholds.lookback_days.clamp(1, MAX_LOOKBACK_DAYS);
    let cap = lookback as usize;

    let mut window = vec![history.date];
    let mut cursor = history.date;
    let mut calendar_steps = 0_u32;

    while window.len() < cap && calendar_steps < lookback * 2 + 7 {
        cursor -= Duration::days(1);
        calendar_steps += 1;

        if cursor < earliest_known {
            break;
        }
        if settings.is_work_day(cursor) {
            window.push(cursor);
        }
    }

    window
}

fn trailing_count(window: &[NaiveDate], predicate: impl Fn(&NaiveDate) -> bool) -> u32 {
    let streak = window.iter().take_while(|date| predicate(date)).count();
    u32::try_from(streak).unwrap_or(u32::MAX)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{BigTask, HelpRequest, MediumTask};

    fn date(day: u32) -> NaiveDate {
        // February 2026: the 16th is a Monday.
        NaiveDate::from_ymd_opt(2026, 2, day).unwrap()
    }

    fn member(started_on: Option<NaiveDate>) -> Member {
        Member {
            id: "u1".to_string(),
            org_id: "org".to_string(),
            full_name: "Olena Koval".to_string(),
            email: "olena@example.com".to_string(),
            position: "Engineer".to_string(),
            role_name: None,
            department_id: None,
            department_name: None,
            team_id: Some("t1".to_string()),
            started_on,
        }
    }

    fn report_with_big(day: u32) -> DailyReport {
        let mut report = DailyReport::empty("u1", date(day));
        report.today_big.push(BigTask {
            title: "Ship billing export".to_string(),
            timebox_h: 3.0,
            ..BigTask::default()
        });
        report
    }

    fn classify_at(day: u32, started_on: Option<NaiveDate>, reports: &[DailyReport]) -> AiFlags {
        let member = member(started_on);
        classify(
            MemberHistory {
                member: &member,
                date: date(day),
                reports,
            },
            &TenantSettings::default(),
        )
    }

    #[test]
    fn healthy_report_has_no_risk() {
        let reports = vec![report_with_big(17), report_with_big(18)];
        let flags = classify_at(18, Some(date(2)), &reports);

        assert_eq!(flags.risk_level, RiskLevel::None);
        assert!(!flags.no_big_task);
        assert_eq!(flags.not_submitted_days, 0);
        assert_eq!(flags.suggestion, "No action needed");
    }

    #[test]
    fn help_request_flags_blocker_as_medium() {
        let mut today = report_with_big(18);
        today.help_requests.push(HelpRequest {
            text: "Need staging access".to_string(),
            ..HelpRequest::default()
        });

        let flags = classify_at(18, Some(date(2)), &[today]);
        assert!(flags.has_blocker);
        assert_eq!(flags.risk_level, RiskLevel::Medium);
        assert_eq!(flags.suggestion, "Check in about the blocker");
    }

    #[test]
    fn blocker_and_overload_is_high() {
        let mut today = report_with_big(18);
        today.today_big[0].timebox_h = 4.0;
        today.today_medium = (0..6)
            .map(|index| MediumTask {
                title: format!("Review #{index}"),
                timebox_h: 1.0,
                ..MediumTask::default()
            })
            .collect();
        today.help_requests.push(HelpRequest {
            text: "Waiting on API keys".to_string(),
            ..HelpRequest::default()
        });

        let flags = classify_at(18, Some(date(2)), &[today]);
        assert!(flags.overloaded);
        assert_eq!(flags.planned_hours, 10.0);
        assert_eq!(flags.risk_level, RiskLevel::High);
    }

    #[test]
    fn too_many_small_tasks_is_overload() {
        let mut today = report_with_big(18);
        today.today_small.count = Some(11);

        let flags = classify_at(18, Some(date(2)), &[today]);
        assert!(flags.overloaded);
        assert_eq!(flags.risk_level, RiskLevel::Medium);
        assert_eq!(flags.suggestion, "Ask about workload and agree on what can move");
    }

    #[test]
    fn three_missing_work_days_is_high() {
        // Friday the 13th submitted; Mon 16, Tue 17, Wed 18 missing.
        let reports = vec![report_with_big(13)];
        let flags = classify_at(18, Some(date(2)), &reports);

        assert_eq!(flags.not_submitted_days, 3);
        assert_eq!(flags.risk_level, RiskLevel::High);
    }

    #[test]
    fn weekend_gaps_do_not_count_as_missing() {
        // Thu 12 and Fri 13 submitted, Monday 16 missing: one missing day.
        let reports = vec![report_with_big(12), report_with_big(13)];
        let flags = classify_at(16, Some(date(2)), &reports);

        assert_eq!(flags.not_submitted_days, 1);
        assert_eq!(flags.risk_level, RiskLevel::Low);
    }

    #[test]
    fn no_big_task_two_days_running_is_medium() {
        let reports = vec![
            report_with_big(16),
            DailyReport::empty("u1", date(17)),
            DailyReport::empty("u1", date(18)),
        ];

        let flags = classify_at(18, Some(date(2)), &reports);
        assert!(flags.no_big_task);
        assert_eq!(flags.no_big_task_days, 2);
        assert_eq!(flags.risk_level, RiskLevel::Medium);
    }

    #[test]
    fn single_day_without_big_task_is_low() {
        let reports = vec![report_with_big(17), DailyReport::empty("u1", date(18))];
        let flags = classify_at(18, Some(date(2)), &reports);

        assert_eq!(flags.no_big_task_days, 1);
        assert_eq!(flags.risk_level, RiskLevel::Low);
        assert_eq!(flags.suggestion, "Confirm today's main focus");
    }

    #[test]
    fn drafts_are_treated_as_not_submitted() {
        let mut draft = report_with_big(18);
        draft.status = crate::model::ReportStatus::Draft;
        let reports = vec![report_with_big(17), draft];

        let flags = classify_at(18, Some(date(2)), &reports);
        assert_eq!(flags.not_submitted_days, 1);
    }

    #[test]
    fn new_hire_without_history_is_not_high_risk() {
        let flags = classify_at(18, None, &[]);

        assert_eq!(flags.not_submitted_days, 1);
        assert_ne!(flags.risk_level, RiskLevel::High);
        assert_eq!(flags.risk_level, RiskLevel::Low);
    }

    #[test]
    fn start_date_bounds_the_missing_streak() {
        // Started Tuesday 17, nothing submitted yet.
        let flags = classify_at(18, Some(date(17)), &[]);

        assert_eq!(flags.not_submitted_days, 2);
        assert_eq!(flags.risk_level, RiskLevel::Medium);
    }

    #[test]
    fn lookback_cap_bounds_streaks() {
        let member = member(Some(date(1)));
        let settings = TenantSettings {
            thresholds: RiskThresholds {
                lookback_days: 2,
                ..RiskThresholds::default()
            },
            ..TenantSettings::default()
        };

        let flags = classify(
            MemberHistory {
                member: &member,
                date: date(18),
                reports: &[],
            },
            &settings,
        );

        assert_eq!(flags.not_submitted_days, 2);
        assert_eq!(flags.risk_level, RiskLevel::Medium);
    }

    #[test]
    fn oversized_lookback_is_clamped() {
        let member = member(None);
        let settings = TenantSettings {
            thresholds: RiskThresholds {
                lookback_days: 3_000_000_000,
                ..RiskThresholds::default()
            },
            ..TenantSettings::default()
        };

        let flags = classify(
            MemberHistory {
                member: &member,
                date: date(18),
                reports: &[report_with_big(16)],
            },
            &settings,
        );

        assert_eq!(flags.not_submitted_days, 2);
        assert_eq!(flags.risk_level, RiskLevel::Medium);
    }

    #[test]
    fn risk_is_monotonic_in_missing_days() {
        // Walk the last submission further back one work day at a time.
        let submitted_days = [17, 16, 13, 12, 11, 10, 9];
        let mut previous = RiskLevel::None;
        let mut previous_missing = 0;

        for day in submitted_days {
            let flags = classify_at(18, Some(date(2)), &[report_with_big(day)]);
            assert!(flags.not_submitted_days > previous_missing);
            assert!(flags.risk_level >= previous);
            previous = flags.risk_level;
            previous_missing = flags.not_submitted_days;
        }

        assert_eq!(previous, RiskLevel::High);
    }

    #[test]
    fn future_reports_are_ignored() {
        let reports = vec![report_with_big(19)];
        let flags = classify_at(18, Some(date(2)), &reports);

        // Every work day from Mon 2 through Wed 18 is missing.
        assert_eq!(flags.not_submitted_days, 13);
        assert_eq!(flags.risk_level, RiskLevel::High);
    }
}
