use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct ReportDraft {
    pub yesterday: YesterdayDraft,
    pub today: TodayDraft,
    pub help: HelpDraft,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct YesterdayDraft {
    pub planned_tasks: Vec<DraftTask>,
    pub unplanned_work: String,
    pub summary: String,
    pub small_tasks: String,
    pub metrics: String,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct TodayDraft {
    pub big_task: String,
    pub big_task_time: String,
    pub is_big_task_booked: Option<bool>,
    pub medium_tasks: String,
    pub small_tasks: String,
    pub expected_metrics: String,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct HelpDraft {
    pub blockers: String,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct DraftTask {
    pub id: String,
    pub title: String,
    #[serde(rename = "type")]
    pub size: String,
    pub status: String,
    pub comment: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MergePolicy {
    ReplaceIfPresent,
    AppendWithSeparator,
    ExtendList,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DraftField {
    YesterdayPlannedTasks,
    YesterdayUnplannedWork,
    YesterdaySummary,
    YesterdaySmallTasks,
    YesterdayMetrics,
    TodayBigTask,
    TodayBigTaskTime,
    TodayBigTaskBooked,
    TodayMediumTasks,
    TodaySmallTasks,
    TodayExpectedMetrics,
    HelpBlockers,
}

pub const TEXT_SEPARATOR: &str = "\n";

pub const MERGE_POLICIES: &[(DraftField, MergePolicy)] = &[
    (DraftField::YesterdayPlannedTasks, MergePolicy::ExtendList),
    (DraftField::YesterdayUnplannedWork, MergePolicy::AppendWithSeparator),
    (DraftField::YesterdaySummary, MergePolicy::AppendWithSeparator),
    (DraftField::YesterdaySmallTasks, MergePolicy::AppendWithSeparator),
    (DraftField::YesterdayMetrics, MergePolicy::AppendWithSeparator),
    (DraftField::TodayBigTask, MergePolicy::ReplaceIfPresent),
    (DraftField::TodayBigTaskTime, MergePolicy::ReplaceIfPresent),
    (DraftField::TodayBigTaskBooked, MergePolicy::ReplaceIfPresent),
    (DraftField::TodayMediumTasks, MergePolicy::AppendWithSeparator),
    (DraftField::TodaySmallTasks, MergePolicy::AppendWithSeparator),
    (DraftField::TodayExpectedMetrics, MergePolicy::AppendWithSeparator),
    (DraftField::HelpBlockers, MergePolicy::AppendWithSeparator),
];

/// Merges a dictated partial draft into the current editor state, one field
/// at a time, according to `MERGE_POLICIES`.
pub fn merge_drafts(current: &ReportDraft, incoming: &ReportDraft) -> ReportDraft {
    let mut merged = current.clone();

    for (field, policy) in MERGE_POLICIES {
        match field {
            DraftField::YesterdayPlannedTasks => merge_list(
                *policy,
                &mut merged.yesterday.planned_tasks,
                &incoming.yesterday.planned_tasks,
            ),
            DraftField::TodayBigTaskBooked => {
                if incoming.today.is_big_task_booked.is_some() {
                    merged.today.is_big_task_booked = incoming.today.is_big_task_booked;
                }
            }
            text_field => {
                if let (Some(target), Some(value)) = (
                    text_field_mut(&mut merged, *text_field),
                    text_field_ref(incoming, *text_field),
                ) {
                    merge_text(*policy, target, value);
                }
            }
        }
    }

    merged
}

pub fn merge_text(policy: MergePolicy, target: &mut String, incoming: &str) {
    let incoming = incoming.trim();
    if incoming.is_empty() {
        return;
    }

    match policy {
        MergePolicy::ReplaceIfPresent => *target = incoming.to_string(),
        MergePolicy::AppendWithSeparator | MergePolicy::ExtendList => {
            if target.trim().is_empty() {
                *target = incoming.to_string();
            } else {
                target.push_str(TEXT_SEPARATOR);
                target.push_str(incoming);
            }
        }
    }
}

fn merge_list<T: Clone>(policy: MergePolicy, target: &mut Vec<T>, incoming: &[T]) {
    if incoming.is_empty() {
        return;
    }

    match policy {
        MergePolicy::ReplaceIfPresent => *target = incoming.to_vec(),
        MergePolicy::AppendWithSeparator | MergePolicy::ExtendList => {
            target.extend_from_slice(incoming)
        }
    }
}

fn text_field_mut(draft: &mut ReportDraft, field: DraftField) -> Option<&mut String> {
    match field {
        DraftField::YesterdayUnplannedWork => Some(&mut draft.yesterday.unplanned_work),
        DraftField::YesterdaySummary => Some(&mut draft.yesterday.summary),
        DraftField::YesterdaySmallTasks => Some(&mut draft.yesterday.small_tasks),
        DraftField::YesterdayMetrics => Some(&mut draft.yesterday.metrics),
        DraftField::TodayBigTask => Some(&mut draft.today.big_task),
        DraftField::TodayBigTaskTime => Some(&mut draft.today.big_task_time),
        DraftField::TodayMediumTasks => Some(&mut draft.today.medium_tasks),
        DraftField::TodaySmallTasks => Some(&mut draft.today.small_tasks),
        DraftField::TodayExpectedMetrics => Some(&mut draft.today.expected_metrics),
        DraftField::HelpBlockers => Some(&mut draft.help.blockers),
        DraftField::YesterdayPlannedTasks | DraftField::TodayBigTaskBooked => None,
    }
}

fn text_field_ref(draft: &ReportDraft, field: DraftField) -> Option<&str> {
    let value = match field {
        DraftField::YesterdayUnplannedWork => &draft.yesterday.unplanned_work,
        DraftField::YesterdaySummary => &draft.yesterday.summary,
        DraftField::YesterdaySmallTasks => &draft.yesterday.small_tasks,
        DraftField::YesterdayMetrics => &draft.yesterday.metrics,
        DraftField::TodayBigTask => &draft.today.big_task,
        DraftField::TodayBigTaskTime => &draft.today.big_task_time,
        DraftField::TodayMediumTasks => &draft.today.medium_tasks,
        DraftField::TodaySmallTasks => &draft.today.small_tasks,
        DraftField::TodayExpectedMetrics => &draft.today.expected_metrics,
        DraftField::HelpBlockers => &draft.help.blockers,
        DraftField::YesterdayPlannedTasks | DraftField::TodayBigTaskBooked => return None,
    };

    Some(value.as_str())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn task(id: &str, title: &str) -> DraftTask {
        DraftTask {
            id: id.to_string(),
            title: title.to_string(),
            size: "Medium".to_string(),
            status: "done".to_string(),
            comment: String::new(),
        }
    }

    #[test]
    fn every_field_has_exactly_one_policy() {
        let fields = MERGE_POLICIES.iter().map(|(field, _)| *field).collect::<Vec<_>>();
        for (index, field) in fields.iter().enumerate() {
            assert!(!fields[index + 1..].contains(field), "{field:?} listed twice");
        }
        assert_eq!(fields.len(), 12);
    }

    #[test]
    fn singular_fields_are_replaced_and_text_is_appended() {
        let mut current = ReportDraft::default();
        current.today.big_task = "Fix navigation bugs".to_string();
        current.today.medium_tasks = "Start API integration".to_string();
        current.help.blockers = String::new();

        let mut incoming = ReportDraft::default();
        incoming.today.big_task = "Finish billing export".to_string();
        incoming.today.big_task_time = "4h".to_string();
        incoming.today.medium_tasks = "Call the client at 14:00".to_string();
        incoming.help.blockers = "Need staging access".to_string();

        let merged = merge_drafts(&current, &incoming);
        assert_eq!(merged.today.big_task, "Finish billing export");
        assert_eq!(merged.today.big_task_time, "4h");
        assert_eq!(
            merged.today.medium_tasks,
            "Start API integration\nCall the client at 14:00"
        );
        assert_eq!(merged.help.blockers, "Need staging access");
    }

    #[test]
    fn empty_incoming_values_keep_current_state() {
        let mut current = ReportDraft::default();
        current.today.big_task = "Keep me".to_string();
        current.today.is_big_task_booked = Some(true);
        current.yesterday.summary = "Done with design".to_string();

        let merged = merge_drafts(&current, &ReportDraft::default());
        assert_eq!(merged, current);
    }

    #[test]
    fn planned_tasks_are_extended_in_order() {
        let mut current = ReportDraft::default();
        current.yesterday.planned_tasks = vec![task("1", "Settings page design")];
        let mut incoming = ReportDraft::default();
        incoming.yesterday.planned_tasks = vec![task("2", "Mobile check")];
        incoming.today.is_big_task_booked = Some(false);

        let merged = merge_drafts(&current, &incoming);
        let titles = merged
            .yesterday
            .planned_tasks
            .iter()
            .map(|task| task.title.as_str())
            .collect::<Vec<_>>();
        assert_eq!(titles, vec!["Settings page design", "Mobile check"]);
        assert_eq!(merged.today.is_big_task_booked, Some(false));
    }

    #[test]
    fn policy_table_keeps_singular_fields_replaceable() {
        let policy_for = |field: DraftField| {
            MERGE_POLICIES
                .iter()
                .find(|(candidate, _)| *candidate == field)
                .map(|(_, policy)| *policy)
        };

        assert_eq!(
            policy_for(DraftField::TodayBigTask),
            Some(MergePolicy::ReplaceIfPresent)
        );
        assert_eq!(
            policy_for(DraftField::HelpBlockers),
            Some(MergePolicy::AppendWithSeparator)
        );
        assert_eq!(
            policy_for(DraftField::YesterdayPlannedTasks),
            Some(MergePolicy::ExtendList)
        );
    }

    #[test]
    fn merge_text_trims_and_separates() {
        let mut target = String::from("first");
        merge_text(MergePolicy::AppendWithSeparator, &mut target, "  second  ");
        assert_eq!(target, "first\nsecond");

        merge_text(MergePolicy::ReplaceIfPresent, &mut target, "   ");
        assert_eq!(target, "first\nsecond");
    }

    #[test]
    fn partial_json_draft_deserializes() {
        let draft: ReportDraft =
            serde_json::from_str(r#"{"today":{"bigTask":"Ship it"}}"#).expect("parse draft");
        assert_eq!(draft.today.big_task, "Ship it");
        assert!(draft.yesterday.planned_tasks.is_empty());
    }
}
