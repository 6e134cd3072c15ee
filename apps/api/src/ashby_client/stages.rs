//! Interview-stage parser: Ashby returns stage data in several shapes depending
//! on endpoint and API version. Each known shape is a variant of `StageListing`;
//! variants are tried in order and the first one yielding stages wins.

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Canonical stage record, whichever shape it came from.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct InterviewStage {
    pub id: String,
    pub title: String,
    pub stage_type: String,
    pub order_index: i64,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RawStage {
    id: Option<String>,
    title: Option<String>,
    #[serde(rename = "type")]
    stage_type: Option<String>,
    order_index: Option<i64>,
    order_in_interview_plan: Option<i64>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PhaseGroup {
    #[serde(default)]
    interview_stages: Vec<RawStage>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
struct PlanShape {
    interview_plan: PhaseGroupsShape,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
struct PhaseGroupsShape {
    phase_groups: Vec<PhaseGroup>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
struct StagesShape {
    interview_stages: Vec<RawStage>,
}

/// The known response shapes, in detection order.
#[derive(Debug, Clone)]
pub enum StageListing {
    /// `{ interviewPlan: { phaseGroups: [{ interviewStages: [..] }] } }`
    InterviewPlan(Vec<PhaseGroup>),
    /// `{ phaseGroups: [{ interviewStages: [..] }] }`
    PhaseGroups(Vec<PhaseGroup>),
    /// `{ interviewStages: [..] }`
    Stages(Vec<RawStage>),
    /// `[..]`
    Flat(Vec<RawStage>),
}

impl StageListing {
    /// First variant that both matches `results` and contains at least one usable stage.
    pub fn detect(results: &Value) -> Option<StageListing> {
        let attempts: [fn(&Value) -> Option<StageListing>; 4] = [
            |v| {
                serde_json::from_value::<PlanShape>(v.clone())
                    .ok()
                    .map(|s| StageListing::InterviewPlan(s.interview_plan.phase_groups))
            },
            |v| {
                serde_json::from_value::<PhaseGroupsShape>(v.clone())
                    .ok()
                    .map(|s| StageListing::PhaseGroups(s.phase_groups))
            },
            |v| {
                serde_json::from_value::<StagesShape>(v.clone())
                    .ok()
                    .map(|s| StageListing::Stages(s.interview_stages))
            },
            |v| {
                serde_json::from_value::<Vec<RawStage>>(v.clone())
                    .ok()
                    .map(StageListing::Flat)
            },
        ];

        attempts
            .iter()
            .filter_map(|attempt| attempt(results))
            .find(|listing| !listing.clone().into_stages().is_empty())
    }

    pub fn into_stages(self) -> Vec<InterviewStage> {
        let raw: Vec<RawStage> = match self {
            StageListing::InterviewPlan(groups) | StageListing::PhaseGroups(groups) => groups
                .into_iter()
                .flat_map(|g| g.interview_stages)
                .collect(),
            StageListing::Stages(stages) | StageListing::Flat(stages) => stages,
        };

        raw.into_iter()
            .enumerate()
            .filter_map(|(position, stage)| normalize(stage, position))
            .collect()
    }
}

fn normalize(stage: RawStage, position: usize) -> Option<InterviewStage> {
    let id = stage.id.filter(|s| !s.is_empty())?;
    let title = stage.title.filter(|s| !s.is_empty())?;
    Some(InterviewStage {
        id,
        title,
        stage_type: stage.stage_type.unwrap_or_default(),
        order_index: stage
            .order_index
            .or(stage.order_in_interview_plan)
            .unwrap_or(position as i64),
    })
}

/// Normalises whatever stage shape `results` holds; unknown shapes give an empty list.
pub fn parse_interview_stages(results: &Value) -> Vec<InterviewStage> {
    StageListing::detect(results)
        .map(StageListing::into_stages)
        .unwrap_or_default()
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn ids(stages: &[InterviewStage]) -> Vec<&str> {
        stages.iter().map(|s| s.id.as_str()).collect()
    }

    #[test]
    fn test_interview_plan_shape() {
        let results = json!({
            "interviewPlan": {
                "phaseGroups": [
                    {"interviewStages": [{"id": "s1", "title": "Screen", "type": "PhoneScreen", "orderIndex": 0}]},
                    {"interviewStages": [{"id": "s2", "title": "Onsite", "orderIndex": 1}]}
                ]
            }
        });
        let stages = parse_interview_stages(&results);
        assert_eq!(ids(&stages), vec!["s1", "s2"]);
        assert_eq!(stages[0].stage_type, "PhoneScreen");
        assert_eq!(stages[1].stage_type, "");
    }

    #[test]
    fn test_phase_groups_shape() {
        let results = json!({
            "phaseGroups": [{"interviewStages": [{"id": "s1", "title": "Screen"}]}]
        });
        assert_eq!(ids(&parse_interview_stages(&results)), vec!["s1"]);
    }

    #[test]
    fn test_stages_shape() {
        let results = json!({
            "interviewStages": [{"id": "s9", "title": "Final", "orderIndex": 4}]
        });
        let stages = parse_interview_stages(&results);
        assert_eq!(stages[0].order_index, 4);
    }

    #[test]
    fn test_flat_list_uses_order_in_plan_then_position() {
        let results = json!([
            {"id": "a", "title": "Application Review", "type": "PreInterviewScreen", "orderInInterviewPlan": 0},
            {"id": "b", "title": "Technical"},
            {"id": "c", "title": "Offer", "orderInInterviewPlan": 7}
        ]);
        let stages = parse_interview_stages(&results);
        assert_eq!(ids(&stages), vec!["a", "b", "c"]);
        assert_eq!(stages[1].order_index, 1);
        assert_eq!(stages[2].order_index, 7);
    }

    #[test]
    fn test_empty_plan_falls_through_to_next_shape() {
        let results = json!({
            "interviewPlan": {"phaseGroups": []},
            "interviewStages": [{"id": "s3", "title": "Panel"}]
        });
        let listing = StageListing::detect(&results).unwrap();
        assert!(matches!(listing, StageListing::Stages(_)));
        assert_eq!(ids(&listing.into_stages()), vec!["s3"]);
    }

    #[test]
    fn test_stages_missing_id_or_title_are_skipped() {
        let results = json!([{"title": "No id"}, {"id": "x"}, {"id": "ok", "title": "Kept"}]);
        assert_eq!(ids(&parse_interview_stages(&results)), vec!["ok"]);
    }

    #[test]
    fn test_unknown_shape_yields_empty() {
        assert!(parse_interview_stages(&json!({"jobs": []})).is_empty());
        assert!(parse_interview_stages(&Value::Null).is_empty());
    }
}
