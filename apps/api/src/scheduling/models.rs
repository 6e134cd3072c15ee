//! Engine data model: transient values built per scheduling request.
//!
//! Nothing here is persisted directly; rows in `crate::models` are converted
//! into these types before the engine runs.

use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use uuid::Uuid;

// ────────────────────────────────────────────────────────────────────────────
// Time windows
// ────────────────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("time window start {start} must be before end {end}")]
pub struct InvalidWindow {
    pub start: DateTime<Utc>,
    pub end: DateTime<Utc>,
}

/// An absolute interval on a single UTC timeline. `start < end` when built via `new`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct TimeWindow {
    pub start: DateTime<Utc>,
    pub end: DateTime<Utc>,
}

impl TimeWindow {
    pub fn new(start: DateTime<Utc>, end: DateTime<Utc>) -> Result<Self, InvalidWindow> {
        if start < end {
            Ok(Self { start, end })
        } else {
            Err(InvalidWindow { start, end })
        }
    }

    /// Re-checks the ordering invariant on a deserialized window.
    pub fn validated(self) -> Result<Self, InvalidWindow> {
        Self::new(self.start, self.end)
    }

    pub fn duration(&self) -> Duration {
        self.end - self.start
    }

    /// Strict overlap: windows that only share a boundary instant do not conflict.
    pub fn overlaps(&self, other: &TimeWindow) -> bool {
        crate::scheduling::overlap::conflicts(self, other)
    }

    /// Whether `other` lies entirely inside this window (boundaries inclusive).
    pub fn contains(&self, other: &TimeWindow) -> bool {
        self.start <= other.start && other.end <= self.end
    }
}

// ────────────────────────────────────────────────────────────────────────────
// Interviewers
// ────────────────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Interviewer {
    pub id: Uuid,
    pub email: String,
    pub name: String,
    pub external_user_id: Option<String>,
    pub is_active: bool,
}

/// An interviewer plus the busy intervals reported by the calendar.
/// Any instant not covered by `busy_slots` is assumed free.
#[derive(Debug, Clone)]
pub struct InterviewerWithAvailability {
    pub interviewer: Interviewer,
    pub busy_slots: Vec<TimeWindow>,
}

impl InterviewerWithAvailability {
    pub fn new(interviewer: Interviewer, busy_slots: Vec<TimeWindow>) -> Self {
        Self {
            interviewer,
            busy_slots,
        }
    }
}

// ────────────────────────────────────────────────────────────────────────────
// Stage configuration
// ────────────────────────────────────────────────────────────────────────────

/// How the panel is laid out in time. Only `Sequential` has engine support.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PanelFormat {
    #[default]
    Sequential,
    Parallel,
}

impl PanelFormat {
    pub fn as_str(&self) -> &'static str {
        match self {
            PanelFormat::Sequential => "sequential",
            PanelFormat::Parallel => "parallel",
        }
    }
}

impl fmt::Display for PanelFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("unknown panel format '{0}'")]
pub struct UnknownPanelFormat(pub String);

impl FromStr for PanelFormat {
    type Err = UnknownPanelFormat;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "sequential" => Ok(PanelFormat::Sequential),
            "parallel" => Ok(PanelFormat::Parallel),
            other => Err(UnknownPanelFormat(other.to_string())),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StageConfig {
    pub id: Uuid,
    pub external_stage_id: String,
    pub stage_name: String,
    pub duration_minutes: u32,
    pub break_minutes: u32,
    pub interviewer_count: u32,
    pub format: PanelFormat,
    pub pool: Vec<Interviewer>,
}

impl StageConfig {
    /// `duration * count + break * (count - 1)`: the span of one whole panel session.
    /// `None` when the product does not fit in an `i64`.
    pub fn total_session_minutes(&self) -> Option<i64> {
        let count = i64::from(self.interviewer_count);
        let interviews = i64::from(self.duration_minutes).checked_mul(count)?;
        let breaks = i64::from(self.break_minutes).checked_mul((count - 1).max(0))?;
        interviews.checked_add(breaks)
    }
}

// ────────────────────────────────────────────────────────────────────────────
// Proposals
// ────────────────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ScheduleBlock {
    Interview {
        interviewer_id: Uuid,
        interviewer_name: String,
        interviewer_email: String,
        start_time: DateTime<Utc>,
        end_time: DateTime<Utc>,
        duration_minutes: u32,
    },
    Break {
        start_time: DateTime<Utc>,
        end_time: DateTime<Utc>,
        duration_minutes: u32,
    },
}

impl ScheduleBlock {
    pub fn start_time(&self) -> DateTime<Utc> {
        match self {
            ScheduleBlock::Interview { start_time, .. } | ScheduleBlock::Break { start_time, .. } => {
                *start_time
            }
        }
    }

    pub fn end_time(&self) -> DateTime<Utc> {
        match self {
            ScheduleBlock::Interview { end_time, .. } | ScheduleBlock::Break { end_time, .. } => {
                *end_time
            }
        }
    }

    pub fn window(&self) -> TimeWindow {
        TimeWindow {
            start: self.start_time(),
            end: self.end_time(),
        }
    }

    pub fn is_interview(&self) -> bool {
        matches!(self, ScheduleBlock::Interview { .. })
    }

    pub fn interviewer_id(&self) -> Option<Uuid> {
        match self {
            ScheduleBlock::Interview { interviewer_id, .. } => Some(*interviewer_id),
            ScheduleBlock::Break { .. } => None,
        }
    }
}

/// One complete, feasible, scored panel. `start_time`/`end_time` bound the whole session.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScheduleProposal {
    pub id: String,
    pub candidate_id: String,
    pub stage_id: String,
    pub stage_name: String,
    pub blocks: Vec<ScheduleBlock>,
    pub score: f64,
    pub start_time: DateTime<Utc>,
    pub end_time: DateTime<Utc>,
    /// Interview slot index → free interviewers not chosen for that slot.
    #[serde(default)]
    pub alternate_interviewers: BTreeMap<usize, Vec<Interviewer>>,
}

impl ScheduleProposal {
    pub fn interview_blocks(&self) -> impl Iterator<Item = &ScheduleBlock> {
        self.blocks.iter().filter(|b| b.is_interview())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn at(h: u32, m: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2025, 3, 3, h, m, 0).unwrap()
    }

    #[test]
    fn test_window_rejects_inverted_and_empty() {
        assert!(TimeWindow::new(at(10, 0), at(9, 0)).is_err());
        assert!(TimeWindow::new(at(10, 0), at(10, 0)).is_err());
        assert!(TimeWindow::new(at(9, 0), at(10, 0)).is_ok());
    }

    #[test]
    fn test_window_contains_is_inclusive() {
        let outer = TimeWindow::new(at(9, 0), at(17, 0)).unwrap();
        assert!(outer.contains(&TimeWindow::new(at(9, 0), at(17, 0)).unwrap()));
        assert!(!outer.contains(&TimeWindow::new(at(8, 30), at(10, 0)).unwrap()));
    }

    #[test]
    fn test_panel_format_round_trips_through_str() {
        assert_eq!("parallel".parse::<PanelFormat>().unwrap(), PanelFormat::Parallel);
        assert_eq!(PanelFormat::Sequential.to_string(), "sequential");
        assert!("round_robin".parse::<PanelFormat>().is_err());
    }

    #[test]
    fn test_total_session_minutes() {
        let config = StageConfig {
            id: Uuid::new_v4(),
            external_stage_id: "stage".to_string(),
            stage_name: "Onsite".to_string(),
            duration_minutes: 60,
            break_minutes: 15,
            interviewer_count: 2,
            format: PanelFormat::Sequential,
            pool: vec![],
        };
        assert_eq!(config.total_session_minutes(), Some(135));

        let huge = StageConfig {
            duration_minutes: u32::MAX,
            break_minutes: u32::MAX,
            interviewer_count: u32::MAX,
            ..config
        };
        assert_eq!(huge.total_session_minutes(), None);
    }

    #[test]
    fn test_block_serializes_with_type_tag() {
        let block = ScheduleBlock::Break {
            start_time: at(10, 0),
            end_time: at(10, 15),
            duration_minutes: 15,
        };
        let json = serde_json::to_value(&block).unwrap();
        assert_eq!(json["type"], "break");
        assert_eq!(json["duration_minutes"], 15);
    }
}
