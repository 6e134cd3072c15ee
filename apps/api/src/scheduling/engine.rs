//! Scheduling Engine: turns candidate windows and interviewer busy data into
//! ranked panel proposals.
//!
//! Pure and synchronous: no I/O, no shared state. `now` is an argument so that
//! identical inputs always yield identical output.
//!
//! Sequential algorithm, per candidate window:
//! 1. Snap the probe `t` up to the next 30-minute boundary at or after `window.start`.
//! 2. While `t + total_session <= window.end`:
//!    - slot `i` spans `[t + i*(duration+break), +duration)`
//!    - every slot needs at least one free interviewer, otherwise skip `t`
//!    - assign the first free interviewer not already on this panel (else reuse the first free one)
//!    - keep the proposal unless another one already starts at `t`
//!    - advance `t` by 30 minutes
//! 3. Stable-sort by score descending and keep the top three.

use std::collections::{BTreeMap, HashSet};

use chrono::{DateTime, Duration, TimeZone, Utc};
use thiserror::Error;
use tracing::debug;
use uuid::Uuid;

use crate::scheduling::models::{
    Interviewer, InterviewerWithAvailability, PanelFormat, ScheduleBlock, ScheduleProposal,
    StageConfig, TimeWindow,
};
use crate::scheduling::overlap::free_interviewers;
use crate::scheduling::scoring::score_proposal;

/// Probe granularity for both the initial snap and each step.
pub const SLOT_STEP_MINUTES: i64 = 30;
/// How many proposals survive ranking.
pub const MAX_PROPOSALS: usize = 3;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum EngineError {
    #[error("panel format '{0}' is not supported by the scheduling engine")]
    UnsupportedFormat(PanelFormat),
}

/// Produces at most `MAX_PROPOSALS` feasible panels ordered by descending score.
///
/// Returns an empty list when nothing fits. Only `PanelFormat::Sequential` is
/// implemented; a parallel stage is rejected rather than scheduled sequentially.
pub fn propose_schedules(
    candidate_windows: &[TimeWindow],
    interviewers: &[InterviewerWithAvailability],
    config: &StageConfig,
    now: DateTime<Utc>,
) -> Result<Vec<ScheduleProposal>, EngineError> {
    match config.format {
        PanelFormat::Sequential => Ok(propose_sequential(
            candidate_windows,
            interviewers,
            config,
            now,
        )),
        PanelFormat::Parallel => Err(EngineError::UnsupportedFormat(PanelFormat::Parallel)),
    }
}

fn propose_sequential(
    candidate_windows: &[TimeWindow],
    interviewers: &[InterviewerWithAvailability],
    config: &StageConfig,
    now: DateTime<Utc>,
) -> Vec<ScheduleProposal> {
    if config.interviewer_count == 0 || config.duration_minutes == 0 {
        return Vec::new();
    }

    let Some(total_session) = config
        .total_session_minutes()
        .and_then(Duration::try_minutes)
    else {
        return Vec::new();
    };
    let step = Duration::minutes(SLOT_STEP_MINUTES);

    let mut proposals: Vec<ScheduleProposal> = Vec::new();
    let mut seen_starts: HashSet<DateTime<Utc>> = HashSet::new();

    for window in candidate_windows {
        let mut t = snap_to_slot_boundary(window.start);

        // Instants past chrono's range end the window like any other overrun.
        while let Some(session) = t
            .checked_add_signed(total_session)
            .map(|end| TimeWindow { start: t, end })
            .filter(|session| window.contains(session))
        {
            if !seen_starts.contains(&t) {
                if let Some(panel) = assemble_panel(t, interviewers, config) {
                    seen_starts.insert(t);
                    let score = score_proposal(&panel.blocks, now);
                    proposals.push(ScheduleProposal {
                        id: format!("{}-{}", now.timestamp_millis(), proposals.len()),
                        candidate_id: String::new(),
                        stage_id: config.external_stage_id.clone(),
                        stage_name: config.stage_name.clone(),
                        blocks: panel.blocks,
                        score,
                        start_time: session.start,
                        end_time: session.end,
                        alternate_interviewers: panel.alternates,
                    });
                }
            }
            match t.checked_add_signed(step) {
                Some(next) => t = next,
                None => break,
            }
        }
    }

    debug!(
        "Generated {} feasible proposals for stage {} across {} windows",
        proposals.len(),
        config.external_stage_id,
        candidate_windows.len()
    );

    // sort_by is stable: ties keep window order, then time order.
    proposals.sort_by(|a, b| b.score.total_cmp(&a.score));
    proposals.truncate(MAX_PROPOSALS);
    proposals
}

struct Panel {
    blocks: Vec<ScheduleBlock>,
    alternates: BTreeMap<usize, Vec<Interviewer>>,
}

/// Builds the panel starting at `t`, or `None` if any slot has no free interviewer.
fn assemble_panel(
    t: DateTime<Utc>,
    interviewers: &[InterviewerWithAvailability],
    config: &StageConfig,
) -> Option<Panel> {
    let duration = Duration::minutes(i64::from(config.duration_minutes));
    let gap = Duration::minutes(i64::from(config.break_minutes));
    let count = config.interviewer_count as usize;

    // Feasibility first: no partial panels.
    let mut slots = Vec::with_capacity(count);
    for i in 0..count {
        let offset = (duration + gap).checked_mul(i32::try_from(i).ok()?)?;
        let start = t.checked_add_signed(offset)?;
        let slot = TimeWindow {
            start,
            end: start.checked_add_signed(duration)?,
        };
        let available = free_interviewers(interviewers, &slot);
        if available.is_empty() {
            return None;
        }
        slots.push((slot, available));
    }

    let mut blocks = Vec::with_capacity(count * 2);
    let mut alternates = BTreeMap::new();
    let mut assigned: HashSet<Uuid> = HashSet::new();

    for (i, (slot, available)) in slots.iter().enumerate() {
        let pick = available
            .iter()
            .find(|iv| !assigned.contains(&iv.interviewer.id))
            .unwrap_or(&available[0]);
        let pick = &pick.interviewer;
        assigned.insert(pick.id);

        blocks.push(ScheduleBlock::Interview {
            interviewer_id: pick.id,
            interviewer_name: pick.name.clone(),
            interviewer_email: pick.email.clone(),
            start_time: slot.start,
            end_time: slot.end,
            duration_minutes: config.duration_minutes,
        });

        alternates.insert(
            i,
            available
                .iter()
                .filter(|iv| iv.interviewer.id != pick.id)
                .map(|iv| iv.interviewer.clone())
                .collect(),
        );

        if i + 1 < count {
            blocks.push(ScheduleBlock::Break {
                start_time: slot.end,
                end_time: slot.end + gap,
                duration_minutes: config.break_minutes,
            });
        }
    }

    Some(Panel { blocks, alternates })
}

/// Rounds up to the next instant whose epoch offset is a whole multiple of 30 minutes.
/// Instants already on a boundary are returned unchanged. Seconds count too, so
/// 09:00:45 snaps to 09:30:00 rather than passing a minutes-only check.
fn snap_to_slot_boundary(instant: DateTime<Utc>) -> DateTime<Utc> {
    let step_secs = SLOT_STEP_MINUTES * 60;
    let secs = instant.timestamp();
    let rem = secs.rem_euclid(step_secs);
    if rem == 0 && instant.timestamp_subsec_nanos() == 0 {
        return instant;
    }
    let floor = secs - rem;
    Utc.timestamp_opt(floor + step_secs, 0)
        .single()
        .unwrap_or(instant)
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Timelike;
    use proptest::prelude::*;

    // 2025-03-03 is a Monday.
    fn monday(h: u32, m: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2025, 3, 3, h, m, 0).unwrap()
    }

    fn window(start: DateTime<Utc>, end: DateTime<Utc>) -> TimeWindow {
        TimeWindow::new(start, end).unwrap()
    }

    fn person(name: &str) -> Interviewer {
        Interviewer {
            id: Uuid::new_v4(),
            email: format!("{name}@example.com"),
            name: name.to_string(),
            external_user_id: None,
            is_active: true,
        }
    }

    fn free(name: &str) -> InterviewerWithAvailability {
        InterviewerWithAvailability::new(person(name), vec![])
    }

    fn busy(name: &str, slots: Vec<TimeWindow>) -> InterviewerWithAvailability {
        InterviewerWithAvailability::new(person(name), slots)
    }

    fn stage(duration: u32, gap: u32, count: u32) -> StageConfig {
        StageConfig {
            id: Uuid::new_v4(),
            external_stage_id: "stage-onsite".to_string(),
            stage_name: "Onsite".to_string(),
            duration_minutes: duration,
            break_minutes: gap,
            interviewer_count: count,
            format: PanelFormat::Sequential,
            pool: vec![],
        }
    }

    fn interviewer_names(proposal: &ScheduleProposal) -> Vec<String> {
        proposal
            .blocks
            .iter()
            .filter_map(|b| match b {
                ScheduleBlock::Interview {
                    interviewer_name, ..
                } => Some(interviewer_name.clone()),
                ScheduleBlock::Break { .. } => None,
            })
            .collect()
    }

    #[test]
    fn test_two_person_panel_in_business_day() {
        let windows = vec![window(monday(9, 0), monday(17, 0))];
        let pool = vec![free("ada"), free("bob")];
        let config = stage(60, 15, 2);
        let now = monday(8, 0);

        let proposals = propose_schedules(&windows, &pool, &config, now).unwrap();

        assert_eq!(proposals.len(), 3);
        let best = &proposals[0];
        assert_eq!(best.start_time, monday(9, 0));
        assert_eq!(best.end_time - best.start_time, Duration::minutes(135));
        assert_eq!(interviewer_names(best), vec!["ada", "bob"]);
        assert_eq!(best.score, 120.0);
        assert_eq!(best.stage_id, "stage-onsite");
        assert!(best.candidate_id.is_empty());
    }

    #[test]
    fn test_blocks_alternate_interview_and_break() {
        let windows = vec![window(monday(9, 0), monday(12, 0))];
        let pool = vec![free("ada"), free("bob")];
        let proposals = propose_schedules(&windows, &pool, &stage(60, 15, 2), monday(8, 0)).unwrap();

        let blocks = &proposals[0].blocks;
        assert_eq!(blocks.len(), 3);
        assert!(blocks[0].is_interview());
        assert_eq!(
            blocks[1],
            ScheduleBlock::Break {
                start_time: monday(10, 0),
                end_time: monday(10, 15),
                duration_minutes: 15,
            }
        );
        assert_eq!(blocks[2].start_time(), monday(10, 15));
        assert_eq!(blocks[2].end_time(), monday(11, 15));
    }

    #[test]
    fn test_fully_busy_window_yields_nothing() {
        let busy_day = vec![window(monday(8, 0), monday(18, 0))];
        let windows = vec![window(monday(9, 0), monday(17, 0))];
        let pool = vec![busy("ada", busy_day.clone()), busy("bob", busy_day)];

        let proposals = propose_schedules(&windows, &pool, &stage(60, 15, 2), monday(8, 0)).unwrap();
        assert!(proposals.is_empty());
    }

    #[test]
    fn test_empty_windows_yield_nothing() {
        let proposals = propose_schedules(&[], &[free("ada")], &stage(60, 0, 1), monday(8, 0)).unwrap();
        assert!(proposals.is_empty());
    }

    #[test]
    fn test_window_shorter_than_session_yields_nothing() {
        let windows = vec![window(monday(9, 0), monday(11, 0))];
        let proposals =
            propose_schedules(&windows, &[free("ada"), free("bob")], &stage(60, 15, 2), monday(8, 0))
                .unwrap();
        assert!(proposals.is_empty());
    }

    #[test]
    fn test_session_exactly_filling_window_fits() {
        let windows = vec![window(monday(9, 0), monday(11, 15))];
        let proposals =
            propose_schedules(&windows, &[free("ada"), free("bob")], &stage(60, 15, 2), monday(8, 0))
                .unwrap();
        assert_eq!(proposals.len(), 1);
        assert_eq!(proposals[0].end_time, monday(11, 15));
    }

    #[test]
    fn test_zero_interviewer_count_yields_nothing() {
        let windows = vec![window(monday(9, 0), monday(17, 0))];
        let proposals = propose_schedules(&windows, &[free("ada")], &stage(60, 15, 0), monday(8, 0)).unwrap();
        assert!(proposals.is_empty());
    }

    #[test]
    fn test_session_beyond_representable_time_yields_nothing() {
        let windows = vec![window(monday(9, 0), monday(9, 0) + Duration::days(1))];
        let proposals =
            propose_schedules(&windows, &[free("ada")], &stage(u32::MAX, 0, 100), monday(8, 0))
                .unwrap();
        assert!(proposals.is_empty());
    }

    #[test]
    fn test_session_length_overflowing_i64_yields_nothing() {
        let windows = vec![window(monday(9, 0), monday(17, 0))];
        let proposals = propose_schedules(
            &windows,
            &[free("ada")],
            &stage(u32::MAX, u32::MAX, u32::MAX),
            monday(8, 0),
        )
        .unwrap();
        assert!(proposals.is_empty());
    }

    #[test]
    fn test_window_at_end_of_time_yields_nothing() {
        let end = DateTime::<Utc>::MAX_UTC;
        let windows = vec![window(end - Duration::minutes(90), end)];
        let proposals =
            propose_schedules(&windows, &[free("ada")], &stage(60, 0, 1), monday(8, 0)).unwrap();
        assert!(proposals.len() <= 1);
    }

    #[test]
    fn test_parallel_format_is_rejected() {
        let mut config = stage(60, 0, 2);
        config.format = PanelFormat::Parallel;
        let windows = vec![window(monday(9, 0), monday(17, 0))];

        let err = propose_schedules(&windows, &[free("ada"), free("bob")], &config, monday(8, 0))
            .unwrap_err();
        assert_eq!(err, EngineError::UnsupportedFormat(PanelFormat::Parallel));
    }

    #[test]
    fn test_unaligned_start_snaps_to_next_half_hour() {
        let windows = vec![window(monday(9, 10), monday(10, 40))];
        let proposals = propose_schedules(&windows, &[free("ada")], &stage(60, 0, 1), monday(8, 0)).unwrap();
        assert_eq!(proposals.len(), 1);
        assert_eq!(proposals[0].start_time, monday(9, 30));
    }

    #[test]
    fn test_snap_clears_seconds() {
        let instant = Utc.with_ymd_and_hms(2025, 3, 3, 9, 0, 45).unwrap();
        assert_eq!(snap_to_slot_boundary(instant), monday(9, 30));
        assert_eq!(snap_to_slot_boundary(monday(9, 30)), monday(9, 30));
        assert_eq!(snap_to_slot_boundary(monday(9, 59)), monday(10, 0));
    }

    #[test]
    fn test_busy_interviewer_is_skipped_for_slot() {
        // ada busy for the first slot only; bob takes it and ada gets the second.
        let windows = vec![window(monday(9, 0), monday(11, 15))];
        let pool = vec![
            busy("ada", vec![window(monday(9, 0), monday(10, 0))]),
            free("bob"),
        ];
        let proposals = propose_schedules(&windows, &pool, &stage(60, 15, 2), monday(8, 0)).unwrap();
        assert_eq!(interviewer_names(&proposals[0]), vec!["bob", "ada"]);
    }

    #[test]
    fn test_busy_slot_touching_boundary_is_not_conflict() {
        let windows = vec![window(monday(10, 0), monday(11, 0))];
        let pool = vec![busy(
            "ada",
            vec![
                window(monday(9, 0), monday(10, 0)),
                window(monday(11, 0), monday(12, 0)),
            ],
        )];
        let proposals = propose_schedules(&windows, &pool, &stage(60, 0, 1), monday(8, 0)).unwrap();
        assert_eq!(proposals.len(), 1);
    }

    #[test]
    fn test_interviewer_reused_when_pool_too_small() {
        let windows = vec![window(monday(9, 0), monday(12, 0))];
        let pool = vec![free("ada"), free("bob")];
        let proposals = propose_schedules(&windows, &pool, &stage(45, 15, 3), monday(8, 0)).unwrap();

        assert!(!proposals.is_empty());
        assert_eq!(interviewer_names(&proposals[0]), vec!["ada", "bob", "ada"]);
    }

    #[test]
    fn test_alternates_exclude_pick() {
        let windows = vec![window(monday(9, 0), monday(10, 0))];
        let pool = vec![free("ada"), free("bob"), free("cy")];
        let proposals = propose_schedules(&windows, &pool, &stage(60, 0, 1), monday(8, 0)).unwrap();

        let alternates = &proposals[0].alternate_interviewers[&0];
        let names: Vec<&str> = alternates.iter().map(|iv| iv.name.as_str()).collect();
        assert_eq!(names, vec!["bob", "cy"]);
    }

    #[test]
    fn test_alternates_may_include_interviewers_used_elsewhere() {
        let windows = vec![window(monday(9, 0), monday(11, 0))];
        let pool = vec![free("ada"), free("bob")];
        let proposals = propose_schedules(&windows, &pool, &stage(60, 0, 2), monday(8, 0)).unwrap();

        let second = &proposals[0].alternate_interviewers[&1];
        assert_eq!(second.len(), 1);
        assert_eq!(second[0].name, "ada");
    }

    #[test]
    fn test_duplicate_start_times_across_windows_are_dropped() {
        let windows = vec![
            window(monday(9, 0), monday(10, 0)),
            window(monday(9, 0), monday(10, 30)),
        ];
        let proposals = propose_schedules(&windows, &[free("ada")], &stage(60, 0, 1), monday(8, 0)).unwrap();

        let starts: Vec<_> = proposals.iter().map(|p| p.start_time).collect();
        assert_eq!(starts.len(), 2);
        assert!(starts.contains(&monday(9, 0)));
        assert!(starts.contains(&monday(9, 30)));
    }

    #[test]
    fn test_ranking_prefers_business_hours() {
        // Window covers early morning then business hours; top result must be 9:00+.
        let windows = vec![window(monday(6, 0), monday(10, 0))];
        let proposals = propose_schedules(&windows, &[free("ada")], &stage(60, 0, 1), monday(5, 0)).unwrap();

        assert_eq!(proposals.len(), 3);
        assert_eq!(proposals[0].start_time.hour(), 9);
        assert!(proposals[0].score > proposals[1].score);
    }

    #[test]
    fn test_ties_keep_generation_order() {
        let windows = vec![window(monday(9, 0), monday(12, 0))];
        let proposals = propose_schedules(&windows, &[free("ada")], &stage(60, 0, 1), monday(8, 0)).unwrap();

        let starts: Vec<_> = proposals.iter().map(|p| p.start_time).collect();
        assert_eq!(starts, vec![monday(9, 0), monday(9, 30), monday(10, 0)]);
    }

    #[test]
    fn test_proposal_ids_are_unique_and_deterministic() {
        let windows = vec![window(monday(9, 0), monday(17, 0))];
        let pool = vec![free("ada")];
        let first = propose_schedules(&windows, &pool, &stage(60, 0, 1), monday(8, 0)).unwrap();
        let second = propose_schedules(&windows, &pool, &stage(60, 0, 1), monday(8, 0)).unwrap();

        let ids: HashSet<&str> = first.iter().map(|p| p.id.as_str()).collect();
        assert_eq!(ids.len(), first.len());
        assert_eq!(first, second);
    }

    // ────────────────────────────────────────────────────────────────────────
    // Property-based tests
    // ────────────────────────────────────────────────────────────────────────

    fn arb_busy() -> impl Strategy<Value = Vec<(i64, i64)>> {
        prop::collection::vec((0i64..600, 15i64..180), 0..4)
    }

    fn arb_case() -> impl Strategy<
        Value = (
            Vec<(i64, i64)>,
            Vec<Vec<(i64, i64)>>,
            u32,
            u32,
            u32,
        ),
    > {
        (
            prop::collection::vec((0i64..480, 30i64..600), 0..3),
            prop::collection::vec(arb_busy(), 1..4),
            prop::sample::select(vec![30u32, 45, 60]),
            prop::sample::select(vec![0u32, 10, 15]),
            1u32..4,
        )
    }

    fn build_case(
        raw_windows: &[(i64, i64)],
        raw_pool: &[Vec<(i64, i64)>],
    ) -> (Vec<TimeWindow>, Vec<InterviewerWithAvailability>) {
        let base = monday(7, 0);
        let windows = raw_windows
            .iter()
            .map(|(offset, len)| {
                let start = base + Duration::minutes(*offset);
                window(start, start + Duration::minutes(*len))
            })
            .collect();
        let pool = raw_pool
            .iter()
            .enumerate()
            .map(|(i, slots)| {
                let busy_slots = slots
                    .iter()
                    .map(|(offset, len)| {
                        let start = base + Duration::minutes(*offset);
                        window(start, start + Duration::minutes(*len))
                    })
                    .collect();
                busy(&format!("iv{i}"), busy_slots)
            })
            .collect();
        (windows, pool)
    }

    proptest! {
        #[test]
        fn prop_proposals_are_feasible(
            (raw_windows, raw_pool, duration, gap, count) in arb_case()
        ) {
            let (windows, pool) = build_case(&raw_windows, &raw_pool);
            let config = stage(duration, gap, count);
            let proposals = propose_schedules(&windows, &pool, &config, monday(6, 0)).unwrap();

            prop_assert!(proposals.len() <= MAX_PROPOSALS);

            for proposal in &proposals {
                // Session length.
                prop_assert_eq!(
                    (proposal.end_time - proposal.start_time).num_minutes(),
                    config.total_session_minutes().unwrap()
                );

                // Contained in some candidate window.
                let session = window(proposal.start_time, proposal.end_time);
                prop_assert!(windows.iter().any(|w| w.contains(&session)));

                // Every assignee is free for their block.
                for block in proposal.interview_blocks() {
                    let id = block.interviewer_id().unwrap();
                    let assignee = pool.iter().find(|iv| iv.interviewer.id == id).unwrap();
                    prop_assert!(assignee.busy_slots.iter().all(|b| !b.overlaps(&block.window())));
                }

                // Same interviewer never overlaps themselves.
                let interviews: Vec<_> = proposal.interview_blocks().collect();
                for (i, a) in interviews.iter().enumerate() {
                    for b in interviews.iter().skip(i + 1) {
                        if a.interviewer_id() == b.interviewer_id() {
                            prop_assert!(!a.window().overlaps(&b.window()));
                        }
                    }
                }
            }
        }

        #[test]
        fn prop_ranked_unique_and_idempotent(
            (raw_windows, raw_pool, duration, gap, count) in arb_case()
        ) {
            let (windows, pool) = build_case(&raw_windows, &raw_pool);
            let config = stage(duration, gap, count);
            let now = monday(6, 0);
            let first = propose_schedules(&windows, &pool, &config, now).unwrap();
            let second = propose_schedules(&windows, &pool, &config, now).unwrap();

            prop_assert_eq!(&first, &second);
            prop_assert!(first.windows(2).all(|pair| pair[0].score >= pair[1].score));

            let starts: HashSet<_> = first.iter().map(|p| p.start_time).collect();
            prop_assert_eq!(starts.len(), first.len());
        }
    }
}
