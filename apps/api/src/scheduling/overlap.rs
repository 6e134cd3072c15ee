//! Interval conflict checks: the single predicate behind every feasibility test.

use crate::scheduling::models::{InterviewerWithAvailability, TimeWindow};

/// Two intervals conflict iff they share more than a boundary instant.
/// An interview ending exactly when a busy slot begins is not a conflict.
pub fn conflicts(a: &TimeWindow, b: &TimeWindow) -> bool {
    a.start < b.end && b.start < a.end
}

/// True when none of the interviewer's busy slots conflict with `slot`.
pub fn is_interviewer_free(interviewer: &InterviewerWithAvailability, slot: &TimeWindow) -> bool {
    !interviewer
        .busy_slots
        .iter()
        .any(|busy| busy.overlaps(slot))
}

/// Interviewers free for `slot`, in input order.
pub fn free_interviewers<'a>(
    interviewers: &'a [InterviewerWithAvailability],
    slot: &TimeWindow,
) -> Vec<&'a InterviewerWithAvailability> {
    interviewers
        .iter()
        .filter(|iv| is_interviewer_free(iv, slot))
        .collect()
}
