//! Proposal scoring. Higher is better; the engine keeps the top three.
//!
//! Algorithm, keyed on the first interview block (UTC):
//! 1. Base score 100.
//! 2. Start hour 9..=12 → +20, 13..=16 → +10, anything else → −30.
//! 3. Saturday or Sunday → −50.
//! 4. −0.5 per whole day between `now` and the start (floored, so past starts add).
//! 5. No interview blocks → 0.

use chrono::{DateTime, Datelike, Timelike, Utc, Weekday};

use crate::scheduling::models::ScheduleBlock;

const BASE_SCORE: f64 = 100.0;
const MORNING_BONUS: f64 = 20.0;
const AFTERNOON_BONUS: f64 = 10.0;
const OFF_HOURS_PENALTY: f64 = 30.0;
const WEEKEND_PENALTY: f64 = 50.0;
const PER_DAY_PENALTY: f64 = 0.5;
const MILLIS_PER_DAY: i64 = 86_400_000;

pub fn score_proposal(blocks: &[ScheduleBlock], now: DateTime<Utc>) -> f64 {
    let Some(first) = blocks.iter().find(|b| b.is_interview()) else {
        return 0.0;
    };
    let start = first.start_time();

    let mut score = BASE_SCORE;

    score += match start.hour() {
        9..=12 => MORNING_BONUS,
        13..=16 => AFTERNOON_BONUS,
        _ => -OFF_HOURS_PENALTY,
    };

    if matches!(start.weekday(), Weekday::Sat | Weekday::Sun) {
        score -= WEEKEND_PENALTY;
    }

    score -= days_from_now(start, now) as f64 * PER_DAY_PENALTY;

    score
}

/// Whole days from `now` to `start`, rounded toward negative infinity.
fn days_from_now(start: DateTime<Utc>, now: DateTime<Utc>) -> i64 {
    (start - now).num_milliseconds().div_euclid(MILLIS_PER_DAY)
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use uuid::Uuid;

    // 2025-03-03 is a Monday.
    fn monday(h: u32, m: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2025, 3, 3, h, m, 0).unwrap()
    }

    fn interview_at(start: DateTime<Utc>) -> ScheduleBlock {
        ScheduleBlock::Interview {
            interviewer_id: Uuid::new_v4(),
            interviewer_name: "Ada".to_string(),
            interviewer_email: "ada@example.com".to_string(),
            start_time: start,
            end_time: start + chrono::Duration::minutes(60),
            duration_minutes: 60,
        }
    }

    #[test]
    fn test_empty_blocks_score_zero() {
        assert_eq!(score_proposal(&[], monday(8, 0)), 0.0);
    }

    #[test]
    fn test_only_breaks_score_zero() {
        let blocks = vec![ScheduleBlock::Break {
            start_time: monday(10, 0),
            end_time: monday(10, 15),
            duration_minutes: 15,
        }];
        assert_eq!(score_proposal(&blocks, monday(8, 0)), 0.0);
    }

    #[test]
    fn test_morning_start_same_day_gets_full_bonus() {
        let blocks = vec![interview_at(monday(9, 0))];
        assert_eq!(score_proposal(&blocks, monday(8, 0)), 120.0);
    }

    #[test]
    fn test_noon_hour_counts_as_morning() {
        let blocks = vec![interview_at(monday(12, 30))];
        assert_eq!(score_proposal(&blocks, monday(8, 0)), 120.0);
    }

    #[test]
    fn test_afternoon_start_gets_smaller_bonus() {
        let blocks = vec![interview_at(monday(13, 0))];
        assert_eq!(score_proposal(&blocks, monday(8, 0)), 110.0);
        let blocks = vec![interview_at(monday(16, 30))];
        assert_eq!(score_proposal(&blocks, monday(8, 0)), 110.0);
    }

    #[test]
    fn test_off_hours_start_is_penalised() {
        let blocks = vec![interview_at(monday(17, 0))];
        assert_eq!(score_proposal(&blocks, monday(8, 0)), 70.0);
        let blocks = vec![interview_at(monday(8, 30))];
        assert_eq!(score_proposal(&blocks, monday(8, 0)), 70.0);
    }

    #[test]
    fn test_weekend_start_is_penalised() {
        let saturday = Utc.with_ymd_and_hms(2025, 3, 1, 10, 0, 0).unwrap();
        let now = Utc.with_ymd_and_hms(2025, 3, 1, 8, 0, 0).unwrap();
        assert_eq!(score_proposal(&[interview_at(saturday)], now), 70.0);
    }

    #[test]
    fn test_later_days_lose_half_a_point_each() {
        let now = monday(8, 0);
        let in_four_days = Utc.with_ymd_and_hms(2025, 3, 7, 10, 0, 0).unwrap();
        assert_eq!(score_proposal(&[interview_at(in_four_days)], now), 118.0);
    }

    #[test]
    fn test_partial_days_are_floored() {
        // 1 day and 23 hours ahead → 1 whole day.
        let now = monday(8, 0);
        let start = Utc.with_ymd_and_hms(2025, 3, 5, 7, 0, 0).unwrap();
        assert_eq!(days_from_now(start, now), 1);
    }

    #[test]
    fn test_past_start_floors_toward_negative() {
        let now = monday(10, 0);
        assert_eq!(days_from_now(monday(9, 0), now), -1);
        assert_eq!(score_proposal(&[interview_at(monday(9, 0))], now), 120.5);
    }

    #[test]
    fn test_scores_first_interview_not_first_block() {
        let blocks = vec![
            ScheduleBlock::Break {
                start_time: monday(7, 0),
                end_time: monday(9, 0),
                duration_minutes: 120,
            },
            interview_at(monday(9, 0)),
        ];
        assert_eq!(score_proposal(&blocks, monday(8, 0)), 120.0);
    }
}
