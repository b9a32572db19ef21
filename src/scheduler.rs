//! Review-log driven scheduling.
//!
//! Nothing here is stored: ease, interval and the next due date are all
//! derived from a card's creation date and its review history. The only
//! materialized value is the due date, which callers write back to the card
//! after each scheduling grade.

use serde::Serialize;

use crate::julian::JulianDate;
use crate::models::{Grade, Review};

/// Ease used when no study grade follows the last reset
pub const DEFAULT_EASE: f64 = 1.0;

/// Every derived scheduling quantity for one card
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct Schedule {
    pub last_reset_date: JulianDate,
    pub last_study_date: JulianDate,
    pub ease: f64,
    pub study_maturity: i64,
    pub interval: i64,
    pub due_date: JulianDate,
}

/// The most recent review matching `pred`. Later log entries win ties.
fn most_recent<'a>(reviews: &'a [Review], pred: impl Fn(Grade) -> bool) -> Option<&'a Review> {
    reviews
        .iter()
        .filter(|review| pred(review.grade))
        .max_by(|a, b| a.date.value().total_cmp(&b.date.value()))
}

pub fn last_reset_date(create_date: JulianDate, reviews: &[Review]) -> JulianDate {
    most_recent(reviews, Grade::is_reset)
        .map(|review| review.date)
        .unwrap_or(create_date)
}

pub fn last_study_date(create_date: JulianDate, reviews: &[Review]) -> JulianDate {
    most_recent(reviews, Grade::schedules)
        .map(|review| review.date)
        .unwrap_or(create_date)
}

/// Mean of hard=0, good=1, easy=2 over study grades strictly after the reset
pub fn ease(reviews: &[Review], last_reset: JulianDate) -> f64 {
    let points: Vec<f64> = reviews
        .iter()
        .filter(|review| review.date > last_reset)
        .filter_map(|review| review.grade.ease_points())
        .collect();

    if points.is_empty() {
        return DEFAULT_EASE;
    }
    points.iter().sum::<f64>() / points.len() as f64
}

pub fn study_maturity(last_study: JulianDate, last_reset: JulianDate) -> i64 {
    last_study.days_since(last_reset)
}

pub fn interval(ease: f64, study_maturity: i64) -> i64 {
    ((ease * study_maturity as f64).floor() as i64).max(1)
}

/// Derive the full schedule of a card from its history
pub fn schedule(create_date: JulianDate, reviews: &[Review]) -> Schedule {
    let last_reset = last_reset_date(create_date, reviews);
    let last_study = last_study_date(create_date, reviews);
    let ease = ease(reviews, last_reset);
    let maturity = study_maturity(last_study, last_reset);
    let interval = interval(ease, maturity);

    // A card with no scheduling history behaves as if just created
    let reset_is_latest = most_recent(reviews, Grade::schedules)
        .map(|review| review.grade.is_reset())
        .unwrap_or(true);

    let due_date = if reset_is_latest {
        last_reset
    } else {
        last_study + interval
    };

    log::debug!(
        "schedule: reset={} study={} ease={:.2} maturity={} interval={} due={}",
        last_reset, last_study, ease, maturity, interval, due_date
    );

    Schedule {
        last_reset_date: last_reset,
        last_study_date: last_study,
        ease,
        study_maturity: maturity,
        interval,
        due_date,
    }
}

/// Manual override: `days` after today, keeping the hour fraction of `due`.
/// `None` when the day count overflows.
pub fn postponed_due_date(due: JulianDate, today: JulianDate, days: i64) -> Option<JulianDate> {
    let day = today.day().checked_add(days)?;
    Some(JulianDate::new(day as f64 + due.hour_fraction()))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn day(d: i64) -> JulianDate {
        JulianDate::from_day(d)
    }

    fn log(entries: &[(i64, Grade)]) -> Vec<Review> {
        entries
            .iter()
            .map(|&(d, grade)| Review::new(1, day(d), 10, grade))
            .collect()
    }

    #[test]
    fn test_fresh_card_is_due_on_creation() {
        let reviews = log(&[(100, Grade::Create)]);
        let s = schedule(day(100), &reviews);
        assert_eq!(s.ease, 1.0);
        assert_eq!(s.interval, 1);
        assert_eq!(s.due_date, day(100));
    }

    #[test]
    fn test_empty_history_falls_back_to_create_date() {
        let s = schedule(day(7), &[]);
        assert_eq!(s.last_reset_date, day(7));
        assert_eq!(s.last_study_date, day(7));
        assert_eq!(s.interval, 1);
        assert_eq!(s.due_date, day(7));
    }

    #[test]
    fn test_first_good_review() {
        let reviews = log(&[(100, Grade::Create), (105, Grade::Good)]);
        let s = schedule(day(100), &reviews);
        assert_eq!(s.last_reset_date, day(100));
        assert_eq!(s.last_study_date, day(105));
        assert_eq!(s.ease, 1.0);
        assert_eq!(s.study_maturity, 5);
        assert_eq!(s.interval, 5);
        assert_eq!(s.due_date, day(110));
    }

    #[test]
    fn test_good_on_creation_day_waits_one_day() {
        let reviews = log(&[(100, Grade::Create), (100, Grade::Good)]);
        let s = schedule(day(100), &reviews);
        assert_eq!(s.study_maturity, 0);
        assert_eq!(s.interval, 1);
        assert_eq!(s.due_date, day(101));
    }

    #[test]
    fn test_repeated_good_doubles_interval() {
        let reviews = log(&[
            (100, Grade::Create),
            (101, Grade::Good),
            (102, Grade::Good),
            (104, Grade::Good),
        ]);
        let s = schedule(day(100), &reviews);
        assert_eq!(s.interval, 4);
        assert_eq!(s.due_date, day(108));
    }

    #[test]
    fn test_ease_averages_grades_after_reset() {
        let reviews = log(&[
            (100, Grade::Create),
            (101, Grade::Easy),
            (103, Grade::Hard),
            (105, Grade::Easy),
        ]);
        let s = schedule(day(100), &reviews);
        assert!((s.ease - 4.0 / 3.0).abs() < 1e-9);
        // floor(4/3 * 5) = 6
        assert_eq!(s.interval, 6);
        assert_eq!(s.due_date, day(111));
    }

    #[test]
    fn test_all_hard_keeps_minimum_interval() {
        let reviews = log(&[(100, Grade::Create), (110, Grade::Hard), (111, Grade::Hard)]);
        let s = schedule(day(100), &reviews);
        assert_eq!(s.ease, 0.0);
        assert_eq!(s.interval, 1);
        assert_eq!(s.due_date, day(112));
    }

    #[test]
    fn test_again_resets_regardless_of_interval() {
        let reviews = log(&[
            (100, Grade::Create),
            (120, Grade::Easy),
            (200, Grade::Again),
        ]);
        let s = schedule(day(100), &reviews);
        assert_eq!(s.last_reset_date, day(200));
        assert_eq!(s.due_date, day(200));
    }

    #[test]
    fn test_grades_before_reset_do_not_count_towards_ease() {
        let reviews = log(&[
            (100, Grade::Create),
            (101, Grade::Easy),
            (102, Grade::Again),
            (104, Grade::Hard),
        ]);
        let s = schedule(day(100), &reviews);
        assert_eq!(s.ease, 0.0);
        assert_eq!(s.study_maturity, 2);
        assert_eq!(s.interval, 1);
        assert_eq!(s.due_date, day(105));
    }

    #[test]
    fn test_administrative_grades_are_ignored() {
        let reviews = log(&[
            (100, Grade::Create),
            (105, Grade::Good),
            (106, Grade::Edit),
            (107, Grade::Preview),
            (108, Grade::Exit),
            (109, Grade::Postpone),
        ]);
        let s = schedule(day(100), &reviews);
        assert_eq!(s.last_study_date, day(105));
        assert_eq!(s.due_date, day(110));
    }

    #[test]
    fn test_postpone_keeps_hour_fraction() {
        let due = JulianDate::new(300.5);
        let postponed = postponed_due_date(due, day(310), 2);
        assert_eq!(postponed, Some(JulianDate::new(312.5)));
        assert_eq!(postponed_due_date(due, day(310), i64::MAX), None);
    }
}
