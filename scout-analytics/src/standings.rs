//! Standings from official results, and cutting scouting data at a point in the schedule.
use crate::model::{MatchResult, PerformanceRecord, ScheduledMatch, Side};
use crate::rules::GameRules;
use std::collections::HashMap;

/// Ranking points earned by each subject in official matches numbered up to
/// `match_limit`. A side's officially reported ranking points are used when
/// available; otherwise the rules' win/tie/loss points follow from the scores.
pub fn current_points(
    rules: &GameRules,
    results: &HashMap<String, MatchResult>,
    schedule: &[ScheduledMatch],
    match_limit: Option<u32>,
) -> HashMap<String, f64> {
    let mut points = HashMap::new();
    for scheduled in schedule {
        if match_limit.is_some_and(|limit| scheduled.match_number() > limit) {
            continue;
        }
        let Some(result) = results.get(&scheduled.match_id) else {
            continue;
        };
        let (Some(a), Some(b)) = (result.a, result.b) else {
            tracing::debug!("Skipping {} with a missing side", scheduled.match_id);
            continue;
        };
        for side in Side::BOTH {
            let (own, other) = match side {
                Side::A => (a, b),
                Side::B => (b, a),
            };
            let earned = own.ranking_points.unwrap_or_else(|| {
                let outcome = &rules.match_points;
                if own.score > other.score {
                    outcome.win
                } else if own.score < other.score {
                    outcome.loss
                } else {
                    outcome.tie
                }
            });
            for subject in scheduled.side(side) {
                *points.entry(subject.clone()).or_insert(0.) += earned;
            }
        }
    }
    points
}

/// Groups records by subject, keeping those from matches numbered up to
/// `match_limit`, each group ordered by match number.
pub fn histories_until(
    records: &[PerformanceRecord],
    match_limit: Option<u32>,
) -> HashMap<String, Vec<PerformanceRecord>> {
    let mut histories: HashMap<String, Vec<PerformanceRecord>> = HashMap::new();
    for record in records {
        if match_limit.is_some_and(|limit| record.match_number() > limit) {
            continue;
        }
        histories
            .entry(record.subject_id.clone())
            .or_default()
            .push(record.clone());
    }
    for history in histories.values_mut() {
        history.sort_by_key(PerformanceRecord::match_number);
    }
    histories
}

/// Complete scheduled matches numbered after `match_limit`, in match order.
/// With no limit, every match lacking an official result for either side remains.
pub fn remaining_schedule(
    schedule: &[ScheduledMatch],
    results: &HashMap<String, MatchResult>,
    match_limit: Option<u32>,
) -> Vec<ScheduledMatch> {
    let mut remaining: Vec<ScheduledMatch> = schedule
        .iter()
        .filter(|m| m.is_complete())
        .filter(|m| match match_limit {
            Some(limit) => m.match_number() > limit,
            None => results
                .get(&m.match_id)
                .is_none_or(|r| r.a.is_none() || r.b.is_none()),
        })
        .cloned()
        .collect();
    remaining.sort_by_key(ScheduledMatch::match_number);
    remaining
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::model::SideResult;

    fn scheduled(n: u32, a: [&str; 3], b: [&str; 3]) -> ScheduledMatch {
        ScheduledMatch {
            match_id: format!("2025test_qm{}", n),
            a: a.map(String::from).to_vec(),
            b: b.map(String::from).to_vec(),
        }
    }

    fn result(n: u32, a: Option<SideResult>, b: Option<SideResult>) -> (String, MatchResult) {
        let match_id = format!("2025test_qm{}", n);
        (match_id.clone(), MatchResult { match_id, a, b })
    }

    fn schedule() -> Vec<ScheduledMatch> {
        vec![
            scheduled(1, ["1", "2", "3"], ["4", "5", "6"]),
            scheduled(2, ["1", "4", "5"], ["2", "3", "6"]),
            scheduled(3, ["1", "2", "4"], ["3", "5", "6"]),
            scheduled(4, ["6", "2", "4"], ["3", "5", "1"]),
        ]
    }

    #[test]
    fn test_current_points() {
        let rules = GameRules::default();
        let reported = SideResult {
            score: 80.,
            breakdown: None,
            ranking_points: Some(4.),
        };
        let results = HashMap::from([
            result(1, Some(SideResult::with_score(50.)), Some(SideResult::with_score(40.))),
            result(2, Some(SideResult::with_score(30.)), Some(SideResult::with_score(30.))),
            result(3, Some(reported), Some(SideResult::with_score(10.))),
            result(4, None, Some(SideResult::with_score(10.))),
        ]);

        let points = current_points(&rules, &results, &schedule(), None);
        assert_eq!(points["1"], 2. + 1. + 4.);
        assert_eq!(points["4"], 0. + 1. + 4.);
        assert_eq!(points["3"], 2. + 1. + 0.);
        assert_eq!(points["6"], 0. + 1. + 0.);

        let points = current_points(&rules, &results, &schedule(), Some(1));
        assert_eq!(points["1"], 2.);
        assert_eq!(points["6"], 0.);
    }

    #[test]
    fn test_histories_until() {
        let records: Vec<PerformanceRecord> = [5, 1, 3, 2]
            .iter()
            .map(|n| PerformanceRecord::empty("s", format!("2025test_qm{}", n), "1", Side::A))
            .chain(std::iter::once(PerformanceRecord::empty(
                "s",
                "2025test_qm9",
                "2",
                Side::B,
            )))
            .collect();
        let histories = histories_until(&records, Some(3));
        assert_eq!(histories.len(), 1);
        let numbers: Vec<u32> = histories["1"].iter().map(|r| r.match_number()).collect();
        assert_eq!(numbers, [1, 2, 3]);

        let histories = histories_until(&records, None);
        assert_eq!(histories["1"].len(), 4);
        assert_eq!(histories["2"].len(), 1);
    }

    #[test]
    fn test_remaining_schedule() {
        let mut sched = schedule();
        sched.push(scheduled(5, ["1", "1", "2"], ["3", "4", "5"]));
        sched.reverse();
        let results = HashMap::from([
            result(1, Some(SideResult::with_score(1.)), Some(SideResult::with_score(1.))),
            result(2, Some(SideResult::with_score(1.)), Some(SideResult::with_score(1.))),
            result(3, None, None),
        ]);

        let remaining = remaining_schedule(&sched, &results, Some(2));
        let numbers: Vec<u32> = remaining.iter().map(|m| m.match_number()).collect();
        assert_eq!(numbers, [3, 4]);

        let remaining = remaining_schedule(&sched, &results, None);
        assert_eq!(remaining.len(), 2);

        let remaining = remaining_schedule(&sched, &results, Some(0));
        assert_eq!(remaining.len(), 4);
    }
}
