//! Scout precision: every way of reconstructing an alliance's score from
//! redundant observer records is compared with the official score, and each
//! reconstruction's error is charged to every observer who contributed to it.
use crate::model::{
    MatchResult, PerformanceRecord, SIDE_SIZE, ScheduledMatch, Side, SideResult,
};
use crate::rules::{GameRules, ScoreBreakdown};
use itertools::Itertools;
use serde::{Deserialize, Serialize};
use statrs::statistics::Statistics;
use std::collections::{BTreeMap, HashMap};

#[derive(Clone, Copy, Debug, Serialize, Deserialize)]
#[serde(default)]
pub struct PrecisionParams {
    /// Records kept per subject, bounding an alliance at `max^3` combinations.
    pub max_reports_per_subject: usize,
}

impl Default for PrecisionParams {
    fn default() -> Self {
        Self {
            max_reports_per_subject: 8,
        }
    }
}

/// Error of one reconstruction of an alliance's score.
#[derive(Clone, Debug, PartialEq)]
pub struct CombinationError<'a> {
    /// Distinct observers whose records make up the combination.
    pub observers: Vec<&'a str>,
    /// Reconstructed total minus official total.
    pub signed_error: f64,
    /// Absolute error per phase, present only when official subtotals are.
    pub phase_errors: Option<[f64; 3]>,
}

/// Aggregate accuracy of one observer; lower `precision` is better.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ObserverPrecision {
    pub observer_id: String,
    /// Number of combinations this observer took part in. This can exceed the
    /// number of matches they scouted when subjects have several observers.
    pub combinations: usize,
    /// Mean absolute error of the observer's combinations.
    pub precision: f64,
    /// Mean signed error; positive means systematic over-reporting.
    pub bias: f64,
    /// Population variance of the signed error around `bias`.
    pub variance: f64,
    pub phase_one_error: Option<f64>,
    pub phase_two_error: Option<f64>,
    pub terminal_error: Option<f64>,
}

#[derive(Default)]
struct ErrorSamples {
    signed: Vec<f64>,
    phases: [Vec<f64>; 3],
}

impl ErrorSamples {
    fn summarize(self, observer_id: String) -> ObserverPrecision {
        let phase_mean = |v: &Vec<f64>| (!v.is_empty()).then(|| v.iter().mean());
        let bias = self.signed.iter().mean();
        ObserverPrecision {
            combinations: self.signed.len(),
            precision: self.signed.iter().map(|e| e.abs()).mean(),
            bias,
            variance: self.signed.iter().population_variance(),
            phase_one_error: phase_mean(&self.phases[0]),
            phase_two_error: phase_mean(&self.phases[1]),
            terminal_error: phase_mean(&self.phases[2]),
            observer_id,
        }
    }
}

/// Enumerates every pick-one-record-per-subject combination for one alliance
/// and scores it against the official result for that side.
pub fn score_alliance<'a>(
    rules: &GameRules,
    groups: &[Vec<&'a PerformanceRecord>],
    actual: &SideResult,
) -> Vec<CombinationError<'a>> {
    // Each record is scored once, not once per combination.
    let scored: Vec<Vec<(&'a str, ScoreBreakdown)>> = groups
        .iter()
        .map(|group| {
            group
                .iter()
                .map(|r| (r.observer_id.as_str(), rules.score(r)))
                .collect()
        })
        .collect();

    scored
        .iter()
        .map(|group| group.iter())
        .multi_cartesian_product()
        .map(|combo| {
            let reconstructed: ScoreBreakdown = combo.iter().map(|(_, score)| *score).sum();
            let mut observers: Vec<&'a str> = combo.iter().map(|&&(id, _)| id).collect();
            observers.sort_unstable();
            observers.dedup();
            CombinationError {
                observers,
                signed_error: reconstructed.total() - actual.score,
                phase_errors: actual.breakdown.map(|official| {
                    [
                        (reconstructed.phase_one_points - official.phase_one).abs(),
                        (reconstructed.phase_two_points - official.phase_two).abs(),
                        (reconstructed.terminal_points - official.terminal).abs(),
                    ]
                }),
            }
        })
        .collect()
}

/// Determines the three subjects of an alliance and their record groups, or
/// `None` if the alliance can't be reconstructed.
fn alliance_groups<'a>(
    records: &[&'a PerformanceRecord],
    scheduled: Option<&[String]>,
    max_reports: usize,
) -> Option<Vec<Vec<&'a PerformanceRecord>>> {
    let subjects: Vec<&str> = match scheduled {
        Some(side) => side.iter().map(String::as_str).collect(),
        None => records.iter().map(|r| r.subject_id.as_str()).unique().collect(),
    };
    if subjects.len() != SIDE_SIZE || subjects.iter().unique().count() != SIDE_SIZE {
        return None;
    }

    let mut groups = Vec::with_capacity(SIDE_SIZE);
    for subject in subjects {
        let group: Vec<_> = records
            .iter()
            .copied()
            .filter(|r| r.subject_id == subject)
            .collect();
        if group.is_empty() {
            return None;
        }
        if group.len() > max_reports {
            tracing::warn!(
                "Keeping {} of {} records for {} in {}",
                max_reports,
                group.len(),
                subject,
                group[0].match_id
            );
        }
        groups.push(group.into_iter().take(max_reports).collect());
    }
    Some(groups)
}

/// Ranks observers by how well their records reconstruct official alliance scores.
///
/// Alliances without an official result, or without exactly three distinct
/// subjects that each have at least one record, are skipped. Observers who
/// took part in no scored combination are left out. Per-phase errors use only
/// combinations whose official result carries phase subtotals. Output is
/// sorted by ascending `precision`, then observer id.
pub fn compute_precision(
    rules: &GameRules,
    params: &PrecisionParams,
    records: &[PerformanceRecord],
    results: &HashMap<String, MatchResult>,
    schedule: &[ScheduledMatch],
) -> Vec<ObserverPrecision> {
    let scheduled: HashMap<&str, &ScheduledMatch> = schedule
        .iter()
        .map(|m| (m.match_id.as_str(), m))
        .collect();

    let mut alliances: BTreeMap<(u32, &str, Side), Vec<&PerformanceRecord>> = BTreeMap::new();
    for record in records {
        alliances
            .entry((record.match_number(), record.match_id.as_str(), record.side))
            .or_default()
            .push(record);
    }

    let max_reports = params.max_reports_per_subject.max(1);
    let mut samples: HashMap<&str, ErrorSamples> = HashMap::new();
    let (mut scored_alliances, mut skipped_alliances) = (0, 0);
    for (&(_, match_id, side), alliance_records) in &alliances {
        let Some(actual) = results.get(match_id).and_then(|r| r.side(side)) else {
            tracing::debug!("No official result for {} side {}", match_id, side);
            skipped_alliances += 1;
            continue;
        };
        let scheduled_side = scheduled.get(match_id).map(|m| m.side(side));
        let Some(groups) = alliance_groups(alliance_records, scheduled_side, max_reports) else {
            tracing::debug!("Incomplete alliance {} side {}", match_id, side);
            skipped_alliances += 1;
            continue;
        };

        for combo in score_alliance(rules, &groups, actual) {
            for observer in combo.observers {
                let entry = samples.entry(observer).or_default();
                entry.signed.push(combo.signed_error);
                if let Some(phase_errors) = combo.phase_errors {
                    for (acc, err) in entry.phases.iter_mut().zip(phase_errors) {
                        acc.push(err);
                    }
                }
            }
        }
        scored_alliances += 1;
    }
    tracing::info!(
        "Scored {} alliances, skipped {}, {} observers ranked",
        scored_alliances,
        skipped_alliances,
        samples.len()
    );

    let mut stats: Vec<ObserverPrecision> = samples
        .into_iter()
        .filter(|(_, s)| !s.signed.is_empty())
        .map(|(id, s)| s.summarize(id.to_string()))
        .collect();
    stats.sort_by(|a, b| {
        a.precision
            .total_cmp(&b.precision)
            .then_with(|| a.observer_id.cmp(&b.observer_id))
    });
    stats
}

/// Mean per-phase error across observers, for spotting which phase is
/// hardest to scout. Observers without phase samples don't contribute.
#[derive(Clone, Copy, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct PhaseErrorSummary {
    pub phase_one: Option<f64>,
    pub phase_two: Option<f64>,
    pub terminal: Option<f64>,
}

pub fn phase_error_summary(stats: &[ObserverPrecision]) -> PhaseErrorSummary {
    let average = |get: fn(&ObserverPrecision) -> Option<f64>| {
        let values: Vec<f64> = stats.iter().filter_map(get).collect();
        (!values.is_empty()).then(|| values.iter().mean())
    };
    PhaseErrorSummary {
        phase_one: average(|s| s.phase_one_error),
        phase_two: average(|s| s.phase_two_error),
        terminal: average(|s| s.terminal_error),
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::model::{PhaseBreakdown, TerminalState};

    const MATCH: &str = "2025test_qm1";

    fn record(observer: &str, subject: &str, side: Side, l4: f64) -> PerformanceRecord {
        let mut r = PerformanceRecord::empty(observer, MATCH, subject, side);
        r.phase_two.counts.primary[3] = l4;
        r
    }

    fn result(a: f64, b: Option<f64>) -> HashMap<String, MatchResult> {
        let result = MatchResult {
            match_id: MATCH.into(),
            a: Some(SideResult::with_score(a)),
            b: b.map(SideResult::with_score),
        };
        HashMap::from([(MATCH.to_string(), result)])
    }

    fn run(
        records: &[PerformanceRecord],
        results: &HashMap<String, MatchResult>,
    ) -> Vec<ObserverPrecision> {
        compute_precision(
            &GameRules::default(),
            &PrecisionParams::default(),
            records,
            results,
            &[],
        )
    }

    #[test]
    fn test_two_observers_per_subject_gives_eight_combinations() {
        let records: Vec<_> = ["r1", "r2", "r3"]
            .iter()
            .flat_map(|&s| {
                [
                    record(&format!("{}-x", s), s, Side::A, 1.),
                    record(&format!("{}-y", s), s, Side::A, 2.),
                ]
            })
            .collect();
        let groups: Vec<Vec<&PerformanceRecord>> = records
            .chunks(2)
            .map(|pair| pair.iter().collect())
            .collect();
        let combos = score_alliance(&GameRules::default(), &groups, &SideResult::with_score(0.));
        assert_eq!(combos.len(), 8);
        assert!(combos.iter().all(|c| c.observers.len() == 3));

        let stats = run(&records, &result(0., None));
        assert_eq!(stats.len(), 6);
        assert!(stats.iter().all(|s| s.combinations == 4));
    }

    #[test]
    fn test_perfect_observers_score_zero() {
        let mut records = vec![
            record("ann", "r1", Side::A, 2.),
            record("bob", "r2", Side::A, 1.),
            record("cat", "r3", Side::A, 0.),
            record("dan", "r1", Side::A, 2.),
        ];
        records[2].phase_two.terminal = TerminalState::High;
        let mut results = result(15. + 12., None);
        results.get_mut(MATCH).unwrap().a.as_mut().unwrap().breakdown = Some(PhaseBreakdown {
            phase_one: 0.,
            phase_two: 15.,
            terminal: 12.,
        });

        let stats = run(&records, &results);
        assert_eq!(stats.len(), 4);
        for s in &stats {
            assert_eq!(s.precision, 0.);
            assert_eq!(s.bias, 0.);
            assert_eq!(s.variance, 0.);
            assert_eq!(s.phase_two_error, Some(0.));
            assert_eq!(s.terminal_error, Some(0.));
        }
        let bob = stats.iter().find(|s| s.observer_id == "bob").unwrap();
        assert_eq!(bob.combinations, 2);
        let ann = stats.iter().find(|s| s.observer_id == "ann").unwrap();
        assert_eq!(ann.combinations, 1);
    }

    #[test]
    fn test_error_attribution() {
        // r1 is seen by two observers who disagree by one top-tier action
        let records = vec![
            record("over", "r1", Side::A, 3.),
            record("exact", "r1", Side::A, 2.),
            record("mid", "r2", Side::A, 0.),
            record("end", "r3", Side::A, 0.),
        ];
        let stats = run(&records, &result(10., None));

        let by_id = |id: &str| stats.iter().find(|s| s.observer_id == id).unwrap();
        assert_eq!(by_id("exact").precision, 0.);
        assert_eq!(by_id("over").precision, 5.);
        assert_eq!(by_id("over").bias, 5.);
        assert_eq!(by_id("mid").combinations, 2);
        assert_eq!(by_id("mid").precision, 2.5);
        assert_eq!(by_id("mid").bias, 2.5);
        assert_eq!(by_id("mid").variance, 6.25);
        assert_eq!(by_id("mid").phase_one_error, None);
        assert_eq!(stats[0].observer_id, "exact");
        assert_eq!(stats[3].observer_id, "over");
    }

    #[test]
    fn test_observer_covering_two_subjects_is_charged_once_per_combination() {
        let records = vec![
            record("solo", "r1", Side::A, 1.),
            record("solo", "r2", Side::A, 1.),
            record("other", "r3", Side::A, 1.),
        ];
        let stats = run(&records, &result(10., None));
        let solo = stats.iter().find(|s| s.observer_id == "solo").unwrap();
        assert_eq!(solo.combinations, 1);
        assert_eq!(solo.bias, 5.);
    }

    #[test]
    fn test_incomplete_alliances_are_skipped() {
        let records = vec![
            record("a", "r1", Side::A, 1.),
            record("b", "r2", Side::A, 1.),
            record("c", "r4", Side::B, 1.),
            record("d", "r5", Side::B, 1.),
            record("e", "r6", Side::B, 1.),
        ];
        // side A has two subjects; side B has no official result
        let stats = run(&records, &result(10., None));
        assert!(stats.is_empty());

        let stats = run(&records, &HashMap::new());
        assert!(stats.is_empty());

        let stats = run(&records, &result(10., Some(15.)));
        assert_eq!(stats.len(), 3);
        assert!(stats.iter().all(|s| s.observer_id >= "c".to_string()));
    }

    #[test]
    fn test_schedule_defines_the_alliance() {
        let records = vec![
            record("a", "r1", Side::A, 1.),
            record("b", "r2", Side::A, 1.),
            record("c", "r3", Side::A, 1.),
            record("stray", "r9", Side::A, 1.),
        ];
        let results = result(15., None);
        // four distinct subjects without a schedule
        assert!(run(&records, &results).is_empty());

        let schedule = vec![ScheduledMatch {
            match_id: MATCH.into(),
            a: vec!["r1".into(), "r2".into(), "r3".into()],
            b: vec!["r4".into(), "r5".into(), "r6".into()],
        }];
        let stats = compute_precision(
            &GameRules::default(),
            &PrecisionParams::default(),
            &records,
            &results,
            &schedule,
        );
        assert_eq!(stats.len(), 3);
        assert!(stats.iter().all(|s| s.precision == 0.));
    }

    #[test]
    fn test_fan_out_is_bounded() {
        let records: Vec<_> = (0..5)
            .flat_map(|i| {
                ["r1", "r2", "r3"]
                    .map(|s| record(&format!("{}-{}", s, i), s, Side::A, 1.))
            })
            .collect();
        let params = PrecisionParams {
            max_reports_per_subject: 2,
        };
        let stats = compute_precision(
            &GameRules::default(),
            &params,
            &records,
            &result(15., None),
            &[],
        );
        assert_eq!(stats.len(), 6);
        assert!(stats.iter().all(|s| s.combinations == 4));
    }

    #[test]
    fn test_phase_error_summary() {
        let mut stats = run(
            &[
                record("a", "r1", Side::A, 1.),
                record("b", "r2", Side::A, 1.),
                record("c", "r3", Side::A, 1.),
            ],
            &result(15., None),
        );
        assert_eq!(phase_error_summary(&stats), PhaseErrorSummary::default());
        stats[0].phase_two_error = Some(4.);
        stats[1].phase_two_error = Some(2.);
        assert_eq!(phase_error_summary(&stats).phase_two, Some(3.));
    }
}
