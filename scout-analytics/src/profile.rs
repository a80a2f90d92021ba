use crate::model::{PRIMARY_TIERS, PerformanceRecord, TerminalState};
use crate::rules::GameRules;
use serde::Serialize;
use statrs::statistics::Statistics;
use std::collections::HashMap;

/// Summary of one subject's observed performances.
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct SubjectProfile {
    pub subject_id: String,
    pub matches_observed: usize,
    pub mean_phase_two_top_tier: f64,
    pub max_phase_two_secondary: f64,
    /// Fraction of records ending in the medium or high terminal state.
    pub terminal_success_rate: f64,
    pub movement_rate: f64,
    pub mean_phase_one_primary: f64,
    pub mean_points: f64,
    /// Records flagged with a mechanical defect.
    pub defects: usize,
    /// Mean interference rating over the records that carry one.
    pub mean_interference: Option<f64>,
    /// Up to three observer notes, joined by ` | `.
    pub notes: String,
}

const MAX_NOTES: usize = 3;

fn rate(records: &[&PerformanceRecord], pred: impl Fn(&PerformanceRecord) -> bool) -> f64 {
    records.iter().filter(|r| pred(r)).count() as f64 / records.len() as f64
}

/// Profiles one subject from its records; `None` when there are none.
pub fn profile(
    rules: &GameRules,
    subject_id: &str,
    records: &[&PerformanceRecord],
) -> Option<SubjectProfile> {
    if records.is_empty() {
        return None;
    }
    let top_tier = records
        .iter()
        .map(|r| r.phase_two.counts.primary[PRIMARY_TIERS - 1].max(0.));
    let max_secondary = records
        .iter()
        .map(|r| r.phase_two.counts.secondary_total())
        .fold(0., f64::max);
    let ratings: Vec<f64> = records
        .iter()
        .filter_map(|r| r.quality.interference_rating)
        .map(f64::from)
        .collect();
    Some(SubjectProfile {
        subject_id: subject_id.to_owned(),
        matches_observed: records.len(),
        mean_phase_two_top_tier: top_tier.mean(),
        max_phase_two_secondary: max_secondary,
        terminal_success_rate: rate(records, |r| r.phase_two.terminal >= TerminalState::Medium),
        movement_rate: rate(records, |r| r.phase_one.moved),
        mean_phase_one_primary: records
            .iter()
            .map(|r| r.phase_one.counts.primary_total())
            .mean(),
        mean_points: records.iter().map(|r| rules.score(r).total()).mean(),
        defects: records.iter().filter(|r| r.quality.defect).count(),
        mean_interference: (!ratings.is_empty()).then(|| ratings.iter().mean()),
        notes: records
            .iter()
            .map(|r| r.notes.trim())
            .filter(|n| !n.is_empty() && *n != "No notes.")
            .take(MAX_NOTES)
            .collect::<Vec<_>>()
            .join(" | "),
    })
}

/// Profiles every subject, strongest mean contribution first.
pub fn profiles(rules: &GameRules, records: &[PerformanceRecord]) -> Vec<SubjectProfile> {
    let mut by_subject: HashMap<&str, Vec<&PerformanceRecord>> = HashMap::new();
    for record in records {
        by_subject
            .entry(record.subject_id.as_str())
            .or_default()
            .push(record);
    }
    let mut profiles: Vec<SubjectProfile> = by_subject
        .into_iter()
        .filter_map(|(subject, records)| profile(rules, subject, &records))
        .collect();
    profiles.sort_by(|a, b| {
        b.mean_points
            .total_cmp(&a.mean_points)
            .then_with(|| a.subject_id.cmp(&b.subject_id))
    });
    profiles
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::model::Side;

    fn record(subject: &str, n: u32) -> PerformanceRecord {
        PerformanceRecord::empty("s", format!("2025test_qm{}", n), subject, Side::A)
    }

    #[test]
    fn test_profile() {
        let rules = GameRules::default();
        let mut first = record("frc1", 1);
        first.phase_one.moved = true;
        first.phase_one.counts.primary = [1., 0., 0., 1.];
        first.phase_two.counts.primary[3] = 4.;
        first.phase_two.counts.secondary = [1., 2.];
        first.phase_two.terminal = TerminalState::High;
        let mut second = record("frc1", 2);
        second.phase_two.counts.primary[3] = 2.;
        second.phase_two.counts.secondary = [1., 0.];
        second.phase_two.terminal = TerminalState::Low;
        first.quality.defect = true;
        first.quality.interference_rating = Some(4);
        first.notes = "fast cycles".to_owned();
        second.notes = "No notes.".to_owned();

        let p = profile(&rules, "frc1", &[&first, &second]).unwrap();
        assert_eq!(p.matches_observed, 2);
        assert_eq!(p.mean_phase_two_top_tier, 3.);
        assert_eq!(p.max_phase_two_secondary, 3.);
        assert_eq!(p.terminal_success_rate, 0.5);
        assert_eq!(p.movement_rate, 0.5);
        assert_eq!(p.mean_phase_one_primary, 1.);
        let expected = (rules.score(&first).total() + rules.score(&second).total()) / 2.;
        assert!((p.mean_points - expected).abs() < 1e-9);
        assert_eq!(p.defects, 1);
        assert_eq!(p.mean_interference, Some(4.));
        assert_eq!(p.notes, "fast cycles");
    }

    #[test]
    fn test_quality_without_ratings() {
        let records: Vec<PerformanceRecord> = (1..=5)
            .map(|n| {
                let mut r = record("frc7", n);
                r.notes = format!("note {}", n);
                r
            })
            .collect();
        let refs: Vec<&PerformanceRecord> = records.iter().collect();
        let p = profile(&GameRules::default(), "frc7", &refs).unwrap();
        assert_eq!(p.defects, 0);
        assert_eq!(p.mean_interference, None);
        assert_eq!(p.notes, "note 1 | note 2 | note 3");
    }

    #[test]
    fn test_empty_profile() {
        assert_eq!(profile(&GameRules::default(), "frc1", &[]), None);
    }

    #[test]
    fn test_profiles_are_sorted() {
        let rules = GameRules::default();
        let mut strong = record("frc2", 1);
        strong.phase_two.terminal = TerminalState::High;
        let records = vec![record("frc1", 1), strong, record("frc3", 2)];
        let ordered: Vec<String> = profiles(&rules, &records)
            .into_iter()
            .map(|p| p.subject_id)
            .collect();
        assert_eq!(ordered, ["frc2", "frc1", "frc3"]);
    }
}
