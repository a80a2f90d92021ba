//! Precision-weighted fusion of redundant observations of one subject in one match.
use crate::error::ScoutError;
use crate::model::{
    ObserverNoiseModel, PerformanceRecord, PhaseCounts, TerminalState, non_negative,
};
use std::collections::{BTreeMap, HashMap};

/// Floor on observer variance so that near-perfect observers can't dominate
/// through a division blow-up.
pub const VARIANCE_FLOOR: f64 = 0.1;

fn weight(model: &ObserverNoiseModel) -> f64 {
    1. / model.variance.max(VARIANCE_FLOOR)
}

/// Merges several observations of the same subject in the same match into one estimate.
///
/// Counts are debiased per observer, floored at zero, and averaged with weights
/// `1 / max(variance, VARIANCE_FLOOR)`. Movement is the logical OR of all reports.
/// The terminal state is a weighted plurality vote; on an exact tie the state
/// encountered first in `records` wins. Observers without a noise model get
/// `ObserverNoiseModel::default()`. A lone record with no model is returned as is.
pub fn fuse(
    records: &[PerformanceRecord],
    models: &HashMap<String, ObserverNoiseModel>,
) -> Result<PerformanceRecord, ScoutError> {
    let first = records
        .first()
        .ok_or_else(|| ScoutError::invalid("cannot fuse an empty set of records"))?;
    if let Some(stray) = records
        .iter()
        .find(|r| r.subject_id != first.subject_id || r.match_id != first.match_id)
    {
        return Err(ScoutError::invalid(format!(
            "cannot fuse {} in {} with {} in {}",
            stray.subject_id, stray.match_id, first.subject_id, first.match_id
        )));
    }
    if records.len() == 1 && !models.contains_key(&first.observer_id) {
        return Ok(first.clone());
    }

    let weighted: Vec<(&PerformanceRecord, ObserverNoiseModel, f64)> = records
        .iter()
        .map(|r| {
            let model = models.get(&r.observer_id).copied().unwrap_or_default();
            (r, model, weight(&model))
        })
        .collect();
    let total_weight: f64 = weighted.iter().map(|&(_, _, w)| w).sum();

    let mut fused = first.clone();
    fused.observer_id = fused_observer_id(records);
    fused.phase_one.counts = weighted_mean(
        weighted.iter().map(|&(r, m, w)| (&r.phase_one.counts, m, w)),
        total_weight,
    );
    fused.phase_two.counts = weighted_mean(
        weighted.iter().map(|&(r, m, w)| (&r.phase_two.counts, m, w)),
        total_weight,
    );
    fused.phase_one.moved = records.iter().any(|r| r.phase_one.moved);
    fused.phase_two.terminal = vote_terminal(
        weighted
            .iter()
            .map(|&(r, _, w)| (r.phase_two.terminal, w)),
    );
    fused.notes = records
        .iter()
        .map(|r| r.notes.trim())
        .filter(|n| !n.is_empty())
        .collect::<Vec<_>>()
        .join(" | ");
    fused.quality.defect = records.iter().any(|r| r.quality.defect);
    fused.quality.interference_rating = records
        .iter()
        .filter_map(|r| r.quality.interference_rating)
        .max();
    Ok(fused)
}

fn weighted_mean<'a>(
    observations: impl Iterator<Item = (&'a PhaseCounts, ObserverNoiseModel, f64)>,
    total_weight: f64,
) -> PhaseCounts {
    let mut fused = PhaseCounts::default();
    for (counts, model, w) in observations {
        for (acc, val) in fused.fields_mut().zip(counts.fields()) {
            *acc += w * non_negative(val - model.bias);
        }
    }
    for acc in fused.fields_mut() {
        *acc /= total_weight;
    }
    fused
}

/// Weighted plurality; ties keep the earliest-seen state.
fn vote_terminal(votes: impl Iterator<Item = (TerminalState, f64)>) -> TerminalState {
    let mut tally: Vec<(TerminalState, f64)> = Vec::with_capacity(TerminalState::ALL.len());
    for (state, w) in votes {
        match tally.iter_mut().find(|(s, _)| *s == state) {
            Some((_, total)) => *total += w,
            None => tally.push((state, w)),
        }
    }
    tally
        .into_iter()
        .fold(None, |best: Option<(TerminalState, f64)>, (state, w)| match best {
            Some((_, best_w)) if best_w >= w => best,
            _ => Some((state, w)),
        })
        .map_or(TerminalState::None, |(state, _)| state)
}

fn fused_observer_id(records: &[PerformanceRecord]) -> String {
    let mut ids: Vec<&str> = records.iter().map(|r| r.observer_id.as_str()).collect();
    ids.sort_unstable();
    ids.dedup();
    ids.join("+")
}

/// Fuses every (match, subject) group in `records`, returning one record per
/// group ordered by match number, then match id, then subject id.
pub fn fuse_all(
    records: &[PerformanceRecord],
    models: &HashMap<String, ObserverNoiseModel>,
) -> Result<Vec<PerformanceRecord>, ScoutError> {
    let mut groups: BTreeMap<(u32, &str, &str), Vec<PerformanceRecord>> = BTreeMap::new();
    for record in records {
        groups
            .entry((
                record.match_number(),
                record.match_id.as_str(),
                record.subject_id.as_str(),
            ))
            .or_default()
            .push(record.clone());
    }
    let fused = groups
        .values()
        .map(|group| fuse(group, models))
        .collect::<Result<Vec<_>, _>>()?;
    tracing::debug!(
        "Fused {} records into {} estimates",
        records.len(),
        fused.len()
    );
    Ok(fused)
}
