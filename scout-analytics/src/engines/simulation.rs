//! Monte Carlo forecast of final event standings.
//!
//! Each trial replays the remaining schedule once, drawing every subject's
//! performance uniformly from its own history, and ranks subjects by the
//! ranking points they end up with. Trials are independent, so they are split
//! into fixed-size chunks, each with its own seeded generator, and run in
//! parallel. Chunk tallies are merged in chunk order, so a seeded run gives
//! the same answer on any number of threads.
use crate::error::ScoutError;
use crate::model::{PerformanceRecord, SIDE_SIZE, ScheduledMatch};
use crate::rules::{GameRules, ScoreBreakdown};
use overload::overload;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use rayon::prelude::*;
use serde::{Deserialize, Serialize};
use std::cmp::Ordering;
use std::collections::{BTreeMap, BTreeSet, HashMap};
use std::ops;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering::Relaxed};
use std::time::Instant;

#[derive(Clone, Copy, Debug, Serialize, Deserialize)]
#[serde(default)]
pub struct SimulationParams {
    pub trials: usize,
    /// Seed for a reproducible run; drawn from the thread generator if absent.
    pub seed: Option<u64>,
    /// Trials per parallel work unit.
    pub chunk_size: usize,
}

impl Default for SimulationParams {
    fn default() -> Self {
        Self {
            trials: 10_000,
            seed: None,
            chunk_size: 250,
        }
    }
}

/// Lets a caller stop a long simulation, either explicitly or at a deadline.
/// Checked between chunks of trials.
#[derive(Clone, Debug, Default)]
pub struct CancelToken {
    cancelled: Arc<AtomicBool>,
    deadline: Option<Instant>,
}

impl CancelToken {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_deadline(deadline: Instant) -> Self {
        Self {
            cancelled: Arc::default(),
            deadline: Some(deadline),
        }
    }

    pub fn cancel(&self) {
        self.cancelled.store(true, Relaxed);
    }

    pub fn is_cancelled(&self) -> bool {
        self.cancelled.load(Relaxed) || self.deadline.is_some_and(|d| Instant::now() >= d)
    }
}

/// Forecast for one subject, aggregated over all trials.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct RankForecast {
    pub subject_id: String,
    pub mean_points: f64,
    /// 1-based rank -> number of trials finishing at that rank.
    pub rank_histogram: BTreeMap<usize, u64>,
    pub expected_rank: f64,
}

impl RankForecast {
    pub fn trials(&self) -> u64 {
        self.rank_histogram.values().sum()
    }

    /// Fraction of trials in which the subject finished exactly at `rank`.
    pub fn rank_probability(&self, rank: usize) -> f64 {
        let trials = self.trials();
        if trials == 0 {
            return 0.;
        }
        self.rank_histogram.get(&rank).copied().unwrap_or(0) as f64 / trials as f64
    }
}

/// The part of a scored performance the simulator needs.
#[derive(Clone, Copy, Debug, Default)]
struct Sample {
    points: f64,
    primary: f64,
    secondary: f64,
}

impl From<ScoreBreakdown> for Sample {
    fn from(score: ScoreBreakdown) -> Self {
        Self {
            points: score.total(),
            primary: score.primary_actions,
            secondary: score.secondary_actions,
        }
    }
}

/// Per-subject accumulators over a batch of trials. Batches merge with `+`.
#[derive(Clone, Debug)]
pub struct TrialTally {
    pub trials: usize,
    point_sums: Vec<f64>,
    rank_sums: Vec<u64>,
    /// Row-major: `histogram[subject * num_subjects + rank]`, rank 0-based.
    histogram: Vec<u64>,
}

impl TrialTally {
    pub fn new(num_subjects: usize) -> Self {
        Self {
            trials: 0,
            point_sums: vec![0.; num_subjects],
            rank_sums: vec![0; num_subjects],
            histogram: vec![0; num_subjects * num_subjects],
        }
    }

    fn num_subjects(&self) -> usize {
        self.point_sums.len()
    }
}

overload!((a: ?TrialTally) + (b: ?TrialTally) -> TrialTally {
    assert_eq!(a.point_sums.len(), b.point_sums.len());
    TrialTally {
        trials: a.trials + b.trials,
        point_sums: a.point_sums.iter().zip(b.point_sums.iter()).map(|(x, y)| x + y).collect(),
        rank_sums: a.rank_sums.iter().zip(b.rank_sums.iter()).map(|(x, y)| x + y).collect(),
        histogram: a.histogram.iter().zip(b.histogram.iter()).map(|(x, y)| x + y).collect(),
    }
});

/// A remaining schedule and history pools resolved to dense subject indices.
pub struct Simulator {
    subjects: Vec<String>,
    pools: Vec<Vec<Sample>>,
    matches: Vec<[[usize; SIDE_SIZE]; 2]>,
    base_points: Vec<f64>,
    rules: GameRules,
}

impl Simulator {
    /// Subjects are those with a history, with current points, or on a
    /// complete remaining match, ordered by id. That order also breaks exact
    /// ties in each trial's ranking. Incomplete matches are left out.
    pub fn new(
        rules: &GameRules,
        histories: &HashMap<String, Vec<PerformanceRecord>>,
        remaining: &[ScheduledMatch],
        current_points: &HashMap<String, f64>,
    ) -> Self {
        let complete: Vec<&ScheduledMatch> = remaining
            .iter()
            .filter(|m| {
                let ok = m.is_complete();
                if !ok {
                    tracing::debug!(
                        "Leaving incomplete match {} out of the simulation",
                        m.match_id
                    );
                }
                ok
            })
            .collect();

        let subjects: Vec<String> = histories
            .keys()
            .chain(current_points.keys())
            .chain(complete.iter().flat_map(|m| m.a.iter().chain(m.b.iter())))
            .cloned()
            .collect::<BTreeSet<_>>()
            .into_iter()
            .collect();
        let index: HashMap<&str, usize> = subjects
            .iter()
            .enumerate()
            .map(|(i, s)| (s.as_str(), i))
            .collect();

        let fallback = Sample::from(rules.score_fallback());
        let pools: Vec<Vec<Sample>> = subjects
            .iter()
            .map(|s| match histories.get(s) {
                Some(history) if !history.is_empty() => {
                    history.iter().map(|r| rules.score(r).into()).collect()
                }
                _ => {
                    tracing::debug!("No history for {}, using the fallback performance", s);
                    vec![fallback]
                }
            })
            .collect();

        let side_indices = |side: &[String]| -> [usize; SIDE_SIZE] {
            std::array::from_fn(|i| index[side[i].as_str()])
        };
        let matches: Vec<[[usize; SIDE_SIZE]; 2]> = complete
            .iter()
            .map(|m| [side_indices(&m.a), side_indices(&m.b)])
            .collect();

        let base_points: Vec<f64> = subjects
            .iter()
            .map(|s| current_points.get(s).copied().unwrap_or(0.))
            .collect();

        Self {
            subjects,
            pools,
            matches,
            base_points,
            rules: rules.clone(),
        }
    }

    pub fn subjects(&self) -> &[String] {
        &self.subjects
    }

    pub fn num_matches(&self) -> usize {
        self.matches.len()
    }

    fn sample_side(&self, side: &[usize; SIDE_SIZE], rng: &mut impl Rng) -> Sample {
        let mut total = Sample::default();
        for &subject in side {
            let pool = &self.pools[subject];
            let pick = pool[rng.random_range(0..pool.len())];
            total.points += pick.points;
            total.primary += pick.primary;
            total.secondary += pick.secondary;
        }
        total
    }

    fn bonus(&self, sample: &Sample) -> f64 {
        let bonus = &self.rules.bonus;
        let mut points = 0.;
        if sample.primary >= bonus.primary_threshold {
            points += bonus.points;
        }
        if sample.secondary >= bonus.secondary_threshold {
            points += bonus.points;
        }
        points
    }

    fn play_trial(&self, rng: &mut impl Rng, points: &mut [f64]) {
        points.copy_from_slice(&self.base_points);
        let outcome = &self.rules.match_points;
        for [side_a, side_b] in &self.matches {
            let a = self.sample_side(side_a, rng);
            let b = self.sample_side(side_b, rng);
            let (award_a, award_b) = match a.points.total_cmp(&b.points) {
                Ordering::Greater => (outcome.win, outcome.loss),
                Ordering::Less => (outcome.loss, outcome.win),
                Ordering::Equal => (outcome.tie, outcome.tie),
            };
            let award_a = award_a + self.bonus(&a);
            let award_b = award_b + self.bonus(&b);
            side_a.iter().for_each(|&s| points[s] += award_a);
            side_b.iter().for_each(|&s| points[s] += award_b);
        }
    }

    /// Runs `trials` trials sequentially with the given generator.
    pub fn run_trials(&self, trials: usize, rng: &mut impl Rng) -> TrialTally {
        let n = self.subjects.len();
        let mut tally = TrialTally::new(n);
        let mut points = vec![0.; n];
        let mut order: Vec<usize> = Vec::with_capacity(n);
        for _ in 0..trials {
            self.play_trial(rng, &mut points);

            order.clear();
            order.extend(0..n);
            // stable, so exact ties keep subject order
            order.sort_by(|&x, &y| points[y].total_cmp(&points[x]));
            for (rank, &subject) in order.iter().enumerate() {
                tally.point_sums[subject] += points[subject];
                tally.rank_sums[subject] += rank as u64 + 1;
                tally.histogram[subject * n + rank] += 1;
            }
            tally.trials += 1;
        }
        tally
    }

    /// Runs the trials in parallel chunks. Returns `Cancelled` if the token
    /// fires before every chunk has run.
    pub fn run(
        &self,
        params: &SimulationParams,
        cancel: Option<&CancelToken>,
    ) -> Result<TrialTally, ScoutError> {
        if params.trials == 0 {
            return Err(ScoutError::invalid("trial count must be positive"));
        }
        let chunk_size = params.chunk_size.max(1);
        let num_chunks = params.trials.div_ceil(chunk_size);
        let seed = params.seed.unwrap_or_else(|| rand::rng().random());
        let n = self.subjects.len();

        let chunks: Vec<TrialTally> = (0..num_chunks)
            .into_par_iter()
            .map(|chunk| {
                if cancel.is_some_and(CancelToken::is_cancelled) {
                    return TrialTally::new(n);
                }
                let trials = chunk_size.min(params.trials - chunk * chunk_size);
                let mut rng = StdRng::seed_from_u64(chunk_seed(seed, chunk));
                self.run_trials(trials, &mut rng)
            })
            .collect();
        // float sums depend on merge order
        let tally = chunks
            .into_iter()
            .fold(TrialTally::new(n), |acc, chunk| acc + chunk);

        if tally.trials < params.trials {
            return Err(ScoutError::Cancelled {
                completed_trials: tally.trials,
            });
        }
        Ok(tally)
    }

    /// Turns a tally into forecasts sorted by expected rank, best first.
    pub fn forecast(&self, tally: &TrialTally) -> Vec<RankForecast> {
        let n = tally.num_subjects();
        assert_eq!(n, self.subjects.len());
        let trials = tally.trials.max(1) as f64;
        let mut forecasts: Vec<RankForecast> = self
            .subjects
            .iter()
            .enumerate()
            .map(|(i, subject_id)| RankForecast {
                subject_id: subject_id.clone(),
                mean_points: tally.point_sums[i] / trials,
                rank_histogram: tally.histogram[i * n..(i + 1) * n]
                    .iter()
                    .enumerate()
                    .filter(|&(_, &count)| count > 0)
                    .map(|(rank, &count)| (rank + 1, count))
                    .collect(),
                expected_rank: tally.rank_sums[i] as f64 / trials,
            })
            .collect();
        forecasts.sort_by(|a, b| a.expected_rank.total_cmp(&b.expected_rank));
        forecasts
    }
}

fn chunk_seed(seed: u64, chunk: usize) -> u64 {
    seed ^ (chunk as u64 + 1).wrapping_mul(0x9E37_79B9_7F4A_7C15)
}

/// Forecasts final standings from histories, the remaining schedule, and the
/// ranking points already earned. See `Simulator` for the subject set and tie order.
pub fn simulate(
    rules: &GameRules,
    params: &SimulationParams,
    histories: &HashMap<String, Vec<PerformanceRecord>>,
    remaining: &[ScheduledMatch],
    current_points: &HashMap<String, f64>,
    cancel: Option<&CancelToken>,
) -> Result<Vec<RankForecast>, ScoutError> {
    let simulator = Simulator::new(rules, histories, remaining, current_points);
    let now = Instant::now();
    let tally = simulator.run(params, cancel)?;
    tracing::info!(
        "Simulated {} trials of {} matches for {} subjects in {:.3}s",
        tally.trials,
        simulator.num_matches(),
        simulator.subjects().len(),
        now.elapsed().as_secs_f64()
    );
    Ok(simulator.forecast(&tally))
}
