use crate::model::{
    PRIMARY_TIERS, PerformanceRecord, PhaseCounts, PhaseOneActions, PhaseTwoActions,
    SECONDARY_KINDS, TerminalState, non_negative,
};
use serde::{Deserialize, Serialize};

/// Point values of each counted action within one phase.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct PhaseWeights {
    pub primary: [f64; PRIMARY_TIERS],
    pub secondary: [f64; SECONDARY_KINDS],
}

impl PhaseWeights {
    fn points(&self, counts: &PhaseCounts) -> f64 {
        let primary = self.primary.iter().zip(counts.primary.iter());
        let secondary = self.secondary.iter().zip(counts.secondary.iter());
        primary
            .chain(secondary)
            .map(|(&w, &n)| w * non_negative(n))
            .sum()
    }
}

/// Ranking points for the outcome of a match.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct MatchPoints {
    pub win: f64,
    pub tie: f64,
    pub loss: f64,
}

/// Additional ranking points for a side whose combined action counts reach a threshold.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct BonusRules {
    pub primary_threshold: f64,
    pub secondary_threshold: f64,
    pub points: f64,
}

/// The game-specific constants: weight tables, ranking-point awards, and the
/// stand-in performance for a subject with no history.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct GameRules {
    pub phase_one: PhaseWeights,
    pub phase_two: PhaseWeights,
    pub movement_bonus: f64,
    /// Indexed by `TerminalState::index()`.
    pub terminal: [f64; 4],
    pub match_points: MatchPoints,
    pub bonus: BonusRules,
    pub fallback: FallbackPerformance,
}

/// Conservative baseline used when a subject has no recorded history.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct FallbackPerformance {
    pub phase_one: PhaseOneActions,
    pub phase_two: PhaseTwoActions,
}

impl Default for GameRules {
    fn default() -> Self {
        Self::reefscape_2025()
    }
}

impl GameRules {
    /// The 2025 ruleset: four reef levels of coral, processor and net algae,
    /// park/shallow/deep climbs.
    pub fn reefscape_2025() -> Self {
        Self {
            phase_one: PhaseWeights {
                primary: [3., 4., 6., 7.],
                secondary: [6., 4.],
            },
            phase_two: PhaseWeights {
                primary: [2., 3., 4., 5.],
                secondary: [6., 4.],
            },
            movement_bonus: 3.,
            terminal: [0., 2., 6., 12.],
            match_points: MatchPoints {
                win: 2.,
                tie: 1.,
                loss: 0.,
            },
            bonus: BonusRules {
                primary_threshold: 15.,
                secondary_threshold: 8.,
                points: 1.,
            },
            fallback: FallbackPerformance {
                phase_one: PhaseOneActions {
                    counts: PhaseCounts::default(),
                    moved: true,
                },
                phase_two: PhaseTwoActions {
                    counts: PhaseCounts {
                        primary: [2., 0., 0., 0.],
                        secondary: [0., 0.],
                    },
                    terminal: TerminalState::Low,
                },
            },
        }
    }

    pub fn terminal_points(&self, state: TerminalState) -> f64 {
        self.terminal[state.index()]
    }

    /// Converts a record into period-segmented points and action counts.
    /// Negative or non-finite counts contribute nothing.
    pub fn score(&self, record: &PerformanceRecord) -> ScoreBreakdown {
        self.score_actions(&record.phase_one, &record.phase_two)
    }

    pub fn score_actions(
        &self,
        phase_one: &PhaseOneActions,
        phase_two: &PhaseTwoActions,
    ) -> ScoreBreakdown {
        let mut phase_one_points = self.phase_one.points(&phase_one.counts);
        if phase_one.moved {
            phase_one_points += self.movement_bonus;
        }
        ScoreBreakdown {
            phase_one_points,
            phase_two_points: self.phase_two.points(&phase_two.counts),
            terminal_points: self.terminal_points(phase_two.terminal),
            primary_actions: phase_one.counts.primary_total() + phase_two.counts.primary_total(),
            secondary_actions: phase_one.counts.secondary_total()
                + phase_two.counts.secondary_total(),
        }
    }

    pub fn score_fallback(&self) -> ScoreBreakdown {
        self.score_actions(&self.fallback.phase_one, &self.fallback.phase_two)
    }
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct ScoreBreakdown {
    pub phase_one_points: f64,
    pub phase_two_points: f64,
    pub terminal_points: f64,
    /// Primary actions across both phases.
    pub primary_actions: f64,
    /// Secondary actions across both phases.
    pub secondary_actions: f64,
}

impl ScoreBreakdown {
    pub fn total(&self) -> f64 {
        self.phase_one_points + self.phase_two_points + self.terminal_points
    }
}

impl std::ops::AddAssign for ScoreBreakdown {
    fn add_assign(&mut self, rhs: Self) {
        self.phase_one_points += rhs.phase_one_points;
        self.phase_two_points += rhs.phase_two_points;
        self.terminal_points += rhs.terminal_points;
        self.primary_actions += rhs.primary_actions;
        self.secondary_actions += rhs.secondary_actions;
    }
}

impl std::iter::Sum for ScoreBreakdown {
    fn sum<I: Iterator<Item = Self>>(iter: I) -> Self {
        iter.fold(Self::default(), |mut acc, x| {
            acc += x;
            acc
        })
    }
}
