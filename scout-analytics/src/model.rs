//! Typed records shared by the scoring function and the three engines.
//! Defaults for missing or malformed source fields are resolved by the
//! record and results sources, so everything here is total.
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::fmt;

/// Number of tiers of the primary scoring action.
pub const PRIMARY_TIERS: usize = 4;
/// Number of sub-types of the secondary scoring action.
pub const SECONDARY_KINDS: usize = 2;
/// Number of subjects on each side of a match.
pub const SIDE_SIZE: usize = 3;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum Side {
    A,
    B,
}

impl Side {
    pub const BOTH: [Side; 2] = [Side::A, Side::B];

    pub fn opponent(self) -> Self {
        match self {
            Side::A => Side::B,
            Side::B => Side::A,
        }
    }
}

impl fmt::Display for Side {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Side::A => write!(f, "A"),
            Side::B => write!(f, "B"),
        }
    }
}

/// End-of-match state, ordered by severity.
#[derive(
    Clone, Copy, Debug, Default, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize,
)]
pub enum TerminalState {
    #[default]
    None,
    Low,
    Medium,
    High,
}

impl TerminalState {
    pub const ALL: [TerminalState; 4] = [
        TerminalState::None,
        TerminalState::Low,
        TerminalState::Medium,
        TerminalState::High,
    ];

    pub fn index(self) -> usize {
        self as usize
    }

    /// Reads a free-text endgame label by substring, strongest state first.
    /// Labels naming no known state are `None`.
    pub fn from_label(label: &str) -> Self {
        if label.contains("Deep") {
            Self::High
        } else if label.contains("Shallow") {
            Self::Medium
        } else if label.contains("Park") {
            Self::Low
        } else {
            Self::None
        }
    }
}

/// Counts of discrete scoring actions within one phase. Raw observations hold
/// whole numbers; fused estimates may hold fractional means.
#[derive(Clone, Copy, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct PhaseCounts {
    pub primary: [f64; PRIMARY_TIERS],
    pub secondary: [f64; SECONDARY_KINDS],
}

impl PhaseCounts {
    pub fn primary_total(&self) -> f64 {
        self.primary.iter().copied().map(non_negative).sum()
    }

    pub fn secondary_total(&self) -> f64 {
        self.secondary.iter().copied().map(non_negative).sum()
    }

    /// Iterates over every count field in a fixed order.
    pub fn fields(&self) -> impl Iterator<Item = f64> + '_ {
        self.primary.iter().chain(self.secondary.iter()).copied()
    }

    pub fn fields_mut(&mut self) -> impl Iterator<Item = &mut f64> + '_ {
        self.primary.iter_mut().chain(self.secondary.iter_mut())
    }
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct PhaseOneActions {
    pub counts: PhaseCounts,
    pub moved: bool,
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct PhaseTwoActions {
    pub counts: PhaseCounts,
    pub terminal: TerminalState,
}

/// Informational observer annotations; no engine reads these.
#[derive(Clone, Copy, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct QualityFlags {
    pub defect: bool,
    pub interference_rating: Option<u8>,
}

/// One observer's account of one subject's contribution to one match.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct PerformanceRecord {
    pub observer_id: String,
    pub match_id: String,
    pub subject_id: String,
    pub side: Side,
    pub phase_one: PhaseOneActions,
    pub phase_two: PhaseTwoActions,
    #[serde(default)]
    pub notes: String,
    #[serde(default)]
    pub quality: QualityFlags,
}

impl PerformanceRecord {
    /// A record with no actions, useful for testing and as a builder base.
    pub fn empty(
        observer_id: impl Into<String>,
        match_id: impl Into<String>,
        subject_id: impl Into<String>,
        side: Side,
    ) -> Self {
        Self {
            observer_id: observer_id.into(),
            match_id: match_id.into(),
            subject_id: subject_id.into(),
            side,
            phase_one: PhaseOneActions::default(),
            phase_two: PhaseTwoActions::default(),
            notes: String::new(),
            quality: QualityFlags::default(),
        }
    }

    pub fn match_number(&self) -> u32 {
        match_number(&self.match_id)
    }
}

/// Point subtotals by phase, when the results source reports them.
#[derive(Clone, Copy, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct PhaseBreakdown {
    pub phase_one: f64,
    pub phase_two: f64,
    pub terminal: f64,
}

#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct SideResult {
    pub score: f64,
    pub breakdown: Option<PhaseBreakdown>,
    /// Ranking points officially awarded to each subject on this side.
    pub ranking_points: Option<f64>,
}

impl SideResult {
    pub fn with_score(score: f64) -> Self {
        Self {
            score,
            breakdown: None,
            ranking_points: None,
        }
    }
}

/// Ground truth for one match; either side may be missing.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct MatchResult {
    pub match_id: String,
    pub a: Option<SideResult>,
    pub b: Option<SideResult>,
}

impl MatchResult {
    pub fn side(&self, side: Side) -> Option<&SideResult> {
        match side {
            Side::A => self.a.as_ref(),
            Side::B => self.b.as_ref(),
        }
    }
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ScheduledMatch {
    pub match_id: String,
    pub a: Vec<String>,
    pub b: Vec<String>,
}

impl ScheduledMatch {
    pub fn side(&self, side: Side) -> &[String] {
        match side {
            Side::A => &self.a,
            Side::B => &self.b,
        }
    }

    /// Both sides list exactly `SIDE_SIZE` distinct subjects, none shared.
    pub fn is_complete(&self) -> bool {
        let mut seen = HashSet::with_capacity(2 * SIDE_SIZE);
        self.a.len() == SIDE_SIZE
            && self.b.len() == SIDE_SIZE
            && self.a.iter().chain(self.b.iter()).all(|s| seen.insert(s))
    }

    pub fn match_number(&self) -> u32 {
        match_number(&self.match_id)
    }
}

/// Per-observer noise, consumed by signal fusion.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct ObserverNoiseModel {
    pub bias: f64,
    pub variance: f64,
}

impl Default for ObserverNoiseModel {
    fn default() -> Self {
        Self {
            bias: 0.,
            variance: 10.,
        }
    }
}

/// Extracts the sequence number of a match id. Qualification ids look like
/// `2025txwac_qm12`; other ids use their trailing digits. Ids with no number
/// sort first with 0.
pub fn match_number(match_id: &str) -> u32 {
    let digits = match match_id.rfind("_qm") {
        Some(pos) => {
            let tail = &match_id[pos + 3..];
            let rest = tail.trim_start_matches(|c: char| c.is_ascii_digit());
            &tail[..tail.len() - rest.len()]
        }
        None => {
            let head = match_id.trim_end_matches(|c: char| c.is_ascii_digit());
            &match_id[head.len()..]
        }
    };
    digits.parse().unwrap_or(0)
}

/// Treats negative and non-finite values as zero.
pub fn non_negative(x: f64) -> f64 {
    if x.is_finite() && x > 0. { x } else { 0. }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn test_match_number() {
        assert_eq!(match_number("2025txwac_qm12"), 12);
        assert_eq!(match_number("2025txwac_qm7"), 7);
        assert_eq!(match_number("m42"), 42);
        assert_eq!(match_number("2025txwac_f1m1"), 1);
        assert_eq!(match_number("practice"), 0);
    }

    #[test]
    fn test_terminal_state_labels() {
        assert_eq!(TerminalState::from_label("Deep Climb"), TerminalState::High);
        assert_eq!(TerminalState::from_label("Shallow Cage"), TerminalState::Medium);
        assert_eq!(TerminalState::from_label("Parked"), TerminalState::Low);
        assert_eq!(TerminalState::from_label("Failed Deep, Parked"), TerminalState::High);
        assert_eq!(TerminalState::from_label("Failed attempt"), TerminalState::None);
        assert_eq!(TerminalState::from_label(""), TerminalState::None);
    }

    #[test]
    fn test_terminal_states_are_ordered() {
        assert!(TerminalState::None < TerminalState::Low);
        assert!(TerminalState::Low < TerminalState::Medium);
        assert!(TerminalState::Medium < TerminalState::High);
    }

    #[test]
    fn test_complete_schedule() {
        let ids = |v: &[&str]| v.iter().map(|s| s.to_string()).collect::<Vec<_>>();
        let mut m = ScheduledMatch {
            match_id: "qm1".into(),
            a: ids(&["1", "2", "3"]),
            b: ids(&["4", "5", "6"]),
        };
        assert!(m.is_complete());
        m.b = ids(&["4", "5", "5"]);
        assert!(!m.is_complete());
        m.b = ids(&["4", "5"]);
        assert!(!m.is_complete());
        m.b = ids(&["4", "5", "1"]);
        assert!(!m.is_complete());
    }

    #[test]
    fn test_non_negative() {
        assert_eq!(non_negative(-2.), 0.);
        assert_eq!(non_negative(f64::NAN), 0.);
        assert_eq!(non_negative(f64::INFINITY), 0.);
        assert_eq!(non_negative(3.5), 3.5);
    }
}
