use crate::error::ScoutError;
use crate::model::{MatchResult, PhaseBreakdown, ScheduledMatch, SideResult};
use reqwest::blocking::Client;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::Path;

/// The Blue Alliance documentation: https://www.thebluealliance.com/apidocs/v3
const TBA_BASE_URL: &str = "https://www.thebluealliance.com/api/v3";

/// A Match object from The Blue Alliance API, keeping only the fields we use.
#[derive(Serialize, Deserialize, Clone, Debug)]
pub struct TbaMatch {
    pub key: String,
    pub match_number: u32,
    /// One of `qm`, `ef`, `qf`, `sf`, `f`.
    pub comp_level: String,
    pub alliances: TbaAlliances,
    #[serde(default)]
    pub score_breakdown: Option<TbaScoreBreakdown>,
}

#[derive(Serialize, Deserialize, Clone, Debug)]
pub struct TbaAlliances {
    pub red: TbaAlliance,
    pub blue: TbaAlliance,
}

#[derive(Serialize, Deserialize, Clone, Debug)]
pub struct TbaAlliance {
    /// -1 or null until the match is played.
    pub score: Option<f64>,
    #[serde(default)]
    pub team_keys: Vec<String>,
}

#[derive(Serialize, Deserialize, Clone, Debug)]
pub struct TbaScoreBreakdown {
    pub red: Option<TbaSideBreakdown>,
    pub blue: Option<TbaSideBreakdown>,
}

/// The season-independent part of a per-alliance score breakdown.
/// `teleopPoints` already includes the endgame points, and
/// `autoPoints + teleopPoints` plus foul points make up the score.
#[derive(Serialize, Deserialize, Clone, Copy, Debug, Default)]
#[serde(rename_all = "camelCase")]
pub struct TbaSideBreakdown {
    pub auto_points: Option<f64>,
    pub teleop_points: Option<f64>,
    #[serde(alias = "endGameBargePoints")]
    pub endgame_points: Option<f64>,
    pub rp: Option<f64>,
}

impl TbaSideBreakdown {
    /// Splits the endgame out of the teleop subtotal, so the three phases
    /// don't overlap.
    fn phases(&self) -> Option<PhaseBreakdown> {
        let phase_one = self.auto_points?;
        let terminal = self.endgame_points?;
        let phase_two = self.teleop_points? - terminal;
        Some(PhaseBreakdown {
            phase_one,
            phase_two,
            terminal,
        })
    }
}

fn side_result(
    alliance: &TbaAlliance,
    breakdown: Option<&TbaSideBreakdown>,
) -> Option<SideResult> {
    let score = alliance.score.filter(|&s| s >= 0.)?;
    let breakdown = breakdown.copied().unwrap_or_default();
    Some(SideResult {
        score,
        breakdown: breakdown.phases(),
        ranking_points: breakdown.rp,
    })
}

/// Official results keyed by match id, plus the qualification schedule.
#[derive(Clone, Debug, Default)]
pub struct EventResults {
    pub results: HashMap<String, MatchResult>,
    /// Qualification matches only, in match order.
    pub schedule: Vec<ScheduledMatch>,
}

impl EventResults {
    /// Red maps to side A and blue to side B. A side that hasn't been played
    /// yet has no result.
    pub fn from_api(matches: &[TbaMatch]) -> Self {
        let results = matches
            .iter()
            .map(|m| {
                let breakdown = m.score_breakdown.as_ref();
                let result = MatchResult {
                    match_id: m.key.clone(),
                    a: side_result(&m.alliances.red, breakdown.and_then(|b| b.red.as_ref())),
                    b: side_result(&m.alliances.blue, breakdown.and_then(|b| b.blue.as_ref())),
                };
                (m.key.clone(), result)
            })
            .collect();

        let mut quals: Vec<&TbaMatch> = matches.iter().filter(|m| m.comp_level == "qm").collect();
        quals.sort_by_key(|m| m.match_number);
        let schedule = quals
            .into_iter()
            .map(|m| ScheduledMatch {
                match_id: m.key.clone(),
                a: m.alliances.red.team_keys.clone(),
                b: m.alliances.blue.team_keys.clone(),
            })
            .collect();

        Self { results, schedule }
    }
}

/// Fetches every match of an event from The Blue Alliance.
pub fn fetch_event_matches(
    client: &Client,
    event_key: &str,
    api_key: &str,
) -> Result<Vec<TbaMatch>, ScoutError> {
    let url = format!("{}/event/{}/matches", TBA_BASE_URL, event_key);
    tracing::info!("Fetching {}", url);
    let matches: Vec<TbaMatch> = client
        .get(&url)
        .header("X-TBA-Auth-Key", api_key)
        .send()?
        .error_for_status()?
        .json()?;
    tracing::info!("Fetched {} matches of {}", matches.len(), event_key);
    Ok(matches)
}

/// Reads an event's matches from `cache_file` if present. Otherwise fetches
/// them and writes the cache.
pub fn cached_event_matches(
    client: &Client,
    event_key: &str,
    api_key: &str,
    cache_file: impl AsRef<Path>,
) -> Result<Vec<TbaMatch>, ScoutError> {
    let cache_file = cache_file.as_ref();
    if cache_file.exists() {
        let matches: Vec<TbaMatch> = super::read_json(cache_file)?;
        tracing::info!("Read {} cached matches from {:?}", matches.len(), cache_file);
        return Ok(matches);
    }
    let matches = fetch_event_matches(client, event_key, api_key)?;
    super::write_json(&matches, cache_file)?;
    tracing::info!("Matches of {} successfully cached at {:?}", event_key, cache_file);
    Ok(matches)
}
