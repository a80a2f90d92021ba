use crate::data_processing::{
    EventResults, cached_event_matches, fetch_event_matches, read_json, read_records_csv,
};
use crate::engines::precision::PrecisionParams;
use crate::engines::simulation::SimulationParams;
use crate::error::ScoutError;
use crate::model::{ObserverNoiseModel, PerformanceRecord};
use crate::rules::GameRules;
use reqwest::blocking::Client;
use serde::Deserialize;
use std::collections::HashMap;
use std::path::{Path, PathBuf};

fn default_api_key_env() -> String {
    "TBA_API_KEY".to_owned()
}

fn default_trials() -> usize {
    10_000
}

fn default_output_dir() -> PathBuf {
    PathBuf::from("../data/output")
}

fn default_max_reports() -> usize {
    PrecisionParams::default().max_reports_per_subject
}

#[derive(Deserialize, Debug)]
pub struct AnalysisConfig {
    /// Event whose matches are fetched from the results source, e.g. `2025txwac`.
    pub event_key: String,
    /// CSV export of scouting records.
    pub records_path: PathBuf,
    /// JSON cache of the event's match results; fetched when absent.
    pub results_cache: Option<PathBuf>,
    /// Environment variable holding the results API key.
    #[serde(default = "default_api_key_env")]
    pub api_key_env: String,
    /// Pretend only matches numbered up to this one have been played.
    pub match_limit: Option<u32>,
    #[serde(default = "default_trials")]
    pub trials: usize,
    pub seed: Option<u64>,
    #[serde(default = "default_output_dir")]
    pub output_dir: PathBuf,
    #[serde(default = "default_max_reports")]
    pub max_reports_per_subject: usize,
    /// Fuse redundant records of the same performance before simulating.
    #[serde(default)]
    pub use_fusion: bool,
    /// JSON map from observer id to noise model, used by fusion.
    pub noise_models: Option<PathBuf>,
    #[serde(default)]
    pub rules: GameRules,
}

impl AnalysisConfig {
    pub fn from_file(source: impl AsRef<Path>) -> Result<Self, ScoutError> {
        let source = source.as_ref();
        let config_json = std::fs::read_to_string(source)?;
        let config = Self::from_json5(&config_json)?;
        tracing::info!("Loaded analysis config from {:?}", source);
        Ok(config)
    }

    pub fn from_json5(config_json: &str) -> Result<Self, ScoutError> {
        json5::from_str(config_json).map_err(|e| ScoutError::Config(e.to_string()))
    }

    pub fn simulation_params(&self) -> SimulationParams {
        SimulationParams {
            trials: self.trials,
            seed: self.seed,
            ..SimulationParams::default()
        }
    }

    pub fn precision_params(&self) -> PrecisionParams {
        PrecisionParams {
            max_reports_per_subject: self.max_reports_per_subject,
        }
    }

    pub fn read_records(&self) -> Result<Vec<PerformanceRecord>, ScoutError> {
        read_records_csv(&self.records_path)
    }

    /// Observers missing from the file, or every observer when no file is
    /// configured, fall back to the default noise model during fusion.
    pub fn read_noise_models(&self) -> Result<HashMap<String, ObserverNoiseModel>, ScoutError> {
        match &self.noise_models {
            Some(path) => read_json(path),
            None => Ok(HashMap::new()),
        }
    }

    /// Official results and schedule, from the cache when one is configured.
    pub fn event_results(&self) -> Result<EventResults, ScoutError> {
        let api_key = std::env::var(&self.api_key_env).unwrap_or_else(|_| {
            tracing::warn!("{} is not set; requests will be unauthorized", self.api_key_env);
            String::new()
        });
        let client = Client::new();
        let matches = match &self.results_cache {
            Some(cache) => cached_event_matches(&client, &self.event_key, &api_key, cache)?,
            None => fetch_event_matches(&client, &self.event_key, &api_key)?,
        };
        Ok(EventResults::from_api(&matches))
    }
}
