use scout_analytics::config::AnalysisConfig;
use scout_analytics::data_processing::{write_json, write_slice_to_file};
use scout_analytics::engines::{fuse_all, simulate};
use scout_analytics::profile::profiles;
use scout_analytics::standings::{current_points, histories_until, remaining_schedule};

/// Forecasts the final qualification standings of an event
fn main() {
    tracing_subscriber::fmt::init();

    let args: Vec<String> = std::env::args().collect();
    if args.len() != 2 {
        tracing::error!("Usage: {} config_file", args[0]);
        return;
    }
    let config = AnalysisConfig::from_file(&args[1]).expect("Failed to load config");
    let event = config.event_results().expect("Failed to load match results");
    let mut records = config.read_records().expect("Failed to read scouting records");
    if config.use_fusion {
        let models = config.read_noise_models().expect("Failed to read noise models");
        records = fuse_all(&records, &models).expect("Failed to fuse records");
    }

    let limit = config.match_limit;
    let histories = histories_until(&records, limit);
    let remaining = remaining_schedule(&event.schedule, &event.results, limit);
    let points = current_points(&config.rules, &event.results, &event.schedule, limit);
    tracing::info!(
        "{} subjects with history, {} matches left to play",
        histories.len(),
        remaining.len()
    );

    let forecasts = simulate(
        &config.rules,
        &config.simulation_params(),
        &histories,
        &remaining,
        &points,
        None,
    )
    .expect("Simulation failed");

    for (i, forecast) in forecasts.iter().take(10).enumerate() {
        tracing::info!(
            "{:2}. {:8} expected rank {:5.2}, mean RP {:6.2}, P(top 8) {:.3}",
            i + 1,
            forecast.subject_id,
            forecast.expected_rank,
            forecast.mean_points,
            (1..=8).map(|r| forecast.rank_probability(r)).sum::<f64>()
        );
    }

    let dir = &config.output_dir;
    std::fs::create_dir_all(dir).expect("Could not create directory");
    match write_json(&forecasts, dir.join(format!("{}-forecast.json", config.event_key))) {
        Ok(()) => tracing::info!("Wrote {} forecasts", forecasts.len()),
        Err(e) => tracing::error!("Failed to write forecasts: {}", e),
    }
    let recent: Vec<_> = records
        .iter()
        .filter(|r| limit.is_none_or(|l| r.match_number() <= l))
        .cloned()
        .collect();
    write_slice_to_file(
        &profiles(&config.rules, &recent),
        dir.join(format!("{}-profiles.csv", config.event_key)),
    );
}
