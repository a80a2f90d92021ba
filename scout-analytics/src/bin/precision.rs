use scout_analytics::config::AnalysisConfig;
use scout_analytics::data_processing::write_slice_to_file;
use scout_analytics::engines::compute_precision;
use scout_analytics::engines::precision::phase_error_summary;

/// Ranks the scouts of an event by how well their reports add up to official scores
fn main() {
    tracing_subscriber::fmt::init();

    let args: Vec<String> = std::env::args().collect();
    if args.len() != 2 {
        tracing::error!("Usage: {} config_file", args[0]);
        return;
    }
    let config = AnalysisConfig::from_file(&args[1]).expect("Failed to load config");
    let event = config.event_results().expect("Failed to load match results");
    let records = config.read_records().expect("Failed to read scouting records");

    let stats = compute_precision(
        &config.rules,
        &config.precision_params(),
        &records,
        &event.results,
        &event.schedule,
    );
    for stat in &stats {
        tracing::info!(
            "{:16} error {:6.2} bias {:+6.2} over {} combinations",
            stat.observer_id,
            stat.precision,
            stat.bias,
            stat.combinations
        );
    }
    let summary = phase_error_summary(&stats);
    tracing::info!("Mean error by phase: {:?}", summary);

    let dir = &config.output_dir;
    std::fs::create_dir_all(dir).expect("Could not create directory");
    write_slice_to_file(&stats, dir.join(format!("{}-precision.csv", config.event_key)));
}
