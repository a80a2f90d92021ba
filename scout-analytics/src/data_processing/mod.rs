mod records_csv;
mod tba_api;

pub use records_csv::{read_records, read_records_csv};
pub use tba_api::{EventResults, TbaMatch, cached_event_matches, fetch_event_matches};

use crate::error::ScoutError;
use serde::{Serialize, de::DeserializeOwned};
use std::path::Path;

fn write_to_json<T: Serialize + ?Sized>(
    value: &T,
    path: impl AsRef<Path>,
) -> Result<(), ScoutError> {
    let cached_json = serde_json::to_string_pretty(&value)?;
    std::fs::write(path.as_ref(), cached_json)?;
    Ok(())
}

fn write_to_csv<T: Serialize>(values: &[T], path: impl AsRef<Path>) -> Result<(), ScoutError> {
    let file = std::fs::File::create(path.as_ref())?;
    let mut writer = csv::Writer::from_writer(file);
    values.iter().try_for_each(|val| writer.serialize(val))?;
    writer.flush()?;
    Ok(())
}

/// Writes `values` as JSON or CSV, chosen by the file extension.
/// Failures are logged rather than returned, so a report that can't be
/// saved doesn't discard the computation that produced it.
pub fn write_slice_to_file<T: Serialize>(values: &[T], path: impl AsRef<Path>) {
    let path = path.as_ref();
    let write_res = match path.extension().and_then(|s| s.to_str()) {
        Some("json") => write_to_json(values, path),
        Some("csv") => write_to_csv(values, path),
        _ => Err(ScoutError::Config(format!(
            "invalid or missing filename extension in {:?}",
            path
        ))),
    };
    match write_res {
        Ok(()) => tracing::info!("Successfully wrote to {:?}", path),
        Err(e) => tracing::error!("Failed write to {:?} because {}", path, e),
    };
}

pub fn read_json<T: DeserializeOwned>(path: impl AsRef<Path>) -> Result<T, ScoutError> {
    let contents = std::fs::read_to_string(path)?;
    Ok(serde_json::from_str(&contents)?)
}

pub fn write_json<T: Serialize + ?Sized>(
    value: &T,
    path: impl AsRef<Path>,
) -> Result<(), ScoutError> {
    write_to_json(value, path)
}
