use crate::error::ScoutError;
use crate::model::{
    PerformanceRecord, PhaseCounts, PhaseOneActions, PhaseTwoActions, QualityFlags, Side,
    TerminalState,
};
use serde::Deserialize;
use std::io::Read;
use std::path::Path;

/// One row of a scouting spreadsheet export. Every column is optional so that
/// a sparse or hand-edited sheet still loads.
#[derive(Deserialize, Default, Debug)]
#[serde(default)]
struct ScoutingRow {
    frc_team: Option<String>,
    driver_station: Option<String>,
    scouted_by: Option<String>,
    match_key: Option<String>,
    auto_coral_l1: Option<String>,
    auto_coral_l2: Option<String>,
    auto_coral_l3: Option<String>,
    auto_coral_l4: Option<String>,
    auto_algae_processor: Option<String>,
    auto_algae_barge: Option<String>,
    auto_moved: Option<String>,
    tele_coral_l1: Option<String>,
    tele_coral_l2: Option<String>,
    tele_coral_l3: Option<String>,
    tele_coral_l4: Option<String>,
    tele_algae_processor: Option<String>,
    tele_algae_barge: Option<String>,
    tele_endgame: Option<String>,
    other_notes: Option<String>,
    mech_failure: Option<String>,
    defender_rating: Option<String>,
}

/// Reads the leading whole number of a cell; anything else counts as zero.
fn leading_count(cell: &Option<String>) -> Option<u32> {
    let cell = cell.as_deref()?.trim();
    let end = cell
        .find(|c: char| !c.is_ascii_digit())
        .unwrap_or(cell.len());
    cell[..end].parse().ok()
}

fn count(cell: &Option<String>) -> f64 {
    leading_count(cell).map_or(0., f64::from)
}

fn is_yes(cell: &Option<String>) -> bool {
    cell.as_deref().map(str::trim) == Some("Yes")
}

impl ScoutingRow {
    fn into_record(self) -> Option<PerformanceRecord> {
        let team = leading_count(&self.frc_team)?;
        let side = match self.driver_station.as_deref() {
            Some(station) if station.trim().starts_with("red") => Side::A,
            _ => Side::B,
        };
        let phase_one = PhaseOneActions {
            counts: PhaseCounts {
                primary: [
                    count(&self.auto_coral_l1),
                    count(&self.auto_coral_l2),
                    count(&self.auto_coral_l3),
                    count(&self.auto_coral_l4),
                ],
                secondary: [
                    count(&self.auto_algae_processor),
                    count(&self.auto_algae_barge),
                ],
            },
            moved: is_yes(&self.auto_moved),
        };
        let phase_two = PhaseTwoActions {
            counts: PhaseCounts {
                primary: [
                    count(&self.tele_coral_l1),
                    count(&self.tele_coral_l2),
                    count(&self.tele_coral_l3),
                    count(&self.tele_coral_l4),
                ],
                secondary: [
                    count(&self.tele_algae_processor),
                    count(&self.tele_algae_barge),
                ],
            },
            terminal: TerminalState::from_label(
                self.tele_endgame.as_deref().unwrap_or_default(),
            ),
        };
        let quality = QualityFlags {
            defect: is_yes(&self.mech_failure),
            interference_rating: leading_count(&self.defender_rating)
                .filter(|&r| r > 0)
                .map(|r| r.min(u8::MAX as u32) as u8),
        };
        Some(PerformanceRecord {
            observer_id: self.scouted_by.unwrap_or_default().trim().to_owned(),
            match_id: self.match_key.unwrap_or_default().trim().to_owned(),
            subject_id: format!("frc{}", team),
            side,
            phase_one,
            phase_two,
            notes: self.other_notes.unwrap_or_default().trim().to_owned(),
            quality,
        })
    }
}

/// Parses scouting records from CSV with a header row. Rows without a numeric
/// team are dropped. Records come back ordered by match number, keeping the
/// file order within a match.
pub fn read_records(reader: impl Read) -> Result<Vec<PerformanceRecord>, ScoutError> {
    let mut csv_reader = csv::ReaderBuilder::new()
        .trim(csv::Trim::Headers)
        .flexible(true)
        .from_reader(reader);
    let mut records = vec![];
    let mut dropped = 0;
    for row in csv_reader.deserialize::<ScoutingRow>() {
        match row?.into_record() {
            Some(record) => records.push(record),
            None => dropped += 1,
        }
    }
    if dropped > 0 {
        tracing::warn!("Dropped {} scouting rows without a team number", dropped);
    }
    records.sort_by_key(PerformanceRecord::match_number);
    Ok(records)
}

pub fn read_records_csv(path: impl AsRef<Path>) -> Result<Vec<PerformanceRecord>, ScoutError> {
    let path = path.as_ref();
    let file = std::fs::File::open(path)?;
    let records = read_records(file)?;
    tracing::info!("Read {} scouting records from {:?}", records.len(), path);
    Ok(records)
}
