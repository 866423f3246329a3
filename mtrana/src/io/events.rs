use std::fs::File;
use std::io::{BufReader, BufWriter, Write};
use std::path::Path;

use serde::{Deserialize, Serialize};

use mtrcore::data::track::MuonTrack;

use crate::error::Result;

/// Muon tracks of one event together with where the event came from
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Event {
    #[serde(default)]
    pub file_name: String,
    #[serde(default)]
    pub event_number: u64,
    pub tracks: Vec<MuonTrack>,
}

impl Event {
    pub fn new(file_name: impl Into<String>, event_number: u64, tracks: Vec<MuonTrack>) -> Self {
        Event { file_name: file_name.into(), event_number, tracks }
    }
}

// --- JSON (human-readable) ---
pub fn load_events<P: AsRef<Path>>(path: P) -> Result<Vec<Event>> {
    let f = BufReader::new(File::open(path)?);
    Ok(serde_json::from_reader(f)?)
}

pub fn save_events<P: AsRef<Path>>(path: P, events: &[Event]) -> Result<()> {
    let mut f = BufWriter::new(File::create(path)?);
    serde_json::to_writer_pretty(&mut f, events)?;
    f.flush()?;
    Ok(())
}
