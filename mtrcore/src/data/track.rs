use serde::{Deserialize, Serialize};

use crate::algorithm::resolve::CrossedElements;
use crate::data::hit_pattern::HitPattern;
use crate::error::Result;

/// strip offset subtracted from the deviation before converting it into boards
const DEVIATION_OFFSET: i32 = 15;
/// strips per local board in the bending direction
const STRIPS_PER_BOARD: i32 = 32;

/// Trigger-related content of a reconstructed muon track
#[derive(Serialize, Deserialize, Debug, Clone, Default, PartialEq)]
pub struct MuonTrack {
    pub hit_pattern: HitPattern,
    /// local board crossed on the first station, 0 if none
    #[serde(default)]
    pub lo_circuit: u32,
    #[serde(default)]
    pub lo_dev: i32,
    #[serde(default)]
    pub lo_strip_x: i32,
    #[serde(default)]
    pub contains_trigger: bool,
    #[serde(default)]
    pub contains_tracker: bool,
}

impl MuonTrack {
    pub fn new(hit_pattern: HitPattern, lo_circuit: u32) -> Self {
        MuonTrack {
            hit_pattern,
            lo_circuit,
            lo_dev: 0,
            lo_strip_x: 0,
            contains_trigger: true,
            contains_tracker: true,
        }
    }

    /// which elements the track crossed, decoded from the hit pattern
    pub fn crossed_elements(&self) -> Result<CrossedElements> {
        CrossedElements::from_flag(self.hit_pattern.eff_flag())
    }

    /// true if the track matches trigger and tracker and carries usable efficiency information
    pub fn is_eligible(&self) -> bool {
        self.contains_trigger
            && self.contains_tracker
            && !matches!(self.crossed_elements(), Ok(CrossedElements::NoEfficiencyData))
    }

    /// deviation between the two trigger stations, in local boards
    pub fn board_deviation(&self) -> i32 {
        (self.lo_dev + self.lo_strip_x - DEVIATION_OFFSET) / STRIPS_PER_BOARD
    }

    /// local board crossed on the second station
    pub fn second_station_board(&self) -> i64 {
        self.lo_circuit as i64 + self.board_deviation() as i64
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_board_deviation_truncates_toward_zero() {
        let mut track = MuonTrack::new(HitPattern::default(), 100);

        track.lo_dev = 0;
        track.lo_strip_x = 15;
        assert_eq!(track.board_deviation(), 0);

        track.lo_strip_x = 47;
        assert_eq!(track.board_deviation(), 1);

        track.lo_dev = -30;
        track.lo_strip_x = 0;
        assert_eq!(track.board_deviation(), -1);

        track.lo_dev = -10;
        assert_eq!(track.board_deviation(), 0);
        assert_eq!(track.second_station_board(), 100);
    }

    #[test]
    fn test_eligibility() {
        let mut track = MuonTrack::new(HitPattern::default().with_eff_info(3, 0), 12);
        assert!(track.is_eligible());

        track.contains_tracker = false;
        assert!(!track.is_eligible());

        let no_eff = MuonTrack::new(HitPattern::default(), 12);
        assert!(!no_eff.is_eligible());
    }

    #[test]
    fn test_deserialize_with_defaults() {
        let track: MuonTrack = serde_json::from_str(r#"{"hit_pattern": 1023, "lo_circuit": 5}"#).unwrap();
        assert_eq!(track.hit_pattern.raw(), 1023);
        assert_eq!(track.lo_circuit, 5);
        assert!(!track.contains_trigger);
    }
}
