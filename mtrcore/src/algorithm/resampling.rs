use rand::Rng;
use tracing::debug;

use crate::algorithm::combinatorics::is_coincidence;
use crate::algorithm::decision::TrackDecision;
use crate::algorithm::resolve::CrossedElements;
use crate::chamber::constants::{det_elem_id, is_valid_board, N_TRIGGER_CHAMBERS};
use crate::data::hit_pattern::{BENDING_CATHODE, NON_BENDING_CATHODE};
use crate::data::track::MuonTrack;
use crate::efficiency::table::{EfficiencySource, Plane};
use crate::error::{Error, Result};

/// chambers read out through the board of the first station
const FIRST_STATION_CHAMBERS: usize = 2;

/// efficiencies of one chamber at the board a track crossed
#[derive(Clone, Copy, Debug, PartialEq)]
struct CellEfficiencies {
    bending: f64,
    non_bending: f64,
    /// joint probability, 0 when the source has none
    both: f64,
}

/// fired flags of one chamber after resampling
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
struct Fired {
    bending: bool,
    non_bending: bool,
}

/// resample the response of every chamber the track fired and apply the 3/4 condition
///
/// Every fired chamber is redrawn with the efficiency of the board it was crossed at.
/// When both planes fired, the second plane is drawn conditionally on the first, using
/// the joint efficiency if the source provides one. Chambers with no hit stay unfired
/// and consume no draw.
///
/// Arguments:
///
/// * `track` - the track to resample, its board fields select the cells
/// * `source` - per-board efficiency table
/// * `rng` - random source shared by the whole pass
///
/// Returns:
///
/// * `Result<TrackDecision>` - `Kept` if both projections still have 3 of 4 chambers,
///   `Excluded` if the track carries no efficiency information, has no board or the
///   table lacks the cells
pub fn keep_track_resampled<S, R>(track: &MuonTrack, source: &S, rng: &mut R) -> Result<TrackDecision>
where
    S: EfficiencySource + ?Sized,
    R: Rng + ?Sized,
{
    if track.crossed_elements()? == CrossedElements::NoEfficiencyData {
        return Ok(TrackDecision::Excluded);
    }

    let cells = match crossed_cells(track, source) {
        Ok(cells) => cells,
        Err(Error::MissingEfficiencyData { det_elem_id, board, plane }) => {
            debug!(det_elem_id, board, plane, "no efficiency data, track excluded");
            return Ok(TrackDecision::Excluded);
        }
        Err(Error::InvalidBoard(board)) => {
            debug!(board, "board outside the detector, track excluded");
            return Ok(TrackDecision::Excluded);
        }
        Err(e) => return Err(e),
    };

    let pattern = track.hit_pattern;
    let mut bending = [false; N_TRIGGER_CHAMBERS];
    let mut non_bending = [false; N_TRIGGER_CHAMBERS];

    for (ch, cell) in cells.iter().enumerate() {
        let fired = resample_chamber(
            cell,
            pattern.is_chamber_hit(BENDING_CATHODE, ch),
            pattern.is_chamber_hit(NON_BENDING_CATHODE, ch),
            rng,
        );
        bending[ch] = fired.bending;
        non_bending[ch] = fired.non_bending;
    }

    let kept = is_coincidence(&bending) && is_coincidence(&non_bending);
    debug!(lo_circuit = track.lo_circuit, ?bending, ?non_bending, kept, "track resampled");

    Ok(if kept { TrackDecision::Kept } else { TrackDecision::Rejected })
}

/// look up the cells of all four chambers, first station at `lo_circuit`, second at the deviated board
fn crossed_cells<S: EfficiencySource + ?Sized>(
    track: &MuonTrack,
    source: &S,
) -> Result<[CellEfficiencies; N_TRIGGER_CHAMBERS]> {
    if !is_valid_board(track.lo_circuit) {
        return Err(Error::InvalidBoard(track.lo_circuit));
    }
    let second = track.second_station_board();
    let second = u32::try_from(second)
        .ok()
        .filter(|&b| is_valid_board(b))
        .ok_or(Error::InvalidBoard(second.clamp(0, u32::MAX as i64) as u32))?;

    let mut cells = [CellEfficiencies { bending: 0.0, non_bending: 0.0, both: 0.0 }; N_TRIGGER_CHAMBERS];
    for (ch, cell) in cells.iter_mut().enumerate() {
        let board = if ch < FIRST_STATION_CHAMBERS { track.lo_circuit } else { second };
        let det = det_elem_id(ch);
        *cell = CellEfficiencies {
            bending: source.require_cell_efficiency(det, board, Plane::Bending)?,
            non_bending: source.require_cell_efficiency(det, board, Plane::NonBending)?,
            both: source.cell_efficiency(det, board, Plane::BothPlanes).unwrap_or(0.0),
        };
    }
    Ok(cells)
}

fn resample_chamber<R: Rng + ?Sized>(cell: &CellEfficiencies, hit_bending: bool, hit_non_bending: bool, rng: &mut R) -> Fired {
    let CellEfficiencies { bending: pb, non_bending: pn, both: pbn } = *cell;

    match (hit_bending, hit_non_bending) {
        (true, true) => {
            let bending = rng.gen::<f64>() < pb;
            let p_cond = if pbn > 0.0 {
                if bending { pbn / pb } else { (pn - pbn) / (1.0 - pb) }
            } else {
                pn
            };
            Fired { bending, non_bending: rng.gen::<f64>() < p_cond }
        }
        (true, false) => {
            let p_cond = if pbn > 0.0 && pn < 1.0 { (pb - pbn) / (1.0 - pn) } else { pb };
            Fired { bending: rng.gen::<f64>() < p_cond, non_bending: false }
        }
        (false, true) => {
            let p_cond = if pbn > 0.0 && pb < 1.0 { (pn - pbn) / (1.0 - pb) } else { pn };
            Fired { bending: false, non_bending: rng.gen::<f64>() < p_cond }
        }
        (false, false) => Fired::default(),
    }
}
