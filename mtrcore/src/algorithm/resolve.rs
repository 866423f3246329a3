use std::fmt;

use serde::{Deserialize, Serialize};

use crate::chamber::constants::{det_elem_id, is_valid_board, N_TRIGGER_CHAMBERS};
use crate::efficiency::averaging::AveragedEfficiencies;
use crate::efficiency::table::{EfficiencySource, Plane};
use crate::data::track::MuonTrack;
use crate::error::{Error, Result};

/// Which detector elements a track crossed on the four chambers.
///
/// Determines which level of the efficiency table describes the track.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum CrossedElements {
    /// not usable for efficiency studies
    NoEfficiencyData = 0,
    /// crosses different RPCs, use chamber averages
    PerChamber = 1,
    /// stays on one RPC, use RPC averages
    PerRpc = 2,
    /// stays on one local board, use the board efficiencies
    PerBoard = 3,
}

impl CrossedElements {
    pub const ALL: [CrossedElements; 4] = [
        CrossedElements::NoEfficiencyData,
        CrossedElements::PerChamber,
        CrossedElements::PerRpc,
        CrossedElements::PerBoard,
    ];

    /// decode an efficiency flag, `Error::InvalidCategory` for anything but 0 to 3
    pub fn from_flag(flag: u16) -> Result<Self> {
        match flag {
            0 => Ok(CrossedElements::NoEfficiencyData),
            1 => Ok(CrossedElements::PerChamber),
            2 => Ok(CrossedElements::PerRpc),
            3 => Ok(CrossedElements::PerBoard),
            other => Err(Error::InvalidCategory(other)),
        }
    }

    pub fn flag(self) -> u16 {
        self as u16
    }

    pub fn label(self) -> &'static str {
        match self {
            CrossedElements::NoEfficiencyData => "not good",
            CrossedElements::PerChamber => "diff RPCs",
            CrossedElements::PerRpc => "same RPC",
            CrossedElements::PerBoard => "same board",
        }
    }
}

impl TryFrom<u16> for CrossedElements {
    type Error = Error;

    fn try_from(flag: u16) -> Result<Self> {
        CrossedElements::from_flag(flag)
    }
}

impl fmt::Display for CrossedElements {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.label())
    }
}

/// How the averaged (chamber and RPC) efficiencies are assigned to the planes.
///
/// Published efficiency-corrected samples were produced with the non-bending averages in
/// the bending coincidence and vice versa, while per-board values were used as labelled.
/// It is not settled whether the swap is intended, so both readings are available.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PlaneConvention {
    /// averages used with the plane they were computed for
    AsRecorded,
    /// bending and non-bending averages exchanged
    #[default]
    SwapAveraged,
}

/// Per-chamber efficiencies of both projections, chamber 0 first
#[derive(Clone, Copy, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct PlaneEfficiencies {
    pub bending: [f64; N_TRIGGER_CHAMBERS],
    pub non_bending: [f64; N_TRIGGER_CHAMBERS],
}

impl PlaneEfficiencies {
    pub fn zeros() -> Self {
        PlaneEfficiencies::default()
    }

    fn swapped(self) -> Self {
        PlaneEfficiencies { bending: self.non_bending, non_bending: self.bending }
    }
}

/// select the four bending and four non-bending efficiencies that describe a track
///
/// Arguments:
///
/// * `category` - which elements the track crossed
/// * `source` - per-board efficiency table
/// * `averages` - chamber and RPC averages of the same table
/// * `track` - the track, for its local board and RPC index
/// * `convention` - plane assignment of the averaged efficiencies
///
/// Returns:
///
/// * `Result<PlaneEfficiencies>` - zeros for `NoEfficiencyData`; `Error::InvalidRpc` if the
///   RPC index of the hit pattern is unknown, `Error::InvalidBoard` if the local board is
///   not in 1..=234, `Error::MissingEfficiencyData` if a needed value is absent
///
/// # Examples
///
/// ```
/// use mtrcore::algorithm::resolve::{resolve_per_element_efficiencies, CrossedElements, PlaneConvention};
/// use mtrcore::chamber::rpc::RpcPartition;
/// use mtrcore::data::hit_pattern::HitPattern;
/// use mtrcore::data::track::MuonTrack;
/// use mtrcore::efficiency::averaging::AveragedEfficiencies;
/// use mtrcore::efficiency::table::EfficiencyTable;
///
/// let table = EfficiencyTable::uniform(0.75, 0.5);
/// let averages = AveragedEfficiencies::from_table(&table, &RpcPartition::standard());
/// let track = MuonTrack::new(HitPattern::default().with_eff_info(3, 0), 42);
///
/// let effs = resolve_per_element_efficiencies(
///     CrossedElements::PerBoard, &table, &averages, &track, PlaneConvention::AsRecorded,
/// ).unwrap();
/// assert_eq!(effs.bending, [0.75; 4]);
/// assert_eq!(effs.non_bending, [0.5; 4]);
/// ```
pub fn resolve_per_element_efficiencies<S: EfficiencySource + ?Sized>(
    category: CrossedElements,
    source: &S,
    averages: &AveragedEfficiencies,
    track: &MuonTrack,
    convention: PlaneConvention,
) -> Result<PlaneEfficiencies> {
    let effs = match category {
        CrossedElements::NoEfficiencyData => return Ok(PlaneEfficiencies::zeros()),

        CrossedElements::PerChamber => {
            let bending = averages.chamber_efficiencies(Plane::Bending)
                .ok_or_else(|| missing_average(averages, None, Plane::Bending))?;
            let non_bending = averages.chamber_efficiencies(Plane::NonBending)
                .ok_or_else(|| missing_average(averages, None, Plane::NonBending))?;
            apply_convention(PlaneEfficiencies { bending, non_bending }, convention)
        }

        CrossedElements::PerRpc => {
            let rpc = track.hit_pattern.slat_or_info();
            if rpc as usize >= averages.n_rpc() {
                return Err(Error::InvalidRpc(rpc));
            }
            let bending = averages.rpc_efficiencies(rpc as usize, Plane::Bending)
                .ok_or_else(|| missing_average(averages, Some(rpc as usize), Plane::Bending))?;
            let non_bending = averages.rpc_efficiencies(rpc as usize, Plane::NonBending)
                .ok_or_else(|| missing_average(averages, Some(rpc as usize), Plane::NonBending))?;
            apply_convention(PlaneEfficiencies { bending, non_bending }, convention)
        }

        CrossedElements::PerBoard => {
            let board = track.lo_circuit;
            if !is_valid_board(board) {
                return Err(Error::InvalidBoard(board));
            }
            let mut effs = PlaneEfficiencies::zeros();
            for ch in 0..N_TRIGGER_CHAMBERS {
                let det = det_elem_id(ch);
                effs.bending[ch] = source.require_cell_efficiency(det, board, Plane::Bending)?;
                effs.non_bending[ch] = source.require_cell_efficiency(det, board, Plane::NonBending)?;
            }
            effs
        }
    };

    Ok(effs)
}

fn apply_convention(effs: PlaneEfficiencies, convention: PlaneConvention) -> PlaneEfficiencies {
    match convention {
        PlaneConvention::AsRecorded => effs,
        PlaneConvention::SwapAveraged => effs.swapped(),
    }
}

// averages are only absent when a chamber (or one of its planes) is missing from the table
fn missing_average(averages: &AveragedEfficiencies, rpc: Option<usize>, plane: Plane) -> Error {
    let chamber = (0..N_TRIGGER_CHAMBERS)
        .find(|&ch| match rpc {
            Some(rpc) => averages.rpc(rpc, ch).is_none(),
            None => averages.chamber(ch).is_none(),
        })
        .unwrap_or(0);
    Error::MissingEfficiencyData { det_elem_id: det_elem_id(chamber), board: 0, plane: plane.name() }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::chamber::rpc::RpcPartition;
    use crate::data::hit_pattern::HitPattern;
    use crate::efficiency::table::EfficiencyTable;

    fn board_table() -> EfficiencyTable {
        let mut table = EfficiencyTable::new();
        for ch in 0..N_TRIGGER_CHAMBERS {
            let bend: Vec<f64> = (1..=234).map(|b| 0.5 + (b % 10) as f64 * 0.05 - ch as f64 * 0.01).collect();
            let non_bend: Vec<f64> = (1..=234).map(|b| 0.4 + (b % 7) as f64 * 0.05 + ch as f64 * 0.02).collect();
            table.set_plane(det_elem_id(ch), Plane::Bending, bend).unwrap();
            table.set_plane(det_elem_id(ch), Plane::NonBending, non_bend).unwrap();
        }
        table
    }

    fn track(flag: u16, slat: u16, board: u32) -> MuonTrack {
        MuonTrack::new(HitPattern::default().with_eff_info(flag, slat), board)
    }

    #[test]
    fn test_from_flag() {
        for category in CrossedElements::ALL {
            assert_eq!(CrossedElements::from_flag(category.flag()), Ok(category));
        }
        assert_eq!(CrossedElements::from_flag(4), Err(Error::InvalidCategory(4)));
        assert_eq!(CrossedElements::try_from(7u16), Err(Error::InvalidCategory(7)));
    }

    #[test]
    fn test_no_data_gives_zeros() {
        let table = board_table();
        let averages = AveragedEfficiencies::from_table(&table, &RpcPartition::standard());
        let effs = resolve_per_element_efficiencies(
            CrossedElements::NoEfficiencyData, &table, &averages, &track(0, 0, 5), PlaneConvention::AsRecorded,
        ).unwrap();
        assert_eq!(effs, PlaneEfficiencies::zeros());
    }

    #[test]
    fn test_per_board_matches_direct_lookup() {
        let table = board_table();
        let averages = AveragedEfficiencies::from_table(&table, &RpcPartition::standard());

        for board in [1u32, 17, 118, 234] {
            for convention in [PlaneConvention::AsRecorded, PlaneConvention::SwapAveraged] {
                let effs = resolve_per_element_efficiencies(
                    CrossedElements::PerBoard, &table, &averages, &track(3, 0, board), convention,
                ).unwrap();
                for ch in 0..N_TRIGGER_CHAMBERS {
                    let det = det_elem_id(ch);
                    assert_eq!(effs.bending[ch], table.cell_efficiency(det, board, Plane::Bending).unwrap());
                    assert_eq!(effs.non_bending[ch], table.cell_efficiency(det, board, Plane::NonBending).unwrap());
                }
            }
        }
    }

    #[test]
    fn test_per_rpc_uses_rpc_of_hit_pattern() {
        let table = board_table();
        let averages = AveragedEfficiencies::from_table(&table, &RpcPartition::standard());

        let effs = resolve_per_element_efficiencies(
            CrossedElements::PerRpc, &table, &averages, &track(2, 9, 0), PlaneConvention::AsRecorded,
        ).unwrap();
        assert_eq!(effs.bending, averages.rpc_efficiencies(9, Plane::Bending).unwrap());
        assert_eq!(effs.non_bending, averages.rpc_efficiencies(9, Plane::NonBending).unwrap());

        let swapped = resolve_per_element_efficiencies(
            CrossedElements::PerRpc, &table, &averages, &track(2, 9, 0), PlaneConvention::SwapAveraged,
        ).unwrap();
        assert_eq!(swapped.bending, effs.non_bending);
        assert_eq!(swapped.non_bending, effs.bending);
    }

    #[test]
    fn test_per_chamber_uses_chamber_averages() {
        let table = board_table();
        let averages = AveragedEfficiencies::from_table(&table, &RpcPartition::standard());

        let effs = resolve_per_element_efficiencies(
            CrossedElements::PerChamber, &table, &averages, &track(1, 0, 0), PlaneConvention::SwapAveraged,
        ).unwrap();
        assert_eq!(effs.bending, averages.chamber_efficiencies(Plane::NonBending).unwrap());
        assert_eq!(effs.non_bending, averages.chamber_efficiencies(Plane::Bending).unwrap());
    }

    #[test]
    fn test_invalid_rpc_and_board() {
        let table = board_table();
        let averages = AveragedEfficiencies::from_table(&table, &RpcPartition::standard());

        let rpc = resolve_per_element_efficiencies(
            CrossedElements::PerRpc, &table, &averages, &track(2, 25, 0), PlaneConvention::AsRecorded,
        );
        assert_eq!(rpc, Err(Error::InvalidRpc(25)));

        let board = resolve_per_element_efficiencies(
            CrossedElements::PerBoard, &table, &averages, &track(3, 0, 0), PlaneConvention::AsRecorded,
        );
        assert_eq!(board, Err(Error::InvalidBoard(0)));
    }

    #[test]
    fn test_missing_chamber_is_reported() {
        let mut table = EfficiencyTable::new();
        table.set_plane(1100, Plane::Bending, vec![0.9; 234]).unwrap();
        table.set_plane(1100, Plane::NonBending, vec![0.9; 234]).unwrap();
        let averages = AveragedEfficiencies::from_table(&table, &RpcPartition::standard());

        let result = resolve_per_element_efficiencies(
            CrossedElements::PerBoard, &table, &averages, &track(3, 0, 10), PlaneConvention::AsRecorded,
        );
        assert!(matches!(result, Err(Error::MissingEfficiencyData { det_elem_id: 1200, .. })));

        let result = resolve_per_element_efficiencies(
            CrossedElements::PerChamber, &table, &averages, &track(1, 0, 10), PlaneConvention::AsRecorded,
        );
        assert!(matches!(result, Err(Error::MissingEfficiencyData { .. })));
    }
}
