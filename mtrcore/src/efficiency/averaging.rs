use itertools::izip;
use serde::{Deserialize, Serialize};

use crate::chamber::constants::{det_elem_id, N_LOCAL_BOARDS, N_TRIGGER_CHAMBERS};
use crate::chamber::rpc::RpcPartition;
use crate::efficiency::table::{EfficiencySource, Plane};

/// Bending and non-bending efficiency of one chamber, averaged over a set of boards
#[derive(Clone, Copy, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct PlaneAverage {
    pub bending: f64,
    pub non_bending: f64,
}

impl PlaneAverage {
    pub fn get(&self, plane: Plane) -> Option<f64> {
        match plane {
            Plane::Bending => Some(self.bending),
            Plane::NonBending => Some(self.non_bending),
            Plane::BothPlanes => None,
        }
    }
}

/// Chamber- and RPC-level averages of a per-board efficiency table.
///
/// Computed once when the table is loaded; a chamber missing from the table (or
/// with a missing plane) has no average.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct AveragedEfficiencies {
    chamber: [Option<PlaneAverage>; N_TRIGGER_CHAMBERS],
    // one entry per RPC
    rpc: Vec<[Option<PlaneAverage>; N_TRIGGER_CHAMBERS]>,
}

impl AveragedEfficiencies {
    /// average a table over all boards of each chamber and over the boards of each RPC
    ///
    /// Arguments:
    ///
    /// * `source` - per-board efficiencies
    /// * `partition` - local board to RPC partition
    ///
    /// Returns:
    ///
    /// * `AveragedEfficiencies` - chamber and RPC averages
    ///
    /// # Examples
    ///
    /// ```
    /// use mtrcore::chamber::rpc::RpcPartition;
    /// use mtrcore::efficiency::averaging::AveragedEfficiencies;
    /// use mtrcore::efficiency::table::{EfficiencyTable, Plane};
    ///
    /// let table = EfficiencyTable::uniform(0.75, 0.5);
    /// let averages = AveragedEfficiencies::from_table(&table, &RpcPartition::standard());
    /// assert_eq!(averages.chamber_efficiencies(Plane::Bending), Some([0.75; 4]));
    /// assert_eq!(averages.rpc_efficiencies(17, Plane::NonBending), Some([0.5; 4]));
    /// ```
    pub fn from_table<S: EfficiencySource + ?Sized>(source: &S, partition: &RpcPartition) -> Self {
        let all_boards: Vec<u32> = (1..=N_LOCAL_BOARDS as u32).collect();

        let mut chamber = [None; N_TRIGGER_CHAMBERS];
        for (ch, slot) in chamber.iter_mut().enumerate() {
            *slot = average_over(source, det_elem_id(ch), &all_boards);
        }

        let rpc = partition.groups().iter()
            .map(|boards| {
                let mut per_chamber = [None; N_TRIGGER_CHAMBERS];
                for (ch, slot) in per_chamber.iter_mut().enumerate() {
                    *slot = average_over(source, det_elem_id(ch), boards);
                }
                per_chamber
            })
            .collect();

        AveragedEfficiencies { chamber, rpc }
    }

    pub fn n_rpc(&self) -> usize {
        self.rpc.len()
    }

    pub fn chamber(&self, chamber: usize) -> Option<PlaneAverage> {
        self.chamber.get(chamber).copied().flatten()
    }

    pub fn rpc(&self, rpc: usize, chamber: usize) -> Option<PlaneAverage> {
        self.rpc.get(rpc)?.get(chamber).copied().flatten()
    }

    /// chamber-averaged efficiencies of one plane, None if any chamber has no average
    pub fn chamber_efficiencies(&self, plane: Plane) -> Option<[f64; N_TRIGGER_CHAMBERS]> {
        collect_plane(&self.chamber, plane)
    }

    /// RPC-averaged efficiencies of one plane, None for unknown RPCs or missing chambers
    pub fn rpc_efficiencies(&self, rpc: usize, plane: Plane) -> Option<[f64; N_TRIGGER_CHAMBERS]> {
        collect_plane(self.rpc.get(rpc)?, plane)
    }
}

fn collect_plane(
    averages: &[Option<PlaneAverage>; N_TRIGGER_CHAMBERS],
    plane: Plane,
) -> Option<[f64; N_TRIGGER_CHAMBERS]> {
    let mut out = [0.0; N_TRIGGER_CHAMBERS];
    for (slot, average) in izip!(out.iter_mut(), averages.iter()) {
        *slot = average.as_ref()?.get(plane)?;
    }
    Some(out)
}

fn average_over<S: EfficiencySource + ?Sized>(source: &S, det_elem_id: u32, boards: &[u32]) -> Option<PlaneAverage> {
    if boards.is_empty() {
        return None;
    }

    let mut bending = 0.0;
    let mut non_bending = 0.0;
    for &board in boards {
        bending += source.cell_efficiency(det_elem_id, board, Plane::Bending)?;
        non_bending += source.cell_efficiency(det_elem_id, board, Plane::NonBending)?;
    }

    let n = boards.len() as f64;
    Some(PlaneAverage { bending: bending / n, non_bending: non_bending / n })
}
