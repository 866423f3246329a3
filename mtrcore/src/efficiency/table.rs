use std::collections::BTreeMap;
use std::fmt;

use bincode::{Decode, Encode};
use serde::{Deserialize, Serialize};

use crate::chamber::constants::{det_elem_id, is_valid_board, N_LOCAL_BOARDS, N_TRIGGER_CHAMBERS};
use crate::error::{Error, Result};

/// Readout projection of a trigger chamber
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum Plane {
    Bending,
    NonBending,
    /// joint probability that both planes fire
    BothPlanes,
}

impl Plane {
    pub const ALL: [Plane; 3] = [Plane::Bending, Plane::NonBending, Plane::BothPlanes];

    /// map a cathode number of the efficiency files to a plane
    ///
    /// Cathode 2 always holds the joint efficiency. Which of 0 and 1 is the bending
    /// plane is not consistent across efficiency sources, so it is passed explicitly.
    ///
    /// Arguments:
    ///
    /// * `cathode` - cathode number as written in the efficiency source
    /// * `bending_cathode` - cathode number (0 or 1) that denotes the bending plane
    ///
    /// Returns:
    ///
    /// * `Option<Plane>` - None for unknown cathodes
    pub fn from_cathode(cathode: u8, bending_cathode: u8) -> Option<Plane> {
        match cathode {
            2 => Some(Plane::BothPlanes),
            0 | 1 if bending_cathode > 1 => None,
            c if c == bending_cathode => Some(Plane::Bending),
            0 | 1 => Some(Plane::NonBending),
            _ => None,
        }
    }

    /// inverse of `from_cathode`
    pub fn cathode(self, bending_cathode: u8) -> u8 {
        match self {
            Plane::Bending => bending_cathode,
            Plane::NonBending => 1 - bending_cathode.min(1),
            Plane::BothPlanes => 2,
        }
    }

    pub fn name(self) -> &'static str {
        match self {
            Plane::Bending => "bendPlane",
            Plane::NonBending => "nonBendPlane",
            Plane::BothPlanes => "bothPlanes",
        }
    }
}

impl fmt::Display for Plane {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.name())
    }
}

/// What to do with efficiencies outside [0, 1] when a table is built
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ValueCheck {
    /// fail with `Error::InvalidEfficiencyValue`
    #[default]
    Reject,
    /// clamp into [0, 1], NaN becomes 0
    Clamp,
}

/// Anything that can answer "efficiency of this cell" queries
pub trait EfficiencySource {
    /// efficiency of a (detElemId, local board, plane) cell, None if the source has no data for it
    fn cell_efficiency(&self, det_elem_id: u32, board: u32, plane: Plane) -> Option<f64>;

    /// like `cell_efficiency`, but missing data is an error
    fn require_cell_efficiency(&self, det_elem_id: u32, board: u32, plane: Plane) -> Result<f64> {
        self.cell_efficiency(det_elem_id, board, plane)
            .ok_or(Error::MissingEfficiencyData { det_elem_id, board, plane: plane.name() })
    }
}

/// Per-board efficiencies of one detection element, index 0 is board 1
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize, Encode, Decode)]
pub struct ChamberCells {
    pub bending: Option<Vec<f64>>,
    pub non_bending: Option<Vec<f64>>,
    pub both_planes: Option<Vec<f64>>,
}

impl ChamberCells {
    pub fn plane(&self, plane: Plane) -> Option<&Vec<f64>> {
        match plane {
            Plane::Bending => self.bending.as_ref(),
            Plane::NonBending => self.non_bending.as_ref(),
            Plane::BothPlanes => self.both_planes.as_ref(),
        }
    }

    fn plane_mut(&mut self, plane: Plane) -> &mut Option<Vec<f64>> {
        match plane {
            Plane::Bending => &mut self.bending,
            Plane::NonBending => &mut self.non_bending,
            Plane::BothPlanes => &mut self.both_planes,
        }
    }
}

/// Trigger efficiency per detection element, local board and plane.
///
/// Built once from an external source, then only queried.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize, Encode, Decode)]
pub struct EfficiencyTable {
    chambers: BTreeMap<u32, ChamberCells>,
}

impl EfficiencyTable {
    pub fn new() -> Self {
        EfficiencyTable { chambers: BTreeMap::new() }
    }

    /// table where every board of the four chambers has the same efficiencies
    ///
    /// # Examples
    ///
    /// ```
    /// use mtrcore::efficiency::table::{EfficiencySource, EfficiencyTable, Plane};
    ///
    /// let table = EfficiencyTable::uniform(0.9, 0.8);
    /// assert_eq!(table.cell_efficiency(1300, 117, Plane::NonBending), Some(0.8));
    /// assert_eq!(table.cell_efficiency(1300, 235, Plane::Bending), None);
    /// ```
    pub fn uniform(bending: f64, non_bending: f64) -> Self {
        let mut table = EfficiencyTable::new();
        for ch in 0..N_TRIGGER_CHAMBERS {
            let cells = ChamberCells {
                bending: Some(vec![bending; N_LOCAL_BOARDS]),
                non_bending: Some(vec![non_bending; N_LOCAL_BOARDS]),
                both_planes: None,
            };
            table.chambers.insert(det_elem_id(ch), cells);
        }
        table
    }

    /// set all board efficiencies of one plane of a detection element
    ///
    /// Arguments:
    ///
    /// * `det_elem_id` - detection element id, e.g. 1100
    /// * `plane` - plane the values belong to
    /// * `values` - one efficiency per local board, board 1 first
    pub fn set_plane(&mut self, det_elem_id: u32, plane: Plane, values: Vec<f64>) -> Result<()> {
        if values.len() != N_LOCAL_BOARDS {
            return Err(Error::BoardCount { expected: N_LOCAL_BOARDS, found: values.len() });
        }
        *self.chambers.entry(det_elem_id).or_default().plane_mut(plane) = Some(values);
        Ok(())
    }

    /// set a single cell, creating the plane (filled with zeros) if needed
    pub fn set_cell(&mut self, det_elem_id: u32, board: u32, plane: Plane, value: f64) -> Result<()> {
        if !is_valid_board(board) {
            return Err(Error::InvalidBoard(board));
        }
        let values = self.chambers.entry(det_elem_id).or_default().plane_mut(plane)
            .get_or_insert_with(|| vec![0.0; N_LOCAL_BOARDS]);
        values[board as usize - 1] = value;
        Ok(())
    }

    pub fn chamber(&self, det_elem_id: u32) -> Option<&ChamberCells> {
        self.chambers.get(&det_elem_id)
    }

    pub fn contains(&self, det_elem_id: u32) -> bool {
        self.chambers.contains_key(&det_elem_id)
    }

    pub fn det_elem_ids(&self) -> impl Iterator<Item = u32> + '_ {
        self.chambers.keys().copied()
    }

    pub fn is_empty(&self) -> bool {
        self.chambers.is_empty()
    }

    /// apply the range policy to every stored value
    pub fn check_values(mut self, check: ValueCheck) -> Result<Self> {
        for (&det_elem_id, cells) in self.chambers.iter_mut() {
            for plane in Plane::ALL {
                let Some(values) = cells.plane_mut(plane).as_mut() else { continue };
                for (i, value) in values.iter_mut().enumerate() {
                    if (0.0..=1.0).contains(&*value) {
                        continue;
                    }
                    match check {
                        ValueCheck::Reject => {
                            return Err(Error::InvalidEfficiencyValue {
                                det_elem_id,
                                board: i as u32 + 1,
                                plane: plane.name(),
                                value: *value,
                            });
                        }
                        ValueCheck::Clamp => {
                            *value = if value.is_nan() { 0.0 } else { value.clamp(0.0, 1.0) };
                        }
                    }
                }
            }
        }
        Ok(self)
    }

    /// true if every chamber has bending and non-bending values and they are all equal
    ///
    /// Some efficiency sources were observed to carry identical values on both planes,
    /// which usually points at a cathode mix-up upstream.
    pub fn planes_identical(&self) -> bool {
        !self.chambers.is_empty()
            && self.chambers.values().all(|cells| match (&cells.bending, &cells.non_bending) {
                (Some(b), Some(n)) => b == n,
                _ => false,
            })
    }
}

impl EfficiencySource for EfficiencyTable {
    fn cell_efficiency(&self, det_elem_id: u32, board: u32, plane: Plane) -> Option<f64> {
        if !is_valid_board(board) {
            return None;
        }
        self.chambers.get(&det_elem_id)?
            .plane(plane)?
            .get(board as usize - 1)
            .copied()
    }
}
