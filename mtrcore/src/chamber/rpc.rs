use serde::{Deserialize, Serialize};

use crate::chamber::constants::{is_valid_board, LO_RPC, N_LOCAL_BOARDS, N_LO_PER_RPC, N_RPC};
use crate::error::{Error, Result};

/// Static partition of the local boards into RPCs.
///
/// Every local board belongs to exactly one RPC; the same partition holds for all
/// four chambers.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct RpcPartition {
    groups: Vec<Vec<u32>>,
    // indexed by board number, entry 0 unused
    rpc_of_board: Vec<Option<usize>>,
}

impl RpcPartition {
    /// the partition of the ALICE muon trigger, built from `LO_RPC` and `N_LO_PER_RPC`
    ///
    /// # Examples
    ///
    /// ```
    /// use mtrcore::chamber::rpc::RpcPartition;
    ///
    /// let partition = RpcPartition::standard();
    /// assert_eq!(partition.n_rpc(), 18);
    /// assert_eq!(partition.rpc_of_board(26), Some(0));
    /// assert_eq!(partition.boards_of_rpc(4).map(|b| b.len()), Some(7));
    /// ```
    pub fn standard() -> Self {
        let mut groups = Vec::with_capacity(N_RPC);
        let mut start = 0;
        for &n in N_LO_PER_RPC.iter() {
            groups.push(LO_RPC[start..start + n].to_vec());
            start += n;
        }
        Self::index(groups)
    }

    /// build a partition from explicit board groups, one group per RPC
    ///
    /// Arguments:
    ///
    /// * `groups` - boards of each RPC, RPC index is the position in the vector
    ///
    /// Returns:
    ///
    /// * `Result<RpcPartition>` - the partition, boards sorted within each RPC, or
    ///   `Error::InvalidPartition` if the groups do not cover 1..=234 exactly once
    pub fn from_groups(mut groups: Vec<Vec<u32>>) -> Result<Self> {
        for group in groups.iter_mut() {
            group.sort_unstable();
        }
        let partition = Self::index(groups);
        partition.validate()?;
        Ok(partition)
    }

    fn index(groups: Vec<Vec<u32>>) -> Self {
        let mut rpc_of_board = vec![None; N_LOCAL_BOARDS + 1];
        for (rpc, group) in groups.iter().enumerate() {
            for &board in group {
                if is_valid_board(board) && rpc_of_board[board as usize].is_none() {
                    rpc_of_board[board as usize] = Some(rpc);
                }
            }
        }
        RpcPartition { groups, rpc_of_board }
    }

    /// check that there are 18 RPCs and that the boards form a permutation of 1..=234
    pub fn validate(&self) -> Result<()> {
        if self.groups.len() != N_RPC {
            return Err(Error::InvalidPartition(format!(
                "expected {} RPCs, found {}", N_RPC, self.groups.len()
            )));
        }

        let total: usize = self.groups.iter().map(|g| g.len()).sum();
        if total != N_LOCAL_BOARDS {
            return Err(Error::InvalidPartition(format!(
                "expected {} boards in total, found {}", N_LOCAL_BOARDS, total
            )));
        }

        let mut seen = vec![false; N_LOCAL_BOARDS + 1];
        for (rpc, group) in self.groups.iter().enumerate() {
            if group.is_empty() {
                return Err(Error::InvalidPartition(format!("RPC {} has no boards", rpc)));
            }
            for &board in group {
                if !is_valid_board(board) {
                    return Err(Error::InvalidPartition(format!(
                        "board {} on RPC {} is out of range", board, rpc
                    )));
                }
                if seen[board as usize] {
                    return Err(Error::InvalidPartition(format!("board {} assigned twice", board)));
                }
                seen[board as usize] = true;
            }
        }

        Ok(())
    }

    pub fn n_rpc(&self) -> usize {
        self.groups.len()
    }

    /// RPC index (0 to 17) of a local board, None for boards outside 1..=234
    pub fn rpc_of_board(&self, board: u32) -> Option<usize> {
        self.rpc_of_board.get(board as usize).copied().flatten()
    }

    /// local boards on an RPC
    pub fn boards_of_rpc(&self, rpc: usize) -> Option<&[u32]> {
        self.groups.get(rpc).map(|g| g.as_slice())
    }

    pub fn groups(&self) -> &[Vec<u32>] {
        &self.groups
    }
}

impl Default for RpcPartition {
    fn default() -> Self {
        RpcPartition::standard()
    }
}
