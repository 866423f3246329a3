use std::fs::File;
use std::io::{BufRead, BufReader};
use std::path::Path;

use regex::Regex;
use tracing::debug;

use mtrcore::chamber::constants::N_RPC;
use mtrcore::chamber::rpc::RpcPartition;

use crate::error::{Error, Result};

/// read a local board to RPC mapping
///
/// Every relevant line has the form `N | {b1,b2,...}` with the RPC index `N`
/// (0 to 17) and the local boards on that RPC. Other lines are ignored.
///
/// Arguments:
///
/// * `reader` - source of the mapping
///
/// Returns:
///
/// * `Result<RpcPartition>` - the validated partition
pub fn read_rpc_partition<R: BufRead>(reader: R) -> Result<RpcPartition> {
    let re_line = Regex::new(r"([0-9]+) \| \{(.+)\}")?;
    let mut groups: Vec<Option<Vec<u32>>> = vec![None; N_RPC];

    for (index, line) in reader.lines().enumerate() {
        let line = line?;
        let line_number = index + 1;
        let Some(caps) = re_line.captures(&line) else { continue };

        let rpc = caps[1].parse::<usize>().ok()
            .filter(|&rpc| rpc < N_RPC)
            .ok_or_else(|| Error::Parse { line: line_number, message: format!("invalid RPC index {}", &caps[1]) })?;

        if groups[rpc].is_some() {
            return Err(Error::Parse { line: line_number, message: format!("RPC {} listed twice", rpc) });
        }

        let boards = caps[2].split(',')
            .map(str::trim)
            .filter(|token| !token.is_empty())
            .map(|token| token.parse::<u32>().map_err(|e| Error::Parse {
                line: line_number,
                message: format!("invalid local board '{}': {}", token, e),
            }))
            .collect::<Result<Vec<u32>>>()?;

        debug!(rpc, boards = boards.len(), "RPC mapping line");
        groups[rpc] = Some(boards);
    }

    let groups = groups.into_iter()
        .enumerate()
        .map(|(rpc, group)| group.ok_or_else(|| {
            Error::Core(mtrcore::error::Error::InvalidPartition(format!("RPC {} missing from the mapping", rpc)))
        }))
        .collect::<Result<Vec<_>>>()?;

    Ok(RpcPartition::from_groups(groups)?)
}

pub fn read_rpc_partition_file<P: AsRef<Path>>(path: P) -> Result<RpcPartition> {
    read_rpc_partition(BufReader::new(File::open(path)?))
}

#[cfg(test)]
mod tests {
    use super::*;
    use itertools::Itertools;

    fn mapping_text(partition: &RpcPartition) -> String {
        partition.groups().iter()
            .enumerate()
            .map(|(rpc, boards)| format!("{} | {{{}}}", rpc, boards.iter().rev().join(",")))
            .join("\n")
    }

    #[test]
    fn test_standard_mapping_reads_back() {
        let standard = RpcPartition::standard();
        let text = format!("# local boards per RPC\n{}\n", mapping_text(&standard));
        let partition = read_rpc_partition(text.as_bytes()).unwrap();
        assert_eq!(partition, standard);
    }

    #[test]
    fn test_missing_rpc() {
        let standard = RpcPartition::standard();
        let text = mapping_text(&standard).lines().skip(1).join("\n");
        let err = read_rpc_partition(text.as_bytes()).unwrap_err();
        assert!(matches!(err, Error::Core(mtrcore::error::Error::InvalidPartition(_))));
    }

    #[test]
    fn test_duplicate_and_bad_lines() {
        let err = read_rpc_partition("0 | {1,2}\n0 | {3}\n".as_bytes()).unwrap_err();
        assert!(matches!(err, Error::Parse { line: 2, .. }));

        let err = read_rpc_partition("18 | {1,2}\n".as_bytes()).unwrap_err();
        assert!(matches!(err, Error::Parse { line: 1, .. }));

        let err = read_rpc_partition("3 | {1,x}\n".as_bytes()).unwrap_err();
        assert!(matches!(err, Error::Parse { line: 1, .. }));
    }
}
