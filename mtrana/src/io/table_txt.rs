use std::fs::File;
use std::io::{BufRead, BufReader, BufWriter, Write};
use std::path::Path;

use itertools::Itertools;
use regex::Regex;
use tracing::{info, warn};

use mtrcore::chamber::constants::N_LOCAL_BOARDS;
use mtrcore::efficiency::table::{EfficiencyTable, Plane, ValueCheck};

use crate::error::{Error, Result};

/// first line of every efficiency text file
pub const HEADER: &str = "localBoards";
/// width the writer fills before breaking a line of values
const LINE_WIDTH: usize = 80;

/// plane currently being read and the values collected so far
struct PendingPlane {
    det_elem_id: u32,
    plane: Plane,
    values: Vec<f64>,
}

/// read a per-board efficiency table from the text format
///
/// The file starts with `localBoards`, followed by blocks of
/// `detElemId: <id>` and `cathode: <0|1|2>` headers, each cathode followed by
/// 234 whitespace separated efficiencies that may span several lines. Blocks with an
/// invalid detElemId (zero or not a multiple of 100) or an unknown cathode are skipped
/// with a warning.
///
/// Arguments:
///
/// * `reader` - source of the text
/// * `bending_cathode` - cathode number (0 or 1) that denotes the bending plane
/// * `check` - policy for efficiencies outside [0, 1]
///
/// Returns:
///
/// * `Result<EfficiencyTable>` - the table, or a parse error with the offending line
pub fn read_efficiency_table<R: BufRead>(reader: R, bending_cathode: u8, check: ValueCheck) -> Result<EfficiencyTable> {
    let re_chamber = Regex::new(r"^[ \t]*detElemId:[ \t]*([0-9]+)[ \t]*$")?;
    let re_cathode = Regex::new(r"^[ \t]*cathode:[ \t]*([0-9]+)[ \t]*$")?;

    let mut table = EfficiencyTable::new();
    let mut current: Option<u32> = None;
    let mut pending: Option<PendingPlane> = None;
    let mut last_line = 0;

    for (index, line) in reader.lines().enumerate() {
        let line = line?;
        let line_number = index + 1;
        last_line = line_number;

        if let Some(caps) = re_chamber.captures(&line) {
            ensure_complete(&pending, line_number)?;
            current = match caps[1].parse::<u32>() {
                Ok(id) if id != 0 && id % 100 == 0 => Some(id),
                _ => {
                    warn!(line = line_number, det_elem_id = &caps[1], "invalid chamber number, skipping block");
                    None
                }
            };
            continue;
        }

        if let Some(caps) = re_cathode.captures(&line) {
            ensure_complete(&pending, line_number)?;
            let Some(det_elem_id) = current else { continue };
            let plane = caps[1].parse::<u8>().ok()
                .and_then(|cathode| Plane::from_cathode(cathode, bending_cathode));
            match plane {
                Some(plane) => {
                    pending = Some(PendingPlane { det_elem_id, plane, values: Vec::with_capacity(N_LOCAL_BOARDS) });
                }
                None => warn!(line = line_number, cathode = &caps[1], "invalid cathode number, skipping"),
            }
            continue;
        }

        let Some(mut plane) = pending.take() else { continue };
        for token in line.split_whitespace() {
            if plane.values.len() == N_LOCAL_BOARDS {
                return Err(Error::Parse {
                    line: line_number,
                    message: format!("more than {} efficiencies for {} of detElemId {}", N_LOCAL_BOARDS, plane.plane, plane.det_elem_id),
                });
            }
            let value = token.parse::<f64>().map_err(|e| Error::Parse {
                line: line_number,
                message: format!("invalid efficiency '{}': {}", token, e),
            })?;
            plane.values.push(value);
        }

        if plane.values.len() == N_LOCAL_BOARDS {
            table.set_plane(plane.det_elem_id, plane.plane, plane.values)?;
        } else {
            pending = Some(plane);
        }
    }

    ensure_complete(&pending, last_line)?;

    Ok(table.check_values(check)?)
}

fn ensure_complete(pending: &Option<PendingPlane>, line: usize) -> Result<()> {
    match pending {
        Some(plane) => Err(Error::Parse {
            line,
            message: format!(
                "expected {} efficiencies for {} of detElemId {}, found {}",
                N_LOCAL_BOARDS, plane.plane, plane.det_elem_id, plane.values.len()
            ),
        }),
        None => Ok(()),
    }
}

pub fn read_efficiency_table_file<P: AsRef<Path>>(path: P, bending_cathode: u8, check: ValueCheck) -> Result<EfficiencyTable> {
    let file = File::open(path.as_ref())?;
    let table = read_efficiency_table(BufReader::new(file), bending_cathode, check)?;
    info!(path = %path.as_ref().display(), chambers = table.det_elem_ids().count(), "efficiency table loaded");
    Ok(table)
}

/// write a table in the text format read by `read_efficiency_table`
///
/// Arguments:
///
/// * `writer` - destination
/// * `table` - table to write, chambers in increasing detElemId order
/// * `decimals` - number of decimals of each efficiency
/// * `bending_cathode` - cathode number written for the bending plane
pub fn write_efficiency_table<W: Write>(writer: &mut W, table: &EfficiencyTable, decimals: usize, bending_cathode: u8) -> Result<()> {
    let per_line = (LINE_WIDTH / (decimals + 3)).max(1);

    writeln!(writer, "{}", HEADER)?;

    for det_elem_id in table.det_elem_ids() {
        let Some(cells) = table.chamber(det_elem_id) else { continue };
        writeln!(writer)?;
        writeln!(writer, "detElemId:\t{}", det_elem_id)?;

        for plane in Plane::ALL {
            let Some(values) = cells.plane(plane) else { continue };
            writeln!(writer, " cathode:\t{}", plane.cathode(bending_cathode))?;
            let body = values.chunks(per_line)
                .map(|chunk| chunk.iter().map(|v| format!(" {:.*}", decimals, v)).join(""))
                .join("\n");
            writeln!(writer, "{}", body)?;
            writeln!(writer)?;
        }
    }

    Ok(())
}

pub fn write_efficiency_table_file<P: AsRef<Path>>(path: P, table: &EfficiencyTable, decimals: usize, bending_cathode: u8) -> Result<()> {
    let mut writer = BufWriter::new(File::create(path)?);
    write_efficiency_table(&mut writer, table, decimals, bending_cathode)?;
    writer.flush()?;
    Ok(())
}
