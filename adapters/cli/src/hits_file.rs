use std::{fs::File, io::Read, path::Path};

use anyhow::{Context, Result};
use hitglow_core::HitRecord;

/// Reads the hit list stored at `path`.
pub(crate) fn read_hits(path: &Path) -> Result<Vec<HitRecord>> {
    let file =
        File::open(path).with_context(|| format!("failed to open hit list {}", path.display()))?;
    parse_hits(file).with_context(|| format!("failed to read hit list {}", path.display()))
}

/// Parses CSV rows `time, crystal_id, side, x, y, energy` following a header row.
///
/// Columns are matched by position, so the header may use any names.
pub(crate) fn parse_hits<R: Read>(source: R) -> Result<Vec<HitRecord>> {
    let mut reader = csv::ReaderBuilder::new()
        .has_headers(true)
        .trim(csv::Trim::All)
        .from_reader(source);

    let mut hits = Vec::new();
    for (row, record) in reader.records().enumerate() {
        let record = record.with_context(|| format!("malformed row {}", row + 1))?;
        let hit: HitRecord = record
            .deserialize(None)
            .with_context(|| format!("invalid hit on row {}", row + 1))?;
        hits.push(hit);
    }
    Ok(hits)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_rows_by_position() {
        let hits = parse_hits(
            "t,crystal,side,x,y,e\n0.5, 3, 1, 9, 3, 12.5\n1.0,4,0,0,7,1\n".as_bytes(),
        )
        .expect("valid csv");

        assert_eq!(hits.len(), 2);
        assert_eq!(
            hits[0],
            HitRecord {
                time: 0.5,
                crystal_id: 3,
                side: 1,
                x: 9,
                y: 3,
                energy: 12.5,
            }
        );
        assert_eq!(hits[1].y, 7);
    }

    #[test]
    fn reports_the_offending_row() {
        let error = parse_hits("time,crystal_id,side,x,y,energy\n0.0,1,0,1,1,2\n0.1,1,0,-4,1,2\n".as_bytes())
            .expect_err("negative column");

        assert!(error.to_string().contains("row 2"));
    }
}
