//! Finalist leaderboard files: JSON for round-tripping, CSV for spreadsheets.

use std::fs;
use std::io::Write;
use std::path::Path;

use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};

use crate::error::Result;
use crate::genome::Genome;
use crate::pool::{Descriptor, FinalistRecord, Snapshot};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FinalistExport<G> {
    pub exported_at: String,
    pub snapshot_version: u64,
    pub records: Vec<FinalistRecord<G>>,
}

#[derive(Debug, Serialize)]
struct LeaderboardRow<'a> {
    name: &'a str,
    lineage: &'a str,
    rank: usize,
    generation: u32,
    score: f64,
}

/// Write `snapshot` as JSON to `path`, creating parent directories. Returns the record count.
pub fn write_finalists_json<G>(path: &str, snapshot: &Snapshot<Descriptor<G>>) -> Result<usize>
where
    G: Genome + Serialize,
{
    let export = FinalistExport {
        exported_at: chrono::Utc::now().to_rfc3339(),
        snapshot_version: snapshot.version(),
        records: snapshot.records(),
    };
    if let Some(parent) = Path::new(path).parent() {
        if !parent.as_os_str().is_empty() {
            fs::create_dir_all(parent)?;
        }
    }
    fs::write(path, serde_json::to_string_pretty(&export)?)?;
    Ok(export.records.len())
}

pub fn read_finalists_json<G: DeserializeOwned>(path: &str) -> Result<FinalistExport<G>> {
    let raw = fs::read_to_string(path)?;
    Ok(serde_json::from_str(&raw)?)
}

/// One row per finalist: name, lineage, rank, generation, score.
pub fn write_leaderboard_csv<G: Genome, W: Write>(
    writer: W,
    records: &[FinalistRecord<G>],
) -> Result<()> {
    let mut csv = csv::Writer::from_writer(writer);
    for record in records {
        csv.serialize(LeaderboardRow {
            name: &record.name,
            lineage: record.lineage.as_str(),
            rank: record.rank,
            generation: record.genome.genome_id().generation,
            score: record.score,
        })?;
    }
    csv.flush()?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::genome::GenomeId;

    #[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
    struct Blueprint(GenomeId);

    impl Genome for Blueprint {
        fn genome_id(&self) -> &GenomeId {
            &self.0
        }
    }

    #[test]
    fn csv_has_header_and_one_row_per_record() {
        let records = vec![FinalistRecord {
            name: "climber".to_string(),
            lineage: "A".into(),
            rank: 1,
            genome: Blueprint(GenomeId::new("climber", "A", 7)),
            score: 12.5,
        }];
        let mut out = Vec::new();
        write_leaderboard_csv(&mut out, &records).unwrap();
        let text = String::from_utf8(out).unwrap();
        let lines: Vec<&str> = text.lines().collect();
        assert_eq!(lines, vec!["name,lineage,rank,generation,score", "climber,A,1,7,12.5"]);
    }
}
