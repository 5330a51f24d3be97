//! CSV loading for race summaries and rating seeds
//!
//! Both files carry a header row. Numeric columns are parsed permissively:
//! a missing, empty or non-numeric value becomes the caller's fallback. Only
//! structural problems (wrong column count, bad encoding, I/O) fail a load,
//! and then every offending row is reported.

use crate::error::{DuelError, Result};
use crate::types::{EventSummary, RaceId, RatingSeed};
use csv::{ReaderBuilder, StringRecord, Trim};
use std::collections::HashMap;
use std::io::Read;
use std::path::{Path, PathBuf};
use tracing::{debug, warn};

/// Lookup from `(season, round)` to the seed's race id
pub type SeedIndex = HashMap<(i64, i64), RaceId>;

/// One consistent snapshot of both datasets
#[derive(Debug, Clone, Default)]
pub struct Dataset {
    pub summaries: Vec<EventSummary>,
    pub seeds: Vec<RatingSeed>,
    /// Set when the seed file could not be loaded; summaries then carry
    /// fallback ids and seed-derived ratings are unavailable
    pub seed_error: Option<DuelError>,
}

impl Dataset {
    /// Seeds, or the error that prevented loading them
    pub fn seeds(&self) -> Result<&[RatingSeed]> {
        match &self.seed_error {
            Some(err) => Err(err.clone().into()),
            None => Ok(&self.seeds),
        }
    }
}

/// Parse a numeric field, returning `fallback` when it is missing, empty,
/// non-numeric or not finite
pub fn parse_number(value: Option<&str>, fallback: f64) -> f64 {
    match value.map(str::trim) {
        None | Some("") => fallback,
        Some(raw) => raw
            .parse::<f64>()
            .ok()
            .filter(|parsed| parsed.is_finite())
            .unwrap_or(fallback),
    }
}

fn parse_int(value: Option<&str>, fallback: i64) -> i64 {
    parse_number(value, fallback as f64) as i64
}

fn non_empty(value: Option<&str>) -> Option<&str> {
    value.map(str::trim).filter(|v| !v.is_empty())
}

/// Build the `(season, round)` index used to resolve summary ids
pub fn seed_index(seeds: &[RatingSeed]) -> SeedIndex {
    seeds
        .iter()
        .map(|seed| ((seed.season, seed.round), seed.race_id))
        .collect()
}

/// Resolve a summary row's id: explicit non-zero id, then the seed index,
/// then `round * 100 + season`
pub fn derive_summary_id(explicit: Option<&str>, season: i64, round: i64, index: &SeedIndex) -> RaceId {
    let explicit = parse_int(explicit, 0);
    if explicit != 0 {
        return explicit;
    }
    match index.get(&(season, round)) {
        Some(&race_id) if race_id != 0 => race_id,
        _ => round * 100 + season,
    }
}

/// Resolve a seed row's id: explicit id, else `round + season * 1000`.
///
/// This differs from the summary fallback in [`derive_summary_id`]; when
/// neither file carries explicit ids the two formulas disagree.
pub fn derive_seed_id(explicit: Option<&str>, season: i64, round: i64) -> RaceId {
    parse_int(explicit, round + season * 1000)
}

/// Header-indexed view over a parsed CSV file
struct CsvTable {
    columns: HashMap<String, usize>,
    rows: Vec<StringRecord>,
}

impl CsvTable {
    fn read<R: Read>(reader: R, file: &str) -> Result<Self> {
        let mut reader = ReaderBuilder::new()
            .has_headers(true)
            .flexible(false)
            .trim(Trim::All)
            .from_reader(reader);

        let headers = reader.headers().map_err(|e| DuelError::Parse {
            file: file.to_string(),
            errors: vec![format!("header: {}", e)],
        })?;
        let columns = headers
            .iter()
            .enumerate()
            .map(|(i, name)| (name.to_string(), i))
            .collect();

        let mut rows = Vec::new();
        let mut errors = Vec::new();
        for result in reader.records() {
            match result {
                Ok(record) => rows.push(record),
                Err(e) => {
                    let line = e
                        .position()
                        .map(|p| p.line().to_string())
                        .unwrap_or_else(|| "?".to_string());
                    errors.push(format!("line {}: {}", line, e));
                    if e.is_io_error() {
                        break;
                    }
                }
            }
        }

        if !errors.is_empty() {
            return Err(DuelError::Parse {
                file: file.to_string(),
                errors,
            }
            .into());
        }

        Ok(Self { columns, rows })
    }

    fn get<'a>(&self, row: &'a StringRecord, column: &str) -> Option<&'a str> {
        self.columns.get(column).and_then(|&i| row.get(i))
    }
}

/// Parse the rating seed file
pub fn parse_seeds<R: Read>(reader: R, file: &str) -> Result<Vec<RatingSeed>> {
    let table = CsvTable::read(reader, file)?;

    let seeds = table
        .rows
        .iter()
        .map(|row| {
            let season = parse_int(table.get(row, "season"), 0);
            let round = parse_int(table.get(row, "round"), 0);
            let explicit = non_empty(table.get(row, "raceId"))
                .or_else(|| non_empty(table.get(row, "race_id")));

            RatingSeed {
                race_id: derive_seed_id(explicit, season, round),
                season,
                round,
                race_name: table.get(row, "race_name").unwrap_or_default().to_string(),
                prior_score: parse_number(table.get(row, "prior_score"), 0.0),
                elo_seed: parse_number(table.get(row, "elo_seed"), 0.0),
                logit_seed: parse_number(table.get(row, "logit_seed"), 0.0),
            }
        })
        .collect();

    Ok(seeds)
}

/// Parse the race summary file, resolving ids against `index`
pub fn parse_summaries<R: Read>(
    reader: R,
    file: &str,
    index: &SeedIndex,
) -> Result<Vec<EventSummary>> {
    let table = CsvTable::read(reader, file)?;

    let summaries = table
        .rows
        .iter()
        .map(|row| {
            let season = parse_int(table.get(row, "season"), 0);
            let round = parse_int(table.get(row, "round"), 0);
            let explicit = non_empty(table.get(row, "raceId"))
                .or_else(|| non_empty(table.get(row, "race_id")));

            EventSummary {
                race_id: derive_summary_id(explicit, season, round, index),
                season,
                round,
                race_name: table.get(row, "race_name").unwrap_or_default().to_string(),
                summary_text: table.get(row, "summary_text").unwrap_or_default().to_string(),
                youtube_highlights_url: table
                    .get(row, "youtube_highlights_search")
                    .unwrap_or_default()
                    .to_string(),
                unique_strategy_share: parse_number(table.get(row, "unique_strategy_share"), 0.0),
                avg_stops_per_driver: parse_number(table.get(row, "avg_stops_per_driver"), 0.0),
                dnf_count: parse_number(table.get(row, "dnf_count"), 0.0) as u32,
                max_regret_seconds: parse_number(table.get(row, "max_regret_s"), 0.0),
                top_mover: non_empty(table.get(row, "top_mover")).map(str::to_string),
                top_mover_gain: non_empty(table.get(row, "top_mover_gain"))
                    .map(|gain| parse_number(Some(gain), 0.0)),
            }
        })
        .collect();

    Ok(summaries)
}

/// Loads both datasets from disk
#[derive(Debug, Clone)]
pub struct DatasetLoader {
    summaries_path: PathBuf,
    seeds_path: PathBuf,
}

impl DatasetLoader {
    pub fn new(summaries_path: PathBuf, seeds_path: PathBuf) -> Self {
        Self {
            summaries_path,
            seeds_path,
        }
    }

    pub fn summaries_path(&self) -> &Path {
        &self.summaries_path
    }

    pub fn seeds_path(&self) -> &Path {
        &self.seeds_path
    }

    /// Load the rating seeds
    pub async fn load_seeds(&self) -> Result<Vec<RatingSeed>> {
        let bytes = read_file(&self.seeds_path).await?;
        parse_seeds(bytes.as_slice(), &self.seeds_path.display().to_string())
    }

    /// Load both files as one snapshot. A broken seed file is tolerated
    /// (summaries fall back to derived ids); a broken summary file is not.
    pub async fn load(&self) -> Result<Dataset> {
        let (seeds, seed_error) = match self.load_seeds().await {
            Ok(seeds) => (seeds, None),
            Err(e) => {
                warn!("Unable to load duel seeds for id mapping: {:#}", e);
                let seed_error = DuelError::find(&e).cloned().unwrap_or_else(|| DuelError::Parse {
                    file: self.seeds_path.display().to_string(),
                    errors: vec![format!("{:#}", e)],
                });
                (Vec::new(), Some(seed_error))
            }
        };

        let index = seed_index(&seeds);
        let bytes = read_file(&self.summaries_path).await?;
        let summaries = parse_summaries(
            bytes.as_slice(),
            &self.summaries_path.display().to_string(),
            &index,
        )?;

        debug!(
            "Loaded {} race summaries and {} rating seeds",
            summaries.len(),
            seeds.len()
        );

        Ok(Dataset {
            summaries,
            seeds,
            seed_error,
        })
    }
}

async fn read_file(path: &Path) -> Result<Vec<u8>> {
    tokio::fs::read(path).await.map_err(|e| {
        DuelError::Parse {
            file: path.display().to_string(),
            errors: vec![format!("read failed: {}", e)],
        }
        .into()
    })
}
