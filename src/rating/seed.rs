//! Read-only rating source backed by the seed dataset
//!
//! Every read derives fresh unplayed records (no wins, no losses, seed elo,
//! current timestamp). Writes always fail with `StoreRequired`.

use crate::dataset::DatasetCache;
use crate::error::{DuelError, Result};
use crate::rating::storage::RatingStore;
use crate::types::{DuelOutcome, RaceId, RatingRecord, RatingSeed, RatingUpdate, SwapOutcome};
use async_trait::async_trait;
use chrono::Utc;
use std::sync::Arc;

/// Build initial rating records from seeds
pub fn records_from_seeds(seeds: &[RatingSeed]) -> Vec<RatingRecord> {
    let now = Utc::now();
    seeds
        .iter()
        .map(|seed| RatingRecord::from_seed(seed, now))
        .collect()
}

/// Rating source derived from `race_duel_seed.csv`
pub struct SeedRatingSource {
    datasets: Arc<DatasetCache>,
}

impl SeedRatingSource {
    pub fn new(datasets: Arc<DatasetCache>) -> Self {
        Self { datasets }
    }
}

#[async_trait]
impl RatingStore for SeedRatingSource {
    fn name(&self) -> &'static str {
        "seed"
    }

    async fn list_ratings(&self) -> Result<Vec<RatingRecord>> {
        let dataset = self.datasets.get().await?;
        Ok(records_from_seeds(dataset.seeds()?))
    }

    async fn get_ratings(&self, race_ids: &[RaceId]) -> Result<Vec<RatingRecord>> {
        let dataset = self.datasets.get().await?;
        let seeds = dataset.seeds()?;
        let wanted: Vec<RatingSeed> = seeds
            .iter()
            .filter(|seed| race_ids.contains(&seed.race_id))
            .cloned()
            .collect();
        Ok(records_from_seeds(&wanted))
    }

    async fn upsert_ratings(&self, _records: &[RatingRecord]) -> Result<()> {
        Err(DuelError::StoreRequired.into())
    }

    async fn swap_ratings(&self, _updates: &[RatingUpdate]) -> Result<SwapOutcome> {
        Err(DuelError::StoreRequired.into())
    }

    async fn append_outcome(&self, _outcome: &DuelOutcome) -> Result<()> {
        Err(DuelError::StoreRequired.into())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dataset::DatasetLoader;
    use std::time::Duration;

    fn seed_source(dir: &tempfile::TempDir) -> SeedRatingSource {
        std::fs::write(
            dir.path().join("race_duel_seed.csv"),
            "raceId,season,round,race_name,prior_score,elo_seed,logit_seed\n\
             1,2023,1,Bahrain Grand Prix,0.4,1520,0.1\n\
             2,2023,2,Saudi Arabian Grand Prix,0.2,1480,-0.1\n",
        )
        .unwrap();
        std::fs::write(
            dir.path().join("race_summaries.csv"),
            "season,round,race_name,summary_text,youtube_highlights_search,unique_strategy_share,avg_stops_per_driver,dnf_count,max_regret_s,top_mover,top_mover_gain\n",
        )
        .unwrap();
        let loader = DatasetLoader::new(
            dir.path().join("race_summaries.csv"),
            dir.path().join("race_duel_seed.csv"),
        );
        SeedRatingSource::new(Arc::new(DatasetCache::new(loader, Duration::ZERO)))
    }

    #[tokio::test]
    async fn test_seed_records_start_unplayed() {
        let dir = tempfile::tempdir().unwrap();
        let source = seed_source(&dir);

        let records = source.list_ratings().await.unwrap();
        assert_eq!(records.len(), 2);
        assert_eq!(records[0].elo, 1520.0);
        assert_eq!(records[0].wins, 0);
        assert_eq!(records[0].losses, 0);
        assert_eq!(records[1].logit_seed, -0.1);

        let one = source.get_ratings(&[2]).await.unwrap();
        assert_eq!(one.len(), 1);
        assert_eq!(one[0].race_id, 2);
    }

    #[tokio::test]
    async fn test_seed_source_is_read_only() {
        let dir = tempfile::tempdir().unwrap();
        let source = seed_source(&dir);
        let before = std::fs::read_to_string(dir.path().join("race_duel_seed.csv")).unwrap();

        let records = source.list_ratings().await.unwrap();
        let err = source.upsert_ratings(&records).await.unwrap_err();
        assert!(matches!(DuelError::find(&err), Some(DuelError::StoreRequired)));

        let after = std::fs::read_to_string(dir.path().join("race_duel_seed.csv")).unwrap();
        assert_eq!(before, after);
    }
}
