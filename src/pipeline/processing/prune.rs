use async_trait::async_trait;
use std::collections::BTreeMap;
use tracing::{debug, info};

use crate::constants::STAGE_PRUNE;
use crate::domain::RecordSet;
use crate::error::Result;
use crate::pipeline::{tally, PipelineStage, StageOutcome};

/// Drops records left without any true genre indicator
#[derive(Debug, Default)]
pub struct EmptyCategoryPruner;

impl EmptyCategoryPruner {
    pub fn new() -> Self {
        Self
    }
}

#[async_trait]
impl PipelineStage for EmptyCategoryPruner {
    fn name(&self) -> &'static str {
        STAGE_PRUNE
    }

    async fn apply(&self, records: RecordSet) -> Result<StageOutcome> {
        let (records, genre_columns) = records.into_parts();
        let input = records.len();
        let mut excluded = BTreeMap::new();

        let kept: Vec<_> = records
            .into_iter()
            .filter(|record| {
                let keep = record.has_any_genre();
                if !keep {
                    debug!(id = record.id, "Pruning record without genre");
                    tally(&mut excluded, "no_genre");
                }
                keep
            })
            .collect();

        info!("✂️ Pruned {} records without a retained genre", input - kept.len());
        Ok(StageOutcome::with_exclusions(
            RecordSet::from_parts(kept, genre_columns),
            excluded,
        ))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::{ListField, MovieRecord};
    use crate::pipeline::processing::CategoricalEncoder;

    fn with_genres(id: i64, genres: &[&str]) -> MovieRecord {
        let mut record = MovieRecord::empty(id);
        record.genres = ListField::Names(genres.iter().map(|g| g.to_string()).collect());
        record
    }

    #[tokio::test]
    async fn test_record_whose_only_genre_was_pruned_is_excluded() {
        let input = RecordSet::new(vec![
            with_genres(1, &["Drama"]),
            with_genres(2, &["Drama"]),
            with_genres(3, &["Foreign"]),
            with_genres(4, &[]),
        ]);

        let encoded = CategoricalEncoder::new(2).apply(input).await.unwrap().records;
        assert_eq!(encoded.genre_columns, vec!["Drama".to_string()]);

        let outcome = EmptyCategoryPruner::new().apply(encoded).await.unwrap();
        assert_eq!(outcome.records.ids(), vec![1, 2]);
        assert_eq!(outcome.excluded.get("no_genre"), Some(&2));
        assert_eq!(outcome.records.genre_columns, vec!["Drama".to_string()]);
    }
}
