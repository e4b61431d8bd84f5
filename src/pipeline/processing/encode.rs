use async_trait::async_trait;
use std::collections::{BTreeMap, BTreeSet};
use tracing::info;

use crate::constants::STAGE_ENCODE;
use crate::domain::{ListField, MovieRecord, RecordSet};
use crate::error::Result;
use crate::observability::metrics;
use crate::pipeline::{PipelineStage, StageOutcome};

/// Replaces the `genres` list with one boolean indicator per genre,
/// keeping only genres present in at least `min_support` records.
pub struct CategoricalEncoder {
    min_support: usize,
}

impl CategoricalEncoder {
    pub fn new(min_support: usize) -> Self {
        Self { min_support }
    }

    /// Number of records carrying each genre. Repeats within a record count once.
    pub fn genre_counts(records: &[MovieRecord]) -> BTreeMap<String, usize> {
        let mut counts = BTreeMap::new();
        for record in records {
            let distinct: BTreeSet<&String> = record.genres.names().iter().collect();
            for genre in distinct {
                *counts.entry(genre.clone()).or_insert(0) += 1;
            }
        }
        counts
    }
}

#[async_trait]
impl PipelineStage for CategoricalEncoder {
    fn name(&self) -> &'static str {
        STAGE_ENCODE
    }

    async fn apply(&self, records: RecordSet) -> Result<StageOutcome> {
        if !records.genre_columns.is_empty() {
            return Ok(StageOutcome::unchanged(records));
        }

        let (mut records, _) = records.into_parts();
        let counts = Self::genre_counts(&records);

        let (retained, dropped): (Vec<_>, Vec<_>) = counts
            .into_iter()
            .partition(|(_, count)| *count >= self.min_support);
        let columns: Vec<String> = retained.into_iter().map(|(genre, _)| genre).collect();

        if !dropped.is_empty() {
            let names: Vec<String> = dropped
                .iter()
                .map(|(genre, count)| format!("{genre} ({count})"))
                .collect();
            info!(
                "🗑️ Dropping {} genres below support {}: {}",
                dropped.len(),
                self.min_support,
                names.join(", ")
            );
        }
        metrics::encode::genre_columns(columns.len(), dropped.len());

        for record in &mut records {
            record.genre_flags = columns
                .iter()
                .map(|genre| (genre.clone(), record.genres.contains(genre)))
                .collect();
            record.genres = ListField::Absent;
        }

        info!("🏷️ Encoded {} genre indicator columns", columns.len());
        Ok(StageOutcome::unchanged(RecordSet::from_parts(records, columns)))
    }
}
