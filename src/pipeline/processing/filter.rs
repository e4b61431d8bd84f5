use async_trait::async_trait;
use std::collections::BTreeMap;
use tracing::{debug, info};

use crate::constants::{RELEASED_STATUS, STAGE_FILTER};
use crate::domain::{Homepage, MovieRecord, RecordSet};
use crate::error::Result;
use crate::pipeline::{tally, PipelineStage, StageOutcome};

/// Why a record failed the completeness/validity check
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Exclusion {
    Missing(&'static str),
    NotReleased,
}

impl Exclusion {
    pub fn reason(&self) -> String {
        match self {
            Exclusion::Missing(field) => format!("missing:{}", field),
            Exclusion::NotReleased => "not_released".to_string(),
        }
    }
}

/// Keeps complete, released records and settles `homepage`, `tagline`
/// and `status` into their final shape
#[derive(Debug, Default)]
pub struct RecordFilter;

impl RecordFilter {
    pub fn new() -> Self {
        Self
    }

    /// First failing check for a record, if any
    pub fn check(record: &MovieRecord) -> Option<Exclusion> {
        let required = [
            ("title", record.title.is_some()),
            ("keywords", !record.keywords.is_absent()),
            ("original_language", record.original_language.is_some()),
            ("status", record.status.is_some()),
            ("release_date", record.release_date.is_some()),
            ("poster_path", record.poster_path.is_some()),
            ("overview", record.overview.is_some()),
            ("runtime", record.runtime.is_some()),
        ];
        if let Some((field, _)) = required.iter().find(|(_, present)| !present) {
            return Some(Exclusion::Missing(*field));
        }

        if record.status.as_deref() != Some(RELEASED_STATUS) {
            return Some(Exclusion::NotReleased);
        }
        None
    }

    fn finish(mut record: MovieRecord) -> MovieRecord {
        record.status = None;
        record.homepage = Homepage::Flag(record.homepage.as_flag());
        if record.tagline.is_none() {
            record.tagline = Some(String::new());
        }
        record
    }
}

#[async_trait]
impl PipelineStage for RecordFilter {
    fn name(&self) -> &'static str {
        STAGE_FILTER
    }

    async fn apply(&self, records: RecordSet) -> Result<StageOutcome> {
        let (records, genre_columns) = records.into_parts();
        let input = records.len();
        let mut excluded = BTreeMap::new();
        let mut kept = Vec::with_capacity(input);

        for record in records {
            match Self::check(&record) {
                None => kept.push(Self::finish(record)),
                Some(exclusion) => {
                    debug!(id = record.id, reason = %exclusion.reason(), "Excluding record");
                    tally(&mut excluded, &exclusion.reason());
                }
            }
        }

        info!("🧹 Filter kept {} of {} records", kept.len(), input);
        Ok(StageOutcome::with_exclusions(
            RecordSet::from_parts(kept, genre_columns),
            excluded,
        ))
    }
}
