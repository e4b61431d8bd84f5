use async_trait::async_trait;
use tracing::info;

use crate::constants::{
    ENGLISH_LANGUAGE_CODE, ENGLISH_LANGUAGE_NAME, STAGE_FLAGS, UNITED_STATES_COUNTRY_NAME,
};
use crate::domain::{MovieRecord, RecordSet};
use crate::error::Result;
use crate::pipeline::{PipelineStage, StageOutcome};

/// Derives `english`, `produced_in_us` and `originally_english`
#[derive(Debug, Default)]
pub struct DerivedFlagBuilder;

impl DerivedFlagBuilder {
    pub fn new() -> Self {
        Self
    }

    pub fn derive(record: &mut MovieRecord) {
        // absent lists have no names, so they yield false
        record.english = Some(record.spoken_languages.contains(ENGLISH_LANGUAGE_NAME));
        record.produced_in_us = Some(record.production_countries.contains(UNITED_STATES_COUNTRY_NAME));
        record.originally_english =
            Some(record.original_language.as_deref() == Some(ENGLISH_LANGUAGE_CODE));
    }
}

#[async_trait]
impl PipelineStage for DerivedFlagBuilder {
    fn name(&self) -> &'static str {
        STAGE_FLAGS
    }

    async fn apply(&self, records: RecordSet) -> Result<StageOutcome> {
        let (mut records, genre_columns) = records.into_parts();
        for record in &mut records {
            Self::derive(record);
        }

        let english = records.iter().filter(|r| r.english == Some(true)).count();
        info!("🚩 Derived flags for {} records ({} English-language)", records.len(), english);
        Ok(StageOutcome::unchanged(RecordSet::from_parts(records, genre_columns)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::ListField;

    fn names(values: &[&str]) -> ListField {
        ListField::Names(values.iter().map(|v| v.to_string()).collect())
    }

    #[test]
    fn test_english_from_spoken_languages() {
        let mut record = MovieRecord::empty(1);
        record.spoken_languages = names(&["English", "French"]);
        DerivedFlagBuilder::derive(&mut record);
        assert_eq!(record.english, Some(true));
    }

    #[test]
    fn test_empty_country_list_is_not_us() {
        let mut record = MovieRecord::empty(1);
        record.production_countries = names(&[]);
        DerivedFlagBuilder::derive(&mut record);
        assert_eq!(record.produced_in_us, Some(false));

        record.production_countries = names(&["Canada", "United States of America"]);
        DerivedFlagBuilder::derive(&mut record);
        assert_eq!(record.produced_in_us, Some(true));
    }

    #[test]
    fn test_original_language_code() {
        let mut record = MovieRecord::empty(1);
        record.original_language = Some("fr".to_string());
        DerivedFlagBuilder::derive(&mut record);
        assert_eq!(record.originally_english, Some(false));

        record.original_language = Some("en".to_string());
        DerivedFlagBuilder::derive(&mut record);
        assert_eq!(record.originally_english, Some(true));
    }

    #[tokio::test]
    async fn test_absent_lists_yield_false() {
        let outcome = DerivedFlagBuilder::new()
            .apply(RecordSet::new(vec![MovieRecord::empty(4)]))
            .await
            .unwrap();
        let record = outcome.records.get(4).unwrap();
        assert_eq!(record.english, Some(false));
        assert_eq!(record.produced_in_us, Some(false));
        assert_eq!(record.originally_english, Some(false));
    }
}
