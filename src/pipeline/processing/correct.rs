use async_trait::async_trait;
use std::collections::BTreeMap;
use tracing::{debug, info};

use crate::constants::STAGE_CORRECT;
use crate::domain::RecordSet;
use crate::error::Result;
use crate::pipeline::{tally, PipelineStage, StageOutcome};

// Values at or below these are assumed to be in millions / thousands.
// Lossy: a genuine budget of 999 becomes 999,000.
const MILLIONS_THRESHOLD: f64 = 100.0;
const THOUSANDS_THRESHOLD: f64 = 999.0;

/// Rescale a budget or revenue entered in millions or thousands.
///
/// Both rules run in order, so 5 becomes 5,000,000 and 500 becomes 500,000.
pub fn correct_magnitude(value: f64) -> f64 {
    let mut value = value;
    if value <= MILLIONS_THRESHOLD {
        value *= 1_000_000.0;
    }
    if value <= THOUSANDS_THRESHOLD {
        value *= 1_000.0;
    }
    value.round()
}

/// Drops records without a budget or revenue and repairs magnitude errors
#[derive(Debug, Default)]
pub struct NumericCorrector;

impl NumericCorrector {
    pub fn new() -> Self {
        Self
    }
}

/// Corrected value, or `None` when the field cannot yield a positive amount.
///
/// Zero, negative and missing values all fall under the zero rule, as does a
/// fraction that still rounds to zero after rescaling.
fn corrected(value: Option<f64>) -> Option<f64> {
    value
        .filter(|v| *v > 0.0)
        .map(correct_magnitude)
        .filter(|v| *v >= 1.0)
}

#[async_trait]
impl PipelineStage for NumericCorrector {
    fn name(&self) -> &'static str {
        STAGE_CORRECT
    }

    async fn apply(&self, records: RecordSet) -> Result<StageOutcome> {
        let (records, genre_columns) = records.into_parts();
        let input = records.len();
        let mut excluded = BTreeMap::new();
        let mut kept = Vec::with_capacity(input);

        for mut record in records {
            let (Some(budget), Some(revenue)) = (corrected(record.budget), corrected(record.revenue)) else {
                debug!(id = record.id, "Dropping record with zero or missing budget/revenue");
                tally(&mut excluded, "zero_budget_or_revenue");
                continue;
            };
            record.budget = Some(budget);
            record.revenue = Some(revenue);
            kept.push(record);
        }

        info!("💰 Corrected budget/revenue for {} of {} records", kept.len(), input);
        Ok(StageOutcome::with_exclusions(
            RecordSet::from_parts(kept, genre_columns),
            excluded,
        ))
    }
}
