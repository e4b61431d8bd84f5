//! Stage trait, run reports and the orchestrator that threads a record set
//! through the stages in order.

pub mod processing;

use async_trait::async_trait;
use serde::Serialize;
use std::collections::BTreeMap;
use std::fmt;
use std::sync::Arc;
use std::time::Instant;
use tracing::{info, Instrument};
use uuid::Uuid;

use crate::app::ports::{PosterFetchPort, RateLimiterPort};
use crate::config::Config;
use crate::constants::STAGE_JOIN;
use crate::domain::{RawTable, RecordSet};
use crate::error::Result;
use crate::infra::{RequestRateLimiter, Unlimited};
use crate::observability::metrics;
use processing::{
    CategoricalEncoder, DerivedFlagBuilder, EmptyCategoryPruner, FieldNormalizer,
    ImageColorExtractor, NumericCorrector, RecordFilter, TableJoiner,
};

/// Common trait for the record-set stages that follow the join
#[async_trait]
pub trait PipelineStage: Send + Sync {
    /// Stage name used in logs, metrics and the run summary
    fn name(&self) -> &'static str;

    /// Consume the current record set and produce the next one
    async fn apply(&self, records: RecordSet) -> Result<StageOutcome>;
}

/// Output of one stage: the new record set plus how many records were
/// dropped, by reason
#[derive(Debug, Clone)]
pub struct StageOutcome {
    pub records: RecordSet,
    pub excluded: BTreeMap<String, usize>,
}

impl StageOutcome {
    pub fn unchanged(records: RecordSet) -> Self {
        Self {
            records,
            excluded: BTreeMap::new(),
        }
    }

    pub fn with_exclusions(records: RecordSet, excluded: BTreeMap<String, usize>) -> Self {
        Self { records, excluded }
    }

    pub fn excluded_total(&self) -> usize {
        self.excluded.values().sum()
    }
}

/// Record one exclusion under `reason`
pub fn tally(excluded: &mut BTreeMap<String, usize>, reason: &str) {
    *excluded.entry(reason.to_string()).or_insert(0) += 1;
}

/// The three source tables
#[derive(Debug, Clone)]
pub struct SourceTables {
    pub metadata: RawTable,
    pub keywords: RawTable,
    pub credits: RawTable,
}

#[derive(Debug, Clone, Serialize)]
pub struct StageReport {
    pub stage: &'static str,
    pub input: usize,
    pub output: usize,
    pub excluded: BTreeMap<String, usize>,
    pub duration_secs: f64,
}

/// Result of a complete pipeline run
#[derive(Debug, Clone, Serialize)]
pub struct PipelineSummary {
    pub run_id: Uuid,
    pub metadata_rows: usize,
    pub keywords_rows: usize,
    pub credits_rows: usize,
    pub joined_rows: usize,
    pub stages: Vec<StageReport>,
    pub output_rows: usize,
    pub genre_columns: Vec<String>,
}

impl PipelineSummary {
    pub fn stage(&self, name: &str) -> Option<&StageReport> {
        self.stages.iter().find(|s| s.stage == name)
    }

    /// One-line JSON rendering for structured log sinks
    pub fn to_json(&self) -> Result<String> {
        Ok(serde_json::to_string(self)?)
    }
}

impl fmt::Display for PipelineSummary {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "📊 Pipeline run {}", self.run_id)?;
        writeln!(
            f,
            "   Input rows: metadata={} keywords={} credits={}",
            self.metadata_rows, self.keywords_rows, self.credits_rows
        )?;
        writeln!(f, "   Joined rows: {}", self.joined_rows)?;
        for stage in &self.stages {
            write!(
                f,
                "   {:<10} {:>7} -> {:>7}  ({:.2}s)",
                stage.stage, stage.input, stage.output, stage.duration_secs
            )?;
            if !stage.excluded.is_empty() {
                let reasons: Vec<String> = stage
                    .excluded
                    .iter()
                    .map(|(reason, count)| format!("{reason}={count}"))
                    .collect();
                write!(f, "  excluded: {}", reasons.join(", "))?;
            }
            writeln!(f)?;
        }
        writeln!(f, "   Output rows: {}", self.output_rows)?;
        if !self.genre_columns.is_empty() {
            writeln!(f, "   Genre columns: {}", self.genre_columns.join(", "))?;
        }
        Ok(())
    }
}

#[derive(Debug, Clone)]
pub struct PipelineOutput {
    pub records: RecordSet,
    pub summary: PipelineSummary,
}

pub struct Pipeline {
    joiner: TableJoiner,
    stages: Vec<Box<dyn PipelineStage>>,
}

impl Pipeline {
    pub fn new(joiner: TableJoiner, stages: Vec<Box<dyn PipelineStage>>) -> Self {
        Self { joiner, stages }
    }

    /// The complete eight-stage pipeline
    pub fn full(config: &Config, fetcher: Arc<dyn PosterFetchPort>) -> Self {
        let limiter: Arc<dyn RateLimiterPort> = match config.color.requests_per_minute {
            Some(rpm) => Arc::new(RequestRateLimiter::new(rpm)),
            None => Arc::new(Unlimited),
        };

        Self::new(
            TableJoiner::new(&config.pipeline.poster_base_url),
            vec![
                Box::new(FieldNormalizer::new()),
                Box::new(RecordFilter::new()),
                Box::new(NumericCorrector::new()),
                Box::new(ImageColorExtractor::new(fetcher, limiter, config.color.clone())),
                Box::new(CategoricalEncoder::new(config.pipeline.min_genre_support)),
                Box::new(DerivedFlagBuilder::new()),
                Box::new(EmptyCategoryPruner::new()),
            ],
        )
    }

    /// Join, normalize, filter and correct only; never touches the network
    pub fn offline(config: &Config) -> Self {
        Self::new(
            TableJoiner::new(&config.pipeline.poster_base_url),
            vec![
                Box::new(FieldNormalizer::new()),
                Box::new(RecordFilter::new()),
                Box::new(NumericCorrector::new()),
            ],
        )
    }

    pub fn stage_names(&self) -> Vec<&'static str> {
        std::iter::once(STAGE_JOIN)
            .chain(self.stages.iter().map(|s| s.name()))
            .collect()
    }

    /// Run every stage in order. Schema violations abort the run; per-record
    /// exclusions are counted in the summary.
    pub async fn run(&self, tables: SourceTables) -> Result<PipelineOutput> {
        let run_id = Uuid::new_v4();
        let span = tracing::info_span!("pipeline_run", run_id = %run_id);
        self.run_inner(run_id, tables).instrument(span).await
    }

    async fn run_inner(&self, run_id: Uuid, tables: SourceTables) -> Result<PipelineOutput> {
        metrics::pipeline::run_started();
        info!("🚀 Starting pipeline with stages: {}", self.stage_names().join(" -> "));

        let mut summary = PipelineSummary {
            run_id,
            metadata_rows: tables.metadata.len(),
            keywords_rows: tables.keywords.len(),
            credits_rows: tables.credits.len(),
            joined_rows: 0,
            stages: Vec::with_capacity(self.stages.len()),
            output_rows: 0,
            genre_columns: Vec::new(),
        };

        // Step 1: join the three tables
        let t_join = Instant::now();
        metrics::pipeline::stage_input(STAGE_JOIN, tables.metadata.len());
        let mut records = self.joiner.join(&tables)?;
        metrics::pipeline::stage_duration(STAGE_JOIN, t_join.elapsed().as_secs_f64());
        summary.joined_rows = records.len();
        info!("✅ Joined {} metadata rows", records.len());

        // Step 2..n: record-set stages
        for stage in &self.stages {
            let name = stage.name();
            let input = records.len();
            metrics::pipeline::stage_input(name, input);

            let t_stage = Instant::now();
            let outcome = stage.apply(records).await?;
            let duration_secs = t_stage.elapsed().as_secs_f64();
            metrics::pipeline::stage_duration(name, duration_secs);

            for (reason, count) in &outcome.excluded {
                metrics::pipeline::records_excluded(name, reason, *count);
            }

            info!(
                "✅ Stage {} kept {} of {} records ({} excluded)",
                name,
                outcome.records.len(),
                input,
                outcome.excluded_total()
            );

            summary.stages.push(StageReport {
                stage: name,
                input,
                output: outcome.records.len(),
                excluded: outcome.excluded,
                duration_secs,
            });
            records = outcome.records;
        }

        summary.output_rows = records.len();
        summary.genre_columns = records.genre_columns.clone();
        info!("🏁 Pipeline finished with {} records", summary.output_rows);

        Ok(PipelineOutput { records, summary })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::constants::{STAGE_CORRECT, STAGE_FILTER, STAGE_NORMALIZE};
    use crate::domain::RawRow;

    fn tables() -> SourceTables {
        let metadata = RawTable::new(
            "metadata",
            vec![
                RawRow::new(1)
                    .with("title", "Heat")
                    .with("overview", "Cops and robbers")
                    .with("status", "Released")
                    .with("release_date", "1995-12-15")
                    .with("runtime", "170.0")
                    .with("original_language", "en")
                    .with("poster_path", "/heat.jpg")
                    .with("budget", "60000000")
                    .with("revenue", "187436818.0")
                    .with("genres", "[{'id': 28, 'name': 'Action'}]"),
                RawRow::new(2)
                    .with("title", "Rumored")
                    .with("overview", "Not out yet")
                    .with("status", "Rumored")
                    .with("release_date", "2030-01-01")
                    .with("runtime", "90")
                    .with("original_language", "en")
                    .with("poster_path", "/rumored.jpg")
                    .with("budget", "10")
                    .with("revenue", "20"),
            ],
        );
        let keywords = RawTable::new(
            "keywords",
            vec![
                RawRow::new(1).with("keywords", "[{'id': 1, 'name': 'heist'}]"),
                RawRow::new(2).with("keywords", "[]"),
            ],
        );
        let credits = RawTable::new("credits", vec![RawRow::new(1), RawRow::new(2)]);
        SourceTables {
            metadata,
            keywords,
            credits,
        }
    }

    #[test]
    fn test_offline_stage_order() {
        let pipeline = Pipeline::offline(&Config::default());
        assert_eq!(
            pipeline.stage_names(),
            vec![STAGE_JOIN, STAGE_NORMALIZE, STAGE_FILTER, STAGE_CORRECT]
        );
    }

    #[test]
    fn test_full_pipeline_runs_every_stage_in_order() {
        let fetcher = crate::infra::ReqwestPosterFetcher::new(std::time::Duration::from_secs(1)).unwrap();
        let pipeline = Pipeline::full(&Config::default(), Arc::new(fetcher));
        assert_eq!(pipeline.stage_names(), crate::constants::pipeline_stage_names());
    }

    #[tokio::test]
    async fn test_offline_run_reports_per_stage_counts() {
        let pipeline = Pipeline::offline(&Config::default());
        let output = pipeline.run(tables()).await.unwrap();
        let summary = &output.summary;

        assert_eq!(summary.metadata_rows, 2);
        assert_eq!(summary.joined_rows, 2);
        assert_eq!(summary.stages.len(), 3);

        let filter = summary.stage(STAGE_FILTER).unwrap();
        assert_eq!(filter.input, 2);
        assert_eq!(filter.output, 1);
        assert_eq!(filter.excluded.get("not_released"), Some(&1));

        assert_eq!(summary.output_rows, 1);
        assert_eq!(output.records.ids(), vec![1]);

        let rendered = summary.to_string();
        assert!(rendered.contains("Joined rows: 2"));
        assert!(rendered.contains("not_released=1"));
    }

    #[tokio::test]
    async fn test_summary_serializes_to_json() {
        let pipeline = Pipeline::offline(&Config::default());
        let output = pipeline.run(tables()).await.unwrap();
        let json = output.summary.to_json().unwrap();
        assert!(!json.contains('\n'));

        let value: serde_json::Value = serde_json::from_str(&json).unwrap();
        assert_eq!(value["run_id"], output.summary.run_id.to_string());
        assert_eq!(value["joined_rows"], 2);
        assert_eq!(value["output_rows"], 1);
        assert_eq!(value["stages"][1]["stage"], STAGE_FILTER);
        assert_eq!(value["stages"][1]["excluded"]["not_released"], 1);
    }

    #[tokio::test]
    async fn test_duplicate_key_aborts_run() {
        let mut tables = tables();
        tables.credits.rows.push(RawRow::new(2));

        let pipeline = Pipeline::offline(&Config::default());
        let err = pipeline.run(tables).await.unwrap_err();
        assert!(err.to_string().contains("credits"));
    }

    #[test]
    fn test_tally_counts_reasons() {
        let mut excluded = BTreeMap::new();
        tally(&mut excluded, "missing:title");
        tally(&mut excluded, "missing:title");
        tally(&mut excluded, "not_released");
        assert_eq!(excluded.get("missing:title"), Some(&2));
        assert_eq!(
            StageOutcome::with_exclusions(RecordSet::default(), excluded).excluded_total(),
            3
        );
    }
}
