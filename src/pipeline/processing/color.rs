//! ImageColorExtractor: poster URL -> most frequent RGB color.
//!
//! Each poster is fetched in its own tokio task; `buffer_unordered` caps how
//! many are in flight. Requests are throttled by an optional token bucket. Decoding and the histogram run on the blocking
//! pool. A record whose fetch ultimately fails is handled by the configured
//! `FetchFailurePolicy`.

use async_trait::async_trait;
use futures::stream::{self, StreamExt};
use rand::Rng;
use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::{debug, info, warn};

use crate::app::ports::{FetchError, PosterFetchPort, RateLimiterPort};
use crate::config::{ColorSettings, FetchFailurePolicy};
use crate::constants::STAGE_COLOR;
use crate::domain::{RecordSet, Rgb};
use crate::error::Result;
use crate::observability::metrics;
use crate::pipeline::{tally, PipelineStage, StageOutcome};

/// Decode an image and return its most frequent RGB color.
///
/// Alpha is discarded before counting. Ties go to the color encountered
/// first in row-major order. An undecodable or empty image is a permanent
/// failure.
pub fn dominant_color(bytes: &[u8]) -> std::result::Result<Rgb, FetchError> {
    let image = image::load_from_memory(bytes)
        .map_err(|e| FetchError::Permanent(format!("undecodable image: {}", e)))?
        .to_rgb8();

    // color -> (count, first pixel index)
    let mut histogram: HashMap<[u8; 3], (usize, usize)> = HashMap::new();
    for (index, pixel) in image.pixels().enumerate() {
        histogram.entry(pixel.0).or_insert((0, index)).0 += 1;
    }

    histogram
        .into_iter()
        .max_by(|(_, (count_a, first_a)), (_, (count_b, first_b))| {
            count_a.cmp(count_b).then(first_b.cmp(first_a))
        })
        .map(|(channels, _)| Rgb::from(channels))
        .ok_or_else(|| FetchError::Permanent("image has no pixels".to_string()))
}

pub struct ImageColorExtractor {
    worker: PosterWorker,
}

impl ImageColorExtractor {
    pub fn new(
        fetcher: Arc<dyn PosterFetchPort>,
        limiter: Arc<dyn RateLimiterPort>,
        settings: ColorSettings,
    ) -> Self {
        Self {
            worker: PosterWorker {
                fetcher,
                limiter,
                settings: Arc::new(settings),
            },
        }
    }
}

/// Owned handles for one poster job, cloned into each spawned task
#[derive(Clone)]
struct PosterWorker {
    fetcher: Arc<dyn PosterFetchPort>,
    limiter: Arc<dyn RateLimiterPort>,
    settings: Arc<ColorSettings>,
}

impl PosterWorker {
    /// Exponential backoff with up to one base interval of jitter
    fn backoff(&self, attempt: u32) -> Duration {
        let base = self.settings.backoff_base_ms;
        let exp = base.saturating_mul(1u64 << attempt.min(16));
        let jitter = if base > 0 {
            rand::thread_rng().gen_range(0..base)
        } else {
            0
        };
        Duration::from_millis(exp.saturating_add(jitter))
    }

    async fn fetch_once(&self, url: &str) -> std::result::Result<Vec<u8>, FetchError> {
        self.limiter.acquire().await;
        let started = Instant::now();
        let result = tokio::time::timeout(self.settings.request_timeout(), self.fetcher.fetch(url))
            .await
            .unwrap_or_else(|_| Err(FetchError::Transient(format!("timed out fetching {}", url))));
        metrics::color::fetch_duration(started.elapsed().as_secs_f64());
        result
    }

    /// Fetch with retries on transient failures only
    async fn fetch_with_retry(&self, id: i64, url: &str) -> std::result::Result<Vec<u8>, FetchError> {
        let mut attempt = 0u32;
        loop {
            match self.fetch_once(url).await {
                Ok(bytes) => {
                    metrics::color::fetch_attempt("success");
                    return Ok(bytes);
                }
                Err(e) if e.is_transient() && attempt < self.settings.max_retries => {
                    metrics::color::fetch_attempt("transient");
                    let delay = self.backoff(attempt);
                    warn!(
                        "⚠️ Poster fetch for record {} failed (attempt {}/{}), retrying in {:?}: {}",
                        id,
                        attempt + 1,
                        self.settings.max_retries + 1,
                        delay,
                        e
                    );
                    tokio::time::sleep(delay).await;
                    attempt += 1;
                }
                Err(e) => {
                    metrics::color::fetch_attempt(if e.is_transient() { "transient" } else { "permanent" });
                    return Err(e);
                }
            }
        }
    }

    /// Fetch and analyse one poster. The outer error is reserved for a
    /// panicked or cancelled blocking task.
    async fn extract(
        &self,
        id: i64,
        url: Option<String>,
    ) -> Result<(i64, std::result::Result<Rgb, FetchError>)> {
        let Some(url) = url else {
            return Ok((id, Err(FetchError::Permanent("no poster_path".to_string()))));
        };

        let bytes = match self.fetch_with_retry(id, &url).await {
            Ok(bytes) => bytes,
            Err(e) => return Ok((id, Err(e))),
        };

        let color = tokio::task::spawn_blocking(move || dominant_color(&bytes)).await?;
        if let Ok(rgb) = &color {
            debug!(id, ?rgb, "Extracted dominant color");
        }
        Ok((id, color))
    }
}

#[async_trait]
impl PipelineStage for ImageColorExtractor {
    fn name(&self) -> &'static str {
        STAGE_COLOR
    }

    async fn apply(&self, records: RecordSet) -> Result<StageOutcome> {
        // records that already carry a color are not fetched again
        let jobs: Vec<(i64, Option<String>)> = records
            .iter()
            .filter(|r| r.dominant_color.is_none())
            .map(|r| (r.id, r.poster_path.clone()))
            .collect();

        let settings = &self.worker.settings;
        info!(
            "🎨 Extracting poster colors for {} records (concurrency {})",
            jobs.len(),
            settings.concurrency
        );

        // each job is its own task; buffer_unordered bounds how many exist at once
        let mut results = stream::iter(jobs)
            .map(|(id, url)| {
                let worker = self.worker.clone();
                tokio::spawn(async move { worker.extract(id, url).await })
            })
            .buffer_unordered(settings.concurrency.max(1));

        let mut colors: HashMap<i64, std::result::Result<Rgb, FetchError>> = HashMap::new();
        while let Some(joined) = results.next().await {
            let (id, color) = joined??;
            colors.insert(id, color);
        }
        drop(results);

        let (records, genre_columns) = records.into_parts();
        let input = records.len();
        let mut excluded = BTreeMap::new();
        let mut kept = Vec::with_capacity(input);
        let mut defaulted = 0usize;

        for mut record in records {
            match colors.remove(&record.id) {
                None => kept.push(record),
                Some(Ok(rgb)) => {
                    record.dominant_color = Some(rgb);
                    kept.push(record);
                }
                Some(Err(e)) => match settings.on_failure {
                    FetchFailurePolicy::Exclude => {
                        warn!("❌ Excluding record {}: {}", record.id, e);
                        tally(&mut excluded, "poster_unavailable");
                    }
                    FetchFailurePolicy::DefaultColor => {
                        warn!("❌ Using default color for record {}: {}", record.id, e);
                        record.dominant_color = Some(settings.default_rgb());
                        defaulted += 1;
                        kept.push(record);
                    }
                },
            }
        }

        info!(
            "✅ Colors assigned to {} of {} records ({} defaulted)",
            kept.len(),
            input,
            defaulted
        );
        Ok(StageOutcome::with_exclusions(
            RecordSet::from_parts(kept, genre_columns),
            excluded,
        ))
    }
}
