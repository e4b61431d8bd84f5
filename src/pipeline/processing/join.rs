use chrono::NaiveDate;
use tracing::{debug, info};

use crate::constants::RELEASE_DATE_FORMAT;
use crate::domain::{Collection, Homepage, ListField, MovieRecord, RawRow, RecordSet};
use crate::error::Result;
use crate::pipeline::SourceTables;

/// Left outer join of Keywords and Credits onto Metadata by `id`.
///
/// Scalars are typed here; list fields and the collection stay encoded
/// until the normalizer runs. Columns not carried by `MovieRecord`
/// (`imdb_id`, `original_title`, `video`, `vote_count`) are dropped.
pub struct TableJoiner {
    poster_base_url: String,
}

impl TableJoiner {
    pub fn new(poster_base_url: &str) -> Self {
        Self {
            poster_base_url: poster_base_url.trim_end_matches('/').to_string(),
        }
    }

    pub fn join(&self, tables: &SourceTables) -> Result<RecordSet> {
        // every table must be uniquely keyed, Metadata included
        tables.metadata.index()?;
        let keywords = tables.keywords.index()?;
        let credits = tables.credits.index()?;

        let mut unmatched_keywords = 0usize;
        let mut unmatched_credits = 0usize;

        let records: Vec<MovieRecord> = tables
            .metadata
            .rows
            .iter()
            .map(|row| {
                let keyword_row = keywords.get(&row.id).copied();
                let credit_row = credits.get(&row.id).copied();
                if keyword_row.is_none() {
                    unmatched_keywords += 1;
                }
                if credit_row.is_none() {
                    unmatched_credits += 1;
                }
                self.build_record(row, keyword_row, credit_row)
            })
            .collect();

        if unmatched_keywords > 0 || unmatched_credits > 0 {
            info!(
                "🔗 {} records without keywords, {} without credits",
                unmatched_keywords, unmatched_credits
            );
        }

        Ok(RecordSet::new(records))
    }

    fn build_record(
        &self,
        meta: &RawRow,
        keywords: Option<&RawRow>,
        credits: Option<&RawRow>,
    ) -> MovieRecord {
        let mut record = MovieRecord::empty(meta.id);

        record.title = text(meta, "title");
        record.overview = text(meta, "overview");
        record.tagline = text(meta, "tagline");
        record.status = text(meta, "status");
        record.release_date = date(meta, "release_date");
        record.runtime = number(meta, "runtime");
        record.budget = number(meta, "budget");
        record.revenue = number(meta, "revenue");
        record.homepage = Homepage::Url(text(meta, "homepage"));
        record.original_language = text(meta, "original_language");
        record.poster_path = text(meta, "poster_path").map(|path| self.poster_url(&path));
        record.adult = meta.get("adult").is_some_and(|v| v.eq_ignore_ascii_case("true"));
        record.popularity = number(meta, "popularity");
        record.vote_average = number(meta, "vote_average");
        record.belongs_to_collection = Collection::from_raw(meta.get("belongs_to_collection"));

        record.genres = ListField::from_raw(meta.get("genres"));
        record.production_companies = ListField::from_raw(meta.get("production_companies"));
        record.production_countries = ListField::from_raw(meta.get("production_countries"));
        record.spoken_languages = ListField::from_raw(meta.get("spoken_languages"));

        record.keywords = ListField::from_raw(keywords.and_then(|r| r.get("keywords")));
        record.cast = ListField::from_raw(credits.and_then(|r| r.get("cast")));
        record.crew = ListField::from_raw(credits.and_then(|r| r.get("crew")));

        debug!(id = record.id, "Joined record");
        record
    }

    fn poster_url(&self, path: &str) -> String {
        if path.starts_with("http://") || path.starts_with("https://") {
            return path.to_string();
        }
        if path.starts_with('/') {
            format!("{}{}", self.poster_base_url, path)
        } else {
            format!("{}/{}", self.poster_base_url, path)
        }
    }
}

fn text(row: &RawRow, column: &str) -> Option<String> {
    row.get(column).map(str::to_string)
}

fn number(row: &RawRow, column: &str) -> Option<f64> {
    row.get(column)
        .and_then(|v| v.trim().parse::<f64>().ok())
        .filter(|v| v.is_finite())
}

fn date(row: &RawRow, column: &str) -> Option<NaiveDate> {
    row.get(column)
        .and_then(|v| NaiveDate::parse_from_str(v.trim(), RELEASE_DATE_FORMAT).ok())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::constants::DEFAULT_POSTER_BASE_URL;
    use crate::domain::RawTable;
    use crate::error::{PipelineError, SchemaError};

    fn tables() -> SourceTables {
        SourceTables {
            metadata: RawTable::new(
                "metadata",
                vec![
                    RawRow::new(862)
                        .with("title", "Toy Story")
                        .with("poster_path", "/rhIRbceoE9lR4veEXuwCC2wARtG.jpg")
                        .with("release_date", "1995-10-30")
                        .with("runtime", "81.0")
                        .with("budget", "30000000")
                        .with("adult", "False")
                        .with("imdb_id", "tt0114709")
                        .with("genres", "[{'id': 16, 'name': 'Animation'}]"),
                    RawRow::new(8844)
                        .with("title", "Jumanji")
                        .with("release_date", "not a date")
                        .with("runtime", "n/a"),
                    RawRow::new(31357).with("title", "Waiting to Exhale"),
                ],
            ),
            keywords: RawTable::new(
                "keywords",
                vec![
                    RawRow::new(8844).with("keywords", "[{'id': 10090, 'name': 'board game'}]"),
                    RawRow::new(862).with("keywords", "[{'id': 931, 'name': 'jealousy'}]"),
                    // not in metadata
                    RawRow::new(1),
                ],
            ),
            credits: RawTable::new(
                "credits",
                vec![RawRow::new(862)
                    .with("cast", "[{'name': 'Tom Hanks'}]")
                    .with("crew", "[{'name': 'John Lasseter'}]")],
            ),
        }
    }

    #[test]
    fn test_join_preserves_metadata_ids_and_order() {
        let joined = TableJoiner::new(DEFAULT_POSTER_BASE_URL).join(&tables()).unwrap();
        assert_eq!(joined.ids(), vec![862, 8844, 31357]);
        assert!(joined.get(1).is_none());
    }

    #[test]
    fn test_join_unions_columns_and_marks_missing_as_absent() {
        let joined = TableJoiner::new(DEFAULT_POSTER_BASE_URL).join(&tables()).unwrap();

        let toy_story = joined.get(862).unwrap();
        assert!(matches!(toy_story.keywords, ListField::Encoded(_)));
        assert!(matches!(toy_story.cast, ListField::Encoded(_)));
        assert!(matches!(toy_story.genres, ListField::Encoded(_)));

        let jumanji = joined.get(8844).unwrap();
        assert!(matches!(jumanji.keywords, ListField::Encoded(_)));
        assert_eq!(jumanji.cast, ListField::Absent);
        assert_eq!(jumanji.crew, ListField::Absent);

        let exhale = joined.get(31357).unwrap();
        assert_eq!(exhale.keywords, ListField::Absent);
    }

    #[test]
    fn test_join_types_scalars() {
        let joined = TableJoiner::new(DEFAULT_POSTER_BASE_URL).join(&tables()).unwrap();

        let toy_story = joined.get(862).unwrap();
        assert_eq!(toy_story.release_date, NaiveDate::from_ymd_opt(1995, 10, 30));
        assert_eq!(toy_story.runtime, Some(81.0));
        assert_eq!(toy_story.budget, Some(30_000_000.0));
        assert!(!toy_story.adult);
        assert_eq!(
            toy_story.poster_path.as_deref(),
            Some("http://image.tmdb.org/t/p/w185/rhIRbceoE9lR4veEXuwCC2wARtG.jpg")
        );

        // unparseable values count as missing
        let jumanji = joined.get(8844).unwrap();
        assert_eq!(jumanji.release_date, None);
        assert_eq!(jumanji.runtime, None);
        assert_eq!(jumanji.homepage, Homepage::Url(None));
        assert_eq!(jumanji.belongs_to_collection, Collection::NoCollection);
    }

    #[test]
    fn test_duplicate_keyword_id_is_fatal() {
        let mut tables = tables();
        tables.keywords.rows.push(RawRow::new(862));

        let err = TableJoiner::new(DEFAULT_POSTER_BASE_URL).join(&tables).unwrap_err();
        match err {
            PipelineError::Schema(SchemaError::DuplicateKey { table, id }) => {
                assert_eq!(table, "keywords");
                assert_eq!(id, 862);
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn test_duplicate_metadata_id_is_fatal() {
        let mut tables = tables();
        tables.metadata.rows.push(RawRow::new(31357));
        assert!(TableJoiner::new(DEFAULT_POSTER_BASE_URL).join(&tables).is_err());
    }

    #[test]
    fn test_poster_url_prefixing() {
        let joiner = TableJoiner::new("http://img.example/w185/");
        assert_eq!(joiner.poster_url("/a.jpg"), "http://img.example/w185/a.jpg");
        assert_eq!(joiner.poster_url("b.jpg"), "http://img.example/w185/b.jpg");
        assert_eq!(
            joiner.poster_url("https://cdn.example/c.jpg"),
            "https://cdn.example/c.jpg"
        );
    }
}
