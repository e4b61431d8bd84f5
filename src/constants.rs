/// Column and value constants shared across the pipeline stages.
/// These names match the headers of the source CSV exports.

// Table names used in schema error reports
pub const METADATA_TABLE: &str = "metadata";
pub const KEYWORDS_TABLE: &str = "keywords";
pub const CREDITS_TABLE: &str = "credits";

pub const ID_COLUMN: &str = "id";

pub const DEFAULT_POSTER_BASE_URL: &str = "http://image.tmdb.org/t/p/w185";
pub const DEFAULT_MIN_GENRE_SUPPORT: usize = 50;

pub const RELEASED_STATUS: &str = "Released";
pub const ENGLISH_LANGUAGE_NAME: &str = "English";
pub const UNITED_STATES_COUNTRY_NAME: &str = "United States of America";
pub const ENGLISH_LANGUAGE_CODE: &str = "en";

/// Value written for records without a collection (numeric zero surrogate).
pub const NO_COLLECTION_SURROGATE: &str = "0";

/// Date format used by `release_date` in both input and output.
pub const RELEASE_DATE_FORMAT: &str = "%Y-%m-%d";

/// Fixed output columns, in order. Genre indicator columns follow these.
pub const OUTPUT_COLUMNS: [&str; 24] = [
    "id",
    "adult",
    "belongs_to_collection",
    "budget",
    "homepage",
    "originally_english",
    "overview",
    "popularity",
    "poster_path",
    "production_companies",
    "produced_in_us",
    "release_date",
    "revenue",
    "runtime",
    "english",
    "tagline",
    "title",
    "vote_average",
    "keywords",
    "cast",
    "crew",
    "red",
    "green",
    "blue",
];

/// Stage names used for logging, metrics labels and summaries
pub const STAGE_JOIN: &str = "join";
pub const STAGE_NORMALIZE: &str = "normalize";
pub const STAGE_FILTER: &str = "filter";
pub const STAGE_CORRECT: &str = "correct";
pub const STAGE_COLOR: &str = "color";
pub const STAGE_ENCODE: &str = "encode";
pub const STAGE_FLAGS: &str = "flags";
pub const STAGE_PRUNE: &str = "prune";

/// All stages in execution order
pub fn pipeline_stage_names() -> Vec<&'static str> {
    vec![
        STAGE_JOIN,
        STAGE_NORMALIZE,
        STAGE_FILTER,
        STAGE_CORRECT,
        STAGE_COLOR,
        STAGE_ENCODE,
        STAGE_FLAGS,
        STAGE_PRUNE,
    ]
}
