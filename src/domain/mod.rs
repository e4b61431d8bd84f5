//! Domain data shapes shared across the pipeline stages

use chrono::NaiveDate;
use std::collections::{BTreeMap, HashMap};

use crate::error::SchemaError;

/// One row of a source table. Empty cells are not stored.
#[derive(Debug, Clone, PartialEq)]
pub struct RawRow {
    pub id: i64,
    pub values: HashMap<String, String>,
}

impl RawRow {
    pub fn new(id: i64) -> Self {
        Self {
            id,
            values: HashMap::new(),
        }
    }

    pub fn with(mut self, column: &str, value: &str) -> Self {
        self.set(column, value);
        self
    }

    /// Store a cell; empty text is the absence marker and is dropped.
    pub fn set(&mut self, column: &str, value: &str) {
        if !value.is_empty() {
            self.values.insert(column.to_string(), value.to_string());
        }
    }

    pub fn get(&self, column: &str) -> Option<&str> {
        self.values.get(column).map(String::as_str)
    }
}

/// An ordered source table keyed by an integer `id`
#[derive(Debug, Clone, PartialEq)]
pub struct RawTable {
    pub name: String,
    pub rows: Vec<RawRow>,
}

impl RawTable {
    pub fn new(name: &str, rows: Vec<RawRow>) -> Self {
        Self {
            name: name.to_string(),
            rows,
        }
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    /// Build an id -> row lookup, failing if any id repeats.
    pub fn index(&self) -> Result<HashMap<i64, &RawRow>, SchemaError> {
        let mut index = HashMap::with_capacity(self.rows.len());
        for row in &self.rows {
            if index.insert(row.id, row).is_some() {
                return Err(SchemaError::DuplicateKey {
                    table: self.name.clone(),
                    id: row.id,
                });
            }
        }
        Ok(index)
    }
}

/// A list-valued field as it moves from encoded text to decoded names
#[derive(Debug, Clone, PartialEq)]
pub enum ListField {
    Absent,
    Encoded(String),
    Names(Vec<String>),
}

impl ListField {
    pub fn from_raw(value: Option<&str>) -> Self {
        match value {
            Some(text) => ListField::Encoded(text.to_string()),
            None => ListField::Absent,
        }
    }

    pub fn is_absent(&self) -> bool {
        matches!(self, ListField::Absent)
    }

    /// Decoded names, empty when absent or still encoded
    pub fn names(&self) -> &[String] {
        match self {
            ListField::Names(names) => names,
            _ => &[],
        }
    }

    pub fn contains(&self, name: &str) -> bool {
        self.names().iter().any(|n| n == name)
    }
}

/// `belongs_to_collection` before and after decoding
#[derive(Debug, Clone, PartialEq)]
pub enum Collection {
    Encoded(String),
    Named(String),
    NoCollection,
}

impl Collection {
    pub fn from_raw(value: Option<&str>) -> Self {
        match value {
            Some(text) => Collection::Encoded(text.to_string()),
            None => Collection::NoCollection,
        }
    }
}

/// The homepage URL until the filter reduces it to a presence flag
#[derive(Debug, Clone, PartialEq)]
pub enum Homepage {
    Url(Option<String>),
    Flag(bool),
}

impl Homepage {
    pub fn as_flag(&self) -> bool {
        match self {
            Homepage::Url(url) => url.is_some(),
            Homepage::Flag(flag) => *flag,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Rgb {
    pub red: u8,
    pub green: u8,
    pub blue: u8,
}

impl Rgb {
    pub const BLACK: Rgb = Rgb::new(0, 0, 0);

    pub const fn new(red: u8, green: u8, blue: u8) -> Self {
        Self { red, green, blue }
    }
}

impl From<[u8; 3]> for Rgb {
    fn from(channels: [u8; 3]) -> Self {
        Rgb::new(channels[0], channels[1], channels[2])
    }
}

/// One film and everything derived from it.
///
/// Raw text fields are parsed by the stage that first needs them typed;
/// `None` on a scalar means the value was missing or unparseable.
#[derive(Debug, Clone, PartialEq)]
pub struct MovieRecord {
    pub id: i64,
    pub title: Option<String>,
    pub overview: Option<String>,
    pub tagline: Option<String>,
    pub status: Option<String>,
    pub release_date: Option<NaiveDate>,
    pub runtime: Option<f64>,
    pub budget: Option<f64>,
    pub revenue: Option<f64>,
    pub homepage: Homepage,
    pub original_language: Option<String>,
    pub poster_path: Option<String>,
    pub adult: bool,
    pub popularity: Option<f64>,
    pub vote_average: Option<f64>,
    pub belongs_to_collection: Collection,

    pub genres: ListField,
    pub production_companies: ListField,
    pub production_countries: ListField,
    pub spoken_languages: ListField,
    pub keywords: ListField,
    pub cast: ListField,
    pub crew: ListField,

    pub dominant_color: Option<Rgb>,
    pub english: Option<bool>,
    pub produced_in_us: Option<bool>,
    pub originally_english: Option<bool>,
    pub genre_flags: BTreeMap<String, bool>,
}

impl MovieRecord {
    /// A record with only its key set; every other field absent.
    pub fn empty(id: i64) -> Self {
        Self {
            id,
            title: None,
            overview: None,
            tagline: None,
            status: None,
            release_date: None,
            runtime: None,
            budget: None,
            revenue: None,
            homepage: Homepage::Url(None),
            original_language: None,
            poster_path: None,
            adult: false,
            popularity: None,
            vote_average: None,
            belongs_to_collection: Collection::NoCollection,
            genres: ListField::Absent,
            production_companies: ListField::Absent,
            production_countries: ListField::Absent,
            spoken_languages: ListField::Absent,
            keywords: ListField::Absent,
            cast: ListField::Absent,
            crew: ListField::Absent,
            dominant_color: None,
            english: None,
            produced_in_us: None,
            originally_english: None,
            genre_flags: BTreeMap::new(),
        }
    }

    /// Mutable access to a list field by its column name
    pub fn list_field_mut(&mut self, field: ListColumn) -> &mut ListField {
        match field {
            ListColumn::Genres => &mut self.genres,
            ListColumn::ProductionCompanies => &mut self.production_companies,
            ListColumn::ProductionCountries => &mut self.production_countries,
            ListColumn::SpokenLanguages => &mut self.spoken_languages,
            ListColumn::Keywords => &mut self.keywords,
            ListColumn::Cast => &mut self.cast,
            ListColumn::Crew => &mut self.crew,
        }
    }

    pub fn has_any_genre(&self) -> bool {
        self.genre_flags.values().any(|flag| *flag)
    }
}

/// The list-valued columns decoded by the normalizer
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ListColumn {
    Genres,
    ProductionCompanies,
    ProductionCountries,
    SpokenLanguages,
    Keywords,
    Cast,
    Crew,
}

impl ListColumn {
    pub const ALL: [ListColumn; 7] = [
        ListColumn::Genres,
        ListColumn::ProductionCompanies,
        ListColumn::ProductionCountries,
        ListColumn::SpokenLanguages,
        ListColumn::Keywords,
        ListColumn::Cast,
        ListColumn::Crew,
    ];

    pub fn column_name(&self) -> &'static str {
        match self {
            ListColumn::Genres => "genres",
            ListColumn::ProductionCompanies => "production_companies",
            ListColumn::ProductionCountries => "production_countries",
            ListColumn::SpokenLanguages => "spoken_languages",
            ListColumn::Keywords => "keywords",
            ListColumn::Cast => "cast",
            ListColumn::Crew => "crew",
        }
    }
}

/// The record set threaded through the stages.
///
/// `genre_columns` stays empty until the categorical encoder runs.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RecordSet {
    pub records: Vec<MovieRecord>,
    pub genre_columns: Vec<String>,
}

impl RecordSet {
    pub fn new(records: Vec<MovieRecord>) -> Self {
        Self {
            records,
            genre_columns: Vec::new(),
        }
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &MovieRecord> {
        self.records.iter()
    }

    pub fn ids(&self) -> Vec<i64> {
        self.records.iter().map(|r| r.id).collect()
    }

    pub fn get(&self, id: i64) -> Option<&MovieRecord> {
        self.records.iter().find(|r| r.id == id)
    }

    pub fn from_parts(records: Vec<MovieRecord>, genre_columns: Vec<String>) -> Self {
        Self {
            records,
            genre_columns,
        }
    }

    pub fn into_parts(self) -> (Vec<MovieRecord>, Vec<String>) {
        (self.records, self.genre_columns)
    }
}
