//! CSV boundary: reads the three source tables and writes the final table.

use csv::{ReaderBuilder, WriterBuilder};
use std::io::Write;
use std::path::Path;
use tracing::info;

use crate::constants::{
    CREDITS_TABLE, ID_COLUMN, KEYWORDS_TABLE, METADATA_TABLE, NO_COLLECTION_SURROGATE,
    OUTPUT_COLUMNS, RELEASE_DATE_FORMAT,
};
use crate::domain::{Collection, ListField, MovieRecord, RawRow, RawTable, RecordSet};
use crate::error::{Result, SchemaError};
use crate::pipeline::SourceTables;

/// Read one headed CSV file into a `RawTable` keyed by its `id` column.
pub fn read_table<P: AsRef<Path>>(path: P, name: &str) -> Result<RawTable> {
    let path = path.as_ref();
    let mut rdr = ReaderBuilder::new()
        .has_headers(true)
        .flexible(true)
        .from_path(path)?;
    let table = read_from(&mut rdr, name)?;
    info!("📥 Read {} rows from {} ({})", table.len(), name, path.display());
    Ok(table)
}

fn read_from<R: std::io::Read>(rdr: &mut csv::Reader<R>, name: &str) -> Result<RawTable> {
    let headers: Vec<String> = rdr.headers()?.iter().map(|h| h.trim().to_string()).collect();
    let id_index = headers
        .iter()
        .position(|h| h == ID_COLUMN)
        .ok_or_else(|| SchemaError::MissingColumn {
            table: name.to_string(),
            column: ID_COLUMN.to_string(),
        })?;

    let mut rows = Vec::new();
    for (row_number, record) in rdr.records().enumerate() {
        let record = record?;
        let raw_id = record.get(id_index).unwrap_or("").trim();
        let id = raw_id.parse::<i64>().map_err(|_| SchemaError::InvalidKey {
            table: name.to_string(),
            row: row_number + 1,
            value: raw_id.to_string(),
        })?;

        let mut row = RawRow::new(id);
        for (column, value) in headers.iter().zip(record.iter()) {
            if column != ID_COLUMN {
                row.set(column, value);
            }
        }
        rows.push(row);
    }

    Ok(RawTable::new(name, rows))
}

/// Read Metadata, Keywords and Credits
pub fn read_source_tables<P: AsRef<Path>>(metadata: P, keywords: P, credits: P) -> Result<SourceTables> {
    Ok(SourceTables {
        metadata: read_table(metadata, METADATA_TABLE)?,
        keywords: read_table(keywords, KEYWORDS_TABLE)?,
        credits: read_table(credits, CREDITS_TABLE)?,
    })
}

/// Write the final table: fixed columns, then one column per genre
pub fn write_output<P: AsRef<Path>>(path: P, records: &RecordSet) -> Result<()> {
    let path = path.as_ref();
    let file = std::fs::File::create(path)?;
    write_records(file, records)?;
    info!("💾 Wrote {} records to {}", records.len(), path.display());
    Ok(())
}

pub fn write_records<W: Write>(writer: W, records: &RecordSet) -> Result<()> {
    let mut wtr = WriterBuilder::new().from_writer(writer);

    let header: Vec<&str> = OUTPUT_COLUMNS
        .iter()
        .copied()
        .chain(records.genre_columns.iter().map(String::as_str))
        .collect();
    wtr.write_record(&header)?;

    for record in records.iter() {
        wtr.write_record(output_row(record, &records.genre_columns)?)?;
    }
    wtr.flush()?;
    Ok(())
}

fn output_row(record: &MovieRecord, genre_columns: &[String]) -> Result<Vec<String>> {
    let (red, green, blue) = match record.dominant_color {
        Some(rgb) => (rgb.red.to_string(), rgb.green.to_string(), rgb.blue.to_string()),
        None => (String::new(), String::new(), String::new()),
    };

    let mut row = vec![
        record.id.to_string(),
        flag(record.adult),
        collection(&record.belongs_to_collection),
        whole(record.budget),
        flag(record.homepage.as_flag()),
        optional_flag(record.originally_english),
        text(&record.overview),
        number(record.popularity),
        text(&record.poster_path),
        list(&record.production_companies)?,
        optional_flag(record.produced_in_us),
        record
            .release_date
            .map(|d| d.format(RELEASE_DATE_FORMAT).to_string())
            .unwrap_or_default(),
        whole(record.revenue),
        number(record.runtime),
        optional_flag(record.english),
        text(&record.tagline),
        text(&record.title),
        number(record.vote_average),
        list(&record.keywords)?,
        list(&record.cast)?,
        list(&record.crew)?,
        red,
        green,
        blue,
    ];

    for genre in genre_columns {
        row.push(flag(record.genre_flags.get(genre).copied().unwrap_or(false)));
    }
    Ok(row)
}

fn flag(value: bool) -> String {
    if value { "1" } else { "0" }.to_string()
}

fn optional_flag(value: Option<bool>) -> String {
    value.map(flag).unwrap_or_default()
}

fn text(value: &Option<String>) -> String {
    value.clone().unwrap_or_default()
}

fn number(value: Option<f64>) -> String {
    value.map(|v| v.to_string()).unwrap_or_default()
}

fn whole(value: Option<f64>) -> String {
    value.map(|v| format!("{:.0}", v)).unwrap_or_default()
}

fn collection(value: &Collection) -> String {
    match value {
        Collection::Named(name) => name.clone(),
        Collection::NoCollection => NO_COLLECTION_SURROGATE.to_string(),
        Collection::Encoded(text) => text.clone(),
    }
}

fn list(value: &ListField) -> Result<String> {
    Ok(match value {
        ListField::Absent => String::new(),
        ListField::Encoded(text) => text.clone(),
        ListField::Names(names) => serde_json::to_string(names)?,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::{Homepage, Rgb};
    use crate::error::PipelineError;
    use chrono::NaiveDate;

    fn reader(data: &str) -> csv::Reader<&[u8]> {
        ReaderBuilder::new()
            .has_headers(true)
            .flexible(true)
            .from_reader(data.as_bytes())
    }

    #[test]
    fn test_read_keeps_quoted_literals_and_drops_empty_cells() {
        let data = "id,keywords,note\n\
                    862,\"[{'id': 931, 'name': 'jealousy'}]\",\n\
                    8844,[],x\n";
        let table = read_from(&mut reader(data), "keywords").unwrap();

        assert_eq!(table.len(), 2);
        assert_eq!(table.rows[0].id, 862);
        assert_eq!(table.rows[0].get("keywords"), Some("[{'id': 931, 'name': 'jealousy'}]"));
        assert_eq!(table.rows[0].get("note"), None);
        assert_eq!(table.rows[1].get("note"), Some("x"));
    }

    #[test]
    fn test_missing_id_column_is_schema_error() {
        let err = read_from(&mut reader("movie_id,title\n1,Heat\n"), "metadata").unwrap_err();
        assert!(matches!(
            err,
            PipelineError::Schema(SchemaError::MissingColumn { .. })
        ));
    }

    #[test]
    fn test_non_integer_id_is_schema_error() {
        let err = read_from(&mut reader("id,title\n1,Heat\n1997-08-20,Bad\n"), "metadata").unwrap_err();
        match err {
            PipelineError::Schema(SchemaError::InvalidKey { table, row, value }) => {
                assert_eq!(table, "metadata");
                assert_eq!(row, 2);
                assert_eq!(value, "1997-08-20");
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn test_written_table_is_utf8_and_reads_back() {
        let mut record = MovieRecord::empty(194);
        record.title = Some("Amélie".to_string());
        record.overview = Some("Le Fabuleux Destin d'Amélie Poulain, à Montmartre…".to_string());
        record.cast = ListField::Names(vec!["Audrey Tautou".to_string(), "Mathieu Kassovitz".to_string()]);
        record.crew = ListField::Names(vec!["Jean-Pierre Jeunet".to_string(), "Bruno Delbonnel".to_string()]);
        record.production_companies = ListField::Names(vec!["Studio Canal Ω".to_string()]);

        let mut buf = Vec::new();
        write_records(&mut buf, &RecordSet::new(vec![record])).unwrap();
        let text = String::from_utf8(buf).unwrap();
        assert!(text.contains("Amélie"));

        let mut rdr = csv::Reader::from_reader(text.as_bytes());
        let row = rdr.records().next().unwrap().unwrap();
        assert_eq!(&row[6], "Le Fabuleux Destin d'Amélie Poulain, à Montmartre…");
        assert_eq!(&row[9], r#"["Studio Canal Ω"]"#);
        assert_eq!(&row[16], "Amélie");
    }

    #[test]
    fn test_output_row_formatting() {
        let mut record = MovieRecord::empty(862);
        record.title = Some("Toy Story".to_string());
        record.budget = Some(30_000_000.0);
        record.revenue = Some(373_554_033.0);
        record.runtime = Some(81.0);
        record.release_date = NaiveDate::from_ymd_opt(1995, 10, 30);
        record.homepage = Homepage::Flag(true);
        record.tagline = Some(String::new());
        record.cast = ListField::Names(vec!["Tom Hanks".to_string(), "Tim Allen".to_string()]);
        record.english = Some(true);
        record.produced_in_us = Some(true);
        record.originally_english = Some(true);
        record.dominant_color = Some(Rgb::new(12, 34, 56));
        record.genre_flags.insert("Animation".to_string(), true);
        record.genre_flags.insert("Drama".to_string(), false);

        let genres = vec!["Animation".to_string(), "Drama".to_string()];
        let row = output_row(&record, &genres).unwrap();

        assert_eq!(row.len(), OUTPUT_COLUMNS.len() + 2);
        assert_eq!(row[0], "862");
        assert_eq!(row[1], "0");
        assert_eq!(row[2], "0");
        assert_eq!(row[3], "30000000");
        assert_eq!(row[4], "1");
        assert_eq!(row[11], "1995-10-30");
        assert_eq!(row[12], "373554033");
        assert_eq!(row[19], r#"["Tom Hanks","Tim Allen"]"#);
        assert_eq!(&row[21..24], &["12", "34", "56"]);
        assert_eq!(&row[24..], &["1", "0"]);
    }
}
