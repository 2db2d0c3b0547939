//! Delimited-text record parser
//!
//! Turns the content of one input file into [`PersonRecord`]s.
//!
//! # Format
//! ```text
//! nome,idade,cidade
//! Ana,30,SP
//! Bruno,abc,RJ      <- rejected, age is not an integer
//! Carla,25,MG
//! ```
//!
//! The first line is a header naming the columns; English or Portuguese
//! column names are accepted in any order and case. Fields are trimmed.
//! A bad row is logged and skipped without affecting its neighbours. A header
//! lacking a required column rejects every data row; only a header that cannot
//! be read at all fails the whole file.

use cadastro_common::{IngestError, PersonRecord, Result};
use csv::{ReaderBuilder, StringRecord, Trim};
use tracing::{debug, warn};

const NAME_COLUMNS: &[&str] = &["name", "nome"];
const AGE_COLUMNS: &[&str] = &["age", "idade"];
const CITY_COLUMNS: &[&str] = &["city", "cidade"];

/// A data row the parser skipped
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RowRejection {
    /// 1-based data row number, the header not counted
    pub row: usize,
    pub reason: String,
}

/// Records parsed from one file, in input order, plus the rows that were skipped
#[derive(Debug, Default)]
pub struct ParsedFile {
    pub records: Vec<PersonRecord>,
    pub rejected: Vec<RowRejection>,
}

/// Positions of the required columns within the header, `None` when absent
#[derive(Debug, Clone, Copy)]
struct ColumnIndex {
    name: Option<usize>,
    age: Option<usize>,
    city: Option<usize>,
}

impl ColumnIndex {
    fn resolve(headers: &StringRecord) -> Self {
        let find = |aliases: &[&str]| {
            headers.iter().position(|h| {
                let h = h.trim_start_matches('\u{feff}').trim();
                aliases.iter().any(|a| h.eq_ignore_ascii_case(a))
            })
        };

        Self {
            name: find(NAME_COLUMNS),
            age: find(AGE_COLUMNS),
            city: find(CITY_COLUMNS),
        }
    }

    fn missing(&self) -> Vec<&'static str> {
        [("name", self.name), ("age", self.age), ("city", self.city)]
            .into_iter()
            .filter(|(_, index)| index.is_none())
            .map(|(column, _)| column)
            .collect()
    }
}

#[derive(Debug, Clone)]
pub struct RecordParser {
    delimiter: u8,
}

impl Default for RecordParser {
    fn default() -> Self {
        Self::new(b',')
    }
}

impl RecordParser {
    pub fn new(delimiter: u8) -> Self {
        Self { delimiter }
    }

    /// Parse `text`, tagging every record with `source_file`
    ///
    /// Blank content yields no records. Fails with `MalformedInput` only when
    /// the header cannot be read.
    pub fn parse(&self, text: &str, source_file: &str) -> Result<ParsedFile> {
        let mut parsed = ParsedFile::default();

        if text.trim().is_empty() {
            debug!(source_file, "Empty input, nothing to parse");
            return Ok(parsed);
        }

        let mut reader = ReaderBuilder::new()
            .delimiter(self.delimiter)
            .has_headers(true)
            .trim(Trim::All)
            .flexible(false)
            .from_reader(text.as_bytes());

        let headers = reader
            .headers()
            .map_err(|e| IngestError::MalformedInput(format!("unreadable header: {}", e)))?
            .clone();
        let columns = ColumnIndex::resolve(&headers);
        let missing = columns.missing();
        if !missing.is_empty() {
            warn!(
                source_file,
                missing = ?missing,
                header = ?headers.iter().collect::<Vec<_>>(),
                "Header lacks required columns, every row will be rejected"
            );
        }

        for (index, result) in reader.records().enumerate() {
            let row = index + 1;
            let parsed_row = result
                .map_err(|e| IngestError::RowRejected {
                    row,
                    reason: e.to_string(),
                })
                .and_then(|fields| parse_row(&fields, columns, row, source_file));

            match parsed_row {
                Ok(record) => parsed.records.push(record),
                Err(IngestError::RowRejected { row, reason }) => {
                    warn!(source_file, row, reason = %reason, "Skipping row");
                    parsed.rejected.push(RowRejection { row, reason });
                },
                Err(other) => return Err(other),
            }
        }

        debug!(
            source_file,
            records = parsed.records.len(),
            rejected = parsed.rejected.len(),
            "Parsed file"
        );
        Ok(parsed)
    }
}

fn parse_row(
    fields: &StringRecord,
    columns: ColumnIndex,
    row: usize,
    source_file: &str,
) -> Result<PersonRecord> {
    let name = required(fields, columns.name, "name", row)?;
    let age_raw = required(fields, columns.age, "age", row)?;
    let city = required(fields, columns.city, "city", row)?;

    let age = age_raw.parse::<i32>().map_err(|_| IngestError::RowRejected {
        row,
        reason: format!("invalid age '{}'", age_raw),
    })?;

    Ok(PersonRecord::new(name, age, city, source_file))
}

fn required<'a>(
    fields: &'a StringRecord,
    index: Option<usize>,
    column: &str,
    row: usize,
) -> Result<&'a str> {
    match index.and_then(|i| fields.get(i)) {
        Some(value) if !value.is_empty() => Ok(value),
        _ => Err(IngestError::RowRejected {
            row,
            reason: format!("missing {}", column),
        }),
    }
}
