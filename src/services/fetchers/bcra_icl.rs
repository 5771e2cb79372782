// src/services/fetchers/bcra_icl.rs
use async_trait::async_trait;
use calamine::{open_workbook_auto_from_rs, Data, Reader as WorkbookReader};
use chrono::{Duration as DateDelta, NaiveDate};
use csv::ReaderBuilder;
use log::{debug, error, info};
use std::io::Cursor;
use std::time::Duration;

use super::{http_client, normalize_value, parse_decimal, IndexFetcher};
use crate::models::{IndexType, NewIndexValue};
use crate::BoxError;

const SOURCE: &str = "bcra.gob.ar";
const SUPPORTED: [IndexType; 1] = [IndexType::Icl];
/// Title and column header rows precede the data.
const HEADER_ROWS: usize = 2;
const OLE2_MAGIC: [u8; 4] = [0xD0, 0xCF, 0x11, 0xE0];
const ZIP_MAGIC: [u8; 2] = [b'P', b'K'];

/// Daily ICL published by the central bank as a spreadsheet.
pub struct BcraIclFetcher {
    client: reqwest::Client,
    url: String,
}

impl BcraIclFetcher {
    pub fn new(url: &str, timeout: Duration) -> Result<Self, BoxError> {
        Ok(BcraIclFetcher {
            client: http_client(timeout)?,
            url: url.to_string(),
        })
    }

    async fn download(&self) -> Result<Vec<u8>, BoxError> {
        info!("Fetching ICL spreadsheet from URL: {}", self.url);
        match self.client.get(&self.url).send().await.and_then(|r| r.error_for_status()) {
            Ok(resp) => {
                let bytes = resp.bytes().await?;
                info!("Downloaded ICL spreadsheet: {} bytes", bytes.len());
                Ok(bytes.to_vec())
            }
            Err(e) => {
                error!("HTTP error fetching ICL from BCRA: {}", e);
                Err(e.into())
            }
        }
    }
}

/// A spreadsheet cell reduced to what the ICL columns can hold.
#[derive(Debug, Clone, PartialEq)]
pub enum SheetCell {
    Number(f64),
    Text(String),
    Empty,
}

impl From<&Data> for SheetCell {
    fn from(cell: &Data) -> Self {
        match cell {
            Data::Float(f) => SheetCell::Number(*f),
            Data::Int(i) => SheetCell::Number(*i as f64),
            Data::DateTime(dt) => SheetCell::Number(dt.as_f64()),
            Data::String(s) | Data::DateTimeIso(s) => SheetCell::Text(s.clone()),
            _ => SheetCell::Empty,
        }
    }
}

/// Days since 1899-12-30, the 1900 date system epoch.
fn excel_serial_to_date(serial: f64) -> Option<NaiveDate> {
    if !(1.0..=2_958_465.0).contains(&serial) {
        return None;
    }
    let epoch = NaiveDate::from_ymd_opt(1899, 12, 30)?;
    epoch.checked_add_signed(DateDelta::days(serial.trunc() as i64))
}

fn cell_date(cell: &SheetCell) -> Option<NaiveDate> {
    match cell {
        SheetCell::Number(serial) => excel_serial_to_date(*serial),
        SheetCell::Text(raw) => {
            let raw = raw.trim();
            if raw.contains('/') {
                NaiveDate::parse_from_str(raw, "%d/%m/%Y").ok()
            } else {
                raw.get(..10).and_then(|d| NaiveDate::parse_from_str(d, "%Y-%m-%d").ok())
            }
        }
        SheetCell::Empty => None,
    }
}

fn cell_value(cell: &SheetCell) -> Option<bigdecimal::BigDecimal> {
    match cell {
        SheetCell::Number(n) if n.is_finite() => parse_decimal(&n.to_string()),
        SheetCell::Text(raw) => parse_decimal(raw),
        _ => None,
    }
}

/// Turns `(date, value)` rows into ICL records, oldest first.
pub fn parse_rows<I>(rows: I) -> Vec<NewIndexValue>
where
    I: IntoIterator<Item = (SheetCell, SheetCell)>,
{
    let mut values: Vec<NewIndexValue> = rows
        .into_iter()
        .enumerate()
        .skip(HEADER_ROWS)
        .filter_map(|(row_num, (date_cell, value_cell))| {
            match (cell_date(&date_cell), cell_value(&value_cell)) {
                (Some(value_date), Some(value)) => Some(NewIndexValue {
                    index_type: IndexType::Icl,
                    country_code: "AR".to_string(),
                    value_date,
                    value: normalize_value(value),
                    source: SOURCE.to_string(),
                    raw_payload: None,
                }),
                _ => {
                    debug!("Could not parse ICL row {}: {:?} / {:?}", row_num, date_cell, value_cell);
                    None
                }
            }
        })
        .collect();
    values.sort_by_key(|v| v.value_date);
    values
}

/// Reads the first worksheet of an `.xls`/`.xlsx` workbook.
pub fn parse_workbook(bytes: Vec<u8>) -> Result<Vec<NewIndexValue>, BoxError> {
    let mut workbook = open_workbook_auto_from_rs(Cursor::new(bytes))?;
    let range = workbook
        .worksheet_range_at(0)
        .ok_or("ICL workbook has no worksheets")??;
    let rows = range.rows().map(|row| {
        let date = row.first().map(SheetCell::from).unwrap_or(SheetCell::Empty);
        let value = row.get(1).map(SheetCell::from).unwrap_or(SheetCell::Empty);
        (date, value)
    });
    Ok(parse_rows(rows.collect::<Vec<_>>()))
}

/// Reads a CSV export of the same two columns. `;` or `,` separated.
pub fn parse_csv(text: &str) -> Result<Vec<NewIndexValue>, BoxError> {
    let first_line = text.lines().find(|l| !l.trim().is_empty()).unwrap_or("");
    let delimiter = if first_line.contains(';') { b';' } else { b',' };
    let mut rdr = ReaderBuilder::new()
        .has_headers(false)
        .flexible(true)
        .delimiter(delimiter)
        .from_reader(text.as_bytes());

    let mut rows = Vec::new();
    for record in rdr.records() {
        let record = record?;
        let cell = |i: usize| match record.get(i).map(str::trim) {
            Some("") | None => SheetCell::Empty,
            Some(s) => SheetCell::Text(s.to_string()),
        };
        rows.push((cell(0), cell(1)));
    }
    Ok(parse_rows(rows))
}

pub fn parse_spreadsheet(bytes: Vec<u8>) -> Result<Vec<NewIndexValue>, BoxError> {
    if bytes.starts_with(&OLE2_MAGIC) || bytes.starts_with(&ZIP_MAGIC) {
        parse_workbook(bytes)
    } else {
        parse_csv(&String::from_utf8_lossy(&bytes))
    }
}

#[async_trait]
impl IndexFetcher for BcraIclFetcher {
    fn name(&self) -> &str {
        "bcra-icl"
    }

    fn supported_index_types(&self) -> &[IndexType] {
        &SUPPORTED
    }

    fn country_code(&self) -> &str {
        "AR"
    }

    async fn fetch_latest(&self) -> Result<Vec<NewIndexValue>, BoxError> {
        let mut values = self.fetch_all_historical().await?;
        Ok(values.pop().into_iter().collect())
    }

    async fn fetch_all_historical(&self) -> Result<Vec<NewIndexValue>, BoxError> {
        let bytes = self.download().await?;
        let values = parse_spreadsheet(bytes)?;
        info!("Fetched {} ICL historical values from BCRA", values.len());
        Ok(values)
    }
}
