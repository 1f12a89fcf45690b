use crate::error::AppError;
use csv::StringRecord;
use std::collections::HashMap;
use std::fs;
use std::io::Read;
use std::path::Path;
use std::sync::Arc;

const UTF8_BOM: char = '\u{feff}';

#[derive(Debug, Clone)]
pub struct BillingCsv {
    content: String,
}

impl BillingCsv {
    pub fn from_path(path: &Path) -> Result<Self, AppError> {
        let bytes = fs::read(path)?;
        Self::from_bytes(bytes)
    }

    pub fn from_reader<R: Read>(mut reader: R) -> Result<Self, AppError> {
        let mut bytes = Vec::new();
        reader.read_to_end(&mut bytes)?;
        Self::from_bytes(bytes)
    }

    pub fn from_bytes(bytes: Vec<u8>) -> Result<Self, AppError> {
        let content = String::from_utf8(bytes)
            .map_err(|e| std::io::Error::new(std::io::ErrorKind::InvalidData, e))?;
        let content = match content.strip_prefix(UTF8_BOM) {
            Some(rest) => rest.to_string(),
            None => content,
        };
        Ok(Self { content })
    }

    pub fn header(&self) -> Result<Vec<String>, AppError> {
        let mut reader = self.reader();
        let headers = reader.headers()?;
        Ok(headers.iter().map(|h| h.trim().to_string()).collect())
    }

    pub fn records(&self) -> Result<BillingRows<'_>, AppError> {
        let mut reader = self.reader();
        let header: Vec<String> = reader
            .headers()?
            .iter()
            .map(|h| h.trim().to_string())
            .collect();
        let index = Arc::new(
            header
                .iter()
                .enumerate()
                .map(|(i, name)| (name.clone(), i))
                .collect(),
        );
        Ok(BillingRows {
            header,
            index,
            reader,
        })
    }

    fn reader(&self) -> csv::Reader<&[u8]> {
        csv::ReaderBuilder::new()
            .flexible(true)
            .from_reader(self.content.as_bytes())
    }
}

pub struct BillingRows<'a> {
    header: Vec<String>,
    index: Arc<HashMap<String, usize>>,
    reader: csv::Reader<&'a [u8]>,
}

impl BillingRows<'_> {
    pub fn header(&self) -> &[String] {
        &self.header
    }

    pub fn has_column(&self, name: &str) -> bool {
        self.index.contains_key(name)
    }

    pub fn collect_rows(&mut self) -> Result<Vec<RawRow>, AppError> {
        let mut rows = Vec::new();
        for (idx, result) in self.reader.records().enumerate() {
            // records() starts after the header, lines are 1-based
            let line = result
                .as_ref()
                .ok()
                .and_then(|r| r.position())
                .map(|p| p.line() as usize)
                .unwrap_or(idx + 2);
            let record =
                result.map_err(|e| AppError::data(line, "*", format!("CSV parse error: {e}")))?;
            rows.push(RawRow {
                line,
                cells: record,
                index: Arc::clone(&self.index),
            });
        }
        Ok(rows)
    }
}

#[derive(Debug, Clone)]
pub struct RawRow {
    pub line: usize,
    cells: StringRecord,
    index: Arc<HashMap<String, usize>>,
}

impl RawRow {
    // absent columns and short rows read as empty
    pub fn get(&self, column: &str) -> &str {
        self.index
            .get(column)
            .and_then(|&i| self.cells.get(i))
            .unwrap_or("")
    }

    pub fn cells(&self) -> impl Iterator<Item = &str> {
        self.cells.iter()
    }
}
