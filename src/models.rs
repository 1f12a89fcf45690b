use serde::Serialize;
use std::collections::BTreeMap;

pub const TOTAL_LABEL: &str = "Total";

#[derive(Debug, Clone, Copy, Serialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum Provider {
    Aws,
    Azure,
    Gcp,
}

impl Provider {
    pub fn as_label(self) -> &'static str {
        match self {
            Provider::Aws => "AWS Billing Summary",
            Provider::Azure => "Azure Billing Summary",
            Provider::Gcp => "GCP Billing Summary",
        }
    }

    pub fn name(self) -> &'static str {
        match self {
            Provider::Aws => "aws",
            Provider::Azure => "azure",
            Provider::Gcp => "gcp",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum Cell {
    Text(String),
    Integer(i64),
    Number(f64),
    Empty,
}

impl Cell {
    pub fn text(value: impl Into<String>) -> Self {
        Cell::Text(value.into())
    }

    pub fn number(value: Option<f64>) -> Self {
        value.map_or(Cell::Empty, Cell::Number)
    }

    pub fn integer(value: Option<i64>) -> Self {
        value.map_or(Cell::Empty, Cell::Integer)
    }

    #[cfg(test)]
    pub fn as_f64(&self) -> Option<f64> {
        match self {
            Cell::Number(v) => Some(*v),
            Cell::Integer(v) => Some(*v as f64),
            _ => None,
        }
    }

    pub fn render(&self) -> String {
        match self {
            Cell::Text(s) => s.clone(),
            Cell::Integer(v) => v.to_string(),
            Cell::Number(v) => v.to_string(),
            Cell::Empty => String::new(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DetailTable {
    pub columns: Vec<String>,
    pub rows: Vec<Vec<Cell>>,
}

impl DetailTable {
    pub fn new(columns: Vec<String>) -> Self {
        Self {
            columns,
            rows: Vec::new(),
        }
    }

    #[cfg(test)]
    pub fn column_index(&self, name: &str) -> Option<usize> {
        self.columns.iter().position(|c| c == name)
    }

    #[cfg(test)]
    pub fn value(&self, row: usize, column: &str) -> Option<&Cell> {
        let idx = self.column_index(column)?;
        self.rows.get(row)?.get(idx)
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    #[cfg(test)]
    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SummaryRow {
    pub group: String,
    pub values: Vec<f64>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SummaryTable {
    pub group_column: String,
    pub categories: Vec<String>,
    pub groups: Vec<SummaryRow>,
    pub total: SummaryRow,
}

impl SummaryTable {
    pub fn rows(&self) -> impl Iterator<Item = &SummaryRow> {
        self.groups.iter().chain(std::iter::once(&self.total))
    }

    #[cfg(test)]
    pub fn group(&self, name: &str) -> Option<&SummaryRow> {
        self.groups.iter().find(|g| g.group == name)
    }
}

#[derive(Debug, Clone)]
pub struct GroupTotals {
    width: usize,
    sums: BTreeMap<String, Vec<f64>>,
    ungrouped: usize,
}

impl GroupTotals {
    pub fn new(width: usize) -> Self {
        Self {
            width,
            sums: BTreeMap::new(),
            ungrouped: 0,
        }
    }

    pub fn add(&mut self, group: &str, values: &[Option<f64>]) {
        debug_assert_eq!(values.len(), self.width);
        if group.is_empty() {
            self.ungrouped += 1;
            return;
        }
        let sums = self
            .sums
            .entry(group.to_string())
            .or_insert_with(|| vec![0.0; self.width]);
        for (sum, value) in sums.iter_mut().zip(values) {
            if let Some(v) = value {
                *sum += v;
            }
        }
    }

    pub fn ungrouped(&self) -> usize {
        self.ungrouped
    }

    pub fn finish(self, group_column: &str, categories: &[&str]) -> SummaryTable {
        let mut total = vec![0.0; self.width];
        let groups: Vec<SummaryRow> = self
            .sums
            .into_iter()
            .map(|(group, values)| SummaryRow { group, values })
            .collect();
        for row in &groups {
            for (acc, v) in total.iter_mut().zip(&row.values) {
                *acc += v;
            }
        }

        SummaryTable {
            group_column: group_column.to_string(),
            categories: categories.iter().map(|c| c.to_string()).collect(),
            groups,
            total: SummaryRow {
                group: TOTAL_LABEL.to_string(),
                values: total,
            },
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct BillingReport {
    pub provider: Provider,
    pub title: String,
    pub detail: DetailTable,
    pub summary: SummaryTable,
}

impl BillingReport {
    pub fn new(provider: Provider, detail: DetailTable, summary: SummaryTable) -> Self {
        Self {
            provider,
            title: provider.as_label().to_string(),
            detail,
            summary,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum Analysis {
    Report(BillingReport),
    Unrecognized { columns: Vec<String> },
}
