use crate::error::AppError;
use crate::input::{BillingCsv, RawRow};
use crate::models::{BillingReport, Cell, DetailTable, GroupTotals, Provider};
use crate::period::{parse_timestamp, span_days, HOURS_PER_DAY, SECONDS_PER_HOUR};
use crate::providers::{original_cells, with_derived_columns, BillingPipeline};
use chrono::NaiveDateTime;
use tracing::{debug, info, warn};

const USAGE_AMOUNT: &str = "Usage amount";
const USAGE_UNIT: &str = "Usage unit";
const SKU_DESCRIPTION: &str = "SKU description";
const SERVICE_DESCRIPTION: &str = "Service description";
const USAGE_START: &str = "Usage start date";
const USAGE_END: &str = "Usage end date";
const PROJECT_ID: &str = "Project ID";

const HOURLY_UNIT: &str = "hour";
const PER_SECOND_UNITS: [&str; 2] = ["vCPU-second", "GHz-second"];
const CORE_MARKER: &str = "Instance Core";
const CPU_TIME_MARKER: &str = "CPU Time";
const COMPUTE_ENGINE: &str = "Compute Engine";
const APP_ENGINE: &str = "App Engine";
const CLOUD_FUNCTIONS: &str = "Cloud Functions";

pub const GROUP_COLUMN: &str = PROJECT_ID;
pub const CATEGORIES: [&str; 3] = [COMPUTE_ENGINE, APP_ENGINE, CLOUD_FUNCTIONS];

const DERIVED_COLUMNS: [&str; 4] = ["monthlyUsage", COMPUTE_ENGINE, APP_ENGINE, CLOUD_FUNCTIONS];

#[derive(Debug, Clone)]
struct GcpRecord {
    raw: RawRow,
    usage_start: Option<NaiveDateTime>,
    usage_end: Option<NaiveDateTime>,
    /// Coerced amount; `None` when the cell is not numeric.
    usage_amount: Option<f64>,
    usage_unit: String,
    sku_description: String,
    service_description: String,
    project_id: String,
}

#[derive(Debug, Clone, PartialEq)]
struct GcpUsage {
    monthly_usage: Option<f64>,
    compute_engine: Option<f64>,
    app_engine: Option<f64>,
    cloud_functions: Option<f64>,
}

// one span for the whole file, applied to every row
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct BillingSpan {
    pub days: i64,
}

impl BillingSpan {
    pub fn hours(self) -> f64 {
        (self.days * HOURS_PER_DAY) as f64
    }
}

#[derive(Debug, Default)]
pub struct GcpPipeline;

fn optional_date(raw: &RawRow, column: &str) -> Result<Option<NaiveDateTime>, AppError> {
    let value = raw.get(column).trim();
    if value.is_empty() {
        return Ok(None);
    }
    parse_timestamp(value)
        .map(Some)
        .ok_or_else(|| AppError::data(raw.line, column, format!("unparseable date '{value}'")))
}

fn coerce_amount(raw: &str) -> Option<f64> {
    raw.trim().parse::<f64>().ok().filter(|v| v.is_finite())
}

impl GcpPipeline {
    fn parse_record(raw: RawRow) -> Result<GcpRecord, AppError> {
        Ok(GcpRecord {
            usage_start: optional_date(&raw, USAGE_START)?,
            usage_end: optional_date(&raw, USAGE_END)?,
            usage_amount: coerce_amount(raw.get(USAGE_AMOUNT)),
            usage_unit: raw.get(USAGE_UNIT).to_string(),
            sku_description: raw.get(SKU_DESCRIPTION).to_string(),
            service_description: raw.get(SERVICE_DESCRIPTION).to_string(),
            project_id: raw.get(PROJECT_ID).trim().to_string(),
            raw,
        })
    }

    fn billing_span(records: &[GcpRecord]) -> Result<Option<BillingSpan>, AppError> {
        let min_start = records.iter().filter_map(|r| r.usage_start).min();
        let max_end = records
            .iter()
            .filter_map(|r| r.usage_end.map(|end| (end, r.raw.line)))
            .max_by_key(|(end, _)| *end);

        let (Some(start), Some((end, line))) = (min_start, max_end) else {
            return Ok(None);
        };
        let days = span_days(start, end);
        if days <= 0 {
            return Err(AppError::data(
                line,
                USAGE_END,
                format!("latest end {end} precedes earliest start {start}"),
            ));
        }
        Ok(Some(BillingSpan { days }))
    }

    fn derive_usage(record: &GcpRecord, span: Option<BillingSpan>) -> GcpUsage {
        let hours = span.map(BillingSpan::hours);
        let amount = record.usage_amount;

        let monthly_usage = if record.usage_unit == HOURLY_UNIT {
            amount.zip(hours).map(|(a, h)| a / h)
        } else if PER_SECOND_UNITS.contains(&record.usage_unit.as_str()) {
            amount.zip(hours).map(|(a, h)| a / (h * SECONDS_PER_HOUR))
        } else {
            Some(0.0)
        };

        let gate = |marker: &str, service: &str| {
            if record.sku_description.contains(marker) && record.service_description == service {
                monthly_usage
            } else {
                Some(0.0)
            }
        };

        GcpUsage {
            monthly_usage,
            compute_engine: gate(CORE_MARKER, COMPUTE_ENGINE),
            app_engine: gate(CORE_MARKER, APP_ENGINE),
            cloud_functions: gate(CPU_TIME_MARKER, CLOUD_FUNCTIONS),
        }
    }

    fn detail_row(record: &GcpRecord, usage: &GcpUsage, header: &[String]) -> Vec<Cell> {
        let mut cells = original_cells(&record.raw, header.len());
        if let Some(idx) = header.iter().position(|h| h == USAGE_AMOUNT) {
            cells[idx] = Cell::number(record.usage_amount);
        }
        cells.extend([
            Cell::number(usage.monthly_usage),
            Cell::number(usage.compute_engine),
            Cell::number(usage.app_engine),
            Cell::number(usage.cloud_functions),
        ]);
        cells
    }
}

impl BillingPipeline for GcpPipeline {
    fn provider(&self) -> Provider {
        Provider::Gcp
    }

    fn run(&self, input: &BillingCsv) -> Result<BillingReport, AppError> {
        let mut rows = input.records()?;
        let header = rows.header().to_vec();
        if !rows.has_column(SERVICE_DESCRIPTION) {
            warn!(column = SERVICE_DESCRIPTION, "optional GCP column absent, treating as empty");
        }
        let records = rows
            .collect_rows()?
            .into_iter()
            .map(Self::parse_record)
            .collect::<Result<Vec<_>, _>>()?;

        let span = Self::billing_span(&records)?;
        match span {
            Some(span) => debug!(days = span.days, hours = span.hours(), "gcp billing span"),
            None if !records.is_empty() => {
                warn!("no usable start/end dates, monthly usage left missing")
            }
            None => {}
        }

        let mut detail = DetailTable::new(with_derived_columns(&header, &DERIVED_COLUMNS));
        let mut totals = GroupTotals::new(CATEGORIES.len());
        for record in &records {
            let usage = Self::derive_usage(record, span);
            totals.add(
                &record.project_id,
                &[usage.compute_engine, usage.app_engine, usage.cloud_functions],
            );
            detail.rows.push(Self::detail_row(record, &usage, &header));
        }

        if totals.ungrouped() > 0 {
            warn!(
                rows = totals.ungrouped(),
                "rows without a project id left out of the summary"
            );
        }
        let summary = totals.finish(GROUP_COLUMN, &CATEGORIES);
        info!(
            rows_used = detail.len(),
            projects = summary.groups.len(),
            "gcp billing processed"
        );
        Ok(BillingReport::new(Provider::Gcp, detail, summary))
    }
}
