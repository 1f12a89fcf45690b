use crate::error::AppError;
use crate::input::{BillingCsv, RawRow};
use crate::models::{BillingReport, Cell, DetailTable, GroupTotals, Provider};
use crate::period::{parse_timestamp, MonthWindow};
use crate::providers::{original_cells, with_derived_columns, BillingPipeline};
use chrono::NaiveDateTime;
use serde_json::Value;
use tracing::{info, warn};

const BILLING_PERIOD_START: &str = "billingPeriodStartDate";
const UNIT_OF_MEASURE: &str = "unitOfMeasure";
const PRODUCT: &str = "product";
const QUANTITY: &str = "quantity";
const METER_CATEGORY: &str = "meterCategory";
const INVOICE_SECTION: &str = "invoiceSectionName";
const ADDITIONAL_INFO: &str = "additionalInfo";

const HOURLY_UNIT: &str = "1 Hour";
const FUNCTIONS_PRODUCT: &str = "Functions";
const APP_SERVICE_CATEGORY: &str = "Azure App Service";
const VCPU_KEY: &str = "VCPUs";

pub const GROUP_COLUMN: &str = "Invoice Section Name";
pub const CATEGORIES: [&str; 3] = ["Virtual Machines", "Functions", "App Service"];

const DERIVED_COLUMNS: [&str; 10] = [
    "Year",
    "Month",
    "NumDaysInMonth",
    "NumHoursInMonth",
    "NumSecondsInMonth",
    "instanceVCPU",
    "monthlyUsage",
    "totalVMs",
    "totalFunctions",
    "totalAppServices",
];

#[derive(Debug, Clone)]
struct AzureRecord {
    raw: RawRow,
    period_start: NaiveDateTime,
    unit_of_measure: String,
    product: String,
    quantity: Option<f64>,
    meter_category: String,
    invoice_section: String,
    vcpus: u32,
}

#[derive(Debug, Clone, PartialEq)]
struct AzureUsage {
    window: MonthWindow,
    monthly_usage: Option<f64>,
    total_vms: Option<f64>,
    total_functions: Option<f64>,
    total_app_services: Option<f64>,
}

pub fn extract_vcpus(additional_info: &str) -> u32 {
    let Ok(payload) = serde_json::from_str::<Value>(additional_info) else {
        return 0;
    };
    match payload.get(VCPU_KEY) {
        Some(Value::Number(n)) => n
            .as_u64()
            .or_else(|| {
                n.as_f64()
                    .filter(|v| *v >= 0.0 && v.fract() == 0.0)
                    .map(|v| v as u64)
            })
            .and_then(|v| u32::try_from(v).ok())
            .unwrap_or(0),
        Some(Value::String(s)) => s.trim().parse().unwrap_or(0),
        _ => 0,
    }
}

#[derive(Debug, Default)]
pub struct AzurePipeline;

impl AzurePipeline {
    fn parse_record(raw: RawRow) -> Result<AzureRecord, AppError> {
        let start_raw = raw.get(BILLING_PERIOD_START);
        let period_start = parse_timestamp(start_raw).ok_or_else(|| {
            AppError::data(
                raw.line,
                BILLING_PERIOD_START,
                format!("unparseable date '{start_raw}'"),
            )
        })?;

        let quantity_raw = raw.get(QUANTITY).trim();
        let quantity = if quantity_raw.is_empty() {
            None
        } else {
            Some(
                quantity_raw
                    .parse::<f64>()
                    .ok()
                    .filter(|v| v.is_finite())
                    .ok_or_else(|| {
                        AppError::data(raw.line, QUANTITY, format!("not a number: '{quantity_raw}'"))
                    })?,
            )
        };

        Ok(AzureRecord {
            period_start,
            unit_of_measure: raw.get(UNIT_OF_MEASURE).to_string(),
            product: raw.get(PRODUCT).to_string(),
            quantity,
            meter_category: raw.get(METER_CATEGORY).to_string(),
            invoice_section: raw.get(INVOICE_SECTION).trim().to_string(),
            vcpus: extract_vcpus(raw.get(ADDITIONAL_INFO)),
            raw,
        })
    }

    fn derive_usage(record: &AzureRecord) -> AzureUsage {
        let window = MonthWindow::containing(record.period_start);
        let hours = window.hours() as f64;
        let seconds = window.seconds() as f64;
        let quantity = record.quantity;

        let monthly_usage = if record.unit_of_measure == HOURLY_UNIT {
            quantity.map(|q| q / hours)
        } else {
            Some(0.0)
        };
        let total_vms = monthly_usage.map(|m| f64::from(record.vcpus) * m);

        let total_functions = if record.product == FUNCTIONS_PRODUCT {
            quantity.map(|q| q / seconds)
        } else {
            Some(0.0)
        };

        let total_app_services = if record.meter_category == APP_SERVICE_CATEGORY {
            quantity.map(|q| q / hours)
        } else {
            Some(0.0)
        };

        AzureUsage {
            window,
            monthly_usage,
            total_vms,
            total_functions,
            total_app_services,
        }
    }

    fn detail_row(record: &AzureRecord, usage: &AzureUsage, width: usize) -> Vec<Cell> {
        let mut cells = original_cells(&record.raw, width);
        cells.extend([
            Cell::Integer(i64::from(usage.window.year)),
            Cell::Integer(i64::from(usage.window.month)),
            Cell::Integer(i64::from(usage.window.days)),
            Cell::Integer(usage.window.hours()),
            Cell::Integer(usage.window.seconds()),
            Cell::Integer(i64::from(record.vcpus)),
            Cell::number(usage.monthly_usage),
            Cell::number(usage.total_vms),
            Cell::number(usage.total_functions),
            Cell::number(usage.total_app_services),
        ]);
        cells
    }
}

impl BillingPipeline for AzurePipeline {
    fn provider(&self) -> Provider {
        Provider::Azure
    }

    fn run(&self, input: &BillingCsv) -> Result<BillingReport, AppError> {
        let mut rows = input.records()?;
        let header = rows.header().to_vec();
        let records = rows
            .collect_rows()?
            .into_iter()
            .map(Self::parse_record)
            .collect::<Result<Vec<_>, _>>()?;

        let mut detail = DetailTable::new(with_derived_columns(&header, &DERIVED_COLUMNS));
        let mut totals = GroupTotals::new(CATEGORIES.len());
        for record in &records {
            let usage = Self::derive_usage(record);
            totals.add(
                &record.invoice_section,
                &[usage.total_vms, usage.total_functions, usage.total_app_services],
            );
            detail.rows.push(Self::detail_row(record, &usage, header.len()));
        }

        if totals.ungrouped() > 0 {
            warn!(
                rows = totals.ungrouped(),
                "rows without an invoice section left out of the summary"
            );
        }
        let summary = totals.finish(GROUP_COLUMN, &CATEGORIES);
        info!(
            rows_used = detail.len(),
            sections = summary.groups.len(),
            "azure billing processed"
        );
        Ok(BillingReport::new(Provider::Azure, detail, summary))
    }
}
