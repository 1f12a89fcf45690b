use crate::error::AppError;
use crate::input::{BillingCsv, RawRow};
use crate::instance_types::VcpuLookup;
use crate::models::{BillingReport, Cell, DetailTable, GroupTotals, Provider};
use crate::period::{parse_quantity, parse_timestamp, MonthWindow, SECONDS_PER_HOUR};
use crate::providers::{original_cells, with_derived_columns, BillingPipeline};
use chrono::NaiveDateTime;
use tracing::{debug, info, warn};

const RECORD_TYPE: &str = "RecordType";
const LINKED_ACCOUNT_ID: &str = "LinkedAccountId";
const PAYER_ACCOUNT_ID: &str = "PayerAccountId";
const USAGE_START_DATE: &str = "UsageStartDate";
const USAGE_TYPE: &str = "UsageType";
const USAGE_QUANTITY: &str = "UsageQuantity";
const PRODUCT_CODE: &str = "ProductCode";

const ACCOUNT_TOTAL: &str = "AccountTotal";
const PAYER_LINE_ITEM: &str = "PayerLineItem";
const USAGE_TYPE_SEPARATOR: char = ':';

const LAMBDA_PRODUCT: &str = "AWSLambda";
const LAMBDA_MARKER: &str = "Lambda-GB-Second";
const FARGATE_PRODUCT: &str = "AmazonECS";
const FARGATE_MARKER: &str = "Fargate-vCPU-Hours:perCPU";
const MB_PER_GB: f64 = 1024.0;

pub const GROUP_COLUMN: &str = "Linked Account ID";
pub const CATEGORIES: [&str; 3] = ["EC2", "Lambda", "Fargate"];

const DERIVED_COLUMNS: [&str; 10] = [
    "Year",
    "Month",
    "NumDaysInMonth",
    "NumHoursInMonth",
    "InstanceName",
    "InstanceVCPU",
    "numInstances",
    "EC2",
    "Lambda",
    "Fargate",
];

#[derive(Debug, Clone)]
struct AwsRecord {
    raw: RawRow,
    linked_account_id: String,
    usage_start: NaiveDateTime,
    usage_type: String,
    usage_quantity: Option<f64>,
    product_code: String,
}

#[derive(Debug, Clone, PartialEq)]
struct AwsUsage {
    window: MonthWindow,
    /// `None` when the usage type does not name a known instance type.
    instance_name: Option<String>,
    instance_vcpu: Option<u32>,
    num_instances: Option<f64>,
    ec2: Option<f64>,
    lambda: Option<f64>,
    fargate: Option<f64>,
}

pub struct AwsPipeline<'a> {
    lookup: &'a dyn VcpuLookup,
}

impl<'a> AwsPipeline<'a> {
    pub fn new(lookup: &'a dyn VcpuLookup) -> Self {
        Self { lookup }
    }

    // payer line items borrow the payer account only when no row has a linked account
    fn retain_line_items(rows: Vec<RawRow>) -> Vec<(RawRow, String)> {
        let rows: Vec<RawRow> = rows
            .into_iter()
            .filter(|r| r.get(RECORD_TYPE) != ACCOUNT_TOTAL)
            .collect();

        let recover_from_payer = rows.iter().all(|r| r.get(LINKED_ACCOUNT_ID).trim().is_empty());
        if recover_from_payer && !rows.is_empty() {
            debug!("no linked account ids present, recovering from payer account");
        }

        let before = rows.len();
        let kept: Vec<(RawRow, String)> = rows
            .into_iter()
            .filter_map(|r| {
                let mut account = r.get(LINKED_ACCOUNT_ID).trim().to_string();
                if account.is_empty()
                    && recover_from_payer
                    && r.get(RECORD_TYPE) == PAYER_LINE_ITEM
                {
                    account = r.get(PAYER_ACCOUNT_ID).trim().to_string();
                }
                (!account.is_empty()).then_some((r, account))
            })
            .collect();

        let dropped = before - kept.len();
        if dropped > 0 {
            warn!(dropped, "dropped rows without a linked account id");
        }
        kept
    }

    fn parse_record(raw: RawRow, linked_account_id: String) -> Result<AwsRecord, AppError> {
        let start_raw = raw.get(USAGE_START_DATE);
        let usage_start = parse_timestamp(start_raw).ok_or_else(|| {
            AppError::data(
                raw.line,
                USAGE_START_DATE,
                format!("unparseable date '{start_raw}'"),
            )
        })?;

        let quantity_raw = raw.get(USAGE_QUANTITY).trim();
        let usage_quantity = if quantity_raw.is_empty() {
            None
        } else {
            Some(parse_quantity(quantity_raw).ok_or_else(|| {
                AppError::data(
                    raw.line,
                    USAGE_QUANTITY,
                    format!("not a number: '{quantity_raw}'"),
                )
            })?)
        };

        Ok(AwsRecord {
            linked_account_id,
            usage_start,
            usage_type: raw.get(USAGE_TYPE).to_string(),
            usage_quantity,
            product_code: raw.get(PRODUCT_CODE).to_string(),
            raw,
        })
    }

    fn derive_usage(&self, record: &AwsRecord) -> AwsUsage {
        let window = MonthWindow::containing(record.usage_start);
        let hours = window.hours() as f64;
        let quantity = record.usage_quantity;

        let candidate = record
            .usage_type
            .rsplit(USAGE_TYPE_SEPARATOR)
            .next()
            .unwrap_or_default();
        let instance_vcpu = self.lookup.vcpus(candidate);
        let instance_name = instance_vcpu.map(|_| candidate.to_string());

        let num_instances = instance_vcpu.and(quantity.map(|q| q / hours));
        let ec2 = match (instance_vcpu, num_instances) {
            (Some(vcpu), Some(n)) => Some(f64::from(vcpu) * n),
            _ => None,
        };

        let lambda = if record.product_code == LAMBDA_PRODUCT
            && record.usage_type.contains(LAMBDA_MARKER)
        {
            quantity.map(|q| q / (SECONDS_PER_HOUR * MB_PER_GB * hours))
        } else {
            Some(0.0)
        };

        let fargate = if record.product_code == FARGATE_PRODUCT
            && record.usage_type.contains(FARGATE_MARKER)
        {
            quantity.map(|q| q / hours)
        } else {
            Some(0.0)
        };

        AwsUsage {
            window,
            instance_name,
            instance_vcpu,
            num_instances,
            ec2,
            lambda,
            fargate,
        }
    }

    fn detail_row(
        record: &AwsRecord,
        usage: &AwsUsage,
        header: &[String],
    ) -> Vec<Cell> {
        let mut cells = original_cells(&record.raw, header.len());
        for (idx, name) in header.iter().enumerate() {
            match name.as_str() {
                LINKED_ACCOUNT_ID => cells[idx] = Cell::text(record.linked_account_id.clone()),
                USAGE_QUANTITY => cells[idx] = Cell::number(record.usage_quantity),
                _ => {}
            }
        }

        cells.extend([
            Cell::Integer(i64::from(usage.window.year)),
            Cell::Integer(i64::from(usage.window.month)),
            Cell::Integer(i64::from(usage.window.days)),
            Cell::Integer(usage.window.hours()),
            usage
                .instance_name
                .clone()
                .map_or(Cell::Empty, Cell::Text),
            Cell::integer(usage.instance_vcpu.map(i64::from)),
            Cell::number(usage.num_instances),
            Cell::number(usage.ec2),
            Cell::number(usage.lambda),
            Cell::number(usage.fargate),
        ]);
        cells
    }
}

impl BillingPipeline for AwsPipeline<'_> {
    fn provider(&self) -> Provider {
        Provider::Aws
    }

    fn run(&self, input: &BillingCsv) -> Result<BillingReport, AppError> {
        let mut rows = input.records()?;
        let header = rows.header().to_vec();
        for optional in [PAYER_ACCOUNT_ID, PRODUCT_CODE] {
            if !rows.has_column(optional) {
                warn!(column = optional, "optional AWS column absent, treating as empty");
            }
        }
        let raw_rows = rows.collect_rows()?;
        let read = raw_rows.len();

        let records = Self::retain_line_items(raw_rows)
            .into_iter()
            .map(|(raw, account)| Self::parse_record(raw, account))
            .collect::<Result<Vec<_>, _>>()?;

        let mut detail = DetailTable::new(with_derived_columns(&header, &DERIVED_COLUMNS));
        let mut totals = GroupTotals::new(CATEGORIES.len());
        for record in &records {
            let usage = self.derive_usage(record);
            totals.add(
                &record.linked_account_id,
                &[usage.ec2, usage.lambda, usage.fargate],
            );
            detail.rows.push(Self::detail_row(record, &usage, &header));
        }

        let summary = totals.finish(GROUP_COLUMN, &CATEGORIES);
        info!(
            rows_read = read,
            rows_used = detail.len(),
            accounts = summary.groups.len(),
            "aws billing processed"
        );
        Ok(BillingReport::new(Provider::Aws, detail, summary))
    }
}
