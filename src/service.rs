use crate::catalog::InstanceCatalog;
use crate::config::{cache_path, get_lookup_token, AppConfig};
use crate::detect::detect_schema;
use crate::error::AppError;
use crate::input::BillingCsv;
use crate::instance_types::{InstanceTypes, VcpuLookup};
use crate::models::{Analysis, Provider};
use crate::providers::aws::AwsPipeline;
use crate::providers::azure::AzurePipeline;
use crate::providers::gcp::GcpPipeline;
use crate::providers::BillingPipeline;
use reqwest::Client;
use std::time::Instant;
use tracing::{debug, info, warn};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LookupMode {
    Cached,
    Refresh,
}

/// Peek the header, pick the matching pipeline and run it on the full buffer.
pub fn dispatch(input: &BillingCsv, lookup: &dyn VcpuLookup) -> Result<Analysis, AppError> {
    let header = input.header()?;
    let Some(provider) = detect_schema(&header) else {
        debug!(columns = header.len(), "header matches no billing schema");
        return Ok(Analysis::Unrecognized { columns: header });
    };

    let pipeline: Box<dyn BillingPipeline + '_> = match provider {
        Provider::Aws => Box::new(AwsPipeline::new(lookup)),
        Provider::Azure => Box::new(AzurePipeline),
        Provider::Gcp => Box::new(GcpPipeline),
    };
    debug!(provider = pipeline.provider().name(), "dispatching billing file");
    pipeline.run(input).map(Analysis::Report)
}

pub struct RefreshReport {
    pub entries: usize,
    pub duration_ms: u128,
}

pub struct MeterService {
    client: Client,
}

impl MeterService {
    pub fn new() -> Result<Self, AppError> {
        let client = Client::builder().build()?;
        Ok(Self { client })
    }

    pub async fn refresh_instance_types(
        &self,
        cfg: &AppConfig,
    ) -> Result<(InstanceTypes, RefreshReport), AppError> {
        let catalog = InstanceCatalog::from_settings(&cfg.lookup, get_lookup_token()?)?;
        let started = Instant::now();
        let fetched = catalog.fetch_instance_types(&self.client).await?;
        if !fetched.is_empty() {
            fetched.save(&cache_path(cfg)?)?;
        }
        let report = RefreshReport {
            entries: fetched.len(),
            duration_ms: started.elapsed().as_millis(),
        };
        Ok((fetched, report))
    }

    // refresh failures degrade to the cached mapping
    pub async fn instance_types(&self, cfg: &AppConfig, mode: LookupMode) -> InstanceTypes {
        let cached = || match cache_path(cfg) {
            Ok(path) => InstanceTypes::load(&path),
            Err(e) => {
                warn!(error = %e, "cannot resolve instance type cache path");
                InstanceTypes::default()
            }
        };

        if mode == LookupMode::Cached {
            return cached();
        }

        match self.refresh_instance_types(cfg).await {
            Ok((fetched, report)) if !fetched.is_empty() => {
                info!(
                    entries = report.entries,
                    duration_ms = report.duration_ms as u64,
                    "refreshed instance types"
                );
                fetched
            }
            Ok(_) => {
                warn!("instance catalog returned no entries, using cached instance types");
                cached()
            }
            Err(e) => {
                warn!(error = %e, "instance catalog refresh failed, using cached instance types");
                cached()
            }
        }
    }

    pub async fn analyze(
        &self,
        cfg: &AppConfig,
        input: &BillingCsv,
        mode: LookupMode,
    ) -> Result<Analysis, AppError> {
        let lookup = if detect_schema(&input.header()?) == Some(Provider::Aws) {
            self.instance_types(cfg, mode).await
        } else {
            InstanceTypes::default()
        };
        dispatch(input, &lookup)
    }
}
