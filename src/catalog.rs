use crate::config::LookupSettings;
use crate::error::AppError;
use crate::instance_types::InstanceTypes;
use reqwest::{Client, StatusCode};
use serde::Deserialize;
use tracing::{debug, warn};
use url::Url;

const PAGE_SIZE: u32 = 100;

#[derive(Debug, Deserialize)]
struct InstanceTypePage {
    #[serde(rename = "InstanceTypes", default)]
    instance_types: Vec<InstanceTypeInfo>,
    #[serde(rename = "NextToken", default)]
    next_token: Option<String>,
}

#[derive(Debug, Deserialize)]
struct InstanceTypeInfo {
    #[serde(rename = "InstanceType")]
    instance_type: String,
    #[serde(rename = "VCpuInfo")]
    vcpu_info: VCpuInfo,
}

#[derive(Debug, Deserialize)]
struct VCpuInfo {
    #[serde(rename = "DefaultVCpus")]
    default_vcpus: u32,
}

#[derive(Debug, Clone)]
pub struct InstanceCatalog {
    endpoint: Url,
    region: Option<String>,
    architecture: String,
    token: Option<String>,
}

impl InstanceCatalog {
    pub fn from_settings(
        settings: &LookupSettings,
        token: Option<String>,
    ) -> Result<Self, AppError> {
        let Some(raw) = settings.endpoint.as_deref() else {
            return Err(AppError::Config(
                "No instance catalog endpoint configured. Set lookup.endpoint in config.toml."
                    .into(),
            ));
        };
        let endpoint = Url::parse(raw)
            .map_err(|e| AppError::Config(format!("Invalid catalog endpoint '{raw}': {e}")))?;
        Ok(Self {
            endpoint,
            region: settings.region.clone(),
            architecture: settings.architecture.clone(),
            token,
        })
    }

    fn page_url(&self, next_token: Option<&str>) -> Url {
        let mut url = self.endpoint.clone();
        {
            let mut query = url.query_pairs_mut();
            query.append_pair("Architecture", &self.architecture);
            query.append_pair("MaxResults", &PAGE_SIZE.to_string());
            if let Some(region) = &self.region {
                query.append_pair("Region", region);
            }
            if let Some(token) = next_token {
                query.append_pair("NextToken", token);
            }
        }
        url
    }

    pub async fn fetch_instance_types(&self, client: &Client) -> Result<InstanceTypes, AppError> {
        let mut out = Vec::new();
        let mut next_token: Option<String> = None;

        loop {
            let url = self.page_url(next_token.as_deref());
            let mut req = client.get(url);
            if let Some(token) = &self.token {
                req = req.bearer_auth(token);
            }

            let response = req.send().await?;
            let status = response.status();
            if status == StatusCode::UNAUTHORIZED || status == StatusCode::FORBIDDEN {
                return Err(AppError::Config(
                    "Instance catalog rejected credentials (unauthorized).".into(),
                ));
            }
            let page: InstanceTypePage = response.error_for_status()?.json().await?;
            debug!(count = page.instance_types.len(), "fetched instance type page");

            out.extend(
                page.instance_types
                    .into_iter()
                    .map(|i| (i.instance_type, i.vcpu_info.default_vcpus)),
            );

            match advance_token(next_token.as_deref(), page.next_token) {
                Some(token) => next_token = Some(token),
                None => break,
            }
        }

        Ok(out.into_iter().collect())
    }
}

// a repeated token would page forever
fn advance_token(previous: Option<&str>, next: Option<String>) -> Option<String> {
    match next {
        Some(token) if !token.is_empty() && previous != Some(token.as_str()) => Some(token),
        Some(token) if !token.is_empty() => {
            warn!(token = %token, "instance catalog repeated its paging token, stopping");
            None
        }
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn settings(endpoint: Option<&str>) -> LookupSettings {
        LookupSettings {
            endpoint: endpoint.map(ToString::to_string),
            region: Some("eu-west-1".into()),
            ..LookupSettings::default()
        }
    }

    #[test]
    fn from_settings_requires_an_endpoint() {
        let err = InstanceCatalog::from_settings(&settings(None), None).expect_err("no endpoint");
        assert!(err.to_string().contains("No instance catalog endpoint"));
    }

    #[test]
    fn page_url_carries_filters_and_paging_token() {
        let catalog =
            InstanceCatalog::from_settings(&settings(Some("https://catalog.example.com/types")), None)
                .expect("catalog");
        let first = catalog.page_url(None);
        assert_eq!(
            first.as_str(),
            "https://catalog.example.com/types?Architecture=x86_64&MaxResults=100&Region=eu-west-1"
        );
        let next = catalog.page_url(Some("abc"));
        assert!(next.as_str().ends_with("&NextToken=abc"));
    }

    #[test]
    fn page_payload_parses_describe_instance_types_shape() {
        let page: InstanceTypePage = serde_json::from_str(
            r#"{"InstanceTypes":[{"InstanceType":"m5.large","VCpuInfo":{"DefaultVCpus":2}}],"NextToken":"t1"}"#,
        )
        .expect("parse page");
        assert_eq!(page.instance_types[0].instance_type, "m5.large");
        assert_eq!(page.instance_types[0].vcpu_info.default_vcpus, 2);
        assert_eq!(page.next_token.as_deref(), Some("t1"));
    }

    #[test]
    fn paging_stops_when_token_is_empty_or_repeated() {
        assert_eq!(advance_token(None, Some("t1".into())), Some("t1".to_string()));
        assert_eq!(advance_token(Some("t1"), Some("t2".into())), Some("t2".to_string()));
        assert_eq!(advance_token(Some("t1"), Some("t1".into())), None);
        assert_eq!(advance_token(Some("t1"), Some(String::new())), None);
        assert_eq!(advance_token(Some("t1"), None), None);
    }
}
