use crate::models::Provider;
use std::collections::HashSet;

pub const AWS_REQUIRED_COLUMNS: &[&str] = &[
    "RecordType",
    "LinkedAccountId",
    "UsageStartDate",
    "UsageType",
    "UsageQuantity",
];

pub const AZURE_REQUIRED_COLUMNS: &[&str] = &[
    "billingPeriodStartDate",
    "unitOfMeasure",
    "product",
    "quantity",
    "meterCategory",
    "invoiceSectionName",
    "additionalInfo",
];

pub const GCP_REQUIRED_COLUMNS: &[&str] = &[
    "Usage amount",
    "SKU description",
    "Usage unit",
    "Usage start date",
    "Usage end date",
    "Project ID",
];

// a header satisfying several sets resolves to the first
const PRIORITY: [Provider; 3] = [Provider::Aws, Provider::Azure, Provider::Gcp];

pub fn required_columns(provider: Provider) -> &'static [&'static str] {
    match provider {
        Provider::Aws => AWS_REQUIRED_COLUMNS,
        Provider::Azure => AZURE_REQUIRED_COLUMNS,
        Provider::Gcp => GCP_REQUIRED_COLUMNS,
    }
}

pub fn detect_schema<S: AsRef<str>>(header: &[S]) -> Option<Provider> {
    let present: HashSet<&str> = header.iter().map(|h| h.as_ref()).collect();
    PRIORITY.into_iter().find(|provider| {
        required_columns(*provider)
            .iter()
            .all(|col| present.contains(col))
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn aws_header_with_extra_columns_is_detected() {
        let mut header: Vec<&str> = AWS_REQUIRED_COLUMNS.to_vec();
        header.extend(["InvoiceID", "PayerAccountId", "ProductCode"]);
        header.reverse();
        assert_eq!(detect_schema(&header), Some(Provider::Aws));
    }

    #[test]
    fn each_provider_is_detected_from_its_own_columns() {
        assert_eq!(detect_schema(AZURE_REQUIRED_COLUMNS), Some(Provider::Azure));
        assert_eq!(detect_schema(GCP_REQUIRED_COLUMNS), Some(Provider::Gcp));
    }

    #[test]
    fn missing_one_required_column_is_unrecognized() {
        for provider in PRIORITY {
            let header: Vec<&str> = required_columns(provider)[1..].to_vec();
            assert_eq!(detect_schema(&header), None, "{}", provider.name());
        }
    }

    #[test]
    fn ambiguous_header_resolves_by_priority() {
        let mut header: Vec<&str> = GCP_REQUIRED_COLUMNS.to_vec();
        header.extend(AZURE_REQUIRED_COLUMNS);
        assert_eq!(detect_schema(&header), Some(Provider::Azure));
        header.extend(AWS_REQUIRED_COLUMNS);
        assert_eq!(detect_schema(&header), Some(Provider::Aws));
    }

    #[test]
    fn empty_header_is_unrecognized() {
        let header: Vec<String> = Vec::new();
        assert_eq!(detect_schema(&header), None);
    }
}
