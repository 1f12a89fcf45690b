use crate::error::AppError;
use crate::input::{BillingCsv, RawRow};
use crate::models::{BillingReport, Cell, Provider};

pub mod aws;
pub mod azure;
pub mod gcp;

pub trait BillingPipeline {
    fn provider(&self) -> Provider;

    fn run(&self, input: &BillingCsv) -> Result<BillingReport, AppError>;
}

pub(crate) fn original_cells(raw: &RawRow, width: usize) -> Vec<Cell> {
    let mut cells: Vec<Cell> = raw
        .cells()
        .take(width)
        .map(|value| {
            if value.is_empty() {
                Cell::Empty
            } else {
                Cell::text(value)
            }
        })
        .collect();
    cells.resize(width, Cell::Empty);
    cells
}

pub(crate) fn with_derived_columns(header: &[String], derived: &[&str]) -> Vec<String> {
    header
        .iter()
        .cloned()
        .chain(derived.iter().map(|c| c.to_string()))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn original_cells_pad_short_rows_and_drop_overflow() {
        let input =
            BillingCsv::from_bytes(b"a,b,c\n1,,3,4\n5\n".to_vec()).expect("buffer input");
        let rows = input.records().expect("records").collect_rows().expect("rows");

        assert_eq!(
            original_cells(&rows[0], 3),
            vec![Cell::text("1"), Cell::Empty, Cell::text("3")]
        );
        assert_eq!(
            original_cells(&rows[1], 3),
            vec![Cell::text("5"), Cell::Empty, Cell::Empty]
        );
    }

    #[test]
    fn derived_columns_follow_the_header() {
        let header = vec!["x".to_string()];
        assert_eq!(with_derived_columns(&header, &["y", "z"]), vec!["x", "y", "z"]);
    }
}
