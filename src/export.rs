use crate::error::AppError;
use crate::models::{BillingReport, DetailTable, SummaryTable};
use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};

pub const DETAIL_FILE: &str = "detail.csv";
pub const SUMMARY_FILE: &str = "summary.csv";

pub fn write_detail_csv<W: Write>(table: &DetailTable, out: W) -> Result<(), AppError> {
    let mut writer = csv::Writer::from_writer(out);
    writer.write_record(&table.columns)?;
    for row in &table.rows {
        writer.write_record(row.iter().map(|cell| cell.render()))?;
    }
    writer.flush()?;
    Ok(())
}

pub fn write_summary_csv<W: Write>(table: &SummaryTable, out: W) -> Result<(), AppError> {
    let mut writer = csv::Writer::from_writer(out);
    writer.write_record(std::iter::once(&table.group_column).chain(&table.categories))?;
    for row in table.rows() {
        writer.write_record(
            std::iter::once(row.group.clone()).chain(row.values.iter().map(f64::to_string)),
        )?;
    }
    writer.flush()?;
    Ok(())
}

pub fn write_report(report: &BillingReport, dir: &Path) -> Result<(PathBuf, PathBuf), AppError> {
    fs::create_dir_all(dir)?;
    let detail_path = dir.join(DETAIL_FILE);
    let summary_path = dir.join(SUMMARY_FILE);
    write_detail_csv(&report.detail, fs::File::create(&detail_path)?)?;
    write_summary_csv(&report.summary, fs::File::create(&summary_path)?)?;
    Ok((detail_path, summary_path))
}

pub fn render_summary(table: &SummaryTable) -> String {
    let mut header = vec![table.group_column.clone()];
    header.extend(table.categories.iter().cloned());

    let body: Vec<Vec<String>> = table
        .rows()
        .map(|row| {
            std::iter::once(row.group.clone())
                .chain(row.values.iter().map(|v| format!("{v:.4}")))
                .collect()
        })
        .collect();

    let mut widths: Vec<usize> = header.iter().map(|h| h.chars().count()).collect();
    for row in &body {
        for (w, cell) in widths.iter_mut().zip(row) {
            *w = (*w).max(cell.chars().count());
        }
    }

    let line = |cells: &[String]| {
        cells
            .iter()
            .zip(&widths)
            .enumerate()
            .map(|(i, (cell, &w))| {
                if i == 0 {
                    format!("{cell:<w$}")
                } else {
                    format!("{cell:>w$}")
                }
            })
            .collect::<Vec<_>>()
            .join("  ")
            .trim_end()
            .to_string()
    };

    let mut out = String::new();
    out.push_str(&line(&header));
    out.push('\n');
    for row in &body {
        out.push_str(&line(row));
        out.push('\n');
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{Cell, GroupTotals, Provider};
    use tempfile::TempDir;

    fn summary() -> SummaryTable {
        let mut totals = GroupTotals::new(2);
        totals.add("acct,1", &[Some(1.5), Some(0.0)]);
        totals.add("acct-2", &[Some(0.5), None]);
        totals.finish("Linked Account ID", &["EC2", "Lambda"])
    }

    fn detail() -> DetailTable {
        let mut table = DetailTable::new(vec!["a".into(), "EC2".into()]);
        table.rows.push(vec![Cell::text("x"), Cell::Number(0.25)]);
        table.rows.push(vec![Cell::Empty, Cell::Empty]);
        table
    }

    #[test]
    fn summary_csv_has_total_last_and_escapes_groups() {
        let mut buf = Vec::new();
        write_summary_csv(&summary(), &mut buf).expect("write summary");
        let text = String::from_utf8(buf).expect("utf8");
        let lines: Vec<&str> = text.lines().collect();
        assert_eq!(lines[0], "Linked Account ID,EC2,Lambda");
        assert_eq!(lines[1], "\"acct,1\",1.5,0");
        assert_eq!(lines[3], "Total,2,0");
    }

    #[test]
    fn detail_csv_renders_missing_as_empty() {
        let mut buf = Vec::new();
        write_detail_csv(&detail(), &mut buf).expect("write detail");
        let text = String::from_utf8(buf).expect("utf8");
        assert_eq!(text, "a,EC2\nx,0.25\n,\n");
    }

    #[test]
    fn write_report_creates_both_files() {
        let tmp = TempDir::new().expect("tempdir");
        let report = BillingReport::new(Provider::Aws, detail(), summary());
        let (detail_path, summary_path) =
            write_report(&report, &tmp.path().join("out")).expect("write report");
        assert!(detail_path.exists());
        assert!(summary_path.exists());
    }

    #[test]
    fn render_summary_aligns_columns() {
        let text = render_summary(&summary());
        let lines: Vec<&str> = text.lines().collect();
        assert_eq!(lines.len(), 4);
        assert!(lines[0].starts_with("Linked Account ID"));
        assert!(lines[3].starts_with("Total"));
        assert!(lines[3].ends_with("0.0000"));
    }
}
