//! Query Result - tabular output of one statement and its text rendering

use crate::error::{QaError, Result};
use polars::prelude::*;
use serde::{Deserialize, Serialize};

/// Column names plus rows of display-ready cells.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct QueryResult {
    pub columns: Vec<String>,
    pub rows: Vec<Vec<String>>,

    /// Execution time in milliseconds
    pub execution_time_ms: u64,
}

impl QueryResult {
    pub fn new(columns: Vec<String>, rows: Vec<Vec<String>>) -> Self {
        Self {
            columns,
            rows,
            execution_time_ms: 0,
        }
    }

    pub fn from_dataframe(df: &DataFrame) -> Result<Self> {
        let columns: Vec<String> = df
            .get_column_names()
            .iter()
            .map(|s| s.to_string())
            .collect();

        let mut rows = Vec::with_capacity(df.height());
        for row_idx in 0..df.height() {
            let mut row = Vec::with_capacity(columns.len());
            for series in df.get_columns() {
                let value = series
                    .get(row_idx)
                    .map_err(|e| QaError::Execution(format!("Failed to get value: {}", e)))?;
                row.push(format_cell(&value));
            }
            rows.push(row);
        }

        Ok(Self::new(columns, rows))
    }

    pub fn row_count(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    /// Fixed-width text table: a header line, then one line per row.
    ///
    /// Every column is right-aligned to its widest cell and columns are
    /// separated by two spaces. There is no row-index column.
    pub fn render_table(&self) -> String {
        let widths: Vec<usize> = self
            .columns
            .iter()
            .enumerate()
            .map(|(idx, name)| {
                self.rows
                    .iter()
                    .filter_map(|row| row.get(idx))
                    .map(|cell| cell.chars().count())
                    .chain(std::iter::once(name.chars().count()))
                    .max()
                    .unwrap_or(0)
            })
            .collect();

        let mut lines = Vec::with_capacity(self.rows.len() + 1);
        lines.push(render_line(&self.columns, &widths));
        for row in &self.rows {
            lines.push(render_line(row, &widths));
        }
        lines.join("\n")
    }
}

fn render_line(cells: &[String], widths: &[usize]) -> String {
    use itertools::Itertools;

    cells
        .iter()
        .zip(widths)
        .map(|(cell, width)| format!("{:>width$}", cell, width = *width))
        .join("  ")
}

fn format_cell(value: &AnyValue) -> String {
    match value {
        AnyValue::Null => "null".to_string(),
        AnyValue::String(s) => s.to_string(),
        AnyValue::StringOwned(s) => s.to_string(),
        AnyValue::Boolean(b) => b.to_string(),
        AnyValue::Int8(i) => i.to_string(),
        AnyValue::Int16(i) => i.to_string(),
        AnyValue::Int32(i) => i.to_string(),
        AnyValue::Int64(i) => i.to_string(),
        AnyValue::UInt8(u) => u.to_string(),
        AnyValue::UInt16(u) => u.to_string(),
        AnyValue::UInt32(u) => u.to_string(),
        AnyValue::UInt64(u) => u.to_string(),
        // Debug keeps the decimal marker on whole floats ("2.0", not "2").
        AnyValue::Float32(f) => format!("{:?}", f),
        AnyValue::Float64(f) => format!("{:?}", f),
        other => other.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_render_single_row() {
        let result = QueryResult::new(
            vec!["PortfolioName".to_string(), "PL_YTD".to_string()],
            vec![vec!["Fund A".to_string(), "100".to_string()]],
        );
        let rendered = result.render_table();
        let lines: Vec<&str> = rendered.lines().collect();

        assert_eq!(lines.len(), 2);
        assert_eq!(lines[0], "PortfolioName  PL_YTD");
        assert_eq!(lines[1], "       Fund A     100");
    }

    #[test]
    fn test_render_widens_to_longest_cell() {
        let result = QueryResult::new(
            vec!["Id".to_string(), "Qty".to_string()],
            vec![
                vec!["SEC-000123".to_string(), "5".to_string()],
                vec!["S2".to_string(), "12000".to_string()],
            ],
        );
        let rendered = result.render_table();
        let lines: Vec<&str> = rendered.lines().collect();

        assert_eq!(lines[0], "        Id    Qty");
        assert_eq!(lines[1], "SEC-000123      5");
        assert_eq!(lines[2], "        S2  12000");
    }

    #[test]
    fn test_from_dataframe_formats_cells() {
        let df = df![
            "PortfolioName" => ["Fund A", "Fund B"],
            "Qty" => [10i64, 20],
            "Price" => [1.5f64, 2.25],
        ]
        .unwrap();

        let result = QueryResult::from_dataframe(&df).unwrap();
        assert_eq!(result.columns, vec!["PortfolioName", "Qty", "Price"]);
        assert_eq!(result.row_count(), 2);
        assert_eq!(result.rows[0], vec!["Fund A", "10", "1.5"]);
        assert_eq!(result.rows[1], vec!["Fund B", "20", "2.25"]);
    }

    #[test]
    fn test_whole_floats_keep_decimal_point() {
        let df = df![
            "Qty" => [2i64, -550],
            "MV_Base" => [2.0f64, -550.0],
            "Weight" => [1.0f32, 0.5],
        ]
        .unwrap();

        let result = QueryResult::from_dataframe(&df).unwrap();
        assert_eq!(result.rows[0], vec!["2", "2.0", "1.0"]);
        assert_eq!(result.rows[1], vec!["-550", "-550.0", "0.5"]);
    }

    #[test]
    fn test_nulls_render_as_null() {
        let df = df![
            "CustodianName" => [Some("BNY"), None],
        ]
        .unwrap();

        let result = QueryResult::from_dataframe(&df).unwrap();
        assert_eq!(result.rows[1], vec!["null"]);
    }

    #[test]
    fn test_empty_frame_is_empty_result() {
        let df = DataFrame::new(vec![Series::new_empty("PL_YTD", &DataType::Int64)]).unwrap();
        let result = QueryResult::from_dataframe(&df).unwrap();
        assert!(result.is_empty());
        assert_eq!(result.columns, vec!["PL_YTD"]);
    }
}
