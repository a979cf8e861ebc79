//! Polars-backed datastore
//!
//! Holds the `holdings` and `trades` snapshots as immutable DataFrames and
//! answers SQL through polars' SQL context. Each statement runs in a fresh
//! context over clones of the frames (clones share buffers), so concurrent
//! callers never contend on a lock and a statement cannot alter the tables
//! other requests see.

use crate::error::{QaError, Result};
use crate::execution::engine::Datastore;
use crate::execution::result::QueryResult;
use crate::vocabulary::Table;
use async_trait::async_trait;
use polars::prelude::*;
use polars::sql::SQLContext;
use std::collections::BTreeMap;
use std::path::Path;
use tracing::{debug, info};

pub struct PolarsStore {
    tables: BTreeMap<&'static str, DataFrame>,
}

impl PolarsStore {
    pub fn from_frames(holdings: DataFrame, trades: DataFrame) -> Self {
        let mut tables = BTreeMap::new();
        tables.insert(Table::Holdings.name(), holdings);
        tables.insert(Table::Trades.name(), trades);
        Self { tables }
    }

    /// Load `holdings.csv` and `trades.csv` from a directory.
    pub fn load_dir(data_dir: &Path) -> Result<Self> {
        let holdings = read_csv(&data_dir.join("holdings.csv"))?;
        let trades = read_csv(&data_dir.join("trades.csv"))?;

        info!(
            "Loaded datastore from {}: holdings={} rows, trades={} rows",
            data_dir.display(),
            holdings.height(),
            trades.height()
        );

        Ok(Self::from_frames(holdings, trades))
    }

    pub fn table_names(&self) -> Vec<&'static str> {
        self.tables.keys().copied().collect()
    }

    pub fn row_count(&self, table: Table) -> usize {
        self.tables.get(table.name()).map_or(0, |df| df.height())
    }

    fn run(tables: BTreeMap<&'static str, DataFrame>, sql: &str) -> Result<DataFrame> {
        let mut ctx = SQLContext::new();
        for (name, df) in tables {
            ctx.register(name, df.lazy());
        }

        let df = ctx
            .execute(sql)
            .map_err(|e| QaError::Execution(format!("Failed to plan SQL: {}", e)))?
            .collect()
            .map_err(|e| QaError::Execution(format!("Failed to collect DataFrame: {}", e)))?;

        Ok(df)
    }
}

fn read_csv(path: &Path) -> Result<DataFrame> {
    if !path.exists() {
        return Err(QaError::Datastore(format!(
            "Table file not found: {}",
            path.display()
        )));
    }

    LazyCsvReader::new(path)
        .with_has_header(true)
        .with_infer_schema_length(Some(1000))
        .finish()
        .map_err(|e| QaError::Datastore(format!("Failed to read CSV {}: {}", path.display(), e)))?
        .collect()
        .map_err(|e| QaError::Datastore(format!("Failed to load CSV {}: {}", path.display(), e)))
}

#[async_trait]
impl Datastore for PolarsStore {
    fn name(&self) -> &'static str {
        "polars"
    }

    async fn execute(&self, sql: &str) -> Result<QueryResult> {
        let start_time = std::time::Instant::now();
        debug!("Executing SQL with polars: {}", sql);

        let tables = self.tables.clone();
        let statement = sql.to_string();
        let df = tokio::task::spawn_blocking(move || Self::run(tables, &statement))
            .await
            .map_err(|e| QaError::Execution(format!("Query task failed: {}", e)))??;

        let mut result = QueryResult::from_dataframe(&df)?;
        result.execution_time_ms = start_time.elapsed().as_millis() as u64;

        debug!(
            "Query returned {} rows in {}ms",
            result.row_count(),
            result.execution_time_ms
        );
        Ok(result)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    fn sample_store() -> PolarsStore {
        let holdings = df![
            "PortfolioName" => ["Fund A", "Fund A", "Fund B"],
            "SecurityId" => ["S1", "S2", "S1"],
            "PL_YTD" => [100i64, 50, -20],
            "MV_Base" => [1000.0f64, 500.0, 250.0],
        ]
        .unwrap();
        let trades = df![
            "PortfolioName" => ["Fund A", "Fund B"],
            "SecurityId" => ["S1", "S1"],
            "TradeTypeName" => ["Buy", "Sell"],
            "TotalCash" => [1000.0f64, 400.0],
        ]
        .unwrap();
        PolarsStore::from_frames(holdings, trades)
    }

    #[tokio::test]
    async fn test_group_by_query() {
        let store = sample_store();
        let result = store
            .execute(
                "SELECT PortfolioName, SUM(PL_YTD) AS PL_YTD FROM holdings \
                 GROUP BY PortfolioName ORDER BY PortfolioName",
            )
            .await
            .unwrap();

        assert_eq!(result.columns, vec!["PortfolioName", "PL_YTD"]);
        assert_eq!(
            result.rows,
            vec![vec!["Fund A", "150"], vec!["Fund B", "-20"]]
        );
    }

    #[tokio::test]
    async fn test_where_clause_with_no_match_is_empty() {
        let store = sample_store();
        let result = store
            .execute("SELECT * FROM trades WHERE TradeTypeName = 'Transfer'")
            .await
            .unwrap();
        assert!(result.is_empty());
    }

    #[tokio::test]
    async fn test_unknown_column_is_execution_error() {
        let store = sample_store();
        let err = store
            .execute("SELECT NoSuchColumn FROM holdings")
            .await
            .unwrap_err();
        assert!(matches!(err, QaError::Execution(_)));
    }

    #[tokio::test]
    async fn test_statements_cannot_alter_shared_tables() {
        let store = sample_store();
        let _ = store.execute("DROP TABLE trades").await;

        let result = store.execute("SELECT * FROM trades").await.unwrap();
        assert_eq!(result.row_count(), 2);
        assert_eq!(store.row_count(Table::Trades), 2);
    }

    #[test]
    fn test_load_dir_reads_both_tables() {
        let dir = tempfile::tempdir().unwrap();
        let mut holdings = std::fs::File::create(dir.path().join("holdings.csv")).unwrap();
        writeln!(holdings, "PortfolioName,SecurityId,PL_YTD").unwrap();
        writeln!(holdings, "Fund A,S1,100").unwrap();
        let mut trades = std::fs::File::create(dir.path().join("trades.csv")).unwrap();
        writeln!(trades, "PortfolioName,SecurityId,TradeTypeName,Quantity").unwrap();
        writeln!(trades, "Fund A,S1,Buy,10").unwrap();
        writeln!(trades, "Fund A,S1,Sell,4").unwrap();
        drop(holdings);
        drop(trades);

        let store = PolarsStore::load_dir(dir.path()).unwrap();
        assert_eq!(store.table_names(), vec!["holdings", "trades"]);
        assert_eq!(store.row_count(Table::Holdings), 1);
        assert_eq!(store.row_count(Table::Trades), 2);
    }

    #[test]
    fn test_load_dir_missing_file() {
        let dir = tempfile::tempdir().unwrap();
        let err = PolarsStore::load_dir(dir.path()).err().unwrap();
        assert!(matches!(err, QaError::Datastore(_)));
    }
}
