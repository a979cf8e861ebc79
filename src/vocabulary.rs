//! Schema & Vocabulary Registry
//!
//! Static mapping of financial phrases to the columns and expressions of the
//! two tables the assistant may query. The registry is built once at startup
//! and rendered into the system block of every SQL-generation prompt.

use std::fmt;

/// The tables the generated SQL is allowed to reference.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Table {
    Holdings,
    Trades,
}

impl Table {
    pub const ALL: [Table; 2] = [Table::Holdings, Table::Trades];

    pub fn name(&self) -> &'static str {
        match self {
            Table::Holdings => "holdings",
            Table::Trades => "trades",
        }
    }
}

impl fmt::Display for Table {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Section of the prompt a vocabulary entry is listed under.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum MetricGroup {
    Performance,
    Valuation,
    TradingActivity,
    CashFlow,
    Fees,
    PortfolioScoping,
}

impl MetricGroup {
    pub const ORDERED: [MetricGroup; 6] = [
        MetricGroup::Performance,
        MetricGroup::Valuation,
        MetricGroup::TradingActivity,
        MetricGroup::CashFlow,
        MetricGroup::Fees,
        MetricGroup::PortfolioScoping,
    ];

    fn heading(&self) -> &'static str {
        match self {
            MetricGroup::Performance => "PERFORMANCE (holdings)",
            MetricGroup::Valuation => "VALUATION / EXPOSURE (holdings)",
            MetricGroup::TradingActivity => "TRADING ACTIVITY (trades)",
            MetricGroup::CashFlow => "CASH FLOW (trades)",
            MetricGroup::Fees => "FEES & COSTS (trades)",
            MetricGroup::PortfolioScoping => "PORTFOLIO SCOPING",
        }
    }
}

/// One phrase-to-expression mapping.
#[derive(Debug, Clone)]
pub struct VocabularyEntry {
    /// Phrases a user may write for this metric, lower-case.
    pub phrases: Vec<&'static str>,
    /// Column or SQL expression the phrases resolve to.
    pub expression: &'static str,
    /// Target table; `None` for dimensions shared by both tables.
    pub table: Option<Table>,
    pub group: MetricGroup,
}

impl VocabularyEntry {
    fn new(
        group: MetricGroup,
        table: Option<Table>,
        phrases: &[&'static str],
        expression: &'static str,
    ) -> Self {
        Self {
            phrases: phrases.to_vec(),
            expression,
            table,
            group,
        }
    }

    fn render(&self) -> String {
        format!("- {} → {}", self.phrases.join(", "), self.expression)
    }
}

/// Columns the model may join `holdings` and `trades` on.
pub const JOIN_KEYS: [&str; 2] = ["PortfolioName", "SecurityId"];

/// Immutable vocabulary plus the system prompt rendered from it.
#[derive(Debug, Clone)]
pub struct Vocabulary {
    entries: Vec<VocabularyEntry>,
    system_prompt: String,
}

impl Vocabulary {
    /// Build a registry from entries and render its prompt block once.
    pub fn new(entries: Vec<VocabularyEntry>) -> Self {
        let system_prompt = render_system_prompt(&entries);
        Self {
            entries,
            system_prompt,
        }
    }

    /// The fixed financial vocabulary over `holdings` and `trades`.
    pub fn standard() -> Self {
        use MetricGroup::*;
        use Table::*;

        let mut entries = Vec::new();
        entries.extend(mappings(
            Performance,
            Some(Holdings),
            &[
                (&["profit", "pnl", "performance"], "PL_YTD"),
                (&["unrealized pnl"], "PL_YTD"),
                (&["daily pnl", "today"], "PL_DTD"),
                (&["monthly pnl", "month"], "PL_MTD"),
                (&["quarterly pnl", "quarter"], "PL_QTD"),
            ],
        ));
        entries.extend(mappings(
            Valuation,
            Some(Holdings),
            &[
                (&["market value", "portfolio value", "exposure"], "MV_Base"),
                (&["local market value"], "MV_Local"),
                (&["position size"], "MV_Base"),
                (&["quantity", "position quantity"], "Qty"),
                (&["starting quantity"], "StartQty"),
                (&["price"], "Price"),
            ],
        ));
        entries.extend(mappings(
            TradingActivity,
            Some(Trades),
            &[
                (&["trades", "number of trades"], "COUNT(*)"),
                (&["buy trades"], "COUNT(*) WHERE TradeTypeName = 'Buy'"),
                (&["sell trades"], "COUNT(*) WHERE TradeTypeName = 'Sell'"),
                (&["traded quantity", "volume"], "SUM(Quantity)"),
                (&["average trade price"], "AVG(Price)"),
            ],
        ));
        entries.extend(mappings(
            CashFlow,
            Some(Trades),
            &[
                (&["trade value", "cash"], "SUM(TotalCash)"),
                (&["buy cash"], "SUM(TotalCash) WHERE TradeTypeName = 'Buy'"),
                (&["sell cash"], "SUM(TotalCash) WHERE TradeTypeName = 'Sell'"),
                (
                    &["net cash flow"],
                    "SUM(CASE WHEN TradeTypeName = 'Buy' THEN -TotalCash ELSE TotalCash END)",
                ),
            ],
        ));
        entries.extend(mappings(
            Fees,
            Some(Trades),
            &[(&["fees", "transaction cost"], "SUM(AllocationFees)")],
        ));
        entries.extend(mappings(
            PortfolioScoping,
            None,
            &[
                (&["by fund", "by portfolio"], "GROUP BY PortfolioName"),
                (&["by security"], "GROUP BY SecurityId"),
                (&["by custodian"], "GROUP BY CustodianName"),
            ],
        ));

        Self::new(entries)
    }

    pub fn entries(&self) -> &[VocabularyEntry] {
        &self.entries
    }

    /// System block listing tables, rules and every mapping.
    pub fn system_prompt(&self) -> &str {
        &self.system_prompt
    }

    /// Entries with at least one phrase occurring in `question`, case-insensitive.
    pub fn matching(&self, question: &str) -> Vec<&VocabularyEntry> {
        let question = question.to_lowercase();
        self.entries
            .iter()
            .filter(|e| e.phrases.iter().any(|p| question.contains(p)))
            .collect()
    }
}

fn mappings<'a>(
    group: MetricGroup,
    table: Option<Table>,
    rows: &'a [(&'a [&'static str], &'static str)],
) -> impl Iterator<Item = VocabularyEntry> + 'a {
    rows.iter().map(move |&(phrases, expression)| {
        VocabularyEntry::new(group, table, phrases, expression)
    })
}

impl Default for Vocabulary {
    fn default() -> Self {
        Self::standard()
    }
}

fn render_system_prompt(entries: &[VocabularyEntry]) -> String {
    let tables: Vec<String> = Table::ALL
        .iter()
        .enumerate()
        .map(|(idx, t)| format!("{}) {}", idx + 1, t.name()))
        .collect();

    let mut prompt = format!(
        r#"You are a financial data SQL generator.

You have access to ONLY two tables:
{}

RULES:
- Output ONLY valid SQL OR NONE
- No explanations
- No markdown
- No hallucinated columns
- Use GROUP BY for aggregations
- Use ORDER BY for rankings
- Join tables ONLY if required
- Allowed JOIN keys: {}
- If not answerable → NONE

==============================
METRIC MAPPINGS
==============================
"#,
        tables.join("\n"),
        JOIN_KEYS.join(", ")
    );

    for group in MetricGroup::ORDERED {
        let lines: Vec<String> = entries
            .iter()
            .filter(|e| e.group == group)
            .map(VocabularyEntry::render)
            .collect();
        if lines.is_empty() {
            continue;
        }
        prompt.push('\n');
        prompt.push_str(group.heading());
        prompt.push_str(":\n");
        prompt.push_str(&lines.join("\n"));
        prompt.push('\n');
    }

    prompt.push_str(
        r#"
TABLE USAGE:
- Holdings & performance → holdings
- Trades, volume, cash → trades
"#,
    );

    prompt
}
