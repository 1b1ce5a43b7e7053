// SQL guard - read-only policy gate for the sql_query tool
//
// Conservative heuristic, not a parser: an allow-list on the leading keyword,
// a whole-word denylist over the entire text (CTEs included), a statement
// chaining check, and row-limit rewriting. Some legal read-only queries are
// rejected; that is accepted in exchange for a small rule set.

use crate::config::constants::{DEFAULT_ROW_LIMIT, MAX_ROW_LIMIT};
use once_cell::sync::Lazy;
use regex::Regex;
use serde::Serialize;
use thiserror::Error;

/// Keywords a query may start with
pub const ALLOWED_LEADING_KEYWORDS: &[&str] = &["SELECT", "WITH"];

/// Keywords rejected anywhere in the query text
pub const DENYLISTED_KEYWORDS: &[&str] = &[
    "INSERT", "UPDATE", "DELETE", "DROP", "ALTER", "CREATE", "REPLACE", "ATTACH", "PRAGMA",
    "VACUUM", "GRANT",
];

static DENYLIST_RE: Lazy<Regex> = Lazy::new(|| {
    let alternation = DENYLISTED_KEYWORDS.join("|");
    Regex::new(&format!(r"(?i)\b({})\b", alternation)).expect("denylist regex is valid")
});

/// `LIMIT n`, `LIMIT n OFFSET m` or SQLite's `LIMIT m, n` at the very end
static TRAILING_LIMIT_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?i)\blimit\s+(\d+)(?:\s+offset\s+(\d+)|\s*,\s*(\d+))?\s*$")
        .expect("limit regex is valid")
});

static ANY_LIMIT_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?i)\blimit\b").expect("limit keyword regex is valid"));

/// Why the guard denied a query
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum GuardRejection {
    #[error("empty query")]
    Empty,

    #[error("only read-only SELECT/WITH queries are allowed (query starts with '{0}')")]
    NotReadOnly(String),

    #[error("forbidden keyword '{0}' in query")]
    ForbiddenKeyword(String),

    #[error("multiple statements are not allowed")]
    StatementChaining,

    #[error("SQL comments are not allowed")]
    Comment,
}

/// Outcome of checking one query string. Stateless; recompute per query.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct QueryGuardDecision {
    pub allowed: bool,
    /// The query to execute when allowed. Callers must run this, not the input.
    pub normalized_query: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub reason: Option<String>,
    /// Row count of a LIMIT the guard wrote itself (injected, clamped or
    /// wrapped). `None` when the query's own limit was kept.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub row_cap: Option<u64>,
}

impl QueryGuardDecision {
    fn allow(normalized_query: String, row_cap: Option<u64>) -> Self {
        Self {
            allowed: true,
            normalized_query,
            reason: None,
            row_cap,
        }
    }

    fn deny(normalized_query: String, rejection: GuardRejection) -> Self {
        Self {
            allowed: false,
            normalized_query,
            reason: Some(rejection.to_string()),
            row_cap: None,
        }
    }
}

/// Guard with configurable row caps
#[derive(Debug, Clone, Copy)]
pub struct SqlGuard {
    pub default_limit: u64,
    pub max_limit: u64,
}

impl Default for SqlGuard {
    fn default() -> Self {
        Self {
            default_limit: DEFAULT_ROW_LIMIT,
            max_limit: MAX_ROW_LIMIT,
        }
    }
}

impl SqlGuard {
    pub fn new(default_limit: u64, max_limit: u64) -> Self {
        Self {
            default_limit: default_limit.min(max_limit),
            max_limit,
        }
    }

    /// Same caps, but inject `rows` into queries without a LIMIT
    pub fn with_default_limit(self, rows: u64) -> Self {
        Self::new(rows, self.max_limit)
    }

    /// Check `query` against the read-only policy
    pub fn check(&self, query: &str) -> QueryGuardDecision {
        let stripped = strip_separators(query);
        match self.evaluate(stripped) {
            Ok((normalized, row_cap)) => QueryGuardDecision::allow(normalized, row_cap),
            Err(rejection) => {
                tracing::debug!("SQL guard rejected query: {}", rejection);
                QueryGuardDecision::deny(stripped.to_string(), rejection)
            }
        }
    }

    fn evaluate(&self, query: &str) -> Result<(String, Option<u64>), GuardRejection> {
        if query.is_empty() {
            return Err(GuardRejection::Empty);
        }

        let leading: String = query
            .chars()
            .take_while(|c| c.is_ascii_alphabetic())
            .collect::<String>()
            .to_ascii_uppercase();
        if !ALLOWED_LEADING_KEYWORDS.contains(&leading.as_str()) {
            let shown = if leading.is_empty() {
                query.chars().take(1).collect()
            } else {
                leading
            };
            return Err(GuardRejection::NotReadOnly(shown));
        }

        if let Some(m) = DENYLIST_RE.find(query) {
            return Err(GuardRejection::ForbiddenKeyword(
                m.as_str().to_ascii_uppercase(),
            ));
        }

        // Trailing separators are already gone, so any remaining ';' has
        // content after it.
        if query.contains(';') {
            return Err(GuardRejection::StatementChaining);
        }

        if query.contains("--") || query.contains("/*") {
            return Err(GuardRejection::Comment);
        }

        Ok(self.apply_limit(query))
    }

    fn apply_limit(&self, query: &str) -> (String, Option<u64>) {
        if let Some(limit) = TrailingLimit::find(query) {
            if limit.count <= self.max_limit {
                return (query.to_string(), None);
            }
            return (limit.rewrite(query, self.max_limit), Some(self.max_limit));
        }

        if ANY_LIMIT_RE.is_match(query) {
            // A LIMIT we can't rewrite in place (parameter, expression,
            // subquery): cap the whole result instead.
            return (
                format!("SELECT * FROM ({}) LIMIT {}", query, self.max_limit),
                Some(self.max_limit),
            );
        }

        (
            format!("{} LIMIT {}", query, self.default_limit),
            Some(self.default_limit),
        )
    }
}

/// Numeric LIMIT clause at the very end of a query
struct TrailingLimit<'a> {
    start: usize,
    /// Leading number: the count, or the offset in `LIMIT m, n`
    first: &'a str,
    offset: Option<&'a str>,
    comma_count: Option<&'a str>,
    count: u64,
}

impl<'a> TrailingLimit<'a> {
    fn find(query: &'a str) -> Option<Self> {
        let caps = TRAILING_LIMIT_RE.captures(query)?;
        let start = caps.get(0)?.start();
        let first = caps.get(1)?.as_str();
        let offset = caps.get(2).map(|m| m.as_str());
        let comma_count = caps.get(3).map(|m| m.as_str());
        // `LIMIT m, n` means offset m, count n
        let count = parse_number(Some(comma_count.unwrap_or(first)));
        Some(Self {
            start,
            first,
            offset,
            comma_count,
            count,
        })
    }

    fn rewrite(&self, query: &str, count: u64) -> String {
        let clause = match (self.offset, self.comma_count) {
            (Some(off), _) => format!("LIMIT {} OFFSET {}", count, off),
            (None, Some(_)) => format!("LIMIT {}, {}", self.first, count),
            (None, None) => format!("LIMIT {}", count),
        };
        format!("{}{}", &query[..self.start], clause)
    }
}

/// Replace the row count of a query's trailing LIMIT clause. Every query the
/// guard allows ends in one; `None` otherwise.
pub fn with_row_count(query: &str, count: u64) -> Option<String> {
    TrailingLimit::find(query).map(|limit| limit.rewrite(query, count))
}

/// Check `query` with the default row caps
pub fn check(query: &str) -> QueryGuardDecision {
    SqlGuard::default().check(query)
}

/// Strip surrounding whitespace and trailing statement separators
fn strip_separators(query: &str) -> &str {
    query.trim().trim_end_matches(|c: char| c == ';' || c.is_whitespace())
}

/// Digits matched by the regex; saturate absurdly large values
fn parse_number(digits: Option<&str>) -> u64 {
    digits.and_then(|d| d.parse().ok()).unwrap_or(u64::MAX)
}
