//! Encoding and decoding of list-valued tree columns.
//!
//! PostgreSQL accumulates `tree_path` / `tree_ordering` as native arrays, so
//! nothing needs decoding there — the driver hands back a typed array. MySQL
//! and SQLite have no array type; the closure emulates one as a string that
//! begins and ends with a reserved separator byte, every element terminated
//! by the separator:
//!
//! ```text
//! \x1f 0000000000000000001 \x1f 0000000000000000003 \x1f
//! ```
//!
//! Elements of `tree_ordering` are zero-padded to a fixed width so that the
//! engine's plain lexicographic string comparison of two ordering keys agrees
//! with numeric comparison of the rank sequences — the ordering column
//! participates in an `ORDER BY` that the engine evaluates as a string
//! compare. `tree_path` elements are not padded; the path never sorts.
//!
//! The string representation is NOT part of the public API; only the decoded
//! [`SqlValue`] sequences are.

use crate::dialect::Dialect;
use crate::value::SqlValue;

/// Reserved element separator: ASCII unit separator, not expected in data.
pub const SEPARATOR: char = '\u{1f}';

/// Fixed width for zero-padded ordering elements on string-encoding
/// dialects. Bounds the usable rank range, not the tree depth.
///
/// Zero padding assumes non-negative elements; a `-` sign would defeat the
/// lexicographic-equals-numeric comparison. General-path ranks start at 1,
/// so this only concerns fast-path raw order values (see
/// [`SelectQuery::order_siblings_by`](crate::SelectQuery::order_siblings_by)).
pub const PAD_WIDTH: usize = 20;

/// Capacity of the string-encoded accumulator columns on MySQL
/// (`CAST(... AS char(1000))`). Practically bounds maximum tree depth on
/// that dialect to a few tens of levels; exceeding it is an engine-side
/// execution error.
pub const STRING_CAPACITY: usize = 1000;

// ── SQL fragment construction ──────────────────────────────────────────────

/// Base-case accumulator seed: a one-element list holding `value_sql`.
///
/// `padded` selects the fixed-width zero-padded encoding used for
/// `tree_ordering`; paths and custom fields stay unpadded.
pub(crate) fn seed_expr(dialect: Dialect, value_sql: &str, padded: bool) -> String {
    let sep = dialect.quote_literal(&SEPARATOR.to_string());
    match dialect {
        Dialect::Postgres => format!("array[{value_sql}]"),
        Dialect::Mysql => {
            if padded {
                format!(
                    "CAST(CONCAT({sep}, LPAD(CONCAT({value_sql}, {sep}), {PAD_WIDTH}, '0')) AS char({STRING_CAPACITY}))"
                )
            } else {
                format!("CAST(CONCAT({sep}, {value_sql}, {sep}) AS char({STRING_CAPACITY}))")
            }
        }
        Dialect::Sqlite => {
            if padded {
                format!("printf('{SEPARATOR}%0{PAD_WIDTH}s{SEPARATOR}', {value_sql})")
            } else {
                format!("printf('{SEPARATOR}%s{SEPARATOR}', {value_sql})")
            }
        }
    }
}

/// Recursive-case append: `acc_sql` extended with `value_sql`.
pub(crate) fn append_expr(dialect: Dialect, acc_sql: &str, value_sql: &str, padded: bool) -> String {
    let sep = dialect.quote_literal(&SEPARATOR.to_string());
    match dialect {
        Dialect::Postgres => format!("{acc_sql} || {value_sql}"),
        Dialect::Mysql => {
            if padded {
                format!("CONCAT({acc_sql}, LPAD(CONCAT({value_sql}, {sep}), {PAD_WIDTH}, '0'))")
            } else {
                format!("CONCAT({acc_sql}, {value_sql}, {sep})")
            }
        }
        Dialect::Sqlite => {
            if padded {
                format!("{acc_sql} || printf('%0{PAD_WIDTH}s{SEPARATOR}', {value_sql})")
            } else {
                format!("{acc_sql} || printf('%s{SEPARATOR}', {value_sql})")
            }
        }
    }
}

// ── Decoding ───────────────────────────────────────────────────────────────

/// Decode a separator-encoded list into typed values.
///
/// Splits on [`SEPARATOR`], discards the empty leading/trailing tokens, and
/// converts all elements to integers if every element parses; otherwise all
/// elements are kept as text. Zero-padded elements parse fine (`"0001"` is
/// 1). Malformed input decodes best-effort as text; this never fails.
pub fn decode_list(raw: &str) -> Vec<SqlValue> {
    let parts: Vec<&str> = raw.split(SEPARATOR).collect();
    if parts.len() < 3 {
        // Not a well-formed encoding (no wrapping separators). Best effort:
        // treat the whole value as a single text element if non-empty.
        if raw.is_empty() {
            return Vec::new();
        }
        return vec![SqlValue::Text(raw.to_string())];
    }
    coerce_elements(parts[1..parts.len() - 1].iter().map(|s| s.to_string()))
}

/// Decode a PostgreSQL array literal (`{1,2,3}`) handed back as text by
/// drivers that do not surface typed arrays. Quoted elements and escapes
/// are not handled — tree columns only ever hold keys and rank numbers.
pub fn decode_array_literal(raw: &str) -> Vec<SqlValue> {
    let inner = raw
        .strip_prefix('{')
        .and_then(|s| s.strip_suffix('}'))
        .unwrap_or(raw);
    if inner.is_empty() {
        return Vec::new();
    }
    coerce_elements(inner.split(',').map(|s| s.trim().to_string()))
}

/// Decode a raw column value for the given dialect.
///
/// On array-capable dialects decoding is nominally the identity; this entry
/// point still accepts the textual array literal for drivers that return
/// one. String-encoding dialects always go through [`decode_list`].
pub fn decode(dialect: Dialect, raw: &str) -> Vec<SqlValue> {
    if dialect.supports_arrays() && raw.starts_with('{') {
        decode_array_literal(raw)
    } else {
        decode_list(raw)
    }
}

/// All-or-nothing integer coercion: every element parses as `i64`, or all
/// stay text. Supports both integer and textual sibling-order keys without
/// the caller having to know which it got.
fn coerce_elements(parts: impl Iterator<Item = String>) -> Vec<SqlValue> {
    let texts: Vec<String> = parts.collect();
    let ints: Option<Vec<i64>> = texts.iter().map(|s| s.parse::<i64>().ok()).collect();
    match ints {
        Some(ints) => ints.into_iter().map(SqlValue::Int).collect(),
        None => texts.into_iter().map(SqlValue::Text).collect(),
    }
}
