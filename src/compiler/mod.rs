//! The tree-query compiler.
//!
//! Takes a caller's [`SelectQuery`] carrying tree augmentation options and
//! produces the final executable SQL: the recursive closure CTE spliced in
//! front of the caller's own query, a join on identifier equality, the
//! derived output columns, and the default depth-first ordering.
//!
//! The pipeline is linear and runs once per compilation:
//! 1. Detect "no augmentation needed" cases and bypass or suppress.
//! 2. Validate the augmentation configuration (fail fast — no partial
//!    augmentation is ever produced).
//! 3. Pick the fast or general closure path.
//! 4. Apply the join/projection/ordering through the query's raw hooks.
//! 5. Compile the base query, splice the CTE before it (hoisting any
//!    leading EXPLAIN directive), and concatenate parameter lists.
//!
//! # Submodules
//! - `encode` — list-column encoding/decoding per dialect
//! - `rank` — the `__rank_table` derived relation
//! - `closure` — the `__tree` recursive CTE

pub mod encode;

pub(crate) mod closure;
pub(crate) mod rank;

use crate::dialect::Dialect;
use crate::error::TreeQueryError;
use crate::query::{Projection, SelectQuery, TableMeta, TreeOptions};
use crate::value::SqlValue;
use tracing::debug;

/// Built-in closure column names; custom tree fields may not shadow them.
const RESERVED_TREE_COLUMNS: [&str; 4] = ["tree_depth", "tree_path", "tree_ordering", "tree_pk"];

/// A compiled, executable tree query.
#[derive(Debug, Clone)]
pub struct CompiledTreeQuery {
    /// Full SQL text: optional EXPLAIN directive, `WITH RECURSIVE` block,
    /// then the caller's query with join/projection/ordering applied.
    pub sql: String,
    /// Bind values in placeholder order: rank-table binds first, then the
    /// caller's own.
    pub params: Vec<SqlValue>,
    /// Projected output columns that carry an encoded list and should be
    /// run through [`CompiledTreeQuery::decode`] on row materialization.
    pub list_columns: Vec<String>,
    /// Whether the cheap direct-CTE path was taken.
    pub fast_path: bool,
    dialect: Dialect,
}

impl CompiledTreeQuery {
    /// Whether returned list columns need decoding at all. Array-capable
    /// backends hand back typed arrays already.
    pub fn needs_decode(&self) -> bool {
        !self.dialect.supports_arrays()
    }

    /// Decode a raw list-column value into typed elements.
    pub fn decode(&self, raw: &str) -> Vec<SqlValue> {
        encode::decode(self.dialect, raw)
    }
}

impl SelectQuery {
    /// Compile this query for the given dialect, applying tree augmentation
    /// when requested.
    pub fn compile(&self, dialect: Dialect) -> Result<CompiledTreeQuery, TreeQueryError> {
        compile(self, dialect)
    }
}

/// Compile `query` for `dialect`.
pub fn compile(
    query: &SelectQuery,
    dialect: Dialect,
) -> Result<CompiledTreeQuery, TreeQueryError> {
    validate_meta(&query.meta)?;

    let Some(opts) = &query.tree else {
        return Ok(plain(query, dialect));
    };

    // Minimal existence-check subqueries get no tree machinery at all: no
    // column needs augmenting and the base-table alias context may not even
    // be valid inside the surrounding query.
    if query.subquery && query.projection == Projection::ExistsProbe {
        debug!("existence probe subquery, bypassing tree augmentation");
        return Ok(plain(query, dialect));
    }

    validate_tree_fields(opts)?;

    // Summary queries must not grow non-aggregated columns (that would
    // change grouping and duplicate rows), and a distinct-over-subquery
    // composition drops annotations in the surrounding query anyway. Both
    // keep the join but suppress the derived columns and default ordering.
    let suppress = (query.distinct && query.subquery)
        || query.projection == Projection::CountStar;

    let fast_path = fast_path_eligible(&query.meta, opts)?;
    debug!(fast_path, suppress, dialect = %dialect, "compiling tree query");

    let cte = closure::build_closure(&query.meta, opts, dialect, fast_path)?;

    let table_q = dialect.quote_ident(&query.meta.table);
    let pk_q = dialect.quote_ident(&query.meta.pk_column);

    let mut spliced = query
        .clone()
        .extra_table("__tree")
        .extra_where(&format!("__tree.tree_pk = {table_q}.{pk_q}"));

    // Derived columns are omitted when the caller restricted projection;
    // they remain available for the join and ordering.
    let project = !suppress && !matches!(query.projection, Projection::Columns(_));
    let mut list_columns = Vec::new();
    if project {
        spliced = spliced
            .extra_select("tree_depth", "__tree.tree_depth")
            .extra_select("tree_path", "__tree.tree_path")
            .extra_select("tree_ordering", "__tree.tree_ordering");
        list_columns.push("tree_path".to_string());
        list_columns.push("tree_ordering".to_string());
        for name in opts.tree_fields.keys() {
            let expr = format!("__tree.{}", dialect.quote_ident(name));
            spliced = spliced.extra_select(name, &expr);
            list_columns.push(name.clone());
        }
    }

    // Depth-first traversal is the default result order, unless the caller
    // ordered explicitly or this is a suppressed (summary) query.
    if !suppress && spliced.extra_order_by.is_empty() {
        spliced = spliced.extra_order_by("__tree.tree_ordering");
    }

    let (base_sql, base_params) = spliced.as_base_sql(dialect);
    let sql = format!("{}{}{base_sql}", query.explain_prefix(), cte.with_sql);
    let mut params = cte.params;
    params.extend(base_params);

    Ok(CompiledTreeQuery {
        sql,
        params,
        list_columns,
        fast_path,
        dialect,
    })
}

/// Compile without any tree machinery.
fn plain(query: &SelectQuery, dialect: Dialect) -> CompiledTreeQuery {
    let (base_sql, params) = query.as_base_sql(dialect);
    CompiledTreeQuery {
        sql: format!("{}{base_sql}", query.explain_prefix()),
        params,
        list_columns: Vec::new(),
        fast_path: false,
        dialect,
    }
}

fn validate_meta(meta: &TableMeta) -> Result<(), TreeQueryError> {
    for ident in [&meta.table, &meta.pk_column, &meta.parent_column] {
        if ident.trim().is_empty() {
            return Err(TreeQueryError::InvalidIdentifier(ident.clone()));
        }
    }
    Ok(())
}

fn validate_tree_fields(opts: &TreeOptions) -> Result<(), TreeQueryError> {
    for name in opts.tree_fields.keys() {
        if RESERVED_TREE_COLUMNS.contains(&name.as_str()) {
            return Err(TreeQueryError::ReservedTreeFieldName(name.clone()));
        }
        if !is_plain_ident(name) {
            return Err(TreeQueryError::InvalidIdentifier(name.clone()));
        }
    }
    Ok(())
}

/// Fast-path eligibility: a single ascending integer-like order column, no
/// pre-filters, and custom tree fields that are plain base-relation columns.
///
/// Custom-field existence is validated here — this is the only point where
/// the compiler knows the closure will read the base relation directly, so
/// a missing column must fail loudly instead of reaching the engine.
fn fast_path_eligible(meta: &TableMeta, opts: &TreeOptions) -> Result<bool, TreeQueryError> {
    if !opts.pre_filters.is_empty() {
        return Ok(false);
    }
    let fields = rank::resolve_sibling_order(&opts.sibling_order)?;
    if fields.len() != 1 || fields[0].descending {
        return Ok(false);
    }
    let order_field = &fields[0].field;
    if !is_plain_ident(order_field) || !meta.column_is_integer_like(order_field) {
        return Ok(false);
    }
    for (name, column) in &opts.tree_fields {
        if !is_plain_ident(column) {
            return Ok(false);
        }
        if !meta.has_column(column) {
            return Err(TreeQueryError::UnknownTreeFieldColumn {
                name: name.clone(),
                column: column.clone(),
            });
        }
    }
    Ok(true)
}

/// A plain identifier: letters, digits and underscores only. Anything else
/// is treated as a raw SQL expression by order/field rendering.
pub(crate) fn is_plain_ident(s: &str) -> bool {
    !s.is_empty() && s.chars().all(|c| c.is_ascii_alphanumeric() || c == '_')
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::query::Predicate;

    fn meta() -> TableMeta {
        TableMeta::new("nodes", "id", "parent_id")
            .column("position", true)
            .column("name", false)
            .default_order(&["position"])
    }

    fn query() -> SelectQuery {
        SelectQuery::new(meta())
    }

    // ── is_plain_ident ──────────────────────────────────────────────

    #[test]
    fn test_is_plain_ident() {
        assert!(is_plain_ident("position"));
        assert!(is_plain_ident("a_b_2"));
        assert!(!is_plain_ident(""));
        assert!(!is_plain_ident("LOWER(name)"));
        assert!(!is_plain_ident("a.b"));
    }

    // ── unaugmented + bypass ────────────────────────────────────────

    #[test]
    fn test_unaugmented_query_compiles_plain() {
        let c = query().compile(Dialect::Postgres).unwrap();
        assert!(!c.sql.contains("WITH RECURSIVE"));
        assert!(c.list_columns.is_empty());
    }

    #[test]
    fn test_exists_probe_bypasses_entirely() {
        let c = query()
            .with_tree_fields()
            .exists_probe()
            .compile(Dialect::Postgres)
            .unwrap();
        assert!(!c.sql.contains("WITH RECURSIVE"));
        assert!(!c.sql.contains("__tree"));
        assert!(c.sql.contains("1 AS \"a\""));
    }

    // ── suppression ─────────────────────────────────────────────────

    #[test]
    fn test_count_suppresses_columns_and_ordering_but_joins() {
        let c = query()
            .with_tree_fields()
            .count()
            .compile(Dialect::Postgres)
            .unwrap();
        assert!(c.sql.contains("WITH RECURSIVE"));
        assert!(c.sql.contains("__tree.tree_pk = \"nodes\".\"id\""));
        assert!(!c.sql.contains("AS \"tree_depth\""));
        assert!(!c.sql.contains("ORDER BY __tree.tree_ordering"));
        assert!(c.list_columns.is_empty());
    }

    #[test]
    fn test_distinct_subquery_suppresses() {
        let c = query()
            .with_tree_fields()
            .distinct()
            .as_subquery()
            .compile(Dialect::Postgres)
            .unwrap();
        assert!(c.sql.contains("WITH RECURSIVE"));
        assert!(!c.sql.contains("AS \"tree_depth\""));
        assert!(!c.sql.contains("ORDER BY __tree.tree_ordering"));
    }

    #[test]
    fn test_values_projection_omits_derived_columns_keeps_order() {
        let c = query()
            .with_tree_fields()
            .values(&["id", "name"])
            .compile(Dialect::Postgres)
            .unwrap();
        assert!(!c.sql.contains("AS \"tree_depth\""));
        assert!(c.sql.contains("ORDER BY __tree.tree_ordering"));
        assert!(c.list_columns.is_empty());
    }

    // ── the full splice ─────────────────────────────────────────────

    #[test]
    fn test_augmented_query_full_shape() {
        let c = query().with_tree_fields().compile(Dialect::Postgres).unwrap();
        assert!(c.sql.starts_with("WITH RECURSIVE __rank_table("));
        assert!(c.sql.contains("__tree.tree_depth AS \"tree_depth\""));
        assert!(c.sql.contains("__tree.tree_path AS \"tree_path\""));
        assert!(c.sql.contains("__tree.tree_ordering AS \"tree_ordering\""));
        assert!(c.sql.contains("FROM \"nodes\", __tree"));
        assert!(c.sql.contains("WHERE __tree.tree_pk = \"nodes\".\"id\""));
        assert!(c.sql.ends_with("ORDER BY __tree.tree_ordering"));
        assert_eq!(c.list_columns, vec!["tree_path", "tree_ordering"]);
    }

    #[test]
    fn test_caller_ordering_wins() {
        let c = query()
            .with_tree_fields()
            .extra_order_by("\"nodes\".\"name\" DESC")
            .compile(Dialect::Postgres)
            .unwrap();
        assert!(c.sql.ends_with("ORDER BY \"nodes\".\"name\" DESC"));
        assert!(!c.sql.contains("ORDER BY __tree.tree_ordering"));
    }

    #[test]
    fn test_explain_prefix_is_hoisted_before_cte() {
        let c = query()
            .with_tree_fields()
            .explain("EXPLAIN ANALYZE")
            .compile(Dialect::Postgres)
            .unwrap();
        assert!(c.sql.starts_with("EXPLAIN ANALYZE WITH RECURSIVE"));
    }

    #[test]
    fn test_param_order_rank_binds_first() {
        let c = query()
            .with_tree_fields()
            .tree_exclude(Predicate::eq("name", "hidden"))
            .filter(Predicate::eq("position", 7))
            .compile(Dialect::Postgres)
            .unwrap();
        assert_eq!(
            c.params,
            vec![SqlValue::Text("hidden".into()), SqlValue::Int(7)]
        );
        // Placeholders appear in the same order in the text: the rank-table
        // bind sits inside the CTE, before the caller's own WHERE.
        let exclude_at = c.sql.find("NOT (\"nodes\".\"name\" = ?)").unwrap();
        let filter_at = c.sql.find("\"nodes\".\"position\" = ?").unwrap();
        assert!(exclude_at < filter_at);
    }

    // ── idempotence ─────────────────────────────────────────────────

    #[test]
    fn test_double_augmentation_is_identical() {
        let once = query().with_tree_fields().compile(Dialect::Sqlite).unwrap();
        let twice = query()
            .with_tree_fields()
            .with_tree_fields()
            .compile(Dialect::Sqlite)
            .unwrap();
        assert_eq!(once.sql, twice.sql);
        assert_eq!(once.params, twice.params);
    }

    // ── fast path decision ──────────────────────────────────────────

    #[test]
    fn test_fast_path_single_ascending_integer() {
        let c = query()
            .order_siblings_by("position")
            .compile(Dialect::Postgres)
            .unwrap();
        assert!(c.fast_path);
        assert!(!c.sql.contains("__rank_table"));
    }

    #[test]
    fn test_default_order_uses_general_path() {
        // The default sibling order carries the pk tiebreak → two fields.
        let c = query().with_tree_fields().compile(Dialect::Postgres).unwrap();
        assert!(!c.fast_path);
    }

    #[test]
    fn test_descending_order_forces_general_path() {
        let c = query()
            .order_siblings_by("-position")
            .compile(Dialect::Postgres)
            .unwrap();
        assert!(!c.fast_path);
    }

    #[test]
    fn test_text_order_column_forces_general_path() {
        let c = query()
            .order_siblings_by("name")
            .compile(Dialect::Postgres)
            .unwrap();
        assert!(!c.fast_path);
    }

    #[test]
    fn test_pre_filter_forces_general_path() {
        let c = query()
            .order_siblings_by("position")
            .tree_filter(Predicate::eq("name", "x"))
            .compile(Dialect::Postgres)
            .unwrap();
        assert!(!c.fast_path);
    }

    #[test]
    fn test_fast_path_unknown_tree_field_column_errors() {
        let err = query()
            .order_siblings_by("position")
            .tree_field("tree_names", "nam")
            .compile(Dialect::Postgres)
            .unwrap_err();
        assert!(matches!(err, TreeQueryError::UnknownTreeFieldColumn { .. }));
    }

    #[test]
    fn test_general_path_leaves_unknown_columns_to_engine() {
        // Not fast-path eligible → existence is not pre-checked.
        let c = query()
            .order_siblings_by("name")
            .tree_field("tree_things", "nam")
            .compile(Dialect::Postgres);
        assert!(c.is_ok());
    }

    // ── config validation ───────────────────────────────────────────

    #[test]
    fn test_reserved_tree_field_name_rejected() {
        let err = query()
            .tree_field("tree_path", "name")
            .compile(Dialect::Postgres)
            .unwrap_err();
        assert!(matches!(err, TreeQueryError::ReservedTreeFieldName(_)));
    }

    #[test]
    fn test_empty_sibling_order_rejected() {
        let err = query()
            .order_siblings_by(Vec::<String>::new())
            .compile(Dialect::Postgres)
            .unwrap_err();
        assert!(matches!(err, TreeQueryError::InvalidSiblingOrder(_)));
    }

    #[test]
    fn test_blank_meta_identifier_rejected() {
        let err = SelectQuery::new(TableMeta::new("", "id", "parent_id"))
            .with_tree_fields()
            .compile(Dialect::Postgres)
            .unwrap_err();
        assert!(matches!(err, TreeQueryError::InvalidIdentifier(_)));
    }

    // ── custom fields in output ─────────────────────────────────────

    #[test]
    fn test_custom_field_projected_and_listed() {
        let c = query()
            .tree_field("tree_names", "name")
            .compile(Dialect::Sqlite)
            .unwrap();
        assert!(c.sql.contains("__tree.\"tree_names\" AS \"tree_names\""));
        assert_eq!(
            c.list_columns,
            vec!["tree_path", "tree_ordering", "tree_names"]
        );
    }

    // ── decode integration ──────────────────────────────────────────

    #[test]
    fn test_needs_decode_per_dialect() {
        let pg = query().with_tree_fields().compile(Dialect::Postgres).unwrap();
        let lite = query().with_tree_fields().compile(Dialect::Sqlite).unwrap();
        assert!(!pg.needs_decode());
        assert!(lite.needs_decode());
    }

    #[test]
    fn test_compiled_decode_roundtrip() {
        let c = query().with_tree_fields().compile(Dialect::Sqlite).unwrap();
        let raw = "\u{1f}1\u{1f}0000000000000000003\u{1f}";
        assert_eq!(c.decode(raw), vec![SqlValue::Int(1), SqlValue::Int(3)]);
    }
}
