//! The base query layer the tree compiler attaches to.
//!
//! [`SelectQuery`] is a deliberately small single-table query builder that
//! exposes exactly the hooks the rewriter needs: table/primary-key/parent
//! metadata, extra joined tables, extra projected columns with raw
//! expression text, extra WHERE predicates, extra ORDER BY expressions, and
//! the aggregate/distinct/subquery flags. Placeholders are `?` throughout;
//! driver adapters renumber for `$n` engines.
//!
//! Tree augmentation state is an explicit optional configuration value
//! ([`TreeOptions`]) carried on the query — a dedicated "has tree
//! augmentation" branch at compile time, not a runtime type swap. It
//! survives cloning and chaining, so derived queries (filter, values
//! projection, distinct) retain the same augmentation configuration.

use crate::dialect::Dialect;
use crate::value::SqlValue;
use std::collections::BTreeMap;

/// One column of the base relation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ColumnDef {
    pub name: String,
    /// Whether the declared type is integer-like. Consumed by fast-path
    /// eligibility: only an integer-like single ascending sibling-order
    /// column can skip the rank table.
    pub integer_like: bool,
}

/// Static metadata describing the base relation: table name, identifier
/// column, nullable parent-reference column, declared columns, and the
/// relation's natural declared ordering.
#[derive(Debug, Clone)]
pub struct TableMeta {
    pub table: String,
    pub pk_column: String,
    pub parent_column: String,
    pub columns: Vec<ColumnDef>,
    /// Natural declared ordering: field names, `-` prefix for descending.
    /// Falls back to the primary key when empty.
    pub default_order: Vec<String>,
}

impl TableMeta {
    /// Describe a relation. The primary-key and parent-reference columns are
    /// registered as integer-like; override with [`TableMeta::column`] for
    /// textual keys (UUIDs, names).
    pub fn new(table: &str, pk_column: &str, parent_column: &str) -> Self {
        TableMeta {
            table: table.to_string(),
            pk_column: pk_column.to_string(),
            parent_column: parent_column.to_string(),
            columns: vec![
                ColumnDef {
                    name: pk_column.to_string(),
                    integer_like: true,
                },
                ColumnDef {
                    name: parent_column.to_string(),
                    integer_like: true,
                },
            ],
            default_order: Vec::new(),
        }
    }

    /// Declare (or re-declare) a column.
    pub fn column(mut self, name: &str, integer_like: bool) -> Self {
        if let Some(existing) = self.columns.iter_mut().find(|c| c.name == name) {
            existing.integer_like = integer_like;
        } else {
            self.columns.push(ColumnDef {
                name: name.to_string(),
                integer_like,
            });
        }
        self
    }

    /// Set the natural declared ordering (`-` prefix = descending).
    pub fn default_order(mut self, fields: &[&str]) -> Self {
        self.default_order = fields.iter().map(|f| f.to_string()).collect();
        self
    }

    pub fn has_column(&self, name: &str) -> bool {
        self.columns.iter().any(|c| c.name == name)
    }

    pub fn column_is_integer_like(&self, name: &str) -> bool {
        self.columns
            .iter()
            .any(|c| c.name == name && c.integer_like)
    }
}

// ── Predicates ─────────────────────────────────────────────────────────────

/// A relational predicate: either a raw SQL fragment with `?` placeholders,
/// or a typed comparison rendered with dialect-correct quoting.
#[derive(Debug, Clone)]
pub enum Predicate {
    Raw { sql: String, params: Vec<SqlValue> },
    Eq { column: String, value: SqlValue },
    Ne { column: String, value: SqlValue },
    InList { column: String, values: Vec<SqlValue> },
}

impl Predicate {
    pub fn raw(sql: impl Into<String>, params: Vec<SqlValue>) -> Self {
        Predicate::Raw {
            sql: sql.into(),
            params,
        }
    }

    pub fn eq(column: &str, value: impl Into<SqlValue>) -> Self {
        Predicate::Eq {
            column: column.to_string(),
            value: value.into(),
        }
    }

    pub fn ne(column: &str, value: impl Into<SqlValue>) -> Self {
        Predicate::Ne {
            column: column.to_string(),
            value: value.into(),
        }
    }

    pub fn in_list(column: &str, values: Vec<SqlValue>) -> Self {
        Predicate::InList {
            column: column.to_string(),
            values,
        }
    }

    /// Render to SQL text plus its bind values. Typed comparisons qualify
    /// the column with `table`.
    pub(crate) fn render(&self, dialect: Dialect, table: &str) -> (String, Vec<SqlValue>) {
        let q = |c: &str| format!("{}.{}", dialect.quote_ident(table), dialect.quote_ident(c));
        match self {
            Predicate::Raw { sql, params } => (sql.clone(), params.clone()),
            Predicate::Eq { column, value } => (format!("{} = ?", q(column)), vec![value.clone()]),
            Predicate::Ne { column, value } => (format!("{} <> ?", q(column)), vec![value.clone()]),
            Predicate::InList { column, values } => {
                if values.is_empty() {
                    // Empty IN list matches nothing.
                    ("1 = 0".to_string(), Vec::new())
                } else {
                    let marks = vec!["?"; values.len()].join(", ");
                    (format!("{} IN ({marks})", q(column)), values.clone())
                }
            }
        }
    }
}

// ── Tree augmentation configuration ────────────────────────────────────────

/// Sibling order input: one field name or an ordered list, each optionally
/// prefixed with `-` for descending.
#[derive(Debug, Clone)]
pub enum SiblingOrder {
    Field(String),
    Fields(Vec<String>),
}

impl SiblingOrder {
    pub(crate) fn entries(&self) -> Vec<String> {
        match self {
            SiblingOrder::Field(f) => vec![f.clone()],
            SiblingOrder::Fields(fs) => fs.clone(),
        }
    }
}

impl From<&str> for SiblingOrder {
    fn from(f: &str) -> Self {
        SiblingOrder::Field(f.to_string())
    }
}

impl From<String> for SiblingOrder {
    fn from(f: String) -> Self {
        SiblingOrder::Field(f)
    }
}

impl From<Vec<String>> for SiblingOrder {
    fn from(fs: Vec<String>) -> Self {
        SiblingOrder::Fields(fs)
    }
}

impl From<&[&str]> for SiblingOrder {
    fn from(fs: &[&str]) -> Self {
        SiblingOrder::Fields(fs.iter().map(|f| f.to_string()).collect())
    }
}

/// One pre-filter entry: applied to the rank relation *before* ranking, in
/// the order given. Excluding a row hides its entire subtree, unlike an
/// ordinary filter on the augmented result.
#[derive(Debug, Clone)]
pub struct PreFilter {
    pub include: bool,
    pub predicate: Predicate,
}

/// Augmentation configuration attached to a [`SelectQuery`].
///
/// Constructed fresh per query from the relation metadata; there is no
/// shared default state across queries.
#[derive(Debug, Clone)]
pub struct TreeOptions {
    pub(crate) sibling_order: Vec<String>,
    pub(crate) pre_filters: Vec<PreFilter>,
    /// Custom accumulated fields: output name → source column. Ordered so
    /// generated SQL is deterministic.
    pub(crate) tree_fields: BTreeMap<String, String>,
    /// Optional recursion-depth guard added to the recursive case. Bounds
    /// runaway recursion on cyclic data; off by default.
    pub(crate) max_depth: Option<u32>,
}

impl TreeOptions {
    /// Defaults for a relation: its natural declared ordering (with the
    /// identifier appended as a final tiebreak for determinism), or the
    /// identifier alone.
    pub(crate) fn defaults_for(meta: &TableMeta) -> Self {
        let mut sibling_order = if meta.default_order.is_empty() {
            vec![meta.pk_column.clone()]
        } else {
            meta.default_order.clone()
        };
        let has_pk_tiebreak = sibling_order
            .iter()
            .any(|f| f.trim_start_matches('-') == meta.pk_column);
        if !has_pk_tiebreak {
            sibling_order.push(meta.pk_column.clone());
        }
        TreeOptions {
            sibling_order,
            pre_filters: Vec::new(),
            tree_fields: BTreeMap::new(),
            max_depth: None,
        }
    }
}

// ── SelectQuery ────────────────────────────────────────────────────────────

/// What the query projects.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) enum Projection {
    /// All declared columns of the base relation.
    AllColumns,
    /// Caller-restricted column list (`values()` semantics). Derived tree
    /// columns are omitted from projection but stay available for the
    /// join and ordering.
    Columns(Vec<String>),
    /// A summary aggregate (`COUNT(*)`).
    CountStar,
    /// Minimal existence probe (`SELECT 1 AS "a" ... LIMIT 1`).
    ExistsProbe,
}

/// A single-table SELECT under construction.
#[derive(Debug, Clone)]
pub struct SelectQuery {
    pub(crate) meta: TableMeta,
    pub(crate) projection: Projection,
    pub(crate) predicates: Vec<Predicate>,
    pub(crate) distinct: bool,
    pub(crate) subquery: bool,
    pub(crate) explain: Option<String>,
    pub(crate) limit: Option<u64>,
    // Rewriter hooks, also usable directly by callers.
    pub(crate) extra_tables: Vec<String>,
    pub(crate) extra_select: Vec<(String, String)>,
    pub(crate) extra_where: Vec<String>,
    pub(crate) extra_order_by: Vec<String>,
    pub(crate) tree: Option<TreeOptions>,
}

impl SelectQuery {
    pub fn new(meta: TableMeta) -> Self {
        SelectQuery {
            meta,
            projection: Projection::AllColumns,
            predicates: Vec::new(),
            distinct: false,
            subquery: false,
            explain: None,
            limit: None,
            extra_tables: Vec::new(),
            extra_select: Vec::new(),
            extra_where: Vec::new(),
            extra_order_by: Vec::new(),
            tree: None,
        }
    }

    pub fn meta(&self) -> &TableMeta {
        &self.meta
    }

    // ── Ordinary chaining ────────────────────────────────────────────────

    pub fn filter(mut self, predicate: Predicate) -> Self {
        self.predicates.push(predicate);
        self
    }

    /// Restrict projection to the given columns (`values()` semantics).
    pub fn values(mut self, columns: &[&str]) -> Self {
        self.projection = Projection::Columns(columns.iter().map(|c| c.to_string()).collect());
        self
    }

    pub fn distinct(mut self) -> Self {
        self.distinct = true;
        self
    }

    /// Mark this query as being compiled inside a surrounding query.
    pub fn as_subquery(mut self) -> Self {
        self.subquery = true;
        self
    }

    /// Turn the query into a `COUNT(*)` summary.
    pub fn count(mut self) -> Self {
        self.projection = Projection::CountStar;
        self
    }

    /// Turn the query into a minimal existence probe, as generated by
    /// `exists()`-style query machinery: `SELECT 1 AS "a" ... LIMIT 1`
    /// compiled as a subquery.
    pub fn exists_probe(mut self) -> Self {
        self.projection = Projection::ExistsProbe;
        self.subquery = true;
        self.limit = Some(1);
        self
    }

    /// Prefix the compiled SQL with an explain directive (e.g. `EXPLAIN`,
    /// `EXPLAIN ANALYZE`). The directive stays outside any spliced CTE.
    pub fn explain(mut self, directive: &str) -> Self {
        self.explain = Some(directive.to_string());
        self
    }

    pub fn limit(mut self, n: u64) -> Self {
        self.limit = Some(n);
        self
    }

    // ── Raw hooks (consumed by the rewriter) ─────────────────────────────

    pub fn extra_table(mut self, table: &str) -> Self {
        if !self.extra_tables.iter().any(|t| t == table) {
            self.extra_tables.push(table.to_string());
        }
        self
    }

    pub fn extra_select(mut self, alias: &str, expr: &str) -> Self {
        self.extra_select.push((alias.to_string(), expr.to_string()));
        self
    }

    pub fn extra_where(mut self, condition: &str) -> Self {
        self.extra_where.push(condition.to_string());
        self
    }

    /// Explicit result ordering. Takes precedence over the relation's
    /// declared ordering and suppresses the tree compiler's default
    /// `ORDER BY tree_ordering`.
    pub fn extra_order_by(mut self, expr: &str) -> Self {
        self.extra_order_by.push(expr.to_string());
        self
    }

    // ── Tree augmentation ────────────────────────────────────────────────

    /// Request tree fields on this query. Idempotent: reapplying has no
    /// additional effect and preserves any configured sibling order,
    /// pre-filters and custom fields.
    pub fn with_tree_fields(mut self) -> Self {
        if self.tree.is_none() {
            self.tree = Some(TreeOptions::defaults_for(&self.meta));
        }
        self
    }

    /// Revert to an unaugmented query.
    pub fn without_tree_fields(mut self) -> Self {
        self.tree = None;
        self
    }

    pub fn has_tree_fields(&self) -> bool {
        self.tree.is_some()
    }

    /// Set the sibling order: a field name or ordered list of field names,
    /// `-` prefix for descending. Implies tree fields.
    ///
    /// A single ascending integer-like column enables the fast closure path,
    /// which uses the column's raw values as sibling ranks. On MySQL and
    /// SQLite those values are zero-padded into the string ordering key, so
    /// the column must hold non-negative values for correct ordering there;
    /// columns that can go negative should take the general path (any
    /// multi-field or descending order does).
    pub fn order_siblings_by(mut self, order: impl Into<SiblingOrder>) -> Self {
        let order = order.into();
        let mut opts = self
            .tree
            .take()
            .unwrap_or_else(|| TreeOptions::defaults_for(&self.meta));
        opts.sibling_order = order.entries();
        self.tree = Some(opts);
        self
    }

    /// Add an inclusive pre-filter on the rank relation. Rows failing it —
    /// and their entire subtrees — disappear from the tree. Implies tree
    /// fields.
    pub fn tree_filter(mut self, predicate: Predicate) -> Self {
        let mut opts = self
            .tree
            .take()
            .unwrap_or_else(|| TreeOptions::defaults_for(&self.meta));
        opts.pre_filters.push(PreFilter {
            include: true,
            predicate,
        });
        self.tree = Some(opts);
        self
    }

    /// Add an exclusive pre-filter on the rank relation. Matching rows —
    /// and their entire subtrees — disappear from the tree. Implies tree
    /// fields.
    pub fn tree_exclude(mut self, predicate: Predicate) -> Self {
        let mut opts = self
            .tree
            .take()
            .unwrap_or_else(|| TreeOptions::defaults_for(&self.meta));
        opts.pre_filters.push(PreFilter {
            include: false,
            predicate,
        });
        self.tree = Some(opts);
        self
    }

    /// Request a custom accumulated field: `name` in the output carries
    /// `column`'s value at each level from root to node, accumulated
    /// exactly like `tree_path`. Implies tree fields.
    pub fn tree_field(mut self, name: &str, column: &str) -> Self {
        let mut opts = self
            .tree
            .take()
            .unwrap_or_else(|| TreeOptions::defaults_for(&self.meta));
        opts.tree_fields
            .insert(name.to_string(), column.to_string());
        self.tree = Some(opts);
        self
    }

    /// Bound the recursive closure at `max_depth` levels. Guards against
    /// unbounded recursion on cyclic parent references at the price of
    /// silently truncating deeper (legitimate) trees. Implies tree fields.
    pub fn tree_max_depth(mut self, max_depth: u32) -> Self {
        let mut opts = self
            .tree
            .take()
            .unwrap_or_else(|| TreeOptions::defaults_for(&self.meta));
        opts.max_depth = Some(max_depth);
        self.tree = Some(opts);
        self
    }

    // ── Base compilation ─────────────────────────────────────────────────

    /// Compile the query without tree augmentation. Returns SQL (without
    /// any explain prefix — see [`SelectQuery::explain_prefix`]) and its
    /// bind values in placeholder order.
    pub(crate) fn as_base_sql(&self, dialect: Dialect) -> (String, Vec<SqlValue>) {
        let table_q = dialect.quote_ident(&self.meta.table);
        let mut params = Vec::new();

        let mut select_items: Vec<String> = match &self.projection {
            Projection::AllColumns => self
                .meta
                .columns
                .iter()
                .map(|c| format!("{table_q}.{}", dialect.quote_ident(&c.name)))
                .collect(),
            Projection::Columns(cols) => cols
                .iter()
                .map(|c| format!("{table_q}.{}", dialect.quote_ident(c)))
                .collect(),
            Projection::CountStar => {
                vec![format!("COUNT(*) AS {}", dialect.quote_ident("__count"))]
            }
            Projection::ExistsProbe => vec![format!("1 AS {}", dialect.quote_ident("a"))],
        };
        for (alias, expr) in &self.extra_select {
            select_items.push(format!("{expr} AS {}", dialect.quote_ident(alias)));
        }

        let mut sql = String::from("SELECT ");
        if self.distinct {
            sql.push_str("DISTINCT ");
        }
        sql.push_str(&select_items.join(", "));
        sql.push_str(" FROM ");
        sql.push_str(&table_q);
        for t in &self.extra_tables {
            sql.push_str(", ");
            sql.push_str(t);
        }

        let mut conditions: Vec<String> = Vec::new();
        for p in &self.predicates {
            let (cond, binds) = p.render(dialect, &self.meta.table);
            conditions.push(cond);
            params.extend(binds);
        }
        conditions.extend(self.extra_where.iter().cloned());
        if !conditions.is_empty() {
            sql.push_str(" WHERE ");
            sql.push_str(&conditions.join(" AND "));
        }

        let order_items = self.order_items(dialect);
        if !order_items.is_empty() {
            sql.push_str(" ORDER BY ");
            sql.push_str(&order_items.join(", "));
        }

        if let Some(n) = self.limit {
            sql.push_str(&format!(" LIMIT {n}"));
        }

        (sql, params)
    }

    /// The explain directive plus trailing space, or empty.
    pub(crate) fn explain_prefix(&self) -> String {
        match &self.explain {
            Some(directive) => format!("{directive} "),
            None => String::new(),
        }
    }

    /// Effective ORDER BY items: an explicit extra ordering wins over the
    /// relation's declared ordering; summaries and probes never order.
    fn order_items(&self, dialect: Dialect) -> Vec<String> {
        if matches!(
            self.projection,
            Projection::CountStar | Projection::ExistsProbe
        ) {
            return Vec::new();
        }
        if !self.extra_order_by.is_empty() {
            return self.extra_order_by.clone();
        }
        let table_q = dialect.quote_ident(&self.meta.table);
        self.meta
            .default_order
            .iter()
            .map(|f| {
                let (name, dir) = match f.strip_prefix('-') {
                    Some(rest) => (rest, " DESC"),
                    None => (f.as_str(), ""),
                };
                format!("{table_q}.{}{dir}", dialect.quote_ident(name))
            })
            .collect()
    }
}
