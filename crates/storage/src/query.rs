use anyhow::Result;
use chrono::{DateTime, Utc};
use sqlx::{sqlite::SqliteRow, Pool, QueryBuilder, Sqlite};

#[derive(Debug, Clone, PartialEq)]
pub enum Value {
    Int(i64),
    Text(String),
    Bool(bool),
    Time(DateTime<Utc>),
}

impl Value {
    fn is_blank(&self) -> bool {
        matches!(self, Value::Text(text) if text.trim().is_empty())
    }
}

impl From<i64> for Value {
    fn from(value: i64) -> Self {
        Value::Int(value)
    }
}

impl From<bool> for Value {
    fn from(value: bool) -> Self {
        Value::Bool(value)
    }
}

impl From<String> for Value {
    fn from(value: String) -> Self {
        Value::Text(value)
    }
}

impl From<&str> for Value {
    fn from(value: &str) -> Self {
        Value::Text(value.to_string())
    }
}

impl From<DateTime<Utc>> for Value {
    fn from(value: DateTime<Utc>) -> Self {
        Value::Time(value)
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum Condition {
    Eq(Value),
    Like(String),
    Gte(Value),
    Lte(Value),
    In(Vec<Value>),
}

#[derive(Debug, Clone, PartialEq)]
pub struct Filter {
    pub column: &'static str,
    pub condition: Condition,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Direction {
    Asc,
    Desc,
}

/// Lazy description of a listing: nothing touches the database until a
/// repository is asked to run it.
///
/// Column names are always `&'static str` supplied by code; only values are
/// bound as parameters.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Query {
    filters: Vec<Filter>,
    order: Vec<(&'static str, Direction)>,
    limit: Option<u32>,
    offset: u32,
}

impl Query {
    pub fn new() -> Self {
        Self::default()
    }

    /// Equality filter that is skipped when the value is absent or blank.
    pub fn and_filter_where<V: Into<Value>>(self, column: &'static str, value: Option<V>) -> Self {
        match value.map(Into::into) {
            Some(value) if !value.is_blank() => self.push(column, Condition::Eq(value)),
            _ => self,
        }
    }

    /// Substring filter that is skipped when the needle is absent or blank.
    pub fn and_filter_like(self, column: &'static str, needle: Option<&str>) -> Self {
        match needle.map(str::trim) {
            Some(needle) if !needle.is_empty() => {
                self.push(column, Condition::Like(needle.to_string()))
            }
            _ => self,
        }
    }

    pub fn and_filter_gte<V: Into<Value>>(self, column: &'static str, value: Option<V>) -> Self {
        match value.map(Into::into) {
            Some(value) if !value.is_blank() => self.push(column, Condition::Gte(value)),
            _ => self,
        }
    }

    pub fn and_filter_lte<V: Into<Value>>(self, column: &'static str, value: Option<V>) -> Self {
        match value.map(Into::into) {
            Some(value) if !value.is_blank() => self.push(column, Condition::Lte(value)),
            _ => self,
        }
    }

    /// Membership filter. An empty list matches nothing.
    pub fn and_where_in<V: Into<Value>>(self, column: &'static str, values: Vec<V>) -> Self {
        let values = values.into_iter().map(Into::into).collect();
        self.push(column, Condition::In(values))
    }

    pub fn order_by(mut self, column: &'static str, direction: Direction) -> Self {
        self.order.push((column, direction));
        self
    }

    pub fn limit(mut self, limit: u32) -> Self {
        self.limit = Some(limit);
        self
    }

    pub fn offset(mut self, offset: u32) -> Self {
        self.offset = offset;
        self
    }

    pub fn filters(&self) -> &[Filter] {
        &self.filters
    }

    pub fn ordering(&self) -> &[(&'static str, Direction)] {
        &self.order
    }

    pub fn is_unfiltered(&self) -> bool {
        self.filters.is_empty()
    }

    fn push(mut self, column: &'static str, condition: Condition) -> Self {
        self.filters.push(Filter { column, condition });
        self
    }

    pub(crate) fn push_conditions(&self, builder: &mut QueryBuilder<'_, Sqlite>) {
        for (index, filter) in self.filters.iter().enumerate() {
            builder.push(if index == 0 { " WHERE " } else { " AND " });
            builder.push(filter.column);
            match &filter.condition {
                Condition::Eq(value) => {
                    builder.push(" = ");
                    push_value(builder, value);
                }
                Condition::Like(needle) => {
                    builder.push(" LIKE ");
                    builder.push_bind(format!("%{}%", escape_like(needle)));
                    builder.push(" ESCAPE '\\'");
                }
                Condition::Gte(value) => {
                    builder.push(" >= ");
                    push_value(builder, value);
                }
                Condition::Lte(value) => {
                    builder.push(" <= ");
                    push_value(builder, value);
                }
                Condition::In(values) if values.is_empty() => {
                    builder.push(" IN (NULL)");
                }
                Condition::In(values) => {
                    builder.push(" IN (");
                    for (i, value) in values.iter().enumerate() {
                        if i > 0 {
                            builder.push(", ");
                        }
                        push_value(builder, value);
                    }
                    builder.push(")");
                }
            }
        }
    }

    pub(crate) fn push_order_and_window(&self, builder: &mut QueryBuilder<'_, Sqlite>) {
        for (index, (column, direction)) in self.order.iter().enumerate() {
            builder.push(if index == 0 { " ORDER BY " } else { ", " });
            builder.push(*column);
            builder.push(match direction {
                Direction::Asc => " ASC",
                Direction::Desc => " DESC",
            });
        }
        if let Some(limit) = self.limit {
            builder.push(" LIMIT ");
            builder.push_bind(i64::from(limit));
            builder.push(" OFFSET ");
            builder.push_bind(i64::from(self.offset));
        }
    }
}

fn push_value(builder: &mut QueryBuilder<'_, Sqlite>, value: &Value) {
    match value {
        Value::Int(v) => builder.push_bind(*v),
        Value::Text(v) => builder.push_bind(v.clone()),
        Value::Bool(v) => builder.push_bind(*v),
        Value::Time(v) => builder.push_bind(*v),
    };
}

fn escape_like(needle: &str) -> String {
    let mut escaped = String::with_capacity(needle.len());
    for c in needle.chars() {
        if matches!(c, '%' | '_' | '\\') {
            escaped.push('\\');
        }
        escaped.push(c);
    }
    escaped
}

pub(crate) async fn fetch_rows<T>(
    pool: &Pool<Sqlite>,
    table: &str,
    columns: &str,
    query: &Query,
    map: fn(&SqliteRow) -> Result<T>,
) -> Result<Vec<T>> {
    let mut builder = QueryBuilder::<Sqlite>::new(format!("SELECT {columns} FROM {table}"));
    query.push_conditions(&mut builder);
    query.push_order_and_window(&mut builder);
    let rows = builder.build().fetch_all(pool).await?;
    rows.iter().map(map).collect()
}

pub(crate) async fn count_rows(pool: &Pool<Sqlite>, table: &str, query: &Query) -> Result<u64> {
    let mut builder = QueryBuilder::<Sqlite>::new(format!("SELECT COUNT(*) FROM {table}"));
    query.push_conditions(&mut builder);
    let count: i64 = builder.build_query_scalar().fetch_one(pool).await?;
    Ok(u64::try_from(count)?)
}
