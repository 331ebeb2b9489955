//! Filtered, ordered and sliced queries over one collection.
//!
//! Conditions use the `field__lookup` form: `filter("date__year", 2024)`,
//! `filter("text__startswith", "Hello")`. A bare field name means `exact`.
//! Fields are looked up inside the JSON document; `pk` is the primary key.

use std::marker::PhantomData;
use std::sync::LazyLock;

use libsql::params_from_iter;
use regex::Regex;
use serde_json::Value;
use tool_shared::{DocumentId, Result, ToolError};
use tracing::debug;

use crate::document::{Document, Stored};
use crate::store::{DocumentStore, decode, parse_data};

static FIELD_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^[A-Za-z_][A-Za-z0-9_]*(\.[A-Za-z_][A-Za-z0-9_]*)*$").expect("valid field regex")
});

/// A comparison applied to one field.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Lookup {
    Exact,
    StartsWith,
    Contains,
    Gt,
    Gte,
    Lt,
    Lte,
    Year,
    Month,
    Day,
}

impl Lookup {
    fn parse(name: &str) -> Option<Self> {
        Some(match name {
            "exact" => Self::Exact,
            "startswith" => Self::StartsWith,
            "contains" => Self::Contains,
            "gt" => Self::Gt,
            "gte" => Self::Gte,
            "lt" => Self::Lt,
            "lte" => Self::Lte,
            "year" => Self::Year,
            "month" => Self::Month,
            "day" => Self::Day,
            _ => return None,
        })
    }

    fn sql(self, expr: &str) -> String {
        match self {
            Self::Exact => format!("{expr} = ?"),
            Self::StartsWith => format!("instr({expr}, ?) = 1"),
            Self::Contains => format!("instr({expr}, ?) > 0"),
            Self::Gt => format!("{expr} > ?"),
            Self::Gte => format!("{expr} >= ?"),
            Self::Lt => format!("{expr} < ?"),
            Self::Lte => format!("{expr} <= ?"),
            Self::Year => format!("CAST(strftime('%Y', {expr}) AS INTEGER) = ?"),
            Self::Month => format!("CAST(strftime('%m', {expr}) AS INTEGER) = ?"),
            Self::Day => format!("CAST(strftime('%d', {expr}) AS INTEGER) = ?"),
        }
    }
}

/// SQL expression selecting `field`.
fn field_expr(field: &str) -> std::result::Result<String, String> {
    if field == "pk" {
        return Ok("pk".to_string());
    }
    if !FIELD_RE.is_match(field) {
        return Err(format!("invalid field name {field:?}"));
    }
    Ok(format!("json_extract(data, '$.{field}')"))
}

fn to_sql_value(value: Value) -> libsql::Value {
    match value {
        Value::Null => libsql::Value::Null,
        Value::Bool(b) => libsql::Value::Integer(i64::from(b)),
        Value::Number(n) => match n.as_i64() {
            Some(i) => libsql::Value::Integer(i),
            None => libsql::Value::Real(n.as_f64().unwrap_or_default()),
        },
        Value::String(s) => libsql::Value::Text(s),
        other => libsql::Value::Text(other.to_string()),
    }
}

/// An untyped query: rows come back as `(pk, json)` pairs.
#[derive(Debug, Clone)]
pub struct RawQuery<'a> {
    store: &'a DocumentStore,
    collection: String,
    conditions: Vec<String>,
    params: Vec<libsql::Value>,
    ordering: Vec<String>,
    reverse: bool,
    offset: u64,
    limit: Option<u64>,
    error: Option<String>,
}

impl<'a> RawQuery<'a> {
    pub(crate) fn new(store: &'a DocumentStore, collection: &str) -> Self {
        Self {
            store,
            collection: collection.to_string(),
            conditions: Vec::new(),
            params: Vec::new(),
            ordering: Vec::new(),
            reverse: false,
            offset: 0,
            limit: None,
            error: None,
        }
    }

    pub fn collection(&self) -> &str {
        &self.collection
    }

    /// Add a `field__lookup` condition. Errors surface when the query runs.
    pub fn filter(mut self, condition: &str, value: impl Into<Value>) -> Self {
        if self.error.is_none() {
            if let Err(e) = self.push_condition(condition, value.into()) {
                self.error = Some(e);
            }
        }
        self
    }

    fn push_condition(&mut self, condition: &str, value: Value) -> std::result::Result<(), String> {
        let (field, lookup) = match condition.rsplit_once("__") {
            Some((field, name)) => match Lookup::parse(name) {
                Some(lookup) => (field, lookup),
                None => {
                    return Err(format!("unknown lookup {name:?} in {condition:?}"));
                }
            },
            None => (condition, Lookup::Exact),
        };
        let expr = field_expr(field)?;
        if lookup == Lookup::Exact && value.is_null() {
            self.conditions.push(format!("{expr} IS NULL"));
            return Ok(());
        }
        self.conditions.push(lookup.sql(&expr));
        self.params.push(to_sql_value(value));
        Ok(())
    }

    /// Sort by `fields` (ascending unless `reverse`). The primary key breaks
    /// ties, so the order is stable.
    pub fn order_by(mut self, fields: &[&str], reverse: bool) -> Self {
        self.ordering.clear();
        for field in fields {
            match field_expr(field) {
                Ok(expr) => self.ordering.push(expr),
                Err(e) => {
                    self.error.get_or_insert(e);
                }
            }
        }
        self.reverse = reverse;
        self
    }

    pub fn offset(mut self, offset: u64) -> Self {
        self.offset = offset;
        self
    }

    pub fn limit(mut self, limit: u64) -> Self {
        self.limit = Some(limit);
        self
    }

    fn check(&self) -> Result<()> {
        match &self.error {
            Some(message) => Err(ToolError::validation(message.clone())),
            None => Ok(()),
        }
    }

    fn where_clause(&self) -> String {
        let mut sql = String::from("WHERE collection = ?");
        for condition in &self.conditions {
            sql.push_str(" AND ");
            sql.push_str(condition);
        }
        sql
    }

    fn bound_params(&self) -> Vec<libsql::Value> {
        let mut params = Vec::with_capacity(self.params.len() + 1);
        params.push(libsql::Value::Text(self.collection.clone()));
        params.extend(self.params.iter().cloned());
        params
    }

    fn select_sql(&self) -> String {
        let direction = if self.reverse { "DESC" } else { "ASC" };
        let mut sql = format!("SELECT pk, data FROM documents {}", self.where_clause());
        let order = self
            .ordering
            .iter()
            .map(String::as_str)
            .chain(std::iter::once("pk"))
            .map(|expr| format!("{expr} {direction}"))
            .collect::<Vec<_>>()
            .join(", ");
        sql.push_str(&format!(" ORDER BY {order}"));
        // SQLite takes LIMIT and OFFSET as signed 64-bit integers
        let clamp = |n: u64| i64::try_from(n).unwrap_or(i64::MAX);
        match (self.limit.map(clamp), clamp(self.offset)) {
            (Some(limit), offset) => sql.push_str(&format!(" LIMIT {limit} OFFSET {offset}")),
            (None, 0) => {}
            (None, offset) => sql.push_str(&format!(" LIMIT -1 OFFSET {offset}")),
        }
        sql
    }

    /// Matching documents as `(pk, data)` pairs.
    pub async fn all(&self) -> Result<Vec<(DocumentId, Value)>> {
        self.check()?;
        let sql = self.select_sql();
        debug!(collection = %self.collection, %sql, "running query");
        let mut rows = self
            .store
            .conn()
            .query(&sql, params_from_iter(self.bound_params()))
            .await
            .map_err(|e| ToolError::Storage(e.to_string()))?;

        let mut results = Vec::new();
        while let Some(row) = rows
            .next()
            .await
            .map_err(|e| ToolError::Storage(e.to_string()))?
        {
            let pk = row
                .get::<String>(0)
                .map_err(|e| ToolError::Storage(e.to_string()))?;
            let pk = pk
                .parse::<DocumentId>()
                .map_err(|e| ToolError::Storage(format!("corrupt primary key {pk:?}: {e}")))?;
            let data = row
                .get::<String>(1)
                .map_err(|e| ToolError::Storage(e.to_string()))?;
            results.push((pk, parse_data(&data)?));
        }
        Ok(results)
    }

    pub async fn first(&self) -> Result<Option<(DocumentId, Value)>> {
        let mut query = self.clone();
        query.limit = Some(1);
        Ok(query.all().await?.into_iter().next())
    }

    /// Number of matching documents; ordering and slicing are ignored.
    pub async fn count(&self) -> Result<u64> {
        self.check()?;
        let sql = format!("SELECT COUNT(*) FROM documents {}", self.where_clause());
        let mut rows = self
            .store
            .conn()
            .query(&sql, params_from_iter(self.bound_params()))
            .await
            .map_err(|e| ToolError::Storage(e.to_string()))?;
        match rows.next().await {
            Ok(Some(row)) => row
                .get::<u64>(0)
                .map_err(|e| ToolError::Storage(e.to_string())),
            Ok(None) => Ok(0),
            Err(e) => Err(ToolError::Storage(e.to_string())),
        }
    }

    /// Delete every matching document; ordering and slicing are ignored.
    pub async fn delete(&self) -> Result<u64> {
        self.check()?;
        let sql = format!("DELETE FROM documents {}", self.where_clause());
        let deleted = self
            .store
            .conn()
            .execute(&sql, params_from_iter(self.bound_params()))
            .await
            .map_err(|e| ToolError::Storage(e.to_string()))?;
        debug!(collection = %self.collection, deleted, "documents deleted");
        Ok(deleted)
    }
}

/// A query returning typed documents.
#[derive(Debug)]
pub struct Query<'a, D> {
    raw: RawQuery<'a>,
    marker: PhantomData<fn() -> D>,
}

impl<'a, D: Document> Query<'a, D> {
    pub(crate) fn new(store: &'a DocumentStore) -> Self {
        Self {
            raw: RawQuery::new(store, D::COLLECTION),
            marker: PhantomData,
        }
    }

    pub fn filter(self, condition: &str, value: impl Into<Value>) -> Self {
        self.map(|raw| raw.filter(condition, value))
    }

    pub fn order_by(self, fields: &[&str], reverse: bool) -> Self {
        self.map(|raw| raw.order_by(fields, reverse))
    }

    pub fn offset(self, offset: u64) -> Self {
        self.map(|raw| raw.offset(offset))
    }

    pub fn limit(self, limit: u64) -> Self {
        self.map(|raw| raw.limit(limit))
    }

    fn map(self, f: impl FnOnce(RawQuery<'a>) -> RawQuery<'a>) -> Self {
        Self {
            raw: f(self.raw),
            marker: PhantomData,
        }
    }

    pub async fn all(&self) -> Result<Vec<Stored<D>>> {
        self.raw
            .all()
            .await?
            .into_iter()
            .map(|(pk, data)| Ok(Stored { pk, doc: decode(data)? }))
            .collect()
    }

    pub async fn first(&self) -> Result<Option<Stored<D>>> {
        match self.raw.first().await? {
            Some((pk, data)) => Ok(Some(Stored { pk, doc: decode(data)? })),
            None => Ok(None),
        }
    }

    pub async fn count(&self) -> Result<u64> {
        self.raw.count().await
    }

    pub async fn delete(&self) -> Result<u64> {
        self.raw.delete().await
    }

    pub fn raw(&self) -> &RawQuery<'a> {
        &self.raw
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde::{Deserialize, Serialize};

    #[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
    struct Entry {
        title: String,
        date: String,
        rank: i64,
    }

    impl Document for Entry {
        const COLLECTION: &'static str = "entries";
    }

    async fn seeded() -> DocumentStore {
        let store = DocumentStore::in_memory().await.expect("memory");
        for (title, date, rank) in [
            ("Hello world", "2024-01-15", 3),
            ("Hello again", "2024-02-01", 1),
            ("Goodbye", "2023-12-31", 2),
        ] {
            store
                .save(Entry {
                    title: title.into(),
                    date: date.into(),
                    rank,
                })
                .await
                .expect("seed");
        }
        store.insert_raw("other", &serde_json::json!({"title": "Hello"})).await.expect("seed");
        store
    }

    fn titles(entries: &[Stored<Entry>]) -> Vec<&str> {
        entries.iter().map(|e| e.title.as_str()).collect()
    }

    #[tokio::test]
    async fn lookups() {
        let store = seeded().await;
        let q = |cond: &str, value: Value| store.query::<Entry>().filter(cond, value);

        assert_eq!(q("title", "Goodbye".into()).count().await.expect("count"), 1);
        assert_eq!(q("title__startswith", "Hello".into()).count().await.expect("count"), 2);
        assert_eq!(q("title__contains", "again".into()).count().await.expect("count"), 1);
        assert_eq!(q("rank__gt", 1.into()).count().await.expect("count"), 2);
        assert_eq!(q("rank__gte", 1.into()).count().await.expect("count"), 3);
        assert_eq!(q("rank__lt", 2.into()).count().await.expect("count"), 1);
        assert_eq!(q("rank__lte", 2.into()).count().await.expect("count"), 2);
        assert_eq!(q("date__year", 2024.into()).count().await.expect("count"), 2);
        assert_eq!(q("date__month", 12.into()).count().await.expect("count"), 1);
        assert_eq!(q("date__day", 1.into()).count().await.expect("count"), 1);
    }

    #[tokio::test]
    async fn combined_filters_ordering_and_slicing() {
        let store = seeded().await;
        let ordered = store
            .query::<Entry>()
            .filter("date__year", 2024)
            .order_by(&["date"], true)
            .all()
            .await
            .expect("all");
        assert_eq!(titles(&ordered), ["Hello again", "Hello world"]);

        let page = store
            .query::<Entry>()
            .order_by(&["rank"], false)
            .offset(1)
            .limit(1)
            .all()
            .await
            .expect("page");
        assert_eq!(titles(&page), ["Goodbye"]);

        let tail = store
            .query::<Entry>()
            .order_by(&["rank"], false)
            .offset(2)
            .all()
            .await
            .expect("tail");
        assert_eq!(titles(&tail), ["Hello world"]);

        let beyond = store
            .query::<Entry>()
            .offset(u64::MAX)
            .limit(u64::MAX)
            .all()
            .await
            .expect("huge offset");
        assert!(beyond.is_empty());

        let first = store
            .query::<Entry>()
            .order_by(&["rank"], true)
            .first()
            .await
            .expect("first")
            .expect("present");
        assert_eq!(first.rank, 3);
    }

    #[tokio::test]
    async fn pk_lookup_and_delete() {
        let store = seeded().await;
        let all = store.query::<Entry>().all().await.expect("all");
        let pk = all[0].pk;
        let found = store
            .query::<Entry>()
            .filter("pk", pk.to_string())
            .all()
            .await
            .expect("by pk");
        assert_eq!(found.len(), 1);

        let deleted = store
            .query::<Entry>()
            .filter("title__startswith", "Hello")
            .delete()
            .await
            .expect("delete");
        assert_eq!(deleted, 2);
        assert_eq!(store.query::<Entry>().count().await.expect("count"), 1);
        // other collections are untouched
        assert_eq!(store.raw_query("other").count().await.expect("count"), 1);
    }

    #[tokio::test]
    async fn bad_conditions_fail_on_execution() {
        let store = seeded().await;
        let err = store
            .query::<Entry>()
            .filter("title__like", "x")
            .all()
            .await
            .expect_err("unknown lookup");
        assert!(err.to_string().contains("unknown lookup"));

        assert!(store.raw_query("entries").filter("x'); DROP", 1).count().await.is_err());
        assert!(store.raw_query("entries").order_by(&["a b"], false).all().await.is_err());
    }
}
