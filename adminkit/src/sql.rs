//! SQL synthesis for list, detail and write operations.
//!
//! Statements use `?` placeholders and double-quoted identifiers. Values never appear in the
//! SQL text, only in [`Statement::params`].

use crate::error::AdminError;
use crate::model::{Column, ModelMeta, Relation};
use crate::query::{ColumnRef, Filter, FilterOp, ListQuery, OrderBy, Search};
use crate::store::Row;
use crate::value::{ColumnType, Value};

#[derive(Debug, Clone, PartialEq)]
pub struct Statement {
    pub sql: String,
    pub params: Vec<Value>,
}

pub fn quote_ident(name: &str) -> String {
    format!("\"{}\"", name.replace('"', "\"\""))
}

/// `%term%` for a case-insensitive LIKE, with `\`, `%` and `_` escaped.
pub fn like_pattern(term: &str) -> String {
    let mut pattern = String::with_capacity(term.len() + 2);
    pattern.push('%');
    for c in term.to_lowercase().chars() {
        if matches!(c, '\\' | '%' | '_') {
            pattern.push('\\');
        }
        pattern.push(c);
    }
    pattern.push('%');
    pattern
}

struct Builder<'a> {
    meta: &'a ModelMeta,
    sql: String,
    params: Vec<Value>,
}

impl<'a> Builder<'a> {
    fn new(meta: &'a ModelMeta) -> Self {
        Builder { meta, sql: String::new(), params: Vec::new() }
    }

    fn push(&mut self, sql: &str) -> &mut Self {
        self.sql.push_str(sql);
        self
    }

    fn bind(&mut self, value: Value) -> &mut Self {
        self.sql.push('?');
        self.params.push(value);
        self
    }

    fn table(&self) -> String {
        quote_ident(&self.meta.table)
    }

    fn column_sql(&self, column: &ColumnRef) -> String {
        match &column.relation {
            Some(relation) => format!("{}.{}", quote_ident(relation), quote_ident(&column.column)),
            None => format!("{}.{}", self.table(), quote_ident(&column.column)),
        }
    }

    fn select_columns(&mut self) -> &mut Self {
        let columns = self.meta.columns
            .iter()
            .map(|c| self.column_sql(&ColumnRef::local(c.name.clone())))
            .collect::<Vec<_>>()
            .join(", ");
        let from = format!("SELECT {} FROM {}", columns, self.table());
        self.push(&from)
    }

    /// One LEFT OUTER JOIN per to-one relation referenced by `columns`, aliased by relation name.
    fn joins<'c>(&mut self, columns: impl IntoIterator<Item = &'c ColumnRef>) -> Result<&mut Self, AdminError> {
        let meta = self.meta;
        let mut joined: Vec<&str> = Vec::new();
        for column in columns {
            let Some(name) = column.relation.as_deref() else { continue };
            if joined.contains(&name) {
                continue;
            }
            let relation = meta.require_relation(name)?;
            let join = format!(
                " LEFT OUTER JOIN {} AS {} ON {}.{} = {}.{}",
                quote_ident(&relation.target),
                quote_ident(&relation.name),
                quote_ident(&relation.name),
                quote_ident(&relation.remote_column),
                self.table(),
                quote_ident(&relation.local_column),
            );
            self.push(&join);
            joined.push(name);
        }
        Ok(self)
    }

    fn like(&mut self, column: &ColumnRef, term: &str) {
        let expr = format!("LOWER(CAST({} AS TEXT)) LIKE ", self.column_sql(column));
        self.push(&expr).bind(Value::Text(like_pattern(term))).push(" ESCAPE '\\'");
    }

    fn search(&mut self, search: &Search) {
        self.push("(");
        for (i, column) in search.columns.iter().enumerate() {
            if i > 0 {
                self.push(" OR ");
            }
            self.like(column, &search.term);
        }
        self.push(")");
    }

    fn filter(&mut self, filter: &Filter) {
        let column = ColumnRef::local(filter.column.clone());
        let lhs = self.column_sql(&column);
        let binary = |b: &mut Self, op: &str, value: &Value| {
            b.push(&format!("{} {} ", lhs, op)).bind(value.clone());
        };
        match &filter.op {
            FilterOp::Eq(v) => binary(self, "=", v),
            FilterOp::Ne(v) => binary(self, "<>", v),
            FilterOp::Lt(v) => binary(self, "<", v),
            FilterOp::Le(v) => binary(self, "<=", v),
            FilterOp::Gt(v) => binary(self, ">", v),
            FilterOp::Ge(v) => binary(self, ">=", v),
            FilterOp::In(values) if values.is_empty() => {
                self.push("1 = 0");
            }
            FilterOp::In(values) => {
                self.push(&format!("{} IN (", lhs));
                for (i, v) in values.iter().enumerate() {
                    if i > 0 {
                        self.push(", ");
                    }
                    self.bind(v.clone());
                }
                self.push(")");
            }
            FilterOp::Contains(v) => self.like(&column, &v.to_string()),
        }
    }

    fn where_clause(&mut self, query: &ListQuery) {
        let mut first = true;
        let mut and = |b: &mut Self| {
            b.push(if first { " WHERE " } else { " AND " });
            first = false;
        };
        if let Some(search) = query.search.as_ref().filter(|s| !s.columns.is_empty()) {
            and(self);
            self.search(search);
        }
        for filter in &query.filters {
            and(self);
            self.filter(filter);
        }
    }

    fn pk_predicate(&mut self, pk_columns: &[&Column], values: &[Value]) -> Result<(), AdminError> {
        if pk_columns.len() != values.len() {
            return Err(AdminError::bad_request(format!("expected {} primary key values, got {}", pk_columns.len(), values.len())));
        }
        for (i, (column, value)) in pk_columns.iter().zip(values).enumerate() {
            if i > 0 {
                self.push(" AND ");
            }
            let lhs = self.column_sql(&ColumnRef::local(column.name.clone()));
            self.push(&format!("{} = ", lhs)).bind(value.clone());
        }
        Ok(())
    }

    fn order_by(&mut self, order: &[OrderBy]) {
        for (i, o) in order.iter().enumerate() {
            self.push(if i == 0 { " ORDER BY " } else { ", " });
            let column = self.column_sql(&o.column);
            self.push(&column).push(if o.descending { " DESC" } else { " ASC" });
        }
    }

    fn limit(&mut self, limit: Option<usize>, offset: usize) {
        if let Some(limit) = limit {
            self.push(" LIMIT ").bind(Value::Int(limit as i64)).push(" OFFSET ").bind(Value::Int(offset as i64));
        }
    }

    fn build(self) -> Statement {
        Statement { sql: self.sql, params: self.params }
    }
}

fn search_columns(query: &ListQuery) -> impl Iterator<Item = &ColumnRef> {
    query.search.iter().flat_map(|s| s.columns.iter())
}

pub fn select_page(meta: &ModelMeta, query: &ListQuery) -> Result<Statement, AdminError> {
    let mut b = Builder::new(meta);
    b.select_columns();
    b.joins(search_columns(query).chain(query.order.iter().map(|o| &o.column)))?;
    b.where_clause(query);
    b.order_by(&query.order);
    b.limit(query.limit, query.offset);
    Ok(b.build())
}

pub fn count(meta: &ModelMeta, query: &ListQuery) -> Result<Statement, AdminError> {
    let mut b = Builder::new(meta);
    let from = format!("SELECT COUNT(*) FROM {}", b.table());
    b.push(&from);
    b.joins(search_columns(query))?;
    b.where_clause(query);
    Ok(b.build())
}

pub fn select_by_pk(meta: &ModelMeta, pk: &[Value]) -> Result<Statement, AdminError> {
    let mut b = Builder::new(meta);
    b.select_columns().push(" WHERE ");
    b.pk_predicate(&meta.primary_keys(), pk)?;
    Ok(b.build())
}

pub fn select_by_pks(meta: &ModelMeta, pks: &[Vec<Value>]) -> Result<Statement, AdminError> {
    let mut b = Builder::new(meta);
    b.select_columns();
    if pks.is_empty() {
        b.push(" WHERE 1 = 0");
        return Ok(b.build());
    }
    b.push(" WHERE ");
    let pk_columns = meta.primary_keys();
    for (i, pk) in pks.iter().enumerate() {
        b.push(if i == 0 { "(" } else { " OR (" });
        b.pk_predicate(&pk_columns, pk)?;
        b.push(")");
    }
    Ok(b.build())
}

pub fn delete_by_pk(meta: &ModelMeta, pk: &[Value]) -> Result<Statement, AdminError> {
    let mut b = Builder::new(meta);
    let delete = format!("DELETE FROM {} WHERE ", b.table());
    b.push(&delete);
    b.pk_predicate(&meta.primary_keys(), pk)?;
    Ok(b.build())
}

/// Typed values for the row's entries that are columns of `meta`; relation keys are skipped.
pub fn column_values(meta: &ModelMeta, row: &Row) -> Result<Vec<(String, Value)>, AdminError> {
    meta.columns
        .iter()
        .filter_map(|c| row.get(&c.name).map(|json| (c, json)))
        .map(|(c, json)| Ok((c.name.clone(), c.ty.from_json(json)?)))
        .collect()
}

pub fn insert(meta: &ModelMeta, row: &Row) -> Result<Statement, AdminError> {
    let values = column_values(meta, row)?;
    let mut b = Builder::new(meta);
    if values.is_empty() {
        let sql = format!("INSERT INTO {} DEFAULT VALUES", b.table());
        b.push(&sql);
        return Ok(b.build());
    }
    let names = values.iter().map(|(n, _)| quote_ident(n)).collect::<Vec<_>>().join(", ");
    let head = format!("INSERT INTO {} ({}) VALUES (", b.table(), names);
    b.push(&head);
    for (i, (_, value)) in values.into_iter().enumerate() {
        if i > 0 {
            b.push(", ");
        }
        b.bind(value);
    }
    b.push(")");
    Ok(b.build())
}

pub fn update_by_pk(meta: &ModelMeta, pk: &[Value], row: &Row) -> Result<Statement, AdminError> {
    let values = column_values(meta, row)?;
    if values.is_empty() {
        return Err(AdminError::bad_request(format!("nothing to update on {}", meta.name)));
    }
    let mut b = Builder::new(meta);
    let head = format!("UPDATE {} SET ", b.table());
    b.push(&head);
    for (i, (name, value)) in values.into_iter().enumerate() {
        if i > 0 {
            b.push(", ");
        }
        b.push(&format!("{} = ", quote_ident(&name))).bind(value);
    }
    b.push(" WHERE ");
    b.pk_predicate(&meta.primary_keys(), pk)?;
    Ok(b.build())
}

fn sqlite_type(ty: ColumnType) -> &'static str {
    match ty {
        ColumnType::Integer | ColumnType::Boolean => "INTEGER",
        ColumnType::Float => "REAL",
        ColumnType::Text | ColumnType::Date | ColumnType::DateTime | ColumnType::Json => "TEXT",
    }
}

/// SQLite DDL for `meta`. A single autoincrement integer key becomes the rowid alias.
pub fn create_table(meta: &ModelMeta) -> String {
    let pks = meta.primary_keys();
    let rowid_alias = matches!(pks.as_slice(), [pk] if pk.autoincrement && pk.ty == ColumnType::Integer);
    let mut defs: Vec<String> = meta.columns
        .iter()
        .map(|c| {
            let mut def = format!("{} {}", quote_ident(&c.name), sqlite_type(c.ty));
            if rowid_alias && c.primary_key {
                def.push_str(" PRIMARY KEY AUTOINCREMENT");
            } else if !c.nullable {
                def.push_str(" NOT NULL");
            }
            def
        })
        .collect();
    if !rowid_alias && !pks.is_empty() {
        let names = pks.iter().map(|c| quote_ident(&c.name)).collect::<Vec<_>>().join(", ");
        defs.push(format!("PRIMARY KEY ({})", names));
    }
    format!("CREATE TABLE IF NOT EXISTS {} ({})", quote_ident(&meta.table), defs.join(", "))
}

/// Case-insensitive substring search over `fields` for relation pickers.
pub fn lookup(meta: &ModelMeta, fields: &[String], term: &str, order: &[OrderBy], limit: usize) -> Result<Statement, AdminError> {
    let columns = fields.iter().map(|f| ColumnRef::resolve(meta, f)).collect::<Result<Vec<_>, _>>()?;
    let query = ListQuery {
        offset: 0,
        limit: Some(limit),
        search: Some(Search { columns, term: term.to_string() }),
        order: order.to_vec(),
        filters: Vec::new(),
    };
    select_page(meta, &query)
}

/// Every row of `relation.target` whose remote column is one of `keys`.
pub fn select_related(relation: &Relation, keys: &[Value]) -> Statement {
    let placeholders = vec!["?"; keys.len()].join(", ");
    let sql = format!(
        "SELECT * FROM {} WHERE {} IN ({})",
        quote_ident(&relation.target),
        quote_ident(&relation.remote_column),
        placeholders
    );
    Statement { sql, params: keys.to_vec() }
}
