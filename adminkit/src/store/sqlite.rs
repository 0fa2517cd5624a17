use crate::error::AdminError;
use crate::model::{ModelMeta, Relation, RelationKind};
use crate::query::{ListQuery, OrderBy};
use crate::sql::{self, Statement};
use crate::store::{ModelStore, Row};
use crate::value::{ColumnType, Value};
use async_trait::async_trait;
use rusqlite::types::{Value as SqlValue, ValueRef};
use rusqlite::{params_from_iter, Connection, ErrorCode};
use std::collections::{HashMap, HashSet};
use std::sync::{Arc, Mutex};

// below SQLite's default limit on bound parameters
const RELATED_BATCH_SIZE: usize = 500;

/// A table behind a shared SQLite connection. Several stores may share one connection;
/// every call runs on tokio's blocking pool.
///
/// Related rows are embedded under the relation name: to-one relations as an object (or null),
/// one-to-many as an array. Many-to-many relations have no link table here and are left out.
pub struct SqliteStore {
    meta: ModelMeta,
    conn: Arc<Mutex<Connection>>,
}

fn to_sql(value: &Value) -> SqlValue {
    match value {
        Value::Null => SqlValue::Null,
        Value::Bool(b) => SqlValue::Integer(*b as i64),
        Value::Int(i) => SqlValue::Integer(*i),
        Value::Float(f) => SqlValue::Real(*f),
        Value::Json(json) => SqlValue::Text(json.to_string()),
        other => SqlValue::Text(other.to_string()),
    }
}

fn raw_json(value: ValueRef<'_>) -> serde_json::Value {
    use serde_json::Value as J;
    match value {
        ValueRef::Null | ValueRef::Blob(_) => J::Null,
        ValueRef::Integer(i) => J::from(i),
        ValueRef::Real(f) => serde_json::Number::from_f64(f).map(J::Number).unwrap_or(J::Null),
        ValueRef::Text(bytes) => J::String(String::from_utf8_lossy(bytes).into_owned()),
    }
}

/// Stored representation back to the column's JSON form.
fn column_json(ty: ColumnType, raw: serde_json::Value) -> Result<serde_json::Value, AdminError> {
    match (ty, raw) {
        (ColumnType::Json, serde_json::Value::String(s)) => Ok(ty.parse(&s)?.to_json()),
        (ty, raw) => Ok(ty.from_json(&raw)?.to_json()),
    }
}

fn map_write_error(err: rusqlite::Error) -> AdminError {
    match err {
        rusqlite::Error::SqliteFailure(e, msg) if e.code == ErrorCode::ConstraintViolation => {
            AdminError::Conflict(msg.unwrap_or_else(|| e.to_string()))
        }
        other => other.into(),
    }
}

fn fetch(conn: &Connection, meta: &ModelMeta, statement: &Statement) -> Result<Vec<Row>, AdminError> {
    let mut stmt = conn.prepare(&statement.sql)?;
    let raw_rows = stmt
        .query_map(params_from_iter(statement.params.iter().map(to_sql)), |r| {
            (0..meta.columns.len()).map(|i| r.get_ref(i).map(raw_json)).collect::<rusqlite::Result<Vec<_>>>()
        })?
        .collect::<rusqlite::Result<Vec<_>>>()?;

    let mut rows = Vec::with_capacity(raw_rows.len());
    for raw in raw_rows {
        let mut row = Row::new();
        for (column, json) in meta.columns.iter().zip(raw) {
            row.insert(column.name.clone(), column_json(column.ty, json)?);
        }
        rows.push(row);
    }
    for relation in meta.relations.iter().filter(|r| r.kind != RelationKind::ManyToMany) {
        embed_related(conn, meta, relation, &mut rows)?;
    }
    Ok(rows)
}

/// Key of a related row, in the form of the local column.
fn relation_key(ty: ColumnType, json: Option<&serde_json::Value>) -> Option<String> {
    match json {
        None | Some(serde_json::Value::Null) => None,
        Some(json) => ty.from_json(json).ok().map(|value| value.to_string()),
    }
}

/// Embeds target rows joined on `relation` into every row, one `IN (..)` query per batch of keys.
/// Related rows are typed only as far as SQLite's storage classes go.
fn embed_related(conn: &Connection, meta: &ModelMeta, relation: &Relation, rows: &mut [Row]) -> Result<(), AdminError> {
    let key_type = meta.require_column(&relation.local_column)?.ty;
    let mut seen = HashSet::new();
    let mut keys = Vec::new();
    for row in rows.iter() {
        if let Some(json) = row.get(&relation.local_column).filter(|json| !json.is_null()) {
            let key = key_type.from_json(json)?;
            if seen.insert(key.to_string()) {
                keys.push(key);
            }
        }
    }

    let mut related: HashMap<String, Vec<serde_json::Value>> = HashMap::new();
    for batch in keys.chunks(RELATED_BATCH_SIZE) {
        let statement = sql::select_related(relation, batch);
        let mut stmt = conn.prepare(&statement.sql)?;
        let names: Vec<String> = stmt.column_names().into_iter().map(String::from).collect();
        let objects = stmt
            .query_map(params_from_iter(statement.params.iter().map(to_sql)), |r| {
                let mut object = serde_json::Map::new();
                for (i, name) in names.iter().enumerate() {
                    object.insert(name.clone(), raw_json(r.get_ref(i)?));
                }
                Ok(object)
            })?
            .collect::<rusqlite::Result<Vec<_>>>()?;
        for object in objects {
            if let Some(key) = relation_key(key_type, object.get(&relation.remote_column)) {
                related.entry(key).or_default().push(serde_json::Value::Object(object));
            }
        }
    }

    let many = relation.kind.is_to_many();
    for row in rows.iter_mut() {
        let matched = relation_key(key_type, row.get(&relation.local_column))
            .and_then(|key| related.get(&key).cloned())
            .unwrap_or_default();
        let value = if many {
            serde_json::Value::Array(matched)
        } else {
            matched.into_iter().next().unwrap_or(serde_json::Value::Null)
        };
        row.insert(relation.name.clone(), value);
    }
    Ok(())
}

fn execute(conn: &Connection, statement: &Statement) -> Result<usize, AdminError> {
    conn.execute(&statement.sql, params_from_iter(statement.params.iter().map(to_sql)))
        .map_err(map_write_error)
}

fn fetch_one(conn: &Connection, meta: &ModelMeta, pk: &[Value]) -> Result<Option<Row>, AdminError> {
    Ok(fetch(conn, meta, &sql::select_by_pk(meta, pk)?)?.into_iter().next())
}

impl SqliteStore {
    pub fn new(conn: Arc<Mutex<Connection>>, meta: ModelMeta) -> Self {
        SqliteStore { meta, conn }
    }

    /// Creates the model's table unless it exists.
    pub async fn create_table(&self) -> Result<(), AdminError> {
        self.run(|conn, meta| {
            conn.execute_batch(&sql::create_table(meta))?;
            Ok(())
        })
        .await
    }

    async fn run<T, F>(&self, f: F) -> Result<T, AdminError>
    where
        T: Send + 'static,
        F: FnOnce(&Connection, &ModelMeta) -> Result<T, AdminError> + Send + 'static,
    {
        let conn = Arc::clone(&self.conn);
        let meta = self.meta.clone();
        tokio::task::spawn_blocking(move || {
            let guard = conn.lock()?;
            f(&guard, &meta)
        })
        .await?
    }
}

#[async_trait]
impl ModelStore for SqliteStore {
    fn meta(&self) -> &ModelMeta {
        &self.meta
    }

    async fn count(&self, query: &ListQuery) -> Result<usize, AdminError> {
        let statement = sql::count(&self.meta, query)?;
        self.run(move |conn, _| {
            let count: i64 = conn.query_row(&statement.sql, params_from_iter(statement.params.iter().map(to_sql)), |r| r.get(0))?;
            Ok(count.max(0) as usize)
        })
        .await
    }

    async fn list(&self, query: &ListQuery) -> Result<Vec<Row>, AdminError> {
        let statement = sql::select_page(&self.meta, query)?;
        self.run(move |conn, meta| fetch(conn, meta, &statement)).await
    }

    async fn get(&self, pk: &[Value]) -> Result<Option<Row>, AdminError> {
        let pk = pk.to_vec();
        self.run(move |conn, meta| fetch_one(conn, meta, &pk)).await
    }

    async fn get_many(&self, pks: &[Vec<Value>]) -> Result<Vec<Row>, AdminError> {
        let statement = sql::select_by_pks(&self.meta, pks)?;
        self.run(move |conn, meta| fetch(conn, meta, &statement)).await
    }

    async fn insert(&self, row: Row) -> Result<Row, AdminError> {
        let statement = sql::insert(&self.meta, &row)?;
        self.run(move |conn, meta| {
            execute(conn, &statement)?;
            let pk_columns = meta.primary_keys();
            let pk = match pk_columns.as_slice() {
                [pk] if pk.autoincrement && row.get(&pk.name).map_or(true, |v| v.is_null()) => {
                    vec![Value::Int(conn.last_insert_rowid())]
                }
                columns => columns
                    .iter()
                    .map(|c| c.ty.from_json(row.get(&c.name).unwrap_or(&serde_json::Value::Null)))
                    .collect::<Result<Vec<_>, _>>()?,
            };
            fetch_one(conn, meta, &pk)?.ok_or_else(|| AdminError::Custom(format!("inserted {} could not be read back", meta.name)))
        })
        .await
    }

    async fn update(&self, pk: &[Value], row: Row) -> Result<Row, AdminError> {
        let statement = sql::update_by_pk(&self.meta, pk, &row)?;
        let mut new_pk = pk.to_vec();
        for (i, column) in self.meta.primary_keys().iter().enumerate() {
            if let Some(json) = row.get(&column.name) {
                new_pk[i] = column.ty.from_json(json)?;
            }
        }
        self.run(move |conn, meta| {
            if execute(conn, &statement)? == 0 {
                return Err(AdminError::not_found(format!("{} not found", meta.name)));
            }
            fetch_one(conn, meta, &new_pk)?.ok_or_else(|| AdminError::not_found(format!("{} not found", meta.name)))
        })
        .await
    }

    async fn delete(&self, pk: &[Value]) -> Result<bool, AdminError> {
        let statement = sql::delete_by_pk(&self.meta, pk)?;
        self.run(move |conn, _| Ok(execute(conn, &statement)? > 0)).await
    }

    async fn lookup(&self, fields: &[String], term: &str, order: &[OrderBy], limit: usize) -> Result<Vec<Row>, AdminError> {
        let statement = sql::lookup(&self.meta, fields, term, order, limit)?;
        self.run(move |conn, meta| fetch(conn, meta, &statement)).await
    }
}
