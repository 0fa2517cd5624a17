use crate::error::AdminError;
use crate::model::ModelMeta;
use crate::query::{ColumnRef, ListQuery, OrderBy, Search};
use crate::store::{pk_of, ModelStore, Row};
use crate::value::{ColumnType, Value};
use async_trait::async_trait;
use std::cmp::Ordering;
use std::sync::RwLock;

/// Rows kept in insertion order behind a lock. Dotted column paths read embedded objects,
/// so `team.name` is `row["team"]["name"]`.
pub struct MemoryStore {
    meta: ModelMeta,
    rows: RwLock<Vec<Row>>,
}

fn json_to_value(json: &serde_json::Value) -> Value {
    use serde_json::Value as J;
    match json {
        J::Null => Value::Null,
        J::Bool(b) => Value::Bool(*b),
        J::Number(n) => n.as_i64().map(Value::Int).unwrap_or_else(|| Value::Float(n.as_f64().unwrap_or(f64::NAN))),
        J::String(s) => Value::Text(s.clone()),
        other => Value::Json(other.clone()),
    }
}

fn path_json<'r>(row: &'r Row, column: &ColumnRef) -> Option<&'r serde_json::Value> {
    match &column.relation {
        Some(relation) => row.get(relation)?.get(&column.column),
        None => row.get(&column.column),
    }
}

fn compare_rows(a: &Row, b: &Row, order: &[OrderBy]) -> Ordering {
    for o in order {
        let va = path_json(a, &o.column).map(json_to_value).unwrap_or(Value::Null);
        let vb = path_json(b, &o.column).map(json_to_value).unwrap_or(Value::Null);
        let ord = match (va.is_null(), vb.is_null()) {
            (true, true) => Ordering::Equal,
            (true, false) => Ordering::Less,
            (false, true) => Ordering::Greater,
            (false, false) => va.partial_cmp(&vb).unwrap_or(Ordering::Equal),
        };
        let ord = if o.descending { ord.reverse() } else { ord };
        if ord != Ordering::Equal {
            return ord;
        }
    }
    Ordering::Equal
}

fn matches_search(row: &Row, search: &Search) -> bool {
    let term = search.term.to_lowercase();
    search.columns.iter().any(|c| {
        path_json(row, c)
            .map(|json| json_to_value(json).to_string().to_lowercase().contains(&term))
            .unwrap_or(false)
    })
}

impl MemoryStore {
    pub fn new(meta: ModelMeta) -> Self {
        MemoryStore { meta, rows: RwLock::new(Vec::new()) }
    }

    pub fn with_rows(meta: ModelMeta, rows: Vec<Row>) -> Result<Self, AdminError> {
        let store = Self::new(meta);
        {
            let mut guard = store.rows.write()?;
            for row in rows {
                let row = store.normalize(row)?;
                guard.push(row);
            }
        }
        Ok(store)
    }

    /// Column values coerced to their declared types; other keys (relations) kept verbatim.
    fn normalize(&self, mut row: Row) -> Result<Row, AdminError> {
        for column in &self.meta.columns {
            if let Some(json) = row.get_mut(&column.name) {
                *json = column.ty.from_json(json)?.to_json();
            }
        }
        Ok(row)
    }

    fn matches(&self, row: &Row, query: &ListQuery) -> Result<bool, AdminError> {
        if let Some(search) = &query.search {
            if !search.columns.is_empty() && !matches_search(row, search) {
                return Ok(false);
            }
        }
        for filter in &query.filters {
            let column = self.meta.require_column(&filter.column)?;
            let value = column.ty.from_json(row.get(&column.name).unwrap_or(&serde_json::Value::Null))?;
            if !filter.matches(&value) {
                return Ok(false);
            }
        }
        Ok(true)
    }

    fn select(&self, query: &ListQuery) -> Result<Vec<Row>, AdminError> {
        let rows = self.rows.read()?;
        let mut selected = Vec::new();
        for row in rows.iter() {
            if self.matches(row, query)? {
                selected.push(row.clone());
            }
        }
        selected.sort_by(|a, b| compare_rows(a, b, &query.order));
        let page = selected.into_iter().skip(query.offset);
        Ok(match query.limit {
            Some(limit) => page.take(limit).collect(),
            None => page.collect(),
        })
    }

    fn position(rows: &[Row], meta: &ModelMeta, pk: &[Value]) -> Result<Option<usize>, AdminError> {
        for (i, row) in rows.iter().enumerate() {
            if pk_of(meta, row)? == pk {
                return Ok(Some(i));
            }
        }
        Ok(None)
    }

    /// The single autoincrement integer key, if the model has one.
    fn autoincrement_key(&self) -> Option<String> {
        match self.meta.primary_keys().as_slice() {
            [pk] if pk.autoincrement && pk.ty == ColumnType::Integer => Some(pk.name.clone()),
            _ => None,
        }
    }

    fn next_id(&self, rows: &[Row], key: &str) -> Result<i64, AdminError> {
        let max = rows.iter().filter_map(|r| r.get(key).and_then(|v| v.as_i64())).max().unwrap_or(0);
        max.checked_add(1)
            .ok_or_else(|| AdminError::Conflict(format!("{} has exhausted its '{}' sequence", self.meta.name, key)))
    }
}

#[async_trait]
impl ModelStore for MemoryStore {
    fn meta(&self) -> &ModelMeta {
        &self.meta
    }

    async fn count(&self, query: &ListQuery) -> Result<usize, AdminError> {
        let rows = self.rows.read()?;
        let mut count = 0;
        for row in rows.iter() {
            if self.matches(row, query)? {
                count += 1;
            }
        }
        Ok(count)
    }

    async fn list(&self, query: &ListQuery) -> Result<Vec<Row>, AdminError> {
        self.select(query)
    }

    async fn get(&self, pk: &[Value]) -> Result<Option<Row>, AdminError> {
        let rows = self.rows.read()?;
        Ok(Self::position(&rows, &self.meta, pk)?.map(|i| rows[i].clone()))
    }

    async fn get_many(&self, pks: &[Vec<Value>]) -> Result<Vec<Row>, AdminError> {
        let rows = self.rows.read()?;
        let mut found = Vec::new();
        for pk in pks {
            if let Some(i) = Self::position(&rows, &self.meta, pk)? {
                found.push(rows[i].clone());
            }
        }
        Ok(found)
    }

    async fn insert(&self, row: Row) -> Result<Row, AdminError> {
        let mut row = self.normalize(row)?;
        let mut rows = self.rows.write()?;
        if let Some(key) = self.autoincrement_key() {
            if row.get(&key).map_or(true, |v| v.is_null()) {
                let next = self.next_id(&rows, &key)?;
                row.insert(key, serde_json::Value::from(next));
            }
        }
        let pk = pk_of(&self.meta, &row)?;
        if pk.iter().any(Value::is_null) {
            return Err(AdminError::bad_request(format!("{} requires a primary key", self.meta.name)));
        }
        if Self::position(&rows, &self.meta, &pk)?.is_some() {
            return Err(AdminError::Conflict(format!("{} with this primary key already exists", self.meta.name)));
        }
        rows.push(row.clone());
        Ok(row)
    }

    async fn update(&self, pk: &[Value], changes: Row) -> Result<Row, AdminError> {
        let changes = self.normalize(changes)?;
        let mut rows = self.rows.write()?;
        let index = Self::position(&rows, &self.meta, pk)?
            .ok_or_else(|| AdminError::not_found(format!("{} not found", self.meta.name)))?;
        let mut updated = rows[index].clone();
        updated.extend(changes);
        let new_pk = pk_of(&self.meta, &updated)?;
        if new_pk != pk {
            if let Some(other) = Self::position(&rows, &self.meta, &new_pk)? {
                if other != index {
                    return Err(AdminError::Conflict(format!("{} with this primary key already exists", self.meta.name)));
                }
            }
        }
        rows[index] = updated.clone();
        Ok(updated)
    }

    async fn delete(&self, pk: &[Value]) -> Result<bool, AdminError> {
        let mut rows = self.rows.write()?;
        match Self::position(&rows, &self.meta, pk)? {
            Some(i) => {
                rows.remove(i);
                Ok(true)
            }
            None => Ok(false),
        }
    }

    async fn lookup(&self, fields: &[String], term: &str, order: &[OrderBy], limit: usize) -> Result<Vec<Row>, AdminError> {
        let columns = fields.iter().map(|f| ColumnRef::resolve(&self.meta, f)).collect::<Result<Vec<_>, _>>()?;
        let query = ListQuery {
            offset: 0,
            limit: Some(limit),
            search: Some(Search { columns, term: term.to_string() }),
            order: order.to_vec(),
            filters: Vec::new(),
        };
        self.select(&query)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{Column, Relation};
    use crate::query::{Filter, FilterOp};
    use serde_json::json;

    fn meta() -> ModelMeta {
        ModelMeta::new("User", "users")
            .column(Column::integer("id").primary_key().autoincrement())
            .column(Column::text("name"))
            .column(Column::integer("age"))
            .relation(Relation::many_to_one("team", "teams", "id", "id"))
    }

    fn row(value: serde_json::Value) -> Row {
        value.as_object().cloned().unwrap()
    }

    fn store() -> MemoryStore {
        MemoryStore::with_rows(meta(), vec![
            row(json!({"id": 1, "name": "Ann", "age": 31, "team": {"name": "Red"}})),
            row(json!({"id": 2, "name": "bob", "age": "17", "team": {"name": "Blue"}})),
            row(json!({"id": 3, "name": "Joanna", "age": null})),
        ]).unwrap()
    }

    fn ids(rows: &[Row]) -> Vec<i64> {
        rows.iter().map(|r| r["id"].as_i64().unwrap()).collect()
    }

    fn order(path: &str, descending: bool) -> OrderBy {
        OrderBy { column: ColumnRef::resolve(&meta(), path).unwrap(), descending }
    }

    #[tokio::test]
    async fn pages_sorted_rows() {
        let store = store();
        let query = ListQuery { offset: 1, limit: Some(1), search: None, order: vec![order("name", true)], filters: vec![] };
        assert_eq!(ids(&store.list(&query).await.unwrap()), vec![3]);
        assert_eq!(store.count(&query).await.unwrap(), 3);

        let query = ListQuery { order: vec![order("age", false)], ..ListQuery::all() };
        assert_eq!(ids(&store.list(&query).await.unwrap()), vec![3, 2, 1]);
    }

    #[tokio::test]
    async fn searches_and_filters() {
        let store = store();
        let search = Search { columns: vec![ColumnRef::local("name"), ColumnRef::resolve(&meta(), "team.name").unwrap()], term: "AN".into() };
        let query = ListQuery { search: Some(search), ..ListQuery::all() };
        assert_eq!(ids(&store.list(&query).await.unwrap()), vec![1, 3]);

        let query = ListQuery { filters: vec![Filter { column: "age".into(), op: FilterOp::Lt(Value::Int(30)) }], ..ListQuery::all() };
        assert_eq!(ids(&store.list(&query).await.unwrap()), vec![2]);
        assert_eq!(store.count(&query).await.unwrap(), 1);

        let found = store.lookup(&["team.name".to_string()], "blu", &[], 10).await.unwrap();
        assert_eq!(ids(&found), vec![2]);
    }

    #[tokio::test]
    async fn insert_assigns_next_id_and_rejects_duplicates() {
        let store = store();
        let inserted = store.insert(row(json!({"name": "Cid", "age": "40"}))).await.unwrap();
        assert_eq!(inserted["id"], json!(4));
        assert_eq!(inserted["age"], json!(40));
        let err = store.insert(row(json!({"id": 1, "name": "dup"}))).await.unwrap_err();
        assert!(matches!(err, AdminError::Conflict(_)));
    }

    #[tokio::test]
    async fn insert_fails_when_ids_run_out() {
        let store = store();
        store.insert(row(json!({"id": i64::MAX, "name": "Max"}))).await.unwrap();
        let err = store.insert(row(json!({"name": "Next"}))).await.unwrap_err();
        assert!(matches!(err, AdminError::Conflict(_)));
        assert_eq!(store.count(&ListQuery::all()).await.unwrap(), 4);
    }

    #[tokio::test]
    async fn update_get_and_delete() {
        let store = store();
        let updated = store.update(&[Value::Int(2)], row(json!({"age": 18}))).await.unwrap();
        assert_eq!(updated["name"], json!("bob"));
        assert_eq!(store.get(&[Value::Int(2)]).await.unwrap().unwrap()["age"], json!(18));

        assert!(matches!(store.update(&[Value::Int(2)], row(json!({"id": 1}))).await, Err(AdminError::Conflict(_))));
        assert!(matches!(store.update(&[Value::Int(9)], Row::new()).await, Err(AdminError::NotFound(_))));

        assert!(store.delete(&[Value::Int(2)]).await.unwrap());
        assert!(!store.delete(&[Value::Int(2)]).await.unwrap());
        let rows = store.get_many(&[vec![Value::Int(1)], vec![Value::Int(2)], vec![Value::Int(3)]]).await.unwrap();
        assert_eq!(ids(&rows), vec![1, 3]);
    }
}
