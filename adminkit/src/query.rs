use crate::error::AdminError;
use crate::model::ModelMeta;
use crate::value::Value;
use crate::view::ModelView;
use serde::{Deserialize, Serialize};
use utoipa::IntoParams;

/// A column of the model itself, or `relation.column` on a to-one relation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ColumnRef {
    pub relation: Option<String>,
    pub column: String,
}

impl ColumnRef {
    pub fn local(column: impl Into<String>) -> Self {
        ColumnRef { relation: None, column: column.into() }
    }

    pub fn resolve(meta: &ModelMeta, path: &str) -> Result<ColumnRef, AdminError> {
        match path.split_once('.') {
            None => meta.require_column(path).map(|_| ColumnRef::local(path)),
            Some((relation, column)) => {
                let rel = meta.require_relation(relation)?;
                if rel.kind.is_to_many() || column.is_empty() || column.contains('.') {
                    return Err(AdminError::InvalidColumn(format!("{}.{} cannot be used as a list column path.", meta.name, path)));
                }
                Ok(ColumnRef { relation: Some(relation.to_string()), column: column.to_string() })
            }
        }
    }

    pub fn path(&self) -> String {
        match &self.relation {
            Some(relation) => format!("{}.{}", relation, self.column),
            None => self.column.clone(),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum FilterOp<T> {
    Eq(T),
    Ne(T),
    Lt(T),
    Le(T),
    Gt(T),
    Ge(T),
    In(Vec<T>),
    Contains(T),
}

impl<T: PartialOrd + PartialEq> FilterOp<T> {
    pub fn matches(&self, value: &T) -> bool {
        match self {
            FilterOp::Eq(expected) => value == expected,
            FilterOp::Ne(expected) => value != expected,
            FilterOp::Lt(expected) => value < expected,
            FilterOp::Le(expected) => value <= expected,
            FilterOp::Gt(expected) => value > expected,
            FilterOp::Ge(expected) => value >= expected,
            FilterOp::In(options) => options.contains(value),
            // substring matching needs text; see `Filter::matches`
            FilterOp::Contains(expected) => value == expected,
        }
    }

    pub fn operation(&self) -> &'static str {
        match self {
            FilterOp::Eq(_) => "equals",
            FilterOp::Ne(_) => "not equal",
            FilterOp::Lt(_) => "less than",
            FilterOp::Le(_) => "less or equal",
            FilterOp::Gt(_) => "greater than",
            FilterOp::Ge(_) => "greater or equal",
            FilterOp::In(_) => "in",
            FilterOp::Contains(_) => "contains",
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Filter {
    pub column: String,
    pub op: FilterOp<Value>,
}

impl Filter {
    /// Parses `<op>:<value>` for `column`; `in` takes a comma separated list.
    pub fn parse(meta: &ModelMeta, column: &str, expr: &str) -> Result<Filter, AdminError> {
        let ty = meta.require_column(column)?.ty;
        let (op, raw) = expr
            .split_once(':')
            .ok_or_else(|| AdminError::bad_request(format!("filter '{}' must look like <column>:<op>:<value>", expr)))?;
        let op = match op {
            "eq" => FilterOp::Eq(ty.parse(raw)?),
            "ne" => FilterOp::Ne(ty.parse(raw)?),
            "lt" => FilterOp::Lt(ty.parse(raw)?),
            "le" => FilterOp::Le(ty.parse(raw)?),
            "gt" => FilterOp::Gt(ty.parse(raw)?),
            "ge" => FilterOp::Ge(ty.parse(raw)?),
            "in" => FilterOp::In(raw.split(',').map(|v| ty.parse(v)).collect::<Result<Vec<_>, _>>()?),
            "contains" => FilterOp::Contains(Value::Text(raw.to_string())),
            other => return Err(AdminError::bad_request(format!("unknown filter operation '{}'", other))),
        };
        Ok(Filter { column: column.to_string(), op })
    }

    pub fn matches(&self, value: &Value) -> bool {
        match &self.op {
            FilterOp::Contains(needle) => value.to_string().to_lowercase().contains(&needle.to_string().to_lowercase()),
            op => op.matches(value),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OrderBy {
    pub column: ColumnRef,
    pub descending: bool,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Search {
    pub columns: Vec<ColumnRef>,
    pub term: String,
}

/// What a store needs to produce one page (or all) of a list.
#[derive(Debug, Clone, PartialEq)]
pub struct ListQuery {
    pub offset: usize,
    pub limit: Option<usize>,
    pub search: Option<Search>,
    pub order: Vec<OrderBy>,
    pub filters: Vec<Filter>,
}

impl ListQuery {
    pub fn all() -> Self {
        ListQuery { offset: 0, limit: None, search: None, order: Vec::new(), filters: Vec::new() }
    }

    /// Paging removed, the row cap applied if positive.
    pub fn unpaged(&self, max_rows: usize) -> Self {
        ListQuery { offset: 0, limit: (max_rows > 0).then_some(max_rows), ..self.clone() }
    }
}

#[derive(Debug, Clone, Default, IntoParams, Serialize, Deserialize)]
#[into_params(parameter_in = Query)]
pub struct ListParams {
    /// 1-based page number
    #[param(example = 1)]
    pub page: Option<usize>,
    #[param(example = 10)]
    pub page_size: Option<usize>,
    pub search: Option<String>,
    #[serde(rename = "sortBy")]
    pub sort_by: Option<String>,
    /// `asc` or `desc`
    pub sort: Option<String>,
    /// repeated `<column>:<op>:<value>`
    pub filter: Option<String>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct ListRequest {
    pub page: usize,
    pub page_size: usize,
    pub query: ListQuery,
}

fn parse_number(name: &str, raw: &str) -> Result<usize, AdminError> {
    raw.trim().parse::<usize>().map_err(|_| AdminError::bad_request(format!("'{}' is not a valid {}", raw, name)))
}

impl ListRequest {
    pub fn from_pairs(pairs: &[(String, String)], view: &ModelView) -> Result<ListRequest, AdminError> {
        let mut page = 1;
        let mut page_size = view.page_size;
        let mut search = None;
        let mut sort_by = None;
        let mut descending = false;
        let mut filters = Vec::new();

        for (key, raw) in pairs {
            match key.as_str() {
                "page" => page = parse_number("page", raw)?.max(1),
                "page_size" => {
                    let requested = parse_number("page_size", raw)?;
                    page_size = if requested == 0 { view.page_size } else { requested.min(view.max_page_size()) };
                }
                "search" => {
                    let term = raw.trim();
                    if !term.is_empty() && !view.column_searchable_list.is_empty() {
                        search = Some(term.to_string());
                    }
                }
                "sortBy" => sort_by = Some(raw.clone()),
                "sort" => {
                    descending = match raw.as_str() {
                        "asc" => false,
                        "desc" => true,
                        other => return Err(AdminError::bad_request(format!("sort must be 'asc' or 'desc', got '{}'", other))),
                    }
                }
                "filter" => {
                    let (column, expr) = raw
                        .split_once(':')
                        .ok_or_else(|| AdminError::bad_request(format!("filter '{}' must look like <column>:<op>:<value>", raw)))?;
                    if !view.is_filterable(column) {
                        return Err(AdminError::bad_request(format!("column '{}' is not filterable", column)));
                    }
                    filters.push(Filter::parse(&view.meta, column, expr)?);
                }
                _ => {}
            }
        }

        let order = match sort_by {
            Some(path) => {
                if !view.is_sortable(&path) {
                    return Err(AdminError::bad_request(format!("column '{}' is not sortable", path)));
                }
                vec![OrderBy { column: ColumnRef::resolve(&view.meta, &path)?, descending }]
            }
            None => default_order(view)?,
        };

        let search = match search {
            Some(term) => Some(Search {
                columns: view.column_searchable_list
                    .iter()
                    .map(|path| ColumnRef::resolve(&view.meta, path))
                    .collect::<Result<Vec<_>, _>>()?,
                term,
            }),
            None => None,
        };

        // the offset is bound as a signed 64-bit SQL parameter
        let offset = (page - 1)
            .checked_mul(page_size)
            .filter(|offset| i64::try_from(*offset).is_ok())
            .ok_or_else(|| AdminError::bad_request(format!("page {} is out of range", page)))?;

        Ok(ListRequest {
            page,
            page_size,
            query: ListQuery { offset, limit: Some(page_size), search, order, filters },
        })
    }
}

/// `column_default_sort`, or the primary keys ascending.
pub fn default_order(view: &ModelView) -> Result<Vec<OrderBy>, AdminError> {
    if view.column_default_sort.is_empty() {
        return Ok(view.meta.primary_keys().iter().map(|c| OrderBy { column: ColumnRef::local(c.name.clone()), descending: false }).collect());
    }
    view.column_default_sort
        .iter()
        .map(|(path, descending)| Ok(OrderBy { column: ColumnRef::resolve(&view.meta, path)?, descending: *descending }))
        .collect()
}
