//! Remote option lookups for relation fields with many candidate rows.

use crate::error::AdminError;
use crate::identifier::encode_object_identifier;
use crate::model::ModelMeta;
use crate::query::{ColumnRef, OrderBy};
use crate::store::{ModelStore, Row};
use crate::view::ModelView;
use serde::Serialize;
use utoipa::ToSchema;

pub const DEFAULT_AJAX_LIMIT: usize = 10;

#[derive(Debug, Clone, PartialEq)]
pub struct AjaxOptions {
    /// Target columns matched against the search term.
    pub fields: Vec<String>,
    /// `(column, descending)`
    pub order_by: Vec<(String, bool)>,
    pub limit: usize,
}

impl AjaxOptions {
    pub fn new<I: IntoIterator<Item = S>, S: Into<String>>(fields: I) -> Self {
        AjaxOptions { fields: fields.into_iter().map(Into::into).collect(), order_by: Vec::new(), limit: DEFAULT_AJAX_LIMIT }
    }

    pub fn order_by(mut self, column: impl Into<String>, descending: bool) -> Self {
        self.order_by.push((column.into(), descending));
        self
    }

    pub fn limit(mut self, limit: usize) -> Self {
        self.limit = limit;
        self
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, ToSchema)]
pub struct AjaxItem {
    pub id: String,
    pub text: String,
}

#[derive(Debug, Clone)]
pub struct AjaxLoader {
    pub name: String,
    pub target: ModelMeta,
    pub options: AjaxOptions,
    order: Vec<OrderBy>,
}

impl AjaxLoader {
    pub fn new(name: &str, view: &ModelView, target: &ModelMeta, options: AjaxOptions) -> Result<AjaxLoader, AdminError> {
        view.meta.require_relation(name)?;
        if options.fields.is_empty() {
            return Err(AdminError::InvalidView(format!(
                "AJAX loading requires `fields` to be specified for {}.{}",
                view.meta.name, name
            )));
        }
        for field in &options.fields {
            if target.get_column(field).is_none() {
                return Err(AdminError::InvalidView(format!("{}.{} does not exist.", target.name, field)));
            }
        }
        let order = options
            .order_by
            .iter()
            .map(|(column, descending)| {
                target.require_column(column)?;
                Ok(OrderBy { column: ColumnRef::local(column.clone()), descending: *descending })
            })
            .collect::<Result<Vec<_>, AdminError>>()?;
        Ok(AjaxLoader { name: name.to_string(), target: target.clone(), options, order })
    }

    /// The row's identifier and its lookup fields joined by spaces.
    pub fn format(&self, row: &Row) -> Result<AjaxItem, AdminError> {
        let id = encode_object_identifier(row, &self.target.primary_keys())?;
        let text = self
            .options
            .fields
            .iter()
            .filter_map(|f| row.get(f))
            .map(crate::helpers::display_json)
            .filter(|s| !s.is_empty())
            .collect::<Vec<_>>()
            .join(" ");
        let text = if text.is_empty() { id.clone() } else { text };
        Ok(AjaxItem { id, text })
    }

    pub async fn get_list(&self, store: &dyn ModelStore, term: &str) -> Result<Vec<AjaxItem>, AdminError> {
        store
            .lookup(&self.options.fields, term, &self.order, self.options.limit)
            .await?
            .iter()
            .map(|row| self.format(row))
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{Column, Relation};
    use crate::store::MemoryStore;
    use serde_json::json;

    fn teams() -> ModelMeta {
        ModelMeta::new("Team", "teams")
            .column(Column::integer("id").primary_key())
            .column(Column::text("name"))
            .column(Column::text("city"))
    }

    fn users() -> ModelView {
        ModelView::new(
            ModelMeta::new("User", "users")
                .column(Column::integer("id").primary_key())
                .column(Column::integer("team_id"))
                .relation(Relation::many_to_one("team", "teams", "team_id", "id")),
        )
    }

    #[test]
    fn rejects_bad_options() {
        assert!(AjaxLoader::new("crew", &users(), &teams(), AjaxOptions::new(["name"])).is_err());
        assert!(AjaxLoader::new("team", &users(), &teams(), AjaxOptions::new(Vec::<String>::new())).is_err());
        assert!(AjaxLoader::new("team", &users(), &teams(), AjaxOptions::new(["nick"])).is_err());
        assert!(AjaxLoader::new("team", &users(), &teams(), AjaxOptions::new(["name"]).order_by("rank", false)).is_err());
        assert_eq!(AjaxOptions::new(["name"]).limit, DEFAULT_AJAX_LIMIT);
    }

    #[tokio::test]
    async fn lists_formatted_matches() {
        let rows = [(1, "Reds", "Oslo"), (2, "Blues", "Bergen"), (3, "Greens", "Oslo"), (4, "Yellows", "Rome")]
            .into_iter()
            .map(|(id, name, city)| json!({"id": id, "name": name, "city": city}).as_object().cloned().unwrap())
            .collect();
        let store = MemoryStore::with_rows(teams(), rows).unwrap();
        let options = AjaxOptions::new(["name", "city"]).order_by("name", true).limit(2);
        let loader = AjaxLoader::new("team", &users(), &teams(), options).unwrap();

        let items = loader.get_list(&store, "os").await.unwrap();
        assert_eq!(items, vec![
            AjaxItem { id: "1".into(), text: "Reds Oslo".into() },
            AjaxItem { id: "3".into(), text: "Greens Oslo".into() },
        ]);
        assert!(loader.get_list(&store, "paris").await.unwrap().is_empty());
    }
}
