//! The admin registry: one [`ModelAdmin`] per registered view, each bound to its store.

use crate::ajax::{AjaxItem, AjaxLoader};
use crate::error::AdminError;
use crate::export::json_record;
use crate::form::FormSchema;
use crate::identifier::{decode_object_identifier, encode_object_identifier};
use crate::menu::Menu;
use crate::pagination::{PageControl, Pagination};
use crate::query::ListRequest;
use crate::settings::AdminSettings;
use crate::store::{ModelStore, Row};
use crate::value::Value;
use crate::view::{ModelView, DEFAULT_PAGE_SIZE, DEFAULT_PAGE_SIZE_OPTIONS};
use crate::{info, warn};
use serde::Serialize;
use std::collections::BTreeMap;
use std::sync::Arc;
use utoipa::ToSchema;

#[derive(Debug, Clone, PartialEq, Serialize, ToSchema)]
pub struct ColumnHeader {
    pub name: String,
    pub label: String,
    pub sortable: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize, ToSchema)]
pub struct ListRow {
    /// Object identifier, usable in `details`, `edit` and `delete` URLs.
    pub pk: String,
    #[schema(value_type = Object)]
    pub values: Row,
}

#[derive(Debug, Clone, PartialEq, Serialize, ToSchema)]
pub struct ListPage {
    pub identity: String,
    pub name_plural: String,
    pub columns: Vec<ColumnHeader>,
    pub rows: Vec<ListRow>,
    pub page: usize,
    pub page_size: usize,
    pub page_size_options: Vec<usize>,
    pub count: usize,
    pub total_pages: usize,
    pub has_previous: bool,
    pub has_next: bool,
    pub page_controls: Vec<PageControl>,
    pub searchable: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize, ToSchema)]
pub struct DetailsPage {
    pub identity: String,
    pub name: String,
    pub pk: String,
    pub columns: Vec<ColumnHeader>,
    #[schema(value_type = Object)]
    pub values: Row,
}

#[derive(Debug, Clone, PartialEq, Serialize, ToSchema)]
pub struct FormPage {
    pub identity: String,
    pub name: String,
    pub pk: Option<String>,
    pub form: FormSchema,
    #[schema(value_type = Object)]
    pub values: Row,
}

#[derive(Debug, Clone, PartialEq, Serialize, ToSchema)]
pub struct SavedObject {
    pub pk: String,
    #[schema(value_type = Object)]
    pub values: Row,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, ToSchema)]
pub struct DeleteResult {
    pub deleted: usize,
}

fn pick(row: &Row, names: &[String]) -> Row {
    names.iter().map(|n| (n.clone(), row.get(n).cloned().unwrap_or(serde_json::Value::Null))).collect()
}

fn forbidden(view: &ModelView, action: &str) -> AdminError {
    AdminError::Forbidden(format!("{} is not allowed on {}", action, view.identity))
}

pub struct ModelAdmin {
    pub view: ModelView,
    pub store: Arc<dyn ModelStore>,
    pub form: FormSchema,
    pub ajax_loaders: BTreeMap<String, AjaxLoader>,
}

impl ModelAdmin {
    pub fn identifier(&self, row: &Row) -> Result<String, AdminError> {
        encode_object_identifier(row, &self.view.meta.primary_keys())
    }

    pub fn decode_pk(&self, pk: &str) -> Result<Vec<Value>, AdminError> {
        Ok(decode_object_identifier(pk, &self.view.meta.primary_keys())?)
    }

    fn headers(&self, names: &[String]) -> Vec<ColumnHeader> {
        names
            .iter()
            .map(|n| ColumnHeader { name: n.clone(), label: self.view.label(n).to_string(), sortable: self.view.is_sortable(n) })
            .collect()
    }

    pub async fn get_object(&self, pk: &str) -> Result<Row, AdminError> {
        let values = self.decode_pk(pk)?;
        self.store
            .get(&values)
            .await?
            .ok_or_else(|| AdminError::not_found(format!("{} '{}' not found", self.view.name, pk)))
    }

    /// One page of the list view. `list_url` is the request URL that page controls are derived from.
    pub async fn list(&self, pairs: &[(String, String)], list_url: &str) -> Result<ListPage, AdminError> {
        let request = ListRequest::from_pairs(pairs, &self.view)?;
        let count = self.store.count(&request.query).await?;
        let rows = self.store.list(&request.query).await?;

        let mut pagination = Pagination::new(rows, request.page, request.page_size, count);
        pagination.add_pagination_urls(list_url);

        let columns = self.view.list_columns();
        let rows = pagination
            .rows
            .iter()
            .map(|row| Ok(ListRow { pk: self.identifier(row)?, values: pick(row, &columns) }))
            .collect::<Result<Vec<_>, AdminError>>()?;

        Ok(ListPage {
            identity: self.view.identity.clone(),
            name_plural: self.view.name_plural.clone(),
            columns: self.headers(&columns),
            rows,
            page: pagination.page,
            page_size: pagination.page_size,
            page_size_options: self.view.page_size_options.clone(),
            count,
            total_pages: pagination.total_pages(),
            has_previous: pagination.has_previous(),
            has_next: pagination.has_next(),
            page_controls: pagination.page_controls,
            searchable: !self.view.column_searchable_list.is_empty(),
        })
    }

    pub async fn details(&self, pk: &str) -> Result<DetailsPage, AdminError> {
        if !self.view.can_view_details {
            return Err(forbidden(&self.view, "details"));
        }
        let row = self.get_object(pk).await?;
        let columns = self.view.details_columns();
        Ok(DetailsPage {
            identity: self.view.identity.clone(),
            name: self.view.name.clone(),
            pk: pk.to_string(),
            columns: self.headers(&columns),
            values: pick(&row, &columns),
        })
    }

    pub fn create_form(&self) -> Result<FormPage, AdminError> {
        if !self.view.can_create {
            return Err(forbidden(&self.view, "create"));
        }
        Ok(FormPage {
            identity: self.view.identity.clone(),
            name: self.view.name.clone(),
            pk: None,
            form: self.form.clone(),
            values: Row::new(),
        })
    }

    pub async fn create(&self, data: &serde_json::Map<String, serde_json::Value>) -> Result<SavedObject, AdminError> {
        if !self.view.can_create {
            return Err(forbidden(&self.view, "create"));
        }
        let row = self.form.validate(data).map_err(AdminError::Validation)?;
        let saved = self.store.insert(row).await?;
        let pk = self.identifier(&saved)?;
        info!("Created {} {}", self.view.identity, pk);
        Ok(SavedObject { pk, values: saved })
    }

    /// The form with the object's current values; to-one relations show their key.
    pub async fn edit_form(&self, pk: &str) -> Result<FormPage, AdminError> {
        if !self.view.can_edit {
            return Err(forbidden(&self.view, "edit"));
        }
        let row = self.get_object(pk).await?;
        let values = self
            .form
            .fields
            .iter()
            .map(|field| {
                let value = match self.view.meta.get_relation(&field.name) {
                    Some(relation) if !relation.kind.is_to_many() => row.get(&relation.local_column),
                    _ => row.get(&field.name),
                };
                (field.name.clone(), value.cloned().unwrap_or(serde_json::Value::Null))
            })
            .collect();
        Ok(FormPage {
            identity: self.view.identity.clone(),
            name: self.view.name.clone(),
            pk: Some(pk.to_string()),
            form: self.form.clone(),
            values,
        })
    }

    pub async fn edit(&self, pk: &str, data: &serde_json::Map<String, serde_json::Value>) -> Result<SavedObject, AdminError> {
        if !self.view.can_edit {
            return Err(forbidden(&self.view, "edit"));
        }
        let values = self.decode_pk(pk)?;
        let row = self.form.validate(data).map_err(AdminError::Validation)?;
        let saved = self.store.update(&values, row).await?;
        let pk = self.identifier(&saved)?;
        info!("Updated {} {}", self.view.identity, pk);
        Ok(SavedObject { pk, values: saved })
    }

    /// Deletes every listed object. All identifiers are decoded before anything is removed.
    pub async fn delete(&self, pks: &[String]) -> Result<DeleteResult, AdminError> {
        if !self.view.can_delete {
            return Err(forbidden(&self.view, "delete"));
        }
        if pks.is_empty() {
            return Err(AdminError::bad_request("no objects selected"));
        }
        let decoded = pks.iter().map(|pk| self.decode_pk(pk)).collect::<Result<Vec<_>, _>>()?;
        let mut deleted = 0;
        for values in &decoded {
            if self.store.delete(values).await? {
                deleted += 1;
            }
        }
        if deleted == 0 {
            return Err(AdminError::not_found(format!("none of the selected {} exist", self.view.name_plural)));
        }
        info!("Deleted {} of {} {}", deleted, pks.len(), self.view.identity);
        Ok(DeleteResult { deleted })
    }

    /// Rows for an export, honouring the list's search, filters and sort but not its paging.
    pub async fn export_rows(&self, export_type: &str, pairs: &[(String, String)]) -> Result<Vec<Row>, AdminError> {
        if !self.view.can_export {
            return Err(forbidden(&self.view, "export"));
        }
        if !self.view.supports_export(export_type) {
            return Err(AdminError::bad_request(format!("Unsupported export type: {}", export_type)));
        }
        let request = ListRequest::from_pairs(pairs, &self.view)?;
        let rows = self.store.list(&request.query.unpaged(self.view.export_max_rows)).await?;
        if self.view.export_max_rows > 0 && rows.len() == self.view.export_max_rows {
            warn!("Export of {} capped at {} rows", self.view.identity, self.view.export_max_rows);
        }
        Ok(rows)
    }

    pub fn json_records(&self, rows: &[Row]) -> Vec<serde_json::Value> {
        let columns = self.view.export_columns();
        rows.iter().map(|row| json_record(&self.view, &columns, row)).collect()
    }
}

pub struct Admin {
    pub settings: AdminSettings,
    views: Vec<ModelAdmin>,
    menu: Menu,
}

impl Admin {
    pub fn new(settings: AdminSettings) -> Self {
        Admin { settings, views: Vec::new(), menu: Menu::default() }
    }

    /// Registers `view` backed by `store`. Views used as ajax lookup targets must be registered first.
    pub fn add_view(&mut self, mut view: ModelView, store: Arc<dyn ModelStore>) -> Result<&mut Self, AdminError> {
        if view.page_size == DEFAULT_PAGE_SIZE && view.page_size_options == DEFAULT_PAGE_SIZE_OPTIONS {
            view.page_size = self.settings.page_size;
            view.page_size_options = self.settings.page_size_options.clone();
        }
        view.validate()?;
        if store.meta().table != view.meta.table {
            return Err(AdminError::InvalidView(format!(
                "{}: store serves table '{}', view expects '{}'",
                view.identity,
                store.meta().table,
                view.meta.table
            )));
        }
        if self.views.iter().any(|v| v.view.identity == view.identity) {
            return Err(AdminError::InvalidView(format!("Model view '{}' is already registered.", view.identity)));
        }

        let mut ajax_loaders = BTreeMap::new();
        for (name, options) in &view.form_ajax_refs {
            let relation = view.meta.require_relation(name)?;
            let target = self.find_by_table(&relation.target).ok_or_else(|| {
                AdminError::InvalidView(format!("{}.{} refers to table '{}' which has no registered view.", view.meta.name, name, relation.target))
            })?;
            ajax_loaders.insert(name.clone(), AjaxLoader::new(name, &view, &target.view.meta, options.clone())?);
        }

        let form = FormSchema::for_view(&view)?;
        self.menu.add_view(&view, self.settings.mount_path());
        info!("Registered {} at {}/{}/list", view.name, self.settings.mount_path(), view.identity);
        self.views.push(ModelAdmin { view, store, form, ajax_loaders });
        Ok(self)
    }

    pub fn views(&self) -> impl Iterator<Item = &ModelAdmin> {
        self.views.iter()
    }

    pub fn menu(&self) -> &Menu {
        &self.menu
    }

    pub fn find(&self, identity: &str) -> Result<&ModelAdmin, AdminError> {
        self.views
            .iter()
            .find(|v| v.view.identity == identity)
            .ok_or_else(|| AdminError::not_found(format!("Model view '{}' not found", identity)))
    }

    pub fn find_by_table(&self, table: &str) -> Option<&ModelAdmin> {
        self.views.iter().find(|v| v.view.meta.table == table)
    }

    pub async fn ajax_lookup(&self, identity: &str, name: &str, term: &str) -> Result<Vec<AjaxItem>, AdminError> {
        let admin = self.find(identity)?;
        let loader = admin
            .ajax_loaders
            .get(name)
            .ok_or_else(|| AdminError::bad_request(format!("{} has no ajax lookup named '{}'", identity, name)))?;
        let target = self
            .find_by_table(&loader.target.table)
            .ok_or_else(|| AdminError::not_found(format!("no view for table '{}'", loader.target.table)))?;
        loader.get_list(target.store.as_ref(), term).await
    }
}
