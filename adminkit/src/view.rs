//! Per-model admin configuration.

use crate::ajax::AjaxOptions;
use crate::error::AdminError;
use crate::helpers::{prettify_class_name, slugify_class_name};
use crate::model::ModelMeta;
use crate::query::ColumnRef;
use std::collections::BTreeMap;

pub const EXPORT_CSV: &str = "csv";
pub const EXPORT_JSON: &str = "json";
pub const DEFAULT_PAGE_SIZE: usize = 10;
pub const DEFAULT_PAGE_SIZE_OPTIONS: [usize; 4] = [10, 25, 50, 100];

fn strings<I, S>(items: I) -> Vec<String>
where
    I: IntoIterator<Item = S>,
    S: Into<String>,
{
    items.into_iter().map(Into::into).collect()
}

#[derive(Debug, Clone)]
pub struct ModelView {
    pub meta: ModelMeta,
    pub identity: String,
    pub name: String,
    pub name_plural: String,
    pub icon: Option<String>,
    pub category: Option<String>,

    pub can_create: bool,
    pub can_edit: bool,
    pub can_delete: bool,
    pub can_view_details: bool,
    pub can_export: bool,

    pub column_list: Vec<String>,
    pub column_exclude_list: Vec<String>,
    pub column_details_list: Vec<String>,
    pub column_details_exclude_list: Vec<String>,
    pub column_searchable_list: Vec<String>,
    pub column_sortable_list: Vec<String>,
    /// `(column path, descending)`
    pub column_default_sort: Vec<(String, bool)>,
    pub column_filters: Vec<String>,
    pub column_labels: BTreeMap<String, String>,
    pub page_size: usize,
    pub page_size_options: Vec<usize>,

    pub form_columns: Vec<String>,
    pub form_excluded_columns: Vec<String>,
    pub form_ajax_refs: BTreeMap<String, AjaxOptions>,

    pub export_types: Vec<String>,
    pub export_max_rows: usize,
    pub column_export_list: Vec<String>,
    pub use_pretty_export: bool,
}

impl ModelView {
    pub fn new(meta: ModelMeta) -> Self {
        let name = prettify_class_name(&meta.name);
        ModelView {
            identity: slugify_class_name(&meta.name),
            name_plural: format!("{}s", name),
            name,
            meta,
            icon: None,
            category: None,
            can_create: true,
            can_edit: true,
            can_delete: true,
            can_view_details: true,
            can_export: true,
            column_list: Vec::new(),
            column_exclude_list: Vec::new(),
            column_details_list: Vec::new(),
            column_details_exclude_list: Vec::new(),
            column_searchable_list: Vec::new(),
            column_sortable_list: Vec::new(),
            column_default_sort: Vec::new(),
            column_filters: Vec::new(),
            column_labels: BTreeMap::new(),
            page_size: DEFAULT_PAGE_SIZE,
            page_size_options: DEFAULT_PAGE_SIZE_OPTIONS.to_vec(),
            form_columns: Vec::new(),
            form_excluded_columns: Vec::new(),
            form_ajax_refs: BTreeMap::new(),
            export_types: strings([EXPORT_CSV, EXPORT_JSON]),
            export_max_rows: 0,
            column_export_list: Vec::new(),
            use_pretty_export: false,
        }
    }

    pub fn name(mut self, name: impl Into<String>) -> Self {
        self.name = name.into();
        self.name_plural = format!("{}s", self.name);
        self
    }

    pub fn name_plural(mut self, name_plural: impl Into<String>) -> Self {
        self.name_plural = name_plural.into();
        self
    }

    pub fn icon(mut self, icon: impl Into<String>) -> Self {
        self.icon = Some(icon.into());
        self
    }

    pub fn category(mut self, category: impl Into<String>) -> Self {
        self.category = Some(category.into());
        self
    }

    pub fn read_only(mut self) -> Self {
        self.can_create = false;
        self.can_edit = false;
        self.can_delete = false;
        self
    }

    pub fn column_list<I: IntoIterator<Item = S>, S: Into<String>>(mut self, columns: I) -> Self {
        self.column_list = strings(columns);
        self
    }

    pub fn column_exclude_list<I: IntoIterator<Item = S>, S: Into<String>>(mut self, columns: I) -> Self {
        self.column_exclude_list = strings(columns);
        self
    }

    pub fn column_details_list<I: IntoIterator<Item = S>, S: Into<String>>(mut self, columns: I) -> Self {
        self.column_details_list = strings(columns);
        self
    }

    pub fn column_details_exclude_list<I: IntoIterator<Item = S>, S: Into<String>>(mut self, columns: I) -> Self {
        self.column_details_exclude_list = strings(columns);
        self
    }

    pub fn column_searchable_list<I: IntoIterator<Item = S>, S: Into<String>>(mut self, columns: I) -> Self {
        self.column_searchable_list = strings(columns);
        self
    }

    pub fn column_sortable_list<I: IntoIterator<Item = S>, S: Into<String>>(mut self, columns: I) -> Self {
        self.column_sortable_list = strings(columns);
        self
    }

    pub fn column_default_sort(mut self, column: impl Into<String>, descending: bool) -> Self {
        self.column_default_sort.push((column.into(), descending));
        self
    }

    pub fn column_filters<I: IntoIterator<Item = S>, S: Into<String>>(mut self, columns: I) -> Self {
        self.column_filters = strings(columns);
        self
    }

    pub fn column_label(mut self, column: impl Into<String>, label: impl Into<String>) -> Self {
        self.column_labels.insert(column.into(), label.into());
        self
    }

    pub fn page_size(mut self, page_size: usize) -> Self {
        self.page_size = page_size;
        self
    }

    pub fn page_size_options(mut self, options: impl IntoIterator<Item = usize>) -> Self {
        self.page_size_options = options.into_iter().collect();
        self
    }

    pub fn form_columns<I: IntoIterator<Item = S>, S: Into<String>>(mut self, columns: I) -> Self {
        self.form_columns = strings(columns);
        self
    }

    pub fn form_excluded_columns<I: IntoIterator<Item = S>, S: Into<String>>(mut self, columns: I) -> Self {
        self.form_excluded_columns = strings(columns);
        self
    }

    pub fn form_ajax_ref(mut self, relation: impl Into<String>, options: AjaxOptions) -> Self {
        self.form_ajax_refs.insert(relation.into(), options);
        self
    }

    pub fn export_types<I: IntoIterator<Item = S>, S: Into<String>>(mut self, types: I) -> Self {
        self.export_types = strings(types);
        self
    }

    pub fn export_max_rows(mut self, max_rows: usize) -> Self {
        self.export_max_rows = max_rows;
        self
    }

    pub fn column_export_list<I: IntoIterator<Item = S>, S: Into<String>>(mut self, columns: I) -> Self {
        self.column_export_list = strings(columns);
        self
    }

    pub fn use_pretty_export(mut self, pretty: bool) -> Self {
        self.use_pretty_export = pretty;
        self
    }

    pub fn validate(&self) -> Result<(), AdminError> {
        self.meta.validate()?;

        check_conflicting(&self.column_list, &self.column_exclude_list, "column_list", "column_exclude_list")?;
        check_conflicting(&self.column_details_list, &self.column_details_exclude_list, "column_details_list", "column_details_exclude_list")?;
        check_conflicting(&self.form_columns, &self.form_excluded_columns, "form_columns", "form_excluded_columns")?;

        for name in self.column_list.iter()
            .chain(&self.column_exclude_list)
            .chain(&self.column_details_list)
            .chain(&self.column_details_exclude_list)
            .chain(&self.form_columns)
            .chain(&self.form_excluded_columns)
            .chain(&self.column_export_list)
            .chain(self.column_labels.keys())
        {
            self.require_attribute(name)?;
        }

        for path in self.column_searchable_list.iter()
            .chain(&self.column_sortable_list)
            .chain(self.column_default_sort.iter().map(|(path, _)| path))
        {
            ColumnRef::resolve(&self.meta, path)?;
        }

        for name in &self.column_filters {
            self.meta.require_column(name)?;
        }

        for relation in self.form_ajax_refs.keys() {
            self.meta.require_relation(relation)?;
        }

        if self.page_size == 0 {
            return Err(AdminError::InvalidView(format!("{}: page_size must be positive.", self.identity)));
        }

        if let Some(unknown) = self.export_types.iter().find(|t| *t != EXPORT_CSV && *t != EXPORT_JSON) {
            return Err(AdminError::InvalidView(format!("{}: unsupported export type '{}'.", self.identity, unknown)));
        }
        Ok(())
    }

    fn require_attribute(&self, name: &str) -> Result<(), AdminError> {
        if self.meta.get_relation(name).is_some() {
            return Ok(());
        }
        self.meta.require_column(name).map(|_| ())
    }

    fn all_attributes(&self) -> Vec<String> {
        self.meta.columns.iter().map(|c| c.name.clone())
            .chain(self.meta.relations.iter().map(|r| r.name.clone()))
            .collect()
    }

    fn select(&self, include: &[String], exclude: &[String], default: Vec<String>) -> Vec<String> {
        if !include.is_empty() {
            include.to_vec()
        } else if !exclude.is_empty() {
            self.all_attributes().into_iter().filter(|a| !exclude.contains(a)).collect()
        } else {
            default
        }
    }

    pub fn pk_names(&self) -> Vec<String> {
        self.meta.primary_keys().iter().map(|c| c.name.clone()).collect()
    }

    /// Defaults to the primary key columns.
    pub fn list_columns(&self) -> Vec<String> {
        self.select(&self.column_list, &self.column_exclude_list, self.pk_names())
    }

    pub fn details_columns(&self) -> Vec<String> {
        self.select(&self.column_details_list, &self.column_details_exclude_list, self.all_attributes())
    }

    /// `form_columns` verbatim, otherwise every attribute not excluded. Autoincrement columns
    /// only appear when listed explicitly.
    pub fn form_fields(&self) -> Vec<String> {
        if !self.form_columns.is_empty() {
            return self.form_columns.clone();
        }
        self.all_attributes()
            .into_iter()
            .filter(|a| !self.form_excluded_columns.contains(a))
            .filter(|a| self.meta.get_column(a).map_or(true, |c| !c.autoincrement))
            .collect()
    }

    pub fn export_columns(&self) -> Vec<String> {
        if self.column_export_list.is_empty() {
            self.list_columns()
        } else {
            self.column_export_list.clone()
        }
    }

    pub fn label<'a>(&'a self, name: &'a str) -> &'a str {
        self.column_labels.get(name).map(String::as_str).unwrap_or(name)
    }

    pub fn is_sortable(&self, path: &str) -> bool {
        self.column_sortable_list.iter().any(|c| c == path)
    }

    pub fn is_filterable(&self, column: &str) -> bool {
        self.column_filters.iter().any(|c| c == column)
    }

    pub fn max_page_size(&self) -> usize {
        self.page_size_options.iter().copied().max().unwrap_or(self.page_size)
    }

    pub fn supports_export(&self, export_type: &str) -> bool {
        self.can_export && self.export_types.iter().any(|t| t == export_type)
    }
}

fn check_conflicting(a: &[String], b: &[String], a_name: &str, b_name: &str) -> Result<(), AdminError> {
    if !a.is_empty() && !b.is_empty() {
        return Err(AdminError::InvalidView(format!("Cannot use {} and {} together.", a_name, b_name)));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{Column, Relation};

    fn user_meta() -> ModelMeta {
        ModelMeta::new("UserAccount", "users")
            .column(Column::integer("id").primary_key().autoincrement())
            .column(Column::text("name").max_length(32))
            .column(Column::text("email"))
            .column(Column::integer("team_id"))
            .relation(Relation::many_to_one("team", "teams", "team_id", "id"))
    }

    #[test]
    fn derives_identity_and_names() {
        let view = ModelView::new(user_meta());
        assert_eq!(view.identity, "user-account");
        assert_eq!(view.name, "User Account");
        assert_eq!(view.name_plural, "User Accounts");
        let view = view.name("Person").name_plural("People");
        assert_eq!(view.name_plural, "People");
    }

    #[test]
    fn conflicting_options_are_rejected() {
        let view = ModelView::new(user_meta()).column_list(["id"]).column_exclude_list(["name"]);
        let err = view.validate().unwrap_err();
        assert_eq!(err.to_string(), "Invalid view configuration: Cannot use column_list and column_exclude_list together.");
    }

    #[test]
    fn unknown_columns_are_rejected() {
        assert!(ModelView::new(user_meta()).column_list(["age"]).validate().is_err());
        assert!(ModelView::new(user_meta()).column_searchable_list(["team.name"]).validate().is_ok());
        assert!(ModelView::new(user_meta()).column_searchable_list(["crew.name"]).validate().is_err());
        assert!(ModelView::new(user_meta()).column_filters(["team"]).validate().is_err());
        assert!(ModelView::new(user_meta()).export_types(["xlsx"]).validate().is_err());
        assert!(ModelView::new(user_meta()).page_size(0).validate().is_err());
    }

    #[test]
    fn resolves_column_sets() {
        let view = ModelView::new(user_meta());
        assert_eq!(view.list_columns(), vec!["id"]);
        assert_eq!(view.details_columns(), vec!["id", "name", "email", "team_id", "team"]);
        assert_eq!(view.form_fields(), vec!["name", "email", "team_id", "team"]);
        assert_eq!(view.export_columns(), vec!["id"]);

        let view = ModelView::new(user_meta()).column_exclude_list(["email", "team_id"]).form_excluded_columns(["team_id"]);
        assert_eq!(view.list_columns(), vec!["id", "name", "team"]);
        assert_eq!(view.form_fields(), vec!["name", "email", "team"]);
    }

    #[test]
    fn labels_and_page_sizes() {
        let view = ModelView::new(user_meta()).column_label("email", "E-mail").page_size_options([5, 20]);
        assert_eq!(view.label("email"), "E-mail");
        assert_eq!(view.label("name"), "name");
        assert_eq!(view.max_page_size(), 20);
        assert_eq!(view.page_size_options(Vec::new()).max_page_size(), 10);
    }
}
