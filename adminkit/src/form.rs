//! Form schemas derived from model columns, and validation of submitted data against them.

use crate::error::AdminError;
use crate::model::{Column, Relation};
use crate::store::Row;
use crate::value::{ColumnType, Value};
use crate::view::ModelView;
use serde::Serialize;
use std::collections::BTreeMap;
use std::fmt;
use utoipa::ToSchema;

pub const REQUIRED_MESSAGE: &str = "This field is required.";
pub const INVALID_CHOICE_MESSAGE: &str = "Not a valid choice.";

#[derive(Debug, Clone, PartialEq, Serialize, ToSchema)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Widget {
    Number,
    Decimal,
    Checkbox,
    Text,
    TextArea,
    Date,
    DateTime,
    Json,
    Select { choices: Vec<String> },
    RelationSelect { target: String, multiple: bool },
    /// Options are fetched from `GET /{identity}/ajax/lookup?name=<relation>`.
    AjaxSelect { relation: String, multiple: bool },
}

#[derive(Debug, Clone, PartialEq, Serialize, ToSchema)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Validator {
    InputRequired,
    Optional,
    Length { max: usize },
    AnyOf { values: Vec<String> },
}

#[derive(Debug, Clone, PartialEq, Serialize, ToSchema)]
pub struct FormField {
    pub name: String,
    pub label: String,
    pub widget: Widget,
    pub required: bool,
    pub validators: Vec<Validator>,
    #[serde(skip)]
    source: FieldSource,
}

#[derive(Debug, Clone, PartialEq)]
enum FieldSource {
    Column(Column),
    Relation { relation: Relation, local: Option<Column> },
}

/// Per-field error messages, keyed by field name.
#[derive(Debug, Clone, Default, PartialEq, Serialize, ToSchema)]
pub struct FormErrors {
    pub errors: BTreeMap<String, Vec<String>>,
}

impl FormErrors {
    pub fn add(&mut self, field: &str, message: impl Into<String>) {
        self.errors.entry(field.to_string()).or_default().push(message.into());
    }

    pub fn is_empty(&self) -> bool {
        self.errors.is_empty()
    }
}

impl fmt::Display for FormErrors {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let parts: Vec<String> = self.errors.iter().map(|(field, messages)| format!("{}: {}", field, messages.join(" "))).collect();
        write!(f, "{}", parts.join("; "))
    }
}

fn column_field(column: &Column, label: &str) -> FormField {
    let mut validators = Vec::new();
    if column.nullable {
        validators.push(Validator::Optional);
    } else if column.ty != ColumnType::Boolean && !column.autoincrement {
        validators.push(Validator::InputRequired);
    }

    let widget = if let Some(choices) = &column.choices {
        validators.push(Validator::AnyOf { values: choices.clone() });
        Widget::Select { choices: choices.clone() }
    } else {
        match column.ty {
            ColumnType::Integer => Widget::Number,
            ColumnType::Float => Widget::Decimal,
            ColumnType::Boolean => Widget::Checkbox,
            ColumnType::Text => match column.max_length {
                Some(max) => {
                    validators.push(Validator::Length { max });
                    Widget::Text
                }
                None => Widget::TextArea,
            },
            ColumnType::Date => Widget::Date,
            ColumnType::DateTime => Widget::DateTime,
            ColumnType::Json => Widget::Json,
        }
    };

    FormField {
        name: column.name.clone(),
        label: label.to_string(),
        required: validators.contains(&Validator::InputRequired),
        widget,
        validators,
        source: FieldSource::Column(column.clone()),
    }
}

fn relation_field(view: &ModelView, relation: &Relation, label: &str) -> FormField {
    let multiple = relation.kind.is_to_many();
    let local = if multiple { None } else { view.meta.get_column(&relation.local_column).cloned() };
    let required = local.as_ref().is_some_and(|c| !c.nullable);
    let widget = if view.form_ajax_refs.contains_key(&relation.name) {
        Widget::AjaxSelect { relation: relation.name.clone(), multiple }
    } else {
        Widget::RelationSelect { target: relation.target.clone(), multiple }
    };
    FormField {
        name: relation.name.clone(),
        label: label.to_string(),
        widget,
        required,
        validators: vec![if required { Validator::InputRequired } else { Validator::Optional }],
        source: FieldSource::Relation { relation: relation.clone(), local },
    }
}

fn is_blank(json: Option<&serde_json::Value>) -> bool {
    match json {
        None | Some(serde_json::Value::Null) => true,
        Some(serde_json::Value::String(s)) => s.trim().is_empty(),
        _ => false,
    }
}

impl FormField {
    fn check(&self, value: &Value, errors: &mut FormErrors) {
        for validator in &self.validators {
            match validator {
                Validator::Length { max } => {
                    if let Value::Text(text) = value {
                        if text.chars().count() > *max {
                            errors.add(&self.name, format!("Field cannot be longer than {} characters.", max));
                        }
                    }
                }
                Validator::AnyOf { values } => {
                    if !values.contains(&value.to_string()) {
                        errors.add(&self.name, INVALID_CHOICE_MESSAGE);
                    }
                }
                Validator::InputRequired | Validator::Optional => {}
            }
        }
    }

    fn bind_column(&self, column: &Column, raw: Option<&serde_json::Value>, row: &mut Row, errors: &mut FormErrors) {
        if is_blank(raw) {
            if column.ty == ColumnType::Boolean && raw.is_none() {
                // unchecked checkboxes are not submitted
                row.insert(column.name.clone(), serde_json::Value::Bool(false));
            } else if self.required {
                errors.add(&self.name, REQUIRED_MESSAGE);
            } else if column.nullable {
                row.insert(column.name.clone(), serde_json::Value::Null);
            }
            return;
        }
        match column.ty.from_json(raw.unwrap_or(&serde_json::Value::Null)) {
            Ok(value) => {
                self.check(&value, errors);
                row.insert(column.name.clone(), value.to_json());
            }
            Err(e) => errors.add(&self.name, e.to_string()),
        }
    }

    fn bind_relation(&self, relation: &Relation, local: Option<&Column>, raw: Option<&serde_json::Value>, row: &mut Row, errors: &mut FormErrors) {
        if relation.kind.is_to_many() {
            match raw {
                None | Some(serde_json::Value::Null) => {}
                Some(serde_json::Value::Array(items)) => {
                    row.insert(relation.name.clone(), serde_json::Value::Array(items.clone()));
                }
                Some(_) => errors.add(&self.name, "Expected a list of identifiers."),
            }
            return;
        }
        let Some(local) = local else { return };
        if is_blank(raw) {
            if self.required {
                errors.add(&self.name, REQUIRED_MESSAGE);
            } else if raw.is_some() {
                row.insert(local.name.clone(), serde_json::Value::Null);
            }
            return;
        }
        match local.ty.from_json(raw.unwrap_or(&serde_json::Value::Null)) {
            Ok(value) => {
                row.insert(local.name.clone(), value.to_json());
            }
            Err(e) => errors.add(&self.name, e.to_string()),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, ToSchema)]
pub struct FormSchema {
    pub fields: Vec<FormField>,
}

impl FormSchema {
    pub fn for_view(view: &ModelView) -> Result<FormSchema, AdminError> {
        let fields = view
            .form_fields()
            .iter()
            .map(|name| {
                let label = view.label(name);
                if let Some(column) = view.meta.get_column(name) {
                    Ok(column_field(column, label))
                } else {
                    view.meta.require_relation(name).map(|relation| relation_field(view, relation, label))
                }
            })
            .collect::<Result<Vec<_>, AdminError>>()?;
        Ok(FormSchema { fields })
    }

    pub fn field(&self, name: &str) -> Option<&FormField> {
        self.fields.iter().find(|f| f.name == name)
    }

    /// Coerces submitted data into a row of column values. Keys that are not form fields are ignored;
    /// a to-one relation field is stored under its local column.
    pub fn validate(&self, data: &serde_json::Map<String, serde_json::Value>) -> Result<Row, FormErrors> {
        let mut row = Row::new();
        let mut errors = FormErrors::default();
        for field in &self.fields {
            let raw = data.get(&field.name);
            match &field.source {
                FieldSource::Column(column) => field.bind_column(column, raw, &mut row, &mut errors),
                FieldSource::Relation { relation, local } => field.bind_relation(relation, local.as_ref(), raw, &mut row, &mut errors),
            }
        }
        if errors.is_empty() { Ok(row) } else { Err(errors) }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ajax::AjaxOptions;
    use crate::model::ModelMeta;
    use serde_json::json;

    fn view() -> ModelView {
        let meta = ModelMeta::new("User", "users")
            .column(Column::integer("id").primary_key().autoincrement())
            .column(Column::text("name").max_length(5).not_null())
            .column(Column::text("bio"))
            .column(Column::boolean("active").not_null())
            .column(Column::text("role").choices(["admin", "staff"]))
            .column(Column::date("born"))
            .column(Column::integer("team_id").not_null())
            .relation(Relation::many_to_one("team", "teams", "team_id", "id"));
        ModelView::new(meta)
            .form_excluded_columns(["team_id"])
            .column_label("bio", "Biography")
            .form_ajax_ref("team", AjaxOptions::new(["name"]))
    }

    fn data(value: serde_json::Value) -> serde_json::Map<String, serde_json::Value> {
        value.as_object().cloned().unwrap()
    }

    #[test]
    fn fields_follow_column_types() {
        let schema = FormSchema::for_view(&view()).unwrap();
        let names: Vec<_> = schema.fields.iter().map(|f| f.name.as_str()).collect();
        assert_eq!(names, vec!["name", "bio", "active", "role", "born", "team"]);

        let name = schema.field("name").unwrap();
        assert_eq!(name.widget, Widget::Text);
        assert!(name.required);
        assert_eq!(name.validators, vec![Validator::InputRequired, Validator::Length { max: 5 }]);

        let bio = schema.field("bio").unwrap();
        assert_eq!((bio.label.as_str(), &bio.widget), ("Biography", &Widget::TextArea));
        assert!(!schema.field("active").unwrap().required);
        assert_eq!(schema.field("role").unwrap().widget, Widget::Select { choices: vec!["admin".into(), "staff".into()] });
        assert_eq!(schema.field("team").unwrap().widget, Widget::AjaxSelect { relation: "team".into(), multiple: false });
        assert!(schema.field("team").unwrap().required);
    }

    #[test]
    fn validates_and_coerces() {
        let schema = FormSchema::for_view(&view()).unwrap();
        let row = schema.validate(&data(json!({"name": "Ann", "bio": "", "role": "staff", "born": "1990-05-01", "team": "3"}))).unwrap();
        assert_eq!(row.get("name"), Some(&json!("Ann")));
        assert_eq!(row.get("bio"), Some(&json!(null)));
        assert_eq!(row.get("active"), Some(&json!(false)));
        assert_eq!(row.get("team_id"), Some(&json!(3)));
        assert!(!row.contains_key("team"));
        assert!(!row.contains_key("id"));
    }

    #[test]
    fn collects_messages_per_field() {
        let schema = FormSchema::for_view(&view()).unwrap();
        let errors = schema.validate(&data(json!({"name": "Annabel", "role": "root", "born": "yesterday"}))).unwrap_err();
        assert_eq!(errors.errors["name"], vec!["Field cannot be longer than 5 characters."]);
        assert_eq!(errors.errors["role"], vec![INVALID_CHOICE_MESSAGE]);
        assert_eq!(errors.errors["born"], vec!["'yesterday' is not a valid date"]);
        assert_eq!(errors.errors["team"], vec![REQUIRED_MESSAGE]);
        assert!(errors.to_string().starts_with("born: "));
    }
}
