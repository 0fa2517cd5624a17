//! Declarative model metadata: the columns, primary keys and relations of a table.
//!
//! A [`ModelMeta`] plays the role an ORM mapper plays elsewhere: views, forms, the SQL
//! synthesizer and the identifier codec all reflect over it instead of over concrete types.

use crate::error::AdminError;
use crate::value::ColumnType;
use serde::Serialize;
use utoipa::ToSchema;

#[derive(Debug, Clone, PartialEq, Serialize, ToSchema)]
pub struct Column {
    pub name: String,
    pub ty: ColumnType,
    pub primary_key: bool,
    pub nullable: bool,
    pub autoincrement: bool,
    pub max_length: Option<usize>,
    pub choices: Option<Vec<String>>,
}

impl Column {
    pub fn new(name: impl Into<String>, ty: ColumnType) -> Self {
        Column {
            name: name.into(),
            ty,
            primary_key: false,
            nullable: true,
            autoincrement: false,
            max_length: None,
            choices: None,
        }
    }

    pub fn integer(name: impl Into<String>) -> Self { Self::new(name, ColumnType::Integer) }
    pub fn float(name: impl Into<String>) -> Self { Self::new(name, ColumnType::Float) }
    pub fn boolean(name: impl Into<String>) -> Self { Self::new(name, ColumnType::Boolean) }
    pub fn text(name: impl Into<String>) -> Self { Self::new(name, ColumnType::Text) }
    pub fn date(name: impl Into<String>) -> Self { Self::new(name, ColumnType::Date) }
    pub fn datetime(name: impl Into<String>) -> Self { Self::new(name, ColumnType::DateTime) }
    pub fn json(name: impl Into<String>) -> Self { Self::new(name, ColumnType::Json) }

    /// Primary key columns are never nullable.
    pub fn primary_key(mut self) -> Self {
        self.primary_key = true;
        self.nullable = false;
        self
    }

    pub fn autoincrement(mut self) -> Self {
        self.autoincrement = true;
        self
    }

    pub fn not_null(mut self) -> Self {
        self.nullable = false;
        self
    }

    pub fn max_length(mut self, max: usize) -> Self {
        self.max_length = Some(max);
        self
    }

    pub fn choices<I, S>(mut self, choices: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.choices = Some(choices.into_iter().map(Into::into).collect());
        self
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, ToSchema)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum RelationKind {
    ManyToOne,
    OneToOne,
    OneToMany,
    ManyToMany,
}

impl RelationKind {
    pub fn is_to_many(&self) -> bool {
        matches!(self, RelationKind::OneToMany | RelationKind::ManyToMany)
    }
}

/// A relation to another table.
///
/// For to-one relations `local_column` lives on this table and `remote_column` on the target.
/// For to-many relations the roles are swapped: `remote_column` is the foreign key on the target.
#[derive(Debug, Clone, PartialEq, Serialize, ToSchema)]
pub struct Relation {
    pub name: String,
    pub target: String,
    pub kind: RelationKind,
    pub local_column: String,
    pub remote_column: String,
}

impl Relation {
    pub fn many_to_one(name: impl Into<String>, target: impl Into<String>, local_column: impl Into<String>, remote_column: impl Into<String>) -> Self {
        Relation { name: name.into(), target: target.into(), kind: RelationKind::ManyToOne, local_column: local_column.into(), remote_column: remote_column.into() }
    }

    pub fn one_to_one(name: impl Into<String>, target: impl Into<String>, local_column: impl Into<String>, remote_column: impl Into<String>) -> Self {
        Relation { kind: RelationKind::OneToOne, ..Self::many_to_one(name, target, local_column, remote_column) }
    }

    pub fn one_to_many(name: impl Into<String>, target: impl Into<String>, local_column: impl Into<String>, remote_column: impl Into<String>) -> Self {
        Relation { kind: RelationKind::OneToMany, ..Self::many_to_one(name, target, local_column, remote_column) }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, ToSchema)]
pub struct ModelMeta {
    pub name: String,
    pub table: String,
    pub columns: Vec<Column>,
    pub relations: Vec<Relation>,
}

impl ModelMeta {
    pub fn new(name: impl Into<String>, table: impl Into<String>) -> Self {
        ModelMeta { name: name.into(), table: table.into(), columns: Vec::new(), relations: Vec::new() }
    }

    pub fn column(mut self, column: Column) -> Self {
        self.columns.push(column);
        self
    }

    pub fn relation(mut self, relation: Relation) -> Self {
        self.relations.push(relation);
        self
    }

    /// Primary key columns in declaration order.
    pub fn primary_keys(&self) -> Vec<&Column> {
        self.columns.iter().filter(|c| c.primary_key).collect()
    }

    pub fn get_column(&self, name: &str) -> Option<&Column> {
        self.columns.iter().find(|c| c.name == name)
    }

    pub fn get_relation(&self, name: &str) -> Option<&Relation> {
        self.relations.iter().find(|r| r.name == name)
    }

    pub fn require_column(&self, name: &str) -> Result<&Column, AdminError> {
        self.get_column(name)
            .ok_or_else(|| AdminError::InvalidColumn(format!("Model '{}' has no attribute '{}'.", self.name, name)))
    }

    pub fn require_relation(&self, name: &str) -> Result<&Relation, AdminError> {
        self.get_relation(name)
            .ok_or_else(|| AdminError::InvalidColumn(format!("{}.{} is not a relation.", self.name, name)))
    }

    pub fn validate(&self) -> Result<(), AdminError> {
        if self.primary_keys().is_empty() {
            return Err(AdminError::InvalidModel(format!("Model '{}' has no primary key.", self.name)));
        }
        for (i, column) in self.columns.iter().enumerate() {
            if self.columns[..i].iter().any(|c| c.name == column.name) {
                return Err(AdminError::InvalidModel(format!("Model '{}' declares column '{}' twice.", self.name, column.name)));
            }
            if self.relations.iter().any(|r| r.name == column.name) {
                return Err(AdminError::InvalidModel(format!("Model '{}' uses '{}' for both a column and a relation.", self.name, column.name)));
            }
        }
        for relation in &self.relations {
            if !relation.kind.is_to_many() {
                self.require_column(&relation.local_column)?;
            }
        }
        Ok(())
    }
}
