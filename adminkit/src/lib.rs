//! adminkit exposes CRUD administration over relational models as a JSON HTTP API.
//!
//! Each model is described by a [`ModelMeta`], configured for the admin through a [`ModelView`]
//! and served from a [`ModelStore`] (in-memory or SQLite). The [`Admin`] registry ties them
//! together and [`rest::serve`] mounts list, details, create, edit, delete, export and ajax
//! lookup endpoints under the configured base url, documented with OpenAPI.
//!
//! Objects are addressed by identifiers built from their primary key values; composite keys
//! are joined with `;` (see [`identifier`]).

pub mod ajax;
pub mod application;
pub mod error;
pub mod export;
pub mod form;
pub mod helpers;
pub mod identifier;
pub mod logger;
pub mod menu;
pub mod model;
pub mod pagination;
pub mod query;
pub mod rest;
pub mod settings;
pub mod sql;
pub mod store;
pub mod value;
pub mod view;

pub use ajax::{AjaxItem, AjaxLoader, AjaxOptions};
pub use application::{Admin, ModelAdmin};
pub use axum;
pub use error::AdminError;
pub use form::{FormErrors, FormField, FormSchema, Validator, Widget};
pub use identifier::{decode_object_identifier, encode_object_identifier, IdentifierError};
pub use menu::{Menu, MenuItem};
pub use model::{Column, ModelMeta, Relation, RelationKind};
pub use pagination::{PageControl, Pagination, PaginationError};
pub use query::{ColumnRef, Filter, FilterOp, ListQuery, ListRequest, OrderBy, Search};
pub use rusqlite;
pub use serde_json;
pub use settings::{load_config, AdminSettings, HttpSettings};
pub use store::{MemoryStore, ModelStore, Row, SqliteStore};
pub use tokio;
pub use tower_http::cors::CorsLayer;
pub use value::{ColumnType, Value, ValueError};
pub use view::ModelView;
