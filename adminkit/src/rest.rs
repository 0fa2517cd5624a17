use crate::ajax::AjaxItem;
use crate::application::{Admin, DeleteResult, DetailsPage, FormPage, ListPage, SavedObject};
use crate::error::AdminError;
use crate::export::{content_type, export_csv, export_filename};
use crate::form::FormErrors;
use crate::menu::Menu;
use crate::query::ListParams;
use crate::view::EXPORT_CSV;
use crate::info;
use axum::extract::{FromRequest, Path, Query, RawQuery, State};
use axum::response::{IntoResponse, Response};
use axum::Router;
use http::header::{CONTENT_DISPOSITION, CONTENT_TYPE};
use http::{HeaderValue, StatusCode};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tokio::net::TcpListener;
use tokio::sync::watch;
use tower_http::cors::CorsLayer;
use utoipa::{IntoParams, OpenApi, ToSchema};
use utoipa_axum::router::OpenApiRouter;
use utoipa_axum::routes;
use utoipa_swagger_ui::SwaggerUi;

// Wraps `axum::Json` so that body rejections render like every other error.
#[derive(FromRequest)]
#[from_request(via(axum::Json), rejection(AdminError))]
pub struct AppJson<T>(pub T);

impl<T> IntoResponse for AppJson<T>
where
    axum::Json<T>: IntoResponse,
{
    fn into_response(self) -> Response {
        axum::Json(self.0).into_response()
    }
}

#[derive(Serialize, ToSchema)]
pub struct ErrorResponse {
    pub message: String,
    pub code: u16,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub errors: Option<FormErrors>,
}

impl IntoResponse for AdminError {
    fn into_response(self) -> Response {
        let status = self.status_code();
        if status.is_server_error() {
            crate::error!("{}", self);
        }
        let (message, errors) = match self {
            AdminError::JsonRejection(rej) => (rej.body_text(), None),
            AdminError::Validation(errors) => ("Validation failed".to_string(), Some(errors)),
            other                          => (other.to_string(), None),
        };
        (status, AppJson(ErrorResponse { message, code: status.as_u16(), errors })).into_response()
    }
}

#[derive(Clone)]
pub struct AdminState {
    pub admin: Arc<Admin>,
}

#[derive(OpenApi)]
#[openapi(info(title = "adminkit", license(name = "MIT")))]
pub struct ApiDoc;

#[derive(Debug, Clone, PartialEq, Serialize, ToSchema)]
pub struct IndexPage {
    pub title: String,
    pub menu: Menu,
}

/// Submitted field values keyed by form field name.
#[derive(Debug, Deserialize, ToSchema)]
#[schema(value_type = Object)]
pub struct FormInput(pub serde_json::Map<String, serde_json::Value>);

#[derive(Debug, Deserialize, IntoParams)]
#[into_params(parameter_in = Query)]
pub struct AjaxParams {
    /// relation name
    pub name: String,
    #[serde(default)]
    pub term: String,
}

#[derive(Debug, Deserialize, IntoParams)]
#[into_params(parameter_in = Query)]
pub struct DeleteParams {
    /// comma separated identifiers, each URL-encoded
    pub pks: String,
}

fn query_pairs(raw: Option<&str>) -> Result<Vec<(String, String)>, AdminError> {
    serde_urlencoded::from_str(raw.unwrap_or("")).map_err(|e| AdminError::bad_request(format!("invalid query string: {}", e)))
}

/// Identifiers from the undecoded `pks` parameter: split on `,` first, then each one percent-decoded,
/// so identifiers containing commas survive as `%2C`.
pub fn split_pks(raw_query: Option<&str>) -> Result<Vec<String>, AdminError> {
    let raw = raw_query
        .unwrap_or("")
        .split('&')
        .find_map(|pair| pair.strip_prefix("pks="))
        .ok_or_else(|| AdminError::bad_request("missing 'pks' parameter"))?;
    raw.split(',')
        .filter(|segment| !segment.is_empty())
        .map(|segment| {
            urlencoding::decode(&segment.replace('+', " "))
                .map(|pk| pk.into_owned())
                .map_err(|e| AdminError::bad_request(format!("invalid identifier '{}': {}", segment, e)))
        })
        .collect()
}

#[utoipa::path(get, path = "/", responses((status = OK, body = IndexPage)), tag = "admin")]
#[axum::debug_handler]
pub async fn index(State(state): State<AdminState>) -> Result<AppJson<IndexPage>, AdminError> {
    Ok(AppJson(IndexPage { title: state.admin.settings.title.clone(), menu: state.admin.menu().clone() }))
}

#[utoipa::path(
    get,
    path = "/{identity}/list",
    params(("identity" = String, Path, description = "model view identity"), ListParams),
    responses(
        (status = OK, body = ListPage),
        (status = 400, content_type = "application/json", body = ErrorResponse),
        (status = 404, content_type = "application/json", body = ErrorResponse),
    ),
    tag = "admin"
)]
#[axum::debug_handler]
pub async fn list(
    State(state): State<AdminState>,
    Path(identity): Path<String>,
    RawQuery(query): RawQuery,
) -> Result<AppJson<ListPage>, AdminError> {
    let model = state.admin.find(&identity)?;
    let pairs = query_pairs(query.as_deref())?;
    let mut list_url = format!("{}/{}/list", state.admin.settings.mount_path(), identity);
    if let Some(q) = query.as_deref().filter(|q| !q.is_empty()) {
        list_url.push('?');
        list_url.push_str(q);
    }
    model.list(&pairs, &list_url).await.map(AppJson)
}

#[utoipa::path(
    get,
    path = "/{identity}/details/{pk}",
    params(("identity" = String, Path, description = "model view identity"), ("pk" = String, Path, description = "object identifier")),
    responses(
        (status = OK, body = DetailsPage),
        (status = 403, content_type = "application/json", body = ErrorResponse),
        (status = 404, content_type = "application/json", body = ErrorResponse),
    ),
    tag = "admin"
)]
#[axum::debug_handler]
pub async fn details(
    State(state): State<AdminState>,
    Path((identity, pk)): Path<(String, String)>,
) -> Result<AppJson<DetailsPage>, AdminError> {
    state.admin.find(&identity)?.details(&pk).await.map(AppJson)
}

#[utoipa::path(
    get,
    path = "/{identity}/create",
    params(("identity" = String, Path, description = "model view identity")),
    responses((status = OK, body = FormPage), (status = 403, content_type = "application/json", body = ErrorResponse)),
    tag = "admin"
)]
#[axum::debug_handler]
pub async fn create_form(State(state): State<AdminState>, Path(identity): Path<String>) -> Result<AppJson<FormPage>, AdminError> {
    state.admin.find(&identity)?.create_form().map(AppJson)
}

#[utoipa::path(
    post,
    path = "/{identity}/create",
    params(("identity" = String, Path, description = "model view identity")),
    request_body(content = FormInput, content_type = "application/json"),
    responses(
        (status = CREATED, body = SavedObject),
        (status = 403, content_type = "application/json", body = ErrorResponse),
        (status = 409, content_type = "application/json", body = ErrorResponse),
        (status = 422, content_type = "application/json", body = ErrorResponse),
    ),
    tag = "admin"
)]
#[axum::debug_handler]
pub async fn create(
    State(state): State<AdminState>,
    Path(identity): Path<String>,
    AppJson(FormInput(data)): AppJson<FormInput>,
) -> Result<(StatusCode, AppJson<SavedObject>), AdminError> {
    let saved = state.admin.find(&identity)?.create(&data).await?;
    Ok((StatusCode::CREATED, AppJson(saved)))
}

#[utoipa::path(
    get,
    path = "/{identity}/edit/{pk}",
    params(("identity" = String, Path, description = "model view identity"), ("pk" = String, Path, description = "object identifier")),
    responses(
        (status = OK, body = FormPage),
        (status = 403, content_type = "application/json", body = ErrorResponse),
        (status = 404, content_type = "application/json", body = ErrorResponse),
    ),
    tag = "admin"
)]
#[axum::debug_handler]
pub async fn edit_form(
    State(state): State<AdminState>,
    Path((identity, pk)): Path<(String, String)>,
) -> Result<AppJson<FormPage>, AdminError> {
    state.admin.find(&identity)?.edit_form(&pk).await.map(AppJson)
}

#[utoipa::path(
    post,
    path = "/{identity}/edit/{pk}",
    params(("identity" = String, Path, description = "model view identity"), ("pk" = String, Path, description = "object identifier")),
    request_body(content = FormInput, content_type = "application/json"),
    responses(
        (status = OK, body = SavedObject),
        (status = 404, content_type = "application/json", body = ErrorResponse),
        (status = 422, content_type = "application/json", body = ErrorResponse),
    ),
    tag = "admin"
)]
#[axum::debug_handler]
pub async fn edit(
    State(state): State<AdminState>,
    Path((identity, pk)): Path<(String, String)>,
    AppJson(FormInput(data)): AppJson<FormInput>,
) -> Result<AppJson<SavedObject>, AdminError> {
    state.admin.find(&identity)?.edit(&pk, &data).await.map(AppJson)
}

#[utoipa::path(
    delete,
    path = "/{identity}/delete",
    params(("identity" = String, Path, description = "model view identity"), DeleteParams),
    responses(
        (status = OK, body = DeleteResult),
        (status = 400, content_type = "application/json", body = ErrorResponse),
        (status = 403, content_type = "application/json", body = ErrorResponse),
        (status = 404, content_type = "application/json", body = ErrorResponse),
    ),
    tag = "admin"
)]
#[axum::debug_handler]
pub async fn delete(
    State(state): State<AdminState>,
    Path(identity): Path<String>,
    RawQuery(query): RawQuery,
) -> Result<AppJson<DeleteResult>, AdminError> {
    let model = state.admin.find(&identity)?;
    let pks = split_pks(query.as_deref())?;
    model.delete(&pks).await.map(AppJson)
}

#[utoipa::path(
    get,
    path = "/{identity}/export/{export_type}",
    params(
        ("identity" = String, Path, description = "model view identity"),
        ("export_type" = String, Path, description = "csv or json"),
        ListParams
    ),
    responses(
        (status = OK, description = "CSV file or JSON array of records"),
        (status = 400, content_type = "application/json", body = ErrorResponse),
        (status = 403, content_type = "application/json", body = ErrorResponse),
    ),
    tag = "admin"
)]
#[axum::debug_handler]
pub async fn export(
    State(state): State<AdminState>,
    Path((identity, export_type)): Path<(String, String)>,
    RawQuery(query): RawQuery,
) -> Result<Response, AdminError> {
    let model = state.admin.find(&identity)?;
    let pairs = query_pairs(query.as_deref())?;
    let rows = model.export_rows(&export_type, &pairs).await?;
    let disposition = format!("attachment;filename={}", export_filename(&model.view, &export_type));

    let mut response = if export_type == EXPORT_CSV {
        let body = export_csv(&model.view, &rows)?;
        ([(CONTENT_TYPE, HeaderValue::from_static(content_type(&export_type)?))], body).into_response()
    } else {
        let records = model.json_records(&rows);
        axum_streams::StreamBodyAs::json_array(futures::stream::iter(records)).into_response()
    };
    response.headers_mut().insert(CONTENT_DISPOSITION, HeaderValue::from_str(&disposition).map_err(http::Error::from)?);
    Ok(response)
}

#[utoipa::path(
    get,
    path = "/{identity}/ajax/lookup",
    params(("identity" = String, Path, description = "model view identity"), AjaxParams),
    responses(
        (status = OK, body = Vec<AjaxItem>),
        (status = 400, content_type = "application/json", body = ErrorResponse),
    ),
    tag = "admin"
)]
#[axum::debug_handler]
pub async fn ajax_lookup(
    State(state): State<AdminState>,
    Path(identity): Path<String>,
    Query(params): Query<AjaxParams>,
) -> Result<AppJson<Vec<AjaxItem>>, AdminError> {
    state.admin.ajax_lookup(&identity, &params.name, &params.term).await.map(AppJson)
}

pub fn routes() -> OpenApiRouter<AdminState> {
    OpenApiRouter::with_openapi(ApiDoc::openapi())
        .routes(routes!(index))
        .routes(routes!(list))
        .routes(routes!(details))
        .routes(routes!(create_form, create))
        .routes(routes!(edit_form, edit))
        .routes(routes!(delete))
        .routes(routes!(export))
        .routes(routes!(ajax_lookup))
}

/// Admin routes mounted at `settings.base_url`, Swagger UI at `/swagger-ui`.
pub fn build_router(admin: Arc<Admin>, cors: Option<CorsLayer>) -> Router<()> {
    let mount = admin.settings.mount_path().to_string();
    let (router, openapi) = routes().split_for_parts();
    let admin_router = router.with_state(AdminState { admin });

    let mounted = if mount.is_empty() { admin_router } else { Router::new().nest(&mount, admin_router) };
    let merged = mounted.merge(SwaggerUi::new("/swagger-ui").url("/apidoc/openapi.json", openapi));
    if let Some(cors_layer) = cors {
        merged.layer(cors_layer)
    } else {
        merged
    }
}

pub async fn serve(admin: Arc<Admin>, cors: Option<CorsLayer>, shutdown: watch::Receiver<bool>) -> Result<(), AdminError> {
    let socket_addr = admin.settings.http.bind_address;
    let router: Router<()> = build_router(admin, cors);
    let tcp = TcpListener::bind(socket_addr).await?;
    info!("Admin listening on {}", socket_addr);

    let mut shutdown = shutdown.clone();
    axum::serve(tcp, router)
        .with_graceful_shutdown(async move {
            if shutdown.changed().await.is_ok() {
                info!("Shutting down server...");
            }
        })
        .await?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn splits_encoded_pks() {
        assert_eq!(split_pks(Some("pks=1,2")).unwrap(), vec!["1", "2"]);
        assert_eq!(split_pks(Some("x=1&pks=a%2Cb,c%3Bd")).unwrap(), vec!["a,b", "c;d"]);
        assert_eq!(split_pks(Some("pks=")).unwrap(), Vec::<String>::new());
        assert!(split_pks(None).is_err());
    }

    #[test]
    fn errors_render_status_and_message() {
        let response = AdminError::not_found("user '9' not found").into_response();
        assert_eq!(response.status(), StatusCode::NOT_FOUND);
        let response = AdminError::Validation(FormErrors::default()).into_response();
        assert_eq!(response.status(), StatusCode::UNPROCESSABLE_ENTITY);
    }
}
