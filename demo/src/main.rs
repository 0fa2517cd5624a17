use adminkit::rusqlite::Connection;
use serde_json::{json, Value};
use adminkit::{info, rest, Admin, AdminError, AdminSettings, AjaxOptions, Column, ListQuery, ModelMeta, ModelStore, ModelView, Relation, Row, SqliteStore};
use std::env;
use std::sync::{Arc, Mutex};
use tokio::sync::watch;
use tower_http::cors::{self, CorsLayer};

fn team_meta() -> ModelMeta {
    ModelMeta::new("Team", "teams")
        .column(Column::integer("id").primary_key().autoincrement())
        .column(Column::text("name").max_length(64).not_null())
        .column(Column::datetime("created_at"))
        .relation(Relation::one_to_many("members", "users", "id", "team_id"))
}

fn user_meta() -> ModelMeta {
    ModelMeta::new("User", "users")
        .column(Column::integer("id").primary_key().autoincrement())
        .column(Column::text("name").max_length(64).not_null())
        .column(Column::text("email").max_length(128))
        .column(Column::boolean("active").not_null())
        .column(Column::text("role").choices(["admin", "staff", "guest"]))
        .column(Column::date("born"))
        .column(Column::text("bio"))
        .column(Column::integer("team_id"))
        .relation(Relation::many_to_one("team", "teams", "team_id", "id"))
}

fn membership_meta() -> ModelMeta {
    ModelMeta::new("Membership", "memberships")
        .column(Column::text("org").primary_key())
        .column(Column::text("login").primary_key())
        .column(Column::float("share"))
        .column(Column::json("settings"))
}

fn row(value: Value) -> Row {
    match value {
        Value::Object(map) => map,
        _ => Row::new(),
    }
}

async fn seed(teams: &SqliteStore, users: &SqliteStore, memberships: &SqliteStore) -> Result<(), AdminError> {
    for store in [teams, users, memberships] {
        store.create_table().await?;
    }
    if teams.count(&ListQuery::all()).await? > 0 {
        return Ok(());
    }
    for name in ["Platform", "Billing", "Support"] {
        teams.insert(row(json!({"name": name, "created_at": "2024-01-15T09:30:00"}))).await?;
    }
    let people = [("Ann", "admin"), ("Bob", "staff"), ("Cid", "staff"), ("Dee", "guest"), ("Eve", "staff"), ("Fay", "admin")];
    for (i, (name, role)) in people.iter().enumerate() {
        let email = format!("{}@example.com", name.to_lowercase());
        users
            .insert(row(json!({"name": name, "email": email, "active": i % 3 != 0, "role": role, "born": "1990-05-01", "team_id": 1 + i % 3})))
            .await?;
    }
    memberships.insert(row(json!({"org": "acme;labs", "login": "ann", "share": 0.5, "settings": {"theme": "dark"}}))).await?;
    memberships.insert(row(json!({"org": "acme", "login": "bob", "share": 0.25}))).await?;
    info!("Seeded demo data");
    Ok(())
}

fn build_admin(settings: AdminSettings, teams: SqliteStore, users: SqliteStore, memberships: SqliteStore) -> Result<Admin, AdminError> {
    let mut admin = Admin::new(settings);
    admin.add_view(
        ModelView::new(team_meta())
            .category("Accounts")
            .column_list(["id", "name", "created_at"])
            .column_details_list(["id", "name", "created_at", "members"])
            .column_searchable_list(["name"])
            .column_sortable_list(["name", "created_at"])
            .form_excluded_columns(["members"]),
        Arc::new(teams),
    )?;
    admin.add_view(
        ModelView::new(user_meta())
            .category("Accounts")
            .column_list(["id", "name", "email", "active", "role", "team"])
            .column_searchable_list(["name", "email", "team.name"])
            .column_sortable_list(["name", "email", "role", "team.name"])
            .column_default_sort("name", false)
            .column_filters(["active", "role"])
            .column_label("born", "Date of birth")
            .form_excluded_columns(["team_id"])
            .form_ajax_ref("team", AjaxOptions::new(["name"]).limit(5))
            .export_types(["csv", "json"])
            .use_pretty_export(true),
        Arc::new(users),
    )?;
    admin.add_view(ModelView::new(membership_meta()).icon("fa-link"), Arc::new(memberships))?;
    Ok(admin)
}

#[tokio::main]
async fn main() -> Result<(), AdminError> {
    let settings = AdminSettings::new("config/settings")?;
    let conn = match env::var("ADMINKIT_DEMO_DB") {
        Ok(path) => {
            info!("Opening database {}", path);
            Connection::open(path)?
        }
        Err(_) => Connection::open_in_memory()?,
    };
    let conn = Arc::new(Mutex::new(conn));
    let teams = SqliteStore::new(Arc::clone(&conn), team_meta());
    let users = SqliteStore::new(Arc::clone(&conn), user_meta());
    let memberships = SqliteStore::new(conn, membership_meta());
    seed(&teams, &users, &memberships).await?;

    if !settings.http.enable {
        info!("HTTP server is disabled, skipping");
        return Ok(());
    }
    let cors = settings.http.cors.then(|| {
        CorsLayer::new().allow_origin(cors::Any).allow_methods(cors::Any).allow_headers(cors::Any)
    });
    let admin = Arc::new(build_admin(settings, teams, users, memberships)?);

    let (shutdown_tx, shutdown_rx) = watch::channel(false);
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            info!("Received SIGINT, shutting down...");
            let _ = shutdown_tx.send(true);
        }
    });
    rest::serve(admin, cors, shutdown_rx).await
}
