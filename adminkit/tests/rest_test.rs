use adminkit::rest::build_router;
use adminkit::rusqlite::Connection;
use adminkit::{Admin, AdminSettings, AjaxOptions, Column, ModelMeta, ModelView, Relation, Row, SqliteStore};
use axum_test::TestServer;
use http::StatusCode;
use serde_json::{json, Value};
use std::sync::{Arc, Mutex};

fn team_meta() -> ModelMeta {
    ModelMeta::new("Team", "teams")
        .column(Column::integer("id").primary_key().autoincrement())
        .column(Column::text("name").max_length(32).not_null())
}

fn user_meta() -> ModelMeta {
    ModelMeta::new("User", "users")
        .column(Column::integer("id").primary_key().autoincrement())
        .column(Column::text("name").max_length(32).not_null())
        .column(Column::boolean("active").not_null())
        .column(Column::integer("team_id"))
        .relation(Relation::many_to_one("team", "teams", "team_id", "id"))
}

fn membership_meta() -> ModelMeta {
    ModelMeta::new("Membership", "memberships")
        .column(Column::text("org").primary_key())
        .column(Column::text("login").primary_key())
        .column(Column::text("role").choices(["owner", "member"]))
}

fn row(value: Value) -> Row {
    value.as_object().cloned().unwrap()
}

async fn server() -> TestServer {
    let conn = Arc::new(Mutex::new(Connection::open_in_memory().unwrap()));
    let teams = SqliteStore::new(Arc::clone(&conn), team_meta());
    let users = SqliteStore::new(Arc::clone(&conn), user_meta());
    let memberships = SqliteStore::new(conn, membership_meta());
    for store in [&teams, &users, &memberships] {
        store.create_table().await.unwrap();
    }
    use adminkit::ModelStore;
    for name in ["Red", "Blue"] {
        teams.insert(row(json!({"name": name}))).await.unwrap();
    }
    for (i, name) in ["Ann", "Bob", "Cid", "Dee", "Eve", "Fay", "Gus"].iter().enumerate() {
        users.insert(row(json!({"name": name, "active": i % 2 == 0, "team_id": 1 + i % 2}))).await.unwrap();
    }
    memberships.insert(row(json!({"org": "acme;labs", "login": "ann", "role": "owner"}))).await.unwrap();
    memberships.insert(row(json!({"org": "acme", "login": "bob\\x", "role": "member"}))).await.unwrap();

    let mut admin = Admin::new(AdminSettings { title: "Test admin".into(), page_size: 3, ..AdminSettings::default() });
    admin.add_view(ModelView::new(team_meta()).category("Accounts"), Arc::new(teams)).unwrap();
    admin
        .add_view(
            ModelView::new(user_meta())
                .category("Accounts")
                .column_list(["id", "name", "active", "team"])
                .column_searchable_list(["name", "team.name"])
                .column_sortable_list(["name", "team.name"])
                .column_filters(["active"])
                .column_label("name", "Full name")
                .form_excluded_columns(["team_id"])
                .form_ajax_ref("team", AjaxOptions::new(["name"]))
                .use_pretty_export(true),
            Arc::new(users),
        )
        .unwrap();
    admin.add_view(ModelView::new(membership_meta()).read_only(), Arc::new(memberships)).unwrap();

    TestServer::new(build_router(Arc::new(admin), None)).unwrap()
}

#[tokio::test]
async fn index_lists_menu() {
    let server = server().await;
    let response = server.get("/admin").await;
    response.assert_status_ok();
    let body: Value = response.json();
    assert_eq!(body["title"], json!("Test admin"));
    assert_eq!(body["menu"]["items"][0]["type"], json!("Category"));
    assert_eq!(body["menu"]["items"][0]["children"][1]["url"], json!("/admin/user/list"));
    assert_eq!(body["menu"]["items"][1]["identity"], json!("membership"));
}

#[tokio::test]
async fn list_pages_sorts_and_searches() {
    let server = server().await;
    let body: Value = server.get("/admin/user/list").add_query_param("page", 3).await.json();
    assert_eq!(body["count"], json!(7));
    assert_eq!(body["total_pages"], json!(3));
    assert_eq!(body["rows"].as_array().unwrap().len(), 1);
    assert_eq!(body["rows"][0]["pk"], json!("7"));
    assert_eq!(body["columns"][1]["label"], json!("Full name"));
    let numbers: Vec<_> = body["page_controls"].as_array().unwrap().iter().map(|c| c["number"].as_u64().unwrap()).collect();
    assert_eq!(numbers, vec![1, 2, 3]);
    assert_eq!(body["page_controls"][0]["url"], json!("/admin/user/list?page=1"));

    let body: Value = server.get("/admin/user/list?search=blu&sortBy=name&sort=desc").await.json();
    let names: Vec<_> = body["rows"].as_array().unwrap().iter().map(|r| r["values"]["name"].clone()).collect();
    assert_eq!(names, vec![json!("Fay"), json!("Dee"), json!("Bob")]);
    assert_eq!(body["rows"][0]["values"]["team"]["name"], json!("Blue"));

    let body: Value = server.get("/admin/user/list?filter=active:eq:true&page_size=25").await.json();
    assert_eq!(body["count"], json!(4));
    assert_eq!(body["page_size"], json!(25));
}

#[tokio::test]
async fn list_rejects_bad_parameters() {
    let server = server().await;
    server.get("/admin/user/list?sortBy=id").await.assert_status(StatusCode::BAD_REQUEST);
    server.get("/admin/user/list?page=x").await.assert_status(StatusCode::BAD_REQUEST);
    server.get("/admin/user/list?page=18446744073709551615").await.assert_status(StatusCode::BAD_REQUEST);
    server.get("/admin/user/list?filter=name:eq:Ann").await.assert_status(StatusCode::BAD_REQUEST);
    let response = server.get("/admin/nobody/list").await;
    response.assert_status(StatusCode::NOT_FOUND);
    assert_eq!(response.json::<Value>()["code"], json!(404));
}

#[tokio::test]
async fn composite_identifiers_round_trip_through_urls() {
    let server = server().await;
    let body: Value = server.get("/admin/membership/list").await.json();
    let pks: Vec<_> = body["rows"].as_array().unwrap().iter().map(|r| r["pk"].as_str().unwrap().to_string()).collect();
    assert_eq!(pks, vec!["acme;bob\\\\x", "acme\\;labs;ann"]);

    let encoded = urlencoding::encode(&pks[1]).into_owned();
    let body: Value = server.get(&format!("/admin/membership/details/{}", encoded)).await.json();
    assert_eq!(body["values"]["org"], json!("acme;labs"));
    assert_eq!(body["values"]["role"], json!("owner"));

    server.get("/admin/membership/details/acme").await.assert_status(StatusCode::BAD_REQUEST);
    server.get("/admin/membership/details/acme;nobody").await.assert_status(StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn create_edit_and_validate() {
    let server = server().await;
    let form: Value = server.get("/admin/user/create").await.json();
    let fields: Vec<_> = form["form"]["fields"].as_array().unwrap().iter().map(|f| f["name"].clone()).collect();
    assert_eq!(fields, vec![json!("name"), json!("active"), json!("team")]);
    assert_eq!(form["form"]["fields"][2]["widget"], json!({"kind": "ajax_select", "relation": "team", "multiple": false}));

    let response = server.post("/admin/user/create").json(&json!({"name": "Hal", "active": "on", "team": "2"})).await;
    response.assert_status(StatusCode::CREATED);
    let saved: Value = response.json();
    assert_eq!(saved["pk"], json!("8"));
    assert_eq!(saved["values"]["active"], json!(true));
    assert_eq!(saved["values"]["team"]["name"], json!("Blue"));

    let response = server.post("/admin/user/create").json(&json!({"name": "x".repeat(40)})).await;
    response.assert_status(StatusCode::UNPROCESSABLE_ENTITY);
    let errors: Value = response.json();
    assert_eq!(errors["errors"]["errors"]["name"][0], json!("Field cannot be longer than 32 characters."));

    let form: Value = server.get("/admin/user/edit/8").await.json();
    assert_eq!(form["values"]["team"], json!(2));
    let saved: Value = server.post("/admin/user/edit/8").json(&json!({"name": "Hank", "team": "1"})).await.json();
    assert_eq!(saved["values"]["name"], json!("Hank"));
    assert_eq!(saved["values"]["active"], json!(false));
    assert_eq!(saved["values"]["team_id"], json!(1));

    server.post("/admin/user/edit/99").json(&json!({"name": "Nobody"})).await.assert_status(StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn permissions_are_enforced() {
    let server = server().await;
    server.get("/admin/membership/create").await.assert_status(StatusCode::FORBIDDEN);
    server.post("/admin/membership/create").json(&json!({"org": "x", "login": "y"})).await.assert_status(StatusCode::FORBIDDEN);
    server.get("/admin/membership/edit/acme;ann").await.assert_status(StatusCode::FORBIDDEN);
    server.delete("/admin/membership/delete?pks=acme;ann").await.assert_status(StatusCode::FORBIDDEN);
}

#[tokio::test]
async fn delete_many() {
    let server = server().await;
    let body: Value = server.delete("/admin/user/delete?pks=1,2,42").await.json();
    assert_eq!(body["deleted"], json!(2));
    server.get("/admin/user/details/1").await.assert_status(StatusCode::NOT_FOUND);
    server.delete("/admin/user/delete?pks=1").await.assert_status(StatusCode::NOT_FOUND);
    server.delete("/admin/user/delete?pks=one").await.assert_status(StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn exports_csv_and_json() {
    let server = server().await;
    let response = server.get("/admin/user/export/csv?filter=active:eq:false").await;
    response.assert_status_ok();
    let disposition = response.header("content-disposition");
    let disposition = disposition.to_str().unwrap();
    assert!(disposition.starts_with("attachment;filename=user_"));
    assert!(disposition.ends_with(".csv"));
    assert_eq!(response.text(), "id,Full name,active,team\n2,Bob,FALSE,2 Blue\n4,Dee,FALSE,2 Blue\n6,Fay,FALSE,2 Blue\n");

    let response = server.get("/admin/user/export/json?search=red").await;
    response.assert_status_ok();
    let records: Value = serde_json::from_str(&response.text()).unwrap();
    assert_eq!(records.as_array().unwrap().len(), 4);
    assert_eq!(records[0]["Full name"], json!("Ann"));

    server.get("/admin/user/export/xlsx").await.assert_status(StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn ajax_lookup_formats_targets() {
    let server = server().await;
    let items: Value = server.get("/admin/user/ajax/lookup?name=team&term=re").await.json();
    assert_eq!(items, json!([{"id": "1", "text": "Red"}]));
    server.get("/admin/user/ajax/lookup?name=owner&term=x").await.assert_status(StatusCode::BAD_REQUEST);
}
