//! Web API Folder Tests

mod common;

use axum::http::header::AUTHORIZATION;
use axum::http::StatusCode;
use serde_json::{json, Value};

use common::{bearer, create_folder, create_test_app, error_code, login, upload, upload_ok};

#[tokio::test]
async fn test_create_folder() {
    let app = create_test_app().await;
    let (token, _) = login(&app.server, 1, "Ada").await;

    let response = app
        .server
        .post("/api/v1/folders")
        .add_header(AUTHORIZATION, bearer(&token))
        .json(&json!({ "name": "Photos" }))
        .await;

    response.assert_status(StatusCode::CREATED);
    let body: Value = response.json();
    assert_eq!(body["data"]["name"], "Photos");
    assert!(body["data"]["parent_id"].is_null());
}

#[tokio::test]
async fn test_create_folder_invalid_name() {
    let app = create_test_app().await;
    let (token, _) = login(&app.server, 1, "Ada").await;

    for name in ["", "   "] {
        let response = app
            .server
            .post("/api/v1/folders")
            .add_header(AUTHORIZATION, bearer(&token))
            .json(&json!({ "name": name }))
            .await;
        response.assert_status(StatusCode::BAD_REQUEST);
        assert_eq!(error_code(&response.json::<Value>()), "VALIDATION_ERROR");
    }
}

#[tokio::test]
async fn test_list_nested_folders() {
    let app = create_test_app().await;
    let (token, _) = login(&app.server, 1, "Ada").await;
    let work = create_folder(&app.server, &token, "Work", None).await;
    create_folder(&app.server, &token, "Home", None).await;
    create_folder(&app.server, &token, "Reports", Some(work)).await;
    create_folder(&app.server, &token, "Invoices", Some(work)).await;

    let response = app
        .server
        .get("/api/v1/folders")
        .add_header(AUTHORIZATION, bearer(&token))
        .await;
    response.assert_status_ok();
    let names: Vec<String> = response.json::<Value>()["data"]
        .as_array()
        .unwrap()
        .iter()
        .map(|f| f["name"].as_str().unwrap().to_string())
        .collect();
    assert_eq!(names, vec!["Home", "Work"]);

    let response = app
        .server
        .get("/api/v1/folders")
        .add_header(AUTHORIZATION, bearer(&token))
        .add_query_param("parent_id", work)
        .await;
    let names: Vec<String> = response.json::<Value>()["data"]
        .as_array()
        .unwrap()
        .iter()
        .map(|f| f["name"].as_str().unwrap().to_string())
        .collect();
    assert_eq!(names, vec!["Invoices", "Reports"]);
}

#[tokio::test]
async fn test_folder_tree() {
    let app = create_test_app().await;
    let (token, _) = login(&app.server, 1, "Ada").await;
    let work = create_folder(&app.server, &token, "Work", None).await;
    let reports = create_folder(&app.server, &token, "Reports", Some(work)).await;
    upload(&app.server, &token, "q1.txt", b"q1", Some(reports))
        .await
        .assert_status(StatusCode::CREATED);
    upload_ok(&app.server, &token, "loose.txt", b"loose").await;

    let response = app
        .server
        .get("/api/v1/folders/tree")
        .add_header(AUTHORIZATION, bearer(&token))
        .await;
    response.assert_status_ok();
    let tree = &response.json::<Value>()["data"];

    assert_eq!(tree["files"].as_array().unwrap().len(), 1);
    assert_eq!(tree["files"][0]["filename"], "loose.txt");
    assert_eq!(tree["folders"].as_array().unwrap().len(), 1);
    assert_eq!(tree["folders"][0]["name"], "Work");
    assert_eq!(tree["folders"][0]["children"][0]["name"], "Reports");
    assert_eq!(
        tree["folders"][0]["children"][0]["files"][0]["filename"],
        "q1.txt"
    );
}

#[tokio::test]
async fn test_recent_folders() {
    let app = create_test_app().await;
    let (token, _) = login(&app.server, 1, "Ada").await;
    for name in ["a", "b", "c"] {
        create_folder(&app.server, &token, name, None).await;
    }

    let response = app
        .server
        .get("/api/v1/folders/recent")
        .add_header(AUTHORIZATION, bearer(&token))
        .add_query_param("limit", 2)
        .await;
    response.assert_status_ok();
    assert_eq!(response.json::<Value>()["data"].as_array().unwrap().len(), 2);

    app.server
        .get("/api/v1/folders/recent")
        .add_header(AUTHORIZATION, bearer(&token))
        .add_query_param("limit", -1)
        .await
        .assert_status(StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_rename_and_move_folder() {
    let app = create_test_app().await;
    let (token, _) = login(&app.server, 1, "Ada").await;
    let archive = create_folder(&app.server, &token, "Archive", None).await;
    let old = create_folder(&app.server, &token, "Old", None).await;

    let response = app
        .server
        .put(&format!("/api/v1/folders/{}", old))
        .add_header(AUTHORIZATION, bearer(&token))
        .json(&json!({ "name": "2023", "parent_id": archive }))
        .await;
    response.assert_status_ok();
    let body: Value = response.json();
    assert_eq!(body["data"]["name"], "2023");
    assert_eq!(body["data"]["parent_id"], archive);

    let response = app
        .server
        .put(&format!("/api/v1/folders/{}", old))
        .add_header(AUTHORIZATION, bearer(&token))
        .json(&json!({ "move_to_root": true }))
        .await;
    response.assert_status_ok();
    assert!(response.json::<Value>()["data"]["parent_id"].is_null());
}

#[tokio::test]
async fn test_move_folder_into_descendant() {
    let app = create_test_app().await;
    let (token, _) = login(&app.server, 1, "Ada").await;
    let top = create_folder(&app.server, &token, "Top", None).await;
    let child = create_folder(&app.server, &token, "Child", Some(top)).await;

    let response = app
        .server
        .put(&format!("/api/v1/folders/{}", top))
        .add_header(AUTHORIZATION, bearer(&token))
        .json(&json!({ "parent_id": child }))
        .await;
    response.assert_status(StatusCode::BAD_REQUEST);

    let response = app
        .server
        .put(&format!("/api/v1/folders/{}", top))
        .add_header(AUTHORIZATION, bearer(&token))
        .json(&json!({ "parent_id": top }))
        .await;
    response.assert_status(StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_delete_folder_recursive() {
    let app = create_test_app().await;
    let (token, _) = login(&app.server, 1, "Ada").await;
    let top = create_folder(&app.server, &token, "Top", None).await;
    let child = create_folder(&app.server, &token, "Child", Some(top)).await;
    upload(&app.server, &token, "a.txt", b"aaaa", Some(top))
        .await
        .assert_status(StatusCode::CREATED);
    upload(&app.server, &token, "b.txt", b"bbbbbb", Some(child))
        .await
        .assert_status(StatusCode::CREATED);
    upload_ok(&app.server, &token, "keep.txt", b"kk").await;

    let response = app
        .server
        .delete(&format!("/api/v1/folders/{}", top))
        .add_header(AUTHORIZATION, bearer(&token))
        .await;
    response.assert_status(StatusCode::NO_CONTENT);

    app.server
        .get(&format!("/api/v1/folders/{}", child))
        .add_header(AUTHORIZATION, bearer(&token))
        .await
        .assert_status(StatusCode::NOT_FOUND);

    let response = app
        .server
        .get("/api/v1/users/me/stats")
        .add_header(AUTHORIZATION, bearer(&token))
        .await;
    let stats = &response.json::<Value>()["data"];
    assert_eq!(stats["total_files"], 1);
    assert_eq!(stats["total_folders"], 0);
    assert_eq!(stats["used_space"], 2);
}

#[tokio::test]
async fn test_foreign_folder_access() {
    let app = create_test_app().await;
    let (owner, _) = login(&app.server, 1, "Ada").await;
    let (other, _) = login(&app.server, 2, "Eve").await;
    let folder = create_folder(&app.server, &owner, "Mine", None).await;

    app.server
        .get(&format!("/api/v1/folders/{}", folder))
        .add_header(AUTHORIZATION, bearer(&other))
        .await
        .assert_status(StatusCode::FORBIDDEN);

    app.server
        .delete(&format!("/api/v1/folders/{}", folder))
        .add_header(AUTHORIZATION, bearer(&other))
        .await
        .assert_status(StatusCode::FORBIDDEN);

    let response = app
        .server
        .post("/api/v1/folders")
        .add_header(AUTHORIZATION, bearer(&other))
        .json(&json!({ "name": "Sneaky", "parent_id": folder }))
        .await;
    response.assert_status(StatusCode::FORBIDDEN);

    app.server
        .get("/api/v1/folders/999999")
        .add_header(AUTHORIZATION, bearer(&owner))
        .await
        .assert_status(StatusCode::NOT_FOUND);
}
