//! End-to-end tests of the HTTP surface, driven through the router with `oneshot`

mod common;

use axum::body::Body;
use axum::http::{Method, Request, StatusCode};
use serde_json::json;
use tempfile::TempDir;

use common::*;

// ---- /validate ----

#[tokio::test]
async fn test_validate_clean_document() {
    let temp_dir = TempDir::new().unwrap();
    let app = test_app(test_config(temp_dir.path()));

    let response = send(&app, post_form("/validate", &valid_drum_kit())).await;

    assert_eq!(response.status, StatusCode::OK);
    assert_eq!(response.json(), json!({"valid": true, "errors": []}));
}

#[tokio::test]
async fn test_validate_unparseable_input() {
    let temp_dir = TempDir::new().unwrap();
    let app = test_app(test_config(temp_dir.path()));

    let response = send(&app, post_form("/validate", "<MIDINameDocument><Author>")).await;

    assert_eq!(response.status, StatusCode::OK);
    assert_eq!(
        response.json(),
        json!({"valid": false, "errors": ["Invalid XML structure"]})
    );
}

#[tokio::test]
async fn test_validate_reports_duplicate_once() {
    let temp_dir = TempDir::new().unwrap();
    let app = test_app(test_config(temp_dir.path()));

    let xml = drum_kit(
        r#"      <Note Number="1" Name="Kick"/>
      <Note Number="1" Name="Snare"/>"#,
    );
    let response = send(&app, post_form("/validate", &xml)).await;

    assert_eq!(response.status, StatusCode::OK);
    assert_eq!(
        response.json(),
        json!({"valid": false, "errors": ["Duplicate note number: 1 in Standard Kit"]})
    );
}

#[tokio::test]
async fn test_validate_echoes_invalid_numbers() {
    let temp_dir = TempDir::new().unwrap();
    let app = test_app(test_config(temp_dir.path()));

    let xml = drum_kit(
        r#"      <Note Number="abc" Name="Kick"/>
      <Note Number="" Name="Snare"/>
      <Note Number="40"/>"#,
    );
    let response = send(&app, post_form("/validate", &xml)).await;

    assert_eq!(
        response.json(),
        json!({
            "valid": false,
            "errors": [
                "Invalid note number: abc",
                "Invalid note number: ",
                "Empty note name for note 40"
            ]
        })
    );
}

#[tokio::test]
async fn test_validate_reports_dtd_errors_with_lines() {
    let temp_dir = TempDir::new().unwrap();
    let app = test_app(test_config(temp_dir.path()));

    let xml = drum_kit(
        r#"      <Note Number="36" Name="Kick"/>
      <Cowbell/>"#,
    );
    let response = send(&app, post_form("/validate", &xml)).await;
    let body = response.json();

    assert_eq!(body["valid"], json!(false));
    let errors = body["errors"].as_array().unwrap();
    assert!(!errors.is_empty());
    assert!(
        errors
            .iter()
            .all(|e| e.as_str().unwrap().starts_with("Line ")),
        "errors: {errors:?}"
    );
    assert!(
        errors
            .iter()
            .any(|e| e.as_str().unwrap().contains("Cowbell"))
    );
}

#[tokio::test]
async fn test_validate_without_xml_field() {
    let temp_dir = TempDir::new().unwrap();
    let app = test_app(test_config(temp_dir.path()));

    let response = send(&app, post_form("/validate", "")).await;
    assert_eq!(response.status, StatusCode::BAD_REQUEST);
    assert_eq!(response.json(), json!({"error": "No XML data provided"}));

    let request = Request::builder()
        .method(Method::POST)
        .uri("/validate")
        .body(Body::empty())
        .unwrap();
    let response = send(&app, request).await;
    assert_eq!(response.status, StatusCode::BAD_REQUEST);
    assert_eq!(response.json(), json!({"error": "No XML data provided"}));
}

#[tokio::test]
async fn test_repeated_xml_field_uses_last_value() {
    let temp_dir = TempDir::new().unwrap();
    let app = test_app(test_config(temp_dir.path()));

    let body = format!("{}&{}", form_body("<broken"), form_body(&valid_drum_kit()));
    let request = Request::builder()
        .method(Method::POST)
        .uri("/validate")
        .header("content-type", "application/x-www-form-urlencoded")
        .body(Body::from(body))
        .unwrap();
    let response = send(&app, request).await;

    assert_eq!(response.status, StatusCode::OK);
    assert_eq!(response.json(), json!({"valid": true, "errors": []}));
}

#[tokio::test]
async fn test_validate_rejects_get() {
    let temp_dir = TempDir::new().unwrap();
    let app = test_app(test_config(temp_dir.path()));

    let response = send(&app, get("/validate")).await;

    assert_eq!(response.status, StatusCode::METHOD_NOT_ALLOWED);
    assert_eq!(response.json(), json!({"error": "Method not allowed"}));
}

// ---- /save and /load ----

#[tokio::test]
async fn test_save_then_load_round_trip() {
    let temp_dir = TempDir::new().unwrap();
    let config = test_config(temp_dir.path());
    let app = test_app(config.clone());

    let xml = valid_drum_kit();
    let response = send(&app, post_form("/save", &xml)).await;

    assert_eq!(response.status, StatusCode::OK);
    assert_eq!(response.json(), json!({"success": true, "backup": null}));

    let response = send(&app, get("/load")).await;
    assert_eq!(response.status, StatusCode::OK);
    assert_eq!(response.header("content-type"), Some("application/xml"));
    assert_eq!(response.text(), xml);
}

#[tokio::test]
async fn test_save_backs_up_previous_document() {
    let temp_dir = TempDir::new().unwrap();
    let config = test_config(temp_dir.path());
    let path = document_path(&config);
    let app = test_app(config);

    let first = valid_drum_kit();
    let second = drum_kit(r#"      <Note Number="49" Name="Crash"/>"#);

    send(&app, post_form("/save", &first)).await;
    let response = send(&app, post_form("/save", &second)).await;

    assert_eq!(response.status, StatusCode::OK);
    let body = response.json();
    assert_eq!(body["success"], json!(true));

    let backup = body["backup"].as_str().expect("backup path");
    let prefix = format!("{}.backup.", path.display());
    assert!(backup.starts_with(&prefix), "backup: {backup}");
    assert_eq!(backup.len(), prefix.len() + "YYYY-mm-dd-HH-MM-SS".len());

    assert_eq!(std::fs::read_to_string(backup).unwrap(), first);
    assert_eq!(std::fs::read_to_string(&path).unwrap(), second);
}

#[tokio::test]
async fn test_save_empty_leaves_document_unchanged() {
    let temp_dir = TempDir::new().unwrap();
    let config = test_config(temp_dir.path());
    let path = document_path(&config);
    let app = test_app(config);

    let xml = valid_drum_kit();
    send(&app, post_form("/save", &xml)).await;

    let response = send(&app, post_form("/save", "")).await;

    assert_eq!(response.status, StatusCode::BAD_REQUEST);
    assert_eq!(response.json(), json!({"error": "No XML data provided"}));
    assert_eq!(std::fs::read_to_string(&path).unwrap(), xml);
}

#[tokio::test]
async fn test_save_rejects_malformed_xml() {
    let temp_dir = TempDir::new().unwrap();
    let config = test_config(temp_dir.path());
    let path = document_path(&config);
    let app = test_app(config);

    let response = send(&app, post_form("/save", "<MIDINameDocument>")).await;

    assert_eq!(response.status, StatusCode::BAD_REQUEST);
    assert_eq!(response.json(), json!({"error": "Invalid XML"}));
    assert!(!path.exists());
}

#[tokio::test]
async fn test_save_accepts_dtd_invalid_but_well_formed_xml() {
    let temp_dir = TempDir::new().unwrap();
    let config = test_config(temp_dir.path());
    let path = document_path(&config);
    let app = test_app(config);

    let xml = "<Unrelated><Note Number=\"1\"/><Note Number=\"1\"/></Unrelated>";
    let response = send(&app, post_form("/save", xml)).await;

    assert_eq!(response.status, StatusCode::OK);
    assert_eq!(std::fs::read_to_string(&path).unwrap(), xml);
}

#[tokio::test]
async fn test_save_rejects_get() {
    let temp_dir = TempDir::new().unwrap();
    let app = test_app(test_config(temp_dir.path()));

    let response = send(&app, get("/save")).await;

    assert_eq!(response.status, StatusCode::METHOD_NOT_ALLOWED);
    assert_eq!(response.json(), json!({"error": "Method not allowed"}));
}

#[tokio::test]
async fn test_load_missing_document() {
    let temp_dir = TempDir::new().unwrap();
    let app = test_app(test_config(temp_dir.path()));

    let response = send(&app, get("/load")).await;

    assert_eq!(response.status, StatusCode::NOT_FOUND);
    assert_eq!(response.header("content-type"), Some("application/xml"));
    assert_eq!(
        response.text(),
        r#"<?xml version="1.0" encoding="UTF-8"?><error>File not found</error>"#
    );
}

#[tokio::test]
async fn test_load_unreadable_document() {
    let temp_dir = TempDir::new().unwrap();
    let config = test_config(temp_dir.path());
    // A directory where the document should be cannot be read as a file
    std::fs::create_dir_all(document_path(&config)).unwrap();
    let app = test_app(config);

    let response = send(&app, get("/load")).await;

    assert_eq!(response.status, StatusCode::INTERNAL_SERVER_ERROR);
    assert_eq!(
        response.text(),
        r#"<?xml version="1.0" encoding="UTF-8"?><error>Failed to read file</error>"#
    );
}

#[cfg(unix)]
#[tokio::test]
async fn test_save_into_unwritable_location() {
    let temp_dir = TempDir::new().unwrap();
    let mut config = test_config(temp_dir.path());
    // Parent directory is a dangling symlink
    let dangling = temp_dir.path().join("Alesis");
    std::os::unix::fs::symlink(temp_dir.path().join("gone"), &dangling).unwrap();
    config.storage.document_path = dangling.join("D4.midnam");
    let app = test_app(config);

    let response = send(&app, post_form("/save", &valid_drum_kit())).await;

    assert_eq!(response.status, StatusCode::INTERNAL_SERVER_ERROR);
    assert_eq!(response.json(), json!({"error": "Failed to save file"}));
}

#[tokio::test]
async fn test_save_when_existing_document_cannot_be_checked() {
    let temp_dir = TempDir::new().unwrap();
    let mut config = test_config(temp_dir.path());
    // Parent "directory" is a regular file
    let blocker = temp_dir.path().join("blocker");
    std::fs::write(&blocker, "not a directory").unwrap();
    config.storage.document_path = blocker.join("D4.midnam");
    let app = test_app(config);

    let response = send(&app, post_form("/save", &valid_drum_kit())).await;

    assert_eq!(response.status, StatusCode::INTERNAL_SERVER_ERROR);
    assert_eq!(response.json(), json!({"error": "Failed to create backup"}));
}

#[tokio::test]
async fn test_load_rejects_post() {
    let temp_dir = TempDir::new().unwrap();
    let app = test_app(test_config(temp_dir.path()));

    let response = send(&app, post_form("/load", "<a/>")).await;

    assert_eq!(response.status, StatusCode::METHOD_NOT_ALLOWED);
    assert_eq!(response.json(), json!({"error": "Method not allowed"}));
}

// ---- legacy paths ----

#[tokio::test]
async fn test_legacy_php_paths() {
    let temp_dir = TempDir::new().unwrap();
    let app = test_app(test_config(temp_dir.path()));
    let xml = valid_drum_kit();

    let response = send(&app, post_form("/validate_d4.php", &xml)).await;
    assert_eq!(response.json(), json!({"valid": true, "errors": []}));

    let response = send(&app, post_form("/save_d4.php", &xml)).await;
    assert_eq!(response.status, StatusCode::OK);

    let response = send(&app, get("/load_d4.php")).await;
    assert_eq!(response.status, StatusCode::OK);
    assert_eq!(response.text(), xml);
}

// ---- CORS, OPTIONS and ambient behaviour ----

#[tokio::test]
async fn test_cors_preflight_allows_only_route_method() {
    let temp_dir = TempDir::new().unwrap();
    let app = test_app(test_config(temp_dir.path()));

    for (uri, method) in [("/save", "POST"), ("/validate", "POST"), ("/load", "GET")] {
        let request = Request::builder()
            .method(Method::OPTIONS)
            .uri(uri)
            .header("origin", "http://editor.example")
            .header("access-control-request-method", method)
            .header("access-control-request-headers", "content-type")
            .body(Body::empty())
            .unwrap();

        let response = send(&app, request).await;

        assert_eq!(response.status, StatusCode::OK, "{uri}");
        assert_eq!(response.header("access-control-allow-origin"), Some("*"));
        assert_eq!(response.header("access-control-allow-methods"), Some(method));
        assert_eq!(
            response.header("access-control-allow-headers"),
            Some("content-type")
        );
    }
}

#[tokio::test]
async fn test_plain_options_returns_ok() {
    let temp_dir = TempDir::new().unwrap();
    let app = test_app(test_config(temp_dir.path()));

    for uri in ["/load", "/save", "/validate", "/save_d4.php"] {
        let request = Request::builder()
            .method(Method::OPTIONS)
            .uri(uri)
            .body(Body::empty())
            .unwrap();

        let response = send(&app, request).await;
        assert_eq!(response.status, StatusCode::OK, "{uri}");
        assert!(response.body.is_empty());
    }
}

#[tokio::test]
async fn test_cors_header_on_simple_request() {
    let temp_dir = TempDir::new().unwrap();
    let app = test_app(test_config(temp_dir.path()));

    let request = Request::builder()
        .method(Method::POST)
        .uri("/validate")
        .header("origin", "http://editor.example")
        .header("content-type", "application/x-www-form-urlencoded")
        .body(Body::from(form_body(&valid_drum_kit())))
        .unwrap();

    let response = send(&app, request).await;
    assert_eq!(response.status, StatusCode::OK);
    assert_eq!(response.header("access-control-allow-origin"), Some("*"));
}

#[tokio::test]
async fn test_request_id_header() {
    let temp_dir = TempDir::new().unwrap();
    let app = test_app(test_config(temp_dir.path()));

    let response = send(&app, get("/load")).await;
    let generated = response.header("x-request-id").expect("request id");
    assert!(uuid::Uuid::parse_str(generated).is_ok());

    let request = Request::builder()
        .uri("/load")
        .header("x-request-id", "client-42")
        .body(Body::empty())
        .unwrap();
    let response = send(&app, request).await;
    assert_eq!(response.header("x-request-id"), Some("client-42"));
}

#[tokio::test]
async fn test_body_limit() {
    let temp_dir = TempDir::new().unwrap();
    let mut config = test_config(temp_dir.path());
    config.server.max_body_bytes = 256;
    let app = test_app(config);

    let response = send(&app, post_form("/save", &valid_drum_kit())).await;

    assert_eq!(response.status, StatusCode::PAYLOAD_TOO_LARGE);
    assert_eq!(response.json(), json!({"error": "Request body too large"}));
}

#[tokio::test]
async fn test_unknown_path_without_static_dir() {
    let temp_dir = TempDir::new().unwrap();
    let app = test_app(test_config(temp_dir.path()));

    let response = send(&app, get("/index.html")).await;
    assert_eq!(response.status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_static_files_are_served() {
    let temp_dir = TempDir::new().unwrap();
    let static_dir = temp_dir.path().join("web");
    std::fs::create_dir_all(&static_dir).unwrap();
    std::fs::write(static_dir.join("index.html"), "<h1>D4 editor</h1>").unwrap();
    std::fs::write(static_dir.join("app.js"), "console.log('d4');").unwrap();

    let mut config = test_config(temp_dir.path());
    config.server.static_dir = Some(static_dir);
    let app = test_app(config);

    let response = send(&app, get("/")).await;
    assert_eq!(response.status, StatusCode::OK);
    assert_eq!(response.text(), "<h1>D4 editor</h1>");

    let response = send(&app, get("/app.js")).await;
    assert_eq!(response.status, StatusCode::OK);
    assert_eq!(response.text(), "console.log('d4');");

    // API routes still win over the static fallback
    let response = send(&app, get("/load")).await;
    assert_eq!(response.status, StatusCode::NOT_FOUND);
    assert_eq!(response.header("content-type"), Some("application/xml"));
}
