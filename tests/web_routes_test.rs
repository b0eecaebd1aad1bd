use anyhow::Result;
use axum::body::Body;
use axum::http::{header, Request, StatusCode};
use axum::Router;
use csv_uploader::web::{create_router, AppState};
use csv_uploader::{Credentials, FirebaseStore};
use httpmock::prelude::*;
use serde_json::json;
use std::time::Duration;
use tower::util::ServiceExt;

const BOUNDARY: &str = "csv-uploader-test-boundary";
const PEOPLE_CSV: &[u8] = b"name,age\nAlice,30\nBob,25\n";

enum Part<'a> {
    Text(&'a str, &'a str),
    File(&'a str, &'a str, &'a [u8]),
}

fn multipart_request(uri: &str, parts: &[Part<'_>]) -> Result<Request<Body>> {
    let mut body = Vec::new();
    for part in parts {
        body.extend_from_slice(format!("--{}\r\n", BOUNDARY).as_bytes());
        match part {
            Part::Text(name, value) => {
                body.extend_from_slice(
                    format!("Content-Disposition: form-data; name=\"{}\"\r\n\r\n", name).as_bytes(),
                );
                body.extend_from_slice(value.as_bytes());
            }
            Part::File(name, file_name, data) => {
                body.extend_from_slice(
                    format!(
                        "Content-Disposition: form-data; name=\"{}\"; filename=\"{}\"\r\nContent-Type: text/csv\r\n\r\n",
                        name, file_name
                    )
                    .as_bytes(),
                );
                body.extend_from_slice(data);
            }
        }
        body.extend_from_slice(b"\r\n");
    }
    body.extend_from_slice(format!("--{}--\r\n", BOUNDARY).as_bytes());

    Ok(Request::builder()
        .method("POST")
        .uri(uri)
        .header(
            header::CONTENT_TYPE,
            format!("multipart/form-data; boundary={}", BOUNDARY),
        )
        .body(Body::from(body))?)
}

fn form_request(uri: &str, body: String) -> Result<Request<Body>> {
    Ok(Request::builder()
        .method("POST")
        .uri(uri)
        .header(header::CONTENT_TYPE, "application/x-www-form-urlencoded")
        .body(Body::from(body))?)
}

fn app(server: &MockServer) -> Result<Router> {
    let store = FirebaseStore::connect(&server.url("/"), Credentials::Anonymous)?;
    let state = AppState::new(
        store,
        &server.url("/"),
        5,
        1024 * 1024,
        Duration::from_secs(60),
    );
    Ok(create_router(state))
}

async fn send(app: &Router, request: Request<Body>) -> Result<(StatusCode, String)> {
    let response = app.clone().oneshot(request).await?;
    let status = response.status();
    let body = axum::body::to_bytes(response.into_body(), usize::MAX).await?;
    Ok((status, String::from_utf8(body.to_vec())?))
}

fn extract_batch_id(html: &str) -> Option<String> {
    let marker = r#"name="batch_id" value=""#;
    let start = html.find(marker)? + marker.len();
    let end = start + html[start..].find('"')?;
    Some(html[start..end].to_string())
}

#[tokio::test]
async fn test_index_shows_form_and_help() -> Result<()> {
    let server = MockServer::start();
    let app = app(&server)?;

    let (status, html) = send(
        &app,
        Request::builder().uri("/").body(Body::empty())?,
    )
    .await?;

    assert_eq!(status, StatusCode::OK);
    assert!(html.contains("Firebase CSV Uploader"));
    assert!(html.contains("Please provide all required inputs to proceed with the upload."));
    assert!(html.contains("Need Help?"));
    Ok(())
}

#[tokio::test]
async fn test_preview_then_upload() -> Result<()> {
    let server = MockServer::start();
    let put_mock = server.mock(|when, then| {
        when.method(PUT)
            .path("/data/people.json")
            .json_body(json!([{"name": "Alice", "age": 30}, {"name": "Bob", "age": 25}]));
        then.status(204);
    });
    let app = app(&server)?;

    let (status, html) = send(
        &app,
        multipart_request(
            "/preview",
            &[
                Part::File("file", "people.csv", PEOPLE_CSV),
                Part::Text("root_node", "data/people"),
            ],
        )?,
    )
    .await?;

    assert_eq!(status, StatusCode::OK);
    assert!(html.contains("Data Preview"));
    assert!(html.contains("<td>Alice</td>"));
    assert!(html.contains("<span>Rows</span><strong>2</strong>"));
    assert!(html.contains("<span>Columns</span><strong>2</strong>"));
    put_mock.assert_hits(0);

    let batch_id = extract_batch_id(&html).expect("preview page carries a batch id");
    let (status, html) = send(
        &app,
        form_request("/upload", format!("batch_id={}&root_node=data%2Fpeople", batch_id))?,
    )
    .await?;

    assert_eq!(status, StatusCode::OK);
    assert!(html.contains("Successfully uploaded 2 records to Firebase"));
    assert!(html.contains("Uploaded at: "));
    put_mock.assert();
    Ok(())
}

#[tokio::test]
async fn test_upload_with_blank_root_node_is_rejected_locally() -> Result<()> {
    let server = MockServer::start();
    let put_mock = server.mock(|when, then| {
        when.method(PUT);
        then.status(204);
    });
    let app = app(&server)?;

    let (_, html) = send(
        &app,
        multipart_request(
            "/preview",
            &[
                Part::File("file", "people.csv", PEOPLE_CSV),
                Part::Text("root_node", "data/people"),
            ],
        )?,
    )
    .await?;
    let batch_id = extract_batch_id(&html).expect("preview page carries a batch id");

    let (status, html) = send(
        &app,
        form_request("/upload", format!("batch_id={}&root_node=", batch_id))?,
    )
    .await?;

    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert!(html.contains("Destination path cannot be empty"));
    put_mock.assert_hits(0);
    Ok(())
}

#[tokio::test]
async fn test_preview_without_file_asks_for_inputs() -> Result<()> {
    let server = MockServer::start();
    let app = app(&server)?;

    let (status, html) = send(
        &app,
        multipart_request(
            "/preview",
            &[Part::File("file", "", b""), Part::Text("root_node", "data")],
        )?,
    )
    .await?;

    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert!(html.contains("Please provide all required inputs to proceed with the upload."));
    assert!(!html.contains("Data Preview"));
    Ok(())
}

#[tokio::test]
async fn test_preview_of_malformed_csv_shows_parse_error() -> Result<()> {
    let server = MockServer::start();
    let app = app(&server)?;

    let (status, html) = send(
        &app,
        multipart_request(
            "/preview",
            &[
                Part::File("file", "broken.csv", b"a,b\n1,2\n3,4,5\n"),
                Part::Text("root_node", "data"),
            ],
        )?,
    )
    .await?;

    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert!(html.contains("Error reading CSV file: Expected 2 fields in line 3, saw 3"));
    Ok(())
}

#[tokio::test]
async fn test_upload_of_unknown_batch_asks_to_choose_again() -> Result<()> {
    let server = MockServer::start();
    let app = app(&server)?;

    let (status, html) = send(
        &app,
        form_request(
            "/upload",
            "batch_id=00000000-0000-0000-0000-000000000000&root_node=data".to_string(),
        )?,
    )
    .await?;

    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert!(html.contains("This preview has expired"));
    Ok(())
}

#[tokio::test]
async fn test_api_upload_success() -> Result<()> {
    let server = MockServer::start();
    let put_mock = server.mock(|when, then| {
        when.method(PUT).path("/data/people.json");
        then.status(204);
    });
    let app = app(&server)?;

    let (status, body) = send(
        &app,
        multipart_request(
            "/api/upload",
            &[
                Part::Text("root_node", "data/people"),
                Part::File("file", "people.csv", PEOPLE_CSV),
            ],
        )?,
    )
    .await?;

    put_mock.assert();
    assert_eq!(status, StatusCode::OK);
    let json: serde_json::Value = serde_json::from_str(&body)?;
    assert_eq!(json["status"], "success");
    assert_eq!(json["count"], 2);
    assert_eq!(json["dataset"]["columns"], 2);
    assert!(json["uploaded_at"].is_string());
    Ok(())
}

#[tokio::test]
async fn test_api_upload_store_failure() -> Result<()> {
    let server = MockServer::start();
    server.mock(|when, then| {
        when.method(PUT).path("/locked.json");
        then.status(401).body(r#"{"error" : "Permission denied"}"#);
    });
    let app = app(&server)?;

    let (status, body) = send(
        &app,
        multipart_request(
            "/api/upload",
            &[
                Part::File("file", "people.csv", PEOPLE_CSV),
                Part::Text("root_node", "locked"),
            ],
        )?,
    )
    .await?;

    assert_eq!(status, StatusCode::BAD_GATEWAY);
    let json: serde_json::Value = serde_json::from_str(&body)?;
    assert_eq!(json["status"], "error");
    assert_eq!(json["message"], "Error uploading to Firebase: Permission denied");
    assert!(json.get("count").is_none());
    Ok(())
}

#[tokio::test]
async fn test_api_upload_rejects_empty_path_and_wrong_extension() -> Result<()> {
    let server = MockServer::start();
    let put_mock = server.mock(|when, then| {
        when.method(PUT);
        then.status(204);
    });
    let app = app(&server)?;

    let (status, _) = send(
        &app,
        multipart_request(
            "/api/upload",
            &[
                Part::File("file", "people.csv", PEOPLE_CSV),
                Part::Text("root_node", ""),
            ],
        )?,
    )
    .await?;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let (status, body) = send(
        &app,
        multipart_request(
            "/api/upload",
            &[
                Part::File("file", "people.xlsx", PEOPLE_CSV),
                Part::Text("root_node", "data"),
            ],
        )?,
    )
    .await?;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert!(body.contains("unsupported file extension"));

    put_mock.assert_hits(0);
    Ok(())
}

#[tokio::test]
async fn test_health() -> Result<()> {
    let server = MockServer::start();
    let app = app(&server)?;

    let (status, body) = send(
        &app,
        Request::builder().uri("/api/health").body(Body::empty())?,
    )
    .await?;

    assert_eq!(status, StatusCode::OK);
    let json: serde_json::Value = serde_json::from_str(&body)?;
    assert_eq!(json["status"], "ok");
    Ok(())
}
