//! End-to-end tests for the HTTP surface.

use std::time::Duration;

use axum::body::Body;
use axum::http::{header, Request, StatusCode};
use axum::response::Response;
use axum::Router;
use docfeed_core::{Document, DocumentStore};
use docfeed_gateway::{create_router, AppState, GatewayConfig};
use http_body_util::BodyExt;
use tower::ServiceExt;

fn test_state() -> AppState {
    let config = GatewayConfig {
        temporary: true,
        poll_interval: Duration::from_millis(20),
        ..Default::default()
    };
    let store = DocumentStore::open(config.storage_config()).unwrap();
    store.create_collection(&config.collection).unwrap();
    AppState::new(store, config)
}

async fn send(app: &Router, method: &str, uri: &str, body: Body) -> Response {
    app.clone()
        .oneshot(
            Request::builder()
                .method(method)
                .uri(uri)
                .header(header::CONTENT_TYPE, "application/json")
                .body(body)
                .unwrap(),
        )
        .await
        .unwrap()
}

async fn body_string(response: Response) -> String {
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    String::from_utf8(bytes.to_vec()).unwrap()
}

/// Read one streamed line from a change feed body.
async fn next_line(body: &mut Body) -> String {
    let frame = tokio::time::timeout(Duration::from_secs(2), body.frame())
        .await
        .expect("timed out waiting for a change")
        .expect("stream ended")
        .unwrap();
    let data = frame.into_data().unwrap();
    String::from_utf8(data.to_vec()).unwrap()
}

async fn wait_for_sessions(state: &AppState, expected: usize) {
    for _ in 0..100 {
        if state.active_sessions() == expected {
            return;
        }
        tokio::time::sleep(Duration::from_millis(20)).await;
    }
    panic!(
        "expected {} active sessions, found {}",
        expected,
        state.active_sessions()
    );
}

#[tokio::test]
async fn test_create_then_get() {
    let app = create_router(test_state());

    let response = send(&app, "POST", "/", Body::from(r#"{"name":"a"}"#)).await;
    assert_eq!(response.status(), StatusCode::CREATED);
    let text = body_string(response).await;
    assert!(text.starts_with("result: {inserted: 1"), "{}", text);

    let response = send(&app, "GET", "/get/a", Body::empty()).await;
    assert_eq!(response.status(), StatusCode::OK);
    let doc: Document = serde_json::from_str(&body_string(response).await).unwrap();
    assert_eq!(doc, Document::new("a"));
}

#[tokio::test]
async fn test_get_missing_is_server_error() {
    let app = create_router(test_state());
    let response = send(&app, "GET", "/get/missing", Body::empty()).await;
    assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
}

#[tokio::test]
async fn test_create_without_name_is_bad_request() {
    let app = create_router(test_state());
    let response = send(&app, "POST", "/", Body::from(r#"{"age":5}"#)).await;
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_create_malformed_body_is_server_error() {
    let app = create_router(test_state());
    let response = send(&app, "POST", "/", Body::from("not json")).await;
    assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
}

#[tokio::test]
async fn test_create_duplicate_is_server_error() {
    let app = create_router(test_state());
    send(&app, "POST", "/", Body::from(r#"{"name":"a"}"#)).await;
    let response = send(&app, "POST", "/", Body::from(r#"{"name":"a"}"#)).await;
    assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
}

#[tokio::test]
async fn test_get_all() {
    let app = create_router(test_state());
    send(&app, "POST", "/", Body::from(r#"{"name":"b","age":2}"#)).await;
    send(&app, "POST", "/", Body::from(r#"{"name":"a","age":1}"#)).await;

    let response = send(&app, "GET", "/get", Body::empty()).await;
    assert_eq!(response.status(), StatusCode::OK);
    let docs: Vec<Document> = serde_json::from_str(&body_string(response).await).unwrap();
    assert_eq!(
        docs,
        vec![Document::new("a").with_age(1), Document::new("b").with_age(2)]
    );
}

#[tokio::test]
async fn test_update_answers_reset_content() {
    let app = create_router(test_state());
    send(&app, "POST", "/", Body::from(r#"{"name":"a","age":1}"#)).await;

    let response = send(&app, "PUT", "/a", Body::from(r#"{"name":"a","age":7}"#)).await;
    assert_eq!(response.status(), StatusCode::RESET_CONTENT);

    let response = send(&app, "GET", "/get/a", Body::empty()).await;
    let doc: Document = serde_json::from_str(&body_string(response).await).unwrap();
    assert_eq!(doc.age, Some(7));
}

async fn get_doc(app: &Router, name: &str) -> Document {
    let response = send(app, "GET", &format!("/get/{}", name), Body::empty()).await;
    assert_eq!(response.status(), StatusCode::OK);
    serde_json::from_str(&body_string(response).await).unwrap()
}

#[tokio::test]
async fn test_update_selects_document_by_body_name() {
    let app = create_router(test_state());
    send(&app, "POST", "/", Body::from(r#"{"name":"a","age":1}"#)).await;
    send(&app, "POST", "/", Body::from(r#"{"name":"b","age":1}"#)).await;

    let response = send(&app, "PUT", "/a", Body::from(r#"{"name":"b","age":3}"#)).await;
    assert_eq!(response.status(), StatusCode::RESET_CONTENT);
    assert_eq!(get_doc(&app, "a").await.age, Some(1));
    assert_eq!(get_doc(&app, "b").await.age, Some(3));

    // Without a name in the body nothing is selected.
    let response = send(&app, "PUT", "/a", Body::from(r#"{"age":9}"#)).await;
    assert_eq!(response.status(), StatusCode::RESET_CONTENT);
    assert_eq!(get_doc(&app, "a").await.age, Some(1));
}

#[tokio::test]
async fn test_delete_answers_no_content() {
    let app = create_router(test_state());
    send(&app, "POST", "/", Body::from(r#"{"name":"a"}"#)).await;

    let response = send(&app, "DELETE", "/a", Body::empty()).await;
    assert_eq!(response.status(), StatusCode::NO_CONTENT);

    let response = send(&app, "GET", "/get/a", Body::empty()).await;
    assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
}

#[tokio::test]
async fn test_changefeed_streams_insert() {
    let app = create_router(test_state());

    let response = send(&app, "GET", "/change/mydoc", Body::empty()).await;
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(
        response.headers().get(header::CONTENT_TYPE).unwrap(),
        "application/json"
    );
    let mut body = response.into_body();

    let created = send(&app, "POST", "/", Body::from(r#"{"name":"a","age":1}"#)).await;
    assert_eq!(created.status(), StatusCode::CREATED);

    let line = next_line(&mut body).await;
    assert!(line.ends_with('\n'));
    let doc: Document = serde_json::from_str(line.trim_end()).unwrap();
    assert_eq!(doc, Document::new("a").with_age(1));

    let extra = tokio::time::timeout(Duration::from_millis(200), body.frame()).await;
    assert!(extra.is_err(), "only one line expected for one insert");
}

#[tokio::test]
async fn test_changefeed_preserves_mutation_order() {
    let app = create_router(test_state());
    let response = send(&app, "GET", "/change/mydoc", Body::empty()).await;
    let mut body = response.into_body();

    send(&app, "POST", "/", Body::from(r#"{"name":"a","age":1}"#)).await;
    send(&app, "POST", "/", Body::from(r#"{"name":"b"}"#)).await;
    send(&app, "PUT", "/a", Body::from(r#"{"name":"a","age":2}"#)).await;
    send(&app, "DELETE", "/b", Body::empty()).await;

    assert_eq!(next_line(&mut body).await, "{\"name\":\"a\",\"age\":1}\n");
    assert_eq!(next_line(&mut body).await, "{\"name\":\"b\"}\n");
    assert_eq!(next_line(&mut body).await, "{\"name\":\"a\",\"age\":2}\n");
    assert_eq!(next_line(&mut body).await, "null\n");
}

#[tokio::test]
async fn test_changefeed_unknown_table_is_server_error() {
    let state = test_state();
    let app = create_router(state.clone());

    let response = send(&app, "GET", "/change/nope", Body::empty()).await;
    assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
    assert_eq!(state.active_sessions(), 0);
}

#[tokio::test]
async fn test_changefeed_disconnect_releases_session() {
    let state = test_state();
    let app = create_router(state.clone());

    let response = send(&app, "GET", "/change/mydoc", Body::empty()).await;
    assert_eq!(response.status(), StatusCode::OK);
    wait_for_sessions(&state, 1).await;

    drop(response);
    wait_for_sessions(&state, 0).await;

    // Writes after the disconnect still succeed.
    let response = send(&app, "POST", "/", Body::from(r#"{"name":"late"}"#)).await;
    assert_eq!(response.status(), StatusCode::CREATED);
}

#[tokio::test]
async fn test_stalled_changefeed_client_does_not_block_writes() {
    let state = test_state();
    let app = create_router(state.clone());

    // Attached but never read.
    let stalled = send(&app, "GET", "/change/mydoc", Body::empty()).await;
    assert_eq!(stalled.status(), StatusCode::OK);
    wait_for_sessions(&state, 1).await;

    let writes = async {
        for i in 0..1200 {
            let body = Body::from(format!(r#"{{"name":"doc-{:04}"}}"#, i));
            let response = send(&app, "POST", "/", body).await;
            assert_eq!(response.status(), StatusCode::CREATED);
        }
    };
    tokio::time::timeout(Duration::from_secs(30), writes)
        .await
        .expect("writes stalled behind an unread change feed");

    let response = send(&app, "GET", "/get/doc-1199", Body::empty()).await;
    assert_eq!(response.status(), StatusCode::OK);

    drop(stalled);
    wait_for_sessions(&state, 0).await;
}

#[tokio::test]
async fn test_health() {
    let app = create_router(test_state());
    let response = send(&app, "GET", "/health", Body::empty()).await;
    assert_eq!(response.status(), StatusCode::OK);

    let json: serde_json::Value = serde_json::from_str(&body_string(response).await).unwrap();
    assert_eq!(json["status"], "healthy");
    assert_eq!(json["collections"][0], "mydoc");
    assert_eq!(json["active_sessions"], 0);
}
