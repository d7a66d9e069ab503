//! Client tests against a local axum stand-in for the ML service.

use std::{net::SocketAddr, time::Duration};

use axum::{Json, Router, http::StatusCode, routing::post};
use serde_json::{Value, json};
use tokio::net::TcpListener;

use super::*;

async fn serve(app: Router) -> SocketAddr {
  let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
  let addr = listener.local_addr().unwrap();
  tokio::spawn(async move { axum::serve(listener, app).await.unwrap() });
  addr
}

fn client(addr: SocketAddr, timeout: Duration) -> MlClient {
  MlClient::new(MlConfig { base_url: format!("http://{addr}/"), timeout }).unwrap()
}

fn fake_service() -> Router {
  Router::new()
    .route(
      "/encode",
      post(|Json(body): Json<Value>| async move {
        let image = body["image"].as_str().unwrap_or_default();
        let decoded = B64.decode(image).unwrap_or_default();
        if decoded.is_empty() {
          Json(json!({ "success": false, "embedding": [] }))
        } else {
          Json(json!({ "success": true, "embedding": [0.5, 0.25, decoded.len() as f32] }))
        }
      }),
    )
    .route(
      "/match",
      post(|Json(body): Json<Value>| async move {
        let matched = body["candidate"] == body["reference"];
        Json(json!({ "match": matched, "score": if matched { 1.0 } else { 0.0 } }))
      }),
    )
}

#[tokio::test]
async fn encode_sends_base64_image() {
  let addr = serve(fake_service()).await;
  let ml = client(addr, Duration::from_secs(5));

  let encoding = ml.encode_face(Bytes::from_static(b"face")).await.unwrap();

  assert!(encoding.success);
  assert_eq!(encoding.embedding, vec![0.5, 0.25, 4.0]);
}

#[tokio::test]
async fn encode_without_face_is_unsuccessful_not_an_error() {
  let addr = serve(fake_service()).await;
  let ml = client(addr, Duration::from_secs(5));

  let encoding = ml.encode_face(Bytes::new()).await.unwrap();
  assert!(!encoding.success);
}

#[tokio::test]
async fn match_reports_verdict_and_score() {
  let addr = serve(fake_service()).await;
  let ml = client(addr, Duration::from_secs(5));

  let same = ml.match_face(&[0.1, 0.2], &[0.1, 0.2]).await.unwrap();
  let different = ml.match_face(&[0.1, 0.2], &[0.9, 0.2]).await.unwrap();

  assert!(same.matched);
  assert_eq!(same.score, Some(1.0));
  assert!(!different.matched);
}

#[tokio::test]
async fn error_status_is_surfaced() {
  let app = Router::new().route(
    "/match",
    post(|| async { (StatusCode::SERVICE_UNAVAILABLE, "model loading") }),
  );
  let addr = serve(app).await;
  let ml = client(addr, Duration::from_secs(5));

  let err = ml.match_face(&[0.1], &[0.1]).await.unwrap_err();
  assert!(matches!(
    err,
    Error::Status { path: "/match", status: StatusCode::SERVICE_UNAVAILABLE }
  ));
}

#[tokio::test]
async fn slow_service_times_out() {
  let app = Router::new().route(
    "/encode",
    post(|| async {
      tokio::time::sleep(Duration::from_secs(5)).await;
      Json(json!({ "success": true, "embedding": [] }))
    }),
  );
  let addr = serve(app).await;
  let ml = client(addr, Duration::from_millis(100));

  let err = ml.encode_face(Bytes::from_static(b"face")).await.unwrap_err();
  match err {
    Error::Transport { source, .. } => assert!(source.is_timeout()),
    other => panic!("expected a transport timeout, got {other:?}"),
  }
}

#[tokio::test]
async fn unreachable_service_is_a_transport_error() {
  let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
  let addr = listener.local_addr().unwrap();
  drop(listener);
  let ml = client(addr, Duration::from_secs(1));

  let err = ml.match_face(&[0.1], &[0.1]).await.unwrap_err();
  assert!(matches!(err, Error::Transport { path: "/match", .. }));
}
