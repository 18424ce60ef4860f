use std::env;
use std::sync::{Arc, Once};

use ats_pipeline::{
    app,
    database::MemoryStore,
    middleware::auth::Claims,
    storage::MemoryBlobStorage,
    utils::signed_url::UrlSigner,
    AppState,
};
use axum::{
    body::{to_bytes, Body},
    http::{header, Method, Request, StatusCode},
    Router,
};
use jsonwebtoken::{encode, EncodingKey, Header};
use serde_json::{json, Value as JsonValue};
use tower::ServiceExt;
use uuid::Uuid;

const JWT_SECRET: &str = "test_secret_key";

static INIT: Once = Once::new();

fn init() {
    INIT.call_once(|| {
        env::set_var("SERVER_ADDRESS", "127.0.0.1:0");
        env::set_var("DATABASE_URL", "postgres://unused@localhost/unused");
        env::set_var("JWT_SECRET", JWT_SECRET);
        env::set_var("STORAGE_SIGNING_SECRET", "signing_secret");
        let _ = ats_pipeline::config::init_config();
    });
}

fn test_app() -> Router {
    init();
    let state = AppState::new(
        Arc::new(MemoryStore::new()),
        Arc::new(MemoryBlobStorage::new()),
        UrlSigner::new("signing_secret", "http://localhost:8080", 300),
        0,
    )
    .expect("state");
    app(state, 1024 * 1024)
}

fn token_for(user: Uuid) -> String {
    let claims = Claims {
        sub: user.to_string(),
        exp: (chrono::Utc::now().timestamp() + 3600) as usize,
        role: Some("recruiter".into()),
    };
    encode(
        &Header::default(),
        &claims,
        &EncodingKey::from_secret(JWT_SECRET.as_bytes()),
    )
    .expect("jwt")
}

async fn call(
    app: &Router,
    method: Method,
    uri: &str,
    token: Option<&str>,
    body: Option<JsonValue>,
) -> (StatusCode, JsonValue) {
    let mut builder = Request::builder().method(method).uri(uri);
    if let Some(token) = token {
        builder = builder.header(header::AUTHORIZATION, format!("Bearer {}", token));
    }
    let request = match body {
        Some(body) => builder
            .header(header::CONTENT_TYPE, "application/json")
            .body(Body::from(body.to_string()))
            .unwrap(),
        None => builder.body(Body::empty()).unwrap(),
    };
    let response = app.clone().oneshot(request).await.unwrap();
    let status = response.status();
    let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
    let json = if bytes.is_empty() {
        JsonValue::Null
    } else {
        serde_json::from_slice(&bytes).unwrap_or(JsonValue::Null)
    };
    (status, json)
}

async fn bootstrap(app: &Router, token: &str, name: &str) -> String {
    let (status, org) = call(
        app,
        Method::POST,
        "/api/organizations/bootstrap",
        Some(token),
        Some(json!({ "name": name })),
    )
    .await;
    assert_eq!(status, StatusCode::CREATED);
    org["id"].as_str().unwrap().to_string()
}

async fn create(app: &Router, token: &str, org: &str, body: JsonValue) -> JsonValue {
    let (status, candidate) = call(
        app,
        Method::POST,
        &format!("/api/organizations/{}/candidates", org),
        Some(token),
        Some(body),
    )
    .await;
    assert_eq!(status, StatusCode::CREATED, "{candidate}");
    candidate
}

#[tokio::test]
async fn health_and_openapi_are_public() {
    let app = test_app();
    let (status, body) = call(&app, Method::GET, "/health", None, None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["status"], "ok");

    let (status, doc) = call(&app, Method::GET, "/api/openapi.json", None, None).await;
    assert_eq!(status, StatusCode::OK);
    assert!(doc["paths"]["/api/candidates/{id}/stage"].is_object());
}

#[tokio::test]
async fn bootstrap_defaults_only_for_an_empty_body() {
    let app = test_app();
    let token = token_for(Uuid::new_v4());

    let request = Request::builder()
        .method(Method::POST)
        .uri("/api/organizations/bootstrap")
        .header(header::AUTHORIZATION, format!("Bearer {}", token))
        .header(header::CONTENT_TYPE, "application/json")
        .body(Body::from("{\"name\": "))
        .unwrap();
    let response = app.clone().oneshot(request).await.unwrap();
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);

    let (status, current) = call(&app, Method::GET, "/api/organizations/current", Some(&token), None).await;
    assert_eq!(status, StatusCode::OK);
    assert!(current["organization"].is_null());

    let (status, org) = call(&app, Method::POST, "/api/organizations/bootstrap", Some(&token), None).await;
    assert_eq!(status, StatusCode::CREATED);
    assert_eq!(org["name"], "My Company");
}

#[tokio::test]
async fn api_rejects_missing_or_bad_tokens() {
    let app = test_app();
    let (status, body) = call(&app, Method::GET, "/api/organizations/current", None, None).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert_eq!(body["error"], "missing_authorization");

    let (status, body) = call(
        &app,
        Method::GET,
        "/api/organizations/current",
        Some("not-a-jwt"),
        None,
    )
    .await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert_eq!(body["error"], "invalid_token");
}

#[tokio::test]
async fn candidate_pipeline_end_to_end() {
    let app = test_app();
    let token = token_for(Uuid::new_v4());
    let org = bootstrap(&app, &token, "Acme").await;

    let (status, current) = call(&app, Method::GET, "/api/organizations/current", Some(&token), None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(current["organization"]["id"], org.as_str());

    let carla = create(
        &app,
        &token,
        &org,
        json!({ "fullName": "Carla Mendez", "email": "carla@example.com", "stage": "interview", "salaryExpectation": "50000" }),
    )
    .await;
    create(
        &app,
        &token,
        &org,
        json!({ "fullName": "Irene Martin", "email": "irene@example.com", "stage": "interview", "salaryExpectation": "35000" }),
    )
    .await;
    create(
        &app,
        &token,
        &org,
        json!({ "fullName": "Diego Herrera", "email": "diego@example.com", "stage": "offer", "salaryExpectation": "60000" }),
    )
    .await;
    assert_eq!(carla["stage"], "interview");
    assert_eq!(carla["version"], 1);

    let (status, list) = call(
        &app,
        Method::GET,
        &format!("/api/organizations/{}/candidates?stage=interview&salaryMin=40000", org),
        Some(&token),
        None,
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(list["total"], 1);
    assert_eq!(list["items"][0]["full_name"], "Carla Mendez");

    let (status, body) = call(
        &app,
        Method::GET,
        &format!("/api/organizations/{}/candidates?stage=archived&salaryMax=abc", org),
        Some(&token),
        None,
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    let fields: Vec<&str> = body["fields"].as_array().unwrap().iter().filter_map(|f| f.as_str()).collect();
    assert!(fields.contains(&"stage") && fields.contains(&"salary_max"), "{body}");

    let carla_id = carla["id"].as_str().unwrap();
    let (status, moved) = call(
        &app,
        Method::PATCH,
        &format!("/api/candidates/{}/stage", carla_id),
        Some(&token),
        Some(json!({ "stage": "hired" })),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(moved["stage"], "hired");
    assert_eq!(moved["version"], 2);

    let (status, stale) = call(
        &app,
        Method::PATCH,
        &format!("/api/candidates/{}/stage", carla_id),
        Some(&token),
        Some(json!({ "stage": "offer", "expectedVersion": 1 })),
    )
    .await;
    assert_eq!(status, StatusCode::CONFLICT, "{stale}");

    let (status, _) = call(
        &app,
        Method::POST,
        &format!("/api/candidates/{}/notes", carla_id),
        Some(&token),
        Some(json!({ "content": "Great culture fit" })),
    )
    .await;
    assert_eq!(status, StatusCode::CREATED);

    let (status, profile) = call(
        &app,
        Method::GET,
        &format!("/api/organizations/{}/candidates/{}", org, carla_id),
        Some(&token),
        None,
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(profile["notes"].as_array().unwrap().len(), 1);
    assert_eq!(profile["activity_logs"].as_array().unwrap().len(), 3);
    assert_eq!(profile["activity_logs"][0]["label"], "Note added");
    assert_eq!(profile["activity_logs"][1]["label"], "Stage moved: Interview -> Hired");
    assert_eq!(profile["activity_logs"][2]["label"], "Candidate created");
    assert_eq!(profile["candidate"]["stage"], "hired");

    let (status, metrics) = call(
        &app,
        Method::GET,
        &format!("/api/organizations/{}/metrics", org),
        Some(&token),
        None,
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(metrics["total"], 3);
    assert_eq!(metrics["new_this_week"], 3);
    assert_eq!(metrics["conversion_rate"], 33);
    let stage_sum: u64 = metrics["stage_totals"]
        .as_array()
        .unwrap()
        .iter()
        .map(|s| s["total"].as_u64().unwrap())
        .sum();
    assert_eq!(stage_sum, 3);

    let (status, board) = call(
        &app,
        Method::GET,
        &format!("/api/organizations/{}/board", org),
        Some(&token),
        None,
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    let columns = board.as_array().unwrap();
    assert_eq!(columns.len(), 6);
    assert_eq!(columns[0]["stage"], "applied");
    assert_eq!(columns[5]["stage"], "hired");
    assert_eq!(columns[5]["candidates"][0]["full_name"], "Carla Mendez");

    let (status, _) = call(
        &app,
        Method::DELETE,
        &format!("/api/candidates/{}", carla_id),
        Some(&token),
        None,
    )
    .await;
    assert_eq!(status, StatusCode::NO_CONTENT);

    let (status, _) = call(
        &app,
        Method::GET,
        &format!("/api/organizations/{}/candidates/{}", org, carla_id),
        Some(&token),
        None,
    )
    .await;
    assert_eq!(status, StatusCode::NOT_FOUND);

    let (_, count) = call(
        &app,
        Method::GET,
        &format!("/api/organizations/{}/candidates/count", org),
        Some(&token),
        None,
    )
    .await;
    assert_eq!(count["total"], 2);
}

#[tokio::test]
async fn other_organizations_are_invisible() {
    let app = test_app();
    let owner = token_for(Uuid::new_v4());
    let stranger = token_for(Uuid::new_v4());
    let org = bootstrap(&app, &owner, "Acme").await;
    let candidate = create(
        &app,
        &owner,
        &org,
        json!({ "fullName": "Ana Torres", "email": "ana@example.com" }),
    )
    .await;
    assert_eq!(candidate["stage"], "applied");

    let (status, _) = call(
        &app,
        Method::GET,
        &format!("/api/organizations/{}/candidates", org),
        Some(&stranger),
        None,
    )
    .await;
    assert_eq!(status, StatusCode::NOT_FOUND);

    let (status, _) = call(
        &app,
        Method::PATCH,
        &format!("/api/candidates/{}/stage", candidate["id"].as_str().unwrap()),
        Some(&stranger),
        Some(json!({ "stage": "hired" })),
    )
    .await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn demo_seed_fills_an_empty_pipeline_once() {
    let app = test_app();
    let token = token_for(Uuid::new_v4());
    let org = bootstrap(&app, &token, "Acme").await;
    let uri = format!("/api/organizations/{}/candidates/demo", org);

    let (status, seeded) = call(&app, Method::POST, &uri, Some(&token), None).await;
    assert_eq!(status, StatusCode::CREATED);
    assert_eq!(seeded.as_array().unwrap().len(), 10);

    let (status, body) = call(&app, Method::POST, &uri, Some(&token), None).await;
    assert_eq!(status, StatusCode::PRECONDITION_FAILED);
    assert!(body["error"].as_str().unwrap().contains("pipeline not empty"));

    let (_, settings) = call(
        &app,
        Method::POST,
        &format!("/api/organizations/{}/settings/onboarding-seen", org),
        Some(&token),
        None,
    )
    .await;
    assert_eq!(settings["onboarding_demo_seen"], true);
}

#[tokio::test]
async fn upload_and_signed_download() {
    let app = test_app();
    let token = token_for(Uuid::new_v4());
    let org = bootstrap(&app, &token, "Acme").await;
    let candidate = create(
        &app,
        &token,
        &org,
        json!({ "fullName": "Elena Soto", "email": "elena@example.com" }),
    )
    .await;
    let candidate_id = candidate["id"].as_str().unwrap();

    let boundary = "X-BOUNDARY";
    let multipart = format!(
        "--{b}\r\nContent-Disposition: form-data; name=\"file\"; filename=\"cv elena.txt\"\r\nContent-Type: text/plain\r\n\r\nhello elena\r\n--{b}--\r\n",
        b = boundary
    );
    let request = Request::builder()
        .method(Method::POST)
        .uri(format!("/api/organizations/{}/candidates/{}/files", org, candidate_id))
        .header(header::AUTHORIZATION, format!("Bearer {}", token))
        .header(
            header::CONTENT_TYPE,
            format!("multipart/form-data; boundary={}", boundary),
        )
        .body(Body::from(multipart))
        .unwrap();
    let response = app.clone().oneshot(request).await.unwrap();
    assert_eq!(response.status(), StatusCode::CREATED);
    let record: JsonValue =
        serde_json::from_slice(&to_bytes(response.into_body(), usize::MAX).await.unwrap()).unwrap();
    let path = record["file_url"].as_str().unwrap().to_string();
    assert!(path.starts_with(&format!("{}/{}/", org, candidate_id)));
    assert!(path.ends_with("-cv-elena.txt"));

    let (status, link) = call(
        &app,
        Method::GET,
        &format!("/api/files/url?path={}", path),
        Some(&token),
        None,
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(link["expires_in"], 300);
    let url = url::Url::parse(link["url"].as_str().unwrap()).unwrap();
    let local = format!("{}?{}", url.path(), url.query().unwrap());

    let response = app
        .clone()
        .oneshot(Request::builder().uri(&local).body(Body::empty()).unwrap())
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
    assert_eq!(&bytes[..], b"hello elena");

    let tampered = local.replace("signature=", "signature=00");
    let response = app
        .clone()
        .oneshot(Request::builder().uri(&tampered).body(Body::empty()).unwrap())
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::FORBIDDEN);
}
