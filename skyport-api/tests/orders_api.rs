use std::sync::Arc;

use axum::{
    body::Body,
    http::{header, Method, Request, StatusCode},
    Router,
};
use chrono::{Duration, Utc};
use jsonwebtoken::{encode, EncodingKey, Header};
use serde_json::{json, Value};
use skyport_api::{app, middleware::Claims, AppState, AuthConfig};
use skyport_core::models::Flight;
use skyport_store::app_config::PaginationConfig;
use skyport_store::InMemoryStore;
use tower::ServiceExt;
use uuid::Uuid;

const SECRET: &str = "test-secret";

struct TestApp {
    router: Router,
    store: Arc<InMemoryStore>,
    flight: Flight,
}

async fn setup() -> TestApp {
    let store = Arc::new(InMemoryStore::new());
    let krk = store.add_airport("KRK", "Krakow").await.unwrap();
    let pmi = store.add_airport("PMI", "Palma").await.unwrap();
    let route = store.add_route(krk.id, pmi.id, 1900).await.unwrap();
    let boeing = store.add_airplane_type("Boeing").await.unwrap();
    let airplane = store.add_airplane("BO1234", 10, 6, boeing.id).await.unwrap();
    let pilot = store.add_crew("Jan", "Kowalski").await;

    let departure = Utc::now() + Duration::days(1);
    let flight = store
        .add_flight(route.id, airplane.id, departure, departure + Duration::hours(3), vec![pilot.id])
        .await
        .unwrap();

    let state = AppState::new(
        store.clone(),
        store.clone(),
        AuthConfig { secret: SECRET.to_string() },
        PaginationConfig { default_page_size: 2, max_page_size: 5 },
    );

    TestApp { router: app(state), store, flight }
}

fn token_for(user: &str) -> String {
    let claims = Claims {
        sub: user.to_string(),
        role: "CUSTOMER".to_string(),
        exp: (Utc::now() + Duration::hours(1)).timestamp() as usize,
    };
    encode(&Header::default(), &claims, &EncodingKey::from_secret(SECRET.as_bytes())).unwrap()
}

async fn send(router: &Router, method: Method, uri: &str, token: Option<&str>, body: Option<Value>) -> (StatusCode, Value) {
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

    let response = router.clone().oneshot(request).await.unwrap();
    let status = response.status();
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX).await.unwrap();
    let json = if bytes.is_empty() { Value::Null } else { serde_json::from_slice(&bytes).unwrap_or(Value::Null) };
    (status, json)
}

fn order_body(flight: &Flight, seats: &[(i32, i32)]) -> Value {
    json!({
        "tickets": seats
            .iter()
            .map(|(row, seat)| json!({ "flight": flight.id, "row": row, "seat": seat }))
            .collect::<Vec<_>>()
    })
}

#[tokio::test]
async fn test_requests_without_valid_token_are_rejected() {
    let t = setup().await;

    let (status, body) = send(&t.router, Method::GET, "/api/orders", None, None).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert!(body["error"].is_string());

    let (status, _) = send(&t.router, Method::GET, "/api/orders", Some("not-a-jwt"), None).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);

    let forged = encode(
        &Header::default(),
        &Claims { sub: "user-1".into(), role: "CUSTOMER".into(), exp: (Utc::now() + Duration::hours(1)).timestamp() as usize },
        &EncodingKey::from_secret(b"other-secret"),
    )
    .unwrap();
    let (status, _) = send(&t.router, Method::POST, "/api/orders", Some(&forged), Some(order_body(&t.flight, &[(1, 1)]))).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert_eq!(t.store.order_count().await, 0);
}

#[tokio::test]
async fn test_create_order_returns_created_tickets() {
    let t = setup().await;
    let token = token_for("user-1");

    let (status, body) = send(
        &t.router,
        Method::POST,
        "/api/orders",
        Some(&token),
        Some(order_body(&t.flight, &[(2, 3), (1, 1)])),
    )
    .await;

    assert_eq!(status, StatusCode::CREATED);
    assert!(body["id"].is_string());
    assert!(body["created_at"].is_string());
    let tickets = body["tickets"].as_array().unwrap();
    assert_eq!(tickets.len(), 2);
    // Sorted by seat.
    assert_eq!(tickets[0]["row"], 1);
    assert_eq!(tickets[1]["row"], 2);
    assert_eq!(tickets[1]["seat"], 3);
    assert_eq!(tickets[0]["flight"], json!(t.flight.id));
}

#[tokio::test]
async fn test_taken_seat_is_a_conflict() {
    let t = setup().await;

    let (status, _) = send(&t.router, Method::POST, "/api/orders", Some(&token_for("user-1")), Some(order_body(&t.flight, &[(1, 1)]))).await;
    assert_eq!(status, StatusCode::CREATED);

    let (status, body) = send(
        &t.router,
        Method::POST,
        "/api/orders",
        Some(&token_for("user-2")),
        Some(order_body(&t.flight, &[(1, 2), (1, 1)])),
    )
    .await;
    assert_eq!(status, StatusCode::CONFLICT);
    assert_eq!(body["field"], "tickets[1]");
    assert_eq!(t.store.ticket_count().await, 1);
}

#[tokio::test]
async fn test_out_of_range_seat_names_the_field() {
    let t = setup().await;

    let (status, body) = send(
        &t.router,
        Method::POST,
        "/api/orders",
        Some(&token_for("user-1")),
        Some(order_body(&t.flight, &[(1, 1), (11, 1)])),
    )
    .await;

    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["field"], "tickets[1].row");
    assert!(body["error"].as_str().unwrap().contains("(1, rows): (1, 10)"));
    assert_eq!(t.store.order_count().await, 0);
}

#[tokio::test]
async fn test_malformed_orders_are_bad_requests() {
    let t = setup().await;
    let token = token_for("user-1");

    let (status, body) = send(&t.router, Method::POST, "/api/orders", Some(&token), Some(json!({ "tickets": [] }))).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["field"], "tickets");

    let (status, body) = send(
        &t.router,
        Method::POST,
        "/api/orders",
        Some(&token),
        Some(json!({ "tickets": [{ "flight": Uuid::new_v4(), "row": 1, "seat": 1 }] })),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["field"], "tickets[0].flight");

    let (status, body) = send(&t.router, Method::POST, "/api/orders", Some(&token), Some(json!({ "seats": 3 }))).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert!(body["error"].is_string());
    assert_eq!(body["field"], Value::Null);
}

#[tokio::test]
async fn test_list_orders_is_paginated_and_scoped_to_owner() {
    let t = setup().await;
    let alice = token_for("alice");

    for row in 1..=3 {
        let (status, _) = send(&t.router, Method::POST, "/api/orders", Some(&alice), Some(order_body(&t.flight, &[(row, 1)]))).await;
        assert_eq!(status, StatusCode::CREATED);
    }
    send(&t.router, Method::POST, "/api/orders", Some(&token_for("bob")), Some(order_body(&t.flight, &[(9, 6)]))).await;

    let (status, body) = send(&t.router, Method::GET, "/api/orders", Some(&alice), None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["count"], 3);
    assert_eq!(body["page"], 1);
    assert_eq!(body["page_size"], 2);
    assert_eq!(body["results"].as_array().unwrap().len(), 2);
    let ticket = &body["results"][0]["tickets"][0];
    assert_eq!(ticket["route"], "KRK - PMI");
    assert!(ticket["departure_time"].is_string());

    let (_, body) = send(&t.router, Method::GET, "/api/orders?page=2", Some(&alice), None).await;
    assert_eq!(body["results"].as_array().unwrap().len(), 1);

    // Clamped to the configured maximum.
    let (_, body) = send(&t.router, Method::GET, "/api/orders?page_size=50", Some(&alice), None).await;
    assert_eq!(body["page_size"], 5);

    let (status, body) = send(&t.router, Method::GET, "/api/orders?page=0", Some(&alice), None).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["field"], "page");

    let (_, body) = send(&t.router, Method::GET, "/api/orders", Some(&token_for("carol")), None).await;
    assert_eq!(body["count"], 0);
}

#[tokio::test]
async fn test_order_detail_is_only_visible_to_owner() {
    let t = setup().await;
    let alice = token_for("alice");

    let (_, created) = send(&t.router, Method::POST, "/api/orders", Some(&alice), Some(order_body(&t.flight, &[(4, 2)]))).await;
    let uri = format!("/api/orders/{}", created["id"].as_str().unwrap());

    let (status, body) = send(&t.router, Method::GET, &uri, Some(&alice), None).await;
    assert_eq!(status, StatusCode::OK);
    let flight = &body["tickets"][0]["flight"];
    assert_eq!(flight["route"], "KRK - PMI");
    assert_eq!(flight["airplane"], "BO1234");
    assert_eq!(flight["crew"], json!(["Jan Kowalski"]));

    let (status, _) = send(&t.router, Method::GET, &uri, Some(&token_for("bob")), None).await;
    assert_eq!(status, StatusCode::NOT_FOUND);

    let (status, _) = send(&t.router, Method::GET, "/api/orders/not-a-uuid", Some(&alice), None).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_orders_cannot_be_modified() {
    let t = setup().await;
    let token = token_for("alice");

    let (_, created) = send(&t.router, Method::POST, "/api/orders", Some(&token), Some(order_body(&t.flight, &[(1, 1)]))).await;
    let uri = format!("/api/orders/{}", created["id"].as_str().unwrap());

    for method in [Method::PUT, Method::PATCH, Method::DELETE] {
        let (status, _) = send(&t.router, method, &uri, Some(&token), Some(json!({ "tickets": [] }))).await;
        assert_eq!(status, StatusCode::METHOD_NOT_ALLOWED);
    }
    assert_eq!(t.store.order_count().await, 1);
}

#[tokio::test]
async fn test_seat_map_reports_taken_places() {
    let t = setup().await;
    let token = token_for("alice");

    send(&t.router, Method::POST, "/api/orders", Some(&token), Some(order_body(&t.flight, &[(3, 4), (1, 2)]))).await;

    let (status, body) = send(&t.router, Method::GET, &format!("/api/flights/{}/seats", t.flight.id), Some(&token), None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["capacity"], 60);
    assert_eq!(body["tickets_available"], 58);
    assert_eq!(body["taken_places"], json!([{ "row": 1, "seat": 2 }, { "row": 3, "seat": 4 }]));

    let (status, _) = send(&t.router, Method::GET, &format!("/api/flights/{}/seats", Uuid::new_v4()), Some(&token), None).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}
