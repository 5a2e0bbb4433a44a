mod common;

use axum::http::{Method, StatusCode};
use common::{read_json, TestApp};
use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use serde_json::{json, Value};

fn decimal(value: &Value) -> Decimal {
    value
        .as_str()
        .unwrap_or_else(|| panic!("expected decimal string, got {}", value))
        .parse()
        .expect("decimal parses")
}

#[tokio::test]
async fn order_decrements_stock_and_freezes_the_total() {
    let app = TestApp::new().await;
    let product_id = app.create_product("FRAME-001", 50, 5).await;

    let response = app
        .request_authenticated(
            Method::POST,
            "/api/pos/orders",
            Some(json!({
                "items": [{ "product_id": product_id, "quantity": 2 }],
            })),
        )
        .await;
    assert_eq!(response.status(), StatusCode::CREATED);
    let order = read_json(response).await;

    assert_eq!(order["status"], "pending");
    assert_eq!(decimal(&order["total_amount"]), dec!(100));
    assert_eq!(order["items"].as_array().unwrap().len(), 1);
    assert_eq!(decimal(&order["items"][0]["price_at_time"]), dec!(50));

    // Stock went 5 -> 3.
    let response = app
        .request_authenticated(
            Method::GET,
            &format!("/api/pos/products/{}", product_id),
            None,
        )
        .await;
    let product = read_json(response).await;
    assert_eq!(product["stock"], 3);

    // Raising the price later must not change the recorded total.
    let response = app
        .request_authenticated(
            Method::PUT,
            &format!("/api/inventory/{}", product_id),
            Some(json!({ "price": 80 })),
        )
        .await;
    assert_eq!(response.status(), StatusCode::OK);

    let order_id = order["id"].as_str().unwrap();
    let response = app
        .request_authenticated(Method::GET, &format!("/api/pos/orders/{}", order_id), None)
        .await;
    let fetched = read_json(response).await;
    assert_eq!(decimal(&fetched["total_amount"]), dec!(100));
    assert_eq!(decimal(&fetched["items"][0]["price_at_time"]), dec!(50));
}

#[tokio::test]
async fn insufficient_stock_rolls_the_whole_order_back() {
    let app = TestApp::new().await;
    let plenty = app.create_product("LENS-001", 20, 10).await;
    let scarce = app.create_product("LENS-002", 30, 1).await;

    let response = app
        .request_authenticated(
            Method::POST,
            "/api/pos/orders",
            Some(json!({
                "items": [
                    { "product_id": plenty, "quantity": 2 },
                    { "product_id": scarce, "quantity": 5 },
                ],
            })),
        )
        .await;
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    let error = read_json(response).await;
    assert!(error["message"]
        .as_str()
        .unwrap()
        .contains("Insufficient stock"));

    // The first line's decrement must have been rolled back too.
    for (id, expected) in [(plenty, 10), (scarce, 1)] {
        let response = app
            .request_authenticated(Method::GET, &format!("/api/pos/products/{}", id), None)
            .await;
        let product = read_json(response).await;
        assert_eq!(product["stock"], expected, "stock for {}", id);
    }

    // No orders were written.
    let response = app
        .request_authenticated(Method::GET, "/api/pos/orders", None)
        .await;
    let listing = read_json(response).await;
    assert_eq!(listing["total"], 0);
}

#[tokio::test]
async fn unknown_product_in_an_order_is_a_404() {
    let app = TestApp::new().await;

    let response = app
        .request_authenticated(
            Method::POST,
            "/api/pos/orders",
            Some(json!({
                "items": [{ "product_id": uuid::Uuid::new_v4(), "quantity": 1 }],
            })),
        )
        .await;
    assert_eq!(response.status(), StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn multi_line_totals_sum_over_lines() {
    let app = TestApp::new().await;
    let frames = app.create_product("FRAME-010", 120, 10).await;
    let lenses = app.create_product("LENS-010", 45, 10).await;

    let response = app
        .request_authenticated(
            Method::POST,
            "/api/pos/orders",
            Some(json!({
                "items": [
                    { "product_id": frames, "quantity": 1 },
                    { "product_id": lenses, "quantity": 2 },
                ],
            })),
        )
        .await;
    assert_eq!(response.status(), StatusCode::CREATED);
    let order = read_json(response).await;
    assert_eq!(decimal(&order["total_amount"]), dec!(210));
}

#[tokio::test]
async fn order_with_prescription_creates_it_atomically() {
    let app = TestApp::new().await;
    let product_id = app.create_product("PROG-001", 200, 4).await;

    let response = app
        .request_authenticated(
            Method::POST,
            "/api/pos/orders",
            Some(json!({
                "items": [{ "product_id": product_id, "quantity": 1 }],
                "prescription": {
                    "right_sphere": "-1.25",
                    "right_cylinder": "-0.5",
                    "right_axis": 90,
                    "left_sphere": "-1.5",
                    "left_cylinder": "-0.25",
                    "left_axis": 85,
                    "material": "polycarbonate",
                    "treatment": "anti-reflective",
                    "requires_add": false,
                },
            })),
        )
        .await;
    assert_eq!(response.status(), StatusCode::CREATED);
    let order = read_json(response).await;

    let prescription = &order["prescription"];
    assert!(!prescription.is_null());
    assert_eq!(prescription["material"], "polycarbonate");
    assert_eq!(prescription["right_axis"], 90);

    // The prescription is fetchable through the lab-orders surface.
    let rx_id = prescription["id"].as_str().unwrap();
    let response = app
        .request_authenticated(
            Method::GET,
            &format!("/api/lab-orders/prescriptions/{}", rx_id),
            None,
        )
        .await;
    assert_eq!(response.status(), StatusCode::OK);
}

#[tokio::test]
async fn completing_and_cancelling_follow_the_lifecycle() {
    let app = TestApp::new().await;
    let product_id = app.create_product("SUN-001", 60, 8).await;

    let create_order = |qty: i64| {
        json!({ "items": [{ "product_id": product_id, "quantity": qty }] })
    };

    // Complete one order.
    let response = app
        .request_authenticated(Method::POST, "/api/pos/orders", Some(create_order(2)))
        .await;
    let completed = read_json(response).await;
    let completed_id = completed["id"].as_str().unwrap().to_string();

    let response = app
        .request_authenticated(
            Method::PUT,
            &format!("/api/pos/orders/{}/status", completed_id),
            Some(json!({ "status": "completed" })),
        )
        .await;
    assert_eq!(response.status(), StatusCode::OK);
    let body = read_json(response).await;
    assert_eq!(body["status"], "completed");

    // Completed orders are terminal.
    let response = app
        .request_authenticated(
            Method::PUT,
            &format!("/api/pos/orders/{}/status", completed_id),
            Some(json!({ "status": "cancelled" })),
        )
        .await;
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);

    // Cancel another order; its stock comes back.
    let response = app
        .request_authenticated(Method::POST, "/api/pos/orders", Some(create_order(3)))
        .await;
    let cancelled = read_json(response).await;
    let cancelled_id = cancelled["id"].as_str().unwrap().to_string();

    // 8 - 2 - 3 = 3 before the cancellation.
    let response = app
        .request_authenticated(
            Method::GET,
            &format!("/api/pos/products/{}", product_id),
            None,
        )
        .await;
    assert_eq!(read_json(response).await["stock"], 3);

    let response = app
        .request_authenticated(
            Method::PUT,
            &format!("/api/pos/orders/{}/status", cancelled_id),
            Some(json!({ "status": "cancelled" })),
        )
        .await;
    assert_eq!(response.status(), StatusCode::OK);

    let response = app
        .request_authenticated(
            Method::GET,
            &format!("/api/pos/products/{}", product_id),
            None,
        )
        .await;
    assert_eq!(read_json(response).await["stock"], 6);

    // Unknown status strings are rejected before any lookup.
    let response = app
        .request_authenticated(
            Method::PUT,
            &format!("/api/pos/orders/{}/status", cancelled_id),
            Some(json!({ "status": "refunded" })),
        )
        .await;
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn order_listing_filters_by_status() {
    let app = TestApp::new().await;
    let product_id = app.create_product("CASE-001", 10, 20).await;

    for _ in 0..3 {
        let response = app
            .request_authenticated(
                Method::POST,
                "/api/pos/orders",
                Some(json!({ "items": [{ "product_id": product_id, "quantity": 1 }] })),
            )
            .await;
        assert_eq!(response.status(), StatusCode::CREATED);
    }

    let response = app
        .request_authenticated(Method::GET, "/api/pos/orders?status=pending", None)
        .await;
    let pending = read_json(response).await;
    assert_eq!(pending["total"], 3);

    let response = app
        .request_authenticated(Method::GET, "/api/pos/orders?status=completed", None)
        .await;
    let completed = read_json(response).await;
    assert_eq!(completed["total"], 0);

    let response = app
        .request_authenticated(Method::GET, "/api/pos/orders?status=bogus", None)
        .await;
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
}
