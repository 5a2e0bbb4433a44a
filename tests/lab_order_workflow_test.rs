mod common;

use axum::http::{Method, StatusCode};
use common::{read_json, TestApp};
use serde_json::{json, Value};

async fn order_with_prescription(app: &TestApp) -> String {
    let product_id = app.create_product("RX-FRAME", 150, 10).await;

    let response = app
        .request_authenticated(
            Method::POST,
            "/api/pos/orders",
            Some(json!({
                "items": [{ "product_id": product_id, "quantity": 1 }],
                "prescription": {
                    "right_sphere": "-2.0",
                    "right_cylinder": "-0.75",
                    "right_axis": 10,
                    "left_sphere": "-2.25",
                    "left_cylinder": "-0.5",
                    "left_axis": 170,
                    "right_add": "1.0",
                    "left_add": "1.0",
                    "material": "high-index",
                    "treatment": "blue-light",
                    "requires_add": true,
                    "notes": "progressive lenses",
                },
            })),
        )
        .await;
    assert_eq!(response.status(), StatusCode::CREATED);
    let order = read_json(response).await;
    order["prescription"]["id"].as_str().unwrap().to_string()
}

async fn create_lab_order(app: &TestApp, prescription_id: &str) -> Value {
    let response = app
        .request_authenticated(
            Method::POST,
            "/api/lab-orders",
            Some(json!({ "prescription_id": prescription_id, "notes": "rush job" })),
        )
        .await;
    assert_eq!(response.status(), StatusCode::CREATED);
    read_json(response).await
}

async fn set_status(app: &TestApp, id: &str, status: &str) -> StatusCode {
    app.request_authenticated(
        Method::PUT,
        &format!("/api/lab-orders/{}/status", id),
        Some(json!({ "status": status })),
    )
    .await
    .status()
}

#[tokio::test]
async fn lab_orders_start_as_received() {
    let app = TestApp::new().await;
    let rx = order_with_prescription(&app).await;

    let lab_order = create_lab_order(&app, &rx).await;
    assert_eq!(lab_order["status"], "received");
    assert_eq!(lab_order["notes"], "rush job");
}

#[tokio::test]
async fn lab_order_for_unknown_prescription_is_a_404() {
    let app = TestApp::new().await;

    let response = app
        .request_authenticated(
            Method::POST,
            "/api/lab-orders",
            Some(json!({ "prescription_id": uuid::Uuid::new_v4() })),
        )
        .await;
    assert_eq!(response.status(), StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn workflow_moves_strictly_forward() {
    let app = TestApp::new().await;
    let rx = order_with_prescription(&app).await;
    let lab_order = create_lab_order(&app, &rx).await;
    let id = lab_order["id"].as_str().unwrap();

    // received cannot jump straight to ready or delivered.
    assert_eq!(set_status(&app, id, "ready").await, StatusCode::BAD_REQUEST);
    assert_eq!(
        set_status(&app, id, "delivered").await,
        StatusCode::BAD_REQUEST
    );

    assert_eq!(set_status(&app, id, "in-progress").await, StatusCode::OK);
    assert_eq!(set_status(&app, id, "ready").await, StatusCode::OK);

    // Once ready the job can no longer be cancelled.
    assert_eq!(
        set_status(&app, id, "cancelled").await,
        StatusCode::BAD_REQUEST
    );

    assert_eq!(set_status(&app, id, "delivered").await, StatusCode::OK);

    // Delivered is terminal.
    assert_eq!(
        set_status(&app, id, "received").await,
        StatusCode::BAD_REQUEST
    );

    let response = app
        .request_authenticated(Method::GET, &format!("/api/lab-orders/{}", id), None)
        .await;
    let fetched = read_json(response).await;
    assert_eq!(fetched["status"], "delivered");
}

#[tokio::test]
async fn cancellation_is_allowed_before_ready() {
    let app = TestApp::new().await;
    let rx = order_with_prescription(&app).await;
    let lab_order = create_lab_order(&app, &rx).await;
    let id = lab_order["id"].as_str().unwrap();

    assert_eq!(set_status(&app, id, "in-progress").await, StatusCode::OK);
    assert_eq!(set_status(&app, id, "cancelled").await, StatusCode::OK);

    // Cancelled is terminal.
    assert_eq!(
        set_status(&app, id, "in-progress").await,
        StatusCode::BAD_REQUEST
    );
}

#[tokio::test]
async fn unknown_status_strings_are_rejected() {
    let app = TestApp::new().await;
    let rx = order_with_prescription(&app).await;
    let lab_order = create_lab_order(&app, &rx).await;
    let id = lab_order["id"].as_str().unwrap();

    assert_eq!(
        set_status(&app, id, "polishing").await,
        StatusCode::BAD_REQUEST
    );
}

#[tokio::test]
async fn notes_can_be_updated_at_any_stage() {
    let app = TestApp::new().await;
    let rx = order_with_prescription(&app).await;
    let lab_order = create_lab_order(&app, &rx).await;
    let id = lab_order["id"].as_str().unwrap();

    let response = app
        .request_authenticated(
            Method::PUT,
            &format!("/api/lab-orders/{}/notes", id),
            Some(json!({ "notes": "customer called, needs it friday" })),
        )
        .await;
    assert_eq!(response.status(), StatusCode::OK);
    let updated = read_json(response).await;
    assert_eq!(updated["notes"], "customer called, needs it friday");
}

#[tokio::test]
async fn listing_filters_by_status() {
    let app = TestApp::new().await;
    let rx = order_with_prescription(&app).await;
    let first = create_lab_order(&app, &rx).await;
    let _second = create_lab_order(&app, &rx).await;

    assert_eq!(
        set_status(&app, first["id"].as_str().unwrap(), "in-progress").await,
        StatusCode::OK
    );

    let response = app
        .request_authenticated(Method::GET, "/api/lab-orders?status=received", None)
        .await;
    let received = read_json(response).await;
    assert_eq!(received["total"], 1);

    let response = app
        .request_authenticated(Method::GET, "/api/lab-orders?status=in-progress", None)
        .await;
    let in_progress = read_json(response).await;
    assert_eq!(in_progress["total"], 1);

    let response = app
        .request_authenticated(Method::GET, "/api/lab-orders", None)
        .await;
    let all = read_json(response).await;
    assert_eq!(all["total"], 2);
}

#[tokio::test]
async fn prescriptions_can_be_corrected() {
    let app = TestApp::new().await;
    let rx = order_with_prescription(&app).await;

    let response = app
        .request_authenticated(
            Method::PUT,
            &format!("/api/lab-orders/prescriptions/{}", rx),
            Some(json!({
                "right_sphere": "-2.5",
                "right_cylinder": "-0.75",
                "right_axis": 12,
                "left_sphere": "-2.25",
                "left_cylinder": "-0.5",
                "left_axis": 168,
                "material": "high-index",
                "treatment": "blue-light",
                "requires_add": false,
            })),
        )
        .await;
    assert_eq!(response.status(), StatusCode::OK);
    let updated = read_json(response).await;
    assert_eq!(updated["right_axis"], 12);
    assert_eq!(updated["requires_add"], false);

    // An axis outside 0-180 is rejected.
    let response = app
        .request_authenticated(
            Method::PUT,
            &format!("/api/lab-orders/prescriptions/{}", rx),
            Some(json!({
                "right_sphere": "-2.5",
                "right_cylinder": "-0.75",
                "right_axis": 200,
                "left_sphere": "-2.25",
                "left_cylinder": "-0.5",
                "left_axis": 168,
                "material": "high-index",
                "treatment": "blue-light",
            })),
        )
        .await;
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
}
