mod common;

use axum::http::{Method, StatusCode};
use common::{read_json, TestApp};
use serde_json::json;

#[tokio::test]
async fn opening_stock_shows_up_in_the_ledger() {
    let app = TestApp::new().await;

    let stocked = app.create_product("FR-201", 90, 7).await;
    assert_eq!(app.state.services.inventory.ledger_sum(stocked).await.unwrap(), 7);

    // A product created without stock gets no ledger row.
    let empty = app.create_product("FR-202", 90, 0).await;
    assert_eq!(app.state.services.inventory.ledger_sum(empty).await.unwrap(), 0);
}

#[tokio::test]
async fn adjustments_move_stock_and_ledger_together() {
    let app = TestApp::new().await;
    let product_id = app.create_product("CL-300", 25, 10).await;

    let response = app
        .request_authenticated(
            Method::PATCH,
            &format!("/api/inventory/{}/stock", product_id),
            Some(json!({ "quantity_delta": 15, "reason": "restock", "reference": "PO-44" })),
        )
        .await;
    assert_eq!(response.status(), StatusCode::OK);
    let body = read_json(response).await;
    assert_eq!(body["product"]["stock"], 25);
    assert!(body["movement_id"].is_string());

    let response = app
        .request_authenticated(
            Method::PATCH,
            &format!("/api/inventory/{}/stock", product_id),
            Some(json!({ "quantity_delta": -4, "reason": "adjustment" })),
        )
        .await;
    assert_eq!(response.status(), StatusCode::OK);
    let body = read_json(response).await;
    assert_eq!(body["product"]["stock"], 21);

    // Ledger sum always equals the stock column.
    assert_eq!(
        app.state
            .services
            .inventory
            .ledger_sum(product_id)
            .await
            .unwrap(),
        21
    );
}

#[tokio::test]
async fn invalid_adjustments_are_rejected() {
    let app = TestApp::new().await;
    let product_id = app.create_product("CL-301", 25, 3).await;
    let uri = format!("/api/inventory/{}/stock", product_id);

    // Zero delta.
    let response = app
        .request_authenticated(
            Method::PATCH,
            &uri,
            Some(json!({ "quantity_delta": 0, "reason": "adjustment" })),
        )
        .await;
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);

    // Unknown reason.
    let response = app
        .request_authenticated(
            Method::PATCH,
            &uri,
            Some(json!({ "quantity_delta": 1, "reason": "shrinkage" })),
        )
        .await;
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);

    // Would take stock below zero.
    let response = app
        .request_authenticated(
            Method::PATCH,
            &uri,
            Some(json!({ "quantity_delta": -4, "reason": "adjustment" })),
        )
        .await;
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);

    // Unknown product.
    let response = app
        .request_authenticated(
            Method::PATCH,
            &format!("/api/inventory/{}/stock", uuid::Uuid::new_v4()),
            Some(json!({ "quantity_delta": 1, "reason": "restock" })),
        )
        .await;
    assert_eq!(response.status(), StatusCode::NOT_FOUND);

    // Nothing above touched the stock or the ledger.
    assert_eq!(
        app.state
            .services
            .inventory
            .ledger_sum(product_id)
            .await
            .unwrap(),
        3
    );
}

#[tokio::test]
async fn duplicate_skus_are_rejected() {
    let app = TestApp::new().await;
    app.create_product("FR-210", 80, 2).await;

    let response = app
        .request_authenticated(
            Method::POST,
            "/api/inventory",
            Some(json!({
                "sku": "FR-210",
                "name": "Another Frame",
                "category": "frames",
                "price": 80,
                "initial_stock": 1,
            })),
        )
        .await;
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn low_stock_listing_honours_the_threshold_override() {
    let app = TestApp::new().await;
    app.create_product("LOW-1", 10, 2).await;
    app.create_product("LOW-2", 10, 8).await;
    app.create_product("HIGH-1", 10, 50).await;

    // Configured threshold is 10: both low products show up, ordered by stock.
    let response = app
        .request_authenticated(Method::GET, "/api/inventory/low-stock", None)
        .await;
    let listing = read_json(response).await;
    let skus: Vec<&str> = listing
        .as_array()
        .unwrap()
        .iter()
        .map(|p| p["sku"].as_str().unwrap())
        .collect();
    assert_eq!(skus, vec!["LOW-1", "LOW-2"]);

    let response = app
        .request_authenticated(Method::GET, "/api/inventory/low-stock?threshold=3", None)
        .await;
    let listing = read_json(response).await;
    assert_eq!(listing.as_array().unwrap().len(), 1);
    assert_eq!(listing[0]["sku"], "LOW-1");
}

#[tokio::test]
async fn stats_aggregate_the_whole_catalog() {
    let app = TestApp::new().await;
    app.create_product("ST-1", 20, 5).await;
    app.create_product("ST-2", 30, 0).await;
    app.create_product("ST-3", 10, 40).await;

    let response = app
        .request_authenticated(Method::GET, "/api/inventory/stats", None)
        .await;
    assert_eq!(response.status(), StatusCode::OK);
    let stats = read_json(response).await;

    assert_eq!(stats["total_products"], 3);
    assert_eq!(stats["total_stock"], 45);
    assert_eq!(stats["low_stock_count"], 2);
    assert_eq!(stats["out_of_stock_count"], 1);
    // 20*5 + 30*0 + 10*40 = 500
    assert_eq!(
        stats["total_value"].as_str().unwrap().parse::<i64>().ok(),
        Some(500)
    );
}

#[tokio::test]
async fn products_with_sales_history_cannot_be_deleted() {
    let app = TestApp::new().await;
    let sold = app.create_product("DEL-1", 40, 5).await;
    let unsold = app.create_product("DEL-2", 40, 5).await;

    let response = app
        .request_authenticated(
            Method::POST,
            "/api/pos/orders",
            Some(json!({ "items": [{ "product_id": sold, "quantity": 1 }] })),
        )
        .await;
    assert_eq!(response.status(), StatusCode::CREATED);

    let response = app
        .request_authenticated(Method::DELETE, &format!("/api/inventory/{}", sold), None)
        .await;
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);

    let response = app
        .request_authenticated(Method::DELETE, &format!("/api/inventory/{}", unsold), None)
        .await;
    assert_eq!(response.status(), StatusCode::NO_CONTENT);

    let response = app
        .request_authenticated(Method::GET, &format!("/api/pos/products/{}", unsold), None)
        .await;
    assert_eq!(response.status(), StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn catalog_listing_filters_by_category_and_search() {
    let app = TestApp::new().await;

    for (sku, category) in [("FRA-1", "frames"), ("FRA-2", "frames"), ("SUN-9", "sunglasses")] {
        let response = app
            .request_authenticated(
                Method::POST,
                "/api/inventory",
                Some(json!({
                    "sku": sku,
                    "name": format!("Item {}", sku),
                    "category": category,
                    "price": 15,
                    "initial_stock": 1,
                })),
            )
            .await;
        assert_eq!(response.status(), StatusCode::CREATED);
    }

    let response = app
        .request_authenticated(Method::GET, "/api/inventory?category=frames", None)
        .await;
    let listing = read_json(response).await;
    assert_eq!(listing["total"], 2);

    let response = app
        .request_authenticated(Method::GET, "/api/inventory?search=SUN", None)
        .await;
    let listing = read_json(response).await;
    assert_eq!(listing["total"], 1);
    assert_eq!(listing["products"][0]["sku"], "SUN-9");
}
