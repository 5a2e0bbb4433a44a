use std::sync::Arc;

use axum::{
    body::Body,
    http::{Method, Request},
    middleware, Router,
};
use chrono::Utc;
use optica_pos_api::{
    auth::{AuthConfig, AuthService},
    config::AppConfig,
    db,
    entities::user,
    handlers::AppServices,
    AppState,
};
use sea_orm::{ActiveModelTrait, Set};
use serde_json::Value;
use tempfile::TempDir;
use tower::ServiceExt;
use uuid::Uuid;

const TEST_JWT_SECRET: &str =
    "integration_test_secret_key_that_is_definitely_64_characters_long_0123";

/// Harness that spins up the full router against a throwaway SQLite file.
pub struct TestApp {
    router: Router,
    pub state: AppState,
    token: String,
    pub admin_id: Uuid,
    auth_service: Arc<AuthService>,
    _db_dir: TempDir,
}

impl TestApp {
    /// Construct a new test application with fresh database state.
    pub async fn new() -> Self {
        let db_dir = TempDir::new().expect("failed to create temp dir for test database");
        let db_path = db_dir.path().join("optica_test.db");

        let mut cfg = AppConfig::new(
            format!("sqlite://{}?mode=rwc", db_path.display()),
            TEST_JWT_SECRET.to_string(),
            3600,
            "127.0.0.1".to_string(),
            0,
            "test".to_string(),
        );
        cfg.auto_migrate = true;
        cfg.db_max_connections = 1;
        cfg.db_min_connections = 1;

        let pool = db::establish_connection_from_app_config(&cfg)
            .await
            .expect("failed to create test database");
        db::run_migrations(&pool)
            .await
            .expect("failed to run migrations in tests");
        let db_arc = Arc::new(pool);

        let auth_service = Arc::new(AuthService::new(AuthConfig::from_app_config(&cfg)));
        let services = AppServices::new(db_arc.clone(), auth_service.clone(), &cfg);

        let state = AppState {
            db: db_arc.clone(),
            config: cfg,
            auth_service: auth_service.clone(),
            services,
        };

        // Seed an administrator directly; registration only creates staff.
        let admin_id = Uuid::new_v4();
        let hashed = auth_service
            .hash_password("admin-password-123")
            .expect("hash admin password");
        let admin = user::ActiveModel {
            id: Set(admin_id),
            email: Set("admin@optica.test".to_string()),
            username: Set("admin".to_string()),
            full_name: Set("Store Admin".to_string()),
            hashed_password: Set(hashed),
            role: Set("manager".to_string()),
            is_active: Set(true),
            is_admin: Set(true),
            commission_rate: Set(None),
            created_at: Set(Utc::now()),
            updated_at: Set(None),
        }
        .insert(&*db_arc)
        .await
        .expect("seed admin user");

        let token = auth_service
            .generate_token(&admin)
            .expect("issue admin token")
            .access_token;

        let auth_for_layer = auth_service.clone();
        let router = Router::new()
            .merge(optica_pos_api::handlers::health::routes())
            .merge(optica_pos_api::api_routes())
            .layer(middleware::from_fn_with_state(
                auth_for_layer,
                |axum::extract::State(auth): axum::extract::State<Arc<AuthService>>,
                 mut req: Request<Body>,
                 next: axum::middleware::Next| async move {
                    req.extensions_mut().insert(auth);
                    next.run(req).await
                },
            ))
            .layer(middleware::from_fn(
                optica_pos_api::request_id::request_id_middleware,
            ))
            .with_state(state.clone());

        Self {
            router,
            state,
            token,
            admin_id,
            auth_service,
            _db_dir: db_dir,
        }
    }

    /// Bearer token for the seeded administrator.
    pub fn token(&self) -> &str {
        &self.token
    }

    #[allow(dead_code)]
    pub fn auth_service(&self) -> Arc<AuthService> {
        self.auth_service.clone()
    }

    /// Send a request against the router with an optional bearer token.
    pub async fn request(
        &self,
        method: Method,
        uri: &str,
        body: Option<Value>,
        token: Option<&str>,
    ) -> axum::response::Response {
        let mut builder = Request::builder().method(method).uri(uri);

        if let Some(tok) = token {
            builder = builder.header("authorization", format!("Bearer {}", tok));
        }

        let body = if let Some(json) = body {
            builder = builder.header("content-type", "application/json");
            Body::from(serde_json::to_vec(&json).expect("failed to serialize json request body"))
        } else {
            Body::empty()
        };

        let request = builder.body(body).expect("failed to build request");
        self.router
            .clone()
            .oneshot(request)
            .await
            .expect("router error during test request")
    }

    /// Convenience helper for requests as the seeded administrator.
    pub async fn request_authenticated(
        &self,
        method: Method,
        uri: &str,
        body: Option<Value>,
    ) -> axum::response::Response {
        self.request(method, uri, body, Some(self.token())).await
    }

    /// Register a cashier through the API and log them in, returning
    /// (user id, bearer token).
    #[allow(dead_code)]
    pub async fn register_and_login(&self, username: &str) -> (Uuid, String) {
        let response = self
            .request(
                Method::POST,
                "/api/users/register",
                Some(serde_json::json!({
                    "email": format!("{}@optica.test", username),
                    "username": username,
                    "full_name": format!("Test {}", username),
                    "password": "cashier-password-123",
                })),
                None,
            )
            .await;
        assert_eq!(response.status(), axum::http::StatusCode::CREATED);
        let registered = read_json(response).await;
        let user_id = Uuid::parse_str(registered["id"].as_str().expect("user id"))
            .expect("user id is a uuid");

        let response = self
            .request(
                Method::POST,
                "/api/users/token",
                Some(serde_json::json!({
                    "username": username,
                    "password": "cashier-password-123",
                })),
                None,
            )
            .await;
        assert_eq!(response.status(), axum::http::StatusCode::OK);
        let login = read_json(response).await;
        let token = login["access_token"].as_str().expect("token").to_string();

        (user_id, token)
    }

    /// Create a product through the API, returning its id.
    #[allow(dead_code)]
    pub async fn create_product(&self, sku: &str, price: i64, initial_stock: i32) -> Uuid {
        let response = self
            .request_authenticated(
                Method::POST,
                "/api/inventory",
                Some(serde_json::json!({
                    "sku": sku,
                    "name": format!("Product {}", sku),
                    "category": "frames",
                    "price": price,
                    "initial_stock": initial_stock,
                })),
            )
            .await;
        assert_eq!(response.status(), axum::http::StatusCode::CREATED);
        let product = read_json(response).await;
        Uuid::parse_str(product["id"].as_str().expect("product id")).expect("product id is a uuid")
    }
}

/// Read a response body as JSON.
pub async fn read_json(response: axum::response::Response) -> Value {
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .expect("failed to read response body");
    serde_json::from_slice(&bytes).expect("response body is not valid json")
}
