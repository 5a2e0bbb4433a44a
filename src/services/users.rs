use crate::{
    auth::AuthService,
    db::DbPool,
    entities::user::{self, Entity as UserEntity, Model as UserModel},
    errors::ServiceError,
};
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use sea_orm::{
    ActiveModelTrait, ColumnTrait, EntityTrait, PaginatorTrait, QueryFilter, QueryOrder, Set,
};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use strum::{Display, EnumIter, EnumString};
use tracing::{error, info, instrument, warn};
use utoipa::ToSchema;
use uuid::Uuid;
use validator::Validate;

/// Staff roles. Role strings are stored on the user row and drive the
/// commission rule lookup.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Display, EnumString, EnumIter,
)]
#[strum(serialize_all = "lowercase")]
#[serde(rename_all = "lowercase")]
pub enum UserRole {
    Cashier,
    Manager,
    Optometrist,
}

#[derive(Debug, Serialize, Deserialize, Validate, ToSchema)]
pub struct RegisterUserRequest {
    #[validate(email(message = "Invalid email address"))]
    pub email: String,
    #[validate(length(min = 3, max = 50, message = "Username must be 3-50 characters"))]
    pub username: String,
    #[validate(length(min = 1, max = 255, message = "Full name is required"))]
    pub full_name: String,
    #[validate(length(min = 8, message = "Password must be at least 8 characters"))]
    pub password: String,
    /// Defaults to `cashier` when omitted.
    pub role: Option<String>,
}

#[derive(Debug, Serialize, Deserialize, Validate, ToSchema)]
pub struct LoginRequest {
    #[validate(length(min = 1, message = "Username is required"))]
    pub username: String,
    #[validate(length(min = 1, message = "Password is required"))]
    pub password: String,
}

#[derive(Debug, Serialize, Deserialize, Validate, ToSchema)]
pub struct UpdateProfileRequest {
    #[validate(email(message = "Invalid email address"))]
    pub email: Option<String>,
    #[validate(length(min = 3, max = 50, message = "Username must be 3-50 characters"))]
    pub username: Option<String>,
    #[validate(length(min = 1, max = 255))]
    pub full_name: Option<String>,
    #[validate(length(min = 8, message = "Password must be at least 8 characters"))]
    pub password: Option<String>,
}

#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct UserResponse {
    pub id: Uuid,
    pub email: String,
    pub username: String,
    pub full_name: String,
    pub role: String,
    pub is_active: bool,
    pub is_admin: bool,
    pub commission_rate: Option<Decimal>,
    pub created_at: DateTime<Utc>,
    pub updated_at: Option<DateTime<Utc>>,
}

#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct LoginResponse {
    pub access_token: String,
    pub token_type: String,
    pub expires_in: i64,
    pub user: UserResponse,
}

#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct UserListResponse {
    pub users: Vec<UserResponse>,
    pub total: u64,
    pub page: u64,
    pub per_page: u64,
}

/// Service for account management and credential checks
#[derive(Clone)]
pub struct UserService {
    db_pool: Arc<DbPool>,
    auth_service: Arc<AuthService>,
}

impl UserService {
    /// Creates a new user service instance
    pub fn new(db_pool: Arc<DbPool>, auth_service: Arc<AuthService>) -> Self {
        Self {
            db_pool,
            auth_service,
        }
    }

    /// Registers a new user account
    #[instrument(skip(self, request), fields(username = %request.username))]
    pub async fn register(&self, request: RegisterUserRequest) -> Result<UserResponse, ServiceError> {
        request
            .validate()
            .map_err(|e| ServiceError::ValidationError(e.to_string()))?;

        let role = match request.role.as_deref() {
            Some(raw) => raw.parse::<UserRole>().map_err(|_| {
                ServiceError::ValidationError(format!("Unknown role: {}", raw))
            })?,
            None => UserRole::Cashier,
        };

        let db = &*self.db_pool;

        let email_taken = UserEntity::find()
            .filter(user::Column::Email.eq(request.email.clone()))
            .count(db)
            .await
            .map_err(|e| {
                error!(error = %e, "Failed to check email uniqueness");
                ServiceError::DatabaseError(e)
            })?;
        if email_taken > 0 {
            return Err(ServiceError::ValidationError(
                "Email is already registered".to_string(),
            ));
        }

        let username_taken = UserEntity::find()
            .filter(user::Column::Username.eq(request.username.clone()))
            .count(db)
            .await
            .map_err(|e| {
                error!(error = %e, "Failed to check username uniqueness");
                ServiceError::DatabaseError(e)
            })?;
        if username_taken > 0 {
            return Err(ServiceError::ValidationError(
                "Username is already taken".to_string(),
            ));
        }

        let hashed_password = self.auth_service.hash_password(&request.password).map_err(|e| {
            error!(error = %e, "Failed to hash password during registration");
            ServiceError::HashError(e.to_string())
        })?;

        let now = Utc::now();
        let user_model = user::ActiveModel {
            id: Set(Uuid::new_v4()),
            email: Set(request.email),
            username: Set(request.username),
            full_name: Set(request.full_name),
            hashed_password: Set(hashed_password),
            role: Set(role.to_string()),
            is_active: Set(true),
            is_admin: Set(false),
            commission_rate: Set(None),
            created_at: Set(now),
            updated_at: Set(None),
        }
        .insert(db)
        .await
        .map_err(|e| {
            error!(error = %e, "Failed to create user");
            ServiceError::DatabaseError(e)
        })?;

        info!(user_id = %user_model.id, role = %user_model.role, "User registered");

        Ok(self.model_to_response(user_model))
    }

    /// Checks credentials and issues an access token
    #[instrument(skip(self, password))]
    pub async fn authenticate(
        &self,
        username: &str,
        password: &str,
    ) -> Result<LoginResponse, ServiceError> {
        let db = &*self.db_pool;

        let user = UserEntity::find()
            .filter(user::Column::Username.eq(username))
            .one(db)
            .await
            .map_err(|e| {
                error!(error = %e, "Failed to look up user for login");
                ServiceError::DatabaseError(e)
            })?;

        let user = user.ok_or_else(|| {
            warn!(username = %username, "Login attempt for unknown username");
            ServiceError::Unauthorized("Invalid username or password".to_string())
        })?;

        if !self.auth_service.verify_password(password, &user.hashed_password) {
            warn!(user_id = %user.id, "Login attempt with wrong password");
            return Err(ServiceError::Unauthorized(
                "Invalid username or password".to_string(),
            ));
        }

        if !user.is_active {
            warn!(user_id = %user.id, "Login attempt for deactivated account");
            return Err(ServiceError::Unauthorized(
                "User account is deactivated".to_string(),
            ));
        }

        let token = self.auth_service.generate_token(&user).map_err(|e| {
            error!(error = %e, user_id = %user.id, "Failed to issue access token");
            ServiceError::InternalServerError
        })?;

        info!(user_id = %user.id, "User authenticated");

        Ok(LoginResponse {
            access_token: token.access_token,
            token_type: token.token_type,
            expires_in: token.expires_in,
            user: self.model_to_response(user),
        })
    }

    /// Retrieves a user by id
    #[instrument(skip(self), fields(user_id = %user_id))]
    pub async fn get_user(&self, user_id: Uuid) -> Result<UserResponse, ServiceError> {
        let db = &*self.db_pool;

        let user = UserEntity::find_by_id(user_id)
            .one(db)
            .await
            .map_err(|e| {
                error!(error = %e, user_id = %user_id, "Failed to fetch user");
                ServiceError::DatabaseError(e)
            })?
            .ok_or_else(|| ServiceError::NotFound(format!("User {} not found", user_id)))?;

        Ok(self.model_to_response(user))
    }

    /// Updates the caller's profile, optionally changing the password
    #[instrument(skip(self, request), fields(user_id = %user_id))]
    pub async fn update_profile(
        &self,
        user_id: Uuid,
        request: UpdateProfileRequest,
    ) -> Result<UserResponse, ServiceError> {
        request
            .validate()
            .map_err(|e| ServiceError::ValidationError(e.to_string()))?;

        let db = &*self.db_pool;

        let user = UserEntity::find_by_id(user_id)
            .one(db)
            .await
            .map_err(|e| {
                error!(error = %e, user_id = %user_id, "Failed to fetch user for update");
                ServiceError::DatabaseError(e)
            })?
            .ok_or_else(|| ServiceError::NotFound(format!("User {} not found", user_id)))?;

        if let Some(ref email) = request.email {
            let taken = UserEntity::find()
                .filter(user::Column::Email.eq(email.clone()))
                .filter(user::Column::Id.ne(user_id))
                .count(db)
                .await
                .map_err(|e| {
                    error!(error = %e, "Failed to check email uniqueness");
                    ServiceError::DatabaseError(e)
                })?;
            if taken > 0 {
                return Err(ServiceError::ValidationError(
                    "Email is already registered".to_string(),
                ));
            }
        }

        if let Some(ref username) = request.username {
            let taken = UserEntity::find()
                .filter(user::Column::Username.eq(username.clone()))
                .filter(user::Column::Id.ne(user_id))
                .count(db)
                .await
                .map_err(|e| {
                    error!(error = %e, "Failed to check username uniqueness");
                    ServiceError::DatabaseError(e)
                })?;
            if taken > 0 {
                return Err(ServiceError::ValidationError(
                    "Username is already taken".to_string(),
                ));
            }
        }

        let mut active: user::ActiveModel = user.into();
        if let Some(email) = request.email {
            active.email = Set(email);
        }
        if let Some(username) = request.username {
            active.username = Set(username);
        }
        if let Some(full_name) = request.full_name {
            active.full_name = Set(full_name);
        }
        if let Some(password) = request.password {
            let hashed = self.auth_service.hash_password(&password).map_err(|e| {
                error!(error = %e, "Failed to hash password during profile update");
                ServiceError::HashError(e.to_string())
            })?;
            active.hashed_password = Set(hashed);
        }
        active.updated_at = Set(Some(Utc::now()));

        let updated = active.update(db).await.map_err(|e| {
            error!(error = %e, user_id = %user_id, "Failed to update user profile");
            ServiceError::DatabaseError(e)
        })?;

        info!(user_id = %user_id, "User profile updated");

        Ok(self.model_to_response(updated))
    }

    /// Deactivates an account. Rows are never deleted so order attribution
    /// survives.
    #[instrument(skip(self), fields(user_id = %user_id))]
    pub async fn deactivate(&self, user_id: Uuid) -> Result<(), ServiceError> {
        let db = &*self.db_pool;

        let user = UserEntity::find_by_id(user_id)
            .one(db)
            .await
            .map_err(|e| {
                error!(error = %e, user_id = %user_id, "Failed to fetch user for deactivation");
                ServiceError::DatabaseError(e)
            })?
            .ok_or_else(|| ServiceError::NotFound(format!("User {} not found", user_id)))?;

        let mut active: user::ActiveModel = user.into();
        active.is_active = Set(false);
        active.updated_at = Set(Some(Utc::now()));

        active.update(db).await.map_err(|e| {
            error!(error = %e, user_id = %user_id, "Failed to deactivate user");
            ServiceError::DatabaseError(e)
        })?;

        info!(user_id = %user_id, "User deactivated");

        Ok(())
    }

    /// Lists user accounts with pagination
    #[instrument(skip(self))]
    pub async fn list_users(&self, page: u64, per_page: u64) -> Result<UserListResponse, ServiceError> {
        let db = &*self.db_pool;

        let paginator = UserEntity::find()
            .order_by_asc(user::Column::Username)
            .paginate(db, per_page);

        let total = paginator.num_items().await.map_err(|e| {
            error!(error = %e, "Failed to count users");
            ServiceError::DatabaseError(e)
        })?;

        let users = paginator.fetch_page(page - 1).await.map_err(|e| {
            error!(error = %e, page = page, per_page = per_page, "Failed to fetch users page");
            ServiceError::DatabaseError(e)
        })?;

        Ok(UserListResponse {
            users: users
                .into_iter()
                .map(|u| self.model_to_response(u))
                .collect(),
            total,
            page,
            per_page,
        })
    }

    /// Flips the admin flag on another account
    #[instrument(skip(self), fields(acting_user = %acting_user, target = %target_id))]
    pub async fn toggle_admin(
        &self,
        acting_user: Uuid,
        target_id: Uuid,
    ) -> Result<UserResponse, ServiceError> {
        if acting_user == target_id {
            return Err(ServiceError::BusinessRuleViolation(
                "Administrators cannot change their own admin flag".to_string(),
            ));
        }

        let db = &*self.db_pool;

        let user = UserEntity::find_by_id(target_id)
            .one(db)
            .await
            .map_err(|e| {
                error!(error = %e, user_id = %target_id, "Failed to fetch user for admin toggle");
                ServiceError::DatabaseError(e)
            })?
            .ok_or_else(|| ServiceError::NotFound(format!("User {} not found", target_id)))?;

        let was_admin = user.is_admin;
        let mut active: user::ActiveModel = user.into();
        active.is_admin = Set(!was_admin);
        active.updated_at = Set(Some(Utc::now()));

        let updated = active.update(db).await.map_err(|e| {
            error!(error = %e, user_id = %target_id, "Failed to toggle admin flag");
            ServiceError::DatabaseError(e)
        })?;

        info!(user_id = %target_id, is_admin = updated.is_admin, "Admin flag toggled");

        Ok(self.model_to_response(updated))
    }

    /// Converts a user model to response format, dropping the password hash
    fn model_to_response(&self, model: UserModel) -> UserResponse {
        UserResponse {
            id: model.id,
            email: model.email,
            username: model.username,
            full_name: model.full_name,
            role: model.role,
            is_active: model.is_active,
            is_admin: model.is_admin,
            commission_rate: model.commission_rate,
            created_at: model.created_at,
            updated_at: model.updated_at,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::auth::AuthConfig;
    use sea_orm::DatabaseConnection;
    use std::time::Duration;

    fn test_service() -> UserService {
        let config = AuthConfig::new(
            "a".repeat(64),
            "optica-pos".to_string(),
            "optica-pos-api".to_string(),
            Duration::from_secs(3600),
        );
        UserService::new(
            Arc::new(DatabaseConnection::Disconnected),
            Arc::new(AuthService::new(config)),
        )
    }

    #[test]
    fn role_strings_round_trip() {
        assert_eq!(UserRole::Cashier.to_string(), "cashier");
        assert_eq!(UserRole::Manager.to_string(), "manager");
        assert_eq!(UserRole::Optometrist.to_string(), "optometrist");
        assert_eq!("manager".parse::<UserRole>().unwrap(), UserRole::Manager);
        assert!("janitor".parse::<UserRole>().is_err());
    }

    #[test]
    fn model_to_response_keeps_profile_fields() {
        let now = Utc::now();
        let user_id = Uuid::new_v4();
        let model = UserModel {
            id: user_id,
            email: "cashier@example.com".to_string(),
            username: "cashier1".to_string(),
            full_name: "Front Desk".to_string(),
            hashed_password: "$argon2id$v=19$secret".to_string(),
            role: "cashier".to_string(),
            is_active: true,
            is_admin: false,
            commission_rate: None,
            created_at: now,
            updated_at: None,
        };

        let response = test_service().model_to_response(model);

        assert_eq!(response.id, user_id);
        assert_eq!(response.username, "cashier1");
        assert_eq!(response.role, "cashier");
        assert!(response.is_active);
        assert!(!response.is_admin);
        let serialized = serde_json::to_string(&response).unwrap();
        assert!(!serialized.contains("argon2"));
    }

    #[tokio::test]
    async fn register_rejects_unknown_role() {
        let request = RegisterUserRequest {
            email: "new@example.com".to_string(),
            username: "newuser".to_string(),
            full_name: "New User".to_string(),
            password: "longenough".to_string(),
            role: Some("janitor".to_string()),
        };

        let err = test_service().register(request).await.unwrap_err();
        assert!(matches!(err, ServiceError::ValidationError(_)));
    }

    #[tokio::test]
    async fn register_rejects_short_password() {
        let request = RegisterUserRequest {
            email: "new@example.com".to_string(),
            username: "newuser".to_string(),
            full_name: "New User".to_string(),
            password: "short".to_string(),
            role: None,
        };

        let err = test_service().register(request).await.unwrap_err();
        assert!(matches!(err, ServiceError::ValidationError(_)));
    }
}
