use crate::{
    auth::{hash_password, verify_password, AuthKeys},
    db::DbPool,
    entities::{user, user::UserRole},
    errors::ServiceError,
    events::{Event, EventSender},
};
use chrono::{DateTime, Utc};
use sea_orm::sea_query::{Expr, Func};
use sea_orm::{
    ActiveModelTrait, ColumnTrait, EntityTrait, PaginatorTrait, QueryFilter, QueryOrder, Set,
};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::{info, instrument, warn};
use utoipa::ToSchema;
use validator::Validate;

#[derive(Debug, Serialize, Deserialize, Validate, ToSchema)]
pub struct CreateUserRequest {
    #[validate(length(min = 1, message = "name is required"))]
    pub name: String,
    #[validate(email(message = "invalid email address"))]
    pub email: String,
    #[validate(length(min = 1, message = "phone number is required"))]
    pub phone_number: String,
    pub role: UserRole,
    #[validate(length(min = 8, message = "password must be at least 8 characters"))]
    pub password: String,
}

#[derive(Debug, Serialize, Deserialize, Validate, ToSchema)]
pub struct UpdateUserRequest {
    pub name: Option<String>,
    #[validate(email(message = "invalid email address"))]
    pub email: Option<String>,
    pub phone_number: Option<String>,
}

#[derive(Debug, Serialize, Deserialize, Validate, ToSchema)]
pub struct LoginRequest {
    #[validate(email(message = "invalid email address"))]
    pub email: String,
    #[validate(length(min = 1, message = "password is required"))]
    pub password: String,
}

#[derive(Debug, Serialize, Deserialize, Validate, ToSchema)]
pub struct ChangePasswordRequest {
    #[validate(length(min = 1, message = "current password is required"))]
    pub current_password: String,
    #[validate(length(min = 8, message = "password must be at least 8 characters"))]
    pub new_password: String,
}

/// User row without credential material.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct UserResponse {
    pub id: i64,
    pub name: String,
    pub email: String,
    pub phone_number: String,
    pub role: String,
    pub created_at: DateTime<Utc>,
}

impl From<user::Model> for UserResponse {
    fn from(u: user::Model) -> Self {
        Self {
            id: u.id,
            name: u.name,
            email: u.email,
            phone_number: u.phone_number,
            role: u.role,
            created_at: u.created_at,
        }
    }
}

/// Compact user projection embedded in other resources.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct UserSummary {
    pub id: i64,
    pub name: String,
    pub phone_number: String,
}

impl From<&user::Model> for UserSummary {
    fn from(u: &user::Model) -> Self {
        Self {
            id: u.id,
            name: u.name.clone(),
            phone_number: u.phone_number.clone(),
        }
    }
}

#[derive(Debug, Serialize, ToSchema)]
pub struct LoginResponse {
    pub access_token: String,
    pub user: UserResponse,
}

#[derive(Debug, Default)]
pub struct UserFilter {
    pub page: u64,
    pub page_size: u64,
    pub search: Option<String>,
    pub role: Option<String>,
}

#[derive(Clone)]
pub struct UserService {
    db: Arc<DbPool>,
    auth_keys: AuthKeys,
    event_sender: EventSender,
}

impl UserService {
    pub fn new(db: Arc<DbPool>, auth_keys: AuthKeys, event_sender: EventSender) -> Self {
        Self {
            db,
            auth_keys,
            event_sender,
        }
    }

    #[instrument(skip(self, request), fields(email = %request.email))]
    pub async fn create_user(
        &self,
        request: CreateUserRequest,
    ) -> Result<UserResponse, ServiceError> {
        request.validate()?;

        let exists = user::Entity::find()
            .filter(user::Column::Email.eq(request.email.clone()))
            .count(&*self.db)
            .await?;
        if exists > 0 {
            return Err(ServiceError::ValidationError(format!(
                "a user with email {} already exists",
                request.email
            )));
        }

        let password_hash = hash_password(&request.password)?;

        let model = user::ActiveModel {
            name: Set(request.name),
            email: Set(request.email),
            phone_number: Set(request.phone_number),
            role: Set(request.role.to_string()),
            password_hash: Set(password_hash),
            deleted: Set(false),
            created_at: Set(Utc::now()),
            ..Default::default()
        }
        .insert(&*self.db)
        .await?;

        info!(user_id = model.id, "user created");

        if let Err(e) = self.event_sender.send(Event::UserCreated(model.id)).await {
            warn!(error = %e, "failed to publish user event");
        }

        Ok(model.into())
    }

    pub async fn get_user(&self, id: i64) -> Result<UserResponse, ServiceError> {
        self.get_active_model(id).await.map(Into::into)
    }

    async fn get_active_model(&self, id: i64) -> Result<user::Model, ServiceError> {
        user::Entity::find_by_id(id)
            .filter(user::Column::Deleted.eq(false))
            .one(&*self.db)
            .await?
            .ok_or_else(|| ServiceError::NotFound("user".to_string()))
    }

    #[instrument(skip(self, request), fields(user_id = id))]
    pub async fn update_user(
        &self,
        id: i64,
        request: UpdateUserRequest,
    ) -> Result<UserResponse, ServiceError> {
        request.validate()?;

        let existing = self.get_active_model(id).await?;
        let mut active: user::ActiveModel = existing.into();

        if let Some(name) = request.name {
            active.name = Set(name);
        }
        if let Some(email) = request.email {
            active.email = Set(email);
        }
        if let Some(phone_number) = request.phone_number {
            active.phone_number = Set(phone_number);
        }

        Ok(active.update(&*self.db).await?.into())
    }

    #[instrument(skip(self), fields(user_id = id))]
    pub async fn delete_user(&self, id: i64) -> Result<(), ServiceError> {
        let existing = self.get_active_model(id).await?;

        let mut active: user::ActiveModel = existing.into();
        active.deleted = Set(true);
        active.update(&*self.db).await?;

        info!(user_id = id, "user deleted");

        Ok(())
    }

    pub async fn list_users(
        &self,
        filter: &UserFilter,
    ) -> Result<(Vec<UserResponse>, u64), ServiceError> {
        let mut query = user::Entity::find()
            .filter(user::Column::Deleted.eq(false))
            .order_by_desc(user::Column::CreatedAt);

        if let Some(role) = &filter.role {
            query = query.filter(user::Column::Role.eq(role.clone()));
        }
        if let Some(search) = &filter.search {
            let needle = format!("%{}%", search.to_lowercase());
            query = query.filter(
                Expr::expr(Func::lower(Expr::col((user::Entity, user::Column::Name))))
                    .like(needle),
            );
        }

        let paginator = query.paginate(&*self.db, filter.page_size.max(1));
        let total = paginator.num_items().await?;
        let users = paginator.fetch_page(filter.page.max(1) - 1).await?;

        Ok((users.into_iter().map(Into::into).collect(), total))
    }

    /// Verifies credentials and issues an access token.
    #[instrument(skip(self, request), fields(email = %request.email))]
    pub async fn login(&self, request: LoginRequest) -> Result<LoginResponse, ServiceError> {
        request.validate()?;

        let user = user::Entity::find()
            .filter(user::Column::Email.eq(request.email.clone()))
            .filter(user::Column::Deleted.eq(false))
            .one(&*self.db)
            .await?
            .ok_or_else(|| ServiceError::AuthError("invalid email or password".to_string()))?;

        if !verify_password(&request.password, &user.password_hash)? {
            return Err(ServiceError::AuthError(
                "invalid email or password".to_string(),
            ));
        }

        let access_token = self.auth_keys.create_token(&user)?;

        info!(user_id = user.id, "user logged in");

        Ok(LoginResponse {
            access_token,
            user: user.into(),
        })
    }

    #[instrument(skip(self, request), fields(user_id = id))]
    pub async fn change_password(
        &self,
        id: i64,
        request: ChangePasswordRequest,
    ) -> Result<(), ServiceError> {
        request.validate()?;

        let user = self.get_active_model(id).await?;

        if !verify_password(&request.current_password, &user.password_hash)? {
            return Err(ServiceError::AuthError(
                "current password is incorrect".to_string(),
            ));
        }

        let mut active: user::ActiveModel = user.into();
        active.password_hash = Set(hash_password(&request.new_password)?);
        active.update(&*self.db).await?;

        Ok(())
    }

    /// Reseller accounts as id/name options for the dashboard selects.
    pub async fn reseller_options(&self) -> Result<Vec<UserSummary>, ServiceError> {
        let resellers = user::Entity::find()
            .filter(user::Column::Deleted.eq(false))
            .filter(user::Column::Role.eq(UserRole::Staff.to_string()))
            .order_by_asc(user::Column::Name)
            .all(&*self.db)
            .await?;

        Ok(resellers.iter().map(UserSummary::from).collect())
    }
}
