//! User management service

use std::sync::Arc;

use uuid::Uuid;
use validator::Validate;

use crate::{
    error::{AppError, AppResult},
    models::user::{CreateUser, User},
    repository::Store,
};

#[derive(Clone)]
pub struct UsersService {
    store: Arc<dyn Store>,
}

impl UsersService {
    pub fn new(store: Arc<dyn Store>) -> Self {
        Self { store }
    }

    pub async fn list_users(&self) -> AppResult<Vec<User>> {
        self.store.users_list().await
    }

    pub async fn get_user(&self, id: Uuid) -> AppResult<User> {
        self.store.users_get(id).await
    }

    pub async fn create_user(&self, user: CreateUser) -> AppResult<User> {
        user.validate()?;
        self.store.users_create(&user).await
    }

    /// Delete a user who holds no open reservation. The user row stays
    /// locked between the check and the delete, so a concurrent reservation
    /// either commits first and is counted or fails with `NotFound`.
    pub async fn delete_user(&self, id: Uuid) -> AppResult<()> {
        let mut uow = self.store.begin().await?;
        uow.user_for_update(id).await?;

        let open = uow.reservations_open_for_user(id).await?;
        if open > 0 {
            return Err(AppError::Conflict(format!(
                "User {} still has {} open reservation(s)",
                id, open
            )));
        }

        uow.user_delete(id).await?;
        uow.commit().await?;
        tracing::info!(user_id = %id, "User deleted");
        Ok(())
    }
}
