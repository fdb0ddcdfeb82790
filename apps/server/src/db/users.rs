//! Database operations for users.

use chrono::Utc;
use sea_orm::sea_query::Expr;
use sea_orm::{
    ActiveModelTrait, ColumnTrait, EntityTrait, NotSet, PaginatorTrait, QueryFilter, QueryOrder,
    Set, TransactionTrait,
};

use crate::entity::{project, test_case, user, user_project};
use crate::error::{AppError, AppResult};
use crate::models::Role;

use super::DbPool;

/// Validated profile columns to overwrite; `None` leaves a column as is.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ProfileChanges {
    pub name: Option<String>,
    /// `Some(None)` clears the phone number.
    pub phone: Option<Option<String>>,
    pub email: Option<String>,
}

/// Fields of a user being created.
#[derive(Debug, Clone)]
pub struct NewUser {
    pub email: String,
    pub name: String,
    pub phone: Option<String>,
    pub password_hash: String,
    pub role: Role,
    pub projects: Vec<i64>,
}

impl DbPool {
    /// Find a user by email (case-insensitive).
    pub async fn find_user_by_email(&self, email: &str) -> AppResult<Option<user::Model>> {
        user::Entity::find()
            .filter(user::Column::Email.eq(email.trim().to_lowercase()))
            .one(self.connection())
            .await
            .map_err(|e| AppError::Database(format!("Failed to find user: {}", e)))
    }

    /// Get a user by ID.
    pub async fn get_user(&self, id: i64) -> AppResult<Option<user::Model>> {
        user::Entity::find_by_id(id)
            .one(self.connection())
            .await
            .map_err(|e| AppError::Database(format!("Failed to get user: {}", e)))
    }

    /// All users, by name.
    pub async fn list_users(&self) -> AppResult<Vec<user::Model>> {
        user::Entity::find()
            .order_by_asc(user::Column::Name)
            .all(self.connection())
            .await
            .map_err(|e| AppError::Database(format!("Failed to list users: {}", e)))
    }

    /// Create a user and its project assignments in one transaction.
    pub async fn create_user(&self, new: NewUser) -> AppResult<user::Model> {
        let email = new.email.trim().to_lowercase();

        let txn = self
            .connection()
            .begin()
            .await
            .map_err(|e| AppError::Database(format!("Failed to begin transaction: {}", e)))?;

        let existing = user::Entity::find()
            .filter(user::Column::Email.eq(email.as_str()))
            .count(&txn)
            .await
            .map_err(|e| AppError::Database(format!("Failed to check email: {}", e)))?;
        if existing > 0 {
            return Err(AppError::InvalidInput(format!(
                "A user with email '{}' already exists",
                email
            )));
        }

        let now = Utc::now();
        let created = user::ActiveModel {
            id: NotSet,
            email: Set(email),
            name: Set(new.name.trim().to_string()),
            phone: Set(new.phone),
            password_hash: Set(new.password_hash),
            role: Set(new.role.as_str().to_string()),
            created_at: Set(now),
            updated_at: Set(now),
        }
        .insert(&txn)
        .await
        .map_err(|e| AppError::Database(format!("Failed to insert user: {}", e)))?;

        let mut projects = new.projects;
        projects.sort_unstable();
        projects.dedup();

        for project_id in projects {
            let found = project::Entity::find_by_id(project_id)
                .count(&txn)
                .await
                .map_err(|e| AppError::Database(format!("Failed to check project: {}", e)))?;
            if found == 0 {
                return Err(AppError::NotFound(format!("Project {}", project_id)));
            }

            user_project::ActiveModel {
                user_id: Set(created.id),
                project_id: Set(project_id),
                role: Set(new.role.as_str().to_string()),
                created_at: Set(now),
            }
            .insert(&txn)
            .await
            .map_err(|e| AppError::Database(format!("Failed to assign project: {}", e)))?;
        }

        txn.commit()
            .await
            .map_err(|e| AppError::Database(format!("Failed to commit user: {}", e)))?;

        Ok(created)
    }

    /// Overwrite the given profile columns of a user. `None` when the user is gone.
    pub async fn update_profile(
        &self,
        id: i64,
        changes: ProfileChanges,
    ) -> AppResult<Option<user::Model>> {
        let txn = self
            .connection()
            .begin()
            .await
            .map_err(|e| AppError::Database(format!("Failed to begin transaction: {}", e)))?;

        let Some(existing) = user::Entity::find_by_id(id)
            .one(&txn)
            .await
            .map_err(|e| AppError::Database(format!("Failed to get user: {}", e)))?
        else {
            return Ok(None);
        };

        let mut active: user::ActiveModel = existing.into();
        if let Some(email) = changes.email {
            let email = email.trim().to_lowercase();
            let taken = user::Entity::find()
                .filter(user::Column::Email.eq(email.as_str()))
                .filter(user::Column::Id.ne(id))
                .count(&txn)
                .await
                .map_err(|e| AppError::Database(format!("Failed to check email: {}", e)))?;
            if taken > 0 {
                return Err(AppError::InvalidInput(format!(
                    "A user with email '{}' already exists",
                    email
                )));
            }
            active.email = Set(email);
        }
        if let Some(name) = changes.name {
            active.name = Set(name);
        }
        if let Some(phone) = changes.phone {
            active.phone = Set(phone);
        }
        active.updated_at = Set(Utc::now());

        let updated = active
            .update(&txn)
            .await
            .map_err(|e| AppError::Database(format!("Failed to update profile: {}", e)))?;

        txn.commit()
            .await
            .map_err(|e| AppError::Database(format!("Failed to commit profile: {}", e)))?;

        Ok(Some(updated))
    }

    /// Replace a user's password hash. Returns false when no such user exists.
    pub async fn set_password_hash(&self, id: i64, password_hash: String) -> AppResult<bool> {
        let result = user::Entity::update_many()
            .col_expr(user::Column::PasswordHash, Expr::value(password_hash))
            .col_expr(user::Column::UpdatedAt, Expr::value(Utc::now()))
            .filter(user::Column::Id.eq(id))
            .exec(self.connection())
            .await
            .map_err(|e| AppError::Database(format!("Failed to update password: {}", e)))?;
        Ok(result.rows_affected > 0)
    }

    /// Delete a user. Returns false when no such user exists.
    ///
    /// Users that own recorded test cases are kept so history stays intact.
    pub async fn delete_user(&self, id: i64) -> AppResult<bool> {
        let owned = test_case::Entity::find()
            .filter(test_case::Column::OwnerId.eq(id))
            .count(self.connection())
            .await
            .map_err(|e| AppError::Database(format!("Failed to check test ownership: {}", e)))?;
        if owned > 0 {
            return Err(AppError::InvalidInput(format!(
                "User {} owns {} recorded test cases and cannot be deleted",
                id, owned
            )));
        }

        let result = user::Entity::delete_by_id(id)
            .exec(self.connection())
            .await
            .map_err(|e| AppError::Database(format!("Failed to delete user: {}", e)))?;
        Ok(result.rows_affected > 0)
    }
}
