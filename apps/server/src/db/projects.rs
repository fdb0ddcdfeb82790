//! Database queries for projects, modules, components and team assignments.

use chrono::Utc;
use sea_orm::{
    ActiveModelTrait, ColumnTrait, DatabaseBackend, EntityTrait, FromQueryResult, NotSet,
    PaginatorTrait, QueryFilter, QueryOrder, Set, Statement, TransactionTrait, Value,
};

use crate::entity::{component, module, project, user_project};
use crate::error::{AppError, AppResult};
use crate::models::{
    CreateProjectRequest, ProjectComponent, ProjectDetail, ProjectModule, TeamMember,
};

use super::DbPool;

impl DbPool {
    /// All projects, by name.
    pub async fn list_projects(&self) -> AppResult<Vec<project::Model>> {
        project::Entity::find()
            .order_by_asc(project::Column::Name)
            .all(self.connection())
            .await
            .map_err(|e| AppError::Database(format!("Failed to list projects: {}", e)))
    }

    /// Projects a user is assigned to, by name.
    pub async fn list_projects_for_user(&self, user_id: i64) -> AppResult<Vec<project::Model>> {
        let project_ids: Vec<i64> = user_project::Entity::find()
            .filter(user_project::Column::UserId.eq(user_id))
            .all(self.connection())
            .await
            .map_err(|e| AppError::Database(format!("Failed to list assignments: {}", e)))?
            .into_iter()
            .map(|a| a.project_id)
            .collect();

        if project_ids.is_empty() {
            return Ok(Vec::new());
        }

        project::Entity::find()
            .filter(project::Column::Id.is_in(project_ids))
            .order_by_asc(project::Column::Name)
            .all(self.connection())
            .await
            .map_err(|e| AppError::Database(format!("Failed to list user projects: {}", e)))
    }

    /// Get a project by ID.
    pub async fn get_project(&self, id: i64) -> AppResult<Option<project::Model>> {
        project::Entity::find_by_id(id)
            .one(self.connection())
            .await
            .map_err(|e| AppError::Database(format!("Failed to get project: {}", e)))
    }

    /// Check whether a project exists.
    pub async fn project_exists(&self, id: i64) -> AppResult<bool> {
        let count = project::Entity::find_by_id(id)
            .count(self.connection())
            .await
            .map_err(|e| AppError::Database(format!("Failed to check project: {}", e)))?;
        Ok(count > 0)
    }

    /// Whether a user is assigned to a project.
    pub async fn is_user_assigned(&self, user_id: i64, project_id: i64) -> AppResult<bool> {
        let count = user_project::Entity::find_by_id((user_id, project_id))
            .count(self.connection())
            .await
            .map_err(|e| AppError::Database(format!("Failed to check assignment: {}", e)))?;
        Ok(count > 0)
    }

    /// Project with its module/component tree.
    pub async fn get_project_detail(&self, id: i64) -> AppResult<Option<ProjectDetail>> {
        let Some(project) = self.get_project(id).await? else {
            return Ok(None);
        };

        let modules = module::Entity::find()
            .filter(module::Column::ProjectId.eq(id))
            .order_by_asc(module::Column::Name)
            .all(self.connection())
            .await
            .map_err(|e| AppError::Database(format!("Failed to list modules: {}", e)))?;

        let module_ids: Vec<i64> = modules.iter().map(|m| m.id).collect();
        let components = if module_ids.is_empty() {
            Vec::new()
        } else {
            component::Entity::find()
                .filter(component::Column::ModuleId.is_in(module_ids))
                .order_by_asc(component::Column::Name)
                .all(self.connection())
                .await
                .map_err(|e| AppError::Database(format!("Failed to list components: {}", e)))?
        };

        let modules = modules
            .into_iter()
            .map(|m| ProjectModule {
                components: components
                    .iter()
                    .filter(|c| c.module_id == m.id)
                    .map(|c| ProjectComponent {
                        id: c.id,
                        name: c.name.clone(),
                        description: c.description.clone(),
                    })
                    .collect(),
                id: m.id,
                name: m.name,
                description: m.description,
            })
            .collect();

        Ok(Some(ProjectDetail {
            id: project.id,
            name: project.name,
            description: project.description,
            created_at: project.created_at,
            modules,
        }))
    }

    /// Create a project with its modules and components in one transaction.
    pub async fn create_project(&self, req: &CreateProjectRequest) -> AppResult<i64> {
        let name = req.name.trim();

        let txn = self
            .connection()
            .begin()
            .await
            .map_err(|e| AppError::Database(format!("Failed to begin transaction: {}", e)))?;

        let existing = project::Entity::find()
            .filter(project::Column::Name.eq(name))
            .count(&txn)
            .await
            .map_err(|e| AppError::Database(format!("Failed to check project name: {}", e)))?;
        if existing > 0 {
            return Err(AppError::InvalidInput(format!(
                "Project '{}' already exists",
                name
            )));
        }

        let now = Utc::now();
        let project = project::ActiveModel {
            id: NotSet,
            name: Set(name.to_string()),
            description: Set(req.description.clone()),
            created_at: Set(now),
            updated_at: Set(now),
        }
        .insert(&txn)
        .await
        .map_err(|e| AppError::Database(format!("Failed to insert project: {}", e)))?;

        for new_module in &req.modules {
            let module = module::ActiveModel {
                id: NotSet,
                project_id: Set(project.id),
                name: Set(new_module.name.trim().to_string()),
                description: Set(new_module.description.clone()),
                created_at: Set(now),
            }
            .insert(&txn)
            .await
            .map_err(|e| AppError::Database(format!("Failed to insert module: {}", e)))?;

            for new_component in &new_module.components {
                component::ActiveModel {
                    id: NotSet,
                    module_id: Set(module.id),
                    name: Set(new_component.name.trim().to_string()),
                    description: Set(new_component.description.clone()),
                    created_at: Set(now),
                }
                .insert(&txn)
                .await
                .map_err(|e| AppError::Database(format!("Failed to insert component: {}", e)))?;
            }
        }

        txn.commit()
            .await
            .map_err(|e| AppError::Database(format!("Failed to commit project: {}", e)))?;

        Ok(project.id)
    }

    /// Users assigned to a project, with their per-project role.
    pub async fn get_project_team(&self, project_id: i64) -> AppResult<Vec<TeamMember>> {
        TeamMember::find_by_statement(Statement::from_sql_and_values(
            DatabaseBackend::Postgres,
            r#"
            SELECT u.id AS user_id, u.name, u.email, up.role
            FROM user_projects up
            INNER JOIN users u ON u.id = up.user_id
            WHERE up.project_id = $1
            ORDER BY u.name
            "#,
            [Value::from(project_id)],
        ))
        .all(self.connection())
        .await
        .map_err(|e| AppError::Database(format!("Failed to get project team: {}", e)))
    }
}
