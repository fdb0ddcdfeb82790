//! Project, module and component DTOs.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

use crate::entity::project;

/// Request body for `POST /api/projects/add`.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct CreateProjectRequest {
    pub name: String,
    pub description: Option<String>,
    #[serde(default)]
    pub modules: Vec<NewModule>,
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct NewModule {
    pub name: String,
    pub description: Option<String>,
    #[serde(default)]
    pub components: Vec<NewComponent>,
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct NewComponent {
    pub name: String,
    pub description: Option<String>,
}

/// Project list item.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct ProjectResponse {
    pub id: i64,
    pub name: String,
    pub description: Option<String>,
    pub created_at: DateTime<Utc>,
}

impl From<project::Model> for ProjectResponse {
    fn from(m: project::Model) -> Self {
        Self {
            id: m.id,
            name: m.name,
            description: m.description,
            created_at: m.created_at,
        }
    }
}

/// Project with its module/component tree.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct ProjectDetail {
    pub id: i64,
    pub name: String,
    pub description: Option<String>,
    pub created_at: DateTime<Utc>,
    pub modules: Vec<ProjectModule>,
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct ProjectModule {
    pub id: i64,
    pub name: String,
    pub description: Option<String>,
    pub components: Vec<ProjectComponent>,
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct ProjectComponent {
    pub id: i64,
    pub name: String,
    pub description: Option<String>,
}

/// User assigned to a project.
#[derive(Debug, Clone, Serialize, Deserialize, sea_orm::FromQueryResult, ToSchema)]
pub struct TeamMember {
    pub user_id: i64,
    pub name: String,
    pub email: String,
    pub role: String,
}
