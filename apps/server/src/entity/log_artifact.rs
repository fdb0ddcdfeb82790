//! LogArtifact entity: stable pointer from (run, component) to a stored log file.

use sea_orm::entity::prelude::*;

#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel)]
#[sea_orm(table_name = "log_artifacts")]
pub struct Model {
    #[sea_orm(primary_key, auto_increment = false)]
    pub id: Uuid,
    pub run_id: i64,
    pub component_id: i64,
    pub file_name: String,
    pub created_at: DateTimeUtc,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    #[sea_orm(
        belongs_to = "super::regression_run::Entity",
        from = "Column::RunId",
        to = "super::regression_run::Column::Id",
        on_delete = "Cascade"
    )]
    RegressionRun,
    #[sea_orm(
        belongs_to = "super::component::Entity",
        from = "Column::ComponentId",
        to = "super::component::Column::Id",
        on_delete = "Cascade"
    )]
    Component,
}

impl Related<super::regression_run::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::RegressionRun.def()
    }
}

impl Related<super::component::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Component.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}
