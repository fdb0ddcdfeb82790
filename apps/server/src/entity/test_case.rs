//! TestCase entity for SeaORM.

use sea_orm::entity::prelude::*;

#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel)]
#[sea_orm(table_name = "test_cases")]
pub struct Model {
    #[sea_orm(primary_key)]
    pub id: i64,
    pub run_id: i64,
    pub component_id: i64,
    pub owner_id: i64,
    pub test_name: String,
    pub test_command: String,
    pub status: String,
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
    #[sea_orm(
        belongs_to = "super::user::Entity",
        from = "Column::OwnerId",
        to = "super::user::Column::Id"
    )]
    Owner,
    #[sea_orm(has_many = "super::test_error::Entity")]
    TestError,
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

impl Related<super::test_error::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::TestError.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}
