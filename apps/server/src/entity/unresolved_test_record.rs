//! Parsed test record that could not be attached to a component/owner.

use sea_orm::entity::prelude::*;

#[derive(Clone, Debug, PartialEq, DeriveEntityModel)]
#[sea_orm(table_name = "unresolved_test_records")]
pub struct Model {
    #[sea_orm(primary_key)]
    pub id: i64,
    pub run_id: i64,
    pub position: i32,
    pub test_name: Option<String>,
    pub component: Option<String>,
    pub owner: Option<String>,
    pub reason: String,
    pub detail: Option<String>,
    #[sea_orm(column_type = "JsonBinary")]
    pub payload: Json,
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
}

impl Related<super::regression_run::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::RegressionRun.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}
