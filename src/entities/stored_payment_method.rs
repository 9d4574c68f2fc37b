use chrono::{DateTime, Utc};
use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

/// A card the user agreed to keep for later checkouts.
///
/// Only the masked digits and expiry are readable; the full card lives in
/// `sealed_card`, encrypted by [`crate::services::card_vault::CardVault`].
#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "stored_payment_methods")]
pub struct Model {
    #[sea_orm(primary_key)]
    pub id: i32,
    pub user_id: i32,
    #[sea_orm(nullable)]
    pub alias: Option<String>,
    #[sea_orm(nullable)]
    pub holder_name: Option<String>,
    pub last4: String,
    pub exp_month: String,
    pub exp_year: String,
    #[sea_orm(column_type = "Text")]
    #[serde(skip_serializing)]
    pub sealed_card: String,
    pub is_default: bool,
    pub is_simulated: bool,
    pub created_at: DateTime<Utc>,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    #[sea_orm(
        belongs_to = "super::user::Entity",
        from = "Column::UserId",
        to = "super::user::Column::Id"
    )]
    User,
}

impl Related<super::user::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::User.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}
