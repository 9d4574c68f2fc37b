use crate::{
    entities::{stored_payment_method, StoredPaymentMethod, User},
    errors::ServiceError,
    services::card_vault::{CardDetails, CardVault},
};
use chrono::{DateTime, Utc};
use sea_orm::{
    sea_query::Expr, ActiveModelTrait, ColumnTrait, ConnectionTrait, DatabaseConnection,
    EntityTrait, PaginatorTrait, QueryFilter, QueryOrder, Set, TransactionTrait,
};
use serde::Serialize;
use std::sync::Arc;
use tracing::{info, instrument};
use utoipa::ToSchema;

/// What clients may see of a stored card.
#[derive(Debug, Clone, PartialEq, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct StoredMethodView {
    pub id: i32,
    pub alias: Option<String>,
    pub holder_name: Option<String>,
    pub last4: String,
    pub exp_month: String,
    pub exp_year: String,
    pub is_default: bool,
    pub sim: bool,
    pub created_at: DateTime<Utc>,
}

impl From<stored_payment_method::Model> for StoredMethodView {
    fn from(model: stored_payment_method::Model) -> Self {
        Self {
            id: model.id,
            alias: model.alias,
            holder_name: model.holder_name,
            last4: model.last4,
            exp_month: model.exp_month,
            exp_year: model.exp_year,
            is_default: model.is_default,
            sim: model.is_simulated,
            created_at: model.created_at,
        }
    }
}

#[derive(Debug, Clone, Default)]
pub struct SaveMethodInput {
    pub alias: Option<String>,
    pub make_default: bool,
    pub simulated: bool,
}

/// Editable fields. Card data itself is immutable.
#[derive(Debug, Clone, Default)]
pub struct UpdateMethodInput {
    /// When present, the method must belong to this user.
    pub user_id: Option<i32>,
    pub alias: Option<String>,
    pub holder_name: Option<String>,
    pub is_default: Option<bool>,
}

#[derive(Clone)]
pub struct PaymentMethodService {
    db: Arc<DatabaseConnection>,
    vault: Arc<CardVault>,
}

impl PaymentMethodService {
    pub fn new(db: Arc<DatabaseConnection>, vault: Arc<CardVault>) -> Self {
        Self { db, vault }
    }

    /// Seals and stores a card. A user's first card becomes the default.
    #[instrument(skip(self, card), fields(last4 = %card.last4()))]
    pub async fn save_card(
        &self,
        user_id: i32,
        card: &CardDetails,
        input: SaveMethodInput,
    ) -> Result<StoredMethodView, ServiceError> {
        card.validate()?;

        let txn = self.db.begin().await?;
        if User::find_by_id(user_id).one(&txn).await?.is_none() {
            return Err(ServiceError::NotFound(format!("User {} not found", user_id)));
        }

        let existing = StoredPaymentMethod::find()
            .filter(stored_payment_method::Column::UserId.eq(user_id))
            .count(&txn)
            .await?;
        let make_default = input.make_default || existing == 0;
        if make_default {
            clear_defaults(&txn, user_id).await?;
        }

        let model = stored_payment_method::ActiveModel {
            user_id: Set(user_id),
            alias: Set(input.alias.filter(|a| !a.trim().is_empty())),
            holder_name: Set(card.holder_name.clone()),
            last4: Set(card.last4()),
            exp_month: Set(card.normalized_month()),
            exp_year: Set(card.normalized_year()),
            sealed_card: Set(self.vault.seal(user_id, card)?),
            is_default: Set(make_default),
            is_simulated: Set(input.simulated),
            created_at: Set(Utc::now()),
            ..Default::default()
        }
        .insert(&txn)
        .await?;
        txn.commit().await?;

        info!(user_id, method_id = model.id, "Payment method stored");
        Ok(model.into())
    }

    /// Default first, then newest.
    #[instrument(skip(self))]
    pub async fn list_for_user(&self, user_id: i32) -> Result<Vec<StoredMethodView>, ServiceError> {
        let methods = StoredPaymentMethod::find()
            .filter(stored_payment_method::Column::UserId.eq(user_id))
            .order_by_desc(stored_payment_method::Column::IsDefault)
            .order_by_desc(stored_payment_method::Column::CreatedAt)
            .order_by_desc(stored_payment_method::Column::Id)
            .all(&*self.db)
            .await?;
        Ok(methods.into_iter().map(Into::into).collect())
    }

    #[instrument(skip(self))]
    pub async fn update(
        &self,
        method_id: i32,
        input: UpdateMethodInput,
    ) -> Result<StoredMethodView, ServiceError> {
        let txn = self.db.begin().await?;
        let method = StoredPaymentMethod::find_by_id(method_id)
            .one(&txn)
            .await?
            .ok_or_else(|| ServiceError::NotFound(format!("Payment method {} not found", method_id)))?;

        if let Some(user_id) = input.user_id.filter(|id| *id != method.user_id) {
            return Err(ServiceError::ValidationError(format!(
                "Payment method {} does not belong to user {}",
                method_id, user_id
            )));
        }

        if input.is_default == Some(true) {
            clear_defaults(&txn, method.user_id).await?;
        }

        let mut active: stored_payment_method::ActiveModel = method.into();
        if let Some(alias) = input.alias {
            active.alias = Set(Some(alias).filter(|a| !a.trim().is_empty()));
        }
        if let Some(holder) = input.holder_name {
            active.holder_name = Set(Some(holder).filter(|h| !h.trim().is_empty()));
        }
        if let Some(is_default) = input.is_default {
            active.is_default = Set(is_default);
        }
        let updated = active.update(&txn).await?;
        txn.commit().await?;

        Ok(updated.into())
    }

    #[instrument(skip(self))]
    pub async fn delete(&self, method_id: i32) -> Result<(), ServiceError> {
        let result = StoredPaymentMethod::delete_by_id(method_id)
            .exec(&*self.db)
            .await?;
        if result.rows_affected == 0 {
            return Err(ServiceError::NotFound(format!(
                "Payment method {} not found",
                method_id
            )));
        }
        info!(method_id, "Payment method deleted");
        Ok(())
    }

    /// Opens a stored card for a one-click charge.
    #[instrument(skip(self))]
    pub async fn load_card(
        &self,
        user_id: i32,
        method_id: i32,
    ) -> Result<(stored_payment_method::Model, CardDetails), ServiceError> {
        let method = StoredPaymentMethod::find_by_id(method_id)
            .one(&*self.db)
            .await?
            .ok_or_else(|| ServiceError::NotFound(format!("Payment method {} not found", method_id)))?;

        if method.user_id != user_id {
            return Err(ServiceError::ValidationError(format!(
                "Payment method {} does not belong to user {}",
                method_id, user_id
            )));
        }

        let card = self.vault.open(user_id, &method.sealed_card)?;
        Ok((method, card))
    }
}

async fn clear_defaults<C: ConnectionTrait>(conn: &C, user_id: i32) -> Result<(), ServiceError> {
    StoredPaymentMethod::update_many()
        .col_expr(stored_payment_method::Column::IsDefault, Expr::value(false))
        .filter(stored_payment_method::Column::UserId.eq(user_id))
        .filter(stored_payment_method::Column::IsDefault.eq(true))
        .exec(conn)
        .await?;
    Ok(())
}
