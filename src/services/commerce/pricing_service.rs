use crate::{
    entities::{product, Product},
    errors::ServiceError,
};
use rust_decimal::{Decimal, RoundingStrategy};
use sea_orm::{ConnectionTrait, DatabaseConnection, EntityTrait};
use std::sync::Arc;
use tracing::instrument;

/// Rounds a money amount to cents, half away from zero.
pub fn round_money(amount: Decimal) -> Decimal {
    amount.round_dp_with_strategy(2, RoundingStrategy::MidpointAwayFromZero)
}

/// `quantity * unit_price`, rounded to cents.
pub fn line_subtotal(quantity: i32, unit_price: Decimal) -> Decimal {
    round_money(Decimal::from(quantity) * unit_price)
}

/// Sum of the already rounded line subtotals.
pub fn order_total<I>(subtotals: I) -> Decimal
where
    I: IntoIterator<Item = Decimal>,
{
    subtotals.into_iter().fold(Decimal::ZERO, |acc, s| acc + s)
}

/// Resolves the price a product sells for right now.
#[derive(Debug, Clone)]
pub struct PricingService {
    db: Arc<DatabaseConnection>,
}

impl PricingService {
    pub fn new(db: Arc<DatabaseConnection>) -> Self {
        Self { db }
    }

    /// Effective unit price of an active product.
    #[instrument(skip(self))]
    pub async fn effective_price(&self, product_id: i32) -> Result<Decimal, ServiceError> {
        let product = Self::active_product(&*self.db, product_id).await?;
        Ok(round_money(product.effective_price()))
    }

    /// Loads an active product on any connection, including an open transaction.
    ///
    /// Missing and inactive products are both `NotFound`.
    pub async fn active_product<C: ConnectionTrait>(
        conn: &C,
        product_id: i32,
    ) -> Result<product::Model, ServiceError> {
        Product::find_by_id(product_id)
            .one(conn)
            .await?
            .filter(|p| p.is_active)
            .ok_or_else(|| ServiceError::NotFound(format!("Product {} not found", product_id)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    #[test]
    fn subtotal_rounds_half_away_from_zero() {
        assert_eq!(line_subtotal(2, dec!(50.00)), dec!(100.00));
        assert_eq!(line_subtotal(3, dec!(0.335)), dec!(1.01));
        assert_eq!(line_subtotal(1, dec!(19.995)), dec!(20.00));
    }

    #[test]
    fn total_is_sum_of_subtotals() {
        let subtotals = vec![line_subtotal(2, dec!(25.50)), line_subtotal(4, dec!(12.25))];
        assert_eq!(order_total(subtotals), dec!(100.00));
        assert_eq!(order_total(Vec::new()), Decimal::ZERO);
    }
}
