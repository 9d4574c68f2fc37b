use rust_decimal::Decimal;
use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

/// Catalog product
#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "products")]
pub struct Model {
    #[sea_orm(primary_key)]
    pub id: i32,
    pub name: String,
    #[sea_orm(unique)]
    pub sku: String,
    #[sea_orm(column_type = "Decimal(Some((12, 2)))")]
    pub list_price: Decimal,
    #[sea_orm(column_type = "Decimal(Some((12, 2)))", nullable)]
    pub discount_price: Option<Decimal>,
    /// Discount flag; `discount_price` only applies while set
    pub on_sale: bool,
    pub stock: i32,
    pub is_active: bool,
    #[sea_orm(nullable)]
    pub image_url: Option<String>,
}

impl Model {
    /// List price, or the discount price while a discount is in effect.
    pub fn effective_price(&self) -> Decimal {
        match (self.on_sale, self.discount_price) {
            (true, Some(discounted)) => discounted,
            _ => self.list_price,
        }
    }
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    #[sea_orm(has_many = "super::cart_item::Entity")]
    CartItems,
    #[sea_orm(has_many = "super::order_item::Entity")]
    OrderItems,
}

impl Related<super::cart_item::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::CartItems.def()
    }
}

impl Related<super::order_item::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::OrderItems.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    fn product(on_sale: bool, discount_price: Option<Decimal>) -> Model {
        Model {
            id: 1,
            name: "Mug".into(),
            sku: "MUG-1".into(),
            list_price: dec!(50.00),
            discount_price,
            on_sale,
            stock: 5,
            is_active: true,
            image_url: None,
        }
    }

    #[test]
    fn discount_applies_only_when_flagged() {
        assert_eq!(product(true, Some(dec!(40.00))).effective_price(), dec!(40.00));
        assert_eq!(product(false, Some(dec!(40.00))).effective_price(), dec!(50.00));
        assert_eq!(product(true, None).effective_price(), dec!(50.00));
    }
}
