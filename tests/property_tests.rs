//! Property-based tests for money arithmetic, card normalization and gateway
//! response interpretation.

use proptest::prelude::*;
use rust_decimal::Decimal;
use serde_json::json;
use storefront_api::{
    entities::ProductModel,
    errors::ServiceError,
    services::{
        card_vault::CardDetails,
        commerce::pricing_service::{line_subtotal, order_total, round_money},
        payment_gateway::interpret_response,
    },
};

// Strategies for generating test data
fn price_strategy() -> impl Strategy<Value = Decimal> {
    (0i64..1_000_000, 0i64..100).prop_map(|(units, cents)| Decimal::new(units * 100 + cents, 2))
}

fn quantity_strategy() -> impl Strategy<Value = i32> {
    1i32..1_000
}

fn raw_amount_strategy() -> impl Strategy<Value = Decimal> {
    (0i64..10_000_000_000, 0u32..8).prop_map(|(mantissa, scale)| Decimal::new(mantissa, scale))
}

fn product(list_price: Decimal, discount_price: Option<Decimal>, on_sale: bool) -> ProductModel {
    ProductModel {
        id: 1,
        name: "Mug".to_string(),
        sku: "MUG".to_string(),
        list_price,
        discount_price,
        on_sale,
        stock: 1,
        is_active: true,
        image_url: None,
    }
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(500))]

    #[test]
    fn cent_prices_multiply_without_loss(price in price_strategy(), quantity in quantity_strategy()) {
        prop_assert_eq!(line_subtotal(quantity, price), price * Decimal::from(quantity));
    }

    #[test]
    fn rounding_is_idempotent_and_within_half_a_cent(amount in raw_amount_strategy()) {
        let rounded = round_money(amount);
        prop_assert!(rounded.scale() <= 2);
        prop_assert_eq!(round_money(rounded), rounded);
        prop_assert!((rounded - amount).abs() <= Decimal::new(5, 3));
    }

    #[test]
    fn total_is_order_independent(
        lines in prop::collection::vec((quantity_strategy(), price_strategy()), 1..12)
    ) {
        let subtotals: Vec<Decimal> = lines.iter().map(|(q, p)| line_subtotal(*q, *p)).collect();
        let mut reversed = subtotals.clone();
        reversed.reverse();

        let total = order_total(subtotals.clone());
        prop_assert_eq!(total, order_total(reversed));
        prop_assert_eq!(total, subtotals.iter().copied().sum::<Decimal>());
        prop_assert!(total > Decimal::ZERO || subtotals.iter().all(|s| s.is_zero()));
    }
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(300))]

    #[test]
    fn discount_applies_only_while_on_sale(
        list in price_strategy(),
        discount in price_strategy(),
        on_sale in any::<bool>(),
    ) {
        let p = product(list, Some(discount), on_sale);
        let expected = if on_sale { discount } else { list };
        prop_assert_eq!(p.effective_price(), expected);
        prop_assert_eq!(product(list, None, on_sale).effective_price(), list);
    }

    #[test]
    fn card_number_separators_are_stripped(groups in prop::collection::vec("[0-9]{4}", 4)) {
        let spaced = groups.join(" ");
        let dashed = groups.join("-");
        let plain = groups.concat();

        let a = CardDetails::new(&spaced, "12", "30", "123", None);
        let b = CardDetails::new(&dashed, "12", "30", "123", None);
        prop_assert_eq!(&a.card_number, &plain);
        prop_assert_eq!(&b.card_number, &plain);
        prop_assert_eq!(a.last4(), plain[plain.len() - 4..].to_string());
        prop_assert!(a.validate().is_ok());
    }

    #[test]
    fn anything_but_approved_is_a_decline(status in "[a-z_]{1,12}") {
        prop_assume!(status != "approved");
        let result = interpret_response(true, json!({"status": status, "reference": "TX"}));
        prop_assert!(matches!(result, Err(ServiceError::Declined { .. })), "expected Declined, got {:?}", result);
    }

    #[test]
    fn approved_keeps_gateway_reference(reference in "[A-Za-z0-9]{1,24}") {
        let approval = interpret_response(true, json!({"status": "approved", "reference": reference.clone()}));
        prop_assert!(approval.is_ok());
        prop_assert_eq!(approval.unwrap().reference, reference);
    }
}
