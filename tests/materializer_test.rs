mod common;

use assert_matches::assert_matches;
use common::TestApp;
use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use sea_orm::{ColumnTrait, EntityTrait, PaginatorTrait, QueryFilter};
use storefront_api::{
    entities::{cart, order, Cart, Order, OrderItem, Payment, PaymentMethodKind},
    errors::ServiceError,
    services::commerce::{CartSnapshot, MaterializeRequest, OrderMaterializer},
};

fn request(snapshot: &CartSnapshot, reference: &str, charged: Option<Decimal>) -> MaterializeRequest {
    MaterializeRequest {
        user_id: snapshot.user_id,
        cart_id: snapshot.cart_id,
        lines: snapshot.items.clone(),
        gateway_reference: reference.to_string(),
        method: PaymentMethodKind::Card,
        charged_amount: charged,
        shipping_address: None,
        notes: None,
    }
}

async fn snapshot(app: &TestApp, user_id: i32) -> CartSnapshot {
    app.state
        .services
        .cart
        .get_active_cart_lines(user_id)
        .await
        .unwrap()
}

#[tokio::test]
async fn order_total_equals_sum_of_lines() {
    let app = TestApp::new().await;
    let user = app.seed_user("Ada", None).await;
    let mug = app.seed_product("MUG", dec!(25.50), 10).await;
    let pen = app.seed_product("PEN", dec!(12.25), 10).await;
    app.add_to_cart(user.id, mug.id, 3).await;
    app.add_to_cart(user.id, pen.id, 2).await;
    let snap = snapshot(&app, user.id).await;

    let order = OrderMaterializer::new(app.db.clone())
        .materialize(request(&snap, "TX-SUM", Some(dec!(101.00))))
        .await
        .unwrap();

    assert_eq!(order.total, dec!(101.00));
    assert_eq!(
        order.lines.iter().map(|l| l.subtotal).sum::<Decimal>(),
        order.total
    );

    let items = OrderItem::find().all(&*app.db).await.unwrap();
    assert_eq!(items.len(), 2);
    let stored = Order::find_by_id(order.order_id)
        .one(&*app.db)
        .await
        .unwrap()
        .unwrap();
    assert_eq!(stored.total, dec!(101.00));
    let payment = Payment::find().one(&*app.db).await.unwrap().unwrap();
    assert_eq!(payment.amount, dec!(101.00));
    assert_eq!(payment.gateway_reference, "TX-SUM");

    let closed = Cart::find_by_id(snap.cart_id)
        .one(&*app.db)
        .await
        .unwrap()
        .unwrap();
    assert!(!closed.is_active);
}

#[tokio::test]
async fn duplicate_reference_rolls_back_every_write() {
    let app = TestApp::new().await;
    let materializer = OrderMaterializer::new(app.db.clone());
    let ada = app.seed_user("Ada", None).await;
    let bob = app.seed_user("Bob", None).await;
    let mug = app.seed_product("MUG", dec!(25.50), 10).await;
    app.add_to_cart(ada.id, mug.id, 1).await;
    app.add_to_cart(bob.id, mug.id, 2).await;

    materializer
        .materialize(request(&snapshot(&app, ada.id).await, "TX-DUP", None))
        .await
        .unwrap();

    let bob_cart = snapshot(&app, bob.id).await;
    let err = materializer
        .materialize(request(&bob_cart, "TX-DUP", None))
        .await
        .unwrap_err();
    assert_matches!(err, ServiceError::DatabaseError(_));

    // Order and line inserts ran before the payment insert failed; none survived
    assert_eq!(Order::find().count(&*app.db).await.unwrap(), 1);
    assert_eq!(OrderItem::find().count(&*app.db).await.unwrap(), 1);
    assert_eq!(
        Order::find()
            .filter(order::Column::UserId.eq(bob.id))
            .count(&*app.db)
            .await
            .unwrap(),
        0
    );
    let after = snapshot(&app, bob.id).await;
    assert_eq!(after.cart_id, bob_cart.cart_id);
    assert_eq!(after.items.len(), 1);
}

#[tokio::test]
async fn second_materialization_of_a_cart_conflicts() {
    let app = TestApp::new().await;
    let materializer = OrderMaterializer::new(app.db.clone());
    let user = app.seed_user("Ada", None).await;
    let mug = app.seed_product("MUG", dec!(25.50), 10).await;
    app.add_to_cart(user.id, mug.id, 1).await;
    let snap = snapshot(&app, user.id).await;

    materializer
        .materialize(request(&snap, "TX-A", None))
        .await
        .unwrap();
    let err = materializer
        .materialize(request(&snap, "TX-B", None))
        .await
        .unwrap_err();
    assert_matches!(err, ServiceError::Conflict(_));
    assert_eq!(Order::find().count(&*app.db).await.unwrap(), 1);
}

#[tokio::test]
async fn concurrent_materializations_produce_one_order() {
    let app = TestApp::new().await;
    let materializer = OrderMaterializer::new(app.db.clone());
    let user = app.seed_user("Ada", None).await;
    let mug = app.seed_product("MUG", dec!(25.50), 10).await;
    app.add_to_cart(user.id, mug.id, 1).await;
    let snap = snapshot(&app, user.id).await;

    let (first, second) = tokio::join!(
        materializer.materialize(request(&snap, "TX-1", None)),
        materializer.materialize(request(&snap, "TX-2", None)),
    );
    assert_eq!(
        [first.is_ok(), second.is_ok()].iter().filter(|ok| **ok).count(),
        1
    );
    assert_eq!(Order::find().count(&*app.db).await.unwrap(), 1);
}

#[tokio::test]
async fn cart_changed_after_pricing_conflicts() {
    let app = TestApp::new().await;
    let user = app.seed_user("Ada", None).await;
    let mug = app.seed_product("MUG", dec!(25.50), 10).await;
    app.add_to_cart(user.id, mug.id, 1).await;
    let snap = snapshot(&app, user.id).await;
    app.add_to_cart(user.id, mug.id, 1).await;

    let err = OrderMaterializer::new(app.db.clone())
        .materialize(request(&snap, "TX-STALE", None))
        .await
        .unwrap_err();
    assert_matches!(err, ServiceError::Conflict(_));
    assert_eq!(Order::find().count(&*app.db).await.unwrap(), 0);
}

#[tokio::test]
async fn charged_amount_must_match_recomputed_total() {
    let app = TestApp::new().await;
    let user = app.seed_user("Ada", None).await;
    let mug = app.seed_product("MUG", dec!(25.50), 10).await;
    app.add_to_cart(user.id, mug.id, 2).await;
    let snap = snapshot(&app, user.id).await;

    let err = OrderMaterializer::new(app.db.clone())
        .materialize(request(&snap, "TX-DRIFT", Some(dec!(50.00))))
        .await
        .unwrap_err();
    assert_matches!(err, ServiceError::Conflict(_));
    assert_eq!(Payment::find().count(&*app.db).await.unwrap(), 0);
    assert!(Cart::find_by_id(snap.cart_id)
        .one(&*app.db)
        .await
        .unwrap()
        .unwrap()
        .is_active);
}

#[tokio::test]
async fn only_the_owner_can_materialize_a_cart() {
    let app = TestApp::new().await;
    let ada = app.seed_user("Ada", None).await;
    let eve = app.seed_user("Eve", None).await;
    let mug = app.seed_product("MUG", dec!(25.50), 10).await;
    app.add_to_cart(ada.id, mug.id, 1).await;

    let mut req = request(&snapshot(&app, ada.id).await, "TX-EVE", None);
    req.user_id = eve.id;
    let err = OrderMaterializer::new(app.db.clone())
        .materialize(req)
        .await
        .unwrap_err();
    assert_matches!(err, ServiceError::NotFound(_));
}

#[tokio::test]
async fn other_users_carts_are_untouched() {
    let app = TestApp::new().await;
    let ada = app.seed_user("Ada", None).await;
    let bob = app.seed_user("Bob", None).await;
    let mug = app.seed_product("MUG", dec!(25.50), 10).await;
    app.add_to_cart(ada.id, mug.id, 1).await;
    app.add_to_cart(bob.id, mug.id, 3).await;

    OrderMaterializer::new(app.db.clone())
        .materialize(request(&snapshot(&app, ada.id).await, "TX-ADA", None))
        .await
        .unwrap();

    let bob_cart = snapshot(&app, bob.id).await;
    assert_eq!(bob_cart.items.len(), 1);
    assert_eq!(bob_cart.items[0].quantity, 3);
    assert_eq!(
        Cart::find()
            .filter(cart::Column::UserId.eq(bob.id))
            .filter(cart::Column::IsActive.eq(true))
            .count(&*app.db)
            .await
            .unwrap(),
        1
    );
}
