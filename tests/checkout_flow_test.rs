mod common;

use assert_matches::assert_matches;
use common::{checkout_input, TestApp};
use grocery_api::{
    entities::{order, order_item, product, OrderStatus, UserRole},
    errors::ServiceError,
    events::Event,
    services::catalog::CatalogService,
};
use rust_decimal_macros::dec;
use sea_orm::{ActiveModelTrait, EntityTrait, PaginatorTrait, Set, TransactionTrait};

#[tokio::test]
async fn stock_five_scenario_ends_with_empty_cart_and_no_stock() {
    let app = TestApp::new().await;
    let customer = app.seed_user(UserRole::Client).await;
    let address = app.seed_address(&customer).await;
    let product = app.seed_product(dec!(100), 5).await;
    let carts = &app.state.services.cart;

    let line = carts.add(&customer, product.id, 3).await.unwrap();
    assert_matches!(
        carts.add(&customer, product.id, 3).await,
        Err(ServiceError::OutOfStock { .. })
    );
    carts.set_quantity(&customer, line.id, 5).await.unwrap();
    let cart_total = carts.totals(&customer).await.unwrap().total_price;

    let detail = app
        .state
        .services
        .checkout
        .checkout(&customer, checkout_input(address.id))
        .await
        .unwrap();

    assert_eq!(detail.order.status, OrderStatus::Pending);
    assert_eq!(detail.order.total_price, cart_total);
    assert_eq!(detail.order.delivery_price, dec!(99));
    assert_eq!(detail.final_total, dec!(599));
    assert_eq!(detail.items.len(), 1);
    assert_eq!(detail.items[0].quantity, 5);
    assert_eq!(detail.items[0].unit_price, dec!(100));
    assert!(detail.history.is_empty());

    assert_eq!(app.product(product.id).await.stock, 0);
    assert_eq!(carts.totals(&customer).await.unwrap().total_items, 0);
}

#[tokio::test]
async fn order_snapshots_contact_address_and_prices() {
    let app = TestApp::new().await;
    let customer = app.seed_user(UserRole::Client).await;
    let address = app.seed_address(&customer).await;
    let product = app.seed_product(dec!(300), 10).await;
    app.state.services.cart.add(&customer, product.id, 2).await.unwrap();

    let detail = app
        .state
        .services
        .checkout
        .checkout(&customer, checkout_input(address.id))
        .await
        .unwrap();

    let order = &detail.order;
    assert!(order.order_number.starts_with("ORD-"));
    assert_eq!(order.full_name, "Anna Ivanova");
    assert_eq!(order.delivery_address, address.full_address());
    assert_eq!(order.apartment, "48");
    assert_eq!(order.message, "Ring twice");
    assert_eq!(order.delivery_time, "Today 18:00-22:00");
    assert_eq!(order.version, 1);
    assert_eq!(detail.items[0].product_name, product.name);
    assert_eq!(detail.items[0].total_price, dec!(600));

    // Later catalog changes do not reach the order line.
    let mut active: product::ActiveModel = product.into();
    active.price = Set(dec!(999));
    active.update(&*app.state.db).await.unwrap();
    let stored = order_item::Entity::find_by_id(detail.items[0].id)
        .one(&*app.state.db)
        .await
        .unwrap()
        .unwrap();
    assert_eq!(stored.unit_price, dec!(300));
}

#[tokio::test]
async fn empty_or_small_cart_is_below_minimum() {
    let app = TestApp::new().await;
    let customer = app.seed_user(UserRole::Client).await;
    let address = app.seed_address(&customer).await;
    let checkout = &app.state.services.checkout;

    assert_matches!(
        checkout.checkout(&customer, checkout_input(address.id)).await,
        Err(ServiceError::BelowMinimum { .. })
    );

    let product = app.seed_product(dec!(120), 10).await;
    app.state.services.cart.add(&customer, product.id, 1).await.unwrap();

    let err = checkout
        .checkout(&customer, checkout_input(address.id))
        .await
        .unwrap_err();
    assert_matches!(err, ServiceError::BelowMinimum { total, minimum } => {
        assert_eq!(total, dec!(120));
        assert_eq!(minimum, dec!(500));
    });
}

#[tokio::test]
async fn foreign_address_is_rejected() {
    let app = TestApp::new().await;
    let customer = app.seed_user(UserRole::Client).await;
    let neighbour = app.seed_user(UserRole::Client).await;
    let their_address = app.seed_address(&neighbour).await;
    let product = app.seed_product(dec!(500), 10).await;
    app.state.services.cart.add(&customer, product.id, 1).await.unwrap();

    assert_matches!(
        app.state
            .services
            .checkout
            .checkout(&customer, checkout_input(their_address.id))
            .await,
        Err(ServiceError::InvalidAddress(id)) if id == their_address.id
    );
}

#[tokio::test]
async fn failed_stock_recheck_persists_nothing() {
    let app = TestApp::new().await;
    let first = app.seed_user(UserRole::Client).await;
    let second = app.seed_user(UserRole::Client).await;
    let first_address = app.seed_address(&first).await;
    let second_address = app.seed_address(&second).await;
    let product = app.seed_product(dec!(250), 3).await;
    let carts = &app.state.services.cart;
    let checkout = &app.state.services.checkout;

    carts.add(&first, product.id, 2).await.unwrap();
    carts.add(&second, product.id, 3).await.unwrap();

    checkout
        .checkout(&first, checkout_input(first_address.id))
        .await
        .unwrap();

    let err = checkout
        .checkout(&second, checkout_input(second_address.id))
        .await
        .unwrap_err();
    assert_matches!(
        err,
        ServiceError::OutOfStock {
            requested: 3,
            available: 1,
            ..
        }
    );

    let db = &*app.state.db;
    assert_eq!(order::Entity::find().count(db).await.unwrap(), 1);
    assert_eq!(order_item::Entity::find().count(db).await.unwrap(), 1);
    assert_eq!(app.product(product.id).await.stock, 1);
    assert_eq!(carts.totals(&second).await.unwrap().total_items, 3);
}

#[tokio::test]
async fn concurrent_checkouts_for_last_unit_have_one_winner() {
    let app = TestApp::new().await;
    let a = app.seed_user(UserRole::Client).await;
    let b = app.seed_user(UserRole::Client).await;
    let a_address = app.seed_address(&a).await;
    let b_address = app.seed_address(&b).await;
    let product = app.seed_product(dec!(600), 1).await;

    app.state.services.cart.add(&a, product.id, 1).await.unwrap();
    app.state.services.cart.add(&b, product.id, 1).await.unwrap();

    let checkout = app.state.services.checkout.clone();
    let other = app.state.services.checkout.clone();
    let (ra, rb) = tokio::join!(
        checkout.checkout(&a, checkout_input(a_address.id)),
        other.checkout(&b, checkout_input(b_address.id)),
    );

    let outcomes = [ra, rb];
    assert_eq!(outcomes.iter().filter(|r| r.is_ok()).count(), 1);
    assert!(outcomes
        .iter()
        .any(|r| matches!(r, Err(ServiceError::OutOfStock { .. }))));

    assert_eq!(app.product(product.id).await.stock, 0);
    assert_eq!(
        order::Entity::find().count(&*app.state.db).await.unwrap(),
        1
    );
}

#[tokio::test]
async fn guarded_decrement_refuses_more_than_stock() {
    let app = TestApp::new().await;
    let product = app.seed_product(dec!(150), 2).await;
    let db = &*app.state.db;

    let err = CatalogService::decrement_stock(db, product.id, 3)
        .await
        .unwrap_err();
    assert_matches!(
        err,
        ServiceError::OutOfStock {
            requested: 3,
            available: 2,
            ..
        }
    );
    assert_eq!(app.product(product.id).await.stock, 2);

    CatalogService::decrement_stock(db, product.id, 2).await.unwrap();
    assert_eq!(app.product(product.id).await.stock, 0);
    assert_matches!(
        CatalogService::decrement_stock(db, product.id, 1).await,
        Err(ServiceError::OutOfStock { available: 0, .. })
    );
}

#[tokio::test]
async fn lost_decrement_rolls_back_earlier_writes_in_transaction() {
    let app = TestApp::new().await;
    let bread = app.seed_product(dec!(60), 4).await;
    let butter = app.seed_product(dec!(220), 1).await;

    let txn = app.state.db.begin().await.unwrap();
    CatalogService::decrement_stock(&txn, bread.id, 2).await.unwrap();
    let err = CatalogService::decrement_stock(&txn, butter.id, 2)
        .await
        .unwrap_err();
    assert_matches!(err, ServiceError::OutOfStock { available: 1, .. });
    txn.rollback().await.unwrap();

    assert_eq!(app.product(bread.id).await.stock, 4);
    assert_eq!(app.product(butter.id).await.stock, 1);
}

#[tokio::test]
async fn checkout_emits_events_after_commit() {
    let mut app = TestApp::new().await;
    let customer = app.seed_user(UserRole::Client).await;
    let address = app.seed_address(&customer).await;
    let product = app.seed_product(dec!(700), 2).await;
    app.state.services.cart.add(&customer, product.id, 1).await.unwrap();
    app.drain_events();

    let detail = app
        .state
        .services
        .checkout
        .checkout(&customer, checkout_input(address.id))
        .await
        .unwrap();

    let events = app.drain_events();
    assert_matches!(events.first(), Some(Event::OrderCreated(id)) if *id == detail.order.id);
    assert!(events.iter().any(|e| matches!(
        e,
        Event::StockDecremented { product_id, quantity: 1 } if *product_id == product.id
    )));
    assert_matches!(
        events.last(),
        Some(Event::CheckoutCompleted { order_id, .. }) if *order_id == detail.order.id
    );
}

#[tokio::test]
async fn customer_order_list_is_newest_first() {
    let app = TestApp::new().await;
    let customer = app.seed_user(UserRole::Client).await;
    let address = app.seed_address(&customer).await;
    let product = app.seed_product(dec!(500), 10).await;
    let services = &app.state.services;

    let mut placed = Vec::new();
    for _ in 0..2 {
        services.cart.add(&customer, product.id, 1).await.unwrap();
        let detail = services
            .checkout
            .checkout(&customer, checkout_input(address.id))
            .await
            .unwrap();
        placed.push(detail.order.id);
        tokio::time::sleep(std::time::Duration::from_millis(5)).await;
    }

    let listed = services.orders.list_orders_for(&customer).await.unwrap();
    assert_eq!(listed.len(), 2);
    assert_eq!(listed[0].id, placed[1]);
    assert_eq!(listed[0].item_count, 1);
    assert_eq!(listed[0].final_total, dec!(599));
}
