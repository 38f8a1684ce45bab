//! Marketplace Workflow Tests
//!
//! Listing, purchasing, and the guarantees that hold under contention.

use crate::*;
use std::sync::Barrier;
use std::thread;
use std::time::Duration;

// =============================================================================
// SCENARIO
// =============================================================================

#[test]
fn test_list_then_purchase_scenario() {
    let ratchet = create_ratchet();
    let market = &ratchet.market;

    market.create_user("17", "Frank", 43).unwrap();
    market.create_user("27", "Bill", 125).unwrap();
    market.add_to_inventory("17", &["ItemL", "ItemM", "ItemN"]).unwrap();
    market.add_to_inventory("27", &["ItemO", "ItemP", "ItemQ"]).unwrap();

    assert_eq!(market.list_item("ItemM", "17", 97).unwrap(), ListOutcome::Listed);
    assert_eq!(market.inventory("17").unwrap(), vec!["ItemL", "ItemN"]);

    assert_eq!(
        market.purchase_item("27", "ItemM", "17", 97).unwrap(),
        PurchaseOutcome::Purchased
    );
    assert_eq!(market.funds("17").unwrap(), Some(140));
    assert_eq!(market.funds("27").unwrap(), Some(28));
    assert_eq!(
        market.inventory("27").unwrap(),
        vec!["ItemM", "ItemO", "ItemP", "ItemQ"]
    );
    assert!(market.listings().unwrap().is_empty());
}

#[test]
fn test_relisting_after_purchase() {
    let ratchet = create_ratchet();
    let market = &ratchet.market;

    market.create_user("a", "Ann", 100).unwrap();
    market.create_user("b", "Ben", 100).unwrap();
    market.add_to_inventory("a", &["Lamp"]).unwrap();

    market.list_item("Lamp", "a", 40).unwrap();
    market.purchase_item("b", "Lamp", "a", 40).unwrap();
    assert_eq!(market.list_item("Lamp", "b", 55).unwrap(), ListOutcome::Listed);
    assert_eq!(
        market.purchase_item("a", "Lamp", "b", 55).unwrap(),
        PurchaseOutcome::Purchased
    );

    assert_eq!(market.funds("a").unwrap(), Some(85));
    assert_eq!(market.funds("b").unwrap(), Some(115));
    assert_eq!(market.inventory("a").unwrap(), vec!["Lamp"]);
}

// =============================================================================
// CONTENTION
// =============================================================================

#[test]
fn test_single_listing_sold_exactly_once() {
    const BUYERS: usize = 8;

    let ratchet = Arc::new(create_ratchet());
    ratchet.market.create_user("seller", "Sam", 0).unwrap();
    ratchet.market.add_to_inventory("seller", &["Relic"]).unwrap();
    ratchet.market.list_item("Relic", "seller", 50).unwrap();
    for i in 0..BUYERS {
        ratchet.market.create_user(&format!("buyer{}", i), "Buyer", 100).unwrap();
    }

    let barrier = Arc::new(Barrier::new(BUYERS));
    let handles: Vec<_> = (0..BUYERS)
        .map(|i| {
            let ratchet = Arc::clone(&ratchet);
            let barrier = Arc::clone(&barrier);
            thread::spawn(move || {
                barrier.wait();
                ratchet
                    .market
                    .purchase_item(&format!("buyer{}", i), "Relic", "seller", 50)
                    .unwrap()
            })
        })
        .collect();
    let outcomes: Vec<_> = handles.into_iter().map(|h| h.join().unwrap()).collect();

    let winners = outcomes
        .iter()
        .filter(|o| **o == PurchaseOutcome::Purchased)
        .count();
    assert_eq!(winners, 1, "outcomes: {:?}", outcomes);
    assert!(outcomes.iter().all(|o| matches!(
        o,
        PurchaseOutcome::Purchased | PurchaseOutcome::PriceChanged { listed: None }
    )));
    assert_eq!(ratchet.market.funds("seller").unwrap(), Some(50));

    let holders = (0..BUYERS)
        .filter(|i| {
            ratchet
                .market
                .inventory(&format!("buyer{}", i))
                .unwrap()
                .contains(&"Relic".to_string())
        })
        .count();
    assert_eq!(holders, 1);
}

#[test]
fn test_concurrent_trades_conserve_funds_and_items() {
    const TRADERS: usize = 4;
    const ITEMS_EACH: usize = 10;

    let ratchet = Arc::new(create_ratchet());
    for t in 0..TRADERS {
        let user = format!("t{}", t);
        ratchet.market.create_user(&user, "Trader", 1_000).unwrap();
        for i in 0..ITEMS_EACH {
            let item = format!("item{}_{}", t, i);
            ratchet.market.add_to_inventory(&user, &[item.as_str()]).unwrap();
            ratchet.market.list_item(&item, &user, (i as i64 + 1) * 3).unwrap();
        }
    }

    // every trader tries to buy every other trader's items
    let barrier = Arc::new(Barrier::new(TRADERS));
    let handles: Vec<_> = (0..TRADERS)
        .map(|t| {
            let ratchet = Arc::clone(&ratchet);
            let barrier = Arc::clone(&barrier);
            thread::spawn(move || {
                barrier.wait();
                let buyer = format!("t{}", t);
                for other in (0..TRADERS).filter(|o| *o != t) {
                    for i in 0..ITEMS_EACH {
                        let item = format!("item{}_{}", other, i);
                        let seller = format!("t{}", other);
                        ratchet
                            .market
                            .purchase_item(&buyer, &item, &seller, (i as i64 + 1) * 3)
                            .unwrap();
                    }
                }
            })
        })
        .collect();
    for handle in handles {
        handle.join().unwrap();
    }

    let total_funds: i64 = (0..TRADERS)
        .map(|t| ratchet.market.funds(&format!("t{}", t)).unwrap().unwrap())
        .sum();
    assert_eq!(total_funds, 1_000 * TRADERS as i64);

    // each item is held by exactly one trader or still listed, never both
    let listed: Vec<String> = ratchet
        .market
        .listings()
        .unwrap()
        .into_iter()
        .map(|l| l.item)
        .collect();
    for t in 0..TRADERS {
        for i in 0..ITEMS_EACH {
            let item = format!("item{}_{}", t, i);
            let held = (0..TRADERS)
                .filter(|u| {
                    ratchet
                        .market
                        .inventory(&format!("t{}", u))
                        .unwrap()
                        .contains(&item)
                })
                .count();
            let on_market = listed.contains(&item) as usize;
            assert_eq!(held + on_market, 1, "item {} duplicated or lost", item);
        }
    }
    assert!(ratchet.metrics().committed > 0);
}

#[test]
fn test_price_change_is_reported_not_retried() {
    let ratchet = create_ratchet();
    let market = &ratchet.market;
    market.create_user("b", "Ben", 100).unwrap();
    market.add_to_inventory("s", &["Vase"]).unwrap();
    market.list_item("Vase", "s", 20).unwrap();

    let before = ratchet.metrics();
    assert_eq!(
        market.purchase_item("b", "Vase", "s", 15).unwrap(),
        PurchaseOutcome::PriceChanged { listed: Some(20) }
    );
    let after = ratchet.metrics();
    assert_eq!(after.aborted, before.aborted + 1);
    assert_eq!(after.conflicts, before.conflicts);
}

// =============================================================================
// DEADLINES
// =============================================================================

#[test]
fn test_list_times_out_under_constant_conflict() {
    let (ratchet, _store) = create_contended_ratchet(0);
    let market = &ratchet.market;
    market.add_to_inventory("s", &["Vase"]).unwrap();

    let outcome = market
        .list_item_with_timeout("Vase", "s", 20, Duration::from_millis(20))
        .unwrap();
    assert_eq!(outcome, ListOutcome::TimedOut);

    assert_eq!(market.inventory("s").unwrap(), vec!["Vase"]);
    assert!(market.listings().unwrap().is_empty());
    let metrics = ratchet.metrics();
    assert_eq!(metrics.timed_out, 1);
    assert_eq!(metrics.aborted, 0);
    assert!(metrics.conflicts >= 1);
}

#[test]
fn test_purchase_times_out_under_constant_conflict() {
    let (ratchet, store) = create_contended_ratchet(0);
    let market = &ratchet.market;
    market.create_user("b", "Ben", 100).unwrap();
    market.create_user("s", "Sue", 0).unwrap();
    store.zadd("market:", "Vase.s", 20.0).unwrap();

    let outcome = market
        .purchase_item_with_timeout("b", "Vase", "s", 20, Duration::ZERO)
        .unwrap();
    assert_eq!(outcome, PurchaseOutcome::TimedOut);

    assert_eq!(market.funds("b").unwrap(), Some(100));
    assert_eq!(market.funds("s").unwrap(), Some(0));
    assert!(market.inventory("b").unwrap().is_empty());
    assert_eq!(market.listing_price("Vase", "s").unwrap(), Some(20));
    assert_eq!(ratchet.metrics().timed_out, 1);
}
