//! Marketplace ledger: listing and purchasing items
//!
//! ## Design: STATELESS FACADE
//!
//! `Market` holds only a [`Context`]. Listings, inventories and balances all
//! live in the store:
//!
//! ```text
//! market:            sorted set   "{item}.{seller}" -> price
//! inventory:{user}   set          item ids
//! users:{user}       hash         name, funds
//! ```
//!
//! Both workflows are optimistic transactions. A business rejection (item not
//! held, price moved, short of funds) aborts without retrying; only watch
//! conflicts are retried until the deadline.

use crate::context::Context;
use ratchet_concurrency::{ReadPhase, TxnOutcome};
use ratchet_core::{Batch, Store, StoreError, StoreResult};
use std::time::Duration;
use tracing::debug;

const MARKET: &str = "market:";

/// Largest listing price magnitude. Listing prices are sorted-set scores,
/// which hold integers exactly only up to 2^53.
pub const MAX_PRICE: i64 = 1 << 53;

fn inventory_key(user: &str) -> String {
    format!("inventory:{}", user)
}

fn user_key(user: &str) -> String {
    format!("users:{}", user)
}

fn listing_member(item: &str, seller: &str) -> String {
    format!("{}.{}", item, seller)
}

/// Result of [`Market::list_item`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ListOutcome {
    /// The item left the seller's inventory and is on the market
    Listed,
    /// The seller does not hold the item
    NotInInventory,
    /// Conflicts persisted until the deadline
    TimedOut,
}

/// Result of [`Market::purchase_item`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PurchaseOutcome {
    /// Funds moved and the item is in the buyer's inventory
    Purchased,
    /// The listing is gone (`None`) or carries a different price
    PriceChanged {
        /// Current listed price, if still listed
        listed: Option<i64>,
    },
    /// The buyer cannot afford the listed price
    InsufficientFunds {
        /// Buyer's balance at read time
        funds: i64,
        /// Listed price
        price: i64,
    },
    /// Conflicts persisted until the deadline
    TimedOut,
}

/// One entry of the market.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Listing {
    /// Item id
    pub item: String,
    /// Seller id
    pub seller: String,
    /// Asking price
    pub price: i64,
}

/// Item marketplace over the shared store.
#[derive(Clone, Debug)]
pub struct Market {
    ctx: Context,
}

impl Market {
    /// Create a market facade over `ctx`
    pub fn new(ctx: Context) -> Self {
        Self { ctx }
    }

    // ========== Workflows ==========

    /// Move `item` from the seller's inventory onto the market at `price`,
    /// using the configured listing timeout.
    pub fn list_item(&self, item: &str, seller: &str, price: i64) -> StoreResult<ListOutcome> {
        let timeout = self.ctx.config().market.list_timeout();
        self.list_item_with_timeout(item, seller, price, timeout)
    }

    /// [`Market::list_item`] with an explicit deadline
    ///
    /// # Errors
    ///
    /// `InvalidArgument` if `price` is outside `±MAX_PRICE`.
    pub fn list_item_with_timeout(
        &self,
        item: &str,
        seller: &str,
        price: i64,
        timeout: Duration,
    ) -> StoreResult<ListOutcome> {
        if price.unsigned_abs() > MAX_PRICE as u64 {
            return Err(StoreError::InvalidArgument(format!(
                "listing price {} exceeds {}",
                price, MAX_PRICE
            )));
        }
        let inventory = inventory_key(seller);
        let member = listing_member(item, seller);

        let outcome = self
            .ctx
            .transaction("list_item")
            .watch([inventory.as_str()])
            .timeout(timeout)
            .run(
                |store| {
                    if store.sismember(&inventory, item)? {
                        Ok(ReadPhase::Proceed(()))
                    } else {
                        Ok(ReadPhase::Abort(ListOutcome::NotInInventory))
                    }
                },
                |_, batch| {
                    batch
                        .zadd(MARKET, member.as_str(), price as f64)
                        .srem(inventory.as_str(), [item]);
                },
            )?;

        let result = match outcome {
            TxnOutcome::Committed { .. } | TxnOutcome::NoOp => ListOutcome::Listed,
            TxnOutcome::Aborted(reason) => reason,
            TxnOutcome::TimedOut { .. } => ListOutcome::TimedOut,
        };
        debug!(item, seller, price, outcome = ?result, "list_item");
        Ok(result)
    }

    /// Buy `item` from `seller` for the price the buyer expects, using the
    /// configured purchase timeout.
    pub fn purchase_item(
        &self,
        buyer: &str,
        item: &str,
        seller: &str,
        expected_price: i64,
    ) -> StoreResult<PurchaseOutcome> {
        let timeout = self.ctx.config().market.purchase_timeout();
        self.purchase_item_with_timeout(buyer, item, seller, expected_price, timeout)
    }

    /// [`Market::purchase_item`] with an explicit deadline
    pub fn purchase_item_with_timeout(
        &self,
        buyer: &str,
        item: &str,
        seller: &str,
        expected_price: i64,
        timeout: Duration,
    ) -> StoreResult<PurchaseOutcome> {
        let buyer_key = user_key(buyer);
        let seller_key = user_key(seller);
        let buyer_inventory = inventory_key(buyer);
        let member = listing_member(item, seller);

        let outcome = self
            .ctx
            .transaction("purchase_item")
            .watch([MARKET, buyer_key.as_str()])
            .timeout(timeout)
            .run(
                |store| {
                    let listed = store.zscore(MARKET, &member)?.map(|p| p as i64);
                    let funds = read_funds(store, &buyer_key)?;
                    match listed {
                        Some(price) if price == expected_price => {
                            if price > funds {
                                Ok(ReadPhase::Abort(PurchaseOutcome::InsufficientFunds {
                                    funds,
                                    price,
                                }))
                            } else {
                                Ok(ReadPhase::Proceed(price))
                            }
                        }
                        listed => Ok(ReadPhase::Abort(PurchaseOutcome::PriceChanged { listed })),
                    }
                },
                |&price, batch| {
                    batch
                        .hincr_by(seller_key.as_str(), "funds", price)
                        .hincr_by(buyer_key.as_str(), "funds", -price)
                        .sadd(buyer_inventory.as_str(), [item])
                        .zrem(MARKET, [member.as_str()]);
                },
            )?;

        let result = match outcome {
            // the read phase never yields NoOp
            TxnOutcome::Committed { .. } | TxnOutcome::NoOp => PurchaseOutcome::Purchased,
            TxnOutcome::Aborted(reason) => reason,
            TxnOutcome::TimedOut { .. } => PurchaseOutcome::TimedOut,
        };
        debug!(buyer, item, seller, expected_price, outcome = ?result, "purchase_item");
        Ok(result)
    }

    // ========== Accounts and inventory ==========

    /// Create or overwrite a user record
    pub fn create_user(&self, user: &str, name: &str, funds: i64) -> StoreResult<()> {
        let key = user_key(user);
        let mut batch = Batch::new();
        batch.hset(key.as_str(), "name", name).hset(key.as_str(), "funds", funds);
        self.ctx.store().pipeline(batch).map(|_| ())
    }

    /// Put items into a user's inventory. Returns how many were new.
    pub fn add_to_inventory(&self, user: &str, items: &[&str]) -> StoreResult<usize> {
        self.ctx.store().sadd(&inventory_key(user), items)
    }

    /// A user's balance, `None` if the user has no `funds` field
    pub fn funds(&self, user: &str) -> StoreResult<Option<i64>> {
        let key = user_key(user);
        match self.ctx.store().hget(&key, "funds")? {
            Some(raw) => raw
                .parse()
                .map(Some)
                .map_err(|_| StoreError::NotAnInteger { key }),
            None => Ok(None),
        }
    }

    /// Items a user holds, sorted
    pub fn inventory(&self, user: &str) -> StoreResult<Vec<String>> {
        let mut items = self.ctx.store().smembers(&inventory_key(user))?;
        items.sort();
        Ok(items)
    }

    /// Price of a listing, if listed
    pub fn listing_price(&self, item: &str, seller: &str) -> StoreResult<Option<i64>> {
        Ok(self
            .ctx
            .store()
            .zscore(MARKET, &listing_member(item, seller))?
            .map(|p| p as i64))
    }

    /// Every listing, cheapest first.
    ///
    /// Members are split at the last `.`, so seller ids must not contain one.
    pub fn listings(&self) -> StoreResult<Vec<Listing>> {
        Ok(self
            .ctx
            .store()
            .zrange(MARKET, 0, -1)?
            .into_iter()
            .filter_map(|(member, price)| {
                let (item, seller) = member.rsplit_once('.')?;
                Some(Listing {
                    item: item.to_string(),
                    seller: seller.to_string(),
                    price: price as i64,
                })
            })
            .collect())
    }
}

/// Missing user or missing field reads as zero funds.
fn read_funds(store: &dyn Store, key: &str) -> StoreResult<i64> {
    match store.hget(key, "funds")? {
        Some(raw) => raw.parse().map_err(|_| StoreError::NotAnInteger {
            key: key.to_string(),
        }),
        None => Ok(0),
    }
}
