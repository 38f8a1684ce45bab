//! Multi-precision time-series counters
//!
//! Every update lands in one bucket per configured precision:
//!
//! ```text
//! known:                   sorted set, score 0   "{precision}:{name}"
//! count:{precision}:{name} hash                  "{bucket start}" -> total
//! ```
//!
//! Updates are pipelined, not transactional. Each command is commutative, so
//! concurrent updates never lose an increment. Old buckets are trimmed by
//! [`CounterCleaner`](crate::CounterCleaner).

use crate::context::Context;
use ratchet_core::{Batch, StoreError, StoreResult};
use tracing::trace;

pub(crate) const KNOWN: &str = "known:";

pub(crate) fn counter_member(precision: u64, name: &str) -> String {
    format!("{}:{}", precision, name)
}

pub(crate) fn counter_hash(member: &str) -> String {
    format!("count:{}", member)
}

/// Precision prefix of a registry member, if well formed.
pub(crate) fn member_precision(member: &str) -> Option<u64> {
    member.split_once(':')?.0.parse().ok().filter(|&p| p > 0)
}

/// Start of the bucket of width `precision` seconds containing `now`.
pub fn bucket_start(now: f64, precision: u64) -> u64 {
    let width = precision.max(1);
    (now.max(0.0) as u64 / width) * width
}

/// Counter facade over the shared store.
#[derive(Clone, Debug)]
pub struct Counters {
    ctx: Context,
}

impl Counters {
    /// Create a counter facade over `ctx`
    pub fn new(ctx: Context) -> Self {
        Self { ctx }
    }

    /// Add `amount` to counter `name` at the context clock's current time.
    pub fn update_counter(&self, name: &str, amount: i64) -> StoreResult<()> {
        let now = self.ctx.clock().epoch_seconds();
        self.update_counter_at(name, amount, now)
    }

    /// Add `amount` to counter `name` at `now` (epoch seconds).
    ///
    /// Within each precision the bucket increment is queued before the
    /// registry entry, so a sweeper that removed the entry after seeing an
    /// empty hash is always followed by the re-registration.
    pub fn update_counter_at(&self, name: &str, amount: i64, now: f64) -> StoreResult<()> {
        let mut batch = Batch::new();
        for &precision in &self.ctx.config().counters.precisions {
            let member = counter_member(precision, name);
            batch
                .hincr_by(counter_hash(&member), bucket_start(now, precision).to_string(), amount)
                .zadd(KNOWN, member, 0.0);
        }
        trace!(name, amount, now, commands = batch.len(), "update_counter");
        self.ctx.store().pipeline(batch)?;
        Ok(())
    }

    /// Buckets of counter `name` at `precision`, oldest first.
    pub fn get_counter(&self, name: &str, precision: u64) -> StoreResult<Vec<(u64, i64)>> {
        let key = counter_hash(&counter_member(precision, name));
        let mut samples = self
            .ctx
            .store()
            .hgetall(&key)?
            .into_iter()
            .map(|(bucket, count)| match (bucket.parse(), count.parse()) {
                (Ok(bucket), Ok(count)) => Ok((bucket, count)),
                _ => Err(StoreError::NotAnInteger { key: key.clone() }),
            })
            .collect::<StoreResult<Vec<(u64, i64)>>>()?;
        samples.sort_unstable();
        Ok(samples)
    }

    /// Every registered `(precision, name)` pair, in registry order.
    pub fn known_counters(&self) -> StoreResult<Vec<(u64, String)>> {
        Ok(self
            .ctx
            .store()
            .zrange(KNOWN, 0, -1)?
            .into_iter()
            .filter_map(|(member, _)| {
                let precision = member_precision(&member)?;
                let (_, name) = member.split_once(':')?;
                Some((precision, name.to_string()))
            })
            .collect())
    }
}
