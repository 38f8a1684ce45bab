//! The store abstraction
//!
//! [`Store`] is the complete command surface the coordination layer needs
//! from the backing key-value store. It is object safe so components can be
//! handed an `Arc<dyn Store>` explicitly instead of reaching for a global
//! connection.
//!
//! ## Consistency contract
//!
//! - Every single command is linearizable per key.
//! - [`Store::commit`] applies a whole batch atomically, and only if no key
//!   in the [`WatchSet`] changed since [`Store::watch`] captured it.
//! - [`Store::pipeline`] applies commands in order with no cross-command
//!   atomicity guarantee.

use crate::error::StoreResult;
use crate::types::{Batch, CommitOutcome, LexBound, Reply, ScoreBound, WatchSet};

/// Command surface of the backing key-value store.
pub trait Store: Send + Sync {
    // ========================================================================
    // Scalar reads
    // ========================================================================

    /// `GET key`
    fn get(&self, key: &str) -> StoreResult<Option<String>>;

    /// `EXISTS key`
    fn exists(&self, key: &str) -> StoreResult<bool>;

    // ========================================================================
    // Hash reads
    // ========================================================================

    /// `HGET key field`
    fn hget(&self, key: &str, field: &str) -> StoreResult<Option<String>>;

    /// `HGETALL key`, in unspecified order
    fn hgetall(&self, key: &str) -> StoreResult<Vec<(String, String)>>;

    /// `HKEYS key`, in unspecified order
    fn hkeys(&self, key: &str) -> StoreResult<Vec<String>>;

    /// `HLEN key`
    fn hlen(&self, key: &str) -> StoreResult<usize>;

    // ========================================================================
    // Set reads
    // ========================================================================

    /// `SISMEMBER key member`
    fn sismember(&self, key: &str, member: &str) -> StoreResult<bool>;

    /// `SMEMBERS key`, in unspecified order
    fn smembers(&self, key: &str) -> StoreResult<Vec<String>>;

    // ========================================================================
    // Sorted-set reads
    // ========================================================================

    /// `ZSCORE key member`
    fn zscore(&self, key: &str, member: &str) -> StoreResult<Option<f64>>;

    /// `ZCARD key`
    fn zcard(&self, key: &str) -> StoreResult<usize>;

    /// `ZRANGE key start stop WITHSCORES`; negative ranks count from the end
    fn zrange(&self, key: &str, start: i64, stop: i64) -> StoreResult<Vec<(String, f64)>>;

    /// `ZREVRANGEBYSCORE key max min WITHSCORES [LIMIT 0 count]`
    fn zrevrangebyscore(
        &self,
        key: &str,
        max: ScoreBound,
        min: ScoreBound,
        limit: Option<usize>,
    ) -> StoreResult<Vec<(String, f64)>>;

    /// `ZRANGEBYLEX key min max [LIMIT 0 count]`
    ///
    /// Only meaningful when every member shares the same score.
    fn zrangebylex(
        &self,
        key: &str,
        min: &LexBound,
        max: &LexBound,
        limit: Option<usize>,
    ) -> StoreResult<Vec<String>>;

    // ========================================================================
    // Batches and optimistic transactions
    // ========================================================================

    /// `WATCH key...`: capture the current version of each key.
    fn watch(&self, keys: &[String]) -> StoreResult<WatchSet>;

    /// `UNWATCH`: release a watch without committing.
    fn unwatch(&self, watch: WatchSet) {
        drop(watch);
    }

    /// `MULTI ... EXEC`: apply `batch` atomically unless a watched key changed.
    fn commit(&self, watch: &WatchSet, batch: Batch) -> StoreResult<CommitOutcome>;

    /// Non-transactional pipeline: apply commands in order, one round trip.
    fn pipeline(&self, batch: Batch) -> StoreResult<Vec<Reply>>;

    // ========================================================================
    // Single-command writes
    // ========================================================================

    /// Run one command through [`Store::pipeline`].
    fn execute_one(&self, batch: Batch) -> StoreResult<Reply> {
        Ok(self.pipeline(batch)?.pop().unwrap_or(Reply::Nil))
    }

    /// `SET key value`
    fn set(&self, key: &str, value: &str) -> StoreResult<()> {
        let mut batch = Batch::new();
        batch.set(key, value);
        self.execute_one(batch).map(|_| ())
    }

    /// `INCRBY key delta`, returning the new value
    fn incr_by(&self, key: &str, delta: i64) -> StoreResult<i64> {
        let mut batch = Batch::new();
        batch.incr_by(key, delta);
        Ok(self.execute_one(batch)?.as_int().unwrap_or_default())
    }

    /// `DEL key...`, returning how many keys existed
    fn delete(&self, keys: &[&str]) -> StoreResult<usize> {
        let mut batch = Batch::new();
        batch.delete(keys.iter().copied());
        Ok(self.execute_one(batch)?.as_int().unwrap_or_default() as usize)
    }

    /// `HSET key field value`
    fn hset(&self, key: &str, field: &str, value: &str) -> StoreResult<()> {
        let mut batch = Batch::new();
        batch.hset(key, field, value);
        self.execute_one(batch).map(|_| ())
    }

    /// `HINCRBY key field delta`, returning the new value
    fn hincr_by(&self, key: &str, field: &str, delta: i64) -> StoreResult<i64> {
        let mut batch = Batch::new();
        batch.hincr_by(key, field, delta);
        Ok(self.execute_one(batch)?.as_int().unwrap_or_default())
    }

    /// `HDEL key field...`, returning how many fields were removed
    fn hdel(&self, key: &str, fields: &[String]) -> StoreResult<usize> {
        let mut batch = Batch::new();
        batch.hdel(key, fields.iter().cloned());
        Ok(self.execute_one(batch)?.as_int().unwrap_or_default() as usize)
    }

    /// `SADD key member...`, returning how many were newly added
    fn sadd(&self, key: &str, members: &[&str]) -> StoreResult<usize> {
        let mut batch = Batch::new();
        batch.sadd(key, members.iter().copied());
        Ok(self.execute_one(batch)?.as_int().unwrap_or_default() as usize)
    }

    /// `SREM key member...`, returning how many were removed
    fn srem(&self, key: &str, members: &[&str]) -> StoreResult<usize> {
        let mut batch = Batch::new();
        batch.srem(key, members.iter().copied());
        Ok(self.execute_one(batch)?.as_int().unwrap_or_default() as usize)
    }

    /// `ZADD key score member`, returning whether the member is new
    fn zadd(&self, key: &str, member: &str, score: f64) -> StoreResult<bool> {
        let mut batch = Batch::new();
        batch.zadd(key, member, score);
        Ok(self.execute_one(batch)?.as_int() == Some(1))
    }

    /// `ZREM key member...`, returning how many were removed
    fn zrem(&self, key: &str, members: &[&str]) -> StoreResult<usize> {
        let mut batch = Batch::new();
        batch.zrem(key, members.iter().copied());
        Ok(self.execute_one(batch)?.as_int().unwrap_or_default() as usize)
    }
}
