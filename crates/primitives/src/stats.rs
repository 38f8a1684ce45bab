//! Hourly aggregate statistics
//!
//! ## Key layout
//!
//! ```text
//! stats:{context}:{kind}          sorted set  min, max, count, sum, sumsq
//! stats:{context}:{kind}:start    string      ISO hour of the current window
//! stats:{context}:{kind}:last     sorted set  previous window's aggregate
//! stats:{context}:{kind}:pstart   string      previous window's ISO hour
//! slowest:AccessTime              sorted set  context -> average access time
//! ```
//!
//! ## Update
//!
//! One optimistic transaction watching `:start`:
//!
//! 1. If `:start` names an earlier hour, archive the aggregate to `:last`
//!    and the old hour to `:pstart`, then set `:start` to this hour.
//! 2. Fold the value into `min`/`max` by union-storing single-member temp
//!    sets with MIN/MAX aggregation, then delete the temps.
//! 3. `ZINCRBY` count, sum and sumsq.
//!
//! Steps 2 and 3 commute, so concurrent updates within one hour only
//! conflict on the rotation itself.

use crate::context::Context;
use chrono::{DateTime, Utc};
use ratchet_concurrency::{ReadPhase, TxnOutcome};
use ratchet_core::{Aggregate, Batch, ScoreBound, StoreResult};
use std::convert::Infallible;
use std::time::{Duration, Instant};
use tracing::debug;
use uuid::Uuid;

const ACCESS_TIME: &str = "AccessTime";
const SLOWEST_ACCESS: &str = "slowest:AccessTime";

fn stats_key(context: &str, kind: &str) -> String {
    format!("stats:{}:{}", context, kind)
}

/// UTC hour containing `now`, formatted `YYYY-MM-DDTHH:00:00`.
fn iso_hour(now: DateTime<Utc>) -> String {
    now.format("%Y-%m-%dT%H:00:00").to_string()
}

/// Result of [`Stats::update_stats`].
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum StatsUpdate {
    /// The value was folded in; totals of the current window after the update
    Recorded {
        /// Values recorded this window
        count: f64,
        /// Sum of values
        sum: f64,
        /// Sum of squared values
        sumsq: f64,
    },
    /// Rotation conflicts persisted until the deadline
    TimedOut,
}

/// Derived view of one window's aggregate.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct StatsSummary {
    /// Values recorded
    pub count: f64,
    /// Sum of values
    pub sum: f64,
    /// Sum of squared values
    pub sumsq: f64,
    /// Smallest value
    pub min: f64,
    /// Largest value
    pub max: f64,
    /// `sum / count`
    pub average: f64,
    /// Sample standard deviation
    pub stddev: f64,
}

impl StatsSummary {
    fn from_members(members: &[(String, f64)]) -> Option<Self> {
        let field = |name: &str| {
            members
                .iter()
                .find(|(m, _)| m == name)
                .map(|(_, v)| *v)
                .unwrap_or(0.0)
        };
        let count = field("count");
        if count <= 0.0 {
            return None;
        }
        let sum = field("sum");
        let sumsq = field("sumsq");
        let spread = (sumsq - sum * sum / count).max(0.0);
        Some(Self {
            count,
            sum,
            sumsq,
            min: field("min"),
            max: field("max"),
            average: sum / count,
            stddev: (spread / (count - 1.0).max(1.0)).sqrt(),
        })
    }
}

/// Plan carried from the read phase to the write phase.
struct Rotation {
    hour: String,
    /// `None` when `:start` is current
    archive: Option<Archive>,
}

enum Archive {
    /// No window yet; only set `:start`
    Initialize,
    /// Earlier window exists; move it aside
    Previous { has_aggregate: bool },
}

/// Statistics facade over the shared store.
#[derive(Clone, Debug)]
pub struct Stats {
    ctx: Context,
}

impl Stats {
    /// Create a statistics facade over `ctx`
    pub fn new(ctx: Context) -> Self {
        Self { ctx }
    }

    /// Record `value` for `(context, kind)` with the configured deadline.
    pub fn update_stats(&self, context: &str, kind: &str, value: f64) -> StoreResult<StatsUpdate> {
        let timeout = self.ctx.config().stats.update_timeout();
        self.update_stats_with_timeout(context, kind, value, timeout)
    }

    /// [`Stats::update_stats`] with an explicit deadline
    pub fn update_stats_with_timeout(
        &self,
        context: &str,
        kind: &str,
        value: f64,
        timeout: Duration,
    ) -> StoreResult<StatsUpdate> {
        let destination = stats_key(context, kind);
        let start_key = format!("{}:start", destination);
        let last_key = format!("{}:last", destination);
        let pstart_key = format!("{}:pstart", destination);
        let clock = self.ctx.clock();

        let outcome = self
            .ctx
            .transaction("update_stats")
            .watch([start_key.as_str()])
            .timeout(timeout)
            .run(
                |store| {
                    let hour = iso_hour(clock.now());
                    let archive = match store.get(&start_key)? {
                        None => Some(Archive::Initialize),
                        Some(existing) if existing < hour => Some(Archive::Previous {
                            has_aggregate: store.exists(&destination)?,
                        }),
                        Some(_) => None,
                    };
                    Ok(ReadPhase::<_, Infallible>::Proceed(Rotation { hour, archive }))
                },
                |plan, batch| {
                    match &plan.archive {
                        Some(Archive::Previous { has_aggregate }) => {
                            if *has_aggregate {
                                batch.rename(destination.as_str(), last_key.as_str());
                            } else {
                                batch.delete([last_key.as_str()]);
                            }
                            batch
                                .rename(start_key.as_str(), pstart_key.as_str())
                                .set(start_key.as_str(), &plan.hour);
                        }
                        Some(Archive::Initialize) => {
                            batch.set(start_key.as_str(), &plan.hour);
                        }
                        None => {}
                    }
                    fold_value(batch, &destination, value);
                },
            )?;

        let update = match outcome {
            TxnOutcome::Committed { replies, .. } => {
                let from_end = |n: usize| {
                    replies
                        .len()
                        .checked_sub(n)
                        .and_then(|i| replies[i].as_float())
                        .unwrap_or_default()
                };
                StatsUpdate::Recorded {
                    count: from_end(3),
                    sum: from_end(2),
                    sumsq: from_end(1),
                }
            }
            TxnOutcome::TimedOut { .. } => StatsUpdate::TimedOut,
            // the read phase always proceeds
            TxnOutcome::NoOp => StatsUpdate::Recorded {
                count: 0.0,
                sum: 0.0,
                sumsq: 0.0,
            },
            TxnOutcome::Aborted(never) => match never {},
        };
        debug!(context, kind, value, update = ?update, "update_stats");
        Ok(update)
    }

    /// Summary of the current window, `None` if nothing was recorded.
    pub fn get_stats(&self, context: &str, kind: &str) -> StoreResult<Option<StatsSummary>> {
        self.summary(&stats_key(context, kind))
    }

    /// Summary of the previous window, `None` if none was archived.
    pub fn get_last_stats(&self, context: &str, kind: &str) -> StoreResult<Option<StatsSummary>> {
        self.summary(&format!("{}:last", stats_key(context, kind)))
    }

    /// ISO hour the current window started, if any
    pub fn window_start(&self, context: &str, kind: &str) -> StoreResult<Option<String>> {
        self.ctx
            .store()
            .get(&format!("{}:start", stats_key(context, kind)))
    }

    fn summary(&self, key: &str) -> StoreResult<Option<StatsSummary>> {
        let members = self.ctx.store().zrange(key, 0, -1)?;
        Ok(StatsSummary::from_members(&members))
    }

    // ========== Access timing ==========

    /// Start timing an access to `context`.
    pub fn start_timer(&self, context: &str) -> AccessTimer<'_> {
        AccessTimer {
            stats: self,
            context: context.to_string(),
            started: Instant::now(),
        }
    }

    /// Run `f`, then record its wall time as an access to `context`.
    pub fn time<T>(&self, context: &str, f: impl FnOnce() -> T) -> StoreResult<T> {
        let timer = self.start_timer(context);
        let value = f();
        timer.finish()?;
        Ok(value)
    }

    /// Slowest contexts by average access time, slowest first.
    pub fn slowest(&self, limit: usize) -> StoreResult<Vec<(String, f64)>> {
        self.ctx
            .store()
            .zrevrangebyscore(SLOWEST_ACCESS, ScoreBound::PosInf, ScoreBound::NegInf, Some(limit))
    }

    fn record_access(&self, context: &str, seconds: f64) -> StoreResult<StatsUpdate> {
        let update = self.update_stats(context, ACCESS_TIME, seconds)?;
        if let StatsUpdate::Recorded { count, sum, .. } = update {
            if count > 0.0 {
                let retained = self.ctx.config().stats.slowest_retained as i64;
                let mut batch = Batch::new();
                batch
                    .zadd(SLOWEST_ACCESS, context, sum / count)
                    .zrem_range_by_rank(SLOWEST_ACCESS, 0, -(retained + 1));
                self.ctx.store().pipeline(batch)?;
            }
        }
        Ok(update)
    }
}

/// Fold `value` into the aggregate at `destination`.
fn fold_value(batch: &mut Batch, destination: &str, value: f64) {
    let tmp_min = format!("stats:tmp:{}", Uuid::new_v4());
    let tmp_max = format!("stats:tmp:{}", Uuid::new_v4());
    batch
        .zadd(tmp_min.as_str(), "min", value)
        .zadd(tmp_max.as_str(), "max", value)
        .zunion_store(destination, [destination, tmp_min.as_str()], Aggregate::Min)
        .zunion_store(destination, [destination, tmp_max.as_str()], Aggregate::Max)
        .delete([tmp_min.as_str(), tmp_max.as_str()])
        .zincr_by(destination, "count", 1.0)
        .zincr_by(destination, "sum", value)
        .zincr_by(destination, "sumsq", value * value);
}

/// Measures one access; record it with [`AccessTimer::finish`].
#[derive(Debug)]
#[must_use = "an access timer records nothing until finished"]
pub struct AccessTimer<'a> {
    stats: &'a Stats,
    context: String,
    started: Instant,
}

impl AccessTimer<'_> {
    /// Time elapsed so far
    pub fn elapsed(&self) -> Duration {
        self.started.elapsed()
    }

    /// Record the elapsed time under `AccessTime` and refresh the
    /// context's place in the slowest-access ranking.
    pub fn finish(self) -> StoreResult<StatsUpdate> {
        let seconds = self.started.elapsed().as_secs_f64();
        self.stats.record_access(&self.context, seconds)
    }
}
