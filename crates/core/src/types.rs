//! Command, reply and watch types
//!
//! Writes are never issued one call at a time by the coordination layer.
//! They are described as [`Command`] values, buffered in a [`Batch`], and
//! handed to the store either as a plain pipeline or as a watched commit.
//!
//! ## Batch lifecycle
//!
//! ```text
//! watch(keys) ──► read phase ──► Batch::new() + commands ──► commit(watch, batch)
//!                                                              │
//!                                         Committed(replies) ◄─┴─► Conflict
//! ```

use smallvec::SmallVec;
use std::time::Duration;

/// How `ZUNIONSTORE` combines scores of a member present in several inputs.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Aggregate {
    /// Add the scores (store default)
    #[default]
    Sum,
    /// Keep the smallest score
    Min,
    /// Keep the largest score
    Max,
}

impl Aggregate {
    /// Combine two scores for the same member.
    pub fn combine(self, a: f64, b: f64) -> f64 {
        match self {
            Aggregate::Sum => a + b,
            Aggregate::Min => a.min(b),
            Aggregate::Max => a.max(b),
        }
    }
}

/// Bound for score range queries.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum ScoreBound {
    /// Negative infinity
    NegInf,
    /// Positive infinity
    PosInf,
    /// Score is included
    Inclusive(f64),
    /// Score is excluded
    Exclusive(f64),
}

impl ScoreBound {
    /// Whether `score` lies on the permitted side of this bound when used as a minimum.
    pub fn admits_from_below(&self, score: f64) -> bool {
        match *self {
            ScoreBound::NegInf => true,
            ScoreBound::PosInf => false,
            ScoreBound::Inclusive(b) => score >= b,
            ScoreBound::Exclusive(b) => score > b,
        }
    }

    /// Whether `score` lies on the permitted side of this bound when used as a maximum.
    pub fn admits_from_above(&self, score: f64) -> bool {
        match *self {
            ScoreBound::NegInf => false,
            ScoreBound::PosInf => true,
            ScoreBound::Inclusive(b) => score <= b,
            ScoreBound::Exclusive(b) => score < b,
        }
    }
}

/// Bound for lexicographic range queries over equal-score members.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LexBound {
    /// No bound on this side
    Unbounded,
    /// Member is included
    Inclusive(String),
    /// Member is excluded
    Exclusive(String),
}

impl LexBound {
    /// Whether `member` satisfies this bound used as a minimum.
    pub fn admits_from_below(&self, member: &str) -> bool {
        match self {
            LexBound::Unbounded => true,
            LexBound::Inclusive(b) => member >= b.as_str(),
            LexBound::Exclusive(b) => member > b.as_str(),
        }
    }

    /// Whether `member` satisfies this bound used as a maximum.
    pub fn admits_from_above(&self, member: &str) -> bool {
        match self {
            LexBound::Unbounded => true,
            LexBound::Inclusive(b) => member <= b.as_str(),
            LexBound::Exclusive(b) => member < b.as_str(),
        }
    }
}

/// A single buffered write.
#[derive(Debug, Clone, PartialEq)]
pub enum Command {
    /// `SET key value`
    Set {
        /// Target key
        key: String,
        /// New string value
        value: String,
    },
    /// `INCRBY key delta`
    IncrBy {
        /// Target key
        key: String,
        /// Signed increment
        delta: i64,
    },
    /// `DEL key...`
    Delete {
        /// Keys to remove
        keys: Vec<String>,
    },
    /// `RENAME from to`
    Rename {
        /// Existing key
        from: String,
        /// New name (overwritten if present)
        to: String,
    },
    /// `EXPIRE key ttl`
    Expire {
        /// Target key
        key: String,
        /// Time to live from now
        ttl: Duration,
    },
    /// `HSET key field value`
    HSet {
        /// Hash key
        key: String,
        /// Field name
        field: String,
        /// Field value
        value: String,
    },
    /// `HINCRBY key field delta`
    HIncrBy {
        /// Hash key
        key: String,
        /// Field name
        field: String,
        /// Signed increment
        delta: i64,
    },
    /// `HDEL key field...`
    HDel {
        /// Hash key
        key: String,
        /// Fields to remove
        fields: Vec<String>,
    },
    /// `SADD key member...`
    SAdd {
        /// Set key
        key: String,
        /// Members to add
        members: Vec<String>,
    },
    /// `SREM key member...`
    SRem {
        /// Set key
        key: String,
        /// Members to remove
        members: Vec<String>,
    },
    /// `SMOVE source destination member`
    SMove {
        /// Source set
        source: String,
        /// Destination set
        destination: String,
        /// Member to move
        member: String,
    },
    /// `ZADD key score member`
    ZAdd {
        /// Sorted-set key
        key: String,
        /// Member
        member: String,
        /// Score
        score: f64,
    },
    /// `ZREM key member...`
    ZRem {
        /// Sorted-set key
        key: String,
        /// Members to remove
        members: Vec<String>,
    },
    /// `ZINCRBY key delta member`
    ZIncrBy {
        /// Sorted-set key
        key: String,
        /// Member
        member: String,
        /// Score increment
        delta: f64,
    },
    /// `ZUNIONSTORE destination n key... AGGREGATE agg`
    ZUnionStore {
        /// Key receiving the union
        destination: String,
        /// Source sorted sets (missing keys are empty)
        keys: Vec<String>,
        /// Score combination rule
        aggregate: Aggregate,
    },
    /// `ZREMRANGEBYRANK key start stop`
    ZRemRangeByRank {
        /// Sorted-set key
        key: String,
        /// First rank (negative counts from the end)
        start: i64,
        /// Last rank, inclusive (negative counts from the end)
        stop: i64,
    },
}

impl Command {
    /// Keys this command may modify.
    pub fn written_keys(&self) -> SmallVec<[&str; 2]> {
        let mut keys = SmallVec::new();
        match self {
            Command::Set { key, .. }
            | Command::IncrBy { key, .. }
            | Command::Expire { key, .. }
            | Command::HSet { key, .. }
            | Command::HIncrBy { key, .. }
            | Command::HDel { key, .. }
            | Command::SAdd { key, .. }
            | Command::SRem { key, .. }
            | Command::ZAdd { key, .. }
            | Command::ZRem { key, .. }
            | Command::ZIncrBy { key, .. }
            | Command::ZRemRangeByRank { key, .. } => keys.push(key.as_str()),
            Command::Delete { keys: targets } => {
                keys.extend(targets.iter().map(String::as_str));
            }
            Command::Rename { from, to } => {
                keys.push(from.as_str());
                keys.push(to.as_str());
            }
            Command::SMove {
                source,
                destination,
                ..
            } => {
                keys.push(source.as_str());
                keys.push(destination.as_str());
            }
            Command::ZUnionStore { destination, .. } => keys.push(destination.as_str()),
        }
        keys
    }

    /// Command name, for logging.
    pub fn name(&self) -> &'static str {
        match self {
            Command::Set { .. } => "SET",
            Command::IncrBy { .. } => "INCRBY",
            Command::Delete { .. } => "DEL",
            Command::Rename { .. } => "RENAME",
            Command::Expire { .. } => "EXPIRE",
            Command::HSet { .. } => "HSET",
            Command::HIncrBy { .. } => "HINCRBY",
            Command::HDel { .. } => "HDEL",
            Command::SAdd { .. } => "SADD",
            Command::SRem { .. } => "SREM",
            Command::SMove { .. } => "SMOVE",
            Command::ZAdd { .. } => "ZADD",
            Command::ZRem { .. } => "ZREM",
            Command::ZIncrBy { .. } => "ZINCRBY",
            Command::ZUnionStore { .. } => "ZUNIONSTORE",
            Command::ZRemRangeByRank { .. } => "ZREMRANGEBYRANK",
        }
    }
}

/// Result of one executed command.
#[derive(Debug, Clone, PartialEq)]
pub enum Reply {
    /// No value
    Nil,
    /// Status acknowledgement
    Ok,
    /// Integer reply (counts, new integer values, booleans as 0/1)
    Int(i64),
    /// Floating point reply (sorted-set scores)
    Float(f64),
}

impl Reply {
    /// Integer payload, if this is an integer reply.
    pub fn as_int(&self) -> Option<i64> {
        match self {
            Reply::Int(n) => Some(*n),
            _ => None,
        }
    }

    /// Numeric payload as a float (integer replies widen).
    pub fn as_float(&self) -> Option<f64> {
        match self {
            Reply::Float(f) => Some(*f),
            Reply::Int(n) => Some(*n as f64),
            _ => None,
        }
    }
}

/// Ordered buffer of commands executed together.
///
/// Builder methods take `&mut self` so a write phase can append to a batch it
/// was handed without taking ownership.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Batch {
    commands: Vec<Command>,
}

impl Batch {
    /// Create an empty batch
    pub fn new() -> Self {
        Self::default()
    }

    /// Append an arbitrary command
    pub fn push(&mut self, command: Command) -> &mut Self {
        self.commands.push(command);
        self
    }

    /// Number of buffered commands
    pub fn len(&self) -> usize {
        self.commands.len()
    }

    /// Whether nothing has been buffered
    pub fn is_empty(&self) -> bool {
        self.commands.is_empty()
    }

    /// Buffered commands in execution order
    pub fn commands(&self) -> &[Command] {
        &self.commands
    }

    /// `SET`
    pub fn set(&mut self, key: impl Into<String>, value: impl ToString) -> &mut Self {
        self.push(Command::Set {
            key: key.into(),
            value: value.to_string(),
        })
    }

    /// `INCRBY`
    pub fn incr_by(&mut self, key: impl Into<String>, delta: i64) -> &mut Self {
        self.push(Command::IncrBy {
            key: key.into(),
            delta,
        })
    }

    /// `DEL`
    pub fn delete<I, K>(&mut self, keys: I) -> &mut Self
    where
        I: IntoIterator<Item = K>,
        K: Into<String>,
    {
        self.push(Command::Delete {
            keys: keys.into_iter().map(Into::into).collect(),
        })
    }

    /// `RENAME`
    pub fn rename(&mut self, from: impl Into<String>, to: impl Into<String>) -> &mut Self {
        self.push(Command::Rename {
            from: from.into(),
            to: to.into(),
        })
    }

    /// `EXPIRE`
    pub fn expire(&mut self, key: impl Into<String>, ttl: Duration) -> &mut Self {
        self.push(Command::Expire {
            key: key.into(),
            ttl,
        })
    }

    /// `HSET`
    pub fn hset(
        &mut self,
        key: impl Into<String>,
        field: impl Into<String>,
        value: impl ToString,
    ) -> &mut Self {
        self.push(Command::HSet {
            key: key.into(),
            field: field.into(),
            value: value.to_string(),
        })
    }

    /// `HINCRBY`
    pub fn hincr_by(
        &mut self,
        key: impl Into<String>,
        field: impl Into<String>,
        delta: i64,
    ) -> &mut Self {
        self.push(Command::HIncrBy {
            key: key.into(),
            field: field.into(),
            delta,
        })
    }

    /// `HDEL`
    pub fn hdel<I, F>(&mut self, key: impl Into<String>, fields: I) -> &mut Self
    where
        I: IntoIterator<Item = F>,
        F: Into<String>,
    {
        self.push(Command::HDel {
            key: key.into(),
            fields: fields.into_iter().map(Into::into).collect(),
        })
    }

    /// `SADD`
    pub fn sadd<I, M>(&mut self, key: impl Into<String>, members: I) -> &mut Self
    where
        I: IntoIterator<Item = M>,
        M: Into<String>,
    {
        self.push(Command::SAdd {
            key: key.into(),
            members: members.into_iter().map(Into::into).collect(),
        })
    }

    /// `SREM`
    pub fn srem<I, M>(&mut self, key: impl Into<String>, members: I) -> &mut Self
    where
        I: IntoIterator<Item = M>,
        M: Into<String>,
    {
        self.push(Command::SRem {
            key: key.into(),
            members: members.into_iter().map(Into::into).collect(),
        })
    }

    /// `SMOVE`
    pub fn smove(
        &mut self,
        source: impl Into<String>,
        destination: impl Into<String>,
        member: impl Into<String>,
    ) -> &mut Self {
        self.push(Command::SMove {
            source: source.into(),
            destination: destination.into(),
            member: member.into(),
        })
    }

    /// `ZADD`
    pub fn zadd(&mut self, key: impl Into<String>, member: impl Into<String>, score: f64) -> &mut Self {
        self.push(Command::ZAdd {
            key: key.into(),
            member: member.into(),
            score,
        })
    }

    /// `ZREM`
    pub fn zrem<I, M>(&mut self, key: impl Into<String>, members: I) -> &mut Self
    where
        I: IntoIterator<Item = M>,
        M: Into<String>,
    {
        self.push(Command::ZRem {
            key: key.into(),
            members: members.into_iter().map(Into::into).collect(),
        })
    }

    /// `ZINCRBY`
    pub fn zincr_by(
        &mut self,
        key: impl Into<String>,
        member: impl Into<String>,
        delta: f64,
    ) -> &mut Self {
        self.push(Command::ZIncrBy {
            key: key.into(),
            member: member.into(),
            delta,
        })
    }

    /// `ZUNIONSTORE ... AGGREGATE`
    pub fn zunion_store<I, K>(
        &mut self,
        destination: impl Into<String>,
        keys: I,
        aggregate: Aggregate,
    ) -> &mut Self
    where
        I: IntoIterator<Item = K>,
        K: Into<String>,
    {
        self.push(Command::ZUnionStore {
            destination: destination.into(),
            keys: keys.into_iter().map(Into::into).collect(),
            aggregate,
        })
    }

    /// `ZREMRANGEBYRANK`
    pub fn zrem_range_by_rank(&mut self, key: impl Into<String>, start: i64, stop: i64) -> &mut Self {
        self.push(Command::ZRemRangeByRank {
            key: key.into(),
            start,
            stop,
        })
    }
}

impl IntoIterator for Batch {
    type Item = Command;
    type IntoIter = std::vec::IntoIter<Command>;

    fn into_iter(self) -> Self::IntoIter {
        self.commands.into_iter()
    }
}

/// Versions of a set of keys captured at watch time.
///
/// Produced by [`Store::watch`](crate::Store::watch) and consumed by
/// [`Store::commit`](crate::Store::commit). A key that does not exist is
/// recorded with version 0.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct WatchSet {
    entries: SmallVec<[(String, u64); 4]>,
}

impl WatchSet {
    /// Build from `(key, version)` pairs
    pub fn from_versions<I>(versions: I) -> Self
    where
        I: IntoIterator<Item = (String, u64)>,
    {
        Self {
            entries: versions.into_iter().collect(),
        }
    }

    /// Watched keys with their captured versions
    pub fn entries(&self) -> &[(String, u64)] {
        &self.entries
    }

    /// Captured version of `key`, if watched
    pub fn version_of(&self, key: &str) -> Option<u64> {
        self.entries
            .iter()
            .find(|(k, _)| k == key)
            .map(|(_, v)| *v)
    }

    /// Number of watched keys
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Whether no key is watched
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

/// Result of a watched commit.
#[derive(Debug, Clone, PartialEq)]
pub enum CommitOutcome {
    /// Every command ran; replies in batch order
    Committed(Vec<Reply>),
    /// A watched key changed since the watch; nothing was applied
    Conflict,
}

impl CommitOutcome {
    /// Whether the batch was applied
    pub fn is_committed(&self) -> bool {
        matches!(self, CommitOutcome::Committed(_))
    }
}
