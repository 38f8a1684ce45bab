//! In-process implementation of [`Store`]
//!
//! `MemoryStore` is a single authoritative keyspace behind one
//! `parking_lot::RwLock`. Reads share the lock; every write, pipeline
//! command and watched commit takes it exclusively, so each command is
//! linearizable and a commit's validate → apply sequence cannot interleave
//! with anything else.
//!
//! # Versions
//!
//! A global counter is bumped once per write and stamped on every key the
//! write touches. A missing key has version 0. `watch` records versions;
//! `commit` compares them against the current ones under the write lock.
//!
//! # Atomicity
//!
//! A commit keeps an undo log holding the original slot of every key it
//! touches. If any command fails midway, the log is replayed and the error
//! is returned, so a batch is all-or-nothing even on type errors.

use crate::sorted_set::SortedSet;
use parking_lot::RwLock;
use ratchet_core::{
    Batch, Command, CommitOutcome, LexBound, Reply, ScoreBound, Store, StoreError, StoreResult,
    WatchSet,
};
use rustc_hash::{FxHashMap, FxHashSet};
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Instant;

/// Value stored under one key.
#[derive(Debug, Clone)]
pub(crate) enum Value {
    Str(String),
    Hash(FxHashMap<String, String>),
    Set(FxHashSet<String>),
    ZSet(SortedSet),
}

impl Value {
    fn kind(&self) -> &'static str {
        match self {
            Value::Str(_) => "string",
            Value::Hash(_) => "hash",
            Value::Set(_) => "set",
            Value::ZSet(_) => "zset",
        }
    }

    fn is_empty_collection(&self) -> bool {
        match self {
            Value::Str(_) => false,
            Value::Hash(h) => h.is_empty(),
            Value::Set(s) => s.is_empty(),
            Value::ZSet(z) => z.is_empty(),
        }
    }
}

#[derive(Debug, Clone)]
pub(crate) struct Slot {
    value: Value,
    version: u64,
    expires_at: Option<Instant>,
}

impl Slot {
    fn new(value: Value, version: u64) -> Self {
        Self {
            value,
            version,
            expires_at: None,
        }
    }

    fn is_expired(&self, now: Instant) -> bool {
        self.expires_at.map_or(false, |at| at <= now)
    }
}

type Keyspace = FxHashMap<String, Slot>;

/// Original slots of keys touched by an in-flight commit.
type UndoLog = FxHashMap<String, Option<Slot>>;

/// Linearizable in-memory key-value store.
///
/// # Example
///
/// ```ignore
/// use ratchet_storage::MemoryStore;
/// use ratchet_core::{Batch, Store};
///
/// let store = MemoryStore::new();
/// let watch = store.watch(&["inventory:17".to_string()])?;
/// let mut batch = Batch::new();
/// batch.srem("inventory:17", ["ItemL"]);
/// let outcome = store.commit(&watch, batch)?;
/// ```
pub struct MemoryStore {
    data: RwLock<Keyspace>,
    version: AtomicU64,
}

impl MemoryStore {
    /// Create an empty store
    pub fn new() -> Self {
        Self {
            data: RwLock::new(FxHashMap::default()),
            version: AtomicU64::new(0),
        }
    }

    /// Current global version
    #[inline]
    pub fn version(&self) -> u64 {
        self.version.load(Ordering::Acquire)
    }

    #[inline]
    fn next_version(&self) -> u64 {
        self.version.fetch_add(1, Ordering::AcqRel) + 1
    }

    /// Number of live keys
    pub fn key_count(&self) -> usize {
        let now = Instant::now();
        self.data
            .read()
            .values()
            .filter(|slot| !slot.is_expired(now))
            .count()
    }

    /// Drop keys whose TTL has elapsed. Returns how many were removed.
    pub fn purge_expired(&self) -> usize {
        let now = Instant::now();
        let mut data = self.data.write();
        let before = data.len();
        data.retain(|_, slot| !slot.is_expired(now));
        before - data.len()
    }

    fn read<T>(&self, key: &str, f: impl FnOnce(Option<&Value>) -> StoreResult<T>) -> StoreResult<T> {
        let now = Instant::now();
        let data = self.data.read();
        let value = data
            .get(key)
            .filter(|slot| !slot.is_expired(now))
            .map(|slot| &slot.value);
        f(value)
    }
}

impl Default for MemoryStore {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for MemoryStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MemoryStore")
            .field("keys", &self.data.read().len())
            .field("version", &self.version())
            .finish()
    }
}

// ============================================================================
// Typed access helpers
// ============================================================================

fn wrong_type(key: &str, expected: &'static str, actual: &Value) -> StoreError {
    StoreError::WrongType {
        key: key.to_string(),
        expected,
        actual: actual.kind(),
    }
}

fn as_hash<'a>(key: &str, value: Option<&'a Value>) -> StoreResult<Option<&'a FxHashMap<String, String>>> {
    match value {
        None => Ok(None),
        Some(Value::Hash(h)) => Ok(Some(h)),
        Some(other) => Err(wrong_type(key, "hash", other)),
    }
}

fn as_set<'a>(key: &str, value: Option<&'a Value>) -> StoreResult<Option<&'a FxHashSet<String>>> {
    match value {
        None => Ok(None),
        Some(Value::Set(s)) => Ok(Some(s)),
        Some(other) => Err(wrong_type(key, "set", other)),
    }
}

fn as_zset<'a>(key: &str, value: Option<&'a Value>) -> StoreResult<Option<&'a SortedSet>> {
    match value {
        None => Ok(None),
        Some(Value::ZSet(z)) => Ok(Some(z)),
        Some(other) => Err(wrong_type(key, "zset", other)),
    }
}

fn parse_int(key: &str, raw: &str) -> StoreResult<i64> {
    raw.parse::<i64>().map_err(|_| StoreError::NotAnInteger {
        key: key.to_string(),
    })
}

fn check_score(score: f64) -> StoreResult<f64> {
    if score.is_nan() {
        return Err(StoreError::InvalidArgument("score is not a number".to_string()));
    }
    Ok(score)
}

fn live<'a>(data: &'a Keyspace, key: &str, now: Instant) -> Option<&'a Slot> {
    data.get(key).filter(|slot| !slot.is_expired(now))
}

fn effective_version(data: &Keyspace, key: &str, now: Instant) -> u64 {
    live(data, key, now).map_or(0, |slot| slot.version)
}

/// Fetch (or create with `init`) the slot for a write and stamp its version.
fn slot_for_write<'a>(
    data: &'a mut Keyspace,
    key: &str,
    now: Instant,
    version: u64,
    init: impl FnOnce() -> Value,
) -> &'a mut Slot {
    if data.get(key).map_or(false, |slot| slot.is_expired(now)) {
        data.remove(key);
    }
    let slot = data
        .entry(key.to_string())
        .or_insert_with(|| Slot::new(init(), version));
    slot.version = version;
    slot
}

fn hash_for_write<'a>(
    data: &'a mut Keyspace,
    key: &str,
    now: Instant,
    version: u64,
) -> StoreResult<&'a mut FxHashMap<String, String>> {
    let slot = slot_for_write(data, key, now, version, || Value::Hash(FxHashMap::default()));
    match &mut slot.value {
        Value::Hash(h) => Ok(h),
        other => Err(wrong_type(key, "hash", other)),
    }
}

fn set_for_write<'a>(
    data: &'a mut Keyspace,
    key: &str,
    now: Instant,
    version: u64,
) -> StoreResult<&'a mut FxHashSet<String>> {
    let slot = slot_for_write(data, key, now, version, || Value::Set(FxHashSet::default()));
    match &mut slot.value {
        Value::Set(s) => Ok(s),
        other => Err(wrong_type(key, "set", other)),
    }
}

fn zset_for_write<'a>(
    data: &'a mut Keyspace,
    key: &str,
    now: Instant,
    version: u64,
) -> StoreResult<&'a mut SortedSet> {
    let slot = slot_for_write(data, key, now, version, || Value::ZSet(SortedSet::new()));
    match &mut slot.value {
        Value::ZSet(z) => Ok(z),
        other => Err(wrong_type(key, "zset", other)),
    }
}

/// Collections never linger empty.
fn drop_if_empty(data: &mut Keyspace, key: &str) {
    if data.get(key).map_or(false, |slot| slot.value.is_empty_collection()) {
        data.remove(key);
    }
}

// ============================================================================
// Command execution
// ============================================================================

fn apply(data: &mut Keyspace, command: Command, version: u64, now: Instant) -> StoreResult<Reply> {
    let reply = match &command {
        Command::Set { key, value } => {
            data.insert(key.clone(), Slot::new(Value::Str(value.clone()), version));
            Reply::Ok
        }
        Command::IncrBy { key, delta } => {
            let slot = slot_for_write(data, key, now, version, || Value::Str("0".to_string()));
            let current = match &slot.value {
                Value::Str(raw) => parse_int(key, raw)?,
                other => return Err(wrong_type(key, "string", other)),
            };
            let next = current
                .checked_add(*delta)
                .ok_or_else(|| StoreError::Overflow { key: key.clone() })?;
            slot.value = Value::Str(next.to_string());
            Reply::Int(next)
        }
        Command::Delete { keys } => {
            let mut removed = 0;
            for key in keys {
                if let Some(slot) = data.remove(key) {
                    if !slot.is_expired(now) {
                        removed += 1;
                    }
                }
            }
            Reply::Int(removed)
        }
        Command::Rename { from, to } => {
            let mut slot = match data.remove(from) {
                Some(slot) if !slot.is_expired(now) => slot,
                _ => return Err(StoreError::NoSuchKey(from.clone())),
            };
            slot.version = version;
            data.insert(to.clone(), slot);
            Reply::Ok
        }
        Command::Expire { key, ttl } => match data.get_mut(key) {
            Some(slot) if !slot.is_expired(now) => {
                slot.expires_at = Some(now + *ttl);
                slot.version = version;
                Reply::Int(1)
            }
            _ => Reply::Int(0),
        },
        Command::HSet { key, field, value } => {
            let hash = hash_for_write(data, key, now, version)?;
            let is_new = hash.insert(field.clone(), value.clone()).is_none();
            Reply::Int(i64::from(is_new))
        }
        Command::HIncrBy { key, field, delta } => {
            let hash = hash_for_write(data, key, now, version)?;
            let current = match hash.get(field) {
                Some(raw) => parse_int(&format!("{}/{}", key, field), raw)?,
                None => 0,
            };
            let next = current
                .checked_add(*delta)
                .ok_or_else(|| StoreError::Overflow { key: key.clone() })?;
            hash.insert(field.clone(), next.to_string());
            Reply::Int(next)
        }
        Command::HDel { key, fields } => {
            if live(data, key, now).is_none() {
                return Ok(Reply::Int(0));
            }
            let hash = hash_for_write(data, key, now, version)?;
            let removed = fields.iter().filter(|f| hash.remove(f.as_str()).is_some()).count();
            drop_if_empty(data, key);
            Reply::Int(removed as i64)
        }
        Command::SAdd { key, members } => {
            let set = set_for_write(data, key, now, version)?;
            let added = members.iter().filter(|m| set.insert((*m).clone())).count();
            drop_if_empty(data, key);
            Reply::Int(added as i64)
        }
        Command::SRem { key, members } => {
            if live(data, key, now).is_none() {
                return Ok(Reply::Int(0));
            }
            let set = set_for_write(data, key, now, version)?;
            let removed = members.iter().filter(|m| set.remove(m.as_str())).count();
            drop_if_empty(data, key);
            Reply::Int(removed as i64)
        }
        Command::SMove {
            source,
            destination,
            member,
        } => {
            as_set(destination, live(data, destination, now).map(|s| &s.value))?;
            let present = as_set(source, live(data, source, now).map(|s| &s.value))?
                .map_or(false, |set| set.contains(member));
            if !present {
                return Ok(Reply::Int(0));
            }
            set_for_write(data, source, now, version)?.remove(member);
            drop_if_empty(data, source);
            set_for_write(data, destination, now, version)?.insert(member.clone());
            Reply::Int(1)
        }
        Command::ZAdd { key, member, score } => {
            let score = check_score(*score)?;
            let zset = zset_for_write(data, key, now, version)?;
            Reply::Int(i64::from(zset.insert(member, score)))
        }
        Command::ZRem { key, members } => {
            if live(data, key, now).is_none() {
                return Ok(Reply::Int(0));
            }
            let zset = zset_for_write(data, key, now, version)?;
            let removed = members.iter().filter(|m| zset.remove(m.as_str())).count();
            drop_if_empty(data, key);
            Reply::Int(removed as i64)
        }
        Command::ZIncrBy { key, member, delta } => {
            let delta = check_score(*delta)?;
            let zset = zset_for_write(data, key, now, version)?;
            Reply::Float(zset.increment(member, delta))
        }
        Command::ZUnionStore {
            destination,
            keys,
            aggregate,
        } => {
            let mut union: FxHashMap<String, f64> = FxHashMap::default();
            for source in keys {
                let members: Vec<(String, f64)> = match live(data, source, now).map(|s| &s.value) {
                    None => Vec::new(),
                    Some(Value::ZSet(z)) => z.iter().map(|(m, s)| (m.to_string(), s)).collect(),
                    // plain sets take part with an implicit score of 1
                    Some(Value::Set(s)) => s.iter().map(|m| (m.clone(), 1.0)).collect(),
                    Some(other) => return Err(wrong_type(source, "zset", other)),
                };
                for (member, score) in members {
                    union
                        .entry(member)
                        .and_modify(|acc| *acc = aggregate.combine(*acc, score))
                        .or_insert(score);
                }
            }
            let mut result = SortedSet::new();
            for (member, score) in &union {
                result.insert(member, *score);
            }
            let len = result.len();
            data.remove(destination);
            if len > 0 {
                data.insert(destination.clone(), Slot::new(Value::ZSet(result), version));
            }
            Reply::Int(len as i64)
        }
        Command::ZRemRangeByRank { key, start, stop } => {
            if live(data, key, now).is_none() {
                return Ok(Reply::Int(0));
            }
            let zset = zset_for_write(data, key, now, version)?;
            let removed = zset.remove_range_by_rank(*start, *stop);
            drop_if_empty(data, key);
            Reply::Int(removed as i64)
        }
    };
    Ok(reply)
}

fn restore(data: &mut Keyspace, undo: UndoLog) {
    for (key, original) in undo {
        match original {
            Some(slot) => {
                data.insert(key, slot);
            }
            None => {
                data.remove(&key);
            }
        }
    }
}

// ============================================================================
// Store implementation
// ============================================================================

impl Store for MemoryStore {
    fn get(&self, key: &str) -> StoreResult<Option<String>> {
        self.read(key, |value| match value {
            None => Ok(None),
            Some(Value::Str(s)) => Ok(Some(s.clone())),
            Some(other) => Err(wrong_type(key, "string", other)),
        })
    }

    fn exists(&self, key: &str) -> StoreResult<bool> {
        self.read(key, |value| Ok(value.is_some()))
    }

    fn hget(&self, key: &str, field: &str) -> StoreResult<Option<String>> {
        self.read(key, |value| Ok(as_hash(key, value)?.and_then(|h| h.get(field).cloned())))
    }

    fn hgetall(&self, key: &str) -> StoreResult<Vec<(String, String)>> {
        self.read(key, |value| {
            Ok(as_hash(key, value)?
                .map(|h| h.iter().map(|(f, v)| (f.clone(), v.clone())).collect())
                .unwrap_or_default())
        })
    }

    fn hkeys(&self, key: &str) -> StoreResult<Vec<String>> {
        self.read(key, |value| {
            Ok(as_hash(key, value)?
                .map(|h| h.keys().cloned().collect())
                .unwrap_or_default())
        })
    }

    fn hlen(&self, key: &str) -> StoreResult<usize> {
        self.read(key, |value| Ok(as_hash(key, value)?.map_or(0, |h| h.len())))
    }

    fn sismember(&self, key: &str, member: &str) -> StoreResult<bool> {
        self.read(key, |value| Ok(as_set(key, value)?.map_or(false, |s| s.contains(member))))
    }

    fn smembers(&self, key: &str) -> StoreResult<Vec<String>> {
        self.read(key, |value| {
            Ok(as_set(key, value)?
                .map(|s| s.iter().cloned().collect())
                .unwrap_or_default())
        })
    }

    fn zscore(&self, key: &str, member: &str) -> StoreResult<Option<f64>> {
        self.read(key, |value| Ok(as_zset(key, value)?.and_then(|z| z.score(member))))
    }

    fn zcard(&self, key: &str) -> StoreResult<usize> {
        self.read(key, |value| Ok(as_zset(key, value)?.map_or(0, |z| z.len())))
    }

    fn zrange(&self, key: &str, start: i64, stop: i64) -> StoreResult<Vec<(String, f64)>> {
        self.read(key, |value| {
            Ok(as_zset(key, value)?
                .map(|z| z.range_by_rank(start, stop))
                .unwrap_or_default())
        })
    }

    fn zrevrangebyscore(
        &self,
        key: &str,
        max: ScoreBound,
        min: ScoreBound,
        limit: Option<usize>,
    ) -> StoreResult<Vec<(String, f64)>> {
        self.read(key, |value| {
            Ok(as_zset(key, value)?
                .map(|z| z.rev_range_by_score(max, min, limit))
                .unwrap_or_default())
        })
    }

    fn zrangebylex(
        &self,
        key: &str,
        min: &LexBound,
        max: &LexBound,
        limit: Option<usize>,
    ) -> StoreResult<Vec<String>> {
        self.read(key, |value| {
            Ok(as_zset(key, value)?
                .map(|z| z.range_by_lex(min, max, limit))
                .unwrap_or_default())
        })
    }

    fn watch(&self, keys: &[String]) -> StoreResult<WatchSet> {
        let now = Instant::now();
        let data = self.data.read();
        Ok(WatchSet::from_versions(
            keys.iter()
                .map(|key| (key.clone(), effective_version(&data, key, now))),
        ))
    }

    fn commit(&self, watch: &WatchSet, batch: Batch) -> StoreResult<CommitOutcome> {
        let now = Instant::now();
        let mut data = self.data.write();

        if let Some((key, seen)) = watch
            .entries()
            .iter()
            .find(|(key, seen)| effective_version(&data, key, now) != *seen)
        {
            tracing::trace!(key = %key, watched_version = seen, "watched key changed");
            return Ok(CommitOutcome::Conflict);
        }

        let version = self.next_version();
        let mut undo = UndoLog::default();
        let mut replies = Vec::with_capacity(batch.len());

        for command in batch {
            for key in command.written_keys() {
                if !undo.contains_key(key) {
                    undo.insert(key.to_string(), data.get(key).cloned());
                }
            }
            let name = command.name();
            match apply(&mut data, command, version, now) {
                Ok(reply) => replies.push(reply),
                Err(e) => {
                    tracing::debug!(command = name, error = %e, "batch command failed, rolling back");
                    restore(&mut data, undo);
                    return Err(e);
                }
            }
        }

        Ok(CommitOutcome::Committed(replies))
    }

    fn pipeline(&self, batch: Batch) -> StoreResult<Vec<Reply>> {
        let mut replies = Vec::with_capacity(batch.len());
        for command in batch {
            let version = self.next_version();
            let mut data = self.data.write();
            replies.push(apply(&mut data, command, version, Instant::now())?);
        }
        Ok(replies)
    }
}
