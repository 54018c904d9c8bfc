//! Thread and lock records, and the per-snapshot arena that owns them.
//!
//! A [`ThreadDump`] is built once from a [`ThreadSnapshot`] and then mutated
//! in place by a single analysis pass. Threads, locks and groups refer to each
//! other by index ([`ThreadId`], [`LockId`], [`GroupId`]) so there are no
//! ownership cycles.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;

use crate::advisory::{Advisory, AdvisorySet};
use crate::groups::GroupId;
use crate::health::HealthLevel;

/// Index of a thread in its [`ThreadDump`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ThreadId(pub usize);

/// Index of a lock in its [`ThreadDump`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct LockId(pub usize);

/// JVM thread state as reported in the dump.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum WaitState {
    Running,
    Blocked,
    Waiting,
    TimedWaiting,
    Parking,
    Sleeping,
    #[default]
    Unknown,
}

impl WaitState {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Running => "RUNNING",
            Self::Blocked => "BLOCKED",
            Self::Waiting => "WAITING",
            Self::TimedWaiting => "TIMED_WAITING",
            Self::Parking => "PARKING",
            Self::Sleeping => "SLEEPING",
            Self::Unknown => "UNKNOWN",
        }
    }

    /// WAITING or TIMED_WAITING.
    pub fn is_waiting(self) -> bool {
        matches!(self, Self::Waiting | Self::TimedWaiting)
    }

    /// Any state in which the thread is not making progress on its own.
    pub fn is_sleep_or_wait(self) -> bool {
        matches!(
            self,
            Self::Waiting | Self::TimedWaiting | Self::Parking | Self::Sleeping
        )
    }
}

impl fmt::Display for WaitState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// True for stack lines that are frames or lock annotations, i.e. non-empty
/// and not the quoted thread header.
pub fn is_frame_line(line: &str) -> bool {
    !line.trim().is_empty() && !line.contains('"')
}

/// One thread of the snapshot plus its classification state.
#[derive(Debug, Clone)]
pub struct ThreadRecord {
    id: ThreadId,
    name: String,
    stack: String,
    depth: usize,
    pub state: WaitState,
    pub advisories: AdvisorySet,
    health: HealthLevel,
    pub group: Option<GroupId>,
    held_locks: Vec<LockId>,
    blocked_on: Option<LockId>,
}

impl ThreadRecord {
    #[must_use]
    pub fn new(
        id: ThreadId,
        name: impl Into<String>,
        stack: impl Into<String>,
        state: WaitState,
    ) -> Self {
        let stack = stack.into();
        let depth = stack.lines().filter(|line| is_frame_line(line)).count();
        Self {
            id,
            name: name.into(),
            stack,
            depth,
            state,
            advisories: AdvisorySet::new(),
            health: HealthLevel::Normal,
            group: None,
            held_locks: Vec::new(),
            blocked_on: None,
        }
    }

    pub fn id(&self) -> ThreadId {
        self.id
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn stack(&self) -> &str {
        &self.stack
    }

    /// Number of frame lines in the stack.
    pub fn stack_depth(&self) -> usize {
        self.depth
    }

    /// Frame lines in stack order.
    pub fn frames(&self) -> impl Iterator<Item = &str> {
        self.stack.lines().filter(|line| is_frame_line(line))
    }

    pub fn health(&self) -> HealthLevel {
        self.health
    }

    pub fn held_locks(&self) -> &[LockId] {
        &self.held_locks
    }

    pub fn blocked_on(&self) -> Option<LockId> {
        self.blocked_on
    }

    pub fn has_in_name(&self, needle: &str) -> bool {
        self.name.contains(needle)
    }

    pub fn has_in_stack(&self, needle: &str) -> bool {
        memchr::memmem::find(self.stack.as_bytes(), needle.as_bytes()).is_some()
    }

    /// BLOCKED and waiting for a lock the dump knows about.
    pub fn is_blocked_for_lock(&self) -> bool {
        self.state == WaitState::Blocked && self.blocked_on.is_some()
    }

    pub fn has_advisory(&self, name: &str) -> bool {
        self.advisories.contains_named(name)
    }

    /// Raise health to `level` if it is worse than the current one.
    pub fn raise_health(&mut self, level: HealthLevel) {
        if level > self.health {
            self.health = level;
        }
    }

    /// Set health unconditionally. The only way health goes down.
    pub fn reset_health(&mut self, level: HealthLevel) {
        self.health = level;
    }

    /// Attach an advisory if absent and raise health to its level.
    /// Returns `true` when the advisory was new.
    pub fn attach(&mut self, advisory: Advisory) -> bool {
        let health = advisory.health();
        let inserted = self.advisories.insert(advisory);
        if inserted {
            self.raise_health(health);
        }
        inserted
    }

    /// Attach or replace an advisory and raise health to its level.
    pub fn upsert(&mut self, advisory: Advisory) {
        self.raise_health(advisory.health());
        self.advisories.upsert(advisory);
    }

    /// Recompute health from scratch after advisories were removed.
    ///
    /// Worst advisory, at least NORMAL, at least WATCH when blocked for a
    /// lock; UNKNOWN when nothing explains a stack of `active_depth` frames
    /// or more.
    pub fn rederive_health(&mut self, active_depth: usize) {
        let mut level = self
            .advisories
            .max_health()
            .map_or(HealthLevel::Normal, |h| h.max(HealthLevel::Normal));
        if self.is_blocked_for_lock() {
            level = level.max(HealthLevel::Watch);
        }
        if self.advisories.is_empty() && level < HealthLevel::Watch && self.depth >= active_depth {
            level = HealthLevel::Unknown;
        }
        self.health = level;
    }
}

/// A monitor or synchronizer seen in the dump.
#[derive(Debug, Clone)]
pub struct LockRecord {
    id: LockId,
    address: String,
    class_name: Option<String>,
    owner: Option<ThreadId>,
    blockers: Vec<ThreadId>,
    pub advisories: AdvisorySet,
}

impl LockRecord {
    pub fn id(&self) -> LockId {
        self.id
    }

    pub fn address(&self) -> &str {
        &self.address
    }

    pub fn class_name(&self) -> Option<&str> {
        self.class_name.as_deref()
    }

    pub fn owner(&self) -> Option<ThreadId> {
        self.owner
    }

    pub fn blockers(&self) -> &[ThreadId] {
        &self.blockers
    }
}

/// Arena of every thread and lock in one snapshot.
#[derive(Debug, Clone, Default)]
pub struct ThreadDump {
    threads: Vec<ThreadRecord>,
    locks: Vec<LockRecord>,
}

impl ThreadDump {
    /// Build the arena. Locks are deduplicated by address; the first thread
    /// holding a lock owns it and later claimants are ignored.
    #[must_use]
    pub fn from_snapshot(snapshot: &ThreadSnapshot) -> Self {
        let mut dump = Self::default();
        let mut by_address: HashMap<String, LockId> = HashMap::new();

        for (idx, input) in snapshot.threads.iter().enumerate() {
            let id = ThreadId(idx);
            let mut record = ThreadRecord::new(id, &input.name, &input.stack, input.state);

            for held in &input.held_locks {
                let lock = dump.intern_lock(&mut by_address, held);
                let entry = &mut dump.locks[lock.0];
                match entry.owner {
                    None => entry.owner = Some(id),
                    Some(existing) if existing != id => {
                        tracing::warn!(
                            lock = %held.address,
                            thread = %input.name,
                            "Lock already owned by another thread; ignoring claim"
                        );
                        continue;
                    }
                    Some(_) => {}
                }
                if !record.held_locks.contains(&lock) {
                    record.held_locks.push(lock);
                }
            }

            if let Some(target) = &input.blocked_on {
                let lock = dump.intern_lock(&mut by_address, target);
                dump.locks[lock.0].blockers.push(id);
                record.blocked_on = Some(lock);
            }

            dump.threads.push(record);
        }

        tracing::debug!(
            threads = dump.threads.len(),
            locks = dump.locks.len(),
            "Built thread dump arena"
        );
        dump
    }

    fn intern_lock(&mut self, by_address: &mut HashMap<String, LockId>, lock: &LockRef) -> LockId {
        if let Some(&id) = by_address.get(&lock.address) {
            let entry = &mut self.locks[id.0];
            if entry.class_name.is_none() {
                entry.class_name.clone_from(&lock.class_name);
            }
            return id;
        }
        let id = LockId(self.locks.len());
        self.locks.push(LockRecord {
            id,
            address: lock.address.clone(),
            class_name: lock.class_name.clone(),
            owner: None,
            blockers: Vec::new(),
            advisories: AdvisorySet::new(),
        });
        by_address.insert(lock.address.clone(), id);
        id
    }

    pub fn thread(&self, id: ThreadId) -> &ThreadRecord {
        &self.threads[id.0]
    }

    pub fn thread_mut(&mut self, id: ThreadId) -> &mut ThreadRecord {
        &mut self.threads[id.0]
    }

    pub fn lock(&self, id: LockId) -> &LockRecord {
        &self.locks[id.0]
    }

    pub fn lock_mut(&mut self, id: LockId) -> &mut LockRecord {
        &mut self.locks[id.0]
    }

    pub fn threads(&self) -> &[ThreadRecord] {
        &self.threads
    }

    pub fn locks(&self) -> &[LockRecord] {
        &self.locks
    }

    pub fn thread_ids(&self) -> impl Iterator<Item = ThreadId> + use<> {
        (0..self.threads.len()).map(ThreadId)
    }

    pub fn lock_ids(&self) -> impl Iterator<Item = LockId> + use<> {
        (0..self.locks.len()).map(LockId)
    }

    /// Owner of the lock `thread` is blocked on, if both exist.
    pub fn blocking_owner(&self, thread: ThreadId) -> Option<ThreadId> {
        self.thread(thread)
            .blocked_on
            .and_then(|lock| self.lock(lock).owner)
    }

    pub fn len(&self) -> usize {
        self.threads.len()
    }

    pub fn is_empty(&self) -> bool {
        self.threads.is_empty()
    }
}

/// Reference to a lock by address, as it appears in snapshot input.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LockRef {
    pub address: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub class_name: Option<String>,
}

impl LockRef {
    #[must_use]
    pub fn new(address: impl Into<String>) -> Self {
        Self {
            address: address.into(),
            class_name: None,
        }
    }

    #[must_use]
    pub fn with_class(mut self, class_name: impl Into<String>) -> Self {
        self.class_name = Some(class_name.into());
        self
    }
}

/// One parsed thread handed in by the dump parser.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ThreadInput {
    pub name: String,
    #[serde(default)]
    pub stack: String,
    #[serde(default)]
    pub state: WaitState,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub held_locks: Vec<LockRef>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub blocked_on: Option<LockRef>,
}

impl ThreadInput {
    #[must_use]
    pub fn new(name: impl Into<String>, stack: impl Into<String>, state: WaitState) -> Self {
        Self {
            name: name.into(),
            stack: stack.into(),
            state,
            held_locks: Vec::new(),
            blocked_on: None,
        }
    }

    #[must_use]
    pub fn holding(mut self, lock: LockRef) -> Self {
        self.held_locks.push(lock);
        self
    }

    #[must_use]
    pub fn blocked_on(mut self, lock: LockRef) -> Self {
        self.blocked_on = Some(lock);
        self
    }
}

/// A structured thread dump: the analysis input.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ThreadSnapshot {
    #[serde(default)]
    pub threads: Vec<ThreadInput>,
}

impl ThreadSnapshot {
    pub fn from_json(raw: &str) -> crate::Result<Self> {
        Ok(serde_json::from_str(raw)?)
    }
}
