use std::cmp::Ordering;
use std::time::{SystemTime, UNIX_EPOCH};

use hkp_common::error::{HkpError, Result};
use rand::Rng;
use serde::Serialize;
use tracing::{error, info};

use crate::host::{AddressFamilies, HostEntry};

/// Name used when no host is given.
pub const LOCALHOST: &str = "localhost";

/// Host table configuration.
#[derive(Debug, Clone)]
pub struct RegistryConfig {
    /// Number of free slots appended whenever the table is full.
    pub growth_increment: usize,
    /// Maximum number of members recorded for one pool.
    pub max_pool_size: usize,
}

impl Default for RegistryConfig {
    fn default() -> Self {
        Self {
            growth_increment: 10,
            max_pool_size: 100,
        }
    }
}

/// Table of every host seen so far.
///
/// Entries are addressed by their slot index. Slots are only ever filled,
/// never emptied, so an index handed out once stays valid for the lifetime
/// of the table and pool member lists can refer to hosts by index.
#[derive(Debug)]
pub struct HostTable {
    slots: Vec<Option<HostEntry>>,
    config: RegistryConfig,
}

impl Default for HostTable {
    fn default() -> Self {
        Self::new(RegistryConfig::default())
    }
}

impl HostTable {
    pub fn new(config: RegistryConfig) -> Self {
        Self {
            slots: Vec::new(),
            config,
        }
    }

    pub fn config(&self) -> &RegistryConfig {
        &self.config
    }

    /// Returns the index of `name`, creating an entry if it is unknown.
    ///
    /// # Errors
    ///
    /// Returns [`HkpError::OutOfMemory`] if the table cannot grow.
    pub fn insert(&mut self, name: &str) -> Result<usize> {
        if let Some(idx) = self.find(name) {
            return Ok(idx);
        }

        if let Some(idx) = self.slots.iter().position(Option::is_none) {
            self.slots[idx] = Some(HostEntry::new(name));
            return Ok(idx);
        }

        let increment = self.config.growth_increment.max(1);
        self.slots.try_reserve_exact(increment)?;
        let idx = self.slots.len();
        self.slots.resize_with(idx + increment, || None);
        self.slots[idx] = Some(HostEntry::new(name));
        Ok(idx)
    }

    /// Case-insensitive lookup of `name`.
    pub fn find(&self, name: &str) -> Option<usize> {
        self.slots
            .iter()
            .position(|slot| slot.as_ref().is_some_and(|entry| entry.matches(name)))
    }

    pub fn get(&self, idx: usize) -> Option<&HostEntry> {
        self.slots.get(idx).and_then(Option::as_ref)
    }

    pub fn get_mut(&mut self, idx: usize) -> Option<&mut HostEntry> {
        self.slots.get_mut(idx).and_then(Option::as_mut)
    }

    /// Number of hosts in the table.
    pub fn len(&self) -> usize {
        self.slots.iter().filter(|slot| slot.is_some()).count()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Number of slots, used or free.
    pub fn capacity(&self) -> usize {
        self.slots.len()
    }

    pub fn is_dead(&self, name: &str) -> bool {
        self.find(name)
            .and_then(|idx| self.get(idx))
            .is_some_and(|entry| entry.dead)
    }

    /// Marks `name` as dead.
    ///
    /// Empty names, [`LOCALHOST`] and unknown names are ignored. Returns
    /// true if an entry was marked.
    pub fn mark_dead(&mut self, name: &str) -> bool {
        if name.is_empty() || name == LOCALHOST {
            return false;
        }
        let Some(entry) = self.find(name).and_then(|idx| self.get_mut(idx)) else {
            return false;
        };
        info!(
            "marking host '{}' as dead{}",
            entry.name,
            if entry.dead { " (again)" } else { "" }
        );
        entry.mark_dead();
        true
    }

    /// Records the members discovered for the host at `idx`.
    ///
    /// Each member is inserted (or found) and its address families are
    /// merged. The member list is deduplicated, never contains `idx` itself
    /// and is sorted by name. An empty result leaves the host a plain host.
    pub fn commit_pool(&mut self, idx: usize, members: &[(String, AddressFamilies)]) {
        let pool_name = match self.get(idx) {
            Some(entry) => entry.name.clone(),
            None => return,
        };

        let mut pool: Vec<usize> = Vec::new();
        for (member, families) in members {
            if pool.len() >= self.config.max_pool_size {
                error!(
                    "pool member '{}' of '{}' ignored: index table full",
                    member, pool_name
                );
                continue;
            }
            let member_idx = match self.find(member) {
                Some(member_idx) => {
                    info!("host '{}' of pool '{}' already known", member, pool_name);
                    member_idx
                }
                None => match self.insert(member) {
                    Ok(member_idx) => member_idx,
                    Err(e) => {
                        error!("adding '{}' to pool '{}' failed: {} [ignored]", member, pool_name, e);
                        continue;
                    }
                },
            };
            if let Some(entry) = self.get_mut(member_idx) {
                entry.families.merge(*families);
            }
            if member_idx != idx && !pool.contains(&member_idx) {
                pool.push(member_idx);
            }
        }

        if pool.is_empty() {
            return;
        }

        pool.sort_by(|&a, &b| self.compare_names(a, b));
        if let Some(entry) = self.get_mut(idx) {
            entry.pool = Some(pool);
            entry.pool_cursor = None;
        }
    }

    fn compare_names(&self, a: usize, b: usize) -> Ordering {
        let name = |idx| self.get(idx).map(|e| e.name.as_str()).unwrap_or_default();
        let (a, b) = (name(a), name(b));
        a.bytes()
            .map(|c| c.to_ascii_lowercase())
            .cmp(b.bytes().map(|c| c.to_ascii_lowercase()))
    }

    /// Picks a random live member of `pool`.
    ///
    /// Returns the position within `pool`, or `None` if every member is dead.
    pub fn select_random_host<R: Rng>(&self, pool: &[usize], rng: &mut R) -> Option<usize> {
        let alive: Vec<usize> = pool
            .iter()
            .enumerate()
            .filter(|(_, &idx)| self.get(idx).is_some_and(|entry| !entry.dead))
            .map(|(pos, _)| pos)
            .collect();

        match alive.len() {
            0 => None,
            1 => Some(alive[0]),
            n => Some(alive[rng.gen_range(0..n)]),
        }
    }

    /// Maps the host at `idx` to the name of the server to contact.
    ///
    /// Pool hosts stick to one member until that member dies, then a new
    /// member is chosen at random among the live ones.
    ///
    /// # Errors
    ///
    /// Returns [`HkpError::NoHost`] if no live member is left or if a plain
    /// host is dead.
    pub fn map_host<R: Rng>(&mut self, idx: usize, rng: &mut R) -> Result<String> {
        let entry = self
            .get(idx)
            .ok_or_else(|| HkpError::NoHost(format!("host index {}", idx)))?;
        let name = entry.name.clone();

        let target = match entry.pool.clone().filter(|pool| !pool.is_empty()) {
            Some(pool) => {
                let mut cursor = entry.pool_cursor;
                if let Some(pos) = cursor {
                    let member_dead = pool
                        .get(pos)
                        .and_then(|&member| self.get(member))
                        .map_or(true, |member| member.dead);
                    if member_dead {
                        cursor = None;
                    }
                }

                let pos = match cursor {
                    Some(pos) => pos,
                    None => match self.select_random_host(&pool, rng) {
                        Some(pos) => pos,
                        None => {
                            if let Some(entry) = self.get_mut(idx) {
                                entry.pool_cursor = None;
                            }
                            error!("no alive host found in pool '{}'", name);
                            return Err(HkpError::NoHost(name));
                        }
                    },
                };
                if let Some(entry) = self.get_mut(idx) {
                    entry.pool_cursor = Some(pos);
                }
                pool[pos]
            }
            None => idx,
        };

        let host = self
            .get_mut(target)
            .ok_or_else(|| HkpError::NoHost(name.clone()))?;
        if host.dead {
            error!("host '{}' marked as dead", host.name);
            return Err(HkpError::NoHost(host.name.clone()));
        }
        host.last_used = Some(SystemTime::now());
        Ok(host.name.clone())
    }

    /// Serializable view of the table for diagnostics.
    pub fn snapshot(&self) -> HostTableSnapshot {
        let hosts = self
            .slots
            .iter()
            .enumerate()
            .filter_map(|(index, slot)| slot.as_ref().map(|entry| (index, entry)))
            .map(|(index, entry)| HostSnapshot {
                index,
                name: entry.name.clone(),
                v4: entry.families.v4,
                v6: entry.families.v6,
                dead: entry.dead,
                pool: entry.pool.clone(),
                pool_cursor: entry.pool_cursor,
                last_used: entry.last_used.and_then(unix_secs),
                last_failure: entry.last_failure.and_then(unix_secs),
            })
            .collect();
        HostTableSnapshot { hosts }
    }

    /// Logs every entry with its flags and pool linkage.
    ///
    /// Returns the logged lines.
    pub fn debug_dump(&self) -> Vec<String> {
        let mut lines = Vec::new();
        for host in self.snapshot().hosts {
            lines.push(format!(
                "hosttable {:3} {} {} {} {}",
                host.index,
                if host.v4 { "4" } else { " " },
                if host.v6 { "6" } else { " " },
                if host.dead { "d" } else { " " },
                host.name
            ));
            if let Some(pool) = &host.pool {
                let members: String = pool
                    .iter()
                    .enumerate()
                    .map(|(pos, idx)| {
                        let star = if host.pool_cursor == Some(pos) { "*" } else { "" };
                        format!(" {}{}", idx, star)
                    })
                    .collect();
                lines.push(format!("          -->{}", members));
            }
        }
        for line in &lines {
            info!("{}", line);
        }
        lines
    }
}

fn unix_secs(time: SystemTime) -> Option<u64> {
    time.duration_since(UNIX_EPOCH).ok().map(|d| d.as_secs())
}

#[derive(Debug, Clone, Serialize)]
pub struct HostSnapshot {
    pub index: usize,
    pub name: String,
    pub v4: bool,
    pub v6: bool,
    pub dead: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub pool: Option<Vec<usize>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub pool_cursor: Option<usize>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub last_used: Option<u64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub last_failure: Option<u64>,
}

#[derive(Debug, Clone, Serialize)]
pub struct HostTableSnapshot {
    pub hosts: Vec<HostSnapshot>,
}

impl HostTableSnapshot {
    /// Renders the table as indented JSON.
    pub fn to_json_pretty(&self) -> Result<String> {
        Ok(serde_json::to_string_pretty(self)?)
    }
}
