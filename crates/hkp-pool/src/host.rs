use std::time::SystemTime;

use serde::Serialize;

/// Address families a host answered on during pool discovery.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct AddressFamilies {
    pub v4: bool,
    pub v6: bool,
}

impl AddressFamilies {
    pub fn merge(&mut self, other: AddressFamilies) {
        self.v4 |= other.v4;
        self.v6 |= other.v6;
    }
}

/// A known keyserver host and its state.
#[derive(Debug, Clone)]
pub struct HostEntry {
    pub name: String,
    /// When the host was last reported as failing.
    pub last_failure: Option<SystemTime>,
    /// When the host was last handed out by the selector.
    pub last_used: Option<SystemTime>,
    /// Table indices of the pool members, sorted by name.
    ///
    /// `None` for plain hosts and for pool members themselves.
    pub pool: Option<Vec<usize>>,
    /// Position in `pool` of the member currently stuck to.
    pub pool_cursor: Option<usize>,
    pub families: AddressFamilies,
    /// Set once the host failed to respond; never cleared.
    pub dead: bool,
}

impl HostEntry {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            last_failure: None,
            last_used: None,
            pool: None,
            pool_cursor: None,
            families: AddressFamilies::default(),
            dead: false,
        }
    }

    pub fn is_pool(&self) -> bool {
        self.pool.as_ref().is_some_and(|members| !members.is_empty())
    }

    /// Case-insensitive name comparison.
    pub fn matches(&self, name: &str) -> bool {
        self.name.eq_ignore_ascii_case(name)
    }

    pub fn mark_dead(&mut self) {
        self.dead = true;
        self.last_failure = Some(SystemTime::now());
    }
}
