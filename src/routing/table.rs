//! The shared routing table.
//!
//! # Responsibilities
//! - Store prefix → entry mappings (upsert, remove, snapshot)
//! - Resolve request paths to the most specific stored prefix
//! - Record per-route activity timestamps
//!
//! # Design Decisions
//! - One `RouteTable` is built at startup and shared via `Arc` with both
//!   listeners; there is no global instance
//! - `DashMap` shards give per-key write locks; an entry is inserted or
//!   replaced whole, so readers never observe a partial entry
//! - The table never expires entries; it only reports activity

use std::collections::BTreeMap;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use dashmap::DashMap;
use serde::Serialize;
use serde_json::{Map, Value};

use crate::routing::matcher::{candidates, is_root, normalize_prefix};
use crate::routing::target::Target;

/// Error type for table mutations.
#[derive(Debug, thiserror::Error)]
pub enum RouteError {
    #[error("the root prefix is served by the default target and cannot be stored")]
    RootPrefix,
}

/// A stored route.
#[derive(Debug, Clone, Serialize)]
pub struct RouteEntry {
    /// Backend this prefix forwards to.
    pub target: Target,
    /// Last time traffic resolved to this prefix.
    pub last_activity: DateTime<Utc>,
    /// Caller-supplied fields, round-tripped untouched.
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl RouteEntry {
    /// Create an entry whose activity timestamp is now.
    ///
    /// `target` and `last_activity` keys in `extra` are dropped; the entry
    /// owns those fields.
    pub fn new(target: Target, mut extra: Map<String, Value>) -> Self {
        extra.remove("target");
        extra.remove("last_activity");
        Self {
            target,
            last_activity: Utc::now(),
            extra,
        }
    }
}

/// Result of a successful lookup.
#[derive(Debug, Clone)]
pub struct Resolved {
    /// The stored prefix that matched.
    pub prefix: String,
    /// Where to forward.
    pub target: Target,
}

/// In-memory prefix → route mapping.
#[derive(Debug, Default)]
pub struct RouteTable {
    routes: DashMap<String, RouteEntry>,
}

impl RouteTable {
    /// Create an empty table.
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert or fully replace the entry at `prefix`.
    ///
    /// Returns the canonical key the entry was stored under.
    pub fn add_route(&self, prefix: &str, entry: RouteEntry) -> Result<String, RouteError> {
        let key = normalize_prefix(prefix);
        if is_root(&key) {
            return Err(RouteError::RootPrefix);
        }
        self.routes.insert(key.clone(), entry);
        Ok(key)
    }

    /// Remove the entry at `prefix`. Returns whether one existed.
    pub fn remove_route(&self, prefix: &str) -> bool {
        let key = normalize_prefix(prefix);
        self.routes.remove(&key).is_some()
    }

    /// Copy of the entry at `prefix`, if any.
    pub fn get(&self, prefix: &str) -> Option<RouteEntry> {
        let key = normalize_prefix(prefix);
        self.routes.get(&key).map(|entry| entry.value().clone())
    }

    /// Snapshot of every stored route, ordered by prefix.
    pub fn list_routes(&self) -> BTreeMap<String, RouteEntry> {
        self.routes
            .iter()
            .map(|entry| (entry.key().clone(), entry.value().clone()))
            .collect()
    }

    /// Mark `prefix` as active now. Does nothing if the prefix is gone.
    pub fn touch(&self, prefix: &str) -> bool {
        match self.routes.get_mut(prefix) {
            Some(mut entry) => {
                entry.last_activity = Utc::now();
                true
            }
            None => false,
        }
    }

    /// Find the most specific stored prefix for `path`.
    ///
    /// `None` means the request belongs to the default target.
    pub fn resolve(&self, path: &str) -> Option<Resolved> {
        candidates(path).find_map(|prefix| {
            let target = self.routes.get(&prefix)?.target.clone();
            Some(Resolved { prefix, target })
        })
    }

    /// Number of stored routes.
    pub fn len(&self) -> usize {
        self.routes.len()
    }

    /// True if no routes are stored.
    pub fn is_empty(&self) -> bool {
        self.routes.is_empty()
    }

    /// Handle that marks `prefix` active each time traffic flows.
    pub fn activity(self: &Arc<Self>, prefix: impl Into<Arc<str>>) -> Activity {
        Activity {
            table: Arc::clone(self),
            prefix: prefix.into(),
        }
    }
}

/// Cheap, cloneable activity recorder for one prefix.
///
/// Held by in-flight connections; if the route is removed meanwhile, touches
/// become no-ops rather than recreating the entry.
#[derive(Debug, Clone)]
pub struct Activity {
    table: Arc<RouteTable>,
    prefix: Arc<str>,
}

impl Activity {
    /// Record traffic on this prefix.
    pub fn touch(&self) {
        self.table.touch(&self.prefix);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use std::time::Duration;

    fn entry(target: &str) -> RouteEntry {
        RouteEntry::new(Target::parse(target).unwrap(), Map::new())
    }

    #[test]
    fn prefix_boundary() {
        let table = RouteTable::new();
        table.add_route("/user", entry("http://a:1")).unwrap();

        assert!(table.resolve("/username/anything").is_none());
        assert_eq!(table.resolve("/user/x").unwrap().prefix, "/user");
        assert_eq!(table.resolve("/user").unwrap().prefix, "/user");
    }

    #[test]
    fn most_specific_wins() {
        // Insertion order must not matter.
        for order in [["/user", "/user/alice"], ["/user/alice", "/user"]] {
            let table = RouteTable::new();
            for prefix in order {
                let target = if prefix == "/user" { "http://a:1" } else { "http://b:2" };
                table.add_route(prefix, entry(target)).unwrap();
            }

            let hit = table.resolve("/user/alice/notebooks").unwrap();
            assert_eq!(hit.prefix, "/user/alice");
            assert_eq!(hit.target.as_str(), "http://b:2");

            let hit = table.resolve("/user/bob").unwrap();
            assert_eq!(hit.prefix, "/user");
            assert_eq!(hit.target.as_str(), "http://a:1");
        }
    }

    #[test]
    fn upsert_overwrites_and_resets_activity() {
        let table = RouteTable::new();
        let mut first = entry("http://a:1");
        first.extra.insert("user".into(), json!("alice"));
        first.last_activity = Utc::now() - chrono::Duration::hours(1);
        table.add_route("/foo", first).unwrap();

        let before = Utc::now();
        table.add_route("foo/", entry("http://b:2")).unwrap();

        let stored = table.get("/foo").unwrap();
        assert_eq!(stored.target.as_str(), "http://b:2");
        assert!(stored.extra.is_empty());
        assert!(stored.last_activity >= before);
        assert_eq!(table.len(), 1);
    }

    #[test]
    fn root_is_never_stored() {
        let table = RouteTable::new();
        assert!(matches!(
            table.add_route("/", entry("http://a:1")),
            Err(RouteError::RootPrefix)
        ));
        assert!(matches!(
            table.add_route("//", entry("http://a:1")),
            Err(RouteError::RootPrefix)
        ));
        assert!(table.is_empty());
    }

    #[test]
    fn remove_reports_existence() {
        let table = RouteTable::new();
        assert!(!table.remove_route("/missing"));

        table.add_route("/foo", entry("http://a:1")).unwrap();
        assert!(table.remove_route("/foo/"));
        assert!(table.resolve("/foo/bar").is_none());
        assert!(table.list_routes().is_empty());
    }

    #[test]
    fn touch_updates_only_existing_entries() {
        let table = Arc::new(RouteTable::new());
        let mut stale = entry("http://a:1");
        stale.last_activity = Utc::now() - chrono::Duration::minutes(5);
        table.add_route("/foo", stale).unwrap();

        let before = Utc::now();
        let activity = table.activity("/foo");
        activity.touch();
        assert!(table.get("/foo").unwrap().last_activity >= before);

        table.remove_route("/foo");
        activity.touch();
        assert!(table.get("/foo").is_none());
        assert!(!table.touch("/"));
    }

    #[test]
    fn entry_owns_reserved_fields() {
        let mut extra = Map::new();
        extra.insert("last_activity".into(), json!("1999-01-01T00:00:00Z"));
        extra.insert("target".into(), json!("http://other:1"));
        extra.insert("spawned".into(), json!(12));
        let e = RouteEntry::new(Target::parse("http://a:1").unwrap(), extra);

        let json = serde_json::to_value(&e).unwrap();
        assert_eq!(json["target"], "http://a:1");
        assert_eq!(json["spawned"], 12);
        assert_ne!(json["last_activity"], "1999-01-01T00:00:00Z");
    }

    #[test]
    fn concurrent_readers_see_whole_entries() {
        let table = Arc::new(RouteTable::new());
        table.add_route("/svc", entry("http://a:1")).unwrap();

        let writer = {
            let table = Arc::clone(&table);
            std::thread::spawn(move || {
                for i in 0..500 {
                    let target = if i % 2 == 0 { "http://a:1" } else { "http://b:2" };
                    let mut e = entry(target);
                    e.extra.insert("tag".into(), json!(target));
                    table.add_route("/svc", e).unwrap();
                }
            })
        };

        let reader = {
            let table = Arc::clone(&table);
            std::thread::spawn(move || {
                for _ in 0..500 {
                    if let Some(e) = table.get("/svc") {
                        if let Some(tag) = e.extra.get("tag") {
                            assert_eq!(tag, e.target.as_str());
                        }
                    }
                    std::thread::sleep(Duration::from_micros(10));
                }
            })
        };

        writer.join().unwrap();
        reader.join().unwrap();
    }
}
