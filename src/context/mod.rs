//! Per-run execution context.
//!
//! An [`ExecutionContext`] couples the immutable [`ReleaseConfig`] of a run
//! with a mutable key-value store that tasks use to hand data forward:
//!
//! - `config` can be replaced with [`ExecutionContext::set_config`] until the
//!   orchestrator seals the context at run start; afterwards it is frozen
//! - `data` maps string keys to JSON-compatible values, with typed access via
//!   [`ExecutionContext::get_as`]
//! - tasks never see the context itself, only a [`TaskContext`] handle that can
//!   read everything but mutate `data` alone
//!
//! # Example
//!
//! ```
//! use shipwright::config::ReleaseConfig;
//! use shipwright::context::ExecutionContext;
//!
//! let mut ctx = ExecutionContext::new(ReleaseConfig::default()).with_command("release");
//! ctx.set("version.next", "1.4.0").unwrap();
//!
//! let next: String = ctx.get_as("version.next").unwrap();
//! assert_eq!(next, "1.4.0");
//! assert!(ctx.get("version.current").is_err());
//! ```

mod id;

pub use id::ExecutionId;

use std::collections::BTreeMap;
use std::ops::Deref;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde::de::DeserializeOwned;
use serde::{Serialize, Serializer};
use serde_json::Value;

use crate::config::ReleaseConfig;
use crate::error::{Result, ShipwrightError};

/// Typed container for one run's configuration and execution data.
#[derive(Debug, Clone)]
pub struct ExecutionContext {
    id: ExecutionId,
    started_at: DateTime<Utc>,
    command: Option<String>,
    config: Arc<ReleaseConfig>,
    data: BTreeMap<String, Value>,
    sealed: bool,
}

impl ExecutionContext {
    /// Create a context with a fresh execution ID.
    pub fn new(config: ReleaseConfig) -> Self {
        Self {
            id: ExecutionId::new(),
            started_at: Utc::now(),
            command: None,
            config: Arc::new(config),
            data: BTreeMap::new(),
            sealed: false,
        }
    }

    /// Tag the context with the command whose graph will run against it.
    pub fn with_command(mut self, command: impl Into<String>) -> Self {
        self.command = Some(command.into());
        self
    }

    pub fn execution_id(&self) -> ExecutionId {
        self.id
    }

    pub fn started_at(&self) -> DateTime<Utc> {
        self.started_at
    }

    pub fn command(&self) -> Option<&str> {
        self.command.as_deref()
    }

    pub fn config(&self) -> &ReleaseConfig {
        &self.config
    }

    /// Replace the configuration.
    ///
    /// # Errors
    ///
    /// Returns `CONFLICT` once the run has started.
    pub fn set_config(&mut self, config: ReleaseConfig) -> Result<()> {
        if self.sealed {
            return Err(ShipwrightError::conflict(format!(
                "configuration of run {} is frozen once the run has started",
                self.id
            ))
            .in_component("context"));
        }
        self.config = Arc::new(config);
        Ok(())
    }

    /// Freeze the configuration for the rest of the run.
    pub(crate) fn seal(&mut self) {
        self.sealed = true;
    }

    /// Whether the configuration has been frozen.
    pub fn is_sealed(&self) -> bool {
        self.sealed
    }

    /// Read a raw value.
    ///
    /// # Errors
    ///
    /// Returns `NOT_FOUND` if no task has written `key`.
    pub fn get(&self, key: &str) -> Result<&Value> {
        self.data.get(key).ok_or_else(|| missing_key(key))
    }

    /// Read a value and deserialize it into `T`.
    ///
    /// # Errors
    ///
    /// Returns `NOT_FOUND` if the key is absent and `INVALID` if the stored
    /// value does not have the shape of `T`.
    pub fn get_as<T: DeserializeOwned>(&self, key: &str) -> Result<T> {
        let value = self.get(key)?.clone();
        serde_json::from_value(value).map_err(|e| {
            ShipwrightError::invalid(format!("context key '{}' has an unexpected type", key))
                .in_component("context")
                .with_cause(e)
        })
    }

    /// Store a value, replacing any previous one.
    ///
    /// # Errors
    ///
    /// Returns `VALIDATION` for an empty key and `INVALID` if the value cannot
    /// be represented as JSON.
    pub fn set(&mut self, key: impl Into<String>, value: impl Serialize) -> Result<()> {
        let key = key.into();
        if key.trim().is_empty() {
            return Err(
                ShipwrightError::validation("context keys must not be empty").in_component("context")
            );
        }
        let value = serde_json::to_value(value).map_err(|e| {
            ShipwrightError::invalid(format!("value for context key '{}' is not serializable", key))
                .in_component("context")
                .with_cause(e)
        })?;
        self.data.insert(key, value);
        Ok(())
    }

    /// Replace a value with the result of `f` applied to the current one.
    ///
    /// If `f` fails the stored value is left untouched.
    ///
    /// # Errors
    ///
    /// Returns `NOT_FOUND` if the key is absent, or whatever `f` returns.
    pub fn update<F>(&mut self, key: &str, f: F) -> Result<()>
    where
        F: FnOnce(Value) -> Result<Value>,
    {
        let current = self.get(key)?.clone();
        let next = f(current)?;
        self.data.insert(key.to_string(), next);
        Ok(())
    }

    /// Typed variant of [`update`](Self::update).
    pub fn update_as<T, F>(&mut self, key: &str, f: F) -> Result<()>
    where
        T: DeserializeOwned + Serialize,
        F: FnOnce(T) -> Result<T>,
    {
        let current: T = self.get_as(key)?;
        let next = f(current)?;
        self.set(key, next)
    }

    pub fn has(&self, key: &str) -> bool {
        self.data.contains_key(key)
    }

    /// Remove a value, returning it if it was present.
    pub fn remove(&mut self, key: &str) -> Option<Value> {
        self.data.remove(key)
    }

    /// Keys currently set, in sorted order.
    pub fn keys(&self) -> impl Iterator<Item = &str> {
        self.data.keys().map(String::as_str)
    }

    /// Detached copy of the data for diagnostics and reporting.
    pub fn snapshot(&self) -> ContextSnapshot {
        ContextSnapshot {
            data: self.data.clone(),
        }
    }

    /// Drop all execution data. Configuration is kept.
    pub fn clear(&mut self) -> Result<()> {
        self.data.clear();
        Ok(())
    }
}

fn missing_key(key: &str) -> ShipwrightError {
    ShipwrightError::not_found(format!("context key '{}' has not been set", key))
        .in_component("context")
}

/// Read-only copy of a context's data at one point in time.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ContextSnapshot {
    data: BTreeMap<String, Value>,
}

impl ContextSnapshot {
    pub fn get(&self, key: &str) -> Option<&Value> {
        self.data.get(key)
    }

    pub fn len(&self) -> usize {
        self.data.len()
    }

    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &Value)> {
        self.data.iter().map(|(k, v)| (k.as_str(), v))
    }

    /// Take ownership of the copied map.
    pub fn into_map(self) -> BTreeMap<String, Value> {
        self.data
    }
}

impl Serialize for ContextSnapshot {
    fn serialize<S>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        self.data.serialize(serializer)
    }
}

/// Handle through which a task reads the context and mutates its data.
///
/// Dereferences to [`ExecutionContext`] for read access. The only mutating
/// operations are the data writes below, so a task can neither swap the
/// configuration nor replace the context.
pub struct TaskContext<'a> {
    inner: &'a mut ExecutionContext,
}

impl<'a> TaskContext<'a> {
    pub(crate) fn new(inner: &'a mut ExecutionContext) -> Self {
        Self { inner }
    }

    pub fn set(&mut self, key: impl Into<String>, value: impl Serialize) -> Result<()> {
        self.inner.set(key, value)
    }

    pub fn update<F>(&mut self, key: &str, f: F) -> Result<()>
    where
        F: FnOnce(Value) -> Result<Value>,
    {
        self.inner.update(key, f)
    }

    pub fn update_as<T, F>(&mut self, key: &str, f: F) -> Result<()>
    where
        T: DeserializeOwned + Serialize,
        F: FnOnce(T) -> Result<T>,
    {
        self.inner.update_as(key, f)
    }

    pub fn remove(&mut self, key: &str) -> Option<Value> {
        self.inner.remove(key)
    }
}

impl Deref for TaskContext<'_> {
    type Target = ExecutionContext;

    fn deref(&self) -> &ExecutionContext {
        self.inner
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ErrorCode;
    use serde_json::json;

    fn ctx() -> ExecutionContext {
        ExecutionContext::new(ReleaseConfig::default())
    }

    #[test]
    fn new_context_is_empty_and_unsealed() {
        let ctx = ctx();
        assert!(ctx.snapshot().is_empty());
        assert!(!ctx.is_sealed());
        assert!(ctx.command().is_none());
    }

    #[test]
    fn with_command_tags_context() {
        let ctx = ctx().with_command("release");
        assert_eq!(ctx.command(), Some("release"));
    }

    #[test]
    fn get_missing_key_is_not_found() {
        let err = ctx().get("nope").unwrap_err();
        assert_eq!(err.code(), ErrorCode::NotFound);
        assert!(err.message().contains("nope"));
    }

    #[test]
    fn set_then_get() {
        let mut ctx = ctx();
        ctx.set("count", 3).unwrap();
        assert_eq!(ctx.get("count").unwrap(), &json!(3));
        assert!(ctx.has("count"));
    }

    #[test]
    fn set_rejects_empty_key() {
        let err = ctx().set("  ", 1).unwrap_err();
        assert_eq!(err.code(), ErrorCode::Validation);
    }

    #[test]
    fn get_as_deserializes() {
        let mut ctx = ctx();
        ctx.set("files", vec!["Cargo.toml", "CHANGELOG.md"]).unwrap();
        let files: Vec<String> = ctx.get_as("files").unwrap();
        assert_eq!(files, vec!["Cargo.toml", "CHANGELOG.md"]);
    }

    #[test]
    fn get_as_wrong_type_is_invalid() {
        let mut ctx = ctx();
        ctx.set("count", "three").unwrap();
        let err = ctx.get_as::<u32>("count").unwrap_err();
        assert_eq!(err.code(), ErrorCode::Invalid);
    }

    #[test]
    fn update_replaces_value() {
        let mut ctx = ctx();
        ctx.set("count", 1).unwrap();
        ctx.update("count", |v| Ok(json!(v.as_i64().unwrap_or(0) + 1)))
            .unwrap();
        assert_eq!(ctx.get("count").unwrap(), &json!(2));
    }

    #[test]
    fn update_missing_key_is_not_found() {
        let err = ctx().update("count", Ok).unwrap_err();
        assert_eq!(err.code(), ErrorCode::NotFound);
    }

    #[test]
    fn failed_update_keeps_old_value() {
        let mut ctx = ctx();
        ctx.set("count", 1).unwrap();
        let result = ctx.update("count", |_| Err(ShipwrightError::invalid("nope")));
        assert!(result.is_err());
        assert_eq!(ctx.get("count").unwrap(), &json!(1));
    }

    #[test]
    fn update_as_appends_to_list() {
        let mut ctx = ctx();
        ctx.set("files", Vec::<String>::new()).unwrap();
        ctx.update_as("files", |mut files: Vec<String>| {
            files.push("Cargo.toml".to_string());
            Ok(files)
        })
        .unwrap();
        let files: Vec<String> = ctx.get_as("files").unwrap();
        assert_eq!(files, vec!["Cargo.toml"]);
    }

    #[test]
    fn snapshot_is_stable_without_writes() {
        let mut ctx = ctx();
        ctx.set("a", 1).unwrap();
        assert_eq!(ctx.snapshot(), ctx.snapshot());
    }

    #[test]
    fn mutating_snapshot_does_not_touch_live_data() {
        let mut ctx = ctx();
        ctx.set("a", 1).unwrap();

        let mut copy = ctx.snapshot().into_map();
        copy.insert("a".to_string(), json!(99));
        copy.insert("b".to_string(), json!(2));

        assert_eq!(ctx.get("a").unwrap(), &json!(1));
        assert!(!ctx.has("b"));
    }

    #[test]
    fn clear_drops_data_but_keeps_config() {
        let mut cfg = ReleaseConfig::default();
        cfg.project_name = Some("demo".to_string());
        let mut ctx = ExecutionContext::new(cfg);
        ctx.set("a", 1).unwrap();
        ctx.clear().unwrap();
        assert!(!ctx.has("a"));
        assert_eq!(ctx.config().project_name.as_deref(), Some("demo"));
    }

    #[test]
    fn set_config_before_seal() {
        let mut ctx = ctx();
        let mut cfg = ReleaseConfig::default();
        cfg.dry_run = true;
        ctx.set_config(cfg).unwrap();
        assert!(ctx.config().dry_run);
    }

    #[test]
    fn set_config_after_seal_conflicts() {
        let mut ctx = ctx();
        ctx.seal();
        let err = ctx.set_config(ReleaseConfig::default()).unwrap_err();
        assert_eq!(err.code(), ErrorCode::Conflict);
    }

    #[test]
    fn keys_are_sorted() {
        let mut ctx = ctx();
        ctx.set("b", 1).unwrap();
        ctx.set("a", 1).unwrap();
        let keys: Vec<&str> = ctx.keys().collect();
        assert_eq!(keys, vec!["a", "b"]);
    }

    #[test]
    fn task_context_writes_through() {
        let mut ctx = ctx();
        {
            let mut handle = TaskContext::new(&mut ctx);
            handle.set("version.next", "2.0.0").unwrap();
            assert!(handle.has("version.next"));
            assert!(!handle.config().dry_run);
        }
        assert_eq!(ctx.get("version.next").unwrap(), &json!("2.0.0"));
    }

    #[test]
    fn snapshot_serializes_as_map() {
        let mut ctx = ctx();
        ctx.set("a", 1).unwrap();
        let json = serde_json::to_value(ctx.snapshot()).unwrap();
        assert_eq!(json, json!({"a": 1}));
    }
}
