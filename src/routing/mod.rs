//! Route table
//!
//! Maps a URL to the controller serving it and the verb → method bindings
//! declared for it. Built once by the [`Scanner`] and read-only afterwards.

mod scanner;

pub use scanner::{Catalog, Scanner, scan};

use std::collections::{BTreeSet, HashMap};
use std::sync::Arc;

use crate::controller::ControllerDescriptor;
use crate::error::BuildError;

/// One (verb, handler method) binding. Equality covers both fields.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct VerbAction {
    verb: String,
    method: String,
}

impl VerbAction {
    pub fn new(verb: impl Into<String>, method: impl Into<String>) -> Result<Self, BuildError> {
        let verb = verb.into().trim().to_ascii_uppercase();
        let method = method.into().trim().to_string();
        if verb.is_empty() {
            return Err(BuildError::EmptyVerbAction { field: "verb" });
        }
        if method.is_empty() {
            return Err(BuildError::EmptyVerbAction { field: "method" });
        }
        Ok(Self { verb, method })
    }

    pub fn verb(&self) -> &str {
        &self.verb
    }

    pub fn method(&self) -> &str {
        &self.method
    }

    pub fn matches(&self, verb: &str) -> bool {
        self.verb.eq_ignore_ascii_case(verb)
    }
}

/// Controller plus its verb actions for a single URL.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RouteEntry {
    controller: String,
    actions: BTreeSet<VerbAction>,
}

impl RouteEntry {
    pub fn new(controller: impl Into<String>) -> Self {
        Self {
            controller: controller.into(),
            actions: BTreeSet::new(),
        }
    }

    pub fn controller(&self) -> &str {
        &self.controller
    }

    pub fn actions(&self) -> impl Iterator<Item = &VerbAction> {
        self.actions.iter()
    }

    /// Adds `action`. Re-adding an identical action is a no-op; binding a
    /// verb that already maps to another method is rejected.
    pub fn merge(&mut self, url: &str, action: VerbAction) -> Result<(), BuildError> {
        if let Some(existing) = self.action_for(action.verb()) {
            if existing == &action {
                return Ok(());
            }
            return Err(BuildError::ConflictingVerb {
                url: url.to_string(),
                verb: action.verb.clone(),
                existing: format!("{}::{}", self.controller, existing.method),
                incoming: format!("{}::{}", self.controller, action.method),
            });
        }
        self.actions.insert(action);
        Ok(())
    }

    pub fn action_for(&self, verb: &str) -> Option<&VerbAction> {
        self.actions.iter().find(|action| action.matches(verb))
    }

    /// Bound verbs, sorted.
    pub fn verbs(&self) -> Vec<String> {
        self.actions.iter().map(|a| a.verb.clone()).collect()
    }
}

/// URL → [`RouteEntry`], plus the descriptors of every routed controller.
#[derive(Debug, Default, Clone)]
pub struct RouteTable {
    entries: HashMap<String, RouteEntry>,
    controllers: HashMap<&'static str, Arc<ControllerDescriptor>>,
}

impl RouteTable {
    pub fn new() -> Self {
        Self::default()
    }

    /// Merges `action` into the entry for `url`, creating it if needed.
    pub fn insert(
        &mut self,
        url: &str,
        controller: &str,
        action: VerbAction,
    ) -> Result<(), BuildError> {
        let entry = self
            .entries
            .entry(url.to_string())
            .or_insert_with(|| RouteEntry::new(controller));

        if entry.controller != controller {
            return Err(BuildError::ConflictingController {
                url: url.to_string(),
                existing: entry.controller.clone(),
                incoming: controller.to_string(),
            });
        }
        entry.merge(url, action)
    }

    pub fn register_controller(&mut self, descriptor: Arc<ControllerDescriptor>) {
        self.controllers.insert(descriptor.name, descriptor);
    }

    pub fn get(&self, url: &str) -> Option<&RouteEntry> {
        self.entries.get(url)
    }

    pub fn controller(&self, name: &str) -> Option<&Arc<ControllerDescriptor>> {
        self.controllers.get(name)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn urls(&self) -> Vec<&str> {
        let mut urls: Vec<&str> = self.entries.keys().map(String::as_str).collect();
        urls.sort_unstable();
        urls
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_verb_action_requires_both_fields() {
        assert!(matches!(
            VerbAction::new("", "index"),
            Err(BuildError::EmptyVerbAction { field: "verb" })
        ));
        assert!(matches!(
            VerbAction::new("GET", "  "),
            Err(BuildError::EmptyVerbAction { field: "method" })
        ));
    }

    #[test]
    fn test_verb_action_equality_uses_both_fields() {
        let a = VerbAction::new("get", "index").unwrap();
        assert_eq!(a, VerbAction::new("GET", "index").unwrap());
        assert_ne!(a, VerbAction::new("GET", "show").unwrap());
        assert_ne!(a, VerbAction::new("POST", "index").unwrap());
        assert!(a.matches("Get"));
    }

    #[test]
    fn test_same_url_different_verbs_share_entry() {
        let mut table = RouteTable::new();
        table
            .insert("/signup", "Users", VerbAction::new("GET", "show_form").unwrap())
            .unwrap();
        table
            .insert("/signup", "Users", VerbAction::new("POST", "submit").unwrap())
            .unwrap();

        assert_eq!(table.len(), 1);
        let entry = table.get("/signup").unwrap();
        assert_eq!(entry.verbs(), vec!["GET", "POST"]);
        assert_eq!(entry.action_for("post").unwrap().method(), "submit");
    }

    #[test]
    fn test_merge_is_idempotent_and_rejects_conflicts() {
        let mut table = RouteTable::new();
        let action = VerbAction::new("GET", "show_form").unwrap();
        table.insert("/signup", "Users", action.clone()).unwrap();
        table.insert("/signup", "Users", action).unwrap();
        assert_eq!(table.get("/signup").unwrap().verbs().len(), 1);

        let err = table
            .insert("/signup", "Users", VerbAction::new("GET", "other").unwrap())
            .unwrap_err();
        assert!(matches!(err, BuildError::ConflictingVerb { .. }));

        let err = table
            .insert("/signup", "Admin", VerbAction::new("PUT", "edit").unwrap())
            .unwrap_err();
        assert!(matches!(err, BuildError::ConflictingController { .. }));
    }
}
