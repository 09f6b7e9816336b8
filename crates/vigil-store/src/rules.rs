//! Rule repository with versioning and clone-on-customize shadowing.
//!
//! Platform-standardized rules (`org_id == None`) apply to every
//! organization until that organization clones them. A clone shadows
//! its origin for the owning organization only, whether or not the
//! clone is currently enabled; disabling a clone is how an
//! organization opts out of a standardized rule.

use std::collections::HashMap;

use parking_lot::RwLock;
use tracing::debug;

use vigil_core::{AlertRule, MetricId, OrgId, RuleId};

use crate::error::{Result, StoreError};

/// Storage boundary for alert rules.
pub trait RuleRepository: Send + Sync {
    /// Registers a new rule.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::DuplicateRule`] if the id is taken.
    fn insert(&self, rule: AlertRule) -> Result<AlertRule>;

    /// Fetches a rule by id.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::RuleNotFound`] if the id is unknown.
    fn get(&self, rule_id: RuleId) -> Result<AlertRule>;

    /// Applies a mutation to a rule and bumps its version.
    ///
    /// The id, version, lineage, and creation time are preserved no
    /// matter what the closure does.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::RuleNotFound`] if the id is unknown.
    fn update(&self, rule_id: RuleId, mutate: &mut dyn FnMut(&mut AlertRule)) -> Result<AlertRule>;

    /// Disables a rule without removing it, preserving the version
    /// lineage of alerts that reference it.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::RuleNotFound`] if the id is unknown.
    fn deactivate(&self, rule_id: RuleId) -> Result<AlertRule>;

    /// Removes a rule outright. Callers must first verify that no
    /// alert references it and deactivate instead when one does.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::RuleNotFound`] if the id is unknown.
    fn remove(&self, rule_id: RuleId) -> Result<()>;

    /// Lists rules visible to an organization: its own plus the
    /// standardized set. `None` lists everything.
    fn list(&self, org_id: Option<OrgId>) -> Vec<AlertRule>;

    /// Returns the enabled rules in effect for an organization,
    /// applying clone shadowing. Restricts to one metric when given.
    fn effective_rules(&self, org_id: OrgId, metric: Option<&MetricId>) -> Vec<AlertRule>;
}

/// In-memory rule repository.
#[derive(Debug, Default)]
pub struct MemoryRuleRepository {
    inner: RwLock<HashMap<RuleId, AlertRule>>,
}

impl MemoryRuleRepository {
    /// Creates an empty repository.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of rules stored.
    #[must_use]
    pub fn len(&self) -> usize {
        self.inner.read().len()
    }

    /// Returns true if no rules are stored.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.inner.read().is_empty()
    }

    fn sort(mut rules: Vec<AlertRule>) -> Vec<AlertRule> {
        rules.sort_by(|a, b| a.created_at.cmp(&b.created_at).then_with(|| a.id.cmp(&b.id)));
        rules
    }
}

impl RuleRepository for MemoryRuleRepository {
    fn insert(&self, rule: AlertRule) -> Result<AlertRule> {
        let mut inner = self.inner.write();
        if inner.contains_key(&rule.id) {
            return Err(StoreError::DuplicateRule(rule.id));
        }
        debug!(rule_id = %rule.id, metric = %rule.metric, "rule registered");
        inner.insert(rule.id, rule.clone());
        Ok(rule)
    }

    fn get(&self, rule_id: RuleId) -> Result<AlertRule> {
        self.inner
            .read()
            .get(&rule_id)
            .cloned()
            .ok_or(StoreError::RuleNotFound(rule_id))
    }

    fn update(&self, rule_id: RuleId, mutate: &mut dyn FnMut(&mut AlertRule)) -> Result<AlertRule> {
        let mut inner = self.inner.write();
        let rule = inner
            .get_mut(&rule_id)
            .ok_or(StoreError::RuleNotFound(rule_id))?;

        let mut candidate = rule.clone();
        mutate(&mut candidate);

        // Identity and lineage survive any edit.
        candidate.id = rule.id;
        candidate.cloned_from = rule.cloned_from;
        candidate.created_at = rule.created_at;
        candidate.version = rule.version + 1;

        *rule = candidate;
        Ok(rule.clone())
    }

    fn deactivate(&self, rule_id: RuleId) -> Result<AlertRule> {
        self.update(rule_id, &mut |rule| {
            rule.enabled = false;
        })
    }

    fn remove(&self, rule_id: RuleId) -> Result<()> {
        let mut inner = self.inner.write();
        inner
            .remove(&rule_id)
            .map(|_| ())
            .ok_or(StoreError::RuleNotFound(rule_id))
    }

    fn list(&self, org_id: Option<OrgId>) -> Vec<AlertRule> {
        let inner = self.inner.read();
        let rules = inner
            .values()
            .filter(|rule| match org_id {
                Some(org) => rule.org_id.is_none() || rule.org_id == Some(org),
                None => true,
            })
            .cloned()
            .collect();
        Self::sort(rules)
    }

    fn effective_rules(&self, org_id: OrgId, metric: Option<&MetricId>) -> Vec<AlertRule> {
        let inner = self.inner.read();

        // Standardized rules shadowed by an org clone step aside even
        // if the clone is disabled.
        let shadowed: Vec<RuleId> = inner
            .values()
            .filter(|rule| rule.org_id == Some(org_id))
            .filter_map(|rule| rule.cloned_from)
            .collect();

        let rules = inner
            .values()
            .filter(|rule| rule.enabled)
            .filter(|rule| metric.is_none_or(|m| rule.metric == *m))
            .filter(|rule| match rule.org_id {
                Some(org) => org == org_id,
                None => !shadowed.contains(&rule.id),
            })
            .cloned()
            .collect();
        Self::sort(rules)
    }
}
