//! Age-based lifecycle rules and the evaluator that applies them to a
//! catalog snapshot.
//!
//! Evaluation only computes actions. Moving or deleting bytes is done by
//! [`crate::store::ObjectStoreLake::apply`].

use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::store::CatalogEntry;
use crate::zone::Zone;

/// What happens to an entry past its zone's max age.
///
/// Serialized as `delete` or `transition:<zone>`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub enum ExpiryAction {
    Transition(Zone),
    Delete,
}

impl fmt::Display for ExpiryAction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ExpiryAction::Transition(zone) => write!(f, "transition:{}", zone),
            ExpiryAction::Delete => f.write_str("delete"),
        }
    }
}

impl FromStr for ExpiryAction {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        if s == "delete" {
            return Ok(ExpiryAction::Delete);
        }
        match s.strip_prefix("transition:") {
            Some(zone) => zone
                .parse::<Zone>()
                .map(ExpiryAction::Transition)
                .map_err(|e| e.to_string()),
            None => Err(format!(
                "invalid expiry action '{}': expected 'delete' or 'transition:<zone>'",
                s
            )),
        }
    }
}

impl TryFrom<String> for ExpiryAction {
    type Error = String;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

impl From<ExpiryAction> for String {
    fn from(action: ExpiryAction) -> Self {
        action.to_string()
    }
}

/// Max age and expiry action for one zone.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetentionRule {
    pub max_age: Duration,
    pub on_expiry: ExpiryAction,
}

/// Zone → retention rule. Zones without a rule never expire.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RetentionPolicy {
    rules: BTreeMap<Zone, RetentionRule>,
}

impl RetentionPolicy {
    /// A policy with no rules.
    pub fn empty() -> Self {
        Self {
            rules: BTreeMap::new(),
        }
    }

    /// Add or replace the rule for a zone.
    pub fn with_rule(mut self, zone: Zone, max_age: Duration, on_expiry: ExpiryAction) -> Self {
        self.rules.insert(zone, RetentionRule { max_age, on_expiry });
        self
    }

    pub fn rule(&self, zone: Zone) -> Option<&RetentionRule> {
        self.rules.get(&zone)
    }
}

impl Default for RetentionPolicy {
    /// raw 90d → archive; processed 365d, features 180d, metadata 730d → delete.
    fn default() -> Self {
        Self::empty()
            .with_rule(
                Zone::Raw,
                Duration::days(90),
                ExpiryAction::Transition(Zone::Archive),
            )
            .with_rule(Zone::Processed, Duration::days(365), ExpiryAction::Delete)
            .with_rule(Zone::Features, Duration::days(180), ExpiryAction::Delete)
            .with_rule(Zone::Metadata, Duration::days(730), ExpiryAction::Delete)
    }
}

/// One due lifecycle transition.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct LifecycleAction {
    pub entry: CatalogEntry,
    pub action: ExpiryAction,
    pub reason: String,
}

/// Actions produced by one evaluation, oldest first.
///
/// Single pass: run a fresh evaluation each cycle, since the catalog may
/// have changed in between.
#[derive(Debug)]
pub struct LifecycleActions {
    inner: std::vec::IntoIter<LifecycleAction>,
    skipped: usize,
}

impl LifecycleActions {
    /// Entries excluded because their timestamp was after `now`.
    pub fn skipped(&self) -> usize {
        self.skipped
    }
}

impl Iterator for LifecycleActions {
    type Item = LifecycleAction;

    fn next(&mut self) -> Option<Self::Item> {
        self.inner.next()
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        self.inner.size_hint()
    }
}

impl ExactSizeIterator for LifecycleActions {}

/// Applies a [`RetentionPolicy`] to catalog snapshots.
#[derive(Debug, Clone, Default)]
pub struct RetentionEvaluator {
    policy: RetentionPolicy,
}

impl RetentionEvaluator {
    pub fn new(policy: RetentionPolicy) -> Self {
        Self { policy }
    }

    pub fn policy(&self) -> &RetentionPolicy {
        &self.policy
    }

    /// Compute the actions due at `now`.
    ///
    /// An entry is due when `now - timestamp` is strictly greater than its
    /// zone's max age. Results are ordered by ascending timestamp, then
    /// `(source, type, base_name)`. Never fails.
    pub fn evaluate<I>(&self, catalog: I, now: DateTime<Utc>) -> LifecycleActions
    where
        I: IntoIterator<Item = CatalogEntry>,
    {
        let mut due = Vec::new();
        let mut skipped = 0;

        for entry in catalog {
            let Some(rule) = self.policy.rule(entry.descriptor.zone) else {
                continue;
            };

            let timestamp = entry.descriptor.timestamp;
            if timestamp > now {
                warn!(
                    path = %entry.data_file_path,
                    timestamp = %timestamp,
                    "catalog entry timestamp is in the future, excluded from retention"
                );
                skipped += 1;
                continue;
            }

            let age = now - timestamp;
            if age <= rule.max_age {
                continue;
            }

            let reason = format!(
                "{} entry is {} days old, max age {} days",
                entry.descriptor.zone,
                age.num_days(),
                rule.max_age.num_days()
            );
            due.push(LifecycleAction {
                entry,
                action: rule.on_expiry,
                reason,
            });
        }

        due.sort_by(|a, b| {
            let (a, b) = (&a.entry, &b.entry);
            a.descriptor
                .timestamp
                .cmp(&b.descriptor.timestamp)
                .then_with(|| a.descriptor.source.cmp(&b.descriptor.source))
                .then_with(|| a.descriptor.data_type.cmp(&b.descriptor.data_type))
                .then_with(|| a.descriptor.base_name.cmp(&b.descriptor.base_name))
                .then_with(|| a.descriptor.zone.cmp(&b.descriptor.zone))
                .then_with(|| a.data_file_path.cmp(&b.data_file_path))
        });

        debug!(due = due.len(), skipped, "retention evaluation complete");

        LifecycleActions {
            inner: due.into_iter(),
            skipped,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::descriptor::{DataFormat, DatasetDescriptor};
    use crate::sidecar::MetadataSidecar;
    use chrono::TimeZone;

    fn now() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2026, 1, 26, 0, 0, 0).unwrap()
    }

    fn entry(zone: Zone, base: &str, age: Duration) -> CatalogEntry {
        let d = DatasetDescriptor::new(
            zone,
            "csv_ingestion",
            "events",
            base,
            now() - age,
            DataFormat::Parquet,
        );
        CatalogEntry::new(
            format!("{}/{}", zone, base),
            d,
            MetadataSidecar::new(0, 0, "sha256:00"),
            0,
        )
    }

    #[test]
    fn test_expiry_action_string_form() {
        assert_eq!(
            "transition:archive".parse::<ExpiryAction>().unwrap(),
            ExpiryAction::Transition(Zone::Archive)
        );
        assert_eq!("delete".parse::<ExpiryAction>().unwrap(), ExpiryAction::Delete);
        assert!("archive".parse::<ExpiryAction>().is_err());
        assert!("transition:bronze".parse::<ExpiryAction>().is_err());
        assert_eq!(
            serde_json::to_string(&ExpiryAction::Transition(Zone::Archive)).unwrap(),
            "\"transition:archive\""
        );
    }

    #[test]
    fn test_exact_max_age_is_not_due() {
        let evaluator = RetentionEvaluator::default();
        let actions = evaluator.evaluate(vec![entry(Zone::Raw, "a", Duration::days(90))], now());
        assert_eq!(actions.count(), 0);

        let actions = evaluator.evaluate(
            vec![entry(Zone::Raw, "a", Duration::days(90) + Duration::seconds(1))],
            now(),
        );
        assert_eq!(actions.count(), 1);
    }

    #[test]
    fn test_archive_and_unpoliced_zones_never_expire() {
        let evaluator = RetentionEvaluator::default();
        let catalog = vec![
            entry(Zone::Archive, "a", Duration::days(5000)),
            entry(Zone::Staging, "b", Duration::days(5000)),
            entry(Zone::Models, "c", Duration::days(5000)),
        ];
        assert_eq!(evaluator.evaluate(catalog, now()).count(), 0);
    }

    #[test]
    fn test_future_entries_are_skipped_and_counted() {
        let evaluator = RetentionEvaluator::default();
        let future = entry(Zone::Raw, "a", -Duration::days(1));
        let actions = evaluator.evaluate(vec![future], now());
        assert_eq!(actions.skipped(), 1);
        assert_eq!(actions.len(), 0);
    }

    #[test]
    fn test_reason_mentions_age() {
        let evaluator = RetentionEvaluator::default();
        let action = evaluator
            .evaluate(vec![entry(Zone::Features, "f", Duration::days(200))], now())
            .next()
            .unwrap();
        assert_eq!(action.action, ExpiryAction::Delete);
        assert_eq!(action.reason, "features entry is 200 days old, max age 180 days");
    }
}
