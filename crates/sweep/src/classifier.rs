//! Decides whether one account is dead.
//!
//! Exactly one rule is active per run. Accounts on skipped instances are
//! never looked at, whatever the rule.

use crate::console::Tone;
use chrono::{DateTime, Duration, Utc};
use deadwood_cache::{ActivityCache, CacheEntry};
use deadwood_core::InstancePolicy;
use deadwood_mastodon::{Account, ApiError, Relationship, SocialApi};
use tracing::{debug, warn};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Rule {
    /// Followers we do not follow back (nor asked to) are dead.
    Unmutual,
    /// Accounts whose oldest visible status is older than this are dead.
    Inactivity(Duration),
    /// Nothing is ever dead.
    Disabled,
}

/// Outcome of the last-activity lookup.
#[derive(Debug)]
pub enum LastActivity {
    Fresh(DateTime<Utc>),
    /// Nothing to show: deleted, suspended, or never posted.
    Gone,
    Unreachable(ApiError),
}

#[derive(Debug, Clone, PartialEq)]
pub enum Finding {
    SkippedInstance,
    NoRule,
    Active { last_status: DateTime<Utc> },
    Inactive { last_status: DateTime<Utc> },
    UserGone,
    Moved { to: String },
    InstanceGone { detail: String },
    Mutual,
    Unmutual { relationship: Relationship },
    RelationshipFailed { detail: String },
}

impl Finding {
    /// Short reason, as recorded in the sweep report.
    pub fn reason(&self) -> String {
        match self {
            Finding::SkippedInstance => "skipped instance".to_string(),
            Finding::NoRule => "no rule".to_string(),
            Finding::Active { .. } => "pass".to_string(),
            Finding::Inactive { last_status } => format!("last toot {}", last_status),
            Finding::UserGone => "user gone".to_string(),
            Finding::Moved { to } => format!("user moved to {}", to),
            Finding::InstanceGone { .. } => "instance gone".to_string(),
            Finding::Mutual => "mutual".to_string(),
            Finding::Unmutual { .. } => "unmutual".to_string(),
            Finding::RelationshipFailed { detail } => format!("relationship lookup failed: {}", detail),
        }
    }

    /// Console line for this finding, `None` when there is nothing to say.
    pub fn line(&self) -> Option<String> {
        let line = match self {
            Finding::SkippedInstance => "- Skipped (trusted instance)".to_string(),
            Finding::NoRule => return None,
            Finding::Active { last_status } => format!("- Last toot: {} (pass)", last_status),
            Finding::Inactive { last_status } => format!("- Last toot: {} (!)", last_status),
            Finding::UserGone => "- User gone (no status found)".to_string(),
            Finding::Moved { to } => format!("- User moved ({}) [NOT IMPLEMENTED]", to),
            Finding::InstanceGone { detail } => format!("- Instance gone ({})", detail),
            Finding::Mutual => "- Mutual".to_string(),
            Finding::Unmutual { relationship } => format!(
                "- Unmutual (following: {}, requested: {})",
                relationship.following, relationship.requested
            ),
            Finding::RelationshipFailed { detail } => format!("- Exception ({})", detail),
        };
        Some(line)
    }

    pub fn tone(&self) -> Tone {
        match self {
            Finding::Active { .. } | Finding::Inactive { .. } | Finding::Mutual | Finding::NoRule => Tone::Info,
            _ => Tone::Notice,
        }
    }

    /// Worth printing outside verbose mode.
    pub fn is_notable(&self) -> bool {
        !matches!(
            self,
            Finding::SkippedInstance | Finding::NoRule | Finding::Active { .. } | Finding::Mutual
        )
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Verdict {
    pub act: bool,
    pub finding: Finding,
}

impl Verdict {
    fn dead(finding: Finding) -> Self {
        Self { act: true, finding }
    }

    fn alive(finding: Finding) -> Self {
        Self { act: false, finding }
    }
}

pub struct Classifier<'a, A: SocialApi + ?Sized> {
    api: &'a A,
    cache: &'a mut ActivityCache,
    policy: &'a InstancePolicy,
    rule: Rule,
    now: DateTime<Utc>,
}

impl<'a, A: SocialApi + ?Sized> Classifier<'a, A> {
    pub fn new(
        api: &'a A,
        cache: &'a mut ActivityCache,
        policy: &'a InstancePolicy,
        rule: Rule,
        now: DateTime<Utc>,
    ) -> Self {
        Self {
            api,
            cache,
            policy,
            rule,
            now,
        }
    }

    /// Errors only for unreachable accounts on instances not assumed dead.
    pub async fn classify(&mut self, account: &Account) -> Result<Verdict, ApiError> {
        let instance = account.instance();
        if self.policy.skips(instance.as_deref()) {
            debug!("Skipping {} (instance in skip list)", account.acct);
            return Ok(Verdict::alive(Finding::SkippedInstance));
        }

        match self.rule {
            Rule::Unmutual => Ok(self.check_mutual(account).await),
            Rule::Inactivity(min_activity) => {
                self.check_activity(account, instance.as_deref(), min_activity).await
            }
            Rule::Disabled => Ok(Verdict::alive(Finding::NoRule)),
        }
    }

    async fn check_mutual(&self, account: &Account) -> Verdict {
        match self.api.relationship(&account.id).await {
            Ok(relationship) if relationship.is_mutual() => Verdict::alive(Finding::Mutual),
            Ok(relationship) => Verdict::dead(Finding::Unmutual { relationship }),
            Err(e) => {
                warn!("Relationship lookup for {} failed: {}", account.acct, e);
                Verdict::alive(Finding::RelationshipFailed {
                    detail: e.to_string(),
                })
            }
        }
    }

    async fn check_activity(
        &mut self,
        account: &Account,
        instance: Option<&str>,
        min_activity: Duration,
    ) -> Result<Verdict, ApiError> {
        let verdict = match self.last_activity(&account.id).await {
            LastActivity::Fresh(last_status) if self.is_stale(last_status, min_activity) => {
                Verdict::dead(Finding::Inactive { last_status })
            }
            LastActivity::Fresh(last_status) => Verdict::alive(Finding::Active { last_status }),
            // Following the new account is not implemented; moved accounts stay.
            LastActivity::Gone => match &account.moved {
                Some(target) => Verdict::alive(Finding::Moved {
                    to: target.acct.clone(),
                }),
                None => Verdict::dead(Finding::UserGone),
            },
            LastActivity::Unreachable(e) if self.policy.assumes_dead(instance) => {
                Verdict::dead(Finding::InstanceGone {
                    detail: e.to_string(),
                })
            }
            LastActivity::Unreachable(e) => return Err(e),
        };

        Ok(verdict)
    }

    /// A threshold reaching past the calendar has no cutoff: nothing is stale.
    fn is_stale(&self, last_status: DateTime<Utc>, min_activity: Duration) -> bool {
        self.now
            .checked_sub_signed(min_activity)
            .is_some_and(|cutoff| last_status < cutoff)
    }

    /// Oldest visible status, from the cache when possible.
    pub async fn last_activity(&mut self, account_id: &str) -> LastActivity {
        match self.cache.get(account_id) {
            Some(CacheEntry::LastStatus(at)) => return LastActivity::Fresh(at),
            Some(CacheEntry::Gone) => return LastActivity::Gone,
            None => {}
        }

        let statuses = match self.api.account_statuses(account_id).await {
            Ok(statuses) => statuses,
            Err(e) => return LastActivity::Unreachable(e),
        };

        match statuses.iter().map(|s| s.created_at).min() {
            Some(oldest) => {
                self.cache.record(account_id, CacheEntry::LastStatus(oldest)).await;
                LastActivity::Fresh(oldest)
            }
            None => {
                self.cache.record(account_id, CacheEntry::Gone).await;
                LastActivity::Gone
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fake::{FakeApi, account, at, moved_account};

    fn inactivity() -> Rule {
        Rule::Inactivity(Duration::days(365))
    }

    fn policy() -> InstancePolicy {
        InstancePolicy::new(&["bridge.example"], &["dead.example"])
    }

    async fn classify(api: &FakeApi, rule: Rule, target: &Account) -> Result<Verdict, ApiError> {
        let mut cache = ActivityCache::disabled();
        let policy = policy();
        let mut classifier = Classifier::new(api, &mut cache, &policy, rule, at(2024));
        classifier.classify(target).await
    }

    #[tokio::test]
    async fn empty_statuses_without_migration_is_gone() {
        let target = account("1", "ana@old.example");
        let api = FakeApi::new().with_statuses("1", vec![]);

        let verdict = classify(&api, inactivity(), &target).await.unwrap();
        assert!(verdict.act);
        assert_eq!(verdict.finding, Finding::UserGone);
        assert_eq!(verdict.finding.reason(), "user gone");
    }

    #[tokio::test]
    async fn empty_statuses_with_migration_is_left_alone() {
        let target = moved_account("1", "ana@old.example", "ana@new.example");
        let api = FakeApi::new().with_statuses("1", vec![]);

        let verdict = classify(&api, inactivity(), &target).await.unwrap();
        assert!(!verdict.act);
        assert_eq!(
            verdict.finding,
            Finding::Moved {
                to: "ana@new.example".to_string()
            }
        );
        assert!(api.mutations().is_empty());
    }

    #[tokio::test]
    async fn unreachable_on_assumed_dead_instance_is_instance_gone() {
        let target = account("1", "bob@Dead.Example");
        let api = FakeApi::new().failing_statuses("1", 502);

        let verdict = classify(&api, inactivity(), &target).await.unwrap();
        assert!(verdict.act);
        assert_eq!(verdict.finding.reason(), "instance gone");
    }

    #[tokio::test]
    async fn unreachable_elsewhere_propagates() {
        let target = account("1", "bob@flaky.example");
        let api = FakeApi::new().failing_statuses("1", 502);

        let err = classify(&api, inactivity(), &target).await.unwrap_err();
        assert!(matches!(err, ApiError::Status { status: 502, .. }));
    }

    #[tokio::test]
    async fn pending_request_is_mutual_enough() {
        let target = account("1", "cat@else.example");
        let api = FakeApi::new().with_relationship("1", false, true);

        let verdict = classify(&api, Rule::Unmutual, &target).await.unwrap();
        assert!(!verdict.act);
        assert_eq!(verdict.finding, Finding::Mutual);
    }

    #[tokio::test]
    async fn not_followed_back_is_unmutual() {
        let target = account("1", "cat@else.example");
        let api = FakeApi::new().with_relationship("1", false, false);

        let verdict = classify(&api, Rule::Unmutual, &target).await.unwrap();
        assert!(verdict.act);
        assert_eq!(verdict.finding.reason(), "unmutual");
    }

    #[tokio::test]
    async fn relationship_failure_leaves_account_alone() {
        let target = account("1", "cat@else.example");
        let api = FakeApi::new().failing_relationship("1", 500);

        let verdict = classify(&api, Rule::Unmutual, &target).await.unwrap();
        assert!(!verdict.act);
        assert!(matches!(verdict.finding, Finding::RelationshipFailed { .. }));
    }

    #[tokio::test]
    async fn oldest_status_decides_inactivity() {
        let target = account("1", "dan@old.example");
        let api = FakeApi::new().with_statuses("1", vec![at(2022), at(2020), at(2021)]);

        let verdict = classify(&api, inactivity(), &target).await.unwrap();
        assert!(verdict.act);
        assert_eq!(verdict.finding, Finding::Inactive { last_status: at(2020) });
        assert!(verdict.finding.reason().contains("2020-"));
    }

    #[tokio::test]
    async fn recent_status_passes() {
        let target = account("1", "dan@old.example");
        let api = FakeApi::new().with_statuses("1", vec![at(2023), at(2024)]);

        let verdict = classify(&api, inactivity(), &target).await.unwrap();
        assert!(!verdict.act);
        assert!(!verdict.finding.is_notable());
    }

    #[tokio::test]
    async fn exactly_at_threshold_passes() {
        let target = account("1", "dan@old.example");
        let threshold = at(2024) - Duration::days(365);
        let api = FakeApi::new().with_statuses("1", vec![threshold]);

        let verdict = classify(&api, inactivity(), &target).await.unwrap();
        assert!(!verdict.act);
    }

    #[tokio::test]
    async fn threshold_beyond_calendar_passes() {
        let target = account("1", "dan@old.example");
        let api = FakeApi::new().with_statuses("1", vec![at(1990)]);

        let verdict = classify(&api, Rule::Inactivity(Duration::days(300_000 * 365)), &target)
            .await
            .unwrap();
        assert!(!verdict.act);
        assert_eq!(verdict.finding, Finding::Active { last_status: at(1990) });
    }

    #[tokio::test]
    async fn skipped_instance_makes_no_calls() {
        let api = FakeApi::new().failing_statuses("1", 500).failing_relationship("1", 500);
        let target = account("1", "relay@BRIDGE.example");

        for rule in [inactivity(), Rule::Unmutual] {
            let verdict = classify(&api, rule, &target).await.unwrap();
            assert!(!verdict.act);
            assert_eq!(verdict.finding, Finding::SkippedInstance);
        }
        assert!(api.calls().is_empty());
    }

    #[tokio::test]
    async fn local_accounts_are_classified() {
        let api = FakeApi::new().with_statuses("1", vec![]);
        let verdict = classify(&api, inactivity(), &account("1", "local")).await.unwrap();
        assert!(verdict.act);
    }

    #[tokio::test]
    async fn disabled_rule_leaves_everyone() {
        let api = FakeApi::new();
        let verdict = classify(&api, Rule::Disabled, &account("1", "x@y.example")).await.unwrap();
        assert!(!verdict.act);
        assert!(api.calls().is_empty());
    }

    #[tokio::test]
    async fn cache_hit_skips_status_listing() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("cache.json");
        let policy = policy();
        let api = FakeApi::new()
            .with_statuses("1", vec![at(2019)])
            .with_statuses("2", vec![]);

        let mut cache = ActivityCache::load(Some(path.clone())).await;
        let mut classifier = Classifier::new(&api, &mut cache, &policy, inactivity(), at(2024));
        assert!(matches!(classifier.last_activity("1").await, LastActivity::Fresh(_)));
        assert!(matches!(classifier.last_activity("2").await, LastActivity::Gone));
        assert_eq!(api.status_lookups(), 2);

        // A later run with the persisted cache.
        let mut cache = ActivityCache::load(Some(path)).await;
        let mut classifier = Classifier::new(&api, &mut cache, &policy, inactivity(), at(2024));
        assert!(matches!(classifier.last_activity("1").await, LastActivity::Fresh(t) if t == at(2019)));
        assert!(matches!(classifier.last_activity("2").await, LastActivity::Gone));
        assert_eq!(api.status_lookups(), 2);
    }

    #[tokio::test]
    async fn failures_are_not_cached() {
        let dir = tempfile::tempdir().unwrap();
        let policy = policy();
        let api = FakeApi::new().failing_statuses("1", 503);
        let mut cache = ActivityCache::load(Some(dir.path().join("cache.json"))).await;

        let mut classifier = Classifier::new(&api, &mut cache, &policy, inactivity(), at(2024));
        assert!(matches!(classifier.last_activity("1").await, LastActivity::Unreachable(_)));
        assert!(matches!(classifier.last_activity("1").await, LastActivity::Unreachable(_)));
        assert_eq!(api.status_lookups(), 2);
        assert!(cache.is_empty());
    }
}
