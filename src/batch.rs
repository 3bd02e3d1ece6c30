//! Concurrent role verification across a roster of users.

use std::collections::{HashMap, HashSet};
use std::sync::Arc;
use std::time::Duration;

use futures::stream::{self, StreamExt};
use tracing::{debug, warn};

use crate::cache::Cache;
use crate::config::Config;
use crate::memory_cache::MemoryCache;
use crate::resolver::{Resolver, VerificationResult};
use crate::store::RoleStore;
use crate::types::UserId;

pub(crate) const DEFAULT_BATCH_TIMEOUT: Duration = Duration::from_secs(5);
pub(crate) const DEFAULT_BATCH_CONCURRENCY: usize = 32;

/// Resolves many users at once, isolating per-user failures.
///
/// Each user gets its own store deadline, so a single slow lookup cannot
/// stall the batch. Users whose resolution fails are logged and left out of
/// the result.
#[derive(Debug)]
pub struct BatchVerifier<S, C = MemoryCache> {
    resolver: Arc<Resolver<S, C>>,
    per_user_timeout: Duration,
    concurrency: usize,
}

impl<S, C> Clone for BatchVerifier<S, C> {
    fn clone(&self) -> Self {
        Self {
            resolver: Arc::clone(&self.resolver),
            per_user_timeout: self.per_user_timeout,
            concurrency: self.concurrency,
        }
    }
}

impl<S, C> BatchVerifier<S, C> {
    /// Creates a verifier with default batch settings.
    pub fn new(resolver: Arc<Resolver<S, C>>) -> Self {
        Self {
            resolver,
            per_user_timeout: DEFAULT_BATCH_TIMEOUT,
            concurrency: DEFAULT_BATCH_CONCURRENCY,
        }
    }

    /// Creates a verifier using the batch settings of `config`.
    ///
    /// `config` is validated first, so a deserialized value with a zero
    /// timeout or concurrency is rejected.
    pub fn from_config(resolver: Arc<Resolver<S, C>>, config: &Config) -> crate::Result<Self> {
        config.validate()?;
        Ok(Self {
            resolver,
            per_user_timeout: config.batch_timeout,
            concurrency: config.batch_concurrency,
        })
    }

    /// Sets the deadline applied to each user.
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.per_user_timeout = timeout;
        self
    }

    /// Sets the maximum number of in-flight resolutions.
    pub fn with_concurrency(mut self, concurrency: usize) -> Self {
        self.concurrency = concurrency.max(1);
        self
    }

    /// Returns the shared resolver.
    pub fn resolver(&self) -> &Arc<Resolver<S, C>> {
        &self.resolver
    }
}

impl<S, C> BatchVerifier<S, C>
where
    S: RoleStore,
    C: Cache,
{
    /// Resolves every user; failed users are omitted from the map.
    pub async fn batch_verify<I>(&self, users: I) -> HashMap<UserId, VerificationResult>
    where
        I: IntoIterator<Item = UserId>,
    {
        self.run(users, false).await
    }

    /// Like [`BatchVerifier::batch_verify`], keeping only moderators.
    pub async fn batch_verify_moderators<I>(&self, users: I) -> HashMap<UserId, VerificationResult>
    where
        I: IntoIterator<Item = UserId>,
    {
        self.run(users, true).await
    }

    async fn run<I>(&self, users: I, require_moderator: bool) -> HashMap<UserId, VerificationResult>
    where
        I: IntoIterator<Item = UserId>,
    {
        let unique: HashSet<UserId> = users.into_iter().collect();
        let requested = unique.len();

        let outcomes: Vec<_> = stream::iter(unique)
            .map(|user| async move {
                let outcome = self
                    .resolver
                    .resolve_within(&user, require_moderator, self.per_user_timeout)
                    .await;
                (user, outcome)
            })
            .buffer_unordered(self.concurrency.max(1))
            .collect()
            .await;

        let mut verified = HashMap::with_capacity(requested);
        for (user, outcome) in outcomes {
            match outcome {
                Ok(result) => {
                    verified.insert(user, result);
                }
                Err(err) => {
                    warn!(
                        user_id = %user,
                        error = %err,
                        retryable = err.is_retryable(),
                        "batch verification failed, omitting user"
                    );
                }
            }
        }

        debug!(requested, verified = verified.len(), "batch verification finished");
        verified
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::StoreError;
    use crate::resolver::{ResolverBuilder, Source};
    use crate::role::CapabilityTier;
    use crate::store::Profile;
    use async_trait::async_trait;
    use std::sync::atomic::{AtomicUsize, Ordering};

    #[derive(Default)]
    struct RosterStore {
        roles: HashMap<String, &'static str>,
        in_flight: AtomicUsize,
        peak: AtomicUsize,
    }

    impl RosterStore {
        fn new(roles: &[(&str, &'static str)]) -> Self {
            Self {
                roles: roles
                    .iter()
                    .map(|(user, role)| (user.to_string(), *role))
                    .collect(),
                ..Self::default()
            }
        }
    }

    #[async_trait]
    impl RoleStore for RosterStore {
        async fn get_profile(&self, user: &UserId) -> Result<Option<Profile>, StoreError> {
            let now = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
            self.peak.fetch_max(now, Ordering::SeqCst);
            tokio::time::sleep(Duration::from_millis(1)).await;
            self.in_flight.fetch_sub(1, Ordering::SeqCst);

            match self.roles.get(user.as_str()).copied() {
                Some("hang") => {
                    std::future::pending::<()>().await;
                    Ok(None)
                }
                Some("broken") => Err("corrupt document".into()),
                Some(role) => Ok(Some(Profile::with_role(role))),
                None => Ok(None),
            }
        }
    }

    fn user(value: &str) -> UserId {
        UserId::try_from(value).unwrap()
    }

    fn verifier(store: RosterStore) -> BatchVerifier<RosterStore> {
        BatchVerifier::new(Arc::new(ResolverBuilder::new(store).build()))
    }

    #[test]
    fn from_config_should_reject_zero_concurrency_and_timeout() {
        let resolver = Arc::new(ResolverBuilder::new(RosterStore::default()).build());
        let no_workers = Config {
            batch_concurrency: 0,
            ..Config::default()
        };
        let no_deadline = Config {
            batch_timeout: Duration::ZERO,
            ..Config::default()
        };

        for config in [no_workers, no_deadline] {
            let result = BatchVerifier::from_config(Arc::clone(&resolver), &config);
            assert!(matches!(result, Err(crate::Error::InvalidConfig(_))));
        }
    }

    #[test]
    fn new_should_match_default_config() {
        let resolver = Arc::new(ResolverBuilder::new(RosterStore::default()).build());
        let from_defaults =
            BatchVerifier::from_config(Arc::clone(&resolver), &Config::default()).unwrap();
        let plain = BatchVerifier::new(resolver);

        assert_eq!(plain.per_user_timeout, from_defaults.per_user_timeout);
        assert_eq!(plain.concurrency, from_defaults.concurrency);
    }

    #[tokio::test]
    async fn batch_should_omit_failed_users() {
        let verifier = verifier(RosterStore::new(&[
            ("good", "therapist"),
            ("bad", "broken"),
            ("good2", "client"),
        ]));

        let results = verifier
            .batch_verify([user("good"), user("bad"), user("good2")])
            .await;

        assert_eq!(results.len(), 2);
        assert!(results.contains_key(&user("good")));
        assert!(results.contains_key(&user("good2")));
        assert!(!results.contains_key(&user("bad")));
        assert_eq!(
            results[&user("good2")].capability_tier,
            CapabilityTier::Participant
        );
    }

    #[tokio::test]
    async fn batch_should_omit_unknown_and_undefined_roles() {
        let verifier = verifier(RosterStore::new(&[("good", "admin"), ("blank", "")]));

        let results = verifier
            .batch_verify([user("good"), user("blank"), user("ghost")])
            .await;

        assert_eq!(results.keys().collect::<Vec<_>>(), vec![&user("good")]);
    }

    #[tokio::test(start_paused = true)]
    async fn hanging_user_should_not_stall_batch() {
        let verifier = verifier(RosterStore::new(&[("good", "therapist"), ("slow", "hang")]))
            .with_timeout(Duration::from_millis(100));

        let results = verifier.batch_verify([user("good"), user("slow")]).await;

        assert_eq!(results.len(), 1);
        assert!(results.contains_key(&user("good")));
    }

    #[tokio::test]
    async fn moderator_batch_should_drop_participants() {
        let verifier = verifier(RosterStore::new(&[
            ("t1", "therapist"),
            ("a1", "admin"),
            ("c1", "client"),
        ]));

        let results = verifier
            .batch_verify_moderators([user("t1"), user("a1"), user("c1")])
            .await;

        assert_eq!(results.len(), 2);
        assert!(results.values().all(VerificationResult::is_moderator));
    }

    #[tokio::test]
    async fn duplicates_should_resolve_once() {
        let verifier = verifier(RosterStore::new(&[("t1", "therapist")]));

        let results = verifier
            .batch_verify([user("t1"), user("t1"), user("t1")])
            .await;

        assert_eq!(results.len(), 1);
        assert_eq!(results[&user("t1")].source, Source::Store);
    }

    #[tokio::test]
    async fn concurrency_should_be_bounded() {
        let roster: Vec<(String, &'static str)> =
            (0..20).map(|i| (format!("u{i}"), "client")).collect();
        let borrowed: Vec<(&str, &'static str)> =
            roster.iter().map(|(user, role)| (user.as_str(), *role)).collect();
        let verifier = verifier(RosterStore::new(&borrowed)).with_concurrency(3);

        let results = verifier
            .batch_verify(roster.iter().map(|(id, _)| user(id)))
            .await;

        assert_eq!(results.len(), 20);
        assert!(verifier.resolver().store().peak.load(Ordering::SeqCst) <= 3);
    }
}
