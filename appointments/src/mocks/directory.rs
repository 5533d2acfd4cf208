//! Mock identity lookup and event registry.

use super::lock;
use crate::providers::{EventRegistry, EventSummary, IdentityLookup, ProviderError, UserProfile};
use crate::types::{EventId, UserId};
use std::collections::HashMap;
use std::future::Future;
use std::hash::Hash;
use std::sync::{Arc, Mutex};
use std::time::Duration;

#[derive(Debug)]
struct Directory<K, V> {
    entries: HashMap<K, V>,
    delay: Option<Duration>,
    failure: Option<ProviderError>,
    calls: usize,
}

impl<K, V> Default for Directory<K, V> {
    fn default() -> Self {
        Self {
            entries: HashMap::new(),
            delay: None,
            failure: None,
            calls: 0,
        }
    }
}

impl<K: Eq + Hash, V: Clone> Directory<K, V> {
    /// Record the call and capture the answer; the delay is applied by the caller
    fn answer(&mut self, key: &K) -> (Option<Duration>, Result<Option<V>, ProviderError>) {
        self.calls += 1;
        let result = self
            .failure
            .clone()
            .map_or_else(|| Ok(self.entries.get(key).cloned()), Err);
        (self.delay, result)
    }
}

async fn respond<V>(delay: Option<Duration>, result: V) -> V {
    if let Some(delay) = delay {
        tokio::time::sleep(delay).await;
    }
    result
}

/// In-memory user directory.
#[derive(Debug, Clone, Default)]
pub struct MockIdentityLookup {
    inner: Arc<Mutex<Directory<UserId, UserProfile>>>,
}

impl MockIdentityLookup {
    /// Empty directory
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a user with a name and company
    #[must_use]
    pub fn with_user(self, id: &str, first_name: &str, last_name: &str, company: &str) -> Self {
        self.insert(UserProfile {
            id: UserId::new(id),
            first_name: Some(first_name.to_string()),
            last_name: Some(last_name.to_string()),
            email: Some(format!("{}@example.com", id.to_lowercase())),
            phone: None,
            company: Some(company.to_string()),
            job_title: None,
        });
        self
    }

    /// Add or replace a profile
    pub fn insert(&self, profile: UserProfile) {
        lock(&self.inner).entries.insert(profile.id.clone(), profile);
    }

    /// Delay every answer
    pub fn set_delay(&self, delay: Option<Duration>) {
        lock(&self.inner).delay = delay;
    }

    /// Fail every lookup with `failure` until cleared with `None`
    pub fn set_failure(&self, failure: Option<ProviderError>) {
        lock(&self.inner).failure = failure;
    }

    /// Number of lookups so far
    #[must_use]
    pub fn calls(&self) -> usize {
        lock(&self.inner).calls
    }
}

impl IdentityLookup for MockIdentityLookup {
    fn get_user(
        &self,
        id: &UserId,
    ) -> impl Future<Output = Result<Option<UserProfile>, ProviderError>> + Send {
        let (delay, result) = lock(&self.inner).answer(id);
        respond(delay, result)
    }
}

/// In-memory event directory.
#[derive(Debug, Clone, Default)]
pub struct MockEventRegistry {
    inner: Arc<Mutex<Directory<EventId, EventSummary>>>,
}

impl MockEventRegistry {
    /// Empty directory
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Add an event
    #[must_use]
    pub fn with_event(self, id: &str, title: &str) -> Self {
        self.insert(EventSummary {
            id: EventId::new(id),
            title: title.to_string(),
            start_date: None,
            end_date: None,
        });
        self
    }

    /// Add or replace an event
    pub fn insert(&self, event: EventSummary) {
        lock(&self.inner).entries.insert(event.id.clone(), event);
    }

    /// Delay every answer
    pub fn set_delay(&self, delay: Option<Duration>) {
        lock(&self.inner).delay = delay;
    }

    /// Fail every lookup with `failure` until cleared with `None`
    pub fn set_failure(&self, failure: Option<ProviderError>) {
        lock(&self.inner).failure = failure;
    }

    /// Number of lookups so far
    #[must_use]
    pub fn calls(&self) -> usize {
        lock(&self.inner).calls
    }
}

impl EventRegistry for MockEventRegistry {
    fn get_event(
        &self,
        id: &EventId,
    ) -> impl Future<Output = Result<Option<EventSummary>, ProviderError>> + Send {
        let (delay, result) = lock(&self.inner).answer(id);
        respond(delay, result)
    }
}
