//! Event registry.

use super::ProviderError;
use crate::types::EventId;
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use std::future::Future;

/// Basic metadata about an event
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EventSummary {
    /// Event id
    pub id: EventId,
    /// Event title
    pub title: String,
    /// First day, when known
    #[serde(default)]
    pub start_date: Option<NaiveDate>,
    /// Last day, when known
    #[serde(default)]
    pub end_date: Option<NaiveDate>,
}

/// Resolves event ids.
pub trait EventRegistry: Send + Sync {
    /// Fetch an event. `Ok(None)` means the event does not exist.
    ///
    /// # Errors
    ///
    /// Returns [`ProviderError`] when the registry cannot answer.
    fn get_event(
        &self,
        id: &EventId,
    ) -> impl Future<Output = Result<Option<EventSummary>, ProviderError>> + Send;
}
