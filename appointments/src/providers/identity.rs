//! Identity lookup.

use super::ProviderError;
use crate::types::{ParticipantSummary, RequesterSnapshot, UserId};
use serde::{Deserialize, Serialize};
use std::future::Future;

/// Profile fields the identity service exposes for a user
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UserProfile {
    /// User id
    pub id: UserId,
    /// Given name
    #[serde(default)]
    pub first_name: Option<String>,
    /// Family name
    #[serde(default)]
    pub last_name: Option<String>,
    /// Email
    #[serde(default)]
    pub email: Option<String>,
    /// Phone
    #[serde(default)]
    pub phone: Option<String>,
    /// Company
    #[serde(default)]
    pub company: Option<String>,
    /// Job title
    #[serde(default)]
    pub job_title: Option<String>,
}

impl UserProfile {
    /// "First Last", skipping missing parts; falls back to the id
    #[must_use]
    pub fn display_name(&self) -> String {
        let name = [self.first_name.as_deref(), self.last_name.as_deref()]
            .into_iter()
            .flatten()
            .map(str::trim)
            .filter(|part| !part.is_empty())
            .collect::<Vec<_>>()
            .join(" ");

        if name.is_empty() {
            self.id.to_string()
        } else {
            name
        }
    }

    /// Contact details frozen onto an appointment at booking time
    #[must_use]
    pub fn snapshot(&self) -> RequesterSnapshot {
        RequesterSnapshot {
            name: Some(self.display_name()),
            email: self.email.clone(),
            phone: self.phone.clone(),
            company: self.company.clone(),
            title: self.job_title.clone(),
        }
    }

    /// Display fields attached to listings
    #[must_use]
    pub fn summary(&self) -> ParticipantSummary {
        ParticipantSummary {
            id: self.id.clone(),
            name: self.display_name(),
            email: self.email.clone(),
            company: self.company.clone(),
            job_title: self.job_title.clone(),
        }
    }
}

/// Resolves user ids to profiles.
pub trait IdentityLookup: Send + Sync {
    /// Fetch a user profile. `Ok(None)` means the user does not exist.
    ///
    /// # Errors
    ///
    /// Returns [`ProviderError`] when the identity service cannot answer.
    fn get_user(
        &self,
        id: &UserId,
    ) -> impl Future<Output = Result<Option<UserProfile>, ProviderError>> + Send;
}
