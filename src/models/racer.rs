//! Racer identity persisted between app launches.

use serde::{Deserialize, Serialize};

/// The logged-in participant for one race.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Racer {
    /// CRM racer ID
    pub racer_id: String,
    /// Race bib number
    pub number: String,
    /// CRM client/session ID sent alongside the racer ID
    pub racer_client_id: String,
    /// Slug of the race this racer is registered for
    pub race_slug: String,
    pub email: String,
}
