use serde::{Deserialize, Serialize};
use tracker_core::ListingStatus;

/// Text rules that decide whether a fetched listing page is still live.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct StatusRules {
    /// Any of these (case-insensitive) marks the listing inactive.
    pub inactive_markers: Vec<String>,
    /// Labels only a live listing page shows.
    pub required_labels: Vec<String>,
    /// How many required labels must be present for `active`.
    pub required_label_threshold: usize,
}

impl Default for StatusRules {
    fn default() -> Self {
        Self {
            inactive_markers: [
                "udlejet",
                "ikke længere aktiv",
                "annoncen er fjernet",
                "reserveret",
                "annonceringen sættes på pause",
                "denne bolig er ikke længere",
            ]
            .map(String::from)
            .to_vec(),
            required_labels: ["sagsnr.", "ledig fra", "lejeperiode", "månedlig leje"]
                .map(String::from)
                .to_vec(),
            required_label_threshold: 3,
        }
    }
}

impl StatusRules {
    /// Any answer other than 200 reaching this point (a 404, 410, or other
    /// client error) means the listing is gone.
    pub fn classify(&self, http_status: u16, body: &str) -> ListingStatus {
        if http_status != 200 {
            return ListingStatus::Inactive;
        }
        let text = normalize(body);
        if self
            .inactive_markers
            .iter()
            .any(|marker| text.contains(&normalize(marker)))
        {
            return ListingStatus::Inactive;
        }
        let present = self
            .required_labels
            .iter()
            .filter(|label| text.contains(&normalize(label)))
            .count();
        if present >= self.required_label_threshold.max(1) {
            ListingStatus::Active
        } else {
            ListingStatus::Unknown
        }
    }
}

fn normalize(text: &str) -> String {
    text.split_whitespace()
        .collect::<Vec<_>>()
        .join(" ")
        .to_lowercase()
}
