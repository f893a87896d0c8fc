//! Grounding context assembly.
//!
//! Turns the live community feeds into a plain-text block that is appended
//! to the assistant's instructions on every request. Feed failures are
//! absorbed here: a feed that errors contributes nothing.

use crate::feeds::{CommunityFeed, CommunityRecord, ListingFeed, ListingRecord};
use std::sync::Arc;

const COMMUNITIES_HEADER: &str = "Active communities:";
const LISTINGS_HEADER: &str = "Marketplace listings:";

/// Builds the per-request context snapshot from the two feeds.
#[derive(Clone)]
pub struct ContextAssembler {
    communities: Arc<dyn CommunityFeed>,
    listings: Arc<dyn ListingFeed>,
    limit: usize,
}

impl ContextAssembler {
    /// Create an assembler that reads at most `limit` records per feed.
    pub fn new(
        communities: Arc<dyn CommunityFeed>,
        listings: Arc<dyn ListingFeed>,
        limit: usize,
    ) -> Self {
        Self {
            communities,
            listings,
            limit,
        }
    }

    /// Fetch both feeds concurrently and format them.
    ///
    /// Returns an empty string when both feeds are empty or failed.
    pub async fn build_context(&self) -> String {
        let (communities, listings) = tokio::join!(
            self.communities.communities(self.limit),
            self.listings.listings(self.limit)
        );

        let mut communities = communities.unwrap_or_else(|e| {
            tracing::warn!(error = %e, "Community feed unavailable, continuing without it");
            Vec::new()
        });

        let mut listings = listings.unwrap_or_else(|e| {
            tracing::warn!(error = %e, "Listing feed unavailable, continuing without it");
            Vec::new()
        });

        communities.truncate(self.limit);
        listings.truncate(self.limit);

        tracing::debug!(
            communities = communities.len(),
            listings = listings.len(),
            "Context assembled"
        );

        format_context(&communities, &listings)
    }
}

/// Render the two record lists as prompt text.
pub fn format_context(communities: &[CommunityRecord], listings: &[ListingRecord]) -> String {
    let mut sections = Vec::with_capacity(2);

    if !communities.is_empty() {
        let mut section = String::from(COMMUNITIES_HEADER);
        for community in communities {
            section.push('\n');
            section.push_str(&format_community(community));
        }
        sections.push(section);
    }

    if !listings.is_empty() {
        let mut section = String::from(LISTINGS_HEADER);
        for listing in listings {
            section.push('\n');
            section.push_str(&format_listing(listing));
        }
        sections.push(section);
    }

    sections.join("\n\n")
}

fn format_community(community: &CommunityRecord) -> String {
    let mut line = format!("- {} ({} members)", community.name, community.member_count);

    if let Some(tags) = community.tags.as_ref().filter(|tags| !tags.is_empty()) {
        line.push_str(&format!(" [Tags: {}]", tags.join(", ")));
    }

    line
}

fn format_listing(listing: &ListingRecord) -> String {
    format!(
        "- {} ({}) - {}",
        listing.title,
        listing.category,
        price_label(listing.price)
    )
}

/// `Free` for a missing or zero price, otherwise a dollar amount like `$1,250.00`.
pub fn price_label(price: Option<f64>) -> String {
    match price {
        None => "Free".to_string(),
        Some(p) if p == 0.0 => "Free".to_string(),
        Some(p) => format_currency(p),
    }
}

fn format_currency(amount: f64) -> String {
    let fixed = format!("{:.2}", amount.abs());
    let (whole, fraction) = fixed.split_once('.').unwrap_or((fixed.as_str(), "00"));

    let mut grouped = String::with_capacity(whole.len() + whole.len() / 3);
    for (i, ch) in whole.chars().enumerate() {
        if i > 0 && (whole.len() - i) % 3 == 0 {
            grouped.push(',');
        }
        grouped.push(ch);
    }

    let sign = if amount < 0.0 { "-" } else { "" };
    format!("{}${}.{}", sign, grouped, fraction)
}
