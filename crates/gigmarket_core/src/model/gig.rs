//! Gig records.

use crate::entity::{EntityId, UserId};
use crate::model::record::{Collection, Record};
use crate::types::now_millis;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Lifecycle of a gig.
///
/// `Open` is initial. `Assigned` is terminal for hiring.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum GigStatus {
    /// Accepting bids, nobody hired yet.
    Open,
    /// A bid has been hired.
    Assigned,
}

impl fmt::Display for GigStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Open => "open",
            Self::Assigned => "assigned",
        })
    }
}

impl FromStr for GigStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "open" => Ok(Self::Open),
            "assigned" => Ok(Self::Assigned),
            other => Err(format!("unknown gig status: {other}")),
        }
    }
}

/// A paid task posted by a client.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Gig {
    /// Gig ID.
    pub id: EntityId,
    /// The client who created the gig. Never changes.
    pub owner: UserId,
    /// Short title.
    pub title: String,
    /// Free-text description.
    pub description: String,
    /// Budget in minor currency units.
    pub budget: u64,
    /// Current status.
    pub status: GigStatus,
    /// The hired freelancer; set exactly once, together with `Assigned`.
    pub assigned_to: Option<UserId>,
    /// Creation time, milliseconds since the Unix epoch.
    pub created_at: u64,
}

impl Gig {
    /// Creates an open, unassigned gig owned by `owner`.
    #[must_use]
    pub fn new(owner: UserId, fields: NewGig) -> Self {
        Self {
            id: EntityId::new(),
            owner,
            title: fields.title,
            description: fields.description,
            budget: fields.budget,
            status: GigStatus::Open,
            assigned_to: None,
            created_at: now_millis(),
        }
    }

    /// Whether the gig still accepts bids and hires.
    #[must_use]
    pub fn is_open(&self) -> bool {
        self.status == GigStatus::Open
    }

    /// Marks the gig assigned to `freelancer`.
    pub(crate) fn assign(&mut self, freelancer: UserId) {
        self.status = GigStatus::Assigned;
        self.assigned_to = Some(freelancer);
    }

    /// Whether `status == Assigned` exactly when `assigned_to` is set.
    #[must_use]
    pub fn is_consistent(&self) -> bool {
        (self.status == GigStatus::Assigned) == self.assigned_to.is_some()
    }

    /// Case-insensitive substring match over title or description.
    ///
    /// `needle` must already be lowercase.
    #[must_use]
    pub fn matches_text(&self, needle: &str) -> bool {
        self.title.to_lowercase().contains(needle)
            || self.description.to_lowercase().contains(needle)
    }
}

impl Record for Gig {
    const COLLECTION: Collection = Collection::Gigs;

    fn entity_id(&self) -> EntityId {
        self.id
    }
}

/// Fields supplied when posting a gig.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewGig {
    /// Title.
    pub title: String,
    /// Description.
    pub description: String,
    /// Budget in minor currency units.
    pub budget: u64,
}

impl NewGig {
    /// Creates gig fields.
    pub fn new(title: impl Into<String>, description: impl Into<String>, budget: u64) -> Self {
        Self {
            title: title.into(),
            description: description.into(),
            budget,
        }
    }
}

/// Descriptive fields an owner may change on an open gig.
///
/// Status and assignment are deliberately absent.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct GigPatch {
    /// New title.
    pub title: Option<String>,
    /// New description.
    pub description: Option<String>,
    /// New budget.
    pub budget: Option<u64>,
}

impl GigPatch {
    /// Whether the patch changes nothing.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.title.is_none() && self.description.is_none() && self.budget.is_none()
    }

    pub(crate) fn apply_to(&self, gig: &mut Gig) {
        if let Some(title) = &self.title {
            gig.title.clone_from(title);
        }
        if let Some(description) = &self.description {
            gig.description.clone_from(description);
        }
        if let Some(budget) = self.budget {
            gig.budget = budget;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn gig(title: &str, description: &str) -> Gig {
        Gig::new(UserId::new("client"), NewGig::new(title, description, 1_000))
    }

    #[test]
    fn new_gig_is_open_and_consistent() {
        let g = gig("Build a web site", "React");
        assert!(g.is_open());
        assert!(g.assigned_to.is_none());
        assert!(g.is_consistent());
    }

    #[test]
    fn assign_sets_both_fields() {
        let mut g = gig("Logo", "Vector");
        g.assign(UserId::new("ada"));
        assert_eq!(g.status, GigStatus::Assigned);
        assert_eq!(g.assigned_to, Some(UserId::new("ada")));
        assert!(g.is_consistent());

        g.assigned_to = None;
        assert!(!g.is_consistent());
    }

    #[test]
    fn text_match_is_case_insensitive_over_both_fields() {
        let g = gig("Build a WEB site", "needs hosting");
        assert!(g.matches_text("web"));
        assert!(g.matches_text("hosting"));
        assert!(!gig("Landscaping", "Garden work").matches_text("web"));
    }

    #[test]
    fn status_parses_and_displays() {
        assert_eq!("Open".parse::<GigStatus>().unwrap(), GigStatus::Open);
        assert_eq!(GigStatus::Assigned.to_string(), "assigned");
        assert!("closed".parse::<GigStatus>().is_err());
    }

    #[test]
    fn patch_touches_only_given_fields() {
        let mut g = gig("Old", "Same");
        let patch = GigPatch {
            title: Some("New".into()),
            budget: Some(5),
            ..GigPatch::default()
        };
        patch.apply_to(&mut g);
        assert_eq!(g.title, "New");
        assert_eq!(g.description, "Same");
        assert_eq!(g.budget, 5);
        assert!(GigPatch::default().is_empty());
    }

    #[test]
    fn cbor_keeps_assignment() {
        let mut g = gig("Copywriting", "Blog posts");
        g.assign(UserId::new("bob"));
        assert_eq!(Gig::decode(&g.encode().unwrap()).unwrap(), g);
    }
}
