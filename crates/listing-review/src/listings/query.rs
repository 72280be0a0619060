//! Filter construction for listing and access-log reads.
//!
//! A caller-supplied [`PropertyQuery`] is turned into a [`PropertySelection`] together with
//! the actor's visibility overlay. The overlay is applied after the explicit filter, so no
//! query string can widen what a non-admin sees.

use std::cmp::Ordering;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::domain::{AccessLogEntry, Actor, Property, PropertyStatus, PropertyType, UserId};
use super::lifecycle::ValidationError;

/// Access-log reads never return more than this many rows.
pub const ACCESS_LOG_ROW_CAP: usize = 500;

/// Filter requested by the caller. Every field is optional and the rules are AND-combined.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct PropertyQuery {
    /// Case-insensitive substring matched against the title or the address.
    #[serde(default)]
    pub search: Option<String>,
    #[serde(default)]
    pub status: Option<PropertyStatus>,
    #[serde(default)]
    pub property_type: Option<PropertyType>,
    #[serde(default)]
    pub min_price: Option<f64>,
    #[serde(default)]
    pub max_price: Option<f64>,
    /// Restrict to listings owned by the caller ("my properties").
    #[serde(default)]
    pub ownership_scope: bool,
}

impl PropertyQuery {
    pub fn mine() -> Self {
        Self {
            ownership_scope: true,
            ..Self::default()
        }
    }

    /// Price bounds must be finite; a `NaN` bound would otherwise compare false and vanish.
    pub fn validate(&self) -> Result<(), ValidationError> {
        for (field, bound) in [("min_price", self.min_price), ("max_price", self.max_price)] {
            if bound.is_some_and(|value| !value.is_finite()) {
                return Err(ValidationError::new(field, "must be a finite number"));
            }
        }
        Ok(())
    }
}

/// Which listings an actor may see at all.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Visibility {
    Everything,
    PublicOrOwnedBy(UserId),
}

impl Visibility {
    pub fn for_actor(actor: &Actor) -> Self {
        if actor.is_admin() {
            Visibility::Everything
        } else {
            Visibility::PublicOrOwnedBy(actor.id.clone())
        }
    }

    pub fn admits(&self, property: &Property) -> bool {
        match self {
            Visibility::Everything => true,
            Visibility::PublicOrOwnedBy(viewer) => {
                property.status.is_public() || property.agent_id == *viewer
            }
        }
    }
}

/// Store-level predicate built from a query and the caller's visibility.
#[derive(Debug, Clone, PartialEq)]
pub struct PropertySelection {
    pub owner: Option<UserId>,
    pub status: Option<PropertyStatus>,
    pub property_type: Option<PropertyType>,
    pub min_price: Option<f64>,
    pub max_price: Option<f64>,
    needle: Option<String>,
    pub visibility: Visibility,
}

impl PropertySelection {
    pub fn for_actor(actor: &Actor, query: &PropertyQuery) -> Self {
        let needle = query
            .search
            .as_deref()
            .map(str::trim)
            .filter(|text| !text.is_empty())
            .map(str::to_lowercase);

        Self {
            owner: query.ownership_scope.then(|| actor.id.clone()),
            status: query.status,
            property_type: query.property_type,
            min_price: query.min_price,
            max_price: query.max_price,
            needle,
            visibility: Visibility::for_actor(actor),
        }
    }

    /// Every listing awaiting review; used by the admin queue.
    pub fn pending_review() -> Self {
        Self {
            status: Some(PropertyStatus::PendingApproval),
            ..Self::everything()
        }
    }

    /// All listings authored by `agent`, whatever their status.
    pub fn owned_by(agent: &UserId) -> Self {
        Self {
            owner: Some(agent.clone()),
            ..Self::everything()
        }
    }

    fn everything() -> Self {
        Self {
            owner: None,
            status: None,
            property_type: None,
            min_price: None,
            max_price: None,
            needle: None,
            visibility: Visibility::Everything,
        }
    }

    pub fn search(&self) -> Option<&str> {
        self.needle.as_deref()
    }

    pub fn matches(&self, property: &Property) -> bool {
        if let Some(owner) = &self.owner {
            if property.agent_id != *owner {
                return false;
            }
        }
        if let Some(status) = self.status {
            if property.status != status {
                return false;
            }
        }
        if let Some(property_type) = self.property_type {
            if property.property_type != property_type {
                return false;
            }
        }
        if let Some(min) = self.min_price {
            if property.price < min {
                return false;
            }
        }
        if let Some(max) = self.max_price {
            if property.price > max {
                return false;
            }
        }
        if let Some(needle) = &self.needle {
            let hit = property.title.to_lowercase().contains(needle)
                || property.address.to_lowercase().contains(needle);
            if !hit {
                return false;
            }
        }
        self.visibility.admits(property)
    }
}

/// Newest first; equal timestamps fall back to ascending id so pages are stable.
pub fn newest_first(left: &Property, right: &Property) -> Ordering {
    right
        .created_at
        .cmp(&left.created_at)
        .then_with(|| left.id.cmp(&right.id))
}

/// Filter over the access log. Date bounds are inclusive.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct AccessLogQuery {
    /// Case-insensitive substring matched against the action name.
    #[serde(default)]
    pub search: Option<String>,
    #[serde(default)]
    pub date_from: Option<DateTime<Utc>>,
    #[serde(default)]
    pub date_to: Option<DateTime<Utc>>,
}

impl AccessLogQuery {
    pub fn matches(&self, entry: &AccessLogEntry) -> bool {
        if let Some(needle) = self
            .search
            .as_deref()
            .map(str::trim)
            .filter(|text| !text.is_empty())
        {
            if !entry
                .action
                .to_lowercase()
                .contains(&needle.to_lowercase())
            {
                return false;
            }
        }
        if let Some(from) = self.date_from {
            if entry.created_at < from {
                return false;
            }
        }
        if let Some(to) = self.date_to {
            if entry.created_at > to {
                return false;
            }
        }
        true
    }
}

pub fn newest_log_first(left: &AccessLogEntry, right: &AccessLogEntry) -> Ordering {
    right
        .created_at
        .cmp(&left.created_at)
        .then_with(|| left.id.0.cmp(&right.id.0))
}
