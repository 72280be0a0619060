use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Identifier issued by the external identity provider.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct UserId(pub String);

impl fmt::Display for UserId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Identifier wrapper for listings.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct PropertyId(pub String);

impl PropertyId {
    pub fn generate() -> Self {
        Self(uuid::Uuid::new_v4().to_string())
    }
}

impl fmt::Display for PropertyId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct AccessLogId(pub String);

impl AccessLogId {
    pub fn generate() -> Self {
        Self(uuid::Uuid::new_v4().to_string())
    }
}

/// Role held by a user. Users without an explicit assignment are agents.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Role {
    #[default]
    Agent,
    Admin,
}

impl Role {
    pub const fn label(self) -> &'static str {
        match self {
            Role::Agent => "agent",
            Role::Admin => "admin",
        }
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

/// Authenticated identity performing an action.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Actor {
    pub id: UserId,
    pub role: Role,
}

impl Actor {
    pub fn new(id: impl Into<String>, role: Role) -> Self {
        Self {
            id: UserId(id.into()),
            role,
        }
    }

    pub fn is_admin(&self) -> bool {
        self.role == Role::Admin
    }

    pub fn owns(&self, property: &Property) -> bool {
        self.id == property.agent_id
    }
}

/// Per-request envelope: who is acting and where the request came from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RequestContext {
    pub actor: Actor,
    pub origin: Option<String>,
}

impl RequestContext {
    pub fn new(actor: Actor) -> Self {
        Self {
            actor,
            origin: None,
        }
    }

    pub fn with_origin(mut self, origin: impl Into<String>) -> Self {
        self.origin = Some(origin.into());
        self
    }
}

/// Profile row owned by the identity collaborator.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UserProfile {
    pub id: UserId,
    pub email: String,
    pub display_name: Option<String>,
    pub created_at: DateTime<Utc>,
}

/// Profile joined with its role assignment.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UserWithRole {
    #[serde(flatten)]
    pub profile: UserProfile,
    pub role: Role,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PropertyType {
    House,
    Apartment,
    Condo,
    Townhouse,
    Land,
    Commercial,
}

impl PropertyType {
    pub const fn label(self) -> &'static str {
        match self {
            PropertyType::House => "house",
            PropertyType::Apartment => "apartment",
            PropertyType::Condo => "condo",
            PropertyType::Townhouse => "townhouse",
            PropertyType::Land => "land",
            PropertyType::Commercial => "commercial",
        }
    }
}

/// Review state of a listing.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PropertyStatus {
    Draft,
    PendingApproval,
    Active,
    Sold,
    Rejected,
}

impl PropertyStatus {
    pub const ALL: [PropertyStatus; 5] = [
        PropertyStatus::Draft,
        PropertyStatus::PendingApproval,
        PropertyStatus::Active,
        PropertyStatus::Sold,
        PropertyStatus::Rejected,
    ];

    pub const fn label(self) -> &'static str {
        match self {
            PropertyStatus::Draft => "draft",
            PropertyStatus::PendingApproval => "pending_approval",
            PropertyStatus::Active => "active",
            PropertyStatus::Sold => "sold",
            PropertyStatus::Rejected => "rejected",
        }
    }

    /// Listings every authenticated actor may browse.
    pub const fn is_public(self) -> bool {
        matches!(self, PropertyStatus::Active | PropertyStatus::Sold)
    }

    /// States in which the owner may still change listing fields.
    pub const fn is_editable(self) -> bool {
        matches!(self, PropertyStatus::Draft | PropertyStatus::Rejected)
    }
}

impl fmt::Display for PropertyStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

/// Optional structural facts about a listing.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct PropertyAttributes {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub bedrooms: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub bathrooms: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub floor_area: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub lot_size: Option<f64>,
}

impl PropertyAttributes {
    pub(crate) fn named(&self) -> [(&'static str, Option<f64>); 4] {
        [
            ("bedrooms", self.bedrooms),
            ("bathrooms", self.bathrooms),
            ("floor_area", self.floor_area),
            ("lot_size", self.lot_size),
        ]
    }
}

/// Fields an agent supplies when creating a listing.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PropertyDraft {
    pub title: String,
    #[serde(default)]
    pub description: Option<String>,
    pub address: String,
    #[serde(default)]
    pub city: Option<String>,
    #[serde(default)]
    pub state: Option<String>,
    #[serde(default)]
    pub zip_code: Option<String>,
    pub price: f64,
    pub property_type: PropertyType,
    #[serde(flatten)]
    pub attributes: PropertyAttributes,
    #[serde(default)]
    pub images: Vec<String>,
}

/// Partial edit of a listing. Ownership and status cannot be edited.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct PropertyPatch {
    #[serde(default)]
    pub title: Option<String>,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub address: Option<String>,
    #[serde(default)]
    pub city: Option<String>,
    #[serde(default)]
    pub state: Option<String>,
    #[serde(default)]
    pub zip_code: Option<String>,
    #[serde(default)]
    pub price: Option<f64>,
    #[serde(default)]
    pub property_type: Option<PropertyType>,
    #[serde(default)]
    pub bedrooms: Option<f64>,
    #[serde(default)]
    pub bathrooms: Option<f64>,
    #[serde(default)]
    pub floor_area: Option<f64>,
    #[serde(default)]
    pub lot_size: Option<f64>,
    #[serde(default)]
    pub images: Option<Vec<String>>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Property {
    pub id: PropertyId,
    pub agent_id: UserId,
    pub title: String,
    pub description: Option<String>,
    pub address: String,
    pub city: Option<String>,
    pub state: Option<String>,
    pub zip_code: Option<String>,
    pub price: f64,
    pub property_type: PropertyType,
    #[serde(flatten)]
    pub attributes: PropertyAttributes,
    pub status: PropertyStatus,
    pub images: Vec<String>,
    pub rejection_reason: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Property {
    /// Materialises a new draft owned by `agent_id`.
    pub fn from_draft(
        id: PropertyId,
        agent_id: UserId,
        draft: PropertyDraft,
        now: DateTime<Utc>,
    ) -> Self {
        Self {
            id,
            agent_id,
            title: draft.title.trim().to_string(),
            description: non_blank(draft.description),
            address: draft.address.trim().to_string(),
            city: non_blank(draft.city),
            state: non_blank(draft.state),
            zip_code: non_blank(draft.zip_code),
            price: draft.price,
            property_type: draft.property_type,
            attributes: draft.attributes,
            status: PropertyStatus::Draft,
            images: draft.images,
            rejection_reason: None,
            created_at: now,
            updated_at: now,
        }
    }

    /// Returns a copy with the patch applied. Status, owner, and timestamps other than
    /// `updated_at` are carried over untouched.
    pub fn patched(&self, patch: PropertyPatch, now: DateTime<Utc>) -> Self {
        let mut next = self.clone();
        if let Some(title) = patch.title {
            next.title = title.trim().to_string();
        }
        if let Some(description) = patch.description {
            next.description = non_blank(Some(description));
        }
        if let Some(address) = patch.address {
            next.address = address.trim().to_string();
        }
        if let Some(city) = patch.city {
            next.city = non_blank(Some(city));
        }
        if let Some(state) = patch.state {
            next.state = non_blank(Some(state));
        }
        if let Some(zip_code) = patch.zip_code {
            next.zip_code = non_blank(Some(zip_code));
        }
        if let Some(price) = patch.price {
            next.price = price;
        }
        if let Some(property_type) = patch.property_type {
            next.property_type = property_type;
        }
        if patch.bedrooms.is_some() {
            next.attributes.bedrooms = patch.bedrooms;
        }
        if patch.bathrooms.is_some() {
            next.attributes.bathrooms = patch.bathrooms;
        }
        if patch.floor_area.is_some() {
            next.attributes.floor_area = patch.floor_area;
        }
        if patch.lot_size.is_some() {
            next.attributes.lot_size = patch.lot_size;
        }
        if let Some(images) = patch.images {
            next.images = images;
        }
        next.updated_at = now;
        next
    }
}

fn non_blank(value: Option<String>) -> Option<String> {
    value
        .map(|text| text.trim().to_string())
        .filter(|text| !text.is_empty())
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AuditOutcome {
    Success,
    Failure,
}

/// Append-only record of a security relevant action.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AccessLogEntry {
    pub id: AccessLogId,
    pub user_id: Option<UserId>,
    pub action: String,
    pub details: serde_json::Value,
    pub origin: Option<String>,
    pub outcome: AuditOutcome,
    pub created_at: DateTime<Utc>,
}

/// Listing counts surfaced on the agent/admin dashboard.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DashboardStats {
    pub total: usize,
    pub draft: usize,
    pub pending_approval: usize,
    pub active: usize,
    pub sold: usize,
    pub rejected: usize,
}

impl DashboardStats {
    pub fn tally(&mut self, status: PropertyStatus, count: usize) {
        self.total += count;
        let slot = match status {
            PropertyStatus::Draft => &mut self.draft,
            PropertyStatus::PendingApproval => &mut self.pending_approval,
            PropertyStatus::Active => &mut self.active,
            PropertyStatus::Sold => &mut self.sold,
            PropertyStatus::Rejected => &mut self.rejected,
        };
        *slot += count;
    }
}
