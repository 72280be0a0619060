//! Listing review: lifecycle, authorization, filtered reads, audit, and the read cache.
//!
//! Callers go through [`ListingService`]; the HTTP surface in [`router`] is a thin adapter
//! over it. Storage is reached only through the traits in [`repository`].

pub mod audit;
pub mod authorization;
pub mod cache;
pub mod domain;
pub mod lifecycle;
pub mod memory;
pub mod query;
pub mod repository;
pub mod router;
pub mod service;

#[cfg(test)]
pub(crate) mod tests;

pub use audit::AuditRecorder;
pub use authorization::{authorize, can_perform, Action, AuthorizationError, Target};
pub use cache::{CachedRows, QueryCache, QueryKey, ResourceKind};
pub use domain::{
    AccessLogEntry, AccessLogId, Actor, AuditOutcome, DashboardStats, Property,
    PropertyAttributes, PropertyDraft, PropertyId, PropertyPatch, PropertyStatus, PropertyType,
    RequestContext, Role, UserId, UserProfile, UserWithRole,
};
pub use lifecycle::{
    plan_transition, transition_kind, TransitionError, TransitionKind, TransitionPlan,
    ValidationError,
};
pub use memory::InMemoryEntityStore;
pub use query::{AccessLogQuery, PropertyQuery, PropertySelection, ACCESS_LOG_ROW_CAP};
pub use repository::{AccessLogRepository, PropertyRepository, RepositoryError, UserDirectory};
pub use router::listing_router;
pub use service::{ListingService, ListingServiceError, UserDeletePolicy};
