use std::collections::HashMap;
use std::sync::Arc;

use chrono::Utc;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use tracing::{info, warn};

use super::audit::AuditRecorder;
use super::authorization::{authorize, Action, AuthorizationError, Target};
use super::cache::{CachedRows, FetchTicket, QueryCache, QueryKey, ResourceKind};
use super::domain::{
    AccessLogEntry, Actor, AuditOutcome, DashboardStats, Property, PropertyDraft, PropertyId,
    PropertyPatch, PropertyStatus, RequestContext, Role, UserId, UserProfile, UserWithRole,
};
use super::lifecycle::{
    plan_transition, validate_draft, validate_listing, TransitionError, ValidationError,
};
use super::query::{
    AccessLogQuery, PropertyQuery, PropertySelection, ACCESS_LOG_ROW_CAP,
};
use super::repository::{
    AccessLogRepository, PropertyRepository, RepositoryError, UserDirectory,
};
use crate::config::ListingConfig;

/// What happens to an agent's listings when their account is deleted.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum UserDeletePolicy {
    /// Listings stay behind with the departed agent's id.
    #[default]
    RetainListings,
    /// Listings are deleted one row at a time before the profile goes.
    CascadeListings,
}

impl UserDeletePolicy {
    pub fn parse(raw: &str) -> Option<Self> {
        match raw.trim().to_ascii_lowercase().as_str() {
            "retain" | "retain_listings" => Some(Self::RetainListings),
            "cascade" | "cascade_listings" => Some(Self::CascadeListings),
            _ => None,
        }
    }

    pub const fn label(self) -> &'static str {
        match self {
            UserDeletePolicy::RetainListings => "retain",
            UserDeletePolicy::CascadeListings => "cascade",
        }
    }
}

/// Service composing authorization, lifecycle, queries, audit, and the read cache.
pub struct ListingService<S, L> {
    store: Arc<S>,
    audit: AuditRecorder<L>,
    cache: QueryCache,
    config: ListingConfig,
}

impl<S, L> ListingService<S, L>
where
    S: PropertyRepository + UserDirectory + 'static,
    L: AccessLogRepository + 'static,
{
    pub fn new(store: Arc<S>, access_log: Arc<L>, config: ListingConfig) -> Self {
        Self {
            store,
            audit: AuditRecorder::new(access_log),
            cache: QueryCache::with_capacity(config.cache_capacity),
            config,
        }
    }

    pub fn config(&self) -> &ListingConfig {
        &self.config
    }

    pub fn cache(&self) -> &QueryCache {
        &self.cache
    }

    /// Turns an identity-provider subject into an actor, joining the role table.
    pub fn resolve_actor(&self, user_id: &UserId) -> Result<Actor, ListingServiceError> {
        self.store
            .fetch_user(user_id)?
            .ok_or_else(|| ListingServiceError::not_found("user", user_id))?;
        let role = self.store.role_of(user_id)?.unwrap_or_default();
        Ok(Actor {
            id: user_id.clone(),
            role,
        })
    }

    /// Upserts a profile on behalf of the identity collaborator.
    pub fn sync_user(&self, profile: UserProfile) -> Result<UserProfile, ListingServiceError> {
        let stored = self.store.upsert_user(profile)?;
        self.cache.invalidate_resources(&[ResourceKind::Users]);
        Ok(stored)
    }

    /// Discards cached reads of the actor (logout).
    pub fn end_session(&self, actor: &Actor) {
        let evicted = self.cache.evict_actor(&actor.id);
        info!(actor = %actor.id, evicted, "session cache torn down");
    }

    pub fn create_property(
        &self,
        ctx: &RequestContext,
        draft: PropertyDraft,
    ) -> Result<Property, ListingServiceError> {
        self.guard(ctx, Action::CreateProperty, None, json!({}))?;
        validate_draft(&draft)?;

        let property = Property::from_draft(
            PropertyId::generate(),
            ctx.actor.id.clone(),
            draft,
            Utc::now(),
        );
        let stored = self.store.insert(property)?;

        self.record_success(
            ctx,
            "property.create",
            json!({ "property_id": stored.id, "title": stored.title }),
        );
        self.listings_changed();
        info!(property_id = %stored.id, agent = %stored.agent_id, "listing created");
        Ok(stored)
    }

    /// Edits listing fields while the listing is still editable.
    pub fn update_property(
        &self,
        ctx: &RequestContext,
        id: &PropertyId,
        patch: PropertyPatch,
    ) -> Result<Property, ListingServiceError> {
        let current = self.fetch_property(id)?;
        self.guard(
            ctx,
            Action::EditProperty,
            Some(Target::Property(&current)),
            json!({ "property_id": id, "status": current.status }),
        )?;

        let next = current.patched(patch, Utc::now());
        validate_listing(&next)?;
        self.store
            .update(next.clone(), current.status)
            .map_err(|err| ListingServiceError::from_store(err, "property", id))?;

        self.record_success(ctx, "property.update", json!({ "property_id": id }));
        self.listings_changed();
        info!(property_id = %id, "listing updated");
        Ok(next)
    }

    /// Moves a listing along the review lifecycle.
    pub fn transition_property(
        &self,
        ctx: &RequestContext,
        id: &PropertyId,
        target: PropertyStatus,
        reason: Option<&str>,
    ) -> Result<Property, ListingServiceError> {
        let current = self.fetch_property(id)?;

        let plan = match plan_transition(&ctx.actor, &current, target, reason) {
            Ok(plan) => plan,
            Err(TransitionError::Validation(err)) => return Err(err.into()),
            Err(err) => {
                self.record_failure(
                    ctx,
                    "property.transition",
                    json!({
                        "property_id": id,
                        "from": current.status,
                        "to": target,
                        "error": err.to_string(),
                    }),
                );
                warn!(property_id = %id, from = %current.status, to = %target, %err, "transition refused");
                return Err(err.into());
            }
        };

        let next = plan.apply(&current, Utc::now());
        self.store
            .update(next.clone(), plan.from)
            .map_err(|err| ListingServiceError::from_store(err, "property", id))?;

        let mut details = json!({
            "property_id": id,
            "from": plan.from,
            "to": plan.to,
        });
        if let Some(reason) = plan.reason() {
            details["reason"] = Value::from(reason);
        }
        if let Some(previous) = &current.rejection_reason {
            details["previous_rejection_reason"] = Value::from(previous.as_str());
        }
        self.record_success(ctx, plan.kind.audit_action(), details);
        self.listings_changed();
        info!(property_id = %id, from = %plan.from, to = %plan.to, "listing transitioned");
        Ok(next)
    }

    pub fn delete_property(
        &self,
        ctx: &RequestContext,
        id: &PropertyId,
    ) -> Result<(), ListingServiceError> {
        let current = self.fetch_property(id)?;
        self.guard(
            ctx,
            Action::DeleteProperty,
            Some(Target::Property(&current)),
            json!({ "property_id": id, "status": current.status }),
        )?;

        self.store
            .delete(id)
            .map_err(|err| ListingServiceError::from_store(err, "property", id))?;

        self.record_success(
            ctx,
            "property.delete",
            json!({ "property_id": id, "status": current.status }),
        );
        self.listings_changed();
        info!(property_id = %id, "listing deleted");
        Ok(())
    }

    /// Single listing. Hidden and missing listings are indistinguishable.
    pub fn get_property(
        &self,
        ctx: &RequestContext,
        id: &PropertyId,
    ) -> Result<Property, ListingServiceError> {
        let key = QueryKey::new(&ctx.actor, ResourceKind::PropertyDetail, id);
        if let Some(CachedRows::Property(property)) = self.cached(&key) {
            return Ok(property);
        }

        let ticket = self.cache.begin_fetch();
        let property = self
            .store
            .fetch(id)?
            .filter(|property| {
                authorize(&ctx.actor, Action::ViewProperty, Some(Target::Property(property)))
                    .is_ok()
            })
            .ok_or_else(|| ListingServiceError::not_found("property", id))?;

        self.remember(key, CachedRows::Property(property.clone()), ticket);
        Ok(property)
    }

    pub fn list_properties(
        &self,
        ctx: &RequestContext,
        query: &PropertyQuery,
    ) -> Result<Vec<Property>, ListingServiceError> {
        query.validate()?;
        let key = QueryKey::new(&ctx.actor, ResourceKind::Properties, query);
        if let Some(CachedRows::Properties(rows)) = self.cached(&key) {
            return Ok(rows);
        }

        let ticket = self.cache.begin_fetch();
        let selection = PropertySelection::for_actor(&ctx.actor, query);
        let rows = self
            .store
            .select(&selection, self.config.max_property_rows)?;

        self.remember(key, CachedRows::Properties(rows.clone()), ticket);
        Ok(rows)
    }

    /// Admin review queue, newest first.
    pub fn pending_properties(
        &self,
        ctx: &RequestContext,
    ) -> Result<Vec<Property>, ListingServiceError> {
        self.guard(ctx, Action::ViewReviewQueue, None, json!({}))?;

        let key = QueryKey::new(&ctx.actor, ResourceKind::PendingProperties, &());
        if let Some(CachedRows::Properties(rows)) = self.cached(&key) {
            return Ok(rows);
        }

        let ticket = self.cache.begin_fetch();
        let rows = self.store.select(
            &PropertySelection::pending_review(),
            self.config.max_property_rows,
        )?;

        self.remember(key, CachedRows::Properties(rows.clone()), ticket);
        Ok(rows)
    }

    /// Counts of listings visible to the actor, in total and per status.
    pub fn dashboard(&self, ctx: &RequestContext) -> Result<DashboardStats, ListingServiceError> {
        let key = QueryKey::new(&ctx.actor, ResourceKind::Dashboard, &());
        if let Some(CachedRows::Dashboard(stats)) = self.cached(&key) {
            return Ok(stats);
        }

        let ticket = self.cache.begin_fetch();
        let selection = PropertySelection::for_actor(&ctx.actor, &PropertyQuery::default());
        let mut stats = DashboardStats::default();
        for (status, count) in self.store.count_by_status(&selection)? {
            stats.tally(status, count);
        }

        self.remember(key, CachedRows::Dashboard(stats), ticket);
        Ok(stats)
    }

    /// Profiles joined with role assignments; users without one are agents.
    pub fn list_users(
        &self,
        ctx: &RequestContext,
    ) -> Result<Vec<UserWithRole>, ListingServiceError> {
        self.guard(ctx, Action::ViewUsers, None, json!({}))?;

        let key = QueryKey::new(&ctx.actor, ResourceKind::Users, &());
        if let Some(CachedRows::Users(rows)) = self.cached(&key) {
            return Ok(rows);
        }

        let ticket = self.cache.begin_fetch();
        let roles: HashMap<UserId, Role> = self.store.role_assignments()?.into_iter().collect();
        let mut rows: Vec<UserWithRole> = self
            .store
            .list_users()?
            .into_iter()
            .map(|profile| {
                let role = roles.get(&profile.id).copied().unwrap_or_default();
                UserWithRole { profile, role }
            })
            .collect();
        rows.sort_by(|left, right| right.profile.created_at.cmp(&left.profile.created_at));

        self.remember(key, CachedRows::Users(rows.clone()), ticket);
        Ok(rows)
    }

    pub fn set_user_role(
        &self,
        ctx: &RequestContext,
        user_id: &UserId,
        role: Role,
    ) -> Result<(), ListingServiceError> {
        self.guard(
            ctx,
            Action::ChangeUserRole,
            Some(Target::User(user_id)),
            json!({ "user_id": user_id, "role": role }),
        )?;
        self.store
            .fetch_user(user_id)?
            .ok_or_else(|| ListingServiceError::not_found("user", user_id))?;

        let previous = self.store.role_of(user_id)?.unwrap_or_default();
        self.store.assign_role(user_id, role)?;

        self.record_success(
            ctx,
            "user.role_change",
            json!({ "user_id": user_id, "previous_role": previous, "role": role }),
        );
        self.cache.invalidate_actor(user_id);
        self.cache
            .invalidate_resources(&[ResourceKind::Users, ResourceKind::AccessLogs]);
        info!(user_id = %user_id, %previous, %role, "role changed");
        Ok(())
    }

    pub fn delete_user(
        &self,
        ctx: &RequestContext,
        user_id: &UserId,
    ) -> Result<(), ListingServiceError> {
        self.guard(
            ctx,
            Action::DeleteUser,
            Some(Target::User(user_id)),
            json!({ "user_id": user_id }),
        )?;
        self.store
            .fetch_user(user_id)?
            .ok_or_else(|| ListingServiceError::not_found("user", user_id))?;

        let policy = self.config.user_delete_policy;
        let mut removed = Vec::new();
        let outcome = self.purge_user(user_id, policy, &mut removed);

        self.cache.invalidate_actor(user_id);
        self.cache
            .invalidate_resources(&[ResourceKind::Users, ResourceKind::AccessLogs]);
        if !removed.is_empty() {
            self.listings_changed();
        }

        let mut details = json!({
            "user_id": user_id,
            "policy": policy.label(),
            "removed_properties": removed,
        });
        match outcome {
            Ok(()) => {
                self.record_success(ctx, "user.delete", details);
                info!(user_id = %user_id, policy = policy.label(), removed = removed.len(), "user deleted");
                Ok(())
            }
            Err(err) => {
                details["error"] = Value::from(err.to_string());
                self.record_failure(ctx, "user.delete", details);
                warn!(user_id = %user_id, removed = removed.len(), %err, "user deletion interrupted");
                Err(err)
            }
        }
    }

    /// Newest entries first, never more than [`ACCESS_LOG_ROW_CAP`].
    pub fn list_access_logs(
        &self,
        ctx: &RequestContext,
        query: &AccessLogQuery,
    ) -> Result<Vec<AccessLogEntry>, ListingServiceError> {
        self.guard(ctx, Action::ViewAccessLogs, None, json!({}))?;

        let key = QueryKey::new(&ctx.actor, ResourceKind::AccessLogs, query);
        if let Some(CachedRows::AccessLogs(rows)) = self.cached(&key) {
            return Ok(rows);
        }

        let ticket = self.cache.begin_fetch();
        let rows = self.audit.sink().recent(query, ACCESS_LOG_ROW_CAP)?;

        self.remember(key, CachedRows::AccessLogs(rows.clone()), ticket);
        Ok(rows)
    }

    /// Owned listings (under cascade), then the role row, then the profile. The profile goes
    /// last so an interrupted run never leaves a role behind for a missing user. Listings removed
    /// before a failure stay in `removed`.
    fn purge_user(
        &self,
        user_id: &UserId,
        policy: UserDeletePolicy,
        removed: &mut Vec<PropertyId>,
    ) -> Result<(), ListingServiceError> {
        if policy == UserDeletePolicy::CascadeListings {
            let owned = self
                .store
                .select(&PropertySelection::owned_by(user_id), usize::MAX)?;
            for property in owned {
                match self.store.delete(&property.id) {
                    Ok(()) | Err(RepositoryError::NotFound) => removed.push(property.id),
                    Err(err) => return Err(err.into()),
                }
            }
        }

        self.store.remove_role(user_id)?;
        self.store
            .delete_user(user_id)
            .map_err(|err| ListingServiceError::from_store(err, "user", user_id))
    }

    fn cached(&self, key: &Option<QueryKey>) -> Option<CachedRows> {
        key.as_ref().and_then(|key| self.cache.get(key))
    }

    fn remember(&self, key: Option<QueryKey>, rows: CachedRows, ticket: FetchTicket) {
        if let Some(key) = key {
            self.cache.put(key, rows, ticket);
        }
    }

    fn fetch_property(&self, id: &PropertyId) -> Result<Property, ListingServiceError> {
        self.store
            .fetch(id)?
            .ok_or_else(|| ListingServiceError::not_found("property", id))
    }

    /// Authorizes, recording denied attempts in the access log.
    fn guard(
        &self,
        ctx: &RequestContext,
        action: Action,
        target: Option<Target<'_>>,
        details: Value,
    ) -> Result<(), ListingServiceError> {
        authorize(&ctx.actor, action, target).map_err(|err| {
            let mut details = details;
            if let Value::Object(map) = &mut details {
                map.insert("denied".to_string(), Value::from(action.label()));
            }
            self.record_failure(ctx, audit_action_for(action), details);
            warn!(actor = %ctx.actor.id, role = %ctx.actor.role, action = action.label(), "action denied");
            err.into()
        })
    }

    fn record_success(&self, ctx: &RequestContext, action: &str, details: Value) {
        self.audit.record(
            Some(&ctx.actor.id),
            action,
            details,
            AuditOutcome::Success,
            ctx.origin.as_deref(),
        );
    }

    fn record_failure(&self, ctx: &RequestContext, action: &str, details: Value) {
        self.audit.record(
            Some(&ctx.actor.id),
            action,
            details,
            AuditOutcome::Failure,
            ctx.origin.as_deref(),
        );
        self.cache.invalidate_resources(&[ResourceKind::AccessLogs]);
    }

    fn listings_changed(&self) {
        self.cache.invalidate_resources(&ResourceKind::LISTING_READS);
        self.cache.invalidate_resources(&[ResourceKind::AccessLogs]);
    }
}

fn audit_action_for(action: Action) -> &'static str {
    match action {
        Action::CreateProperty => "property.create",
        Action::EditProperty => "property.update",
        Action::SubmitProperty
        | Action::ReviewProperty
        | Action::MarkPropertySold
        | Action::ChangePropertyStatus => "property.transition",
        Action::DeleteProperty => "property.delete",
        Action::ViewProperty => "property.view",
        Action::ViewReviewQueue => "admin.review_queue",
        Action::ViewUsers => "admin.users",
        Action::ChangeUserRole => "user.role_change",
        Action::DeleteUser => "user.delete",
        Action::ViewAccessLogs => "admin.access_logs",
    }
}

/// Error raised by the listing service.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum ListingServiceError {
    #[error(transparent)]
    Authorization(#[from] AuthorizationError),
    #[error(transparent)]
    Validation(#[from] ValidationError),
    #[error("cannot move listing from {from} to {to} as {role}")]
    InvalidTransition {
        from: PropertyStatus,
        to: PropertyStatus,
        role: Role,
    },
    #[error("{entity} '{id}' not found")]
    NotFound { entity: &'static str, id: String },
    #[error("{entity} '{id}' changed while the request was in flight")]
    Conflict { entity: &'static str, id: String },
    #[error("entity store unavailable: {0}")]
    StoreUnavailable(String),
}

impl ListingServiceError {
    pub fn not_found(entity: &'static str, id: impl ToString) -> Self {
        Self::NotFound {
            entity,
            id: id.to_string(),
        }
    }

    /// Maps a write against a known row; a vanished row reads as `NotFound` and a row that
    /// moved on since it was read as `Conflict`.
    pub fn from_store(err: RepositoryError, entity: &'static str, id: impl ToString) -> Self {
        match err {
            RepositoryError::NotFound => Self::not_found(entity, id),
            RepositoryError::Conflict => Self::Conflict {
                entity,
                id: id.to_string(),
            },
            other => other.into(),
        }
    }
}

impl From<RepositoryError> for ListingServiceError {
    fn from(value: RepositoryError) -> Self {
        Self::StoreUnavailable(value.to_string())
    }
}

impl From<TransitionError> for ListingServiceError {
    fn from(value: TransitionError) -> Self {
        match value {
            TransitionError::Unauthorized(err) => Self::Authorization(err),
            TransitionError::InvalidTransition { from, to, role } => {
                Self::InvalidTransition { from, to, role }
            }
            TransitionError::Validation(err) => Self::Validation(err),
        }
    }
}
