use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};

use axum::response::Response;
use chrono::{DateTime, TimeZone, Utc};
use serde_json::Value;

use crate::config::ListingConfig;
use crate::listings::domain::{
    AccessLogEntry, Actor, Property, PropertyAttributes, PropertyDraft, PropertyId,
    PropertyStatus, PropertyType, RequestContext, Role, UserId, UserProfile,
};
use crate::listings::memory::InMemoryEntityStore;
use crate::listings::query::{AccessLogQuery, PropertySelection};
use crate::listings::repository::{
    AccessLogRepository, PropertyRepository, RepositoryError, UserDirectory,
};
use crate::listings::service::{ListingService, UserDeletePolicy};

pub(crate) type MemoryService = ListingService<InMemoryEntityStore, InMemoryEntityStore>;

pub(crate) const AGENT_ID: &str = "agent-1";
pub(crate) const OTHER_AGENT_ID: &str = "agent-2";
pub(crate) const ADMIN_ID: &str = "admin-1";

pub(crate) fn agent() -> Actor {
    Actor::new(AGENT_ID, Role::Agent)
}

pub(crate) fn other_agent() -> Actor {
    Actor::new(OTHER_AGENT_ID, Role::Agent)
}

pub(crate) fn admin() -> Actor {
    Actor::new(ADMIN_ID, Role::Admin)
}

pub(crate) fn ctx(actor: &Actor) -> RequestContext {
    RequestContext::new(actor.clone()).with_origin("198.51.100.7")
}

pub(crate) fn listed_at() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2025, 6, 1, 9, 30, 0)
        .single()
        .expect("valid timestamp")
}

pub(crate) fn draft() -> PropertyDraft {
    PropertyDraft {
        title: "Craftsman bungalow near the park".to_string(),
        description: Some("Three bedrooms, updated kitchen, detached garage.".to_string()),
        address: "412 Maple Street".to_string(),
        city: Some("Des Moines".to_string()),
        state: Some("IA".to_string()),
        zip_code: Some("50309".to_string()),
        price: 285_000.0,
        property_type: PropertyType::House,
        attributes: PropertyAttributes {
            bedrooms: Some(3.0),
            bathrooms: Some(1.5),
            floor_area: Some(1_640.0),
            lot_size: Some(6_500.0),
        },
        images: vec!["https://cdn.example.com/listings/412-maple/front.jpg".to_string()],
    }
}

/// A listing owned by `owner` in `status`, respecting the rejection-reason invariant.
pub(crate) fn property_in(owner: &Actor, status: PropertyStatus) -> Property {
    let mut property = Property::from_draft(
        PropertyId::generate(),
        owner.id.clone(),
        draft(),
        listed_at(),
    );
    property.status = status;
    if status == PropertyStatus::Rejected {
        property.rejection_reason = Some("photos missing".to_string());
    }
    property
}

pub(crate) fn user_profile(id: &str) -> UserProfile {
    UserProfile {
        id: UserId(id.to_string()),
        email: format!("{id}@listings.example.com"),
        display_name: Some(id.replace('-', " ")),
        created_at: listed_at(),
    }
}

/// Registers two agents and one admin.
pub(crate) fn seed_directory(directory: &impl UserDirectory) {
    for id in [AGENT_ID, OTHER_AGENT_ID, ADMIN_ID] {
        directory.upsert_user(user_profile(id)).expect("seed user");
    }
    directory
        .assign_role(&UserId(ADMIN_ID.to_string()), Role::Admin)
        .expect("seed admin role");
}

pub(crate) fn seeded_store() -> Arc<InMemoryEntityStore> {
    let store = Arc::new(InMemoryEntityStore::new());
    seed_directory(store.as_ref());
    store
}

pub(crate) fn build_service() -> (MemoryService, Arc<InMemoryEntityStore>) {
    build_service_with(ListingConfig::default())
}

pub(crate) fn build_service_with(config: ListingConfig) -> (MemoryService, Arc<InMemoryEntityStore>) {
    let store = seeded_store();
    let service = ListingService::new(store.clone(), store.clone(), config);
    (service, store)
}

pub(crate) fn cascade_config() -> ListingConfig {
    ListingConfig {
        user_delete_policy: UserDeletePolicy::CascadeListings,
        ..ListingConfig::default()
    }
}

/// Every call fails as if the database were offline.
pub(crate) struct UnavailableStore;

fn offline<T>() -> Result<T, RepositoryError> {
    Err(RepositoryError::Unavailable("database offline".to_string()))
}

impl PropertyRepository for UnavailableStore {
    fn insert(&self, _property: Property) -> Result<Property, RepositoryError> {
        offline()
    }

    fn update(
        &self,
        _property: Property,
        _expected: PropertyStatus,
    ) -> Result<(), RepositoryError> {
        offline()
    }

    fn delete(&self, _id: &PropertyId) -> Result<(), RepositoryError> {
        offline()
    }

    fn fetch(&self, _id: &PropertyId) -> Result<Option<Property>, RepositoryError> {
        offline()
    }

    fn select(
        &self,
        _selection: &PropertySelection,
        _limit: usize,
    ) -> Result<Vec<Property>, RepositoryError> {
        offline()
    }

    fn count_by_status(
        &self,
        _selection: &PropertySelection,
    ) -> Result<Vec<(PropertyStatus, usize)>, RepositoryError> {
        offline()
    }
}

impl UserDirectory for UnavailableStore {
    fn upsert_user(&self, _profile: UserProfile) -> Result<UserProfile, RepositoryError> {
        offline()
    }

    fn fetch_user(&self, _id: &UserId) -> Result<Option<UserProfile>, RepositoryError> {
        offline()
    }

    fn list_users(&self) -> Result<Vec<UserProfile>, RepositoryError> {
        offline()
    }

    fn delete_user(&self, _id: &UserId) -> Result<(), RepositoryError> {
        offline()
    }

    fn role_assignments(&self) -> Result<Vec<(UserId, Role)>, RepositoryError> {
        offline()
    }

    fn role_of(&self, _id: &UserId) -> Result<Option<Role>, RepositoryError> {
        offline()
    }

    fn assign_role(&self, _id: &UserId, _role: Role) -> Result<(), RepositoryError> {
        offline()
    }

    fn remove_role(&self, _id: &UserId) -> Result<(), RepositoryError> {
        offline()
    }
}

impl AccessLogRepository for UnavailableStore {
    fn append(&self, _entry: AccessLogEntry) -> Result<(), RepositoryError> {
        offline()
    }

    fn recent(
        &self,
        _query: &AccessLogQuery,
        _limit: usize,
    ) -> Result<Vec<AccessLogEntry>, RepositoryError> {
        offline()
    }
}

type Interleaving = Box<dyn FnOnce(&InMemoryEntityStore) + Send>;

/// In-memory store that can run a competing write right after a listing read, and can be told
/// to fail profile deletion.
#[derive(Default)]
pub(crate) struct ScriptedStore {
    pub(crate) inner: InMemoryEntityStore,
    after_fetch: Mutex<Option<Interleaving>>,
    fail_user_delete: AtomicBool,
}

impl ScriptedStore {
    pub(crate) fn seeded() -> Arc<Self> {
        let store = Arc::new(Self::default());
        seed_directory(&store.inner);
        store
    }

    /// `write` runs once, after the next listing fetch has taken its snapshot.
    pub(crate) fn after_next_fetch(
        &self,
        write: impl FnOnce(&InMemoryEntityStore) + Send + 'static,
    ) {
        *self.after_fetch.lock().expect("hook mutex poisoned") = Some(Box::new(write));
    }

    pub(crate) fn fail_user_delete(&self) {
        self.fail_user_delete.store(true, Ordering::SeqCst);
    }
}

impl PropertyRepository for ScriptedStore {
    fn insert(&self, property: Property) -> Result<Property, RepositoryError> {
        self.inner.insert(property)
    }

    fn update(
        &self,
        property: Property,
        expected: PropertyStatus,
    ) -> Result<(), RepositoryError> {
        self.inner.update(property, expected)
    }

    fn delete(&self, id: &PropertyId) -> Result<(), RepositoryError> {
        self.inner.delete(id)
    }

    fn fetch(&self, id: &PropertyId) -> Result<Option<Property>, RepositoryError> {
        let snapshot = self.inner.fetch(id)?;
        let hook = self.after_fetch.lock().expect("hook mutex poisoned").take();
        if let Some(write) = hook {
            write(&self.inner);
        }
        Ok(snapshot)
    }

    fn select(
        &self,
        selection: &PropertySelection,
        limit: usize,
    ) -> Result<Vec<Property>, RepositoryError> {
        self.inner.select(selection, limit)
    }

    fn count_by_status(
        &self,
        selection: &PropertySelection,
    ) -> Result<Vec<(PropertyStatus, usize)>, RepositoryError> {
        self.inner.count_by_status(selection)
    }
}

impl UserDirectory for ScriptedStore {
    fn upsert_user(&self, profile: UserProfile) -> Result<UserProfile, RepositoryError> {
        self.inner.upsert_user(profile)
    }

    fn fetch_user(&self, id: &UserId) -> Result<Option<UserProfile>, RepositoryError> {
        self.inner.fetch_user(id)
    }

    fn list_users(&self) -> Result<Vec<UserProfile>, RepositoryError> {
        self.inner.list_users()
    }

    fn delete_user(&self, id: &UserId) -> Result<(), RepositoryError> {
        if self.fail_user_delete.load(Ordering::SeqCst) {
            return offline();
        }
        self.inner.delete_user(id)
    }

    fn role_assignments(&self) -> Result<Vec<(UserId, Role)>, RepositoryError> {
        self.inner.role_assignments()
    }

    fn role_of(&self, id: &UserId) -> Result<Option<Role>, RepositoryError> {
        self.inner.role_of(id)
    }

    fn assign_role(&self, id: &UserId, role: Role) -> Result<(), RepositoryError> {
        self.inner.assign_role(id, role)
    }

    fn remove_role(&self, id: &UserId) -> Result<(), RepositoryError> {
        self.inner.remove_role(id)
    }
}

impl AccessLogRepository for ScriptedStore {
    fn append(&self, entry: AccessLogEntry) -> Result<(), RepositoryError> {
        self.inner.append(entry)
    }

    fn recent(
        &self,
        query: &AccessLogQuery,
        limit: usize,
    ) -> Result<Vec<AccessLogEntry>, RepositoryError> {
        self.inner.recent(query, limit)
    }
}

pub(crate) fn access_log(store: &InMemoryEntityStore) -> Vec<AccessLogEntry> {
    store
        .recent(&AccessLogQuery::default(), usize::MAX)
        .expect("access log readable")
}

pub(crate) async fn read_json_body(response: Response) -> Value {
    let body = axum::body::to_bytes(response.into_body(), 64 * 1024)
        .await
        .expect("read body");
    serde_json::from_slice(&body).expect("json payload")
}
