use std::collections::{BTreeMap, HashMap};
use std::sync::{Mutex, MutexGuard};

use super::domain::{
    AccessLogEntry, Property, PropertyId, PropertyStatus, Role, UserId, UserProfile,
};
use super::query::{newest_first, newest_log_first, AccessLogQuery, PropertySelection};
use super::repository::{
    AccessLogRepository, PropertyRepository, RepositoryError, UserDirectory,
};

/// Process-local entity store backing the four logical tables.
#[derive(Default)]
pub struct InMemoryEntityStore {
    properties: Mutex<HashMap<PropertyId, Property>>,
    users: Mutex<BTreeMap<UserId, UserProfile>>,
    roles: Mutex<HashMap<UserId, Role>>,
    access_logs: Mutex<Vec<AccessLogEntry>>,
}

impl InMemoryEntityStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn property_count(&self) -> usize {
        self.properties.lock().map(|rows| rows.len()).unwrap_or(0)
    }

    pub fn access_log_len(&self) -> usize {
        self.access_logs.lock().map(|rows| rows.len()).unwrap_or(0)
    }
}

fn table<'a, T>(mutex: &'a Mutex<T>, name: &str) -> Result<MutexGuard<'a, T>, RepositoryError> {
    mutex
        .lock()
        .map_err(|_| RepositoryError::Unavailable(format!("{name} table lock poisoned")))
}

impl PropertyRepository for InMemoryEntityStore {
    fn insert(&self, property: Property) -> Result<Property, RepositoryError> {
        let mut rows = table(&self.properties, "properties")?;
        if rows.contains_key(&property.id) {
            return Err(RepositoryError::Conflict);
        }
        rows.insert(property.id.clone(), property.clone());
        Ok(property)
    }

    fn update(
        &self,
        property: Property,
        expected: PropertyStatus,
    ) -> Result<(), RepositoryError> {
        let mut rows = table(&self.properties, "properties")?;
        match rows.get_mut(&property.id) {
            Some(slot) if slot.status == expected => {
                *slot = property;
                Ok(())
            }
            Some(_) => Err(RepositoryError::Conflict),
            None => Err(RepositoryError::NotFound),
        }
    }

    fn delete(&self, id: &PropertyId) -> Result<(), RepositoryError> {
        let mut rows = table(&self.properties, "properties")?;
        rows.remove(id).map(|_| ()).ok_or(RepositoryError::NotFound)
    }

    fn fetch(&self, id: &PropertyId) -> Result<Option<Property>, RepositoryError> {
        let rows = table(&self.properties, "properties")?;
        Ok(rows.get(id).cloned())
    }

    fn select(
        &self,
        selection: &PropertySelection,
        limit: usize,
    ) -> Result<Vec<Property>, RepositoryError> {
        let rows = table(&self.properties, "properties")?;
        let mut matched: Vec<Property> = rows
            .values()
            .filter(|property| selection.matches(property))
            .cloned()
            .collect();
        matched.sort_by(newest_first);
        matched.truncate(limit);
        Ok(matched)
    }

    fn count_by_status(
        &self,
        selection: &PropertySelection,
    ) -> Result<Vec<(PropertyStatus, usize)>, RepositoryError> {
        let rows = table(&self.properties, "properties")?;
        let mut counts: BTreeMap<PropertyStatus, usize> = BTreeMap::new();
        for property in rows.values().filter(|property| selection.matches(property)) {
            *counts.entry(property.status).or_default() += 1;
        }
        Ok(counts.into_iter().collect())
    }
}

impl UserDirectory for InMemoryEntityStore {
    fn upsert_user(&self, profile: UserProfile) -> Result<UserProfile, RepositoryError> {
        let mut rows = table(&self.users, "users")?;
        rows.insert(profile.id.clone(), profile.clone());
        Ok(profile)
    }

    fn fetch_user(&self, id: &UserId) -> Result<Option<UserProfile>, RepositoryError> {
        let rows = table(&self.users, "users")?;
        Ok(rows.get(id).cloned())
    }

    fn list_users(&self) -> Result<Vec<UserProfile>, RepositoryError> {
        let rows = table(&self.users, "users")?;
        Ok(rows.values().cloned().collect())
    }

    fn delete_user(&self, id: &UserId) -> Result<(), RepositoryError> {
        let mut rows = table(&self.users, "users")?;
        rows.remove(id).map(|_| ()).ok_or(RepositoryError::NotFound)
    }

    fn role_assignments(&self) -> Result<Vec<(UserId, Role)>, RepositoryError> {
        let rows = table(&self.roles, "user_roles")?;
        Ok(rows.iter().map(|(id, role)| (id.clone(), *role)).collect())
    }

    fn role_of(&self, id: &UserId) -> Result<Option<Role>, RepositoryError> {
        let rows = table(&self.roles, "user_roles")?;
        Ok(rows.get(id).copied())
    }

    fn assign_role(&self, id: &UserId, role: Role) -> Result<(), RepositoryError> {
        let mut rows = table(&self.roles, "user_roles")?;
        rows.insert(id.clone(), role);
        Ok(())
    }

    fn remove_role(&self, id: &UserId) -> Result<(), RepositoryError> {
        let mut rows = table(&self.roles, "user_roles")?;
        rows.remove(id);
        Ok(())
    }
}

impl AccessLogRepository for InMemoryEntityStore {
    fn append(&self, entry: AccessLogEntry) -> Result<(), RepositoryError> {
        let mut rows = table(&self.access_logs, "access_logs")?;
        rows.push(entry);
        Ok(())
    }

    fn recent(
        &self,
        query: &AccessLogQuery,
        limit: usize,
    ) -> Result<Vec<AccessLogEntry>, RepositoryError> {
        let rows = table(&self.access_logs, "access_logs")?;
        let mut matched: Vec<AccessLogEntry> = rows
            .iter()
            .filter(|entry| query.matches(entry))
            .cloned()
            .collect();
        matched.sort_by(newest_log_first);
        matched.truncate(limit);
        Ok(matched)
    }
}
