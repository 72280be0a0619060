use chrono::Utc;
use listing_review::listings::{
    ListingServiceError, Role, UserDirectory, UserId, UserProfile,
};
use metrics_exporter_prometheus::PrometheusHandle;
use std::sync::atomic::AtomicBool;
use std::sync::Arc;

#[derive(Clone)]
pub(crate) struct AppState {
    pub(crate) readiness: Arc<AtomicBool>,
    pub(crate) metrics: Arc<PrometheusHandle>,
}

/// User registered at startup in place of the identity provider.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct SeedUser {
    pub(crate) id: String,
    pub(crate) role: Role,
}

pub(crate) fn parse_seed_user(raw: &str) -> Result<SeedUser, String> {
    let (id, role) = match raw.trim().split_once(':') {
        Some((id, role)) => (id.trim(), role.trim()),
        None => (raw.trim(), "agent"),
    };
    if id.is_empty() {
        return Err(format!("seed user '{raw}' is missing an id"));
    }
    let role = match role.to_ascii_lowercase().as_str() {
        "agent" => Role::Agent,
        "admin" => Role::Admin,
        other => return Err(format!("unknown role '{other}' (expected agent or admin)")),
    };
    Ok(SeedUser {
        id: id.to_string(),
        role,
    })
}

/// Writes profiles and explicit admin assignments. Agents rely on the default role.
pub(crate) fn seed_users<D>(directory: &D, seeds: &[SeedUser]) -> Result<usize, ListingServiceError>
where
    D: UserDirectory + ?Sized,
{
    let now = Utc::now();
    for seed in seeds {
        let id = UserId(seed.id.clone());
        directory.upsert_user(UserProfile {
            id: id.clone(),
            email: format!("{}@listings.local", seed.id),
            display_name: None,
            created_at: now,
        })?;
        if seed.role == Role::Admin {
            directory.assign_role(&id, Role::Admin)?;
        }
    }
    Ok(seeds.len())
}

#[cfg(test)]
mod tests {
    use super::*;
    use listing_review::listings::InMemoryEntityStore;

    #[test]
    fn parse_seed_user_accepts_role_suffix() {
        assert_eq!(
            parse_seed_user("maria:admin"),
            Ok(SeedUser {
                id: "maria".to_string(),
                role: Role::Admin,
            })
        );
        assert_eq!(parse_seed_user(" dev ").map(|seed| seed.role), Ok(Role::Agent));
        assert!(parse_seed_user(":admin").is_err());
        assert!(parse_seed_user("maria:owner").is_err());
    }

    #[test]
    fn seed_users_registers_profiles_and_admin_roles() {
        let store = InMemoryEntityStore::new();
        let seeds = vec![
            parse_seed_user("reviewer:admin").expect("seed"),
            parse_seed_user("agent-7").expect("seed"),
        ];

        assert_eq!(seed_users(&store, &seeds), Ok(2));
        assert_eq!(
            store.role_of(&UserId("reviewer".into())),
            Ok(Some(Role::Admin))
        );
        assert_eq!(store.role_of(&UserId("agent-7".into())), Ok(None));
        assert_eq!(store.list_users().map(|users| users.len()), Ok(2));
    }
}
