use chrono::Utc;
use serde_json::{json, Value};
use std::sync::Arc;

use crate::core::error::{AppError, Result};
use crate::features::access::collaborators::{DocumentStore, ListQuery, WriteMode, USERS_COLLECTION};
use crate::features::access::role::parse_profile;
use crate::features::auth::RevocationList;
use crate::features::users::dtos::{CreateUserDto, ListUsersQuery, UpdateUserDto, UserResponseDto};

/// Service for console user profiles stored at `users/{subject}`
pub struct UserService {
    store: Arc<dyn DocumentStore>,
    revocations: Arc<RevocationList>,
}

impl UserService {
    pub fn new(store: Arc<dyn DocumentStore>, revocations: Arc<RevocationList>) -> Self {
        Self { store, revocations }
    }

    /// One page of profiles and the number of listable profiles.
    ///
    /// Unusable documents on the page are skipped and taken off the total.
    /// Unusable documents on other pages are only found when those pages are
    /// read, so `total` is an upper bound until then.
    pub async fn list(&self, query: &ListUsersQuery) -> Result<(Vec<UserResponseDto>, i64)> {
        let pagination = query.pagination();
        let list_query = ListQuery {
            field_equals: query.role.map(|role| ("role".to_string(), role.to_string())),
            offset: pagination.offset(),
            limit: pagination.limit(),
        };

        let (documents, total) = self
            .store
            .list_documents(USERS_COLLECTION, &list_query)
            .await?;

        let fetched = documents.len();
        let users: Vec<UserResponseDto> = documents
            .into_iter()
            .filter_map(|document| {
                let Some(id) = document.get("id").and_then(Value::as_str).map(str::to_string)
                else {
                    tracing::warn!("Skipping user document without an id");
                    return None;
                };
                match parse_profile(&id, document) {
                    Ok(profile) => Some(UserResponseDto::from(profile)),
                    Err(reason) => {
                        tracing::warn!("Skipping unusable profile '{}': {}", id, reason);
                        None
                    }
                }
            })
            .collect();

        let skipped = (fetched - users.len()) as i64;
        Ok((users, (total - skipped).max(0)))
    }

    pub async fn get(&self, id: &str) -> Result<UserResponseDto> {
        let document = self
            .store
            .get_document(USERS_COLLECTION, id)
            .await?
            .ok_or_else(|| AppError::NotFound(format!("User {} not found", id)))?;

        let profile = parse_profile(id, document).map_err(|reason| {
            tracing::error!("Stored profile {} is invalid: {}", id, reason);
            AppError::Internal(format!("Stored profile {} is invalid", id))
        })?;

        Ok(profile.into())
    }

    /// Provision the profile of a subject that already exists at the identity
    /// provider.
    pub async fn create(&self, dto: CreateUserDto) -> Result<UserResponseDto> {
        if self
            .store
            .get_document(USERS_COLLECTION, &dto.id)
            .await?
            .is_some()
        {
            return Err(AppError::Conflict(format!("User {} already exists", dto.id)));
        }

        let document = serde_json::to_value(&dto).map_err(|e| {
            tracing::error!("Failed to serialize user {}: {:?}", dto.id, e);
            AppError::Internal("Failed to serialize user".to_string())
        })?;

        self.store
            .set_document(USERS_COLLECTION, &dto.id, document, WriteMode::Replace)
            .await?;

        tracing::info!("User created: id={}, role={}", dto.id, dto.role);

        self.get(&dto.id).await
    }

    /// Merge `dto` into an existing profile
    pub async fn update(&self, id: &str, dto: UpdateUserDto) -> Result<UserResponseDto> {
        if dto.is_empty() {
            return Err(AppError::BadRequest("Nothing to update".to_string()));
        }

        // Merge would create the document; updates only apply to existing users.
        self.get(id).await?;

        let patch = serde_json::to_value(&dto).map_err(|e| {
            tracing::error!("Failed to serialize update for user {}: {:?}", id, e);
            AppError::Internal("Failed to serialize update".to_string())
        })?;

        self.store
            .set_document(USERS_COLLECTION, id, patch, WriteMode::Merge)
            .await?;

        if let Some(role) = dto.role {
            tracing::info!("Role of user {} changed to {}", id, role);
        }

        self.get(id).await
    }

    /// Delete the profile and end the subject's sessions. Deleting an unknown
    /// user succeeds.
    pub async fn delete(&self, id: &str) -> Result<()> {
        let removed = self.store.delete_document(USERS_COLLECTION, id).await?;
        self.revocations.revoke(id).await;

        if removed {
            tracing::info!("User deleted: id={}", id);
        } else {
            tracing::debug!("Delete of unknown user {} ignored", id);
        }
        Ok(())
    }

    /// Stamp `lastLoginAt` without holding up the caller. Failures are logged.
    pub fn record_login(&self, id: &str) {
        let store = Arc::clone(&self.store);
        let id = id.to_string();

        tokio::spawn(async move {
            let patch = json!({ "lastLoginAt": Utc::now() });
            match store
                .set_document(USERS_COLLECTION, &id, patch, WriteMode::Merge)
                .await
            {
                Ok(()) => tracing::debug!("Recorded login for user {}", id),
                Err(e) => tracing::error!("Failed to record login for user {}: {:?}", id, e),
            }
        });
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::features::access::model::Role;
    use crate::shared::test_helpers::{profile_document, FailingStore, MemoryDocumentStore};
    use std::time::Duration;

    fn service_with(store: Arc<MemoryDocumentStore>) -> (UserService, Arc<RevocationList>) {
        let revocations = Arc::new(RevocationList::new());
        (UserService::new(store, revocations.clone()), revocations)
    }

    fn seeded(profiles: &[(&str, Role)]) -> Arc<MemoryDocumentStore> {
        let store = MemoryDocumentStore::new();
        for (id, role) in profiles {
            store.insert(USERS_COLLECTION, id, profile_document(id, *role));
        }
        Arc::new(store)
    }

    fn create_dto(id: &str, role: Role) -> CreateUserDto {
        CreateUserDto {
            id: id.to_string(),
            name: "Park".to_string(),
            email: "park@example.com".to_string(),
            role,
            avatar_url: None,
        }
    }

    #[tokio::test]
    async fn test_list_filters_by_role_and_paginates() {
        let store = seeded(&[
            ("s1", Role::Student),
            ("s2", Role::Student),
            ("s3", Role::Student),
            ("t1", Role::Teacher),
        ]);
        let (service, _) = service_with(store);

        let query = ListUsersQuery {
            role: Some(Role::Student),
            page: Some(2),
            page_size: Some(2),
        };
        let (users, total) = service.list(&query).await.unwrap();
        assert_eq!(total, 3);
        assert_eq!(users.len(), 1);
        assert_eq!(users[0].id, "s3");
    }

    #[tokio::test]
    async fn test_list_total_excludes_skipped_documents() {
        let store = seeded(&[("s1", Role::Student), ("s2", Role::Student)]);
        store.insert(
            USERS_COLLECTION,
            "broken",
            json!({"id": "broken", "name": "No Role", "email": "x@example.com"}),
        );
        let (service, _) = service_with(store);

        let (users, total) = service
            .list(&ListUsersQuery {
                role: None,
                page: None,
                page_size: None,
            })
            .await
            .unwrap();
        assert_eq!(users.len(), 2);
        assert_eq!(total, 2);
    }

    #[tokio::test]
    async fn test_create_then_conflict() {
        let (service, _) = service_with(seeded(&[]));

        let created = service.create(create_dto("n1", Role::Teacher)).await.unwrap();
        assert_eq!(created.role, Role::Teacher);
        assert_eq!(created.avatar_url, "https://picsum.photos/seed/n1/40/40");

        let again = service.create(create_dto("n1", Role::Student)).await;
        assert!(matches!(again, Err(AppError::Conflict(_))));
    }

    #[tokio::test]
    async fn test_update_merges_and_clears_avatar() {
        let store = seeded(&[]);
        store.insert(
            USERS_COLLECTION,
            "u1",
            json!({
                "id": "u1",
                "name": "Old",
                "email": "old@example.com",
                "role": "student",
                "avatarUrl": "https://cdn.example.com/u1.png"
            }),
        );
        let (service, _) = service_with(store.clone());

        let dto = UpdateUserDto {
            name: Some("New".to_string()),
            role: Some(Role::Teacher),
            avatar_url: Some(None),
            ..Default::default()
        };
        let updated = service.update("u1", dto).await.unwrap();

        assert_eq!(updated.name, "New");
        assert_eq!(updated.email, "old@example.com");
        assert_eq!(updated.role, Role::Teacher);
        let stored = store.get(USERS_COLLECTION, "u1").unwrap();
        assert!(stored.get("avatarUrl").is_none());
    }

    #[tokio::test]
    async fn test_update_of_unknown_user_is_not_found() {
        let (service, _) = service_with(seeded(&[]));
        let dto = UpdateUserDto {
            name: Some("X".to_string()),
            ..Default::default()
        };
        assert!(matches!(
            service.update("ghost", dto).await,
            Err(AppError::NotFound(_))
        ));
    }

    #[tokio::test]
    async fn test_delete_revokes_and_is_idempotent() {
        let (service, revocations) = service_with(seeded(&[("u1", Role::Student)]));
        let issued_at = Utc::now() - chrono::Duration::seconds(1);

        service.delete("u1").await.unwrap();
        assert!(revocations.is_revoked("u1", issued_at).await);
        assert!(matches!(service.get("u1").await, Err(AppError::NotFound(_))));

        assert!(service.delete("u1").await.is_ok());
    }

    #[tokio::test]
    async fn test_record_login_stamps_profile() {
        let store = seeded(&[("u1", Role::Admin)]);
        let (service, _) = service_with(store.clone());

        service.record_login("u1");
        for _ in 0..50 {
            if service.get("u1").await.unwrap().last_login_at.is_some() {
                return;
            }
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
        panic!("last login was never recorded");
    }

    #[tokio::test]
    async fn test_store_failure_surfaces_as_error() {
        let service = UserService::new(Arc::new(FailingStore), Arc::new(RevocationList::new()));
        assert!(matches!(service.get("u1").await, Err(AppError::Store(_))));
        // Fire-and-forget write must not panic the caller.
        service.record_login("u1");
    }
}
