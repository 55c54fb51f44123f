use std::{future::Future, sync::Arc, time::Duration};

use tokio::{task::JoinError, time::timeout};
use uuid::Uuid;

use crate::{
    db::{CredentialStore, StoreError},
    error::AppError,
    models::{
        media::MediaAsset,
        user::{MediaSlot, NewUser, RegisterRequest, User, UserProfile},
    },
    services::{
        metrics::{COMPENSATIONS_COUNTER, OPTIONAL_UPLOAD_FAILURES, REGISTRATIONS_COUNTER},
        object_store::ObjectStore,
        password::hash_password,
        uploads::TempFile,
    },
};

/// Assets already committed to the object store during one request. If the
/// request fails after that point, `compensate` deletes them newest first.
#[derive(Debug, Default)]
pub struct UploadLedger {
    committed: Vec<MediaAsset>,
}

impl UploadLedger {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn record(&mut self, asset: MediaAsset) {
        self.committed.push(asset);
    }

    pub fn assets(&self) -> &[MediaAsset] {
        &self.committed
    }

    /// The request succeeded; the assets are now referenced and stay.
    pub fn commit(self) -> Vec<MediaAsset> {
        self.committed
    }

    /// Returns how many deletions failed. Failures are logged and never
    /// replace the error that triggered compensation.
    pub async fn compensate(self, objects: &dyn ObjectStore) -> usize {
        let mut failed = 0;
        for asset in self.committed.into_iter().rev() {
            match objects.delete(&asset.public_id).await {
                Ok(()) => {
                    tracing::info!(public_id = %asset.public_id, "compensated orphaned upload");
                    COMPENSATIONS_COUNTER.with_label_values(&["deleted"]).inc();
                }
                Err(e) => {
                    failed += 1;
                    tracing::error!(
                        public_id = %asset.public_id,
                        url = %asset.url,
                        "failed to delete orphaned upload: {}", e
                    );
                    COMPENSATIONS_COUNTER.with_label_values(&["failed"]).inc();
                }
            }
        }
        failed
    }
}

/// How a user-row write that references freshly uploaded assets ended.
enum Persisted {
    /// The row references the assets; the ledger was committed.
    Written(User),
    /// No row matched; the assets were deleted.
    Missing,
    /// The write failed; the assets were deleted.
    Failed(StoreError),
    /// The write did not finish within the limit. It keeps running on its own
    /// task and the ledger is settled once its real outcome is known.
    Unsettled,
}

async fn settle(
    outcome: Result<Result<Option<User>, StoreError>, JoinError>,
    ledger: UploadLedger,
    objects: &dyn ObjectStore,
) -> Persisted {
    match outcome {
        Ok(Ok(Some(user))) => {
            ledger.commit();
            Persisted::Written(user)
        }
        Ok(Ok(None)) => {
            ledger.compensate(objects).await;
            Persisted::Missing
        }
        Ok(Err(e)) => {
            ledger.compensate(objects).await;
            Persisted::Failed(e)
        }
        Err(e) => {
            ledger.compensate(objects).await;
            Persisted::Failed(StoreError::Backend(e.into()))
        }
    }
}

/// Runs `write` on its own task and waits up to `limit` for it. A write that
/// outlives the limit is never abandoned: an INSERT already sent may still
/// commit, so assets are only deleted once the write is known to have failed.
async fn persist<F>(
    write: F,
    limit: Duration,
    ledger: UploadLedger,
    objects: Arc<dyn ObjectStore>,
) -> Persisted
where
    F: Future<Output = Result<Option<User>, StoreError>> + Send + 'static,
{
    let mut write = tokio::spawn(write);
    match timeout(limit, &mut write).await {
        Ok(outcome) => settle(outcome, ledger, objects.as_ref()).await,
        Err(_) => {
            tracing::warn!("user write still running after {:?}, settling in background", limit);
            tokio::spawn(async move {
                match settle(write.await, ledger, objects.as_ref()).await {
                    Persisted::Written(user) => {
                        tracing::warn!(user_id = %user.id, "late user write committed, media kept")
                    }
                    _ => tracing::warn!("late user write failed, media removed"),
                }
            });
            Persisted::Unsettled
        }
    }
}

/// Uploads a staged file and removes the local copy whatever the outcome.
async fn push(objects: &dyn ObjectStore, file: TempFile) -> Result<MediaAsset, AppError> {
    let result = objects.upload(file.path()).await;
    file.discard().await;
    Ok(result?)
}

fn required(value: &str) -> Option<String> {
    let trimmed = value.trim();
    (!trimmed.is_empty()).then(|| trimmed.to_string())
}

const CREATE_FAILED: &str = "Something went wrong while creating user";

pub struct MediaService;

impl MediaService {
    /// Creates a user together with their avatar and optional cover image.
    /// A user row is never written without its avatar, and an avatar is
    /// never left behind without a user row.
    pub async fn register_with_media(
        users: Arc<dyn CredentialStore>,
        objects: Arc<dyn ObjectStore>,
        request: RegisterRequest,
        avatar: Option<TempFile>,
        cover: Option<TempFile>,
        bcrypt_cost: u32,
        store_timeout: Duration,
    ) -> Result<UserProfile, AppError> {
        let outcome = Self::register_inner(
            users,
            objects,
            request,
            avatar,
            cover,
            bcrypt_cost,
            store_timeout,
        )
        .await;

        let label = match &outcome {
            Ok(_) => "created",
            Err(AppError::Internal { .. }) | Err(AppError::Upload { .. }) => "failed",
            Err(_) => "rejected",
        };
        REGISTRATIONS_COUNTER.with_label_values(&[label]).inc();
        outcome
    }

    async fn register_inner(
        users: Arc<dyn CredentialStore>,
        objects: Arc<dyn ObjectStore>,
        request: RegisterRequest,
        avatar: Option<TempFile>,
        cover: Option<TempFile>,
        bcrypt_cost: u32,
        store_timeout: Duration,
    ) -> Result<UserProfile, AppError> {
        let (Some(full_name), Some(username), Some(email), Some(_)) = (
            required(&request.full_name),
            required(&request.username),
            required(&request.email),
            required(&request.password),
        ) else {
            return Err(AppError::Validation("All fields are required".into()));
        };
        let username = username.to_lowercase();
        let email = email.to_lowercase();

        if users.identity_taken(&username, &email).await? {
            return Err(AppError::Conflict(
                "User with this email or username already exists".into(),
            ));
        }

        let Some(avatar) = avatar else {
            return Err(AppError::Validation("Avatar is required".into()));
        };

        let password_hash = hash_password(&request.password, bcrypt_cost)
            .map_err(|e| AppError::internal(CREATE_FAILED, e))?;

        let mut ledger = UploadLedger::new();

        let avatar_asset = push(objects.as_ref(), avatar).await?;
        ledger.record(avatar_asset.clone());

        let cover_asset = match cover {
            Some(file) => match push(objects.as_ref(), file).await {
                Ok(asset) => {
                    ledger.record(asset.clone());
                    Some(asset)
                }
                Err(e) => {
                    tracing::warn!(username = %username, "cover image upload failed, continuing without it: {}", e);
                    OPTIONAL_UPLOAD_FAILURES.inc();
                    None
                }
            },
            None => None,
        };

        let new_user = NewUser {
            username,
            email,
            full_name,
            password_hash,
            avatar_url: avatar_asset.url,
            cover_image_url: cover_asset.map(|a| a.url),
        };

        let write = async move { users.create_user(new_user).await.map(Some) };
        match persist(write, store_timeout, ledger, objects).await {
            Persisted::Written(user) => {
                tracing::info!(user_id = %user.id, username = %user.username, "user registered");
                Ok(user.into())
            }
            Persisted::Failed(e) => Err(AppError::internal(CREATE_FAILED, e)),
            Persisted::Missing => Err(AppError::internal(
                CREATE_FAILED,
                anyhow::anyhow!("user insert returned no row"),
            )),
            Persisted::Unsettled => Err(AppError::internal(
                CREATE_FAILED,
                anyhow::anyhow!("user insert did not finish within {:?}", store_timeout),
            )),
        }
    }

    /// Swaps the avatar or cover image of an existing user. The new asset is
    /// removed again if the user row cannot be updated; the previous asset is
    /// removed once the update is in.
    pub async fn replace(
        users: Arc<dyn CredentialStore>,
        objects: Arc<dyn ObjectStore>,
        user_id: Uuid,
        slot: MediaSlot,
        file: TempFile,
        store_timeout: Duration,
    ) -> Result<UserProfile, AppError> {
        let previous = users
            .find_by_id(user_id)
            .await?
            .ok_or_else(|| AppError::NotFound("User not found".into()))?;
        let previous_url = match slot {
            MediaSlot::Avatar => Some(previous.avatar_url),
            MediaSlot::CoverImage => previous.cover_image_url,
        };

        let mut ledger = UploadLedger::new();
        let asset = push(objects.as_ref(), file).await?;
        ledger.record(asset.clone());

        let failed = || format!("Error while updating {}", slot.field_name());
        let write = {
            let users = users.clone();
            let url = asset.url.clone();
            async move { users.set_media_url(user_id, slot, &url).await }
        };
        let updated = match persist(write, store_timeout, ledger, objects.clone()).await {
            Persisted::Written(user) => user,
            Persisted::Missing => return Err(AppError::NotFound("User not found".into())),
            Persisted::Failed(e) => return Err(AppError::internal(failed(), e)),
            Persisted::Unsettled => {
                return Err(AppError::internal(
                    failed(),
                    anyhow::anyhow!("media update did not finish within {:?}", store_timeout),
                ))
            }
        };

        if let Some(public_id) = previous_url
            .as_deref()
            .and_then(|url| objects.public_id_from_url(url))
        {
            if let Err(e) = objects.delete(&public_id).await {
                tracing::warn!(%public_id, "failed to delete replaced {}: {}", slot.field_name(), e);
            }
        }

        Ok(updated.into())
    }
}
