//! Record Store: owner-scoped persistence for profiles, job ads, generated
//! resumes and uploaded files.
//!
//! Every operation takes the caller's [`UserId`] and filters on it. A record
//! owned by someone else is indistinguishable from a missing one: lookups
//! return `None`, deletes return `false`, reorders skip it.

use async_trait::async_trait;
use bytes::Bytes;
use serde_json::{Map, Value};
use thiserror::Error;
use uuid::Uuid;

use crate::auth::UserId;
use crate::models::file::UploadedFile;
use crate::models::job_ad::{JobAd, JobAdFields};
use crate::models::profile::{Profile, ProfileData};
use crate::models::resume::GeneratedResume;

pub mod blob;
#[cfg(test)]
pub mod memory;
pub mod postgres;

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("blob store error: {0}")]
    Blob(String),

    #[error("notification feed error: {0}")]
    Feed(String),

    #[error("stored record could not be decoded: {0}")]
    Decode(#[from] serde_json::Error),
}

/// Relational side of the store. Implemented by [`postgres::PgRecordStore`].
#[async_trait]
pub trait RecordStore: Send + Sync {
    // Profiles. Listed oldest first, so "Profile 1" leads.
    async fn list_profiles(&self, user: &UserId) -> Result<Vec<Profile>, StoreError>;
    /// Creates the empty default profile unless the user already has one.
    /// Safe to race: at most one default profile exists per user.
    async fn ensure_default_profile(&self, user: &UserId) -> Result<(), StoreError>;
    async fn count_profiles(&self, user: &UserId) -> Result<i64, StoreError>;
    async fn create_profile(
        &self,
        user: &UserId,
        name: &str,
        data: &ProfileData,
    ) -> Result<Profile, StoreError>;
    async fn get_profile(&self, user: &UserId, id: Uuid) -> Result<Option<Profile>, StoreError>;
    /// Renames and/or shallow-merges `data_patch` over the stored data in one write.
    async fn update_profile(
        &self,
        user: &UserId,
        id: Uuid,
        name: Option<&str>,
        data_patch: Option<&Map<String, Value>>,
    ) -> Result<Option<Profile>, StoreError>;
    async fn delete_profile(&self, user: &UserId, id: Uuid) -> Result<bool, StoreError>;

    // Job ads. Listed newest first.
    async fn insert_job_ad(&self, ad: &JobAd) -> Result<(), StoreError>;
    async fn list_job_ads(&self, user: &UserId) -> Result<Vec<JobAd>, StoreError>;
    async fn get_job_ad(&self, user: &UserId, id: Uuid) -> Result<Option<JobAd>, StoreError>;
    async fn replace_job_ad_fields(
        &self,
        user: &UserId,
        id: Uuid,
        fields: &JobAdFields,
    ) -> Result<Option<JobAd>, StoreError>;
    async fn delete_job_ad(&self, user: &UserId, id: Uuid) -> Result<bool, StoreError>;

    // Generated resumes. Insert-only; listed newest first.
    async fn insert_resume(&self, resume: &GeneratedResume) -> Result<(), StoreError>;
    async fn list_resumes(&self, user: &UserId) -> Result<Vec<GeneratedResume>, StoreError>;
    async fn get_resume(
        &self,
        user: &UserId,
        id: Uuid,
    ) -> Result<Option<GeneratedResume>, StoreError>;
    async fn delete_resume(&self, user: &UserId, id: Uuid) -> Result<bool, StoreError>;

    // Uploaded file metadata. Listed newest first.
    /// Stores the row ranked after the owner's existing files and returns that
    /// rank; `file.order` is ignored.
    async fn insert_file(&self, file: &UploadedFile) -> Result<i32, StoreError>;
    async fn list_files(&self, user: &UserId) -> Result<Vec<UploadedFile>, StoreError>;
    async fn get_file(&self, user: &UserId, id: Uuid) -> Result<Option<UploadedFile>, StoreError>;
    /// Removes the metadata row and returns it, so the caller can drop the blob.
    async fn delete_file(
        &self,
        user: &UserId,
        id: Uuid,
    ) -> Result<Option<UploadedFile>, StoreError>;
    /// Sets each owned file's `order` to its index in `ids`; returns how many rows changed.
    async fn reorder_files(&self, user: &UserId, ids: &[Uuid]) -> Result<u64, StoreError>;
}

/// Binary side of the store. Implemented by [`blob::S3BlobStore`].
#[async_trait]
pub trait BlobStore: Send + Sync {
    async fn put(&self, key: &str, bytes: Bytes, content_type: &str) -> Result<(), StoreError>;
    async fn get(&self, key: &str) -> Result<Bytes, StoreError>;
    async fn delete(&self, key: &str) -> Result<(), StoreError>;
}

/// Blob key for a user's upload. Never exposed to clients.
pub fn upload_key(user: &UserId, file_id: Uuid) -> String {
    format!("uploads/{user}/{file_id}")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_upload_key_is_owner_prefixed() {
        let id = Uuid::nil();
        assert_eq!(
            upload_key(&UserId::new("alice"), id),
            "uploads/alice/00000000-0000-0000-0000-000000000000"
        );
    }
}
