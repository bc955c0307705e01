//! In-process store used by handler tests.

use std::collections::HashMap;
use std::sync::Mutex;

use async_trait::async_trait;
use bytes::Bytes;
use chrono::Utc;
use serde_json::{Map, Value};
use uuid::Uuid;

use super::{BlobStore, RecordStore, StoreError};
use crate::auth::UserId;
use crate::models::file::UploadedFile;
use crate::models::job_ad::{JobAd, JobAdFields};
use crate::models::profile::{Profile, ProfileData, DEFAULT_PROFILE_NAME};
use crate::models::resume::GeneratedResume;

#[derive(Default)]
struct Tables {
    profiles: Vec<Profile>,
    job_ads: Vec<JobAd>,
    resumes: Vec<GeneratedResume>,
    files: Vec<UploadedFile>,
}

#[derive(Default)]
pub struct MemoryStore {
    tables: Mutex<Tables>,
}

impl MemoryStore {
    fn with<T>(&self, f: impl FnOnce(&mut Tables) -> T) -> T {
        let mut tables = self.tables.lock().unwrap_or_else(|e| e.into_inner());
        f(&mut tables)
    }
}

fn owned(record_user: &str, user: &UserId) -> bool {
    record_user == user.as_str()
}

fn remove_owned<T>(
    rows: &mut Vec<T>,
    matches: impl Fn(&T) -> bool,
) -> Option<T> {
    let index = rows.iter().position(matches)?;
    Some(rows.remove(index))
}

#[async_trait]
impl RecordStore for MemoryStore {
    async fn list_profiles(&self, user: &UserId) -> Result<Vec<Profile>, StoreError> {
        Ok(self.with(|t| {
            t.profiles
                .iter()
                .filter(|p| owned(&p.user_id, user))
                .cloned()
                .collect()
        }))
    }

    async fn ensure_default_profile(&self, user: &UserId) -> Result<(), StoreError> {
        self.with(|t| {
            if t.profiles
                .iter()
                .any(|p| owned(&p.user_id, user) && p.is_default)
            {
                return;
            }
            let now = Utc::now();
            t.profiles.push(Profile {
                id: Uuid::new_v4(),
                user_id: user.to_string(),
                name: DEFAULT_PROFILE_NAME.to_string(),
                is_default: true,
                data: ProfileData::default(),
                created_at: now,
                updated_at: now,
            });
        });
        Ok(())
    }

    async fn count_profiles(&self, user: &UserId) -> Result<i64, StoreError> {
        Ok(self.with(|t| t.profiles.iter().filter(|p| owned(&p.user_id, user)).count() as i64))
    }

    async fn create_profile(
        &self,
        user: &UserId,
        name: &str,
        data: &ProfileData,
    ) -> Result<Profile, StoreError> {
        let now = Utc::now();
        let profile = Profile {
            id: Uuid::new_v4(),
            user_id: user.to_string(),
            name: name.to_string(),
            is_default: false,
            data: data.clone(),
            created_at: now,
            updated_at: now,
        };
        self.with(|t| t.profiles.push(profile.clone()));
        Ok(profile)
    }

    async fn get_profile(&self, user: &UserId, id: Uuid) -> Result<Option<Profile>, StoreError> {
        Ok(self.with(|t| {
            t.profiles
                .iter()
                .find(|p| p.id == id && owned(&p.user_id, user))
                .cloned()
        }))
    }

    async fn update_profile(
        &self,
        user: &UserId,
        id: Uuid,
        name: Option<&str>,
        data_patch: Option<&Map<String, Value>>,
    ) -> Result<Option<Profile>, StoreError> {
        self.with(|t| {
            let Some(profile) = t
                .profiles
                .iter_mut()
                .find(|p| p.id == id && owned(&p.user_id, user))
            else {
                return Ok(None);
            };
            if let Some(patch) = data_patch {
                let mut data = match serde_json::to_value(&profile.data)? {
                    Value::Object(map) => map,
                    _ => Map::new(),
                };
                data.extend(patch.clone());
                profile.data = serde_json::from_value(Value::Object(data))?;
            }
            if let Some(name) = name {
                profile.name = name.to_string();
            }
            profile.updated_at = Utc::now();
            Ok(Some(profile.clone()))
        })
    }

    async fn delete_profile(&self, user: &UserId, id: Uuid) -> Result<bool, StoreError> {
        Ok(self.with(|t| {
            remove_owned(&mut t.profiles, |p| p.id == id && owned(&p.user_id, user)).is_some()
        }))
    }

    async fn insert_job_ad(&self, ad: &JobAd) -> Result<(), StoreError> {
        self.with(|t| t.job_ads.push(ad.clone()));
        Ok(())
    }

    async fn list_job_ads(&self, user: &UserId) -> Result<Vec<JobAd>, StoreError> {
        let mut ads: Vec<JobAd> = self.with(|t| {
            t.job_ads
                .iter()
                .filter(|a| owned(&a.user_id, user))
                .cloned()
                .collect()
        });
        ads.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        Ok(ads)
    }

    async fn get_job_ad(&self, user: &UserId, id: Uuid) -> Result<Option<JobAd>, StoreError> {
        Ok(self.with(|t| {
            t.job_ads
                .iter()
                .find(|a| a.id == id && owned(&a.user_id, user))
                .cloned()
        }))
    }

    async fn replace_job_ad_fields(
        &self,
        user: &UserId,
        id: Uuid,
        fields: &JobAdFields,
    ) -> Result<Option<JobAd>, StoreError> {
        Ok(self.with(|t| {
            let ad = t
                .job_ads
                .iter_mut()
                .find(|a| a.id == id && owned(&a.user_id, user))?;
            ad.fields = fields.clone();
            Some(ad.clone())
        }))
    }

    async fn delete_job_ad(&self, user: &UserId, id: Uuid) -> Result<bool, StoreError> {
        Ok(self.with(|t| {
            remove_owned(&mut t.job_ads, |a| a.id == id && owned(&a.user_id, user)).is_some()
        }))
    }

    async fn insert_resume(&self, resume: &GeneratedResume) -> Result<(), StoreError> {
        self.with(|t| t.resumes.push(resume.clone()));
        Ok(())
    }

    async fn list_resumes(&self, user: &UserId) -> Result<Vec<GeneratedResume>, StoreError> {
        let mut resumes: Vec<GeneratedResume> = self.with(|t| {
            t.resumes
                .iter()
                .filter(|r| owned(&r.user_id, user))
                .cloned()
                .collect()
        });
        resumes.sort_by(|a, b| b.metadata.generated_at.cmp(&a.metadata.generated_at));
        Ok(resumes)
    }

    async fn get_resume(
        &self,
        user: &UserId,
        id: Uuid,
    ) -> Result<Option<GeneratedResume>, StoreError> {
        Ok(self.with(|t| {
            t.resumes
                .iter()
                .find(|r| r.id == id && owned(&r.user_id, user))
                .cloned()
        }))
    }

    async fn delete_resume(&self, user: &UserId, id: Uuid) -> Result<bool, StoreError> {
        Ok(self.with(|t| {
            remove_owned(&mut t.resumes, |r| r.id == id && owned(&r.user_id, user)).is_some()
        }))
    }

    async fn insert_file(&self, file: &UploadedFile) -> Result<i32, StoreError> {
        Ok(self.with(|t| {
            let order = t
                .files
                .iter()
                .filter(|f| f.user_id == file.user_id)
                .map(|f| f.order + 1)
                .max()
                .unwrap_or(0);
            t.files.push(UploadedFile {
                order,
                ..file.clone()
            });
            order
        }))
    }

    async fn list_files(&self, user: &UserId) -> Result<Vec<UploadedFile>, StoreError> {
        let mut files: Vec<UploadedFile> = self.with(|t| {
            t.files
                .iter()
                .filter(|f| owned(&f.user_id, user))
                .cloned()
                .collect()
        });
        files.sort_by(|a, b| b.upload_date.cmp(&a.upload_date));
        Ok(files)
    }

    async fn get_file(&self, user: &UserId, id: Uuid) -> Result<Option<UploadedFile>, StoreError> {
        Ok(self.with(|t| {
            t.files
                .iter()
                .find(|f| f.id == id && owned(&f.user_id, user))
                .cloned()
        }))
    }

    async fn delete_file(
        &self,
        user: &UserId,
        id: Uuid,
    ) -> Result<Option<UploadedFile>, StoreError> {
        Ok(self.with(|t| remove_owned(&mut t.files, |f| f.id == id && owned(&f.user_id, user))))
    }

    async fn reorder_files(&self, user: &UserId, ids: &[Uuid]) -> Result<u64, StoreError> {
        Ok(self.with(|t| {
            let mut updated = 0;
            for (position, id) in ids.iter().enumerate() {
                if let Some(file) = t
                    .files
                    .iter_mut()
                    .find(|f| f.id == *id && owned(&f.user_id, user))
                {
                    file.order = position as i32;
                    updated += 1;
                }
            }
            updated
        }))
    }
}

#[derive(Default)]
pub struct MemoryBlobs {
    objects: Mutex<HashMap<String, Bytes>>,
}

impl MemoryBlobs {
    pub fn contains(&self, key: &str) -> bool {
        self.objects
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .contains_key(key)
    }
}

#[async_trait]
impl BlobStore for MemoryBlobs {
    async fn put(&self, key: &str, bytes: Bytes, _content_type: &str) -> Result<(), StoreError> {
        self.objects
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .insert(key.to_string(), bytes);
        Ok(())
    }

    async fn get(&self, key: &str) -> Result<Bytes, StoreError> {
        self.objects
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .get(key)
            .cloned()
            .ok_or_else(|| StoreError::Blob(format!("no object at {key}")))
    }

    async fn delete(&self, key: &str) -> Result<(), StoreError> {
        self.objects
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .remove(key);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn file(user: &str, order: i32) -> UploadedFile {
        UploadedFile {
            id: Uuid::new_v4(),
            user_id: user.into(),
            filename: "cv.pdf".into(),
            content_type: "application/pdf".into(),
            size: 10,
            content_key: "k".into(),
            upload_date: Utc::now(),
            order,
        }
    }

    #[tokio::test]
    async fn test_default_profile_created_once() {
        let store = MemoryStore::default();
        let alice = UserId::new("alice");
        store.ensure_default_profile(&alice).await.unwrap();
        store.ensure_default_profile(&alice).await.unwrap();
        let profiles = store.list_profiles(&alice).await.unwrap();
        assert_eq!(profiles.len(), 1);
        assert_eq!(profiles[0].name, DEFAULT_PROFILE_NAME);
    }

    #[tokio::test]
    async fn test_insert_ranks_after_highest_owned_file() {
        let store = MemoryStore::default();
        let alice = UserId::new("alice");
        let (a, b, c) = (file("alice", 0), file("alice", 0), file("alice", 0));
        assert_eq!(store.insert_file(&a).await.unwrap(), 0);
        assert_eq!(store.insert_file(&b).await.unwrap(), 1);
        assert_eq!(store.insert_file(&file("bob", 7)).await.unwrap(), 0);

        store.delete_file(&alice, a.id).await.unwrap();
        assert_eq!(store.insert_file(&c).await.unwrap(), 2);
        assert_eq!(store.get_file(&alice, c.id).await.unwrap().unwrap().order, 2);
    }

    #[tokio::test]
    async fn test_reorder_skips_foreign_ids() {
        let store = MemoryStore::default();
        let alice = UserId::new("alice");
        let (a, b, foreign) = (file("alice", 0), file("alice", 1), file("bob", 0));
        for f in [&a, &b, &foreign] {
            store.insert_file(f).await.unwrap();
        }

        let updated = store
            .reorder_files(&alice, &[foreign.id, b.id, a.id])
            .await
            .unwrap();
        assert_eq!(updated, 2);
        assert_eq!(store.get_file(&alice, b.id).await.unwrap().unwrap().order, 1);
        assert_eq!(store.get_file(&alice, a.id).await.unwrap().unwrap().order, 2);
        let bob = UserId::new("bob");
        assert_eq!(store.get_file(&bob, foreign.id).await.unwrap().unwrap().order, 0);
    }
}
