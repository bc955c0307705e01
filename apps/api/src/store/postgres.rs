use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::de::Error as _;
use serde_json::{Map, Value};
use sqlx::types::Json;
use sqlx::{FromRow, PgPool};
use tracing::{debug, info};
use uuid::Uuid;

use super::{RecordStore, StoreError};
use crate::auth::UserId;
use crate::llm_client::Usage;
use crate::models::file::UploadedFile;
use crate::models::job_ad::{JobAd, JobAdFields};
use crate::models::profile::{Profile, ProfileData, DEFAULT_PROFILE_NAME};
use crate::models::resume::{GeneratedResume, GenerationMetadata, ResumeFormat};

/// Postgres-backed [`RecordStore`]. Shares the process-wide pool.
#[derive(Clone)]
pub struct PgRecordStore {
    pool: PgPool,
}

impl PgRecordStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[derive(FromRow)]
struct ProfileRow {
    id: Uuid,
    user_id: String,
    name: String,
    is_default: bool,
    data: Value,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl TryFrom<ProfileRow> for Profile {
    type Error = StoreError;

    fn try_from(row: ProfileRow) -> Result<Self, StoreError> {
        Ok(Profile {
            id: row.id,
            user_id: row.user_id,
            name: row.name,
            is_default: row.is_default,
            data: serde_json::from_value(row.data)?,
            created_at: row.created_at,
            updated_at: row.updated_at,
        })
    }
}

#[derive(FromRow)]
struct JobAdRow {
    id: Uuid,
    user_id: String,
    raw_text: String,
    source_url: Option<String>,
    job_title: String,
    company_name: String,
    description: String,
    requirements: Json<Vec<String>>,
    posted_at: String,
    location: String,
    created_at: DateTime<Utc>,
}

impl From<JobAdRow> for JobAd {
    fn from(row: JobAdRow) -> Self {
        JobAd {
            id: row.id,
            user_id: row.user_id,
            raw_text: row.raw_text,
            source_url: row.source_url,
            fields: JobAdFields {
                job_title: row.job_title,
                company_name: row.company_name,
                description: row.description,
                requirements: row.requirements.0,
                posted_at: row.posted_at,
                location: row.location,
            },
            created_at: row.created_at,
        }
    }
}

#[derive(FromRow)]
struct ResumeRow {
    id: Uuid,
    user_id: String,
    profile_id: Uuid,
    job_ad_id: Uuid,
    format: String,
    content: Value,
    model: String,
    input_tokens: i32,
    output_tokens: i32,
    generated_at: DateTime<Utc>,
}

impl TryFrom<ResumeRow> for GeneratedResume {
    type Error = StoreError;

    fn try_from(row: ResumeRow) -> Result<Self, StoreError> {
        let format = ResumeFormat::parse(&row.format).ok_or_else(|| {
            StoreError::Decode(serde_json::Error::custom(format!(
                "unknown resume format '{}'",
                row.format
            )))
        })?;
        Ok(GeneratedResume {
            id: row.id,
            user_id: row.user_id,
            profile_id: row.profile_id,
            job_ad_id: row.job_ad_id,
            format,
            content: row.content,
            metadata: GenerationMetadata {
                model: row.model,
                usage: Usage {
                    input_tokens: row.input_tokens.max(0) as u32,
                    output_tokens: row.output_tokens.max(0) as u32,
                },
                generated_at: row.generated_at,
            },
        })
    }
}

#[derive(FromRow)]
struct FileRow {
    id: Uuid,
    user_id: String,
    filename: String,
    content_type: String,
    size: i64,
    content_key: String,
    upload_date: DateTime<Utc>,
    display_order: i32,
}

impl From<FileRow> for UploadedFile {
    fn from(row: FileRow) -> Self {
        UploadedFile {
            id: row.id,
            user_id: row.user_id,
            filename: row.filename,
            content_type: row.content_type,
            size: row.size,
            content_key: row.content_key,
            upload_date: row.upload_date,
            order: row.display_order,
        }
    }
}

fn profiles(rows: Vec<ProfileRow>) -> Result<Vec<Profile>, StoreError> {
    rows.into_iter().map(Profile::try_from).collect()
}

#[async_trait]
impl RecordStore for PgRecordStore {
    async fn list_profiles(&self, user: &UserId) -> Result<Vec<Profile>, StoreError> {
        let rows = sqlx::query_as::<_, ProfileRow>(
            "SELECT * FROM profiles WHERE user_id = $1 ORDER BY created_at ASC, id ASC",
        )
        .bind(user.as_str())
        .fetch_all(&self.pool)
        .await?;
        profiles(rows)
    }

    async fn ensure_default_profile(&self, user: &UserId) -> Result<(), StoreError> {
        let data = serde_json::to_value(ProfileData::default())?;
        let inserted = sqlx::query(
            r#"
            INSERT INTO profiles (id, user_id, name, is_default, data)
            VALUES ($1, $2, $3, TRUE, $4)
            ON CONFLICT (user_id) WHERE is_default DO NOTHING
            "#,
        )
        .bind(Uuid::new_v4())
        .bind(user.as_str())
        .bind(DEFAULT_PROFILE_NAME)
        .bind(data)
        .execute(&self.pool)
        .await?
        .rows_affected();

        if inserted > 0 {
            info!("Created default profile for user {user}");
        }
        Ok(())
    }

    async fn count_profiles(&self, user: &UserId) -> Result<i64, StoreError> {
        Ok(
            sqlx::query_scalar("SELECT COUNT(*) FROM profiles WHERE user_id = $1")
                .bind(user.as_str())
                .fetch_one(&self.pool)
                .await?,
        )
    }

    async fn create_profile(
        &self,
        user: &UserId,
        name: &str,
        data: &ProfileData,
    ) -> Result<Profile, StoreError> {
        let row = sqlx::query_as::<_, ProfileRow>(
            r#"
            INSERT INTO profiles (id, user_id, name, is_default, data)
            VALUES ($1, $2, $3, FALSE, $4)
            RETURNING *
            "#,
        )
        .bind(Uuid::new_v4())
        .bind(user.as_str())
        .bind(name)
        .bind(serde_json::to_value(data)?)
        .fetch_one(&self.pool)
        .await?;
        row.try_into()
    }

    async fn get_profile(&self, user: &UserId, id: Uuid) -> Result<Option<Profile>, StoreError> {
        sqlx::query_as::<_, ProfileRow>("SELECT * FROM profiles WHERE id = $1 AND user_id = $2")
            .bind(id)
            .bind(user.as_str())
            .fetch_optional(&self.pool)
            .await?
            .map(Profile::try_from)
            .transpose()
    }

    async fn update_profile(
        &self,
        user: &UserId,
        id: Uuid,
        name: Option<&str>,
        data_patch: Option<&Map<String, Value>>,
    ) -> Result<Option<Profile>, StoreError> {
        // `||` on jsonb replaces top-level keys, which is exactly the shallow merge.
        sqlx::query_as::<_, ProfileRow>(
            r#"
            UPDATE profiles
            SET name = COALESCE($3, name),
                data = data || COALESCE($4::jsonb, '{}'::jsonb),
                updated_at = now()
            WHERE id = $1 AND user_id = $2
            RETURNING *
            "#,
        )
        .bind(id)
        .bind(user.as_str())
        .bind(name)
        .bind(data_patch.map(Json))
        .fetch_optional(&self.pool)
        .await?
        .map(Profile::try_from)
        .transpose()
    }

    async fn delete_profile(&self, user: &UserId, id: Uuid) -> Result<bool, StoreError> {
        let result = sqlx::query("DELETE FROM profiles WHERE id = $1 AND user_id = $2")
            .bind(id)
            .bind(user.as_str())
            .execute(&self.pool)
            .await?;
        Ok(result.rows_affected() > 0)
    }

    async fn insert_job_ad(&self, ad: &JobAd) -> Result<(), StoreError> {
        sqlx::query(
            r#"
            INSERT INTO job_ads
                (id, user_id, raw_text, source_url, job_title, company_name,
                 description, requirements, posted_at, location, created_at)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11)
            "#,
        )
        .bind(ad.id)
        .bind(&ad.user_id)
        .bind(&ad.raw_text)
        .bind(&ad.source_url)
        .bind(&ad.fields.job_title)
        .bind(&ad.fields.company_name)
        .bind(&ad.fields.description)
        .bind(Json(&ad.fields.requirements))
        .bind(&ad.fields.posted_at)
        .bind(&ad.fields.location)
        .bind(ad.created_at)
        .execute(&self.pool)
        .await?;
        debug!("Stored job ad {} for user {}", ad.id, ad.user_id);
        Ok(())
    }

    async fn list_job_ads(&self, user: &UserId) -> Result<Vec<JobAd>, StoreError> {
        let rows = sqlx::query_as::<_, JobAdRow>(
            "SELECT * FROM job_ads WHERE user_id = $1 ORDER BY created_at DESC",
        )
        .bind(user.as_str())
        .fetch_all(&self.pool)
        .await?;
        Ok(rows.into_iter().map(JobAd::from).collect())
    }

    async fn get_job_ad(&self, user: &UserId, id: Uuid) -> Result<Option<JobAd>, StoreError> {
        Ok(
            sqlx::query_as::<_, JobAdRow>("SELECT * FROM job_ads WHERE id = $1 AND user_id = $2")
                .bind(id)
                .bind(user.as_str())
                .fetch_optional(&self.pool)
                .await?
                .map(JobAd::from),
        )
    }

    async fn replace_job_ad_fields(
        &self,
        user: &UserId,
        id: Uuid,
        fields: &JobAdFields,
    ) -> Result<Option<JobAd>, StoreError> {
        Ok(sqlx::query_as::<_, JobAdRow>(
            r#"
            UPDATE job_ads
            SET job_title = $3, company_name = $4, description = $5,
                requirements = $6, posted_at = $7, location = $8
            WHERE id = $1 AND user_id = $2
            RETURNING *
            "#,
        )
        .bind(id)
        .bind(user.as_str())
        .bind(&fields.job_title)
        .bind(&fields.company_name)
        .bind(&fields.description)
        .bind(Json(&fields.requirements))
        .bind(&fields.posted_at)
        .bind(&fields.location)
        .fetch_optional(&self.pool)
        .await?
        .map(JobAd::from))
    }

    async fn delete_job_ad(&self, user: &UserId, id: Uuid) -> Result<bool, StoreError> {
        let result = sqlx::query("DELETE FROM job_ads WHERE id = $1 AND user_id = $2")
            .bind(id)
            .bind(user.as_str())
            .execute(&self.pool)
            .await?;
        Ok(result.rows_affected() > 0)
    }

    async fn insert_resume(&self, resume: &GeneratedResume) -> Result<(), StoreError> {
        let meta = &resume.metadata;
        sqlx::query(
            r#"
            INSERT INTO resumes
                (id, user_id, profile_id, job_ad_id, format, content,
                 model, input_tokens, output_tokens, generated_at)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10)
            "#,
        )
        .bind(resume.id)
        .bind(&resume.user_id)
        .bind(resume.profile_id)
        .bind(resume.job_ad_id)
        .bind(resume.format.as_str())
        .bind(&resume.content)
        .bind(&meta.model)
        .bind(i32::try_from(meta.usage.input_tokens).unwrap_or(i32::MAX))
        .bind(i32::try_from(meta.usage.output_tokens).unwrap_or(i32::MAX))
        .bind(meta.generated_at)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    async fn list_resumes(&self, user: &UserId) -> Result<Vec<GeneratedResume>, StoreError> {
        let rows = sqlx::query_as::<_, ResumeRow>(
            "SELECT * FROM resumes WHERE user_id = $1 ORDER BY generated_at DESC",
        )
        .bind(user.as_str())
        .fetch_all(&self.pool)
        .await?;
        rows.into_iter().map(GeneratedResume::try_from).collect()
    }

    async fn get_resume(
        &self,
        user: &UserId,
        id: Uuid,
    ) -> Result<Option<GeneratedResume>, StoreError> {
        sqlx::query_as::<_, ResumeRow>("SELECT * FROM resumes WHERE id = $1 AND user_id = $2")
            .bind(id)
            .bind(user.as_str())
            .fetch_optional(&self.pool)
            .await?
            .map(GeneratedResume::try_from)
            .transpose()
    }

    async fn delete_resume(&self, user: &UserId, id: Uuid) -> Result<bool, StoreError> {
        let result = sqlx::query("DELETE FROM resumes WHERE id = $1 AND user_id = $2")
            .bind(id)
            .bind(user.as_str())
            .execute(&self.pool)
            .await?;
        Ok(result.rows_affected() > 0)
    }

    async fn insert_file(&self, file: &UploadedFile) -> Result<i32, StoreError> {
        let mut tx = self.pool.begin().await?;
        // Per-owner lock: concurrent uploads get distinct ranks.
        sqlx::query("SELECT pg_advisory_xact_lock(hashtext($1))")
            .bind(&file.user_id)
            .execute(&mut *tx)
            .await?;
        let order: i32 = sqlx::query_scalar(
            r#"
            INSERT INTO uploaded_files
                (id, user_id, filename, content_type, size, content_key, upload_date, display_order)
            SELECT $1, $2, $3, $4, $5, $6, $7, COALESCE(MAX(display_order) + 1, 0)
            FROM uploaded_files
            WHERE user_id = $2
            RETURNING display_order
            "#,
        )
        .bind(file.id)
        .bind(&file.user_id)
        .bind(&file.filename)
        .bind(&file.content_type)
        .bind(file.size)
        .bind(&file.content_key)
        .bind(file.upload_date)
        .fetch_one(&mut *tx)
        .await?;
        tx.commit().await?;
        Ok(order)
    }

    async fn list_files(&self, user: &UserId) -> Result<Vec<UploadedFile>, StoreError> {
        let rows = sqlx::query_as::<_, FileRow>(
            "SELECT * FROM uploaded_files WHERE user_id = $1 ORDER BY upload_date DESC",
        )
        .bind(user.as_str())
        .fetch_all(&self.pool)
        .await?;
        Ok(rows.into_iter().map(UploadedFile::from).collect())
    }

    async fn get_file(&self, user: &UserId, id: Uuid) -> Result<Option<UploadedFile>, StoreError> {
        Ok(sqlx::query_as::<_, FileRow>(
            "SELECT * FROM uploaded_files WHERE id = $1 AND user_id = $2",
        )
        .bind(id)
        .bind(user.as_str())
        .fetch_optional(&self.pool)
        .await?
        .map(UploadedFile::from))
    }

    async fn delete_file(
        &self,
        user: &UserId,
        id: Uuid,
    ) -> Result<Option<UploadedFile>, StoreError> {
        Ok(sqlx::query_as::<_, FileRow>(
            "DELETE FROM uploaded_files WHERE id = $1 AND user_id = $2 RETURNING *",
        )
        .bind(id)
        .bind(user.as_str())
        .fetch_optional(&self.pool)
        .await?
        .map(UploadedFile::from))
    }

    async fn reorder_files(&self, user: &UserId, ids: &[Uuid]) -> Result<u64, StoreError> {
        // Ordinality is 1-based and counts every submitted id, owned or not.
        let result = sqlx::query(
            r#"
            UPDATE uploaded_files AS f
            SET display_order = (o.position - 1)::int
            FROM unnest($2::uuid[]) WITH ORDINALITY AS o(id, position)
            WHERE f.id = o.id AND f.user_id = $1
            "#,
        )
        .bind(user.as_str())
        .bind(ids)
        .execute(&self.pool)
        .await?;
        Ok(result.rows_affected())
    }
}
