use std::sync::Arc;

use bytes::Bytes;
use uuid::Uuid;

use crate::database::store::PipelineStore;
use crate::error::{Error, Result};
use crate::models::actor::Actor;
use crate::models::file::{FileRecord, NewFileRecord};
use crate::services::access::{load_candidate, require_actor, require_membership};
use crate::services::query_cache::{CacheKey, QueryCache};
use crate::storage::BlobStorage;
use crate::utils::signed_url::UrlSigner;
use crate::utils::time::now;
use crate::utils::validation::field_error;

/// Replaces every character outside `[A-Za-z0-9._-]` with `-`.
pub fn safe_file_name(name: &str) -> String {
    name.chars()
        .map(|c| {
            if c.is_ascii_alphanumeric() || matches!(c, '.' | '_' | '-') {
                c
            } else {
                '-'
            }
        })
        .collect()
}

pub fn storage_path(organization_id: Uuid, candidate_id: Uuid, unix_millis: i64, file_name: &str) -> String {
    format!(
        "{}/{}/{}-{}",
        organization_id,
        candidate_id,
        unix_millis,
        safe_file_name(file_name)
    )
}

/// Organization owning a storage path, read from its first segment.
fn path_organization(path: &str) -> Result<Uuid> {
    path.split('/')
        .next()
        .and_then(|segment| Uuid::parse_str(segment).ok())
        .ok_or_else(|| Error::NotFound(format!("File {} not found", path)))
}

#[derive(Clone)]
pub struct FileService {
    store: Arc<dyn PipelineStore>,
    blobs: Arc<dyn BlobStorage>,
    signer: UrlSigner,
    cache: QueryCache,
}

impl FileService {
    pub fn new(
        store: Arc<dyn PipelineStore>,
        blobs: Arc<dyn BlobStorage>,
        signer: UrlSigner,
        cache: QueryCache,
    ) -> Self {
        Self {
            store,
            blobs,
            signer,
            cache,
        }
    }

    /// Stores the bytes under a fresh path and records the attachment.
    pub async fn upload_file(
        &self,
        actor: Option<&Actor>,
        organization_id: Uuid,
        candidate_id: Uuid,
        file_name: &str,
        data: Bytes,
    ) -> Result<FileRecord> {
        let actor = require_actor(actor, "upload files")?;
        let file_name = file_name.trim();
        if file_name.is_empty() {
            return Err(Error::Validation(field_error("file_name", "required", "file name is required")));
        }
        let candidate = load_candidate(self.store.as_ref(), candidate_id, actor).await?;
        if candidate.organization_id != organization_id {
            return Err(Error::NotFound(format!("Candidate {} not found", candidate_id)));
        }

        let path = storage_path(organization_id, candidate_id, now().timestamp_millis(), file_name);
        let size = data.len();
        self.blobs.put(&path, data).await?;

        let record = self
            .store
            .insert_file(NewFileRecord {
                candidate_id,
                file_url: path.clone(),
                file_name: file_name.to_string(),
                uploaded_by: actor.user_id,
            })
            .await?;
        tracing::info!(%candidate_id, path = %path, size, "file uploaded");
        self.cache
            .invalidate_key(&CacheKey::candidate_profile(organization_id, candidate_id))
            .await;
        Ok(record)
    }

    /// Signed link to a stored file, valid for the signer's TTL.
    pub async fn get_file_download_url(&self, actor: Option<&Actor>, path: &str) -> Result<String> {
        let actor = require_actor(actor, "download files")?;
        let organization_id = path_organization(path)?;
        require_membership(self.store.as_ref(), organization_id, actor).await?;
        self.signer.sign(path, now().timestamp())
    }

    pub fn url_ttl_secs(&self) -> i64 {
        self.signer.ttl_secs()
    }

    /// Serves the bytes behind a signed link. The signature stands in for
    /// the actor.
    pub async fn download(&self, path: &str, expires: i64, signature: &str) -> Result<Bytes> {
        self.signer.verify(path, expires, signature, now().timestamp())?;
        self.blobs.get(path).await
    }
}
