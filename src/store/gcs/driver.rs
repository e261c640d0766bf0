//! GCS后端核心实现
//!
//! Listing uses the JSON API delimiter for directory semantics and filters the
//! prefix marker itself out of results. The start/end offset listing variant
//! is a GCS-only capability and stays off the shared trait.

use std::borrow::Cow;
use std::io::Cursor;
use std::path::Path;

use async_trait::async_trait;
use google_cloud_storage::client::{Client, ClientConfig};
use google_cloud_storage::http::buckets::get::GetBucketRequest;
use google_cloud_storage::http::buckets::insert::{InsertBucketParam, InsertBucketRequest};
use google_cloud_storage::http::buckets::list::ListBucketsRequest;
use google_cloud_storage::http::objects::delete::DeleteObjectRequest;
use google_cloud_storage::http::objects::download::Range;
use google_cloud_storage::http::objects::get::GetObjectRequest;
use google_cloud_storage::http::objects::list::ListObjectsRequest;
use google_cloud_storage::http::objects::upload::{Media, UploadObjectRequest, UploadType};
use google_cloud_storage::http::Error as GcsError;
use tokio::io::AsyncReadExt;

use super::config::GcsConfig;
use crate::error::{Result, StoreError};
use crate::store::{ByteStream, NotFoundPolicy, ObjectStore};

/// GCS存储后端
pub struct GcsStore {
    config: GcsConfig,
    client: Client,
}

impl GcsStore {
    /// 创建新的GCS后端实例（凭证来自环境，无桶副作用）
    pub async fn new(config: GcsConfig) -> Result<Self> {
        let client_config = ClientConfig::default()
            .with_auth()
            .await
            .map_err(|e| StoreError::Config(format!("gcs auth failed: {}", e)))?;
        Ok(Self {
            config,
            client: Client::new(client_config),
        })
    }

    /// 匿名客户端（模拟器/测试用）
    pub fn anonymous(config: GcsConfig) -> Self {
        Self {
            config,
            client: Client::new(ClientConfig::default().anonymous()),
        }
    }

    /// Recursive listing restricted to a lexicographic key window.
    /// GCS-only capability exposing the JSON API start/end offsets.
    pub async fn list_objects_range(
        &self,
        prefix: Option<&str>,
        start_offset: Option<&str>,
        end_offset: Option<&str>,
    ) -> Result<Vec<String>> {
        self.list_with_offsets(prefix, true, start_offset, end_offset)
            .await
    }

    async fn list_with_offsets(
        &self,
        prefix: Option<&str>,
        recursive: bool,
        start_offset: Option<&str>,
        end_offset: Option<&str>,
    ) -> Result<Vec<String>> {
        let mut names = Vec::new();
        let mut page_token: Option<String> = None;
        loop {
            let response = self
                .client
                .list_objects(&build_list_request(
                    &self.config.bucket,
                    prefix,
                    recursive,
                    start_offset,
                    end_offset,
                    page_token.clone(),
                ))
                .await
                .map_err(map_backend_err)?;

            merge_page(
                &mut names,
                prefix,
                response.prefixes.unwrap_or_default(),
                response
                    .items
                    .unwrap_or_default()
                    .into_iter()
                    .map(|object| object.name),
            );

            page_token = response.next_page_token;
            if page_token.is_none() {
                break;
            }
        }
        Ok(names)
    }
}

fn build_list_request(
    bucket: &str,
    prefix: Option<&str>,
    recursive: bool,
    start_offset: Option<&str>,
    end_offset: Option<&str>,
    page_token: Option<String>,
) -> ListObjectsRequest {
    let delimiter = if recursive {
        None
    } else {
        Some("/".to_string())
    };
    ListObjectsRequest {
        bucket: bucket.to_string(),
        prefix: prefix.map(str::to_string),
        delimiter,
        include_trailing_delimiter: Some(!recursive),
        start_offset: start_offset.map(str::to_string),
        end_offset: end_offset.map(str::to_string),
        page_token,
        ..Default::default()
    }
}

/// Merge one listing page into `names`, directory markers first.
/// The prefix marker itself shows up with include_trailing_delimiter, and a
/// placeholder object matching a directory marker would surface twice (once
/// in prefixes, once in items), so both are filtered here.
fn merge_page(
    names: &mut Vec<String>,
    prefix: Option<&str>,
    directories: Vec<String>,
    objects: impl IntoIterator<Item = String>,
) {
    for directory in directories {
        if Some(directory.as_str()) != prefix && !names.contains(&directory) {
            names.push(directory);
        }
    }
    for object in objects {
        if Some(object.as_str()) != prefix && !names.contains(&object) {
            names.push(object);
        }
    }
}

/// Map an object-level SDK error, turning 404 into a typed NotFound.
fn map_object_err(name: &str, err: GcsError) -> StoreError {
    if is_not_found(&err) {
        StoreError::NotFound(name.to_string())
    } else {
        StoreError::Backend(err.to_string())
    }
}

fn map_backend_err(err: GcsError) -> StoreError {
    StoreError::Backend(err.to_string())
}

fn is_not_found(err: &GcsError) -> bool {
    match err {
        GcsError::Response(response) => response.code == 404,
        GcsError::HttpClient(e) => e.status().map(|s| s.as_u16() == 404).unwrap_or(false),
        _ => false,
    }
}

#[async_trait]
impl ObjectStore for GcsStore {
    fn name(&self) -> &str {
        "GCS"
    }

    fn bucket_name(&self) -> &str {
        &self.config.bucket
    }

    fn not_found_policy(&self) -> NotFoundPolicy {
        self.config.on_missing
    }

    async fn create_bucket(&self, name: &str) -> Result<()> {
        self.client
            .insert_bucket(&InsertBucketRequest {
                name: name.to_string(),
                param: InsertBucketParam {
                    project: self.config.project_id.clone(),
                    ..Default::default()
                },
                ..Default::default()
            })
            .await
            .map_err(map_backend_err)?;
        Ok(())
    }

    async fn bucket_exists(&self, name: &str) -> Result<bool> {
        match self
            .client
            .get_bucket(&GetBucketRequest {
                bucket: name.to_string(),
                ..Default::default()
            })
            .await
        {
            Ok(_) => Ok(true),
            Err(e) if is_not_found(&e) => Ok(false),
            Err(e) => Err(map_backend_err(e)),
        }
    }

    async fn list_buckets(&self) -> Result<Vec<String>> {
        let mut names = Vec::new();
        let mut page_token: Option<String> = None;
        loop {
            let response = self
                .client
                .list_buckets(&ListBucketsRequest {
                    project: self.config.project_id.clone(),
                    page_token: page_token.clone(),
                    ..Default::default()
                })
                .await
                .map_err(map_backend_err)?;
            names.extend(response.items.into_iter().map(|bucket| bucket.name));
            page_token = response.next_page_token;
            if page_token.is_none() {
                break;
            }
        }
        Ok(names)
    }

    async fn list_objects(&self, prefix: Option<&str>, recursive: bool) -> Result<Vec<String>> {
        self.list_with_offsets(prefix, recursive, None, None).await
    }

    async fn put(
        &self,
        name: &str,
        mut data: ByteStream,
        length: Option<u64>,
        content_type: &str,
    ) -> Result<()> {
        // Simple upload wants the full body anyway, so buffer regardless.
        let mut buf = match length {
            Some(len) => Vec::with_capacity(len as usize),
            None => Vec::new(),
        };
        data.read_to_end(&mut buf).await?;

        let media = Media {
            name: Cow::Owned(name.to_string()),
            content_type: Cow::Owned(content_type.to_string()),
            content_length: Some(buf.len() as u64),
        };
        self.client
            .upload_object(
                &UploadObjectRequest {
                    bucket: self.config.bucket.clone(),
                    ..Default::default()
                },
                buf,
                &UploadType::Simple(media),
            )
            .await
            .map_err(map_backend_err)?;
        Ok(())
    }

    async fn get(&self, name: &str) -> Result<ByteStream> {
        let data = self
            .client
            .download_object(
                &GetObjectRequest {
                    bucket: self.config.bucket.clone(),
                    object: name.to_string(),
                    ..Default::default()
                },
                &Range::default(),
            )
            .await
            .map_err(|e| map_object_err(name, e))?;
        Ok(Box::new(Cursor::new(data)))
    }

    async fn exists(&self, name: &str) -> Result<bool> {
        match self
            .client
            .get_object(&GetObjectRequest {
                bucket: self.config.bucket.clone(),
                object: name.to_string(),
                ..Default::default()
            })
            .await
        {
            Ok(_) => Ok(true),
            Err(e) if is_not_found(&e) => Ok(false),
            Err(e) => Err(map_backend_err(e)),
        }
    }

    async fn remove_object(&self, name: &str) -> Result<()> {
        self.client
            .delete_object(&DeleteObjectRequest {
                bucket: self.config.bucket.clone(),
                object: name.to_string(),
                ..Default::default()
            })
            .await
            .map_err(|e| map_object_err(name, e))?;
        Ok(())
    }

    async fn download(&self, name: &str, local_path: &Path) -> Result<()> {
        let data = self
            .client
            .download_object(
                &GetObjectRequest {
                    bucket: self.config.bucket.clone(),
                    object: name.to_string(),
                    ..Default::default()
                },
                &Range::default(),
            )
            .await
            .map_err(|e| map_object_err(name, e))?;
        tokio::fs::write(local_path, data).await?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use google_cloud_storage::http::error::ErrorResponse;
    use serde_json::json;

    fn response_error(code: u16) -> GcsError {
        let response: ErrorResponse = serde_json::from_value(json!({
            "code": code,
            "message": "test error",
            "errors": [],
        }))
        .unwrap();
        GcsError::Response(response)
    }

    #[test]
    fn test_404_maps_to_not_found() {
        assert!(is_not_found(&response_error(404)));
        let err = map_object_err("missing.txt", response_error(404));
        assert!(err.is_not_found());
    }

    #[test]
    fn test_other_statuses_stay_backend_errors() {
        assert!(!is_not_found(&response_error(403)));
        let err = map_object_err("denied.txt", response_error(500));
        assert!(matches!(err, StoreError::Backend(_)));
    }

    #[test]
    fn test_list_request_directory_mode() {
        let request = build_list_request("b", Some("a/"), false, None, None, None);
        assert_eq!(request.delimiter.as_deref(), Some("/"));
        assert_eq!(request.include_trailing_delimiter, Some(true));

        let recursive = build_list_request("b", Some("a/"), true, None, None, None);
        assert_eq!(recursive.delimiter, None);
        assert_eq!(recursive.include_trailing_delimiter, Some(false));
    }

    #[test]
    fn test_list_request_offsets() {
        let request = build_list_request("b", Some("a/"), true, Some("a/1"), Some("a/4"), None);
        assert_eq!(request.start_offset.as_deref(), Some("a/1"));
        assert_eq!(request.end_offset.as_deref(), Some("a/4"));
    }

    #[test]
    fn test_merge_page_filters_prefix_marker() {
        let mut names = Vec::new();
        merge_page(
            &mut names,
            Some("a/"),
            vec!["a/b/".to_string()],
            vec!["a/".to_string(), "a/1.txt".to_string()],
        );
        assert_eq!(names, vec!["a/b/".to_string(), "a/1.txt".to_string()]);
    }

    #[test]
    fn test_merge_page_dedups_placeholder_objects() {
        // A placeholder object named exactly like a directory marker shows up
        // in both prefixes and items; it must be listed once.
        let mut names = Vec::new();
        merge_page(
            &mut names,
            Some("a/"),
            vec!["a/b/".to_string()],
            vec!["a/b/".to_string(), "a/1.txt".to_string()],
        );
        assert_eq!(names, vec!["a/b/".to_string(), "a/1.txt".to_string()]);

        // Same marker repeated across pages stays unique too.
        merge_page(&mut names, Some("a/"), vec!["a/b/".to_string()], Vec::new());
        assert_eq!(names, vec!["a/b/".to_string(), "a/1.txt".to_string()]);
    }

    #[test]
    fn test_anonymous_client_has_no_side_effects() {
        let store = GcsStore::anonymous(GcsConfig {
            bucket: "test-bucket".to_string(),
            project_id: "test-project".to_string(),
            ..Default::default()
        });
        assert_eq!(store.name(), "GCS");
        assert_eq!(store.bucket_name(), "test-bucket");
    }
}
