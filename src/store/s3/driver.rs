//! S3后端核心实现
//!
//! rust-s3 buffers whole responses, so `get` wraps the returned bytes in a
//! cursor rather than pretending to stream.

use std::io::Cursor;
use std::path::Path;

use async_trait::async_trait;
use s3::bucket::Bucket;
use s3::creds::Credentials;
use s3::error::S3Error;
use s3::{BucketConfiguration, Region};
use tokio::io::AsyncReadExt;

use super::config::S3Config;
use crate::error::{Result, StoreError};
use crate::store::{ByteStream, NotFoundPolicy, ObjectStore};

/// S3存储后端
pub struct S3Store {
    config: S3Config,
    bucket: Box<Bucket>,
    credentials: Credentials,
    region: Region,
}

impl S3Store {
    /// 创建新的S3后端实例（无网络副作用，桶检查由ensure_bucket负责）
    pub fn new(config: S3Config) -> Result<Self> {
        let credentials = Credentials::new(
            Some(&config.access_key_id),
            Some(&config.secret_access_key),
            if config.session_token.is_empty() {
                None
            } else {
                Some(&config.session_token)
            },
            None,
            None,
        )
        .map_err(|e| StoreError::Config(format!("invalid s3 credentials: {}", e)))?;

        let region = if config.endpoint.is_empty() {
            Region::Custom {
                region: config.region.clone(),
                endpoint: format!("https://s3.{}.amazonaws.com", config.region),
            }
        } else {
            Region::Custom {
                region: config.region.clone(),
                endpoint: config.endpoint.clone(),
            }
        };

        let bucket = Self::bucket_handle(
            &config.bucket,
            region.clone(),
            credentials.clone(),
            config.force_path_style,
        )?;

        Ok(Self {
            config,
            bucket,
            credentials,
            region,
        })
    }

    /// 创建S3 Bucket客户端句柄
    fn bucket_handle(
        name: &str,
        region: Region,
        credentials: Credentials,
        force_path_style: bool,
    ) -> Result<Box<Bucket>> {
        let bucket = Bucket::new(name, region, credentials).map_err(map_backend_err)?;
        Ok(if force_path_style {
            bucket.with_path_style()
        } else {
            bucket
        })
    }
}

/// Map an object-level SDK error, turning 404 into a typed NotFound.
fn map_object_err(name: &str, err: S3Error) -> StoreError {
    match err {
        S3Error::HttpFailWithBody(404, _) => StoreError::NotFound(name.to_string()),
        other => StoreError::Backend(other.to_string()),
    }
}

fn map_backend_err(err: S3Error) -> StoreError {
    StoreError::Backend(err.to_string())
}

#[async_trait]
impl ObjectStore for S3Store {
    fn name(&self) -> &str {
        "S3"
    }

    fn bucket_name(&self) -> &str {
        &self.config.bucket
    }

    fn not_found_policy(&self) -> NotFoundPolicy {
        self.config.on_missing
    }

    async fn create_bucket(&self, name: &str) -> Result<()> {
        let response = if self.config.force_path_style {
            Bucket::create_with_path_style(
                name,
                self.region.clone(),
                self.credentials.clone(),
                BucketConfiguration::default(),
            )
            .await
        } else {
            Bucket::create(
                name,
                self.region.clone(),
                self.credentials.clone(),
                BucketConfiguration::default(),
            )
            .await
        }
        .map_err(map_backend_err)?;

        if !response.success() {
            return Err(StoreError::Backend(format!(
                "bucket creation failed: {}",
                response.response_text
            )));
        }
        Ok(())
    }

    async fn bucket_exists(&self, name: &str) -> Result<bool> {
        let bucket = Self::bucket_handle(
            name,
            self.region.clone(),
            self.credentials.clone(),
            self.config.force_path_style,
        )?;
        bucket.exists().await.map_err(map_backend_err)
    }

    async fn list_buckets(&self) -> Result<Vec<String>> {
        let response = Bucket::list_buckets(self.region.clone(), self.credentials.clone())
            .await
            .map_err(map_backend_err)?;
        Ok(response.bucket_names().collect())
    }

    async fn list_objects(&self, prefix: Option<&str>, recursive: bool) -> Result<Vec<String>> {
        let prefix = prefix.unwrap_or_default().to_string();
        let delimiter = if recursive {
            None
        } else {
            Some("/".to_string())
        };

        let pages = self
            .bucket
            .list(prefix, delimiter)
            .await
            .map_err(map_backend_err)?;

        let mut names = Vec::new();
        for page in pages {
            // Directory markers first (common prefixes), then object keys.
            for common_prefix in page.common_prefixes.unwrap_or_default() {
                names.push(common_prefix.prefix);
            }
            for object in page.contents {
                names.push(object.key);
            }
        }
        Ok(names)
    }

    async fn put(
        &self,
        name: &str,
        mut data: ByteStream,
        length: Option<u64>,
        content_type: &str,
    ) -> Result<()> {
        match length {
            Some(_) => {
                self.bucket
                    .put_object_stream_with_content_type(&mut data, name, content_type)
                    .await
                    .map_err(map_backend_err)?;
            }
            None => {
                // Size unknown: buffer the stream to measure it first.
                let mut buf = Vec::new();
                data.read_to_end(&mut buf).await?;
                self.bucket
                    .put_object_with_content_type(name, &buf, content_type)
                    .await
                    .map_err(map_backend_err)?;
            }
        }
        Ok(())
    }

    async fn get(&self, name: &str) -> Result<ByteStream> {
        let response = self
            .bucket
            .get_object(name)
            .await
            .map_err(|e| map_object_err(name, e))?;
        Ok(Box::new(Cursor::new(response.bytes().to_vec())))
    }

    async fn exists(&self, name: &str) -> Result<bool> {
        match self.bucket.head_object(name).await {
            Ok((_, 200)) => Ok(true),
            Ok((_, 404)) => Ok(false),
            Ok((_, code)) => Err(StoreError::Backend(format!(
                "unexpected status {} from head on {}",
                code, name
            ))),
            Err(S3Error::HttpFailWithBody(404, _)) => Ok(false),
            Err(e) => Err(map_backend_err(e)),
        }
    }

    async fn remove_object(&self, name: &str) -> Result<()> {
        self.bucket
            .delete_object(name)
            .await
            .map_err(|e| map_object_err(name, e))?;
        Ok(())
    }

    async fn download(&self, name: &str, local_path: &Path) -> Result<()> {
        let response = self
            .bucket
            .get_object(name)
            .await
            .map_err(|e| map_object_err(name, e))?;
        tokio::fs::write(local_path, response.bytes()).await?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn test_config() -> S3Config {
        S3Config {
            bucket: "test-bucket".to_string(),
            endpoint: "http://localhost:9000".to_string(),
            access_key_id: "minioadmin".to_string(),
            secret_access_key: "minioadmin".to_string(),
            force_path_style: true,
            ..Default::default()
        }
    }

    #[test]
    fn test_new_has_no_side_effects() {
        let store = S3Store::new(test_config()).unwrap();
        assert_eq!(store.name(), "S3");
        assert_eq!(store.bucket_name(), "test-bucket");
        assert_eq!(store.not_found_policy(), NotFoundPolicy::ReturnEmpty);
    }

    #[test]
    fn test_default_endpoint_from_region() {
        let mut config = test_config();
        config.endpoint = String::new();
        config.region = "eu-west-1".to_string();
        let store = S3Store::new(config).unwrap();
        match &store.region {
            Region::Custom { endpoint, .. } => {
                assert_eq!(endpoint, "https://s3.eu-west-1.amazonaws.com");
            }
            other => panic!("unexpected region: {:?}", other),
        }
    }

    #[test]
    fn test_404_maps_to_not_found() {
        let err = map_object_err(
            "missing.txt",
            S3Error::HttpFailWithBody(404, "NoSuchKey".to_string()),
        );
        assert!(err.is_not_found());
    }

    #[test]
    fn test_other_statuses_stay_backend_errors() {
        let err = map_object_err(
            "denied.txt",
            S3Error::HttpFailWithBody(403, "AccessDenied".to_string()),
        );
        assert!(!err.is_not_found());
        assert!(matches!(err, StoreError::Backend(_)));
    }
}
