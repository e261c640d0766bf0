//! Store configuration / 存储配置
//!
//! A single flat settings struct covering both backends, loaded from JSON or
//! environment-driven config by the caller. Per-backend projections feed the
//! concrete adapters.

use serde::{Deserialize, Serialize};

use crate::store::gcs::GcsConfig;
use crate::store::s3::S3Config;
use crate::store::NotFoundPolicy;

/// Unified store configuration / 统一存储配置
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StoreConfig {
    /// Bucket name / 存储桶名称
    pub bucket: String,
    /// Explicit backend protocol: "s3", "minio" or "gcs".
    /// When absent the backend is picked from the environment.
    #[serde(default)]
    pub protocol: Option<String>,
    /// S3端点地址
    /// AWS: https://s3.{region}.amazonaws.com
    /// MinIO: http://localhost:9000
    #[serde(default)]
    pub endpoint: String,
    /// 区域
    #[serde(default = "default_region")]
    pub region: String,
    /// Access Key ID
    #[serde(default)]
    pub access_key_id: String,
    /// Secret Access Key
    #[serde(default)]
    pub secret_access_key: String,
    /// Session Token（用于临时凭证）
    #[serde(default)]
    pub session_token: String,
    /// 强制使用路径风格（而非虚拟主机风格）
    /// MinIO等需要设置为true
    #[serde(default)]
    pub force_path_style: bool,
    /// GCP project owning the bucket (bucket create/list) / GCP项目ID
    #[serde(default)]
    pub project_id: String,
    /// What the convenience readers do when an object is missing
    #[serde(default)]
    pub on_missing: NotFoundPolicy,
}

fn default_region() -> String {
    "us-east-1".to_string()
}

impl StoreConfig {
    pub fn new(bucket: &str) -> Self {
        Self {
            bucket: bucket.to_string(),
            protocol: None,
            endpoint: String::new(),
            region: default_region(),
            access_key_id: String::new(),
            secret_access_key: String::new(),
            session_token: String::new(),
            force_path_style: false,
            project_id: String::new(),
            on_missing: NotFoundPolicy::default(),
        }
    }

    pub fn s3_config(&self) -> S3Config {
        S3Config {
            bucket: self.bucket.clone(),
            endpoint: self.endpoint.clone(),
            region: self.region.clone(),
            access_key_id: self.access_key_id.clone(),
            secret_access_key: self.secret_access_key.clone(),
            session_token: self.session_token.clone(),
            force_path_style: self.force_path_style,
            on_missing: self.on_missing,
        }
    }

    pub fn gcs_config(&self) -> GcsConfig {
        GcsConfig {
            bucket: self.bucket.clone(),
            project_id: self.project_id.clone(),
            on_missing: self.on_missing,
        }
    }
}
