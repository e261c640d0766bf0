//! GCS后端配置
//!
//! Credentials are resolved by the SDK from the ambient environment
//! (GOOGLE_APPLICATION_CREDENTIALS, metadata server), not from this struct.

use serde::{Deserialize, Serialize};

use crate::store::NotFoundPolicy;

/// GCS配置
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct GcsConfig {
    /// 存储桶名称
    pub bucket: String,
    /// GCP project owning the bucket; required for bucket create/list only
    #[serde(default)]
    pub project_id: String,
    /// Missing-object behavior for the convenience readers
    #[serde(default)]
    pub on_missing: NotFoundPolicy,
}
