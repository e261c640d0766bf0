//! Backend selector / 后端选择器
//!
//! Pure dispatch: an explicit protocol string wins, otherwise the presence of
//! the Google credentials-path variable picks GCS, else S3. First matching
//! condition wins, no fallback chaining.

use super::gcs::GcsStore;
use super::s3::S3Store;
use super::ObjectStore;
use crate::config::StoreConfig;
use crate::error::{Result, StoreError};

/// Credentials-path environment signal used to pick GCS / GCS凭证环境变量
pub const GOOGLE_CREDENTIALS_ENV: &str = "GOOGLE_APPLICATION_CREDENTIALS";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Protocol {
    S3,
    Gcs,
}

/// Decide which backend to build; pure so it is testable without env mutation.
pub fn resolve_protocol(explicit: Option<&str>, has_google_credentials: bool) -> Result<Protocol> {
    match explicit {
        Some("gcs") => Ok(Protocol::Gcs),
        Some("s3") | Some("minio") => Ok(Protocol::S3),
        Some(other) => Err(StoreError::Config(format!(
            "unknown storage protocol: {}",
            other
        ))),
        None if has_google_credentials => Ok(Protocol::Gcs),
        None => Ok(Protocol::S3),
    }
}

/// Build the selected backend and make sure its bucket exists / 初始化对象存储
pub async fn init_object_store(config: &StoreConfig) -> Result<Box<dyn ObjectStore>> {
    let has_google_credentials = std::env::var_os(GOOGLE_CREDENTIALS_ENV).is_some();
    let protocol = resolve_protocol(config.protocol.as_deref(), has_google_credentials)?;

    let store: Box<dyn ObjectStore> = match protocol {
        Protocol::Gcs => Box::new(GcsStore::new(config.gcs_config()).await?),
        Protocol::S3 => Box::new(S3Store::new(config.s3_config())?),
    };

    tracing::info!(
        "object store initialized: {} (bucket '{}')",
        store.name(),
        store.bucket_name()
    );
    store.ensure_bucket().await?;
    Ok(store)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_explicit_protocol_wins() {
        assert_eq!(resolve_protocol(Some("gcs"), false).unwrap(), Protocol::Gcs);
        assert_eq!(resolve_protocol(Some("s3"), true).unwrap(), Protocol::S3);
        assert_eq!(resolve_protocol(Some("minio"), true).unwrap(), Protocol::S3);
    }

    #[test]
    fn test_env_signal_picks_gcs() {
        assert_eq!(resolve_protocol(None, true).unwrap(), Protocol::Gcs);
        assert_eq!(resolve_protocol(None, false).unwrap(), Protocol::S3);
    }

    #[test]
    fn test_unknown_protocol_errors() {
        let err = resolve_protocol(Some("ftp"), false).unwrap_err();
        assert!(matches!(err, StoreError::Config(_)));
    }
}
