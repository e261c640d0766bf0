//! Storage error types / 存储错误类型
//!
//! NotFound is kept separate from every other backend failure so that
//! `exists` and the degrade-to-empty readers never swallow auth or
//! network errors.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum StoreError {
    /// Object or bucket absent / 对象或存储桶不存在
    #[error("not found: {0}")]
    NotFound(String),

    /// Local file I/O (fput/download) / 本地文件读写错误
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    /// CSV serialization or parsing / CSV序列化或解析错误
    #[error("csv error: {0}")]
    Csv(#[from] polars::prelude::PolarsError),

    /// JSON encode/decode / JSON编解码错误
    #[error("json error: {0}")]
    Json(#[from] serde_json::Error),

    /// Invalid configuration or selector input / 配置错误
    #[error("config error: {0}")]
    Config(String),

    /// Any other vendor-SDK failure, propagated untouched (no retry here)
    #[error("storage backend error: {0}")]
    Backend(String),
}

impl StoreError {
    pub fn is_not_found(&self) -> bool {
        matches!(self, StoreError::NotFound(_))
    }
}

pub type Result<T> = std::result::Result<T, StoreError>;
