//! Abstract object-storage contract / 对象存储抽象接口
//!
//! The trait provides only primitive operations per backend; everything that
//! can be expressed over those primitives (directory upload, bulk delete,
//! JSON/CSV convenience marshalling) is implemented once as default methods.

use std::collections::HashMap;
use std::io::Cursor;
use std::path::Path;
use std::sync::Arc;

use async_trait::async_trait;
use bytes::Bytes;
use polars::prelude::{
    CsvReadOptions, CsvWriter, DataFrame, DataType, Schema, SerReader, SerWriter,
};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use tokio::io::{AsyncRead, AsyncReadExt};

use crate::error::{Result, StoreError};

pub mod factory;
pub mod gcs;
pub mod s3;

pub use factory::init_object_store;
pub use gcs::GcsStore;
pub use s3::S3Store;

/// Byte stream handed in and out of the primitive operations / 字节流类型
pub type ByteStream = Box<dyn AsyncRead + Send + Unpin>;

/// What the convenience readers (`get_json`, `get_df`) do when the object is
/// missing. Raw `get`/`download` always propagate NotFound regardless.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum NotFoundPolicy {
    /// Log a warning and return an empty map / absent dataframe
    #[default]
    ReturnEmpty,
    /// Surface the NotFound error to the caller
    Propagate,
}

/// Object storage interface (provides only primitive operations) / 存储接口
#[async_trait]
pub trait ObjectStore: Send + Sync {
    /// Backend display name / 后端名称
    fn name(&self) -> &str;

    /// The bucket this handle is bound to / 绑定的存储桶
    fn bucket_name(&self) -> &str;

    fn not_found_policy(&self) -> NotFoundPolicy {
        NotFoundPolicy::ReturnEmpty
    }

    async fn create_bucket(&self, name: &str) -> Result<()>;

    async fn bucket_exists(&self, name: &str) -> Result<bool>;

    async fn list_buckets(&self) -> Result<Vec<String>>;

    /// List object names under `prefix` / 列出对象名称
    ///
    /// Non-recursive mode collapses everything past one `/` beyond the prefix
    /// into a single directory-style entry; recursive mode returns every
    /// matching key.
    async fn list_objects(&self, prefix: Option<&str>, recursive: bool) -> Result<Vec<String>>;

    /// Upload from a stream / 从流上传对象
    ///
    /// When `length` is `None` the implementation buffers the stream to
    /// determine the size before the transfer.
    async fn put(
        &self,
        name: &str,
        data: ByteStream,
        length: Option<u64>,
        content_type: &str,
    ) -> Result<()>;

    /// Open a reader over the object's content / 读取对象内容
    ///
    /// Fails with [`StoreError::NotFound`] when the object is absent. The
    /// caller owns the reader and must drain or drop it.
    async fn get(&self, name: &str) -> Result<ByteStream>;

    /// `false` only when the object is genuinely absent; any other backend
    /// failure (auth, network) propagates instead of masquerading as "missing".
    async fn exists(&self, name: &str) -> Result<bool>;

    async fn remove_object(&self, name: &str) -> Result<()>;

    /// Download object content to a local file / 下载对象到本地文件
    async fn download(&self, name: &str, local_path: &Path) -> Result<()>;

    /// Verify the bucket exists, creating it when absent / 确保存储桶存在
    ///
    /// Construction is side-effect-free; callers (or the factory) invoke this
    /// once after building the store.
    async fn ensure_bucket(&self) -> Result<()> {
        if self.bucket_exists(self.bucket_name()).await? {
            tracing::info!("bucket '{}' exists", self.bucket_name());
        } else {
            tracing::warn!("bucket '{}' does not exist, creating it", self.bucket_name());
            self.create_bucket(self.bucket_name()).await?;
        }
        Ok(())
    }

    /// Upload a local file or directory / 上传本地文件或目录
    ///
    /// A directory is walked recursively; remote keys mirror the relative
    /// local path under `name`. Entries whose file name appears in
    /// `exclude_files` are skipped (files and subdirectories alike).
    async fn fput(&self, name: &str, local_path: &Path, exclude_files: &[String]) -> Result<()> {
        let metadata = tokio::fs::metadata(local_path).await?;
        if !metadata.is_dir() {
            return self.fput_file(name, local_path).await;
        }

        let mut pending = vec![(
            local_path.to_path_buf(),
            name.trim_end_matches('/').to_string(),
        )];
        while let Some((dir, remote_prefix)) = pending.pop() {
            let mut entries = tokio::fs::read_dir(&dir).await?;
            while let Some(entry) = entries.next_entry().await? {
                let file_name = entry.file_name().to_string_lossy().into_owned();
                if exclude_files.contains(&file_name) {
                    tracing::info!("exclude: {}", entry.path().display());
                    continue;
                }
                let remote_path = join_remote(&remote_prefix, &file_name);
                if entry.file_type().await?.is_dir() {
                    pending.push((entry.path(), remote_path));
                } else {
                    self.fput_file(&remote_path, &entry.path()).await?;
                }
            }
        }
        Ok(())
    }

    /// Upload a single local file, guessing the content type from the
    /// extension / 上传单个文件
    async fn fput_file(&self, name: &str, local_path: &Path) -> Result<()> {
        let mime = mime_guess::from_path(local_path).first_or_octet_stream();
        let file = tokio::fs::File::open(local_path).await?;
        let length = file.metadata().await?.len();
        self.put(name, Box::new(file), Some(length), mime.essence_str())
            .await
    }

    /// Drain the object's content into memory, releasing the reader / 读取全部内容
    async fn get_bytes(&self, name: &str) -> Result<Vec<u8>> {
        let mut reader = self.get(name).await?;
        let mut buf = Vec::new();
        reader.read_to_end(&mut buf).await?;
        Ok(buf)
    }

    /// Best-effort bulk removal: failures are logged per item and the loop
    /// continues / 批量删除对象
    async fn remove_objects(&self, names: &[String]) -> Result<()> {
        for name in names {
            if let Err(e) = self.remove_object(name).await {
                tracing::warn!("{} deletion error: {}", name, e);
            }
        }
        Ok(())
    }

    /// Remove every object under `prefix` / 删除前缀下所有对象
    async fn remove_dir(&self, prefix: &str) -> Result<()> {
        tracing::warn!("removing {}", prefix);
        let objects = self.list_objects(Some(prefix), true).await?;
        tracing::warn!("removing: {:?}", objects);
        self.remove_objects(&objects).await
    }

    /// JSON-encode a mapping and upload it / 上传JSON对象
    async fn put_as_json(&self, name: &str, data: &Map<String, Value>) -> Result<()> {
        let bytes = serde_json::to_vec(data)?;
        let length = bytes.len() as u64;
        self.put(
            name,
            Box::new(Cursor::new(bytes)),
            Some(length),
            "application/json",
        )
        .await
    }

    /// Fetch and decode a JSON mapping / 获取JSON对象
    ///
    /// A missing object yields an empty map under
    /// [`NotFoundPolicy::ReturnEmpty`], otherwise the NotFound surfaces.
    async fn get_json(&self, name: &str) -> Result<Map<String, Value>> {
        let data = match self.get_bytes(name).await {
            Err(StoreError::NotFound(_))
                if self.not_found_policy() == NotFoundPolicy::ReturnEmpty =>
            {
                tracing::warn!("{} not found, returning empty json", name);
                return Ok(Map::new());
            }
            other => other?,
        };
        Ok(serde_json::from_slice(&data)?)
    }

    /// CSV-serialize a dataframe and upload it / 上传DataFrame为CSV对象
    async fn upload_df(&self, name: &str, data: &mut DataFrame) -> Result<()> {
        let mut buf = Vec::new();
        CsvWriter::new(&mut buf).include_header(true).finish(data)?;
        let length = buf.len() as u64;
        self.put(
            name,
            Box::new(Cursor::new(buf)),
            Some(length),
            "application/csv",
        )
        .await
    }

    /// Fetch a CSV object as a dataframe / 获取CSV对象为DataFrame
    ///
    /// `column_types` overrides per-column dtypes; `date_columns` are parsed
    /// as [`DataType::Date`]. A missing object yields `None` under
    /// [`NotFoundPolicy::ReturnEmpty`]; parse errors propagate.
    async fn get_df(
        &self,
        name: &str,
        column_types: &HashMap<String, DataType>,
        date_columns: &[String],
    ) -> Result<Option<DataFrame>> {
        let data = match self.get_bytes(name).await {
            Err(StoreError::NotFound(_))
                if self.not_found_policy() == NotFoundPolicy::ReturnEmpty =>
            {
                tracing::warn!("{} not found, returning no dataframe", name);
                return Ok(None);
            }
            other => other?,
        };
        Ok(Some(read_csv_frame(data, column_types, date_columns)?))
    }

    /// Parse caller-supplied CSV bytes (an uploaded file) into a dataframe.
    /// Any parse failure is logged and degrades to `None`.
    async fn fget_df(
        &self,
        data: Bytes,
        column_types: &HashMap<String, DataType>,
        date_columns: &[String],
    ) -> Result<Option<DataFrame>> {
        match read_csv_frame(data.to_vec(), column_types, date_columns) {
            Ok(df) => Ok(Some(df)),
            Err(e) => {
                tracing::warn!("unable to read csv: {}", e);
                Ok(None)
            }
        }
    }
}

/// Join a remote key under a prefix; an empty prefix must not produce a
/// leading slash / 拼接对象键
fn join_remote(prefix: &str, file_name: &str) -> String {
    if prefix.is_empty() {
        file_name.to_string()
    } else {
        format!("{}/{}", prefix, file_name)
    }
}

/// Parse CSV bytes with dtype overrides and date columns / 解析CSV字节
fn read_csv_frame(
    data: Vec<u8>,
    column_types: &HashMap<String, DataType>,
    date_columns: &[String],
) -> Result<DataFrame> {
    let mut overrides = Schema::new();
    for (column, dtype) in column_types {
        overrides.with_column(column.as_str().into(), dtype.clone());
    }
    for column in date_columns {
        overrides.with_column(column.as_str().into(), DataType::Date);
    }
    let schema_overwrite = if overrides.is_empty() {
        None
    } else {
        Some(Arc::new(overrides))
    };

    let df = CsvReadOptions::default()
        .with_has_header(true)
        .with_schema_overwrite(schema_overwrite)
        .into_reader_with_file_handle(Cursor::new(data))
        .finish()?;
    Ok(df)
}
