use async_trait::async_trait;
use tokio::io::AsyncWriteExt;

pub type StorageError = Box<dyn std::error::Error + Send + Sync>;

/// 对象存储的能力接口，上传返回可公开访问的URL
#[async_trait]
pub trait ObjectStore: Send + Sync {
    async fn put(&self, key: &str, bytes: &[u8], content_type: &str) -> Result<String, StorageError>;
    async fn delete(&self, key: &str) -> Result<(), StorageError>;
}

/// 本地文件系统实现，URL为站点地址下的/uploads/前缀
pub struct FsObjectStore {
    root: std::path::PathBuf,
    public_base: String,
}

impl FsObjectStore {
    pub fn new(root: impl Into<std::path::PathBuf>, site_url: &str) -> Self {
        Self {
            root: root.into(),
            public_base: format!("{}/uploads", site_url.trim_end_matches('/')),
        }
    }
}

#[async_trait]
impl ObjectStore for FsObjectStore {
    async fn put(
        &self,
        key: &str,
        bytes: &[u8],
        _content_type: &str,
    ) -> Result<String, StorageError> {
        let path = self.root.join(key);
        if let Some(parent) = path.parent() {
            tokio::fs::create_dir_all(parent).await?;
        }
        let mut file = tokio::fs::File::create(&path).await?;
        file.write_all(bytes).await?;
        file.flush().await?;
        Ok(format!("{}/{}", self.public_base, key))
    }

    async fn delete(&self, key: &str) -> Result<(), StorageError> {
        let path = self.root.join(key);
        match tokio::fs::remove_file(&path).await {
            Ok(()) => Ok(()),
            // 文件已不存在视为删除成功
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(e.into()),
        }
    }
}

/// 上传文件的存储键：日期目录加随机文件名，保留扩展名
pub fn storage_key_for(filename: &str) -> String {
    let ext = std::path::Path::new(filename)
        .extension()
        .and_then(|e| e.to_str())
        .unwrap_or("bin");
    let date = chrono::Utc::now().format("%Y/%m");
    format!("{}/{}.{}", date, uuid::Uuid::new_v4(), ext)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn storage_key_keeps_extension() {
        let key = storage_key_for("photo.JPG");
        assert!(key.ends_with(".JPG"));
        let key = storage_key_for("no-extension");
        assert!(key.ends_with(".bin"));
    }

    #[tokio::test]
    async fn fs_store_round_trip() {
        let dir = std::env::temp_dir().join(format!("cms-store-{}", uuid::Uuid::new_v4()));
        let store = FsObjectStore::new(&dir, "http://b.example/");
        let url = store.put("2024/01/a.txt", b"hello", "text/plain").await.unwrap();
        assert_eq!(url, "http://b.example/uploads/2024/01/a.txt");
        let data = tokio::fs::read(dir.join("2024/01/a.txt")).await.unwrap();
        assert_eq!(data, b"hello");
        store.delete("2024/01/a.txt").await.unwrap();
        // 重复删除不报错
        store.delete("2024/01/a.txt").await.unwrap();
        tokio::fs::remove_dir_all(&dir).await.ok();
    }
}
