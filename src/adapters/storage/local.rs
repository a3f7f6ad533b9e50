use crate::domain::model::ObjectMeta;
use crate::domain::ports::ObjectStore;
use crate::utils::error::Result;
use chrono::{DateTime, Utc};
use std::path::{Path, PathBuf};

/// Raw zone on the local filesystem, for offline extraction runs.
#[derive(Debug, Clone)]
pub struct LocalObjectStore {
    base_path: PathBuf,
}

impl LocalObjectStore {
    pub fn new(base_path: impl Into<PathBuf>) -> Self {
        Self {
            base_path: base_path.into(),
        }
    }

    fn full_path(&self, name: &str) -> PathBuf {
        self.base_path.join(name)
    }

    fn object_name(&self, path: &Path) -> Option<String> {
        let relative = path.strip_prefix(&self.base_path).ok()?;
        Some(
            relative
                .components()
                .map(|c| c.as_os_str().to_string_lossy().into_owned())
                .collect::<Vec<_>>()
                .join("/"),
        )
    }
}

impl ObjectStore for LocalObjectStore {
    fn uri(&self, name: &str) -> String {
        self.full_path(name).to_string_lossy().into_owned()
    }

    fn name_from_uri(&self, uri: &str) -> Option<String> {
        self.object_name(Path::new(uri))
    }

    async fn put(&self, name: &str, data: Vec<u8>, _content_type: &str) -> Result<()> {
        let full_path = self.full_path(name);

        if let Some(parent) = full_path.parent() {
            tokio::fs::create_dir_all(parent).await?;
        }

        tokio::fs::write(full_path, data).await?;
        Ok(())
    }

    async fn get(&self, name: &str) -> Result<Vec<u8>> {
        Ok(tokio::fs::read(self.full_path(name)).await?)
    }

    async fn list(&self, prefix: &str) -> Result<Vec<ObjectMeta>> {
        let mut objects = Vec::new();
        if !tokio::fs::try_exists(&self.base_path).await? {
            return Ok(objects);
        }

        // 以堆疊走訪子目錄
        let mut pending = vec![self.base_path.clone()];
        while let Some(dir) = pending.pop() {
            let mut entries = tokio::fs::read_dir(&dir).await?;
            while let Some(entry) = entries.next_entry().await? {
                let path = entry.path();
                let metadata = entry.metadata().await?;

                if metadata.is_dir() {
                    pending.push(path);
                    continue;
                }

                let Some(name) = self.object_name(&path) else {
                    continue;
                };
                if name.starts_with(prefix) {
                    objects.push(ObjectMeta {
                        name,
                        updated_at: DateTime::<Utc>::from(metadata.modified()?),
                    });
                }
            }
        }
        Ok(objects)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[tokio::test]
    async fn test_put_get_and_list() {
        let temp_dir = TempDir::new().unwrap();
        let store = LocalObjectStore::new(temp_dir.path());

        store
            .put("raw/nfl/teams/2025-09-05_05-00-07.parquet", b"PAR1".to_vec(), "")
            .await
            .unwrap();
        store
            .put("raw/nfl/rosters/2025-09-05_05-00-07.parquet", b"PAR1".to_vec(), "")
            .await
            .unwrap();

        let listed = store.list("raw/nfl/teams/").await.unwrap();
        assert_eq!(listed.len(), 1);
        assert_eq!(listed[0].name, "raw/nfl/teams/2025-09-05_05-00-07.parquet");

        let uri = store.uri(&listed[0].name);
        assert!(Path::new(&uri).exists());
        assert_eq!(store.name_from_uri(&uri).unwrap(), listed[0].name);
        assert_eq!(store.get(&listed[0].name).await.unwrap(), b"PAR1".to_vec());
    }

    #[tokio::test]
    async fn test_list_on_missing_root_is_empty() {
        let temp_dir = TempDir::new().unwrap();
        let store = LocalObjectStore::new(temp_dir.path().join("not-created"));
        assert!(store.list("raw/").await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_list_walks_nested_partitions() {
        let temp_dir = TempDir::new().unwrap();
        let store = LocalObjectStore::new(temp_dir.path());

        for name in [
            "raw/nfl/pbp/season=2024/week=1/2025-01-02_00-00-00.parquet",
            "raw/nfl/pbp/season=2025/week=3/2025-09-20_00-00-00.parquet",
            "raw/nfl/pbp_participation/2025-09-20_00-00-00.parquet",
        ] {
            store.put(name, b"PAR1".to_vec(), "").await.unwrap();
        }

        let mut names: Vec<_> = store
            .list("raw/nfl/pbp/")
            .await
            .unwrap()
            .into_iter()
            .map(|o| o.name)
            .collect();
        names.sort();
        assert_eq!(
            names,
            vec![
                "raw/nfl/pbp/season=2024/week=1/2025-01-02_00-00-00.parquet",
                "raw/nfl/pbp/season=2025/week=3/2025-09-20_00-00-00.parquet",
            ]
        );
    }
}
