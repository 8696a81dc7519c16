use std::path::{Component, Path, PathBuf};

use bytes::Bytes;
use tokio::io::AsyncWriteExt;

use crate::error::StorageError;
use crate::{ByteStream, Storage, StorageUsage};

/// [`Storage`] implementation over a local (usually network-mounted) directory.
///
/// Cheap to clone; all state is the base path.
#[derive(Clone)]
pub struct LocalStorage {
    base: PathBuf,
    location: String,
}

impl LocalStorage {
    /// Create a storage rooted at `base`, creating the directory if needed.
    pub async fn new(base: impl Into<PathBuf>) -> Result<Self, StorageError> {
        let base = base.into();
        tokio::fs::create_dir_all(&base)
            .await
            .map_err(|e| StorageError::from_io(&base.to_string_lossy(), e))?;
        let location = base.to_string_lossy().into_owned();
        Ok(Self { base, location })
    }

    /// Validate a relative path and join it under the base directory.
    ///
    /// Absolute paths and `..` segments are rejected so no caller can escape
    /// the base.
    fn resolve(&self, path: &str) -> Result<PathBuf, StorageError> {
        let relative = Path::new(path);
        for component in relative.components() {
            match component {
                Component::Normal(_) | Component::CurDir => {}
                Component::ParentDir | Component::RootDir | Component::Prefix(_) => {
                    return Err(StorageError::InvalidPath(path.to_string()));
                }
            }
        }
        Ok(self.base.join(relative))
    }

    async fn ensure_parent(&self, full: &Path, path: &str) -> Result<(), StorageError> {
        if let Some(parent) = full.parent() {
            tokio::fs::create_dir_all(parent)
                .await
                .map_err(|e| StorageError::from_io(path, e))?;
        }
        Ok(())
    }
}

#[async_trait::async_trait]
impl Storage for LocalStorage {
    async fn read(&self, path: &str) -> Result<Bytes, StorageError> {
        let full = self.resolve(path)?;
        let contents = tokio::fs::read(&full)
            .await
            .map_err(|e| StorageError::from_io(path, e))?;
        Ok(Bytes::from(contents))
    }

    async fn open_reader(&self, path: &str) -> Result<ByteStream, StorageError> {
        let full = self.resolve(path)?;
        let file = tokio::fs::File::open(&full)
            .await
            .map_err(|e| StorageError::from_io(path, e))?;
        Ok(Box::pin(file))
    }

    async fn write(&self, path: &str, contents: Bytes) -> Result<(), StorageError> {
        let full = self.resolve(path)?;
        self.ensure_parent(&full, path).await?;
        tokio::fs::write(&full, &contents)
            .await
            .map_err(|e| StorageError::from_io(path, e))
    }

    async fn append(&self, path: &str, contents: Bytes) -> Result<(), StorageError> {
        let full = self.resolve(path)?;
        self.ensure_parent(&full, path).await?;
        let mut file = tokio::fs::OpenOptions::new()
            .append(true)
            .create(true)
            .open(&full)
            .await
            .map_err(|e| StorageError::from_io(path, e))?;
        file.write_all(&contents)
            .await
            .map_err(|e| StorageError::from_io(path, e))?;
        file.flush().await.map_err(|e| StorageError::from_io(path, e))
    }

    async fn delete(&self, path: &str) -> Result<(), StorageError> {
        let full = self.resolve(path)?;
        let meta = tokio::fs::metadata(&full)
            .await
            .map_err(|e| StorageError::from_io(path, e))?;
        if meta.is_dir() {
            tokio::fs::remove_dir_all(&full)
                .await
                .map_err(|e| StorageError::from_io(path, e))
        } else {
            tokio::fs::remove_file(&full)
                .await
                .map_err(|e| StorageError::from_io(path, e))
        }
    }

    async fn list(&self, path: &str) -> Result<Vec<String>, StorageError> {
        let full = self.resolve(path)?;
        let mut dir = tokio::fs::read_dir(&full)
            .await
            .map_err(|e| StorageError::from_io(path, e))?;
        let mut names = Vec::new();
        while let Some(entry) = dir
            .next_entry()
            .await
            .map_err(|e| StorageError::from_io(path, e))?
        {
            names.push(entry.file_name().to_string_lossy().into_owned());
        }
        names.sort();
        Ok(names)
    }

    async fn exists(&self, path: &str) -> Result<bool, StorageError> {
        let full = self.resolve(path)?;
        tokio::fs::try_exists(&full)
            .await
            .map_err(|e| StorageError::from_io(path, e))
    }

    async fn size(&self, path: &str) -> Result<u64, StorageError> {
        let full = self.resolve(path)?;
        let meta = tokio::fs::metadata(&full)
            .await
            .map_err(|e| StorageError::from_io(path, e))?;
        if meta.is_file() {
            return Ok(meta.len());
        }
        let owned_path = path.to_string();
        tokio::task::spawn_blocking(move || {
            let mut total = 0u64;
            for entry in walkdir::WalkDir::new(&full) {
                let entry = entry.map_err(|e| StorageError::Io(format!("{owned_path}: {e}")))?;
                if entry.file_type().is_file() {
                    let meta = entry
                        .metadata()
                        .map_err(|e| StorageError::Io(format!("{owned_path}: {e}")))?;
                    total += meta.len();
                }
            }
            Ok(total)
        })
        .await
        .map_err(|e| StorageError::Io(e.to_string()))?
    }

    async fn zip(&self, path: &str) -> Result<String, StorageError> {
        let source = self.resolve(path)?;
        let archive_rel = format!("{path}.zip");
        let archive_full = self.resolve(&archive_rel)?;
        self.ensure_parent(&archive_full, &archive_rel).await?;
        let owned_path = path.to_string();
        tokio::task::spawn_blocking(move || {
            let file = std::fs::File::create(&archive_full)
                .map_err(|e| StorageError::from_io(&owned_path, e))?;
            let mut writer = zip::ZipWriter::new(file);
            let options = zip::write::SimpleFileOptions::default()
                .compression_method(zip::CompressionMethod::Deflated);

            let meta = std::fs::metadata(&source)
                .map_err(|e| StorageError::from_io(&owned_path, e))?;
            if meta.is_file() {
                let name = source
                    .file_name()
                    .map(|n| n.to_string_lossy().into_owned())
                    .unwrap_or_else(|| owned_path.clone());
                writer
                    .start_file(name, options)
                    .map_err(|e| StorageError::Io(e.to_string()))?;
                let mut input = std::fs::File::open(&source)
                    .map_err(|e| StorageError::from_io(&owned_path, e))?;
                std::io::copy(&mut input, &mut writer)
                    .map_err(|e| StorageError::Io(e.to_string()))?;
            } else {
                for entry in walkdir::WalkDir::new(&source) {
                    let entry =
                        entry.map_err(|e| StorageError::Io(format!("{owned_path}: {e}")))?;
                    if !entry.file_type().is_file() {
                        continue;
                    }
                    let name = entry
                        .path()
                        .strip_prefix(&source)
                        .map_err(|e| StorageError::Io(e.to_string()))?
                        .to_string_lossy()
                        .into_owned();
                    writer
                        .start_file(name, options)
                        .map_err(|e| StorageError::Io(e.to_string()))?;
                    let mut input = std::fs::File::open(entry.path())
                        .map_err(|e| StorageError::from_io(&owned_path, e))?;
                    std::io::copy(&mut input, &mut writer)
                        .map_err(|e| StorageError::Io(e.to_string()))?;
                }
            }
            writer
                .finish()
                .map_err(|e| StorageError::Io(e.to_string()))?;
            Ok(())
        })
        .await
        .map_err(|e| StorageError::Io(e.to_string()))??;
        Ok(archive_rel)
    }

    async fn unzip(&self, archive: &str, dest: &str) -> Result<(), StorageError> {
        let archive_full = self.resolve(archive)?;
        let dest_full = self.resolve(dest)?;
        let owned_archive = archive.to_string();
        tokio::task::spawn_blocking(move || {
            let file = std::fs::File::open(&archive_full)
                .map_err(|e| StorageError::from_io(&owned_archive, e))?;
            let mut zip = zip::ZipArchive::new(file)
                .map_err(|e| StorageError::Io(e.to_string()))?;
            for i in 0..zip.len() {
                let mut entry = zip
                    .by_index(i)
                    .map_err(|e| StorageError::Io(e.to_string()))?;
                // Entries with traversal segments are skipped, same rule as resolve().
                let Some(relative) = entry.enclosed_name() else {
                    continue;
                };
                let out_path = dest_full.join(relative);
                if entry.is_dir() {
                    std::fs::create_dir_all(&out_path)
                        .map_err(|e| StorageError::from_io(&owned_archive, e))?;
                    continue;
                }
                if let Some(parent) = out_path.parent() {
                    std::fs::create_dir_all(parent)
                        .map_err(|e| StorageError::from_io(&owned_archive, e))?;
                }
                let mut out = std::fs::File::create(&out_path)
                    .map_err(|e| StorageError::from_io(&owned_archive, e))?;
                std::io::copy(&mut entry, &mut out)
                    .map_err(|e| StorageError::Io(e.to_string()))?;
            }
            Ok(())
        })
        .await
        .map_err(|e| StorageError::Io(e.to_string()))?
    }

    async fn rename(&self, from: &str, to: &str) -> Result<(), StorageError> {
        let from_full = self.resolve(from)?;
        let to_full = self.resolve(to)?;
        self.ensure_parent(&to_full, to).await?;
        tokio::fs::rename(&from_full, &to_full)
            .await
            .map_err(|e| StorageError::from_io(from, e))
    }

    async fn usage(&self) -> Result<StorageUsage, StorageError> {
        let base = self.base.clone();
        tokio::task::spawn_blocking(move || {
            let canonical = base.canonicalize().unwrap_or(base);
            let disks = sysinfo::Disks::new_with_refreshed_list();
            // Pick the disk with the longest mount point that contains the base.
            let mut best: Option<(usize, StorageUsage)> = None;
            for disk in disks.list() {
                let mount = disk.mount_point();
                if canonical.starts_with(mount) {
                    let depth = mount.components().count();
                    let usage = StorageUsage {
                        total_bytes: disk.total_space(),
                        free_bytes: disk.available_space(),
                    };
                    if best.as_ref().map(|(d, _)| depth > *d).unwrap_or(true) {
                        best = Some((depth, usage));
                    }
                }
            }
            best.map(|(_, usage)| usage)
                .ok_or_else(|| StorageError::Io("no disk found for storage base".into()))
        })
        .await
        .map_err(|e| StorageError::Io(e.to_string()))?
    }

    fn location(&self) -> &str {
        &self.location
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    async fn storage() -> (tempfile::TempDir, LocalStorage) {
        let dir = tempfile::tempdir().unwrap();
        let storage = LocalStorage::new(dir.path()).await.unwrap();
        (dir, storage)
    }

    #[tokio::test]
    async fn write_then_read_round_trips() {
        let (_dir, storage) = storage().await;
        storage
            .write("models/m1/model/config.json", Bytes::from_static(b"{}"))
            .await
            .unwrap();
        let read = storage.read("models/m1/model/config.json").await.unwrap();
        assert_eq!(read, Bytes::from_static(b"{}"));
    }

    #[tokio::test]
    async fn parent_traversal_is_rejected() {
        let (_dir, storage) = storage().await;
        let err = storage.read("../etc/passwd").await.unwrap_err();
        assert!(matches!(err, StorageError::InvalidPath(_)));
        let err = storage
            .write("data/../../escape", Bytes::from_static(b"x"))
            .await
            .unwrap_err();
        assert!(matches!(err, StorageError::InvalidPath(_)));
    }

    #[tokio::test]
    async fn absolute_paths_are_rejected() {
        let (_dir, storage) = storage().await;
        let err = storage.read("/etc/passwd").await.unwrap_err();
        assert!(matches!(err, StorageError::InvalidPath(_)));
    }

    #[tokio::test]
    async fn append_accumulates() {
        let (_dir, storage) = storage().await;
        storage
            .append("logs/audit.log", Bytes::from_static(b"one\n"))
            .await
            .unwrap();
        storage
            .append("logs/audit.log", Bytes::from_static(b"two\n"))
            .await
            .unwrap();
        let read = storage.read("logs/audit.log").await.unwrap();
        assert_eq!(read, Bytes::from_static(b"one\ntwo\n"));
    }

    #[tokio::test]
    async fn missing_path_is_not_found() {
        let (_dir, storage) = storage().await;
        assert!(matches!(
            storage.read("nope").await.unwrap_err(),
            StorageError::NotFound(_)
        ));
        assert!(matches!(
            storage.delete("nope").await.unwrap_err(),
            StorageError::NotFound(_)
        ));
        assert!(!storage.exists("nope").await.unwrap());
    }

    #[tokio::test]
    async fn list_returns_sorted_names() {
        let (_dir, storage) = storage().await;
        storage
            .write("uploads/u1/b.csv", Bytes::from_static(b"b"))
            .await
            .unwrap();
        storage
            .write("uploads/u1/a.csv", Bytes::from_static(b"a"))
            .await
            .unwrap();
        let names = storage.list("uploads/u1").await.unwrap();
        assert_eq!(names, vec!["a.csv".to_string(), "b.csv".to_string()]);
    }

    #[tokio::test]
    async fn size_of_directory_is_recursive() {
        let (_dir, storage) = storage().await;
        storage
            .write("data/m1/part1", Bytes::from_static(b"1234"))
            .await
            .unwrap();
        storage
            .write("data/m1/sub/part2", Bytes::from_static(b"56"))
            .await
            .unwrap();
        assert_eq!(storage.size("data/m1").await.unwrap(), 6);
        assert_eq!(storage.size("data/m1/part1").await.unwrap(), 4);
    }

    #[tokio::test]
    async fn zip_then_unzip_restores_tree() {
        let (_dir, storage) = storage().await;
        storage
            .write("models/m1/model/weights.bin", Bytes::from_static(b"wwww"))
            .await
            .unwrap();
        storage
            .write("models/m1/model/meta/info.json", Bytes::from_static(b"{}"))
            .await
            .unwrap();

        let archive = storage.zip("models/m1/model").await.unwrap();
        assert_eq!(archive, "models/m1/model.zip");
        assert!(storage.exists(&archive).await.unwrap());

        storage.unzip(&archive, "restore/m1").await.unwrap();
        assert_eq!(
            storage.read("restore/m1/weights.bin").await.unwrap(),
            Bytes::from_static(b"wwww")
        );
        assert_eq!(
            storage.read("restore/m1/meta/info.json").await.unwrap(),
            Bytes::from_static(b"{}")
        );
    }

    #[tokio::test]
    async fn rename_moves_subtree() {
        let (_dir, storage) = storage().await;
        storage
            .write("uploads/u1/docs/file.pdf", Bytes::from_static(b"pdf"))
            .await
            .unwrap();
        storage.rename("uploads/u1", "data/m9/u1").await.unwrap();
        assert!(!storage.exists("uploads/u1").await.unwrap());
        assert_eq!(
            storage.read("data/m9/u1/docs/file.pdf").await.unwrap(),
            Bytes::from_static(b"pdf")
        );
    }
}
