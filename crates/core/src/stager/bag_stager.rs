//! BagIt package stager.

use async_trait::async_trait;
use md5::Context as Md5Context;
use sha2::{Digest, Sha256};
use std::path::{Component, Path, PathBuf};
use std::time::Instant;
use tokio::fs::{self, File};
use tokio::io::{AsyncReadExt, AsyncWriteExt, BufReader, BufWriter};
use tracing::{debug, warn};

use super::config::{ChecksumAlgorithm, StagerConfig};
use super::error::StagingError;
use super::traits::Stager;
use super::types::{StagedPackage, StagingJob};

/// BagIt version written to `bagit.txt`.
pub const BAGIT_VERSION: &str = "0.97";

/// Stages packages as BagIt bags on the local filesystem.
pub struct BagStager {
    config: StagerConfig,
}

enum Hasher {
    Sha256(Sha256),
    Md5(Md5Context),
}

impl Hasher {
    fn new(algorithm: ChecksumAlgorithm) -> Self {
        match algorithm {
            ChecksumAlgorithm::Sha256 => Self::Sha256(Sha256::new()),
            ChecksumAlgorithm::Md5 => Self::Md5(Md5Context::new()),
        }
    }

    fn update(&mut self, data: &[u8]) {
        match self {
            Self::Sha256(h) => h.update(data),
            Self::Md5(h) => h.consume(data),
        }
    }

    fn finalize(self) -> String {
        match self {
            Self::Sha256(h) => format!("{:x}", h.finalize()),
            Self::Md5(h) => format!("{:x}", h.compute()),
        }
    }
}

/// A payload file, relative to the source package root.
struct PayloadFile {
    relative: PathBuf,
    absolute: PathBuf,
}

impl BagStager {
    /// Creates a new stager with the given configuration.
    pub fn new(config: StagerConfig) -> Self {
        Self { config }
    }

    /// Creates a stager with default configuration.
    pub fn with_defaults() -> Self {
        Self::new(StagerConfig::default())
    }

    fn check_component_id(component_id: &str) -> Result<(), StagingError> {
        let invalid = |reason: &str| StagingError::InvalidComponentId {
            component_id: component_id.to_string(),
            reason: reason.to_string(),
        };

        if component_id.trim().is_empty() {
            return Err(invalid("component id is empty"));
        }
        let mut components = Path::new(component_id).components();
        match (components.next(), components.next()) {
            (Some(Component::Normal(_)), None) => Ok(()),
            _ => Err(invalid("component id must be a single path segment")),
        }
    }

    /// Lists regular files under `root`, sorted by relative path.
    async fn collect_payload(root: &Path) -> Result<Vec<PayloadFile>, StagingError> {
        let mut files = Vec::new();
        let mut pending = vec![root.to_path_buf()];

        while let Some(dir) = pending.pop() {
            let mut entries = fs::read_dir(&dir)
                .await
                .map_err(|e| StagingError::from_io(&dir, e))?;
            while let Some(entry) = entries
                .next_entry()
                .await
                .map_err(|e| StagingError::from_io(&dir, e))?
            {
                let path = entry.path();
                let mut file_type = entry
                    .file_type()
                    .await
                    .map_err(|e| StagingError::from_io(&path, e))?;

                if file_type.is_symlink() {
                    file_type = match fs::metadata(&path).await {
                        Ok(target) if target.is_file() => target.file_type(),
                        Ok(_) => {
                            return Err(StagingError::UnsupportedEntry {
                                path,
                                reason: "symbolic link to a non-regular file",
                            })
                        }
                        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                            return Err(StagingError::UnsupportedEntry {
                                path,
                                reason: "broken symbolic link",
                            })
                        }
                        Err(e) => return Err(StagingError::from_io(&path, e)),
                    };
                }

                if file_type.is_dir() {
                    pending.push(path);
                } else if file_type.is_file() {
                    let relative = path
                        .strip_prefix(root)
                        .map(Path::to_path_buf)
                        .unwrap_or_else(|_| path.clone());
                    files.push(PayloadFile {
                        relative,
                        absolute: path,
                    });
                } else {
                    return Err(StagingError::UnsupportedEntry {
                        path,
                        reason: "not a regular file or directory",
                    });
                }
            }
        }

        files.sort_by(|a, b| a.relative.cmp(&b.relative));
        Ok(files)
    }

    /// Copies a file, hashing its contents on the way.
    async fn copy_file(
        &self,
        source: &Path,
        destination: &Path,
    ) -> Result<(u64, String), StagingError> {
        let source_file = File::open(source)
            .await
            .map_err(|e| StagingError::from_io(source, e))?;
        let dest_file = File::create(destination)
            .await
            .map_err(|e| StagingError::copy_failed(source, destination, e))?;

        let mut reader = BufReader::with_capacity(self.config.buffer_size, source_file);
        let mut writer = BufWriter::with_capacity(self.config.buffer_size, dest_file);
        let mut hasher = Hasher::new(self.config.checksum);
        let mut buffer = vec![0u8; self.config.buffer_size];
        let mut total_bytes = 0u64;

        loop {
            let bytes_read = reader
                .read(&mut buffer)
                .await
                .map_err(|e| StagingError::copy_failed(source, destination, e))?;
            if bytes_read == 0 {
                break;
            }
            hasher.update(&buffer[..bytes_read]);
            writer
                .write_all(&buffer[..bytes_read])
                .await
                .map_err(|e| StagingError::copy_failed(source, destination, e))?;
            total_bytes += bytes_read as u64;
        }

        writer
            .flush()
            .await
            .map_err(|e| StagingError::copy_failed(source, destination, e))?;

        Ok((total_bytes, hasher.finalize()))
    }

    /// Writes a tag file and returns its checksum.
    async fn write_tag_file(&self, path: &Path, contents: &str) -> Result<String, StagingError> {
        fs::write(path, contents.as_bytes())
            .await
            .map_err(|e| StagingError::from_io(path, e))?;
        let mut hasher = Hasher::new(self.config.checksum);
        hasher.update(contents.as_bytes());
        Ok(hasher.finalize())
    }

    fn bag_info(&self, job: &StagingJob, total_bytes: u64, files: usize) -> String {
        let mut lines: Vec<(String, String)> = job
            .transfer_info
            .fields()
            .iter()
            .map(|(k, v)| (k.clone(), v.clone()))
            .collect();
        lines.push((
            "Bagging-Date".to_string(),
            chrono::Local::now().format("%Y-%m-%d").to_string(),
        ));
        lines.push(("Payload-Oxum".to_string(), format!("{}.{}", total_bytes, files)));
        lines.push(("nyu-dl-component-id".to_string(), job.component_id.clone()));
        lines.push((
            "nyu-dl-archival-object-uri".to_string(),
            job.archival_object_uri.clone(),
        ));
        lines.push(("nyu-dl-partner-code".to_string(), job.partner_code.clone()));
        lines.push(("nyu-dl-resource-code".to_string(), job.resource_code.clone()));

        lines
            .into_iter()
            .map(|(k, v)| format!("{}: {}\n", k, v))
            .collect()
    }

    async fn build_bag(
        &self,
        job: &StagingJob,
        payload: &[PayloadFile],
        target: &Path,
    ) -> Result<(usize, u64), StagingError> {
        let data_dir = target.join("data");
        let mut manifest = String::new();
        let mut total_bytes = 0u64;

        for file in payload {
            let destination = data_dir.join(&file.relative);
            if let Some(parent) = destination.parent() {
                fs::create_dir_all(parent)
                    .await
                    .map_err(|e| StagingError::from_io(parent, e))?;
            }

            let (bytes, checksum) = self.copy_file(&file.absolute, &destination).await?;
            total_bytes += bytes;
            manifest.push_str(&format!(
                "{}  data/{}\n",
                checksum,
                manifest_path(&file.relative)
            ));
        }

        let algorithm = self.config.checksum.name();
        let bagit = format!(
            "BagIt-Version: {}\nTag-File-Character-Encoding: UTF-8\n",
            BAGIT_VERSION
        );
        let bag_info = self.bag_info(job, total_bytes, payload.len());
        let manifest_name = format!("manifest-{}.txt", algorithm);

        let mut tag_manifest = String::new();
        for (name, contents) in [
            ("bagit.txt", bagit.as_str()),
            ("bag-info.txt", bag_info.as_str()),
            (manifest_name.as_str(), manifest.as_str()),
        ] {
            let checksum = self.write_tag_file(&target.join(name), contents).await?;
            tag_manifest.push_str(&format!("{}  {}\n", checksum, name));
        }
        self.write_tag_file(
            &target.join(format!("tagmanifest-{}.txt", algorithm)),
            &tag_manifest,
        )
        .await?;

        Ok((payload.len(), total_bytes))
    }
}

/// Manifest paths always use forward slashes.
fn manifest_path(relative: &Path) -> String {
    relative
        .components()
        .map(|c| c.as_os_str().to_string_lossy())
        .collect::<Vec<_>>()
        .join("/")
}

#[async_trait]
impl Stager for BagStager {
    fn name(&self) -> &str {
        "bagit"
    }

    async fn stage(&self, job: &StagingJob) -> Result<StagedPackage, StagingError> {
        let start = Instant::now();
        Self::check_component_id(&job.component_id)?;

        let source = job.source_dir();
        let metadata = match fs::metadata(&source).await {
            Ok(m) => m,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                return Err(StagingError::SourceNotFound { path: source });
            }
            Err(e) => return Err(StagingError::from_io(&source, e)),
        };
        if !metadata.is_dir() {
            return Err(StagingError::SourceNotDirectory { path: source });
        }

        let payload = Self::collect_payload(&source).await?;
        if payload.is_empty() {
            return Err(StagingError::EmptyPackage { path: source });
        }

        fs::create_dir_all(&job.staging_root)
            .await
            .map_err(|e| StagingError::from_io(&job.staging_root, e))?;
        // A single create_dir claims the target; a second row with the same
        // component id gets AlreadyStaged.
        let target = job.target_dir();
        match fs::create_dir(&target).await {
            Ok(()) => {}
            Err(e) if e.kind() == std::io::ErrorKind::AlreadyExists => {
                return Err(StagingError::AlreadyStaged { path: target });
            }
            Err(e) => return Err(StagingError::from_io(&target, e)),
        }

        debug!(
            component_id = %job.component_id,
            files = payload.len(),
            target = %target.display(),
            "Building bag"
        );

        match self.build_bag(job, &payload, &target).await {
            Ok((files, total_bytes)) => Ok(StagedPackage {
                component_id: job.component_id.clone(),
                path: target,
                files,
                total_bytes,
                checksum: self.config.checksum,
                duration_ms: start.elapsed().as_millis() as u64,
            }),
            Err(e) => {
                if let Err(cleanup) = fs::remove_dir_all(&target).await {
                    warn!(
                        target = %target.display(),
                        error = %cleanup,
                        "Failed to remove partial package"
                    );
                }
                Err(e)
            }
        }
    }

    async fn validate(&self, staging_root: &Path) -> Result<(), StagingError> {
        let metadata = fs::metadata(staging_root)
            .await
            .map_err(|e| StagingError::from_io(staging_root, e))?;
        if !metadata.is_dir() {
            return Err(StagingError::Io {
                path: staging_root.to_path_buf(),
                source: std::io::Error::new(
                    std::io::ErrorKind::NotADirectory,
                    "staging location is not a directory",
                ),
            });
        }
        if metadata.permissions().readonly() {
            return Err(StagingError::PermissionDenied {
                path: staging_root.to_path_buf(),
            });
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::workorder::TransferInfo;
    use std::sync::Arc;
    use tempfile::TempDir;

    struct Dirs {
        source: TempDir,
        staging: TempDir,
    }

    fn dirs() -> Dirs {
        Dirs {
            source: TempDir::new().unwrap(),
            staging: TempDir::new().unwrap(),
        }
    }

    fn job(dirs: &Dirs, component_id: &str) -> StagingJob {
        StagingJob {
            row_index: 0,
            component_id: component_id.to_string(),
            archival_object_uri: "/repositories/2/archival_objects/100".to_string(),
            source_root: dirs.source.path().to_path_buf(),
            staging_root: dirs.staging.path().to_path_buf(),
            partner_code: "fales".to_string(),
            resource_code: "mss318".to_string(),
            transfer_info: Arc::new(TransferInfo::from_fields([
                ("Source-Organization", "NYU Libraries"),
                ("nyu-dl-resource-id", "1234"),
            ])),
        }
    }

    fn write_package(dirs: &Dirs, component_id: &str) {
        let package = dirs.source.path().join(component_id);
        std::fs::create_dir_all(package.join("aux")).unwrap();
        std::fs::write(package.join("page_0001.tif"), b"hello").unwrap();
        std::fs::write(package.join("aux").join("target.jpg"), b"world!").unwrap();
    }

    #[tokio::test]
    async fn test_stage_builds_bag() {
        let dirs = dirs();
        write_package(&dirs, "ABC123");
        let stager = BagStager::with_defaults();

        let package = stager.stage(&job(&dirs, "ABC123")).await.unwrap();
        assert_eq!(package.files, 2);
        assert_eq!(package.total_bytes, 11);

        let bag = dirs.staging.path().join("ABC123");
        assert!(bag.join("data/page_0001.tif").exists());
        assert!(bag.join("data/aux/target.jpg").exists());

        let manifest = std::fs::read_to_string(bag.join("manifest-sha256.txt")).unwrap();
        let lines: Vec<&str> = manifest.lines().collect();
        assert_eq!(lines.len(), 2);
        // sha256("world!")
        assert!(lines[0].ends_with("  data/aux/target.jpg"));
        // sha256("hello")
        assert_eq!(
            lines[1],
            "2cf24dba5fb0a30e26e83b2ac5b9e29e1b161e5c1fa7425e73043362938b9824  data/page_0001.tif"
        );

        let bag_info = std::fs::read_to_string(bag.join("bag-info.txt")).unwrap();
        assert!(bag_info.starts_with("Source-Organization: NYU Libraries\n"));
        assert!(bag_info.contains("Payload-Oxum: 11.2\n"));
        assert!(bag_info.contains("nyu-dl-component-id: ABC123\n"));

        let tag_manifest = std::fs::read_to_string(bag.join("tagmanifest-sha256.txt")).unwrap();
        assert_eq!(tag_manifest.lines().count(), 3);
    }

    #[tokio::test]
    async fn test_stage_md5_manifest() {
        let dirs = dirs();
        write_package(&dirs, "ABC123");
        let stager = BagStager::new(StagerConfig::default().with_checksum(ChecksumAlgorithm::Md5));

        stager.stage(&job(&dirs, "ABC123")).await.unwrap();
        let manifest =
            std::fs::read_to_string(dirs.staging.path().join("ABC123/manifest-md5.txt")).unwrap();
        assert!(manifest.contains("5d41402abc4b2a76b9719d911017c592  data/page_0001.tif"));
    }

    #[tokio::test]
    async fn test_missing_source_package() {
        let dirs = dirs();
        let err = BagStager::with_defaults()
            .stage(&job(&dirs, "NOPE"))
            .await
            .unwrap_err();
        assert!(matches!(err, StagingError::SourceNotFound { .. }));
    }

    #[tokio::test]
    async fn test_empty_source_package() {
        let dirs = dirs();
        std::fs::create_dir(dirs.source.path().join("EMPTY")).unwrap();
        let err = BagStager::with_defaults()
            .stage(&job(&dirs, "EMPTY"))
            .await
            .unwrap_err();
        assert!(matches!(err, StagingError::EmptyPackage { .. }));
        assert!(!dirs.staging.path().join("EMPTY").exists());
    }

    #[tokio::test]
    async fn test_invalid_component_ids() {
        let dirs = dirs();
        let stager = BagStager::with_defaults();
        for bad in ["", "  ", "../escape", "a/b"] {
            let err = stager.stage(&job(&dirs, bad)).await.unwrap_err();
            assert!(
                matches!(err, StagingError::InvalidComponentId { .. }),
                "expected validation error for {:?}",
                bad
            );
        }
    }

    #[tokio::test]
    async fn test_already_staged() {
        let dirs = dirs();
        write_package(&dirs, "ABC123");
        std::fs::create_dir(dirs.staging.path().join("ABC123")).unwrap();

        let err = BagStager::with_defaults()
            .stage(&job(&dirs, "ABC123"))
            .await
            .unwrap_err();
        assert!(matches!(err, StagingError::AlreadyStaged { .. }));
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn test_same_component_staged_once() {
        let dirs = dirs();
        write_package(&dirs, "DUP");
        let stager = Arc::new(BagStager::with_defaults());

        for _ in 0..10 {
            let first = tokio::spawn({
                let stager = Arc::clone(&stager);
                let job = job(&dirs, "DUP");
                async move { stager.stage(&job).await }
            });
            let second = tokio::spawn({
                let stager = Arc::clone(&stager);
                let job = job(&dirs, "DUP");
                async move { stager.stage(&job).await }
            });
            let outcomes = [first.await.unwrap(), second.await.unwrap()];

            assert_eq!(outcomes.iter().filter(|o| o.is_ok()).count(), 1);
            assert!(outcomes
                .iter()
                .any(|o| matches!(o, Err(StagingError::AlreadyStaged { .. }))));
            let bag = dirs.staging.path().join("DUP");
            assert!(bag.join("manifest-sha256.txt").exists());

            std::fs::remove_dir_all(&bag).unwrap();
        }
    }

    #[tokio::test]
    async fn test_staging_root_created() {
        let dirs = dirs();
        write_package(&dirs, "ABC123");
        let mut job = job(&dirs, "ABC123");
        job.staging_root = dirs.staging.path().join("nested/batch");

        let package = BagStager::with_defaults().stage(&job).await.unwrap();
        assert!(package.path.join("bagit.txt").exists());
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_symlinked_file_is_bagged() {
        let dirs = dirs();
        write_package(&dirs, "ABC123");
        let outside = dirs.source.path().join("outside.tif");
        std::fs::write(&outside, b"linked").unwrap();
        std::os::unix::fs::symlink(&outside, dirs.source.path().join("ABC123/linked.tif"))
            .unwrap();

        let package = BagStager::with_defaults()
            .stage(&job(&dirs, "ABC123"))
            .await
            .unwrap();

        assert_eq!(package.files, 3);
        let bag = dirs.staging.path().join("ABC123");
        assert_eq!(std::fs::read(bag.join("data/linked.tif")).unwrap(), b"linked");
        let manifest = std::fs::read_to_string(bag.join("manifest-sha256.txt")).unwrap();
        assert!(manifest.contains("  data/linked.tif"));
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_broken_symlink_fails_without_partial_bag() {
        let dirs = dirs();
        write_package(&dirs, "ABC123");
        std::os::unix::fs::symlink(
            dirs.source.path().join("missing.tif"),
            dirs.source.path().join("ABC123/broken.tif"),
        )
        .unwrap();

        let err = BagStager::with_defaults()
            .stage(&job(&dirs, "ABC123"))
            .await
            .unwrap_err();

        assert!(matches!(err, StagingError::UnsupportedEntry { .. }));
        assert_eq!(err.kind(), crate::stager::StagingErrorKind::Io);
        assert!(!dirs.staging.path().join("ABC123").exists());
    }

    #[tokio::test]
    async fn test_validate_staging_root() {
        let dirs = dirs();
        let stager = BagStager::with_defaults();
        assert!(stager.validate(dirs.staging.path()).await.is_ok());
        assert!(stager
            .validate(&dirs.staging.path().join("missing"))
            .await
            .is_err());
    }
}
