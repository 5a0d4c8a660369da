//! Artifact store: the flat output directory generated documents land in.

use std::io::Write as _;
use std::path::{Component, Path, PathBuf};
use std::time::SystemTime;

use chrono::{DateTime, Utc};
use serde::Serialize;

#[derive(Debug, thiserror::Error)]
pub enum ArtifactError {
    #[error("invalid artifact name '{0}'")]
    InvalidName(String),
    #[error("artifact I/O failed: {0}")]
    Io(#[from] std::io::Error),
    #[error("failed to build archive: {0}")]
    Archive(#[from] zip::result::ZipError),
}

impl ArtifactError {
    pub fn is_not_found(&self) -> bool {
        match self {
            ArtifactError::InvalidName(_) => true,
            ArtifactError::Io(e) => e.kind() == std::io::ErrorKind::NotFound,
            ArtifactError::Archive(_) => false,
        }
    }
}

/// One listed artifact.
#[derive(Debug, Clone, Serialize)]
pub struct ArtifactInfo {
    pub filename: String,
    pub size: u64,
    pub modified: DateTime<Utc>,
}

/// Directory of Markdown artifacts. Names are single path components.
#[derive(Debug, Clone)]
pub struct ArtifactStore {
    root: PathBuf,
}

impl ArtifactStore {
    /// Open the store, creating the directory if needed.
    pub async fn open(root: impl Into<PathBuf>) -> Result<Self, ArtifactError> {
        let root = root.into();
        tokio::fs::create_dir_all(&root).await?;
        Ok(Self { root })
    }

    /// Accept only a single plain file name. `..`, separators and NUL are rejected.
    pub fn validate_name(name: &str) -> Result<(), ArtifactError> {
        let mut components = Path::new(name).components();
        let single = matches!(
            (components.next(), components.next()),
            (Some(Component::Normal(_)), None)
        );
        if !single || name.contains(['/', '\\', '\0']) {
            return Err(ArtifactError::InvalidName(name.to_string()));
        }
        Ok(())
    }

    fn path_of(&self, name: &str) -> Result<PathBuf, ArtifactError> {
        Self::validate_name(name)?;
        Ok(self.root.join(name))
    }

    /// Path of an existing regular file; directories count as missing.
    async fn existing_file(&self, name: &str) -> Result<PathBuf, ArtifactError> {
        let path = self.path_of(name)?;
        if !tokio::fs::metadata(&path).await?.is_file() {
            return Err(std::io::Error::new(
                std::io::ErrorKind::NotFound,
                format!("'{name}' is not a file"),
            )
            .into());
        }
        Ok(path)
    }

    /// Write (or overwrite) an artifact.
    pub async fn write(&self, name: &str, content: &str) -> Result<PathBuf, ArtifactError> {
        let path = self.path_of(name)?;
        tokio::fs::write(&path, content).await?;
        tracing::debug!(file = name, bytes = content.len(), "Wrote artifact");
        Ok(path)
    }

    pub async fn read(&self, name: &str) -> Result<Vec<u8>, ArtifactError> {
        let path = self.existing_file(name).await?;
        Ok(tokio::fs::read(&path).await?)
    }

    pub async fn read_to_string(&self, name: &str) -> Result<String, ArtifactError> {
        let path = self.existing_file(name).await?;
        Ok(tokio::fs::read_to_string(&path).await?)
    }

    /// All `*.md` artifacts, sorted by filename.
    pub async fn list(&self) -> Result<Vec<ArtifactInfo>, ArtifactError> {
        let root = self.root.clone();
        tokio::task::spawn_blocking(move || list_markdown_sync(&root))
            .await
            .map_err(|e| ArtifactError::Io(std::io::Error::other(e)))?
    }

    /// Zip every listed artifact into an in-memory archive.
    pub async fn zip_all(&self) -> Result<Vec<u8>, ArtifactError> {
        let root = self.root.clone();
        tokio::task::spawn_blocking(move || zip_markdown_sync(&root))
            .await
            .map_err(|e| ArtifactError::Io(std::io::Error::other(e)))?
    }
}

fn list_markdown_sync(root: &Path) -> Result<Vec<ArtifactInfo>, ArtifactError> {
    let entries = match std::fs::read_dir(root) {
        Ok(entries) => entries,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(Vec::new()),
        Err(e) => return Err(e.into()),
    };
    let mut files = Vec::new();
    for entry in entries.flatten() {
        let path = entry.path();
        if path.extension().and_then(|e| e.to_str()) != Some("md") {
            continue;
        }
        let meta = entry.metadata()?;
        if !meta.is_file() {
            continue;
        }
        let modified = meta.modified().unwrap_or(SystemTime::UNIX_EPOCH);
        files.push(ArtifactInfo {
            filename: entry.file_name().to_string_lossy().into_owned(),
            size: meta.len(),
            modified: DateTime::<Utc>::from(modified),
        });
    }
    files.sort_by(|a, b| a.filename.cmp(&b.filename));
    Ok(files)
}

fn zip_markdown_sync(root: &Path) -> Result<Vec<u8>, ArtifactError> {
    let files = list_markdown_sync(root)?;
    let mut writer = zip::ZipWriter::new(std::io::Cursor::new(Vec::new()));
    let options = zip::write::SimpleFileOptions::default()
        .compression_method(zip::CompressionMethod::Deflated);
    for file in &files {
        let bytes = std::fs::read(root.join(&file.filename))?;
        writer.start_file(file.filename.as_str(), options)?;
        writer.write_all(&bytes)?;
    }
    Ok(writer.finish()?.into_inner())
}
