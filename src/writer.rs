//! Artifact writer - staged, atomic, content-addressed local layout.
//!
//! One directory per artifact under `root/bucket/`:
//!
//! ```text
//! root/daily/owner-repo/
//!   document.md
//!   metadata.json
//!   media/
//!     manifest.json
//!     screenshot.png
//! ```
//!
//! Everything is written into a staging directory first and renamed
//! into place in one step, so a partially written artifact is never
//! visible at its final path.

use std::path::{Path, PathBuf};
use tokio::fs;
use tracing::debug;
use uuid::Uuid;

use crate::canonical::slugify;
use crate::error::{PipelineError, Result};
use crate::traits::media::MediaOutcome;
use crate::types::{Artifact, ArtifactMetadata, CanonicalRecord, MediaEntry, RankingEntry};

const DOCUMENT_FILE: &str = "document.md";
const METADATA_FILE: &str = "metadata.json";
const MEDIA_DIR: &str = "media";
const MANIFEST_FILE: &str = "manifest.json";
const RANKING_FILE: &str = "ranking.json";
const STAGING_DIR: &str = ".staging";

/// Writes accepted items into the local artifact layout.
#[derive(Debug, Clone)]
pub struct ArtifactWriter {
    root: PathBuf,
}

impl ArtifactWriter {
    /// Create a writer rooted at `root`.
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    /// The archive root directory.
    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Deterministic final path for a canonical key.
    ///
    /// `root/bucket/slug(key)`; if that path is already taken by a
    /// different canonical key, a short hash suffix disambiguates.
    pub async fn artifact_path(&self, bucket: &str, canonical_key: &str) -> Result<PathBuf> {
        let slug = path_fragment(canonical_key);
        let candidate = self.root.join(bucket).join(&slug);

        match self.read_metadata(&candidate).await? {
            Some(existing) if existing.canonical_key != canonical_key => {
                let suffix = key_suffix(canonical_key);
                Ok(self.root.join(bucket).join(format!("{slug}-{suffix}")))
            }
            _ => Ok(candidate),
        }
    }

    /// Write a complete artifact, all-or-nothing.
    ///
    /// Media outcomes become files under `media/` plus per-asset
    /// entries in the metadata; a failed asset keeps only its remote
    /// URL. Returns the artifact as visible at its final path.
    pub async fn write(
        &self,
        record: &CanonicalRecord,
        document: &str,
        metadata: ArtifactMetadata,
        media: &[MediaOutcome],
    ) -> Result<Artifact> {
        let final_path = self.artifact_path(&record.bucket, &record.canonical_key).await?;
        let staging = self.root.join(STAGING_DIR).join(Uuid::new_v4().to_string());

        match self
            .write_staged(&staging, &final_path, record, document, metadata, media)
            .await
        {
            Ok(artifact) => Ok(artifact),
            Err(e) => {
                // Retried writes must not accumulate orphan staging dirs.
                let _ = fs::remove_dir_all(&staging).await;
                Err(e)
            }
        }
    }

    async fn write_staged(
        &self,
        staging: &Path,
        final_path: &Path,
        record: &CanonicalRecord,
        document: &str,
        mut metadata: ArtifactMetadata,
        media: &[MediaOutcome],
    ) -> Result<Artifact> {
        fs::create_dir_all(staging.join(MEDIA_DIR)).await.map_err(|e| wrap_io(&record.canonical_key, e))?;

        // Media files first, so entries carry final relative paths.
        let mut entries: Vec<MediaEntry> = Vec::with_capacity(media.len());
        let mut used_names: Vec<String> = Vec::new();
        for outcome in media {
            let local_path = match outcome {
                MediaOutcome::Downloaded(fetched) => {
                    let name = disambiguate(&fetched.file_name, &used_names);
                    fs::write(staging.join(MEDIA_DIR).join(&name), &fetched.bytes)
                        .await
                        .map_err(|e| wrap_io(&record.canonical_key, e))?;
                    used_names.push(name.clone());
                    Some(format!("{MEDIA_DIR}/{name}"))
                }
                _ => None,
            };
            entries.push(outcome.to_entry(local_path));
        }
        metadata.media = entries;

        let manifest: Vec<&str> = used_names.iter().map(|n| n.as_str()).collect();
        fs::write(
            staging.join(MEDIA_DIR).join(MANIFEST_FILE),
            serde_json::to_vec_pretty(&manifest)?,
        )
        .await
        .map_err(|e| wrap_io(&record.canonical_key, e))?;

        let rendered = render_document(document, &metadata);
        fs::write(staging.join(DOCUMENT_FILE), &rendered)
            .await
            .map_err(|e| wrap_io(&record.canonical_key, e))?;
        fs::write(
            staging.join(METADATA_FILE),
            serde_json::to_vec_pretty(&metadata)?,
        )
        .await
        .map_err(|e| wrap_io(&record.canonical_key, e))?;

        // Atomic move into place. A leftover directory from a crashed
        // run (reservation never confirmed) is replaced wholesale.
        if let Some(parent) = final_path.parent() {
            fs::create_dir_all(parent).await.map_err(|e| wrap_io(&record.canonical_key, e))?;
        }
        if fs::try_exists(&final_path).await.map_err(|e| wrap_io(&record.canonical_key, e))? {
            fs::remove_dir_all(&final_path).await.map_err(|e| wrap_io(&record.canonical_key, e))?;
        }
        fs::rename(staging, final_path).await.map_err(|e| wrap_io(&record.canonical_key, e))?;

        debug!(path = %final_path.display(), key = %record.canonical_key, "artifact written");

        Ok(Artifact {
            path: final_path.to_path_buf(),
            document: rendered,
            metadata,
        })
    }

    /// Rewrite an artifact's metadata with a recomputed score.
    ///
    /// Bumps `metadata_revision`; the document body is never touched.
    pub async fn update_score(&self, artifact: &mut Artifact, score: f64) -> Result<()> {
        artifact.metadata.score = score;
        artifact.metadata.metadata_revision += 1;
        fs::write(
            artifact.path.join(METADATA_FILE),
            serde_json::to_vec_pretty(&artifact.metadata)?,
        )
        .await?;
        Ok(())
    }

    /// Load one artifact from its directory.
    pub async fn load(&self, path: &Path) -> Result<Artifact> {
        let metadata: ArtifactMetadata =
            serde_json::from_slice(&fs::read(path.join(METADATA_FILE)).await?)?;
        let document = fs::read_to_string(path.join(DOCUMENT_FILE)).await?;
        Ok(Artifact {
            path: path.to_path_buf(),
            document,
            metadata,
        })
    }

    /// Load every artifact in a bucket, sorted by canonical key.
    ///
    /// A missing or unusable bucket directory reads as an empty bucket;
    /// the run summary carries the per-item write failures.
    pub async fn load_bucket(&self, bucket: &str) -> Result<Vec<Artifact>> {
        let bucket_dir = self.root.join(bucket);
        let mut dir = match fs::read_dir(&bucket_dir).await {
            Ok(dir) => dir,
            Err(e)
                if matches!(
                    e.kind(),
                    std::io::ErrorKind::NotFound | std::io::ErrorKind::NotADirectory
                ) =>
            {
                return Ok(Vec::new())
            }
            Err(e) => return Err(e.into()),
        };

        let mut artifacts = Vec::new();
        while let Some(entry) = dir.next_entry().await? {
            let path = entry.path();
            if !entry.file_type().await?.is_dir() {
                continue;
            }
            if !fs::try_exists(path.join(METADATA_FILE)).await? {
                continue;
            }
            artifacts.push(self.load(&path).await?);
        }
        artifacts.sort_by(|a, b| a.metadata.canonical_key.cmp(&b.metadata.canonical_key));
        Ok(artifacts)
    }

    /// Write the bucket's full ranking as `ranking.json`.
    pub async fn write_ranking(&self, bucket: &str, ranking: &[RankingEntry]) -> Result<()> {
        let bucket_dir = self.root.join(bucket);
        fs::create_dir_all(&bucket_dir).await?;
        fs::write(
            bucket_dir.join(RANKING_FILE),
            serde_json::to_vec_pretty(ranking)?,
        )
        .await?;
        Ok(())
    }

    async fn read_metadata(&self, path: &Path) -> Result<Option<ArtifactMetadata>> {
        let metadata_path = path.join(METADATA_FILE);
        if !fs::try_exists(&metadata_path).await? {
            return Ok(None);
        }
        let metadata = serde_json::from_slice(&fs::read(&metadata_path).await?)?;
        Ok(Some(metadata))
    }
}

/// Render the final document body.
///
/// Downloaded media is referenced by local relative path; anything
/// else falls back to the original remote URL.
pub fn render_document(body: &str, metadata: &ArtifactMetadata) -> String {
    let mut doc = String::new();
    if let Some(title) = &metadata.title {
        doc.push_str("# ");
        doc.push_str(title);
        doc.push_str("\n\n");
    }
    if let Some(url) = &metadata.url {
        doc.push_str("Source: ");
        doc.push_str(url);
        doc.push_str("\n\n");
    }
    doc.push_str(body.trim_end());
    doc.push('\n');

    if !metadata.media.is_empty() {
        doc.push_str("\n## Media\n\n");
        for entry in &metadata.media {
            let target = entry.local_path.as_deref().unwrap_or(&entry.url);
            doc.push_str(&format!("- ![]({target})\n"));
        }
    }
    doc
}

fn wrap_io(canonical_key: &str, e: std::io::Error) -> PipelineError {
    PipelineError::Write {
        canonical_key: canonical_key.to_string(),
        reason: e.to_string(),
    }
}

/// Filesystem-safe fragment for a canonical key.
fn path_fragment(canonical_key: &str) -> String {
    let mut slug = slugify(canonical_key);
    slug.truncate(80);
    if slug.is_empty() {
        // Keys made entirely of non-ascii characters still need a path.
        slug = key_suffix(canonical_key);
    }
    slug
}

/// Short hash suffix for collision disambiguation.
fn key_suffix(canonical_key: &str) -> String {
    use sha2::{Digest, Sha256};
    let digest = Sha256::digest(canonical_key.as_bytes());
    format!("{:x}", digest)[..8].to_string()
}

/// Append `-N` before the extension until the name is unused.
fn disambiguate(file_name: &str, used: &[String]) -> String {
    if !used.iter().any(|u| u == file_name) {
        return file_name.to_string();
    }
    let (stem, ext) = match file_name.rsplit_once('.') {
        Some((stem, ext)) => (stem, Some(ext)),
        None => (file_name, None),
    };
    for n in 1.. {
        let candidate = match ext {
            Some(ext) => format!("{stem}-{n}.{ext}"),
            None => format!("{stem}-{n}"),
        };
        if !used.iter().any(|u| *u == candidate) {
            return candidate;
        }
    }
    unreachable!()
}
