//! Manifest acquisition: read the list of media descriptors from a URL, a
//! JSON file or a directory of images, falling back to a synthesized
//! `{i}.jpg` manifest when the source is unavailable.

use std::collections::HashSet;
use std::fmt;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use walkdir::WalkDir;

use crate::error::ManifestError;

const IMAGE_EXTENSIONS: &[&str] = &["jpg", "jpeg", "png", "gif", "webp", "bmp", "tiff", "tif"];

// ── Descriptors ─────────────────────────────────────────────────────────

/// Stable identifier of a media item: the manifest's `index` field, which
/// upstream tooling writes as an integer but may also be a string key.
#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(untagged)]
pub enum MediaId {
    Index(u64),
    Key(String),
}

impl fmt::Display for MediaId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            MediaId::Index(i) => write!(f, "{}", i),
            MediaId::Key(k) => f.write_str(k),
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Dimensions {
    pub width: u32,
    pub height: u32,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct MediaDescriptor {
    #[serde(rename = "index")]
    pub id: MediaId,
    pub processed_filename: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub original_filename: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub dimensions: Option<Dimensions>,
}

impl MediaDescriptor {
    pub fn new(id: MediaId, processed_filename: impl Into<String>) -> Self {
        MediaDescriptor {
            id,
            processed_filename: processed_filename.into(),
            original_filename: None,
            dimensions: None,
        }
    }
}

#[derive(Deserialize)]
struct ManifestFile {
    images: Vec<MediaDescriptor>,
    #[serde(default)]
    processed_at: Option<String>,
}

// ── Manifest ────────────────────────────────────────────────────────────

/// Ordered, immutable list of descriptors with unique identifiers.
///
/// Descriptors are shared behind `Arc` so layout entries reference them
/// instead of copying.
#[derive(Clone, Debug, Default)]
pub struct Manifest {
    images: Vec<Arc<MediaDescriptor>>,
    processed_at: Option<String>,
}

impl Manifest {
    pub fn new(images: Vec<MediaDescriptor>) -> Result<Self, ManifestError> {
        let mut seen = HashSet::with_capacity(images.len());
        for d in &images {
            if !seen.insert(&d.id) {
                return Err(ManifestError::DuplicateId(d.id.to_string()));
            }
        }
        Ok(Manifest {
            images: images.into_iter().map(Arc::new).collect(),
            processed_at: None,
        })
    }

    /// Synthesized manifest: `images[i] = { processed_filename: "{i}.jpg", index: i }`.
    pub fn fallback(count: usize) -> Self {
        Manifest {
            images: (0..count)
                .map(|i| MediaDescriptor::new(MediaId::Index(i as u64), format!("{}.jpg", i)))
                .map(Arc::new)
                .collect(),
            processed_at: None,
        }
    }

    /// Parse the `{ images: [...] }` payload. Empty lists count as malformed.
    pub fn parse(json: &str) -> Result<Self, ManifestError> {
        let file: ManifestFile = serde_json::from_str(json)?;
        if file.images.is_empty() {
            return Err(ManifestError::Empty);
        }
        let mut manifest = Manifest::new(file.images)?;
        manifest.processed_at = file.processed_at;
        Ok(manifest)
    }

    pub fn len(&self) -> usize {
        self.images.len()
    }

    pub fn is_empty(&self) -> bool {
        self.images.is_empty()
    }

    pub fn get(&self, i: usize) -> Option<&Arc<MediaDescriptor>> {
        self.images.get(i)
    }

    pub fn iter(&self) -> impl Iterator<Item = &Arc<MediaDescriptor>> {
        self.images.iter()
    }

    pub fn processed_at(&self) -> Option<&str> {
        self.processed_at.as_deref()
    }
}

// ── Sources ─────────────────────────────────────────────────────────────

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum ManifestSource {
    Url(String),
    File(PathBuf),
    Directory(PathBuf),
}

impl ManifestSource {
    /// `http(s)://` → URL, an existing directory → directory scan, else a JSON file.
    pub fn parse(s: &str) -> Self {
        if s.starts_with("http://") || s.starts_with("https://") {
            return ManifestSource::Url(s.to_string());
        }
        let path = PathBuf::from(s);
        if path.is_dir() {
            ManifestSource::Directory(path)
        } else {
            ManifestSource::File(path)
        }
    }

    /// `timeout` bounds the HTTP request; file and directory reads ignore it.
    pub fn try_load(&self, timeout: Duration) -> Result<Manifest, ManifestError> {
        match self {
            ManifestSource::Url(url) => Manifest::parse(&fetch_http(url, timeout)?),
            ManifestSource::File(path) => Manifest::parse(&std::fs::read_to_string(path)?),
            ManifestSource::Directory(dir) => scan_dir(dir),
        }
    }

    /// Base the source's filenames are relative to, when the source implies
    /// one. A scanned directory lists bare file names inside itself.
    pub fn asset_base(&self) -> Option<String> {
        match self {
            ManifestSource::Directory(dir) => Some(dir.to_string_lossy().into_owned()),
            ManifestSource::Url(_) | ManifestSource::File(_) => None,
        }
    }
}

impl fmt::Display for ManifestSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ManifestSource::Url(u) => f.write_str(u),
            ManifestSource::File(p) | ManifestSource::Directory(p) => write!(f, "{}", p.display()),
        }
    }
}

/// Load once, falling back to the synthesized manifest on any failure.
pub fn load(source: &ManifestSource, fallback_count: usize, timeout: Duration) -> Manifest {
    match source.try_load(timeout) {
        Ok(m) => {
            tracing::info!("manifest: {} images from {}", m.len(), source);
            m
        }
        Err(e) => {
            tracing::warn!(
                "manifest: {} unavailable ({}), using {} placeholder entries",
                source,
                e,
                fallback_count
            );
            Manifest::fallback(fallback_count)
        }
    }
}

pub fn load_or_fallback(
    source: Option<&ManifestSource>,
    fallback_count: usize,
    timeout: Duration,
) -> Manifest {
    match source {
        Some(s) => load(s, fallback_count, timeout),
        None => {
            tracing::info!("manifest: no source configured, using {} entries", fallback_count);
            Manifest::fallback(fallback_count)
        }
    }
}

fn fetch_http(url: &str, timeout: Duration) -> Result<String, ManifestError> {
    let agent = ureq::AgentBuilder::new().timeout(timeout).build();
    match agent.get(url).call() {
        Ok(resp) => Ok(resp.into_string()?),
        Err(ureq::Error::Status(code, _)) => Err(ManifestError::Status(code)),
        Err(ureq::Error::Transport(t)) => Err(ManifestError::Transport(t.to_string())),
    }
}

fn is_image(path: &Path) -> bool {
    path.extension()
        .and_then(|e| e.to_str())
        .map(|e| IMAGE_EXTENSIONS.contains(&e.to_lowercase().as_str()))
        .unwrap_or(false)
}

/// Build a manifest from the image files directly under `dir`, in name order.
fn scan_dir(dir: &Path) -> Result<Manifest, ManifestError> {
    let mut images = Vec::new();
    for entry in WalkDir::new(dir)
        .min_depth(1)
        .max_depth(1)
        .sort_by_file_name()
    {
        let entry = entry.map_err(|e| ManifestError::Io(e.into()))?;
        if !entry.file_type().is_file() || !is_image(entry.path()) {
            continue;
        }
        let filename = entry.file_name().to_string_lossy().to_string();
        let dimensions = image::image_dimensions(entry.path())
            .ok()
            .map(|(width, height)| Dimensions { width, height });
        images.push(MediaDescriptor {
            id: MediaId::Index(images.len() as u64),
            processed_filename: filename,
            original_filename: None,
            dimensions,
        });
    }
    if images.is_empty() {
        return Err(ManifestError::Empty);
    }
    Manifest::new(images)
}
