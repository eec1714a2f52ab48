//! Working directory layout and the artifact manifest passed between stages.

use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::{ConfigError, MediaError, Result};
use crate::media::{AssemblyAudio, TransitionClip};

/// File name of the persisted manifest inside the work root.
pub const MANIFEST_FILE_NAME: &str = "manifest.json";

/// Per-run directory tree: `slides/`, `audio/`, `transitions/`, `temp/`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WorkDirs {
    pub root: PathBuf,
    pub slides: PathBuf,
    pub audio: PathBuf,
    pub transitions: PathBuf,
    pub temp: PathBuf,
}

impl WorkDirs {
    /// Paths under `root`, without touching the filesystem.
    pub fn under(root: impl Into<PathBuf>) -> Self {
        let root = root.into();
        Self {
            slides: root.join("slides"),
            audio: root.join("audio"),
            transitions: root.join("transitions"),
            temp: root.join("temp"),
            root,
        }
    }

    /// Create the tree under `root`. Existing directories are reused.
    pub async fn create(root: impl Into<PathBuf>) -> Result<Self> {
        let dirs = Self::under(root);
        for dir in [&dirs.slides, &dirs.audio, &dirs.transitions, &dirs.temp] {
            tokio::fs::create_dir_all(dir)
                .await
                .map_err(MediaError::from)?;
        }
        tracing::debug!(root = %dirs.root.display(), "Created working directories");
        Ok(dirs)
    }

    /// Scratch directory for one run, inside `temp/`. Only this directory
    /// is removed after assembly, so anything else under `temp/` survives.
    pub fn scratch_for(&self, run_id: Uuid) -> PathBuf {
        self.temp.join(format!("run-{}", run_id))
    }

    /// Work root for an output file: its parent directory, or `.`.
    pub fn root_for_output(output: &Path) -> PathBuf {
        match output.parent() {
            Some(parent) if !parent.as_os_str().is_empty() => parent.to_path_buf(),
            _ => PathBuf::from("."),
        }
    }
}

/// Narration produced for a run.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "mode", content = "files", rename_all = "snake_case")]
pub enum AudioArtifacts {
    /// One clip per slide, same order as the slides.
    PerSlide(Vec<PathBuf>),
    /// One continuous track for the whole presentation.
    Combined(PathBuf),
}

impl AudioArtifacts {
    pub fn paths(&self) -> Vec<&Path> {
        match self {
            Self::PerSlide(paths) => paths.iter().map(PathBuf::as_path).collect(),
            Self::Combined(path) => vec![path.as_path()],
        }
    }

    /// How the assembler should lay this narration out.
    pub fn to_assembly_audio(&self) -> AssemblyAudio {
        match self {
            Self::PerSlide(paths) => AssemblyAudio::PerSlide(paths.clone()),
            Self::Combined(path) => AssemblyAudio::Shared(path.clone()),
        }
    }
}

/// Everything one run produced, in slide order.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ArtifactManifest {
    pub run_id: Uuid,
    pub created_at: DateTime<Utc>,
    pub slides: Vec<PathBuf>,
    pub audio: AudioArtifacts,
    pub transitions: Vec<TransitionClip>,
    /// Final video, once assembled.
    pub output: Option<PathBuf>,
}

impl ArtifactManifest {
    pub fn new(slides: Vec<PathBuf>, audio: AudioArtifacts, transitions: Vec<TransitionClip>) -> Self {
        Self {
            run_id: Uuid::new_v4(),
            created_at: Utc::now(),
            slides,
            audio,
            transitions,
            output: None,
        }
    }

    pub fn transition_paths(&self) -> Vec<PathBuf> {
        self.transitions.iter().map(|t| t.path.clone()).collect()
    }

    /// Segment order of the final video: slide, transition, slide, ...
    pub fn segment_order(&self) -> Vec<&Path> {
        let mut order = Vec::with_capacity(self.slides.len() + self.transitions.len());
        for (i, slide) in self.slides.iter().enumerate() {
            order.push(slide.as_path());
            if let Some(clip) = self.transitions.iter().find(|t| t.from == i) {
                order.push(clip.path.as_path());
            }
        }
        order
    }

    /// Write the manifest as pretty JSON into `dir`.
    pub async fn save(&self, dir: &Path) -> Result<PathBuf> {
        let path = dir.join(MANIFEST_FILE_NAME);
        let json = serde_json::to_string_pretty(self)
            .map_err(|e| ConfigError::ParseError(e.to_string()))?;
        tokio::fs::write(&path, json)
            .await
            .map_err(MediaError::from)?;
        Ok(path)
    }

    pub async fn load(path: &Path) -> Result<Self> {
        let raw = tokio::fs::read_to_string(path)
            .await
            .map_err(|_| MediaError::NotFound {
                path: path.to_path_buf(),
            })?;
        Ok(serde_json::from_str(&raw).map_err(|e| ConfigError::ParseError(e.to_string()))?)
    }
}

/// Image files directly inside `dir`, sorted by name.
pub fn find_reference_images(dir: &Path) -> std::result::Result<Vec<PathBuf>, ConfigError> {
    if !dir.is_dir() {
        return Err(ConfigError::MissingReferenceDir {
            path: dir.to_path_buf(),
        });
    }
    let mut images: Vec<PathBuf> = std::fs::read_dir(dir)?
        .filter_map(|entry| entry.ok().map(|e| e.path()))
        .filter(|path| path.is_file())
        .filter(|path| {
            path.extension()
                .and_then(|ext| ext.to_str())
                .map(|ext| {
                    matches!(
                        ext.to_ascii_lowercase().as_str(),
                        "png" | "jpg" | "jpeg" | "webp"
                    )
                })
                .unwrap_or(false)
        })
        .collect();
    images.sort();
    Ok(images)
}
