//! Batch processing of a directory tree.
//!
//! Every decodable image under the input directory is run through one shared
//! [`Api`] with the same parameters, and written under the output directory
//! at the same relative path with the extension of its output format:
//!
//! ```text
//! photos/                         out/
//! ├── 2024/                       ├── .imgpipe-cache.json
//! │   ├── beach.png       ──▶     ├── 2024/
//! │   └── notes.txt               │   └── beach.webp
//! └── portrait.jpg        ──▶     └── portrait.webp
//! ```
//!
//! Files whose extension has no decoder are skipped, as are hidden
//! directories and the output directory itself when it is nested inside the
//! input.
//!
//! Sources that differ only by extension (`photo.png`, `photo.jpg`) can map
//! to the same output. The first in walk order keeps it; a later one whose
//! output is already taken is reported as failed and nothing is overwritten.
//!
//! ## Parallel Processing
//!
//! Images are processed in parallel with [rayon](https://docs.rs/rayon) on
//! the global pool (sized by `processing.max_processes`). A failure is
//! reported for its image and counted; the rest of the batch still runs.
//!
//! ## Caching
//!
//! Unchanged images are not re-encoded; see [`cache`](crate::cache).

use crate::api::{Api, ApiError};
use crate::cache::{self, CacheEntry, CacheManifest, CacheStats, CacheStatus};
use crate::imaging::rust_backend::supported_input_extensions;
use crate::params::ParameterSet;
use rayon::prelude::*;
use std::collections::hash_map::Entry;
use std::collections::{HashMap, HashSet};
use std::path::{Path, PathBuf};
use std::sync::Mutex;
use std::sync::mpsc::Sender;
use thiserror::Error;
use walkdir::WalkDir;

#[derive(Error, Debug)]
pub enum ProcessError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("failed to walk input directory: {0}")]
    Walk(#[from] walkdir::Error),
    #[error(transparent)]
    Api(#[from] ApiError),
    #[error("output {output} is already written by {claimed_by}")]
    OutputCollision { output: String, claimed_by: String },
}

/// Progress reported while a batch runs.
#[derive(Debug, Clone)]
pub enum ProcessEvent {
    Started {
        image_count: usize,
    },
    ImageProcessed {
        /// 1-based position in walk order.
        index: usize,
        source_path: String,
        output_path: String,
        status: CacheStatus,
    },
    ImageFailed {
        index: usize,
        source_path: String,
        error: String,
    },
}

/// One written output.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BatchOutput {
    pub source_path: String,
    pub output_path: String,
    pub status: CacheStatus,
}

#[derive(Debug, Default)]
pub struct BatchResult {
    /// Successful outputs, in walk order.
    pub outputs: Vec<BatchOutput>,
    /// `(source path, error message)` for every image that failed.
    pub failures: Vec<(String, String)>,
    pub cache_stats: CacheStats,
}

/// Decodable images under `input_dir`, sorted by path.
pub fn find_images(input_dir: &Path, exclude: Option<&Path>) -> Result<Vec<PathBuf>, ProcessError> {
    let extensions = supported_input_extensions();
    let mut images = Vec::new();

    let walker = WalkDir::new(input_dir)
        .sort_by_file_name()
        .into_iter()
        .filter_entry(|entry| {
            let hidden = entry.depth() > 0 && entry.file_name().to_string_lossy().starts_with('.');
            let excluded = exclude.is_some_and(|dir| entry.path() == dir);
            !hidden && !excluded
        });

    for entry in walker {
        let entry = entry?;
        if !entry.file_type().is_file() {
            continue;
        }
        let supported = entry
            .path()
            .extension()
            .map(|ext| ext.to_string_lossy().to_ascii_lowercase())
            .is_some_and(|ext| extensions.contains(&ext.as_str()));
        if supported {
            images.push(entry.into_path());
        } else {
            tracing::debug!(path = %entry.path().display(), "Skipping unsupported file");
        }
    }
    Ok(images)
}

/// Relative path with `/` separators, as stored in the cache manifest.
fn manifest_key(path: &Path) -> String {
    path.components()
        .map(|c| c.as_os_str().to_string_lossy())
        .collect::<Vec<_>>()
        .join("/")
}

/// Run every image under `input_dir` through `api`, writing to `output_dir`.
///
/// `params` should already be resolved against configured defaults and
/// presets. Per-image failures are collected in [`BatchResult::failures`];
/// only problems with the directories themselves return `Err`.
pub fn process_batch(
    api: &Api,
    input_dir: &Path,
    output_dir: &Path,
    params: &ParameterSet,
    use_cache: bool,
    progress: Option<Sender<ProcessEvent>>,
) -> Result<BatchResult, ProcessError> {
    std::fs::create_dir_all(output_dir)?;
    let images = find_images(input_dir, Some(output_dir))?;
    tracing::info!(count = images.len(), input = %input_dir.display(), "Processing batch");
    emit(&progress, ProcessEvent::Started {
        image_count: images.len(),
    });

    let manifest = Mutex::new(if use_cache {
        CacheManifest::load(output_dir)
    } else {
        CacheManifest::empty()
    });
    let params_hash = cache::hash_params(params, api.backend().kind(), &api.chain());

    let claims = Mutex::new(HashMap::new());
    let job = ImageJob {
        api,
        params,
        params_hash: &params_hash,
        output_dir,
        manifest: &manifest,
        claims: &claims,
    };
    let process = |i: usize, path: &PathBuf| {
        let relative = path.strip_prefix(input_dir).unwrap_or(path);
        let source_path = manifest_key(relative);
        let result = job.run(path, relative, &source_path);
        match &result {
            Ok(output) => emit(&progress, ProcessEvent::ImageProcessed {
                index: i + 1,
                source_path: source_path.clone(),
                output_path: output.output_path.clone(),
                status: output.status,
            }),
            Err(e) => {
                tracing::warn!(source = %source_path, error = %e, "Image failed");
                emit(&progress, ProcessEvent::ImageFailed {
                    index: i + 1,
                    source_path: source_path.clone(),
                    error: e.to_string(),
                });
            }
        }
        (i, source_path, result)
    };

    // First source per extension-less path runs in parallel; the rest run
    // afterwards so the earlier source always wins a shared output
    let mut stems = HashSet::new();
    let (first, rest): (Vec<_>, Vec<_>) = images.iter().enumerate().partition(|(_, path)| {
        let relative = path.strip_prefix(input_dir).unwrap_or(path.as_path());
        stems.insert(manifest_key(&relative.with_extension("")))
    });

    let mut results: Vec<(usize, String, Result<BatchOutput, ProcessError>)> = first
        .into_par_iter()
        .map(|(i, path)| process(i, path))
        .collect();
    results.extend(rest.into_iter().map(|(i, path)| process(i, path)));
    results.sort_by_key(|(i, _, _)| *i);

    let mut batch = BatchResult::default();
    for (_, source_path, result) in results {
        match result {
            Ok(output) => {
                batch.cache_stats.record(output.status);
                batch.outputs.push(output);
            }
            Err(e) => batch.failures.push((source_path, e.to_string())),
        }
    }

    let manifest = manifest
        .into_inner()
        .unwrap_or_else(|poisoned| poisoned.into_inner());
    manifest.save(output_dir)?;

    tracing::info!(
        stats = %batch.cache_stats,
        failed = batch.failures.len(),
        "Batch complete"
    );
    Ok(batch)
}

fn emit(progress: &Option<Sender<ProcessEvent>>, event: ProcessEvent) {
    if let Some(tx) = progress {
        // A gone receiver only means nobody is listening
        let _ = tx.send(event);
    }
}

/// Shared state for processing a single image.
struct ImageJob<'a> {
    api: &'a Api,
    params: &'a ParameterSet,
    params_hash: &'a str,
    output_dir: &'a Path,
    manifest: &'a Mutex<CacheManifest>,
    /// Output path → source that wrote it in this batch.
    claims: &'a Mutex<HashMap<String, String>>,
}

impl ImageJob<'_> {
    fn run(
        &self,
        path: &Path,
        relative: &Path,
        source_path: &str,
    ) -> Result<BatchOutput, ProcessError> {
        let bytes = std::fs::read(path)?;
        let entry = CacheEntry {
            source_hash: cache::hash_source_bytes(&bytes),
            params_hash: self.params_hash.to_string(),
        };

        if let Some(output) = self.reuse_cached(&entry, relative, source_path)? {
            return Ok(output);
        }

        let encoded = self.api.run(&bytes, self.params)?;
        let output_relative = relative.with_extension(encoded.format.extension());
        let output_key = manifest_key(&output_relative);
        self.claim(&output_key, source_path)?;
        let output_path = self.output_dir.join(&output_relative);
        if let Some(parent) = output_path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        std::fs::write(&output_path, &encoded.bytes)?;

        self.lock_manifest().insert(output_key.clone(), entry);
        Ok(BatchOutput {
            source_path: source_path.to_string(),
            output_path: output_key,
            status: CacheStatus::Encoded,
        })
    }

    /// Serve from an earlier output of the same content, copying if it moved.
    fn reuse_cached(
        &self,
        entry: &CacheEntry,
        relative: &Path,
        source_path: &str,
    ) -> Result<Option<BatchOutput>, ProcessError> {
        let Some(stored) = self
            .lock_manifest()
            .find(entry, self.output_dir)
            .map(str::to_string)
        else {
            return Ok(None);
        };

        // Same content and settings always yield the same format
        let expected = match Path::new(&stored).extension() {
            Some(ext) => relative.with_extension(ext),
            None => relative.to_path_buf(),
        };
        let expected_key = manifest_key(&expected);
        self.claim(&expected_key, source_path)?;

        let status = if stored == expected_key {
            CacheStatus::Cached
        } else {
            let target = self.output_dir.join(&expected);
            if let Some(parent) = target.parent() {
                std::fs::create_dir_all(parent)?;
            }
            std::fs::copy(self.output_dir.join(&stored), &target)?;
            self.lock_manifest()
                .insert(expected_key.clone(), entry.clone());
            CacheStatus::Copied
        };

        Ok(Some(BatchOutput {
            source_path: source_path.to_string(),
            output_path: expected_key,
            status,
        }))
    }

    /// Reserve `output_key` for `source_path` for the rest of the batch.
    fn claim(&self, output_key: &str, source_path: &str) -> Result<(), ProcessError> {
        let mut claims = self
            .claims
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner());
        match claims.entry(output_key.to_string()) {
            Entry::Occupied(owner) if owner.get() != source_path => {
                Err(ProcessError::OutputCollision {
                    output: output_key.to_string(),
                    claimed_by: owner.get().clone(),
                })
            }
            Entry::Occupied(_) => Ok(()),
            Entry::Vacant(slot) => {
                slot.insert(source_path.to_string());
                Ok(())
            }
        }
    }

    fn lock_manifest(&self) -> std::sync::MutexGuard<'_, CacheManifest> {
        self.manifest
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}
