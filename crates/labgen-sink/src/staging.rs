//! Staging directory for file sinks.
//!
//! Files are written into a hidden temporary directory inside the output
//! directory and renamed into place on publish, so readers never observe a
//! partially written batch. Dropping an unpublished staging area deletes it.
//!
//! Publishing replaces only the files of the batch. Files already in the
//! output directory that the batch does not write (for example tables left
//! out by a `--tables` selection) are kept; use an empty output directory
//! when the directory must hold exactly one batch.

use crate::error::SinkError;
use std::fs::{self, File};
use std::io::BufWriter;
use std::path::{Path, PathBuf};
use tempfile::TempDir;
use tracing::{debug, warn};

/// Buffer size for staged files (8KB)
pub const DEFAULT_BUFFER_SIZE: usize = 8192;

const STAGING_PREFIX: &str = ".labgen-staging-";

/// Subdirectory of the staging area holding the files a publish replaced.
const PREVIOUS_DIR: &str = ".previous";

/// One published file and where the file it replaced was parked.
#[derive(Debug)]
struct Swap {
    target: PathBuf,
    previous: Option<PathBuf>,
}

/// A temporary directory holding the files of one batch.
#[derive(Debug)]
pub struct StagingArea {
    output_dir: PathBuf,
    dir: TempDir,
    files: Vec<String>,
}

impl StagingArea {
    /// Create the output directory if needed and a staging directory inside it.
    pub fn create(output_dir: &Path) -> Result<Self, SinkError> {
        fs::create_dir_all(output_dir)?;
        let dir = tempfile::Builder::new()
            .prefix(STAGING_PREFIX)
            .tempdir_in(output_dir)?;
        debug!("Staging batch in {}", dir.path().display());
        Ok(Self {
            output_dir: output_dir.to_path_buf(),
            dir,
            files: Vec::new(),
        })
    }

    /// Path of the staging directory.
    pub fn path(&self) -> &Path {
        self.dir.path()
    }

    /// Directory files are published into.
    pub fn output_dir(&self) -> &Path {
        &self.output_dir
    }

    /// Create a staged file and return a buffered writer for it.
    pub fn create_file(&mut self, file_name: &str) -> Result<BufWriter<File>, SinkError> {
        let file = File::create(self.dir.path().join(file_name))?;
        self.files.push(file_name.to_string());
        Ok(BufWriter::with_capacity(DEFAULT_BUFFER_SIZE, file))
    }

    /// Move every staged file into the output directory.
    ///
    /// Callers must flush and drop their writers first. Existing files with
    /// the same name are replaced. If any move fails, files already moved
    /// are taken back out and the replaced files restored.
    pub fn publish(self) -> Result<Vec<PathBuf>, SinkError> {
        let previous_dir = self.dir.path().join(PREVIOUS_DIR);
        fs::create_dir(&previous_dir)?;

        let mut swaps: Vec<Swap> = Vec::with_capacity(self.files.len());
        for file_name in &self.files {
            match self.swap_in(file_name, &previous_dir) {
                Ok(swap) => swaps.push(swap),
                Err(err) => {
                    roll_back(&swaps);
                    return Err(err);
                }
            }
        }

        self.dir.close()?;
        Ok(swaps.into_iter().map(|swap| swap.target).collect())
    }

    fn swap_in(&self, file_name: &str, previous_dir: &Path) -> Result<Swap, SinkError> {
        let target = self.output_dir.join(file_name);
        let previous = if target.exists() {
            let parked = previous_dir.join(file_name);
            fs::rename(&target, &parked)?;
            Some(parked)
        } else {
            None
        };

        if let Err(err) = fs::rename(self.dir.path().join(file_name), &target) {
            if let Some(parked) = &previous {
                restore(parked, &target);
            }
            return Err(err.into());
        }
        Ok(Swap { target, previous })
    }

    /// Delete the staging directory and everything in it.
    pub fn discard(self) -> Result<(), SinkError> {
        debug!("Discarding staged batch in {}", self.dir.path().display());
        self.dir.close()?;
        Ok(())
    }
}

fn roll_back(swaps: &[Swap]) {
    for swap in swaps.iter().rev() {
        if let Err(e) = fs::remove_file(&swap.target) {
            warn!("Failed to remove {}: {}", swap.target.display(), e);
        }
        if let Some(parked) = &swap.previous {
            restore(parked, &swap.target);
        }
    }
}

fn restore(parked: &Path, target: &Path) {
    if let Err(e) = fs::rename(parked, target) {
        warn!("Failed to restore {}: {}", target.display(), e);
    }
}
