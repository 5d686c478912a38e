//! Output directory for generated server sources.

use cap_std::ambient_authority;
use cap_std::fs_utf8::Dir;
use camino::{Utf8Path, Utf8PathBuf};
use std::io;
use std::sync::Arc;
use thiserror::Error;
use tracing::debug;

const WRITE_PROBE: &str = ".slipway-write-probe";

/// Errors raised while touching the output directory.
#[derive(Debug, Clone, Error)]
pub enum WorkspaceError {
    /// The directory cannot be created or written to.
    #[error("output directory {path} is not writable: {source}")]
    NotWritable {
        /// Directory path.
        path: Utf8PathBuf,
        /// Underlying I/O error.
        source: Arc<io::Error>,
    },

    /// Reading, writing or deleting a file failed.
    #[error("file operation on {path} failed: {source}")]
    Io {
        /// File path.
        path: Utf8PathBuf,
        /// Underlying I/O error.
        source: Arc<io::Error>,
    },
}

impl WorkspaceError {
    fn not_writable(path: &Utf8Path, source: io::Error) -> Self {
        Self::NotWritable {
            path: path.to_owned(),
            source: Arc::new(source),
        }
    }

    fn io(path: &Utf8Path, source: io::Error) -> Self {
        Self::Io {
            path: path.to_owned(),
            source: Arc::new(source),
        }
    }
}

/// A file written into the workspace.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MaterializedFile {
    /// Path of the file.
    pub path: Utf8PathBuf,
    /// `false` when an identical file was already present.
    pub created: bool,
}

/// Directory that receives generated server sources.
#[derive(Debug, Clone)]
pub struct SourceWorkspace {
    root: Utf8PathBuf,
}

impl SourceWorkspace {
    /// Creates a workspace rooted at `root`. Nothing is touched yet.
    #[must_use]
    pub fn new(root: impl Into<Utf8PathBuf>) -> Self {
        Self { root: root.into() }
    }

    /// Returns the workspace root.
    #[must_use]
    pub fn root(&self) -> &Utf8Path {
        &self.root
    }

    /// Creates the directory if absent and checks it accepts writes.
    ///
    /// # Errors
    ///
    /// Returns [`WorkspaceError::NotWritable`] when either step fails.
    pub fn ensure_writable(&self) -> Result<(), WorkspaceError> {
        let dir = self.open_root()?;
        dir.write(WRITE_PROBE, b"")
            .map_err(|err| WorkspaceError::not_writable(&self.root, err))?;
        dir.remove_file(WRITE_PROBE)
            .map_err(|err| WorkspaceError::not_writable(&self.root, err))
    }

    /// Writes `contents` to `file_name` under the root.
    ///
    /// An existing file with identical contents is left alone and reported
    /// with `created == false`, so a rollback never deletes a file another
    /// deployment produced.
    ///
    /// # Errors
    ///
    /// Returns [`WorkspaceError`] when the directory or file cannot be
    /// written.
    pub fn materialize(
        &self,
        file_name: &str,
        contents: &str,
    ) -> Result<MaterializedFile, WorkspaceError> {
        let dir = self.open_root()?;
        let path = self.root.join(file_name);

        match dir.read_to_string(file_name) {
            Ok(existing) if existing == contents => {
                debug!(path = %path, "identical source already present");
                return Ok(MaterializedFile {
                    path,
                    created: false,
                });
            }
            Ok(_) => {}
            Err(err) if err.kind() == io::ErrorKind::NotFound => {}
            Err(err) => return Err(WorkspaceError::io(&path, err)),
        }

        dir.write(file_name, contents)
            .map_err(|err| WorkspaceError::io(&path, err))?;
        Ok(MaterializedFile {
            path,
            created: true,
        })
    }

    /// Deletes a file previously returned by [`Self::materialize`].
    ///
    /// A file that is already gone counts as removed.
    ///
    /// # Errors
    ///
    /// Returns [`WorkspaceError::Io`] when deletion fails.
    pub fn remove(&self, path: &Utf8Path) -> Result<(), WorkspaceError> {
        let Some(file_name) = path.file_name() else {
            return Err(WorkspaceError::io(
                path,
                io::Error::new(io::ErrorKind::InvalidInput, "path has no file name"),
            ));
        };
        let parent = path
            .parent()
            .filter(|parent| !parent.as_str().is_empty())
            .unwrap_or_else(|| Utf8Path::new("."));

        let dir = match Dir::open_ambient_dir(parent, ambient_authority()) {
            Ok(dir) => dir,
            Err(err) if err.kind() == io::ErrorKind::NotFound => return Ok(()),
            Err(err) => return Err(WorkspaceError::io(path, err)),
        };
        match dir.remove_file(file_name) {
            Ok(()) => Ok(()),
            Err(err) if err.kind() == io::ErrorKind::NotFound => Ok(()),
            Err(err) => Err(WorkspaceError::io(path, err)),
        }
    }

    fn open_root(&self) -> Result<Dir, WorkspaceError> {
        Dir::create_ambient_dir_all(&self.root, ambient_authority())
            .map_err(|err| WorkspaceError::not_writable(&self.root, err))?;
        Dir::open_ambient_dir(&self.root, ambient_authority())
            .map_err(|err| WorkspaceError::not_writable(&self.root, err))
    }
}
