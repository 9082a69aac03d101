//! A named, file-backed resource and the capabilities its content provides.
//!
//! `Resource<T>` carries the bookkeeping every kind shares (origin file,
//! modification time, writable/deletable/dirty flags); the kind-specific
//! payload `T` supplies saving, duplication and the file extension through
//! [`ResourceData`].

use crate::error::{DataError, SaveError};
use crate::resource::identity::{ResourceId, ResourceInfo};
use crate::resource::naming::{folder_tags, safe_file_stem, top_level_folder};
use std::cmp::Ordering;
use std::fmt;
use std::fs;
use std::path::{Path, PathBuf};
use std::time::SystemTime;

/// Kind-specific content of a resource.
///
/// Every method has a conservative default so read-only kinds only implement
/// what they need.
pub trait ResourceData: fmt::Debug {
    /// Extension (including the leading dot) used for newly created files.
    fn extension(&self) -> &str {
        ""
    }

    /// Whether `save` is implemented for this kind.
    fn can_save(&self) -> bool {
        false
    }

    /// Write the content to `path`.
    fn save(&self, _path: &Path) -> Result<(), SaveError> {
        Err(SaveError::Unsupported)
    }

    /// Deep copy of the content, if the kind supports duplication.
    fn duplicate(&self) -> Option<Self>
    where
        Self: Sized,
    {
        None
    }
}

#[derive(Debug)]
pub struct Resource<T> {
    id: ResourceId,
    name: String,
    path: Option<PathBuf>,
    mtime: Option<SystemTime>,
    writable: bool,
    deletable: bool,
    dirty: bool,
    internal: bool,
    identifier: Option<String>,
    folder_tag: Option<String>,
    tags: Vec<String>,
    content: T,
}

impl<T: ResourceData> Resource<T> {
    /// Fresh in-memory resource: dirty, deletable, and writable when the kind
    /// can save.
    pub fn new(name: impl Into<String>, content: T) -> Self {
        Self {
            id: ResourceId::next(),
            name: name.into(),
            path: None,
            mtime: None,
            writable: content.can_save(),
            deletable: true,
            dirty: true,
            internal: false,
            identifier: None,
            folder_tag: None,
            tags: Vec::new(),
            content,
        }
    }

    pub fn id(&self) -> ResourceId {
        self.id
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Absolute path of the backing file, `None` until first saved.
    pub fn path(&self) -> Option<&Path> {
        self.path.as_deref()
    }

    /// Last observed modification time of the backing file.
    pub fn mtime(&self) -> Option<SystemTime> {
        self.mtime
    }

    pub fn is_writable(&self) -> bool {
        self.writable
    }

    pub fn is_deletable(&self) -> bool {
        self.deletable
    }

    pub fn is_dirty(&self) -> bool {
        self.dirty
    }

    pub fn is_internal(&self) -> bool {
        self.internal
    }

    /// Stable identifier of an internal resource.
    pub fn identifier(&self) -> Option<&str> {
        self.identifier.as_deref()
    }

    /// First folder below the search-path root the file was found in.
    pub fn folder_tag(&self) -> Option<&str> {
        self.folder_tag.as_deref()
    }

    pub fn tags(&self) -> &[String] {
        &self.tags
    }

    pub fn content(&self) -> &T {
        &self.content
    }

    /// Mutable access to the content; the resource counts as edited.
    pub fn content_mut(&mut self) -> &mut T {
        self.dirty = true;
        &mut self.content
    }

    pub fn mark_dirty(&mut self) {
        self.dirty = true;
    }

    pub fn mark_clean(&mut self) {
        self.dirty = false;
    }

    /// Turn this into the kind's built-in fallback: never loaded, saved to or
    /// deleted from disk. Only the factory's standard resource gets here.
    pub(crate) fn make_internal(&mut self, identifier: impl Into<String>) {
        self.path = None;
        self.mtime = None;
        self.identifier = Some(identifier.into());
        self.writable = false;
        self.deletable = false;
        self.internal = true;
    }

    pub(crate) fn set_name(&mut self, name: String) {
        self.name = name;
    }

    pub(crate) fn set_mtime(&mut self, mtime: Option<SystemTime>) {
        self.mtime = mtime;
    }

    pub(crate) fn set_folder_tags(&mut self, dir: &Path, top: Option<&Path>) {
        if self.internal {
            return;
        }
        self.folder_tag = top_level_folder(dir, top);
        self.tags = folder_tags(dir, top);
    }

    /// Attach a backing file.
    ///
    /// The requested flags only stick when the file could actually be written
    /// (it exists and is writable, or it does not exist and its folder is
    /// writable); writable is dropped for kinds that cannot save.
    pub(crate) fn set_path(&mut self, path: PathBuf, writable: bool, deletable: bool) {
        if self.internal {
            return;
        }
        self.writable = false;
        self.deletable = false;

        if (writable || deletable) && can_write_to(&path) {
            self.writable = writable && self.content.can_save();
            self.deletable = deletable;
        }
        self.path = Some(path);
    }

    /// Pick an unused file name for this resource inside `dir`.
    ///
    /// A candidate is taken when it exists on disk or `is_claimed` says
    /// another resource was already given it but has not written it yet.
    pub(crate) fn create_filename(&mut self, dir: &Path, is_claimed: impl Fn(&Path) -> bool) {
        if self.internal {
            return;
        }
        let stem = safe_file_stem(&self.name);
        let extension = self.content.extension().to_string();

        let mut candidate = dir.join(format!("{stem}{extension}"));
        let mut counter = 1u32;
        while candidate.exists() || is_claimed(&candidate) {
            candidate = dir.join(format!("{stem}-{counter}{extension}"));
            counter += 1;
        }
        tracing::debug!("assigned {} to '{}'", candidate.display(), self.name);
        self.set_path(candidate, true, true);
    }

    /// Run the kind's save routine and record the new file time.
    ///
    /// Internal resources are only marked clean.
    pub(crate) fn save(&mut self) -> Result<(), SaveError> {
        if self.internal {
            self.dirty = false;
            return Ok(());
        }
        let Some(path) = self.path.clone() else {
            return Err(SaveError::Failed(anyhow::anyhow!(
                "'{}' has no file name assigned",
                self.name
            )));
        };

        self.content.save(&path)?;
        self.mtime = file_mtime(&path);
        self.dirty = false;
        Ok(())
    }

    /// Remove the backing file.
    pub(crate) fn delete_from_disk(&self) -> Result<(), DataError> {
        if self.internal {
            return Ok(());
        }
        let Some(path) = self.path.as_deref() else {
            return Ok(());
        };
        if !self.deletable {
            return Err(DataError::NotDeletable {
                path: path.to_path_buf(),
            });
        }
        fs::remove_file(path).map_err(|source| DataError::Delete {
            path: path.to_path_buf(),
            source,
        })
    }

    /// Copy with fresh identity, no name and no backing file.
    pub(crate) fn duplicate(&self) -> Option<Self> {
        let content = self.content.duplicate()?;
        Some(Self::new(String::new(), content))
    }

    pub fn info(&self) -> ResourceInfo {
        ResourceInfo {
            id: self.id,
            name: self.name.clone(),
            path: self.path.clone(),
            writable: self.writable,
            deletable: self.deletable,
            dirty: self.dirty,
            internal: self.internal,
            folder_tag: self.folder_tag.clone(),
            tags: self.tags.clone(),
        }
    }
}

/// Sort order of data containers: internal resources first, then deletable
/// (user) resources, then installed ones; by name within each group.
pub fn compare_resources<T>(a: &Resource<T>, b: &Resource<T>) -> Ordering {
    b.internal
        .cmp(&a.internal)
        .then_with(|| b.deletable.cmp(&a.deletable))
        .then_with(|| collate(&a.name, &b.name))
}

fn collate(a: &str, b: &str) -> Ordering {
    a.to_lowercase()
        .cmp(&b.to_lowercase())
        .then_with(|| a.cmp(b))
}

/// Modification time of a file, `None` when it cannot be read.
pub fn file_mtime(path: &Path) -> Option<SystemTime> {
    fs::metadata(path).and_then(|meta| meta.modified()).ok()
}

fn can_write_to(path: &Path) -> bool {
    if path.exists() {
        return has_write_access(path);
    }
    path.parent().is_some_and(has_write_access)
}

#[cfg(unix)]
fn has_write_access(path: &Path) -> bool {
    use std::ffi::CString;
    use std::os::unix::ffi::OsStrExt;

    let Ok(c_path) = CString::new(path.as_os_str().as_bytes()) else {
        return false;
    };
    // SAFETY: `c_path` is a valid NUL-terminated string that outlives the call.
    unsafe { libc::access(c_path.as_ptr(), libc::W_OK) == 0 }
}

#[cfg(not(unix))]
fn has_write_access(path: &Path) -> bool {
    fs::metadata(path)
        .map(|meta| !meta.permissions().readonly())
        .unwrap_or(false)
}
