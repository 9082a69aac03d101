//! Directory walk that turns data files into resources.
//!
//! Each search-path root is scanned for regular files first; only then are
//! subdirectories descended into, recursively, remembering which root they
//! came from so resources can be tagged by folder. Files are dispatched to the
//! first loader whose extension matches, with an extension-less fallback entry
//! catching the rest. A failing file is reported and the walk moves on.

use crate::error::{DataError, ErrorBatch};
use crate::paths::is_dir_writable;
use crate::reconcile::RefreshCache;
use crate::resource::{Container, Resource, ResourceData, file_mtime};
use std::collections::HashSet;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};

/// Files below a folder with this name are kept for compatibility only: they
/// go to the obsolete container and are never written or deleted.
pub const OBSOLETE_DIR_NAME: &str = "obsolete-files";

pub type LoadFn<T> = Box<dyn Fn(&Path) -> anyhow::Result<Vec<Resource<T>>>>;

/// One row of a factory's loader table.
pub struct LoaderEntry<T> {
    extension: Option<String>,
    writable: bool,
    load: LoadFn<T>,
}

impl<T> LoaderEntry<T> {
    /// Loader for files ending in `extension` (including the dot).
    ///
    /// `writable` says whether files read by this loader may be overwritten by
    /// the kind's save routine; formats that cannot be written back pass
    /// `false`.
    pub fn new(
        extension: impl Into<String>,
        writable: bool,
        load: impl Fn(&Path) -> anyhow::Result<Vec<Resource<T>>> + 'static,
    ) -> Self {
        Self {
            extension: Some(extension.into()),
            writable,
            load: Box::new(load),
        }
    }

    /// Catch-all loader; belongs at the end of the table.
    pub fn fallback(
        writable: bool,
        load: impl Fn(&Path) -> anyhow::Result<Vec<Resource<T>>> + 'static,
    ) -> Self {
        Self {
            extension: None,
            writable,
            load: Box::new(load),
        }
    }

    pub fn extension(&self) -> Option<&str> {
        self.extension.as_deref()
    }

    pub fn is_writable(&self) -> bool {
        self.writable
    }

    /// Extension match is ASCII case-insensitive; the fallback matches all.
    pub fn matches(&self, path: &Path) -> bool {
        let Some(extension) = self.extension.as_deref() else {
            return true;
        };
        let Some(file_name) = path.file_name().map(|name| name.to_string_lossy()) else {
            return false;
        };
        file_name.len() >= extension.len()
            && file_name.is_char_boundary(file_name.len() - extension.len())
            && file_name[file_name.len() - extension.len()..].eq_ignore_ascii_case(extension)
    }
}

/// First loader entry accepting `path`.
pub fn find_loader<'a, T>(entries: &'a [LoaderEntry<T>], path: &Path) -> Option<&'a LoaderEntry<T>> {
    entries.iter().find(|entry| entry.matches(path))
}

/// Walk state for one load pass.
pub(crate) struct DirectoryLoader<'a, T> {
    pub loaders: &'a [LoaderEntry<T>],
    pub writable: &'a [PathBuf],
    pub obsolete_marker: &'a str,
    pub container: &'a mut Container<T>,
    pub obsolete: &'a mut Container<T>,
    pub cache: Option<&'a mut RefreshCache<T>>,
    pub errors: ErrorBatch,
    visited: HashSet<PathBuf>,
}

impl<'a, T: ResourceData> DirectoryLoader<'a, T> {
    pub fn new(
        loaders: &'a [LoaderEntry<T>],
        writable: &'a [PathBuf],
        container: &'a mut Container<T>,
        obsolete: &'a mut Container<T>,
    ) -> Self {
        Self {
            loaders,
            writable,
            obsolete_marker: OBSOLETE_DIR_NAME,
            container,
            obsolete,
            cache: None,
            errors: ErrorBatch::new(),
            visited: HashSet::new(),
        }
    }

    pub fn with_cache(mut self, cache: &'a mut RefreshCache<T>) -> Self {
        self.cache = Some(cache);
        self
    }

    pub fn with_obsolete_marker(mut self, marker: &'a str) -> Self {
        self.obsolete_marker = marker;
        self
    }

    /// Load every root: all top-level files first, then each root's
    /// subdirectories.
    pub fn load_search_path(mut self, roots: &[PathBuf]) -> ErrorBatch {
        for root in roots {
            for file in self.list(root, EntryKind::File) {
                self.load_file(&file, root, None);
            }
        }
        for root in roots {
            for dir in self.list(root, EntryKind::Dir) {
                self.load_recursive(&dir, root);
            }
        }
        self.errors
    }

    fn load_recursive(&mut self, dir: &Path, top: &Path) {
        let canonical = fs::canonicalize(dir).unwrap_or_else(|_| dir.to_path_buf());
        if !self.visited.insert(canonical) {
            tracing::debug!("skipping already visited folder {}", dir.display());
            return;
        }
        for file in self.list(dir, EntryKind::File) {
            self.load_file(&file, dir, Some(top));
        }
        for sub in self.list(dir, EntryKind::Dir) {
            self.load_recursive(&sub, top);
        }
    }

    fn load_file(&mut self, path: &Path, dir: &Path, top: Option<&Path>) {
        let Some(loader) = find_loader(self.loaders, path) else {
            tracing::debug!("no loader for {}", path.display());
            return;
        };
        let mtime = file_mtime(path);

        if let Some(cache) = self.cache.as_deref_mut() {
            if let Some(cached) = cache.take_fresh(path, mtime) {
                tracing::debug!(
                    "reusing {} cached resource(s) for {}",
                    cached.len(),
                    path.display()
                );
                for resource in cached {
                    self.container.add(resource);
                }
                return;
            }
        }

        let resources = match (loader.load)(path) {
            Ok(resources) => resources,
            Err(err) => {
                let error = match err.downcast::<io::Error>() {
                    Ok(io_err) => DataError::open(path, io_err),
                    Err(err) => DataError::load(path, err),
                };
                self.errors.push(error);
                return;
            }
        };

        let obsolete = dir
            .components()
            .any(|component| component.as_os_str() == self.obsolete_marker);
        let deletable =
            !obsolete && resources.len() == 1 && is_dir_writable(dir, self.writable);
        let writable = deletable && loader.is_writable();
        tracing::debug!(
            "loaded {} resource(s) from {} (obsolete: {obsolete}, deletable: {deletable}, writable: {writable})",
            resources.len(),
            path.display()
        );

        for mut resource in resources {
            resource.set_path(path.to_path_buf(), writable, deletable);
            resource.set_mtime(mtime);
            resource.mark_clean();

            if obsolete {
                self.obsolete.add(resource);
            } else {
                resource.set_folder_tags(dir, top);
                self.container.add(resource);
            }
        }
    }

    // Sorted, non-hidden entries of one kind. A missing folder is not an
    // error: search paths routinely list folders the user never created.
    fn list(&mut self, dir: &Path, kind: EntryKind) -> Vec<PathBuf> {
        let read = match fs::read_dir(dir) {
            Ok(read) => read,
            Err(err) if err.kind() == io::ErrorKind::NotFound => return Vec::new(),
            Err(err) => {
                if kind == EntryKind::File {
                    self.errors.push(DataError::open(dir, err));
                }
                return Vec::new();
            }
        };

        let mut entries: Vec<PathBuf> = read
            .filter_map(Result::ok)
            .filter(|entry| !entry.file_name().to_string_lossy().starts_with('.'))
            .map(|entry| entry.path())
            .filter(|path| match kind {
                EntryKind::File => path.is_file(),
                EntryKind::Dir => path.is_dir(),
            })
            .collect();
        entries.sort();
        entries
    }
}

#[derive(Clone, Copy, PartialEq, Eq)]
enum EntryKind {
    File,
    Dir,
}
