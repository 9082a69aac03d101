//! Incremental refresh of a container from disk.
//!
//! Before the walk, every file-backed resource is moved out of the container
//! into a [`RefreshCache`] keyed by its file. During the walk a file whose
//! modification time still matches the cached one gets its old resources back
//! instead of being parsed again; whatever is left in the cache afterwards
//! belongs to files that disappeared and is dropped.

use crate::error::ErrorBatch;
use crate::loader::{DirectoryLoader, LoaderEntry};
use crate::resource::{Container, Resource, ResourceData};
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::time::SystemTime;

/// File path to the resources that were loaded from it.
pub struct RefreshCache<T> {
    entries: HashMap<PathBuf, Vec<Resource<T>>>,
}

impl<T> Default for RefreshCache<T> {
    fn default() -> Self {
        Self {
            entries: HashMap::new(),
        }
    }
}

impl<T: ResourceData> RefreshCache<T> {
    /// Move every non-internal, file-backed resource out of `container`.
    ///
    /// Resources that were never saved stay where they are.
    pub fn snapshot(container: &mut Container<T>) -> Self {
        let mut cache = Self::default();
        let taken = container.remove_where(|item| !item.is_internal() && item.path().is_some());
        for resource in taken {
            if let Some(path) = resource.path().map(Path::to_path_buf) {
                cache.entries.entry(path).or_default().push(resource);
            }
        }
        cache
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn contains(&self, path: &Path) -> bool {
        self.entries.contains_key(path)
    }

    /// Take the cached resources for `path` if the file is unchanged.
    ///
    /// The entry is removed either way; stale resources are dropped here so
    /// the freshly loaded ones replace them.
    pub fn take_fresh(
        &mut self,
        path: &Path,
        mtime: Option<SystemTime>,
    ) -> Option<Vec<Resource<T>>> {
        let cached = self.entries.remove(path)?;
        let cached_mtime = cached.first().and_then(Resource::mtime);
        match (cached_mtime, mtime) {
            (Some(old), Some(new)) if old == new => Some(cached),
            _ => {
                tracing::debug!("{} changed on disk, reloading", path.display());
                None
            }
        }
    }

    /// Drop everything left, returning how many resources went away.
    pub fn release(self) -> usize {
        let mut released = 0;
        for (path, resources) in self.entries {
            tracing::debug!(
                "{} no longer provides data, dropping {} resource(s)",
                path.display(),
                resources.len()
            );
            released += resources.len();
        }
        released
    }
}

/// Everything a refresh needs from its factory.
pub(crate) struct Reconciler<'a, T> {
    pub loaders: &'a [LoaderEntry<T>],
    pub obsolete_marker: &'a str,
    pub container: &'a mut Container<T>,
    pub obsolete: &'a mut Container<T>,
}

impl<'a, T: ResourceData> Reconciler<'a, T> {
    /// Re-walk `roots`, reusing unchanged resources.
    ///
    /// The container is frozen for the whole pass so observers see a single
    /// batch. The obsolete container is rebuilt from scratch.
    pub fn refresh(mut self, roots: &[PathBuf], writable: &[PathBuf]) -> ErrorBatch {
        self.container.freeze();

        let mut cache = RefreshCache::snapshot(&mut *self.container);
        self.obsolete.remove_where(|_| true);

        let errors = DirectoryLoader::new(
            self.loaders,
            writable,
            &mut *self.container,
            &mut *self.obsolete,
        )
        .with_obsolete_marker(self.obsolete_marker)
        .with_cache(&mut cache)
        .load_search_path(roots);

        let released = cache.release();
        if released > 0 {
            tracing::debug!("refresh dropped {released} resource(s) whose files are gone");
        }

        self.container.thaw();
        errors
    }
}
