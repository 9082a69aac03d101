//! One factory per resource kind: loading, refresh, and the create /
//! duplicate / save / delete operations the rest of the application calls.
//!
//! The factory owns the live container and the obsolete container for its
//! kind, the loader table, and the names of the two configuration properties
//! holding its search path and writable subset. Configuration is passed in by
//! reference on every operation that touches disk so edits to the folder
//! preferences take effect without rebuilding factories.

use crate::config::ConfigProvider;
use crate::error::{DataError, ErrorBatch, SaveError};
use crate::loader::{DirectoryLoader, LoaderEntry, OBSOLETE_DIR_NAME};
use crate::paths::{expand_and_parse, resolve_writable_dir};
use crate::reconcile::Reconciler;
use crate::resource::{
    COPY_WORD, Container, ContainerEvent, Resource, ResourceData, ResourceId, ResourceInfo,
    duplicate_name_with,
};
use std::fmt;
use std::path::PathBuf;
use tracing::{debug, error, info, warn};

pub type ConstructorFn<T> = Box<dyn Fn(&str) -> Option<Resource<T>>>;
pub type StandardFn<T> = Box<dyn Fn() -> Resource<T>>;

/// Resolved folders for one operation.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct SearchPath {
    pub dirs: Vec<PathBuf>,
    pub writable: Vec<PathBuf>,
}

pub struct DataFactory<T> {
    kind: String,
    container: Container<T>,
    obsolete: Container<T>,
    path_property: String,
    writable_property: String,
    loaders: Vec<LoaderEntry<T>>,
    constructor: Option<ConstructorFn<T>>,
    standard_fn: Option<StandardFn<T>>,
    standard: Option<ResourceId>,
    copy_word: String,
    obsolete_marker: String,
}

impl<T> fmt::Debug for DataFactory<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DataFactory")
            .field("kind", &self.kind)
            .field("path_property", &self.path_property)
            .field("writable_property", &self.writable_property)
            .field("container", &self.container)
            .field("obsolete", &self.obsolete)
            .field("loaders", &self.loaders.len())
            .finish()
    }
}

impl<T: ResourceData> DataFactory<T> {
    /// Factory for `kind` reading its folders from the two named properties.
    ///
    /// Loader entries are tried in order; an extension-less fallback entry
    /// belongs last.
    pub fn new(
        kind: impl Into<String>,
        path_property: impl Into<String>,
        writable_property: impl Into<String>,
        loaders: Vec<LoaderEntry<T>>,
    ) -> Self {
        Self {
            kind: kind.into(),
            container: Container::new(),
            obsolete: Container::new(),
            path_property: path_property.into(),
            writable_property: writable_property.into(),
            loaders,
            constructor: None,
            standard_fn: None,
            standard: None,
            copy_word: COPY_WORD.to_string(),
            obsolete_marker: OBSOLETE_DIR_NAME.to_string(),
        }
    }

    /// Constructor used by [`DataFactory::new_resource`].
    pub fn with_constructor(
        mut self,
        constructor: impl Fn(&str) -> Option<Resource<T>> + 'static,
    ) -> Self {
        self.constructor = Some(Box::new(constructor));
        self
    }

    /// Builder of the kind's built-in fallback resource.
    pub fn with_standard(mut self, standard: impl Fn() -> Resource<T> + 'static) -> Self {
        self.standard_fn = Some(Box::new(standard));
        self
    }

    /// Localized word appended to duplicated names.
    pub fn with_copy_word(mut self, word: impl Into<String>) -> Self {
        self.copy_word = word.into();
        self
    }

    /// Folder name marking legacy files that only load into the obsolete
    /// container.
    pub fn with_obsolete_marker(mut self, marker: impl Into<String>) -> Self {
        self.obsolete_marker = marker.into();
        self
    }

    pub fn kind(&self) -> &str {
        &self.kind
    }

    pub fn container(&self) -> &Container<T> {
        &self.container
    }

    /// Mutable container access for content edits, renames and observers.
    pub fn container_mut(&mut self) -> &mut Container<T> {
        &mut self.container
    }

    pub fn obsolete(&self) -> &Container<T> {
        &self.obsolete
    }

    pub fn get(&self, id: ResourceId) -> Option<&Resource<T>> {
        self.container.get(id)
    }

    pub fn get_mut(&mut self, id: ResourceId) -> Option<&mut Resource<T>> {
        self.container.get_mut(id)
    }

    pub fn find_by_name(&self, name: &str) -> Option<&Resource<T>> {
        self.container.find_by_name(name)
    }

    /// Rename a resource, keeping names unique; returns the final name.
    pub fn rename(&mut self, id: ResourceId, name: &str) -> Option<String> {
        self.container.rename(id, name)
    }

    pub fn subscribe(&mut self, observer: impl FnMut(&ContainerEvent) + 'static) {
        self.container.subscribe(observer);
    }

    /// Id of the built-in fallback resource once `init` created it.
    pub fn standard(&self) -> Option<ResourceId> {
        self.standard
    }

    pub fn has_constructor(&self) -> bool {
        self.constructor.is_some()
    }

    /// Summary of every resource in container order.
    pub fn inventory(&self) -> Vec<ResourceInfo> {
        self.container.iter().map(Resource::info).collect()
    }

    /// Expand both configured path properties.
    pub fn search_path(&self, config: &dyn ConfigProvider) -> Result<SearchPath, DataError> {
        let dirs = expand_and_parse(config.property(&self.path_property).as_deref(), config)?;
        let writable =
            expand_and_parse(config.property(&self.writable_property).as_deref(), config)?;
        Ok(SearchPath { dirs, writable })
    }

    /// Folder new files of this kind are written to.
    pub fn writable_dir(&self, config: &dyn ConfigProvider) -> Result<PathBuf, DataError> {
        let paths = self.search_path(config)?;
        Ok(resolve_writable_dir(&paths.dirs, &paths.writable)?)
    }

    /// Cold load from disk (skipped when `no_data` is set) plus creation of
    /// the kind's standard resource.
    ///
    /// Load failures are returned as a batch; everything that did load stays.
    pub fn init(&mut self, config: &dyn ConfigProvider, no_data: bool) -> Result<(), ErrorBatch> {
        let mut errors = ErrorBatch::new();
        self.container.freeze();

        if !no_data {
            info!("loading '{}' data", self.kind);
            match self.search_path(config) {
                Ok(paths) => {
                    let batch = DirectoryLoader::new(
                        &self.loaders,
                        &paths.writable,
                        &mut self.container,
                        &mut self.obsolete,
                    )
                    .with_obsolete_marker(&self.obsolete_marker)
                    .load_search_path(&paths.dirs);
                    errors.extend(batch);
                }
                Err(err) => errors.push(err),
            }
        }

        self.ensure_standard();
        self.container.thaw();
        debug!(
            "'{}' holds {} resource(s), {} obsolete",
            self.kind,
            self.container.len(),
            self.obsolete.len()
        );
        errors.into_result()
    }

    fn ensure_standard(&mut self) {
        if self.standard.is_some_and(|id| self.container.contains(id)) {
            return;
        }
        let Some(build) = self.standard_fn.as_ref() else {
            return;
        };
        let mut standard = build();
        if !standard.is_internal() {
            standard.make_internal(format!("{}-standard", self.kind));
        }
        standard.mark_clean();
        self.standard = Some(self.container.add(standard));
    }

    /// Save dirty resources, then reload from disk reusing every resource
    /// whose file did not change.
    pub fn refresh(&mut self, config: &dyn ConfigProvider) -> Result<(), ErrorBatch> {
        let mut errors = ErrorBatch::new();
        self.container.freeze();

        if let Err(batch) = self.save_all(config) {
            errors.extend(batch);
        }

        match self.search_path(config) {
            Ok(paths) => {
                let batch = Reconciler {
                    loaders: &self.loaders,
                    obsolete_marker: &self.obsolete_marker,
                    container: &mut self.container,
                    obsolete: &mut self.obsolete,
                }
                .refresh(&paths.dirs, &paths.writable);
                errors.extend(batch);
            }
            Err(err) => errors.push(err),
        }

        self.container.thaw();
        errors.into_result()
    }

    /// Give unsaved resources a file in the writable folder and write every
    /// dirty, writable resource.
    ///
    /// A missing writable folder only affects resources that still need a
    /// file name; kinds without a save routine are skipped silently. Two
    /// unsaved resources never share a file name.
    ///
    /// A resource that was given a file name but failed to save keeps that
    /// name without a file behind it, so the next `refresh` drops it.
    pub fn save_all(&mut self, config: &dyn ConfigProvider) -> Result<(), ErrorBatch> {
        let mut errors = ErrorBatch::new();
        if self.container.is_empty() {
            return Ok(());
        }

        let needs_file = self
            .container
            .iter()
            .any(|item| !item.is_internal() && item.path().is_none());
        let writable_dir = if needs_file {
            match self.writable_dir(config) {
                Ok(dir) => Some(dir),
                Err(err) => {
                    errors.push(err);
                    None
                }
            }
        } else {
            None
        };

        if let Some(dir) = writable_dir.as_deref() {
            let unsaved: Vec<ResourceId> = self
                .container
                .iter()
                .filter(|item| !item.is_internal() && item.path().is_none())
                .map(Resource::id)
                .collect();
            for id in unsaved {
                self.container.assign_filename(id, dir);
            }
            self.container.resort();
        }

        for id in self.container.ids() {
            let Some(resource) = self.container.get_mut(id) else {
                continue;
            };
            if resource.is_internal() || resource.path().is_none() {
                continue;
            }
            if !(resource.is_dirty() && resource.is_writable()) {
                continue;
            }
            match resource.save() {
                Ok(()) => debug!("saved '{}'", resource.name()),
                Err(SaveError::Unsupported) => {}
                Err(SaveError::Failed(source)) => errors.push(DataError::Write {
                    name: resource.name().to_string(),
                    path: resource.path().map(PathBuf::from).unwrap_or_default(),
                    source,
                }),
            }
        }

        errors.into_result()
    }

    /// Save one resource, assigning it a file first if it has none.
    ///
    /// Clean resources succeed without touching disk.
    pub fn save_single(
        &mut self,
        config: &dyn ConfigProvider,
        id: ResourceId,
    ) -> Result<(), DataError> {
        let resource = self.container.get(id).ok_or(DataError::NotFound { id })?;
        if !resource.is_dirty() {
            return Ok(());
        }

        if resource.path().is_none() && !resource.is_internal() {
            let dir = self.writable_dir(config).inspect_err(|err| error!("{err}"))?;
            self.container.assign_filename(id, &dir);
            self.container.resort();
        }

        let resource = self
            .container
            .get_mut(id)
            .ok_or(DataError::NotFound { id })?;
        let name = resource.name().to_string();
        if !resource.is_writable() && !resource.is_internal() {
            return Err(DataError::NotWritable { name });
        }

        match resource.save() {
            Ok(()) => Ok(()),
            Err(SaveError::Unsupported) => Err(DataError::SaveUnsupported { name }),
            Err(SaveError::Failed(source)) => {
                let err = DataError::Write {
                    name,
                    path: resource.path().map(PathBuf::from).unwrap_or_default(),
                    source,
                };
                error!("{err}");
                Err(err)
            }
        }
    }

    /// Create a resource through the kind's constructor and add it, unsaved.
    ///
    /// Returns `None` when the kind has no constructor or it declined.
    pub fn new_resource(&mut self, name: &str) -> Option<ResourceId> {
        if name.is_empty() {
            warn!("refusing to create '{}' data with an empty name", self.kind);
            return None;
        }
        let constructor = self.constructor.as_ref()?;
        let Some(resource) = constructor(name) else {
            warn!("'{}' constructor returned nothing for '{name}'", self.kind);
            return None;
        };
        Some(self.container.add(resource))
    }

    /// Copy `source` under a derived name and add the copy, unsaved.
    pub fn duplicate(&mut self, source: ResourceId) -> Option<ResourceId> {
        let original = self.container.get(source)?;
        let mut copy = original.duplicate()?;
        copy.set_name(duplicate_name_with(original.name(), &self.copy_word));
        Some(self.container.add(copy))
    }

    /// Remove a resource, and its file too when `from_disk` is set.
    ///
    /// The resource stays removed from the collection even when deleting the
    /// file fails; the failure is returned.
    pub fn delete(&mut self, id: ResourceId, from_disk: bool) -> Result<(), DataError> {
        match self.container.get(id) {
            None => return Ok(()),
            Some(resource) if resource.is_internal() => {
                return Err(DataError::Internal {
                    name: resource.name().to_string(),
                });
            }
            Some(_) => {}
        }
        let Some(resource) = self.container.remove(id) else {
            return Ok(());
        };

        if from_disk && resource.path().is_some() {
            resource
                .delete_from_disk()
                .inspect_err(|err| error!("{err}"))?;
            debug!("deleted '{}' from disk", resource.name());
        }
        Ok(())
    }

    /// Drop every non-internal resource without touching disk.
    pub fn free(&mut self) {
        self.container.freeze();
        let dropped = self.container.remove_where(|item| !item.is_internal());
        debug!("freed {} '{}' resource(s)", dropped.len(), self.kind);
        self.container.thaw();
    }
}
