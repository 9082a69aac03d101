//! Ordered, name-unique collection of resources with change notification.
//!
//! The container owns its resources outright; callers hold [`ResourceId`]s.
//! Observers hear about every add/remove/rename, except while the container
//! is frozen: then changes are coalesced and delivered as a single
//! [`ContainerEvent::Batch`] when the outermost freeze is thawed.

use crate::resource::identity::ResourceId;
use crate::resource::model::{Resource, ResourceData, compare_resources};
use crate::resource::naming::unique_name;
use std::cmp::Ordering;
use std::collections::HashSet;
use std::fmt;
use std::path::{Path, PathBuf};

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum ContainerEvent {
    Added(ResourceId),
    Removed(ResourceId),
    Renamed(ResourceId),
    /// Net effect of everything that happened while frozen.
    Batch {
        added: Vec<ResourceId>,
        removed: Vec<ResourceId>,
    },
}

pub type Observer = Box<dyn FnMut(&ContainerEvent)>;

pub struct Container<T> {
    items: Vec<Resource<T>>,
    observers: Vec<Observer>,
    freeze_count: u32,
    pending_added: Vec<ResourceId>,
    pending_removed: Vec<ResourceId>,
}

impl<T> fmt::Debug for Container<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Container")
            .field("len", &self.items.len())
            .field("freeze_count", &self.freeze_count)
            .field("observers", &self.observers.len())
            .finish()
    }
}

impl<T> Default for Container<T> {
    fn default() -> Self {
        Self {
            items: Vec::new(),
            observers: Vec::new(),
            freeze_count: 0,
            pending_added: Vec::new(),
            pending_removed: Vec::new(),
        }
    }
}

impl<T: ResourceData> Container<T> {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    /// Resources in container order.
    pub fn iter(&self) -> impl Iterator<Item = &Resource<T>> {
        self.items.iter()
    }

    pub fn ids(&self) -> Vec<ResourceId> {
        self.items.iter().map(Resource::id).collect()
    }

    pub fn contains(&self, id: ResourceId) -> bool {
        self.index_of(id).is_some()
    }

    pub fn index_of(&self, id: ResourceId) -> Option<usize> {
        self.items.iter().position(|item| item.id() == id)
    }

    pub fn get(&self, id: ResourceId) -> Option<&Resource<T>> {
        self.items.iter().find(|item| item.id() == id)
    }

    /// Mutable access for content edits. Renames go through [`Container::rename`]
    /// so ordering and uniqueness are kept.
    pub fn get_mut(&mut self, id: ResourceId) -> Option<&mut Resource<T>> {
        self.items.iter_mut().find(|item| item.id() == id)
    }

    pub fn find_by_name(&self, name: &str) -> Option<&Resource<T>> {
        self.items.iter().find(|item| item.name() == name)
    }

    /// Register an observer for container changes.
    pub fn subscribe(&mut self, observer: impl FnMut(&ContainerEvent) + 'static) {
        self.observers.push(Box::new(observer));
    }

    /// Insert a resource at its sorted position, renaming it if its name is
    /// already taken.
    pub fn add(&mut self, mut resource: Resource<T>) -> ResourceId {
        let name = unique_name(resource.name(), |candidate| {
            self.items.iter().any(|item| item.name() == candidate)
        });
        if name != resource.name() {
            tracing::debug!("renaming '{}' to '{name}' to keep names unique", resource.name());
            resource.set_name(name);
        }

        let id = resource.id();
        let index = self
            .items
            .partition_point(|item| compare_resources(item, &resource) != Ordering::Greater);
        self.items.insert(index, resource);
        self.notify(ContainerEvent::Added(id));
        id
    }

    pub fn remove(&mut self, id: ResourceId) -> Option<Resource<T>> {
        let index = self.index_of(id)?;
        let resource = self.items.remove(index);
        self.notify(ContainerEvent::Removed(id));
        Some(resource)
    }

    /// Remove every resource matching `predicate`, keeping container order.
    pub fn remove_where(
        &mut self,
        mut predicate: impl FnMut(&Resource<T>) -> bool,
    ) -> Vec<Resource<T>> {
        let mut kept = Vec::with_capacity(self.items.len());
        let mut removed = Vec::new();
        for item in self.items.drain(..) {
            if predicate(&item) {
                removed.push(item);
            } else {
                kept.push(item);
            }
        }
        self.items = kept;
        for item in &removed {
            self.notify(ContainerEvent::Removed(item.id()));
        }
        removed
    }

    /// Rename a resource; returns the name it ended up with.
    pub fn rename(&mut self, id: ResourceId, name: &str) -> Option<String> {
        let index = self.index_of(id)?;
        let mut resource = self.items.remove(index);
        let name = unique_name(name, |candidate| {
            self.items.iter().any(|item| item.name() == candidate)
        });
        resource.set_name(name.clone());
        resource.mark_dirty();

        let index = self
            .items
            .partition_point(|item| compare_resources(item, &resource) != Ordering::Greater);
        self.items.insert(index, resource);
        self.notify(ContainerEvent::Renamed(id));
        Some(name)
    }

    /// The resource after `id`, or the one before it when `id` is last.
    pub fn neighbor_of(&self, id: ResourceId) -> Option<ResourceId> {
        let index = self.index_of(id)?;
        self.items
            .get(index + 1)
            .or_else(|| index.checked_sub(1).and_then(|prev| self.items.get(prev)))
            .map(Resource::id)
    }

    /// Give `id` an unused file in `dir`, steering clear of files other
    /// resources were assigned but have not written yet.
    pub(crate) fn assign_filename(&mut self, id: ResourceId, dir: &Path) {
        let claimed: HashSet<PathBuf> = self
            .items
            .iter()
            .filter(|item| item.id() != id)
            .filter_map(|item| item.path().map(Path::to_path_buf))
            .collect();
        if let Some(resource) = self.get_mut(id) {
            resource.create_filename(dir, |candidate| claimed.contains(candidate));
        }
    }

    /// Restore sort order after flags of resources changed in place.
    pub(crate) fn resort(&mut self) {
        self.items.sort_by(compare_resources);
    }

    pub fn freeze(&mut self) {
        self.freeze_count += 1;
    }

    /// Undo one `freeze`; the last thaw delivers the coalesced batch.
    pub fn thaw(&mut self) {
        if self.freeze_count == 0 {
            return;
        }
        self.freeze_count -= 1;
        if self.freeze_count == 0 {
            let event = ContainerEvent::Batch {
                added: std::mem::take(&mut self.pending_added),
                removed: std::mem::take(&mut self.pending_removed),
            };
            self.emit(&event);
        }
    }

    pub fn is_frozen(&self) -> bool {
        self.freeze_count > 0
    }

    fn notify(&mut self, event: ContainerEvent) {
        if !self.is_frozen() {
            self.emit(&event);
            return;
        }
        match event {
            ContainerEvent::Added(id) => {
                if let Some(pos) = self.pending_removed.iter().position(|p| *p == id) {
                    self.pending_removed.remove(pos);
                } else {
                    self.pending_added.push(id);
                }
            }
            ContainerEvent::Removed(id) => {
                if let Some(pos) = self.pending_added.iter().position(|p| *p == id) {
                    self.pending_added.remove(pos);
                } else {
                    self.pending_removed.push(id);
                }
            }
            ContainerEvent::Renamed(_) | ContainerEvent::Batch { .. } => {}
        }
    }

    fn emit(&mut self, event: &ContainerEvent) {
        for observer in &mut self.observers {
            observer(event);
        }
    }
}
