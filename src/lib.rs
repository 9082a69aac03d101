//! File-backed collections of named user data.
//!
//! A [`DataFactory`] manages every resource of one kind (palettes, brushes,
//! presets and the like): it walks the configured search path, dispatches
//! files to the kind's loaders, keeps the result in a sorted, observable
//! [`Container`], and writes new or edited resources back to the user's
//! writable folder. Refreshing reuses resources whose files did not change, so
//! ids handed out earlier stay valid across reloads.
//!
//! Path strings come from a [`ConfigProvider`]; `paths` expands and resolves
//! them. Failures that affect a single file are collected into an
//! [`ErrorBatch`] instead of aborting the operation.

pub mod config;
pub mod error;
pub mod factory;
pub mod loader;
pub mod paths;
pub mod reconcile;
pub mod resource;

pub use config::{
    ConfigProvider, PathConfig, build_data_path, build_writable_path, load_config_from_path,
};
pub use error::{DataError, ErrorBatch, SaveError, WritableDirError};
pub use factory::{DataFactory, SearchPath};
pub use loader::{LoaderEntry, OBSOLETE_DIR_NAME, find_loader};
pub use paths::{expand_and_parse, expand_path, parse_path_list, resolve_writable_dir};
pub use reconcile::RefreshCache;
pub use resource::{
    Container, ContainerEvent, Resource, ResourceData, ResourceId, ResourceInfo, duplicate_name,
};
