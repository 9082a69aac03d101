//! Resources and the containers that hold them.
//!
//! `model` defines the resource itself and the [`ResourceData`] capabilities a
//! kind plugs in; `container` is the ordered, observable collection a factory
//! owns; `naming` holds the name and file-name rules shared by both.

pub mod container;
pub mod identity;
pub mod model;
pub mod naming;

pub use container::{Container, ContainerEvent, Observer};
pub use identity::{ResourceId, ResourceInfo};
pub use model::{Resource, ResourceData, compare_resources, file_mtime};
pub use naming::{COPY_WORD, duplicate_name, duplicate_name_with};
