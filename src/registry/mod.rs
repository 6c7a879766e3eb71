//! Component registry and npm registry clients.

pub mod component;
pub mod npm;

pub use component::{
    ComponentDescriptor, ComponentRegistry, ComponentUpload, GitDescriptor, HttpComponentRegistry,
};
pub use npm::NpmRegistry;
