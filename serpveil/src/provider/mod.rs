//! Search providers.
//!
//! This module provides:
//! - [`ProviderDescriptor`]: one search engine's result-page conventions as
//!   data (result locator, link strategy, marker placement, watch root)
//! - [`ProviderRegistry`]: the ordered hostname table that picks the
//!   descriptor for a page
//!
//! Shared logic never branches on a provider's name; everything a provider
//! does differently is a field of its descriptor.

mod descriptor;
mod registry;

pub use descriptor::{
    LinkStrategy, MarkerPlacement, ProviderDescriptor, ProviderKind, ResultLocator,
};
pub use registry::{select_provider, HostPattern, ProviderRegistry, RegistryEntry};

/// Attribute pairing a marker with the result it stands for.
pub const PAIR_ATTRIBUTE: &str = "data-serpveil-pair";

/// Attribute carrying the hidden hostname on a marker.
pub const HOST_ATTRIBUTE: &str = "data-serpveil-host";
