// Copyright (c) 2024-2025 Jesse Morgan / Morgan Forge
// SPDX-License-Identifier: AGPL-3.0-or-later

//! Boundary between the asset pipeline and the presentation layer.

use std::fmt;
use std::path::Path;

use anyhow::Result;

/// Identifier under which a cached file is bound as a displayable resource.
///
/// Rendered as `namespace:path`, for example `assetpack:glyphs/3f2a...png`.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ResourceId {
    namespace: String,
    path: String,
}

impl ResourceId {
    pub fn new(namespace: impl Into<String>, path: impl Into<String>) -> Self {
        Self {
            namespace: namespace.into(),
            path: path.into(),
        }
    }

    pub fn namespace(&self) -> &str {
        &self.namespace
    }

    pub fn path(&self) -> &str {
        &self.path
    }
}

impl fmt::Display for ResourceId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.namespace, self.path)
    }
}

/// The rendering context, implemented by the presentation layer.
///
/// Both methods are only ever called on the thread that owns the rendering
/// context: `register_source` once at startup, `bind_resource` from drained
/// scheduled applications.
pub trait ResourceHost {
    /// Register the resources directory as an overlay resource source.
    fn register_source(&mut self, resources_dir: &Path) -> Result<()>;

    /// Bind the local file at `file` as the resource identified by `id`,
    /// replacing any previous binding for that id.
    fn bind_resource(&mut self, file: &Path, id: &ResourceId) -> Result<()>;
}
