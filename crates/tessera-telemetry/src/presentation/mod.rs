// Copyright 2025 eraflo
//
// Licensed under the Apache License, Version 2.0 (the "License");
// you may not use this file except in compliance with the License.
// You may obtain a copy of the License at
//
//     http://www.apache.org/licenses/LICENSE-2.0
//
// Unless required by applicable law or agreed to in writing, software
// distributed under the License is distributed on an "AS IS" BASIS,
// WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
// See the License for the specific language governing permissions and
// limitations under the License.

//! Pull-based renderings of the live registry.
//!
//! A presentation handler is a sink without a timer: the hosting process
//! mounts it under [`PresentationHandler::path`] and calls
//! [`PresentationHandler::render`] on each request.

pub mod json;
pub mod prometheus;

use std::fmt::Debug;

/// An error raised while rendering the registry.
#[derive(Debug, thiserror::Error)]
pub enum PresentationError {
    /// The requesting user may not view metrics.
    #[error("User {} is not allowed to view metrics", .0.as_deref().unwrap_or("<anonymous>"))]
    Forbidden(Option<String>),
    /// The snapshot could not be encoded.
    #[error("Serialization error: {0}")]
    Serialization(String),
}

/// Renders the registry on request.
pub trait PresentationHandler: Send + Sync + Debug {
    /// Path under which the handler is mounted.
    fn path(&self) -> &str;

    /// MIME type of [`render`](Self::render) output.
    fn content_type(&self) -> &str;

    /// Renders the current registry for `user`.
    fn render(&self, user: Option<&str>) -> Result<String, PresentationError>;
}
