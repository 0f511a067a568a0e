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

//! # Strata Core
//!
//! Foundational crate containing the resource contracts, the thread-safe handle
//! system and the primitives used to pair simulation-side objects with their
//! core-thread counterparts.
//!
//! The crate is organised around three concerns:
//! - [`resource`]: the [`Resource`](resource::Resource) trait, stable identities and
//!   dependency enumeration.
//! - [`handle`]: shared/weak handles that may exist before their resource does, and the
//!   [`HandleReadinessBroker`](handle::HandleReadinessBroker) that arbitrates every
//!   "pending → ready" transition in the process.
//! - [`core_object`]: dirty-flag accumulation, frame-scoped sync buffers and the core
//!   thread that owns every counterpart object.

#![warn(missing_docs)]

pub mod core_object;
pub mod error;
pub mod event;
pub mod handle;
pub mod resource;
pub mod utils;

pub use error::{ResourceError, Result};
pub use handle::{HResource, HandleReadinessBroker, ResourceHandle, WeakResourceHandle};
pub use resource::{Resource, ResourceUUID};
