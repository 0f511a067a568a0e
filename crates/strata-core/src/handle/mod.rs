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

//! Shared, blockable references to resources.
//!
//! A [`ResourceHandle`] can be handed out before its resource exists. Loaders
//! complete it later through [`ResourceHandle::set_handle_data`], which is the
//! single commit point from "pending" to "ready". Threads that need the
//! resource can poll [`ResourceHandle::is_loaded`] or sleep in
//! [`ResourceHandle::block_until_loaded`]; both optionally cascade into the
//! declared dependencies of the resource.
//!
//! Readiness transitions are arbitrated by a [`HandleReadinessBroker`], one
//! mutex/condition variable pair shared by all the handles created against it.

mod broker;
mod data;
mod listener;
mod strong;
mod weak;

pub use broker::HandleReadinessBroker;
pub use data::{DestroyHook, ResourceHandleData};
pub use listener::{ListenerEvent, ResourceListener};
pub use strong::{HResource, HandleTarget, ResourceHandle};
pub use weak::WeakResourceHandle;
