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

//! Flags controlling resource loads.

strata_core::strata_bitflags! {
    /// Options controlling how a resource is loaded.
    pub struct ResourceLoadFlags: u8 {
        /// Load every declared dependency and only report the resource as
        /// loaded once they all finished.
        const LOAD_DEPENDENCIES = 1 << 0;
        /// Keep an internal reference so the resource stays loaded until it
        /// is explicitly released, even with no outside handles.
        const KEEP_INTERNAL_REF = 1 << 1;
        /// Ask the loader to keep the source data around after decoding.
        const KEEP_SOURCE_DATA = 1 << 2;
    }
}

impl ResourceLoadFlags {
    /// `LOAD_DEPENDENCIES | KEEP_INTERNAL_REF`.
    pub const DEFAULT: Self = Self::LOAD_DEPENDENCIES.union(Self::KEEP_INTERNAL_REF);

    /// Flags used for the dependencies of a resource loaded with `self`.
    pub fn for_dependencies(&self) -> Self {
        let mut flags = Self::LOAD_DEPENDENCIES;
        if self.contains(Self::KEEP_SOURCE_DATA) {
            flags.insert(Self::KEEP_SOURCE_DATA);
        }
        flags
    }
}
