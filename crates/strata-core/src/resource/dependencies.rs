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

//! Dependency enumeration and the cascading checks built on it.

use super::{Resource, ResourceUUID};
use crate::error::{ResourceError, Result};
use crate::handle::HResource;
use std::collections::HashSet;

/// Returns an owned copy of the dependencies declared by `resource`.
pub fn collect_dependencies(resource: &dyn Resource) -> Vec<HResource> {
    let mut dependencies = Vec::new();
    resource.visit_dependencies(&mut |dependency| dependencies.push(dependency.clone()));
    dependencies
}

/// `true` when every transitive dependency of `resource` reports loaded.
///
/// Recurses without cycle protection.
pub(crate) fn dependencies_loaded(resource: &dyn Resource) -> bool {
    let mut all_loaded = true;
    resource.visit_dependencies(&mut |dependency| {
        if all_loaded && !dependency.is_loaded(true) {
            all_loaded = false;
        }
    });
    all_loaded
}

/// Blocks until every transitive dependency of `resource` is loaded.
///
/// The dependency list is copied into a scratch vector first so that no
/// borrow of the resource is held while blocking. The scratch vector is
/// released before returning.
pub(crate) fn block_on_dependencies(resource: &dyn Resource) {
    let scratch = collect_dependencies(resource);
    for dependency in &scratch {
        dependency.block_until_loaded(true);
    }
}

/// Searches the loaded part of the dependency graph of `root` for a cycle.
///
/// Returns [`ResourceError::DependencyCycle`] with the offending path (first and
/// last entries are the same resource) when one is reachable. Dependencies
/// that are not loaded yet have no known dependency list and end the walk.
///
/// This check is never run implicitly. Cascading waits on a cyclic graph do
/// not terminate.
pub fn find_dependency_cycle(root: &HResource) -> Result<()> {
    let mut stack = Vec::new();
    let mut finished = HashSet::new();
    visit(root, &mut stack, &mut finished)
}

fn visit(
    handle: &HResource,
    stack: &mut Vec<ResourceUUID>,
    finished: &mut HashSet<ResourceUUID>,
) -> Result<()> {
    if handle.is_null() {
        return Ok(());
    }

    let uuid = handle.uuid();
    if let Some(position) = stack.iter().position(|entry| *entry == uuid) {
        let mut path = stack[position..].to_vec();
        path.push(uuid);
        return Err(ResourceError::DependencyCycle { path });
    }
    if finished.contains(&uuid) {
        return Ok(());
    }

    if let Some(resource) = handle.resource() {
        stack.push(uuid);
        for dependency in collect_dependencies(resource.as_ref()) {
            visit(&dependency, stack, finished)?;
        }
        stack.pop();
    }

    finished.insert(uuid);
    Ok(())
}
