//! Access-gated resource tree traversal
//!
//! Pre-order, depth-first. A node the access decision marks as not
//! addressable is skipped together with its whole subtree, even when
//! descendants would be accessible on their own. Child types and instances
//! are visited in sorted order so enumeration is stable for a fixed tree.

use crate::kernel::ResourceTree;
use crate::model::{PathElement, ResourcePath};
use crate::rbac::AccessControl;

/// Callback for [`ResourceWalker::walk`]
pub trait ResourceVisitor {
    type Output;

    /// Visit an addressable resource; return true to descend into its children
    fn on_resource(&mut self, path: &ResourcePath) -> bool;

    fn into_result(self) -> Self::Output;
}

/// Walks a resource tree under an access-decision service
pub struct ResourceWalker<'a> {
    tree: &'a dyn ResourceTree,
    access: &'a dyn AccessControl,
}

impl<'a> ResourceWalker<'a> {
    pub fn new(tree: &'a dyn ResourceTree, access: &'a dyn AccessControl) -> Self {
        Self { tree, access }
    }

    /// Walk from `start` and return the visitor's result
    pub fn walk<V: ResourceVisitor>(&self, start: &ResourcePath, mut visitor: V) -> V::Output {
        self.visit(start, &mut visitor);
        visitor.into_result()
    }

    fn visit<V: ResourceVisitor>(&self, path: &ResourcePath, visitor: &mut V) {
        if !self.access.decide(path, false).addressable {
            return;
        }
        if !visitor.on_resource(path) {
            return;
        }

        let mut child_types = self.tree.child_types(path);
        child_types.sort();
        for child_type in child_types {
            let mut names = self.tree.child_names(path, &child_type);
            names.sort();
            for name in names {
                let child = path.append(PathElement::new(child_type.clone(), name));
                self.visit(&child, visitor);
            }
        }
    }
}

/// Collects every visited path
#[derive(Debug, Default)]
pub struct PathCollector {
    paths: Vec<ResourcePath>,
}

impl ResourceVisitor for PathCollector {
    type Output = Vec<ResourcePath>;

    fn on_resource(&mut self, path: &ResourcePath) -> bool {
        self.paths.push(path.clone());
        true
    }

    fn into_result(self) -> Vec<ResourcePath> {
        self.paths
    }
}
