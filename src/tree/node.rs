use std::{
    cell::{Ref, RefCell, RefMut},
    fmt,
    rc::{Rc, Weak},
};

use crate::{dom::ElementRef, error::RouterError, record::RouteRecord};

/// Visitor result for [`RouteNode::traverse`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Traversal {
    #[default]
    Continue,
    /// Do not descend into the children of the visited node.
    SkipChildren,
}

struct NodeInner {
    key: String,
    value: RefCell<RouteRecord>,
    parent: RefCell<Weak<NodeInner>>,
    children: RefCell<Vec<RouteNode>>,
}

/// A node of the route tree. Cloning yields another handle to the same node; equality is
/// node identity.
#[derive(Clone)]
pub struct RouteNode(Rc<NodeInner>);

impl RouteNode {
    pub fn new(record: RouteRecord) -> RouteNode {
        RouteNode(Rc::new(NodeInner {
            key: record.id.clone(),
            value: RefCell::new(record),
            parent: RefCell::new(Weak::new()),
            children: RefCell::new(Vec::new()),
        }))
    }

    pub fn key(&self) -> &str {
        &self.0.key
    }

    pub fn value(&self) -> Ref<'_, RouteRecord> {
        self.0.value.borrow()
    }

    pub fn value_mut(&self) -> RefMut<'_, RouteRecord> {
        self.0.value.borrow_mut()
    }

    pub fn tag_name(&self) -> String {
        self.value().tag_name.clone()
    }

    /// The element currently mounted for this route.
    pub fn element(&self) -> Option<ElementRef> {
        self.value().element.clone()
    }

    pub fn set_element(&self, element: Option<ElementRef>) {
        self.value_mut().element = element;
    }

    pub fn parent(&self) -> Option<RouteNode> {
        self.0.parent.borrow().upgrade().map(RouteNode)
    }

    pub fn children(&self) -> Vec<RouteNode> {
        self.0.children.borrow().clone()
    }

    /// Ancestors from the immediate parent up to the root.
    pub fn ancestors(&self) -> Vec<RouteNode> {
        let mut ancestors = Vec::new();
        let mut node = self.parent();
        while let Some(current) = node {
            node = current.parent();
            ancestors.push(current);
        }
        ancestors
    }

    pub fn root(&self) -> RouteNode {
        let mut root = self.clone();
        while let Some(parent) = root.parent() {
            root = parent;
        }
        root
    }

    /// Depth-first, pre-order search of the subtree rooted at this node.
    pub fn node_by_key(&self, key: &str) -> Option<RouteNode> {
        if self.key() == key {
            return Some(self.clone());
        }
        self.children()
            .iter()
            .find_map(|child| child.node_by_key(key))
    }

    /// Visit this node and its descendants depth-first in pre-order.
    pub fn traverse<F>(&self, visitor: &mut F)
    where
        F: FnMut(&RouteNode) -> Traversal,
    {
        if visitor(self) == Traversal::SkipChildren {
            return;
        }
        for child in self.children() {
            child.traverse(visitor);
        }
    }

    pub fn add_child(&self, child: RouteNode) -> Result<(), RouterError> {
        let len = self.0.children.borrow().len();
        self.add_child_at(child, len)
    }

    pub fn add_child_at(&self, child: RouteNode, index: usize) -> Result<(), RouterError> {
        if child.parent().is_some() {
            return Err(RouterError::ExistingParent(child.key().to_string()));
        }
        if child == *self || self.ancestors().contains(&child) {
            return Err(RouterError::Cycle(child.key().to_string()));
        }
        let len = self.0.children.borrow().len();
        if index > len {
            return Err(RouterError::IndexOutOfBounds { index, len });
        }
        *child.0.parent.borrow_mut() = Rc::downgrade(&self.0);
        self.0.children.borrow_mut().insert(index, child);
        Ok(())
    }

    pub fn remove_child_at(&self, index: usize) -> Option<RouteNode> {
        let mut children = self.0.children.borrow_mut();
        if index >= children.len() {
            return None;
        }
        let child = children.remove(index);
        *child.0.parent.borrow_mut() = Weak::new();
        Some(child)
    }

    pub fn remove_child(&self, child: &RouteNode) -> Option<RouteNode> {
        let index = self.0.children.borrow().iter().position(|c| c == child)?;
        self.remove_child_at(index)
    }

    /// True if this route or any of its ancestors requires authentication.
    pub fn requires_authentication(&self) -> bool {
        if self.value().requires_authentication {
            return true;
        }
        match self.parent() {
            Some(parent) => parent.requires_authentication(),
            None => false,
        }
    }
}

impl PartialEq for RouteNode {
    fn eq(&self, other: &Self) -> bool {
        Rc::ptr_eq(&self.0, &other.0)
    }
}

impl Eq for RouteNode {}

impl fmt::Debug for RouteNode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let value = self.value();
        f.debug_struct("RouteNode")
            .field("key", &self.0.key)
            .field("tag_name", &value.tag_name)
            .field("path", &value.path)
            .field("mounted", &value.element.is_some())
            .field("children", &self.0.children.borrow().len())
            .finish()
    }
}
