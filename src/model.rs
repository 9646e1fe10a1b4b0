use std::fmt;

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};

use crate::error::ModelError;

/// Prefix carried by every top-level category that came from a spreadsheet upload.
pub const UPLOADED_MARKER: &str = "(Uploaded) ";

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Axis {
    Content,
    Function,
}

impl Axis {
    pub const ALL: [Axis; 2] = [Axis::Content, Axis::Function];

    pub fn other(self) -> Self {
        match self {
            Self::Content => Self::Function,
            Self::Function => Self::Content,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Content => "content",
            Self::Function => "function",
        }
    }
}

impl fmt::Display for Axis {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A category body: either the selectable items themselves or further subcategories.
///
/// In the JSON dataset a JSON array is `Leaves` and a JSON object is `Category`.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Node {
    Leaves(Vec<String>),
    Category(GroupTree),
}

/// What a path inside a [`GroupTree`] points at.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Entry<'a> {
    Category(&'a Node),
    Leaf(&'a str),
}

impl Node {
    pub fn leaves(items: impl IntoIterator<Item = impl Into<String>>) -> Self {
        Self::Leaves(items.into_iter().map(Into::into).collect())
    }

    fn resolve<'a>(&'a self, rest: &[String]) -> Option<Entry<'a>> {
        let Some((next, tail)) = rest.split_first() else {
            return Some(Entry::Category(self));
        };
        match self {
            Node::Category(tree) => tree.resolve(rest),
            Node::Leaves(items) if tail.is_empty() => items
                .iter()
                .find(|item| *item == next)
                .map(|item| Entry::Leaf(item.as_str())),
            Node::Leaves(_) => None,
        }
    }

    /// Visits every category and leaf strictly below this node. `path` is the path of this
    /// node and is restored before returning.
    pub fn visit_descendants(&self, path: &mut Vec<String>, visit: &mut dyn FnMut(&[String], Entry<'_>)) {
        match self {
            Node::Leaves(items) => {
                for item in items {
                    path.push(item.clone());
                    visit(path.as_slice(), Entry::Leaf(item));
                    path.pop();
                }
            }
            Node::Category(tree) => tree.visit_from(path, visit),
        }
    }

    pub fn leaf_count(&self) -> usize {
        match self {
            Node::Leaves(items) => items.len(),
            Node::Category(tree) => tree.leaf_count(),
        }
    }

    fn validate(&self, parent: &str) -> Result<(), ModelError> {
        match self {
            Node::Leaves(_) => Ok(()),
            Node::Category(tree) => tree.validate(parent),
        }
    }
}

/// Insertion-ordered mapping from category name to its body.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct GroupTree(IndexMap<String, Node>);

impl GroupTree {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn get(&self, name: &str) -> Option<&Node> {
        self.0.get(name)
    }

    pub fn contains(&self, name: &str) -> bool {
        self.0.contains_key(name)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &Node)> {
        self.0.iter().map(|(k, v)| (k.as_str(), v))
    }

    pub fn keys(&self) -> impl Iterator<Item = &str> {
        self.0.keys().map(|k| k.as_str())
    }

    /// Inserts or overwrites a category, returning the body it replaced.
    /// An overwritten key keeps its position; a new key goes to the end.
    pub(crate) fn insert(&mut self, name: String, node: Node) -> Option<Node> {
        self.0.insert(name, node)
    }

    pub(crate) fn leaves_mut(&mut self, name: &str) -> Option<&mut Vec<String>> {
        match self.0.get_mut(name) {
            Some(Node::Leaves(items)) => Some(items),
            _ => None,
        }
    }

    pub fn resolve(&self, path: &[String]) -> Option<Entry<'_>> {
        let (first, _) = path.split_first()?;
        self.0.get(first)?.resolve(&path[1..])
    }

    /// Depth-first walk over every category and leaf, in insertion order. Paths of leaves end
    /// with the leaf value.
    pub fn visit(&self, visit: &mut dyn FnMut(&[String], Entry<'_>)) {
        let mut path = Vec::new();
        self.visit_from(&mut path, visit);
    }

    fn visit_from(&self, path: &mut Vec<String>, visit: &mut dyn FnMut(&[String], Entry<'_>)) {
        for (name, node) in &self.0 {
            path.push(name.clone());
            visit(path.as_slice(), Entry::Category(node));
            node.visit_descendants(path, visit);
            path.pop();
        }
    }

    pub fn for_each_leaf(&self, mut f: impl FnMut(&[String], &str)) {
        self.visit(&mut |path, entry| {
            if let Entry::Leaf(value) = entry {
                f(path, value);
            }
        });
    }

    pub fn leaf_count(&self) -> usize {
        self.0.values().map(Node::leaf_count).sum()
    }

    pub fn validate(&self, parent: &str) -> Result<(), ModelError> {
        for (name, node) in &self.0 {
            validate_category(parent, name, node)?;
        }
        Ok(())
    }
}

impl FromIterator<(String, Node)> for GroupTree {
    fn from_iter<T: IntoIterator<Item = (String, Node)>>(iter: T) -> Self {
        Self(iter.into_iter().collect())
    }
}

pub(crate) fn validate_category(parent: &str, name: &str, node: &Node) -> Result<(), ModelError> {
    if name.trim().is_empty() {
        return Err(ModelError::EmptyCategoryName {
            parent: parent.to_string(),
        });
    }
    let scope = if parent.is_empty() {
        name.to_string()
    } else {
        format!("{parent} > {name}")
    };
    node.validate(&scope)
}

/// The two independent hierarchies. Serialized in the dataset shape
/// `{ "contentGroups": ..., "functionGroups": ... }`.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GroupModel {
    #[serde(default)]
    content_groups: GroupTree,
    #[serde(default)]
    function_groups: GroupTree,
}

impl GroupModel {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_trees(content_groups: GroupTree, function_groups: GroupTree) -> Self {
        Self {
            content_groups,
            function_groups,
        }
    }

    pub fn tree(&self, axis: Axis) -> &GroupTree {
        match axis {
            Axis::Content => &self.content_groups,
            Axis::Function => &self.function_groups,
        }
    }

    pub(crate) fn tree_mut(&mut self, axis: Axis) -> &mut GroupTree {
        match axis {
            Axis::Content => &mut self.content_groups,
            Axis::Function => &mut self.function_groups,
        }
    }

    pub fn is_empty(&self) -> bool {
        self.content_groups.is_empty() && self.function_groups.is_empty()
    }

    pub fn validate(&self) -> Result<(), ModelError> {
        self.content_groups.validate("")?;
        self.function_groups.validate("")
    }

    /// Inserts or overwrites one top-level category. A malformed body leaves the model untouched.
    pub fn merge_category(
        &mut self,
        axis: Axis,
        name: impl Into<String>,
        node: Node,
    ) -> Result<Option<Node>, ModelError> {
        let name = name.into();
        validate_category("", &name, &node)?;
        Ok(self.tree_mut(axis).insert(name, node))
    }

    /// Splits the top-level keys of one axis into (preloaded, uploaded).
    pub fn partition(&self, axis: Axis) -> (Vec<&str>, Vec<&str>) {
        self.tree(axis).keys().partition(|k| !is_uploaded(k))
    }
}

pub fn is_uploaded(name: &str) -> bool {
    name.starts_with(UPLOADED_MARKER)
}

/// Prefixes `name` with [`UPLOADED_MARKER`] unless it already carries it.
pub fn mark_uploaded(name: &str) -> String {
    if is_uploaded(name) {
        name.to_string()
    } else {
        format!("{UPLOADED_MARKER}{name}")
    }
}
