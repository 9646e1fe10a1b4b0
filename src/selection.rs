use std::collections::HashSet;
use std::fmt;

use crate::error::SelectionError;
use crate::model::{Axis, Entry, GroupTree};

pub const PATH_SEPARATOR: &str = " > ";

/// Value a bare HTML checkbox submits when it has no `value` attribute.
pub const CHECKBOX_SENTINEL: &str = "on";

/// Names from a tree root down to a category, or to a leaf (whose value is the last segment).
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct NodePath(Vec<String>);

impl NodePath {
    pub fn new(segments: Vec<String>) -> Self {
        Self(segments)
    }

    /// Parses `"History > Ancient > Marathon"`. Segments are trimmed; empty ones are dropped.
    pub fn parse(text: &str) -> Self {
        Self(
            text.split('>')
                .map(str::trim)
                .filter(|s| !s.is_empty())
                .map(str::to_string)
                .collect(),
        )
    }

    pub fn segments(&self) -> &[String] {
        &self.0
    }
}

impl fmt::Display for NodePath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0.join(PATH_SEPARATOR))
    }
}

/// Whether a leaf value may ever be drawn.
pub fn is_drawable_value(value: &str) -> bool {
    !value.trim().is_empty() && value != CHECKBOX_SENTINEL
}

fn toggle(set: &mut HashSet<Vec<String>>, path: &[String], on: bool) {
    if on {
        set.insert(path.to_vec());
    } else {
        set.remove(path);
    }
}

/// Checkbox state of one axis.
///
/// A checked category makes every leaf below it eligible, whatever the leaf's own box says.
/// Checking or unchecking a category also rewrites every box below it, and unchecking one clears
/// the boxes of the categories above it. Leaf boxes never change their ancestors.
#[derive(Clone, Debug)]
pub struct AxisToggles {
    axis: Axis,
    categories: HashSet<Vec<String>>,
    leaves: HashSet<Vec<String>>,
}

impl AxisToggles {
    pub fn new(axis: Axis) -> Self {
        Self {
            axis,
            categories: HashSet::new(),
            leaves: HashSet::new(),
        }
    }

    pub fn axis(&self) -> Axis {
        self.axis
    }

    fn unknown(&self, path: &[String]) -> SelectionError {
        SelectionError::UnknownPath {
            axis: self.axis,
            path: path.join(PATH_SEPARATOR),
        }
    }

    /// Toggles whatever `path` points at: a category (cascading) or a single leaf.
    pub fn set(&mut self, tree: &GroupTree, path: &[String], on: bool) -> Result<(), SelectionError> {
        match tree.resolve(path) {
            Some(Entry::Category(_)) => self.set_category(tree, path, on),
            Some(Entry::Leaf(_)) => self.set_leaf(tree, path, on),
            None => Err(self.unknown(path)),
        }
    }

    pub fn set_category(
        &mut self,
        tree: &GroupTree,
        path: &[String],
        on: bool,
    ) -> Result<(), SelectionError> {
        let Some(Entry::Category(node)) = tree.resolve(path) else {
            return Err(self.unknown(path));
        };
        toggle(&mut self.categories, path, on);
        if !on {
            // A checked ancestor would otherwise keep the unchecked subtree eligible.
            for k in 1..path.len() {
                self.categories.remove(&path[..k]);
            }
        }
        let (categories, leaves) = (&mut self.categories, &mut self.leaves);
        let mut walk = path.to_vec();
        node.visit_descendants(&mut walk, &mut |p, entry| match entry {
            Entry::Category(_) => toggle(categories, p, on),
            Entry::Leaf(_) => toggle(leaves, p, on),
        });
        Ok(())
    }

    pub fn set_leaf(&mut self, tree: &GroupTree, path: &[String], on: bool) -> Result<(), SelectionError> {
        if !matches!(tree.resolve(path), Some(Entry::Leaf(_))) {
            return Err(self.unknown(path));
        }
        toggle(&mut self.leaves, path, on);
        Ok(())
    }

    /// The "select all" box: checks or clears every category and leaf of the tree.
    pub fn set_all(&mut self, tree: &GroupTree, on: bool) {
        let (categories, leaves) = (&mut self.categories, &mut self.leaves);
        tree.visit(&mut |p, entry| match entry {
            Entry::Category(_) => toggle(categories, p, on),
            Entry::Leaf(_) => toggle(leaves, p, on),
        });
    }

    /// The raw state of one box.
    pub fn is_checked(&self, path: &[String]) -> bool {
        self.categories.contains(path) || self.leaves.contains(path)
    }

    pub fn is_leaf_eligible(&self, leaf_path: &[String]) -> bool {
        self.leaves.contains(leaf_path)
            || (1..leaf_path.len()).any(|k| self.categories.contains(&leaf_path[..k]))
    }

    /// Values of every eligible leaf, in tree order. Blank values and the checkbox sentinel are
    /// never included.
    pub fn eligible(&self, tree: &GroupTree) -> Vec<String> {
        let mut out = Vec::new();
        tree.for_each_leaf(|p, value| {
            if is_drawable_value(value) && self.is_leaf_eligible(p) {
                out.push(value.to_string());
            }
        });
        out
    }

    /// State of the aggregate "select all" box: true only when the tree has leaves and every one
    /// of them is eligible.
    pub fn all_selected(&self, tree: &GroupTree) -> bool {
        let mut any = false;
        let mut all = true;
        tree.for_each_leaf(|p, _| {
            any = true;
            all &= self.is_leaf_eligible(p);
        });
        any && all
    }

    /// Forgets every box at or below `prefix`.
    pub fn clear_under(&mut self, prefix: &[String]) {
        self.categories.retain(|p| !p.starts_with(prefix));
        self.leaves.retain(|p| !p.starts_with(prefix));
    }
}

/// Checkbox state of both axes.
#[derive(Clone, Debug)]
pub struct SelectionState {
    content: AxisToggles,
    function: AxisToggles,
}

impl Default for SelectionState {
    fn default() -> Self {
        Self {
            content: AxisToggles::new(Axis::Content),
            function: AxisToggles::new(Axis::Function),
        }
    }
}

impl SelectionState {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn axis(&self, axis: Axis) -> &AxisToggles {
        match axis {
            Axis::Content => &self.content,
            Axis::Function => &self.function,
        }
    }

    pub fn axis_mut(&mut self, axis: Axis) -> &mut AxisToggles {
        match axis {
            Axis::Content => &mut self.content,
            Axis::Function => &mut self.function,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::GroupModel;

    fn tree() -> GroupTree {
        let model: GroupModel = serde_json::from_str(
            r#"{"contentGroups": {
                "History": { "Ancient": ["Marathon", "Salamis"], "Modern": ["WW1", ""] },
                "Odd": ["on", "  ", "Real"]
            }}"#,
        )
        .expect("dataset");
        model.tree(Axis::Content).clone()
    }

    fn p(text: &str) -> Vec<String> {
        NodePath::parse(text).segments().to_vec()
    }

    #[test]
    fn path_parsing_trims_segments() {
        let path = NodePath::parse(" History >Ancient > > Marathon ");
        assert_eq!(path.segments(), &["History", "Ancient", "Marathon"]);
        assert_eq!(path.to_string(), "History > Ancient > Marathon");
    }

    #[test]
    fn blank_and_sentinel_values_are_never_eligible() {
        let tree = tree();
        let mut sel = AxisToggles::new(Axis::Content);
        sel.set_all(&tree, true);
        let eligible = sel.eligible(&tree);
        assert_eq!(eligible, vec!["Marathon", "Salamis", "WW1", "Real"]);
        assert!(eligible.iter().all(|v| is_drawable_value(v)));
    }

    #[test]
    fn category_toggle_cascades_both_ways_over_prior_leaf_state() {
        let tree = tree();
        let mut sel = AxisToggles::new(Axis::Content);
        sel.set_leaf(&tree, &p("History > Ancient > Salamis"), true).expect("leaf");
        sel.set_leaf(&tree, &p("History > Modern > WW1"), false).expect("leaf");

        sel.set_category(&tree, &p("History"), true).expect("category");
        assert_eq!(sel.eligible(&tree), vec!["Marathon", "Salamis", "WW1"]);
        assert!(sel.is_checked(&p("History > Ancient")));
        assert!(sel.is_checked(&p("History > Modern > WW1")));

        sel.set_category(&tree, &p("History"), false).expect("category");
        assert!(sel.eligible(&tree).is_empty());
        assert!(!sel.is_checked(&p("History > Ancient > Salamis")));
    }

    #[test]
    fn unchecking_a_subcategory_under_a_checked_parent_drops_its_leaves() {
        let tree = tree();
        let mut sel = AxisToggles::new(Axis::Content);
        sel.set_category(&tree, &p("History"), true).expect("category");
        sel.set_category(&tree, &p("History > Ancient"), false).expect("category");

        assert_eq!(sel.eligible(&tree), vec!["WW1"]);
        assert!(!sel.is_checked(&p("History")));
        assert!(sel.is_checked(&p("History > Modern")));
        assert!(!sel.is_leaf_eligible(&p("History > Ancient > Marathon")));

        sel.set_category(&tree, &p("History > Ancient"), true).expect("category");
        assert_eq!(sel.eligible(&tree), vec!["Marathon", "Salamis", "WW1"]);
    }

    #[test]
    fn checked_category_overrides_unchecked_leaf_below_it() {
        let tree = tree();
        let mut sel = AxisToggles::new(Axis::Content);
        sel.set_category(&tree, &p("History > Ancient"), true).expect("category");
        sel.set_leaf(&tree, &p("History > Ancient > Marathon"), false).expect("leaf");
        assert_eq!(sel.eligible(&tree), vec!["Marathon", "Salamis"]);
    }

    #[test]
    fn leaf_toggles_do_not_check_ancestors() {
        let tree = tree();
        let mut sel = AxisToggles::new(Axis::Content);
        sel.set(&tree, &p("History > Ancient > Marathon"), true).expect("leaf");
        sel.set(&tree, &p("History > Ancient > Salamis"), true).expect("leaf");
        assert!(!sel.is_checked(&p("History > Ancient")));
        assert_eq!(sel.eligible(&tree), vec!["Marathon", "Salamis"]);
    }

    #[test]
    fn select_all_indicator_needs_every_leaf() {
        let tree = tree();
        let mut sel = AxisToggles::new(Axis::Content);
        assert!(!sel.all_selected(&tree));
        sel.set_all(&tree, true);
        assert!(sel.all_selected(&tree));
        sel.set_category(&tree, &p("Odd"), false).expect("category");
        assert!(!sel.all_selected(&tree));
        sel.set_category(&tree, &p("Odd"), true).expect("category");
        assert!(sel.all_selected(&tree));

        assert!(!AxisToggles::new(Axis::Content).all_selected(&GroupTree::new()));
    }

    #[test]
    fn unknown_paths_are_reported_with_their_axis() {
        let tree = tree();
        let mut sel = AxisToggles::new(Axis::Function);
        let err = sel.set(&tree, &p("Geography"), true).expect_err("unknown");
        assert_eq!(
            err,
            SelectionError::UnknownPath {
                axis: Axis::Function,
                path: "Geography".to_string()
            }
        );
        assert!(sel.set_leaf(&tree, &p("History"), true).is_err());
        assert!(sel.set_category(&tree, &p("Odd > Real"), true).is_err());
    }

    #[test]
    fn clear_under_forgets_only_that_subtree() {
        let tree = tree();
        let mut sel = AxisToggles::new(Axis::Content);
        sel.set_all(&tree, true);
        sel.clear_under(&p("History"));
        assert_eq!(sel.eligible(&tree), vec!["Real"]);
    }
}
