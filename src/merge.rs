use serde::Serialize;

use crate::error::ModelError;
use crate::model::{Axis, GroupModel, GroupTree};

/// Which top-level keys a merge added and which it overwrote, per axis.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize)]
pub struct MergeReport {
    pub content: AxisMerge,
    pub function: AxisMerge,
}

#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize)]
pub struct AxisMerge {
    pub inserted: Vec<String>,
    pub replaced: Vec<String>,
}

impl MergeReport {
    pub fn axis(&self, axis: Axis) -> &AxisMerge {
        match axis {
            Axis::Content => &self.content,
            Axis::Function => &self.function,
        }
    }

    fn axis_mut(&mut self, axis: Axis) -> &mut AxisMerge {
        match axis {
            Axis::Content => &mut self.content,
            Axis::Function => &mut self.function,
        }
    }

    pub fn category_count(&self) -> usize {
        Axis::ALL
            .iter()
            .map(|a| self.axis(*a).inserted.len() + self.axis(*a).replaced.len())
            .sum()
    }
}

/// Last-write-wins at the category level: every key of `fragment` replaces the same key in
/// `live`; keys missing from `fragment` are left alone.
pub fn merge_tree(live: &mut GroupTree, fragment: &GroupTree) -> AxisMerge {
    let mut out = AxisMerge::default();
    for (name, node) in fragment.iter() {
        match live.insert(name.to_string(), node.clone()) {
            Some(_) => out.replaced.push(name.to_string()),
            None => out.inserted.push(name.to_string()),
        }
    }
    out
}

impl GroupModel {
    /// Merges both axes of `fragment`. The whole fragment is validated before anything is
    /// written, so a malformed fragment leaves the model as it was.
    pub fn merge(&mut self, fragment: &GroupModel) -> Result<MergeReport, ModelError> {
        fragment.validate()?;
        let mut report = MergeReport::default();
        for axis in Axis::ALL {
            *report.axis_mut(axis) = merge_tree(self.tree_mut(axis), fragment.tree(axis));
        }
        Ok(report)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{mark_uploaded, Node};

    fn upload(name: &str, items: &[&str]) -> GroupModel {
        let tree: GroupTree = [(mark_uploaded(name), Node::leaves(items.iter().copied()))]
            .into_iter()
            .collect();
        GroupModel::from_trees(tree, GroupTree::new())
    }

    #[test]
    fn same_name_upload_overwrites_instead_of_accumulating() {
        let mut model = GroupModel::new();
        model.merge(&upload("X", &["a", "b"])).expect("first merge");
        let report = model.merge(&upload("X", &["c"])).expect("second merge");

        assert_eq!(report.content.replaced, vec!["(Uploaded) X".to_string()]);
        assert!(report.content.inserted.is_empty());
        assert_eq!(
            model.tree(Axis::Content).get("(Uploaded) X"),
            Some(&Node::leaves(["c"]))
        );
        assert_eq!(model.tree(Axis::Content).len(), 1);
    }

    #[test]
    fn untouched_keys_survive_and_new_keys_append() {
        let mut model: GroupModel = serde_json::from_str(
            r#"{"contentGroups":{"History":["A","B"]},"functionGroups":{"Recall":["Summarize"]}}"#,
        )
        .expect("dataset");
        let report = model.merge(&upload("Maths", &["Fractions"])).expect("merge");

        assert_eq!(report.content.inserted, vec!["(Uploaded) Maths".to_string()]);
        assert_eq!(report.category_count(), 1);
        let keys: Vec<_> = model.tree(Axis::Content).keys().collect();
        assert_eq!(keys, vec!["History", "(Uploaded) Maths"]);
        assert_eq!(
            model.tree(Axis::Function).get("Recall"),
            Some(&Node::leaves(["Summarize"]))
        );
    }

    #[test]
    fn malformed_fragment_is_rejected_whole() {
        let mut model = upload("Keep", &["k"]);
        let before = model.clone();

        let bad_nested: GroupTree = [(String::new(), Node::leaves(["x"]))].into_iter().collect();
        let content: GroupTree = [
            ("Fine".to_string(), Node::leaves(["ok"])),
            ("Broken".to_string(), Node::Category(bad_nested)),
        ]
        .into_iter()
        .collect();
        let err = model
            .merge(&GroupModel::from_trees(content, GroupTree::new()))
            .expect_err("malformed");

        assert!(matches!(err, ModelError::EmptyCategoryName { .. }));
        assert_eq!(model, before);
    }
}
