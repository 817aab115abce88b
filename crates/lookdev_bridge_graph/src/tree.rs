// SPDX-License-Identifier: MIT OR Apache-2.0
//! Dependency tree construction and node graph layout.
//!
//! Consumers are parents: a texture feeding a surface shader becomes a child
//! of the shader, and the shader a child of its material. Nodes that do not
//! feed anything yet are kept at root level until a consumer arrives and
//! adopts them. The graph is assumed to be acyclic.

use crate::node::NodeStore;
use serde::{Deserialize, Serialize};

/// Node graph layout constants
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct LayoutConfig {
    /// Width of a single node
    pub node_width: i64,
    /// Horizontal gap between sibling subtrees
    pub spacing: i64,
    /// Vertical distance between tree levels
    pub row_height: i64,
}

impl Default for LayoutConfig {
    fn default() -> Self {
        Self {
            node_width: 200,
            spacing: 60,
            row_height: 100,
        }
    }
}

/// A branch of the dependency tree
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct LayoutTree {
    /// Node name, empty for the virtual root
    pub name: String,
    /// Sibling ordering weight
    pub weight: i64,
    /// Upstream nodes consumed by this node
    pub children: Vec<LayoutTree>,
    /// Width of the whole subtree
    pub width: i64,
    /// Horizontal centre
    pub x: i64,
    /// Vertical position
    pub y: i64,
}

impl LayoutTree {
    fn leaf(name: &str, weight: i64) -> Self {
        Self {
            name: name.to_string(),
            weight,
            ..Self::default()
        }
    }

    /// Whether this is the virtual root
    pub fn is_root(&self) -> bool {
        self.name.is_empty()
    }

    /// Find a branch by node name
    pub fn find(&self, name: &str) -> Option<&LayoutTree> {
        if self.name == name {
            return Some(self);
        }
        self.children.iter().find_map(|child| child.find(name))
    }

    /// Names of the root-level nodes
    pub fn top_level(&self) -> Vec<String> {
        self.children.iter().map(|c| c.name.clone()).collect()
    }

    /// Positions of every node in depth-first order, root excluded
    pub fn positions(&self) -> Vec<(String, [i64; 2])> {
        let mut out = Vec::new();
        self.collect_positions(&mut out);
        out
    }

    fn collect_positions(&self, out: &mut Vec<(String, [i64; 2])>) {
        if !self.is_root() {
            out.push((self.name.clone(), [self.x, self.y]));
        }
        for child in &self.children {
            child.collect_positions(out);
        }
    }

    /// Number of nodes in the tree, root excluded
    pub fn len(&self) -> usize {
        self.children.iter().map(|c| 1 + c.len()).sum()
    }

    /// Whether the tree has no nodes
    pub fn is_empty(&self) -> bool {
        self.children.is_empty()
    }
}

/// Build the dependency tree of every laid-out record in store order
pub fn build(store: &NodeStore) -> LayoutTree {
    let mut root = LayoutTree::default();
    for (_, node) in store.iter() {
        if node.placeholder || node.name.is_empty() {
            continue;
        }
        insert(&mut root, store, &node.name);
    }
    tracing::debug!("Built dependency tree with {} top-level nodes", root.children.len());
    root
}

fn insert(root: &mut LayoutTree, store: &NodeStore, name: &str) {
    let Some(record) = store.get(name) else {
        return;
    };
    let mut leaf = LayoutTree::leaf(name, record.weight);

    // Root-level nodes this one consumes become its children
    let (adopted, kept): (Vec<_>, Vec<_>) = std::mem::take(&mut root.children)
        .into_iter()
        .partition(|branch| record.consumes(&branch.name));
    root.children = kept;
    leaf.children = adopted;

    let mut target = root;
    if let Some(path) = find_consumer(target, store, name) {
        for index in path {
            target = &mut target.children[index];
        }
    }
    target.children.push(leaf);
}

/// Path of child indices to the first branch, depth first, that consumes `leaf`
fn find_consumer(branch: &LayoutTree, store: &NodeStore, leaf: &str) -> Option<Vec<usize>> {
    if store.get(&branch.name).is_some_and(|n| n.consumes(leaf)) {
        return Some(Vec::new());
    }
    branch.children.iter().enumerate().find_map(|(i, child)| {
        find_consumer(child, store, leaf).map(|mut path| {
            path.insert(0, i);
            path
        })
    })
}

/// Compute subtree widths and node positions
///
/// Siblings are ordered by ascending weight, ties keeping insertion order.
pub fn layout(tree: &mut LayoutTree, config: &LayoutConfig) {
    measure(tree, config);
    place(tree, 0, 0, config);
}

fn measure(branch: &mut LayoutTree, config: &LayoutConfig) -> i64 {
    branch.width = if branch.children.is_empty() {
        config.node_width
    } else {
        let count = branch.children.len() as i64;
        let total: i64 = branch.children.iter_mut().map(|c| measure(c, config)).sum();
        total + (count - 1) * config.spacing
    };
    branch.width
}

fn place(branch: &mut LayoutTree, x: i64, depth: i64, config: &LayoutConfig) {
    branch.x = x;
    branch.y = depth * config.row_height;
    branch.children.sort_by_key(|c| c.weight);

    let mut pos = x - branch.width / 2;
    for child in &mut branch.children {
        place(child, pos + child.width / 2, depth + 1, config);
        pos += child.width + config.spacing;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::node::{Endpoint, NodeRecord};
    use proptest::prelude::*;

    fn feeds(name: &str, sources: &[&str]) -> NodeRecord {
        sources.iter().enumerate().fold(NodeRecord::new(name, "mix"), |node, (i, source)| {
            node.with_connection(format!("input{}", i + 1), Endpoint::new(*source))
        })
    }

    #[test]
    fn test_chain_becomes_single_branch() {
        let store: NodeStore = [feeds("A", &[]), feeds("B", &["A"]), feeds("C", &["B"])]
            .into_iter()
            .collect();
        let tree = build(&store);

        assert_eq!(tree.top_level(), vec!["C"]);
        let c = tree.find("C").unwrap();
        assert_eq!(c.children.len(), 1);
        assert_eq!(c.children[0].name, "B");
        assert_eq!(c.children[0].children[0].name, "A");
        assert_eq!(tree.len(), 3);
    }

    #[test]
    fn test_chain_in_reverse_order() {
        let store: NodeStore = [feeds("C", &["B"]), feeds("B", &["A"]), feeds("A", &[])]
            .into_iter()
            .collect();
        let tree = build(&store);

        assert_eq!(tree.top_level(), vec!["C"]);
        assert_eq!(tree.find("B").unwrap().children[0].name, "A");
    }

    #[test]
    fn test_orphans_adopted_by_consumer() {
        let store: NodeStore = [feeds("X", &[]), feeds("Y", &[]), feeds("Z", &["X", "Y"])]
            .into_iter()
            .collect();
        let mut tree = build(&store);
        layout(&mut tree, &LayoutConfig::default());

        assert_eq!(tree.top_level(), vec!["Z"]);
        let z = tree.find("Z").unwrap();
        assert_eq!(z.width, 460);
        assert_eq!((z.x, z.y), (0, 100));

        let x = tree.find("X").unwrap();
        let y = tree.find("Y").unwrap();
        assert_eq!((x.x, x.y), (-130, 200));
        assert_eq!((y.x, y.y), (130, 200));
    }

    #[test]
    fn test_weight_orders_siblings() {
        let store: NodeStore = [
            feeds("X", &[]).with_weight(20),
            feeds("Y", &[]),
            feeds("W", &[]),
            feeds("Z", &["X", "Y", "W"]),
        ]
        .into_iter()
        .collect();
        let mut tree = build(&store);
        layout(&mut tree, &LayoutConfig::default());

        let order: Vec<_> = tree.find("Z").unwrap().children.iter().map(|c| c.name.as_str()).collect();
        assert_eq!(order, vec!["Y", "W", "X"]);
        assert!(tree.find("Y").unwrap().x < tree.find("W").unwrap().x);
        assert!(tree.find("W").unwrap().x < tree.find("X").unwrap().x);
    }

    #[test]
    fn test_placeholders_are_skipped() {
        let store: NodeStore = [
            feeds("A", &[]),
            NodeRecord::placeholder("Empty", Default::default()),
        ]
        .into_iter()
        .collect();
        let tree = build(&store);
        assert_eq!(tree.top_level(), vec!["A"]);
    }

    #[test]
    fn test_shared_source_goes_under_first_consumer() {
        let store: NodeStore = [
            feeds("tex", &[]),
            feeds("s1", &["tex"]),
            feeds("s2", &["tex"]),
        ]
        .into_iter()
        .collect();
        let tree = build(&store);

        assert_eq!(tree.top_level(), vec!["s1", "s2"]);
        assert_eq!(tree.find("s1").unwrap().children[0].name, "tex");
        assert!(tree.find("s2").unwrap().children.is_empty());
    }

    #[test]
    fn test_custom_layout_constants() {
        let store: NodeStore = [feeds("a", &[]), feeds("b", &[])].into_iter().collect();
        let mut tree = build(&store);
        let config = LayoutConfig {
            node_width: 100,
            spacing: 20,
            row_height: 50,
        };
        layout(&mut tree, &config);

        assert_eq!(tree.width, 220);
        assert_eq!(tree.positions(), vec![("a".to_string(), [-60, 50]), ("b".to_string(), [60, 50])]);
    }

    fn arbitrary_store() -> impl Strategy<Value = NodeStore> {
        proptest::collection::vec((proptest::collection::vec(any::<prop::sample::Index>(), 0..3), -2i64..3), 1..14)
            .prop_map(|specs| {
                let mut store = NodeStore::new();
                for (i, (sources, weight)) in specs.into_iter().enumerate() {
                    let mut node = NodeRecord::new(format!("n{i}"), "mix").with_weight(weight);
                    if i > 0 {
                        for (k, source) in sources.iter().enumerate() {
                            let j = source.index(i);
                            node = node.with_connection(format!("input{k}"), Endpoint::new(format!("n{j}")));
                        }
                    }
                    store.insert(node);
                }
                store
            })
    }

    proptest! {
        #[test]
        fn prop_layout_is_deterministic(store in arbitrary_store()) {
            let config = LayoutConfig::default();
            let mut first = build(&store);
            layout(&mut first, &config);
            let mut second = build(&store);
            layout(&mut second, &config);

            prop_assert_eq!(first.positions(), second.positions());
            prop_assert_eq!(first.len(), store.len());
        }

        #[test]
        fn prop_siblings_do_not_overlap(store in arbitrary_store()) {
            let config = LayoutConfig::default();
            let mut tree = build(&store);
            layout(&mut tree, &config);

            fn check(branch: &LayoutTree, config: &LayoutConfig) -> bool {
                branch.children.windows(2).all(|pair| {
                    pair[1].x - pair[0].x == (pair[0].width + pair[1].width) / 2 + config.spacing
                        && pair[0].weight <= pair[1].weight
                }) && branch.children.iter().all(|c| check(c, config))
            }
            prop_assert!(check(&tree, &config));
        }
    }
}
