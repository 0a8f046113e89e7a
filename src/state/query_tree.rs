//! Search-term tree
//!
//! Every query the crawl issues is a node in this tree. The root is the
//! master node with an empty search term; each child extends its parent's
//! term by one character. Nodes live in a flat arena and refer to each other
//! by index, so the parent link is a plain back-reference and the tree owns
//! every node top-down.
//!
//! The tree is append-only: nodes are never removed during a crawl, which
//! makes it the authoritative record of crawl progress.

use crate::SieveError;
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;

/// Index of a node in the query tree arena
pub type NodeId = usize;

/// A single search query and the results observed beneath it
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct QueryNode {
    search_term: String,
    parent: Option<NodeId>,
    children: Vec<NodeId>,
    expected_children: usize,
    completed_children: usize,
    reported_count: Option<usize>,
    own_results: Vec<String>,
    subtree_results: BTreeSet<String>,
    done: bool,
}

impl QueryNode {
    fn new(search_term: String, parent: Option<NodeId>) -> Self {
        Self {
            search_term,
            parent,
            children: Vec::new(),
            expected_children: 0,
            completed_children: 0,
            reported_count: None,
            own_results: Vec::new(),
            subtree_results: BTreeSet::new(),
            done: false,
        }
    }

    /// The exact string sent to the endpoint for this node
    pub fn search_term(&self) -> &str {
        &self.search_term
    }

    pub fn parent(&self) -> Option<NodeId> {
        self.parent
    }

    pub fn children(&self) -> &[NodeId] {
        &self.children
    }

    /// Whether this node has been narrowed into children
    pub fn is_expanded(&self) -> bool {
        !self.children.is_empty()
    }

    pub fn expected_children(&self) -> usize {
        self.expected_children
    }

    pub fn completed_children(&self) -> usize {
        self.completed_children
    }

    /// Result count the endpoint reported for this node's own fetch
    ///
    /// `None` until the node has been fetched. Nodes expanded without a
    /// fetch (the root and presplit terms) never get one.
    pub fn reported_count(&self) -> Option<usize> {
        self.reported_count
    }

    /// Identifiers returned directly by this node's fetch
    pub fn own_results(&self) -> &[String] {
        &self.own_results
    }

    /// Deduplicated identifiers returned anywhere in this subtree, own results included
    pub fn subtree_results(&self) -> &BTreeSet<String> {
        &self.subtree_results
    }

    pub fn is_done(&self) -> bool {
        self.done
    }
}

/// Arena holding every query node of a crawl
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct QueryTree {
    nodes: Vec<QueryNode>,
}

impl QueryTree {
    /// Index of the master node
    pub const ROOT: NodeId = 0;

    /// Creates a tree holding only the master node
    pub fn new() -> Self {
        Self {
            nodes: vec![QueryNode::new(String::new(), None)],
        }
    }

    /// Returns the node with the given id
    pub fn get(&self, id: NodeId) -> Option<&QueryNode> {
        self.nodes.get(id)
    }

    /// Returns the node with the given id or an invariant error
    pub fn node(&self, id: NodeId) -> Result<&QueryNode, SieveError> {
        self.nodes
            .get(id)
            .ok_or_else(|| SieveError::invariant(format!("unknown query node {}", id)))
    }

    fn node_mut(&mut self, id: NodeId) -> Result<&mut QueryNode, SieveError> {
        self.nodes
            .get_mut(id)
            .ok_or_else(|| SieveError::invariant(format!("unknown query node {}", id)))
    }

    /// Number of nodes, master node included
    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    /// Search term of a node (empty string for unknown ids)
    pub fn search_term(&self, id: NodeId) -> &str {
        self.nodes
            .get(id)
            .map(|node| node.search_term.as_str())
            .unwrap_or("")
    }

    /// Whether the master node, and therefore the whole tree, is resolved
    pub fn is_complete(&self) -> bool {
        self.nodes.first().is_some_and(|root| root.done)
    }

    /// Narrows a node into one child per distinct character of `alphabet`
    ///
    /// Duplicate characters are collapsed with their first occurrence keeping
    /// its position. Expansion is irrevocable: expanding a node twice, or
    /// expanding a finished node, is an invariant violation.
    ///
    /// # Returns
    ///
    /// The ids of the new children in alphabet order
    pub fn add_children(&mut self, id: NodeId, alphabet: &str) -> Result<Vec<NodeId>, SieveError> {
        let mut seen = BTreeSet::new();
        let characters: Vec<char> = alphabet.chars().filter(|c| seen.insert(*c)).collect();

        let node = self.node(id)?;
        if node.is_expanded() {
            return Err(SieveError::invariant(format!(
                "query '{}' expanded twice",
                node.search_term
            )));
        }
        if node.done {
            return Err(SieveError::invariant(format!(
                "query '{}' expanded after completion",
                node.search_term
            )));
        }
        if characters.is_empty() {
            return Err(SieveError::invariant(format!(
                "query '{}' expanded with an empty alphabet",
                node.search_term
            )));
        }

        let prefix = node.search_term.clone();
        let first_child = self.nodes.len();
        for c in &characters {
            let mut term = prefix.clone();
            term.push(*c);
            self.nodes.push(QueryNode::new(term, Some(id)));
        }

        let children: Vec<NodeId> = (first_child..self.nodes.len()).collect();
        let node = self.node_mut(id)?;
        node.expected_children = children.len();
        node.children = children.clone();

        Ok(children)
    }

    /// Records the count the endpoint reported for a node's fetch
    pub fn set_reported_count(&mut self, id: NodeId, count: usize) -> Result<(), SieveError> {
        let node = self.node_mut(id)?;
        if node.reported_count.is_some() {
            return Err(SieveError::invariant(format!(
                "query '{}' fetched twice",
                node.search_term
            )));
        }
        node.reported_count = Some(count);
        Ok(())
    }

    /// Records an identifier returned directly by a node's fetch
    ///
    /// The identifier also joins the subtree results of the node and every
    /// ancestor, so subtree unions stay current while children are still
    /// running. Completion state is not touched.
    pub fn record_own_result(&mut self, id: NodeId, key: &str) -> Result<(), SieveError> {
        let node = self.node_mut(id)?;
        if node.done {
            return Err(SieveError::invariant(format!(
                "result recorded on finished query '{}'",
                node.search_term
            )));
        }
        if !node.own_results.iter().any(|existing| existing == key) {
            node.own_results.push(key.to_string());
        }

        let mut current = Some(id);
        while let Some(ancestor) = current {
            let node = self.node_mut(ancestor)?;
            // an ancestor already holding the key has it on every level above
            if !node.subtree_results.insert(key.to_string()) {
                break;
            }
            current = node.parent;
        }

        Ok(())
    }

    /// Marks a node done and propagates completion up the tree
    ///
    /// Each completed node reports to its parent exactly once; a parent whose
    /// last expected child reports becomes done in turn. Completing a node
    /// twice is an invariant violation.
    pub fn mark_done(&mut self, id: NodeId) -> Result<(), SieveError> {
        let mut current = id;
        loop {
            let node = self.node_mut(current)?;
            if node.done {
                return Err(SieveError::invariant(format!(
                    "query '{}' completed twice",
                    node.search_term
                )));
            }
            node.done = true;

            let Some(parent) = node.parent else {
                return Ok(());
            };
            if !self.child_done(parent, current)? {
                return Ok(());
            }
            current = parent;
        }
    }

    /// Folds a finished child into its parent
    ///
    /// Returns whether the parent has now heard from all of its children.
    fn child_done(&mut self, parent: NodeId, child: NodeId) -> Result<bool, SieveError> {
        let child_results: Vec<String> = {
            let child = self.node(child)?;
            child
                .own_results
                .iter()
                .chain(child.subtree_results.iter())
                .cloned()
                .collect()
        };

        let node = self.node_mut(parent)?;
        node.subtree_results.extend(child_results);
        node.completed_children += 1;
        if node.completed_children > node.expected_children {
            return Err(SieveError::invariant(format!(
                "query '{}' heard from more children than it has",
                node.search_term
            )));
        }

        Ok(node.completed_children == node.expected_children)
    }

    /// Iterates nodes depth-first from the master node, parents before children
    ///
    /// Uses an explicit stack so very deep narrowing chains cannot exhaust
    /// the call stack.
    pub fn depth_first(&self) -> DepthFirst<'_> {
        DepthFirst {
            tree: self,
            stack: if self.nodes.is_empty() {
                Vec::new()
            } else {
                vec![Self::ROOT]
            },
        }
    }

    /// Checks structural consistency of a tree loaded from a snapshot
    pub fn validate(&self) -> Result<(), SieveError> {
        let root = self
            .nodes
            .first()
            .ok_or_else(|| SieveError::invariant("query tree has no master node"))?;
        if root.parent.is_some() || !root.search_term.is_empty() {
            return Err(SieveError::invariant("malformed master node"));
        }

        for (id, node) in self.nodes.iter().enumerate() {
            if node.children.len() != node.expected_children {
                return Err(SieveError::invariant(format!(
                    "query '{}' expects {} children but has {}",
                    node.search_term,
                    node.expected_children,
                    node.children.len()
                )));
            }
            for &child in &node.children {
                let child_node = self.node(child)?;
                if child_node.parent != Some(id) {
                    return Err(SieveError::invariant(format!(
                        "query '{}' is not linked back to '{}'",
                        child_node.search_term, node.search_term
                    )));
                }
            }
        }

        Ok(())
    }
}

impl Default for QueryTree {
    fn default() -> Self {
        Self::new()
    }
}

/// Depth-first iterator over a query tree
pub struct DepthFirst<'a> {
    tree: &'a QueryTree,
    stack: Vec<NodeId>,
}

impl<'a> Iterator for DepthFirst<'a> {
    type Item = (NodeId, &'a QueryNode);

    fn next(&mut self) -> Option<Self::Item> {
        let id = self.stack.pop()?;
        let node = self.tree.nodes.get(id)?;
        // reversed so the first child is visited first
        self.stack.extend(node.children.iter().rev());
        Some((id, node))
    }
}
