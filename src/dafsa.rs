/*!
This module provides the automaton half of the compiler.

A [`Dafsa`] is a deterministic acyclic finite state automaton whose paths
from a distinguished root to a distinguished leaf spell exactly the input
word set. It starts life as a pseudo prefix trie: a plain trie, except
that acceptance is funneled into the single leaf node via edges labeled
with the empty element instead of per-node accept flags. Minimization
then merges states with equal outgoing edge sets, bottom-up from the
leaf, so that shared suffixes collapse the same way shared prefixes
already have.

The payoff is state elimination: every intermediate state is bypassed by
composite-labeled edges until a single root-to-leaf edge remains, and
that edge's label is the regex for the whole word set. Elimination is
order-sensitive, and the order here is deliberate: we always remove the
state under the lexicographically smallest of root's outgoing edges,
i.e. top-down and breadth-first. That keeps prefix factorings near the
top of the growing expression, which is what gives the optimizer the
chance to order alternations longest-match-first. Eliminating bottom-up
yields an equivalent but typically longer regex with no such guarantee.

The graph is an arena: nodes live in a `Vec` and edges refer to them by
index, with each node holding mirrored `parents` and `children` edge
sets. Labels are immutable [`Element`] values and may be shared by many
edges; the nodes are the only mutable part of the whole pipeline.
*/

use std::collections::{BTreeMap, BTreeSet};

use crate::element::Element;

type NodeId = usize;

/// An edge of the automaton graph.
///
/// The same type describes both directions: in a `children` set, `node`
/// is the destination, and in a `parents` set it is the source. Two
/// edges are the same edge when both the label and the node agree, and
/// the derived ordering (label first) is what every "iterate edges in
/// label order" step in this module relies on.
#[derive(Clone, Debug, Eq, Ord, PartialEq, PartialOrd)]
struct Edge {
    label: Element,
    node: NodeId,
}

#[derive(Clone, Debug, Default)]
struct Node {
    parents: BTreeSet<Edge>,
    children: BTreeSet<Edge>,
}

/// A deterministic acyclic finite state automaton over UTF-16 code
/// units, with one root and one leaf.
///
/// Build one with [`Dafsa::from_words`] (or `from_units` at the code
/// unit level), optionally [`minimize`](Dafsa::minimize) it, and then
/// convert it to a single regex element with
/// [`to_regex`](Dafsa::to_regex). Conversion consumes the automaton:
/// state elimination leaves the graph degenerate, so there is nothing
/// sensible left to call afterwards and the type system enforces that.
#[derive(Clone, Debug)]
pub struct Dafsa {
    nodes: Vec<Node>,
    root: NodeId,
    leaf: NodeId,
}

impl Dafsa {
    fn empty() -> Dafsa {
        Dafsa {
            nodes: vec![Node::default(), Node::default()],
            root: 0,
            leaf: 1,
        }
    }

    /// Build a pseudo prefix trie accepting exactly the given words.
    pub fn from_words<W, S>(words: W) -> Dafsa
    where
        W: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        Dafsa::from_units(
            words.into_iter().map(|w| w.as_ref().encode_utf16().collect()),
        )
    }

    /// Build a pseudo prefix trie and minimize it.
    pub fn from_words_minimized<W, S>(words: W) -> Dafsa
    where
        W: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let mut dafsa = Dafsa::from_words(words);
        dafsa.minimize();
        dafsa
    }

    /// Build a pseudo prefix trie accepting exactly the given code unit
    /// sequences.
    ///
    /// This is the layer underneath [`Dafsa::from_words`]. It exists
    /// separately because the data model is defined over UTF-16 code
    /// units: callers that already hold code units (surrogate halves
    /// included) should not have to round-trip through `String`.
    pub fn from_units<W>(words: W) -> Dafsa
    where
        W: IntoIterator<Item = Vec<u16>>,
    {
        let mut words: Vec<Vec<u16>> = words.into_iter().collect();
        // Sorting makes construction independent of input order, and the
        // grouping below depends on equal first units being adjacent.
        words.sort();
        log::debug!("building pseudo prefix trie from {} words", words.len());
        let mut dafsa = Dafsa::empty();
        let words: Vec<&[u16]> = words.iter().map(|w| w.as_slice()).collect();
        let root = dafsa.root;
        dafsa.insert_sorted(root, &words);
        dafsa
    }

    /// Build a pseudo prefix trie from code unit sequences and minimize
    /// it.
    pub fn from_units_minimized<W>(words: W) -> Dafsa
    where
        W: IntoIterator<Item = Vec<u16>>,
    {
        let mut dafsa = Dafsa::from_units(words);
        dafsa.minimize();
        dafsa
    }

    fn push_node(&mut self) -> NodeId {
        self.nodes.push(Node::default());
        self.nodes.len() - 1
    }

    fn add_edge(&mut self, from: NodeId, to: NodeId, label: Element) {
        self.nodes[from]
            .children
            .insert(Edge { label: label.clone(), node: to });
        self.nodes[to].parents.insert(Edge { label, node: from });
    }

    /// Insert a sorted batch of word tails below the given node.
    fn insert_sorted(&mut self, node: NodeId, words: &[&[u16]]) {
        let mut rest = words;
        // An exhausted word means this node is accepting, which in the
        // pseudo prefix trie is an empty-labeled edge into the leaf.
        let empties = rest.iter().take_while(|w| w.is_empty()).count();
        if empties > 0 {
            let leaf = self.leaf;
            self.add_edge(node, leaf, Element::nothing());
            rest = &rest[empties..];
        }
        while !rest.is_empty() {
            let unit = rest[0][0];
            let same = rest.iter().take_while(|w| w[0] == unit).count();
            let child = self.push_node();
            self.add_edge(node, child, Element::char(unit));
            let tails: Vec<&[u16]> =
                rest[..same].iter().map(|w| &w[1..]).collect();
            self.insert_sorted(child, &tails);
            rest = &rest[same..];
        }
    }

    /// Whether the automaton accepts the given word.
    ///
    /// This only works before state elimination, while every edge is
    /// still labeled with a single code unit or the empty element. It is
    /// how tests cross-check the compiled regex against the automaton it
    /// came from.
    pub fn is_match(&self, word: &str) -> bool {
        let units: Vec<u16> = word.encode_utf16().collect();
        self.is_match_units(&units)
    }

    /// Whether the automaton accepts the given code unit sequence.
    pub fn is_match_units(&self, word: &[u16]) -> bool {
        let mut node = self.root;
        for &unit in word.iter() {
            let label = Element::char(unit);
            let next = self.nodes[node]
                .children
                .iter()
                .find(|e| e.label == label)
                .map(|e| e.node);
            match next {
                Some(n) => node = n,
                None => return false,
            }
        }
        let nothing = Element::nothing();
        self.nodes[node]
            .children
            .iter()
            .any(|e| e.node == self.leaf && e.label == nothing)
    }

    /// Merge equivalent states, bottom-up from the leaf.
    ///
    /// Two states are equivalent when their outgoing edge sets are equal
    /// (same labels to the same destinations). Merging never changes the
    /// accepted language; it is not claimed to reach the provably
    /// minimal automaton, and nothing downstream depends on it doing so.
    pub fn minimize(&mut self) {
        let before = self.live_states();
        let leaf = self.leaf;
        self.merge_equivalent_parents(leaf);
        log::debug!(
            "minimized dafsa from {} to {} states",
            before,
            self.live_states(),
        );
    }

    fn merge_equivalent_parents(&mut self, node: NodeId) {
        let parents: BTreeSet<NodeId> =
            self.nodes[node].parents.iter().map(|e| e.node).collect();
        // Group the parents by their outgoing edge sets. The key is the
        // ordered edge list, so equal sets land in the same bucket and
        // bucket iteration is stable.
        let mut groups: BTreeMap<Vec<Edge>, Vec<NodeId>> = BTreeMap::new();
        for &parent in parents.iter() {
            let key: Vec<Edge> =
                self.nodes[parent].children.iter().cloned().collect();
            groups.entry(key).or_default().push(parent);
        }
        for group in groups.values() {
            let survivor = group[0];
            for &redundant in group[1..].iter() {
                self.rewire(redundant, survivor);
            }
        }
        // Recurse through whatever is still a parent after the merges.
        let parents: BTreeSet<NodeId> =
            self.nodes[node].parents.iter().map(|e| e.node).collect();
        for parent in parents {
            self.merge_equivalent_parents(parent);
        }
    }

    /// Redirect every edge touching `redundant` to `survivor` and detach
    /// `redundant` from the graph.
    fn rewire(&mut self, redundant: NodeId, survivor: NodeId) {
        log::trace!("merging state {} into {}", redundant, survivor);
        let children: Vec<Edge> =
            self.nodes[redundant].children.iter().cloned().collect();
        for edge in children {
            let stale = Edge { label: edge.label.clone(), node: redundant };
            self.nodes[edge.node].parents.remove(&stale);
            self.nodes[edge.node]
                .parents
                .insert(Edge { label: edge.label.clone(), node: survivor });
            self.nodes[survivor].children.insert(edge);
        }
        let parents: Vec<Edge> =
            self.nodes[redundant].parents.iter().cloned().collect();
        for edge in parents {
            let stale = Edge { label: edge.label.clone(), node: redundant };
            self.nodes[edge.node].children.remove(&stale);
            self.nodes[edge.node]
                .children
                .insert(Edge { label: edge.label.clone(), node: survivor });
            self.nodes[survivor].parents.insert(edge);
        }
        self.nodes[redundant].children.clear();
        self.nodes[redundant].parents.clear();
    }

    /// The number of states still attached to the graph. Detached states
    /// stay in the arena but have no edges, so they don't count.
    fn live_states(&self) -> usize {
        self.nodes
            .iter()
            .filter(|n| !n.children.is_empty() || !n.parents.is_empty())
            .count()
    }

    /// Convert the automaton into a single regex element by state
    /// elimination.
    ///
    /// Intermediate states are removed one at a time until root's only
    /// remaining edges lead directly to the leaf; parallel edges between
    /// the same pair of states merge into a single alternation-labeled
    /// edge as they appear. The label of the final root-to-leaf edge is
    /// returned; callers will usually want to `optimize` it before
    /// rendering.
    pub fn to_regex(mut self) -> Element {
        loop {
            // The next state to remove is the destination of the
            // smallest-labeled root edge that doesn't already point at
            // the leaf.
            let target = self.nodes[self.root]
                .children
                .iter()
                .find(|e| e.node != self.leaf)
                .map(|e| e.node);
            match target {
                None => break,
                Some(node) => self.eliminate(node),
            }
        }
        let root = &self.nodes[self.root];
        if root.children.is_empty() {
            // No words at all.
            return Element::nothing();
        }
        assert_eq!(
            1,
            root.children.len(),
            "state elimination must leave exactly one root edge",
        );
        let edge = root.children.iter().next().unwrap();
        assert_eq!(
            self.leaf, edge.node,
            "the final root edge must target the leaf",
        );
        edge.label.clone()
    }

    /// Remove one state, bridging every parent to every child.
    fn eliminate(&mut self, node: NodeId) {
        let parents: Vec<Edge> =
            self.nodes[node].parents.iter().cloned().collect();
        let children: Vec<Edge> =
            self.nodes[node].children.iter().cloned().collect();
        log::trace!(
            "eliminating state {} ({} parents, {} children)",
            node,
            parents.len(),
            children.len(),
        );

        // Bypass: each parent-child pair gets a fresh edge whose label
        // concatenates the two hops. The sequences stay unoptimized
        // here; the parallel-edge merge below and the caller's final
        // optimize pass take care of that wholesale.
        for p in parents.iter() {
            for c in children.iter() {
                self.add_edge(
                    p.node,
                    c.node,
                    Element::seq([p.label.clone(), c.label.clone()]),
                );
            }
        }

        // Sever the state from the graph.
        let parent_ids: BTreeSet<NodeId> =
            parents.iter().map(|e| e.node).collect();
        let child_ids: BTreeSet<NodeId> =
            children.iter().map(|e| e.node).collect();
        for &pid in parent_ids.iter() {
            self.nodes[pid].children.retain(|e| e.node != node);
        }
        for &cid in child_ids.iter() {
            self.nodes[cid].parents.retain(|e| e.node != node);
        }
        self.nodes[node].parents.clear();
        self.nodes[node].children.clear();

        // Wherever the removed state used to bridge two states that now
        // have several direct edges between them, merge those edges into
        // one alternation-labeled edge.
        for &pid in parent_ids.iter() {
            for &cid in child_ids.iter() {
                let dups: Vec<Edge> = self.nodes[pid]
                    .children
                    .iter()
                    .filter(|e| e.node == cid)
                    .cloned()
                    .collect();
                if dups.len() < 2 {
                    continue;
                }
                let merged =
                    Element::or(dups.iter().map(|e| e.label.clone()))
                        .optimize();
                for edge in dups.iter() {
                    self.nodes[pid].children.remove(edge);
                    self.nodes[cid].parents.remove(&Edge {
                        label: edge.label.clone(),
                        node: pid,
                    });
                }
                self.add_edge(pid, cid, merged);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn compile_via(dafsa: Dafsa) -> String {
        dafsa.to_regex().optimize().to_regex().to_string()
    }

    #[test]
    fn trie_matches_exactly_the_words() {
        let dafsa = Dafsa::from_words(["ab", "abc", "b", "bc"]);
        for word in ["ab", "abc", "b", "bc"] {
            assert!(dafsa.is_match(word), "expected match for {:?}", word);
        }
        for word in ["", "a", "abcd", "c", "bb", "cb"] {
            assert!(!dafsa.is_match(word), "unexpected match for {:?}", word);
        }
    }

    #[test]
    fn trie_accepts_the_empty_word() {
        let dafsa = Dafsa::from_words(["", "a"]);
        assert!(dafsa.is_match(""));
        assert!(dafsa.is_match("a"));
        assert!(!dafsa.is_match("aa"));
    }

    #[test]
    fn trie_ignores_duplicate_words() {
        let dafsa = Dafsa::from_words(["ab", "ab", "", ""]);
        assert!(dafsa.is_match("ab"));
        assert!(dafsa.is_match(""));
        assert!(!dafsa.is_match("a"));
    }

    #[test]
    fn minimization_preserves_the_language() {
        let words = ["1a", "1b", "2a", "2b", "ad", "abd", "abcd"];
        let mut dafsa = Dafsa::from_words(words);
        dafsa.minimize();
        for word in words {
            assert!(dafsa.is_match(word), "expected match for {:?}", word);
        }
        for word in ["", "1", "2", "a", "ab", "abc", "1ab", "2ab", "abcd2"] {
            assert!(!dafsa.is_match(word), "unexpected match for {:?}", word);
        }
    }

    #[test]
    fn minimization_merges_shared_suffixes() {
        let mut dafsa = Dafsa::from_words(["1a", "1b", "2a", "2b"]);
        dafsa.minimize();
        // Four words share one interior column after minimization; only
        // the merged automaton factors into two classes.
        assert_eq!("[12][ab]", compile_via(dafsa));
    }

    #[test]
    fn surrogate_pairs_stay_in_code_units() {
        let dafsa = Dafsa::from_words(["\u{1F44B}"]);
        assert!(dafsa.is_match("\u{1F44B}"));
        assert!(!dafsa.is_match("\u{1F44C}"));
        assert!(dafsa.is_match_units(&[0xD83D, 0xDC4B]));
        assert!(!dafsa.is_match_units(&[0xD83D]));
    }

    #[test]
    fn elimination_of_a_single_word_is_the_word() {
        let dafsa = Dafsa::from_words_minimized(["abc"]);
        assert_eq!("abc", compile_via(dafsa));
    }

    #[test]
    fn elimination_of_no_words_is_the_empty_regex() {
        let dafsa = Dafsa::from_words_minimized::<_, &str>([]);
        assert_eq!("", compile_via(dafsa));
    }

    #[test]
    fn elimination_of_the_empty_word_alone() {
        let dafsa = Dafsa::from_words_minimized([""]);
        assert_eq!("", compile_via(dafsa));
    }

    #[test]
    fn empty_word_makes_the_rest_optional() {
        let dafsa = Dafsa::from_words_minimized(["", "a"]);
        assert_eq!("a?", compile_via(dafsa));
    }

    #[test]
    fn elimination_works_without_minimization() {
        // The unminimized trie eliminates to an equivalent (if larger)
        // regex; shared prefixes still factor, shared suffixes don't.
        let dafsa = Dafsa::from_words(["ab", "ac"]);
        assert_eq!("a[bc]", compile_via(dafsa));
    }
}
