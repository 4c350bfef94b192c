//! Nested-table resolution.
//!
//! PDF renderers downstream cannot lay out a table inside a table cell, so
//! only outermost tables survive. Every nested table is demoted: its
//! structural tags are dissolved and the cell text stays where it was.

use std::collections::HashSet;

use crate::tree::{HtmlTree, NodeId, NodeKind, Tag};

/// Containment relation between the tables of one document.
///
/// Tables are ordered by ascending subtree size. Entry `(i, j)` is set when
/// table `i` lies inside table `j`; each table is marked by at most one
/// container, the smallest one.
#[derive(Debug)]
pub struct TableOverlapMatrix {
    tables: Vec<NodeId>,
    marks: Vec<Vec<bool>>,
}

impl TableOverlapMatrix {
    pub fn build(tree: &HtmlTree) -> Self {
        // A table's set holds itself too, so an empty table is never taken
        // for a subset of an unrelated one.
        let mut subtrees: Vec<(NodeId, HashSet<NodeId>)> = tree
            .find_all(Tag::Table)
            .into_iter()
            .map(|id| {
                let mut set: HashSet<NodeId> = tree.descendants(id).into_iter().collect();
                set.insert(id);
                (id, set)
            })
            .collect();
        subtrees.sort_by_key(|(_, set)| set.len());

        let n = subtrees.len();
        let mut marks = vec![vec![false; n]; n];
        for i in 0..n {
            for j in (i + 1)..n {
                if subtrees[i].1.is_subset(&subtrees[j].1) {
                    marks[i][j] = true;
                    break;
                }
            }
        }

        Self {
            tables: subtrees.into_iter().map(|(id, _)| id).collect(),
            marks,
        }
    }

    pub fn len(&self) -> usize {
        self.tables.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tables.is_empty()
    }

    pub fn is_contained(&self, index: usize) -> bool {
        self.marks[index].iter().any(|&m| m)
    }

    /// Tables not nested in any other table.
    pub fn kept(&self) -> Vec<NodeId> {
        (0..self.len())
            .filter(|&i| !self.is_contained(i))
            .map(|i| self.tables[i])
            .collect()
    }

    /// Tables nested somewhere inside another table.
    pub fn contained(&self) -> Vec<NodeId> {
        (0..self.len())
            .filter(|&i| self.is_contained(i))
            .map(|i| self.tables[i])
            .collect()
    }
}

#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct TableReport {
    pub kept: usize,
    pub demoted: usize,
}

/// Demote every nested table in `tree`.
pub fn resolve_nested_tables(tree: &mut HtmlTree) -> TableReport {
    let matrix = TableOverlapMatrix::build(tree);
    if matrix.is_empty() {
        return TableReport::default();
    }

    let demoted = matrix.contained();
    let mut unwrap = HashSet::new();
    for &table in &demoted {
        unwrap.insert(table);
        collect_table_structure(tree, table, &mut unwrap);
    }

    if !unwrap.is_empty() {
        tree.unwrap_nodes(&unwrap, cell_separator);
    }

    TableReport {
        kept: matrix.kept().len(),
        demoted: demoted.len(),
    }
}

/// Rows and cells that belong to `table` itself, not to tables inside it.
fn collect_table_structure(tree: &HtmlTree, table: NodeId, out: &mut HashSet<NodeId>) {
    let mut stack: Vec<NodeId> = tree.node(table).children.clone();
    while let Some(id) = stack.pop() {
        match tree.tag(id) {
            Some(Tag::Table) => {}
            Some(Tag::Tbody | Tag::Tr | Tag::Td | Tag::Th) => {
                out.insert(id);
                stack.extend(tree.node(id).children.iter().copied());
            }
            _ => stack.extend(tree.node(id).children.iter().copied()),
        }
    }
}

/// Keeps neighbouring cells and rows from running together once their
/// wrappers are gone.
fn cell_separator(tag: Tag) -> Option<NodeKind> {
    match tag {
        Tag::Td | Tag::Th => Some(NodeKind::Text(" ".to_string())),
        Tag::Tr => Some(NodeKind::Element(Tag::Br)),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const NESTED: &str = "<table><tr><td>A1</td><td>\
        <table><tr><td>B1</td><td>\
        <table><tr><td>C1</td></tr><tr><td>C2</td></tr></table>\
        </td><td>B2</td></tr></table>\
        </td></tr></table>";

    #[test]
    fn test_matrix_orders_by_size() {
        let tree = HtmlTree::parse(NESTED);
        let matrix = TableOverlapMatrix::build(&tree);
        assert_eq!(matrix.len(), 3);
        assert_eq!(matrix.kept().len(), 1);
        assert_eq!(matrix.contained().len(), 2);
        // smallest (C) is contained, largest (A) is not
        assert!(matrix.is_contained(0));
        assert!(matrix.is_contained(1));
        assert!(!matrix.is_contained(2));
    }

    #[test]
    fn test_first_container_wins() {
        let tree = HtmlTree::parse(NESTED);
        let matrix = TableOverlapMatrix::build(&tree);
        // C is marked only against B, not also against A
        assert_eq!(matrix.marks[0].iter().filter(|&&m| m).count(), 1);
        assert!(matrix.marks[0][1]);
    }

    #[test]
    fn test_three_level_nesting_keeps_outer_table() {
        let mut tree = HtmlTree::parse(NESTED);
        let report = resolve_nested_tables(&mut tree);
        assert_eq!(report, TableReport { kept: 1, demoted: 2 });

        let html = tree.to_html();
        assert_eq!(html.matches("<table>").count(), 1);
        assert_eq!(tree.find_all(Tag::Table).len(), 1);

        let order = ["A1", "B1", "C1", "C2", "B2"];
        let positions: Vec<usize> = order.iter().map(|t| html.find(t).unwrap()).collect();
        assert!(positions.windows(2).all(|w| w[0] < w[1]), "{}", html);
    }

    #[test]
    fn test_outer_table_keeps_its_structure() {
        let mut tree = HtmlTree::parse(NESTED);
        resolve_nested_tables(&mut tree);
        // A has one row with two cells; B and C contributed none
        assert_eq!(tree.find_all(Tag::Tr).len(), 1);
        assert_eq!(tree.find_all(Tag::Td).len(), 2);
    }

    #[test]
    fn test_sibling_tables_preserved() {
        let mut tree = HtmlTree::parse(
            "<table><tr><td>D</td></tr></table><p>between</p><table><tr><td>E</td></tr></table>",
        );
        let report = resolve_nested_tables(&mut tree);
        assert_eq!(report, TableReport { kept: 2, demoted: 0 });
        assert_eq!(tree.to_html().matches("<table>").count(), 2);
    }

    #[test]
    fn test_empty_sibling_table_not_demoted() {
        let mut tree =
            HtmlTree::parse("<table></table><table><tr><td>E</td></tr></table>");
        let report = resolve_nested_tables(&mut tree);
        assert_eq!(report.demoted, 0);
    }

    #[test]
    fn test_no_tables() {
        let mut tree = HtmlTree::parse("<p>plain</p>");
        assert_eq!(resolve_nested_tables(&mut tree), TableReport::default());
    }

    #[test]
    fn test_deep_nesting_chain() {
        let depth = 3000;
        let mut html = String::new();
        for i in 0..depth {
            html.push_str(&format!("<table><tr><td>L{}", i));
        }
        let mut tree = HtmlTree::parse(&html);
        let report = resolve_nested_tables(&mut tree);
        assert_eq!(report, TableReport { kept: 1, demoted: depth - 1 });
        assert_eq!(tree.find_all(Tag::Table).len(), 1);

        let out = tree.to_html();
        assert_eq!(out.matches("<table>").count(), 1);
        assert!(out.contains("L0"));
        assert!(out.contains(&format!("L{}", depth - 1)));
    }

    #[test]
    fn test_demoted_cells_do_not_run_together() {
        let mut tree = HtmlTree::parse(
            "<table><tr><td><table><tr><td>x</td><td>y</td></tr></table></td></tr></table>",
        );
        resolve_nested_tables(&mut tree);
        let html = tree.to_html();
        assert!(html.contains("x y"), "{}", html);
        assert!(!html.contains("xy"));
    }
}
