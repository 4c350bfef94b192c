//! Arena-backed HTML tree restricted to a fixed tag whitelist.
//!
//! Nodes live in a `Vec` and refer to their children by index. Parsing is
//! done by html5ever (through `scraper`); while walking its DOM, unknown
//! elements are dissolved into their parent, and script-like elements are
//! dropped together with their content. Attributes are never copied.

use std::collections::HashSet;

use scraper::Html;

pub type NodeId = usize;

/// Index of the synthetic document root.
pub const ROOT: NodeId = 0;

/// Tags that survive sanitizing.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Tag {
    Html,
    Head,
    Title,
    P,
    Br,
    B,
    Li,
    Dd,
    H1,
    H2,
    H3,
    H4,
    H5,
    H6,
    Table,
    Tbody,
    Td,
    Tr,
    Th,
}

impl Tag {
    pub fn from_name(name: &str) -> Option<Self> {
        let tag = match name.to_ascii_lowercase().as_str() {
            "html" => Tag::Html,
            "head" => Tag::Head,
            "title" => Tag::Title,
            "p" => Tag::P,
            "br" => Tag::Br,
            "b" => Tag::B,
            "li" => Tag::Li,
            "dd" => Tag::Dd,
            "h1" => Tag::H1,
            "h2" => Tag::H2,
            "h3" => Tag::H3,
            "h4" => Tag::H4,
            "h5" => Tag::H5,
            "h6" => Tag::H6,
            "table" => Tag::Table,
            "tbody" => Tag::Tbody,
            "td" => Tag::Td,
            "tr" => Tag::Tr,
            "th" => Tag::Th,
            _ => return None,
        };
        Some(tag)
    }

    pub fn name(&self) -> &'static str {
        match self {
            Tag::Html => "html",
            Tag::Head => "head",
            Tag::Title => "title",
            Tag::P => "p",
            Tag::Br => "br",
            Tag::B => "b",
            Tag::Li => "li",
            Tag::Dd => "dd",
            Tag::H1 => "h1",
            Tag::H2 => "h2",
            Tag::H3 => "h3",
            Tag::H4 => "h4",
            Tag::H5 => "h5",
            Tag::H6 => "h6",
            Tag::Table => "table",
            Tag::Tbody => "tbody",
            Tag::Td => "td",
            Tag::Tr => "tr",
            Tag::Th => "th",
        }
    }

    fn is_void(&self) -> bool {
        matches!(self, Tag::Br)
    }
}

/// Elements removed together with everything inside them.
const DROPPED_WITH_CONTENT: &[&str] = &[
    "script", "style", "noscript", "template", "iframe", "object", "applet", "embed", "button",
    "input", "select", "textarea",
];

#[derive(Debug, Clone, PartialEq)]
pub enum NodeKind {
    Root,
    Element(Tag),
    Text(String),
}

#[derive(Debug, Clone)]
pub struct Node {
    pub kind: NodeKind,
    pub children: Vec<NodeId>,
}

#[derive(Debug, Clone)]
pub struct HtmlTree {
    nodes: Vec<Node>,
}

impl HtmlTree {
    /// Parse `html` and keep only whitelisted structure.
    pub fn parse(html: &str) -> Self {
        let document = Html::parse_document(html);
        let mut tree = HtmlTree {
            nodes: vec![Node {
                kind: NodeKind::Root,
                children: Vec::new(),
            }],
        };

        // (source node, arena parent). Children are pushed in reverse so they
        // are visited, and therefore appended, in document order.
        let mut stack = vec![(document.tree.root(), ROOT)];
        while let Some((source, parent)) = stack.pop() {
            let target = match source.value() {
                scraper::Node::Document | scraper::Node::Fragment => parent,
                scraper::Node::Element(element) => {
                    let name = element.name();
                    if DROPPED_WITH_CONTENT.contains(&name) {
                        continue;
                    }
                    match Tag::from_name(name) {
                        Some(tag) => tree.append(parent, NodeKind::Element(tag)),
                        // Unknown element: its children go to our parent.
                        None => parent,
                    }
                }
                scraper::Node::Text(text) => {
                    tree.append(parent, NodeKind::Text(String::from(&**text)));
                    continue;
                }
                // Comments, doctypes, processing instructions.
                _ => continue,
            };
            let children: Vec<_> = source.children().collect();
            for child in children.into_iter().rev() {
                stack.push((child, target));
            }
        }
        tree
    }

    pub fn node(&self, id: NodeId) -> &Node {
        &self.nodes[id]
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes[ROOT].children.is_empty()
    }

    pub fn tag(&self, id: NodeId) -> Option<Tag> {
        match self.nodes[id].kind {
            NodeKind::Element(tag) => Some(tag),
            _ => None,
        }
    }

    fn push(&mut self, kind: NodeKind) -> NodeId {
        self.nodes.push(Node {
            kind,
            children: Vec::new(),
        });
        self.nodes.len() - 1
    }

    fn append(&mut self, parent: NodeId, kind: NodeKind) -> NodeId {
        let id = self.push(kind);
        self.nodes[parent].children.push(id);
        id
    }

    /// All nodes below `id` in document order, `id` excluded.
    pub fn descendants(&self, id: NodeId) -> Vec<NodeId> {
        let mut out = Vec::new();
        let mut stack: Vec<NodeId> = self.nodes[id].children.iter().rev().copied().collect();
        while let Some(next) = stack.pop() {
            out.push(next);
            stack.extend(self.nodes[next].children.iter().rev());
        }
        out
    }

    /// Every element with `tag`, in document order.
    pub fn find_all(&self, tag: Tag) -> Vec<NodeId> {
        self.descendants(ROOT)
            .into_iter()
            .filter(|&id| self.tag(id) == Some(tag))
            .collect()
    }

    /// Concatenated text below `id`.
    pub fn text_content(&self, id: NodeId) -> String {
        let mut text = String::new();
        for node in self.descendants(id) {
            if let NodeKind::Text(t) = &self.nodes[node].kind {
                text.push_str(t);
            }
        }
        text
    }

    /// Replace each node in `unwrap` by its children, recursively.
    ///
    /// `separator` may supply a node appended after the spliced children so
    /// that content of neighbouring wrappers stays apart.
    pub fn unwrap_nodes<F>(&mut self, unwrap: &HashSet<NodeId>, separator: F)
    where
        F: Fn(Tag) -> Option<NodeKind>,
    {
        let mut stack = vec![ROOT];
        while let Some(id) = stack.pop() {
            let original = std::mem::take(&mut self.nodes[id].children);
            let mut spliced = Vec::with_capacity(original.len());
            self.splice_into(&original, unwrap, &separator, &mut spliced);
            stack.extend(spliced.iter().copied());
            self.nodes[id].children = spliced;
        }
    }

    /// Chains of unwrapped wrappers can be thousands deep (nested tables), so
    /// this walks an explicit stack.
    fn splice_into<F>(
        &mut self,
        children: &[NodeId],
        unwrap: &HashSet<NodeId>,
        separator: &F,
        out: &mut Vec<NodeId>,
    ) where
        F: Fn(Tag) -> Option<NodeKind>,
    {
        enum Step {
            Visit(NodeId),
            // separator owed once the unwrapped node's children are placed
            After(NodeId),
        }

        let mut stack: Vec<Step> = children.iter().rev().map(|&c| Step::Visit(c)).collect();
        while let Some(step) = stack.pop() {
            match step {
                Step::Visit(child) if !unwrap.contains(&child) => out.push(child),
                Step::Visit(child) => {
                    let grandchildren = std::mem::take(&mut self.nodes[child].children);
                    stack.push(Step::After(child));
                    stack.extend(grandchildren.into_iter().rev().map(Step::Visit));
                }
                Step::After(child) => {
                    if let Some(kind) = self.tag(child).and_then(separator) {
                        out.push(self.push(kind));
                    }
                }
            }
        }
    }

    /// Serialize back to HTML.
    pub fn to_html(&self) -> String {
        enum Step {
            Open(NodeId),
            Close(Tag),
        }

        let mut html = String::new();
        let mut stack: Vec<Step> = self.nodes[ROOT].children.iter().rev().map(|&c| Step::Open(c)).collect();
        while let Some(step) = stack.pop() {
            match step {
                Step::Close(tag) => {
                    html.push_str("</");
                    html.push_str(tag.name());
                    html.push('>');
                }
                Step::Open(id) => match &self.nodes[id].kind {
                    NodeKind::Text(text) => push_escaped(&mut html, text),
                    NodeKind::Root => {}
                    NodeKind::Element(tag) if tag.is_void() => {
                        html.push('<');
                        html.push_str(tag.name());
                        html.push_str("/>");
                    }
                    NodeKind::Element(tag) => {
                        html.push('<');
                        html.push_str(tag.name());
                        html.push('>');
                        stack.push(Step::Close(*tag));
                        stack.extend(self.nodes[id].children.iter().rev().map(|&c| Step::Open(c)));
                    }
                },
            }
        }
        html
    }
}

/// Entities were decoded by the parser; only markup-significant characters
/// are escaped again.
fn push_escaped(out: &mut String, text: &str) {
    for c in text.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            _ => out.push(c),
        }
    }
}
