//! html5ever helpers shared by the segmenter, the run composer and the image
//! resolver.

use html5ever::parse_document;
use html5ever::tendril::TendrilSink;
use lazy_static::lazy_static;
use markup5ever_rcdom::{Handle, NodeData, RcDom};
use regex::Regex;

lazy_static! {
    static ref RE_TAG: Regex =
        Regex::new(r"^<(/?)([a-zA-Z][a-zA-Z0-9]*)\b(?:[^>]*?)(/?)>$").unwrap();
    static ref RE_ANY_TAG: Regex = Regex::new(r"(?s)<!--.*?-->|<[^>]*>").unwrap();
}

/// Inline tags whose open/close pairs must balance.
const CHECKED_TAGS: &[&str] = &[
    "b", "strong", "i", "em", "u", "s", "span", "a", "figure", "figcaption",
];

pub fn html5_parse(input: &str) -> RcDom {
    parse_document(RcDom::default(), Default::default()).one(input)
}

/// A parsed editor fragment: the children of `<body>` plus the document that
/// owns them.
///
/// Dropping an `RcDom` empties the child lists of every node in it, so the
/// handles are only usable while the `Fragment` is alive.
pub struct Fragment {
    _dom: RcDom,
    nodes: Vec<Handle>,
}

impl Fragment {
    pub fn nodes(&self) -> &[Handle] {
        &self.nodes
    }
}

pub fn parse_fragment(fragment: &str) -> Fragment {
    let wrapped = format!(
        "<!doctype html><html><head><meta charset=\"utf-8\"></head><body>{}</body></html>",
        fragment
    );
    let dom = html5_parse(&wrapped);
    let mut body_children: Vec<Handle> = Vec::new();
    fn walk_find_body(node: &Handle, out: &mut Vec<Handle>) -> bool {
        if let NodeData::Element { name, .. } = &node.data {
            if name.local.to_string().eq_ignore_ascii_case("body") {
                out.extend(node.children.borrow().iter().cloned());
                return true;
            }
        }
        for c in node.children.borrow().iter() {
            if walk_find_body(c, out) {
                return true;
            }
        }
        false
    }
    if !walk_find_body(&dom.document, &mut body_children) {
        body_children = node_children(&dom.document);
    }
    Fragment {
        _dom: dom,
        nodes: body_children,
    }
}

pub fn node_children(h: &Handle) -> Vec<Handle> {
    h.children.borrow().iter().cloned().collect()
}

pub fn tag_lower(node: &Handle) -> Option<String> {
    match &node.data {
        NodeData::Element { name, .. } => Some(name.local.to_string().to_ascii_lowercase()),
        _ => None,
    }
}

pub fn attrs_vec(node: &Handle) -> Vec<(String, String)> {
    match &node.data {
        NodeData::Element { attrs, .. } => attrs
            .borrow()
            .iter()
            .map(|a| (a.name.local.to_string(), a.value.to_string()))
            .collect(),
        _ => Vec::new(),
    }
}

pub fn attr_get(attrs: &[(String, String)], name: &str) -> Option<String> {
    for (k, v) in attrs {
        if k.eq_ignore_ascii_case(name) {
            return Some(v.to_string());
        }
    }
    None
}

pub fn attr(node: &Handle, name: &str) -> Option<String> {
    attr_get(&attrs_vec(node), name)
}

/// Elements removed together with their content before segmentation.
pub fn is_drop_content_tag(lower: &str) -> bool {
    matches!(
        lower,
        "details"
            | "summary"
            | "hr"
            | "script"
            | "style"
            | "template"
            | "iframe"
            | "noscript"
            | "object"
            | "embed"
            | "svg"
            | "canvas"
            | "video"
            | "audio"
            | "head"
            | "title"
            | "meta"
            | "link"
    )
}

pub fn is_whitespace_text(node: &Handle) -> bool {
    match &node.data {
        NodeData::Text { contents } => contents.borrow().chars().all(|c| c.is_ascii_whitespace()),
        _ => false,
    }
}

/// Concatenated text of a subtree, skipping dropped elements.
pub fn text_content(node: &Handle) -> String {
    fn walk(node: &Handle, out: &mut String) {
        match &node.data {
            NodeData::Text { contents } => out.push_str(&contents.borrow()),
            NodeData::Element { .. } => {
                if tag_lower(node).is_some_and(|t| is_drop_content_tag(&t)) {
                    return;
                }
                for c in node.children.borrow().iter() {
                    walk(c, out);
                }
            }
            _ => {}
        }
    }
    let mut out = String::new();
    walk(node, &mut out);
    out
}

/// Collapses runs of ASCII whitespace to a single space. Other whitespace
/// (notably U+00A0) is left alone.
pub fn collapse_ws(s: &str) -> String {
    let mut out = String::with_capacity(s.len());
    let mut in_ws = false;
    for ch in s.chars() {
        if ch.is_ascii_whitespace() {
            if !in_ws {
                out.push(' ');
                in_ws = true;
            }
        } else {
            out.push(ch);
            in_ws = false;
        }
    }
    out
}

pub fn trim_ascii_ws(s: &str) -> &str {
    s.trim_matches(|c: char| c.is_ascii_whitespace())
}

/// Escapes character data for re-parsing by [`parse_fragment`].
pub fn esc_text(s: &str) -> String {
    let mut out = String::with_capacity(s.len());
    escape_into(&mut out, s, false);
    out
}

fn escape_into(out: &mut String, s: &str, in_attr: bool) {
    for ch in s.chars() {
        match ch {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' if in_attr => out.push_str("&quot;"),
            _ => out.push(ch),
        }
    }
}

/// Elements written as `<tag/>` with no closing tag.
const VOID_TAGS: &[&str] = &["br", "img", "wbr", "col", "source", "input"];

/// Appends `node` as markup the run composer can read back. Comments,
/// processing instructions and dropped elements vanish; attribute order is
/// kept.
pub fn serialize_node(out: &mut String, node: &Handle) {
    match &node.data {
        NodeData::Text { contents } => escape_into(out, &contents.borrow(), false),
        NodeData::Element { .. } => {
            let Some(tag) = tag_lower(node) else { return };
            if is_drop_content_tag(&tag) {
                return;
            }
            out.push('<');
            out.push_str(&tag);
            for (name, value) in attrs_vec(node) {
                out.push_str(&format!(" {name}=\""));
                escape_into(out, &value, true);
                out.push('"');
            }
            if VOID_TAGS.contains(&tag.as_str()) {
                out.push_str("/>");
                return;
            }
            out.push('>');
            for child in node.children.borrow().iter() {
                serialize_node(out, child);
            }
            out.push_str(&format!("</{tag}>"));
        }
        _ => {}
    }
}

pub fn serialize_nodes(nodes: &[Handle]) -> String {
    let mut out = String::new();
    for n in nodes {
        serialize_node(&mut out, n);
    }
    out
}

/// First tag that breaks open/close pairing among the checked inline tags.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UnbalancedTag {
    pub tag: String,
    pub offset: usize,
    pub reason: &'static str,
}

/// Checks that the inline formatting tags in raw markup pair up. Void and
/// self-closing tags are ignored; comments are skipped.
pub fn check_balance(markup: &str) -> Result<(), UnbalancedTag> {
    let mut stack: Vec<(String, usize)> = Vec::new();
    for m in RE_ANY_TAG.find_iter(markup) {
        let Some(c) = RE_TAG.captures(m.as_str()) else {
            continue;
        };
        let tag = c[2].to_ascii_lowercase();
        if !CHECKED_TAGS.contains(&tag.as_str()) || !c[3].is_empty() {
            continue;
        }
        if c[1].is_empty() {
            stack.push((tag, m.start()));
            continue;
        }
        match stack.pop() {
            Some((open, _)) if open == tag => {}
            Some((open, at)) => {
                return Err(UnbalancedTag {
                    tag: open,
                    offset: at,
                    reason: "closed out of order",
                })
            }
            None => {
                return Err(UnbalancedTag {
                    tag,
                    offset: m.start(),
                    reason: "close without open",
                })
            }
        }
    }
    match stack.pop() {
        Some((tag, offset)) => Err(UnbalancedTag {
            tag,
            offset,
            reason: "never closed",
        }),
        None => Ok(()),
    }
}

/// Removes every tag and comment, leaving raw (still escaped) text. Breaks and
/// block tags become a space so words on either side stay apart.
pub fn strip_tags(markup: &str) -> String {
    RE_ANY_TAG
        .replace_all(markup, |caps: &regex::Captures| {
            let name = RE_TAG
                .captures(&caps[0])
                .map(|c| c[2].to_ascii_lowercase())
                .unwrap_or_default();
            match name.as_str() {
                "br" | "p" | "div" | "li" | "figure" | "figcaption" | "tr" | "td" => " ",
                _ => "",
            }
        })
        .into_owned()
}

/// Short excerpt of `markup` around a byte offset, for diagnostics.
pub fn excerpt(markup: &str, offset: usize) -> String {
    let start = markup[..offset.min(markup.len())]
        .char_indices()
        .rev()
        .nth(20)
        .map(|(i, _)| i)
        .unwrap_or(0);
    markup[start..].chars().take(60).collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fragment_children_come_from_body() {
        let frag = parse_fragment("<p>a</p><p>b</p>");
        let tags: Vec<_> = frag.nodes().iter().filter_map(tag_lower).collect();
        assert_eq!(tags, vec!["p", "p"]);
    }

    #[test]
    fn nested_content_outlives_the_parse_call() {
        let frag = parse_fragment(r#"<p>a <b>b</b></p><figure><img src="x.png"></figure>"#);
        assert_eq!(serialize_nodes(frag.nodes()), r#"<p>a <b>b</b></p><figure><img src="x.png"/></figure>"#);
        assert_eq!(text_content(&frag.nodes()[0]), "a b");
        let figure_children = node_children(&frag.nodes()[1]);
        assert_eq!(tag_lower(&figure_children[0]).as_deref(), Some("img"));
    }

    #[test]
    fn serializer_round_trips_through_the_parser() {
        let frag = parse_fragment(r#"<p class="x">a &amp; <b>b</b><br>c<!-- note --><script>x()</script></p>"#);
        let inner = serialize_nodes(&node_children(&frag.nodes()[0]));
        assert_eq!(inner, r#"a &amp; <b>b</b><br/>c"#);
    }

    #[test]
    fn attribute_values_are_escaped() {
        let frag = parse_fragment(r#"<span title="a &quot;q&quot; &amp; b">x</span>"#);
        let mut out = String::new();
        serialize_node(&mut out, &frag.nodes()[0]);
        assert_eq!(out, r#"<span title="a &quot;q&quot; &amp; b">x</span>"#);
    }

    #[test]
    fn balance_check() {
        assert!(check_balance("<b>x</b> <i>y<br/></i> <img src=a>").is_ok());
        assert!(check_balance("<p>unclosed paragraphs are fine<p>").is_ok());
        let err = check_balance("<b>x<i>y</b></i>").unwrap_err();
        assert_eq!(err.tag, "i");
        assert_eq!(check_balance("<b>x").unwrap_err().reason, "never closed");
        assert_eq!(check_balance("x</span>").unwrap_err().reason, "close without open");
        assert!(check_balance("<!-- <b> -->ok").is_ok());
    }

    #[test]
    fn strip_tags_keeps_words_apart_only_at_breaks() {
        assert_eq!(strip_tags("Hel<b>lo</b><br/>world<!-- c -->"), "Hello world");
    }

    #[test]
    fn whitespace_helpers_only_touch_ascii() {
        assert_eq!(collapse_ws("a \n\t b"), "a b");
        assert_eq!(trim_ascii_ws("\u{a0} x \u{a0}\n"), "\u{a0} x \u{a0}");
    }

    #[test]
    fn text_content_skips_dropped_elements() {
        let frag = parse_fragment("<div>a<style>p{}</style><span>b</span></div>");
        assert_eq!(text_content(&frag.nodes()[0]), "ab");
    }
}
