//! Splits a chapter body into paragraph and figure segments.

use crate::assemble::BuildContext;
use crate::diagnostics::DiagnosticKind;
use crate::entities;
use crate::image::{is_bare_image_paragraph, FigureMarkup, ImageResolver};
use crate::markup::{self, attr, is_whitespace_text, tag_lower};
use crate::model::{Justification, Segment, StyleAttributes};
use markup5ever_rcdom::{Handle, NodeData};

const LIST_INDENT_TWIPS: i32 = 720;
const BLOCKQUOTE_INDENT_TWIPS: i32 = 720;
const BULLET_PREFIX: &str = "• ";
/// Half-point sizes for `h1`..`h6` inside a body.
const HEADING_SIZES: [u32; 6] = [32, 28, 26, 24, 22, 22];

/// Segments one chapter body. Diagnostics go to `ctx` under `record_id`.
pub fn segment(body: &str, record_id: &str, ctx: &mut BuildContext<'_>) -> Vec<Segment> {
    if let Err(e) = markup::check_balance(body) {
        ctx.diagnose(
            DiagnosticKind::MarkupUnparseable,
            record_id,
            markup::excerpt(body, e.offset),
            format!("<{}> {}; using recovered tree", e.tag, e.reason),
        );
    }
    for reference in entities::unresolved_references(body) {
        ctx.diagnose(
            DiagnosticKind::EntityUnresolvable,
            record_id,
            reference,
            "unknown character reference left as written",
        );
    }

    let fragment = markup::parse_fragment(body);
    let images = ImageResolver::new(ctx.options());
    let mut s = Segmenter {
        record_id,
        ctx,
        images,
        out: Vec::new(),
    };
    s.walk_children(fragment.nodes(), &StyleAttributes::default(), None);
    s.out
}

struct Segmenter<'a, 'f> {
    record_id: &'a str,
    ctx: &'a mut BuildContext<'f>,
    images: ImageResolver,
    out: Vec<Segment>,
}

#[derive(Debug, Clone, Copy)]
enum ListKind {
    Bullet,
    Ordered(u32),
}

impl Segmenter<'_, '_> {
    fn block_attrs(&self, node: &Handle, inherited: &StyleAttributes) -> StyleAttributes {
        let own = self
            .ctx
            .style()
            .resolve_attrs(attr(node, "class").as_deref(), attr(node, "style").as_deref());
        inherited.merged(&own)
    }

    /// Walks sibling nodes. Inline material between blocks is gathered into
    /// implicit paragraphs.
    fn walk_children(
        &mut self,
        children: &[Handle],
        inherited: &StyleAttributes,
        container_style: Option<&str>,
    ) {
        let mut loose: Vec<Handle> = Vec::new();
        let mut i = 0;
        while i < children.len() {
            let node = &children[i];
            i += 1;
            let tag = match &node.data {
                NodeData::Text { .. } => {
                    loose.push(node.clone());
                    continue;
                }
                NodeData::Element { .. } => match tag_lower(node) {
                    Some(t) => t,
                    None => continue,
                },
                _ => continue,
            };
            if markup::is_drop_content_tag(&tag) {
                self.flush_loose(&mut loose, inherited);
                continue;
            }

            match tag.as_str() {
                "figure" => {
                    self.flush_loose(&mut loose, inherited);
                    match FigureMarkup::from_figure(node, container_style.map(str::to_string)) {
                        Some(fm) => {
                            let consumed = self.trailing_alignment(children, i);
                            self.emit_figure(fm, consumed.as_ref().map(|(a, _)| a.as_str()));
                            if let Some((_, skip)) = consumed {
                                i = skip;
                            }
                        }
                        None => {
                            let attrs = self.block_attrs(node, inherited);
                            self.walk_children(&markup::node_children(node), &attrs, container_style);
                        }
                    }
                }
                "p" if is_bare_image_paragraph(node) => {
                    self.flush_loose(&mut loose, inherited);
                    if let Some(fm) =
                        FigureMarkup::from_bare_image(node, container_style.map(str::to_string))
                    {
                        let consumed = self.trailing_alignment(children, i);
                        self.emit_figure(fm, consumed.as_ref().map(|(a, _)| a.as_str()));
                        if let Some((_, skip)) = consumed {
                            i = skip;
                        }
                    }
                }
                "p" | "pre" | "address" => {
                    self.flush_loose(&mut loose, inherited);
                    let attrs = self.block_attrs(node, inherited);
                    self.emit_text_block(node, attrs, None);
                }
                "h1" | "h2" | "h3" | "h4" | "h5" | "h6" => {
                    self.flush_loose(&mut loose, inherited);
                    let level = tag[1..].parse::<usize>().unwrap_or(1);
                    let base = inherited.merged(&heading_attrs(level));
                    let attrs = self.block_attrs(node, &base);
                    self.emit_text_block(node, attrs, None);
                }
                "ul" | "ol" => {
                    self.flush_loose(&mut loose, inherited);
                    self.walk_list(node, &tag, inherited, container_style);
                }
                "li" => {
                    // Stray item outside a list.
                    self.flush_loose(&mut loose, inherited);
                    let attrs = self.block_attrs(node, &indented(inherited, LIST_INDENT_TWIPS));
                    self.walk_list_item(node, &attrs, Some(BULLET_PREFIX.to_string()), container_style);
                }
                "blockquote" => {
                    self.flush_loose(&mut loose, inherited);
                    let attrs = self.block_attrs(node, &indented(inherited, BLOCKQUOTE_INDENT_TWIPS));
                    let style = own_alignment_style(node);
                    self.walk_children(
                        &markup::node_children(node),
                        &attrs,
                        style.as_deref().or(container_style),
                    );
                }
                "div" | "section" | "article" | "main" | "header" | "footer" | "aside"
                | "nav" | "center" | "table" | "thead" | "tbody" | "tfoot" | "tr" | "td"
                | "th" | "dl" | "dt" | "dd" | "figcaption" | "form" | "fieldset" => {
                    self.flush_loose(&mut loose, inherited);
                    let mut base = inherited.clone();
                    if tag == "center" {
                        base.justification = Some(Justification::Center);
                    }
                    let attrs = self.block_attrs(node, &base);
                    let style = own_alignment_style(node);
                    self.walk_children(
                        &markup::node_children(node),
                        &attrs,
                        style.as_deref().or(container_style),
                    );
                }
                _ => loose.push(node.clone()),
            }
        }
        self.flush_loose(&mut loose, inherited);
    }

    fn walk_list(
        &mut self,
        list: &Handle,
        tag: &str,
        inherited: &StyleAttributes,
        container_style: Option<&str>,
    ) {
        let list_attrs = self.block_attrs(list, &indented(inherited, LIST_INDENT_TWIPS));
        let mut kind = if tag == "ol" {
            let start = attr(list, "start")
                .and_then(|s| s.trim().parse::<u32>().ok())
                .unwrap_or(1);
            ListKind::Ordered(start)
        } else {
            ListKind::Bullet
        };
        for item in markup::node_children(list) {
            match tag_lower(&item).as_deref() {
                Some("li") => {
                    let prefix = match &mut kind {
                        ListKind::Bullet => BULLET_PREFIX.to_string(),
                        ListKind::Ordered(n) => {
                            let p = format!("{n}. ");
                            *n += 1;
                            p
                        }
                    };
                    let attrs = self.block_attrs(&item, &list_attrs);
                    self.walk_list_item(&item, &attrs, Some(prefix), container_style);
                }
                Some(nested @ ("ul" | "ol")) => {
                    let nested = nested.to_string();
                    self.walk_list(&item, &nested, &list_attrs, container_style);
                }
                Some(_) => self.walk_children(&[item], &list_attrs, container_style),
                None => {}
            }
        }
    }

    /// Inline content of an item becomes one paragraph carrying the prefix;
    /// nested lists and block children follow as their own segments.
    fn walk_list_item(
        &mut self,
        item: &Handle,
        attrs: &StyleAttributes,
        mut prefix: Option<String>,
        container_style: Option<&str>,
    ) {
        let mut inline: Vec<Handle> = Vec::new();
        for child in markup::node_children(item) {
            let tag = tag_lower(&child);
            match tag.as_deref() {
                Some(t) if markup::is_drop_content_tag(t) => {}
                Some(t @ ("ul" | "ol")) => {
                    self.flush_item_inline(&mut inline, attrs, &mut prefix);
                    let t = t.to_string();
                    self.walk_list(&child, &t, attrs, container_style);
                }
                Some("p" | "div") if !is_bare_image_paragraph(&child) => {
                    self.flush_item_inline(&mut inline, attrs, &mut prefix);
                    let block = self.block_attrs(&child, attrs);
                    self.emit_text_block(&child, block, prefix.take());
                }
                Some("figure" | "p" | "div" | "blockquote" | "table") => {
                    self.flush_item_inline(&mut inline, attrs, &mut prefix);
                    self.walk_children(&[child], attrs, container_style);
                }
                _ => inline.push(child),
            }
        }
        self.flush_item_inline(&mut inline, attrs, &mut prefix);
        if let Some(p) = prefix {
            // Item with no content at all still shows its marker.
            self.out.push(Segment::Text {
                markup: markup::esc_text(&p),
                block: attrs.clone(),
            });
        }
    }

    fn flush_item_inline(
        &mut self,
        inline: &mut Vec<Handle>,
        attrs: &StyleAttributes,
        prefix: &mut Option<String>,
    ) {
        if inline.is_empty() {
            return;
        }
        let nodes = std::mem::take(inline);
        if is_blank(&nodes) {
            return;
        }
        let mut markup_text = prefix.take().map(|p| markup::esc_text(&p)).unwrap_or_default();
        markup_text.push_str(&markup::serialize_nodes(&nodes));
        self.out.push(Segment::Text {
            markup: markup_text,
            block: attrs.clone(),
        });
    }

    fn emit_text_block(&mut self, node: &Handle, block: StyleAttributes, prefix: Option<String>) {
        let children = markup::node_children(node);
        let mut markup_text = prefix.map(|p| markup::esc_text(&p)).unwrap_or_default();
        if !is_blank(&children) {
            markup_text.push_str(&markup::serialize_nodes(&children));
        }
        self.out.push(Segment::Text {
            markup: markup_text,
            block,
        });
    }

    fn flush_loose(&mut self, loose: &mut Vec<Handle>, inherited: &StyleAttributes) {
        if loose.is_empty() {
            return;
        }
        let nodes = std::mem::take(loose);
        if is_blank(&nodes) {
            return;
        }
        self.out.push(Segment::Text {
            markup: markup::serialize_nodes(&nodes),
            block: inherited.clone(),
        });
    }

    /// If the next element sibling is an alignment-only blank paragraph,
    /// returns its alignment and the index just past it.
    fn trailing_alignment(&self, siblings: &[Handle], from: usize) -> Option<(String, usize)> {
        let mut j = from;
        while j < siblings.len() && is_whitespace_text(&siblings[j]) {
            j += 1;
        }
        let next = siblings.get(j)?;
        if tag_lower(next).as_deref() != Some("p") || !is_blank(&markup::node_children(next)) {
            return None;
        }
        let style = attr(next, "style")?;
        let align = match self.ctx.style().inline(&style).justification? {
            Justification::Start => "left",
            Justification::Center => "center",
            Justification::End => "right",
            Justification::Justify => return None,
        };
        Some((align.to_string(), j + 1))
    }

    fn emit_figure(&mut self, mut fm: FigureMarkup, trailing: Option<&str>) {
        if !self.ctx.options().images {
            log::debug!("images disabled, dropping figure {}", fm.src);
            return;
        }
        if let Some(a) = trailing {
            fm = fm.with_trailing_align(a);
        }
        match self.images.resolve(&fm, self.ctx) {
            Ok(asset) => self.out.push(Segment::Figure(asset)),
            Err(e) => {
                let subject = if fm.src.starts_with("data:") {
                    fm.src.chars().take(40).collect()
                } else {
                    fm.src.clone()
                };
                self.ctx.diagnose(
                    DiagnosticKind::ImageFetchFailed,
                    self.record_id,
                    subject,
                    e.to_string(),
                );
            }
        }
    }
}

/// No text other than whitespace and non-breaking spaces, and no image.
fn is_blank(nodes: &[Handle]) -> bool {
    fn has_image(node: &Handle) -> bool {
        tag_lower(node).as_deref() == Some("img")
            || node.children.borrow().iter().any(has_image)
    }
    if nodes.iter().any(has_image) {
        return false;
    }
    nodes.iter().all(|n| {
        let text = entities::decode(&markup::text_content(n));
        text.chars().all(|c| c.is_whitespace() || c == '\u{A0}')
    })
}

fn own_alignment_style(node: &Handle) -> Option<String> {
    attr(node, "style").filter(|s| s.to_ascii_lowercase().contains("text-align"))
}

fn indented(inherited: &StyleAttributes, by: i32) -> StyleAttributes {
    let mut a = inherited.clone();
    a.left_indent_twips = Some(inherited.left_indent_twips.unwrap_or(0) + by);
    a
}

fn heading_attrs(level: usize) -> StyleAttributes {
    StyleAttributes {
        bold: Some(true),
        font_size_half_points: Some(HEADING_SIZES[level.clamp(1, 6) - 1]),
        spacing_before_twips: Some(240),
        spacing_after_twips: Some(120),
        ..Default::default()
    }
}
