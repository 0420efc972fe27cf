//! Inline markup to styled runs.

use crate::entities;
use crate::markup::{self, attr_get, attrs_vec, collapse_ws, tag_lower};
use crate::model::{RgbColor, Run, StyleAttributes};
use crate::style::StyleResolver;
use markup5ever_rcdom::{Handle, NodeData};

const LINK_COLOR: RgbColor = RgbColor(0x05, 0x63, 0xC1);
const NBSP: char = '\u{A0}';

/// Composes the runs of one paragraph.
///
/// `inherited` is the run-level formatting of the enclosing block. Always
/// returns at least one run. Markup whose inline tags do not pair up is
/// flattened into a single plain run.
pub fn compose(markup: &str, inherited: &StyleAttributes, resolver: &StyleResolver) -> Vec<Run> {
    if let Err(e) = markup::check_balance(markup) {
        log::warn!(
            "unbalanced <{}> ({}), flattening paragraph: {}",
            e.tag,
            e.reason,
            markup::excerpt(markup, e.offset)
        );
        return vec![Run::text(plain_text(markup), inherited.clone())];
    }

    let mut composer = Composer {
        resolver,
        runs: Vec::new(),
    };
    let fragment = markup::parse_fragment(markup);
    for node in fragment.nodes() {
        composer.walk(node, inherited, false);
    }
    composer.finish(inherited)
}

/// Tag-stripped, decoded, whitespace-normalized text.
pub fn plain_text(markup: &str) -> String {
    let stripped = markup::strip_tags(markup);
    let decoded = entities::decode(&collapse_ws(&stripped));
    markup::trim_ascii_ws(&decoded).replace(NBSP, " ")
}

struct Composer<'a> {
    resolver: &'a StyleResolver,
    runs: Vec<Run>,
}

impl Composer<'_> {
    fn walk(&mut self, node: &Handle, attrs: &StyleAttributes, in_link: bool) {
        match &node.data {
            NodeData::Text { contents } => {
                let raw = contents.borrow().to_string();
                self.push_text(&raw, attrs, in_link);
            }
            NodeData::Element { .. } => {
                let Some(tag) = tag_lower(node) else { return };
                if markup::is_drop_content_tag(&tag) || tag == "img" {
                    return;
                }
                if tag == "br" {
                    self.push_break(attrs, in_link);
                    return;
                }

                let mut next = attrs.clone();
                match tag.as_str() {
                    "u" | "ins" => next.underline = Some(true),
                    "i" | "em" | "cite" => next.italic = Some(true),
                    "b" | "strong" => next.bold = Some(true),
                    "s" | "strike" | "del" => next.strike = Some(true),
                    _ => {}
                }
                let el_attrs = attrs_vec(node);
                let class = attr_get(&el_attrs, "class");
                let style = attr_get(&el_attrs, "style");
                if class.is_some() || style.is_some() {
                    next.overlay(
                        &self
                            .resolver
                            .resolve_attrs(class.as_deref(), style.as_deref())
                            .run_level(),
                    );
                }

                let in_link = in_link || tag == "a";
                for c in node.children.borrow().iter() {
                    self.walk(c, &next, in_link);
                }
            }
            _ => {}
        }
    }

    fn effective(attrs: &StyleAttributes, in_link: bool) -> StyleAttributes {
        let mut a = attrs.clone();
        if in_link {
            a.color = Some(LINK_COLOR);
            a.underline = Some(true);
        }
        a
    }

    fn push_text(&mut self, raw: &str, attrs: &StyleAttributes, in_link: bool) {
        let mut text = entities::decode(&collapse_ws(raw));
        let at_line_start = match self.runs.last() {
            None => true,
            Some(r) => r.is_line_break || (r.text.is_empty() && self.runs.len() == 1),
        };
        let after_space = self
            .runs
            .last()
            .is_some_and(|r| !r.is_line_break && r.text.ends_with(' '));
        if at_line_start || after_space {
            text = text.trim_start_matches(' ').to_string();
        }
        if text.is_empty() {
            return;
        }

        let attributes = Self::effective(attrs, in_link);
        if let Some(last) = self.runs.last_mut() {
            if !last.is_line_break && last.attributes == attributes {
                last.text.push_str(&text);
                return;
            }
        }
        self.runs.push(Run::text(text, attributes));
    }

    fn push_break(&mut self, attrs: &StyleAttributes, in_link: bool) {
        let attributes = Self::effective(attrs, in_link);
        let needs_text = self.runs.last().map_or(true, |r| r.is_line_break);
        if needs_text {
            self.runs.push(Run::text("", attributes.clone()));
        }
        self.runs.push(Run::line_break(attributes));
    }

    fn finish(mut self, inherited: &StyleAttributes) -> Vec<Run> {
        // Trailing whitespace at the paragraph edge.
        while let Some(last) = self.runs.last_mut() {
            if last.is_line_break {
                break;
            }
            let trimmed_len = last.text.trim_end_matches(' ').len();
            last.text.truncate(trimmed_len);
            let removable = last.text.is_empty()
                && self.runs.len() > 1
                && !self.runs[self.runs.len() - 2].is_line_break;
            if removable {
                self.runs.pop();
            } else {
                break;
            }
        }

        match self.runs.last() {
            None => self.runs.push(Run::text("", inherited.clone())),
            Some(r) if r.is_line_break => {
                let attributes = r.attributes.clone();
                self.runs.push(Run::text("", attributes));
            }
            Some(_) => {}
        }

        for run in &mut self.runs {
            if run.text.contains(NBSP) {
                run.text = run.text.replace(NBSP, " ");
            }
        }
        self.runs
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::style::StyleCapabilities;

    fn runs(markup: &str) -> Vec<Run> {
        compose(markup, &StyleAttributes::default(), &StyleResolver::default())
    }

    fn bold() -> StyleAttributes {
        StyleAttributes {
            bold: Some(true),
            ..Default::default()
        }
    }

    #[test]
    fn plain_then_bold() {
        let r = runs("Hello <b>world</b>");
        assert_eq!(
            r,
            vec![
                Run::text("Hello ", StyleAttributes::default()),
                Run::text("world", bold()),
            ]
        );
    }

    #[test]
    fn breaks_split_text_into_n_plus_one_runs() {
        for (markup, n) in [
            ("a<br>b", 1),
            ("a<br><br>b", 2),
            ("<br>x", 1),
            ("x<br>", 1),
            ("<br><br><br>", 3),
        ] {
            let r = runs(markup);
            let breaks = r.iter().filter(|x| x.is_line_break).count();
            let texts = r.iter().filter(|x| !x.is_line_break).count();
            assert_eq!(breaks, n, "{markup}");
            assert_eq!(texts, n + 1, "{markup}");
        }
    }

    #[test]
    fn adjacent_breaks_keep_an_empty_run_between_them() {
        let r = runs("a<br><br>b");
        let texts: Vec<_> = r.iter().map(|x| (x.text.as_str(), x.is_line_break)).collect();
        assert_eq!(
            texts,
            vec![("a", false), ("", true), ("", false), ("", true), ("b", false)]
        );
    }

    #[test]
    fn nested_span_color_with_bold() {
        let r = runs(r#"<span style="color:#ff0000">red <b>bold red</b></span>"#);
        assert_eq!(r.len(), 2);
        assert_eq!(r[0].attributes.color, Some(RgbColor(255, 0, 0)));
        assert_eq!(r[0].attributes.bold, None);
        assert_eq!(r[1].attributes.color, Some(RgbColor(255, 0, 0)));
        assert_eq!(r[1].attributes.bold, Some(true));
    }

    #[test]
    fn link_color_cannot_be_overridden() {
        let r = runs(r#"<a href="x"><span style="color:green;text-decoration:none">go</span></a>"#);
        assert_eq!(r[0].text, "go");
        assert_eq!(r[0].attributes.color, Some(LINK_COLOR));
        assert_eq!(r[0].attributes.underline, Some(true));
    }

    #[test]
    fn whitespace_collapses_and_edges_trim() {
        let r = runs("  one \n\n <i> two </i>  three  ");
        let text: String = r.iter().map(|x| x.text.as_str()).collect();
        assert_eq!(text, "one two three");
    }

    #[test]
    fn nbsp_survives_trimming_as_plain_space() {
        let r = runs("&nbsp;x&nbsp;");
        assert_eq!(r.len(), 1);
        assert_eq!(r[0].text, " x ");
    }

    #[test]
    fn double_escaped_entities_are_decoded() {
        let r = runs("a &amp;amp; b &amp;hellip;");
        assert_eq!(r[0].text, "a & b …");
    }

    #[test]
    fn empty_markup_gives_one_empty_run() {
        let inherited = StyleAttributes {
            italic: Some(true),
            ..Default::default()
        };
        let r = compose("", &inherited, &StyleResolver::default());
        assert_eq!(r, vec![Run::text("", inherited)]);
    }

    #[test]
    fn unknown_tags_are_transparent() {
        let r = runs("<mark>kept</mark> <foo-bar>too</foo-bar>");
        let text: String = r.iter().map(|x| x.text.as_str()).collect();
        assert_eq!(text, "kept too");
    }

    #[test]
    fn strike_and_underline() {
        let r = runs("<u>u</u><del>d</del>");
        assert_eq!(r[0].attributes.underline, Some(true));
        assert_eq!(r[1].attributes.strike, Some(true));
    }

    #[test]
    fn unbalanced_markup_flattens_to_plain_text() {
        let r = runs("<b>bold <i>both</b> tail</i> &amp; more");
        assert_eq!(r.len(), 1);
        assert_eq!(r[0].text, "bold both tail & more");
        assert!(r[0].attributes.is_empty());
    }

    #[test]
    fn class_attributes_apply_to_inline_elements() {
        let r = runs(r#"plain <span class="text-big text-red">big</span>"#);
        assert_eq!(r[1].attributes.font_size_half_points, Some(30));
        assert_eq!(r[1].attributes.color, Some(RgbColor(0xC0, 0, 0)));
    }

    #[test]
    fn basic_resolver_ignores_extended_css() {
        let resolver = StyleResolver::new(StyleCapabilities::basic());
        let r = compose(
            r#"<span style="font-weight:bold">x</span>"#,
            &StyleAttributes::default(),
            &resolver,
        );
        assert_eq!(r[0].attributes.bold, None);
    }
}
