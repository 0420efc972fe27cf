//! Class-name and inline-CSS resolution into [`StyleAttributes`].

use crate::model::{Justification, RgbColor, StyleAttributes};
use lazy_static::lazy_static;
use regex::Regex;

/// Base body size used for relative units (`em`, `%`).
const BASE_FONT_POINTS: f64 = 11.0;
const TWIPS_PER_POINT: f64 = 20.0;
const TWIPS_PER_PX: f64 = 15.0;
const TWIPS_PER_INCH: f64 = 1440.0;
const TWIPS_PER_CM: f64 = 567.0;
const INDENT_STEP_TWIPS: i32 = 720;

lazy_static! {
    static ref RE_TEXT_SIZE: Regex = Regex::new(r"^text-(\d{1,3}(?:\.\d+)?)$").unwrap();
    static ref RE_MARGIN: Regex = Regex::new(r"^m([tb]?)-(\d{1,4})$").unwrap();
    static ref RE_PADDING: Regex = Regex::new(r"^p(l?)-(\d{1,4})$").unwrap();
    static ref RE_LENGTH: Regex =
        Regex::new(r"^(-?\d+(?:\.\d+)?|-?\.\d+)\s*(px|pt|em|rem|cm|mm|in|%)?$").unwrap();
    static ref RE_HEX6: Regex = Regex::new(r"^#([0-9a-fA-F]{6})$").unwrap();
    static ref RE_HEX3: Regex = Regex::new(r"^#([0-9a-fA-F]{3})$").unwrap();
    static ref RE_RGB: Regex = Regex::new(
        r"^rgba?\(\s*(\d{1,3})\s*[,\s]\s*(\d{1,3})\s*[,\s]\s*(\d{1,3})\s*(?:[,/]\s*[\d.]+%?\s*)?\)$"
    )
    .unwrap();
    static ref RE_HSL: Regex = Regex::new(
        r"^hsla?\(\s*(-?\d+(?:\.\d+)?)(?:deg)?\s*[,\s]\s*(\d+(?:\.\d+)?)%\s*[,\s]\s*(\d+(?:\.\d+)?)%\s*(?:[,/]\s*[\d.]+%?\s*)?\)$"
    )
    .unwrap();
}

/// Which parts of the resolver are active. The plain editor dialect only
/// needs the class registry, `text-align` and hex colors.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StyleCapabilities {
    pub parametric_classes: bool,
    pub extended_css: bool,
}

impl Default for StyleCapabilities {
    fn default() -> Self {
        Self {
            parametric_classes: true,
            extended_css: true,
        }
    }
}

impl StyleCapabilities {
    pub fn basic() -> Self {
        Self {
            parametric_classes: false,
            extended_css: false,
        }
    }
}

#[derive(Debug, Clone, Copy, Default)]
pub struct StyleResolver {
    caps: StyleCapabilities,
}

impl StyleResolver {
    pub fn new(caps: StyleCapabilities) -> Self {
        Self { caps }
    }

    /// Resolves class names first, then inline declarations on top of them.
    pub fn resolve<'a, I>(&self, class_names: I, inline: &str) -> StyleAttributes
    where
        I: IntoIterator<Item = &'a str>,
    {
        let mut attrs = StyleAttributes::default();
        for name in class_names {
            let name = name.trim();
            if name.is_empty() {
                continue;
            }
            if let Some(known) = registry_class(name) {
                attrs.overlay(&known);
            } else if let Some(param) = self.parametric_class(name) {
                attrs.overlay(&param);
            } else {
                log::trace!("ignoring unknown class `{name}`");
            }
        }
        attrs.overlay(&self.inline(inline));
        attrs
    }

    /// Convenience over raw `class` / `style` attribute values.
    pub fn resolve_attrs(&self, class_attr: Option<&str>, style_attr: Option<&str>) -> StyleAttributes {
        self.resolve(
            class_attr.unwrap_or("").split_whitespace(),
            style_attr.unwrap_or(""),
        )
    }

    fn parametric_class(&self, name: &str) -> Option<StyleAttributes> {
        if !self.caps.parametric_classes {
            return None;
        }
        let lower = name.to_ascii_lowercase();
        if let Some(c) = RE_TEXT_SIZE.captures(&lower) {
            let points: f64 = c[1].parse().ok()?;
            return Some(StyleAttributes {
                font_size_half_points: Some(half_points(points)?),
                ..Default::default()
            });
        }
        if let Some(c) = RE_MARGIN.captures(&lower) {
            let twips = c[2].parse::<u32>().ok()? * TWIPS_PER_POINT as u32;
            let mut attrs = StyleAttributes::default();
            match &c[1] {
                "t" => attrs.spacing_before_twips = Some(twips),
                "b" => attrs.spacing_after_twips = Some(twips),
                _ => {
                    attrs.spacing_before_twips = Some(twips);
                    attrs.spacing_after_twips = Some(twips);
                }
            }
            return Some(attrs);
        }
        if let Some(c) = RE_PADDING.captures(&lower) {
            let twips = c[2].parse::<i32>().ok()? * TWIPS_PER_POINT as i32;
            return Some(StyleAttributes {
                left_indent_twips: Some(twips),
                ..Default::default()
            });
        }
        None
    }

    /// Parses a `style` attribute. Later declarations win over earlier ones.
    pub fn inline(&self, declarations: &str) -> StyleAttributes {
        let mut attrs = StyleAttributes::default();
        for decl in declarations.split(';') {
            let Some((prop, value)) = decl.split_once(':') else {
                continue;
            };
            let prop = prop.trim().to_ascii_lowercase();
            let value = value.trim();
            let value = value
                .strip_suffix("!important")
                .map(str::trim_end)
                .unwrap_or(value);
            if value.is_empty() {
                continue;
            }
            self.apply_declaration(&mut attrs, &prop, value);
        }
        attrs
    }

    fn apply_declaration(&self, attrs: &mut StyleAttributes, prop: &str, value: &str) {
        match prop {
            "text-align" => {
                if let Some(j) = Justification::parse(value) {
                    attrs.justification = Some(j);
                }
            }
            "color" => {
                let color = if self.caps.extended_css {
                    parse_color(value)
                } else {
                    parse_hex6(value)
                };
                if let Some(c) = color {
                    attrs.color = Some(c);
                }
            }
            _ if !self.caps.extended_css => {}
            "font-weight" => {
                let v = value.to_ascii_lowercase();
                attrs.bold = match v.as_str() {
                    "bold" | "bolder" => Some(true),
                    "normal" | "lighter" => Some(false),
                    n => n.parse::<u32>().ok().map(|w| w >= 600).or(attrs.bold),
                };
            }
            "font-style" => {
                let v = value.to_ascii_lowercase();
                if v == "italic" || v.starts_with("oblique") {
                    attrs.italic = Some(true);
                } else if v == "normal" {
                    attrs.italic = Some(false);
                }
            }
            "text-decoration" | "text-decoration-line" => {
                let v = value.to_ascii_lowercase();
                if v.split_whitespace().any(|t| t == "none") {
                    attrs.underline = Some(false);
                    attrs.strike = Some(false);
                }
                if v.contains("underline") {
                    attrs.underline = Some(true);
                }
                if v.contains("line-through") {
                    attrs.strike = Some(true);
                }
            }
            "font-size" => {
                if let Some(hp) = parse_font_size(value) {
                    attrs.font_size_half_points = Some(hp);
                }
            }
            "margin-left" | "padding-left" => {
                if let Some(t) = parse_length_twips(value) {
                    attrs.left_indent_twips = Some(t);
                }
            }
            "text-indent" => {
                if let Some(t) = parse_length_twips(value) {
                    if t < 0 {
                        attrs.hanging_indent_twips = Some(-t);
                        attrs.first_line_indent_twips = None;
                    } else {
                        attrs.first_line_indent_twips = Some(t);
                        attrs.hanging_indent_twips = None;
                    }
                }
            }
            "margin-top" => {
                if let Some(t) = parse_length_twips(value) {
                    attrs.spacing_before_twips = Some(t.max(0) as u32);
                }
            }
            "margin-bottom" => {
                if let Some(t) = parse_length_twips(value) {
                    attrs.spacing_after_twips = Some(t.max(0) as u32);
                }
            }
            "margin" => apply_margin_shorthand(attrs, value),
            _ => {}
        }
    }
}

fn apply_margin_shorthand(attrs: &mut StyleAttributes, value: &str) {
    let parts: Vec<Option<i32>> = value.split_whitespace().map(parse_length_twips).collect();
    let (top, bottom, left) = match parts.as_slice() {
        [all] => (*all, *all, *all),
        [v, h] => (*v, *v, *h),
        [t, h, b] => (*t, *b, *h),
        [t, _, b, l] => (*t, *b, *l),
        _ => return,
    };
    if let Some(t) = top {
        attrs.spacing_before_twips = Some(t.max(0) as u32);
    }
    if let Some(b) = bottom {
        attrs.spacing_after_twips = Some(b.max(0) as u32);
    }
    if let Some(l) = left {
        attrs.left_indent_twips = Some(l);
    }
}

fn half_points(points: f64) -> Option<u32> {
    if !(points > 0.0 && points < 1000.0) {
        return None;
    }
    Some((points * 2.0).round() as u32)
}

/// Converts a CSS length into twips. Unitless zero is allowed; other
/// unitless numbers are read as pixels.
pub fn parse_length_twips(value: &str) -> Option<i32> {
    let v = value.trim().to_ascii_lowercase();
    if v == "0" {
        return Some(0);
    }
    let c = RE_LENGTH.captures(&v)?;
    let n: f64 = c[1].parse().ok()?;
    let twips = match c.get(2).map(|m| m.as_str()).unwrap_or("px") {
        "px" => n * TWIPS_PER_PX,
        "pt" => n * TWIPS_PER_POINT,
        "em" | "rem" => n * BASE_FONT_POINTS * TWIPS_PER_POINT,
        "in" => n * TWIPS_PER_INCH,
        "cm" => n * TWIPS_PER_CM,
        "mm" => n * TWIPS_PER_CM / 10.0,
        _ => return None,
    };
    Some(twips.round() as i32)
}

fn parse_font_size(value: &str) -> Option<u32> {
    let v = value.trim().to_ascii_lowercase();
    let keyword = match v.as_str() {
        "xx-small" => Some(7.0),
        "x-small" => Some(7.5),
        "small" => Some(10.0),
        "medium" => Some(12.0),
        "large" => Some(13.5),
        "x-large" => Some(18.0),
        "xx-large" => Some(24.0),
        _ => None,
    };
    if let Some(pt) = keyword {
        return half_points(pt);
    }
    let c = RE_LENGTH.captures(&v)?;
    let n: f64 = c[1].parse().ok()?;
    let points = match c.get(2).map(|m| m.as_str()).unwrap_or("px") {
        "pt" => n,
        "px" => n * 0.75,
        "em" | "rem" => n * BASE_FONT_POINTS,
        "%" => n * BASE_FONT_POINTS / 100.0,
        _ => return None,
    };
    half_points(points)
}

fn parse_hex6(value: &str) -> Option<RgbColor> {
    let c = RE_HEX6.captures(value.trim())?;
    let v = u32::from_str_radix(&c[1], 16).ok()?;
    Some(RgbColor((v >> 16) as u8, (v >> 8) as u8, v as u8))
}

/// Parses a CSS color. Tries 6-digit hex, 3-digit hex, `rgb()`, `hsl()` and
/// the named-color table in that order; `None` when nothing matches.
pub fn parse_color(value: &str) -> Option<RgbColor> {
    let v = value.trim();
    if let Some(c) = parse_hex6(v) {
        return Some(c);
    }
    if let Some(c) = RE_HEX3.captures(v) {
        let digits: Vec<u8> = c[1]
            .chars()
            .filter_map(|ch| ch.to_digit(16))
            .map(|d| (d * 17) as u8)
            .collect();
        return Some(RgbColor(digits[0], digits[1], digits[2]));
    }
    let lower = v.to_ascii_lowercase();
    if let Some(c) = RE_RGB.captures(&lower) {
        let channel = |i: usize| c[i].parse::<u32>().ok().map(|n| n.min(255) as u8);
        return Some(RgbColor(channel(1)?, channel(2)?, channel(3)?));
    }
    if let Some(c) = RE_HSL.captures(&lower) {
        let h: f64 = c[1].parse().ok()?;
        let s: f64 = c[2].parse().ok()?;
        let l: f64 = c[3].parse().ok()?;
        return Some(hsl_to_rgb(h, s / 100.0, l / 100.0));
    }
    named_color(&lower)
}

/// HSL (degrees, 0..1, 0..1) to RGB.
pub fn hsl_to_rgb(h: f64, s: f64, l: f64) -> RgbColor {
    let h = h.rem_euclid(360.0) / 360.0;
    let s = s.clamp(0.0, 1.0);
    let l = l.clamp(0.0, 1.0);
    if s == 0.0 {
        let v = (l * 255.0).round() as u8;
        return RgbColor(v, v, v);
    }
    let q = if l < 0.5 { l * (1.0 + s) } else { l + s - l * s };
    let p = 2.0 * l - q;
    let channel = |t: f64| {
        let t = t.rem_euclid(1.0);
        let v = if t < 1.0 / 6.0 {
            p + (q - p) * 6.0 * t
        } else if t < 0.5 {
            q
        } else if t < 2.0 / 3.0 {
            p + (q - p) * (2.0 / 3.0 - t) * 6.0
        } else {
            p
        };
        (v * 255.0).round().clamp(0.0, 255.0) as u8
    };
    RgbColor(channel(h + 1.0 / 3.0), channel(h), channel(h - 1.0 / 3.0))
}

fn named_color(name: &str) -> Option<RgbColor> {
    let hex: u32 = match name {
        "black" => 0x000000,
        "white" => 0xFFFFFF,
        "red" => 0xFF0000,
        "green" => 0x008000,
        "lime" => 0x00FF00,
        "blue" => 0x0000FF,
        "yellow" => 0xFFFF00,
        "cyan" | "aqua" => 0x00FFFF,
        "magenta" | "fuchsia" => 0xFF00FF,
        "gray" | "grey" => 0x808080,
        "silver" => 0xC0C0C0,
        "maroon" => 0x800000,
        "olive" => 0x808000,
        "navy" => 0x000080,
        "purple" => 0x800080,
        "teal" => 0x008080,
        "orange" => 0xFFA500,
        "brown" => 0xA52A2A,
        "pink" => 0xFFC0CB,
        "gold" => 0xFFD700,
        "indigo" => 0x4B0082,
        "violet" => 0xEE82EE,
        "crimson" => 0xDC143C,
        "darkred" => 0x8B0000,
        "darkgreen" => 0x006400,
        "darkblue" => 0x00008B,
        "darkgray" | "darkgrey" => 0xA9A9A9,
        "lightgray" | "lightgrey" => 0xD3D3D3,
        "dimgray" | "dimgrey" => 0x696969,
        "darkorange" => 0xFF8C00,
        "orangered" => 0xFF4500,
        "tomato" => 0xFF6347,
        "coral" => 0xFF7F50,
        "salmon" => 0xFA8072,
        "firebrick" => 0xB22222,
        "steelblue" => 0x4682B4,
        "royalblue" => 0x4169E1,
        "dodgerblue" => 0x1E90FF,
        "skyblue" => 0x87CEEB,
        "slategray" | "slategrey" => 0x708090,
        "forestgreen" => 0x228B22,
        "seagreen" => 0x2E8B57,
        "limegreen" => 0x32CD32,
        "chocolate" => 0xD2691E,
        "sienna" => 0xA0522D,
        "tan" => 0xD2B48C,
        "khaki" => 0xF0E68C,
        "turquoise" => 0x40E0D0,
        "orchid" => 0xDA70D6,
        "plum" => 0xDDA0DD,
        "hotpink" => 0xFF69B4,
        "deeppink" => 0xFF1493,
        _ => return None,
    };
    Some(RgbColor((hex >> 16) as u8, (hex >> 8) as u8, hex as u8))
}

fn registry_class(name: &str) -> Option<StyleAttributes> {
    let mut a = StyleAttributes::default();
    match name.to_ascii_lowercase().as_str() {
        "text-left" | "align-left" | "text-start" => a.justification = Some(Justification::Start),
        "text-center" | "align-center" | "center" | "centered" => {
            a.justification = Some(Justification::Center)
        }
        "text-right" | "align-right" | "text-end" => a.justification = Some(Justification::End),
        "text-justify" | "align-justify" | "justify" => {
            a.justification = Some(Justification::Justify)
        }

        "indent-a" => a.first_line_indent_twips = Some(INDENT_STEP_TWIPS),
        "indent" | "indent-1" => a.left_indent_twips = Some(INDENT_STEP_TWIPS),
        "indent-2" => a.left_indent_twips = Some(INDENT_STEP_TWIPS * 2),
        "indent-3" => a.left_indent_twips = Some(INDENT_STEP_TWIPS * 3),
        "hanging" | "hanging-indent" => {
            a.left_indent_twips = Some(INDENT_STEP_TWIPS);
            a.hanging_indent_twips = Some(INDENT_STEP_TWIPS);
        }
        "no-indent" => {
            a.left_indent_twips = Some(0);
            a.first_line_indent_twips = Some(0);
        }

        "bold" | "font-bold" | "fw-bold" | "text-bold" | "strong" => a.bold = Some(true),
        "fw-normal" | "font-normal" => a.bold = Some(false),
        "italic" | "font-italic" | "fst-italic" | "text-italic" | "em" => a.italic = Some(true),
        "underline" | "text-underline" | "text-decoration-underline" => a.underline = Some(true),
        "strike" | "line-through" | "text-strike" | "text-decoration-line-through" => {
            a.strike = Some(true)
        }

        "text-tiny" => a.font_size_half_points = Some(16),
        "text-small" | "small" => a.font_size_half_points = Some(18),
        "text-big" | "large" => a.font_size_half_points = Some(30),
        "text-huge" => a.font_size_half_points = Some(40),

        "text-red" | "text-danger" => a.color = Some(RgbColor(0xC0, 0x00, 0x00)),
        "text-blue" | "text-primary" => a.color = Some(RgbColor(0x1F, 0x4E, 0x79)),
        "text-green" | "text-success" => a.color = Some(RgbColor(0x38, 0x76, 0x1D)),
        "text-orange" => a.color = Some(RgbColor(0xC5, 0x5A, 0x11)),
        "text-purple" => a.color = Some(RgbColor(0x70, 0x30, 0xA0)),
        "text-muted" | "text-secondary" | "text-gray" | "text-grey" => {
            a.color = Some(RgbColor(0x6C, 0x75, 0x7D))
        }
        "text-black" => a.color = Some(RgbColor::BLACK),

        "quote" | "blockquote" => {
            a.italic = Some(true);
            a.left_indent_twips = Some(INDENT_STEP_TWIPS);
            a.color = Some(RgbColor(0x59, 0x59, 0x59));
        }
        "warning" => {
            a.bold = Some(true);
            a.color = Some(RgbColor(0xC0, 0x00, 0x00));
        }
        "note" => {
            a.italic = Some(true);
            a.color = Some(RgbColor(0x2F, 0x54, 0x96));
        }
        "highlight" => a.bold = Some(true),
        "caption" => {
            a.italic = Some(true);
            a.font_size_half_points = Some(20);
        }
        "lead" => a.font_size_half_points = Some(26),
        _ => return None,
    }
    Some(a)
}
