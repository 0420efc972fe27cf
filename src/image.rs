//! Figure detection, placement metadata, fetching and geometry.

use crate::assemble::BuildContext;
use crate::entities;
use crate::markup::{self, attr, node_children, tag_lower};
use crate::model::{ImageAlignment, ImageAsset};
use crate::options::{CompileOptions, FetchOptions};
use ::image::{ImageFormat, ImageReader};
use base64::{engine::general_purpose, Engine as _};
use lazy_static::lazy_static;
use markup5ever_rcdom::{Handle, NodeData};
use md5::{Digest, Md5};
use regex::Regex;
use reqwest::blocking::Client;
use reqwest::header::CONTENT_TYPE;
use std::io::{Cursor, Read};
use std::sync::Arc;
use thiserror::Error;

lazy_static! {
    static ref RE_WIDTH: Regex = Regex::new(r"^(\d+(?:\.\d+)?)\s*(px|%)?$").unwrap();
    static ref RE_ALIGN_CLASS: Regex =
        Regex::new(r"^(?:image-style-)?align-?(left|center|right)$").unwrap();
}

/// Per-image failure. Never fatal for the batch.
#[derive(Error, Debug)]
pub enum ImageError {
    #[error("image has no src")]
    MissingSource,

    #[error("request failed: {0}")]
    Network(#[from] reqwest::Error),

    #[error("HTTP status {0}")]
    Status(u16),

    #[error("not an image: {0}")]
    NotAnImage(String),

    #[error("image larger than {0} bytes")]
    TooLarge(u64),

    #[error("bad data URI: {0}")]
    DataUri(String),

    #[error("unsupported image format: {0}")]
    UnsupportedFormat(String),

    #[error("image decode error: {0}")]
    Decode(#[from] ::image::ImageError),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// Raw bytes as delivered by a fetcher.
#[derive(Debug, Clone)]
pub struct FetchedImage {
    pub bytes: Vec<u8>,
    pub content_type: Option<String>,
}

/// Source of image bytes. `data:` URIs never reach the fetcher.
pub trait ImageFetcher {
    fn fetch(&self, url: &str) -> Result<FetchedImage, ImageError>;
}

/// Blocking HTTP fetcher.
pub struct HttpFetcher {
    client: Client,
    max_bytes: u64,
}

impl HttpFetcher {
    pub fn new(options: &FetchOptions) -> Result<Self, ImageError> {
        let client = Client::builder()
            .user_agent(options.user_agent.as_str())
            .timeout(options.timeout)
            .build()?;
        Ok(Self {
            client,
            max_bytes: options.max_bytes,
        })
    }
}

impl ImageFetcher for HttpFetcher {
    fn fetch(&self, url: &str) -> Result<FetchedImage, ImageError> {
        let resp = self.client.get(url).send()?;
        let status = resp.status();
        if !status.is_success() {
            return Err(ImageError::Status(status.as_u16()));
        }
        let content_type = resp
            .headers()
            .get(CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
            .map(|s| s.to_string());
        if let Some(ct) = &content_type {
            if !is_image_content_type(ct) {
                return Err(ImageError::NotAnImage(ct.clone()));
            }
        }
        if resp.content_length().is_some_and(|len| len > self.max_bytes) {
            return Err(ImageError::TooLarge(self.max_bytes));
        }
        let bytes = read_limited(resp, self.max_bytes)?;
        Ok(FetchedImage {
            bytes,
            content_type,
        })
    }
}

/// Reads at most `limit` bytes; a longer body is an error rather than a
/// truncated image.
fn read_limited<R: Read>(reader: R, limit: u64) -> Result<Vec<u8>, ImageError> {
    let mut bytes = Vec::new();
    reader.take(limit.saturating_add(1)).read_to_end(&mut bytes)?;
    if bytes.len() as u64 > limit {
        return Err(ImageError::TooLarge(limit));
    }
    Ok(bytes)
}

fn is_image_content_type(ct: &str) -> bool {
    ct.trim().to_ascii_lowercase().starts_with("image/")
}

/// Decodes `data:[<mime>][;base64],<payload>`.
pub fn decode_data_uri(uri: &str) -> Result<FetchedImage, ImageError> {
    let rest = uri
        .strip_prefix("data:")
        .ok_or_else(|| ImageError::DataUri("missing data: prefix".into()))?;
    let (meta, payload) = rest
        .split_once(',')
        .ok_or_else(|| ImageError::DataUri("missing comma".into()))?;
    let mut parts = meta.split(';');
    let mime = parts.next().unwrap_or("").trim();
    if !parts.any(|p| p.trim().eq_ignore_ascii_case("base64")) {
        return Err(ImageError::DataUri("only base64 payloads are supported".into()));
    }
    let cleaned: String = payload.chars().filter(|c| !c.is_whitespace()).collect();
    let bytes = general_purpose::STANDARD
        .decode(cleaned.as_bytes())
        .map_err(|e| ImageError::DataUri(e.to_string()))?;
    Ok(FetchedImage {
        bytes,
        content_type: (!mime.is_empty()).then(|| mime.to_string()),
    })
}

/// Placement metadata captured from the markup around one image.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FigureMarkup {
    pub src: String,
    pub figure_style: Option<String>,
    pub figure_class: Option<String>,
    pub figure_align: Option<String>,
    pub img_style: Option<String>,
    pub img_class: Option<String>,
    pub img_align: Option<String>,
    pub img_width: Option<String>,
    /// Inline style of the wrapping paragraph or container.
    pub wrapper_style: Option<String>,
    /// `text-align` of an alignment-only blank paragraph right after the figure.
    pub trailing_align: Option<String>,
    pub caption: Option<String>,
}

impl FigureMarkup {
    /// `<figure>` containing an `<img>`; `None` otherwise.
    pub fn from_figure(figure: &Handle, wrapper_style: Option<String>) -> Option<Self> {
        let img = find_descendant(figure, "img")?;
        let caption = find_descendant(figure, "figcaption")
            .map(|c| caption_text(&c))
            .filter(|c| !c.is_empty());
        let mut fm = Self::from_img(&img, wrapper_style);
        fm.figure_style = attr(figure, "style");
        fm.figure_class = attr(figure, "class");
        fm.figure_align = attr(figure, "align");
        fm.caption = caption;
        Some(fm)
    }

    /// `<p>` whose only non-blank content is a single `<img>`.
    pub fn from_bare_image(p: &Handle, container_style: Option<String>) -> Option<Self> {
        if !is_bare_image_paragraph(p) {
            return None;
        }
        let img = find_descendant(p, "img")?;
        let own = attr(p, "style").filter(|s| style_value(s, "text-align").is_some());
        Some(Self::from_img(&img, own.or(container_style)))
    }

    fn from_img(img: &Handle, wrapper_style: Option<String>) -> Self {
        Self {
            src: attr(img, "src").unwrap_or_default().trim().to_string(),
            img_style: attr(img, "style"),
            img_class: attr(img, "class"),
            img_align: attr(img, "align"),
            img_width: attr(img, "width"),
            wrapper_style,
            ..Default::default()
        }
    }

    pub fn with_trailing_align(mut self, value: impl Into<String>) -> Self {
        self.trailing_align = Some(value.into());
        self
    }

    pub fn alignment(&self) -> ImageAlignment {
        let style_align = |s: &Option<String>| {
            s.as_deref()
                .and_then(|s| style_value(s, "text-align"))
                .and_then(|v| ImageAlignment::parse(&v))
        };
        let float = |s: &Option<String>| {
            s.as_deref()
                .and_then(|s| style_value(s, "float"))
                .and_then(|v| match v.to_ascii_lowercase().as_str() {
                    "left" => Some(ImageAlignment::Left),
                    "right" => Some(ImageAlignment::Right),
                    _ => None,
                })
        };
        let attr_align = |a: &Option<String>| a.as_deref().and_then(ImageAlignment::parse);

        self.trailing_align
            .as_deref()
            .and_then(ImageAlignment::parse)
            .or_else(|| style_align(&self.wrapper_style))
            .or_else(|| style_align(&self.figure_style))
            .or_else(|| class_alignment(self.figure_class.as_deref()))
            .or_else(|| attr_align(&self.figure_align))
            .or_else(|| float(&self.figure_style))
            .or_else(|| class_alignment(self.img_class.as_deref()))
            .or_else(|| style_align(&self.img_style))
            .or_else(|| float(&self.img_style))
            .or_else(|| attr_align(&self.img_align))
            .unwrap_or(ImageAlignment::Left)
    }

    /// Display size in pixels. `natural` is the decoded `(width, height)`.
    ///
    /// Declared widths are honored as written (percentages of `reference`);
    /// only `max-width` clamps them. Without a declaration the natural width
    /// is used, capped at `reference`.
    pub fn display_size(&self, natural: Option<(u32, u32)>, reference: u32) -> (u32, u32) {
        let reference = reference.max(1);
        let natural_w = natural.map(|(w, _)| w).filter(|w| *w > 0);

        let declared = self
            .figure_style
            .as_deref()
            .and_then(|s| style_value(s, "width"))
            .and_then(|v| parse_width(&v))
            .or_else(|| {
                self.img_style
                    .as_deref()
                    .and_then(|s| style_value(s, "width"))
                    .and_then(|v| parse_width(&v))
            })
            .or_else(|| self.img_width.as_deref().and_then(parse_width));

        let mut width = match declared {
            Some(Width::Percent(p)) => reference as f64 * p / 100.0,
            Some(Width::Px(px)) => px,
            Some(Width::Natural) => natural_w.unwrap_or(reference) as f64,
            None => natural_w.map_or(reference, |w| w.min(reference)) as f64,
        };

        for style in [&self.figure_style, &self.img_style].into_iter().flatten() {
            if let Some(max) = style_value(style, "max-width").and_then(|v| parse_width(&v)) {
                let limit = match max {
                    Width::Percent(p) => reference as f64 * p / 100.0,
                    Width::Px(px) => px,
                    Width::Natural => continue,
                };
                width = width.min(limit);
            }
        }

        let width = (width.round() as u32).max(1);
        let height = match natural {
            Some((w, h)) if w > 0 && h > 0 => (width as f64 * h as f64 / w as f64).round() as u32,
            _ => width * 3 / 4,
        };
        (width, height.max(1))
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
enum Width {
    Percent(f64),
    Px(f64),
    Natural,
}

fn parse_width(v: &str) -> Option<Width> {
    let v = v.trim().to_ascii_lowercase();
    if matches!(v.as_str(), "auto" | "fit-content" | "max-content" | "min-content") {
        return Some(Width::Natural);
    }
    let c = RE_WIDTH.captures(&v)?;
    let n: f64 = c[1].parse().ok()?;
    if n <= 0.0 {
        return None;
    }
    match c.get(2).map(|m| m.as_str()) {
        Some("%") => Some(Width::Percent(n)),
        _ => Some(Width::Px(n)),
    }
}

/// Last value of `prop` in an inline style string.
fn style_value(style: &str, prop: &str) -> Option<String> {
    style
        .split(';')
        .filter_map(|decl| decl.split_once(':'))
        .filter(|(k, _)| k.trim().eq_ignore_ascii_case(prop))
        .map(|(_, v)| v.trim().trim_end_matches("!important").trim().to_string())
        .filter(|v| !v.is_empty())
        .last()
}

fn class_alignment(class: Option<&str>) -> Option<ImageAlignment> {
    for name in class?.split_whitespace() {
        let name = name.to_ascii_lowercase();
        if name == "image-style-side" {
            return Some(ImageAlignment::Right);
        }
        if let Some(c) = RE_ALIGN_CLASS.captures(&name) {
            return ImageAlignment::parse(&c[1]);
        }
    }
    None
}

fn find_descendant(node: &Handle, tag: &str) -> Option<Handle> {
    for c in node.children.borrow().iter() {
        if tag_lower(c).as_deref() == Some(tag) {
            return Some(c.clone());
        }
        if let Some(found) = find_descendant(c, tag) {
            return Some(found);
        }
    }
    None
}

fn caption_text(node: &Handle) -> String {
    let text = entities::decode(&markup::collapse_ws(&markup::text_content(node)));
    markup::trim_ascii_ws(&text).replace('\u{A0}', " ").trim().to_string()
}

/// True when `p` holds exactly one `<img>` and otherwise only blank text or
/// `<br>`, possibly through inline wrappers.
pub fn is_bare_image_paragraph(p: &Handle) -> bool {
    fn walk(node: &Handle, images: &mut usize) -> bool {
        for c in node_children(node) {
            match &c.data {
                NodeData::Text { contents } => {
                    if !contents
                        .borrow()
                        .chars()
                        .all(|ch| ch.is_whitespace() || ch == '\u{A0}')
                    {
                        return false;
                    }
                }
                NodeData::Element { .. } => match tag_lower(&c).as_deref() {
                    Some("img") => *images += 1,
                    Some("br") => {}
                    Some("span" | "a" | "b" | "strong" | "i" | "em" | "u") => {
                        if !walk(&c, images) {
                            return false;
                        }
                    }
                    _ => return false,
                },
                _ => {}
            }
        }
        true
    }
    let mut images = 0;
    walk(p, &mut images) && images == 1
}

/// Turns captured figure markup into an embedded asset.
#[derive(Debug, Clone, Copy)]
pub struct ImageResolver {
    reference_width_px: u32,
    captions: bool,
}

impl ImageResolver {
    pub fn new(options: &CompileOptions) -> Self {
        Self {
            reference_width_px: options.reference_width_px,
            captions: options.captions,
        }
    }

    /// Fetches, validates and measures the image, then assigns its sequence
    /// number, file name and relationship id and registers it with `ctx`.
    /// Ids are only consumed on success.
    pub fn resolve(
        &self,
        figure: &FigureMarkup,
        ctx: &mut BuildContext<'_>,
    ) -> Result<ImageAsset, ImageError> {
        let src = figure.src.trim();
        if src.is_empty() {
            return Err(ImageError::MissingSource);
        }
        let fetched = if src.starts_with("data:") {
            decode_data_uri(src)?
        } else if let Some(rest) = src.strip_prefix("//") {
            ctx.fetcher().fetch(&format!("https://{rest}"))?
        } else {
            ctx.fetcher().fetch(src)?
        };
        if let Some(ct) = &fetched.content_type {
            if !is_image_content_type(ct) {
                return Err(ImageError::NotAnImage(ct.clone()));
            }
        }

        let (data, extension, natural) = normalize_payload(fetched.bytes)?;
        let (width_px, height_px) = figure.display_size(natural, self.reference_width_px);

        let seq = ctx.next_image_seq();
        let relationship_id = ctx.next_relationship_id();
        let assigned_filename = format!("image{}_{}.{}", seq, short_hash(&data), extension);
        log::debug!(
            "image {} -> {} ({} bytes, natural {:?}, display {}x{})",
            display_src(src),
            assigned_filename,
            data.len(),
            natural,
            width_px,
            height_px
        );

        let asset = ImageAsset {
            source_url: src.to_string(),
            data: Arc::from(data),
            assigned_filename,
            relationship_id,
            width_px,
            height_px,
            alignment: figure.alignment(),
            caption: figure.caption.clone().filter(|_| self.captions),
            extension: extension.to_string(),
        };
        ctx.register(asset.clone());
        Ok(asset)
    }
}

/// Sniffs the format, transcodes WebP to PNG and reads the true dimensions.
fn normalize_payload(bytes: Vec<u8>) -> Result<(Vec<u8>, &'static str, Option<(u32, u32)>), ImageError> {
    let format = ::image::guess_format(&bytes)
        .map_err(|_| ImageError::NotAnImage("unrecognized image data".into()))?;
    match format {
        ImageFormat::WebP => {
            let img = ::image::load_from_memory_with_format(&bytes, ImageFormat::WebP)?;
            let dims = (img.width(), img.height());
            let mut out = Cursor::new(Vec::new());
            img.write_to(&mut out, ImageFormat::Png)?;
            Ok((out.into_inner(), "png", Some(dims)))
        }
        ImageFormat::Png | ImageFormat::Jpeg | ImageFormat::Gif => {
            let ext = match format {
                ImageFormat::Png => "png",
                ImageFormat::Jpeg => "jpg",
                _ => "gif",
            };
            let dims = natural_dimensions(&bytes);
            Ok((bytes, ext, dims))
        }
        other => Err(ImageError::UnsupportedFormat(format!("{other:?}"))),
    }
}

fn natural_dimensions(bytes: &[u8]) -> Option<(u32, u32)> {
    let reader = ImageReader::new(Cursor::new(bytes)).with_guessed_format().ok()?;
    match reader.into_dimensions() {
        Ok(dims) => Some(dims),
        Err(e) => {
            log::debug!("could not read image dimensions: {e}");
            None
        }
    }
}

fn short_hash(data: &[u8]) -> String {
    Md5::digest(data)
        .iter()
        .take(4)
        .map(|b| format!("{b:02x}"))
        .collect()
}

fn display_src(src: &str) -> String {
    if src.starts_with("data:") {
        src.chars().take(32).collect::<String>() + "…"
    } else {
        src.to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::markup::parse_fragment;
    use ::image::{DynamicImage, RgbImage};
    use std::collections::HashMap;

    fn png(w: u32, h: u32) -> Vec<u8> {
        let mut out = Cursor::new(Vec::new());
        DynamicImage::ImageRgb8(RgbImage::new(w, h))
            .write_to(&mut out, ImageFormat::Png)
            .unwrap();
        out.into_inner()
    }

    struct MapFetcher(HashMap<String, Result<FetchedImage, u16>>);

    impl ImageFetcher for MapFetcher {
        fn fetch(&self, url: &str) -> Result<FetchedImage, ImageError> {
            match self.0.get(url) {
                Some(Ok(img)) => Ok(img.clone()),
                Some(Err(status)) => Err(ImageError::Status(*status)),
                None => Err(ImageError::Status(404)),
            }
        }
    }

    fn figure(html: &str) -> FigureMarkup {
        let frag = parse_fragment(html);
        FigureMarkup::from_figure(&frag.nodes()[0], None).expect("figure with img")
    }

    #[test]
    fn half_width_figure_is_left_aligned_at_300px() {
        let f = figure(r#"<figure class="image" style="width:50%"><img src="a.png"></figure>"#);
        assert_eq!(f.alignment(), ImageAlignment::Left);
        assert_eq!(f.display_size(None, 600), (300, 225));
    }

    #[test]
    fn true_dimensions_override_four_by_three() {
        let f = figure(r#"<figure style="width:50%"><img src="a.png"></figure>"#);
        assert_eq!(f.display_size(Some((1000, 500)), 600), (300, 150));
    }

    #[test]
    fn width_fallbacks() {
        let f = figure(r#"<figure><img src="a.png"></figure>"#);
        assert_eq!(f.display_size(Some((400, 200)), 600), (400, 200));
        assert_eq!(f.display_size(Some((1200, 600)), 600), (600, 300));
        assert_eq!(f.display_size(None, 600), (600, 450));

        let f = figure(r#"<figure><img src="a.png" width="240"></figure>"#);
        assert_eq!(f.display_size(None, 600).0, 240);

        let f = figure(r#"<figure><img src="a.png" style="width:auto"></figure>"#);
        assert_eq!(f.display_size(Some((320, 240)), 600), (320, 240));

        let f = figure(r#"<figure><img src="a.png" style="width:500px;max-width:50%"></figure>"#);
        assert_eq!(f.display_size(None, 600).0, 300);
    }

    #[test]
    fn declared_widths_are_not_capped_at_the_reference() {
        let f = figure(r#"<figure><img src="a.png" style="width:auto"></figure>"#);
        assert_eq!(f.display_size(Some((1200, 900)), 600), (1200, 900));

        let f = figure(r#"<figure><img src="a.png" style="width:800px"></figure>"#);
        assert_eq!(f.display_size(Some((1600, 800)), 600), (800, 400));

        let f = figure(r#"<figure><img src="a.png" style="width:800px;max-width:100%"></figure>"#);
        assert_eq!(f.display_size(Some((1600, 800)), 600), (600, 300));
    }

    #[test]
    fn figure_percent_beats_img_percent() {
        let f = figure(r#"<figure style="width:25%"><img src="a" style="width:100%"></figure>"#);
        assert_eq!(f.display_size(None, 600).0, 150);
    }

    #[test]
    fn alignment_order() {
        let f = figure(r#"<figure class="image image-style-align-right"><img src="a"></figure>"#);
        assert_eq!(f.alignment(), ImageAlignment::Right);

        let f = figure(r#"<figure class="image-style-side"><img src="a"></figure>"#);
        assert_eq!(f.alignment(), ImageAlignment::Right);

        let f = figure(r#"<figure style="text-align:center" class="align-right"><img src="a"></figure>"#);
        assert_eq!(f.alignment(), ImageAlignment::Center);

        let f = figure(r#"<figure style="float:right"><img src="a" class="align-center"></figure>"#);
        assert_eq!(f.alignment(), ImageAlignment::Right);

        let f = figure(r#"<figure><img src="a" align="right"></figure>"#)
            .with_trailing_align("center");
        assert_eq!(f.alignment(), ImageAlignment::Center);

        let frag = parse_fragment(r#"<figure class="align-left"><img src="a"></figure>"#);
        let f = FigureMarkup::from_figure(&frag.nodes()[0], Some("text-align: right".into())).unwrap();
        assert_eq!(f.alignment(), ImageAlignment::Right);
    }

    #[test]
    fn bare_image_paragraph_detection() {
        let frag = parse_fragment(r#"<p style="text-align:center"> <img src="x.png"> &nbsp;</p>"#);
        let f = FigureMarkup::from_bare_image(&frag.nodes()[0], None).unwrap();
        assert_eq!(f.src, "x.png");
        assert_eq!(f.alignment(), ImageAlignment::Center);

        let frag = parse_fragment(r#"<p>text <img src="x.png"></p>"#);
        assert!(FigureMarkup::from_bare_image(&frag.nodes()[0], None).is_none());
        let frag = parse_fragment(r#"<p><img src="a"><img src="b"></p>"#);
        assert!(FigureMarkup::from_bare_image(&frag.nodes()[0], None).is_none());
    }

    #[test]
    fn caption_is_decoded_text() {
        let f = figure("<figure><img src=a><figcaption> Fig.&nbsp;1 &amp;amp; <i>more</i> </figcaption></figure>");
        assert_eq!(f.caption.as_deref(), Some("Fig. 1 & more"));
    }

    #[test]
    fn data_uri_decoding() {
        let bytes = png(2, 2);
        let uri = format!("data:image/png;base64,{}", general_purpose::STANDARD.encode(&bytes));
        let img = decode_data_uri(&uri).unwrap();
        assert_eq!(img.bytes, bytes);
        assert_eq!(img.content_type.as_deref(), Some("image/png"));
        assert!(decode_data_uri("data:image/png,rawbytes").is_err());
        assert!(decode_data_uri("data:image/png;base64,@@@").is_err());
    }

    #[test]
    fn resolve_assigns_ids_only_on_success() {
        let mut map = HashMap::new();
        map.insert(
            "http://x/ok.png".to_string(),
            Ok(FetchedImage {
                bytes: png(200, 100),
                content_type: Some("image/png".into()),
            }),
        );
        map.insert("http://x/gone.png".to_string(), Err(404));
        map.insert(
            "http://x/page.html".to_string(),
            Ok(FetchedImage {
                bytes: b"<html></html>".to_vec(),
                content_type: Some("text/html".into()),
            }),
        );
        let fetcher = MapFetcher(map);
        let options = CompileOptions::default();
        let mut ctx = BuildContext::new(options.clone(), &fetcher);
        let resolver = ImageResolver::new(&options);

        let gone = FigureMarkup {
            src: "http://x/gone.png".into(),
            ..Default::default()
        };
        assert!(matches!(resolver.resolve(&gone, &mut ctx), Err(ImageError::Status(404))));
        let html = FigureMarkup {
            src: "http://x/page.html".into(),
            ..Default::default()
        };
        assert!(matches!(resolver.resolve(&html, &mut ctx), Err(ImageError::NotAnImage(_))));

        let ok = FigureMarkup {
            src: "http://x/ok.png".into(),
            caption: Some("cap".into()),
            ..Default::default()
        };
        let first = resolver.resolve(&ok, &mut ctx).unwrap();
        let second = resolver.resolve(&ok, &mut ctx).unwrap();
        assert_eq!(first.relationship_id, 2);
        assert_eq!(second.relationship_id, 3);
        assert_eq!((first.width_px, first.height_px), (200, 100));
        assert!(first.assigned_filename.starts_with("image1_"));
        assert!(second.assigned_filename.starts_with("image2_"));
        assert!(first.assigned_filename.ends_with(".png"));
        assert_eq!(first.assigned_filename.len(), "image1_".len() + 8 + ".png".len());
        assert_eq!(first.caption.as_deref(), Some("cap"));
    }

    #[test]
    fn captions_can_be_disabled() {
        let fetcher = MapFetcher(HashMap::new());
        let options = CompileOptions::default().with_captions(false);
        let mut ctx = BuildContext::new(options.clone(), &fetcher);
        let bytes = png(10, 10);
        let f = FigureMarkup {
            src: format!("data:image/png;base64,{}", general_purpose::STANDARD.encode(&bytes)),
            caption: Some("dropped".into()),
            ..Default::default()
        };
        let asset = ImageResolver::new(&options).resolve(&f, &mut ctx).unwrap();
        assert_eq!(asset.caption, None);
        assert_eq!(asset.extension, "png");
    }

    #[test]
    fn webp_is_transcoded_to_png() {
        let mut webp = Cursor::new(Vec::new());
        DynamicImage::ImageRgba8(::image::RgbaImage::new(4, 3))
            .write_to(&mut webp, ImageFormat::WebP)
            .unwrap();
        let (data, ext, dims) = normalize_payload(webp.into_inner()).unwrap();
        assert_eq!(ext, "png");
        assert_eq!(dims, Some((4, 3)));
        assert_eq!(::image::guess_format(&data).unwrap(), ImageFormat::Png);
    }

    #[test]
    fn oversized_bodies_are_rejected() {
        let body = vec![7u8; 64];
        assert_eq!(read_limited(&body[..], 64).unwrap().len(), 64);
        assert!(matches!(read_limited(&body[..], 63), Err(ImageError::TooLarge(63))));
    }

    #[test]
    fn garbage_bytes_are_rejected() {
        assert!(matches!(
            normalize_payload(b"not an image".to_vec()),
            Err(ImageError::NotAnImage(_))
        ));
    }
}
