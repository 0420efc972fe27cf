//! Document model produced by the compiler and consumed by packaging.

use serde::{Serialize, Serializer};
use std::sync::Arc;

/// Relationship ids below this value belong to fixed document parts
/// (`rId1` is the styles part).
pub const FIRST_IMAGE_RELATIONSHIP_ID: u32 = 2;

/// One input row: chapter id, chapter title and the editor HTML body.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ChapterRecord {
    pub id: String,
    pub title: String,
    pub body: String,
}

impl ChapterRecord {
    pub fn new(id: impl Into<String>, title: impl Into<String>, body: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            title: title.into(),
            body: body.into(),
        }
    }

    /// Builds a record from raw fields. Fields past the third are ignored.
    ///
    /// Returns a message describing the defect when fewer than three
    /// populated fields are present.
    pub fn from_fields<S: AsRef<str>>(fields: &[S]) -> Result<Self, String> {
        if fields.len() < 3 {
            return Err(format!("expected 3 fields, found {}", fields.len()));
        }
        let id = fields[0].as_ref().trim();
        let title = fields[1].as_ref().trim();
        let body = fields[2].as_ref().trim();
        for (name, value) in [("id", id), ("title", title), ("body", body)] {
            if value.is_empty() {
                return Err(format!("field `{name}` is empty"));
            }
        }
        Ok(Self::new(id, title, body))
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RgbColor(pub u8, pub u8, pub u8);

impl RgbColor {
    pub const BLACK: RgbColor = RgbColor(0, 0, 0);

    /// Upper-case `RRGGBB`, the form WordprocessingML expects.
    pub fn to_hex(self) -> String {
        format!("{:02X}{:02X}{:02X}", self.0, self.1, self.2)
    }
}

impl Serialize for RgbColor {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.to_hex())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Justification {
    Start,
    Center,
    End,
    Justify,
}

impl Justification {
    pub fn parse(value: &str) -> Option<Self> {
        match value.trim().to_ascii_lowercase().as_str() {
            "left" | "start" => Some(Self::Start),
            "center" | "middle" => Some(Self::Center),
            "right" | "end" => Some(Self::End),
            "justify" | "both" => Some(Self::Justify),
            _ => None,
        }
    }

    /// Value of `w:jc`.
    pub fn as_word_value(self) -> &'static str {
        match self {
            Self::Start => "left",
            Self::Center => "center",
            Self::End => "right",
            Self::Justify => "both",
        }
    }
}

/// Formatting attributes. Every field is optional so that "unset" stays
/// distinguishable from an explicit value (no color vs. black, not bold vs.
/// explicitly normal weight).
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct StyleAttributes {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub bold: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub italic: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub underline: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub strike: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub color: Option<RgbColor>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub font_size_half_points: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub justification: Option<Justification>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub left_indent_twips: Option<i32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub hanging_indent_twips: Option<i32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub first_line_indent_twips: Option<i32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub spacing_before_twips: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub spacing_after_twips: Option<u32>,
}

macro_rules! overlay_fields {
    ($dst:expr, $src:expr, $($field:ident),+ $(,)?) => {
        $(
            if $src.$field.is_some() {
                $dst.$field = $src.$field;
            }
        )+
    };
}

impl StyleAttributes {
    pub fn is_empty(&self) -> bool {
        *self == Self::default()
    }

    /// Field-level merge: every field set in `other` replaces the field here,
    /// unset fields leave the current value alone.
    pub fn overlay(&mut self, other: &StyleAttributes) {
        overlay_fields!(
            self,
            other,
            bold,
            italic,
            underline,
            strike,
            color,
            font_size_half_points,
            justification,
            left_indent_twips,
            hanging_indent_twips,
            first_line_indent_twips,
            spacing_before_twips,
            spacing_after_twips,
        );
    }

    pub fn merged(&self, other: &StyleAttributes) -> StyleAttributes {
        let mut out = self.clone();
        out.overlay(other);
        out
    }

    /// Character-level subset, the part a run inherits from its paragraph.
    pub fn run_level(&self) -> StyleAttributes {
        StyleAttributes {
            bold: self.bold,
            italic: self.italic,
            underline: self.underline,
            strike: self.strike,
            color: self.color,
            font_size_half_points: self.font_size_half_points,
            ..StyleAttributes::default()
        }
    }

    /// Paragraph-level subset.
    pub fn block_level(&self) -> StyleAttributes {
        StyleAttributes {
            justification: self.justification,
            left_indent_twips: self.left_indent_twips,
            hanging_indent_twips: self.hanging_indent_twips,
            first_line_indent_twips: self.first_line_indent_twips,
            spacing_before_twips: self.spacing_before_twips,
            spacing_after_twips: self.spacing_after_twips,
            ..StyleAttributes::default()
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Run {
    pub text: String,
    pub attributes: StyleAttributes,
    pub is_line_break: bool,
}

impl Run {
    pub fn text(text: impl Into<String>, attributes: StyleAttributes) -> Self {
        Self {
            text: text.into(),
            attributes,
            is_line_break: false,
        }
    }

    pub fn line_break(attributes: StyleAttributes) -> Self {
        Self {
            text: String::new(),
            attributes,
            is_line_break: true,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ImageAlignment {
    Left,
    Center,
    Right,
}

impl ImageAlignment {
    pub fn parse(value: &str) -> Option<Self> {
        match value.trim().to_ascii_lowercase().as_str() {
            "left" | "start" => Some(Self::Left),
            "center" | "middle" => Some(Self::Center),
            "right" | "end" => Some(Self::Right),
            _ => None,
        }
    }

    pub fn as_justification(self) -> Justification {
        match self {
            Self::Left => Justification::Start,
            Self::Center => Justification::Center,
            Self::Right => Justification::End,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ImageAsset {
    pub source_url: String,
    #[serde(skip)]
    pub data: Arc<[u8]>,
    pub assigned_filename: String,
    /// Numeric part of the relationship id; see [`ImageAsset::relationship_ref`].
    pub relationship_id: u32,
    pub width_px: u32,
    pub height_px: u32,
    pub alignment: ImageAlignment,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub caption: Option<String>,
    /// File extension without the dot (`png`, `jpg`, `gif`).
    pub extension: String,
}

impl ImageAsset {
    /// `rId<N>` as written into relationship parts.
    pub fn relationship_ref(&self) -> String {
        format!("rId{}", self.relationship_id)
    }
}

/// Output of the segmenter, before runs are composed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Segment {
    /// Inner markup of one block plus the block's resolved attributes.
    /// Empty markup marks an explicitly empty paragraph.
    Text {
        markup: String,
        block: StyleAttributes,
    },
    Figure(ImageAsset),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", rename_all = "lowercase")]
pub enum ParagraphRole {
    Body,
    Heading { level: u8 },
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Paragraph {
    pub role: ParagraphRole,
    pub attributes: StyleAttributes,
    pub runs: Vec<Run>,
}

impl Paragraph {
    /// Zero-based outline level for headings, used by navigation panes.
    pub fn outline_level(&self) -> Option<u8> {
        match self.role {
            ParagraphRole::Heading { level } => Some(level.saturating_sub(1)),
            ParagraphRole::Body => None,
        }
    }

    pub fn plain_text(&self) -> String {
        let mut out = String::new();
        for run in &self.runs {
            if run.is_line_break {
                out.push('\n');
            } else {
                out.push_str(&run.text);
            }
        }
        out
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Block {
    Paragraph(Paragraph),
    Image(ImageAsset),
    PageBreak,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct DocumentPlan {
    pub blocks: Vec<Block>,
    /// Every asset referenced from `blocks`, once, in relationship-id order.
    pub images: Vec<ImageAsset>,
}

impl DocumentPlan {
    pub fn paragraphs(&self) -> impl Iterator<Item = &Paragraph> {
        self.blocks.iter().filter_map(|b| match b {
            Block::Paragraph(p) => Some(p),
            _ => None,
        })
    }

    pub fn page_break_count(&self) -> usize {
        self.blocks
            .iter()
            .filter(|b| matches!(b, Block::PageBreak))
            .count()
    }
}
