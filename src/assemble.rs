//! Chapter ordering, headings and page breaks.

use crate::diagnostics::{DiagnosticKind, Report};
use crate::entities;
use crate::image::ImageFetcher;
use crate::markup;
use crate::model::{
    Block, ChapterRecord, DocumentPlan, ImageAsset, Paragraph, ParagraphRole, Run, Segment,
    StyleAttributes, FIRST_IMAGE_RELATIONSHIP_ID,
};
use crate::options::CompileOptions;
use crate::runs;
use crate::segment;
use crate::style::StyleResolver;
use serde::Serialize;

const CHAPTER_TITLE_HALF_POINTS: u32 = 28;
const CHAPTER_TITLE_SPACING_BEFORE: u32 = 480;
const CHAPTER_TITLE_SPACING_AFTER: u32 = 240;

/// Mutable state for one batch: counters, registered assets and diagnostics.
pub struct BuildContext<'f> {
    options: CompileOptions,
    style: StyleResolver,
    fetcher: &'f dyn ImageFetcher,
    next_relationship_id: u32,
    next_image_seq: u32,
    assets: Vec<ImageAsset>,
    report: Report,
}

impl<'f> BuildContext<'f> {
    pub fn new(options: CompileOptions, fetcher: &'f dyn ImageFetcher) -> Self {
        let style = StyleResolver::new(options.style);
        Self {
            options,
            style,
            fetcher,
            next_relationship_id: FIRST_IMAGE_RELATIONSHIP_ID,
            next_image_seq: 1,
            assets: Vec::new(),
            report: Report::new(),
        }
    }

    pub fn options(&self) -> &CompileOptions {
        &self.options
    }

    pub fn style(&self) -> &StyleResolver {
        &self.style
    }

    pub fn fetcher(&self) -> &'f dyn ImageFetcher {
        self.fetcher
    }

    pub fn next_relationship_id(&mut self) -> u32 {
        let id = self.next_relationship_id;
        self.next_relationship_id += 1;
        id
    }

    pub fn next_image_seq(&mut self) -> u32 {
        let seq = self.next_image_seq;
        self.next_image_seq += 1;
        seq
    }

    pub fn register(&mut self, asset: ImageAsset) {
        self.assets.push(asset);
    }

    pub fn assets(&self) -> &[ImageAsset] {
        &self.assets
    }

    pub fn diagnose(
        &mut self,
        kind: DiagnosticKind,
        record: &str,
        subject: impl Into<String>,
        message: impl Into<String>,
    ) {
        self.report.push(kind, record, subject, message);
    }

    pub fn report(&self) -> &Report {
        &self.report
    }

    fn into_parts(self) -> (Vec<ImageAsset>, Report) {
        (self.assets, self.report)
    }
}

/// Compiled plan plus everything that went wrong along the way.
#[derive(Debug, Clone, Serialize)]
pub struct Conversion {
    pub plan: DocumentPlan,
    pub report: Report,
}

pub struct Assembler<'f> {
    options: CompileOptions,
    fetcher: &'f dyn ImageFetcher,
}

impl<'f> Assembler<'f> {
    pub fn new(options: CompileOptions, fetcher: &'f dyn ImageFetcher) -> Self {
        Self { options, fetcher }
    }

    /// Compiles records in input order. Each chapter opens with its title
    /// heading; chapters after the first are preceded by a page break.
    pub fn assemble(&self, records: &[ChapterRecord]) -> Conversion {
        let mut ctx = BuildContext::new(self.options.clone(), self.fetcher);
        let mut blocks = Vec::new();

        for (i, record) in records.iter().enumerate() {
            if i > 0 {
                blocks.push(Block::PageBreak);
            }
            blocks.push(Block::Paragraph(chapter_heading(&record.title)));

            let before = blocks.len();
            for seg in segment::segment(&record.body, &record.id, &mut ctx) {
                blocks.push(match seg {
                    Segment::Text { markup, block } => Block::Paragraph(Paragraph {
                        role: ParagraphRole::Body,
                        attributes: block.block_level(),
                        runs: runs::compose(&markup, &block.run_level(), ctx.style()),
                    }),
                    Segment::Figure(asset) => Block::Image(asset),
                });
            }
            log::debug!(
                "chapter {} ({}): {} blocks",
                record.id,
                record.title,
                blocks.len() - before
            );
        }

        let (images, report) = ctx.into_parts();
        log::info!(
            "assembled {} chapters: {} blocks, {} images, {} diagnostics",
            records.len(),
            blocks.len(),
            images.len(),
            report.len()
        );
        Conversion {
            plan: DocumentPlan { blocks, images },
            report,
        }
    }
}

fn chapter_heading(title: &str) -> Paragraph {
    let text = runs::plain_text(&markup::esc_text(&entities::decode(title)));
    let run_attrs = StyleAttributes {
        bold: Some(true),
        font_size_half_points: Some(CHAPTER_TITLE_HALF_POINTS),
        ..Default::default()
    };
    Paragraph {
        role: ParagraphRole::Heading { level: 1 },
        attributes: StyleAttributes {
            spacing_before_twips: Some(CHAPTER_TITLE_SPACING_BEFORE),
            spacing_after_twips: Some(CHAPTER_TITLE_SPACING_AFTER),
            ..Default::default()
        },
        runs: vec![Run::text(text, run_attrs)],
    }
}
