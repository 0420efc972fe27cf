//! End-to-end tests: CSV rows through the plan into a DOCX package.

use chapters_docx::{
    read_chapters, read_chapters_from, write_docx, Assembler, Block, ChapterRecord,
    CompileOptions, DiagnosticKind, FetchOptions, FetchedImage, HttpFetcher, ImageAlignment,
    ImageError, ImageFetcher, PackageMetadata, ParagraphRole,
};
use image::{DynamicImage, ImageFormat, RgbImage};
use std::collections::HashMap;
use std::io::{Cursor, Read, Write};
use std::net::TcpListener;
use std::time::{Duration, Instant};
use zip::ZipArchive;

/// Serves canned responses; anything unknown is a 404.
#[derive(Default)]
struct StubFetcher {
    responses: HashMap<String, FetchedImage>,
}

impl StubFetcher {
    fn with_png(mut self, url: &str, width: u32, height: u32) -> Self {
        self.responses.insert(
            url.to_string(),
            FetchedImage {
                bytes: png(width, height),
                content_type: Some("image/png".to_string()),
            },
        );
        self
    }

    fn with_response(mut self, url: &str, bytes: &[u8], content_type: &str) -> Self {
        self.responses.insert(
            url.to_string(),
            FetchedImage {
                bytes: bytes.to_vec(),
                content_type: Some(content_type.to_string()),
            },
        );
        self
    }
}

impl ImageFetcher for StubFetcher {
    fn fetch(&self, url: &str) -> Result<FetchedImage, ImageError> {
        self.responses
            .get(url)
            .cloned()
            .ok_or(ImageError::Status(404))
    }
}

fn png(width: u32, height: u32) -> Vec<u8> {
    let img = DynamicImage::ImageRgb8(RgbImage::new(width, height));
    let mut out = Cursor::new(Vec::new());
    img.write_to(&mut out, ImageFormat::Png).unwrap();
    out.into_inner()
}

fn compile(records: &[ChapterRecord], fetcher: &StubFetcher) -> chapters_docx::Conversion {
    Assembler::new(CompileOptions::default(), fetcher).assemble(records)
}

fn read_part(archive: &mut ZipArchive<Cursor<Vec<u8>>>, name: &str) -> String {
    let mut s = String::new();
    archive
        .by_name(name)
        .unwrap_or_else(|_| panic!("missing part {name}"))
        .read_to_string(&mut s)
        .unwrap();
    s
}

#[test]
fn test_two_chapters_one_page_break() {
    let records = vec![
        ChapterRecord::new("1", "One", "<p>first</p>"),
        ChapterRecord::new("2", "Two", "<p>second</p>"),
    ];
    let conv = compile(&records, &StubFetcher::default());

    assert_eq!(conv.plan.page_break_count(), 1);
    assert!(matches!(conv.plan.blocks[0], Block::Paragraph(_)));
    let headings: Vec<String> = conv
        .plan
        .paragraphs()
        .filter(|p| p.role == ParagraphRole::Heading { level: 1 })
        .map(|p| p.plain_text())
        .collect();
    assert_eq!(headings, vec!["One", "Two"]);
    assert!(conv.report.is_empty());
}

#[test]
fn test_single_chapter_has_no_page_break() {
    let records = vec![ChapterRecord::new("1", "Only", "<p>x</p>")];
    let conv = compile(&records, &StubFetcher::default());
    assert_eq!(conv.plan.page_break_count(), 0);
}

#[test]
fn test_missing_image_keeps_text() {
    let body = r#"<p>before</p><figure class="image"><img src="http://img.test/missing.png"><figcaption>Gone</figcaption></figure><p>after</p>"#;
    let records = vec![ChapterRecord::new("9", "Chapter", body)];
    let conv = compile(&records, &StubFetcher::default());

    assert!(conv.plan.images.is_empty());
    assert!(!conv.plan.blocks.iter().any(|b| matches!(b, Block::Image(_))));
    let texts: Vec<String> = conv.plan.paragraphs().map(|p| p.plain_text()).collect();
    assert_eq!(texts, vec!["Chapter", "before", "after"]);
    assert_eq!(conv.report.count(DiagnosticKind::ImageFetchFailed), 1);
    let diag = conv.report.iter().next().unwrap();
    assert_eq!(diag.record, "9");
}

#[test]
fn test_stalled_image_server_times_out() {
    // Accepts connections through the backlog but never answers.
    let listener = TcpListener::bind("127.0.0.1:0").unwrap();
    let port = listener.local_addr().unwrap().port();
    let body = format!(
        r#"<p>before</p><figure><img src="http://127.0.0.1:{port}/x.png"></figure><p>after</p>"#
    );
    let records = vec![ChapterRecord::new("3", "Slow", &body)];

    let options = CompileOptions::default()
        .with_fetch(FetchOptions::default().with_timeout(Some(Duration::from_millis(200))));
    let fetcher = HttpFetcher::new(&options.fetch).unwrap();
    let started = Instant::now();
    let conv = Assembler::new(options, &fetcher).assemble(&records);

    assert!(started.elapsed() < Duration::from_secs(10));
    assert!(conv.plan.images.is_empty());
    let texts: Vec<String> = conv.plan.paragraphs().map(|p| p.plain_text()).collect();
    assert_eq!(texts, vec!["Slow", "before", "after"]);
    assert_eq!(conv.report.count(DiagnosticKind::ImageFetchFailed), 1);
    drop(listener);
}

#[test]
fn test_empty_paragraphs_keep_one_empty_run() {
    for body in ["<p></p>", "<p>&nbsp;</p>"] {
        let records = vec![ChapterRecord::new("1", "T", body)];
        let conv = compile(&records, &StubFetcher::default());
        let body_paras: Vec<_> = conv
            .plan
            .paragraphs()
            .filter(|p| p.role == ParagraphRole::Body)
            .collect();
        assert_eq!(body_paras.len(), 1, "body {body}");
        assert_eq!(body_paras[0].runs.len(), 1, "body {body}");
        assert_eq!(body_paras[0].runs[0].text, "", "body {body}");
        assert!(!body_paras[0].runs[0].is_line_break);
    }
}

#[test]
fn test_images_get_sequential_relationship_ids() {
    let body = r#"<figure class="image" style="width:50%"><img src="http://img.test/a.png"></figure>
<p><img src="http://img.test/missing.png"></p>
<figure class="image image-style-align-right"><img src="http://img.test/b.png"><figcaption>B</figcaption></figure>"#;
    let fetcher = StubFetcher::default()
        .with_png("http://img.test/a.png", 800, 600)
        .with_png("http://img.test/b.png", 200, 100);
    let conv = compile(&[ChapterRecord::new("1", "T", body)], &fetcher);

    let ids: Vec<u32> = conv.plan.images.iter().map(|a| a.relationship_id).collect();
    assert_eq!(ids, vec![2, 3]);
    let a = &conv.plan.images[0];
    assert_eq!((a.width_px, a.height_px), (300, 225));
    assert!(a.assigned_filename.starts_with("image1_"));
    let b = &conv.plan.images[1];
    assert_eq!((b.width_px, b.height_px), (200, 100));
    assert_eq!(b.alignment, ImageAlignment::Right);
    assert_eq!(b.caption.as_deref(), Some("B"));
    assert!(b.assigned_filename.starts_with("image2_"));
    assert_eq!(conv.report.count(DiagnosticKind::ImageFetchFailed), 1);
}

#[test]
fn test_non_image_response_is_skipped() {
    let body = r#"<figure><img src="http://img.test/page"></figure><p>text</p>"#;
    let fetcher =
        StubFetcher::default().with_response("http://img.test/page", b"<html></html>", "text/html");
    let conv = compile(&[ChapterRecord::new("1", "T", body)], &fetcher);
    assert!(conv.plan.images.is_empty());
    assert_eq!(conv.report.count(DiagnosticKind::ImageFetchFailed), 1);
}

#[test]
fn test_docx_package_layout() {
    let body = r#"<p class="text-center"><strong>Bold</strong> &amp; plain</p>
<figure class="image"><img src="http://img.test/a.png"></figure>"#;
    let fetcher = StubFetcher::default().with_png("http://img.test/a.png", 120, 80);
    let records = vec![
        ChapterRecord::new("1", "Intro", body),
        ChapterRecord::new("2", "Next", "<p>line<br>two</p>"),
    ];
    let conv = compile(&records, &fetcher);
    let asset_name = conv.plan.images[0].assigned_filename.clone();

    let meta = PackageMetadata::default().with_title("Book");
    let bytes = write_docx(Cursor::new(Vec::new()), &conv.plan, &meta)
        .unwrap()
        .into_inner();
    let mut archive = ZipArchive::new(Cursor::new(bytes)).unwrap();

    for name in [
        "[Content_Types].xml",
        "_rels/.rels",
        "docProps/app.xml",
        "docProps/core.xml",
        "word/document.xml",
        "word/styles.xml",
        "word/_rels/document.xml.rels",
    ] {
        assert!(archive.by_name(name).is_ok(), "missing {name}");
    }

    let mut media = Vec::new();
    archive
        .by_name(&format!("word/media/{asset_name}"))
        .unwrap()
        .read_to_end(&mut media)
        .unwrap();
    assert_eq!(media, png(120, 80));

    let rels = read_part(&mut archive, "word/_rels/document.xml.rels");
    assert!(rels.contains(r#"Id="rId2""#));
    assert!(rels.contains(&format!("media/{asset_name}")));

    let doc = read_part(&mut archive, "word/document.xml");
    assert!(doc.contains(r#"<w:pStyle w:val="Heading1"/>"#));
    assert!(doc.contains(r#"<w:br w:type="page"/>"#));
    assert!(doc.contains(r#"<w:jc w:val="center"/>"#));
    assert!(doc.contains("Bold"));
    assert!(doc.contains("&amp; plain"));
    assert!(doc.contains(r#"r:embed="rId2""#));
    // 120px * 9525 EMU.
    assert!(doc.contains(r#"cx="1143000""#));
    assert_eq!(doc.matches(r#"<w:br w:type="page"/>"#).count(), 1);

    let core = read_part(&mut archive, "docProps/core.xml");
    assert!(core.contains("<dc:title>Book</dc:title>"));
}

#[test]
fn test_csv_file_to_docx() {
    let dir = tempfile::tempdir().unwrap();
    let input = dir.path().join("chapters.csv");
    let mut f = std::fs::File::create(&input).unwrap();
    writeln!(f, "id,title,body").unwrap();
    writeln!(f, r#"1,"Tom &amp; Jerry","<p style=""color: red"">red, text</p>""#).unwrap();
    writeln!(f, "2,Broken").unwrap();
    writeln!(f, r#"3,Third,"<ul><li>a</li><li>b</li></ul>""#).unwrap();
    drop(f);

    let ingested = read_chapters(&input).unwrap();
    assert_eq!(ingested.records.len(), 2);
    assert_eq!(
        ingested.diagnostics.count(DiagnosticKind::InputRecordMalformed),
        1
    );

    let conv = compile(&ingested.records, &StubFetcher::default());
    let texts: Vec<String> = conv.plan.paragraphs().map(|p| p.plain_text()).collect();
    assert_eq!(texts, vec!["Tom & Jerry", "red, text", "Third", "• a", "• b"]);

    let red = conv
        .plan
        .paragraphs()
        .find(|p| p.plain_text() == "red, text")
        .unwrap();
    assert_eq!(red.runs[0].attributes.color.map(|c| c.to_hex()).as_deref(), Some("FF0000"));

    let out = dir.path().join("chapters.docx");
    chapters_docx::write_docx_file(&out, &conv.plan, &PackageMetadata::default()).unwrap();
    let archive = ZipArchive::new(std::fs::File::open(&out).unwrap()).unwrap();
    assert!(archive.len() >= 7);
}

#[test]
fn test_header_only_csv_is_rejected() {
    assert!(read_chapters_from("id,title,body\n".as_bytes()).is_err());
}
