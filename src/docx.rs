//! WordprocessingML packaging of a [`DocumentPlan`].

use crate::error::Result;
use crate::model::{Block, DocumentPlan, ImageAsset, Paragraph, Run, StyleAttributes};
use std::fs::File;
use std::io::{BufWriter, Seek, Write};
use std::path::Path;
use zip::write::SimpleFileOptions;
use zip::{CompressionMethod, ZipWriter};

const EMU_PER_PX: u64 = 9525;
const CAPTION_HALF_POINTS: u32 = 20;

/// docProps metadata.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PackageMetadata {
    pub title: String,
    pub creator: String,
}

impl Default for PackageMetadata {
    fn default() -> Self {
        Self {
            title: String::new(),
            creator: env!("CARGO_PKG_NAME").to_string(),
        }
    }
}

impl PackageMetadata {
    pub fn with_title(mut self, title: impl Into<String>) -> Self {
        self.title = title.into();
        self
    }
}

pub fn xml_escape_text(s: &str) -> String {
    let mut out = String::with_capacity(s.len());
    for ch in s.chars() {
        match ch {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            '\'' => out.push_str("&apos;"),
            // Characters XML 1.0 cannot carry.
            c if (c as u32) < 0x20 && c != '\t' && c != '\n' && c != '\r' => {}
            _ => out.push(ch),
        }
    }
    out
}

fn on_off(out: &mut String, tag: &str, v: Option<bool>) {
    match v {
        Some(true) => out.push_str(&format!("<w:{tag}/>")),
        Some(false) => out.push_str(&format!("<w:{tag} w:val=\"0\"/>")),
        None => {}
    }
}

fn run_props_xml(a: &StyleAttributes) -> String {
    let mut out = String::new();
    on_off(&mut out, "b", a.bold);
    on_off(&mut out, "i", a.italic);
    on_off(&mut out, "strike", a.strike);
    if let Some(c) = a.color {
        out.push_str(&format!("<w:color w:val=\"{}\"/>", c.to_hex()));
    }
    if let Some(sz) = a.font_size_half_points {
        out.push_str(&format!("<w:sz w:val=\"{sz}\"/><w:szCs w:val=\"{sz}\"/>"));
    }
    match a.underline {
        Some(true) => out.push_str("<w:u w:val=\"single\"/>"),
        Some(false) => out.push_str("<w:u w:val=\"none\"/>"),
        None => {}
    }
    if out.is_empty() {
        return out;
    }
    format!("<w:rPr>{out}</w:rPr>")
}

fn run_xml(run: &Run) -> String {
    let mut out = String::new();
    out.push_str("<w:r>");
    out.push_str(&run_props_xml(&run.attributes));
    if run.is_line_break {
        out.push_str("<w:br/>");
    } else {
        out.push_str("<w:t xml:space=\"preserve\">");
        out.push_str(&xml_escape_text(&run.text));
        out.push_str("</w:t>");
    }
    out.push_str("</w:r>");
    out
}

fn paragraph_props_xml(style_id: Option<&str>, outline: Option<u8>, a: &StyleAttributes) -> String {
    let mut out = String::new();
    if let Some(id) = style_id {
        out.push_str(&format!("<w:pStyle w:val=\"{id}\"/>"));
    }
    if outline.is_some() {
        out.push_str("<w:keepNext/>");
    }
    if a.spacing_before_twips.is_some() || a.spacing_after_twips.is_some() {
        out.push_str("<w:spacing");
        if let Some(v) = a.spacing_before_twips {
            out.push_str(&format!(" w:before=\"{v}\""));
        }
        if let Some(v) = a.spacing_after_twips {
            out.push_str(&format!(" w:after=\"{v}\""));
        }
        out.push_str("/>");
    }
    if a.left_indent_twips.is_some()
        || a.hanging_indent_twips.is_some()
        || a.first_line_indent_twips.is_some()
    {
        out.push_str("<w:ind");
        if let Some(v) = a.left_indent_twips {
            out.push_str(&format!(" w:left=\"{v}\""));
        }
        if let Some(v) = a.hanging_indent_twips {
            out.push_str(&format!(" w:hanging=\"{v}\""));
        } else if let Some(v) = a.first_line_indent_twips {
            out.push_str(&format!(" w:firstLine=\"{v}\""));
        }
        out.push_str("/>");
    }
    if let Some(j) = a.justification {
        out.push_str(&format!("<w:jc w:val=\"{}\"/>", j.as_word_value()));
    }
    if let Some(level) = outline {
        out.push_str(&format!("<w:outlineLvl w:val=\"{level}\"/>"));
    }
    if out.is_empty() {
        return out;
    }
    format!("<w:pPr>{out}</w:pPr>")
}

fn paragraph_xml(p: &Paragraph) -> String {
    let outline = p.outline_level();
    let style_id = match outline {
        Some(0) => Some("Heading1"),
        _ => None,
    };
    let mut out = String::new();
    out.push_str("<w:p>");
    out.push_str(&paragraph_props_xml(style_id, outline, &p.attributes));
    for r in &p.runs {
        out.push_str(&run_xml(r));
    }
    out.push_str("</w:p>");
    out
}

fn page_break_xml() -> &'static str {
    "<w:p><w:r><w:br w:type=\"page\"/></w:r></w:p>"
}

fn drawing_xml(img: &ImageAsset) -> String {
    let cx = img.width_px as u64 * EMU_PER_PX;
    let cy = img.height_px as u64 * EMU_PER_PX;
    let name = xml_escape_text(&img.assigned_filename);
    format!(
        r#"<w:drawing><wp:inline distT="0" distB="0" distL="0" distR="0"><wp:extent cx="{cx}" cy="{cy}"/><wp:effectExtent l="0" t="0" r="0" b="0"/><wp:docPr id="{id}" name="{name}"/><wp:cNvGraphicFramePr><a:graphicFrameLocks noChangeAspect="1"/></wp:cNvGraphicFramePr><a:graphic><a:graphicData uri="http://schemas.openxmlformats.org/drawingml/2006/picture"><pic:pic><pic:nvPicPr><pic:cNvPr id="0" name="{name}"/><pic:cNvPicPr/></pic:nvPicPr><pic:blipFill><a:blip r:embed="{rid}"/><a:stretch><a:fillRect/></a:stretch></pic:blipFill><pic:spPr><a:xfrm><a:off x="0" y="0"/><a:ext cx="{cx}" cy="{cy}"/></a:xfrm><a:prstGeom prst="rect"><a:avLst/></a:prstGeom></pic:spPr></pic:pic></a:graphicData></a:graphic></wp:inline></w:drawing>"#,
        id = img.relationship_id,
        rid = img.relationship_ref(),
    )
}

fn image_xml(img: &ImageAsset) -> String {
    let jc = img.alignment.as_justification().as_word_value();
    let mut out = String::new();
    out.push_str("<w:p><w:pPr>");
    out.push_str("<w:spacing w:after=\"120\"/>");
    out.push_str(&format!("<w:jc w:val=\"{jc}\"/>"));
    out.push_str("</w:pPr><w:r>");
    out.push_str(&drawing_xml(img));
    out.push_str("</w:r></w:p>");

    if let Some(caption) = img.caption.as_deref().filter(|c| !c.trim().is_empty()) {
        out.push_str("<w:p><w:pPr><w:pStyle w:val=\"Caption\"/>");
        out.push_str("<w:spacing w:after=\"240\"/>");
        out.push_str(&format!("<w:jc w:val=\"{jc}\"/>"));
        out.push_str("</w:pPr><w:r><w:rPr><w:i/>");
        out.push_str(&format!(
            "<w:sz w:val=\"{CAPTION_HALF_POINTS}\"/><w:szCs w:val=\"{CAPTION_HALF_POINTS}\"/>"
        ));
        out.push_str("</w:rPr><w:t xml:space=\"preserve\">");
        out.push_str(&xml_escape_text(caption));
        out.push_str("</w:t></w:r></w:p>");
    }
    out
}

pub fn document_xml(plan: &DocumentPlan) -> String {
    let mut body = String::new();
    for b in &plan.blocks {
        match b {
            Block::Paragraph(p) => body.push_str(&paragraph_xml(p)),
            Block::Image(img) => body.push_str(&image_xml(img)),
            Block::PageBreak => body.push_str(page_break_xml()),
        }
    }

    format!(
        r#"<?xml version="1.0" encoding="UTF-8" standalone="yes"?>
<w:document xmlns:w="http://schemas.openxmlformats.org/wordprocessingml/2006/main"
 xmlns:r="http://schemas.openxmlformats.org/officeDocument/2006/relationships"
 xmlns:wp="http://schemas.openxmlformats.org/drawingml/2006/wordprocessingDrawing"
 xmlns:a="http://schemas.openxmlformats.org/drawingml/2006/main"
 xmlns:pic="http://schemas.openxmlformats.org/drawingml/2006/picture">
  <w:body>
    {body}
    <w:sectPr>
      <w:pgSz w:w="11906" w:h="16838"/>
      <w:pgMar w:top="1440" w:right="1440" w:bottom="1440" w:left="1440" w:header="708" w:footer="708" w:gutter="0"/>
      <w:cols w:space="708"/>
      <w:docGrid w:linePitch="360"/>
    </w:sectPr>
  </w:body>
</w:document>"#,
        body = body
    )
}

fn content_types_xml() -> &'static str {
    r#"<?xml version="1.0" encoding="UTF-8" standalone="yes"?>
<Types xmlns="http://schemas.openxmlformats.org/package/2006/content-types">
  <Default Extension="rels" ContentType="application/vnd.openxmlformats-package.relationships+xml"/>
  <Default Extension="xml" ContentType="application/xml"/>
  <Default Extension="png" ContentType="image/png"/>
  <Default Extension="jpg" ContentType="image/jpeg"/>
  <Default Extension="jpeg" ContentType="image/jpeg"/>
  <Default Extension="gif" ContentType="image/gif"/>
  <Override PartName="/word/document.xml" ContentType="application/vnd.openxmlformats-officedocument.wordprocessingml.document.main+xml"/>
  <Override PartName="/word/styles.xml" ContentType="application/vnd.openxmlformats-officedocument.wordprocessingml.styles+xml"/>
  <Override PartName="/docProps/core.xml" ContentType="application/vnd.openxmlformats-package.core-properties+xml"/>
  <Override PartName="/docProps/app.xml" ContentType="application/vnd.openxmlformats-officedocument.extended-properties+xml"/>
</Types>"#
}

fn rels_xml() -> &'static str {
    r#"<?xml version="1.0" encoding="UTF-8" standalone="yes"?>
<Relationships xmlns="http://schemas.openxmlformats.org/package/2006/relationships">
  <Relationship Id="rId1" Type="http://schemas.openxmlformats.org/officeDocument/2006/relationships/officeDocument" Target="word/document.xml"/>
  <Relationship Id="rId2" Type="http://schemas.openxmlformats.org/package/2006/relationships/metadata/core-properties" Target="docProps/core.xml"/>
  <Relationship Id="rId3" Type="http://schemas.openxmlformats.org/officeDocument/2006/relationships/extended-properties" Target="docProps/app.xml"/>
</Relationships>"#
}

pub fn document_rels_xml(images: &[ImageAsset]) -> String {
    let mut out = String::new();
    out.push_str(r#"<?xml version="1.0" encoding="UTF-8" standalone="yes"?>"#);
    out.push('\n');
    out.push_str(r#"<Relationships xmlns="http://schemas.openxmlformats.org/package/2006/relationships">"#);
    out.push('\n');
    out.push_str(r#"  <Relationship Id="rId1" Type="http://schemas.openxmlformats.org/officeDocument/2006/relationships/styles" Target="styles.xml"/>"#);
    out.push('\n');
    for img in images {
        out.push_str(&format!(
            r#"  <Relationship Id="{rid}" Type="http://schemas.openxmlformats.org/officeDocument/2006/relationships/image" Target="media/{target}"/>"#,
            rid = img.relationship_ref(),
            target = xml_escape_text(&img.assigned_filename),
        ));
        out.push('\n');
    }
    out.push_str("</Relationships>");
    out
}

fn app_xml() -> String {
    format!(
        r#"<?xml version="1.0" encoding="UTF-8" standalone="yes"?>
<Properties xmlns="http://schemas.openxmlformats.org/officeDocument/2006/extended-properties" xmlns:vt="http://schemas.openxmlformats.org/officeDocument/2006/docPropsVTypes">
  <Application>{}</Application>
  <DocSecurity>0</DocSecurity>
</Properties>"#,
        xml_escape_text(concat!(env!("CARGO_PKG_NAME"), " ", env!("CARGO_PKG_VERSION")))
    )
}

fn core_xml(meta: &PackageMetadata) -> String {
    format!(
        r#"<?xml version="1.0" encoding="UTF-8" standalone="yes"?>
<cp:coreProperties xmlns:cp="http://schemas.openxmlformats.org/package/2006/metadata/core-properties" xmlns:dc="http://purl.org/dc/elements/1.1/" xmlns:dcterms="http://purl.org/dc/terms/" xmlns:xsi="http://www.w3.org/2001/XMLSchema-instance">
  <dc:title>{title}</dc:title>
  <dc:creator>{creator}</dc:creator>
</cp:coreProperties>"#,
        title = xml_escape_text(&meta.title),
        creator = xml_escape_text(&meta.creator),
    )
}

fn styles_xml() -> &'static str {
    r#"<?xml version="1.0" encoding="UTF-8" standalone="yes"?>
<w:styles xmlns:w="http://schemas.openxmlformats.org/wordprocessingml/2006/main">
  <w:docDefaults>
    <w:rPrDefault>
      <w:rPr>
        <w:rFonts w:ascii="Times New Roman" w:hAnsi="Times New Roman" w:eastAsia="TH SarabunPSK" w:cs="TH SarabunPSK"/>
        <w:sz w:val="22"/>
        <w:szCs w:val="22"/>
      </w:rPr>
    </w:rPrDefault>
    <w:pPrDefault>
      <w:pPr>
        <w:spacing w:after="120" w:line="276" w:lineRule="auto"/>
      </w:pPr>
    </w:pPrDefault>
  </w:docDefaults>
  <w:style w:type="paragraph" w:default="1" w:styleId="Normal">
    <w:name w:val="Normal"/>
    <w:qFormat/>
  </w:style>
  <w:style w:type="paragraph" w:styleId="Heading1">
    <w:name w:val="heading 1"/>
    <w:basedOn w:val="Normal"/>
    <w:next w:val="Normal"/>
    <w:uiPriority w:val="9"/>
    <w:qFormat/>
    <w:pPr>
      <w:keepNext/>
      <w:spacing w:before="480" w:after="240"/>
      <w:outlineLvl w:val="0"/>
    </w:pPr>
    <w:rPr>
      <w:b/>
      <w:sz w:val="28"/>
      <w:szCs w:val="28"/>
    </w:rPr>
  </w:style>
  <w:style w:type="paragraph" w:styleId="Caption">
    <w:name w:val="caption"/>
    <w:basedOn w:val="Normal"/>
    <w:next w:val="Normal"/>
    <w:uiPriority w:val="35"/>
    <w:qFormat/>
    <w:rPr>
      <w:i/>
      <w:sz w:val="20"/>
      <w:szCs w:val="20"/>
    </w:rPr>
  </w:style>
</w:styles>"#
}

/// Writes the package into `writer` and hands the writer back.
pub fn write_docx<W: Write + Seek>(writer: W, plan: &DocumentPlan, meta: &PackageMetadata) -> Result<W> {
    let mut zip = ZipWriter::new(writer);
    let opts = SimpleFileOptions::default();
    let stored = SimpleFileOptions::default().compression_method(CompressionMethod::Stored);

    zip.start_file("[Content_Types].xml", opts)?;
    zip.write_all(content_types_xml().as_bytes())?;

    zip.start_file("_rels/.rels", opts)?;
    zip.write_all(rels_xml().as_bytes())?;

    zip.start_file("docProps/app.xml", opts)?;
    zip.write_all(app_xml().as_bytes())?;

    zip.start_file("docProps/core.xml", opts)?;
    zip.write_all(core_xml(meta).as_bytes())?;

    zip.start_file("word/document.xml", opts)?;
    zip.write_all(document_xml(plan).as_bytes())?;

    zip.start_file("word/styles.xml", opts)?;
    zip.write_all(styles_xml().as_bytes())?;

    zip.start_file("word/_rels/document.xml.rels", opts)?;
    zip.write_all(document_rels_xml(&plan.images).as_bytes())?;

    for img in &plan.images {
        zip.start_file(format!("word/media/{}", img.assigned_filename), stored)?;
        zip.write_all(&img.data)?;
    }

    Ok(zip.finish()?)
}

pub fn write_docx_file(path: impl AsRef<Path>, plan: &DocumentPlan, meta: &PackageMetadata) -> Result<()> {
    let f = File::create(path.as_ref())?;
    let mut w = write_docx(BufWriter::new(f), plan, meta)?;
    w.flush()?;
    Ok(())
}
