//! A [`DocumentSink`] that assembles a WordprocessingML (.docx) package.
//!
//! The body XML is built incrementally as sink operations arrive; the
//! surrounding package parts (content types, relationships, styles, media)
//! are generated when the document is saved.  Package-wide state is shared
//! between a document and its table-cell sub-sinks so that hyperlinks and
//! images inside cells get unique relationship ids.

use std::cell::RefCell;
use std::collections::{BTreeSet, HashMap};
use std::fs::File;
use std::io::{Cursor, Seek, Write};
use std::path::Path;
use std::rc::Rc;

use zip::write::SimpleFileOptions;
use zip::ZipWriter;

use crate::context::ListKind;
use crate::error::{Error, Result};
use crate::sink::{BlockKind, BlockStyle, CellRange, DocumentSink, ImageData};
use crate::styles::{Alignment, RunStyle, MAX_INDENT_TWIPS};

/// Indent per list level, in twips (half an inch).
const LIST_INDENT_TWIPS: u32 = 720;
/// EMUs per CSS pixel at 96 dpi.
const EMU_PER_PX: u64 = 9525;
/// Image display size when the markup declares none.
const DEFAULT_IMAGE_PX: (u32, u32) = (320, 240);
/// Shading fills, from the reference styling.
const HEADER_FILL: &str = "D9D9D9";
const QUOTE_FILL: &str = "F0F0F0";
const PRE_FILL: &str = "F5F5F5";

const REL_STYLES: &str =
    "http://schemas.openxmlformats.org/officeDocument/2006/relationships/styles";
const REL_HYPERLINK: &str =
    "http://schemas.openxmlformats.org/officeDocument/2006/relationships/hyperlink";
const REL_IMAGE: &str = "http://schemas.openxmlformats.org/officeDocument/2006/relationships/image";

fn xml_escape(s: &str) -> String {
    let mut out = String::with_capacity(s.len());
    for ch in s.chars() {
        match ch {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            '\'' => out.push_str("&apos;"),
            _ => out.push(ch),
        }
    }
    out
}

fn to_roman(mut n: i64) -> String {
    if !(1..4000).contains(&n) {
        return n.to_string();
    }
    let map = [
        (1000, "m"),
        (900, "cm"),
        (500, "d"),
        (400, "cd"),
        (100, "c"),
        (90, "xc"),
        (50, "l"),
        (40, "xl"),
        (10, "x"),
        (9, "ix"),
        (5, "v"),
        (4, "iv"),
        (1, "i"),
    ];
    let mut out = String::new();
    for (value, numeral) in map {
        while n >= value {
            out.push_str(numeral);
            n -= value;
        }
    }
    out
}

fn to_alpha(n: i64) -> String {
    if n < 1 {
        return n.to_string();
    }
    // a..z, then aa, ab, ...
    let mut n = n - 1;
    let mut out = Vec::new();
    loop {
        out.push(b'a' + (n % 26) as u8);
        n = n / 26 - 1;
        if n < 0 {
            break;
        }
    }
    out.reverse();
    String::from_utf8(out).unwrap_or_default()
}

/// The text marker rendered in front of a list item.
fn list_marker(kind: ListKind, level: u8, index: i64) -> String {
    match kind {
        ListKind::Ordered => match level {
            0 => format!("{}.", index),
            1 => format!("{}.", to_alpha(index)),
            _ => format!("{}.", to_roman(index)),
        },
        ListKind::Unordered => {
            let bullets = ['\u{2022}', 'o', '-'];
            bullets[level as usize % bullets.len()].to_string()
        }
    }
}

fn content_type_for(extension: &str) -> Option<&'static str> {
    match extension {
        "png" => Some("image/png"),
        "jpg" | "jpeg" => Some("image/jpeg"),
        "gif" => Some("image/gif"),
        "bmp" => Some("image/bmp"),
        "tiff" | "tif" => Some("image/tiff"),
        _ => None,
    }
}

#[derive(Debug)]
struct Relationship {
    id: String,
    rel_type: &'static str,
    target: String,
    external: bool,
}

/// Package-wide state shared by the root document and its cell sub-sinks.
#[derive(Debug)]
struct Package {
    relationships: Vec<Relationship>,
    media: Vec<(String, Vec<u8>)>,
    media_extensions: BTreeSet<String>,
    next_rel: u32,
    next_drawing: u32,
}

impl Package {
    fn new() -> Package {
        Package {
            relationships: Vec::new(),
            media: Vec::new(),
            media_extensions: BTreeSet::new(),
            // rId1 is reserved for styles.xml.
            next_rel: 2,
            next_drawing: 1,
        }
    }

    fn add_hyperlink(&mut self, target: &str) -> String {
        let id = format!("rId{}", self.next_rel);
        self.next_rel += 1;
        self.relationships.push(Relationship {
            id: id.clone(),
            rel_type: REL_HYPERLINK,
            target: target.to_string(),
            external: true,
        });
        id
    }

    fn add_image(&mut self, bytes: &[u8], extension: &str) -> (String, u32) {
        let id = format!("rId{}", self.next_rel);
        self.next_rel += 1;
        let name = format!("image{}.{}", self.media.len() + 1, extension);
        self.relationships.push(Relationship {
            id: id.clone(),
            rel_type: REL_IMAGE,
            target: format!("media/{}", name),
            external: false,
        });
        self.media.push((name, bytes.to_vec()));
        self.media_extensions.insert(extension.to_string());
        let drawing = self.next_drawing;
        self.next_drawing += 1;
        (id, drawing)
    }
}

#[derive(Debug)]
struct PendingTable {
    rows: usize,
    cols: usize,
    content: HashMap<(usize, usize), (String, bool)>,
    merges: Vec<CellRange>,
}

/// A .docx document under construction.
///
/// Only the root document (from [`DocxDocument::new`]) should be saved;
/// sub-sinks share its package state and exist solely to carry cell content.
#[derive(Debug)]
pub struct DocxDocument {
    parts: Rc<RefCell<Package>>,
    body: String,
    para_open: bool,
    table: Option<PendingTable>,
}

impl Default for DocxDocument {
    fn default() -> Self {
        DocxDocument::new()
    }
}

impl DocxDocument {
    /// Create an empty document.
    pub fn new() -> DocxDocument {
        DocxDocument {
            parts: Rc::new(RefCell::new(Package::new())),
            body: String::new(),
            para_open: false,
            table: None,
        }
    }

    fn close_paragraph(&mut self) {
        if self.para_open {
            self.body.push_str("</w:p>");
            self.para_open = false;
        }
    }

    fn ensure_paragraph(&mut self) {
        if !self.para_open {
            self.open_paragraph(&BlockStyle::normal());
        }
    }

    fn open_paragraph(&mut self, style: &BlockStyle) {
        self.close_paragraph();
        self.body.push_str("<w:p>");
        self.para_open = true;

        let mut ppr = String::new();
        let mut indent_left: Option<u32> = style.indent_twips;
        let mut indent_right: Option<u32> = None;

        match style.kind {
            BlockKind::Normal => {}
            BlockKind::Heading(level) => {
                ppr.push_str(&format!(
                    r#"<w:pStyle w:val="Heading{}"/>"#,
                    level.clamp(1, 6)
                ));
            }
            BlockKind::Preformatted => {
                ppr.push_str(r#"<w:pStyle w:val="CodeBlock"/>"#);
                ppr.push_str(&format!(
                    r#"<w:shd w:val="clear" w:color="auto" w:fill="{}"/>"#,
                    PRE_FILL
                ));
            }
            BlockKind::Quote => {
                ppr.push_str(&format!(
                    r#"<w:shd w:val="clear" w:color="auto" w:fill="{}"/>"#,
                    QUOTE_FILL
                ));
                indent_left = Some(indent_left.unwrap_or(0).max(LIST_INDENT_TWIPS));
                indent_right = Some(LIST_INDENT_TWIPS);
            }
            BlockKind::ListItem { level, .. } => {
                let base = (u32::from(level) + 1) * LIST_INDENT_TWIPS;
                indent_left = Some(base.min(MAX_INDENT_TWIPS).max(indent_left.unwrap_or(0)));
            }
        }

        if indent_left.is_some() || indent_right.is_some() {
            ppr.push_str("<w:ind");
            if let Some(left) = indent_left {
                ppr.push_str(&format!(r#" w:left="{}""#, left.min(MAX_INDENT_TWIPS)));
            }
            if let Some(right) = indent_right {
                ppr.push_str(&format!(r#" w:right="{}""#, right));
            }
            ppr.push_str("/>");
        }
        if let Some(align) = style.align {
            let val = match align {
                Alignment::Left => "left",
                Alignment::Center => "center",
                Alignment::Right => "right",
                Alignment::Justify => "both",
            };
            ppr.push_str(&format!(r#"<w:jc w:val="{}"/>"#, val));
        }

        if !ppr.is_empty() {
            self.body.push_str("<w:pPr>");
            self.body.push_str(&ppr);
            self.body.push_str("</w:pPr>");
        }

        if let BlockKind::ListItem {
            kind, level, index, ..
        } = style.kind
        {
            let marker = list_marker(kind, level, index);
            self.body.push_str(&format!(
                r#"<w:r><w:t xml:space="preserve">{}</w:t><w:tab/></w:r>"#,
                xml_escape(&marker)
            ));
        }
    }

    fn run_properties(style: &RunStyle, hyperlink: bool) -> String {
        let mut rpr = String::new();
        if style.monospace {
            rpr.push_str(r#"<w:rFonts w:ascii="Consolas" w:hAnsi="Consolas" w:cs="Consolas"/>"#);
        }
        if style.bold {
            rpr.push_str("<w:b/>");
        }
        if style.italic {
            rpr.push_str("<w:i/>");
        }
        if style.strike {
            rpr.push_str("<w:strike/>");
        }
        match (style.color, hyperlink) {
            (Some(c), _) => rpr.push_str(&format!(r#"<w:color w:val="{}"/>"#, c.hex())),
            (None, true) => rpr.push_str(r#"<w:color w:val="0000EE"/>"#),
            (None, false) => {}
        }
        if style.underline || hyperlink {
            rpr.push_str(r#"<w:u w:val="single"/>"#);
        }
        if let Some(c) = style.background {
            rpr.push_str(&format!(
                r#"<w:shd w:val="clear" w:color="auto" w:fill="{}"/>"#,
                c.hex()
            ));
        }
        if style.superscript {
            rpr.push_str(r#"<w:vertAlign w:val="superscript"/>"#);
        } else if style.subscript {
            rpr.push_str(r#"<w:vertAlign w:val="subscript"/>"#);
        }
        if rpr.is_empty() {
            String::new()
        } else {
            format!("<w:rPr>{}</w:rPr>", rpr)
        }
    }

    fn push_run(&mut self, text: &str, style: &RunStyle, hyperlink: bool) {
        self.body.push_str("<w:r>");
        self.body.push_str(&Self::run_properties(style, hyperlink));
        self.body.push_str(&format!(
            r#"<w:t xml:space="preserve">{}</w:t>"#,
            xml_escape(text)
        ));
        self.body.push_str("</w:r>");
    }

    /// The finished body XML of this sink (used for cells and for saving).
    fn into_body(mut self) -> String {
        self.close_paragraph();
        self.body
    }

    /// Append a cell body.  Word rejects packages where a cell does not end
    /// with a paragraph, so a body ending in a nested table gets one added.
    fn push_cell_body(xml: &mut String, body: &str) {
        xml.push_str(body);
        if body.ends_with("</w:tbl>") {
            xml.push_str("<w:p/>");
        }
    }

    fn document_xml(&mut self) -> String {
        self.close_paragraph();
        format!(
            r#"<?xml version="1.0" encoding="UTF-8" standalone="yes"?>
<w:document xmlns:mc="http://schemas.openxmlformats.org/markup-compatibility/2006"
 xmlns:r="http://schemas.openxmlformats.org/officeDocument/2006/relationships"
 xmlns:wp="http://schemas.openxmlformats.org/drawingml/2006/wordprocessingDrawing"
 xmlns:w="http://schemas.openxmlformats.org/wordprocessingml/2006/main"
 xmlns:w14="http://schemas.microsoft.com/office/word/2010/wordprocessingml"
 mc:Ignorable="w14">
<w:body>{}<w:sectPr>
<w:pgSz w:w="12240" w:h="15840"/>
<w:pgMar w:top="1440" w:right="1440" w:bottom="1440" w:left="1440" w:header="708" w:footer="708" w:gutter="0"/>
<w:cols w:space="708"/>
</w:sectPr>
</w:body>
</w:document>"#,
            self.body
        )
    }

    fn content_types_xml(&self) -> String {
        let parts = self.parts.borrow();
        let mut defaults = String::new();
        for ext in &parts.media_extensions {
            if let Some(ct) = content_type_for(ext) {
                defaults.push_str(&format!(
                    r#"<Default Extension="{}" ContentType="{}"/>"#,
                    ext, ct
                ));
            }
        }
        format!(
            r#"<?xml version="1.0" encoding="UTF-8" standalone="yes"?>
<Types xmlns="http://schemas.openxmlformats.org/package/2006/content-types">
<Default Extension="rels" ContentType="application/vnd.openxmlformats-package.relationships+xml"/>
<Default Extension="xml" ContentType="application/xml"/>
{}<Override PartName="/word/document.xml" ContentType="application/vnd.openxmlformats-officedocument.wordprocessingml.document.main+xml"/>
<Override PartName="/word/styles.xml" ContentType="application/vnd.openxmlformats-officedocument.wordprocessingml.styles+xml"/>
</Types>"#,
            defaults
        )
    }

    fn document_rels_xml(&self) -> String {
        let parts = self.parts.borrow();
        let mut rels = format!(
            r#"<Relationship Id="rId1" Type="{}" Target="styles.xml"/>"#,
            REL_STYLES
        );
        for rel in &parts.relationships {
            let mode = if rel.external {
                r#" TargetMode="External""#
            } else {
                ""
            };
            rels.push_str(&format!(
                r#"<Relationship Id="{}" Type="{}" Target="{}"{}/>"#,
                rel.id,
                rel.rel_type,
                xml_escape(&rel.target),
                mode
            ));
        }
        format!(
            r#"<?xml version="1.0" encoding="UTF-8" standalone="yes"?>
<Relationships xmlns="http://schemas.openxmlformats.org/package/2006/relationships">{}</Relationships>"#,
            rels
        )
    }

    fn package_rels_xml() -> &'static str {
        r#"<?xml version="1.0" encoding="UTF-8" standalone="yes"?>
<Relationships xmlns="http://schemas.openxmlformats.org/package/2006/relationships">
<Relationship Id="rId1" Type="http://schemas.openxmlformats.org/officeDocument/2006/relationships/officeDocument" Target="word/document.xml"/>
</Relationships>"#
    }

    fn styles_xml() -> String {
        let mut styles = String::from(
            r#"<?xml version="1.0" encoding="UTF-8" standalone="yes"?>
<w:styles xmlns:w="http://schemas.openxmlformats.org/wordprocessingml/2006/main">
<w:style w:type="paragraph" w:default="1" w:styleId="Normal">
<w:name w:val="Normal"/>
<w:qFormat/>
</w:style>
"#,
        );
        for level in 1u8..=6 {
            let size = 34 - 2 * u16::from(level);
            styles.push_str(&format!(
                r#"<w:style w:type="paragraph" w:styleId="Heading{level}">
<w:name w:val="heading {level}"/>
<w:basedOn w:val="Normal"/>
<w:next w:val="Normal"/>
<w:qFormat/>
<w:pPr><w:keepNext/><w:keepLines/><w:spacing w:before="240" w:after="120"/></w:pPr>
<w:rPr><w:b/><w:sz w:val="{size}"/></w:rPr>
</w:style>
"#
            ));
        }
        styles.push_str(
            r#"<w:style w:type="paragraph" w:styleId="CodeBlock">
<w:name w:val="Code Block"/>
<w:basedOn w:val="Normal"/>
<w:qFormat/>
<w:pPr><w:spacing w:before="120" w:after="120"/></w:pPr>
<w:rPr><w:rFonts w:ascii="Consolas" w:hAnsi="Consolas" w:cs="Consolas"/><w:sz w:val="20"/></w:rPr>
</w:style>
</w:styles>"#,
        );
        styles
    }

    /// Write the finished package to `out`.
    pub fn write_to<W: Write + Seek>(&mut self, out: W) -> Result<()> {
        let document = self.document_xml();
        let mut zip = ZipWriter::new(out);
        let opt = SimpleFileOptions::default().compression_method(zip::CompressionMethod::Deflated);

        zip.start_file("[Content_Types].xml", opt)?;
        zip.write_all(self.content_types_xml().as_bytes())?;

        zip.start_file("_rels/.rels", opt)?;
        zip.write_all(Self::package_rels_xml().as_bytes())?;

        zip.start_file("word/document.xml", opt)?;
        zip.write_all(document.as_bytes())?;

        zip.start_file("word/_rels/document.xml.rels", opt)?;
        zip.write_all(self.document_rels_xml().as_bytes())?;

        zip.start_file("word/styles.xml", opt)?;
        zip.write_all(Self::styles_xml().as_bytes())?;

        for (name, bytes) in &self.parts.borrow().media {
            zip.start_file(format!("word/media/{}", name), opt)?;
            zip.write_all(bytes)?;
        }

        zip.finish()?;
        Ok(())
    }

    /// The package as bytes (for callers that do not want to touch disk).
    pub fn to_bytes(&mut self) -> Result<Vec<u8>> {
        let mut cursor = Cursor::new(Vec::new());
        self.write_to(&mut cursor)?;
        Ok(cursor.into_inner())
    }

    /// Save the package to `path`.
    pub fn save(&mut self, path: impl AsRef<Path>) -> Result<()> {
        let file = File::create(path)?;
        self.write_to(file)
    }
}

impl DocumentSink for DocxDocument {
    fn sub_sink(&self) -> Self {
        DocxDocument {
            parts: Rc::clone(&self.parts),
            body: String::new(),
            para_open: false,
            table: None,
        }
    }

    fn paragraph(&mut self, style: &BlockStyle) -> Result<()> {
        self.open_paragraph(style);
        Ok(())
    }

    fn run(&mut self, text: &str, style: &RunStyle) -> Result<()> {
        self.ensure_paragraph();
        self.push_run(text, style, false);
        Ok(())
    }

    fn hyperlink(&mut self, target: &str, text: &str, style: &RunStyle) -> Result<()> {
        self.ensure_paragraph();
        let id = self.parts.borrow_mut().add_hyperlink(target);
        self.body
            .push_str(&format!(r#"<w:hyperlink r:id="{}">"#, id));
        self.push_run(text, style, true);
        self.body.push_str("</w:hyperlink>");
        Ok(())
    }

    fn hard_break(&mut self) -> Result<()> {
        self.ensure_paragraph();
        self.body.push_str("<w:r><w:br/></w:r>");
        Ok(())
    }

    fn horizontal_rule(&mut self) -> Result<()> {
        self.close_paragraph();
        self.body.push_str(
            r#"<w:p><w:pPr><w:pBdr><w:bottom w:val="single" w:sz="6" w:space="1" w:color="auto"/></w:pBdr></w:pPr></w:p>"#,
        );
        Ok(())
    }

    fn page_break(&mut self) -> Result<()> {
        self.close_paragraph();
        self.body
            .push_str(r#"<w:p><w:r><w:br w:type="page"/></w:r></w:p>"#);
        Ok(())
    }

    fn picture(&mut self, image: &ImageData) -> Result<()> {
        if image.bytes.is_empty() {
            return Err(Error::Sink("image has no data".into()));
        }
        if content_type_for(&image.extension).is_none() {
            return Err(Error::Sink(format!(
                "unsupported image type: {}",
                image.extension
            )));
        }
        self.ensure_paragraph();
        let (rel, drawing) = self
            .parts
            .borrow_mut()
            .add_image(&image.bytes, &image.extension);
        let cx = u64::from(image.width_px.unwrap_or(DEFAULT_IMAGE_PX.0)) * EMU_PER_PX;
        let cy = u64::from(image.height_px.unwrap_or(DEFAULT_IMAGE_PX.1)) * EMU_PER_PX;
        self.body.push_str(&format!(
            concat!(
                r#"<w:r><w:drawing><wp:inline distT="0" distB="0" distL="0" distR="0">"#,
                r#"<wp:extent cx="{cx}" cy="{cy}"/>"#,
                r#"<wp:docPr id="{id}" name="Picture {id}" descr="{alt}"/>"#,
                r#"<a:graphic xmlns:a="http://schemas.openxmlformats.org/drawingml/2006/main">"#,
                r#"<a:graphicData uri="http://schemas.openxmlformats.org/drawingml/2006/picture">"#,
                r#"<pic:pic xmlns:pic="http://schemas.openxmlformats.org/drawingml/2006/picture">"#,
                r#"<pic:nvPicPr><pic:cNvPr id="{id}" name="Picture {id}"/><pic:cNvPicPr/></pic:nvPicPr>"#,
                r#"<pic:blipFill><a:blip r:embed="{rel}"/><a:stretch><a:fillRect/></a:stretch></pic:blipFill>"#,
                r#"<pic:spPr><a:xfrm><a:off x="0" y="0"/><a:ext cx="{cx}" cy="{cy}"/></a:xfrm>"#,
                r#"<a:prstGeom prst="rect"><a:avLst/></a:prstGeom></pic:spPr>"#,
                r#"</pic:pic></a:graphicData></a:graphic></wp:inline></w:drawing></w:r>"#,
            ),
            cx = cx,
            cy = cy,
            id = drawing,
            alt = xml_escape(&image.alt),
            rel = rel,
        ));
        Ok(())
    }

    fn begin_table(&mut self, rows: usize, cols: usize) -> Result<()> {
        if self.table.is_some() {
            return Err(Error::Sink("table already in progress".into()));
        }
        if rows == 0 || cols == 0 {
            return Err(Error::Sink("table must have at least one cell".into()));
        }
        self.close_paragraph();
        self.table = Some(PendingTable {
            rows,
            cols,
            content: HashMap::new(),
            merges: Vec::new(),
        });
        Ok(())
    }

    fn merge_cells(&mut self, range: &CellRange) -> Result<()> {
        let table = self
            .table
            .as_mut()
            .ok_or_else(|| Error::Sink("merge_cells outside a table".into()))?;
        if range.last_row >= table.rows
            || range.last_col >= table.cols
            || range.first_row > range.last_row
            || range.first_col > range.last_col
        {
            return Err(Error::Sink(format!(
                "merge range ({},{})-({},{}) outside {}x{} table",
                range.first_row,
                range.first_col,
                range.last_row,
                range.last_col,
                table.rows,
                table.cols
            )));
        }
        table.merges.push(*range);
        Ok(())
    }

    fn cell_content(&mut self, row: usize, col: usize, content: Self, header: bool) -> Result<()> {
        let body = content.into_body();
        let table = self
            .table
            .as_mut()
            .ok_or_else(|| Error::Sink("cell_content outside a table".into()))?;
        if row >= table.rows || col >= table.cols {
            return Err(Error::Sink(format!(
                "cell ({},{}) outside {}x{} table",
                row, col, table.rows, table.cols
            )));
        }
        table.content.insert((row, col), (body, header));
        Ok(())
    }

    fn end_table(&mut self) -> Result<()> {
        let table = self
            .table
            .take()
            .ok_or_else(|| Error::Sink("end_table without begin_table".into()))?;

        // Map every grid position covered by a merge to its region.
        #[derive(Clone, Copy)]
        struct Region {
            row: usize,
            col: usize,
            row_span: usize,
            col_span: usize,
        }
        let mut regions: HashMap<(usize, usize), Region> = HashMap::new();
        for merge in &table.merges {
            let region = Region {
                row: merge.first_row,
                col: merge.first_col,
                row_span: merge.last_row - merge.first_row + 1,
                col_span: merge.last_col - merge.first_col + 1,
            };
            for r in merge.first_row..=merge.last_row {
                for c in merge.first_col..=merge.last_col {
                    regions.insert((r, c), region);
                }
            }
        }

        let col_width = 9360 / table.cols as u32;
        let mut xml = String::from(
            r#"<w:tbl><w:tblPr><w:tblStyle w:val="TableGrid"/><w:tblW w:w="0" w:type="auto"/></w:tblPr><w:tblGrid>"#,
        );
        for _ in 0..table.cols {
            xml.push_str(&format!(r#"<w:gridCol w:w="{}"/>"#, col_width));
        }
        xml.push_str("</w:tblGrid>");

        for r in 0..table.rows {
            xml.push_str("<w:tr>");
            let mut c = 0;
            while c < table.cols {
                if let Some(region) = regions.get(&(r, c)).copied() {
                    if c != region.col {
                        // Interior of a column span; consumed by gridSpan.
                        c += 1;
                        continue;
                    }
                    let origin = r == region.row;
                    let (body, header) = table
                        .content
                        .get(&(region.row, region.col))
                        .cloned()
                        .unwrap_or_else(|| (String::new(), false));
                    xml.push_str("<w:tc><w:tcPr>");
                    if region.col_span > 1 {
                        xml.push_str(&format!(r#"<w:gridSpan w:val="{}"/>"#, region.col_span));
                    }
                    if region.row_span > 1 {
                        if origin {
                            xml.push_str(r#"<w:vMerge w:val="restart"/>"#);
                        } else {
                            xml.push_str("<w:vMerge/>");
                        }
                    }
                    if header {
                        xml.push_str(&format!(
                            r#"<w:shd w:val="clear" w:color="auto" w:fill="{}"/>"#,
                            HEADER_FILL
                        ));
                    }
                    xml.push_str("</w:tcPr>");
                    if origin && !body.is_empty() {
                        Self::push_cell_body(&mut xml, &body);
                    } else {
                        xml.push_str("<w:p/>");
                    }
                    xml.push_str("</w:tc>");
                    c += region.col_span;
                } else {
                    let (body, header) = table
                        .content
                        .get(&(r, c))
                        .cloned()
                        .unwrap_or_else(|| (String::new(), false));
                    xml.push_str("<w:tc><w:tcPr>");
                    if header {
                        xml.push_str(&format!(
                            r#"<w:shd w:val="clear" w:color="auto" w:fill="{}"/>"#,
                            HEADER_FILL
                        ));
                    }
                    xml.push_str("</w:tcPr>");
                    if body.is_empty() {
                        xml.push_str("<w:p/>");
                    } else {
                        Self::push_cell_body(&mut xml, &body);
                    }
                    xml.push_str("</w:tc>");
                    c += 1;
                }
            }
            xml.push_str("</w:tr>");
        }
        xml.push_str("</w:tbl>");

        self.body.push_str(&xml);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn roman_numerals() {
        assert_eq!(to_roman(1), "i");
        assert_eq!(to_roman(4), "iv");
        assert_eq!(to_roman(1987), "mcmlxxxvii");
        assert_eq!(to_roman(0), "0");
    }

    #[test]
    fn alpha_markers() {
        assert_eq!(to_alpha(1), "a");
        assert_eq!(to_alpha(26), "z");
        assert_eq!(to_alpha(27), "aa");
    }

    #[test]
    fn markers_by_level() {
        assert_eq!(list_marker(ListKind::Ordered, 0, 3), "3.");
        assert_eq!(list_marker(ListKind::Ordered, 1, 2), "b.");
        assert_eq!(list_marker(ListKind::Ordered, 2, 4), "iv.");
        assert_eq!(list_marker(ListKind::Unordered, 0, 1), "\u{2022}");
        assert_eq!(list_marker(ListKind::Unordered, 1, 1), "o");
        assert_eq!(list_marker(ListKind::Unordered, 3, 1), "\u{2022}");
    }

    #[test]
    fn escaping() {
        assert_eq!(xml_escape("a<b>&\"'"), "a&lt;b&gt;&amp;&quot;&apos;");
    }
}
