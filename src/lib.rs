//! A library for converting HTML documents into word-processing documents.
//!
//! Conversion runs in two phases.  [`parse`] reads the HTML into a
//! normalised block/inline tree ([`DocNode`]), resolving parser quirks,
//! inline formatting context and table structure up front.  The tree is
//! then replayed into a [`DocumentSink`], which receives a flat sequence of
//! paragraph, run, image and table operations.  The crate ships two sinks:
//! [`DocxDocument`] builds a `.docx` package, and [`RecordingSink`] records
//! the operation stream for inspection.
//!
//! Problems found along the way (missing images, malformed table spans,
//! elements a sink rejects) do not abort the conversion; they are recorded
//! in a [`Report`] and the offending element is skipped.
//!
//! # Examples
//!
//! ```rust
//! let mut document = html2docx::DocxDocument::new();
//! let report = html2docx::add_html_to_document(
//!     "<h1>Title</h1><p>Hello <b>world</b>!</p>",
//!     &mut document,
//! )
//! .unwrap();
//! assert!(report.is_clean());
//! let bytes = document.to_bytes().unwrap();
//! assert!(!bytes.is_empty());
//! ```

use std::io;
use std::path::Path;

use html5ever::driver::ParseOpts;
use html5ever::parse_document;
use html5ever::tree_builder::TreeBuilderOpts;
use html5ever::Attribute;
use markup5ever_rcdom::{Handle, NodeData, RcDom};
use tendril::TendrilSink;

mod context;
mod error;
pub mod sink;
mod styles;
mod table;

#[cfg(test)]
mod tests;

pub use context::{
    ContextStack, FormattingState, ListContext, ListKind, ListRegistry, NumberingId,
    MAX_LIST_LEVEL,
};
pub use error::{Diagnostic, Error, Report, Result, Severity};
pub use sink::docx::DocxDocument;
pub use sink::recording::RecordingSink;
pub use sink::{BlockKind, BlockStyle, CellRange, DocumentSink, ImageData};
pub use styles::{Alignment, BlockAttrs, Rgb, RunDelta, RunStyle};
pub use table::{DocCell, DocRow, DocTable, GridCell, TableGrid};

/// Deepest DOM nesting the distiller will follow.  Content below this depth
/// is dropped with a warning rather than recursing further.
pub const MAX_DEPTH: usize = 256;

/// An image reference as written in the markup, before any bytes are read.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ImageRef {
    pub src: String,
    pub alt: String,
    /// Declared display width in CSS pixels, if any.
    pub width_px: Option<u32>,
    pub height_px: Option<u32>,
}

/// A node of the distilled document tree.
///
/// This is the fixed vocabulary the emitter understands; every HTML element
/// is mapped onto it (or dropped) during distillation, so unknown tags can
/// never reach the output phase.
#[derive(Debug)]
pub enum DocNode {
    /// Text content, whitespace not yet collapsed.
    Text(String),
    /// Children with no formatting of their own; also the mapping for
    /// unrecognised container tags.
    Container(Vec<DocNode>),
    /// Children under an inline formatting change.
    Styled(RunDelta, Vec<DocNode>),
    /// Children under a hyperlink target.
    Link(String, Vec<DocNode>),
    /// An inline image reference.
    Image(ImageRef),
    /// A `<p>` paragraph with its resolved style attributes.
    Paragraph(BlockAttrs, Vec<DocNode>),
    /// A heading at level 1 through 6.
    Heading(u8, BlockAttrs, Vec<DocNode>),
    /// A block grouping which closes any open paragraph around it.
    Div(Vec<DocNode>),
    /// A `<pre>` block: whitespace preserved, monospace runs.
    Pre(Vec<DocNode>),
    /// A `<blockquote>` subtree.
    Quote(Vec<DocNode>),
    /// An unordered list of [`DocNode::ListItem`]s and nested lists.
    Ul(Vec<DocNode>),
    /// An ordered list with its starting index.
    Ol(i64, Vec<DocNode>),
    /// One list item's content.
    ListItem(Vec<DocNode>),
    /// A `<br>` hard line break.
    Break,
    /// A `<hr>` horizontal rule.
    Rule,
    /// A complete table, rows and cells already collected.
    Table(DocTable),
    /// Rows from one `<thead>`/`<tbody>`/`<tfoot>` group; only meaningful
    /// while a `<table>` subtree is being reduced.
    TableRows(Vec<DocRow>),
    /// One `<tr>`; only meaningful while a `<table>` subtree is being
    /// reduced.
    TableRow(DocRow),
    /// One `<td>`/`<th>`; only meaningful while a `<tr>` is being reduced.
    TableCell(DocCell),
}

/// Supplies the bytes behind an image reference.
///
/// The engine never fetches anything itself; whether `src` values are read
/// from disk, a cache or the network is the loader's business.  A loader
/// error skips the image with a warning and the conversion carries on.
pub trait ImageLoader {
    fn load(&self, src: &str) -> io::Result<Vec<u8>>;
}

/// The default loader: reads local paths, refuses remote references.
pub struct LocalImageLoader;

impl ImageLoader for LocalImageLoader {
    fn load(&self, src: &str) -> io::Result<Vec<u8>> {
        if is_remote(src) {
            return Err(io::Error::new(
                io::ErrorKind::Unsupported,
                "remote image fetching is not enabled",
            ));
        }
        std::fs::read(src)
    }
}

fn is_remote(src: &str) -> bool {
    src.starts_with("http://") || src.starts_with("https://") || src.starts_with("//")
}

/// File extension to record for an image reference, query string and
/// fragment stripped.  Falls back to `png` when the source has none.
fn image_extension(src: &str) -> String {
    let path = src.split(['?', '#']).next().unwrap_or(src);
    Path::new(path)
        .extension()
        .and_then(|ext| ext.to_str())
        .map(|ext| ext.to_ascii_lowercase())
        .unwrap_or_else(|| "png".to_string())
}

/// A parsed HTML document distilled to the tree the emitter consumes, plus
/// any diagnostics recorded while distilling.
pub struct DocTree {
    root: DocNode,
    report: Report,
}

impl DocTree {
    /// The distilled root node.
    pub fn root(&self) -> &DocNode {
        &self.root
    }
}

/// Reads and distills an HTML document.
///
/// The parse itself never fails on malformed markup; like a browser, the
/// parser repairs what it can.  Errors here are I/O errors from `input`.
pub fn parse(mut input: impl io::Read) -> Result<DocTree> {
    let opts = ParseOpts {
        tree_builder: TreeBuilderOpts {
            drop_doctype: true,
            ..Default::default()
        },
        ..Default::default()
    };
    let dom = parse_document(RcDom::default(), opts)
        .from_utf8()
        .read_from(&mut input)?;
    let mut report = Report::new();
    let root = dom_to_doc_node(&mut report, dom.document.clone(), 0)
        .unwrap_or(DocNode::Container(Vec::new()));
    Ok(DocTree { root, report })
}

/// Convert `html` and append the result to `document`.
///
/// Everything the document already contains is left untouched; the
/// converted content is appended after it.
pub fn add_html_to_document(html: &str, document: &mut DocxDocument) -> Result<Report> {
    config::standard().convert_string(html, document)
}

/// Convert `html` into a fresh document.
pub fn convert_string(html: &str) -> Result<(DocxDocument, Report)> {
    config::standard().docx_from_string(html)
}

/// Convert the HTML file at `input` and save the document at `output`.
pub fn convert_file(input: impl AsRef<Path>, output: impl AsRef<Path>) -> Result<Report> {
    let html = std::fs::read_to_string(input)?;
    let (mut document, report) = config::standard().docx_from_string(&html)?;
    document.save(output)?;
    Ok(report)
}

/// Conversion configuration.
pub mod config {
    use std::io;

    use crate::error::{Report, Result};
    use crate::sink::docx::DocxDocument;
    use crate::sink::DocumentSink;
    use crate::{DocTree, Emitter, ImageLoader, LocalImageLoader};

    /// Configuration for one or more conversions, built with the methods on
    /// the value returned by [`standard`].
    pub struct Config {
        include_images: bool,
        loader: Box<dyn ImageLoader>,
    }

    /// The default configuration: images included, read from the local
    /// filesystem.
    pub fn standard() -> Config {
        Config {
            include_images: true,
            loader: Box::new(LocalImageLoader),
        }
    }

    impl Config {
        /// Include or skip `<img>` elements.  When skipped no loader is
        /// consulted and no diagnostics are recorded for them.
        pub fn include_images(mut self, include: bool) -> Config {
            self.include_images = include;
            self
        }

        /// Use `loader` to resolve image references instead of the local
        /// filesystem.
        pub fn image_loader(mut self, loader: impl ImageLoader + 'static) -> Config {
            self.loader = Box::new(loader);
            self
        }

        /// Parse HTML from `input` and replay it into `sink`.
        pub fn convert_read(
            &self,
            input: impl io::Read,
            sink: &mut impl DocumentSink,
        ) -> Result<Report> {
            let tree = crate::parse(input)?;
            self.convert_tree(tree, sink)
        }

        /// Convert an HTML string into `sink`.
        pub fn convert_string(&self, html: &str, sink: &mut impl DocumentSink) -> Result<Report> {
            self.convert_read(html.as_bytes(), sink)
        }

        /// Replay an already-parsed tree into `sink`.
        pub fn convert_tree(&self, tree: DocTree, sink: &mut impl DocumentSink) -> Result<Report> {
            let DocTree { root, mut report } = tree;
            let mut emitter = Emitter::new(sink, &mut report, self.include_images, &*self.loader);
            emitter.emit(root);
            emitter.finish();
            Ok(report)
        }

        /// Convert an HTML string into a fresh document.
        pub fn docx_from_string(&self, html: &str) -> Result<(DocxDocument, Report)> {
            let mut document = DocxDocument::new();
            let report = self.convert_string(html, &mut document)?;
            Ok((document, report))
        }
    }
}

/// One step of the iterative tree walk in [`map_tree`].
enum WalkStep<N, R> {
    /// This node reduced to a result on its own.
    Finished(R),
    /// This node contributes nothing.
    Nothing,
    /// Walk `children` first, then combine their results with `finish`.
    Pending {
        children: Vec<N>,
        finish: Box<dyn FnOnce(&mut Report, Vec<R>) -> Option<R>>,
    },
}

/// Map a tree to a single value with an explicit stack, so arbitrarily deep
/// input cannot overflow the call stack.  Nodes below [`MAX_DEPTH`] are
/// reduced with no children and a warning.
fn map_tree<N, R, F>(report: &mut Report, top: N, base_depth: usize, mut process: F) -> Option<R>
where
    F: FnMut(&mut Report, N, usize) -> WalkStep<N, R>,
{
    struct Level<N, R> {
        todo: std::vec::IntoIter<N>,
        done: Vec<R>,
        finish: Box<dyn FnOnce(&mut Report, Vec<R>) -> Option<R>>,
    }

    let mut stack: Vec<Level<N, R>> = vec![Level {
        todo: vec![top].into_iter(),
        done: Vec::new(),
        finish: Box::new(|_, mut results| results.pop()),
    }];
    loop {
        let depth = base_depth + stack.len() - 1;
        let next = stack.last_mut().unwrap().todo.next();
        match next {
            Some(node) => match process(report, node, depth) {
                WalkStep::Finished(result) => stack.last_mut().unwrap().done.push(result),
                WalkStep::Nothing => {}
                WalkStep::Pending { children, finish } => {
                    if depth >= MAX_DEPTH {
                        report.warn("markup nested deeper than supported; content dropped");
                        if let Some(result) = finish(report, Vec::new()) {
                            stack.last_mut().unwrap().done.push(result);
                        }
                    } else {
                        stack.push(Level {
                            todo: children.into_iter(),
                            done: Vec::new(),
                            finish,
                        });
                    }
                }
            },
            None => {
                let level = stack.pop().unwrap();
                let result = (level.finish)(report, level.done);
                match stack.last_mut() {
                    Some(parent) => {
                        if let Some(result) = result {
                            parent.done.push(result);
                        }
                    }
                    None => return result,
                }
            }
        }
    }
}

fn dom_to_doc_node(report: &mut Report, handle: Handle, depth: usize) -> Option<DocNode> {
    map_tree(report, handle, depth, process_dom_node)
}

fn attr_value(attrs: &[Attribute], name: &str) -> Option<String> {
    attrs
        .iter()
        .find(|attr| &*attr.name.local == name)
        .map(|attr| attr.value.to_string())
}

fn block_attrs_of(attrs: &[Attribute]) -> BlockAttrs {
    attr_value(attrs, "style")
        .map(|style| styles::block_attrs(&style))
        .unwrap_or_default()
}

/// A `rowspan`/`colspan` attribute; malformed or zero values mean 1.
fn span_attr(attrs: &[Attribute], name: &str) -> usize {
    attr_value(attrs, name)
        .and_then(|value| value.trim().parse::<usize>().ok())
        .unwrap_or(1)
        .max(1)
}

fn dimension_attr(attrs: &[Attribute], name: &str) -> Option<u32> {
    attr_value(attrs, name)
        .and_then(|value| value.trim().trim_end_matches("px").trim().parse().ok())
}

fn descend<F>(handle: &Handle, finish: F) -> WalkStep<Handle, DocNode>
where
    F: FnOnce(&mut Report, Vec<DocNode>) -> Option<DocNode> + 'static,
{
    WalkStep::Pending {
        children: handle.children.borrow().clone(),
        finish: Box::new(finish),
    }
}

/// Collect the items of a `<ul>`/`<ol>`.  Only `<li>` children and directly
/// nested lists contribute; loose text between items is dropped.
fn list_items(report: &mut Report, handle: &Handle, depth: usize) -> Vec<DocNode> {
    if depth >= MAX_DEPTH {
        report.warn("list nested deeper than supported; content dropped");
        return Vec::new();
    }
    let mut items = Vec::new();
    for child in handle.children.borrow().iter() {
        if let NodeData::Element { name, .. } = &child.data {
            match &*name.local {
                "li" => {
                    let content = child
                        .children
                        .borrow()
                        .iter()
                        .filter_map(|node| dom_to_doc_node(report, node.clone(), depth + 2))
                        .collect();
                    items.push(DocNode::ListItem(content));
                }
                // A list nested directly under a list element, without a
                // wrapping <li>.
                "ul" | "ol" => {
                    if let Some(node) = dom_to_doc_node(report, child.clone(), depth + 1) {
                        items.push(node);
                    }
                }
                _ => {}
            }
        }
    }
    items
}

/// Map one DOM node onto the [`DocNode`] vocabulary.
fn process_dom_node(report: &mut Report, handle: Handle, depth: usize) -> WalkStep<Handle, DocNode> {
    match &handle.data {
        NodeData::Document => descend(&handle, |_, children| Some(DocNode::Container(children))),
        NodeData::Text { contents } => {
            let text = contents.borrow().to_string();
            if text.is_empty() {
                WalkStep::Nothing
            } else {
                WalkStep::Finished(DocNode::Text(text))
            }
        }
        NodeData::Comment { .. }
        | NodeData::Doctype { .. }
        | NodeData::ProcessingInstruction { .. } => WalkStep::Nothing,
        NodeData::Element { name, attrs, .. } => {
            let attrs = attrs.borrow();
            let tag: &str = &name.local;
            match tag {
                "head" | "script" | "style" | "meta" | "link" | "base" | "title" | "template" => {
                    WalkStep::Nothing
                }
                "html" | "body" => {
                    descend(&handle, |_, children| Some(DocNode::Container(children)))
                }
                "p" => {
                    let block = block_attrs_of(&attrs);
                    descend(&handle, move |_, children| {
                        Some(DocNode::Paragraph(block, children))
                    })
                }
                "h1" | "h2" | "h3" | "h4" | "h5" | "h6" => {
                    let level = tag.as_bytes()[1] - b'0';
                    let block = block_attrs_of(&attrs);
                    descend(&handle, move |_, children| {
                        Some(DocNode::Heading(level, block, children))
                    })
                }
                "div" | "section" | "article" | "main" | "aside" | "figure" => {
                    descend(&handle, |_, children| Some(DocNode::Div(children)))
                }
                "blockquote" => descend(&handle, |_, children| Some(DocNode::Quote(children))),
                "pre" => descend(&handle, |_, children| Some(DocNode::Pre(children))),
                "br" => WalkStep::Finished(DocNode::Break),
                "hr" => WalkStep::Finished(DocNode::Rule),
                "a" => match attr_value(&attrs, "href").filter(|href| !href.is_empty()) {
                    Some(href) => descend(&handle, move |_, children| {
                        if children.is_empty() {
                            None
                        } else {
                            Some(DocNode::Link(href, children))
                        }
                    }),
                    // No usable target: keep the content as plain text.
                    None => descend(&handle, |_, children| Some(DocNode::Container(children))),
                },
                "img" => match attr_value(&attrs, "src").filter(|src| !src.is_empty()) {
                    Some(src) => WalkStep::Finished(DocNode::Image(ImageRef {
                        src,
                        alt: attr_value(&attrs, "alt").unwrap_or_default(),
                        width_px: dimension_attr(&attrs, "width"),
                        height_px: dimension_attr(&attrs, "height"),
                    })),
                    None => {
                        report.warn("<img> without a source; skipped");
                        WalkStep::Nothing
                    }
                },
                "span" | "font" => {
                    let delta = attr_value(&attrs, "style")
                        .map(|style| styles::run_delta_from_style(&style))
                        .unwrap_or_default();
                    if delta.is_empty() {
                        descend(&handle, |_, children| Some(DocNode::Container(children)))
                    } else {
                        descend(&handle, move |_, children| {
                            Some(DocNode::Styled(delta, children))
                        })
                    }
                }
                "ul" => WalkStep::Finished(DocNode::Ul(list_items(report, &handle, depth))),
                "ol" => {
                    let start = attr_value(&attrs, "start")
                        .and_then(|value| value.trim().parse().ok())
                        .unwrap_or(1);
                    WalkStep::Finished(DocNode::Ol(start, list_items(report, &handle, depth)))
                }
                // An <li> outside any list still renders as a paragraph.
                "li" => descend(&handle, |_, children| Some(DocNode::ListItem(children))),
                "table" => descend(&handle, |_, children| {
                    let mut rows = Vec::new();
                    for child in children {
                        match child {
                            DocNode::TableRows(group) => rows.extend(group),
                            DocNode::TableRow(row) => rows.push(row),
                            _ => {}
                        }
                    }
                    if rows.is_empty() {
                        None
                    } else {
                        Some(DocNode::Table(DocTable { rows }))
                    }
                }),
                "thead" | "tbody" | "tfoot" => {
                    let header = tag == "thead";
                    descend(&handle, move |_, children| {
                        let rows = children
                            .into_iter()
                            .filter_map(|child| match child {
                                DocNode::TableRow(mut row) => {
                                    row.header |= header;
                                    Some(row)
                                }
                                _ => None,
                            })
                            .collect();
                        Some(DocNode::TableRows(rows))
                    })
                }
                "tr" => descend(&handle, |_, children| {
                    let cells = children
                        .into_iter()
                        .filter_map(|child| match child {
                            DocNode::TableCell(cell) => Some(cell),
                            _ => None,
                        })
                        .collect();
                    Some(DocNode::TableRow(DocRow {
                        header: false,
                        cells,
                    }))
                }),
                "td" | "th" => {
                    let header = tag == "th";
                    let row_span = span_attr(&attrs, "rowspan");
                    let col_span = span_attr(&attrs, "colspan");
                    descend(&handle, move |_, children| {
                        Some(DocNode::TableCell(DocCell {
                            row_span,
                            col_span,
                            header,
                            content: children,
                        }))
                    })
                }
                other => match styles::run_delta_for_tag(other) {
                    Some(mut delta) => {
                        if let Some(style) = attr_value(&attrs, "style") {
                            let css = styles::run_delta_from_style(&style);
                            delta.color = css.color.or(delta.color);
                            delta.background = css.background.or(delta.background);
                        }
                        descend(&handle, move |_, children| {
                            Some(DocNode::Styled(delta, children))
                        })
                    }
                    // Unknown tag: pass the content through unformatted.
                    None => descend(&handle, |_, children| Some(DocNode::Container(children))),
                },
            }
        }
    }
}

/// Collapse runs of whitespace to single spaces, preserving whether the
/// text started or ended with whitespace.
fn collapse_whitespace(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    let mut in_space = false;
    for ch in text.chars() {
        if ch.is_whitespace() {
            if !in_space {
                out.push(' ');
            }
            in_space = true;
        } else {
            out.push(ch);
            in_space = false;
        }
    }
    out
}

/// Replays a distilled tree into a [`DocumentSink`].
///
/// The emitter owns all per-conversion state: the inline formatting stack,
/// the list registry, and the paragraph/whitespace bookkeeping.  Sink
/// errors for individual elements are downgraded to diagnostics so one bad
/// element never loses the rest of the document.
struct Emitter<'e, S: DocumentSink> {
    sink: &'e mut S,
    report: &'e mut Report,
    include_images: bool,
    loader: &'e dyn ImageLoader,
    ctx: ContextStack,
    lists: ListRegistry,
    list_stack: Vec<ListContext>,
    /// Block style of each enclosing, still-open list item; block children
    /// of an item open paragraphs carrying the innermost of these.
    item_styles: Vec<BlockStyle>,
    para_open: bool,
    blocks_opened: u64,
    at_para_start: bool,
    pending_space: bool,
    pending_breaks: u32,
    preserve: u32,
    quote_depth: u32,
}

impl<'e, S: DocumentSink> Emitter<'e, S> {
    fn new(
        sink: &'e mut S,
        report: &'e mut Report,
        include_images: bool,
        loader: &'e dyn ImageLoader,
    ) -> Emitter<'e, S> {
        Emitter {
            sink,
            report,
            include_images,
            loader,
            ctx: ContextStack::new(),
            lists: ListRegistry::new(),
            list_stack: Vec::new(),
            item_styles: Vec::new(),
            para_open: false,
            blocks_opened: 0,
            at_para_start: true,
            pending_space: false,
            pending_breaks: 0,
            preserve: 0,
            quote_depth: 0,
        }
    }

    fn emit(&mut self, node: DocNode) {
        match node {
            DocNode::Text(text) => self.text(&text),
            DocNode::Container(children) => {
                for child in children {
                    self.emit(child);
                }
            }
            DocNode::Styled(delta, children) => {
                self.ctx.push(&delta);
                for child in children {
                    self.emit(child);
                }
                self.ctx.pop();
            }
            DocNode::Link(target, children) => {
                self.ctx.push_link(&target);
                for child in children {
                    self.emit(child);
                }
                self.ctx.pop();
            }
            DocNode::Image(image) => self.image(image),
            DocNode::Paragraph(attrs, children) => {
                let style = self.base_style();
                self.block(style, attrs, children);
            }
            DocNode::Heading(level, attrs, children) => {
                // A heading inside a list item stays in the item's paragraph
                // so the marker and numbering are not orphaned.
                let style = match self.item_styles.last() {
                    Some(item) => *item,
                    None => BlockStyle::of(BlockKind::Heading(level)),
                };
                self.block(style, attrs, children);
            }
            DocNode::Div(children) => {
                self.end_block();
                for child in children {
                    self.emit(child);
                }
                self.end_block();
            }
            DocNode::Pre(children) => {
                self.end_block();
                self.preserve += 1;
                self.open_block(BlockStyle::of(BlockKind::Preformatted));
                for child in children {
                    self.emit(child);
                }
                self.preserve -= 1;
                self.end_block();
            }
            DocNode::Quote(children) => {
                self.end_block();
                self.quote_depth += 1;
                for child in children {
                    self.emit(child);
                }
                self.quote_depth -= 1;
                self.end_block();
            }
            DocNode::Ul(items) => self.list(ListKind::Unordered, 1, items),
            DocNode::Ol(start, items) => self.list(ListKind::Ordered, start, items),
            DocNode::ListItem(children) => {
                let style = self.base_style();
                self.block(style, BlockAttrs::default(), children);
            }
            DocNode::Break => {
                self.ensure_block();
                self.flush_breaks();
                let result = self.sink.hard_break();
                self.guard(result);
                self.at_para_start = false;
                self.pending_space = false;
            }
            DocNode::Rule => {
                self.end_block();
                let result = self.sink.horizontal_rule();
                self.guard(result);
            }
            DocNode::Table(table) => self.table(table),
            // Table plumbing never escapes a <table> reduction.
            DocNode::TableRows(_) | DocNode::TableRow(_) | DocNode::TableCell(_) => {}
        }
    }

    /// Close any open paragraph and check that the formatting context
    /// unwound; the walk pushes and pops in strict pairs, so a leak here is
    /// a bug in the emitter, not in the input.
    fn finish(&mut self) {
        self.end_block();
        if self.ctx.depth() != 1 || !self.list_stack.is_empty() || !self.item_styles.is_empty() {
            self.report
                .element_error("formatting context was not fully unwound; this is a conversion bug");
        }
    }

    /// The block style ambient content should open with here: preformatted
    /// and list-item contexts take precedence over quoting.
    fn base_style(&self) -> BlockStyle {
        if self.preserve > 0 {
            BlockStyle::of(BlockKind::Preformatted)
        } else if let Some(item) = self.item_styles.last() {
            *item
        } else if self.quote_depth > 0 {
            BlockStyle::of(BlockKind::Quote)
        } else {
            BlockStyle::of(BlockKind::Normal)
        }
    }

    fn block(&mut self, base: BlockStyle, attrs: BlockAttrs, children: Vec<DocNode>) {
        self.end_block();
        self.open_block(BlockStyle {
            kind: base.kind,
            align: attrs.align.or(base.align),
            indent_twips: attrs.indent_twips.or(base.indent_twips),
        });
        for child in children {
            self.emit(child);
        }
        self.end_block();
    }

    fn open_block(&mut self, style: BlockStyle) {
        let result = self.sink.paragraph(&style);
        self.guard(result);
        self.blocks_opened += 1;
        self.para_open = true;
        self.at_para_start = true;
        self.pending_space = false;
        self.pending_breaks = 0;
    }

    fn ensure_block(&mut self) {
        if !self.para_open {
            self.open_block(self.base_style());
        }
    }

    fn end_block(&mut self) {
        self.para_open = false;
        self.at_para_start = true;
        self.pending_space = false;
        self.pending_breaks = 0;
    }

    fn guard(&mut self, result: Result<()>) {
        if let Err(err) = result {
            self.report
                .element_error(format!("element rejected by the document sink: {}", err));
        }
    }

    fn text(&mut self, text: &str) {
        if self.preserve > 0 {
            self.preformatted_text(text);
            return;
        }
        let collapsed = collapse_whitespace(text);
        if collapsed.trim().is_empty() {
            // Whitespace between elements only matters inside an open
            // paragraph that already has content.
            if self.para_open && !self.at_para_start && !collapsed.is_empty() {
                self.pending_space = true;
            }
            return;
        }
        self.ensure_block();
        let mut piece = collapsed;
        if self.at_para_start {
            piece = piece.trim_start().to_string();
        }
        if self.pending_space && !piece.starts_with(' ') {
            piece.insert(0, ' ');
        }
        self.pending_space = false;
        if piece.ends_with(' ') {
            piece.truncate(piece.trim_end().len());
            self.pending_space = true;
        }
        if piece.is_empty() {
            return;
        }
        self.emit_run(&piece, false);
        self.at_para_start = false;
    }

    /// Text inside `<pre>`: whitespace verbatim, newlines as hard breaks.
    /// Breaks are emitted lazily so a newline right before the closing tag
    /// produces nothing, and the newline right after the opening tag is
    /// dropped as in HTML rendering.
    fn preformatted_text(&mut self, text: &str) {
        self.ensure_block();
        let mut normalized = text.replace("\r\n", "\n").replace('\r', "\n");
        if self.at_para_start {
            if let Some(rest) = normalized.strip_prefix('\n') {
                normalized = rest.to_string();
            }
            if normalized.is_empty() {
                return;
            }
        }
        for (i, segment) in normalized.split('\n').enumerate() {
            if i > 0 {
                self.pending_breaks += 1;
            }
            if !segment.is_empty() {
                self.flush_breaks();
                self.emit_run(segment, true);
                self.at_para_start = false;
            }
        }
    }

    fn flush_breaks(&mut self) {
        while self.pending_breaks > 0 {
            let result = self.sink.hard_break();
            self.guard(result);
            self.pending_breaks -= 1;
            self.at_para_start = false;
        }
    }

    fn emit_run(&mut self, text: &str, monospace: bool) {
        let mut state = self.ctx.current().clone();
        state.run.monospace |= monospace;
        let result = match &state.link {
            Some(target) => self.sink.hyperlink(target, text, &state.run),
            None => self.sink.run(text, &state.run),
        };
        self.guard(result);
    }

    fn image(&mut self, image: ImageRef) {
        if !self.include_images {
            return;
        }
        match self.loader.load(&image.src) {
            Ok(bytes) => {
                let data = ImageData {
                    bytes,
                    extension: image_extension(&image.src),
                    alt: image.alt,
                    width_px: image.width_px,
                    height_px: image.height_px,
                };
                self.ensure_block();
                match self.sink.picture(&data) {
                    Ok(()) => self.at_para_start = false,
                    Err(err) => self.report.element_error(format!(
                        "image {:?} rejected by the document sink: {}",
                        image.src, err
                    )),
                }
            }
            Err(err) => {
                self.report.warn(format!(
                    "image {:?} could not be read and was skipped: {}",
                    image.src, err
                ));
            }
        }
    }

    fn list(&mut self, kind: ListKind, start: i64, items: Vec<DocNode>) {
        self.end_block();
        let parent = self.list_stack.last().copied();
        let list = self.lists.open(kind, parent.as_ref());
        self.list_stack.push(list);
        let mut index = start;
        for item in items {
            match item {
                DocNode::ListItem(content) => {
                    let style = BlockStyle::of(BlockKind::ListItem {
                        kind: list.kind,
                        numbering: list.numbering,
                        level: list.level,
                        index,
                    });
                    // The item paragraph opens lazily, so a block child
                    // (<p>, heading) becomes the item paragraph itself
                    // instead of leaving an empty marker behind.
                    self.item_styles.push(style);
                    let opened = self.blocks_opened;
                    for node in content {
                        self.emit(node);
                    }
                    self.end_block();
                    // An item with no content still shows its marker.
                    if self.blocks_opened == opened {
                        self.open_block(style);
                        self.end_block();
                    }
                    self.item_styles.pop();
                    index += 1;
                }
                nested @ (DocNode::Ul(_) | DocNode::Ol(..)) => self.emit(nested),
                _ => {}
            }
        }
        self.list_stack.pop();
    }

    fn table(&mut self, table: DocTable) {
        self.end_block();
        let grid = TableGrid::build(table, self.report);
        if grid.is_empty() {
            self.report.warn("table with no cells; skipped");
            return;
        }
        if let Err(err) = self.sink.begin_table(grid.rows, grid.cols) {
            self.report
                .element_error(format!("table rejected by the document sink: {}", err));
            return;
        }
        for cell in grid.cells {
            let mut content = self.sink.sub_sink();
            {
                let mut inner = Emitter::new(
                    &mut content,
                    &mut *self.report,
                    self.include_images,
                    self.loader,
                );
                if cell.header {
                    inner.ctx.push(&RunDelta::bold());
                }
                for node in cell.content {
                    inner.emit(node);
                }
                inner.end_block();
            }
            let result = self
                .sink
                .cell_content(cell.row, cell.col, content, cell.header);
            self.guard(result);
            if cell.row_span > 1 || cell.col_span > 1 {
                let range = CellRange {
                    first_row: cell.row,
                    first_col: cell.col,
                    last_row: cell.row + cell.row_span - 1,
                    last_col: cell.col + cell.col_span - 1,
                };
                let result = self.sink.merge_cells(&range);
                self.guard(result);
            }
        }
        let result = self.sink.end_table();
        self.guard(result);
    }
}
