//! Module containing the [`DocumentSink`] interface for constructing a
//! particular document output, plus the sinks shipped with the crate.

pub mod docx;
pub mod recording;

use crate::context::{ListKind, NumberingId};
use crate::error::Result;
use crate::styles::{Alignment, RunStyle};

/// What kind of block a paragraph is.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BlockKind {
    /// A plain body paragraph.
    Normal,
    /// A heading at the given level (1 through 6).
    Heading(u8),
    /// An indented, shaded quotation paragraph.
    Quote,
    /// A monospace block in which whitespace was preserved verbatim.
    Preformatted,
    /// One list item paragraph.
    ListItem {
        kind: ListKind,
        numbering: NumberingId,
        /// 0-based nesting level.
        level: u8,
        /// 1-based position within the list (offset by `<ol start>`).
        index: i64,
    },
}

/// The full block directive for one paragraph.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BlockStyle {
    pub kind: BlockKind,
    pub align: Option<Alignment>,
    /// Extra left indent in twentieths of a point.
    pub indent_twips: Option<u32>,
}

impl BlockStyle {
    pub fn normal() -> BlockStyle {
        BlockStyle {
            kind: BlockKind::Normal,
            align: None,
            indent_twips: None,
        }
    }

    pub fn of(kind: BlockKind) -> BlockStyle {
        BlockStyle {
            kind,
            align: None,
            indent_twips: None,
        }
    }
}

/// An inclusive rectangular range of grid positions to merge into one cell.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CellRange {
    pub first_row: usize,
    pub first_col: usize,
    pub last_row: usize,
    pub last_col: usize,
}

/// A resolved image ready for insertion.
#[derive(Debug, Clone)]
pub struct ImageData {
    pub bytes: Vec<u8>,
    /// Lowercase file extension, e.g. `png`.
    pub extension: String,
    /// Alternative text from the markup.
    pub alt: String,
    /// Display size in CSS pixels, where the markup declared one.
    pub width_px: Option<u32>,
    pub height_px: Option<u32>,
}

/// A type which is a backend for HTML to document conversion.
///
/// The engine only ever appends: it neither inspects the sink's internals
/// nor assumes whether it is a fresh document, an insertion-point scratch
/// document or a table cell.  Table content is built in sub-sinks created
/// with [`sub_sink`](DocumentSink::sub_sink) and handed back through
/// [`cell_content`](DocumentSink::cell_content).
///
/// Table operations always arrive as one `begin_table`, then any number of
/// `merge_cells` and `cell_content` calls, then one `end_table`.
pub trait DocumentSink: Sized {
    /// Create an empty sink of the same kind for nested (cell) content.
    fn sub_sink(&self) -> Self;

    /// Start a new paragraph with the given block style.
    fn paragraph(&mut self, style: &BlockStyle) -> Result<()>;

    /// Append a run of text to the current paragraph.
    fn run(&mut self, text: &str, style: &RunStyle) -> Result<()>;

    /// Append a hyperlinked run to the current paragraph.
    fn hyperlink(&mut self, target: &str, text: &str, style: &RunStyle) -> Result<()>;

    /// Append a hard line break inside the current paragraph.
    fn hard_break(&mut self) -> Result<()>;

    /// Emit a horizontal rule block.
    fn horizontal_rule(&mut self) -> Result<()>;

    /// Emit a page break block.
    fn page_break(&mut self) -> Result<()>;

    /// Append an image to the current paragraph.
    fn picture(&mut self, image: &ImageData) -> Result<()>;

    /// Start a table of `rows` x `cols` cells, all initially empty.
    fn begin_table(&mut self, rows: usize, cols: usize) -> Result<()>;

    /// Merge the cells covering `range` into one.
    fn merge_cells(&mut self, range: &CellRange) -> Result<()>;

    /// Set the content of the cell at (`row`, `col`) from a sub-sink.
    /// `header` marks header cells for styling.
    fn cell_content(&mut self, row: usize, col: usize, content: Self, header: bool) -> Result<()>;

    /// Finish the table started with `begin_table`.
    fn end_table(&mut self) -> Result<()>;
}
