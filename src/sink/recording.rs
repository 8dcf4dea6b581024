//! A sink that records every operation as a line of text, so tests can
//! assert the exact block/run structure a conversion produced.

use crate::context::ListKind;
use crate::error::Result;
use crate::sink::{BlockKind, BlockStyle, CellRange, DocumentSink, ImageData};
use crate::styles::{Alignment, RunStyle};

/// Records sink operations as an indented transcript.
#[derive(Debug, Default)]
pub struct RecordingSink {
    lines: Vec<String>,
}

fn fmt_run_style(style: &RunStyle) -> String {
    let mut flags = Vec::new();
    if style.bold {
        flags.push("b".to_string());
    }
    if style.italic {
        flags.push("i".to_string());
    }
    if style.underline {
        flags.push("u".to_string());
    }
    if style.strike {
        flags.push("s".to_string());
    }
    if style.monospace {
        flags.push("m".to_string());
    }
    if style.superscript {
        flags.push("sup".to_string());
    }
    if style.subscript {
        flags.push("sub".to_string());
    }
    if let Some(c) = style.color {
        flags.push(format!("fg={}", c.hex()));
    }
    if let Some(c) = style.background {
        flags.push(format!("bg={}", c.hex()));
    }
    format!("{{{}}}", flags.join(","))
}

fn fmt_block_style(style: &BlockStyle) -> String {
    let mut desc = match style.kind {
        BlockKind::Normal => "normal".to_string(),
        BlockKind::Heading(level) => format!("h{}", level),
        BlockKind::Quote => "quote".to_string(),
        BlockKind::Preformatted => "pre".to_string(),
        BlockKind::ListItem {
            kind,
            numbering,
            level,
            index,
        } => {
            let kind = match kind {
                ListKind::Ordered => "ol",
                ListKind::Unordered => "ul",
            };
            format!("list {} #{} l{} i{}", kind, numbering, level, index)
        }
    };
    if let Some(align) = style.align {
        let align = match align {
            Alignment::Left => "left",
            Alignment::Center => "center",
            Alignment::Right => "right",
            Alignment::Justify => "justify",
        };
        desc.push_str(&format!(" align={}", align));
    }
    if let Some(indent) = style.indent_twips {
        desc.push_str(&format!(" ind={}", indent));
    }
    desc
}

impl RecordingSink {
    pub fn new() -> RecordingSink {
        RecordingSink::default()
    }

    /// The transcript so far, one operation per line.
    pub fn transcript(&self) -> String {
        let mut out = self.lines.join("\n");
        if !self.lines.is_empty() {
            out.push('\n');
        }
        out
    }
}

impl DocumentSink for RecordingSink {
    fn sub_sink(&self) -> Self {
        RecordingSink::new()
    }

    fn paragraph(&mut self, style: &BlockStyle) -> Result<()> {
        self.lines.push(format!("p[{}]", fmt_block_style(style)));
        Ok(())
    }

    fn run(&mut self, text: &str, style: &RunStyle) -> Result<()> {
        self.lines
            .push(format!("  run {:?} {}", text, fmt_run_style(style)));
        Ok(())
    }

    fn hyperlink(&mut self, target: &str, text: &str, style: &RunStyle) -> Result<()> {
        self.lines.push(format!(
            "  link({}) {:?} {}",
            target,
            text,
            fmt_run_style(style)
        ));
        Ok(())
    }

    fn hard_break(&mut self) -> Result<()> {
        self.lines.push("  brk".to_string());
        Ok(())
    }

    fn horizontal_rule(&mut self) -> Result<()> {
        self.lines.push("hr".to_string());
        Ok(())
    }

    fn page_break(&mut self) -> Result<()> {
        self.lines.push("pagebreak".to_string());
        Ok(())
    }

    fn picture(&mut self, image: &ImageData) -> Result<()> {
        self.lines.push(format!(
            "  img {}B {} alt={:?}",
            image.bytes.len(),
            image.extension,
            image.alt
        ));
        Ok(())
    }

    fn begin_table(&mut self, rows: usize, cols: usize) -> Result<()> {
        self.lines.push(format!("table {}x{}", rows, cols));
        Ok(())
    }

    fn merge_cells(&mut self, range: &CellRange) -> Result<()> {
        self.lines.push(format!(
            "  merge ({},{})-({},{})",
            range.first_row, range.first_col, range.last_row, range.last_col
        ));
        Ok(())
    }

    fn cell_content(&mut self, row: usize, col: usize, content: Self, header: bool) -> Result<()> {
        let tag = if header { " hdr" } else { "" };
        self.lines.push(format!("  cell ({},{}){}:", row, col, tag));
        for line in content.lines {
            self.lines.push(format!("    {}", line));
        }
        Ok(())
    }

    fn end_table(&mut self) -> Result<()> {
        self.lines.push("end table".to_string());
        Ok(())
    }
}
