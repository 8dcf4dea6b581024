//! The style resolver: pure mappings from HTML tags and attributes to the
//! style directives consumed by the document sink.
//!
//! Nothing in this module does I/O or holds state, so the whole mapping is
//! testable as a table of (input, expected directive) pairs.

/// An RGB colour as used in run and shading directives.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Rgb {
    pub r: u8,
    pub g: u8,
    pub b: u8,
}

impl Rgb {
    /// Render as the six-digit uppercase hex form used by WordprocessingML.
    pub fn hex(&self) -> String {
        format!("{:02X}{:02X}{:02X}", self.r, self.g, self.b)
    }
}

/// The resolved character formatting for one run of text.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct RunStyle {
    pub bold: bool,
    pub italic: bool,
    pub underline: bool,
    pub strike: bool,
    pub monospace: bool,
    pub superscript: bool,
    pub subscript: bool,
    pub color: Option<Rgb>,
    pub background: Option<Rgb>,
}

/// A change to the run formatting contributed by one inline element.
///
/// Flags are or-ed onto the current state; colours replace it.  Applying a
/// delta never clears a flag, so `<b><b>x</b></b>` stays bold.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct RunDelta {
    pub bold: bool,
    pub italic: bool,
    pub underline: bool,
    pub strike: bool,
    pub monospace: bool,
    pub superscript: bool,
    pub subscript: bool,
    pub color: Option<Rgb>,
    pub background: Option<Rgb>,
}

impl RunDelta {
    /// True if the delta would leave any run style unchanged.
    pub fn is_empty(&self) -> bool {
        *self == RunDelta::default()
    }

    pub fn bold() -> RunDelta {
        RunDelta {
            bold: true,
            ..Default::default()
        }
    }

    pub fn italic() -> RunDelta {
        RunDelta {
            italic: true,
            ..Default::default()
        }
    }

    pub fn underline() -> RunDelta {
        RunDelta {
            underline: true,
            ..Default::default()
        }
    }

    pub fn strike() -> RunDelta {
        RunDelta {
            strike: true,
            ..Default::default()
        }
    }

    pub fn monospace() -> RunDelta {
        RunDelta {
            monospace: true,
            ..Default::default()
        }
    }

    pub fn superscript() -> RunDelta {
        RunDelta {
            superscript: true,
            ..Default::default()
        }
    }

    pub fn subscript() -> RunDelta {
        RunDelta {
            subscript: true,
            ..Default::default()
        }
    }
}

impl RunStyle {
    /// Return a copy of this style with `delta` applied.
    pub fn apply(&self, delta: &RunDelta) -> RunStyle {
        RunStyle {
            bold: self.bold || delta.bold,
            italic: self.italic || delta.italic,
            underline: self.underline || delta.underline,
            strike: self.strike || delta.strike,
            monospace: self.monospace || delta.monospace,
            superscript: self.superscript || delta.superscript,
            subscript: self.subscript || delta.subscript,
            color: delta.color.or(self.color),
            background: delta.background.or(self.background),
        }
    }
}

/// Paragraph alignment from a `text-align` declaration.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Alignment {
    Left,
    Center,
    Right,
    Justify,
}

/// Paragraph-level attributes resolved from an element's `style` attribute.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct BlockAttrs {
    pub align: Option<Alignment>,
    /// Left indent in twentieths of a point.
    pub indent_twips: Option<u32>,
}

impl BlockAttrs {
    pub fn is_empty(&self) -> bool {
        *self == BlockAttrs::default()
    }
}

/// Twips per CSS pixel at the conventional 96 dpi.
const TWIPS_PER_PX: f32 = 15.0;

/// Largest paragraph indent we will emit (5.5 inches).
pub const MAX_INDENT_TWIPS: u32 = 7920;

/// Inline formatting contributed by a tag name, if any.
pub fn run_delta_for_tag(tag: &str) -> Option<RunDelta> {
    match tag {
        "b" | "strong" => Some(RunDelta::bold()),
        "i" | "em" => Some(RunDelta::italic()),
        "u" | "ins" => Some(RunDelta::underline()),
        "s" | "strike" | "del" => Some(RunDelta::strike()),
        "code" | "tt" => Some(RunDelta::monospace()),
        "sup" => Some(RunDelta::superscript()),
        "sub" => Some(RunDelta::subscript()),
        _ => None,
    }
}

/// Split a `style` attribute into (property, value) pairs.
///
/// Declarations without a colon are skipped, matching the forgiving
/// behaviour expected of inline HTML styles.
pub fn parse_style_attr(style: &str) -> Vec<(String, String)> {
    style
        .split(';')
        .filter_map(|decl| {
            let (name, value) = decl.split_once(':')?;
            let name = name.trim().to_ascii_lowercase();
            let value = value.trim().to_string();
            if name.is_empty() || value.is_empty() {
                None
            } else {
                Some((name, value))
            }
        })
        .collect()
}

/// Parse a CSS colour value: `#rrggbb`, `#rgb` or `rgb(r, g, b)`.
pub fn parse_color(value: &str) -> Option<Rgb> {
    let value = value.trim();
    if let Some(hex) = value.strip_prefix('#') {
        return match hex.len() {
            6 => {
                let r = u8::from_str_radix(&hex[0..2], 16).ok()?;
                let g = u8::from_str_radix(&hex[2..4], 16).ok()?;
                let b = u8::from_str_radix(&hex[4..6], 16).ok()?;
                Some(Rgb { r, g, b })
            }
            3 => {
                let d = |i: usize| u8::from_str_radix(&hex[i..i + 1], 16).ok().map(|v| v * 17);
                Some(Rgb {
                    r: d(0)?,
                    g: d(1)?,
                    b: d(2)?,
                })
            }
            _ => None,
        };
    }
    if let Some(args) = value
        .strip_prefix("rgb(")
        .or_else(|| value.strip_prefix("RGB("))
        .and_then(|v| v.strip_suffix(')'))
    {
        let mut parts = args.split(',').map(|p| p.trim().parse::<u8>());
        let r = parts.next()?.ok()?;
        let g = parts.next()?.ok()?;
        let b = parts.next()?.ok()?;
        return Some(Rgb { r, g, b });
    }
    None
}

fn parse_alignment(value: &str) -> Option<Alignment> {
    match value.trim() {
        "left" => Some(Alignment::Left),
        "center" => Some(Alignment::Center),
        "right" => Some(Alignment::Right),
        "justify" => Some(Alignment::Justify),
        _ => None,
    }
}

/// Left indent from a `margin-left` declaration.  Only pixel units are
/// honoured; the result is capped at [`MAX_INDENT_TWIPS`].
fn parse_indent(value: &str) -> Option<u32> {
    let px: f32 = value.trim().strip_suffix("px")?.trim().parse().ok()?;
    if px <= 0.0 {
        return None;
    }
    Some(((px * TWIPS_PER_PX) as u32).min(MAX_INDENT_TWIPS))
}

/// Resolve the paragraph-level directives from a `style` attribute.
pub fn block_attrs(style: &str) -> BlockAttrs {
    let mut attrs = BlockAttrs::default();
    for (name, value) in parse_style_attr(style) {
        match name.as_str() {
            "text-align" => attrs.align = parse_alignment(&value),
            "margin-left" => attrs.indent_twips = parse_indent(&value),
            _ => {}
        }
    }
    attrs
}

/// Resolve the run-level directives from a `style` attribute
/// (`color` and `background-color`).
pub fn run_delta_from_style(style: &str) -> RunDelta {
    let mut delta = RunDelta::default();
    for (name, value) in parse_style_attr(style) {
        match name.as_str() {
            "color" => delta.color = parse_color(&value),
            "background-color" => delta.background = parse_color(&value),
            _ => {}
        }
    }
    delta
}
