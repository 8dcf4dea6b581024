use std::collections::HashMap;
use std::io::Read;

use crate::config;
use crate::{
    add_html_to_document, DocCell, DocRow, DocTable, DocxDocument, ImageLoader, RecordingSink,
    Report, Severity, TableGrid,
};

/// Like assert_eq!(), but prints out the results normally as well
macro_rules! assert_eq_str {
    ($a:expr, $b:expr) => {
        if $a != $b {
            println!("<<<\n{}===\n{}>>>", $a, $b);
            assert_eq!($a, $b);
        }
    };
}

#[track_caller]
fn test_html(input: &str, expected: &str) {
    let _ = env_logger::builder().is_test(true).try_init();
    let mut sink = RecordingSink::new();
    let report = config::standard().convert_string(input, &mut sink).unwrap();
    assert!(
        report.is_clean(),
        "unexpected diagnostics: {:?}",
        report.diagnostics()
    );
    assert_eq_str!(sink.transcript(), expected);
}

#[track_caller]
fn test_html_conf<F>(input: &str, expected: &str, conf: F) -> Report
where
    F: Fn(config::Config) -> config::Config,
{
    let _ = env_logger::builder().is_test(true).try_init();
    let mut sink = RecordingSink::new();
    let report = conf(config::standard())
        .convert_string(input, &mut sink)
        .unwrap();
    assert_eq_str!(sink.transcript(), expected);
    report
}

/// A loader serving images from a fixed map, for tests.
struct MapLoader(HashMap<String, Vec<u8>>);

impl MapLoader {
    fn with(src: &str, bytes: &[u8]) -> MapLoader {
        let mut map = HashMap::new();
        map.insert(src.to_string(), bytes.to_vec());
        MapLoader(map)
    }
}

impl ImageLoader for MapLoader {
    fn load(&self, src: &str) -> std::io::Result<Vec<u8>> {
        self.0
            .get(src)
            .cloned()
            .ok_or_else(|| std::io::Error::new(std::io::ErrorKind::NotFound, "no such image"))
    }
}

#[test]
fn test_paragraph() {
    test_html(
        "<p>Hello world</p>",
        "\
p[normal]
  run \"Hello world\" {}
",
    );
}

#[test]
fn test_inline_nesting() {
    test_html(
        "<p><b>a<i>b</i>c</b>d</p>",
        "\
p[normal]
  run \"a\" {b}
  run \"b\" {b,i}
  run \"c\" {b}
  run \"d\" {}
",
    );
}

#[test]
fn test_redundant_bold() {
    test_html(
        "<p><b>a<b>b</b>c</b></p>",
        "\
p[normal]
  run \"a\" {b}
  run \"b\" {b}
  run \"c\" {b}
",
    );
}

#[test]
fn test_strike_and_underline() {
    test_html(
        "<p><u>a</u><s>b</s><ins>c</ins><del>d</del></p>",
        "\
p[normal]
  run \"a\" {u}
  run \"b\" {s}
  run \"c\" {u}
  run \"d\" {s}
",
    );
}

#[test]
fn test_inline_code() {
    test_html(
        "<p>call <code>frob()</code> now</p>",
        "\
p[normal]
  run \"call\" {}
  run \" frob()\" {m}
  run \" now\" {}
",
    );
}

#[test]
fn test_whitespace_collapse() {
    test_html(
        "<p>  a   b \n c</p>",
        "\
p[normal]
  run \"a b c\" {}
",
    );
}

#[test]
fn test_whitespace_between_inline_elements() {
    test_html(
        "<p>a <b>b</b> c</p>",
        "\
p[normal]
  run \"a\" {}
  run \" b\" {b}
  run \" c\" {}
",
    );
}

#[test]
fn test_whitespace_only_text_between_blocks() {
    test_html(
        "<p>a</p>\n   \n<p>b</p>",
        "\
p[normal]
  run \"a\" {}
p[normal]
  run \"b\" {}
",
    );
}

#[test]
fn test_heading_levels() {
    test_html(
        "<h1>One</h1><h3>Three</h3>",
        "\
p[h1]
  run \"One\" {}
p[h3]
  run \"Three\" {}
",
    );
}

#[test]
fn test_heading_alignment() {
    test_html(
        r#"<h2 style="text-align: center">Title</h2>"#,
        "\
p[h2 align=center]
  run \"Title\" {}
",
    );
}

#[test]
fn test_paragraph_indent() {
    // 96px at 15 twips per pixel.
    test_html(
        r#"<p style="margin-left: 96px">in</p>"#,
        "\
p[normal ind=1440]
  run \"in\" {}
",
    );
}

#[test]
fn test_span_color() {
    test_html(
        r#"<p><span style="color: #ff0000">red</span></p>"#,
        "\
p[normal]
  run \"red\" {fg=FF0000}
",
    );
}

#[test]
fn test_span_background() {
    test_html(
        r#"<p><span style="background-color: rgb(0, 255, 0)">hi</span></p>"#,
        "\
p[normal]
  run \"hi\" {bg=00FF00}
",
    );
}

#[test]
fn test_link() {
    test_html(
        r#"<p><a href="https://example.com/">site</a></p>"#,
        "\
p[normal]
  link(https://example.com/) \"site\" {}
",
    );
}

#[test]
fn test_link_inherits_formatting() {
    test_html(
        r#"<p><a href="x"><b>bold link</b></a></p>"#,
        "\
p[normal]
  link(x) \"bold link\" {b}
",
    );
}

#[test]
fn test_link_without_target_is_plain_text() {
    test_html(
        r#"<p><a href="">a</a><a>b</a></p>"#,
        "\
p[normal]
  run \"a\" {}
  run \"b\" {}
",
    );
}

#[test]
fn test_hard_break() {
    test_html(
        "<p>a<br>b</p>",
        "\
p[normal]
  run \"a\" {}
  brk
  run \"b\" {}
",
    );
}

#[test]
fn test_horizontal_rule() {
    test_html(
        "<p>a</p><hr><p>b</p>",
        "\
p[normal]
  run \"a\" {}
hr
p[normal]
  run \"b\" {}
",
    );
}

#[test]
fn test_blockquote() {
    test_html(
        "<blockquote><p>Wise words</p></blockquote>",
        "\
p[quote]
  run \"Wise words\" {}
",
    );
}

#[test]
fn test_blockquote_bare_text() {
    test_html(
        "<blockquote>Wise words</blockquote>",
        "\
p[quote]
  run \"Wise words\" {}
",
    );
}

#[test]
fn test_div_splits_paragraphs() {
    test_html(
        "<div>a</div><div>b</div>",
        "\
p[normal]
  run \"a\" {}
p[normal]
  run \"b\" {}
",
    );
}

#[test]
fn test_unknown_tag_passes_content_through() {
    test_html(
        "<p><custom-widget>x</custom-widget></p>",
        "\
p[normal]
  run \"x\" {}
",
    );
}

#[test]
fn test_pre_newlines_become_breaks() {
    test_html(
        "<pre>fn main() {\n    body\n}\n</pre>",
        "\
p[pre]
  run \"fn main() {\" {m}
  brk
  run \"    body\" {m}
  brk
  run \"}\" {m}
",
    );
}

#[test]
fn test_pre_keeps_inline_formatting() {
    test_html(
        "<pre>a\n<b>c</b></pre>",
        "\
p[pre]
  run \"a\" {m}
  brk
  run \"c\" {b,m}
",
    );
}

#[test]
fn test_superscript_and_subscript() {
    test_html(
        "<p>x<sup>2</sup> and H<sub>2</sub>O</p>",
        "\
p[normal]
  run \"x\" {}
  run \"2\" {sup}
  run \" and H\" {}
  run \"2\" {sub}
  run \"O\" {}
",
    );
}

#[test]
fn test_unordered_list() {
    test_html(
        "<ul><li>one</li><li>two</li></ul>",
        "\
p[list ul #1 l0 i1]
  run \"one\" {}
p[list ul #1 l0 i2]
  run \"two\" {}
",
    );
}

#[test]
fn test_ordered_list_start_offset() {
    test_html(
        r#"<ol start="3"><li>c</li><li>d</li></ol>"#,
        "\
p[list ol #1 l0 i3]
  run \"c\" {}
p[list ol #1 l0 i4]
  run \"d\" {}
",
    );
}

#[test]
fn test_nested_list_levels() {
    test_html(
        "<ol><li>a<ul><li>b</li></ul></li><li>c</li></ol>",
        "\
p[list ol #1 l0 i1]
  run \"a\" {}
p[list ul #1 l1 i1]
  run \"b\" {}
p[list ol #1 l0 i2]
  run \"c\" {}
",
    );
}

#[test]
fn test_list_item_with_paragraph_child() {
    test_html(
        "<ul><li><p>x</p></li></ul>",
        "\
p[list ul #1 l0 i1]
  run \"x\" {}
",
    );
}

#[test]
fn test_list_item_with_heading_child() {
    test_html(
        "<ol><li><h2>t</h2></li></ol>",
        "\
p[list ol #1 l0 i1]
  run \"t\" {}
",
    );
}

#[test]
fn test_list_item_with_several_paragraphs() {
    test_html(
        "<ul><li><p>a</p><p>b</p></li></ul>",
        "\
p[list ul #1 l0 i1]
  run \"a\" {}
p[list ul #1 l0 i1]
  run \"b\" {}
",
    );
}

#[test]
fn test_empty_list_item_keeps_marker() {
    test_html(
        "<ul><li></li><li>b</li></ul>",
        "\
p[list ul #1 l0 i1]
p[list ul #1 l0 i2]
  run \"b\" {}
",
    );
}

#[test]
fn test_sibling_lists_get_fresh_numbering() {
    test_html(
        "<ul><li>a</li></ul><ul><li>b</li></ul>",
        "\
p[list ul #1 l0 i1]
  run \"a\" {}
p[list ul #2 l0 i1]
  run \"b\" {}
",
    );
}

#[test]
fn test_simple_table() {
    test_html(
        "<table><tr><td>a</td><td>b</td></tr></table>",
        "\
table 1x2
  cell (0,0):
    p[normal]
      run \"a\" {}
  cell (0,1):
    p[normal]
      run \"b\" {}
end table
",
    );
}

#[test]
fn test_table_header_cells_are_bold() {
    test_html(
        "<table><thead><tr><th>H</th></tr></thead>\
         <tbody><tr><td>x</td></tr></tbody></table>",
        "\
table 2x1
  cell (0,0) hdr:
    p[normal]
      run \"H\" {b}
  cell (1,0):
    p[normal]
      run \"x\" {}
end table
",
    );
}

#[test]
fn test_table_rowspan_merge() {
    test_html(
        r#"<table><tr><td rowspan="2">a</td><td>b</td></tr><tr><td>c</td></tr></table>"#,
        "\
table 2x2
  cell (0,0):
    p[normal]
      run \"a\" {}
  merge (0,0)-(1,0)
  cell (0,1):
    p[normal]
      run \"b\" {}
  cell (1,1):
    p[normal]
      run \"c\" {}
end table
",
    );
}

#[test]
fn test_table_colspan_clamped_against_row_span() {
    let report = test_html_conf(
        r#"<table><tr><td rowspan="2">a</td><td>b</td></tr><tr><td colspan="2">c</td></tr></table>"#,
        "\
table 2x2
  cell (0,0):
    p[normal]
      run \"a\" {}
  merge (0,0)-(1,0)
  cell (0,1):
    p[normal]
      run \"b\" {}
  cell (1,1):
    p[normal]
      run \"c\" {}
end table
",
        |conf| conf,
    );
    assert_eq!(report.diagnostics().len(), 1);
    assert_eq!(report.diagnostics()[0].severity, Severity::Warning);
}

#[test]
fn test_table_with_list_in_cell() {
    test_html(
        "<table><tr><td><ul><li>x</li></ul></td></tr></table>",
        "\
table 1x1
  cell (0,0):
    p[list ul #1 l0 i1]
      run \"x\" {}
end table
",
    );
}

#[test]
fn test_grid_spans_stay_disjoint_under_bad_spans() {
    let cell = |row_span, col_span| DocCell {
        row_span,
        col_span,
        header: false,
        content: Vec::new(),
    };
    let table = DocTable {
        rows: vec![
            DocRow {
                header: false,
                cells: vec![cell(5, 1), cell(1, 9)],
            },
            DocRow {
                header: false,
                cells: vec![cell(1, 2), cell(3, 1)],
            },
        ],
    };
    let mut report = Report::new();
    let grid = TableGrid::build(table, &mut report);
    assert!(grid.spans_are_disjoint());
    assert!(!report.is_clean());
}

#[test]
fn test_missing_image_keeps_paragraph_intact() {
    let report = test_html_conf(
        r#"<p>before <img src="/no/such/file.png"> after</p>"#,
        "\
p[normal]
  run \"before\" {}
  run \" after\" {}
",
        |conf| conf,
    );
    assert_eq!(report.diagnostics().len(), 1);
    assert_eq!(report.diagnostics()[0].severity, Severity::Warning);
}

#[test]
fn test_remote_image_is_skipped() {
    let report = test_html_conf(
        r#"<p><img src="https://example.com/x.png"></p>"#,
        "\
p[normal]
",
        |conf| conf,
    );
    assert!(!report.is_clean());
}

#[test]
fn test_image_via_loader() {
    test_html_conf(
        r#"<p><img src="img/logo.png" alt="Logo" width="32" height="16"></p>"#,
        "\
p[normal]
  img 4B png alt=\"Logo\"
",
        |conf| conf.image_loader(MapLoader::with("img/logo.png", &[1, 2, 3, 4])),
    );
}

#[test]
fn test_images_can_be_disabled() {
    let report = test_html_conf(
        r#"<p><img src="/no/such/file.png"></p>"#,
        "\
p[normal]
",
        |conf| conf.include_images(false),
    );
    assert!(report.is_clean());
}

#[test]
fn test_img_without_source() {
    let report = test_html_conf(
        r#"<p>a<img alt="x"></p>"#,
        "\
p[normal]
  run \"a\" {}
",
        |conf| conf,
    );
    assert!(!report.is_clean());
}

#[test]
fn test_head_content_ignored() {
    test_html(
        "<html><head><title>T</title><style>p { color: red }</style></head>\
         <body><p>a</p></body></html>",
        "\
p[normal]
  run \"a\" {}
",
    );
}

#[test]
fn test_deep_nesting_is_capped_not_fatal() {
    let mut html = String::new();
    for _ in 0..400 {
        html.push_str("<div>");
    }
    html.push('x');
    let mut sink = RecordingSink::new();
    let report = config::standard().convert_string(&html, &mut sink).unwrap();
    assert!(!report.is_clean());
}

#[test]
fn test_docx_package_structure() {
    let mut document = DocxDocument::new();
    let report =
        add_html_to_document("<h1>Title</h1><p>Hello <b>world</b>!</p>", &mut document).unwrap();
    assert!(report.is_clean());
    let bytes = document.to_bytes().unwrap();
    let mut archive = zip::ZipArchive::new(std::io::Cursor::new(bytes)).unwrap();
    for name in [
        "[Content_Types].xml",
        "_rels/.rels",
        "word/document.xml",
        "word/_rels/document.xml.rels",
        "word/styles.xml",
    ] {
        assert!(archive.by_name(name).is_ok(), "missing {}", name);
    }
    let mut xml = String::new();
    archive
        .by_name("word/document.xml")
        .unwrap()
        .read_to_string(&mut xml)
        .unwrap();
    assert!(xml.contains(r#"<w:pStyle w:val="Heading1"/>"#));
    assert!(xml.contains("Title"));
    assert!(xml.contains("<w:b/>"));
    assert!(xml.contains("world"));
}

#[test]
fn test_docx_hyperlink_relationship() {
    let mut document = DocxDocument::new();
    add_html_to_document(
        r#"<p><a href="https://example.com/">site</a></p>"#,
        &mut document,
    )
    .unwrap();
    let bytes = document.to_bytes().unwrap();
    let mut archive = zip::ZipArchive::new(std::io::Cursor::new(bytes)).unwrap();

    let mut xml = String::new();
    archive
        .by_name("word/document.xml")
        .unwrap()
        .read_to_string(&mut xml)
        .unwrap();
    assert!(xml.contains("<w:hyperlink r:id=\"rId2\">"));

    let mut rels = String::new();
    archive
        .by_name("word/_rels/document.xml.rels")
        .unwrap()
        .read_to_string(&mut rels)
        .unwrap();
    assert!(rels.contains("https://example.com/"));
}

#[test]
fn test_docx_table_merge_markup() {
    let mut document = DocxDocument::new();
    add_html_to_document(
        r#"<table><tr><td rowspan="2">a</td><td colspan="2">b</td></tr>
           <tr><td>c</td><td>d</td></tr></table>"#,
        &mut document,
    )
    .unwrap();
    let bytes = document.to_bytes().unwrap();
    let mut archive = zip::ZipArchive::new(std::io::Cursor::new(bytes)).unwrap();
    let mut xml = String::new();
    archive
        .by_name("word/document.xml")
        .unwrap()
        .read_to_string(&mut xml)
        .unwrap();
    assert!(xml.contains(r#"<w:vMerge w:val="restart"/>"#));
    assert!(xml.contains("<w:vMerge/>"));
    assert!(xml.contains(r#"<w:gridSpan w:val="2"/>"#));
}

#[test]
fn test_docx_nested_table_cell_ends_with_paragraph() {
    let mut document = DocxDocument::new();
    add_html_to_document(
        "<table><tr><td><table><tr><td>x</td></tr></table></td></tr></table>",
        &mut document,
    )
    .unwrap();
    let bytes = document.to_bytes().unwrap();
    let mut archive = zip::ZipArchive::new(std::io::Cursor::new(bytes)).unwrap();
    let mut xml = String::new();
    archive
        .by_name("word/document.xml")
        .unwrap()
        .read_to_string(&mut xml)
        .unwrap();
    // A cell body ending in a nested table must still close with a
    // paragraph, or Word reports the package as corrupt.
    assert!(xml.contains("</w:tbl><w:p/></w:tc>"));
}

#[test]
fn test_docx_escapes_markup_characters() {
    let mut document = DocxDocument::new();
    add_html_to_document("<p>a &lt; b &amp; c</p>", &mut document).unwrap();
    let bytes = document.to_bytes().unwrap();
    let mut archive = zip::ZipArchive::new(std::io::Cursor::new(bytes)).unwrap();
    let mut xml = String::new();
    archive
        .by_name("word/document.xml")
        .unwrap()
        .read_to_string(&mut xml)
        .unwrap();
    assert!(xml.contains("a &lt; b &amp; c"));
}

#[test]
fn test_append_to_existing_document() {
    let mut document = DocxDocument::new();
    add_html_to_document("<p>first</p>", &mut document).unwrap();
    add_html_to_document("<p>second</p>", &mut document).unwrap();
    let bytes = document.to_bytes().unwrap();
    let mut archive = zip::ZipArchive::new(std::io::Cursor::new(bytes)).unwrap();
    let mut xml = String::new();
    archive
        .by_name("word/document.xml")
        .unwrap()
        .read_to_string(&mut xml)
        .unwrap();
    let first = xml.find("first").unwrap();
    let second = xml.find("second").unwrap();
    assert!(first < second);
}

#[test]
fn test_docx_page_break() {
    use crate::DocumentSink;

    let mut document = DocxDocument::new();
    add_html_to_document("<p>a</p>", &mut document).unwrap();
    document.page_break().unwrap();
    add_html_to_document("<p>b</p>", &mut document).unwrap();
    let bytes = document.to_bytes().unwrap();
    let mut archive = zip::ZipArchive::new(std::io::Cursor::new(bytes)).unwrap();
    let mut xml = String::new();
    archive
        .by_name("word/document.xml")
        .unwrap()
        .read_to_string(&mut xml)
        .unwrap();
    assert!(xml.contains(r#"<w:br w:type="page"/>"#));
}

#[test]
fn test_parse_exposes_tree() {
    let tree = crate::parse("<p>x</p>".as_bytes()).unwrap();
    assert!(matches!(tree.root(), crate::DocNode::Container(_)));
}
