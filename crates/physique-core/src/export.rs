//! PDF export of the full plan text.
//!
//! Pages are A4 with fixed margins, set in the built-in Helvetica font using
//! WinAnsi encoding. Characters outside Latin-1 are replaced with `?` unless
//! the strict policy is selected, in which case the export fails instead.

use std::fmt::Write as _;

use lopdf::{dictionary, Document, Object, Stream, StringFormat};
use tracing::{debug, info};

use crate::error::EncodingError;
use crate::plan::PlanDocument;

pub const EXPORT_FILE_NAME: &str = "Physique_Pro_Plan.pdf";
pub const EXPORT_MIME_TYPE: &str = "application/pdf";

const MM_TO_PT: f32 = 72.0 / 25.4;
const PAGE_WIDTH_MM: f32 = 210.0;
const PAGE_HEIGHT_MM: f32 = 297.0;
const REPLACEMENT: char = '?';

/// Helvetica advance widths for 0x20..=0x7E, in 1/1000 em.
const HELVETICA_WIDTHS: [u16; 95] = [
    278, 278, 355, 556, 556, 889, 667, 191, 333, 333, 389, 584, 278, 333, 278, 278, // 0x20
    556, 556, 556, 556, 556, 556, 556, 556, 556, 556, 278, 278, 584, 584, 584, 556, // 0x30
    1015, 667, 667, 722, 722, 667, 611, 778, 722, 278, 500, 667, 556, 833, 722, 778, // 0x40
    667, 778, 722, 667, 611, 722, 667, 944, 667, 667, 611, 278, 278, 278, 469, 556, // 0x50
    333, 556, 556, 500, 556, 556, 278, 556, 556, 222, 222, 500, 222, 833, 556, 556, // 0x60
    556, 556, 333, 500, 278, 556, 500, 722, 500, 500, 500, 334, 260, 334, 584, // 0x70
];
const DEFAULT_WIDTH: u16 = 556;

/// What to do with characters the document font cannot show.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SubstitutionPolicy {
    /// Replace with `?` silently.
    #[default]
    Replace,
    /// Fail with [`EncodingError::UnsupportedCharacter`].
    Strict,
}

#[derive(Debug, Clone)]
pub struct ExportOptions {
    pub policy: SubstitutionPolicy,
    pub font_size_pt: f32,
    pub line_height_mm: f32,
    pub margin_mm: f32,
    pub title: String,
}

impl Default for ExportOptions {
    fn default() -> Self {
        Self {
            policy: SubstitutionPolicy::Replace,
            font_size_pt: 12.0,
            line_height_mm: 10.0,
            margin_mm: 20.0,
            title: "Physique Pro Plan".to_string(),
        }
    }
}

impl ExportOptions {
    fn text_width_pt(&self) -> f32 {
        (PAGE_WIDTH_MM - 2.0 * self.margin_mm) * MM_TO_PT
    }

    fn lines_per_page(&self) -> usize {
        let usable = PAGE_HEIGHT_MM - 2.0 * self.margin_mm;
        ((usable / self.line_height_mm).floor() as usize).max(1)
    }
}

pub fn render_document(plan: &PlanDocument) -> Result<Vec<u8>, EncodingError> {
    render_document_with(plan, &ExportOptions::default())
}

pub fn render_document_with(plan: &PlanDocument, options: &ExportOptions) -> Result<Vec<u8>, EncodingError> {
    let text = to_latin1(plan.text(), options.policy)?;
    let lines = wrap_text(&text, options.text_width_pt(), options.font_size_pt);
    let pages: Vec<&[String]> = lines.chunks(options.lines_per_page()).collect();
    debug!(lines = lines.len(), pages = pages.len(), "laid out plan document");

    let bytes = write_pdf(&pages, options)?;
    info!(bytes = bytes.len(), "rendered plan document");
    Ok(bytes)
}

fn is_encodable(ch: char) -> bool {
    matches!(ch as u32, 0x20..=0x7E | 0xA0..=0xFF)
}

/// Map `text` onto the Latin-1 printable range according to `policy`.
pub fn to_latin1(text: &str, policy: SubstitutionPolicy) -> Result<String, EncodingError> {
    let mut out = String::with_capacity(text.len());
    for (offset, ch) in text.char_indices() {
        match ch {
            '\n' => out.push('\n'),
            '\r' => {}
            '\t' => out.push_str("    "),
            c if is_encodable(c) => out.push(c),
            c => match policy {
                SubstitutionPolicy::Replace => out.push(REPLACEMENT),
                SubstitutionPolicy::Strict => {
                    return Err(EncodingError::UnsupportedCharacter { ch: c, offset });
                }
            },
        }
    }
    Ok(out)
}

fn char_width(ch: char, font_size: f32) -> f32 {
    let units = match ch as u32 {
        code @ 0x20..=0x7E => HELVETICA_WIDTHS[(code - 0x20) as usize],
        _ => DEFAULT_WIDTH,
    };
    f32::from(units) * font_size / 1000.0
}

pub fn text_width(text: &str, font_size: f32) -> f32 {
    text.chars().map(|c| char_width(c, font_size)).sum()
}

/// Greedy word wrap. Explicit newlines always break; words wider than a
/// line are split by character.
pub fn wrap_text(text: &str, max_width: f32, font_size: f32) -> Vec<String> {
    let mut lines = Vec::new();
    for paragraph in text.split('\n') {
        wrap_paragraph(paragraph, max_width, font_size, &mut lines);
    }
    lines
}

fn wrap_paragraph(paragraph: &str, max_width: f32, font_size: f32, lines: &mut Vec<String>) {
    let space_width = char_width(' ', font_size);
    let mut line = String::new();
    let mut line_width = 0.0;

    for (i, word) in paragraph.split(' ').enumerate() {
        let word_width = text_width(word, font_size);
        let gap = if i == 0 { 0.0 } else { space_width };

        if line_width + gap + word_width <= max_width {
            if i > 0 {
                line.push(' ');
            }
            line.push_str(word);
            line_width += gap + word_width;
            continue;
        }

        if !line.is_empty() {
            lines.push(std::mem::take(&mut line));
            line_width = 0.0;
        }

        for ch in word.chars() {
            let w = char_width(ch, font_size);
            if line_width + w > max_width && !line.is_empty() {
                lines.push(std::mem::take(&mut line));
                line_width = 0.0;
            }
            line.push(ch);
            line_width += w;
        }
    }

    lines.push(line);
}

fn hex_latin1(line: &str) -> String {
    let mut hex = String::with_capacity(line.len() * 2);
    for ch in line.chars() {
        // to_latin1 guarantees every char fits in one byte
        let byte = u8::try_from(ch as u32).unwrap_or(b'?');
        let _ = write!(hex, "{:02X}", byte);
    }
    hex
}

fn page_content(lines: &[String], options: &ExportOptions) -> Vec<u8> {
    let page_height = PAGE_HEIGHT_MM * MM_TO_PT;
    let left = options.margin_mm * MM_TO_PT;
    let line_height = options.line_height_mm * MM_TO_PT;
    // Baseline sits in the middle of each line cell, nudged down by 30% of the font size.
    let first_baseline = page_height - options.margin_mm * MM_TO_PT - 0.5 * line_height - 0.3 * options.font_size_pt;

    let mut content = String::new();
    for (i, line) in lines.iter().enumerate() {
        if line.is_empty() {
            continue;
        }
        let y = first_baseline - i as f32 * line_height;
        let _ = writeln!(
            content,
            "BT /F1 {:.2} Tf {:.2} {:.2} Td <{}> Tj ET",
            options.font_size_pt,
            left,
            y,
            hex_latin1(line)
        );
    }
    content.into_bytes()
}

fn write_pdf(pages: &[&[String]], options: &ExportOptions) -> Result<Vec<u8>, EncodingError> {
    let mut doc = Document::with_version("1.5");
    let pages_id = doc.new_object_id();

    let font_id = doc.add_object(dictionary! {
        "Type" => "Font",
        "Subtype" => "Type1",
        "BaseFont" => "Helvetica",
        "Encoding" => "WinAnsiEncoding",
    });
    let resources_id = doc.add_object(dictionary! {
        "Font" => dictionary! {
            "F1" => font_id,
        },
    });

    // An empty plan still produces one blank page.
    let empty: [String; 0] = [];
    let page_lines: Vec<&[String]> = if pages.is_empty() { vec![&empty[..]] } else { pages.to_vec() };

    let mut kids: Vec<Object> = Vec::with_capacity(page_lines.len());
    for lines in &page_lines {
        let content_id = doc.add_object(Stream::new(dictionary! {}, page_content(lines, options)));
        let page_id = doc.add_object(dictionary! {
            "Type" => "Page",
            "Parent" => pages_id,
            "Contents" => content_id,
        });
        kids.push(page_id.into());
    }

    let count = kids.len() as i64;
    let pages_dict = dictionary! {
        "Type" => "Pages",
        "Kids" => kids,
        "Count" => Object::Integer(count),
        "Resources" => resources_id,
        "MediaBox" => vec![
            Object::Integer(0),
            Object::Integer(0),
            Object::Integer((PAGE_WIDTH_MM * MM_TO_PT).round() as i64),
            Object::Integer((PAGE_HEIGHT_MM * MM_TO_PT).round() as i64),
        ],
    };
    doc.objects.insert(pages_id, Object::Dictionary(pages_dict));

    let catalog_id = doc.add_object(dictionary! {
        "Type" => "Catalog",
        "Pages" => pages_id,
    });
    let info_id = doc.add_object(dictionary! {
        "Title" => Object::String(options.title.as_bytes().to_vec(), StringFormat::Literal),
        "Producer" => Object::String(b"Physique Pro".to_vec(), StringFormat::Literal),
    });
    doc.trailer.set("Root", catalog_id);
    doc.trailer.set("Info", info_id);
    doc.compress();

    let mut bytes = Vec::new();
    doc.save_to(&mut bytes)
        .map_err(|e| EncodingError::Pdf(e.to_string()))?;
    Ok(bytes)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn page_count(bytes: &[u8]) -> usize {
        Document::load_mem(bytes).unwrap().get_pages().len()
    }

    #[test]
    fn test_replace_policy_substitutes() {
        let text = to_latin1("Café 💪 – done", SubstitutionPolicy::Replace).unwrap();
        assert_eq!(text, "Café ? ? done");
    }

    #[test]
    fn test_strict_policy_reports_offset() {
        let err = to_latin1("ok 💪", SubstitutionPolicy::Strict).unwrap_err();
        assert!(matches!(err, EncodingError::UnsupportedCharacter { ch: '💪', offset: 3 }));
    }

    #[test]
    fn test_control_characters() {
        let text = to_latin1("a\r\nb\tc\u{7}", SubstitutionPolicy::Replace).unwrap();
        assert_eq!(text, "a\nb    c?");
    }

    #[test]
    fn test_wrap_respects_width() {
        let text = "lorem ipsum dolor sit amet ".repeat(20);
        let max = 200.0;
        let lines = wrap_text(text.trim(), max, 12.0);
        assert!(lines.len() > 1);
        for line in &lines {
            assert!(text_width(line, 12.0) <= max, "line too wide: {line}");
        }
        assert_eq!(lines.join(" "), text.trim());
    }

    #[test]
    fn test_wrap_keeps_blank_lines() {
        let lines = wrap_text("one\n\ntwo", 500.0, 12.0);
        assert_eq!(lines, vec!["one", "", "two"]);
    }

    #[test]
    fn test_wrap_splits_long_word() {
        let word = "x".repeat(100);
        let lines = wrap_text(&word, 60.0, 12.0);
        assert!(lines.len() > 1);
        assert_eq!(lines.concat(), word);
    }

    #[test]
    fn test_render_produces_pdf() {
        let plan = PlanDocument::new("### Diet Plan\nEat Y\n### Workout Plan\nDo Z");
        let bytes = render_document(&plan).unwrap();
        assert!(bytes.starts_with(b"%PDF-1.5"));
        assert_eq!(page_count(&bytes), 1);
    }

    #[test]
    fn test_long_plan_flows_onto_more_pages() {
        let options = ExportOptions::default();
        let body: Vec<String> = (0..(options.lines_per_page() * 2 + 3)).map(|i| format!("Line {i}")).collect();
        let plan = PlanDocument::new(body.join("\n"));

        let bytes = render_document(&plan).unwrap();
        assert_eq!(page_count(&bytes), 3);
    }

    #[test]
    fn test_empty_plan_has_one_page() {
        let bytes = render_document(&PlanDocument::new("")).unwrap();
        assert_eq!(page_count(&bytes), 1);
    }

    #[test]
    fn test_strict_export_fails_on_emoji() {
        let options = ExportOptions {
            policy: SubstitutionPolicy::Strict,
            ..ExportOptions::default()
        };
        let result = render_document_with(&PlanDocument::new("Great work 🏋️"), &options);
        assert!(matches!(result, Err(EncodingError::UnsupportedCharacter { .. })));
    }

    #[test]
    fn test_a4_defaults() {
        let options = ExportOptions::default();
        assert_eq!(options.lines_per_page(), 25);
        assert!((options.text_width_pt() - 481.89).abs() < 0.1);
    }

    /// Text shown by the `Tj` operators of page 1, one entry per line.
    fn first_page_lines(bytes: &[u8]) -> (String, Vec<String>) {
        let mut doc = Document::load_mem(bytes).unwrap();
        doc.decompress();
        let page_id = *doc.get_pages().get(&1).unwrap();
        let content = String::from_utf8(doc.get_page_content(page_id).unwrap()).unwrap();

        let lines = content
            .split('<')
            .skip(1)
            .map(|rest| {
                let hex = &rest[..rest.find('>').unwrap()];
                (0..hex.len())
                    .step_by(2)
                    .map(|i| char::from(u8::from_str_radix(&hex[i..i + 2], 16).unwrap()))
                    .collect::<String>()
            })
            .collect();
        (content, lines)
    }

    #[test]
    fn test_page_holds_wrapped_plan_text() {
        let body = "Eat oats, eggs and greens every morning before training ".repeat(6);
        let plan = PlanDocument::new(format!("### Diet Plan\n{}\nStay strong 💪", body.trim()));

        let (content, lines) = first_page_lines(&render_document(&plan).unwrap());

        assert_eq!(lines[0], "### Diet Plan");
        assert!(lines.len() > 3, "body should wrap onto several lines");
        let words: Vec<&str> = lines[1..].iter().flat_map(|l| l.split(' ')).collect();
        let expected: Vec<&str> = body.split_whitespace().chain(["Stay", "strong", "?"]).collect();
        assert_eq!(words, expected);

        let first_td = content.lines().find(|l| l.contains(" Td ")).unwrap();
        assert!(first_td.contains("Tf 56.69 "), "left margin is 20 mm: {first_td}");
    }

    #[test]
    fn test_hex_encoding_uses_latin1_bytes() {
        assert_eq!(hex_latin1("é("), "E928");
    }
}
