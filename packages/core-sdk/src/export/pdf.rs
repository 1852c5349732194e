use lopdf::content::{Content, Operation};
use lopdf::{dictionary, Document, Object, Stream};

use crate::error::{Error, Result};
use crate::export::{layout_text_boxes, TextBox};
use crate::models::{Presentation, Slide};

/** \brief 頁面尺寸：1280×720 橫向，與編輯預覽同長寬比。 */
const PAGE_WIDTH: f64 = 1280.0;
const PAGE_HEIGHT: f64 = 720.0;
/** \brief 版面座標以英吋表示，頁寬 10 吋。 */
const PX_PER_INCH: f64 = 128.0;

/**
 * \brief 把簡報快照繪成 PDF，一張投影片一頁、順序一致。
 */
pub fn render_pdf(presentation: &Presentation) -> Result<Vec<u8>> {
    let mut doc = Document::with_version("1.5");
    let pages_id = doc.new_object_id();
    let font_id = doc.add_object(dictionary! {
        "Type" => "Font",
        "Subtype" => "Type1",
        "BaseFont" => "Helvetica",
    });
    let bold_font_id = doc.add_object(dictionary! {
        "Type" => "Font",
        "Subtype" => "Type1",
        "BaseFont" => "Helvetica-Bold",
    });
    let resources_id = doc.add_object(dictionary! {
        "Font" => dictionary! {
            "F1" => font_id,
            "F2" => bold_font_id,
        },
    });

    let mut kids: Vec<Object> = Vec::new();
    for slide in &presentation.slides {
        let content = slide_content(slide);
        let encoded = content
            .encode()
            .map_err(|e| Error::Export(format!("pdf content: {}", e)))?;
        let stream_id = doc.add_object(Stream::new(dictionary! {}, encoded));
        let page_id = doc.add_object(dictionary! {
            "Type" => "Page",
            "Parent" => pages_id,
            "Contents" => stream_id,
        });
        kids.push(page_id.into());
    }

    let count = kids.len() as i64;
    doc.objects.insert(
        pages_id,
        Object::Dictionary(dictionary! {
            "Type" => "Pages",
            "Kids" => kids,
            "Count" => count,
            "Resources" => resources_id,
            "MediaBox" => vec![0.into(), 0.into(), PAGE_WIDTH.into(), PAGE_HEIGHT.into()],
        }),
    );
    let catalog_id = doc.add_object(dictionary! {
        "Type" => "Catalog",
        "Pages" => pages_id,
    });
    doc.trailer.set("Root", catalog_id);
    doc.compress();

    let mut out = Vec::new();
    doc.save_to(&mut out)
        .map_err(|e| Error::Export(format!("pdf save: {}", e)))?;
    Ok(out)
}

fn slide_content(slide: &Slide) -> Content {
    let mut operations = Vec::new();
    for text_box in layout_text_boxes(slide) {
        operations.extend(text_box_operations(&text_box));
    }
    Content { operations }
}

fn text_box_operations(text_box: &TextBox) -> Vec<Operation> {
    let size = f64::from(text_box.font_size);
    let leading = size * 1.5;
    let font = if text_box.bold { "F2" } else { "F1" };
    let (r, g, b) = color_components(text_box.color);

    let mut ops = vec![
        Operation::new("BT", vec![]),
        Operation::new("Tf", vec![font.into(), size.into()]),
        Operation::new("rg", vec![r.into(), g.into(), b.into()]),
    ];
    // PDF 座標原點在左下；版面座標自上而下
    let mut baseline = PAGE_HEIGHT - text_box.y * PX_PER_INCH - size;
    for line in &text_box.lines {
        let line = if text_box.bullet {
            format!("- {}", line)
        } else {
            line.clone()
        };
        let x = line_x(text_box, &line, size);
        ops.push(Operation::new(
            "Tm",
            vec![
                1.into(),
                0.into(),
                0.into(),
                1.into(),
                x.into(),
                baseline.into(),
            ],
        ));
        ops.push(Operation::new("Tj", vec![Object::string_literal(line)]));
        baseline -= leading;
    }
    ops.push(Operation::new("ET", vec![]));
    ops
}

/** \brief 置中以平均字寬 0.5em 估算，靠左則直接用框的左緣。 */
fn line_x(text_box: &TextBox, line: &str, size: f64) -> f64 {
    let left = text_box.x * PX_PER_INCH;
    if !text_box.centered {
        return left;
    }
    let approx_width = 0.5 * size * line.chars().count() as f64;
    let center = (text_box.x + text_box.w / 2.0) * PX_PER_INCH;
    (center - approx_width / 2.0).max(left)
}

fn color_components(color: Option<&str>) -> (f64, f64, f64) {
    let Some(hex) = color else {
        return (0.0, 0.0, 0.0);
    };
    if hex.len() != 6 {
        return (0.0, 0.0, 0.0);
    }
    let channel = |range: std::ops::Range<usize>| {
        u8::from_str_radix(&hex[range], 16)
            .map(|v| f64::from(v) / 255.0)
            .unwrap_or(0.0)
    };
    (channel(0..2), channel(2..4), channel(4..6))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::export::tests::sample_presentation;

    #[test]
    fn test_pdf_has_one_page_per_slide_in_order() {
        let p = sample_presentation();
        let bytes = render_pdf(&p).expect("renders");
        let doc = Document::load_mem(&bytes).expect("valid pdf");
        assert_eq!(doc.get_pages().len(), p.slides.len());
        let last_page = *doc.get_pages().keys().max().expect("pages");
        let text = doc.extract_text(&[last_page]).expect("text");
        assert!(text.contains("Next Steps"));
    }

    #[test]
    fn test_pdf_pages_are_landscape_1280x720() {
        let p = sample_presentation();
        let bytes = render_pdf(&p).expect("renders");
        assert!(bytes.windows(4).any(|w| w == b"1280"));
        let doc = Document::load_mem(&bytes).expect("valid pdf");
        assert!(!doc.get_pages().is_empty());
    }

    #[test]
    fn test_color_components_parse_hex() {
        assert_eq!(color_components(None), (0.0, 0.0, 0.0));
        let (r, g, b) = color_components(Some("666666"));
        assert!((r - 0.4).abs() < 0.01);
        assert_eq!(r, g);
        assert_eq!(g, b);
    }
}
