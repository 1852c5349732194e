use std::path::{Path, PathBuf};

use crate::deck::split_columns;
use crate::error::{Error, Result};
use crate::models::{Presentation, Slide, SlideLayout};

pub mod pdf;
pub mod pptx;

/**
 * \brief 匯出目標格式。
 */
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExportFormat {
    Pdf,
    Pptx,
}

impl ExportFormat {
    pub fn parse(s: &str) -> Option<ExportFormat> {
        match s.to_ascii_lowercase().as_str() {
            "pdf" => Some(ExportFormat::Pdf),
            "pptx" => Some(ExportFormat::Pptx),
            _ => None,
        }
    }

    pub fn extension(&self) -> &'static str {
        match self {
            ExportFormat::Pdf => "pdf",
            ExportFormat::Pptx => "pptx",
        }
    }
}

/**
 * \brief 匯出檔名規則：簡報標題中的空白一律換成底線。
 */
pub fn export_filename(title: &str, extension: &str) -> String {
    format!("{}.{}", title.replace(' ', "_"), extension)
}

/**
 * \brief 把簡報快照匯出成檔案，回傳寫出的路徑。
 * \details 對編輯中狀態無副作用；轉接器失敗以 Export 分類回報。
 */
pub fn export_presentation(
    presentation: &Presentation,
    format: ExportFormat,
    out_dir: &Path,
) -> Result<PathBuf> {
    let bytes = match format {
        ExportFormat::Pdf => pdf::render_pdf(presentation)?,
        ExportFormat::Pptx => pptx::render_pptx(presentation)?,
    };
    let path = out_dir.join(export_filename(&presentation.title, format.extension()));
    std::fs::write(&path, bytes)?;
    Ok(path)
}

/**
 * \brief 版面幾何：一個待繪製的文字框，座標以英吋表示
 *        （頁面 10 × 5.625 吋，16:9）。
 */
#[derive(Debug, Clone)]
pub(crate) struct TextBox {
    pub x: f64,
    pub y: f64,
    pub w: f64,
    pub h: f64,
    pub font_size: u32,
    pub bold: bool,
    pub centered: bool,
    pub bullet: bool,
    pub color: Option<&'static str>,
    pub lines: Vec<String>,
}

impl TextBox {
    fn plain(x: f64, y: f64, w: f64, h: f64, font_size: u32, lines: Vec<String>) -> TextBox {
        TextBox {
            x,
            y,
            w,
            h,
            font_size,
            bold: false,
            centered: false,
            bullet: false,
            color: None,
            lines,
        }
    }
}

/**
 * \brief 依投影片版面產出文字框序列，兩種匯出格式共用。
 * \details BLANK 與未知情況沿用 TITLE_CONTENT 的座標；雙欄的左右欄
 *          依 `split_columns` 的即時分割。
 */
pub(crate) fn layout_text_boxes(slide: &Slide) -> Vec<TextBox> {
    let mut boxes = Vec::new();
    match slide.layout {
        SlideLayout::TitleSlide => {
            boxes.push(TextBox {
                bold: true,
                centered: true,
                ..TextBox::plain(0.5, 2.0, 9.0, 1.0, 44, vec![slide.title.clone()])
            });
            if let Some(subtitle) = slide.content.first() {
                boxes.push(TextBox {
                    centered: true,
                    ..TextBox::plain(0.5, 3.2, 9.0, 1.0, 24, vec![subtitle.clone()])
                });
            }
        }
        SlideLayout::SectionHeader => {
            boxes.push(TextBox {
                bold: true,
                centered: true,
                ..TextBox::plain(0.5, 2.5, 9.0, 1.0, 36, vec![slide.title.clone()])
            });
            if let Some(subtitle) = slide.content.first() {
                boxes.push(TextBox {
                    centered: true,
                    color: Some("666666"),
                    ..TextBox::plain(0.5, 3.5, 9.0, 1.0, 20, vec![subtitle.clone()])
                });
            }
        }
        SlideLayout::TwoColumn => {
            boxes.push(TextBox {
                bold: true,
                ..TextBox::plain(0.5, 0.2, 9.0, 0.75, 32, vec![slide.title.clone()])
            });
            let (left, right) = split_columns(&slide.content);
            if !left.is_empty() {
                boxes.push(TextBox {
                    bullet: true,
                    ..TextBox::plain(0.5, 1.0, 4.5, 4.0, 18, left.to_vec())
                });
            }
            if !right.is_empty() {
                boxes.push(TextBox {
                    bullet: true,
                    ..TextBox::plain(5.0, 1.0, 4.5, 4.0, 18, right.to_vec())
                });
            }
        }
        SlideLayout::TitleContent | SlideLayout::Blank => {
            boxes.push(TextBox {
                bold: true,
                ..TextBox::plain(0.5, 0.2, 9.0, 0.75, 32, vec![slide.title.clone()])
            });
            if !slide.content.is_empty() {
                boxes.push(TextBox {
                    bullet: true,
                    ..TextBox::plain(0.5, 1.0, 9.0, 4.0, 20, slide.content.clone())
                });
            }
        }
    }
    boxes.retain(|b| b.lines.iter().any(|l| !l.is_empty()));
    boxes
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{builtin_templates, Transition};

    pub(crate) fn sample_presentation() -> Presentation {
        Presentation {
            title: "Q3 Business Review".into(),
            slides: vec![
                Slide {
                    id: "slide-0".into(),
                    title: "Q3 Business Review".into(),
                    content: vec!["Numbers & <Narrative>".into()],
                    layout: SlideLayout::TitleSlide,
                    image_url: None,
                    transition: Some(Transition::Fade),
                },
                Slide {
                    id: "slide-1".into(),
                    title: "Wins vs Risks".into(),
                    content: vec!["win a".into(), "win b".into(), "risk a".into()],
                    layout: SlideLayout::TwoColumn,
                    image_url: None,
                    transition: None,
                },
                Slide {
                    id: "slide-2".into(),
                    title: "Next Steps".into(),
                    content: vec!["hire".into(), "ship".into()],
                    layout: SlideLayout::TitleContent,
                    image_url: None,
                    transition: None,
                },
            ],
            template: builtin_templates().remove(0),
        }
    }

    #[test]
    fn test_export_filename_replaces_spaces() {
        assert_eq!(
            export_filename("Q3 Business Review", "pdf"),
            "Q3_Business_Review.pdf"
        );
        assert_eq!(export_filename("one", "pptx"), "one.pptx");
    }

    #[test]
    fn test_format_parse() {
        assert_eq!(ExportFormat::parse("PDF"), Some(ExportFormat::Pdf));
        assert_eq!(ExportFormat::parse("pptx"), Some(ExportFormat::Pptx));
        assert_eq!(ExportFormat::parse("html"), None);
    }

    #[test]
    fn test_two_column_layout_splits_bullets() {
        let p = sample_presentation();
        let boxes = layout_text_boxes(&p.slides[1]);
        // 標題加兩欄
        assert_eq!(boxes.len(), 3);
        assert_eq!(boxes[1].lines, vec!["win a".to_string(), "win b".to_string()]);
        assert_eq!(boxes[2].lines, vec!["risk a".to_string()]);
        assert_eq!(boxes[2].x, 5.0);
    }

    #[test]
    fn test_title_slide_subtitle_is_optional() {
        let mut p = sample_presentation();
        p.slides[0].content.clear();
        let boxes = layout_text_boxes(&p.slides[0]);
        assert_eq!(boxes.len(), 1);
        assert!(boxes[0].centered && boxes[0].bold);
        assert_eq!(boxes[0].font_size, 44);
    }

    #[test]
    fn test_blank_layout_uses_default_geometry() {
        let mut p = sample_presentation();
        p.slides[2].layout = SlideLayout::Blank;
        let boxes = layout_text_boxes(&p.slides[2]);
        assert_eq!(boxes[0].font_size, 32);
        assert!(boxes[1].bullet);
    }
}
