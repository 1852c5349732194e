use crate::models::{Presentation, Slide, Template};

/** \brief 建立簡報時的預設簡報標題。 */
pub const DEFAULT_PRESENTATION_TITLE: &str = "My AI Presentation";

/**
 * \brief 大綱審閱狀態：範本選擇前可編輯的投影片草稿序列。
 * \details 草稿編輯採寬鬆策略——越界的內容編輯靜默忽略；大綱階段的
 *          投影片尚未攜帶圖片與轉場。
 */
#[derive(Debug, Clone)]
pub struct OutlineDraft {
    slides: Vec<Slide>,
}

impl OutlineDraft {
    pub fn new(slides: Vec<Slide>) -> OutlineDraft {
        OutlineDraft { slides }
    }

    pub fn slides(&self) -> &[Slide] {
        &self.slides
    }

    pub fn len(&self) -> usize {
        self.slides.len()
    }

    pub fn is_empty(&self) -> bool {
        self.slides.is_empty()
    }

    /**
     * \brief 取代指定投影片的標題。
     * \details 越界屬呼叫端程式錯誤（UI 永遠供給合法索引），此處防禦性忽略。
     */
    pub fn set_title(&mut self, slide_index: usize, text: impl Into<String>) {
        debug_assert!(slide_index < self.slides.len(), "outline index out of bounds");
        if let Some(slide) = self.slides.get(slide_index) {
            let mut slides = self.slides.clone();
            slides[slide_index] = Slide {
                title: text.into(),
                ..slide.clone()
            };
            self.slides = slides;
        }
    }

    /**
     * \brief 取代單一內容條目；任何越界索引靜默忽略。
     */
    pub fn set_content_point(
        &mut self,
        slide_index: usize,
        content_index: usize,
        text: impl Into<String>,
    ) {
        let Some(slide) = self.slides.get(slide_index) else {
            return;
        };
        if content_index >= slide.content.len() {
            return;
        }
        let mut slides = self.slides.clone();
        let mut content = slide.content.clone();
        content[content_index] = text.into();
        slides[slide_index] = Slide {
            content,
            ..slide.clone()
        };
        self.slides = slides;
    }

    /**
     * \brief 發出目前的大綱序列（純投影，大綱本身不變）。
     */
    pub fn confirm(&self) -> Vec<Slide> {
        self.slides.clone()
    }

    /**
     * \brief 以選定範本把確認後的大綱升級為簡報。
     */
    pub fn promote(&self, template: Template) -> Presentation {
        Presentation {
            title: DEFAULT_PRESENTATION_TITLE.to_string(),
            slides: self.confirm(),
            template,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{builtin_templates, SlideLayout};

    fn draft() -> OutlineDraft {
        OutlineDraft::new(vec![
            Slide {
                id: "slide-0-1".into(),
                title: "Intro".into(),
                content: vec!["welcome".into()],
                layout: SlideLayout::TitleSlide,
                image_url: None,
                transition: None,
            },
            Slide {
                id: "slide-1-1".into(),
                title: "Numbers".into(),
                content: vec!["q1".into(), "q2".into()],
                layout: SlideLayout::TitleContent,
                image_url: None,
                transition: None,
            },
        ])
    }

    #[test]
    fn test_set_title_replaces_only_target() {
        let mut d = draft();
        d.set_title(1, "Quarterly numbers");
        assert_eq!(d.slides()[1].title, "Quarterly numbers");
        assert_eq!(d.slides()[0].title, "Intro");
    }

    #[test]
    fn test_set_content_point_out_of_bounds_is_silent() {
        let mut d = draft();
        d.set_content_point(1, 5, "nope");
        d.set_content_point(9, 0, "nope");
        assert_eq!(d.slides()[1].content, vec!["q1".to_string(), "q2".to_string()]);
        d.set_content_point(1, 1, "q2 flat");
        assert_eq!(d.slides()[1].content[1], "q2 flat");
    }

    #[test]
    fn test_confirm_is_pure_projection() {
        let d = draft();
        let emitted = d.confirm();
        assert_eq!(emitted.len(), 2);
        // 大綱自身不因 confirm 改變
        assert_eq!(d.len(), 2);
        assert_eq!(d.slides()[0].id, emitted[0].id);
    }

    #[test]
    fn test_promote_attaches_template_and_keeps_order() {
        let d = draft();
        let template = builtin_templates().remove(2);
        let presentation = d.promote(template.clone());
        assert_eq!(presentation.slides.len(), d.len());
        assert_eq!(presentation.template.id, template.id);
        assert_eq!(presentation.title, DEFAULT_PRESENTATION_TITLE);
    }
}
