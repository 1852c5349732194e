use time::OffsetDateTime;

use crate::models::{Presentation, Slide, SlideLayout, Template, Transition};

/** \brief 新增投影片的預設標題。 */
pub const DEFAULT_SLIDE_TITLE: &str = "New Slide";
/** \brief 新增投影片的預設內容。 */
pub const DEFAULT_SLIDE_CONTENT: &str = "Your content here.";
/** \brief 「新增條目」插入的預設字串。 */
pub const DEFAULT_BULLET_TEXT: &str = "New bullet point.";

/**
 * \brief 產生不重複的投影片識別碼。
 * \details 毫秒時戳加單調序號；序號只增不減，刪除後的 id 不會被重用。
 */
fn new_slide_id(seq: u64) -> String {
    let millis = OffsetDateTime::now_utc().unix_timestamp_nanos() / 1_000_000;
    format!("slide-{}-{}", seq, millis)
}

/**
 * \brief `update_slide` 的部分欄位集合；`None` 表示該欄位不動。
 * \details 圖片與轉場為雙層 Option：外層 None 不動、內層 None 清除。
 */
#[derive(Debug, Default, Clone)]
pub struct SlidePatch {
    pub title: Option<String>,
    pub content: Option<Vec<String>>,
    pub layout: Option<SlideLayout>,
    pub image_url: Option<Option<String>>,
    pub transition: Option<Option<Transition>>,
}

impl SlidePatch {
    pub fn title(text: impl Into<String>) -> SlidePatch {
        SlidePatch {
            title: Some(text.into()),
            ..SlidePatch::default()
        }
    }

    pub fn content(points: Vec<String>) -> SlidePatch {
        SlidePatch {
            content: Some(points),
            ..SlidePatch::default()
        }
    }

    pub fn image(url: Option<String>) -> SlidePatch {
        SlidePatch {
            image_url: Some(url),
            ..SlidePatch::default()
        }
    }
}

/**
 * \brief 重新排序後選取索引的調整規則（純函式）。
 * \details 選中被拖曳的那張就跟到目的地；落在閉合缺口之間的索引往缺口
 *          方向移一格；其餘不變。
 */
pub fn adjust_selection(from: usize, to: usize, selected: usize) -> usize {
    if selected == from {
        to
    } else if selected > from && selected <= to {
        selected - 1
    } else if selected < from && selected >= to {
        selected + 1
    } else {
        selected
    }
}

/**
 * \brief 雙欄版面的分割規則：左欄取前 ceil(n/2) 條，右欄取其餘。
 * \details 分割點隨內容長度即時重算，不持久化欄位歸屬。
 */
pub fn split_columns(content: &[String]) -> (&[String], &[String]) {
    let mid = content.len().div_ceil(2);
    content.split_at(mid)
}

/** \brief 雙欄版面：欄內索引換算回扁平序列的絕對索引。 */
pub fn column_to_absolute(content_len: usize, right_column: bool, local_index: usize) -> usize {
    if right_column {
        content_len.div_ceil(2) + local_index
    } else {
        local_index
    }
}

/**
 * \brief 簡報編輯狀態機：簡報本體的權威可變模型。
 * \details 每次變更整體替換 slides 序列（copy-on-write），觀察者比較
 *          簡報身份即可察覺變化。本地非法轉換（刪到空、索引越界）
 *          一律靜默拒絕。
 */
#[derive(Debug, Clone)]
pub struct DeckEditor {
    presentation: Presentation,
    selected: usize,
    id_seq: u64,
}

impl DeckEditor {
    /**
     * \brief 以確認後的大綱與選定範本建立編輯器。
     */
    pub fn new(title: impl Into<String>, slides: Vec<Slide>, template: Template) -> DeckEditor {
        let id_seq = slides.len() as u64;
        DeckEditor {
            presentation: Presentation {
                title: title.into(),
                slides,
                template,
            },
            selected: 0,
            id_seq,
        }
    }

    pub fn from_presentation(presentation: Presentation) -> DeckEditor {
        let id_seq = presentation.slides.len() as u64;
        DeckEditor {
            presentation,
            selected: 0,
            id_seq,
        }
    }

    pub fn presentation(&self) -> &Presentation {
        &self.presentation
    }

    /** \brief 匯出用的不可變快照。 */
    pub fn snapshot(&self) -> Presentation {
        self.presentation.clone()
    }

    pub fn slides(&self) -> &[Slide] {
        &self.presentation.slides
    }

    pub fn slide(&self, index: usize) -> Option<&Slide> {
        self.presentation.slides.get(index)
    }

    pub fn selected_index(&self) -> usize {
        self.selected
    }

    pub fn selected_slide(&self) -> &Slide {
        &self.presentation.slides[self.selected]
    }

    /** \brief 選取某張投影片；越界時夾到最後一張。 */
    pub fn select(&mut self, index: usize) {
        self.selected = index.min(self.presentation.slides.len().saturating_sub(1));
    }

    /** \brief 取代簡報層級的標題。 */
    pub fn set_title(&mut self, title: impl Into<String>) {
        self.presentation.title = title.into();
    }

    pub fn set_template(&mut self, template: Template) {
        self.presentation.template = template;
    }

    /**
     * \brief 合併部分欄位到指定投影片；未提供的欄位不動。
     * \return 是否實際套用（索引越界時為 false）。
     */
    pub fn update_slide(&mut self, index: usize, patch: SlidePatch) -> bool {
        if index >= self.presentation.slides.len() {
            return false;
        }
        let mut slides = self.presentation.slides.clone();
        {
            let slide = &mut slides[index];
            if let Some(title) = patch.title {
                slide.title = title;
            }
            if let Some(content) = patch.content {
                slide.content = content;
            }
            if let Some(layout) = patch.layout {
                slide.layout = layout;
            }
            if let Some(image_url) = patch.image_url {
                slide.image_url = image_url;
            }
            if let Some(transition) = patch.transition {
                slide.transition = transition;
            }
        }
        self.presentation.slides = slides;
        true
    }

    /**
     * \brief 把 `from` 的投影片移到 `to`，其餘依序遞補。
     * \details 選取索引依 `adjust_selection` 跟住同一張邏輯投影片。
     */
    pub fn reorder(&mut self, from: usize, to: usize) -> bool {
        let len = self.presentation.slides.len();
        if from >= len || to >= len {
            return false;
        }
        if from == to {
            return true;
        }
        let mut slides = self.presentation.slides.clone();
        let moved = slides.remove(from);
        slides.insert(to, moved);
        self.presentation.slides = slides;
        self.selected = adjust_selection(from, to, self.selected);
        true
    }

    /**
     * \brief 追加一張預設投影片並把選取移到新尾端。
     */
    pub fn add_slide(&mut self) -> &Slide {
        self.id_seq += 1;
        let slide = Slide {
            id: new_slide_id(self.id_seq),
            title: DEFAULT_SLIDE_TITLE.to_string(),
            content: vec![DEFAULT_SLIDE_CONTENT.to_string()],
            layout: SlideLayout::TitleContent,
            image_url: None,
            transition: None,
        };
        let mut slides = self.presentation.slides.clone();
        slides.push(slide);
        self.presentation.slides = slides;
        self.selected = self.presentation.slides.len() - 1;
        self.selected_slide()
    }

    /**
     * \brief 刪除指定投影片；簡報永遠不得變空，僅剩一張時拒絕。
     * \return 是否實際刪除。
     */
    pub fn delete_slide(&mut self, index: usize) -> bool {
        if self.presentation.slides.len() <= 1 || index >= self.presentation.slides.len() {
            return false;
        }
        let mut slides = self.presentation.slides.clone();
        slides.remove(index);
        self.presentation.slides = slides;
        self.selected = self.selected.saturating_sub(1);
        true
    }

    /** \brief 指派單張投影片的轉場，不波及其他張。 */
    pub fn set_transition(&mut self, index: usize, transition: Option<Transition>) -> bool {
        self.update_slide(
            index,
            SlidePatch {
                transition: Some(transition),
                ..SlidePatch::default()
            },
        )
    }

    /** \brief 取代單一內容條目。 */
    pub fn set_content_point(&mut self, index: usize, content_index: usize, text: String) -> bool {
        let Some(slide) = self.presentation.slides.get(index) else {
            return false;
        };
        if content_index >= slide.content.len() {
            return false;
        }
        let mut content = slide.content.clone();
        content[content_index] = text;
        self.update_slide(index, SlidePatch::content(content))
    }

    /** \brief 追加一條預設內容。 */
    pub fn add_content_point(&mut self, index: usize) -> bool {
        let Some(slide) = self.presentation.slides.get(index) else {
            return false;
        };
        let mut content = slide.content.clone();
        content.push(DEFAULT_BULLET_TEXT.to_string());
        self.update_slide(index, SlidePatch::content(content))
    }

    /** \brief 依索引刪除一條內容，其餘重新編號。 */
    pub fn delete_content_point(&mut self, index: usize, content_index: usize) -> bool {
        let Some(slide) = self.presentation.slides.get(index) else {
            return false;
        };
        if content_index >= slide.content.len() {
            return false;
        }
        let mut content = slide.content.clone();
        content.remove(content_index);
        self.update_slide(index, SlidePatch::content(content))
    }

    /**
     * \brief 優化結果寫回：`content_index == -1` 代表標題欄位。
     */
    pub fn apply_refined_text(&mut self, index: usize, content_index: isize, text: String) -> bool {
        if content_index < 0 {
            self.update_slide(index, SlidePatch::title(text))
        } else {
            self.set_content_point(index, content_index as usize, text)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::builtin_templates;

    fn deck(n: usize) -> DeckEditor {
        let slides = (0..n)
            .map(|i| Slide {
                id: format!("slide-{}", i),
                title: format!("Slide {}", i),
                content: vec![format!("point {}", i)],
                layout: SlideLayout::TitleContent,
                image_url: None,
                transition: None,
            })
            .collect();
        let template = builtin_templates().remove(0);
        DeckEditor::new("My AI Presentation", slides, template)
    }

    #[test]
    fn test_reorder_keeps_selected_logical_slide() {
        // 對小規模簡報窮舉所有 (from, to, selected) 組合。
        for n in 2..=6usize {
            for from in 0..n {
                for to in 0..n {
                    for sel in 0..n {
                        let mut editor = deck(n);
                        editor.select(sel);
                        let tracked = editor.slides()[sel].id.clone();
                        assert!(editor.reorder(from, to));
                        assert_eq!(
                            editor.selected_slide().id,
                            tracked,
                            "n={} from={} to={} sel={}",
                            n,
                            from,
                            to,
                            sel
                        );
                    }
                }
            }
        }
    }

    #[test]
    fn test_reorder_out_of_bounds_is_noop() {
        let mut editor = deck(3);
        assert!(!editor.reorder(0, 3));
        assert!(!editor.reorder(5, 1));
        assert_eq!(editor.slides().len(), 3);
        assert_eq!(editor.slides()[0].id, "slide-0");
    }

    #[test]
    fn test_delete_never_empties_the_deck() {
        let mut editor = deck(1);
        assert!(!editor.delete_slide(0));
        assert_eq!(editor.slides().len(), 1);
    }

    #[test]
    fn test_add_then_delete_selection() {
        let mut editor = deck(3);
        editor.add_slide();
        assert_eq!(editor.slides().len(), 4);
        assert_eq!(editor.selected_index(), 3);
        assert!(editor.delete_slide(3));
        assert_eq!(editor.slides().len(), 3);
        assert_eq!(editor.selected_index(), 2);
    }

    #[test]
    fn test_added_slide_ids_never_collide() {
        let mut editor = deck(2);
        let a = editor.add_slide().id.clone();
        assert!(editor.delete_slide(2));
        let b = editor.add_slide().id.clone();
        assert_ne!(a, b);
        let mut all: Vec<String> = editor.slides().iter().map(|s| s.id.clone()).collect();
        all.sort();
        all.dedup();
        assert_eq!(all.len(), editor.slides().len());
    }

    #[test]
    fn test_update_slide_merges_only_supplied_fields() {
        let mut editor = deck(2);
        assert!(editor.update_slide(1, SlidePatch::title("Revenue")));
        assert_eq!(editor.slides()[1].title, "Revenue");
        assert_eq!(editor.slides()[1].content, vec!["point 1".to_string()]);

        assert!(editor.update_slide(1, SlidePatch::image(Some("data:image/png;base64,AA".into()))));
        assert_eq!(editor.slides()[1].title, "Revenue");
        assert!(editor.slides()[1].image_url.is_some());

        // 清除圖片但不動其他欄位
        assert!(editor.update_slide(1, SlidePatch::image(None)));
        assert!(editor.slides()[1].image_url.is_none());
        assert_eq!(editor.slides()[1].title, "Revenue");

        assert!(!editor.update_slide(9, SlidePatch::title("nope")));
    }

    #[test]
    fn test_set_transition_targets_one_slide() {
        let mut editor = deck(3);
        assert!(editor.set_transition(1, Some(Transition::Fade)));
        assert_eq!(editor.slides()[1].transition, Some(Transition::Fade));
        assert_eq!(editor.slides()[0].transition, None);
        assert_eq!(editor.slides()[2].transition, None);
    }

    #[test]
    fn test_bullet_add_and_delete_reindexes() {
        let mut editor = deck(1);
        assert!(editor.add_content_point(0));
        assert_eq!(
            editor.slides()[0].content,
            vec!["point 0".to_string(), DEFAULT_BULLET_TEXT.to_string()]
        );
        assert!(editor.delete_content_point(0, 0));
        assert_eq!(editor.slides()[0].content, vec![DEFAULT_BULLET_TEXT.to_string()]);
        assert!(!editor.delete_content_point(0, 5));
    }

    #[test]
    fn test_two_column_split_reconstructs_content() {
        for n in 0..9usize {
            let content: Vec<String> = (0..n).map(|i| format!("c{}", i)).collect();
            let (left, right) = split_columns(&content);
            assert_eq!(left.len(), n.div_ceil(2));
            assert_eq!(right.len(), n / 2);
            let mut joined = left.to_vec();
            joined.extend_from_slice(right);
            assert_eq!(joined, content);
            for (i, _) in right.iter().enumerate() {
                assert_eq!(column_to_absolute(n, true, i), left.len() + i);
            }
            for (i, _) in left.iter().enumerate() {
                assert_eq!(column_to_absolute(n, false, i), i);
            }
        }
    }

    #[test]
    fn test_apply_refined_text_title_and_bullet() {
        let mut editor = deck(2);
        assert!(editor.apply_refined_text(0, -1, "Refined title".into()));
        assert_eq!(editor.slides()[0].title, "Refined title");
        assert!(editor.apply_refined_text(1, 0, "Refined point".into()));
        assert_eq!(editor.slides()[1].content[0], "Refined point");
        assert!(!editor.apply_refined_text(1, 7, "out of range".into()));
    }
}
