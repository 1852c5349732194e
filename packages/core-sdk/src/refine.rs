use crate::deck::{DeckEditor, SlidePatch};
use crate::error::{Error, Result};

/**
 * \brief 優化目標：`content_index == -1` 代表投影片標題，其餘為內容條目。
 */
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RefineTarget {
    pub slide_index: usize,
    pub content_index: isize,
}

impl RefineTarget {
    pub fn title(slide_index: usize) -> RefineTarget {
        RefineTarget {
            slide_index,
            content_index: -1,
        }
    }

    pub fn bullet(slide_index: usize, content_index: usize) -> RefineTarget {
        RefineTarget {
            slide_index,
            content_index: content_index as isize,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DialogState {
    /** \brief 等待遠端結果，preview 為遞增中的部分文字 */
    Pending,
    /** \brief 最終結果已落定，等待使用者接受或放棄 */
    Settled,
    /** \brief 遠端失敗，對話停留在錯誤訊息上 */
    Failed(String),
}

/**
 * \brief 優化對話：持有暫態 preview，結束前由使用者決定接受或放棄。
 */
#[derive(Debug, Clone)]
pub struct RefineDialog {
    seq: u64,
    target: RefineTarget,
    original: String,
    preview: String,
    state: DialogState,
}

impl RefineDialog {
    pub fn seq(&self) -> u64 {
        self.seq
    }

    pub fn target(&self) -> RefineTarget {
        self.target
    }

    pub fn original(&self) -> &str {
        &self.original
    }

    pub fn preview(&self) -> &str {
        &self.preview
    }

    pub fn state(&self) -> &DialogState {
        &self.state
    }

    pub fn is_settled(&self) -> bool {
        matches!(self.state, DialogState::Settled)
    }
}

/**
 * \brief 生圖對話：提示詞與目標投影片，成功後結果待使用者套用。
 */
#[derive(Debug, Clone)]
pub struct ImageDialog {
    seq: u64,
    slide_index: usize,
    prompt: String,
    image_url: Option<String>,
    state: DialogState,
}

impl ImageDialog {
    pub fn seq(&self) -> u64 {
        self.seq
    }

    pub fn slide_index(&self) -> usize {
        self.slide_index
    }

    pub fn prompt(&self) -> &str {
        &self.prompt
    }

    pub fn image_url(&self) -> Option<&str> {
        self.image_url.as_deref()
    }

    pub fn state(&self) -> &DialogState {
        &self.state
    }

    pub fn is_settled(&self) -> bool {
        matches!(self.state, DialogState::Settled)
    }
}

/**
 * \brief 對話協調器：一個編輯工作階段同時間至多一個優化對話、
 *        一個生圖對話。
 * \details 對話擁有自己的請求生命週期：每次開啟取得遞增序號，
 *          非同步結果只在「序號仍是目前開啟的對話」時套用；關閉
 *          即丟棄，遲到的結果一律忽略（discard-on-close）。
 */
#[derive(Debug, Default)]
pub struct DialogCoordinator {
    next_seq: u64,
    refine: Option<RefineDialog>,
    image: Option<ImageDialog>,
}

impl DialogCoordinator {
    pub fn new() -> DialogCoordinator {
        DialogCoordinator::default()
    }

    /**
     * \brief 開啟優化對話；已有開啟中的對話時拒絕。
     * \return 本次請求的序號，非同步驅動端憑此回填結果。
     */
    pub fn begin_refine(&mut self, target: RefineTarget, original: String) -> Result<u64> {
        if self.refine.is_some() {
            return Err(Error::DialogBusy);
        }
        self.next_seq += 1;
        self.refine = Some(RefineDialog {
            seq: self.next_seq,
            target,
            original,
            preview: String::new(),
            state: DialogState::Pending,
        });
        Ok(self.next_seq)
    }

    pub fn refine_dialog(&self) -> Option<&RefineDialog> {
        self.refine.as_ref()
    }

    /**
     * \brief 回填遞增中的部分文字；序號過期或對話已關閉時忽略。
     */
    pub fn push_refine_snapshot(&mut self, seq: u64, text: &str) {
        if let Some(dialog) = self.refine.as_mut() {
            if dialog.seq == seq && dialog.state == DialogState::Pending {
                dialog.preview = text.to_string();
            }
        }
    }

    /**
     * \brief 落定最終結果。最終值必定成為 preview，不殘留過期的部分文字。
     */
    pub fn settle_refine(&mut self, seq: u64, final_text: &str) {
        if let Some(dialog) = self.refine.as_mut() {
            if dialog.seq == seq {
                dialog.preview = final_text.trim().to_string();
                dialog.state = DialogState::Settled;
            }
        }
    }

    pub fn fail_refine(&mut self, seq: u64, message: String) {
        if let Some(dialog) = self.refine.as_mut() {
            if dialog.seq == seq {
                dialog.state = DialogState::Failed(message);
            }
        }
    }

    /**
     * \brief 關閉優化對話；未決的遠端結果之後到達也不再套用。
     */
    pub fn close_refine(&mut self) {
        self.refine = None;
    }

    /**
     * \brief 接受落定的優化結果並寫回指定欄位；對話隨之關閉。
     * \return 是否寫回成功（未落定或目標越界時為 false，簡報不變）。
     */
    pub fn accept_refine(&mut self, editor: &mut DeckEditor) -> bool {
        let Some(dialog) = self.refine.as_ref() else {
            return false;
        };
        if !dialog.is_settled() {
            return false;
        }
        let target = dialog.target;
        let text = dialog.preview.clone();
        let applied = editor.apply_refined_text(target.slide_index, target.content_index, text);
        self.refine = None;
        applied
    }

    /**
     * \brief 開啟生圖對話；已有開啟中的對話時拒絕。
     */
    pub fn begin_image(&mut self, slide_index: usize, prompt: String) -> Result<u64> {
        if self.image.is_some() {
            return Err(Error::DialogBusy);
        }
        self.next_seq += 1;
        self.image = Some(ImageDialog {
            seq: self.next_seq,
            slide_index,
            prompt,
            image_url: None,
            state: DialogState::Pending,
        });
        Ok(self.next_seq)
    }

    pub fn image_dialog(&self) -> Option<&ImageDialog> {
        self.image.as_ref()
    }

    pub fn settle_image(&mut self, seq: u64, image_url: String) {
        if let Some(dialog) = self.image.as_mut() {
            if dialog.seq == seq {
                dialog.image_url = Some(image_url);
                dialog.state = DialogState::Settled;
            }
        }
    }

    pub fn fail_image(&mut self, seq: u64, message: String) {
        if let Some(dialog) = self.image.as_mut() {
            if dialog.seq == seq {
                dialog.state = DialogState::Failed(message);
            }
        }
    }

    pub fn close_image(&mut self) {
        self.image = None;
    }

    /**
     * \brief 把落定的圖片寫入目標投影片的 `image_url`；失敗或未落定時
     *        投影片不受影響。
     */
    pub fn accept_image(&mut self, editor: &mut DeckEditor) -> bool {
        let Some(dialog) = self.image.as_ref() else {
            return false;
        };
        if !dialog.is_settled() {
            return false;
        }
        let Some(url) = dialog.image_url.clone() else {
            return false;
        };
        let index = dialog.slide_index;
        let applied = editor.update_slide(index, SlidePatch::image(Some(url)));
        self.image = None;
        applied
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{builtin_templates, Slide, SlideLayout};

    fn editor() -> DeckEditor {
        DeckEditor::new(
            "demo",
            vec![
                Slide {
                    id: "slide-0".into(),
                    title: "Original title".into(),
                    content: vec!["first point".into()],
                    layout: SlideLayout::TitleContent,
                    image_url: None,
                    transition: None,
                },
                Slide {
                    id: "slide-1".into(),
                    title: "Second".into(),
                    content: vec![],
                    layout: SlideLayout::TitleContent,
                    image_url: None,
                    transition: None,
                },
            ],
            builtin_templates().remove(0),
        )
    }

    #[test]
    fn test_second_refine_request_is_rejected() {
        let mut hub = DialogCoordinator::new();
        hub.begin_refine(RefineTarget::title(0), "Original title".into())
            .expect("first dialog opens");
        let second = hub.begin_refine(RefineTarget::bullet(1, 0), "x".into());
        assert!(matches!(second, Err(Error::DialogBusy)));
    }

    #[test]
    fn test_snapshots_then_final_value_wins() {
        let mut hub = DialogCoordinator::new();
        let seq = hub
            .begin_refine(RefineTarget::title(0), "Original title".into())
            .expect("dialog opens");
        hub.push_refine_snapshot(seq, "Better");
        hub.push_refine_snapshot(seq, "Better ti");
        assert_eq!(hub.refine_dialog().expect("open").preview(), "Better ti");
        hub.settle_refine(seq, "  Better title  ");
        let dialog = hub.refine_dialog().expect("open");
        assert!(dialog.is_settled());
        // 最終值覆蓋所有部分文字並去除多餘空白
        assert_eq!(dialog.preview(), "Better title");
    }

    #[test]
    fn test_accept_writes_back_and_closes() {
        let mut hub = DialogCoordinator::new();
        let mut ed = editor();
        let seq = hub
            .begin_refine(RefineTarget::bullet(0, 0), "first point".into())
            .expect("dialog opens");
        hub.settle_refine(seq, "sharper point");
        assert!(hub.accept_refine(&mut ed));
        assert_eq!(ed.slides()[0].content[0], "sharper point");
        assert!(hub.refine_dialog().is_none());
    }

    #[test]
    fn test_accept_before_settled_is_noop() {
        let mut hub = DialogCoordinator::new();
        let mut ed = editor();
        hub.begin_refine(RefineTarget::title(0), "Original title".into())
            .expect("dialog opens");
        assert!(!hub.accept_refine(&mut ed));
        assert_eq!(ed.slides()[0].title, "Original title");
    }

    #[test]
    fn test_discard_on_close_ignores_orphaned_resolution() {
        let mut hub = DialogCoordinator::new();
        let mut ed = editor();
        let seq = hub
            .begin_refine(RefineTarget::title(0), "Original title".into())
            .expect("dialog opens");
        hub.close_refine();
        // 孤兒結果此時才到達
        hub.settle_refine(seq, "late arrival");
        assert!(!hub.accept_refine(&mut ed));
        assert_eq!(ed.slides()[0].title, "Original title");
    }

    #[test]
    fn test_stale_sequence_does_not_touch_new_dialog() {
        let mut hub = DialogCoordinator::new();
        let old_seq = hub
            .begin_refine(RefineTarget::title(0), "Original title".into())
            .expect("dialog opens");
        hub.close_refine();
        let new_seq = hub
            .begin_refine(RefineTarget::title(1), "Second".into())
            .expect("reopens");
        hub.settle_refine(old_seq, "stale");
        assert!(!hub.refine_dialog().expect("open").is_settled());
        hub.settle_refine(new_seq, "fresh");
        assert_eq!(hub.refine_dialog().expect("open").preview(), "fresh");
    }

    #[test]
    fn test_refine_failure_keeps_deck_untouched() {
        let mut hub = DialogCoordinator::new();
        let mut ed = editor();
        let seq = hub
            .begin_refine(RefineTarget::title(0), "Original title".into())
            .expect("dialog opens");
        hub.fail_refine(seq, "remote call failed: 500".into());
        assert!(!hub.accept_refine(&mut ed));
        assert_eq!(ed.slides()[0].title, "Original title");
    }

    #[test]
    fn test_refining_a_refined_string_stays_well_formed() {
        let mut hub = DialogCoordinator::new();
        let mut ed = editor();
        let seq = hub
            .begin_refine(RefineTarget::title(0), "Original title".into())
            .expect("dialog opens");
        hub.settle_refine(seq, "Crisper title");
        assert!(hub.accept_refine(&mut ed));

        // 把上一輪的結果當作新一輪的原文再跑一次
        let refined = ed.slides()[0].title.clone();
        let seq = hub
            .begin_refine(RefineTarget::title(0), refined.clone())
            .expect("second round opens");
        hub.settle_refine(seq, &format!("{} v2", refined));
        let dialog = hub.refine_dialog().expect("open");
        assert!(dialog.is_settled());
        assert!(!dialog.preview().is_empty());
        assert!(hub.accept_refine(&mut ed));
        assert_eq!(ed.slides()[0].title, "Crisper title v2");
    }

    #[test]
    fn test_image_settle_then_accept_stores_url() {
        let mut hub = DialogCoordinator::new();
        let mut ed = editor();
        let seq = hub
            .begin_image(1, "a calm lake at dawn".into())
            .expect("dialog opens");
        hub.settle_image(seq, "data:image/png;base64,QUJD".into());
        assert!(hub.accept_image(&mut ed));
        assert_eq!(
            ed.slides()[1].image_url.as_deref(),
            Some("data:image/png;base64,QUJD")
        );
        assert!(hub.image_dialog().is_none());
    }

    #[test]
    fn test_image_close_discards_late_result() {
        let mut hub = DialogCoordinator::new();
        let mut ed = editor();
        let seq = hub.begin_image(0, "prompt".into()).expect("dialog opens");
        hub.close_image();
        hub.settle_image(seq, "data:image/png;base64,QUJD".into());
        assert!(!hub.accept_image(&mut ed));
        assert!(ed.slides()[0].image_url.is_none());
    }
}
