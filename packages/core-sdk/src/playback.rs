use crate::models::Presentation;

/**
 * \brief 播放狀態機：對簡報做唯讀的循序走訪。
 * \details 狀態即投影片索引 0..N-1；next 夾在最後一張、previous 夾在
 *          第一張；離開播放由呼叫端丟棄本結構，簡報內容不受影響。
 */
#[derive(Debug, Clone)]
pub struct Playback {
    current: usize,
    len: usize,
}

impl Playback {
    pub fn new(presentation: &Presentation) -> Playback {
        Playback {
            current: 0,
            len: presentation.slides.len(),
        }
    }

    /** \brief 從編輯時選取的索引開始播放；越界夾回範圍內。 */
    pub fn start_at(presentation: &Presentation, index: usize) -> Playback {
        let len = presentation.slides.len();
        Playback {
            current: index.min(len.saturating_sub(1)),
            len,
        }
    }

    pub fn current(&self) -> usize {
        self.current
    }

    pub fn len(&self) -> usize {
        self.len
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    pub fn next(&mut self) -> usize {
        self.current = (self.current + 1).min(self.len.saturating_sub(1));
        self.current
    }

    pub fn previous(&mut self) -> usize {
        self.current = self.current.saturating_sub(1);
        self.current
    }

    pub fn is_first(&self) -> bool {
        self.current == 0
    }

    pub fn is_last(&self) -> bool {
        self.len == 0 || self.current == self.len - 1
    }
}
