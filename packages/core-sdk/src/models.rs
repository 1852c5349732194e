use serde::{Deserialize, Serialize};

/**
 * \brief 投影片版面配置（封閉集合）。
 * \details 未知字串一律回退為 `TitleContent`，見 `SlideLayout::parse`。
 */
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum SlideLayout {
    #[serde(rename = "TITLE_SLIDE")]
    TitleSlide,
    #[serde(rename = "TITLE_CONTENT")]
    TitleContent,
    #[serde(rename = "SECTION_HEADER")]
    SectionHeader,
    #[serde(rename = "TWO_COLUMN")]
    TwoColumn,
    #[serde(rename = "BLANK")]
    Blank,
}

impl Default for SlideLayout {
    fn default() -> Self {
        SlideLayout::TitleContent
    }
}

impl SlideLayout {
    /**
     * \brief 解析版面字串；無法辨識時回退為 `TitleContent`。
     */
    pub fn parse(value: &str) -> SlideLayout {
        match value {
            "TITLE_SLIDE" => SlideLayout::TitleSlide,
            "TITLE_CONTENT" => SlideLayout::TitleContent,
            "SECTION_HEADER" => SlideLayout::SectionHeader,
            "TWO_COLUMN" => SlideLayout::TwoColumn,
            "BLANK" => SlideLayout::Blank,
            _ => SlideLayout::TitleContent,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            SlideLayout::TitleSlide => "TITLE_SLIDE",
            SlideLayout::TitleContent => "TITLE_CONTENT",
            SlideLayout::SectionHeader => "SECTION_HEADER",
            SlideLayout::TwoColumn => "TWO_COLUMN",
            SlideLayout::Blank => "BLANK",
        }
    }
}

/**
 * \brief 投影片切換時的轉場效果。
 */
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Transition {
    #[serde(rename = "none")]
    None,
    #[serde(rename = "fade")]
    Fade,
    #[serde(rename = "slide-in")]
    SlideIn,
    #[serde(rename = "zoom-in")]
    ZoomIn,
}

impl Transition {
    pub fn parse(value: &str) -> Option<Transition> {
        match value {
            "none" => Some(Transition::None),
            "fade" => Some(Transition::Fade),
            "slide-in" => Some(Transition::SlideIn),
            "zoom-in" => Some(Transition::ZoomIn),
            _ => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Transition::None => "none",
            Transition::Fade => "fade",
            Transition::SlideIn => "slide-in",
            Transition::ZoomIn => "zoom-in",
        }
    }
}

/**
 * \brief 單張投影片。
 * \details `content` 永不為 null（允許空序列）；`id` 在同一份簡報內唯一，
 *          刪除後不再重用，是重新排序與選取的索引鍵。
 */
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Slide {
    /** \brief 穩定識別碼，建立時分配 */
    pub id: String,
    /** \brief 標題 */
    pub title: String,
    /** \brief 內容條目（語意依版面而定） */
    #[serde(default)]
    pub content: Vec<String>,
    /** \brief 版面配置 */
    #[serde(default)]
    pub layout: SlideLayout,
    /** \brief 生成或附加的圖片參照（data URI 或外部 URL） */
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub image_url: Option<String>,
    /** \brief 轉場效果；缺省即無轉場 */
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub transition: Option<Transition>,
}

/**
 * \brief 簡報範本的樣式束；核心邏輯僅附掛與讀取，不解讀內容。
 */
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TemplateStyles {
    pub bg: String,
    pub title: String,
    pub subtitle: String,
    pub text: String,
    pub accent: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Template {
    pub id: String,
    pub name: String,
    pub styles: TemplateStyles,
}

fn template(id: &str, name: &str, styles: [&str; 5]) -> Template {
    Template {
        id: id.to_string(),
        name: name.to_string(),
        styles: TemplateStyles {
            bg: styles[0].to_string(),
            title: styles[1].to_string(),
            subtitle: styles[2].to_string(),
            text: styles[3].to_string(),
            accent: styles[4].to_string(),
        },
    }
}

/**
 * \brief 內建範本清單。
 */
pub fn builtin_templates() -> Vec<Template> {
    vec![
        template(
            "professional-blue",
            "Professional Blue",
            [
                "bg-slate-800",
                "text-blue-400 font-bold text-5xl",
                "text-slate-300 text-2xl",
                "text-slate-300 text-lg",
                "border-blue-400",
            ],
        ),
        template(
            "cyberpunk-neon",
            "Cyberpunk Neon",
            [
                "bg-black from-indigo-900 to-black bg-gradient-to-br",
                "text-fuchsia-400 font-bold text-5xl",
                "text-cyan-400 text-2xl",
                "text-gray-200 text-lg",
                "border-fuchsia-400",
            ],
        ),
        template(
            "light-minimal",
            "Minimal Light",
            [
                "bg-gray-100",
                "text-gray-800 font-bold text-5xl",
                "text-gray-700 text-2xl",
                "text-gray-600 text-lg",
                "border-gray-800",
            ],
        ),
        template(
            "forest-green",
            "Forest Green",
            [
                "bg-green-900 bg-opacity-80 backdrop-blur-sm",
                "text-yellow-200 font-bold text-5xl",
                "text-green-100 text-2xl",
                "text-green-50 text-lg",
                "border-yellow-200",
            ],
        ),
    ]
}

/**
 * \brief 依 id 取得內建範本。
 */
pub fn find_template(id: &str) -> Option<Template> {
    builtin_templates().into_iter().find(|t| t.id == id)
}

/**
 * \brief 完成範本選擇後的簡報：標題、有序投影片與樣式範本。
 */
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Presentation {
    pub title: String,
    pub slides: Vec<Slide>,
    pub template: Template,
}

/**
 * \brief 受支援的 LLM 供應商（封閉集合）。
 */
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum LlmProvider {
    #[serde(rename = "gemini")]
    Gemini,
    #[serde(rename = "openai")]
    OpenAi,
    #[serde(rename = "anthropic")]
    Anthropic,
    #[serde(rename = "grok")]
    Grok,
}

impl LlmProvider {
    pub const ALL: [LlmProvider; 4] = [
        LlmProvider::Gemini,
        LlmProvider::OpenAi,
        LlmProvider::Anthropic,
        LlmProvider::Grok,
    ];

    pub fn parse(value: &str) -> Option<LlmProvider> {
        match value {
            "gemini" => Some(LlmProvider::Gemini),
            "openai" => Some(LlmProvider::OpenAi),
            "anthropic" => Some(LlmProvider::Anthropic),
            "grok" => Some(LlmProvider::Grok),
            _ => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            LlmProvider::Gemini => "gemini",
            LlmProvider::OpenAi => "openai",
            LlmProvider::Anthropic => "anthropic",
            LlmProvider::Grok => "grok",
        }
    }

    pub fn display_name(&self) -> &'static str {
        match self {
            LlmProvider::Gemini => "Gemini",
            LlmProvider::OpenAi => "OpenAI",
            LlmProvider::Anthropic => "Anthropic",
            LlmProvider::Grok => "Grok",
        }
    }

    /**
     * \brief 供應商目前支援的模型清單。
     */
    pub fn supported_models(&self) -> &'static [&'static str] {
        match self {
            LlmProvider::Gemini => &["gemini-2.5-flash", "gemini-2.5-pro"],
            LlmProvider::OpenAi => &["GPT-4o", "GPT-4o mini", "GPT-5"],
            LlmProvider::Anthropic => &["Claude 3.7 Sonnet", "Claude 4 Sonnet"],
            LlmProvider::Grok => &["Grok 3", "Grok 4"],
        }
    }

    pub fn default_model(&self) -> &'static str {
        self.supported_models()[0]
    }

    pub fn supports_model(&self, model: &str) -> bool {
        self.supported_models().iter().any(|m| *m == model)
    }
}

impl Default for LlmProvider {
    fn default() -> Self {
        LlmProvider::Gemini
    }
}

/** \brief 遠端呼叫的預設逾時秒數。 */
pub const DEFAULT_AI_TIMEOUT_SECS: u64 = 45;

fn default_timeout_secs() -> u64 {
    DEFAULT_AI_TIMEOUT_SECS
}

/**
 * \brief AI 呼叫組態。
 * \details `api_key` 缺省時任何 AI 操作都會在發送遠端請求前被擋下。
 */
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AiConfig {
    pub provider: LlmProvider,
    pub model: String,
    #[serde(default)]
    pub api_key: Option<String>,
    /** \brief 遠端呼叫逾時（秒）；逾時以一般遠端錯誤呈現 */
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
}

impl AiConfig {
    pub fn new(provider: LlmProvider, model: impl Into<String>) -> AiConfig {
        AiConfig {
            provider,
            model: model.into(),
            api_key: None,
            timeout_secs: DEFAULT_AI_TIMEOUT_SECS,
        }
    }

    pub fn with_api_key(mut self, key: impl Into<String>) -> AiConfig {
        self.api_key = Some(key.into());
        self
    }

    /**
     * \brief 取得 API 金鑰；缺省時回傳組態錯誤，操作不得繼續。
     */
    pub fn require_api_key(&self) -> crate::error::Result<&str> {
        match self.api_key.as_deref() {
            Some(key) if !key.trim().is_empty() => Ok(key),
            _ => Err(crate::error::Error::MissingApiKey(self.provider)),
        }
    }
}

/**
 * \brief 介面主題偏好。
 */
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Theme {
    #[serde(rename = "light")]
    Light,
    #[serde(rename = "dark")]
    Dark,
    #[serde(rename = "system")]
    System,
}

impl Theme {
    pub fn parse(value: &str) -> Option<Theme> {
        match value {
            "light" => Some(Theme::Light),
            "dark" => Some(Theme::Dark),
            "system" => Some(Theme::System),
            _ => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Theme::Light => "light",
            Theme::Dark => "dark",
            Theme::System => "system",
        }
    }
}

impl Default for Theme {
    fn default() -> Self {
        Theme::System
    }
}
