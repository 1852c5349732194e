use async_stream::try_stream;
use futures_util::Stream;
use serde_json::{json, Value};
use std::pin::Pin;
use std::time::Duration;

use crate::error::{Error, Result};
use crate::models::{AiConfig, LlmProvider, Slide, SlideLayout};

/** \brief Gemini REST API 基底位址。 */
const GEMINI_API_BASE: &str = "https://generativelanguage.googleapis.com/v1beta";

/** \brief 生圖固定使用的 Imagen 模型。 */
const IMAGE_MODEL: &str = "imagen-4.0-generate-001";

/**
 * \brief 大綱輸出語言。
 */
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum OutputLanguage {
    #[default]
    En,
    ZhTw,
}

impl OutputLanguage {
    pub fn parse(s: &str) -> Option<OutputLanguage> {
        match s {
            "EN" | "en" => Some(OutputLanguage::En),
            "ZH_TW" | "zh_tw" | "zh-tw" => Some(OutputLanguage::ZhTw),
            _ => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            OutputLanguage::En => "EN",
            OutputLanguage::ZhTw => "ZH_TW",
        }
    }

    fn prompt_name(&self) -> &'static str {
        match self {
            OutputLanguage::En => "English",
            OutputLanguage::ZhTw => "Traditional Chinese (繁體中文)",
        }
    }
}

/**
 * \brief 從文件文字生成結構化大綱。
 * \details 金鑰檢查先於供應商分派；目前僅 Gemini 接入，其餘供應商
 *          回報未實作。
 */
pub async fn generate_outline(
    cfg: &AiConfig,
    document_text: &str,
    language: OutputLanguage,
) -> Result<Vec<Slide>> {
    let api_key = cfg.require_api_key()?;
    match cfg.provider {
        LlmProvider::Gemini => {
            generate_gemini_outline(cfg, api_key, document_text, language).await
        }
        other => Err(Error::ProviderNotImplemented(other)),
    }
}

/**
 * \brief 非串流優化：回傳去除前後空白的最終文字。
 */
pub async fn refine_text(cfg: &AiConfig, text_to_refine: &str) -> Result<String> {
    let api_key = cfg.require_api_key()?;
    match cfg.provider {
        LlmProvider::Gemini => refine_gemini_text(cfg, api_key, text_to_refine).await,
        other => Err(Error::ProviderNotImplemented(other)),
    }
}

/**
 * \brief 串流優化：每個項目是「累積至今」的完整文字，最後一個項目
 *        即最終結果（呼叫端自行 trim）。
 */
pub async fn refine_text_stream(
    cfg: &AiConfig,
    text_to_refine: &str,
) -> Result<Pin<Box<dyn Stream<Item = Result<String>> + Send + 'static>>> {
    let api_key = cfg.require_api_key()?;
    match cfg.provider {
        LlmProvider::Gemini => stream_gemini_refine(cfg, api_key, text_to_refine).await,
        other => Err(Error::ProviderNotImplemented(other)),
    }
}

/**
 * \brief 依提示詞生成一張圖，回傳 `data:image/png;base64,...` URL。
 */
pub async fn generate_image(cfg: &AiConfig, prompt: &str) -> Result<String> {
    let api_key = cfg.require_api_key()?;
    match cfg.provider {
        LlmProvider::Gemini => generate_gemini_image(cfg, api_key, prompt).await,
        other => Err(Error::ProviderNotImplemented(other)),
    }
}

fn http_client(cfg: &AiConfig) -> Result<reqwest::Client> {
    reqwest::Client::builder()
        .timeout(Duration::from_secs(cfg.timeout_secs))
        .build()
        .map_err(Error::from_reqwest)
}

fn outline_prompt(document_text: &str, language: OutputLanguage) -> String {
    format!(
        "You are an expert presentation creator. Analyze the following document and generate a structured presentation outline in JSON format. The output content (titles and bullet points) MUST be in {}.\n\n\
        For each slide, provide:\n\
        1. A concise 'title'.\n\
        2. A 'content' array of strings (bullet points).\n\
        3. A suggested 'layout' from the available options.\n\n\
        Layout instructions:\n\
        - Use \"TITLE_SLIDE\" for the very first slide, with the main title of the presentation and a subtitle in the content array.\n\
        - Use \"TITLE_CONTENT\" for standard content slides with a title and bullet points.\n\
        - Use \"SECTION_HEADER\" for slides that introduce a new major topic. The title should be the topic name, and the content can have a short descriptive subtitle.\n\
        - Use \"TWO_COLUMN\" for slides that compare items or have two related sets of bullet points. Try to provide an even number of bullet points for this layout.\n\
        - Use \"BLANK\" sparingly for slides that might contain just a single, powerful image or quote (you can put the quote in the title).\n\n\
        Extract the most important information, focusing on headings, key concepts, data, and conclusions. Create a logical flow.\n\n\
        Document Text:\n---\n{}\n---\n",
        language.prompt_name(),
        document_text
    )
}

fn refine_prompt(text_to_refine: &str) -> String {
    format!(
        "You are an expert copywriter specializing in presentations. Your task is to refine the following text to be more clear, concise, and impactful for a presentation slide. You can summarize it, rephrase it for clarity, or fix grammar. It is crucial that you respond in the same language as the original text. Return only the refined text, without any preamble.\n\n\
        Original Text:\n---\n{}\n---\n\n\
        Refined Text:",
        text_to_refine
    )
}

fn outline_response_schema() -> Value {
    json!({
        "type": "ARRAY",
        "items": {
            "type": "OBJECT",
            "properties": {
                "title": { "type": "STRING" },
                "content": {
                    "type": "ARRAY",
                    "items": { "type": "STRING" }
                },
                "layout": {
                    "type": "STRING",
                    "enum": ["TITLE_SLIDE", "TITLE_CONTENT", "SECTION_HEADER", "TWO_COLUMN", "BLANK"]
                }
            },
            "required": ["title", "content", "layout"]
        }
    })
}

async fn generate_gemini_outline(
    cfg: &AiConfig,
    api_key: &str,
    document_text: &str,
    language: OutputLanguage,
) -> Result<Vec<Slide>> {
    let url = format!("{}/models/{}:generateContent", GEMINI_API_BASE, cfg.model);
    let body = json!({
        "contents": [{"parts": [{"text": outline_prompt(document_text, language)}]}],
        "generationConfig": {
            "responseMimeType": "application/json",
            "responseSchema": outline_response_schema(),
        }
    });

    let resp = http_client(cfg)?
        .post(url)
        .query(&[("key", api_key)])
        .json(&body)
        .send()
        .await
        .map_err(Error::from_reqwest)?;
    let resp = ensure_success(resp, "gemini outline request failed").await?;

    let v: Value = resp.json().await.map_err(Error::from_reqwest)?;
    let json_text = extract_gemini_text(&v);
    let slides: Value = serde_json::from_str(&json_text)
        .map_err(|e| Error::MalformedResponse(format!("outline is not valid JSON: {}", e)))?;
    parse_outline_slides(&slides)
}

async fn refine_gemini_text(
    cfg: &AiConfig,
    api_key: &str,
    text_to_refine: &str,
) -> Result<String> {
    let url = format!("{}/models/{}:generateContent", GEMINI_API_BASE, cfg.model);
    let body = json!({
        "contents": [{"parts": [{"text": refine_prompt(text_to_refine)}]}],
    });

    let resp = http_client(cfg)?
        .post(url)
        .query(&[("key", api_key)])
        .json(&body)
        .send()
        .await
        .map_err(Error::from_reqwest)?;
    let resp = ensure_success(resp, "gemini refine request failed").await?;

    let v: Value = resp.json().await.map_err(Error::from_reqwest)?;
    Ok(extract_gemini_text(&v).trim().to_string())
}

async fn stream_gemini_refine(
    cfg: &AiConfig,
    api_key: &str,
    text_to_refine: &str,
) -> Result<Pin<Box<dyn Stream<Item = Result<String>> + Send + 'static>>> {
    let url = format!(
        "{}/models/{}:streamGenerateContent",
        GEMINI_API_BASE, cfg.model
    );
    let body = json!({
        "contents": [{"parts": [{"text": refine_prompt(text_to_refine)}]}],
    });

    let resp = http_client(cfg)?
        .post(url)
        .query(&[("key", api_key), ("alt", "sse")])
        .json(&body)
        .send()
        .await
        .map_err(Error::from_reqwest)?;
    let resp = ensure_success(resp, "gemini refine stream failed").await?;

    let mut stream = resp.bytes_stream();
    let mut buf = Vec::<u8>::new();
    let mut accumulated = String::new();

    let out = try_stream! {
        use futures_util::StreamExt;
        while let Some(chunk) = stream.next().await {
            let chunk = chunk.map_err(Error::from_reqwest)?;
            buf.extend_from_slice(&chunk);
            while let Some(pos) = find_double_newline(&buf) {
                let block = buf.drain(..pos + 2).collect::<Vec<u8>>();
                if let Some(line) = extract_data_line(&block) {
                    if let Some(delta) = parse_gemini_delta(&line) {
                        accumulated.push_str(&delta);
                        yield accumulated.clone();
                    }
                }
            }
        }
        if !buf.is_empty() {
            if let Some(line) = extract_data_line(&buf) {
                if let Some(delta) = parse_gemini_delta(&line) {
                    accumulated.push_str(&delta);
                    yield accumulated.clone();
                }
            }
        }
    };

    Ok(Box::pin(out))
}

async fn generate_gemini_image(cfg: &AiConfig, api_key: &str, prompt: &str) -> Result<String> {
    let url = format!("{}/models/{}:predict", GEMINI_API_BASE, IMAGE_MODEL);
    let body = json!({
        "instances": [{"prompt": prompt}],
        "parameters": {
            "sampleCount": 1,
            "outputMimeType": "image/png",
        }
    });

    let resp = http_client(cfg)?
        .post(url)
        .query(&[("key", api_key)])
        .json(&body)
        .send()
        .await
        .map_err(Error::from_reqwest)?;

    if !resp.status().is_success() {
        let status = resp.status();
        let text = resp.text().await.unwrap_or_default();
        if text.contains("SAFETY") {
            return Err(Error::SafetyRejected);
        }
        return Err(Error::Remote(format!(
            "gemini image request failed: {} -> {}",
            status, text
        )));
    }

    let v: Value = resp.json().await.map_err(Error::from_reqwest)?;
    extract_image_data_url(&v)
}

async fn ensure_success(resp: reqwest::Response, what: &str) -> Result<reqwest::Response> {
    if resp.status().is_success() {
        return Ok(resp);
    }
    let status = resp.status();
    let text = resp.text().await.unwrap_or_default();
    Err(Error::Remote(format!("{}: {} -> {}", what, status, text)))
}

/**
 * \brief 把模型回傳的大綱 JSON 陣列轉成投影片序列。
 * \details 逐欄位寬鬆解析：缺標題補 "Untitled Slide"、缺內容補空陣列、
 *          未知版面落回 TITLE_CONTENT；頂層不是陣列才視為格式錯誤。
 */
fn parse_outline_slides(v: &Value) -> Result<Vec<Slide>> {
    let Some(items) = v.as_array() else {
        return Err(Error::MalformedResponse(
            "expected an array of slides".to_string(),
        ));
    };
    let millis = time::OffsetDateTime::now_utc().unix_timestamp_nanos() / 1_000_000;
    Ok(items
        .iter()
        .enumerate()
        .map(|(index, item)| Slide {
            id: format!("slide-{}-{}", index, millis),
            title: item
                .get("title")
                .and_then(|t| t.as_str())
                .filter(|t| !t.is_empty())
                .unwrap_or("Untitled Slide")
                .to_string(),
            content: item
                .get("content")
                .and_then(|c| c.as_array())
                .map(|arr| {
                    arr.iter()
                        .filter_map(|p| p.as_str())
                        .map(|p| p.to_string())
                        .collect()
                })
                .unwrap_or_default(),
            layout: item
                .get("layout")
                .and_then(|l| l.as_str())
                .map(SlideLayout::parse)
                .unwrap_or(SlideLayout::TitleContent),
            image_url: None,
            transition: None,
        })
        .collect())
}

fn extract_gemini_text(v: &Value) -> String {
    if let Some(candidates) = v.get("candidates").and_then(|c| c.as_array()) {
        if let Some(first) = candidates.first() {
            if let Some(parts) = first
                .get("content")
                .and_then(|c| c.get("parts"))
                .and_then(|p| p.as_array())
            {
                return parts
                    .iter()
                    .filter_map(|p| p.get("text").and_then(|t| t.as_str()))
                    .collect::<Vec<_>>()
                    .join("");
            }
        }
    }
    v.get("text")
        .and_then(|t| t.as_str())
        .unwrap_or("")
        .to_string()
}

fn extract_image_data_url(v: &Value) -> Result<String> {
    let bytes = v
        .get("predictions")
        .and_then(|p| p.as_array())
        .and_then(|arr| arr.first())
        .and_then(|p| p.get("bytesBase64Encoded"))
        .and_then(|b| b.as_str());
    match bytes {
        Some(b64) if !b64.is_empty() => Ok(format!("data:image/png;base64,{}", b64)),
        // 無圖即視為安全政策攔截
        _ => Err(Error::SafetyRejected),
    }
}

fn find_double_newline(buf: &[u8]) -> Option<usize> {
    buf.windows(2).position(|w| w == b"\n\n")
}

fn extract_data_line(block: &[u8]) -> Option<String> {
    let text = String::from_utf8_lossy(block);
    for line in text.lines() {
        let line = line.trim_start();
        if line.starts_with("data:") {
            return Some(line[5..].trim().to_string());
        }
    }
    None
}

fn parse_gemini_delta(line: &str) -> Option<String> {
    let v: Value = serde_json::from_str(line).ok()?;
    let text = extract_gemini_text(&v);
    if text.is_empty() {
        None
    } else {
        Some(text)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::AiConfig;

    #[test]
    fn test_parse_outline_fills_missing_fields() {
        let v = json!([
            {"title": "Intro", "content": ["a", "b"], "layout": "TITLE_SLIDE"},
            {"content": ["c"], "layout": "TITLE_CONTENT"},
            {"title": "Ends", "layout": "SECTION_HEADER"},
        ]);
        let slides = parse_outline_slides(&v).expect("parses");
        assert_eq!(slides.len(), 3);
        assert_eq!(slides[0].layout, SlideLayout::TitleSlide);
        assert_eq!(slides[1].title, "Untitled Slide");
        assert!(slides[2].content.is_empty());
        assert!(slides[0].id.starts_with("slide-0-"));
        assert!(slides[2].id.starts_with("slide-2-"));
    }

    #[test]
    fn test_parse_outline_unknown_layout_falls_back() {
        let v = json!([
            {"title": "Weird", "content": [], "layout": "HERO_BANNER"},
        ]);
        let slides = parse_outline_slides(&v).expect("parses");
        assert_eq!(slides[0].layout, SlideLayout::TitleContent);
        assert_eq!(slides[0].title, "Weird");
    }

    #[test]
    fn test_parse_outline_rejects_non_array() {
        let v = json!({"slides": []});
        assert!(matches!(
            parse_outline_slides(&v),
            Err(Error::MalformedResponse(_))
        ));
    }

    #[test]
    fn test_extract_gemini_text_joins_parts() {
        let v = json!({
            "candidates": [{
                "content": {"parts": [{"text": "Hello"}, {"text": ", world"}]}
            }]
        });
        assert_eq!(extract_gemini_text(&v), "Hello, world");
    }

    #[test]
    fn test_sse_block_parsing() {
        let mut buf: Vec<u8> =
            b"data: {\"candidates\":[{\"content\":{\"parts\":[{\"text\":\"abc\"}]}}]}\n\npartial"
                .to_vec();
        let pos = find_double_newline(&buf).expect("boundary found");
        let block = buf.drain(..pos + 2).collect::<Vec<u8>>();
        let line = extract_data_line(&block).expect("data line");
        assert_eq!(parse_gemini_delta(&line).as_deref(), Some("abc"));
        assert_eq!(buf, b"partial");
    }

    #[test]
    fn test_image_extraction_and_safety_rejection() {
        let ok = json!({"predictions": [{"bytesBase64Encoded": "QUJD"}]});
        assert_eq!(
            extract_image_data_url(&ok).expect("image"),
            "data:image/png;base64,QUJD"
        );
        let empty = json!({"predictions": []});
        assert!(matches!(
            extract_image_data_url(&empty),
            Err(Error::SafetyRejected)
        ));
    }

    #[tokio::test]
    async fn test_missing_key_is_rejected_before_dispatch() {
        let cfg = AiConfig::new(LlmProvider::OpenAi, "GPT-4o");
        let err = generate_outline(&cfg, "doc", OutputLanguage::En)
            .await
            .expect_err("no key configured");
        assert!(matches!(err, Error::MissingApiKey(LlmProvider::OpenAi)));
    }

    #[tokio::test]
    async fn test_unimplemented_providers_are_reported() {
        for provider in [LlmProvider::OpenAi, LlmProvider::Anthropic, LlmProvider::Grok] {
            let cfg =
                AiConfig::new(provider, provider.default_model()).with_api_key("sk-test");
            let err = refine_text(&cfg, "text").await.expect_err("not implemented");
            assert!(matches!(err, Error::ProviderNotImplemented(p) if p == provider));
        }
    }

    #[test]
    fn test_outline_payload_through_confirm_and_template() {
        use crate::models::find_template;
        use crate::outline::OutlineDraft;

        // "Q1 revenue grew 20%. Q2 flat. Q3 strong rebound." 的典型回應
        let payload = json!([
            {"title": "Quarterly Review", "content": ["FY performance"], "layout": "TITLE_SLIDE"},
            {"title": "Q1-Q3 Numbers", "content": ["Q1 +20%", "Q2 flat", "Q3 rebound"], "layout": "TITLE_CONTENT"},
        ]);
        let slides = parse_outline_slides(&payload).expect("parses");
        assert!(!slides.is_empty());

        let draft = OutlineDraft::new(slides);
        let template = find_template("cyberpunk-neon").expect("builtin template");
        let presentation = draft.promote(template.clone());
        assert_eq!(presentation.slides.len(), draft.len());
        assert_eq!(presentation.template.id, template.id);
    }

    #[test]
    fn test_output_language_parse_and_prompt_name() {
        assert_eq!(OutputLanguage::parse("ZH_TW"), Some(OutputLanguage::ZhTw));
        assert_eq!(OutputLanguage::parse("EN"), Some(OutputLanguage::En));
        assert_eq!(OutputLanguage::parse("fr"), None);
        assert!(OutputLanguage::ZhTw.prompt_name().contains("繁體中文"));
        assert!(outline_prompt("doc", OutputLanguage::En).contains("MUST be in English"));
    }
}
