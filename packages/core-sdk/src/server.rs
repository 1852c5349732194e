use std::convert::Infallible;

use anyhow::{anyhow, Result};
use axum::{
    extract::{Path, Query},
    response::sse::{Event, KeepAlive, Sse},
    routing::{get, get_service, post, put},
    Json, Router,
};
use once_cell::sync::Lazy;
use serde::{Deserialize, Deserializer, Serialize};
use tokio::sync::mpsc;
use tokio_stream::wrappers::UnboundedReceiverStream;
use tower_http::services::ServeDir;

use crate::ai::{self, OutputLanguage};
use crate::deck::{DeckEditor, SlidePatch};
use crate::export::{export_presentation, ExportFormat};
use crate::models::{
    builtin_templates, find_template, LlmProvider, Presentation, SlideLayout, Theme, Transition,
};
use crate::outline::OutlineDraft;
use crate::refine::{DialogCoordinator, DialogState, RefineTarget};
use crate::{db, extract, telemetry};

/**
 * \brief 工作階段狀態機：歡迎頁 → 大綱審閱 → 簡報編輯。
 * \details 單一本地工作階段，整個程序共用一份。
 */
enum Phase {
    Welcome,
    Outline(OutlineDraft),
    Editing(EditSession),
}

struct EditSession {
    editor: DeckEditor,
    dialogs: DialogCoordinator,
}

static STUDIO: Lazy<tokio::sync::Mutex<Phase>> =
    Lazy::new(|| tokio::sync::Mutex::new(Phase::Welcome));

/**
 * \brief 啟動本地 HTTP 服務，提供靜態前端與 API。
 * \param addr 監聽位址，如 "127.0.0.1:5173"
 */
pub async fn run(addr: &str) -> Result<()> {
    let ui_root =
        std::env::var("SLIDEQUILL_UI_DIR").unwrap_or_else(|_| "packages/ui/dist".to_string());
    let fallback_root =
        std::env::var("SLIDEQUILL_UI_FALLBACK").unwrap_or_else(|_| "web".to_string());

    let static_handler = if std::path::Path::new(&ui_root).exists() {
        ServeDir::new(ui_root)
    } else {
        ServeDir::new(fallback_root)
    }
    .append_index_html_on_directories(true);

    let static_service = get_service(static_handler);

    let app = Router::new()
        .route("/api/config", get(get_config).post(set_config))
        .route("/api/models", get(list_models))
        .route("/api/templates", get(list_templates))
        .route("/api/outline", get(get_outline).post(generate_outline))
        .route("/api/outline/title", put(set_outline_title))
        .route("/api/outline/content", put(set_outline_content))
        .route(
            "/api/presentation",
            get(get_presentation).post(create_presentation),
        )
        .route("/api/presentation/title", put(set_presentation_title))
        .route("/api/presentation/template", put(set_presentation_template))
        .route("/api/slides", post(add_slide))
        .route("/api/slides/reorder", post(reorder_slides))
        .route("/api/slides/{index}", put(patch_slide).delete(delete_slide))
        .route("/api/slides/{index}/select", post(select_slide))
        .route("/api/slides/{index}/transition", put(set_transition))
        .route("/api/slides/{index}/content", post(add_content_point))
        .route(
            "/api/slides/{index}/content/{content_index}",
            put(set_content_point).delete(delete_content_point),
        )
        .route("/api/refine", get(get_refine_dialog))
        .route("/api/refine/sse", get(refine_sse))
        .route("/api/refine/accept", post(accept_refine))
        .route("/api/refine/close", post(close_refine))
        .route("/api/image", get(get_image_dialog).post(begin_image))
        .route("/api/image/accept", post(accept_image))
        .route("/api/image/close", post(close_image))
        .route("/api/export", post(export_deck))
        .route("/api/health", get(health_check))
        .fallback_service(static_service);

    let listener = tokio::net::TcpListener::bind(addr).await?;
    println!("Server listening on http://{}", addr);
    axum::serve(listener, app).await?;
    Ok(())
}

type HandlerError = (axum::http::StatusCode, String);

fn internal_err<E: std::fmt::Display>(e: E) -> HandlerError {
    (axum::http::StatusCode::INTERNAL_SERVER_ERROR, e.to_string())
}

fn load_config() -> Result<crate::models::AiConfig, HandlerError> {
    let conn = db::open_default_db().map_err(internal_err)?;
    db::migrate(&conn).map_err(internal_err)?;
    telemetry::set_enabled(db::get_telemetry_enabled(&conn).map_err(internal_err)?);
    db::load_ai_settings(&conn).map_err(internal_err)
}

#[derive(Serialize, Debug)]
struct ConfigResponse {
    provider: String,
    model: String,
    has_api_key: bool,
    theme: String,
    telemetry_enabled: bool,
}

#[derive(Deserialize, Debug)]
struct ConfigInput {
    provider: String,
    model: String,
    #[serde(default)]
    api_key: Option<String>,
    #[serde(default)]
    theme: Option<String>,
    #[serde(default)]
    telemetry_enabled: Option<bool>,
}

/**
 * \brief 讀取目前設定（金鑰不回傳，只回報是否已設定）。
 */
async fn get_config() -> Result<Json<ConfigResponse>, HandlerError> {
    let conn = db::open_default_db().map_err(internal_err)?;
    db::migrate(&conn).map_err(internal_err)?;
    let cfg = db::load_ai_settings(&conn).map_err(internal_err)?;
    let theme = db::get_theme(&conn).map_err(internal_err)?;
    let telemetry_enabled = db::get_telemetry_enabled(&conn).map_err(internal_err)?;
    telemetry::set_enabled(telemetry_enabled);
    Ok(Json(ConfigResponse {
        provider: cfg.provider.as_str().to_string(),
        model: cfg.model,
        has_api_key: cfg.api_key.is_some(),
        theme: theme.as_str().to_string(),
        telemetry_enabled,
    }))
}

/**
 * \brief 保存設定；provider/model 組合在儲存層驗證與矯正。
 */
async fn set_config(Json(input): Json<ConfigInput>) -> Result<Json<ConfigResponse>, HandlerError> {
    let provider = LlmProvider::parse(&input.provider)
        .ok_or_else(|| internal_err(anyhow!("unknown provider: {}", input.provider)))?;
    let conn = db::open_default_db().map_err(internal_err)?;
    db::migrate(&conn).map_err(internal_err)?;
    db::save_ai_settings(&conn, provider, &input.model).map_err(internal_err)?;
    if let Some(key) = input.api_key.as_deref() {
        db::set_api_key(&conn, provider, key).map_err(internal_err)?;
    }
    if let Some(theme) = input.theme.as_deref() {
        let theme =
            Theme::parse(theme).ok_or_else(|| internal_err(anyhow!("unknown theme: {}", theme)))?;
        db::set_theme(&conn, theme).map_err(internal_err)?;
    }
    if let Some(enabled) = input.telemetry_enabled {
        db::set_telemetry_enabled(&conn, enabled).map_err(internal_err)?;
        telemetry::set_enabled(enabled);
    }
    telemetry::log_event(
        "server.config",
        &format!("save provider={} model={}", provider.as_str(), input.model),
    );
    drop(conn);
    get_config().await
}

/**
 * \brief 靜態的供應商/模型對照表。
 */
async fn list_models() -> Json<serde_json::Value> {
    let providers: Vec<serde_json::Value> = LlmProvider::ALL
        .iter()
        .map(|p| {
            serde_json::json!({
                "provider": p.as_str(),
                "display_name": p.display_name(),
                "models": p.supported_models(),
                "default_model": p.default_model(),
                "implemented": *p == LlmProvider::Gemini,
            })
        })
        .collect();
    Json(serde_json::json!({ "providers": providers }))
}

async fn list_templates() -> Json<serde_json::Value> {
    Json(serde_json::json!({ "templates": builtin_templates() }))
}

#[derive(Deserialize, Debug)]
struct OutlineInput {
    /** \brief 直接提供的文件文字。 */
    #[serde(default)]
    text: Option<String>,
    /** \brief 或者伺服器可讀的檔案路徑。 */
    #[serde(default)]
    path: Option<String>,
    /** \brief 輸出語言（EN / ZH_TW），缺省 EN。 */
    #[serde(default)]
    language: Option<String>,
}

/**
 * \brief 文件 → 大綱：抽字、呼叫模型、進入大綱審閱階段。
 */
async fn generate_outline(
    Json(input): Json<OutlineInput>,
) -> Result<Json<serde_json::Value>, HandlerError> {
    let cfg = load_config()?;
    let document_text = match (input.text, input.path) {
        (Some(text), _) => text,
        (None, Some(path)) => {
            extract::extract_text(std::path::Path::new(&path)).map_err(internal_err)?
        }
        (None, None) => return Err(internal_err(anyhow!("either text or path is required"))),
    };
    let language = input
        .language
        .as_deref()
        .map(|l| {
            OutputLanguage::parse(l).ok_or_else(|| internal_err(anyhow!("unknown language: {}", l)))
        })
        .transpose()?
        .unwrap_or_default();

    let slides = match ai::generate_outline(&cfg, &document_text, language).await {
        Ok(slides) => slides,
        Err(e) => {
            telemetry::log_error("server.outline", &format!("generate failed: {}", e));
            return Err(internal_err(e));
        }
    };
    telemetry::log_ai_call(cfg.provider, "outline", &format!("{} slides", slides.len()));

    let mut studio = STUDIO.lock().await;
    *studio = Phase::Outline(OutlineDraft::new(slides));
    let Phase::Outline(draft) = &*studio else {
        unreachable!()
    };
    Ok(Json(serde_json::json!({ "slides": draft.slides() })))
}

async fn get_outline() -> Result<Json<serde_json::Value>, HandlerError> {
    let studio = STUDIO.lock().await;
    match &*studio {
        Phase::Outline(draft) => Ok(Json(serde_json::json!({ "slides": draft.slides() }))),
        _ => Err(internal_err(anyhow!("no outline under review"))),
    }
}

#[derive(Deserialize, Debug)]
struct OutlineTitleInput {
    slide_index: usize,
    title: String,
}

async fn set_outline_title(
    Json(input): Json<OutlineTitleInput>,
) -> Result<Json<serde_json::Value>, HandlerError> {
    let mut studio = STUDIO.lock().await;
    let Phase::Outline(draft) = &mut *studio else {
        return Err(internal_err(anyhow!("no outline under review")));
    };
    draft.set_title(input.slide_index, input.title);
    Ok(Json(serde_json::json!({ "slides": draft.slides() })))
}

#[derive(Deserialize, Debug)]
struct OutlineContentInput {
    slide_index: usize,
    content_index: usize,
    text: String,
}

async fn set_outline_content(
    Json(input): Json<OutlineContentInput>,
) -> Result<Json<serde_json::Value>, HandlerError> {
    let mut studio = STUDIO.lock().await;
    let Phase::Outline(draft) = &mut *studio else {
        return Err(internal_err(anyhow!("no outline under review")));
    };
    draft.set_content_point(input.slide_index, input.content_index, input.text);
    Ok(Json(serde_json::json!({ "slides": draft.slides() })))
}

#[derive(Deserialize, Debug)]
struct CreatePresentationInput {
    template_id: String,
}

/**
 * \brief 範本選定：把確認後的大綱升級為可編輯簡報。
 */
async fn create_presentation(
    Json(input): Json<CreatePresentationInput>,
) -> Result<Json<PresentationResponse>, HandlerError> {
    let template = find_template(&input.template_id)
        .ok_or_else(|| internal_err(anyhow!("unknown template: {}", input.template_id)))?;
    let mut studio = STUDIO.lock().await;
    let Phase::Outline(draft) = &*studio else {
        return Err(internal_err(anyhow!("no outline under review")));
    };
    let presentation = draft.promote(template);
    telemetry::log_event(
        "server.presentation",
        &format!("create slides={}", presentation.slides.len()),
    );
    *studio = Phase::Editing(EditSession {
        editor: DeckEditor::from_presentation(presentation),
        dialogs: DialogCoordinator::new(),
    });
    presentation_response(&studio)
}

#[derive(Serialize, Debug)]
struct PresentationResponse {
    presentation: Presentation,
    selected_index: usize,
}

fn presentation_response(studio: &Phase) -> Result<Json<PresentationResponse>, HandlerError> {
    match studio {
        Phase::Editing(session) => Ok(Json(PresentationResponse {
            presentation: session.editor.snapshot(),
            selected_index: session.editor.selected_index(),
        })),
        _ => Err(internal_err(anyhow!("no presentation open"))),
    }
}

async fn get_presentation() -> Result<Json<PresentationResponse>, HandlerError> {
    let studio = STUDIO.lock().await;
    presentation_response(&studio)
}

fn with_session<T>(
    studio: &mut Phase,
    f: impl FnOnce(&mut EditSession) -> T,
) -> Result<T, HandlerError> {
    match studio {
        Phase::Editing(session) => Ok(f(session)),
        _ => Err(internal_err(anyhow!("no presentation open"))),
    }
}

#[derive(Deserialize, Debug)]
struct TitleInput {
    title: String,
}

async fn set_presentation_title(
    Json(input): Json<TitleInput>,
) -> Result<Json<PresentationResponse>, HandlerError> {
    let mut studio = STUDIO.lock().await;
    with_session(&mut studio, |s| s.editor.set_title(input.title))?;
    presentation_response(&studio)
}

#[derive(Deserialize, Debug)]
struct TemplateInput {
    template_id: String,
}

async fn set_presentation_template(
    Json(input): Json<TemplateInput>,
) -> Result<Json<PresentationResponse>, HandlerError> {
    let template = find_template(&input.template_id)
        .ok_or_else(|| internal_err(anyhow!("unknown template: {}", input.template_id)))?;
    let mut studio = STUDIO.lock().await;
    with_session(&mut studio, |s| s.editor.set_template(template))?;
    presentation_response(&studio)
}

async fn add_slide() -> Result<Json<PresentationResponse>, HandlerError> {
    let mut studio = STUDIO.lock().await;
    with_session(&mut studio, |s| {
        s.editor.add_slide();
    })?;
    presentation_response(&studio)
}

async fn delete_slide(Path(index): Path<usize>) -> Result<Json<PresentationResponse>, HandlerError> {
    let mut studio = STUDIO.lock().await;
    // 僅剩一張或索引越界時為 no-op，快照照常回傳
    with_session(&mut studio, |s| s.editor.delete_slide(index))?;
    presentation_response(&studio)
}

#[derive(Deserialize, Debug)]
struct ReorderInput {
    from: usize,
    to: usize,
}

async fn reorder_slides(
    Json(input): Json<ReorderInput>,
) -> Result<Json<PresentationResponse>, HandlerError> {
    let mut studio = STUDIO.lock().await;
    with_session(&mut studio, |s| s.editor.reorder(input.from, input.to))?;
    presentation_response(&studio)
}

async fn select_slide(Path(index): Path<usize>) -> Result<Json<PresentationResponse>, HandlerError> {
    let mut studio = STUDIO.lock().await;
    with_session(&mut studio, |s| s.editor.select(index))?;
    presentation_response(&studio)
}

fn deserialize_some<'de, T, D>(deserializer: D) -> Result<Option<T>, D::Error>
where
    T: Deserialize<'de>,
    D: Deserializer<'de>,
{
    T::deserialize(deserializer).map(Some)
}

/**
 * \brief 部分更新的線上格式：缺欄位不動、`null` 清除（圖片/轉場）。
 */
#[derive(Deserialize, Debug, Default)]
struct SlidePatchInput {
    #[serde(default)]
    title: Option<String>,
    #[serde(default)]
    content: Option<Vec<String>>,
    #[serde(default)]
    layout: Option<String>,
    #[serde(default, deserialize_with = "deserialize_some")]
    image_url: Option<Option<String>>,
    #[serde(default, deserialize_with = "deserialize_some")]
    transition: Option<Option<String>>,
}

async fn patch_slide(
    Path(index): Path<usize>,
    Json(input): Json<SlidePatchInput>,
) -> Result<Json<PresentationResponse>, HandlerError> {
    let transition = match input.transition {
        None => None,
        Some(None) => Some(None),
        Some(Some(value)) => Some(Some(Transition::parse(&value).ok_or_else(|| {
            internal_err(anyhow!("unknown transition: {}", value))
        })?)),
    };
    let patch = SlidePatch {
        title: input.title,
        content: input.content,
        layout: input.layout.as_deref().map(SlideLayout::parse),
        image_url: input.image_url,
        transition,
    };
    let mut studio = STUDIO.lock().await;
    with_session(&mut studio, |s| s.editor.update_slide(index, patch))?;
    presentation_response(&studio)
}

#[derive(Deserialize, Debug)]
struct TransitionInput {
    #[serde(default)]
    transition: Option<String>,
}

async fn set_transition(
    Path(index): Path<usize>,
    Json(input): Json<TransitionInput>,
) -> Result<Json<PresentationResponse>, HandlerError> {
    let transition = input
        .transition
        .as_deref()
        .map(|t| {
            Transition::parse(t).ok_or_else(|| internal_err(anyhow!("unknown transition: {}", t)))
        })
        .transpose()?;
    let mut studio = STUDIO.lock().await;
    with_session(&mut studio, |s| s.editor.set_transition(index, transition))?;
    presentation_response(&studio)
}

#[derive(Deserialize, Debug)]
struct ContentTextInput {
    text: String,
}

async fn add_content_point(
    Path(index): Path<usize>,
) -> Result<Json<PresentationResponse>, HandlerError> {
    let mut studio = STUDIO.lock().await;
    with_session(&mut studio, |s| s.editor.add_content_point(index))?;
    presentation_response(&studio)
}

async fn set_content_point(
    Path((index, content_index)): Path<(usize, usize)>,
    Json(input): Json<ContentTextInput>,
) -> Result<Json<PresentationResponse>, HandlerError> {
    let mut studio = STUDIO.lock().await;
    with_session(&mut studio, |s| {
        s.editor.set_content_point(index, content_index, input.text)
    })?;
    presentation_response(&studio)
}

async fn delete_content_point(
    Path((index, content_index)): Path<(usize, usize)>,
) -> Result<Json<PresentationResponse>, HandlerError> {
    let mut studio = STUDIO.lock().await;
    with_session(&mut studio, |s| {
        s.editor.delete_content_point(index, content_index)
    })?;
    presentation_response(&studio)
}

#[derive(Deserialize, Debug)]
struct RefineQuery {
    slide_index: usize,
    /** \brief -1 代表標題，0 起為內容條目。 */
    content_index: isize,
}

#[derive(Serialize, Debug)]
struct DialogStatus {
    seq: u64,
    preview: String,
    state: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    error: Option<String>,
}

fn dialog_state_label(state: &DialogState) -> (String, Option<String>) {
    match state {
        DialogState::Pending => ("pending".to_string(), None),
        DialogState::Settled => ("settled".to_string(), None),
        DialogState::Failed(msg) => ("failed".to_string(), Some(msg.clone())),
    }
}

/**
 * \brief 優化 SSE：開啟對話並以事件流回推累積中的預覽。
 * \details 事件流只服務目前這次開啟；對話關閉後遲到的結果被丟棄。
 */
async fn refine_sse(
    Query(q): Query<RefineQuery>,
) -> Result<Sse<impl tokio_stream::Stream<Item = Result<Event, Infallible>>>, HandlerError> {
    let cfg = load_config()?;

    let (seq, original) = {
        let mut studio = STUDIO.lock().await;
        let Phase::Editing(session) = &mut *studio else {
            return Err(internal_err(anyhow!("no presentation open")));
        };
        let slide = session
            .editor
            .slide(q.slide_index)
            .ok_or_else(|| internal_err(anyhow!("slide index out of range")))?;
        let original = if q.content_index < 0 {
            slide.title.clone()
        } else {
            slide
                .content
                .get(q.content_index as usize)
                .cloned()
                .ok_or_else(|| internal_err(anyhow!("content index out of range")))?
        };
        let target = RefineTarget {
            slide_index: q.slide_index,
            content_index: q.content_index,
        };
        let seq = session
            .dialogs
            .begin_refine(target, original.clone())
            .map_err(internal_err)?;
        (seq, original)
    };

    let (tx, rx) = mpsc::unbounded_channel::<Result<Event, Infallible>>();
    let _ = tx.send(Ok(Event::default()
        .event("meta")
        .data(serde_json::json!({ "seq": seq }).to_string())));

    tokio::spawn(async move {
        match ai::refine_text_stream(&cfg, &original).await {
            Ok(mut stream) => {
                use futures_util::StreamExt;
                let mut last = String::new();
                while let Some(item) = stream.as_mut().next().await {
                    match item {
                        Ok(snapshot) => {
                            last = snapshot.clone();
                            {
                                let mut studio = STUDIO.lock().await;
                                if let Phase::Editing(session) = &mut *studio {
                                    session.dialogs.push_refine_snapshot(seq, &snapshot);
                                }
                            }
                            let _ = tx.send(Ok(Event::default().data(snapshot)));
                        }
                        Err(e) => {
                            telemetry::log_error("server.refine", &format!("stream error: {}", e));
                            let mut studio = STUDIO.lock().await;
                            if let Phase::Editing(session) = &mut *studio {
                                session.dialogs.fail_refine(seq, e.to_string());
                            }
                            let _ =
                                tx.send(Ok(Event::default().event("error").data(e.to_string())));
                            return;
                        }
                    }
                }
                let final_text = last.trim().to_string();
                {
                    let mut studio = STUDIO.lock().await;
                    if let Phase::Editing(session) = &mut *studio {
                        session.dialogs.settle_refine(seq, &final_text);
                    }
                }
                telemetry::log_ai_call(cfg.provider, "refine", "settled");
                let _ = tx.send(Ok(Event::default().event("done").data(final_text)));
            }
            Err(e) => {
                telemetry::log_error("server.refine", &format!("refine failed: {}", e));
                let mut studio = STUDIO.lock().await;
                if let Phase::Editing(session) = &mut *studio {
                    session.dialogs.fail_refine(seq, e.to_string());
                }
                let _ = tx.send(Ok(Event::default().event("error").data(e.to_string())));
            }
        }
    });

    let stream = UnboundedReceiverStream::new(rx);
    Ok(Sse::new(stream).keep_alive(KeepAlive::new()))
}

async fn get_refine_dialog() -> Result<Json<serde_json::Value>, HandlerError> {
    let studio = STUDIO.lock().await;
    let Phase::Editing(session) = &*studio else {
        return Err(internal_err(anyhow!("no presentation open")));
    };
    match session.dialogs.refine_dialog() {
        Some(dialog) => {
            let (state, error) = dialog_state_label(dialog.state());
            Ok(Json(serde_json::json!(DialogStatus {
                seq: dialog.seq(),
                preview: dialog.preview().to_string(),
                state,
                error,
            })))
        }
        None => Ok(Json(serde_json::json!(null))),
    }
}

async fn accept_refine() -> Result<Json<PresentationResponse>, HandlerError> {
    let mut studio = STUDIO.lock().await;
    let applied = with_session(&mut studio, |s| {
        let EditSession { editor, dialogs } = s;
        dialogs.accept_refine(editor)
    })?;
    if !applied {
        return Err(internal_err(anyhow!("no settled refinement to accept")));
    }
    presentation_response(&studio)
}

async fn close_refine() -> Result<Json<serde_json::Value>, HandlerError> {
    let mut studio = STUDIO.lock().await;
    with_session(&mut studio, |s| s.dialogs.close_refine())?;
    Ok(Json(serde_json::json!({ "closed": true })))
}

#[derive(Deserialize, Debug)]
struct ImageInput {
    slide_index: usize,
    prompt: String,
}

/**
 * \brief 開啟生圖對話並在背景驅動生成；結果憑序號回填。
 */
async fn begin_image(Json(input): Json<ImageInput>) -> Result<Json<serde_json::Value>, HandlerError> {
    let cfg = load_config()?;
    let seq = {
        let mut studio = STUDIO.lock().await;
        let Phase::Editing(session) = &mut *studio else {
            return Err(internal_err(anyhow!("no presentation open")));
        };
        if session.editor.slide(input.slide_index).is_none() {
            return Err(internal_err(anyhow!("slide index out of range")));
        }
        session
            .dialogs
            .begin_image(input.slide_index, input.prompt.clone())
            .map_err(internal_err)?
    };

    let prompt = input.prompt;
    tokio::spawn(async move {
        match ai::generate_image(&cfg, &prompt).await {
            Ok(url) => {
                telemetry::log_ai_call(cfg.provider, "image", "settled");
                let mut studio = STUDIO.lock().await;
                if let Phase::Editing(session) = &mut *studio {
                    session.dialogs.settle_image(seq, url);
                }
            }
            Err(e) => {
                telemetry::log_error("server.image", &format!("generate failed: {}", e));
                let mut studio = STUDIO.lock().await;
                if let Phase::Editing(session) = &mut *studio {
                    session.dialogs.fail_image(seq, e.to_string());
                }
            }
        }
    });

    Ok(Json(serde_json::json!({ "seq": seq })))
}

async fn get_image_dialog() -> Result<Json<serde_json::Value>, HandlerError> {
    let studio = STUDIO.lock().await;
    let Phase::Editing(session) = &*studio else {
        return Err(internal_err(anyhow!("no presentation open")));
    };
    match session.dialogs.image_dialog() {
        Some(dialog) => {
            let (state, error) = dialog_state_label(dialog.state());
            Ok(Json(serde_json::json!({
                "seq": dialog.seq(),
                "slide_index": dialog.slide_index(),
                "prompt": dialog.prompt(),
                "image_url": dialog.image_url(),
                "state": state,
                "error": error,
            })))
        }
        None => Ok(Json(serde_json::json!(null))),
    }
}

async fn accept_image() -> Result<Json<PresentationResponse>, HandlerError> {
    let mut studio = STUDIO.lock().await;
    let applied = with_session(&mut studio, |s| {
        let EditSession { editor, dialogs } = s;
        dialogs.accept_image(editor)
    })?;
    if !applied {
        return Err(internal_err(anyhow!("no generated image to accept")));
    }
    presentation_response(&studio)
}

async fn close_image() -> Result<Json<serde_json::Value>, HandlerError> {
    let mut studio = STUDIO.lock().await;
    with_session(&mut studio, |s| s.dialogs.close_image())?;
    Ok(Json(serde_json::json!({ "closed": true })))
}

#[derive(Deserialize, Debug)]
struct ExportInput {
    format: String,
    #[serde(default)]
    out_dir: Option<String>,
}

/**
 * \brief 匯出目前簡報快照；編輯狀態不受影響。
 */
async fn export_deck(Json(input): Json<ExportInput>) -> Result<Json<serde_json::Value>, HandlerError> {
    let format = ExportFormat::parse(&input.format)
        .ok_or_else(|| internal_err(anyhow!("unknown export format: {}", input.format)))?;
    let snapshot = {
        let studio = STUDIO.lock().await;
        let Phase::Editing(session) = &*studio else {
            return Err(internal_err(anyhow!("no presentation open")));
        };
        session.editor.snapshot()
    };
    let out_dir = input.out_dir.unwrap_or_else(|| ".".to_string());
    let path = export_presentation(&snapshot, format, std::path::Path::new(&out_dir))
        .map_err(internal_err)?;
    telemetry::log_event("server.export", &format!("{} -> {}", input.format, path.display()));
    Ok(Json(serde_json::json!({ "path": path.display().to_string() })))
}

async fn health_check() -> Json<serde_json::Value> {
    let phase = match &*STUDIO.lock().await {
        Phase::Welcome => "welcome",
        Phase::Outline(_) => "outline",
        Phase::Editing(_) => "editing",
    };
    Json(serde_json::json!({ "ok": true, "phase": phase }))
}
