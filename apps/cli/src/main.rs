use std::io::BufRead;
use std::path::{Path, PathBuf};

use anyhow::{anyhow, Context, Result};
use clap::{Parser, Subcommand};
use futures_util::StreamExt;

use slidequill_core_sdk::{
    ai::{self, OutputLanguage},
    db,
    deck::{split_columns, DeckEditor},
    export::{export_presentation, ExportFormat},
    extract,
    models::{builtin_templates, find_template, LlmProvider, Presentation, SlideLayout, Theme},
    outline::OutlineDraft,
    playback::Playback,
    server, telemetry,
};

/**
 * \brief CLI 程式入口：文件 → 大綱 → 簡報 → 匯出/播放的本地工作流。
 */
#[derive(Parser, Debug)]
#[command(name = "slidequill", version, about = "AI presentation authoring")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /**
     * \brief 初始化 AI 供應商設定與 API 金鑰。
     */
    Init {
        #[arg(long, default_value = "gemini")]
        provider: String,
        #[arg(long)]
        model: Option<String>,
        #[arg(long)]
        api_key: String,
        #[arg(long, default_value = "system")]
        theme: String,
        #[arg(long, default_value_t = false)]
        enable_telemetry: bool,
    },

    /**
     * \brief 列出受支援的供應商與模型。
     */
    Models,

    /**
     * \brief 從來源文件生成大綱；指定範本時直接產出簡報檔。
     */
    Generate {
        #[arg(long)]
        file: PathBuf,
        #[arg(long, default_value = "EN")]
        language: String,
        /** \brief 範本 id（如 professional-blue）；缺省時僅輸出大綱 */
        #[arg(long)]
        template: Option<String>,
        #[arg(long, default_value = "presentation.json")]
        out: PathBuf,
    },

    /**
     * \brief 對簡報檔中的某個欄位做 AI 優化並串流顯示。
     */
    Refine {
        #[arg(long)]
        deck: PathBuf,
        #[arg(long)]
        slide: usize,
        /** \brief -1 代表標題，0 起為內容條目 */
        #[arg(long, default_value_t = -1)]
        content_index: isize,
        /** \brief 接受結果並寫回簡報檔 */
        #[arg(long, default_value_t = false)]
        apply: bool,
    },

    /**
     * \brief 匯出簡報檔為 PDF 或 PPTX。
     */
    Export {
        #[arg(long)]
        deck: PathBuf,
        #[arg(long)]
        format: String,
        #[arg(long, default_value = ".")]
        out_dir: PathBuf,
    },

    /**
     * \brief 終端機播放：n/p 翻頁，q 離開。
     */
    Present {
        #[arg(long)]
        deck: PathBuf,
    },

    /**
     * \brief 啟動本地 HTTP 服務並提供前端頁面。
     */
    Serve {
        #[arg(long, default_value = "127.0.0.1:5173")]
        addr: String,
    },
}

fn load_deck(path: &Path) -> Result<Presentation> {
    let raw = std::fs::read_to_string(path)
        .with_context(|| format!("read deck file {} failed", path.display()))?;
    serde_json::from_str(&raw).context("deck file is not a valid presentation")
}

fn save_deck(path: &Path, presentation: &Presentation) -> Result<()> {
    let raw = serde_json::to_string_pretty(presentation)?;
    std::fs::write(path, raw)
        .with_context(|| format!("write deck file {} failed", path.display()))
}

fn print_slide(presentation: &Presentation, index: usize) {
    let slide = &presentation.slides[index];
    println!(
        "--- [{}/{}] {} ({})",
        index + 1,
        presentation.slides.len(),
        slide.title,
        slide.layout.as_str()
    );
    match slide.layout {
        SlideLayout::TwoColumn => {
            let (left, right) = split_columns(&slide.content);
            for (i, point) in left.iter().enumerate() {
                let pair = right.get(i).map(String::as_str).unwrap_or("");
                println!("  * {:<36} | * {}", point, pair);
            }
        }
        _ => {
            for point in &slide.content {
                println!("  * {}", point);
            }
        }
    }
    if let Some(transition) = slide.transition {
        println!("  (transition: {})", transition.as_str());
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let conn = db::open_default_db().context("open database failed")?;
    db::migrate(&conn).context("apply migrations failed")?;
    telemetry::set_enabled(db::get_telemetry_enabled(&conn).unwrap_or(false));

    match cli.command {
        Commands::Init {
            provider,
            model,
            api_key,
            theme,
            enable_telemetry,
        } => {
            let provider = LlmProvider::parse(&provider)
                .ok_or_else(|| anyhow!("unknown provider: {}", provider))?;
            let model = model.unwrap_or_else(|| provider.default_model().to_string());
            let theme = Theme::parse(&theme).ok_or_else(|| anyhow!("unknown theme: {}", theme))?;
            db::save_ai_settings(&conn, provider, &model).context("save settings failed")?;
            db::set_api_key(&conn, provider, &api_key).context("save api key failed")?;
            db::set_theme(&conn, theme).context("save theme failed")?;
            db::set_telemetry_enabled(&conn, enable_telemetry)
                .context("save telemetry failed")?;
            telemetry::set_enabled(enable_telemetry);
            let cfg = db::load_ai_settings(&conn)?;
            println!(
                "Saved settings (provider={} | model={} | theme={})",
                cfg.provider.as_str(),
                cfg.model,
                theme.as_str()
            );
        }
        Commands::Models => {
            for provider in LlmProvider::ALL {
                let status = if provider == LlmProvider::Gemini {
                    "available"
                } else {
                    "not implemented yet"
                };
                println!("{} ({})", provider.display_name(), status);
                for model in provider.supported_models() {
                    println!("  - {}", model);
                }
            }
        }
        Commands::Generate {
            file,
            language,
            template,
            out,
        } => {
            let cfg = db::load_ai_settings(&conn).context("load settings failed")?;
            let language = OutputLanguage::parse(&language)
                .ok_or_else(|| anyhow!("unknown language: {} (expected EN or ZH_TW)", language))?;
            let document_text = extract::extract_text(&file)
                .with_context(|| format!("parse {} failed", file.display()))?;

            println!("Generating outline from {}...", file.display());
            let slides = ai::generate_outline(&cfg, &document_text, language)
                .await
                .context("outline generation failed")?;
            telemetry::log_ai_call(cfg.provider, "outline", &format!("{} slides", slides.len()));
            let draft = OutlineDraft::new(slides);

            match template {
                Some(id) => {
                    let template = find_template(&id).ok_or_else(|| {
                        anyhow!(
                            "unknown template: {} (try one of: {})",
                            id,
                            builtin_templates()
                                .iter()
                                .map(|t| t.id.clone())
                                .collect::<Vec<_>>()
                                .join(", ")
                        )
                    })?;
                    let presentation = draft.promote(template);
                    save_deck(&out, &presentation)?;
                    println!(
                        "Wrote {} ({} slides, template={})",
                        out.display(),
                        presentation.slides.len(),
                        presentation.template.id
                    );
                }
                None => {
                    println!("{}", serde_json::to_string_pretty(draft.slides())?);
                }
            }
        }
        Commands::Refine {
            deck,
            slide,
            content_index,
            apply,
        } => {
            let cfg = db::load_ai_settings(&conn).context("load settings failed")?;
            let presentation = load_deck(&deck)?;
            let target_slide = presentation
                .slides
                .get(slide)
                .ok_or_else(|| anyhow!("slide index {} out of range", slide))?;
            let original = if content_index < 0 {
                target_slide.title.clone()
            } else {
                target_slide
                    .content
                    .get(content_index as usize)
                    .cloned()
                    .ok_or_else(|| anyhow!("content index {} out of range", content_index))?
            };

            let mut stream = ai::refine_text_stream(&cfg, &original)
                .await
                .context("create refine stream failed")?;
            let mut last = String::new();
            while let Some(snapshot) = stream
                .as_mut()
                .next()
                .await
                .transpose()
                .context("refine stream error")?
            {
                // 串流項目是累積文字，只印出新增的尾段
                let delta = snapshot.strip_prefix(&last).unwrap_or(&snapshot);
                print!("{}", delta);
                use std::io::Write;
                std::io::stdout().flush().ok();
                last = snapshot;
            }
            println!();
            let refined = last.trim().to_string();
            telemetry::log_ai_call(cfg.provider, "refine", "settled");

            if apply && !refined.is_empty() {
                let mut editor = DeckEditor::from_presentation(presentation);
                if !editor.apply_refined_text(slide, content_index, refined) {
                    return Err(anyhow!("refined text could not be applied"));
                }
                save_deck(&deck, editor.presentation())?;
                println!("Applied to {}", deck.display());
            }
        }
        Commands::Export {
            deck,
            format,
            out_dir,
        } => {
            let format = ExportFormat::parse(&format)
                .ok_or_else(|| anyhow!("unknown format: {} (expected pdf or pptx)", format))?;
            let presentation = load_deck(&deck)?;
            let path = export_presentation(&presentation, format, &out_dir)
                .context("export failed")?;
            telemetry::log_event("cli.export", &format!("{}", path.display()));
            println!("Exported {}", path.display());
        }
        Commands::Present { deck } => {
            let presentation = load_deck(&deck)?;
            if presentation.slides.is_empty() {
                return Err(anyhow!("deck has no slides"));
            }
            let mut playback = Playback::new(&presentation);
            print_slide(&presentation, playback.current());
            let stdin = std::io::stdin();
            for line in stdin.lock().lines() {
                let line = line?;
                match line.trim() {
                    "n" | "next" | "" => {
                        playback.next();
                    }
                    "p" | "prev" => {
                        playback.previous();
                    }
                    "q" | "quit" => break,
                    other => {
                        println!("unknown command: {} (n/p/q)", other);
                        continue;
                    }
                }
                print_slide(&presentation, playback.current());
                if playback.is_last() {
                    println!("(end of deck)");
                }
            }
        }
        Commands::Serve { addr } => {
            server::run(&addr).await?;
        }
    }

    Ok(())
}
