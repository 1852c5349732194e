use rusqlite::{params, Connection, ErrorCode, OptionalExtension};
use std::{thread, time::Duration};

use crate::error::Result;
use crate::models::{AiConfig, LlmProvider, Theme};

/**
 * \brief 打開預設資料庫檔案（本地目錄下的 slidequill.db）。
 */
pub fn open_default_db() -> Result<Connection> {
    let conn = Connection::open("slidequill.db")?;
    conn.busy_timeout(Duration::from_secs(5))?;
    Ok(conn)
}

/**
 * \brief 執行資料庫遷移，建立必要表結構。
 */
pub fn migrate(conn: &Connection) -> Result<()> {
    retry_on_locked(|| {
        conn.execute_batch(
            r#"
        PRAGMA journal_mode=WAL;
        CREATE TABLE IF NOT EXISTS settings (
            key TEXT PRIMARY KEY,
            value TEXT NOT NULL
        );

        CREATE TABLE IF NOT EXISTS api_keys (
            provider TEXT PRIMARY KEY,
            api_key TEXT NOT NULL
        );
        "#,
        )
    })?;
    Ok(())
}

fn set_setting(conn: &Connection, key: &str, value: &str) -> Result<()> {
    retry_on_locked(|| {
        conn.execute(
            "INSERT INTO settings (key, value) VALUES (?1, ?2)
         ON CONFLICT(key) DO UPDATE SET value=excluded.value",
            params![key, value],
        )
    })?;
    Ok(())
}

fn get_setting(conn: &Connection, key: &str) -> Result<Option<String>> {
    let val = conn
        .query_row(
            "SELECT value FROM settings WHERE key=?1",
            params![key],
            |row| row.get::<_, String>(0),
        )
        .optional()?;
    Ok(val)
}

/**
 * \brief 讀取 AI 供應商設定並附上對應的 API 金鑰。
 * \details 過期或未知的 provider/model 組合靜默重設為
 *          gemini / 預設模型，並把重設後的值寫回資料庫。
 */
pub fn load_ai_settings(conn: &Connection) -> Result<AiConfig> {
    let stored_provider = get_setting(conn, "ai_provider")?;
    let stored_model = get_setting(conn, "ai_model")?;

    let provider = stored_provider
        .as_deref()
        .and_then(LlmProvider::parse)
        .unwrap_or(LlmProvider::Gemini);
    let model = match stored_model {
        Some(m) if provider.supports_model(&m) => m,
        _ => provider.default_model().to_string(),
    };

    // 重設後的組合寫回，之後的讀取不再經過回退
    if stored_provider.as_deref() != Some(provider.as_str()) {
        set_setting(conn, "ai_provider", provider.as_str())?;
    }
    if get_setting(conn, "ai_model")?.as_deref() != Some(model.as_str()) {
        set_setting(conn, "ai_model", &model)?;
    }

    let mut cfg = AiConfig::new(provider, model);
    cfg.api_key = get_api_key(conn, provider)?;
    Ok(cfg)
}

/**
 * \brief 保存供應商與模型選擇；不支援的模型以該供應商預設模型代入。
 */
pub fn save_ai_settings(conn: &Connection, provider: LlmProvider, model: &str) -> Result<()> {
    let model = if provider.supports_model(model) {
        model
    } else {
        provider.default_model()
    };
    set_setting(conn, "ai_provider", provider.as_str())?;
    set_setting(conn, "ai_model", model)?;
    Ok(())
}

/**
 * \brief 讀取某供應商的 API 金鑰（每家各自保存）。
 */
pub fn get_api_key(conn: &Connection, provider: LlmProvider) -> Result<Option<String>> {
    let val = conn
        .query_row(
            "SELECT api_key FROM api_keys WHERE provider=?1",
            params![provider.as_str()],
            |row| row.get::<_, String>(0),
        )
        .optional()?;
    Ok(val)
}

/**
 * \brief 設定某供應商的 API 金鑰；空字串視為刪除。
 */
pub fn set_api_key(conn: &Connection, provider: LlmProvider, api_key: &str) -> Result<()> {
    if api_key.trim().is_empty() {
        retry_on_locked(|| {
            conn.execute(
                "DELETE FROM api_keys WHERE provider=?1",
                params![provider.as_str()],
            )
        })?;
        return Ok(());
    }
    retry_on_locked(|| {
        conn.execute(
            "INSERT INTO api_keys (provider, api_key) VALUES (?1, ?2)
         ON CONFLICT(provider) DO UPDATE SET api_key=excluded.api_key",
            params![provider.as_str(), api_key],
        )
    })?;
    Ok(())
}

/**
 * \brief 讀取介面主題；未設定或不認得的值回到系統預設。
 */
pub fn get_theme(conn: &Connection) -> Result<Theme> {
    let theme = get_setting(conn, "theme")?
        .as_deref()
        .and_then(Theme::parse)
        .unwrap_or_default();
    Ok(theme)
}

pub fn set_theme(conn: &Connection, theme: Theme) -> Result<()> {
    set_setting(conn, "theme", theme.as_str())
}

/**
 * \brief 讀取遙測開關（預設關閉）。
 */
pub fn get_telemetry_enabled(conn: &Connection) -> Result<bool> {
    Ok(get_setting(conn, "telemetry_enabled")?
        .map(|s| s == "1")
        .unwrap_or(false))
}

pub fn set_telemetry_enabled(conn: &Connection, enabled: bool) -> Result<()> {
    set_setting(conn, "telemetry_enabled", if enabled { "1" } else { "0" })
}

/**
 * \brief 針對 SQLite 鎖衝突的重試助手。
 * \details 捕獲 `database is locked` 類錯誤並指數退避，最多嘗試 6 次。
 */
fn retry_on_locked<T, F>(mut action: F) -> Result<T>
where
    F: FnMut() -> rusqlite::Result<T>,
{
    const MAX_RETRIES: usize = 5;
    for attempt in 0..=MAX_RETRIES {
        match action() {
            Ok(value) => return Ok(value),
            Err(rusqlite::Error::SqliteFailure(err, _))
                if matches!(
                    err.code,
                    ErrorCode::DatabaseBusy | ErrorCode::DatabaseLocked
                ) && attempt < MAX_RETRIES =>
            {
                let backoff = Duration::from_millis(200 * (attempt as u64 + 1));
                thread::sleep(backoff);
                continue;
            }
            Err(e) => return Err(e.into()),
        }
    }
    unreachable!("retry_on_locked should have returned within the loop");
}

#[cfg(test)]
mod tests {
    use super::*;

    fn mem_conn() -> Connection {
        let conn = Connection::open_in_memory().expect("open in-memory db");
        migrate(&conn).expect("migrate");
        conn
    }

    #[test]
    fn test_empty_store_yields_persisted_defaults() {
        let conn = mem_conn();
        let cfg = load_ai_settings(&conn).expect("load settings");
        assert_eq!(cfg.provider, LlmProvider::Gemini);
        assert_eq!(cfg.model, "gemini-2.5-flash");
        assert!(cfg.api_key.is_none());
        // 預設值已寫回
        assert_eq!(
            get_setting(&conn, "ai_provider").expect("read").as_deref(),
            Some("gemini")
        );
        assert_eq!(
            get_setting(&conn, "ai_model").expect("read").as_deref(),
            Some("gemini-2.5-flash")
        );
    }

    #[test]
    fn test_stale_model_is_reset_on_load() {
        let conn = mem_conn();
        save_ai_settings(&conn, LlmProvider::Gemini, "gemini-2.5-pro").expect("save");
        set_setting(&conn, "ai_model", "gemini-1.0-retired").expect("tamper");
        let cfg = load_ai_settings(&conn).expect("load settings");
        assert_eq!(cfg.provider, LlmProvider::Gemini);
        assert_eq!(cfg.model, "gemini-2.5-flash");
        assert_eq!(
            get_setting(&conn, "ai_model").expect("read").as_deref(),
            Some("gemini-2.5-flash")
        );
    }

    #[test]
    fn test_unknown_provider_is_reset_on_load() {
        let conn = mem_conn();
        set_setting(&conn, "ai_provider", "palm").expect("tamper");
        set_setting(&conn, "ai_model", "whatever").expect("tamper");
        let cfg = load_ai_settings(&conn).expect("load settings");
        assert_eq!(cfg.provider, LlmProvider::Gemini);
        assert_eq!(cfg.model, "gemini-2.5-flash");
    }

    #[test]
    fn test_save_coerces_unsupported_model() {
        let conn = mem_conn();
        save_ai_settings(&conn, LlmProvider::OpenAi, "gpt-99-turbo").expect("save");
        let cfg = load_ai_settings(&conn).expect("load settings");
        assert_eq!(cfg.provider, LlmProvider::OpenAi);
        assert_eq!(cfg.model, LlmProvider::OpenAi.default_model());
    }

    #[test]
    fn test_api_keys_are_stored_per_provider() {
        let conn = mem_conn();
        set_api_key(&conn, LlmProvider::Gemini, "g-key").expect("set gemini key");
        set_api_key(&conn, LlmProvider::OpenAi, "o-key").expect("set openai key");
        assert_eq!(
            get_api_key(&conn, LlmProvider::Gemini).expect("get").as_deref(),
            Some("g-key")
        );
        assert_eq!(
            get_api_key(&conn, LlmProvider::OpenAi).expect("get").as_deref(),
            Some("o-key")
        );
        assert!(get_api_key(&conn, LlmProvider::Grok).expect("get").is_none());

        save_ai_settings(&conn, LlmProvider::Gemini, "gemini-2.5-flash").expect("save");
        let cfg = load_ai_settings(&conn).expect("load settings");
        assert_eq!(cfg.api_key.as_deref(), Some("g-key"));
    }

    #[test]
    fn test_blank_api_key_deletes_row() {
        let conn = mem_conn();
        set_api_key(&conn, LlmProvider::Gemini, "g-key").expect("set key");
        set_api_key(&conn, LlmProvider::Gemini, "   ").expect("clear key");
        assert!(get_api_key(&conn, LlmProvider::Gemini).expect("get").is_none());
    }

    #[test]
    fn test_telemetry_flag_defaults_off() {
        let conn = mem_conn();
        assert!(!get_telemetry_enabled(&conn).expect("default"));
        set_telemetry_enabled(&conn, true).expect("enable");
        assert!(get_telemetry_enabled(&conn).expect("read"));
    }

    #[test]
    fn test_theme_round_trip_and_fallback() {
        let conn = mem_conn();
        assert_eq!(get_theme(&conn).expect("default"), Theme::System);
        set_theme(&conn, Theme::Dark).expect("set theme");
        assert_eq!(get_theme(&conn).expect("read"), Theme::Dark);
        set_setting(&conn, "theme", "sepia").expect("tamper");
        assert_eq!(get_theme(&conn).expect("fallback"), Theme::System);
    }
}
