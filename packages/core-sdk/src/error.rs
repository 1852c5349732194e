use thiserror::Error;

use crate::models::LlmProvider;

/** \brief 本 crate 統一的 Result 別名。 */
pub type Result<T> = std::result::Result<T, Error>;

/**
 * \brief 錯誤分類。
 * \details 組態與遠端錯誤向使用者介面呈現並中止操作；本地驗證錯誤
 *          （刪到空簡報、索引越界）由編輯器以 no-op 吸收，不走此型別。
 */
#[derive(Error, Debug)]
pub enum Error {
    /// 尚未設定 API 金鑰，操作在發送任何遠端請求前被擋下。
    #[error("API Key for {} is missing.", .0.as_str())]
    MissingApiKey(LlmProvider),

    /// 選到尚未接入的供應商。
    #[error("{} integration is not implemented yet.", .0.as_str())]
    ProviderNotImplemented(LlmProvider),

    /// 網路失敗、供應商回報錯誤或請求逾時。
    #[error("remote call failed: {0}")]
    Remote(String),

    /// 遠端回應不是預期的結構。
    #[error("malformed provider response: {0}")]
    MalformedResponse(String),

    /// 圖片生成因內容安全政策被拒（與一般遠端錯誤區分）。
    #[error("image generation was blocked by safety policies")]
    SafetyRejected,

    /// 同一編輯工作階段一次只允許一個開啟中的優化/生圖對話。
    #[error("another AI dialog is still open")]
    DialogBusy,

    /// 不支援的上傳檔案型別。
    #[error("unsupported file type: {0}")]
    UnsupportedFile(String),

    /// 檔案副檔名受支援但內容無法解析（損壞或受保護）。
    #[error("could not parse file: {0}")]
    FileParse(String),

    /// 匯出轉接器失敗；編輯狀態不受影響。
    #[error("export failed: {0}")]
    Export(String),

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    #[error("settings store error: {0}")]
    Settings(#[from] rusqlite::Error),
}

impl Error {
    /**
     * \brief 將 reqwest 錯誤歸入遠端分類；逾時同樣以一般遠端錯誤呈現。
     */
    pub fn from_reqwest(err: reqwest::Error) -> Error {
        if err.is_timeout() {
            Error::Remote("request timed out".to_string())
        } else {
            Error::Remote(err.to_string())
        }
    }
}
