pub mod ai;
pub mod db;
pub mod deck;
pub mod error;
pub mod export;
pub mod extract;
pub mod models;
pub mod outline;
pub mod playback;
pub mod refine;
pub mod server;
pub mod telemetry;

/**
 * \brief SDK 預導入集合，方便外部引用常用模組。
 */
pub mod prelude {
    pub use crate::ai;
    pub use crate::db;
    pub use crate::deck;
    pub use crate::error;
    pub use crate::export;
    pub use crate::extract;
    pub use crate::models;
    pub use crate::outline;
    pub use crate::playback;
    pub use crate::refine;
    pub use crate::server;
    pub use crate::telemetry;
}
