//! Config - 통합 설정 관리
//!
//! - `settings.rs` - ShopkeepersConfig (리전 시프트, 주기 작업 간격 등)

mod settings;

pub use settings::{ShopkeepersConfig, CONFIG_FILE};
