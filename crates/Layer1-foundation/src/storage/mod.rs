//! Storage module for Shopkeepers
//!
//! - `json`: JSON - 범용 파일 저장/로드
//! - `shopkeepers`: 상점 주인 영구 데이터 (`shopkeepers.json`)
//! - `worker`: 백그라운드 저장 워커 (SaveSink 구현)

mod json;
mod shopkeepers;
mod worker;

// JSON Storage (범용)
pub use json::JsonStore;

// Shopkeeper 데이터
pub use shopkeepers::{ShopkeeperData, ShopkeeperStore, StoredShopkeepers, SHOPKEEPERS_FILE};

// 저장 요청
pub use worker::{NoopSaveSink, SaveBarrier, SaveHandle, SaveSink, SaveStatus, SaveWorker};
