//! # shopkeepers-foundation
//!
//! Foundation layer for Shopkeepers:
//! - Core: 월드 좌표/리전/오브젝트 식별자 타입
//! - Config: 통합 설정 (ShopkeepersConfig)
//! - Storage: JsonStore (범용), ShopkeeperStore + SaveWorker (백그라운드 저장)
//! - Event: 상점 주인 라이프사이클 이벤트 버스
//!
//! ## 아키텍처
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────┐
//! │  LifecycleCoordinator (shopkeepers-core, game thread)   │
//! │        │                          │                     │
//! │        ▼                          ▼                     │
//! │  EventBus (broadcast)      SaveSink::request_save       │
//! │                                   │                     │
//! │                                   ▼                     │
//! │                      SaveWorker (tokio, spawn_blocking) │
//! │                                   │                     │
//! │                                   ▼                     │
//! │                      ShopkeeperStore (shopkeepers.json) │
//! └─────────────────────────────────────────────────────────┘
//! ```

pub mod config;
pub mod core;
pub mod error;
pub mod event;
pub mod storage;

// ============================================================================
// Error
// ============================================================================
pub use error::{Error, Result};

// ============================================================================
// Core (월드 타입)
// ============================================================================
pub use core::{
    BlockPos, ObjectId, PermanentId, RegionKey, SessionId, DEFAULT_REGION_SHIFT, MAX_REGION_SHIFT,
};

// ============================================================================
// Config (설정)
// ============================================================================
pub use config::{ShopkeepersConfig, CONFIG_FILE};

// ============================================================================
// Storage (저장소)
// ============================================================================
pub use storage::{
    JsonStore, NoopSaveSink, SaveBarrier, SaveHandle, SaveSink, SaveStatus, SaveWorker,
    ShopkeeperData, ShopkeeperStore, StoredShopkeepers, SHOPKEEPERS_FILE,
};

// ============================================================================
// Event (이벤트 시스템)
// ============================================================================
pub use event::{
    AddCause, EventBus, EventBusConfig, EventFilter, EventKind, EventListener, EventRecord,
    RemoveCause, ShopkeeperEvent,
};
