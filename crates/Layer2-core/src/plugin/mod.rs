//! # Plugin Lifecycle
//!
//! 호스트 입장에서 본 상점 주인 시스템의 진입점
//!
//! ## 아키텍처
//!
//! ```text
//! ┌──────────────────────────────────────────────────────────┐
//! │                   ShopkeepersPlugin                      │
//! │                                                          │
//! │  enable ──▶ ShopkeeperStore::load ──▶ register(Loaded)   │
//! │                                                          │
//! │  HostEvent ──▶ ┌──────────────────────────────┐          │
//! │                │  LifecycleCoordinator        │          │
//! │                │   (enable ~ disable 동안만)   │          │
//! │                └──────────────┬───────────────┘          │
//! │                               │ request_save             │
//! │                               ▼                          │
//! │                        SaveSink (SaveWorker)             │
//! │                                                          │
//! │  disable ──▶ on_disable ──▶ 코디네이터 폐기               │
//! └──────────────────────────────────────────────────────────┘
//! ```
//!
//! 재활성화(reload)마다 새 코디네이터가 만들어지므로 세션 ID는 1부터 다시 시작합니다.

mod host;
mod manager;

pub use host::HostEvent;
pub use manager::{EnableSummary, ShopkeepersPlugin};
