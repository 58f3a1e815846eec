//! # Shopkeeper Registry
//!
//! 상점 주인 레코드와 세 가지 보조 인덱스
//!
//! ## 아키텍처
//!
//! ```text
//! ┌──────────────────────────────────────────────────────────────┐
//! │ IdentityIndex                                                │
//! │   IndexMap<SessionId, ShopkeeperRecord>   (레코드 소유)       │
//! │   HashMap<PermanentId, SessionId>                            │
//! └──────────────────────────────────────────────────────────────┘
//!          ▲ SessionId                        ▲ SessionId
//! ┌────────┴─────────────────────┐   ┌────────┴─────────────────┐
//! │ SpatialIndex                 │   │ ActivationTracker        │
//! │   world → RegionKey → [sid]  │   │   ObjectId → SessionId   │
//! └──────────────────────────────┘   └──────────────────────────┘
//! ```
//!
//! 인덱스는 LifecycleCoordinator만 변경합니다.

mod activation;
mod identity;
mod record;
mod spatial;

pub use activation::{ActivationTracker, Deactivation};
pub use identity::IdentityIndex;
pub use record::{ShopkeeperRecord, SpawnState};
pub use spatial::SpatialIndex;
