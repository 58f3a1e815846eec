//! # Lifecycle
//!
//! 상점 주인 등록/활성화/비활성화/이동/삭제와 주기적 재조정
//!
//! ## 상태 전이
//!
//! ```text
//! Unregistered ──register──▶ Registered & Inactive ◀──deactivate── Registered & Active
//!                                   │        └──────activate──────────▶ │
//!                                   └────────────delete────────┬────────┘
//!                                                              ▼
//!                                                           Deleted
//! ```
//!
//! ## 틱 처리 순서
//!
//! 1. 지연된 리전 활성화
//! 2. 월드 저장 후 재스폰
//! 3. 스폰 큐 (`spawnsPerTick`)
//! 4. 생존 확인 (`livenessCheckPeriodTicks`)
//! 5. 스폰 검증 (`spawnVerifierPeriodTicks`)

mod collaborators;
mod coordinator;
mod error;
mod invariants;
mod passes;
mod scheduler;
mod spawn_queue;

pub use collaborators::{NoopUiSessions, ShopkeeperRef, UiSessions};
pub use coordinator::{
    ActivationOutcome, CoordinatorBuilder, CoordinatorStats, LifecycleCoordinator,
    RegionActivation, TickReport,
};
pub use error::{ActivationError, RegistryError};
pub use invariants::InvariantViolation;
pub use passes::{LivenessReport, VerifierReport};
pub use scheduler::{DueWork, ScheduledPass, TickScheduler};
pub use spawn_queue::{SpawnQueue, SpawnQueueReport};
