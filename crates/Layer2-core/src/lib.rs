//! shopkeepers-core: Core Runtime for Shopkeepers
//!
//! Layer2 - 상점 주인 레지스트리와 라이프사이클 레이어
//!
//! # 주요 모듈
//!
//! - `registry`: 세 인덱스 (IdentityIndex, SpatialIndex, ActivationTracker)
//! - `lifecycle`: LifecycleCoordinator 상태 머신, 틱 스케줄러, 재조정 패스
//! - `shop_object`: 물리 오브젝트 기능(ShopObject)과 타입 레지스트리, 가상 월드
//! - `plugin`: enable / disable / reload 와 호스트 이벤트 분배
//!
//! # 사용 예시
//!
//! ```ignore
//! use shopkeepers_core::{HostEvent, ShopkeepersPlugin, VirtualWorld};
//!
//! let world = VirtualWorld::new();
//! let mut plugin = ShopkeepersPlugin::new(config, world.object_types(), store)
//!     .with_save_sink(Arc::new(worker.handle()));
//!
//! plugin.enable(host_loaded_regions)?;
//! let sid = plugin.create_shopkeeper_of_type("mob", BlockPos::new("world", 10, 64, 10))?;
//!
//! plugin.handle(HostEvent::RegionLoaded { key, newly_generated: false });
//! plugin.handle(HostEvent::Tick);
//!
//! plugin.disable()?;
//! ```

pub mod lifecycle;
pub mod plugin;
pub mod registry;
pub mod shop_object;

// Re-exports: Lifecycle
pub use lifecycle::{
    ActivationError, ActivationOutcome, CoordinatorBuilder, CoordinatorStats, DueWork,
    InvariantViolation, LifecycleCoordinator, LivenessReport, NoopUiSessions, RegionActivation,
    RegistryError, ScheduledPass, ShopkeeperRef, SpawnQueue, SpawnQueueReport, TickReport,
    TickScheduler, UiSessions, VerifierReport,
};

// Re-exports: Registry
pub use registry::{
    ActivationTracker, Deactivation, IdentityIndex, ShopkeeperRecord, SpatialIndex, SpawnState,
};

// Re-exports: Shop Object
pub use shop_object::{
    ShopObject, ShopObjectFactory, ShopObjectTypes, SpawnError, VirtualKind, VirtualShopObject,
    VirtualWorld,
};

// Re-exports: Plugin
pub use plugin::{EnableSummary, HostEvent, ShopkeepersPlugin};
