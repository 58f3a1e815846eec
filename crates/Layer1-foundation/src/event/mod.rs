//! Event System - 상점 주인 라이프사이클 이벤트
//!
//! 코디네이터가 레지스트리 상태를 바꿀 때마다 이벤트를 발행합니다.
//!
//! ## 아키텍처
//!
//! ```text
//! ┌──────────────────────────────────────────────────────────┐
//! │                        EventBus                          │
//! │   publish(event) ──┬──▶ history (최근 N개)               │
//! │                    ├──▶ broadcast::Receiver (스트림)     │
//! │                    └──▶ EventListener (동기 콜백)        │
//! └──────────────────────────────────────────────────────────┘
//! ```
//!
//! ## 사용법
//!
//! ```ignore
//! use shopkeepers_foundation::event::{EventBus, EventFilter, EventKind};
//!
//! let bus = EventBus::new();
//! let mut rx = bus.receiver();
//!
//! bus.subscribe_with_filter(
//!     Arc::new(MyListener),
//!     Some(EventFilter::new().with_kinds(vec![EventKind::Activated])),
//! );
//! ```

pub mod bus;
pub mod types;

pub use bus::{EventBus, EventBusConfig, EventFilter, EventListener, ListenerId};

pub use types::{AddCause, EventKind, EventRecord, RemoveCause, ShopkeeperEvent};
