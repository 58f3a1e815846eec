//! ShopObject - 상점 주인의 물리 오브젝트 capability
//!
//! - `traits.rs` - ShopObject trait, SpawnError
//! - `types.rs` - 오브젝트 타입 레지스트리 (저장 데이터 → 오브젝트)
//! - `virtual_world.rs` - 시뮬레이션/테스트용 가상 월드

mod traits;
mod types;
mod virtual_world;

pub use traits::{ShopObject, SpawnError};
pub use types::{ShopObjectFactory, ShopObjectTypes};
pub use virtual_world::{VirtualKind, VirtualShopObject, VirtualWorld};
