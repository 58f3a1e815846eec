//! Core Module - 월드 타입
//!
//! 레지스트리의 모든 인덱스가 공유하는 키 타입을 정의합니다.
//!
//! ## 타입 계층
//!
//! ```text
//! BlockPos (world, x, y, z)  ── from_block(shift) ──▶  RegionKey (world, x >> shift, z >> shift)
//!
//! ObjectId ─┬─ Entity(Uuid)      몹/NPC 형태 (스폰마다 새 ID)
//!           ├─ Block(BlockPos)   블록/표지판 형태 (위치가 곧 ID)
//!           └─ Custom(String)    외부 구현체 정의
//! ```

mod types;

pub use types::{
    BlockPos, ObjectId, PermanentId, RegionKey, SessionId, DEFAULT_REGION_SHIFT, MAX_REGION_SHIFT,
};
