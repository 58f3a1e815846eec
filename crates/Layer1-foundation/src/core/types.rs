//! World Types - 위치, 리전 키, 오브젝트 식별자

use serde::{Deserialize, Serialize};
use std::fmt;
use uuid::Uuid;

/// 기본 리전 시프트 (16x16 블록 단위)
pub const DEFAULT_REGION_SHIFT: u8 = 4;

/// 허용되는 최대 리전 시프트
pub const MAX_REGION_SHIFT: u8 = 16;

/// 영구 식별자 - 생성 시 한 번 할당되고 재시작/리로드 후에도 유지됨
pub type PermanentId = Uuid;

// ============================================================================
// SessionId
// ============================================================================

/// 세션 식별자
///
/// 현재 로드된 상점 주인들 사이에서만 고유하며 저장되지 않습니다.
/// 코디네이터가 새로 만들어질 때마다 1부터 다시 할당됩니다.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct SessionId(pub u32);

impl SessionId {
    pub fn get(self) -> u32 {
        self.0
    }
}

impl fmt::Display for SessionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

// ============================================================================
// BlockPos
// ============================================================================

/// 블록 좌표 (월드 이름 포함)
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct BlockPos {
    pub world: String,
    pub x: i32,
    pub y: i32,
    pub z: i32,
}

impl BlockPos {
    pub fn new(world: impl Into<String>, x: i32, y: i32, z: i32) -> Self {
        Self {
            world: world.into(),
            x,
            y,
            z,
        }
    }

    /// 이 위치가 속한 리전
    pub fn region(&self, shift: u8) -> RegionKey {
        RegionKey::from_block(self, shift)
    }
}

impl fmt::Display for BlockPos {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{},{},{},{}", self.world, self.x, self.y, self.z)
    }
}

// ============================================================================
// RegionKey
// ============================================================================

/// 리전 키 - 호스트 월드 스트리밍(로드/언로드)의 단위
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct RegionKey {
    pub world: String,
    pub x: i32,
    pub z: i32,
}

impl RegionKey {
    pub fn new(world: impl Into<String>, x: i32, z: i32) -> Self {
        Self {
            world: world.into(),
            x,
            z,
        }
    }

    /// 블록 좌표에서 리전 키 계산
    ///
    /// 산술 시프트이므로 음수 좌표는 내림 처리됩니다 (-1 >> 4 == -1).
    pub fn from_block(pos: &BlockPos, shift: u8) -> Self {
        Self {
            world: pos.world.clone(),
            x: Self::to_region_coord(pos.x, shift),
            z: Self::to_region_coord(pos.z, shift),
        }
    }

    /// 32 이상의 시프트는 부호만 남습니다 (0 또는 -1).
    pub fn to_region_coord(block_coord: i32, shift: u8) -> i32 {
        block_coord
            .checked_shr(u32::from(shift))
            .unwrap_or(if block_coord < 0 { -1 } else { 0 })
    }

    /// 같은 월드의 리전인지 확인
    pub fn is_in_world(&self, world: &str) -> bool {
        self.world == world
    }
}

impl fmt::Display for RegionKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{},{},{}", self.world, self.x, self.z)
    }
}

// ============================================================================
// ObjectId
// ============================================================================

/// 현재 살아있는 물리 오브젝트의 식별자
///
/// 오브젝트가 파괴 후 다시 생성되면 값이 바뀔 수 있습니다.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(tag = "kind", content = "value", rename_all = "snake_case")]
pub enum ObjectId {
    /// 엔티티 형태 (몹, NPC)
    Entity(Uuid),
    /// 블록 형태 (블록, 표지판) - 점유한 블록이 곧 식별자
    Block(BlockPos),
    /// 외부 구현체가 정의한 식별자
    Custom(String),
}

impl ObjectId {
    pub fn is_block(&self) -> bool {
        matches!(self, Self::Block(_))
    }
}

impl fmt::Display for ObjectId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Entity(id) => write!(f, "entity:{}", id),
            Self::Block(pos) => write!(f, "block:{}", pos),
            Self::Custom(id) => write!(f, "custom:{}", id),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_region_from_block() {
        let pos = BlockPos::new("world", 70, 64, -20);
        let key = RegionKey::from_block(&pos, 4);
        assert_eq!(key, RegionKey::new("world", 4, -2));
    }

    #[test]
    fn test_negative_coords_floor() {
        assert_eq!(RegionKey::to_region_coord(-1, 4), -1);
        assert_eq!(RegionKey::to_region_coord(-16, 4), -1);
        assert_eq!(RegionKey::to_region_coord(-17, 4), -2);
        assert_eq!(RegionKey::to_region_coord(15, 4), 0);
    }

    #[test]
    fn test_same_region_requires_same_world() {
        let a = BlockPos::new("world", 1, 0, 1).region(4);
        let b = BlockPos::new("nether", 1, 0, 1).region(4);
        assert_ne!(a, b);
        assert!(a.is_in_world("world"));
    }

    #[test]
    fn test_y_does_not_affect_region() {
        let low = BlockPos::new("world", 8, -60, 8).region(4);
        let high = BlockPos::new("world", 8, 300, 8).region(4);
        assert_eq!(low, high);
    }

    #[test]
    fn test_custom_shift() {
        let pos = BlockPos::new("world", 1000, 0, -1000);
        assert_eq!(pos.region(9), RegionKey::new("world", 1, -2));
    }

    #[test]
    fn test_oversized_shift_keeps_sign() {
        assert_eq!(RegionKey::to_region_coord(123_456, 40), 0);
        assert_eq!(RegionKey::to_region_coord(-5, 40), -1);
        assert_eq!(RegionKey::to_region_coord(i32::MIN, 32), -1);
        assert_eq!(
            BlockPos::new("world", -5, 0, 70).region(255),
            RegionKey::new("world", -1, 0)
        );
    }

    #[test]
    fn test_object_id_display() {
        let id = ObjectId::Block(BlockPos::new("world", 1, 2, 3));
        assert_eq!(id.to_string(), "block:world,1,2,3");
        assert!(id.is_block());
    }
}
