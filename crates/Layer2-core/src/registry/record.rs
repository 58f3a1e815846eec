//! Shopkeeper Record - 논리적 상점 주인

use crate::lifecycle::ShopkeeperRef;
use crate::shop_object::{ShopObject, SpawnError};
use shopkeepers_foundation::{BlockPos, ObjectId, PermanentId, RegionKey, SessionId, ShopkeeperData};
use std::fmt;

// ============================================================================
// SpawnState
// ============================================================================

/// 물리 오브젝트 상태
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SpawnState {
    /// 등록 후 한 번도 스폰되지 않음
    NeverSpawned,
    /// 살아있고 활성화 인덱스에 연결됨
    Active { object_id: ObjectId },
    /// 정상적으로 제거됨
    Despawned,
    /// 스폰 또는 ID 연결 실패 (재조정 패스 대상)
    SpawnFailed { reason: String, attempts: u32 },
    /// 월드 저장 중이라 제거됨, 저장이 끝나면 다시 스폰
    AwaitingWorldSaveRespawn,
}

impl SpawnState {
    pub fn is_active(&self) -> bool {
        matches!(self, Self::Active { .. })
    }

    pub fn object_id(&self) -> Option<&ObjectId> {
        match self {
            Self::Active { object_id } => Some(object_id),
            _ => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::NeverSpawned => "never_spawned",
            Self::Active { .. } => "active",
            Self::Despawned => "despawned",
            Self::SpawnFailed { .. } => "spawn_failed",
            Self::AwaitingWorldSaveRespawn => "awaiting_world_save_respawn",
        }
    }
}

impl fmt::Display for SpawnState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Active { object_id } => write!(f, "active({})", object_id),
            Self::SpawnFailed { reason, attempts } => {
                write!(f, "spawn_failed({}, attempts={})", reason, attempts)
            }
            other => f.write_str(other.as_str()),
        }
    }
}

// ============================================================================
// ShopkeeperRecord
// ============================================================================

/// 레지스트리에 등록된 상점 주인
///
/// 레코드는 IdentityIndex가 소유하고 나머지 인덱스는 SessionId로 참조합니다.
pub struct ShopkeeperRecord {
    permanent_id: PermanentId,
    session_id: SessionId,
    position: BlockPos,
    region_key: RegionKey,
    gated: bool,
    world_save_despawn: bool,
    pub(crate) spawn_state: SpawnState,
    pub(crate) valid: bool,
    object: Box<dyn ShopObject>,
}

impl ShopkeeperRecord {
    /// 새 레코드 (세션 ID는 등록 시 할당)
    pub(crate) fn new(
        permanent_id: PermanentId,
        position: BlockPos,
        object: Box<dyn ShopObject>,
        region_shift: u8,
    ) -> Self {
        let region_key = position.region(region_shift);
        Self {
            permanent_id,
            session_id: SessionId(0),
            position,
            region_key,
            gated: object.requires_presence_gating(),
            world_save_despawn: object.despawn_during_world_save(),
            spawn_state: SpawnState::NeverSpawned,
            valid: true,
            object,
        }
    }

    pub fn permanent_id(&self) -> PermanentId {
        self.permanent_id
    }

    pub fn session_id(&self) -> SessionId {
        self.session_id
    }

    pub(crate) fn set_session_id(&mut self, session_id: SessionId) {
        self.session_id = session_id;
    }

    pub fn position(&self) -> &BlockPos {
        &self.position
    }

    pub fn region_key(&self) -> &RegionKey {
        &self.region_key
    }

    /// 위치 변경 (리전 키 재계산)
    pub(crate) fn set_position(&mut self, position: BlockPos, region_shift: u8) {
        self.region_key = position.region(region_shift);
        self.position = position;
    }

    pub fn requires_presence_gating(&self) -> bool {
        self.gated
    }

    pub fn despawns_during_world_save(&self) -> bool {
        self.world_save_despawn
    }

    pub fn is_awaiting_world_save(&self) -> bool {
        self.spawn_state == SpawnState::AwaitingWorldSaveRespawn
    }

    pub fn object_type(&self) -> &str {
        self.object.type_id()
    }

    pub fn spawn_state(&self) -> &SpawnState {
        &self.spawn_state
    }

    pub fn is_active(&self) -> bool {
        self.spawn_state.is_active()
    }

    /// 활성화 인덱스에 연결된 물리 오브젝트 ID
    pub fn live_object_id(&self) -> Option<&ObjectId> {
        self.spawn_state.object_id()
    }

    pub fn is_valid(&self) -> bool {
        self.valid
    }

    /// 실패 기록 (연속 실패면 시도 횟수 증가)
    pub(crate) fn mark_spawn_failed(&mut self, reason: impl Into<String>) -> u32 {
        let attempts = match &self.spawn_state {
            SpawnState::SpawnFailed { attempts, .. } => attempts + 1,
            _ => 1,
        };
        self.spawn_state = SpawnState::SpawnFailed {
            reason: reason.into(),
            attempts,
        };
        attempts
    }

    // ========================================================================
    // ShopObject 위임
    // ========================================================================

    pub(crate) fn spawn_object(&mut self) -> Result<(), SpawnError> {
        self.object.spawn(&self.position)
    }

    pub(crate) fn despawn_object(&mut self) {
        self.object.despawn();
    }

    pub(crate) fn check_object(&mut self) -> bool {
        self.object.check(&self.position)
    }

    /// 인덱스 연결 여부와 무관하게 오브젝트가 보고하는 현재 ID
    pub(crate) fn current_object_id(&self) -> Option<ObjectId> {
        self.object.live_object_id()
    }

    pub(crate) fn notify_object_moved(&mut self, new_position: &BlockPos) {
        self.object.on_moved(new_position);
    }

    /// 외부 협력자에 넘기는 가벼운 참조
    pub fn to_ref(&self) -> ShopkeeperRef {
        ShopkeeperRef {
            permanent_id: self.permanent_id,
            session_id: self.session_id,
            position: self.position.clone(),
        }
    }

    /// 저장용 데이터
    pub fn to_data(&self) -> ShopkeeperData {
        ShopkeeperData::new(self.permanent_id, self.object.type_id(), self.position.clone())
    }
}

impl fmt::Debug for ShopkeeperRecord {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ShopkeeperRecord")
            .field("permanent_id", &self.permanent_id)
            .field("session_id", &self.session_id)
            .field("object_type", &self.object.type_id())
            .field("position", &self.position)
            .field("region_key", &self.region_key)
            .field("gated", &self.gated)
            .field("world_save_despawn", &self.world_save_despawn)
            .field("spawn_state", &self.spawn_state)
            .field("valid", &self.valid)
            .finish()
    }
}
