//! ShopObject Trait - 상점 주인의 물리적 표현

use shopkeepers_foundation::{BlockPos, ObjectId};
use thiserror::Error;

/// 스폰 실패 원인
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum SpawnError {
    /// 위치가 막혀 있음 (다른 블록, 보호 구역 등)
    #[error("spawn blocked: {0}")]
    Blocked(String),

    /// 최근 실패로 인한 재시도 대기
    #[error("respawn cooling down ({remaining_ticks} ticks left)")]
    CoolingDown { remaining_ticks: u64 },

    #[error("{0}")]
    Other(String),
}

/// 상점 주인 서브타입별 물리 오브젝트 구현
///
/// 코디네이터는 이 trait만 보고 동작하며 구체 타입을 알지 못합니다.
/// 모든 메서드는 게임 스레드에서 호출됩니다.
pub trait ShopObject: Send {
    /// 오브젝트 타입 ID (저장 데이터의 `objectType`)
    fn type_id(&self) -> &str;

    /// true면 리전이 로드된 동안에만 오브젝트가 존재
    fn requires_presence_gating(&self) -> bool;

    /// true면 월드 저장 직전에 제거했다가 저장이 끝나면 다시 스폰
    fn despawn_during_world_save(&self) -> bool {
        self.requires_presence_gating()
    }

    /// 물리 오브젝트 생성
    ///
    /// 성공하면 `live_object_id()`가 새 ID를 반환해야 합니다.
    fn spawn(&mut self, position: &BlockPos) -> Result<(), SpawnError>;

    /// 물리 오브젝트 제거 (이미 없으면 아무것도 하지 않음)
    fn despawn(&mut self);

    /// 물리 오브젝트가 현재 존재하는지
    fn is_active(&self) -> bool;

    /// 현재 살아있는 물리 오브젝트의 ID
    fn live_object_id(&self) -> Option<ObjectId>;

    /// 오브젝트가 올바른 위치에 온전히 있는지 확인하고 필요하면 복구
    ///
    /// 복구(재스폰)해서 ID가 바뀌었으면 true.
    fn check(&mut self, position: &BlockPos) -> bool;

    /// 인덱스가 갱신되기 전에 호출되는 이동 훅
    fn on_moved(&mut self, _new_position: &BlockPos) {}
}
