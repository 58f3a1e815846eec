//! Host Events - 게임 호스트가 전달하는 알림

use shopkeepers_foundation::RegionKey;
use uuid::Uuid;

/// 호스트 이벤트
///
/// 모든 이벤트는 게임 스레드에서 순서대로 전달됩니다.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum HostEvent {
    /// 리전 로드 (`newly_generated`는 이번에 처음 생성된 리전)
    RegionLoaded {
        key: RegionKey,
        newly_generated: bool,
    },
    RegionUnloaded(RegionKey),
    WorldUnloaded(String),
    /// 월드 저장 시작 (저장 중 제거해야 하는 오브젝트는 다음 틱에 재스폰)
    WorldSaved(String),
    /// 플레이어 접속 종료 (UI 세션 정리용)
    PlayerDisconnect(Uuid),
    /// 게임 틱 경계
    Tick,
}

impl HostEvent {
    pub fn name(&self) -> &'static str {
        match self {
            Self::RegionLoaded { .. } => "region_loaded",
            Self::RegionUnloaded(_) => "region_unloaded",
            Self::WorldUnloaded(_) => "world_unloaded",
            Self::WorldSaved(_) => "world_saved",
            Self::PlayerDisconnect(_) => "player_disconnect",
            Self::Tick => "tick",
        }
    }
}
