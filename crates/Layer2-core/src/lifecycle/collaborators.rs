//! External Collaborators - UI 세션

use shopkeepers_foundation::{BlockPos, PermanentId, SessionId};
use uuid::Uuid;

/// 외부 협력자에 넘기는 상점 주인 참조
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ShopkeeperRef {
    pub permanent_id: PermanentId,
    pub session_id: SessionId,
    pub position: BlockPos,
}

/// 거래/편집 UI 세션 관리자
///
/// 모든 호출은 알림일 뿐이며 코디네이터는 결과를 기다리지 않습니다.
pub trait UiSessions: Send + Sync {
    /// 상점 주인을 참조하는 UI 세션을 모두 닫음
    fn close_sessions(&self, shopkeeper: &ShopkeeperRef);

    /// 세션을 닫지 않는 비활성화 (리전 언로드 등)
    fn on_shopkeeper_deactivated(&self, _shopkeeper: &ShopkeeperRef) {}

    /// 플레이어 접속 종료
    fn on_player_disconnect(&self, _player: Uuid) {}
}

/// 아무것도 하지 않는 UiSessions
#[derive(Debug, Default, Clone, Copy)]
pub struct NoopUiSessions;

impl UiSessions for NoopUiSessions {
    fn close_sessions(&self, _shopkeeper: &ShopkeeperRef) {}
}
