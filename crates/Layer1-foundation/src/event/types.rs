//! Event Types - 라이프사이클 이벤트 정의

use crate::core::{BlockPos, ObjectId, PermanentId, SessionId};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

// ============================================================================
// Causes
// ============================================================================

/// 레지스트리에 추가된 이유
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AddCause {
    /// 새로 생성됨
    Created,
    /// 저장소에서 로드됨
    Loaded,
}

/// 레지스트리에서 제거된 이유
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RemoveCause {
    /// 영구 삭제
    Deleted,
    /// 비활성화/리로드로 언로드 (데이터는 유지)
    Unloaded,
}

// ============================================================================
// ShopkeeperEvent
// ============================================================================

/// 이벤트 종류 (필터용)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EventKind {
    Added,
    Removed,
    Moved,
    Activated,
    Deactivated,
    Rebound,
}

impl EventKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Added => "added",
            Self::Removed => "removed",
            Self::Moved => "moved",
            Self::Activated => "activated",
            Self::Deactivated => "deactivated",
            Self::Rebound => "rebound",
        }
    }
}

/// 상점 주인 라이프사이클 이벤트
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ShopkeeperEvent {
    Added {
        permanent_id: PermanentId,
        session_id: SessionId,
        cause: AddCause,
    },
    Removed {
        permanent_id: PermanentId,
        session_id: SessionId,
        cause: RemoveCause,
    },
    Moved {
        permanent_id: PermanentId,
        from: BlockPos,
        to: BlockPos,
    },
    Activated {
        permanent_id: PermanentId,
        object_id: ObjectId,
    },
    Deactivated {
        permanent_id: PermanentId,
    },
    /// 살아있는 오브젝트의 ID가 바뀌어 활성화 인덱스를 다시 연결함
    Rebound {
        permanent_id: PermanentId,
        old: ObjectId,
        new: ObjectId,
    },
}

impl ShopkeeperEvent {
    pub fn kind(&self) -> EventKind {
        match self {
            Self::Added { .. } => EventKind::Added,
            Self::Removed { .. } => EventKind::Removed,
            Self::Moved { .. } => EventKind::Moved,
            Self::Activated { .. } => EventKind::Activated,
            Self::Deactivated { .. } => EventKind::Deactivated,
            Self::Rebound { .. } => EventKind::Rebound,
        }
    }

    pub fn permanent_id(&self) -> PermanentId {
        match self {
            Self::Added { permanent_id, .. }
            | Self::Removed { permanent_id, .. }
            | Self::Moved { permanent_id, .. }
            | Self::Activated { permanent_id, .. }
            | Self::Deactivated { permanent_id }
            | Self::Rebound { permanent_id, .. } => *permanent_id,
        }
    }
}

// ============================================================================
// EventRecord
// ============================================================================

/// 발행된 이벤트 (순번 + 시각)
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EventRecord {
    pub seq: u64,
    pub timestamp: DateTime<Utc>,
    pub event: ShopkeeperEvent,
}

impl EventRecord {
    pub fn new(seq: u64, event: ShopkeeperEvent) -> Self {
        Self {
            seq,
            timestamp: Utc::now(),
            event,
        }
    }

    pub fn kind(&self) -> EventKind {
        self.event.kind()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use uuid::Uuid;

    #[test]
    fn test_event_kind_and_id() {
        let id = Uuid::new_v4();
        let event = ShopkeeperEvent::Deactivated { permanent_id: id };
        assert_eq!(event.kind(), EventKind::Deactivated);
        assert_eq!(event.permanent_id(), id);
    }

    #[test]
    fn test_event_serialization() {
        let event = ShopkeeperEvent::Added {
            permanent_id: Uuid::nil(),
            session_id: SessionId(7),
            cause: AddCause::Loaded,
        };
        let json = serde_json::to_string(&event).unwrap();
        assert!(json.contains(r#""type":"added""#));
        assert!(json.contains(r#""cause":"loaded""#));
    }
}
