//! Lifecycle Errors

use shopkeepers_foundation::{ObjectId, PermanentId, SessionId};
use thiserror::Error;

/// 등록/로드 에러
#[derive(Error, Debug)]
pub enum RegistryError {
    /// 같은 영구 ID가 이미 등록됨 (무결성 문제)
    #[error("shopkeeper {permanent_id} is already registered")]
    DuplicateIdentity { permanent_id: PermanentId },

    #[error("unknown shop object type: {0}")]
    UnknownObjectType(String),

    #[error("shopkeepers are already enabled")]
    AlreadyEnabled,

    #[error("shopkeepers are not enabled")]
    NotEnabled,

    /// disable 때 넘긴 마지막 저장이 아직 끝나지 않음
    #[error("the final save from the last disable has not completed yet")]
    SavePending,

    #[error(transparent)]
    Activation(#[from] ActivationError),

    #[error(transparent)]
    Foundation(#[from] shopkeepers_foundation::Error),
}

/// 활성화 에러
///
/// 모두 치명적이지 않으며 레코드는 비활성 상태로 남아 재조정 대상이 됩니다.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ActivationError {
    /// 오브젝트 ID가 이미 다른 레코드에 연결됨
    #[error("object id {object_id} is already bound to session {bound_to}")]
    DuplicateObjectId {
        object_id: ObjectId,
        bound_to: SessionId,
    },

    #[error("spawn of shopkeeper {permanent_id} failed: {reason}")]
    SpawnFailed {
        permanent_id: PermanentId,
        reason: String,
    },

    /// 스폰은 성공했지만 오브젝트 ID가 없음
    #[error("shopkeeper {permanent_id} spawned without a live object id")]
    NotSpawned { permanent_id: PermanentId },

    #[error("no shopkeeper with session id {0}")]
    NotRegistered(SessionId),
}
