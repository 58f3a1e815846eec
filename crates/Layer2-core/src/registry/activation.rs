//! Activation Tracker - 살아있는 물리 오브젝트 ID 인덱스

use crate::lifecycle::ActivationError;
use shopkeepers_foundation::{ObjectId, SessionId};
use std::collections::HashMap;

/// 비활성화 결과
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Deactivation {
    /// 연결 제거됨
    Removed,
    /// 같은 ID가 이미 다른 레코드에 연결되어 있어 그대로 둠
    Stale { bound_to: SessionId },
    /// 연결되어 있지 않음
    NotBound,
}

/// 오브젝트 ID → 세션 ID
///
/// 한 오브젝트 ID는 최대 한 레코드에만 연결됩니다.
#[derive(Debug, Default)]
pub struct ActivationTracker {
    by_object: HashMap<ObjectId, SessionId>,
}

impl ActivationTracker {
    pub fn new() -> Self {
        Self::default()
    }

    /// 오브젝트 ID 연결
    ///
    /// 같은 레코드에 이미 연결되어 있으면 성공으로 처리합니다.
    pub fn activate(&mut self, object_id: ObjectId, session_id: SessionId) -> Result<(), ActivationError> {
        match self.by_object.get(&object_id) {
            Some(&bound_to) if bound_to != session_id => {
                Err(ActivationError::DuplicateObjectId { object_id, bound_to })
            }
            Some(_) => Ok(()),
            None => {
                self.by_object.insert(object_id, session_id);
                Ok(())
            }
        }
    }

    /// 연결 해제 (이 레코드를 가리킬 때만)
    pub fn deactivate(&mut self, object_id: &ObjectId, session_id: SessionId) -> Deactivation {
        match self.by_object.get(object_id) {
            Some(&bound_to) if bound_to == session_id => {
                self.by_object.remove(object_id);
                Deactivation::Removed
            }
            Some(&bound_to) => Deactivation::Stale { bound_to },
            None => Deactivation::NotBound,
        }
    }

    /// 재스폰으로 바뀐 ID로 다시 연결
    ///
    /// 기존 연결은 항상 먼저 제거되므로 새 ID가 충돌해도 오래된 항목은 남지 않습니다.
    pub fn rekey(
        &mut self,
        session_id: SessionId,
        old: &ObjectId,
        new: ObjectId,
    ) -> Result<Deactivation, ActivationError> {
        let removed = self.deactivate(old, session_id);
        self.activate(new, session_id)?;
        Ok(removed)
    }

    pub fn lookup(&self, object_id: &ObjectId) -> Option<SessionId> {
        self.by_object.get(object_id).copied()
    }

    pub fn contains(&self, object_id: &ObjectId) -> bool {
        self.by_object.contains_key(object_id)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&ObjectId, &SessionId)> {
        self.by_object.iter()
    }

    pub fn len(&self) -> usize {
        self.by_object.len()
    }

    pub fn is_empty(&self) -> bool {
        self.by_object.is_empty()
    }

    pub fn clear(&mut self) -> usize {
        let count = self.by_object.len();
        self.by_object.clear();
        count
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use uuid::Uuid;

    fn entity() -> ObjectId {
        ObjectId::Entity(Uuid::new_v4())
    }

    #[test]
    fn test_activate_and_lookup() {
        let mut tracker = ActivationTracker::new();
        let id = entity();
        tracker.activate(id.clone(), SessionId(1)).unwrap();
        assert_eq!(tracker.lookup(&id), Some(SessionId(1)));

        // 같은 레코드 재연결은 허용
        tracker.activate(id.clone(), SessionId(1)).unwrap();
        assert_eq!(tracker.len(), 1);
    }

    #[test]
    fn test_duplicate_object_id() {
        let mut tracker = ActivationTracker::new();
        let id = entity();
        tracker.activate(id.clone(), SessionId(1)).unwrap();

        let err = tracker.activate(id.clone(), SessionId(2)).unwrap_err();
        assert!(matches!(
            err,
            ActivationError::DuplicateObjectId { bound_to, .. } if bound_to == SessionId(1)
        ));
        assert_eq!(tracker.lookup(&id), Some(SessionId(1)));
    }

    #[test]
    fn test_stale_deactivation_is_noop() {
        let mut tracker = ActivationTracker::new();
        let id = entity();
        tracker.activate(id.clone(), SessionId(1)).unwrap();

        assert_eq!(
            tracker.deactivate(&id, SessionId(2)),
            Deactivation::Stale { bound_to: SessionId(1) }
        );
        assert_eq!(tracker.lookup(&id), Some(SessionId(1)));

        assert_eq!(tracker.deactivate(&id, SessionId(1)), Deactivation::Removed);
        assert_eq!(tracker.deactivate(&id, SessionId(1)), Deactivation::NotBound);
    }

    #[test]
    fn test_rekey() {
        let mut tracker = ActivationTracker::new();
        let old = entity();
        let new = entity();
        tracker.activate(old.clone(), SessionId(1)).unwrap();

        assert_eq!(tracker.rekey(SessionId(1), &old, new.clone()).unwrap(), Deactivation::Removed);
        assert!(!tracker.contains(&old));
        assert_eq!(tracker.lookup(&new), Some(SessionId(1)));
    }

    #[test]
    fn test_rekey_collision_drops_old_entry() {
        let mut tracker = ActivationTracker::new();
        let taken = entity();
        let old = entity();
        tracker.activate(taken.clone(), SessionId(1)).unwrap();
        tracker.activate(old.clone(), SessionId(2)).unwrap();

        assert!(tracker.rekey(SessionId(2), &old, taken.clone()).is_err());
        assert!(!tracker.contains(&old));
        assert_eq!(tracker.lookup(&taken), Some(SessionId(1)));
    }
}
