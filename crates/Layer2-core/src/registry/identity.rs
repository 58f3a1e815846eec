//! Identity Index - 영구 ID / 세션 ID 인덱스

use super::record::ShopkeeperRecord;
use crate::lifecycle::RegistryError;
use indexmap::IndexMap;
use shopkeepers_foundation::{PermanentId, SessionId};
use std::collections::HashMap;
use tracing::{debug, warn};

/// 레코드를 소유하는 인덱스
///
/// 세션 ID 순서(= 등록 순서)를 유지합니다.
/// 세션 ID 카운터는 인스턴스마다 1부터 시작하고 재사용되지 않습니다.
#[derive(Debug)]
pub struct IdentityIndex {
    by_session: IndexMap<SessionId, ShopkeeperRecord>,
    by_permanent: HashMap<PermanentId, SessionId>,
    next_session_id: u32,
}

impl IdentityIndex {
    pub fn new() -> Self {
        Self {
            by_session: IndexMap::new(),
            by_permanent: HashMap::new(),
            next_session_id: 1,
        }
    }

    /// 레코드 등록 및 세션 ID 할당
    pub fn register(&mut self, mut record: ShopkeeperRecord) -> Result<SessionId, RegistryError> {
        let permanent_id = record.permanent_id();
        if self.by_permanent.contains_key(&permanent_id) {
            return Err(RegistryError::DuplicateIdentity { permanent_id });
        }

        let session_id = SessionId(self.next_session_id);
        self.next_session_id += 1;

        record.set_session_id(session_id);
        self.by_permanent.insert(permanent_id, session_id);
        self.by_session.insert(session_id, record);
        Ok(session_id)
    }

    /// 레코드 등록 해제 (없으면 None)
    pub fn unregister(&mut self, session_id: SessionId) -> Option<ShopkeeperRecord> {
        match self.by_session.shift_remove(&session_id) {
            Some(record) => {
                if self.by_permanent.remove(&record.permanent_id()).is_none() {
                    warn!(
                        session_id = %session_id,
                        permanent_id = %record.permanent_id(),
                        "Record was missing from the permanent id index"
                    );
                }
                Some(record)
            }
            None => {
                debug!(session_id = %session_id, "Unregister of unknown session id ignored");
                None
            }
        }
    }

    pub fn contains_permanent(&self, permanent_id: &PermanentId) -> bool {
        self.by_permanent.contains_key(permanent_id)
    }

    pub fn contains(&self, session_id: SessionId) -> bool {
        self.by_session.contains_key(&session_id)
    }

    pub fn session_of(&self, permanent_id: &PermanentId) -> Option<SessionId> {
        self.by_permanent.get(permanent_id).copied()
    }

    pub fn lookup_by_permanent(&self, permanent_id: &PermanentId) -> Option<&ShopkeeperRecord> {
        self.session_of(permanent_id)
            .and_then(|sid| self.by_session.get(&sid))
    }

    pub fn lookup_by_session(&self, session_id: SessionId) -> Option<&ShopkeeperRecord> {
        self.by_session.get(&session_id)
    }

    pub(crate) fn get_mut(&mut self, session_id: SessionId) -> Option<&mut ShopkeeperRecord> {
        self.by_session.get_mut(&session_id)
    }

    /// 등록 순서대로 순회
    pub fn records(&self) -> impl Iterator<Item = &ShopkeeperRecord> {
        self.by_session.values()
    }

    pub fn session_ids(&self) -> Vec<SessionId> {
        self.by_session.keys().copied().collect()
    }

    /// 영구 ID 인덱스 항목 (무결성 검사용)
    pub fn permanent_entries(&self) -> impl Iterator<Item = (&PermanentId, &SessionId)> {
        self.by_permanent.iter()
    }

    pub fn len(&self) -> usize {
        self.by_session.len()
    }

    pub fn is_empty(&self) -> bool {
        self.by_session.is_empty()
    }

    /// 다음에 할당될 세션 ID
    pub fn next_session_id(&self) -> SessionId {
        SessionId(self.next_session_id)
    }

    /// 모든 항목 제거 (카운터는 유지)
    pub fn clear(&mut self) -> usize {
        let count = self.by_session.len();
        self.by_session.clear();
        self.by_permanent.clear();
        count
    }
}

impl Default for IdentityIndex {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::shop_object::{VirtualKind, VirtualWorld};
    use shopkeepers_foundation::BlockPos;
    use uuid::Uuid;

    fn record(world: &VirtualWorld, id: PermanentId) -> ShopkeeperRecord {
        ShopkeeperRecord::new(
            id,
            BlockPos::new("world", 0, 64, 0),
            Box::new(world.create_object(VirtualKind::Mob)),
            4,
        )
    }

    #[test]
    fn test_register_assigns_sequential_ids() {
        let world = VirtualWorld::new();
        let mut index = IdentityIndex::new();

        let a = index.register(record(&world, Uuid::new_v4())).unwrap();
        let b = index.register(record(&world, Uuid::new_v4())).unwrap();

        assert_eq!(a, SessionId(1));
        assert_eq!(b, SessionId(2));
        assert_eq!(index.lookup_by_session(b).unwrap().session_id(), b);
    }

    #[test]
    fn test_duplicate_permanent_id() {
        let world = VirtualWorld::new();
        let mut index = IdentityIndex::new();
        let id = Uuid::new_v4();

        index.register(record(&world, id)).unwrap();
        let err = index.register(record(&world, id)).unwrap_err();
        assert!(matches!(err, RegistryError::DuplicateIdentity { permanent_id } if permanent_id == id));
        assert_eq!(index.len(), 1);
        // 실패한 등록은 세션 ID를 소비하지 않음
        assert_eq!(index.next_session_id(), SessionId(2));
    }

    #[test]
    fn test_unregister_idempotent() {
        let world = VirtualWorld::new();
        let mut index = IdentityIndex::new();
        let id = Uuid::new_v4();
        let sid = index.register(record(&world, id)).unwrap();

        assert!(index.unregister(sid).is_some());
        assert!(index.unregister(sid).is_none());
        assert!(index.lookup_by_permanent(&id).is_none());
        assert!(index.is_empty());
    }

    #[test]
    fn test_session_ids_not_reused() {
        let world = VirtualWorld::new();
        let mut index = IdentityIndex::new();
        let first = index.register(record(&world, Uuid::new_v4())).unwrap();
        index.unregister(first);
        let second = index.register(record(&world, Uuid::new_v4())).unwrap();
        assert_ne!(first, second);
    }

    #[test]
    fn test_order_preserved_after_removal() {
        let world = VirtualWorld::new();
        let mut index = IdentityIndex::new();
        let ids: Vec<_> = (0..4)
            .map(|_| index.register(record(&world, Uuid::new_v4())).unwrap())
            .collect();
        index.unregister(ids[1]);
        assert_eq!(index.session_ids(), vec![ids[0], ids[2], ids[3]]);
    }
}
