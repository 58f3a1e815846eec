//! Spatial Index - 월드 / 리전별 상점 주인 인덱스

use shopkeepers_foundation::{RegionKey, SessionId};
use std::collections::HashMap;
use tracing::warn;

/// 월드 → 리전 → 세션 ID 목록
///
/// 비어버린 리전과 월드 항목은 즉시 제거됩니다.
#[derive(Debug, Default)]
pub struct SpatialIndex {
    worlds: HashMap<String, HashMap<RegionKey, Vec<SessionId>>>,
    entries: usize,
}

impl SpatialIndex {
    pub fn new() -> Self {
        Self::default()
    }

    /// 리전 목록 끝에 추가
    pub fn insert(&mut self, key: &RegionKey, session_id: SessionId) {
        let list = self
            .worlds
            .entry(key.world.clone())
            .or_default()
            .entry(key.clone())
            .or_default();

        if list.contains(&session_id) {
            warn!(session_id = %session_id, region = %key, "Record already indexed in region");
            return;
        }
        list.push(session_id);
        self.entries += 1;
    }

    /// 리전 목록에서 제거 (비면 리전/월드 항목까지 제거)
    pub fn remove(&mut self, key: &RegionKey, session_id: SessionId) -> bool {
        let Some(regions) = self.worlds.get_mut(&key.world) else {
            return false;
        };
        let Some(list) = regions.get_mut(key) else {
            return false;
        };
        let Some(index) = list.iter().position(|sid| *sid == session_id) else {
            return false;
        };

        list.remove(index);
        self.entries -= 1;

        if list.is_empty() {
            regions.remove(key);
            if regions.is_empty() {
                self.worlds.remove(&key.world);
            }
        }
        true
    }

    /// 리전 간 이동 (같은 키면 아무것도 하지 않음)
    ///
    /// 리전이 바뀌었으면 true.
    pub fn move_record(&mut self, session_id: SessionId, old: &RegionKey, new: &RegionKey) -> bool {
        if old == new {
            return false;
        }
        if !self.remove(old, session_id) {
            warn!(session_id = %session_id, region = %old, "Moved record was not indexed in its old region");
        }
        self.insert(new, session_id);
        true
    }

    /// 리전의 세션 ID (등록 순서)
    pub fn in_region(&self, key: &RegionKey) -> &[SessionId] {
        self.worlds
            .get(&key.world)
            .and_then(|regions| regions.get(key))
            .map(Vec::as_slice)
            .unwrap_or(&[])
    }

    /// 월드 전체의 세션 ID (리전 필터 적용)
    pub fn in_world<F>(&self, world: &str, mut region_filter: F) -> Vec<SessionId>
    where
        F: FnMut(&RegionKey) -> bool,
    {
        let mut regions: Vec<_> = match self.worlds.get(world) {
            Some(regions) => regions.iter().filter(|(key, _)| region_filter(key)).collect(),
            None => return Vec::new(),
        };
        regions.sort_by(|a, b| a.0.cmp(b.0));
        regions
            .into_iter()
            .flat_map(|(_, list)| list.iter().copied())
            .collect()
    }

    /// 월드의 리전 목록 (정렬됨)
    pub fn regions_in_world(&self, world: &str) -> Vec<&RegionKey> {
        let mut keys: Vec<_> = self
            .worlds
            .get(world)
            .map(|regions| regions.keys().collect())
            .unwrap_or_default();
        keys.sort();
        keys
    }

    pub fn contains(&self, key: &RegionKey, session_id: SessionId) -> bool {
        self.in_region(key).contains(&session_id)
    }

    /// 상점 주인이 있는 월드 (정렬됨)
    pub fn worlds(&self) -> Vec<&str> {
        let mut worlds: Vec<&str> = self.worlds.keys().map(String::as_str).collect();
        worlds.sort_unstable();
        worlds
    }

    /// 모든 (리전, 목록) 항목
    pub fn iter(&self) -> impl Iterator<Item = (&RegionKey, &[SessionId])> {
        self.worlds
            .values()
            .flat_map(|regions| regions.iter().map(|(k, v)| (k, v.as_slice())))
    }

    pub fn region_count(&self) -> usize {
        self.worlds.values().map(HashMap::len).sum()
    }

    /// 전체 항목 수
    pub fn len(&self) -> usize {
        self.entries
    }

    pub fn is_empty(&self) -> bool {
        self.entries == 0
    }

    pub fn clear(&mut self) -> usize {
        let count = self.entries;
        self.worlds.clear();
        self.entries = 0;
        count
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn key(x: i32, z: i32) -> RegionKey {
        RegionKey::new("world", x, z)
    }

    #[test]
    fn test_insert_preserves_order() {
        let mut index = SpatialIndex::new();
        index.insert(&key(4, -2), SessionId(3));
        index.insert(&key(4, -2), SessionId(1));
        index.insert(&key(4, -2), SessionId(2));

        assert_eq!(index.in_region(&key(4, -2)), &[SessionId(3), SessionId(1), SessionId(2)]);
        assert_eq!(index.len(), 3);
    }

    #[test]
    fn test_remove_drops_empty_region_and_world() {
        let mut index = SpatialIndex::new();
        index.insert(&key(0, 0), SessionId(1));

        assert!(index.remove(&key(0, 0), SessionId(1)));
        assert_eq!(index.region_count(), 0);
        assert!(index.worlds().is_empty());
        assert!(!index.remove(&key(0, 0), SessionId(1)));
    }

    #[test]
    fn test_move_between_regions() {
        let mut index = SpatialIndex::new();
        index.insert(&key(0, 0), SessionId(1));

        assert!(!index.move_record(SessionId(1), &key(0, 0), &key(0, 0)));
        assert!(index.move_record(SessionId(1), &key(0, 0), &key(1, 0)));

        assert!(index.in_region(&key(0, 0)).is_empty());
        assert_eq!(index.in_region(&key(1, 0)), &[SessionId(1)]);
        assert_eq!(index.len(), 1);
    }

    #[test]
    fn test_in_world_with_filter() {
        let mut index = SpatialIndex::new();
        index.insert(&key(0, 0), SessionId(1));
        index.insert(&key(1, 0), SessionId(2));
        index.insert(&RegionKey::new("nether", 0, 0), SessionId(3));

        let all = index.in_world("world", |_| true);
        assert_eq!(all, vec![SessionId(1), SessionId(2)]);

        let only_first = index.in_world("world", |k| k.x == 0);
        assert_eq!(only_first, vec![SessionId(1)]);

        assert!(index.in_world("end", |_| true).is_empty());
        assert_eq!(index.worlds(), vec!["nether", "world"]);
    }

    #[test]
    fn test_duplicate_insert_ignored() {
        let mut index = SpatialIndex::new();
        index.insert(&key(0, 0), SessionId(1));
        index.insert(&key(0, 0), SessionId(1));
        assert_eq!(index.len(), 1);
    }
}
