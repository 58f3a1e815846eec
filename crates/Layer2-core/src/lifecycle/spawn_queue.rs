//! Spawn Queue - 리전 로드 스폰 분산
//!
//! 상점 주인이 많은 리전이 한꺼번에 로드되면 스폰을 여러 틱에 나눕니다.
//! 새로 생성되거나 저장소에서 불러온 상점 주인, 월드 저장 후 재스폰은 큐를 거치지 않습니다.

use indexmap::IndexSet;
use serde::Serialize;
use shopkeepers_foundation::SessionId;

/// 한 틱의 큐 처리 결과
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct SpawnQueueReport {
    pub spawned: usize,
    pub failed: usize,
    /// 처리 후 남은 대기 수
    pub remaining: usize,
}

/// 스폰 대기열 (등록 순서 유지, 중복 없음)
#[derive(Debug, Default)]
pub struct SpawnQueue {
    budget: usize,
    queue: IndexSet<SessionId>,
}

impl SpawnQueue {
    /// 틱당 최대 스폰 수 (0이면 큐를 쓰지 않음)
    pub fn new(budget: usize) -> Self {
        Self {
            budget,
            queue: IndexSet::new(),
        }
    }

    pub fn is_enabled(&self) -> bool {
        self.budget > 0
    }

    pub fn budget(&self) -> usize {
        self.budget
    }

    /// 이미 대기 중이면 false
    pub fn push(&mut self, session_id: SessionId) -> bool {
        self.queue.insert(session_id)
    }

    pub fn remove(&mut self, session_id: SessionId) -> bool {
        self.queue.shift_remove(&session_id)
    }

    pub fn contains(&self, session_id: SessionId) -> bool {
        self.queue.contains(&session_id)
    }

    pub fn len(&self) -> usize {
        self.queue.len()
    }

    pub fn is_empty(&self) -> bool {
        self.queue.is_empty()
    }

    /// 이번 틱에 스폰할 항목을 앞에서부터 꺼냄
    pub(crate) fn take_batch(&mut self) -> Vec<SessionId> {
        let n = self.budget.min(self.queue.len());
        self.queue.drain(..n).collect()
    }

    /// 모두 비우고 버린 수 반환
    pub(crate) fn clear(&mut self) -> usize {
        let count = self.queue.len();
        self.queue.clear();
        count
    }

    pub fn iter(&self) -> impl Iterator<Item = SessionId> + '_ {
        self.queue.iter().copied()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_batches_respect_budget_and_order() {
        let mut queue = SpawnQueue::new(2);
        for i in 1..=5 {
            assert!(queue.push(SessionId(i)));
        }
        assert!(!queue.push(SessionId(3)));

        assert_eq!(queue.take_batch(), vec![SessionId(1), SessionId(2)]);
        assert_eq!(queue.take_batch(), vec![SessionId(3), SessionId(4)]);
        assert_eq!(queue.take_batch(), vec![SessionId(5)]);
        assert!(queue.take_batch().is_empty());
    }

    #[test]
    fn test_remove_keeps_order() {
        let mut queue = SpawnQueue::new(10);
        queue.push(SessionId(1));
        queue.push(SessionId(2));
        queue.push(SessionId(3));

        assert!(queue.remove(SessionId(2)));
        assert!(!queue.remove(SessionId(2)));
        assert_eq!(queue.take_batch(), vec![SessionId(1), SessionId(3)]);
    }

    #[test]
    fn test_disabled_queue() {
        let mut queue = SpawnQueue::new(0);
        assert!(!queue.is_enabled());
        queue.push(SessionId(1));
        assert!(queue.take_batch().is_empty());
        assert_eq!(queue.clear(), 1);
        assert!(queue.is_empty());
    }
}
