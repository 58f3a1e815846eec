//! Event Bus - 이벤트 브로드캐스트 시스템
//!
//! 코디네이터는 게임 스레드에서 동기적으로 발행합니다.
//! 비동기 소비자는 `receiver()`로 broadcast 스트림을 받습니다.

use super::types::{EventKind, EventRecord, ShopkeeperEvent};
use parking_lot::{Mutex, RwLock};
use std::collections::{HashMap, VecDeque};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use tokio::sync::broadcast;
use tracing::{debug, trace};

// ============================================================================
// EventListener Trait
// ============================================================================

/// 이벤트 리스너 ID
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ListenerId(u64);

impl std::fmt::Display for ListenerId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "listener-{}", self.0)
    }
}

/// 이벤트 리스너 trait
///
/// 발행 스레드에서 바로 호출되므로 오래 걸리는 작업을 하면 안 됩니다.
pub trait EventListener: Send + Sync {
    /// 리스너 이름 (디버깅용)
    fn name(&self) -> &str;

    /// 이벤트 처리
    fn on_event(&self, record: &EventRecord);
}

// ============================================================================
// EventFilter
// ============================================================================

/// 이벤트 필터
#[derive(Debug, Clone, Default)]
pub struct EventFilter {
    pub kinds: Option<Vec<EventKind>>,
}

impl EventFilter {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_kinds(mut self, kinds: Vec<EventKind>) -> Self {
        self.kinds = Some(kinds);
        self
    }

    /// 이벤트가 필터를 통과하는지 확인
    pub fn matches(&self, event: &ShopkeeperEvent) -> bool {
        self.kinds
            .as_ref()
            .map(|kinds| kinds.contains(&event.kind()))
            .unwrap_or(true)
    }
}

// ============================================================================
// EventBus
// ============================================================================

/// 이벤트 버스 설정
#[derive(Debug, Clone)]
pub struct EventBusConfig {
    /// 브로드캐스트 채널 용량
    pub channel_capacity: usize,

    /// 이벤트 히스토리 보관 개수
    pub history_size: usize,

    /// 디버그 모드 (모든 이벤트 로깅)
    pub debug_mode: bool,
}

impl Default for EventBusConfig {
    fn default() -> Self {
        Self {
            channel_capacity: 1024,
            history_size: 256,
            debug_mode: false,
        }
    }
}

struct RegisteredListener {
    listener: Arc<dyn EventListener>,
    filter: Option<EventFilter>,
}

/// 이벤트 버스
pub struct EventBus {
    config: EventBusConfig,
    sender: broadcast::Sender<EventRecord>,
    listeners: RwLock<HashMap<ListenerId, RegisteredListener>>,
    listener_counter: AtomicU64,
    history: Mutex<VecDeque<EventRecord>>,
    event_count: AtomicU64,
}

impl EventBus {
    pub fn new() -> Self {
        Self::with_config(EventBusConfig::default())
    }

    pub fn with_config(config: EventBusConfig) -> Self {
        let (sender, _) = broadcast::channel(config.channel_capacity.max(1));

        Self {
            config,
            sender,
            listeners: RwLock::new(HashMap::new()),
            listener_counter: AtomicU64::new(0),
            history: Mutex::new(VecDeque::new()),
            event_count: AtomicU64::new(0),
        }
    }

    /// 리스너 등록
    pub fn subscribe(&self, listener: Arc<dyn EventListener>) -> ListenerId {
        self.subscribe_with_filter(listener, None)
    }

    /// 필터와 함께 리스너 등록
    pub fn subscribe_with_filter(
        &self,
        listener: Arc<dyn EventListener>,
        filter: Option<EventFilter>,
    ) -> ListenerId {
        let id = ListenerId(self.listener_counter.fetch_add(1, Ordering::SeqCst));

        debug!(
            listener_name = listener.name(),
            listener_id = %id,
            "Registering event listener"
        );

        self.listeners
            .write()
            .insert(id, RegisteredListener { listener, filter });
        id
    }

    /// 리스너 해제
    pub fn unsubscribe(&self, id: ListenerId) -> bool {
        let removed = self.listeners.write().remove(&id).is_some();
        if removed {
            debug!(listener_id = %id, "Unregistered event listener");
        }
        removed
    }

    /// 이벤트 발행
    pub fn publish(&self, event: ShopkeeperEvent) {
        let seq = self.event_count.fetch_add(1, Ordering::SeqCst) + 1;
        let record = EventRecord::new(seq, event);

        if self.config.debug_mode {
            trace!(
                seq,
                kind = record.kind().as_str(),
                permanent_id = %record.event.permanent_id(),
                "Publishing event"
            );
        }

        {
            let mut history = self.history.lock();
            history.push_back(record.clone());
            while history.len() > self.config.history_size {
                history.pop_front();
            }
        }

        // 수신자가 없으면 실패하지만 무시
        let _ = self.sender.send(record.clone());

        let listeners = self.listeners.read();
        for registered in listeners.values() {
            let deliver = registered
                .filter
                .as_ref()
                .map(|f| f.matches(&record.event))
                .unwrap_or(true);
            if deliver {
                registered.listener.on_event(&record);
            }
        }
    }

    /// 브로드캐스트 수신자 생성
    pub fn receiver(&self) -> broadcast::Receiver<EventRecord> {
        self.sender.subscribe()
    }

    /// 최근 이벤트 (최신순)
    pub fn history(&self, limit: Option<usize>) -> Vec<EventRecord> {
        let history = self.history.lock();
        let limit = limit.unwrap_or(history.len());
        history.iter().rev().take(limit).cloned().collect()
    }

    pub fn listener_count(&self) -> usize {
        self.listeners.read().len()
    }

    /// 총 발행된 이벤트 수
    pub fn event_count(&self) -> u64 {
        self.event_count.load(Ordering::SeqCst)
    }
}

impl Default for EventBus {
    fn default() -> Self {
        Self::new()
    }
}

// ============================================================================
// 테스트
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::AtomicUsize;
    use uuid::Uuid;

    struct CountingListener {
        count: AtomicUsize,
    }

    impl EventListener for CountingListener {
        fn name(&self) -> &str {
            "counting"
        }

        fn on_event(&self, _record: &EventRecord) {
            self.count.fetch_add(1, Ordering::SeqCst);
        }
    }

    fn deactivated() -> ShopkeeperEvent {
        ShopkeeperEvent::Deactivated {
            permanent_id: Uuid::new_v4(),
        }
    }

    #[test]
    fn test_listener_with_filter() {
        let bus = EventBus::new();
        let listener = Arc::new(CountingListener {
            count: AtomicUsize::new(0),
        });
        let id = bus.subscribe_with_filter(
            listener.clone(),
            Some(EventFilter::new().with_kinds(vec![EventKind::Deactivated])),
        );

        bus.publish(deactivated());
        bus.publish(ShopkeeperEvent::Moved {
            permanent_id: Uuid::new_v4(),
            from: crate::BlockPos::new("world", 0, 0, 0),
            to: crate::BlockPos::new("world", 1, 0, 0),
        });

        assert_eq!(listener.count.load(Ordering::SeqCst), 1);
        assert!(bus.unsubscribe(id));
        assert_eq!(bus.listener_count(), 0);
    }

    #[test]
    fn test_history_limit() {
        let bus = EventBus::with_config(EventBusConfig {
            history_size: 5,
            ..Default::default()
        });

        for _ in 0..10 {
            bus.publish(deactivated());
        }

        let history = bus.history(None);
        assert_eq!(history.len(), 5);
        assert_eq!(history[0].seq, 10);
        assert_eq!(bus.event_count(), 10);
    }

    #[tokio::test]
    async fn test_broadcast_receiver() {
        let bus = EventBus::new();
        let mut rx = bus.receiver();

        let event = deactivated();
        bus.publish(event.clone());

        let record = rx.recv().await.unwrap();
        assert_eq!(record.event, event);
        assert_eq!(record.seq, 1);
    }
}
