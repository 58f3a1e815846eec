//! Shopkeepers Plugin - enable / disable / reload 와 호스트 이벤트 분배

use super::host::HostEvent;
use crate::lifecycle::{
    LifecycleCoordinator, NoopUiSessions, RegistryError, TickReport, UiSessions,
};
use crate::registry::ShopkeeperRecord;
use crate::shop_object::{ShopObject, ShopObjectTypes};
use serde::Serialize;
use shopkeepers_foundation::{
    AddCause, BlockPos, EventBus, NoopSaveSink, RegionKey, SaveBarrier, SaveSink, SessionId,
    ShopkeeperData, ShopkeeperStore, ShopkeepersConfig,
};
use std::sync::Arc;
use tracing::{debug, info, trace, warn};
use uuid::Uuid;

/// enable 결과 요약
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct EnableSummary {
    /// 저장소에 있던 레코드 수
    pub stored: usize,
    pub registered: usize,
    /// 알 수 없는 오브젝트 타입으로 건너뜀
    pub unknown_type: usize,
    /// 영구 ID 중복으로 건너뜀
    pub duplicates: usize,
    pub active: usize,
    pub loaded_regions: usize,
}

impl EnableSummary {
    pub fn skipped(&self) -> usize {
        self.unknown_type + self.duplicates
    }
}

/// 상점 주인 플러그인
///
/// 코디네이터는 enable 과 disable 사이에만 존재합니다.
/// disable 은 마지막 스냅샷을 저장 대상에 넘기고, 그 저장이 끝나야 다시 enable 할 수 있습니다.
pub struct ShopkeepersPlugin {
    config: ShopkeepersConfig,
    types: ShopObjectTypes,
    store: ShopkeeperStore,
    saves: Arc<dyn SaveSink>,
    ui: Arc<dyn UiSessions>,
    events: Arc<EventBus>,
    coordinator: Option<LifecycleCoordinator>,
    pending_save: Option<SaveBarrier>,
}

impl ShopkeepersPlugin {
    pub fn new(config: ShopkeepersConfig, types: ShopObjectTypes, store: ShopkeeperStore) -> Self {
        Self {
            config,
            types,
            store,
            saves: Arc::new(NoopSaveSink),
            ui: Arc::new(NoopUiSessions),
            events: Arc::new(EventBus::new()),
            coordinator: None,
            pending_save: None,
        }
    }

    /// 저장 요청 대상 (보통 SaveWorker 핸들)
    pub fn with_save_sink(mut self, saves: Arc<dyn SaveSink>) -> Self {
        self.saves = saves;
        self
    }

    pub fn with_ui_sessions(mut self, ui: Arc<dyn UiSessions>) -> Self {
        self.ui = ui;
        self
    }

    pub fn with_event_bus(mut self, events: Arc<EventBus>) -> Self {
        self.events = events;
        self
    }

    // ========================================================================
    // 라이프사이클
    // ========================================================================

    /// 활성화
    ///
    /// 호스트에 이미 로드된 리전을 먼저 표시한 뒤 저장된 상점 주인을 불러옵니다.
    /// 레코드 하나의 실패는 나머지 로드를 막지 않습니다.
    /// 직전 disable 의 저장이 진행 중이면 [`RegistryError::SavePending`].
    pub fn enable(
        &mut self,
        loaded_regions: impl IntoIterator<Item = RegionKey>,
    ) -> Result<EnableSummary, RegistryError> {
        if self.coordinator.is_some() {
            return Err(RegistryError::AlreadyEnabled);
        }
        self.config.validate()?;
        if let Some(barrier) = self.pending_save.take() {
            match barrier.try_complete() {
                Ok(result) => result?,
                Err(barrier) => {
                    self.pending_save = Some(barrier);
                    return Err(RegistryError::SavePending);
                }
            }
        }

        let stored = self.store.load()?;
        let mut coordinator = LifecycleCoordinator::builder(&self.config)
            .ui_sessions(Arc::clone(&self.ui))
            .save_sink(Arc::clone(&self.saves))
            .event_bus(Arc::clone(&self.events))
            .build();

        let mut summary = EnableSummary {
            stored: stored.len(),
            ..Default::default()
        };

        for key in loaded_regions {
            coordinator.on_region_loaded(key);
            summary.loaded_regions += 1;
        }

        for data in stored.shopkeepers {
            match self.load_record(&mut coordinator, data) {
                Ok(_) => summary.registered += 1,
                Err(RegistryError::UnknownObjectType(_)) => summary.unknown_type += 1,
                Err(RegistryError::DuplicateIdentity { .. }) => summary.duplicates += 1,
                Err(e) => return Err(e),
            }
        }
        summary.active = coordinator.active_count();

        info!(
            registered = summary.registered,
            skipped = summary.skipped(),
            active = summary.active,
            loaded_regions = summary.loaded_regions,
            "Shopkeepers enabled"
        );
        self.coordinator = Some(coordinator);
        Ok(summary)
    }

    fn load_record(
        &self,
        coordinator: &mut LifecycleCoordinator,
        data: ShopkeeperData,
    ) -> Result<SessionId, RegistryError> {
        let object = self.types.create(&data).map_err(|e| {
            warn!(
                permanent_id = %data.unique_id,
                object_type = %data.object_type,
                position = %data.position,
                "Skipping stored shopkeeper with unknown object type"
            );
            e
        })?;
        coordinator.register(data.unique_id, data.position, object, AddCause::Loaded)
    }

    /// 비활성화 - 마지막 스냅샷을 저장 대상에 넘기고 모든 레코드를 언로드한 뒤 코디네이터를 폐기
    pub fn disable(&mut self) -> Result<usize, RegistryError> {
        let mut coordinator = self.coordinator.take().ok_or(RegistryError::NotEnabled)?;
        self.saves.request_save(coordinator.snapshot_data());
        self.pending_save = Some(self.saves.barrier());

        let unloaded = coordinator.on_disable();
        info!(unloaded, "Shopkeepers disabled");
        Ok(unloaded)
    }

    /// 직전 disable 의 저장이 끝날 때까지 대기
    pub async fn wait_for_saves(&mut self) -> Result<(), RegistryError> {
        if let Some(barrier) = self.pending_save.take() {
            barrier.wait().await?;
        }
        Ok(())
    }

    /// 재시작 (세션 ID는 1부터 다시 시작)
    ///
    /// disable 의 저장이 디스크에 반영된 뒤 다시 불러옵니다.
    pub async fn reload(
        &mut self,
        loaded_regions: impl IntoIterator<Item = RegionKey>,
    ) -> Result<EnableSummary, RegistryError> {
        if self.coordinator.is_some() {
            self.disable()?;
        }
        self.wait_for_saves().await?;
        self.enable(loaded_regions)
    }

    pub fn is_enabled(&self) -> bool {
        self.coordinator.is_some()
    }

    // ========================================================================
    // 호스트 이벤트
    // ========================================================================

    /// 호스트 이벤트 처리 (틱이면 결과 반환)
    pub fn handle(&mut self, event: HostEvent) -> Option<TickReport> {
        let Some(coordinator) = self.coordinator.as_mut() else {
            debug!(event = event.name(), "Ignoring host event while disabled");
            return None;
        };

        match event {
            HostEvent::RegionLoaded {
                key,
                newly_generated,
            } => {
                trace!(region = %key, newly_generated, "Region loaded");
                coordinator.on_region_loaded(key);
                None
            }
            HostEvent::RegionUnloaded(key) => {
                coordinator.on_region_unloaded(&key);
                None
            }
            HostEvent::WorldUnloaded(world) => {
                coordinator.on_world_unloaded(&world);
                None
            }
            HostEvent::WorldSaved(world) => {
                coordinator.on_world_saved(&world);
                None
            }
            HostEvent::PlayerDisconnect(player) => {
                self.ui.on_player_disconnect(player);
                None
            }
            HostEvent::Tick => Some(coordinator.tick()),
        }
    }

    // ========================================================================
    // 상점 주인 조작
    // ========================================================================

    /// 새 상점 주인 생성
    pub fn create_shopkeeper(
        &mut self,
        object: Box<dyn ShopObject>,
        position: BlockPos,
    ) -> Result<SessionId, RegistryError> {
        self.coordinator_mut()?.create(position, object)
    }

    /// 등록된 타입 ID로 새 상점 주인 생성
    pub fn create_shopkeeper_of_type(
        &mut self,
        type_id: &str,
        position: BlockPos,
    ) -> Result<SessionId, RegistryError> {
        let data = ShopkeeperData::new(Uuid::new_v4(), type_id, position);
        let object = self.types.create(&data)?;
        let coordinator = self.coordinator.as_mut().ok_or(RegistryError::NotEnabled)?;
        coordinator.register(data.unique_id, data.position, object, AddCause::Created)
    }

    pub fn delete_shopkeeper(
        &mut self,
        session_id: SessionId,
    ) -> Result<Option<ShopkeeperRecord>, RegistryError> {
        Ok(self.coordinator_mut()?.delete(session_id))
    }

    /// 이동 (리전이 바뀌었으면 true)
    pub fn move_shopkeeper(
        &mut self,
        session_id: SessionId,
        position: BlockPos,
    ) -> Result<bool, RegistryError> {
        Ok(self.coordinator_mut()?.move_record(session_id, position)?)
    }

    // ========================================================================
    // 접근자
    // ========================================================================

    pub fn coordinator(&self) -> Option<&LifecycleCoordinator> {
        self.coordinator.as_ref()
    }

    pub fn coordinator_mut(&mut self) -> Result<&mut LifecycleCoordinator, RegistryError> {
        self.coordinator.as_mut().ok_or(RegistryError::NotEnabled)
    }

    pub fn config(&self) -> &ShopkeepersConfig {
        &self.config
    }

    pub fn object_types(&self) -> &ShopObjectTypes {
        &self.types
    }

    pub fn store(&self) -> &ShopkeeperStore {
        &self.store
    }

    pub fn events(&self) -> &Arc<EventBus> {
        &self.events
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::lifecycle::ShopkeeperRef;
    use crate::shop_object::{VirtualKind, VirtualWorld};
    use parking_lot::Mutex;
    use shopkeepers_foundation::{JsonStore, SaveWorker, StoredShopkeepers};

    fn pos(x: i32, z: i32) -> BlockPos {
        BlockPos::new("world", x, 64, z)
    }

    fn seed_store(store: &ShopkeeperStore, entries: &[(&str, BlockPos)]) -> Vec<Uuid> {
        let data: Vec<ShopkeeperData> = entries
            .iter()
            .map(|(ty, p)| ShopkeeperData::new(Uuid::new_v4(), *ty, p.clone()))
            .collect();
        let ids = data.iter().map(|d| d.unique_id).collect();
        store.save(&StoredShopkeepers::new(data)).unwrap();
        ids
    }

    #[derive(Default)]
    struct DisconnectLog(Mutex<Vec<Uuid>>);

    impl UiSessions for DisconnectLog {
        fn close_sessions(&self, _shopkeeper: &ShopkeeperRef) {}

        fn on_player_disconnect(&self, player: Uuid) {
            self.0.lock().push(player);
        }
    }

    #[test]
    fn test_enable_loads_stored_shopkeepers() {
        let dir = tempfile::tempdir().unwrap();
        let store = ShopkeeperStore::new(JsonStore::new(dir.path()));
        seed_store(
            &store,
            &[("mob", pos(0, 0)), ("block", pos(100, 100)), ("npc", pos(500, 0))],
        );

        let world = VirtualWorld::new();
        let mut plugin =
            ShopkeepersPlugin::new(ShopkeepersConfig::default(), world.object_types(), store);
        let summary = plugin.enable([pos(0, 0).region(4)]).unwrap();

        assert_eq!(summary.stored, 3);
        assert_eq!(summary.registered, 3);
        assert_eq!(summary.skipped(), 0);
        // 로드된 리전의 mob + 리전 무관 npc
        assert_eq!(summary.active, 2);
        assert_eq!(summary.loaded_regions, 1);
    }

    #[test]
    fn test_enable_skips_bad_records() {
        let dir = tempfile::tempdir().unwrap();
        let store = ShopkeeperStore::new(JsonStore::new(dir.path()));
        let id = Uuid::new_v4();
        let data = vec![
            ShopkeeperData::new(id, "mob", pos(0, 0)),
            ShopkeeperData::new(id, "mob", pos(1, 0)),
            ShopkeeperData::new(Uuid::new_v4(), "dragon", pos(2, 0)),
            ShopkeeperData::new(Uuid::new_v4(), "block", pos(3, 0)),
        ];
        store.save(&StoredShopkeepers::new(data)).unwrap();

        let world = VirtualWorld::new();
        let mut plugin =
            ShopkeepersPlugin::new(ShopkeepersConfig::default(), world.object_types(), store);
        let summary = plugin.enable(Vec::new()).unwrap();

        assert_eq!(summary.registered, 2);
        assert_eq!(summary.duplicates, 1);
        assert_eq!(summary.unknown_type, 1);
    }

    #[test]
    fn test_enable_twice_fails() {
        let dir = tempfile::tempdir().unwrap();
        let store = ShopkeeperStore::new(JsonStore::new(dir.path()));
        let mut plugin = ShopkeepersPlugin::new(
            ShopkeepersConfig::default(),
            VirtualWorld::new().object_types(),
            store,
        );

        plugin.enable(Vec::new()).unwrap();
        assert!(matches!(
            plugin.enable(Vec::new()),
            Err(RegistryError::AlreadyEnabled)
        ));
    }

    #[test]
    fn test_disabled_plugin_rejects_operations() {
        let dir = tempfile::tempdir().unwrap();
        let store = ShopkeeperStore::new(JsonStore::new(dir.path()));
        let world = VirtualWorld::new();
        let mut plugin =
            ShopkeepersPlugin::new(ShopkeepersConfig::default(), world.object_types(), store);

        assert!(matches!(plugin.disable(), Err(RegistryError::NotEnabled)));
        assert!(matches!(
            plugin.create_shopkeeper(Box::new(world.create_object(VirtualKind::Mob)), pos(0, 0)),
            Err(RegistryError::NotEnabled)
        ));
        assert!(plugin.handle(HostEvent::Tick).is_none());
        assert!(plugin
            .handle(HostEvent::RegionLoaded {
                key: pos(0, 0).region(4),
                newly_generated: false,
            })
            .is_none());
    }

    #[tokio::test]
    async fn test_reload_restarts_session_ids() {
        let dir = tempfile::tempdir().unwrap();
        let store = ShopkeeperStore::new(JsonStore::new(dir.path()));
        let ids = seed_store(&store, &[("mob", pos(0, 0)), ("mob", pos(40, 0))]);

        let world = VirtualWorld::new();
        let mut plugin =
            ShopkeepersPlugin::new(ShopkeepersConfig::default(), world.object_types(), store);
        plugin.enable(Vec::new()).unwrap();
        let created = plugin.create_shopkeeper_of_type("npc", pos(80, 0)).unwrap();
        assert_eq!(created, SessionId(3));

        plugin.reload(Vec::new()).await.unwrap();
        let coordinator = plugin.coordinator().unwrap();
        assert_eq!(coordinator.lookup_by_permanent(&ids[0]).unwrap().session_id(), SessionId(1));
        assert_eq!(coordinator.lookup_by_permanent(&ids[1]).unwrap().session_id(), SessionId(2));
        // 생성된 npc는 NoopSaveSink라 저장되지 않음
        assert_eq!(coordinator.record_count(), 2);
    }

    #[test]
    fn test_host_events_dispatch() {
        let dir = tempfile::tempdir().unwrap();
        let store = ShopkeeperStore::new(JsonStore::new(dir.path()));
        seed_store(&store, &[("mob", pos(0, 0))]);

        let world = VirtualWorld::new();
        let ui = Arc::new(DisconnectLog::default());
        let mut plugin =
            ShopkeepersPlugin::new(ShopkeepersConfig::default(), world.object_types(), store)
                .with_ui_sessions(ui.clone());
        plugin.enable(Vec::new()).unwrap();

        let key = pos(0, 0).region(4);
        plugin.handle(HostEvent::RegionLoaded {
            key: key.clone(),
            newly_generated: false,
        });
        assert_eq!(plugin.coordinator().unwrap().active_count(), 1);

        plugin.handle(HostEvent::RegionUnloaded(key));
        assert_eq!(plugin.coordinator().unwrap().active_count(), 0);

        let report = plugin.handle(HostEvent::Tick).unwrap();
        assert_eq!(report.tick, 1);

        let player = Uuid::new_v4();
        plugin.handle(HostEvent::PlayerDisconnect(player));
        assert_eq!(*ui.0.lock(), vec![player]);
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn test_changes_reach_storage_through_worker() {
        let dir = tempfile::tempdir().unwrap();
        let store = ShopkeeperStore::new(JsonStore::new(dir.path()));
        let worker = SaveWorker::spawn(store.clone());
        let handle = worker.handle();

        let world = VirtualWorld::new();
        let mut plugin = ShopkeepersPlugin::new(
            ShopkeepersConfig::default(),
            world.object_types(),
            store.clone(),
        )
        .with_save_sink(Arc::new(handle.clone()));
        plugin.enable(Vec::new()).unwrap();

        let a = plugin.create_shopkeeper_of_type("mob", pos(0, 0)).unwrap();
        plugin.create_shopkeeper_of_type("block", pos(20, 0)).unwrap();
        plugin.move_shopkeeper(a, pos(60, 0)).unwrap();
        handle.flush().await.unwrap();

        let saved = store.load().unwrap();
        assert_eq!(saved.len(), 2);
        assert_eq!(saved.shopkeepers[0].position, pos(60, 0));

        plugin.delete_shopkeeper(a).unwrap();
        plugin.disable().unwrap();
        worker.shutdown().await.unwrap();

        // 언로드는 레코드를 지우지 않으므로 삭제만 반영
        assert_eq!(store.load().unwrap().len(), 1);
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn test_reload_keeps_shopkeepers_saved_through_worker() {
        let dir = tempfile::tempdir().unwrap();
        let store = ShopkeeperStore::new(JsonStore::new(dir.path()));
        let worker = SaveWorker::spawn(store.clone());
        let handle = worker.handle();

        let world = VirtualWorld::new();
        let mut plugin = ShopkeepersPlugin::new(
            ShopkeepersConfig::default(),
            world.object_types(),
            store.clone(),
        )
        .with_save_sink(Arc::new(handle.clone()));
        plugin.enable(Vec::new()).unwrap();

        // 저장 요청만 하고 디스크 반영은 기다리지 않음
        let sid = plugin.create_shopkeeper_of_type("npc", pos(0, 0)).unwrap();
        let permanent_id = plugin
            .coordinator()
            .unwrap()
            .lookup_by_session(sid)
            .unwrap()
            .permanent_id();

        let summary = plugin.reload(Vec::new()).await.unwrap();
        assert_eq!(summary.registered, 1);
        let coordinator = plugin.coordinator().unwrap();
        assert_eq!(coordinator.record_count(), 1);
        assert!(coordinator.lookup_by_permanent(&permanent_id).unwrap().is_active());

        plugin.create_shopkeeper_of_type("npc", pos(40, 0)).unwrap();
        handle.flush().await.unwrap();
        assert_eq!(store.load().unwrap().len(), 2);

        plugin.disable().unwrap();
        worker.shutdown().await.unwrap();
        assert_eq!(store.load().unwrap().len(), 2);
    }

    #[tokio::test]
    async fn test_enable_waits_for_final_save() {
        let dir = tempfile::tempdir().unwrap();
        let store = ShopkeeperStore::new(JsonStore::new(dir.path()));
        let worker = SaveWorker::spawn(store.clone());

        let world = VirtualWorld::new();
        let mut plugin = ShopkeepersPlugin::new(
            ShopkeepersConfig::default(),
            world.object_types(),
            store.clone(),
        )
        .with_save_sink(Arc::new(worker.handle()));
        plugin.enable(Vec::new()).unwrap();
        plugin.create_shopkeeper_of_type("npc", pos(0, 0)).unwrap();
        plugin.disable().unwrap();

        // 현재 스레드 런타임이라 워커가 아직 실행되지 않음
        assert!(matches!(
            plugin.enable(Vec::new()),
            Err(RegistryError::SavePending)
        ));
        assert!(!plugin.is_enabled());

        plugin.wait_for_saves().await.unwrap();
        let summary = plugin.enable(Vec::new()).unwrap();
        assert_eq!(summary.registered, 1);

        plugin.disable().unwrap();
        worker.shutdown().await.unwrap();
    }

    #[test]
    fn test_enable_rejects_invalid_config() {
        let dir = tempfile::tempdir().unwrap();
        let store = ShopkeeperStore::new(JsonStore::new(dir.path()));
        let mut plugin = ShopkeepersPlugin::new(
            ShopkeepersConfig::default().region_shift(40),
            VirtualWorld::new().object_types(),
            store,
        );

        assert!(matches!(
            plugin.enable(Vec::new()),
            Err(RegistryError::Foundation(_))
        ));
        assert!(!plugin.is_enabled());
    }

    #[test]
    fn test_world_save_event_respawns_on_next_tick() {
        let dir = tempfile::tempdir().unwrap();
        let store = ShopkeeperStore::new(JsonStore::new(dir.path()));
        seed_store(&store, &[("block", pos(0, 0)), ("mob", pos(1, 0))]);

        let world = VirtualWorld::new();
        let mut plugin =
            ShopkeepersPlugin::new(ShopkeepersConfig::default(), world.object_types(), store);
        plugin.enable([pos(0, 0).region(4)]).unwrap();
        assert_eq!(plugin.coordinator().unwrap().active_count(), 2);

        plugin.handle(HostEvent::WorldSaved("world".to_string()));
        assert_eq!(plugin.coordinator().unwrap().active_count(), 1);

        let report = plugin.handle(HostEvent::Tick).unwrap();
        assert_eq!(report.world_save_respawns.activated, 1);
        assert_eq!(plugin.coordinator().unwrap().active_count(), 2);
    }
}
