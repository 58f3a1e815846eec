//! Virtual World - 메모리 내 가상 월드
//!
//! 실제 게임 호스트 없이 코디네이터를 구동하기 위한 물리 오브젝트 저장소입니다.
//! 시뮬레이션에서 외부 간섭(파괴, 밀려남, 스폰 차단, ID 충돌)을 재현할 수 있습니다.

use super::traits::{ShopObject, SpawnError};
use super::types::ShopObjectTypes;
use parking_lot::Mutex;
use shopkeepers_foundation::{BlockPos, ObjectId};
use std::collections::{HashMap, HashSet};
use std::sync::Arc;
use tracing::trace;
use uuid::Uuid;

// ============================================================================
// VirtualKind
// ============================================================================

/// 가상 오브젝트 종류
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum VirtualKind {
    /// 몹 형태 - 리전 종속, 스폰마다 새 엔티티 ID
    Mob,
    /// 블록 형태 - 리전 종속, 점유 블록이 ID
    Block,
    /// NPC 형태 - 리전과 무관하게 항상 존재
    Npc,
}

impl VirtualKind {
    pub const ALL: [VirtualKind; 3] = [VirtualKind::Mob, VirtualKind::Block, VirtualKind::Npc];

    pub fn type_id(&self) -> &'static str {
        match self {
            Self::Mob => "mob",
            Self::Block => "block",
            Self::Npc => "npc",
        }
    }

    pub fn from_type_id(type_id: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|kind| kind.type_id() == type_id)
    }

    pub fn is_gated(&self) -> bool {
        !matches!(self, Self::Npc)
    }

    fn new_object_id(&self, position: &BlockPos) -> ObjectId {
        match self {
            Self::Mob | Self::Npc => ObjectId::Entity(Uuid::new_v4()),
            Self::Block => ObjectId::Block(position.clone()),
        }
    }
}

// ============================================================================
// VirtualWorld
// ============================================================================

#[derive(Debug)]
struct LiveObject {
    id: ObjectId,
    position: BlockPos,
}

#[derive(Debug, Default)]
struct WorldState {
    tick: u64,
    respawn_cooldown: u64,
    next_handle: u64,
    objects: HashMap<u64, LiveObject>,
    blocked: HashSet<BlockPos>,
    forced_ids: HashMap<BlockPos, ObjectId>,
    total_spawns: u64,
}

/// 가상 월드 (복제해도 같은 상태를 공유)
#[derive(Debug, Clone, Default)]
pub struct VirtualWorld {
    state: Arc<Mutex<WorldState>>,
}

impl VirtualWorld {
    pub fn new() -> Self {
        Self::default()
    }

    /// 파괴된 오브젝트의 재스폰 대기 틱 설정
    pub fn with_respawn_cooldown(self, ticks: u64) -> Self {
        self.state.lock().respawn_cooldown = ticks;
        self
    }

    /// 새 가상 오브젝트 (아직 스폰되지 않음)
    pub fn create_object(&self, kind: VirtualKind) -> VirtualShopObject {
        VirtualShopObject {
            world: self.clone(),
            kind,
            handle: None,
            object_id: None,
            last_spawn_tick: None,
            last_failure_tick: None,
        }
    }

    /// 세 종류가 모두 등록된 타입 레지스트리
    pub fn object_types(&self) -> ShopObjectTypes {
        let mut types = ShopObjectTypes::new();
        for kind in VirtualKind::ALL {
            let world = self.clone();
            types.register(kind.type_id(), move |_| Box::new(world.create_object(kind)));
        }
        types
    }

    // ========================================================================
    // 외부 간섭
    // ========================================================================

    /// despawn 없이 오브젝트 파괴 (같은 ID의 모든 오브젝트)
    pub fn destroy(&self, id: &ObjectId) -> bool {
        let mut state = self.state.lock();
        let before = state.objects.len();
        state.objects.retain(|_, obj| &obj.id != id);
        let destroyed = state.objects.len() != before;
        if destroyed {
            trace!(object_id = %id, "Virtual object destroyed externally");
        }
        destroyed
    }

    /// 오브젝트를 다른 위치로 밀어냄
    pub fn displace(&self, id: &ObjectId, to: BlockPos) -> bool {
        let mut state = self.state.lock();
        match state.objects.values_mut().find(|obj| &obj.id == id) {
            Some(obj) => {
                obj.position = to;
                true
            }
            None => false,
        }
    }

    /// 해당 위치의 스폰을 실패시킴
    pub fn fail_spawns_at(&self, position: BlockPos) {
        self.state.lock().blocked.insert(position);
    }

    pub fn allow_spawns_at(&self, position: &BlockPos) {
        self.state.lock().blocked.remove(position);
    }

    /// 해당 위치의 다음 스폰이 주어진 ID를 사용하도록 강제
    pub fn force_object_id(&self, position: BlockPos, id: ObjectId) {
        self.state.lock().forced_ids.insert(position, id);
    }

    // ========================================================================
    // 조회
    // ========================================================================

    pub fn advance_tick(&self) -> u64 {
        let mut state = self.state.lock();
        state.tick += 1;
        state.tick
    }

    pub fn current_tick(&self) -> u64 {
        self.state.lock().tick
    }

    pub fn is_present(&self, id: &ObjectId) -> bool {
        self.state.lock().objects.values().any(|obj| &obj.id == id)
    }

    pub fn position_of(&self, id: &ObjectId) -> Option<BlockPos> {
        self.state
            .lock()
            .objects
            .values()
            .find(|obj| &obj.id == id)
            .map(|obj| obj.position.clone())
    }

    pub fn object_count(&self) -> usize {
        self.state.lock().objects.len()
    }

    pub fn live_ids(&self) -> Vec<ObjectId> {
        self.state
            .lock()
            .objects
            .values()
            .map(|obj| obj.id.clone())
            .collect()
    }

    pub fn total_spawns(&self) -> u64 {
        self.state.lock().total_spawns
    }

    // ========================================================================
    // 내부 (VirtualShopObject 전용)
    // ========================================================================

    fn place(&self, kind: VirtualKind, position: &BlockPos) -> Result<(u64, ObjectId), SpawnError> {
        let mut state = self.state.lock();
        if state.blocked.contains(position) {
            return Err(SpawnError::Blocked(format!("position {} is blocked", position)));
        }

        let id = state
            .forced_ids
            .remove(position)
            .unwrap_or_else(|| kind.new_object_id(position));

        state.next_handle += 1;
        let handle = state.next_handle;
        state.objects.insert(
            handle,
            LiveObject {
                id: id.clone(),
                position: position.clone(),
            },
        );
        state.total_spawns += 1;
        Ok((handle, id))
    }

    fn remove(&self, handle: u64) {
        self.state.lock().objects.remove(&handle);
    }

    fn position_of_handle(&self, handle: u64) -> Option<BlockPos> {
        self.state
            .lock()
            .objects
            .get(&handle)
            .map(|obj| obj.position.clone())
    }

    fn relocate(&self, handle: u64, kind: VirtualKind, position: &BlockPos) -> Option<ObjectId> {
        let mut state = self.state.lock();
        let obj = state.objects.get_mut(&handle)?;
        obj.position = position.clone();
        if kind == VirtualKind::Block {
            obj.id = ObjectId::Block(position.clone());
        }
        Some(obj.id.clone())
    }

    fn tick_and_cooldown(&self) -> (u64, u64) {
        let state = self.state.lock();
        (state.tick, state.respawn_cooldown)
    }
}

// ============================================================================
// VirtualShopObject
// ============================================================================

/// 가상 월드의 ShopObject 구현
#[derive(Debug)]
pub struct VirtualShopObject {
    world: VirtualWorld,
    kind: VirtualKind,
    handle: Option<u64>,
    object_id: Option<ObjectId>,
    last_spawn_tick: Option<u64>,
    last_failure_tick: Option<u64>,
}

impl VirtualShopObject {
    pub fn kind(&self) -> VirtualKind {
        self.kind
    }

    fn remaining_cooldown(since: Option<u64>, now: u64, cooldown: u64) -> u64 {
        match since {
            Some(t) => cooldown.saturating_sub(now.saturating_sub(t)),
            None => 0,
        }
    }
}

impl ShopObject for VirtualShopObject {
    fn type_id(&self) -> &str {
        self.kind.type_id()
    }

    fn requires_presence_gating(&self) -> bool {
        self.kind.is_gated()
    }

    // 몹은 저장되지 않는 엔티티라 월드 저장과 무관
    fn despawn_during_world_save(&self) -> bool {
        self.kind == VirtualKind::Block
    }

    fn spawn(&mut self, position: &BlockPos) -> Result<(), SpawnError> {
        if self.is_active() {
            return Ok(());
        }

        let (now, cooldown) = self.world.tick_and_cooldown();
        let remaining = Self::remaining_cooldown(self.last_failure_tick, now, cooldown);
        if remaining > 0 {
            return Err(SpawnError::CoolingDown {
                remaining_ticks: remaining,
            });
        }

        match self.world.place(self.kind, position) {
            Ok((handle, id)) => {
                self.handle = Some(handle);
                self.object_id = Some(id);
                self.last_spawn_tick = Some(now);
                self.last_failure_tick = None;
                Ok(())
            }
            Err(e) => {
                self.handle = None;
                self.object_id = None;
                self.last_failure_tick = Some(now);
                Err(e)
            }
        }
    }

    fn despawn(&mut self) {
        if let Some(handle) = self.handle.take() {
            self.world.remove(handle);
        }
        self.object_id = None;
    }

    fn is_active(&self) -> bool {
        self.handle
            .map(|h| self.world.position_of_handle(h).is_some())
            .unwrap_or(false)
    }

    fn live_object_id(&self) -> Option<ObjectId> {
        if self.is_active() {
            self.object_id.clone()
        } else {
            None
        }
    }

    fn check(&mut self, position: &BlockPos) -> bool {
        let Some(handle) = self.handle else {
            return false;
        };

        match self.world.position_of_handle(handle) {
            Some(current) => {
                if &current != position {
                    // 밀려난 오브젝트는 제자리로
                    self.world.relocate(handle, self.kind, position);
                }
                false
            }
            None => {
                self.handle = None;
                self.object_id = None;

                let (now, cooldown) = self.world.tick_and_cooldown();
                if Self::remaining_cooldown(self.last_spawn_tick, now, cooldown) > 0 {
                    return false;
                }
                self.spawn(position).is_ok()
            }
        }
    }

    fn on_moved(&mut self, new_position: &BlockPos) {
        if let Some(handle) = self.handle {
            if let Some(id) = self.world.relocate(handle, self.kind, new_position) {
                self.object_id = Some(id);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn pos(x: i32) -> BlockPos {
        BlockPos::new("world", x, 64, 0)
    }

    #[test]
    fn test_spawn_and_despawn() {
        let world = VirtualWorld::new();
        let mut mob = world.create_object(VirtualKind::Mob);

        assert!(!mob.is_active());
        mob.spawn(&pos(1)).unwrap();
        let id = mob.live_object_id().unwrap();
        assert!(world.is_present(&id));

        mob.despawn();
        assert!(!mob.is_active());
        assert!(mob.live_object_id().is_none());
        assert_eq!(world.object_count(), 0);
    }

    #[test]
    fn test_mob_gets_new_id_per_spawn() {
        let world = VirtualWorld::new();
        let mut mob = world.create_object(VirtualKind::Mob);

        mob.spawn(&pos(1)).unwrap();
        let first = mob.live_object_id().unwrap();
        mob.despawn();
        mob.spawn(&pos(1)).unwrap();
        assert_ne!(mob.live_object_id().unwrap(), first);
    }

    #[test]
    fn test_block_id_is_position() {
        let world = VirtualWorld::new();
        let mut block = world.create_object(VirtualKind::Block);
        block.spawn(&pos(3)).unwrap();
        assert_eq!(block.live_object_id(), Some(ObjectId::Block(pos(3))));

        block.on_moved(&pos(4));
        assert_eq!(block.live_object_id(), Some(ObjectId::Block(pos(4))));
    }

    #[test]
    fn test_check_respawns_destroyed_object() {
        let world = VirtualWorld::new();
        let mut mob = world.create_object(VirtualKind::Mob);
        mob.spawn(&pos(1)).unwrap();
        let old = mob.live_object_id().unwrap();

        assert!(world.destroy(&old));
        assert!(mob.live_object_id().is_none());

        assert!(mob.check(&pos(1)));
        let new = mob.live_object_id().unwrap();
        assert_ne!(new, old);
    }

    #[test]
    fn test_check_respects_cooldown() {
        let world = VirtualWorld::new().with_respawn_cooldown(5);
        let mut mob = world.create_object(VirtualKind::Mob);
        mob.spawn(&pos(1)).unwrap();
        world.destroy(&mob.live_object_id().unwrap());

        assert!(!mob.check(&pos(1)));
        assert!(mob.live_object_id().is_none());
    }

    #[test]
    fn test_check_restores_displaced() {
        let world = VirtualWorld::new();
        let mut mob = world.create_object(VirtualKind::Mob);
        mob.spawn(&pos(1)).unwrap();
        let id = mob.live_object_id().unwrap();

        world.displace(&id, pos(50));
        assert!(!mob.check(&pos(1)));
        assert_eq!(world.position_of(&id), Some(pos(1)));
    }

    #[test]
    fn test_blocked_spawn_then_cooldown() {
        let world = VirtualWorld::new().with_respawn_cooldown(3);
        let mut block = world.create_object(VirtualKind::Block);

        world.fail_spawns_at(pos(2));
        assert!(matches!(block.spawn(&pos(2)), Err(SpawnError::Blocked(_))));

        world.allow_spawns_at(&pos(2));
        assert!(matches!(
            block.spawn(&pos(2)),
            Err(SpawnError::CoolingDown { remaining_ticks: 3 })
        ));

        for _ in 0..3 {
            world.advance_tick();
        }
        assert!(block.spawn(&pos(2)).is_ok());
    }

    #[test]
    fn test_forced_object_id() {
        let world = VirtualWorld::new();
        let forced = ObjectId::Custom("collide".to_string());
        world.force_object_id(pos(7), forced.clone());

        let mut mob = world.create_object(VirtualKind::Mob);
        mob.spawn(&pos(7)).unwrap();
        assert_eq!(mob.live_object_id(), Some(forced));
    }

    #[test]
    fn test_kind_from_type_id() {
        assert_eq!(VirtualKind::from_type_id("npc"), Some(VirtualKind::Npc));
        assert_eq!(VirtualKind::from_type_id("sign"), None);
        assert!(!VirtualKind::Npc.is_gated());
    }
}
