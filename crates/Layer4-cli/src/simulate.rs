//! World-streaming simulation
//!
//! 가상 월드 위에서 리전 로드/언로드, 외부 파괴, 이동, 삭제를 무작위로 일으키고
//! 스케줄러의 재조정 패스가 인덱스를 일관되게 유지하는지 확인합니다.

use anyhow::{anyhow, bail};
use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use rand::{Rng, SeedableRng};
use serde::Serialize;
use shopkeepers_core::{
    HostEvent, ShopkeeperRef, ShopkeepersPlugin, TickReport, UiSessions, VirtualKind,
    VirtualWorld,
};
use shopkeepers_foundation::{
    BlockPos, RegionKey, SaveWorker, SessionId, ShopkeeperStore, ShopkeepersConfig,
};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use tracing::{info, warn};
use uuid::Uuid;

const OVERWORLD: &str = "world";
const NETHER: &str = "world_nether";

/// simulate 서브커맨드 옵션
#[derive(Debug, Clone)]
pub struct SimulationOptions {
    pub shops: usize,
    pub ticks: u64,
    pub seed: u64,
    pub respawn_cooldown: u64,
    pub realtime: bool,
}

/// 시뮬레이션 누계
#[derive(Debug, Default, Serialize)]
struct SimulationTotals {
    ticks: u64,
    region_loads: usize,
    region_unloads: usize,
    world_unloads: usize,
    world_saves: usize,
    destroyed: usize,
    moved: usize,
    deleted: usize,
    disconnects: usize,
    delayed_activations: usize,
    queued_spawns: usize,
    world_save_respawns: usize,
    liveness_checks: usize,
    self_repaired: usize,
    rebound: usize,
    lost: usize,
    collided: usize,
    verifier_runs: usize,
    verifier_repaired: usize,
    verifier_failed: usize,
}

impl SimulationTotals {
    fn absorb(&mut self, report: &TickReport) {
        self.ticks = report.tick;
        self.delayed_activations += report.region_activations.activated;
        self.queued_spawns += report.spawn_queue.spawned;
        self.world_save_respawns += report.world_save_respawns.activated;
        if let Some(liveness) = &report.liveness {
            self.liveness_checks += 1;
            self.self_repaired += liveness.repaired;
            self.rebound += liveness.rebound;
            self.lost += liveness.lost;
            self.collided += liveness.collided;
        }
        if let Some(verifier) = &report.verifier {
            self.verifier_runs += 1;
            self.verifier_repaired += verifier.repaired;
            self.verifier_failed += verifier.failed;
        }
    }
}

/// UI 세션 대신 호출 횟수만 센다
#[derive(Debug, Default)]
struct CountingUi {
    closed: AtomicUsize,
    deactivated: AtomicUsize,
    disconnects: AtomicUsize,
}

impl UiSessions for CountingUi {
    fn close_sessions(&self, _shopkeeper: &ShopkeeperRef) {
        self.closed.fetch_add(1, Ordering::Relaxed);
    }

    fn on_shopkeeper_deactivated(&self, _shopkeeper: &ShopkeeperRef) {
        self.deactivated.fetch_add(1, Ordering::Relaxed);
    }

    fn on_player_disconnect(&self, _player: Uuid) {
        self.disconnects.fetch_add(1, Ordering::Relaxed);
    }
}

// ============================================================================
// Simulation
// ============================================================================

struct Simulation {
    rng: StdRng,
    world: VirtualWorld,
    shift: u8,
    /// 월드당 리전 격자 한 변
    side: i32,
    regions: Vec<RegionKey>,
}

impl Simulation {
    fn new(options: &SimulationOptions, world: VirtualWorld, shift: u8) -> Self {
        let side = ((options.shops as f64 / 4.0).sqrt().ceil() as i32).max(2);
        let regions = [OVERWORLD, NETHER]
            .iter()
            .flat_map(|w| (0..side).flat_map(move |x| (0..side).map(move |z| RegionKey::new(*w, x, z))))
            .collect();

        Self {
            rng: StdRng::seed_from_u64(options.seed),
            world,
            shift,
            side,
            regions,
        }
    }

    /// 호스트가 시작 시점에 이미 로드해 둔 리전 (절반 정도)
    fn initial_regions(&mut self) -> Vec<RegionKey> {
        let mut loaded = Vec::new();
        for key in &self.regions {
            if self.rng.gen_bool(0.5) {
                loaded.push(key.clone());
            }
        }
        loaded
    }

    fn random_kind(&mut self) -> VirtualKind {
        match self.rng.gen_range(0..10) {
            0..=4 => VirtualKind::Mob,
            5..=7 => VirtualKind::Block,
            _ => VirtualKind::Npc,
        }
    }

    fn random_position(&mut self) -> BlockPos {
        let world = if self.rng.gen_bool(0.8) { OVERWORLD } else { NETHER };
        let span = 1i32 << self.shift;
        let x = (self.rng.gen_range(0..self.side) << self.shift) + self.rng.gen_range(0..span);
        let z = (self.rng.gen_range(0..self.side) << self.shift) + self.rng.gen_range(0..span);
        BlockPos::new(world, x, self.rng.gen_range(60..80), z)
    }

    fn pick_region(&mut self) -> Option<RegionKey> {
        self.regions.choose(&mut self.rng).cloned()
    }

    fn pick_session(&mut self, plugin: &ShopkeepersPlugin) -> Option<SessionId> {
        let coordinator = plugin.coordinator()?;
        coordinator
            .all_records()
            .choose(&mut self.rng)
            .map(|r| r.session_id())
    }

    /// 한 틱 동안의 외부 사건과 스케줄러 실행
    fn step(
        &mut self,
        plugin: &mut ShopkeepersPlugin,
        totals: &mut SimulationTotals,
    ) -> anyhow::Result<()> {
        self.world.advance_tick();

        if self.rng.gen_bool(0.08) {
            if let Some(key) = self.pick_region() {
                let loaded = plugin
                    .coordinator()
                    .map(|c| c.is_region_loaded(&key))
                    .unwrap_or(false);
                if loaded {
                    plugin.handle(HostEvent::RegionUnloaded(key));
                    totals.region_unloads += 1;
                } else {
                    let newly_generated = self.rng.gen_bool(0.1);
                    plugin.handle(HostEvent::RegionLoaded {
                        key,
                        newly_generated,
                    });
                    totals.region_loads += 1;
                }
            }
        }

        if self.rng.gen_bool(0.04) {
            let live = self.world.live_ids();
            if let Some(id) = live.choose(&mut self.rng) {
                self.world.destroy(id);
                totals.destroyed += 1;
            }
        }

        if self.rng.gen_bool(0.02) {
            if let Some(session_id) = self.pick_session(plugin) {
                let to = self.random_position();
                plugin.move_shopkeeper(session_id, to)?;
                totals.moved += 1;
            }
        }

        if self.rng.gen_bool(0.005) {
            if let Some(session_id) = self.pick_session(plugin) {
                plugin.delete_shopkeeper(session_id)?;
                totals.deleted += 1;
            }
        }

        if self.rng.gen_bool(0.002) {
            plugin.handle(HostEvent::WorldUnloaded(NETHER.to_string()));
            totals.world_unloads += 1;
        }

        if self.rng.gen_bool(0.01) {
            plugin.handle(HostEvent::WorldSaved(OVERWORLD.to_string()));
            totals.world_saves += 1;
        }

        if self.rng.gen_bool(0.01) {
            plugin.handle(HostEvent::PlayerDisconnect(Uuid::from_u128(self.rng.gen())));
            totals.disconnects += 1;
        }

        if let Some(report) = plugin.handle(HostEvent::Tick) {
            totals.absorb(&report);
        }
        Ok(())
    }
}

// ============================================================================
// Entry
// ============================================================================

/// 시뮬레이션 실행
pub async fn run(config: ShopkeepersConfig, options: SimulationOptions) -> anyhow::Result<()> {
    config.validate()?;
    let store = ShopkeeperStore::new(config.data_store()?);
    let worker = SaveWorker::spawn(store.clone());
    let saves = worker.handle();
    let ui = Arc::new(CountingUi::default());
    let world = VirtualWorld::new().with_respawn_cooldown(options.respawn_cooldown);

    let mut plugin = ShopkeepersPlugin::new(config.clone(), world.object_types(), store)
        .with_save_sink(Arc::new(saves.clone()))
        .with_ui_sessions(ui.clone());

    let mut sim = Simulation::new(&options, world.clone(), config.region_shift);
    let initially_loaded = sim.initial_regions();
    let enabled = plugin.enable(initially_loaded)?;

    for _ in 0..options.shops {
        let kind = sim.random_kind();
        let position = sim.random_position();
        plugin.create_shopkeeper_of_type(kind.type_id(), position)?;
    }
    info!(
        seed = options.seed,
        shops = options.shops,
        ticks = options.ticks,
        loaded = enabled.registered,
        "Starting simulation"
    );

    let mut totals = SimulationTotals::default();
    let mut interval = options
        .realtime
        .then(|| tokio::time::interval(config.tick_duration()));

    for _ in 0..options.ticks {
        if let Some(interval) = interval.as_mut() {
            tokio::select! {
                _ = interval.tick() => {}
                _ = tokio::signal::ctrl_c() => {
                    warn!(tick = totals.ticks, "Interrupted, stopping simulation");
                    break;
                }
            }
        }
        sim.step(&mut plugin, &mut totals)?;
    }

    let coordinator = plugin
        .coordinator()
        .ok_or_else(|| anyhow!("plugin was disabled during the simulation"))?;
    let stats = coordinator.stats();
    let violations = coordinator.check_invariants();

    let report = serde_json::json!({
        "enable": enabled,
        "totals": totals,
        "stats": stats,
        "liveObjects": world.object_count(),
        "totalSpawns": world.total_spawns(),
        "ui": {
            "closed": ui.closed.load(Ordering::Relaxed),
            "deactivated": ui.deactivated.load(Ordering::Relaxed),
            "disconnects": ui.disconnects.load(Ordering::Relaxed),
        },
        "violations": violations.iter().map(|v| v.to_string()).collect::<Vec<_>>(),
    });
    println!("{}", serde_json::to_string_pretty(&report)?);

    for violation in &violations {
        warn!(%violation, "Invariant violated after simulation");
    }

    plugin.disable()?;
    plugin.wait_for_saves().await?;
    let status = saves.status();
    worker.shutdown().await?;
    info!(
        requested = status.requested,
        completed = status.completed,
        failed = status.failed,
        "Save worker drained"
    );

    if !violations.is_empty() {
        bail!("{} invariant violation(s) after simulation", violations.len());
    }
    Ok(())
}
