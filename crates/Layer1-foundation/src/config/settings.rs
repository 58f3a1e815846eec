//! Shopkeepers Config - 통합 설정
//!
//! 글로벌 + 프로젝트 설정을 병합하는 ShopkeepersConfig

use crate::core::{DEFAULT_REGION_SHIFT, MAX_REGION_SHIFT};
use crate::storage::JsonStore;
use crate::{Error, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

/// 설정 파일명
pub const CONFIG_FILE: &str = "config.json";

// ============================================================================
// Shopkeepers Config (통합)
// ============================================================================

/// Shopkeepers 통합 설정
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ShopkeepersConfig {
    /// 버전 (마이그레이션용)
    #[serde(default = "default_version")]
    pub version: u32,

    /// 블록 좌표 → 리전 좌표 변환 시프트
    #[serde(default = "default_region_shift")]
    pub region_shift: u8,

    /// 생존 확인 패스 주기 (틱)
    #[serde(default = "default_liveness_check_period")]
    pub liveness_check_period_ticks: u64,

    /// 스폰 검증 패스 주기 (틱)
    #[serde(default = "default_spawn_verifier_period")]
    pub spawn_verifier_period_ticks: u64,

    /// 리전 로드 후 활성화 지연 (틱, 0이면 즉시)
    #[serde(default)]
    pub region_activation_delay_ticks: u64,

    /// 리전 로드 시 한 틱에 스폰할 최대 수 (0이면 제한 없이 즉시)
    #[serde(default)]
    pub spawns_per_tick: usize,

    /// 한 틱의 실제 시간 (밀리초)
    #[serde(default = "default_tick_millis")]
    pub tick_millis: u64,

    /// 데이터 디렉토리 (없으면 프로젝트 디렉토리 사용)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub data_dir: Option<PathBuf>,
}

impl Default for ShopkeepersConfig {
    fn default() -> Self {
        Self {
            version: default_version(),
            region_shift: default_region_shift(),
            liveness_check_period_ticks: default_liveness_check_period(),
            spawn_verifier_period_ticks: default_spawn_verifier_period(),
            region_activation_delay_ticks: 0,
            spawns_per_tick: 0,
            tick_millis: default_tick_millis(),
            data_dir: None,
        }
    }
}

impl ShopkeepersConfig {
    pub fn new() -> Self {
        Self::default()
    }

    // ========================================================================
    // Load / Save
    // ========================================================================

    /// 글로벌 + 프로젝트 병합 로드
    pub fn load() -> Result<Self> {
        let mut config = Self::new();

        // 1. 글로벌 설정
        if let Ok(global) = JsonStore::global() {
            if let Some(global_config) = global.load_optional::<ShopkeepersConfig>(CONFIG_FILE)? {
                config.merge(global_config);
            }
        }

        // 2. 프로젝트 설정
        if let Ok(project) = JsonStore::current_project() {
            if let Some(project_config) = project.load_optional::<ShopkeepersConfig>(CONFIG_FILE)? {
                config.merge(project_config);
            }
        }

        config.validate()?;
        Ok(config)
    }

    /// 파일 경로에서 로드 (.toml 또는 JSON)
    pub fn load_from_path(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path)
            .map_err(|e| Error::Config(format!("Failed to read {}: {}", path.display(), e)))?;

        let is_toml = path
            .extension()
            .map(|ext| ext.eq_ignore_ascii_case("toml"))
            .unwrap_or(false);

        let config: ShopkeepersConfig = if is_toml {
            toml::from_str(&content)?
        } else {
            serde_json::from_str(&content)?
        };

        config.validate()?;
        Ok(config)
    }

    // ========================================================================
    // Validation
    // ========================================================================

    /// 설정 값 검증
    pub fn validate(&self) -> Result<()> {
        if self.region_shift > MAX_REGION_SHIFT {
            return Err(Error::Config(format!(
                "regionShift must be at most {}, got {}",
                MAX_REGION_SHIFT, self.region_shift
            )));
        }
        if self.liveness_check_period_ticks == 0 {
            return Err(Error::Config(
                "livenessCheckPeriodTicks must be greater than zero".to_string(),
            ));
        }
        if self.spawn_verifier_period_ticks == 0 {
            return Err(Error::Config(
                "spawnVerifierPeriodTicks must be greater than zero".to_string(),
            ));
        }
        if self.tick_millis == 0 {
            return Err(Error::Config("tickMillis must be greater than zero".to_string()));
        }
        Ok(())
    }

    // ========================================================================
    // Merge
    // ========================================================================

    /// 다른 설정과 병합 (other의 기본값이 아닌 항목이 우선)
    pub fn merge(&mut self, other: ShopkeepersConfig) {
        if other.region_shift != default_region_shift() {
            self.region_shift = other.region_shift;
        }
        if other.liveness_check_period_ticks != default_liveness_check_period() {
            self.liveness_check_period_ticks = other.liveness_check_period_ticks;
        }
        if other.spawn_verifier_period_ticks != default_spawn_verifier_period() {
            self.spawn_verifier_period_ticks = other.spawn_verifier_period_ticks;
        }
        if other.region_activation_delay_ticks != 0 {
            self.region_activation_delay_ticks = other.region_activation_delay_ticks;
        }
        if other.spawns_per_tick != 0 {
            self.spawns_per_tick = other.spawns_per_tick;
        }
        if other.tick_millis != default_tick_millis() {
            self.tick_millis = other.tick_millis;
        }
        if other.data_dir.is_some() {
            self.data_dir = other.data_dir;
        }
    }

    // ========================================================================
    // Builder
    // ========================================================================

    pub fn region_shift(mut self, shift: u8) -> Self {
        self.region_shift = shift;
        self
    }

    pub fn activation_delay(mut self, ticks: u64) -> Self {
        self.region_activation_delay_ticks = ticks;
        self
    }

    pub fn spawns_per_tick(mut self, budget: usize) -> Self {
        self.spawns_per_tick = budget;
        self
    }

    pub fn data_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.data_dir = Some(dir.into());
        self
    }

    /// 한 틱의 실제 시간
    pub fn tick_duration(&self) -> Duration {
        Duration::from_millis(self.tick_millis)
    }

    /// 데이터 저장소
    pub fn data_store(&self) -> Result<JsonStore> {
        match &self.data_dir {
            Some(dir) => Ok(JsonStore::new(dir.clone())),
            None => JsonStore::current_project(),
        }
    }
}

// ============================================================================
// Helpers
// ============================================================================

fn default_version() -> u32 {
    1
}

fn default_region_shift() -> u8 {
    DEFAULT_REGION_SHIFT
}

fn default_liveness_check_period() -> u64 {
    20
}

fn default_spawn_verifier_period() -> u64 {
    600
}

fn default_tick_millis() -> u64 {
    50
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_config_default() {
        let config = ShopkeepersConfig::new();
        assert_eq!(config.version, 1);
        assert_eq!(config.region_shift, 4);
        assert_eq!(config.liveness_check_period_ticks, 20);
        assert_eq!(config.spawn_verifier_period_ticks, 600);
        assert_eq!(config.region_activation_delay_ticks, 0);
        assert_eq!(config.spawns_per_tick, 0);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_config_merge() {
        let mut base = ShopkeepersConfig::new();
        let other = ShopkeepersConfig::new().region_shift(5).activation_delay(20);

        base.merge(other);

        assert_eq!(base.region_shift, 5);
        assert_eq!(base.region_activation_delay_ticks, 20);
        assert_eq!(base.liveness_check_period_ticks, 20);
    }

    #[test]
    fn test_config_validation() {
        let config = ShopkeepersConfig::new().region_shift(17);
        assert!(config.validate().is_err());

        let mut config = ShopkeepersConfig::new();
        config.spawn_verifier_period_ticks = 0;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_config_serialization() {
        let json = r#"{"regionShift": 3, "tickMillis": 10, "spawnsPerTick": 6}"#;
        let config: ShopkeepersConfig = serde_json::from_str(json).unwrap();

        assert_eq!(config.region_shift, 3);
        assert_eq!(config.spawns_per_tick, 6);
        assert_eq!(config.tick_millis, 10);
        assert_eq!(config.spawn_verifier_period_ticks, 600);
    }

    #[test]
    fn test_load_from_toml() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("shopkeepers.toml");
        let mut file = std::fs::File::create(&path).unwrap();
        writeln!(file, "regionShift = 5").unwrap();
        writeln!(file, "livenessCheckPeriodTicks = 40").unwrap();

        let config = ShopkeepersConfig::load_from_path(&path).unwrap();
        assert_eq!(config.region_shift, 5);
        assert_eq!(config.liveness_check_period_ticks, 40);
    }

    #[test]
    fn test_load_from_path_rejects_invalid() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.json");
        std::fs::write(&path, r#"{"livenessCheckPeriodTicks": 0}"#).unwrap();

        assert!(ShopkeepersConfig::load_from_path(&path).is_err());
    }
}
