use crate::events::{BroadcastPreset, HotkeyAction, HotkeyBinding, InputCode, Modifiers};
use crate::mappings::KeyNames;
use crate::services::push_broadcaster::PushTiming;
use anyhow::{Context, Result};
use figment::{
    providers::{Env, Format, Serialized, Toml},
    Figment,
};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::path::Path;
use tracing::warn;

#[derive(Debug, Clone, Default, Deserialize, Serialize)]
#[serde(default)]
pub struct Config {
    pub logging: LoggingConfig,
    pub target: TargetConfig,
    pub input: InputConfig,
    pub broadcast: BroadcastConfig,
    pub push_to_broadcast: PushToBroadcastConfig,
    pub hotkeys: Vec<HotkeyConfig>,
    pub presets: Vec<BroadcastPreset>,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct LoggingConfig {
    pub level: String,
    pub format: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            format: "compact".to_string(),
        }
    }
}

/// Окна какого процесса считаются окнами мультибокса
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct TargetConfig {
    pub process_name: String,
    pub polling_interval_ms: u64,
}

impl Default for TargetConfig {
    fn default() -> Self {
        Self {
            process_name: String::new(),
            polling_interval_ms: 1000,
        }
    }
}

#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct InputConfig {
    pub keyboard_device: String,
    pub mouse_device: String,
}

impl Default for InputConfig {
    fn default() -> Self {
        Self {
            keyboard_device: "auto".to_string(),
            mouse_device: "auto".to_string(),
        }
    }
}

#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct BroadcastConfig {
    pub cooldown_ms: u64,
}

impl Default for BroadcastConfig {
    fn default() -> Self {
        Self { cooldown_ms: 500 }
    }
}

#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct PushToBroadcastConfig {
    /// Клавиша, удержание которой включает режим; без неё режим не используется
    pub trigger_key: Option<String>,
    pub source_settle_ms: u64,
    pub focus_settle_ms: u64,
    pub pacing_min_ms: u64,
    pub pacing_max_ms: u64,
    pub trigger_poll_ms: u64,
}

impl Default for PushToBroadcastConfig {
    fn default() -> Self {
        let timing = PushTiming::default();
        Self {
            trigger_key: None,
            source_settle_ms: timing.source_settle_ms,
            focus_settle_ms: timing.focus_settle_ms,
            pacing_min_ms: timing.pacing_min_ms,
            pacing_max_ms: timing.pacing_max_ms,
            trigger_poll_ms: 25,
        }
    }
}

impl PushToBroadcastConfig {
    pub fn timing(&self) -> PushTiming {
        PushTiming {
            source_settle_ms: self.source_settle_ms,
            focus_settle_ms: self.focus_settle_ms,
            pacing_min_ms: self.pacing_min_ms,
            pacing_max_ms: self.pacing_max_ms,
        }
    }

    /// Разобранная клавиша-триггер
    pub fn trigger(&self) -> Option<InputCode> {
        self.trigger_key.as_deref().and_then(KeyNames::input_code)
    }
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct HotkeyConfig {
    pub id: i32,
    pub key: String,
    #[serde(default)]
    pub modifiers: Vec<String>,
    pub action: HotkeyAction,
    #[serde(default)]
    pub slot: Option<usize>,
    #[serde(default)]
    pub preset: Option<String>,
    #[serde(default)]
    pub name: Option<String>,
}

impl HotkeyConfig {
    pub fn to_binding(&self) -> Result<HotkeyBinding, String> {
        let code = KeyNames::input_code(&self.key)
            .ok_or_else(|| format!("неизвестная клавиша '{}'", self.key))?;
        let modifiers = Modifiers::from_names(&self.modifiers)?;

        let mut binding = HotkeyBinding::new(self.id, modifiers, code, self.action);
        match self.action {
            HotkeyAction::FocusSlot => {
                let slot = self.slot.ok_or("для focus_slot не указан slot")?;
                binding = binding.with_slot(slot);
            }
            HotkeyAction::Broadcast => {
                let preset = self.preset.as_deref().ok_or("для broadcast не указан preset")?;
                binding = binding.with_preset(preset);
            }
            _ => {}
        }
        if let Some(name) = &self.name {
            binding = binding.with_display_name(name.clone());
        }
        Ok(binding)
    }
}

impl Config {
    pub fn load<P: AsRef<Path>>(config_path: P) -> Result<Self> {
        let config_path = config_path.as_ref();

        let figment = Figment::new()
            .merge(Serialized::defaults(Config::default()))
            .merge(Toml::file(config_path))
            .merge(Env::prefixed("MBOX_").split("__"));

        let config: Config = figment
            .extract()
            .with_context(|| format!("Не удалось загрузить конфигурацию из {:?}", config_path))?;

        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<()> {
        // Валидация настроек логирования
        match self.logging.level.as_str() {
            "trace" | "debug" | "info" | "warn" | "error" => {}
            _ => anyhow::bail!("Неверный уровень логирования: {}", self.logging.level),
        }

        match self.logging.format.as_str() {
            "pretty" | "compact" => {}
            _ => anyhow::bail!("Неверный формат логирования: {}", self.logging.format),
        }

        if self.target.polling_interval_ms < 100 {
            anyhow::bail!("polling_interval_ms должно быть минимум 100");
        }

        let push = &self.push_to_broadcast;
        if push.pacing_min_ms > push.pacing_max_ms {
            anyhow::bail!(
                "pacing_min_ms ({}) больше pacing_max_ms ({})",
                push.pacing_min_ms,
                push.pacing_max_ms
            );
        }
        if push.trigger_poll_ms == 0 {
            anyhow::bail!("trigger_poll_ms должно быть больше 0");
        }
        if let Some(key) = &push.trigger_key {
            if KeyNames::input_code(key).is_none() {
                anyhow::bail!("Неизвестная клавиша-триггер push-to-broadcast: {}", key);
            }
        }

        let mut ids = HashSet::new();
        for hotkey in &self.hotkeys {
            if !ids.insert(hotkey.id) {
                anyhow::bail!("Повторяющийся id горячей клавиши: {}", hotkey.id);
            }
        }

        let mut names = HashSet::new();
        for preset in &self.presets {
            if !names.insert(preset.name.to_lowercase()) {
                anyhow::bail!("Повторяющееся имя пресета: {}", preset.name);
            }
        }

        Ok(())
    }

    /// Привязки из конфигурации; некорректные записи пропускаются с предупреждением
    pub fn hotkey_bindings(&self) -> Vec<HotkeyBinding> {
        self.hotkeys
            .iter()
            .filter_map(|hotkey| match hotkey.to_binding() {
                Ok(binding) => Some(binding),
                Err(e) => {
                    warn!("Горячая клавиша #{} пропущена: {}", hotkey.id, e);
                    None
                }
            })
            .collect()
    }
}
