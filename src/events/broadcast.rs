use super::hotkey::MouseButton;
use super::input::ClientPoint;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Пресет рассылки в том виде, в каком его сохранил пользователь
///
/// Поля хранятся "сырыми": проверка выполняется при каждом вызове рассылки,
/// некорректный пресет отклоняется целиком и никогда не исправляется молча.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BroadcastPreset {
    pub name: String,
    /// `key` | `click_at_position` | `click_at_cursor`
    pub input_type: String,
    #[serde(default)]
    pub key: Option<String>,
    #[serde(default)]
    pub click_x: Option<i32>,
    #[serde(default)]
    pub click_y: Option<i32>,
    /// `left` | `right`
    #[serde(default = "default_click_button")]
    pub click_button: String,
    /// `all` | `all_except_leader` | `custom`
    #[serde(default = "default_targets")]
    pub targets: String,
    #[serde(default)]
    pub custom_indices: Vec<i64>,
    #[serde(default)]
    pub delay_min_ms: i64,
    #[serde(default)]
    pub delay_max_ms: i64,
    /// `profile` | `random`
    #[serde(default = "default_order_mode")]
    pub order_mode: String,
}

fn default_click_button() -> String {
    "left".to_string()
}

fn default_targets() -> String {
    "all".to_string()
}

fn default_order_mode() -> String {
    "profile".to_string()
}

impl BroadcastPreset {
    /// Пресет нажатия клавиши во всех окнах без задержек
    pub fn key(name: impl Into<String>, key: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            input_type: "key".to_string(),
            key: Some(key.into()),
            click_x: None,
            click_y: None,
            click_button: default_click_button(),
            targets: default_targets(),
            custom_indices: Vec::new(),
            delay_min_ms: 0,
            delay_max_ms: 0,
            order_mode: default_order_mode(),
        }
    }

    /// Пресет клика в клиентских координатах
    pub fn click(name: impl Into<String>, x: i32, y: i32) -> Self {
        Self {
            input_type: "click_at_position".to_string(),
            key: None,
            click_x: Some(x),
            click_y: Some(y),
            ..Self::key(name, "")
        }
    }

    pub fn with_targets(mut self, targets: &str) -> Self {
        self.targets = targets.to_string();
        self
    }

    pub fn with_custom_indices(mut self, indices: Vec<i64>) -> Self {
        self.targets = "custom".to_string();
        self.custom_indices = indices;
        self
    }

    pub fn with_delay(mut self, min_ms: i64, max_ms: i64) -> Self {
        self.delay_min_ms = min_ms;
        self.delay_max_ms = max_ms;
        self
    }

    pub fn with_order(mut self, order_mode: &str) -> Self {
        self.order_mode = order_mode.to_string();
        self
    }

    /// Проверить пресет и превратить его в план рассылки
    pub fn validate(&self) -> Result<BroadcastPlan, String> {
        if self.name.trim().is_empty() {
            return Err("пустое имя пресета".to_string());
        }

        let click_button = match self.click_button.to_lowercase().as_str() {
            "left" => MouseButton::Left,
            "right" => MouseButton::Right,
            other => return Err(format!("неизвестная кнопка клика '{}'", other)),
        };

        let input = match self.input_type.to_lowercase().as_str() {
            "key" => match self.key.as_deref().map(str::trim) {
                Some(key) if !key.is_empty() => BroadcastInput::Key(key.to_string()),
                _ => return Err("для input_type=key не указана клавиша".to_string()),
            },
            kind @ ("click_at_position" | "click_at_cursor") => {
                let (x, y) = match (self.click_x, self.click_y) {
                    (Some(x), Some(y)) => (x, y),
                    _ => return Err(format!("для input_type={} нужны обе координаты клика", kind)),
                };
                let point = ClientPoint::new(x, y);
                if kind == "click_at_position" {
                    BroadcastInput::ClickAtPosition { button: click_button, point }
                } else {
                    BroadcastInput::ClickAtCursor { button: click_button, fallback: point }
                }
            }
            other => return Err(format!("неизвестный input_type '{}'", other)),
        };

        if self.delay_min_ms < 0 {
            return Err(format!("delay_min_ms = {} меньше нуля", self.delay_min_ms));
        }
        if self.delay_min_ms > self.delay_max_ms {
            return Err(format!(
                "delay_min_ms = {} больше delay_max_ms = {}",
                self.delay_min_ms, self.delay_max_ms
            ));
        }

        let targets = match self.targets.to_lowercase().as_str() {
            "all" => TargetMode::All,
            "all_except_leader" => TargetMode::AllExceptLeader,
            "custom" => {
                if self.custom_indices.is_empty() {
                    return Err("targets=custom требует непустой список индексов".to_string());
                }
                TargetMode::Custom(self.custom_indices.clone())
            }
            other => return Err(format!("неизвестный режим целей '{}'", other)),
        };

        let order = match self.order_mode.to_lowercase().as_str() {
            "profile" => OrderMode::Profile,
            "random" => OrderMode::Random,
            other => return Err(format!("неизвестный order_mode '{}'", other)),
        };

        Ok(BroadcastPlan {
            name: self.name.clone(),
            input,
            targets,
            delay_min_ms: self.delay_min_ms as u64,
            delay_max_ms: self.delay_max_ms as u64,
            order,
        })
    }
}

/// Что именно рассылается
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BroadcastInput {
    Key(String),
    ClickAtPosition { button: MouseButton, point: ClientPoint },
    /// Клик в точке под курсором; при неудачном пересчёте используется `fallback`
    ClickAtCursor { button: MouseButton, fallback: ClientPoint },
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TargetMode {
    All,
    AllExceptLeader,
    Custom(Vec<i64>),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OrderMode {
    Profile,
    Random,
}

/// Проверенный пресет
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BroadcastPlan {
    pub name: String,
    pub input: BroadcastInput,
    pub targets: TargetMode,
    pub delay_min_ms: u64,
    pub delay_max_ms: u64,
    pub order: OrderMode,
}

/// Итог завершённой рассылки
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BroadcastReport {
    pub preset: String,
    pub targeted: usize,
    pub reached: usize,
}

impl BroadcastReport {
    /// Все цели получили ввод
    pub fn is_complete(&self) -> bool {
        self.reached == self.targeted
    }
}

impl fmt::Display for BroadcastReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "'{}': доставлено {}/{}",
            self.preset, self.reached, self.targeted
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_valid_key_preset() {
        let plan = BroadcastPreset::key("jump", "space").with_delay(10, 20).validate().unwrap();
        assert_eq!(plan.input, BroadcastInput::Key("space".to_string()));
        assert_eq!(plan.targets, TargetMode::All);
        assert_eq!(plan.order, OrderMode::Profile);
        assert_eq!((plan.delay_min_ms, plan.delay_max_ms), (10, 20));
    }

    #[test]
    fn test_validation_rules() {
        let mut preset = BroadcastPreset::key("", "space");
        assert!(preset.validate().unwrap_err().contains("имя"));

        preset = BroadcastPreset::key("a", "  ");
        assert!(preset.validate().is_err());

        preset = BroadcastPreset::key("a", "space");
        preset.input_type = "scroll".to_string();
        assert!(preset.validate().is_err());

        preset = BroadcastPreset::click("a", 10, 10);
        preset.click_y = None;
        assert!(preset.validate().is_err());

        preset = BroadcastPreset::click("a", 10, 10);
        preset.click_button = "middle".to_string();
        assert!(preset.validate().is_err());

        assert!(BroadcastPreset::key("a", "space").with_delay(-1, 5).validate().is_err());
        assert!(BroadcastPreset::key("a", "space").with_delay(50, 5).validate().is_err());
        assert!(BroadcastPreset::key("a", "space").with_custom_indices(vec![]).validate().is_err());
        assert!(BroadcastPreset::key("a", "space").with_order("alphabetical").validate().is_err());
        assert!(BroadcastPreset::key("a", "space").with_targets("leader").validate().is_err());
    }

    #[test]
    fn test_click_variants() {
        let plan = BroadcastPreset::click("loot", 100, 200).validate().unwrap();
        assert_eq!(
            plan.input,
            BroadcastInput::ClickAtPosition { button: MouseButton::Left, point: ClientPoint::new(100, 200) }
        );

        let mut cursor = BroadcastPreset::click("follow", 1, 2);
        cursor.input_type = "click_at_cursor".to_string();
        cursor.click_button = "Right".to_string();
        let plan = cursor.validate().unwrap();
        assert_eq!(
            plan.input,
            BroadcastInput::ClickAtCursor { button: MouseButton::Right, fallback: ClientPoint::new(1, 2) }
        );
    }
}
