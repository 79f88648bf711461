use serde::{Deserialize, Serialize};
use std::fmt;

/// Кнопки мыши
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum MouseButton {
    Left,
    Right,
    Middle,
    /// Боковая кнопка "назад" (BTN_SIDE)
    X1,
    /// Боковая кнопка "вперёд" (BTN_EXTRA)
    X2,
}

impl MouseButton {
    /// evdev код кнопки
    pub fn evdev_code(&self) -> u16 {
        match self {
            MouseButton::Left => 0x110,
            MouseButton::Right => 0x111,
            MouseButton::Middle => 0x112,
            MouseButton::X1 => 0x113,
            MouseButton::X2 => 0x114,
        }
    }

    pub fn from_evdev_code(code: u16) -> Option<Self> {
        match code {
            0x110 => Some(MouseButton::Left),
            0x111 => Some(MouseButton::Right),
            0x112 => Some(MouseButton::Middle),
            0x113 => Some(MouseButton::X1),
            0x114 => Some(MouseButton::X2),
            _ => None,
        }
    }

    /// Номер кнопки в нотации X11 (для xdotool)
    pub fn x11_number(&self) -> u8 {
        match self {
            MouseButton::Left => 1,
            MouseButton::Middle => 2,
            MouseButton::Right => 3,
            MouseButton::X1 => 8,
            MouseButton::X2 => 9,
        }
    }

    /// Имя кнопки в конфигурации
    pub fn from_name(name: &str) -> Option<Self> {
        match name.to_lowercase().as_str() {
            "mouse1" | "lbutton" | "left" => Some(MouseButton::Left),
            "mouse2" | "rbutton" | "right" => Some(MouseButton::Right),
            "mouse3" | "mbutton" | "middle" => Some(MouseButton::Middle),
            "mouse4" | "xbutton1" | "x1" => Some(MouseButton::X1),
            "mouse5" | "xbutton2" | "x2" => Some(MouseButton::X2),
            _ => None,
        }
    }
}

impl fmt::Display for MouseButton {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            MouseButton::Left => "mouse1",
            MouseButton::Right => "mouse2",
            MouseButton::Middle => "mouse3",
            MouseButton::X1 => "mouse4",
            MouseButton::X2 => "mouse5",
        };
        write!(f, "{}", name)
    }
}

/// Код клавиши (evdev) или кнопки мыши
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum InputCode {
    Key(u16),
    Mouse(MouseButton),
}

impl InputCode {
    /// Кнопка, которую нельзя зарегистрировать как глобальную горячую клавишу ОС
    pub fn is_hook_button(&self) -> bool {
        matches!(
            self,
            InputCode::Mouse(MouseButton::Middle | MouseButton::X1 | MouseButton::X2)
        )
    }

    /// evdev код (для клавиш и кнопок одно пространство кодов)
    pub fn evdev_code(&self) -> u16 {
        match self {
            InputCode::Key(code) => *code,
            InputCode::Mouse(button) => button.evdev_code(),
        }
    }
}

impl fmt::Display for InputCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            InputCode::Key(code) => write!(f, "KEY_{}", code),
            InputCode::Mouse(button) => write!(f, "{}", button),
        }
    }
}

/// Модификаторы клавиш
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Modifiers {
    pub ctrl: bool,
    pub alt: bool,
    pub shift: bool,
    pub win: bool,
}

impl Modifiers {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_ctrl(mut self, ctrl: bool) -> Self {
        self.ctrl = ctrl;
        self
    }

    pub fn with_alt(mut self, alt: bool) -> Self {
        self.alt = alt;
        self
    }

    pub fn with_shift(mut self, shift: bool) -> Self {
        self.shift = shift;
        self
    }

    #[allow(dead_code)]
    pub fn with_win(mut self, win: bool) -> Self {
        self.win = win;
        self
    }

    pub fn is_empty(&self) -> bool {
        !self.ctrl && !self.alt && !self.shift && !self.win
    }

    pub fn to_vec(&self) -> Vec<String> {
        let mut result = Vec::new();
        if self.ctrl { result.push("ctrl".to_string()); }
        if self.alt { result.push("alt".to_string()); }
        if self.shift { result.push("shift".to_string()); }
        if self.win { result.push("win".to_string()); }
        result
    }

    /// Разобрать список модификаторов; неизвестное имя возвращается как ошибка
    pub fn from_names(modifiers: &[String]) -> Result<Self, String> {
        let mut result = Self::new();
        for modifier in modifiers {
            match modifier.to_lowercase().as_str() {
                "ctrl" | "control" => result.ctrl = true,
                "alt" => result.alt = true,
                "shift" => result.shift = true,
                "win" | "super" | "meta" => result.win = true,
                other => return Err(format!("Неизвестный модификатор: {}", other)),
            }
        }
        Ok(result)
    }
}

impl fmt::Display for Modifiers {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let modifiers = self.to_vec();
        if modifiers.is_empty() {
            write!(f, "none")
        } else {
            write!(f, "{}", modifiers.join("+"))
        }
    }
}

/// Действие, привязанное к горячей клавише
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum HotkeyAction {
    FocusSlot,
    NextWindow,
    PreviousWindow,
    LastWindow,
    PanicLeader,
    Broadcast,
    PasteToChat,
}

/// Привязка комбинации к действию
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HotkeyBinding {
    pub id: i32,
    pub modifiers: Modifiers,
    pub code: InputCode,
    pub display_name: String,
    pub action: HotkeyAction,
    pub slot_index: Option<usize>,
    /// Имя пресета для действия Broadcast
    pub preset: Option<String>,
}

impl HotkeyBinding {
    pub fn new(id: i32, modifiers: Modifiers, code: InputCode, action: HotkeyAction) -> Self {
        Self {
            id,
            modifiers,
            code,
            display_name: format!("{}+{}", modifiers, code),
            action,
            slot_index: None,
            preset: None,
        }
    }

    pub fn with_slot(mut self, slot: usize) -> Self {
        self.slot_index = Some(slot);
        self
    }

    pub fn with_preset(mut self, preset: impl Into<String>) -> Self {
        self.preset = Some(preset.into());
        self
    }

    pub fn with_display_name(mut self, name: impl Into<String>) -> Self {
        self.display_name = name.into();
        self
    }

    /// Привязка к кнопке мыши обслуживается перехватчиком, а не ОС
    pub fn is_mouse_binding(&self) -> bool {
        self.code.is_hook_button()
    }
}

impl fmt::Display for HotkeyBinding {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{} {} -> {:?}", self.id, self.display_name, self.action)
    }
}

/// Параметры регистрации глобальной горячей клавиши в ОС
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct HotkeyRegistration {
    pub modifiers: Modifiers,
    pub code: u16,
    /// Автоповтор не должен повторно вызывать действие
    pub no_repeat: bool,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_modifiers_creation() {
        let modifiers = Modifiers::new().with_ctrl(true).with_shift(true);

        assert!(modifiers.ctrl);
        assert!(modifiers.shift);
        assert!(!modifiers.alt);
        assert!(!modifiers.win);
        assert!(!modifiers.is_empty());
        assert_eq!(modifiers.to_string(), "ctrl+shift");
    }

    #[test]
    fn test_modifiers_from_names() {
        let parsed = Modifiers::from_names(&["Ctrl".to_string(), "super".to_string()]).unwrap();
        assert!(parsed.ctrl);
        assert!(parsed.win);

        assert!(Modifiers::from_names(&["hyper".to_string()]).is_err());
    }

    #[test]
    fn test_mouse_binding_detection() {
        let side = HotkeyBinding::new(1, Modifiers::new(), InputCode::Mouse(MouseButton::X1), HotkeyAction::NextWindow);
        let key = HotkeyBinding::new(2, Modifiers::new(), InputCode::Key(59), HotkeyAction::NextWindow);
        let left = HotkeyBinding::new(3, Modifiers::new(), InputCode::Mouse(MouseButton::Left), HotkeyAction::NextWindow);

        assert!(side.is_mouse_binding());
        assert!(!key.is_mouse_binding());
        assert!(!left.is_mouse_binding());
    }

    #[test]
    fn test_mouse_button_codes() {
        for button in [MouseButton::Left, MouseButton::Right, MouseButton::Middle, MouseButton::X1, MouseButton::X2] {
            assert_eq!(MouseButton::from_evdev_code(button.evdev_code()), Some(button));
        }
        assert_eq!(MouseButton::from_name("Mouse4"), Some(MouseButton::X1));
        assert_eq!(MouseButton::from_name("f1"), None);
    }
}
