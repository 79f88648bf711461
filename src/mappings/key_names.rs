use crate::events::{InputCode, MouseButton};
use once_cell::sync::Lazy;
use std::collections::HashMap;

/// Трансляция имён клавиш в evdev коды и X keysym
/// Одна таблица: (имя в конфигурации, evdev код, keysym для xdotool)
pub struct KeyNames;

static KEY_TABLE: &[(&str, u16, &str)] = &[
    // Буквенные клавиши
    ("a", 30, "a"),
    ("b", 48, "b"),
    ("c", 46, "c"),
    ("d", 32, "d"),
    ("e", 18, "e"),
    ("f", 33, "f"),
    ("g", 34, "g"),
    ("h", 35, "h"),
    ("i", 23, "i"),
    ("j", 36, "j"),
    ("k", 37, "k"),
    ("l", 38, "l"),
    ("m", 50, "m"),
    ("n", 49, "n"),
    ("o", 24, "o"),
    ("p", 25, "p"),
    ("q", 16, "q"),
    ("r", 19, "r"),
    ("s", 31, "s"),
    ("t", 20, "t"),
    ("u", 22, "u"),
    ("v", 47, "v"),
    ("w", 17, "w"),
    ("x", 45, "x"),
    ("y", 21, "y"),
    ("z", 44, "z"),
    // Цифровые клавиши (верхний ряд)
    ("1", 2, "1"),
    ("2", 3, "2"),
    ("3", 4, "3"),
    ("4", 5, "4"),
    ("5", 6, "5"),
    ("6", 7, "6"),
    ("7", 8, "7"),
    ("8", 9, "8"),
    ("9", 10, "9"),
    ("0", 11, "0"),
    // Специальные клавиши
    ("space", 57, "space"),
    ("enter", 28, "Return"),
    ("escape", 1, "Escape"),
    ("backspace", 14, "BackSpace"),
    ("tab", 15, "Tab"),
    ("capslock", 58, "Caps_Lock"),
    // Знаки пунктуации
    ("minus", 12, "minus"),
    ("equal", 13, "equal"),
    ("leftbrace", 26, "bracketleft"),
    ("rightbrace", 27, "bracketright"),
    ("backslash", 43, "backslash"),
    ("semicolon", 39, "semicolon"),
    ("apostrophe", 40, "apostrophe"),
    ("grave", 41, "grave"),
    ("comma", 51, "comma"),
    ("dot", 52, "period"),
    ("slash", 53, "slash"),
    // Навигация/редакция
    ("insert", 110, "Insert"),
    ("delete", 111, "Delete"),
    ("home", 102, "Home"),
    ("end", 107, "End"),
    ("pageup", 104, "Prior"),
    ("pagedown", 109, "Next"),
    // Системные
    ("printscreen", 99, "Print"),
    ("scrolllock", 70, "Scroll_Lock"),
    ("pause", 119, "Pause"),
    // Numpad
    ("kp0", 82, "KP_0"),
    ("kp1", 79, "KP_1"),
    ("kp2", 80, "KP_2"),
    ("kp3", 81, "KP_3"),
    ("kp4", 75, "KP_4"),
    ("kp5", 76, "KP_5"),
    ("kp6", 77, "KP_6"),
    ("kp7", 71, "KP_7"),
    ("kp8", 72, "KP_8"),
    ("kp9", 73, "KP_9"),
    ("kpdecimal", 83, "KP_Decimal"),
    ("kpdivide", 98, "KP_Divide"),
    ("kpmultiply", 55, "KP_Multiply"),
    ("kpadd", 78, "KP_Add"),
    ("kpsubtract", 74, "KP_Subtract"),
    ("kpenter", 96, "KP_Enter"),
    // Модификаторы
    ("ctrl", 29, "Control_L"),
    ("alt", 56, "Alt_L"),
    ("shift", 42, "Shift_L"),
    ("win", 125, "Super_L"),
    ("rctrl", 97, "Control_R"),
    ("ralt", 100, "Alt_R"),
    ("rshift", 54, "Shift_R"),
    ("rwin", 126, "Super_R"),
    // Стрелки
    ("up", 103, "Up"),
    ("down", 108, "Down"),
    ("left", 105, "Left"),
    ("right", 106, "Right"),
    // Функциональные клавиши
    ("f1", 59, "F1"),
    ("f2", 60, "F2"),
    ("f3", 61, "F3"),
    ("f4", 62, "F4"),
    ("f5", 63, "F5"),
    ("f6", 64, "F6"),
    ("f7", 65, "F7"),
    ("f8", 66, "F8"),
    ("f9", 67, "F9"),
    ("f10", 68, "F10"),
    ("f11", 87, "F11"),
    ("f12", 88, "F12"),
];

// Альтернативные написания, встречающиеся в старых раскладках
static ALIASES: &[(&str, &str)] = &[
    ("return", "enter"),
    ("esc", "escape"),
    ("spacebar", "space"),
    ("del", "delete"),
    ("ins", "insert"),
    ("pgup", "pageup"),
    ("pgdn", "pagedown"),
    ("control", "ctrl"),
    ("super", "win"),
    ("period", "dot"),
    ("caps", "capslock"),
];

static NAME_TO_CODE: Lazy<HashMap<&'static str, u16>> =
    Lazy::new(|| KEY_TABLE.iter().map(|&(name, code, _)| (name, code)).collect());

static CODE_TO_ENTRY: Lazy<HashMap<u16, (&'static str, &'static str)>> = Lazy::new(|| {
    KEY_TABLE
        .iter()
        .map(|&(name, code, keysym)| (code, (name, keysym)))
        .collect()
});

impl KeyNames {
    /// Получить evdev код клавиши по её имени (регистронезависимо)
    pub fn code(key_name: &str) -> Option<u16> {
        let normalized = key_name.trim().to_lowercase();
        let canonical = ALIASES
            .iter()
            .find(|(alias, _)| *alias == normalized)
            .map(|(_, name)| *name)
            .unwrap_or(normalized.as_str());
        NAME_TO_CODE.get(canonical).copied()
    }

    /// Получить имя клавиши по её коду
    pub fn name(keycode: u16) -> Option<&'static str> {
        CODE_TO_ENTRY.get(&keycode).map(|(name, _)| *name)
    }

    /// X keysym для доставки через xdotool
    pub fn keysym(keycode: u16) -> Option<&'static str> {
        CODE_TO_ENTRY.get(&keycode).map(|(_, keysym)| *keysym)
    }

    /// Разобрать имя клавиши или кнопки мыши
    pub fn input_code(name: &str) -> Option<InputCode> {
        if let Some(button) = MouseButton::from_name(name) {
            return Some(InputCode::Mouse(button));
        }
        Self::code(name).map(InputCode::Key)
    }

    /// Проверить, является ли клавиша модификатором
    pub fn is_modifier(key_name: &str) -> bool {
        matches!(
            Self::code(key_name),
            Some(29 | 56 | 42 | 125 | 97 | 100 | 54 | 126)
        )
    }
}
