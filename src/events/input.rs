use super::hotkey::MouseButton;
use std::fmt;
use std::sync::Arc;

/// Точка в экранных координатах
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct ScreenPoint {
    pub x: i32,
    pub y: i32,
}

impl ScreenPoint {
    pub fn new(x: i32, y: i32) -> Self {
        Self { x, y }
    }
}

impl fmt::Display for ScreenPoint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "screen({}, {})", self.x, self.y)
    }
}

/// Точка в клиентских координатах окна
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct ClientPoint {
    pub x: i32,
    pub y: i32,
}

impl ClientPoint {
    pub fn new(x: i32, y: i32) -> Self {
        Self { x, y }
    }
}

impl fmt::Display for ClientPoint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "client({}, {})", self.x, self.y)
    }
}

/// Сообщение, доставляемое в очередь конкретного окна (без передачи фокуса)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum QueuedInput {
    KeyDown { code: u16 },
    KeyUp { code: u16 },
    ButtonDown { button: MouseButton, point: ClientPoint },
    ButtonUp { button: MouseButton, point: ClientPoint },
}

/// Аппаратный синтетический ввод: попадает в окно, владеющее фокусом
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SyntheticInput {
    /// Нажатие и отпускание кнопки в текущей позиции курсора
    Click { button: MouseButton },
}

/// Тип события мыши, видимого перехватчику
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum MouseEventKind {
    ButtonDown(MouseButton),
    ButtonUp(MouseButton),
}

/// Событие, передаваемое системному перехватчику мыши
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MouseHookEvent {
    pub kind: MouseEventKind,
    pub point: ScreenPoint,
    /// Событие сгенерировано программно (в том числе нами самими)
    pub injected: bool,
}

impl MouseHookEvent {
    pub fn button_down(button: MouseButton, point: ScreenPoint, injected: bool) -> Self {
        Self {
            kind: MouseEventKind::ButtonDown(button),
            point,
            injected,
        }
    }

    pub fn button_up(button: MouseButton, point: ScreenPoint, injected: bool) -> Self {
        Self {
            kind: MouseEventKind::ButtonUp(button),
            point,
            injected,
        }
    }
}

/// Решение перехватчика по событию
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HookResponse {
    /// Подавить штатную обработку события
    Consume,
    PassThrough,
}

/// Идентификатор установленного перехватчика
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct HookHandle(pub u64);

impl fmt::Display for HookHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "hook#{}", self.0)
    }
}

/// Колбэк перехватчика. Вызывается синхронно на потоке ввода и обязан возвращаться сразу.
pub type InputHookCallback = Arc<dyn Fn(&MouseHookEvent) -> HookResponse + Send + Sync>;
