pub mod broadcast;
pub mod hotkey;
pub mod input;
pub mod window;

pub use broadcast::{BroadcastInput, BroadcastPlan, BroadcastPreset, BroadcastReport, OrderMode, TargetMode};
pub use hotkey::{HotkeyAction, HotkeyBinding, HotkeyRegistration, InputCode, Modifiers, MouseButton};
pub use input::{
    ClientPoint, HookHandle, HookResponse, InputHookCallback, MouseEventKind, MouseHookEvent,
    QueuedInput, ScreenPoint, SyntheticInput,
};
pub use window::{WindowHandle, WindowListEvent, WindowRef};

/// События, публикуемые движками для внешних подписчиков
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EngineEvent {
    HotkeyTriggered { id: i32, binding: HotkeyBinding },
    BroadcastPerformed { window_count: usize },
}

impl std::fmt::Display for EngineEvent {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            EngineEvent::HotkeyTriggered { binding, .. } => write!(f, "HotkeyTriggered {}", binding),
            EngineEvent::BroadcastPerformed { window_count } => {
                write!(f, "BroadcastPerformed окон: {}", window_count)
            }
        }
    }
}
