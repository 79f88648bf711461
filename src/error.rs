use crate::events::WindowHandle;
use std::fmt;
use thiserror::Error;

/// Класс ошибки для вызывающей стороны
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    /// Слот, окно или лидер отсутствуют
    NotFound,
    /// Индекс слота вне диапазона
    OutOfRange,
    /// Некорректный пресет или биндинг
    Invalid,
    /// Единичный вызов ОС завершился неудачей
    TransientOs,
    /// Запрос отклонён кулдауном или паузой
    Gated,
    /// Операция прервана сигналом отмены
    Cancelled,
}

impl fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            ErrorKind::NotFound => "not-found",
            ErrorKind::OutOfRange => "out-of-range",
            ErrorKind::Invalid => "invalid",
            ErrorKind::TransientOs => "transient-os",
            ErrorKind::Gated => "gated",
            ErrorKind::Cancelled => "cancelled",
        };
        write!(f, "{}", name)
    }
}

#[derive(Error, Debug)]
pub enum MboxError {
    #[error("Ошибка конфигурации: {0}")]
    Config(#[from] anyhow::Error),

    #[error("Ошибка ввода-вывода: {0}")]
    Io(#[from] std::io::Error),

    #[error("Ошибка uinput: {0}")]
    Uinput(#[from] uinput::Error),

    #[error("Устройство не найдено: {0}")]
    DeviceNotFound(String),

    #[error("Недостаточно прав доступа: {0}")]
    Permission(String),

    #[error("Сервис недоступен: {0}")]
    ServiceUnavailable(String),

    #[error("Ошибка перехватчика ввода: {0}")]
    Hook(String),

    #[error("Внутренняя ошибка: {0}")]
    Internal(String),
}

impl MboxError {
    pub fn device_not_found<T>(msg: impl Into<String>) -> Result<T> {
        Err(MboxError::DeviceNotFound(msg.into()))
    }
}

pub type Result<T> = std::result::Result<T, MboxError>;

/// Ошибки навигации по слотам
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum FocusError {
    #[error("Слот {index} вне диапазона (окон: {count})")]
    OutOfRange { index: usize, count: usize },

    #[error("Список окон пуст")]
    NoWindows,

    #[error("Окно в слоте {index} больше не существует")]
    WindowGone { index: usize },

    #[error("Не удалось передать фокус окну в слоте {index}")]
    FocusFailed { index: usize },

    #[error("История переключений пуста")]
    NoHistory,

    #[error("Предыдущий слот {index} устарел (окон: {count})")]
    StaleHistory { index: usize, count: usize },

    #[error("Лидер не назначен и окон нет")]
    NoLeader,

    #[error("Окно лидера {handle} потеряно")]
    LeaderGone { handle: WindowHandle },
}

impl FocusError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            FocusError::OutOfRange { .. } | FocusError::StaleHistory { .. } => ErrorKind::OutOfRange,
            FocusError::NoWindows
            | FocusError::WindowGone { .. }
            | FocusError::NoHistory
            | FocusError::NoLeader
            | FocusError::LeaderGone { .. } => ErrorKind::NotFound,
            FocusError::FocusFailed { .. } => ErrorKind::TransientOs,
        }
    }
}

/// Ошибки рассылки по пресету
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum BroadcastError {
    #[error("Рассылка приостановлена")]
    Paused,

    #[error("Кулдаун рассылки: осталось {remaining_ms}мс")]
    Cooldown { remaining_ms: u64 },

    #[error("Некорректный пресет: {0}")]
    InvalidPreset(String),

    #[error("Нет окон для рассылки")]
    NoTargets,

    #[error("Рассылка отменена (целей: {targeted}, доставлено: {reached})")]
    Cancelled { targeted: usize, reached: usize },
}

impl BroadcastError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            BroadcastError::Paused | BroadcastError::Cooldown { .. } => ErrorKind::Gated,
            BroadcastError::InvalidPreset(_) => ErrorKind::Invalid,
            BroadcastError::NoTargets => ErrorKind::NotFound,
            BroadcastError::Cancelled { .. } => ErrorKind::Cancelled,
        }
    }
}

/// Ошибки режима push-to-broadcast
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum PushError {
    #[error("Push-to-broadcast уже активен")]
    AlreadyArmed,

    #[error("Пул окон пуст")]
    EmptyPool,

    #[error("Нет активного tokio runtime для фоновой репликации")]
    NoRuntime,

    #[error("Не удалось установить перехватчик мыши: {0}")]
    Hook(String),
}

impl PushError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            PushError::AlreadyArmed | PushError::EmptyPool => ErrorKind::Invalid,
            PushError::NoRuntime | PushError::Hook(_) => ErrorKind::TransientOs,
        }
    }
}

// Удобные макросы для создания ошибок
#[macro_export]
macro_rules! mbox_error {
    (device_not_found, $($arg:tt)*) => {
        $crate::error::MboxError::DeviceNotFound(format!($($arg)*))
    };
    (permission, $($arg:tt)*) => {
        $crate::error::MboxError::Permission(format!($($arg)*))
    };
    (service_unavailable, $($arg:tt)*) => {
        $crate::error::MboxError::ServiceUnavailable(format!($($arg)*))
    };
    (hook, $($arg:tt)*) => {
        $crate::error::MboxError::Hook(format!($($arg)*))
    };
    (internal, $($arg:tt)*) => {
        $crate::error::MboxError::Internal(format!($($arg)*))
    };
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_focus_error_kinds() {
        assert_eq!(FocusError::OutOfRange { index: 5, count: 2 }.kind(), ErrorKind::OutOfRange);
        assert_eq!(FocusError::NoWindows.kind(), ErrorKind::NotFound);
        assert_eq!(FocusError::FocusFailed { index: 0 }.kind(), ErrorKind::TransientOs);
        assert_eq!(
            FocusError::LeaderGone { handle: WindowHandle(7) }.kind(),
            ErrorKind::NotFound
        );
    }

    #[test]
    fn test_broadcast_error_kinds() {
        assert_eq!(BroadcastError::Paused.kind(), ErrorKind::Gated);
        assert_eq!(BroadcastError::Cooldown { remaining_ms: 10 }.kind(), ErrorKind::Gated);
        assert_eq!(BroadcastError::InvalidPreset("x".into()).kind(), ErrorKind::Invalid);
        assert_eq!(
            BroadcastError::Cancelled { targeted: 1, reached: 0 }.kind(),
            ErrorKind::Cancelled
        );
    }

    #[test]
    fn test_messages_are_human_readable() {
        let message = FocusError::OutOfRange { index: 5, count: 2 }.to_string();
        assert!(message.contains('5'));
        assert!(message.contains('2'));

        let message = mbox_error!(internal, "сбой {}", 42).to_string();
        assert!(message.contains("42"));
    }
}
