use crate::config::Config;
use crate::error::Result;
use crate::events::{
    ClientPoint, HookHandle, HotkeyRegistration, InputCode, InputHookCallback, QueuedInput,
    ScreenPoint, SyntheticInput, WindowHandle, WindowRef,
};
use std::sync::Arc;
use tokio::sync::mpsc::UnboundedReceiver;

/// Единственная точка соприкосновения движков с оконной системой
///
/// Все методы синхронные и быстрые. Ошибки единичных вызовов ОС возвращаются
/// как `false`/`None`: решение о том, что делать дальше, принимает вызывающий.
pub trait WindowAdapter: Send + Sync {
    /// Все окна верхнего уровня
    fn enumerate_windows(&self) -> Vec<WindowRef>;

    /// Вывести окно на передний план и передать ему фокус
    fn bring_to_front(&self, handle: WindowHandle) -> bool;

    /// Окно всё ещё существует
    fn is_valid(&self, handle: WindowHandle) -> bool;

    fn screen_to_client(&self, handle: WindowHandle, point: ScreenPoint) -> Option<ClientPoint>;

    fn client_to_screen(&self, handle: WindowHandle, point: ClientPoint) -> Option<ScreenPoint>;

    /// Неблокирующая доставка сообщения в очередь окна (best-effort)
    fn post_queued_input(&self, handle: WindowHandle, input: QueuedInput) -> bool;

    /// Аппаратный синтетический ввод; получает окно, владеющее фокусом
    fn send_synthetic_input(&self, input: SyntheticInput) -> bool;

    fn set_cursor_position(&self, point: ScreenPoint);

    fn cursor_position(&self) -> Option<ScreenPoint>;

    fn foreground_window(&self) -> Option<WindowHandle>;

    /// Асинхронный опрос физического состояния клавиши или кнопки
    fn is_key_physically_down(&self, code: InputCode) -> bool;

    /// `false`, если комбинация уже занята
    fn register_global_hotkey(&self, id: i32, registration: HotkeyRegistration) -> bool;

    fn unregister_global_hotkey(&self, id: i32);

    /// Установить системный перехватчик мыши.
    /// Колбэк вызывается на выделенном потоке ввода и не должен блокироваться.
    fn install_input_hook(&self, callback: InputHookCallback) -> Result<HookHandle>;

    fn remove_input_hook(&self, handle: HookHandle);

    /// Имя процесса по pid (для фильтрации окон целевого приложения)
    fn process_name(&self, pid: u32) -> Option<String>;

    /// Канал уведомлений о сработавших глобальных горячих клавишах (забирается один раз)
    fn take_hotkey_messages(&self) -> Option<UnboundedReceiver<i32>>;
}

/// Factory function to create an appropriate window adapter based on the dry_run flag
pub fn create_window_adapter(config: &Config, dry_run: bool) -> Result<Arc<dyn WindowAdapter>> {
    if dry_run {
        Ok(Arc::new(super::dry_run::DryRunAdapter::with_demo_windows(
            &config.target.process_name,
        )))
    } else {
        Ok(Arc::new(super::x11::X11Adapter::new(config)?))
    }
}
