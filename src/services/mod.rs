pub mod action_router;
pub mod broadcaster;
pub mod focus_navigator;
pub mod hotkey_dispatcher;
pub mod notifier;
pub mod os_adapter;
pub mod push_broadcaster;
pub mod service;
pub mod window_watcher;

pub use action_router::{ActionRouter, Engines};
pub use broadcaster::Broadcaster;
pub use focus_navigator::FocusNavigator;
pub use hotkey_dispatcher::HotkeyDispatcher;
pub use notifier::EventNotifier;
pub use os_adapter::create_window_adapter;
pub use push_broadcaster::PushBroadcaster;
pub use service::BackgroundService;
pub use window_watcher::WindowWatcher;
