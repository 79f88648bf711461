use crate::error::PushError;
use crate::events::{
    ClientPoint, EngineEvent, HookHandle, HookResponse, InputHookCallback, MouseButton, MouseEventKind,
    MouseHookEvent, ScreenPoint, SyntheticInput, WindowHandle, WindowRef,
};
use crate::services::notifier::EventNotifier;
use crate::services::os_adapter::WindowAdapter;
use crate::{debug_if_enabled, trace_if_enabled};
use parking_lot::Mutex;
use rand::Rng;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, Weak};
use tokio::runtime::Handle;
use tokio::time::{sleep, Duration};
use tracing::{debug, info, warn};

/// Задержки репликации клика
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PushTiming {
    /// Ожидание, пока исходное окно обработает настоящий клик
    pub source_settle_ms: u64,
    /// Стабилизация после передачи фокуса
    pub focus_settle_ms: u64,
    pub pacing_min_ms: u64,
    pub pacing_max_ms: u64,
}

impl Default for PushTiming {
    fn default() -> Self {
        Self {
            source_settle_ms: 30,
            focus_settle_ms: 40,
            pacing_min_ms: 20,
            pacing_max_ms: 50,
        }
    }
}

/// Счётчики для наблюдения
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PushStats {
    pub replications: u64,
    pub dropped: u64,
    pub ignored_injected: u64,
}

struct ArmedState {
    hook: HookHandle,
    pool: Arc<Vec<WindowRef>>,
}

/// Общая часть, доступная колбэку перехватчика и фоновой репликации
struct Shared {
    processing: AtomicBool,
    replications: AtomicU64,
    dropped: AtomicU64,
    ignored_injected: AtomicU64,
}

/// Клик захвачен в колбэке: координаты и окно переднего плана
#[derive(Debug, Clone, Copy)]
struct CapturedClick {
    point: ScreenPoint,
    foreground: Option<WindowHandle>,
}

/// Режим push-to-broadcast: каждый настоящий клик левой кнопкой
/// повторяется во всех остальных окнах пула.
pub struct PushBroadcaster {
    adapter: Arc<dyn WindowAdapter>,
    notifier: EventNotifier,
    timing: PushTiming,
    state: Mutex<Option<ArmedState>>,
    shared: Arc<Shared>,
}

impl PushBroadcaster {
    pub fn new(adapter: Arc<dyn WindowAdapter>, notifier: EventNotifier, timing: PushTiming) -> Self {
        Self {
            adapter,
            notifier,
            timing,
            state: Mutex::new(None),
            shared: Arc::new(Shared {
                processing: AtomicBool::new(false),
                replications: AtomicU64::new(0),
                dropped: AtomicU64::new(0),
                ignored_injected: AtomicU64::new(0),
            }),
        }
    }

    /// Включить режим со снимком пула окон.
    /// Должен вызываться внутри tokio runtime: репликации запускаются на нём.
    pub fn arm(&self, pool: Vec<WindowRef>) -> Result<(), PushError> {
        let mut state = self.state.lock();
        if state.is_some() {
            return Err(PushError::AlreadyArmed);
        }
        if pool.is_empty() {
            return Err(PushError::EmptyPool);
        }
        let runtime = Handle::try_current().map_err(|_| PushError::NoRuntime)?;

        let pool = Arc::new(pool);
        let callback = Self::hook_callback(
            Arc::downgrade(&self.adapter),
            self.notifier.clone(),
            self.shared.clone(),
            pool.clone(),
            self.timing,
            runtime,
        );
        let hook = self
            .adapter
            .install_input_hook(callback)
            .map_err(|e| PushError::Hook(e.to_string()))?;

        info!("Push-to-broadcast включён: {} окон в пуле", pool.len());
        *state = Some(ArmedState { hook, pool });
        Ok(())
    }

    /// Выключить режим; повторный вызов ничего не делает
    pub fn disarm(&self) {
        if let Some(armed) = self.state.lock().take() {
            self.adapter.remove_input_hook(armed.hook);
            info!("Push-to-broadcast выключен");
        }
    }

    pub fn is_armed(&self) -> bool {
        self.state.lock().is_some()
    }

    /// Снимок пула, захваченный при включении
    pub fn pool(&self) -> Vec<WindowRef> {
        self.state
            .lock()
            .as_ref()
            .map(|armed| armed.pool.as_ref().clone())
            .unwrap_or_default()
    }

    pub fn is_processing(&self) -> bool {
        self.shared.processing.load(Ordering::Acquire)
    }

    pub fn stats(&self) -> PushStats {
        PushStats {
            replications: self.shared.replications.load(Ordering::Relaxed),
            dropped: self.shared.dropped.load(Ordering::Relaxed),
            ignored_injected: self.shared.ignored_injected.load(Ordering::Relaxed),
        }
    }

    /// Колбэк работает на потоке ввода: только чтение координат
    /// и окна переднего плана, остальное уходит в фоновую задачу.
    fn hook_callback(
        adapter: Weak<dyn WindowAdapter>,
        notifier: EventNotifier,
        shared: Arc<Shared>,
        pool: Arc<Vec<WindowRef>>,
        timing: PushTiming,
        runtime: Handle,
    ) -> InputHookCallback {
        Arc::new(move |event: &MouseHookEvent| {
            if event.kind != MouseEventKind::ButtonDown(MouseButton::Left) {
                return HookResponse::PassThrough;
            }
            if event.injected {
                shared.ignored_injected.fetch_add(1, Ordering::Relaxed);
                trace_if_enabled!("Синтетический клик {} проигнорирован", event.point);
                return HookResponse::PassThrough;
            }
            let Some(adapter) = adapter.upgrade() else {
                return HookResponse::PassThrough;
            };

            if shared
                .processing
                .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
                .is_err()
            {
                shared.dropped.fetch_add(1, Ordering::Relaxed);
                debug_if_enabled!("Репликация уже идёт, клик {} отброшен", event.point);
                return HookResponse::PassThrough;
            }

            // Окно переднего плана читается только после захвата флага
            let click = CapturedClick {
                point: event.point,
                foreground: adapter.foreground_window(),
            };

            let notifier = notifier.clone();
            let shared = shared.clone();
            let pool = pool.clone();
            runtime.spawn(async move {
                let reached = replicate(adapter.as_ref(), &pool, click, timing).await;
                if let Some(reached) = reached {
                    shared.replications.fetch_add(1, Ordering::Relaxed);
                    if reached > 0 {
                        notifier.publish(EngineEvent::BroadcastPerformed { window_count: reached });
                    }
                }
                shared.processing.store(false, Ordering::Release);
            });

            HookResponse::PassThrough
        })
    }
}

impl Drop for PushBroadcaster {
    fn drop(&mut self) {
        self.disarm();
    }
}

/// Повторить клик во всех окнах пула, кроме исходного.
/// `None`, если клик был вне отслеживаемых окон или точку не удалось пересчитать.
async fn replicate(
    adapter: &dyn WindowAdapter,
    pool: &[WindowRef],
    click: CapturedClick,
    timing: PushTiming,
) -> Option<usize> {
    let source = pool.iter().find(|w| Some(w.handle) == click.foreground)?.handle;

    sleep(Duration::from_millis(timing.source_settle_ms)).await;

    let Some(client) = adapter.screen_to_client(source, click.point) else {
        debug!("Не удалось пересчитать {} для окна {}", click.point, source);
        return None;
    };
    let saved_cursor = adapter.cursor_position();

    let targets: Vec<WindowHandle> = pool
        .iter()
        .map(|w| w.handle)
        .filter(|h| *h != source)
        .collect();

    let mut reached = 0;
    for (i, handle) in targets.iter().enumerate() {
        if inject_into(adapter, *handle, client, timing).await {
            reached += 1;
        }
        if i + 1 < targets.len() {
            sleep(pacing(timing)).await;
        }
    }

    if let Some(cursor) = saved_cursor {
        adapter.set_cursor_position(cursor);
    }
    if !adapter.bring_to_front(source) {
        warn!("Не удалось вернуть фокус исходному окну {}", source);
    }

    info!("Клик {} повторён в {} окнах", client, reached);
    Some(reached)
}

async fn inject_into(
    adapter: &dyn WindowAdapter,
    handle: WindowHandle,
    client: ClientPoint,
    timing: PushTiming,
) -> bool {
    if !adapter.is_valid(handle) {
        debug!("Окно {} недействительно, пропуск", handle);
        return false;
    }
    if !adapter.bring_to_front(handle) {
        warn!("Не удалось передать фокус окну {}", handle);
        return false;
    }
    sleep(Duration::from_millis(timing.focus_settle_ms)).await;

    // Клик вслепую ушёл бы окну, которое всё ещё держит фокус
    if adapter.foreground_window() != Some(handle) {
        warn!("Окно {} не получило фокус, клик пропущен", handle);
        return false;
    }
    let Some(screen) = adapter.client_to_screen(handle, client) else {
        debug!("Не удалось пересчитать {} для окна {}", client, handle);
        return false;
    };

    adapter.set_cursor_position(screen);
    adapter.send_synthetic_input(SyntheticInput::Click { button: MouseButton::Left })
}

fn pacing(timing: PushTiming) -> Duration {
    if timing.pacing_max_ms <= timing.pacing_min_ms {
        return Duration::from_millis(timing.pacing_min_ms);
    }
    Duration::from_millis(rand::thread_rng().gen_range(timing.pacing_min_ms..=timing.pacing_max_ms))
}
