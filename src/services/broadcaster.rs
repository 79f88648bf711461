use crate::error::BroadcastError;
use crate::events::{
    BroadcastInput, BroadcastPlan, BroadcastPreset, BroadcastReport, ClientPoint, MouseButton,
    OrderMode, QueuedInput, TargetMode, WindowHandle, WindowRef,
};
use crate::mappings::KeyNames;
use crate::services::os_adapter::WindowAdapter;
use crate::{debug_if_enabled, trace_if_enabled};
use rand::seq::SliceRandom;
use rand::Rng;
use smallvec::SmallVec;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;
use tokio::time::{Duration, Instant};
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

pub type TargetList = SmallVec<[WindowRef; 8]>;

/// Рассылка одного ввода по набору окон через очереди сообщений
///
/// Пауза и кулдаун читаются атомарно без общей блокировки.
pub struct Broadcaster {
    adapter: Arc<dyn WindowAdapter>,
    paused: AtomicBool,
    cooldown_ms: AtomicU64,
    epoch: Instant,
    // мс от epoch + 1; 0 означает "ещё не было"
    last_invocation: AtomicU64,
}

impl Broadcaster {
    pub fn new(adapter: Arc<dyn WindowAdapter>, cooldown_ms: u64) -> Self {
        Self {
            adapter,
            paused: AtomicBool::new(false),
            cooldown_ms: AtomicU64::new(cooldown_ms),
            epoch: Instant::now(),
            last_invocation: AtomicU64::new(0),
        }
    }

    pub fn set_paused(&self, paused: bool) {
        self.paused.store(paused, Ordering::Release);
        info!("Рассылка {}", if paused { "приостановлена" } else { "возобновлена" });
    }

    pub fn is_paused(&self) -> bool {
        self.paused.load(Ordering::Acquire)
    }

    pub fn set_cooldown_ms(&self, cooldown_ms: u64) {
        self.cooldown_ms.store(cooldown_ms, Ordering::Release);
    }

    /// Сколько осталось до конца кулдауна
    pub fn cooldown_remaining(&self) -> Duration {
        let last = self.last_invocation.load(Ordering::Acquire);
        if last == 0 {
            return Duration::ZERO;
        }
        let elapsed = self.now_ms().saturating_sub(last - 1);
        let cooldown = self.cooldown_ms.load(Ordering::Acquire);
        Duration::from_millis(cooldown.saturating_sub(elapsed))
    }

    pub async fn execute_broadcast(
        &self,
        preset: &BroadcastPreset,
        windows: &[WindowRef],
        leader: Option<WindowHandle>,
        cancel: &CancellationToken,
    ) -> Result<BroadcastReport, BroadcastError> {
        if self.is_paused() {
            return Err(BroadcastError::Paused);
        }
        let remaining = self.cooldown_remaining();
        if !remaining.is_zero() {
            return Err(BroadcastError::Cooldown { remaining_ms: remaining.as_millis() as u64 });
        }
        let plan = preset.validate().map_err(BroadcastError::InvalidPreset)?;

        let mut targets = Self::resolve_targets(&plan.targets, windows, leader);
        if targets.is_empty() {
            return Err(BroadcastError::NoTargets);
        }
        if plan.order == OrderMode::Random {
            Self::shuffle(&mut targets);
        }

        self.last_invocation.store(self.now_ms() + 1, Ordering::Release);
        info!("Рассылка '{}' на {} окон", plan.name, targets.len());

        let targeted = targets.len();
        let mut reached = 0;
        for (i, target) in targets.iter().enumerate() {
            if cancel.is_cancelled() {
                return Err(BroadcastError::Cancelled { targeted, reached });
            }

            if !self.adapter.is_valid(target.handle) {
                debug_if_enabled!("Окно {} недействительно, пропуск", target.handle);
            } else if self.deliver(&plan, target.handle) {
                reached += 1;
            } else {
                warn!("Ввод не доставлен окну {}", target.handle);
            }

            if i + 1 < targeted {
                let delay = Self::jitter(plan.delay_min_ms, plan.delay_max_ms);
                tokio::select! {
                    _ = cancel.cancelled() => {
                        return Err(BroadcastError::Cancelled { targeted, reached });
                    }
                    _ = tokio::time::sleep(delay) => {}
                }
            }
        }

        let report = BroadcastReport { preset: plan.name, targeted, reached };
        info!("Рассылка завершена: {}", report);
        Ok(report)
    }

    /// Разрешение целей; некорректные пользовательские индексы молча отбрасываются
    pub fn resolve_targets(
        mode: &TargetMode,
        windows: &[WindowRef],
        leader: Option<WindowHandle>,
    ) -> TargetList {
        match mode {
            TargetMode::All => windows.iter().cloned().collect(),
            TargetMode::AllExceptLeader => windows
                .iter()
                .filter(|w| Some(w.handle) != leader)
                .cloned()
                .collect(),
            TargetMode::Custom(indices) => indices
                .iter()
                .filter_map(|&i| usize::try_from(i).ok())
                .filter_map(|i| windows.get(i).cloned())
                .collect(),
        }
    }

    // ThreadRng не Send: перемешивание вне async контекста
    fn shuffle(targets: &mut TargetList) {
        targets.shuffle(&mut rand::thread_rng());
    }

    fn jitter(min_ms: u64, max_ms: u64) -> Duration {
        if max_ms <= min_ms {
            return Duration::from_millis(min_ms);
        }
        Duration::from_millis(rand::thread_rng().gen_range(min_ms..=max_ms))
    }

    fn deliver(&self, plan: &BroadcastPlan, handle: WindowHandle) -> bool {
        match &plan.input {
            BroadcastInput::Key(name) => match KeyNames::code(name) {
                Some(code) => {
                    trace_if_enabled!("KEY_{} -> {}", code, handle);
                    self.adapter.post_queued_input(handle, QueuedInput::KeyDown { code })
                        && self.adapter.post_queued_input(handle, QueuedInput::KeyUp { code })
                }
                None => {
                    warn!("Неизвестная клавиша '{}' в пресете '{}'", name, plan.name);
                    false
                }
            },
            BroadcastInput::ClickAtPosition { button, point } => {
                self.post_click(handle, *button, *point)
            }
            BroadcastInput::ClickAtCursor { button, fallback } => {
                let point = self
                    .adapter
                    .cursor_position()
                    .and_then(|cursor| self.adapter.screen_to_client(handle, cursor))
                    .unwrap_or(*fallback);
                self.post_click(handle, *button, point)
            }
        }
    }

    fn post_click(&self, handle: WindowHandle, button: MouseButton, point: ClientPoint) -> bool {
        trace_if_enabled!("{} {} -> {}", button, point, handle);
        self.adapter.post_queued_input(handle, QueuedInput::ButtonDown { button, point })
            && self.adapter.post_queued_input(handle, QueuedInput::ButtonUp { button, point })
    }

    fn now_ms(&self) -> u64 {
        self.epoch.elapsed().as_millis() as u64
    }
}
