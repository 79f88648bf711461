use crate::error::FocusError;
use crate::events::{WindowHandle, WindowListEvent, WindowRef};
use crate::services::os_adapter::WindowAdapter;
use parking_lot::Mutex;
use std::collections::HashSet;
use std::sync::Arc;
use tracing::{debug, info};

#[derive(Debug, Default)]
struct NavState {
    slots: Vec<WindowRef>,
    leader: Option<WindowHandle>,
    current: Option<usize>,
    last: Option<usize>,
}

/// Упорядоченный список слотов, лидер и курсор навигации
///
/// Все операции выполняются под одной блокировкой на время одного вызова ОС.
pub struct FocusNavigator {
    adapter: Arc<dyn WindowAdapter>,
    state: Mutex<NavState>,
}

impl FocusNavigator {
    pub fn new(adapter: Arc<dyn WindowAdapter>) -> Self {
        Self {
            adapter,
            state: Mutex::new(NavState::default()),
        }
    }

    /// Заменить список слотов снимком. Курсор не сбрасывается:
    /// устаревшие индексы обнаруживаются при следующем использовании.
    pub fn update_slots(&self, windows: Vec<WindowRef>) {
        let mut state = self.state.lock();
        debug!("Список слотов заменён: {} окон", windows.len());
        state.slots = windows;
    }

    /// Слить обнаруженный список со слотами: новые окна в конец, исчезнувшие
    /// удаляются, поля оставшихся обновляются на месте.
    /// Курсор следует за своими окнами.
    pub fn merge_slots(&self, detected: &[WindowRef]) -> WindowListEvent {
        let mut state = self.state.lock();

        let current_handle = state.current.and_then(|i| state.slots.get(i)).map(|w| w.handle);
        let last_handle = state.last.and_then(|i| state.slots.get(i)).map(|w| w.handle);

        let detected_handles: HashSet<WindowHandle> = detected.iter().map(|w| w.handle).collect();
        let (kept, removed): (Vec<WindowRef>, Vec<WindowRef>) = std::mem::take(&mut state.slots)
            .into_iter()
            .partition(|w| detected_handles.contains(&w.handle));

        let mut slots: Vec<WindowRef> = kept
            .into_iter()
            .filter_map(|w| detected.iter().find(|d| d.handle == w.handle).cloned())
            .collect();

        let mut added = Vec::new();
        for window in detected {
            if !slots.iter().any(|w| w.handle == window.handle) {
                slots.push(window.clone());
                added.push(window.clone());
            }
        }

        let position = |handle: Option<WindowHandle>| {
            handle.and_then(|h| slots.iter().position(|w| w.handle == h))
        };
        state.current = position(current_handle);
        state.last = position(last_handle);
        state.slots = slots;

        if !added.is_empty() || !removed.is_empty() {
            info!(
                "Слоты обновлены: +{} -{} (всего {})",
                added.len(),
                removed.len(),
                state.slots.len()
            );
        }

        WindowListEvent {
            added,
            removed,
            current: state.slots.clone(),
            timestamp: std::time::Instant::now(),
        }
    }

    /// Поменять два слота местами; курсор следует за окнами
    pub fn swap_slots(&self, a: usize, b: usize) -> Result<(), FocusError> {
        let mut state = self.state.lock();
        let count = state.slots.len();
        for index in [a, b] {
            if index >= count {
                return Err(FocusError::OutOfRange { index, count });
            }
        }

        state.slots.swap(a, b);
        let follow = |cursor: Option<usize>| match cursor {
            Some(i) if i == a => Some(b),
            Some(i) if i == b => Some(a),
            other => other,
        };
        state.current = follow(state.current);
        state.last = follow(state.last);
        debug!("Слоты {} и {} поменяны местами", a, b);
        Ok(())
    }

    /// Лидер запоминается безусловно: окно может появиться позже
    pub fn set_leader(&self, handle: WindowHandle) {
        self.state.lock().leader = Some(handle);
        info!("Назначен лидер {}", handle);
    }

    pub fn clear_leader(&self) {
        self.state.lock().leader = None;
        info!("Лидер сброшен, используется слот 0");
    }

    pub fn focus_slot(&self, index: usize) -> Result<(), FocusError> {
        let mut state = self.state.lock();
        self.focus_locked(&mut state, index)
    }

    pub fn focus_next(&self) -> Result<(), FocusError> {
        let mut state = self.state.lock();
        let count = state.slots.len();
        if count == 0 {
            return Err(FocusError::NoWindows);
        }
        let target = match state.current.filter(|&i| i < count) {
            Some(current) => (current + 1) % count,
            None => 0,
        };
        self.focus_locked(&mut state, target)
    }

    pub fn focus_previous(&self) -> Result<(), FocusError> {
        let mut state = self.state.lock();
        let count = state.slots.len();
        if count == 0 {
            return Err(FocusError::NoWindows);
        }
        let target = match state.current.filter(|&i| i < count) {
            Some(current) => (current + count - 1) % count,
            None => count - 1,
        };
        self.focus_locked(&mut state, target)
    }

    pub fn focus_last(&self) -> Result<(), FocusError> {
        let mut state = self.state.lock();
        let last = state.last.ok_or(FocusError::NoHistory)?;
        let count = state.slots.len();
        if last >= count {
            return Err(FocusError::StaleHistory { index: last, count });
        }
        self.focus_locked(&mut state, last)
    }

    pub fn focus_leader(&self) -> Result<(), FocusError> {
        let mut state = self.state.lock();
        let index = Self::leader_index(&state)?;
        self.focus_locked(&mut state, index)
    }

    /// Лидер как ссылка на окно; `None`, если лидер не разрешается
    pub fn current_leader(&self) -> Option<WindowRef> {
        let state = self.state.lock();
        let index = Self::leader_index(&state).ok()?;
        state.slots.get(index).cloned()
    }

    pub fn current_slot_index(&self) -> Option<usize> {
        self.state.lock().current
    }

    pub fn last_slot_index(&self) -> Option<usize> {
        self.state.lock().last
    }

    pub fn slots(&self) -> Vec<WindowRef> {
        self.state.lock().slots.clone()
    }

    fn leader_index(state: &NavState) -> Result<usize, FocusError> {
        match state.leader {
            Some(handle) => state
                .slots
                .iter()
                .position(|w| w.handle == handle)
                .ok_or(FocusError::LeaderGone { handle }),
            None if state.slots.is_empty() => Err(FocusError::NoLeader),
            None => Ok(0),
        }
    }

    fn focus_locked(&self, state: &mut NavState, index: usize) -> Result<(), FocusError> {
        let count = state.slots.len();
        if count == 0 {
            return Err(FocusError::NoWindows);
        }
        if index >= count {
            return Err(FocusError::OutOfRange { index, count });
        }

        let handle = state.slots[index].handle;
        if !self.adapter.is_valid(handle) {
            return Err(FocusError::WindowGone { index });
        }
        if !self.adapter.bring_to_front(handle) {
            return Err(FocusError::FocusFailed { index });
        }

        state.last = state.current;
        state.current = Some(index);
        debug!("Фокус: слот {} ({})", index, handle);
        Ok(())
    }
}
