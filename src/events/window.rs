use serde::{Deserialize, Serialize};
use std::fmt;

/// Непрозрачный идентификатор окна (X11 window id или симулированный id)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct WindowHandle(pub u64);

impl WindowHandle {
    pub fn value(&self) -> u64 {
        self.0
    }
}

impl fmt::Display for WindowHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "0x{:08x}", self.0)
    }
}

/// Информация об окне
///
/// Идентичность окна определяется только `handle`: заголовок меняется со временем.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WindowRef {
    pub handle: WindowHandle,
    pub process_id: u32,
    pub title: String,
    pub visible: bool,
    pub minimized: bool,
}

impl WindowRef {
    pub fn new(handle: WindowHandle, process_id: u32, title: impl Into<String>) -> Self {
        Self {
            handle,
            process_id,
            title: title.into(),
            visible: true,
            minimized: false,
        }
    }

    #[allow(dead_code)]
    pub fn with_minimized(mut self, minimized: bool) -> Self {
        self.minimized = minimized;
        self
    }

    /// Совпадают ли изменяемые поля (заголовок, видимость, свёрнутость, pid)
    pub fn same_state(&self, other: &WindowRef) -> bool {
        self.process_id == other.process_id
            && self.title == other.title
            && self.visible == other.visible
            && self.minimized == other.minimized
    }
}

impl PartialEq for WindowRef {
    fn eq(&self, other: &Self) -> bool {
        self.handle == other.handle
    }
}

impl Eq for WindowRef {}

impl fmt::Display for WindowRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "\"{}\" ({}, pid {})", self.title, self.handle, self.process_id)
    }
}

/// Изменение списка окон целевого процесса
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WindowListEvent {
    pub added: Vec<WindowRef>,
    pub removed: Vec<WindowRef>,
    pub current: Vec<WindowRef>,
    pub timestamp: std::time::Instant,
}

impl WindowListEvent {
    /// Построить событие как разницу между предыдущим и текущим снимком
    pub fn diff(previous: &[WindowRef], current: Vec<WindowRef>) -> Self {
        let added = current
            .iter()
            .filter(|w| !previous.iter().any(|p| p.handle == w.handle))
            .cloned()
            .collect();
        let removed = previous
            .iter()
            .filter(|p| !current.iter().any(|w| w.handle == p.handle))
            .cloned()
            .collect();

        Self {
            added,
            removed,
            current,
            timestamp: std::time::Instant::now(),
        }
    }

    pub fn has_membership_changes(&self) -> bool {
        !self.added.is_empty() || !self.removed.is_empty()
    }
}

impl fmt::Display for WindowListEvent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "окон: {} (+{} / -{})",
            self.current.len(),
            self.added.len(),
            self.removed.len()
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn window(id: u64, title: &str) -> WindowRef {
        WindowRef::new(WindowHandle(id), 100 + id as u32, title)
    }

    #[test]
    fn test_identity_ignores_title() {
        let a = window(1, "Персонаж А");
        let mut b = a.clone();
        b.title = "Персонаж Б".to_string();

        assert_eq!(a, b);
        assert!(!a.same_state(&b));
    }

    #[test]
    fn test_list_event_diff() {
        let previous = vec![window(1, "a"), window(2, "b")];
        let current = vec![window(2, "b"), window(3, "c")];

        let event = WindowListEvent::diff(&previous, current);

        assert_eq!(event.added, vec![window(3, "c")]);
        assert_eq!(event.removed, vec![window(1, "a")]);
        assert_eq!(event.current.len(), 2);
        assert!(event.has_membership_changes());
    }

    #[test]
    fn test_handle_display() {
        assert_eq!(WindowHandle(0x4000007).to_string(), "0x04000007");
    }
}
