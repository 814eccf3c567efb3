use bridge_traits::visibility::{VisibilityMonitor, WindowVisibility};
use std::sync::atomic::{AtomicBool, Ordering};

/// Window visibility fed by the desktop shell.
///
/// Starts visible. The shell calls [`set_visible`](Self::set_visible) from its
/// minimize/restore handlers.
#[derive(Debug)]
pub struct DesktopVisibility {
    visible: AtomicBool,
}

impl DesktopVisibility {
    pub fn new() -> Self {
        Self {
            visible: AtomicBool::new(true),
        }
    }

    pub fn set_visible(&self, visible: bool) {
        self.visible.store(visible, Ordering::Relaxed);
    }
}

impl Default for DesktopVisibility {
    fn default() -> Self {
        Self::new()
    }
}

impl VisibilityMonitor for DesktopVisibility {
    fn visibility(&self) -> WindowVisibility {
        if self.visible.load(Ordering::Relaxed) {
            WindowVisibility::Visible
        } else {
            WindowVisibility::Hidden
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_visibility_toggles() {
        let monitor = DesktopVisibility::new();
        assert!(monitor.is_visible());

        monitor.set_visible(false);
        assert_eq!(monitor.visibility(), WindowVisibility::Hidden);

        monitor.set_visible(true);
        assert!(monitor.is_visible());
    }
}
