//! Window visibility.
//!
//! Library polling is suppressed while the player window is hidden; nobody is
//! looking at the library view and rescans are not free.

/// Visibility of the main player window.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WindowVisibility {
    Visible,
    Hidden,
}

/// Reports whether the player window is visible.
///
/// # Platform Support
///
/// - **Desktop**: minimize/restore and occlusion events
/// - **Web**: Page Visibility API
pub trait VisibilityMonitor: Send + Sync {
    fn visibility(&self) -> WindowVisibility;

    fn is_visible(&self) -> bool {
        self.visibility() == WindowVisibility::Visible
    }
}
