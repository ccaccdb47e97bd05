/// Lifecycle of the lazily loaded detection model.
///
/// `Ready` is terminal. `FailedToLoad` behaves like `NotLoaded` except that
/// it remembers a previous attempt went wrong.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ModelState {
    NotLoaded,
    Loading,
    Ready,
    FailedToLoad,
}

impl ModelState {
    /// Whether a detection issued now would have to wait for a load.
    pub fn needs_load(self) -> bool {
        !matches!(self, ModelState::Ready)
    }
}
