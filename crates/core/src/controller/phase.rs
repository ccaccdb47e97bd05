use std::fmt;

/// Which of the three control sets the view shows.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum UiPhase {
    /// No camera, no photo.
    #[default]
    Idle,
    /// Camera streaming into the preview.
    Live,
    /// Photo taken, camera released.
    Captured,
}

impl fmt::Display for UiPhase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            UiPhase::Idle => "idle",
            UiPhase::Live => "live",
            UiPhase::Captured => "captured",
        };
        f.write_str(name)
    }
}
