//! Frontend search state machine

/// State of the search from the frontend's point of view
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SearchState {
    /// No search running
    #[default]
    Idle,
    /// A search (or ponder) is in flight
    Searching,
}
