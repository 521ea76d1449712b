//! Camera snapshots consumed by the sampling controller.

pub mod view_state;

pub use view_state::ViewState;
