//! The borrowing lifecycle: copy availability states and the borrow/return
//! workflow that moves copies between them.

mod state;
mod workflow;

pub use state::CopyStatus;
pub use workflow::{borrow, return_copy};
