mod handlers;
mod operation;
mod response;
mod router;
mod state;

pub use operation::{ACTION_HEADER, Action, Operation};
pub use response::{ALLOW_HEADERS, ALLOW_METHODS, ALLOW_ORIGIN};
pub use router::build_router;
pub use state::{AppState, Backend};
