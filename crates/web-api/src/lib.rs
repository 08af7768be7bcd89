pub mod error;
pub mod handlers;
pub mod oauth_state;
pub mod server;

pub use error::{ApiError, ErrorBody, ErrorResponse};
pub use oauth_state::{PendingStates, MAX_PENDING_STATES, STATE_TTL};
pub use server::{ApiServer, AppState};
