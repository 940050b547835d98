pub mod router;
pub mod session;
pub mod types;
pub mod handlers {
    pub mod admin;
    pub mod coins;
    pub mod download;
    pub mod health;
    pub mod spin;
}

pub use router::{create_router, ApiDoc};
pub use session::SessionUser;
pub use types::AppState;
