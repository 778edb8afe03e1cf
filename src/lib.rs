// ── wa-relay server ────────────────────────────────────────────────────────
// axum front end over wa-relay-core: webhook intake, outbound send helpers
// and static files.

pub mod server;
pub mod signature;

pub use server::{router, AppState};
