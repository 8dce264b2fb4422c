//! API server, hub, and frame broadcaster

pub mod broadcaster;
pub mod routes;
pub mod server;
pub mod shared;
pub mod types;
pub mod websocket;

pub use broadcaster::{
    FrameBroadcaster, LatestFrame, SendGovernor, TickAction, BACKLOG_LIMIT_BYTES,
    DEFAULT_SEND_INTERVAL, MAX_BACKLOG_HITS, RECONNECT_DELAY,
};
pub use routes::create_router;
pub use server::{create_shared_state, run_server};
pub use shared::{LevelSnapshot, RunStatus, SharedState, SharedStateHandle};
pub use types::{
    AckResponse, ApiInfo, LevelsResponse, SignalRequest, StatusResponse, WireMessage,
};
