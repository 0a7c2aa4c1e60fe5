//! ARCP wire contracts: registration and discovery schemas, search
//! request/response shapes, auth DTOs, Problem Details error bodies, and the
//! public WebSocket frame envelope.
//!
//! Everything in this crate is part of the externally visible protocol;
//! changes here are wire-breaking.

pub mod agent;
pub mod auth;
pub mod problem;
pub mod search;
pub mod ws;

pub use agent::{
    AgentInfo, AgentMetrics, AgentRegistration, AgentStatus, CommunicationMode,
    HeartbeatResponse, ListFilter, PublicAgentInfo,
};
pub use auth::{
    LoginRequest, LoginResponse, MintRequest, SetPinRequest, TempTokenRequest, TokenResponse,
    ValidateResponse,
};
pub use problem::ProblemDetails;
pub use search::{PublicSearchResponse, SearchRequest, SearchResponse};
pub use ws::{DiscoveryPage, Pagination, PublicWsFrame};
