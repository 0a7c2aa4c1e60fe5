//! Public WebSocket frame envelope.
//!
//! Flow:
//! 1. Client connects to `/public/ws` and immediately receives `welcome`.
//! 2. The server pushes `stats_update` on an interval and `agents_update`
//!    whenever the registry changes.
//! 3. Request/response frames: `ping` → `pong`, `get_discovery` →
//!    `discovery_data` (paginated, redacted agent list).

use serde::{Deserialize, Serialize};

use crate::agent::PublicAgentInfo;

/// WebSocket frame envelope for the public stream.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum PublicWsFrame {
    /// Server → Client: sent once on connect.
    #[serde(rename = "welcome")]
    Welcome {
        message: String,
        server_version: String,
        timestamp: i64,
    },

    /// Server → Client: periodic registry statistics.
    #[serde(rename = "stats_update")]
    StatsUpdate { data: serde_json::Value },

    /// Server → Client: pushed on registry mutations.
    #[serde(rename = "agents_update")]
    AgentsUpdate { data: Vec<PublicAgentInfo> },

    /// Server → Client: response to `get_discovery`.
    #[serde(rename = "discovery_data")]
    DiscoveryData { data: DiscoveryPage },

    /// Client → Server: liveness probe.
    #[serde(rename = "ping")]
    Ping,

    /// Server → Client: liveness response.
    #[serde(rename = "pong")]
    Pong,

    /// Client → Server: request one page of redacted discovery data.
    #[serde(rename = "get_discovery")]
    GetDiscovery {
        #[serde(default = "d_page")]
        page: usize,
        #[serde(default = "d_page_size")]
        page_size: usize,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        agent_type: Option<String>,
    },
}

fn d_page() -> usize {
    1
}
fn d_page_size() -> usize {
    20
}

/// Hard ceiling on `page_size`; larger requests are clamped.
pub const MAX_PAGE_SIZE: usize = 100;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DiscoveryPage {
    pub agents: Vec<PublicAgentInfo>,
    pub pagination: Pagination,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Pagination {
    pub page: usize,
    pub page_size: usize,
    pub total: usize,
    pub total_pages: usize,
}

impl Pagination {
    /// Slice bounds for a 1-based page over `total` items.
    pub fn slice(page: usize, page_size: usize, total: usize) -> (Self, usize, usize) {
        let page = page.max(1);
        let page_size = page_size.clamp(1, MAX_PAGE_SIZE);
        let total_pages = total.div_ceil(page_size).max(1);
        let start = (page - 1).saturating_mul(page_size).min(total);
        let end = (start + page_size).min(total);
        (
            Self {
                page,
                page_size,
                total,
                total_pages,
            },
            start,
            end,
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn frames_round_trip_with_type_tags() {
        let frame = PublicWsFrame::Ping;
        let json = serde_json::to_string(&frame).unwrap();
        assert_eq!(json, r#"{"type":"ping"}"#);

        let parsed: PublicWsFrame =
            serde_json::from_str(r#"{"type":"get_discovery","page":2}"#).unwrap();
        match parsed {
            PublicWsFrame::GetDiscovery {
                page, page_size, ..
            } => {
                assert_eq!(page, 2);
                assert_eq!(page_size, 20);
            }
            other => panic!("unexpected frame: {other:?}"),
        }
    }

    #[test]
    fn pagination_slices_and_clamps() {
        let (p, start, end) = Pagination::slice(2, 10, 25);
        assert_eq!((start, end), (10, 20));
        assert_eq!(p.total_pages, 3);

        // Past-the-end page yields an empty slice, not a panic.
        let (_, start, end) = Pagination::slice(9, 10, 25);
        assert_eq!((start, end), (25, 25));

        // Oversized page_size is clamped.
        let (p, _, _) = Pagination::slice(1, 10_000, 5);
        assert_eq!(p.page_size, MAX_PAGE_SIZE);
    }
}
