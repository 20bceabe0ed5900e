use tracing::info;

use crate::protocol::{
    InitializeRequest, InitializeResponse, MCP_PROTOCOL_VERSION, ServerCapabilities, ServerInfo,
    ToolsCapabilities,
};

pub fn handle_initialize(request: InitializeRequest) -> InitializeResponse {
    info!(
        "Client connected: {} v{} (protocol {})",
        request.client_info.name, request.client_info.version, request.protocol_version
    );

    InitializeResponse {
        protocol_version: MCP_PROTOCOL_VERSION.to_string(),
        capabilities: ServerCapabilities {
            // The tool set is fixed at startup.
            tools: ToolsCapabilities { list_changed: false },
        },
        server_info: ServerInfo {
            name: "ga4-mcp".to_string(),
            version: env!("CARGO_PKG_VERSION").to_string(),
        },
        instructions: "Query Google Analytics 4 properties. Every tool takes the numeric GA4 \
                       property ID. Use run_report for historical data, run_realtime_report for \
                       the last 30 minutes, quick_insight for common presets, and get_metadata or \
                       search_metadata to discover valid dimension and metric names for a property."
            .to_string(),
    }
}
