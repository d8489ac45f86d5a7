//! Telemetry polling (C7), the monitor pipeline (C8), and display handlers (C9).
//!
//! - [`client::TelemetryClient`] - a minimal HTTP client bound to one node's agent
//! - [`pipeline::run`] - the poller/consumer/server task group
//! - [`display`] - Table, Line, and Silent presentations of telemetry samples

pub mod client;
pub mod display;
pub mod pipeline;

use serde::Deserialize;

/// One node's telemetry sample, matching the agent's `GET /api/v0/cur` response shape.
#[derive(Debug, Clone, Copy, Deserialize, Default)]
pub struct TelemetrySample {
    #[serde(rename = "cpuTemp")]
    pub cpu_temp: f64,
    #[serde(rename = "cpuUsage")]
    pub cpu_usage: f64,
    #[serde(rename = "memUsage")]
    pub mem_usage: f64,
}

/// Matches the agent's `GET /api/v0/host` response shape.
#[derive(Debug, Clone, Deserialize)]
pub struct HostInfo {
    pub hostname: String,
    #[serde(rename = "hostId")]
    pub host_id: String,
    #[serde(rename = "kernalArch")]
    pub kernel_arch: String,
    pub uptime: u64,
    #[serde(rename = "humanUptime")]
    pub human_uptime: String,
}

/// One message delivered from the poller to the display handler: the polled node's
/// index, its sample on success, or an error description on failure.
#[derive(Debug, Clone)]
pub struct AgentResponse {
    pub index: usize,
    pub name: String,
    pub result: Result<TelemetrySample, String>,
}
