use std::net::{IpAddr, Ipv4Addr};

use axum::{extract::State, Json};
use serde::{Deserialize, Serialize};
use sysinfo::{Networks, System};

use crate::state::AppState;

#[derive(Debug, Serialize, Deserialize)]
pub struct ServerInfo {
    pub port: u16,
    pub ips: Vec<String>,
    pub hostname: String,
}

/// Unauthenticated so that a browser on the LAN can discover the address.
pub async fn server_info(State(state): State<AppState>) -> Json<ServerInfo> {
    Json(ServerInfo {
        port: state.config.server_port,
        ips: lan_addresses().iter().map(Ipv4Addr::to_string).collect(),
        hostname: System::host_name().unwrap_or_default(),
    })
}

/// Non-loopback IPv4 addresses of every interface, sorted and deduplicated.
pub fn lan_addresses() -> Vec<Ipv4Addr> {
    let networks = Networks::new_with_refreshed_list();
    let mut addresses: Vec<Ipv4Addr> = networks
        .iter()
        .flat_map(|(_, data)| data.ip_networks().iter().map(|network| network.addr))
        .filter_map(|addr| match addr {
            IpAddr::V4(v4) if !v4.is_loopback() && !v4.is_unspecified() => Some(v4),
            _ => None,
        })
        .collect();
    addresses.sort();
    addresses.dedup();
    addresses
}
