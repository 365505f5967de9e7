// Copyright 2026 XLAN relay developers.
// This file is part of xlan-relay.

// xlan-relay is free software: you can redistribute it and/or modify
// it under the terms of the GNU General Public License as published by
// the Free Software Foundation, either version 3 of the License, or
// (at your option) any later version.

// xlan-relay is distributed in the hope that it will be useful,
// but WITHOUT ANY WARRANTY; without even the implied warranty of
// MERCHANTABILITY or FITNESS FOR A PARTICULAR PURPOSE.  See the
// GNU General Public License for more details.

// You should have received a copy of the GNU General Public License
// along with xlan-relay.  If not, see <http://www.gnu.org/licenses/>.

//! Command-line front end for the relay: runs as either a host or a
//! client, driving `Server::tick()` in a loop and logging every callback.

use std::path::PathBuf;
use std::thread;
use std::time::Duration;

use clap::{Parser, Subcommand};
use log::{info, warn};

use xlan_relay::{
    auth, Callbacks, ClientConfig, DisconnectReason, RelayConfig, Server, SystemLinkPacket,
};

#[derive(Parser)]
#[command(name = "xlan-relayd", about = "XLAN system-link relay")]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Host a relay that other instances connect to.
    Host {
        #[arg(long)]
        tcp: Option<String>,
        #[arg(long)]
        udp: Option<String>,
        #[arg(long)]
        name: Option<String>,
        #[arg(long)]
        password: Option<String>,
        #[arg(long)]
        config: Option<PathBuf>,
    },
    /// Connect to a running relay.
    Connect {
        #[arg(long)]
        tcp: String,
        #[arg(long)]
        udp: String,
        #[arg(long)]
        name: Option<String>,
        #[arg(long)]
        password: Option<String>,
        #[arg(long)]
        config: Option<PathBuf>,
    },
}

/// Logs every callback at the appropriate level; the CLI has no richer UI.
struct LoggingCallbacks;

impl Callbacks for LoggingCallbacks {
    fn connection(&mut self, peer_id: u64, name: &str, allow: &mut bool) {
        let _ = allow;
        info!("peer {peer_id} connected as \"{name}\"");
    }

    fn disconnection(&mut self, peer_id: u64, reason: DisconnectReason) {
        info!("peer {peer_id} disconnected: {reason}");
    }

    fn message(&mut self, sender: Option<u64>, text: &str, allow: &mut bool) {
        let _ = allow;
        match sender {
            Some(id) => info!("<{id}> {text}"),
            None => info!("<server> {text}"),
        }
    }

    fn system_link_packet(&mut self, packet: &SystemLinkPacket, allow: &mut bool) {
        let _ = allow;
        info!(
            "system-link frame {} -> {} ({} bytes payload)",
            packet.source_mac(),
            packet.destination_mac(),
            packet.udp_payload().len()
        );
    }

    fn error(&mut self, peer_id: Option<u64>, message: &str) {
        warn!("error (peer {peer_id:?}): {message}");
    }
}

fn main() -> xlan_relay::Result<()> {
    env_logger::init();
    let cli = Cli::parse();

    match cli.command {
        Command::Host { tcp, udp, name, password, config } => run_host(tcp, udp, name, password, config),
        Command::Connect { tcp, udp, name, password, config } => run_connect(tcp, udp, name, password, config),
    }
}

fn run_host(
    tcp: Option<String>,
    udp: Option<String>,
    name: Option<String>,
    password: Option<String>,
    config_path: Option<PathBuf>,
) -> xlan_relay::Result<()> {
    let mut config = match config_path {
        Some(path) => RelayConfig::from_toml_str(&std::fs::read_to_string(path)?)?,
        None => RelayConfig::default(),
    };
    if let Some(tcp) = tcp {
        config.bind_tcp = tcp;
    }
    if let Some(udp) = udp {
        config.bind_udp = udp;
    }
    if let Some(name) = name {
        config.server_name = name;
    }
    if password.is_some() {
        config.password = password;
    }

    let mut server = Server::host(config, auth::DEFAULT_SALT, LoggingCallbacks)?;
    info!("relay \"{}\" is up", server.server_name());
    loop {
        server.tick()?;
        thread::sleep(Duration::from_millis(10));
    }
}

fn run_connect(
    tcp: String,
    udp: String,
    name: Option<String>,
    password: Option<String>,
    config_path: Option<PathBuf>,
) -> xlan_relay::Result<()> {
    let mut config = match config_path {
        Some(path) => ClientConfig::from_toml_str(&std::fs::read_to_string(path)?)?,
        None => ClientConfig::default(),
    };
    config.connect_tcp = tcp;
    config.connect_udp = udp;
    if name.is_some() {
        config.requested_name = name;
    }
    if password.is_some() {
        config.password = password;
    }

    let mut server = Server::connect(config, LoggingCallbacks)?;
    loop {
        server.tick()?;
        if let Some(id) = server.own_peer_id() {
            info!("connected as peer {id}");
            break;
        }
        thread::sleep(Duration::from_millis(10));
    }
    loop {
        server.tick()?;
        thread::sleep(Duration::from_millis(10));
    }
}
