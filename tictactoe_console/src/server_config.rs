use serde::{Deserialize, Serialize};
use tictactoe_online::coordinator::ServerOptions;
use tictactoe_online::network;


#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    pub bind_address: String,
    pub port: u16,
    // Tell clients why their commands were refused instead of ignoring them silently.
    pub report_rejections: bool,
}

impl Default for ServerConfig {
    fn default() -> Self {
        ServerConfig {
            bind_address: "0.0.0.0".to_owned(),
            port: network::PORT,
            report_rejections: false,
        }
    }
}

impl ServerConfig {
    pub fn server_options(&self) -> ServerOptions {
        ServerOptions { report_rejections: self.report_rejections }
    }
}
