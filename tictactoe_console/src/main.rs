#![forbid(unsafe_code)]
#![cfg_attr(feature = "strict", deny(warnings))]

mod client_main;
mod server_config;
mod server_main;

use anyhow::Context;
use clap::{Command, arg};
use server_config::ServerConfig;

fn main() -> anyhow::Result<()> {
    env_logger::Builder::new()
        .target(env_logger::Target::Stdout)
        .filter_level(log::LevelFilter::Info)
        .parse_default_env()
        .init();

    let matches = Command::new("Tic-tac-toe")
        .version(clap::crate_version!())
        .about("Two-player tic-tac-toe client/server console app")
        .subcommand_required(true)
        .subcommand(Command::new("server").about("Run as server").arg(
            arg!([config_file] "Path to the configuration file: yaml-serialized ServerConfig."),
        ))
        .subcommand(
            Command::new("client")
                .about("Run as client")
                .arg(arg!(<server_address> "Server address, optionally with port"))
                .arg(arg!(<player_name> "Player name")),
        )
        .get_matches();

    match matches.subcommand() {
        Some(("server", sub_matches)) => {
            let config = match sub_matches.get_one::<String>("config_file") {
                Some(filename) => read_config_file(filename)?,
                None => ServerConfig::default(),
            };
            server_main::run(config)
        }
        Some(("client", sub_matches)) => client_main::run(client_main::ClientConfig {
            server_address: sub_matches.get_one::<String>("server_address").unwrap().clone(),
            player_name: sub_matches.get_one::<String>("player_name").unwrap().clone(),
        }),
        _ => unreachable!("Exhausted list of subcommands and subcommand_required prevents `None`"),
    }
}

fn read_config_file(filename: &str) -> anyhow::Result<ServerConfig> {
    let contents = std::fs::read_to_string(filename)
        .with_context(|| format!("Failed to read config file '{filename}'"))?;
    serde_yaml::from_str(&contents)
        .with_context(|| format!("Failed to parse config file '{filename}'"))
}
