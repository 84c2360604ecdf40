//! Camouflage Tunnel binary.
//!
//! Usage: camotun [OPTIONS]
//!
//! Options:
//!   -mode <client|server>   Tunnel role (default: client)
//!   -pattern <FILE>         Protocol pattern catalogue (default: llm.json)
//!   -port <PORT>            Listen port (default: 2020)
//!   -server <HOST:PORT>     Tunnel server address (required in client mode)
//!   -vpn-server <HOST:PORT> Upstream VPN endpoint (default: 127.0.0.1:4040)
//!   -fpe-key <BASE64>       Payload obfuscation key
//!   -verbose                Debug-level logging
//!   -h, --help              Print help information

use std::env;
use std::sync::Arc;

use anyhow::Context;

use camotun::catalogue::Catalogue;
use camotun::obfuscate;
use camotun::tunnel::{Mode, TunnelConfig, TunnelNode};

struct Options {
    verbose: bool,
    pattern: String,
    fpe_key: String,
    mode: String,
    port: String,
    server: Option<String>,
    vpn_server: String,
    help: bool,
}

impl Default for Options {
    fn default() -> Self {
        Self {
            verbose: false,
            pattern: "llm.json".to_string(),
            fpe_key: "aGVsbG93b3JsZDEyMzQ1Ng==".to_string(),
            mode: "client".to_string(),
            port: "2020".to_string(),
            server: None,
            vpn_server: "127.0.0.1:4040".to_string(),
            help: false,
        }
    }
}

impl Options {
    fn parse(mut args: impl Iterator<Item = String>) -> Result<Options, String> {
        let mut opts = Options::default();

        while let Some(arg) = args.next() {
            let flag = arg.trim_start_matches('-');
            match flag {
                "h" | "help" => opts.help = true,
                "verbose" => opts.verbose = true,
                "pattern" | "fpe-key" | "mode" | "port" | "server" | "vpn-server" => {
                    let value = args
                        .next()
                        .ok_or_else(|| format!("flag -{} requires a value", flag))?;
                    match flag {
                        "pattern" => opts.pattern = value,
                        "fpe-key" => opts.fpe_key = value,
                        "mode" => opts.mode = value,
                        "port" => opts.port = value,
                        "server" => opts.server = Some(value),
                        "vpn-server" => opts.vpn_server = value,
                        _ => unreachable!(),
                    }
                }
                _ => return Err(format!("unknown flag: {}", arg)),
            }
        }

        Ok(opts)
    }
}

fn print_usage() {
    println!(
        r#"camotun - protocol-mimicking TCP tunnel

USAGE:
    camotun [OPTIONS]

OPTIONS:
    -mode <client|server>    Tunnel role (default: client)
    -pattern <FILE>          Protocol pattern catalogue (default: llm.json)
    -port <PORT>             Listen port (default: 2020)
    -server <HOST:PORT>      Tunnel server address (required in client mode)
    -vpn-server <HOST:PORT>  Upstream VPN endpoint (default: 127.0.0.1:4040)
    -fpe-key <BASE64>        Payload obfuscation key
    -verbose                 Debug-level logging
    -h, --help               Print help information

EXAMPLES:
    Client side, forwarding local port 2020 through the tunnel:
        camotun -mode client -port 2020 -server tunnel.example.com:443

    Server side, terminating the tunnel in front of a VPN endpoint:
        camotun -mode server -port 443 -vpn-server 127.0.0.1:4040
"#
    );
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let opts = match Options::parse(env::args().skip(1)) {
        Ok(opts) => opts,
        Err(message) => {
            eprintln!("Error: {}", message);
            print_usage();
            std::process::exit(2);
        }
    };

    if opts.help {
        print_usage();
        return Ok(());
    }

    // RUST_LOG still wins when set; -verbose only moves the default.
    let default_level = if opts.verbose { "debug" } else { "info" };
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(default_level)),
        )
        .with_target(false)
        .init();

    let mode: Mode = opts.mode.parse()?;
    if mode == Mode::Client && opts.server.is_none() {
        anyhow::bail!("client mode requires -server");
    }
    let listen_port: u16 = opts
        .port
        .parse()
        .with_context(|| format!("invalid port '{}'", opts.port))?;

    let data = std::fs::read(&opts.pattern)
        .with_context(|| format!("failed to read pattern file '{}'", opts.pattern))?;
    let catalogue = Catalogue::from_json_slice(&data)
        .with_context(|| format!("failed to load catalogue '{}'", opts.pattern))?;

    tracing::info!(
        engine = %catalogue.engine.name,
        version = %catalogue.engine.version,
        protocols = catalogue.entries.len(),
        "catalogue loaded"
    );
    for entry in &catalogue.entries {
        tracing::info!(protocol = %entry.identifier, transport = %entry.transport, "available");
    }

    let key = obfuscate::decode_key(&opts.fpe_key);
    let obfuscator = obfuscate::for_mode(catalogue.options.obfuscation, key);

    let config = TunnelConfig {
        mode,
        listen_port,
        server_addr: opts.server,
        vpn_server_addr: opts.vpn_server,
    };
    match mode {
        Mode::Client => tracing::info!(
            port = listen_port,
            server = config.server_addr.as_deref().unwrap_or("<unset>"),
            "client mode"
        ),
        Mode::Server => tracing::info!(
            port = listen_port,
            vpn_server = %config.vpn_server_addr,
            "server mode"
        ),
    }

    let node = Arc::new(TunnelNode::new(catalogue, config, obfuscator)?);
    let listener = node.bind().await?;

    let (shutdown_tx, shutdown_rx) = tokio::sync::watch::channel(false);
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            tracing::info!("interrupt received, shutting down");
            let _ = shutdown_tx.send(true);
        }
    });

    node.run(listener, shutdown_rx).await?;
    Ok(())
}
