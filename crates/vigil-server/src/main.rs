use anyhow::{anyhow, Result};
use clap::Parser;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;
use vigil_config::ConfigLoader;
use vigil_logging::init_logging;
use vigil_server::{api, build_engine, shutdown, AppState, SignalHandler};

const DRAIN_TIMEOUT: Duration = Duration::from_secs(10);

#[derive(Parser, Debug)]
#[command(author, version, about)]
struct Args {
    /// 配置目录（包含 vigil.toml）
    #[arg(short, long, default_value = "./config")]
    config_dir: String,

    /// 运维 HTTP 接口监听地址，不指定则不启动
    #[arg(long)]
    http_bind: Option<String>,

    /// 执行一轮求值后退出，并输出结果
    #[arg(long)]
    once: bool,

    /// 输出生效的规则后退出
    #[arg(long)]
    print_rules: bool,
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    let loader = ConfigLoader::new(&args.config_dir);
    let config = loader.load_validated()?;
    init_logging(&config.logging)?;

    tracing::info!(
        config_dir = %args.config_dir,
        system = %config.system.name,
        version = %config.system.version,
        "Starting Vigil"
    );

    if args.print_rules {
        let rules = loader.load_configured_rules(&config)?;
        println!("{}", serde_json::to_string_pretty(&rules)?);
        return Ok(());
    }

    let engine = Arc::new(build_engine(&loader, &config).await?);

    if args.once {
        let report = engine.run_cycle().await;
        println!("{}", serde_json::to_string_pretty(&report)?);
        return Ok(());
    }

    let (signals, shutdown_rx) = SignalHandler::new();
    let handle = engine.start(&shutdown_rx);

    let server = match &args.http_bind {
        Some(addr) => {
            let addr: SocketAddr = addr
                .parse()
                .map_err(|e| anyhow!("invalid http_bind {}: {}", addr, e))?;
            let shutdown = shutdown::wait_for(signals.subscribe());
            Some(api::spawn_server(
                addr,
                AppState::new(Arc::clone(&engine)),
                shutdown,
            )?)
        }
        None => None,
    };

    let signal = signals.wait_for_system_signal().await?;
    tracing::info!(?signal, "Shutting down");

    shutdown::drain(handle, DRAIN_TIMEOUT).await;
    if let Some(server) = server {
        match server.await {
            Ok(Ok(())) => {}
            Ok(Err(e)) => tracing::error!(error = %e, "HTTP server failed"),
            Err(e) => tracing::error!(error = %e, "HTTP server task panicked"),
        }
    }

    tracing::info!("Vigil stopped");
    Ok(())
}
