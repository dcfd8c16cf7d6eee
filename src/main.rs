use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::Arc;

use tracing::{error, info};

use net_filter_processor::config::{self, Descriptor};
use net_filter_processor::dump;
use net_filter_processor::engine::{self, EngineConfig, PacketEngine};
use net_filter_processor::net::{UdpReceiver, UdpSender};
use net_filter_processor::shutdown::shutdown_channel;

/// Matches the original's `return -1;`, truncated to a `u8` exit code by the
/// platform (255 on POSIX) — spec.md §6 names this value specifically, not
/// just "non-zero".
const EXIT_CONFIG_OR_STARTUP_ERROR: u8 = 255;

struct Cli {
    config_path: PathBuf,
    dump_coeffs: Option<PathBuf>,
}

fn parse_args() -> anyhow::Result<Cli> {
    let mut args = std::env::args().skip(1);
    let config_path = args
        .next()
        .ok_or_else(|| anyhow::anyhow!("usage: net-filter-processor <config-path> [--dump-coeffs <out-path>]"))?
        .into();

    let mut dump_coeffs = None;
    while let Some(flag) = args.next() {
        match flag.as_str() {
            "--dump-coeffs" => {
                let path = args
                    .next()
                    .ok_or_else(|| anyhow::anyhow!("--dump-coeffs requires a path"))?;
                dump_coeffs = Some(PathBuf::from(path));
            }
            other => return Err(anyhow::anyhow!("unrecognized argument: {other}")),
        }
    }

    Ok(Cli {
        config_path,
        dump_coeffs,
    })
}

#[tokio::main]
async fn main() -> ExitCode {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive(tracing_subscriber::filter::LevelFilter::INFO.into()),
        )
        .init();

    info!("starting net-filter-processor");

    let cli = match parse_args() {
        Ok(cli) => cli,
        Err(err) => {
            error!("{err}");
            return ExitCode::from(EXIT_CONFIG_OR_STARTUP_ERROR);
        }
    };

    let descriptor = match config::load(&cli.config_path) {
        Ok(descriptor) => descriptor,
        Err(err) => {
            error!("config error: {err}");
            return ExitCode::from(EXIT_CONFIG_OR_STARTUP_ERROR);
        }
    };

    if let Some(dump_path) = &cli.dump_coeffs {
        let pipeline = config::build_pipeline(&descriptor.elements);
        if let Err(err) = dump::dump_coeffs(&pipeline, dump_path) {
            error!("coefficient dump failed: {err}");
            return ExitCode::from(EXIT_CONFIG_OR_STARTUP_ERROR);
        }
        info!(path = %dump_path.display(), "wrote coefficient dump");
    }

    match run(descriptor).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            error!("startup error: {err}");
            ExitCode::from(EXIT_CONFIG_OR_STARTUP_ERROR)
        }
    }
}

async fn run(descriptor: Descriptor) -> anyhow::Result<()> {
    // Independent cancellation per loop so shutdown can stage receiver before
    // reaper, per spec.md §5, rather than cancelling both off one signal.
    let (receiver_shutdown_handle, receiver_shutdown_token) = shutdown_channel();
    let (reaper_shutdown_handle, reaper_shutdown_token) = shutdown_channel();

    let sender = Arc::new(UdpSender::bind(descriptor.conn.client_addr).await?);
    let receiver = UdpReceiver::bind(descriptor.conn.server_port).await?;

    let elements = descriptor.elements.clone();
    let pipeline_factory: engine::PipelineFactory =
        Arc::new(move || config::build_pipeline(&elements));

    let engine = PacketEngine::new(
        sender,
        pipeline_factory,
        descriptor.conn.concealment,
        EngineConfig::default(),
    );

    let reaper = engine.spawn_reaper(reaper_shutdown_token);
    let receiver_task = tokio::spawn(receiver.run(Arc::clone(&engine), receiver_shutdown_token));

    info!(port = descriptor.conn.server_port, "listening for UDP datagrams");

    tokio::signal::ctrl_c()
        .await
        .expect("failed to install SIGINT handler");
    info!("shutdown signal received");

    // 1. Stop the receiver and join it.
    receiver_shutdown_handle.cancel();
    let _ = receiver_task.await;

    // 2. Cancel the reaper timer and join it.
    reaper_shutdown_handle.cancel();
    let _ = reaper.await;

    // 3. Close the sender socket: this is the last live reference to it.
    drop(engine);

    // 4/5. The two I/O reactors are tokio tasks on the shared runtime, which
    // joins them as `main` returns; nothing further to stop or join by hand.
    info!("shutdown complete");
    Ok(())
}
