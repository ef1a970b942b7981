use clap::{Parser, Subcommand};
use std::path::PathBuf;
use testfs::fs::{fuse::FuseDaemon, TestFs};
use testfs_tracing::LogFormat;
use tracing::{info, Level};

#[derive(Parser)]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// A global log level to use when printing logs.
    /// It's also possible to set `RUST_LOG` according to
    /// `tracing_subscriber::filter::EnvFilter`, which will always have
    /// priority.
    #[arg(long, default_value_t = Level::INFO)]
    log_level: Level,

    /// Whether to log in JSON
    #[arg(long)]
    json: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Mounts the synthetic filesystem at the given mountpoint.
    ///
    /// Below it, every directory named like `<size>x<w1>x...x<wN>` is a
    /// tree with N layers, <wI> children at layer I and files of <size>
    /// bytes, e.g. `1kx5x4`.
    Mount {
        #[clap(value_name = "PATH")]
        dest: PathBuf,

        /// Number of FUSE threads to spawn.
        #[arg(long, env, default_value_t = default_threads())]
        threads: usize,

        /// Whether to allow other users to access the mount.
        #[arg(long, env, default_value_t = false)]
        allow_other: bool,
    },
}

fn default_threads() -> usize {
    std::thread::available_parallelism()
        .map(|threads| threads.into())
        .unwrap_or(4)
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
    let cli = Cli::parse();

    testfs_tracing::TracingBuilder::default()
        .level(cli.log_level)
        .format(if cli.json {
            LogFormat::Json
        } else {
            LogFormat::Compact
        })
        .build()?;

    match cli.command {
        Commands::Mount {
            dest,
            threads,
            allow_other,
        } => {
            let fuse_daemon = tokio::task::spawn_blocking(move || {
                FuseDaemon::new(TestFs::new(), &dest, threads, allow_other)
            })
            .await??;

            info!(threads, "mounted");

            // Wait for a ctrl_c and then call fuse_daemon.unmount().
            tokio::spawn({
                let fuse_daemon = fuse_daemon.clone();
                async move {
                    tokio::signal::ctrl_c().await?;
                    info!("interrupt received, unmounting…");
                    tokio::task::spawn_blocking(move || fuse_daemon.unmount()).await??;
                    info!("unmount occured, terminating…");
                    Ok::<_, Box<dyn std::error::Error + Send + Sync>>(())
                }
            });

            // Wait for the server to finish, which can either happen through it
            // being unmounted externally, or receiving a signal invoking the
            // handler above.
            tokio::task::spawn_blocking(move || fuse_daemon.wait()).await?
        }
    }

    Ok(())
}
