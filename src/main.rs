use clap::{Parser, Subcommand};
use reach::{Config, FileClient, ServiceError, Status, UdpServer};
use std::path::PathBuf;
use std::process::ExitCode;
use tracing::info;

#[derive(Parser)]
#[command(name = "reach")]
#[command(about = "Remote byte-range file access over UDP")]
struct Cli {
    /// Configuration file path
    #[arg(short, long, default_value = "config.toml")]
    config: PathBuf,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Start the file server
    Server {
        /// Listen port (overrides the config file)
        #[arg(short, long)]
        port: Option<u16>,
        /// Invocation semantics: at_least_once or at_most_once
        #[arg(short, long)]
        mode: Option<String>,
        /// Directory under which request paths are resolved
        #[arg(short, long)]
        root: Option<String>,
    },
    /// Read a byte range from a file
    Read {
        path: String,
        #[arg(short, long, default_value_t = 0)]
        offset: u64,
        #[arg(short, long)]
        length: u64,
    },
    /// Insert bytes into a file at an offset, shifting the rest right
    Insert {
        path: String,
        #[arg(short, long, default_value_t = 0)]
        offset: u64,
        /// Text to insert
        data: String,
    },
    /// Delete a byte range from a file, shifting the suffix left
    Delete {
        path: String,
        #[arg(short, long, default_value_t = 0)]
        offset: u64,
        #[arg(short, long)]
        length: u64,
    },
    /// Fetch a file's attribute record
    Info { path: String },
    /// Watch a file for updates for a duration
    Monitor {
        path: String,
        /// How long to listen for callbacks, in milliseconds
        #[arg(short, long, default_value_t = 60_000)]
        duration_ms: u64,
    },
    /// Ask the server to stop
    Shutdown,
}

#[tokio::main]
async fn main() -> ExitCode {
    let env_filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info"));
    tracing_subscriber::fmt().with_env_filter(env_filter).init();

    let cli = Cli::parse();
    match run(cli).await {
        Ok(code) => code,
        Err(e) => {
            eprintln!("error: {e}");
            ExitCode::FAILURE
        }
    }
}

async fn run(cli: Cli) -> Result<ExitCode, ServiceError> {
    let mut config = Config::load_or_create(&cli.config)?;

    match cli.command {
        Commands::Server { port, mode, root } => {
            if let Some(port) = port {
                config.server.port = port;
            }
            if let Some(mode) = mode {
                config.server.mode = mode;
            }
            if let Some(root) = root {
                config.server.root_directory = root;
            }
            config.validate()?;

            let server = UdpServer::bind(&config.server).await?;
            info!(addr = %server.local_addr()?, "starting file server");
            server.run().await?;
            Ok(ExitCode::SUCCESS)
        }
        Commands::Read {
            path,
            offset,
            length,
        } => {
            let client = FileClient::connect(&config.client).await?;
            let response = client.read(&path, offset, length).await?;
            println!("{}", response.message);
            if !response.payload.is_empty() {
                println!("{}", String::from_utf8_lossy(&response.payload));
            }
            Ok(exit_for(response.status))
        }
        Commands::Insert { path, offset, data } => {
            let client = FileClient::connect(&config.client).await?;
            let response = client.insert(&path, offset, data.into_bytes()).await?;
            println!("{}", response.message);
            Ok(exit_for(response.status))
        }
        Commands::Delete {
            path,
            offset,
            length,
        } => {
            let client = FileClient::connect(&config.client).await?;
            let response = client.delete(&path, offset, length).await?;
            println!("{}", response.message);
            Ok(exit_for(response.status))
        }
        Commands::Info { path } => {
            let client = FileClient::connect(&config.client).await?;
            let response = client.file_info(&path).await?;
            if response.status == Status::FileInfoSuccess {
                println!("{}", String::from_utf8_lossy(&response.payload));
            } else {
                println!("{}", response.message);
            }
            Ok(exit_for(response.status))
        }
        Commands::Monitor { path, duration_ms } => {
            let client = FileClient::connect(&config.client).await?;
            let response = client
                .monitor(&path, duration_ms, |callback| {
                    println!("{}", callback.message);
                    if !callback.payload.is_empty() {
                        println!("{}", String::from_utf8_lossy(&callback.payload));
                    }
                })
                .await?;
            println!("{}", response.message);
            Ok(exit_for(response.status))
        }
        Commands::Shutdown => {
            let client = FileClient::connect(&config.client).await?;
            let response = client.shutdown().await?;
            println!("{}", response.message);
            Ok(exit_for(response.status))
        }
    }
}

fn exit_for(status: Status) -> ExitCode {
    if status.is_success() || status == Status::Shutdown {
        ExitCode::SUCCESS
    } else {
        ExitCode::FAILURE
    }
}
