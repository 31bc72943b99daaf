use base64::Engine;
use clap::{Parser, Subcommand};
use futures_util::{SinkExt, StreamExt};
use tokio_tungstenite::tungstenite::Message;

const DEFAULT_RELAY_URL: &str = "ws://127.0.0.1:8000/ws/interview";

#[derive(Parser)]
#[command(name = "prompter-cli")]
#[command(about = "Prompter CLI", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand)]
enum Commands {
    /// Show version
    Version,

    /// Run the relay (HTTP health + WebSocket at /ws/interview). Requires GROQ_API_KEY to generate answers.
    Serve {
        /// Config file path (default: PROMPTER_CONFIG_PATH or ./prompter.json)
        #[arg(long, short, value_name = "PATH")]
        config: Option<std::path::PathBuf>,

        /// WebSocket and HTTP port (default from config or 8000)
        #[arg(long, short)]
        port: Option<u16>,

        /// Bind address (default from config or 127.0.0.1)
        #[arg(long, value_name = "ADDR")]
        bind: Option<String>,
    },

    /// Send one question to a running relay and print the answer.
    Ask {
        /// Question text
        question: String,

        /// JPEG screen capture to attach (sent base64-encoded)
        #[arg(long, short, value_name = "FILE")]
        image: Option<std::path::PathBuf>,

        /// Relay WebSocket URL
        #[arg(long, default_value = DEFAULT_RELAY_URL)]
        url: String,
    },

    /// Ask questions interactively over one connection; the relay saves the transcript when you quit.
    Chat {
        /// Relay WebSocket URL
        #[arg(long, default_value = DEFAULT_RELAY_URL)]
        url: String,
    },
}

#[tokio::main]
async fn main() {
    let _ = dotenvy::dotenv();
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let cli = Cli::parse();

    match cli.command {
        Some(Commands::Version) => {
            println!("prompter {}", env!("CARGO_PKG_VERSION"));
        }
        Some(Commands::Serve { config, port, bind }) => {
            if let Err(e) = run_serve(config, port, bind).await {
                log::error!("relay failed: {:#}", e);
                std::process::exit(1);
            }
        }
        Some(Commands::Ask {
            question,
            image,
            url,
        }) => {
            if let Err(e) = run_ask(&url, question, image).await {
                log::error!("ask failed: {:#}", e);
                std::process::exit(1);
            }
        }
        Some(Commands::Chat { url }) => {
            if let Err(e) = run_chat(&url).await {
                log::error!("chat failed: {:#}", e);
                std::process::exit(1);
            }
        }
        None => {
            println!("Run with --help for usage");
        }
    }
}

async fn run_serve(
    config_path: Option<std::path::PathBuf>,
    port: Option<u16>,
    bind: Option<String>,
) -> anyhow::Result<()> {
    let (mut config, path) = prompter::config::load_config(config_path)?;
    log::debug!("using config {}", path.display());
    if let Some(p) = port {
        config.server.port = p;
    }
    if let Some(b) = bind {
        config.server.bind = b;
    }
    log::info!("starting relay on {}:{}", config.server.bind, config.server.port);
    prompter::relay::run_relay(config).await
}

/// Wire frame for one question, as the desktop overlay sends it.
fn question_frame(question: &str, image: Option<&str>) -> String {
    let mut frame = serde_json::json!({
        "type": "question",
        "payload": question,
    });
    if let Some(img) = image {
        frame["image"] = serde_json::Value::String(img.to_string());
    }
    frame.to_string()
}

async fn run_ask(
    url: &str,
    question: String,
    image: Option<std::path::PathBuf>,
) -> anyhow::Result<()> {
    use anyhow::Context;

    let image = match image {
        Some(path) => {
            let bytes = std::fs::read(&path)
                .with_context(|| format!("reading image {}", path.display()))?;
            Some(base64::engine::general_purpose::STANDARD.encode(bytes))
        }
        None => None,
    };
    if question.is_empty() && image.is_none() {
        anyhow::bail!("nothing to ask: give a question or --image");
    }
    let frame = question_frame(&question, image.as_deref());

    let (mut ws, _) = tokio_tungstenite::connect_async(url)
        .await
        .with_context(|| format!("connecting to {}", url))?;
    ws.send(Message::Text(frame)).await?;
    let answer = next_answer(&mut ws).await?;
    println!("{}", answer.trim());
    let _ = ws.close(None).await;
    Ok(())
}

async fn run_chat(url: &str) -> anyhow::Result<()> {
    use anyhow::Context;
    use std::io::{self, Write};

    let (mut ws, _) = tokio_tungstenite::connect_async(url)
        .await
        .with_context(|| format!("connecting to {}", url))?;
    let stdin = io::stdin();
    let mut stdout = io::stdout();

    loop {
        write!(stdout, "> ")?;
        stdout.flush()?;
        let mut line = String::new();
        if stdin.read_line(&mut line)? == 0 {
            break;
        }
        let input = line.trim();
        if input.is_empty() {
            continue;
        }
        if input.eq_ignore_ascii_case("/exit") || input.eq_ignore_ascii_case("/quit") {
            break;
        }

        ws.send(Message::Text(question_frame(input, None))).await?;
        match next_answer(&mut ws).await {
            Ok(answer) => println!("< {}", answer.trim()),
            Err(e) => {
                eprintln!("chat error: {:#}", e);
                break;
            }
        }
    }

    let _ = ws.close(None).await;
    Ok(())
}

/// Wait for the next text frame (the answer); errors if the relay closes first.
async fn next_answer<S>(ws: &mut tokio_tungstenite::WebSocketStream<S>) -> anyhow::Result<String>
where
    S: tokio::io::AsyncRead + tokio::io::AsyncWrite + Unpin,
{
    while let Some(msg) = ws.next().await {
        match msg? {
            Message::Text(text) => return Ok(text),
            Message::Close(_) => break,
            _ => continue,
        }
    }
    anyhow::bail!("relay closed the connection before answering")
}
