use std::io::{self, Stdout, Write};

use anyhow::Result;
use chatline_client::{
    ChatController, ClientConfig, ConnectionState, DEFAULT_SERVER_URL, HttpDirectory,
    StompConnector, TerminalSurface, user_message,
};
use clap::Parser;
use tokio::io::{AsyncBufReadExt, BufReader};
use tracing_subscriber::{EnvFilter, layer::SubscriberExt, util::SubscriberInitExt};

type Controller = ChatController<StompConnector, HttpDirectory, TerminalSurface<Stdout>>;

#[derive(Parser, Debug)]
#[command(name = "cli_chat", about = "One-to-one chat from the terminal")]
struct Args {
    /// Chat server base URL
    #[arg(long, env = "CHATLINE_SERVER", default_value = DEFAULT_SERVER_URL)]
    server: String,

    /// Nickname to sign in with (prompted for when omitted)
    #[arg(long)]
    nickname: Option<String>,

    /// Real name shown to other users (prompted for when omitted)
    #[arg(long)]
    full_name: Option<String>,

    /// Log debug output to stderr
    #[arg(short, long)]
    verbose: bool,
}

enum Flow {
    Continue,
    Quit,
}

fn init_logging(verbose: bool) {
    let default = if verbose { "debug" } else { "warn" };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default));

    tracing_subscriber::registry()
        .with(filter)
        .with(tracing_subscriber::fmt::layer().with_writer(io::stderr))
        .init();
}

fn prompt(label: &str) -> Result<String> {
    print!("{label}: ");
    io::stdout().flush()?;
    let mut value = String::new();
    io::stdin().read_line(&mut value)?;
    Ok(value.trim().to_string())
}

fn print_help() {
    println!("Commands:");
    println!("  /users         - Refresh the list of online users");
    println!("  /open <nick>   - Open the conversation with a user");
    println!("  /logout        - Sign out and exit");
    println!("  /help          - Show this help");
    println!("  <message>      - Send message to the open conversation");
}

fn report(e: anyhow::Error) {
    match user_message(&e) {
        Some(message) => {
            tracing::error!(error = ?e, "Command failed");
            println!("{message}");
        }
        None => tracing::debug!(error = %e, "Rejected input"),
    }
}

async fn handle_input(line: &str, controller: &mut Controller) -> Flow {
    let line = line.trim();
    if line.is_empty() {
        return Flow::Continue;
    }

    let Some(command) = line.strip_prefix('/') else {
        if let Err(e) = controller.send_message(line).await {
            report(e);
        }
        return Flow::Continue;
    };

    let (cmd, arg) = match command.split_once(' ') {
        Some((cmd, arg)) => (cmd, Some(arg.trim())),
        None => (command, None),
    };

    match cmd {
        "help" => print_help(),
        "users" => {
            if let Err(e) = controller.refresh_roster().await {
                report(e);
            }
        }
        "open" => match arg {
            Some(peer) if !peer.is_empty() => {
                if let Err(e) = controller.select_peer(peer).await {
                    report(e);
                }
            }
            _ => println!("Usage: /open <nick>"),
        },
        "logout" | "quit" | "exit" => return Flow::Quit,
        _ => println!("Unknown command: /{cmd}. Type /help for commands."),
    }

    Flow::Continue
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();
    init_logging(args.verbose);

    println!("Chatline");
    println!("========");

    let config = ClientConfig::new(&args.server)?;
    let nickname = match args.nickname {
        Some(nickname) => nickname,
        None => prompt("Nickname")?,
    };
    let full_name = match args.full_name {
        Some(full_name) => full_name,
        None => prompt("Real name")?,
    };

    let mut controller = ChatController::new(
        StompConnector::new(&config)?,
        HttpDirectory::new(config),
        TerminalSurface::new(io::stdout()),
    );

    if let Err(e) = controller.connect(&nickname, &full_name).await {
        report(e);
        return Ok(());
    }
    if controller.state() != ConnectionState::Connected {
        return Ok(());
    }
    println!("Type /help for commands");

    let mut lines = BufReader::new(tokio::io::stdin()).lines();

    loop {
        tokio::select! {
            line = lines.next_line() => {
                let Ok(Some(line)) = line else { break };
                if let Flow::Quit = handle_input(&line, &mut controller).await {
                    break;
                }
            }
            delivery = controller.next_delivery() => {
                match delivery {
                    Some(Ok(delivery)) => {
                        if let Err(e) = controller.on_message_received(&delivery).await {
                            tracing::warn!(error = %e, "Failed to handle delivery");
                        }
                    }
                    Some(Err(e)) => {
                        tracing::error!(error = %e, "Bus error");
                        controller.on_connection_lost();
                        break;
                    }
                    None => {
                        controller.on_connection_lost();
                        break;
                    }
                }
            }
            _ = tokio::signal::ctrl_c() => break,
        }
    }

    controller.logout().await;
    Ok(())
}
