use std::io::IsTerminal;
use std::process::ExitCode;

use clap::{Parser, Subcommand};
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::sync::mpsc;
use tracing_subscriber::EnvFilter;

use parlance::session::COMMAND_CHANNEL_CAPACITY;
use parlance::{
    ChatClient, CommandSynthesizer, Config, LineFeed, LineRecognizer, NullSynthesizer,
    PersonaCatalog, Role, Session, SessionCommand, SessionSnapshot, SessionState,
    SpeechSynthesizer, Transcript,
};

/// Parlance - Voice-driven conversation sessions for local LLMs
#[derive(Parser)]
#[command(name = "parlance", version, about)]
struct Cli {
    /// Persona to select at startup (e.g., "interviewer")
    #[arg(short, long, env = "PARLANCE_PERSONA")]
    persona: Option<String>,

    /// Chat-completion endpoint URL
    #[arg(long, env = "PARLANCE_CHAT_URL")]
    chat_url: Option<String>,

    /// Model sent with every completion request
    #[arg(short, long, env = "PARLANCE_MODEL")]
    model: Option<String>,

    /// Increase verbosity (-v, -vv, -vvv)
    #[arg(short, long, action = clap::ArgAction::Count)]
    verbose: u8,

    /// Print replies without spoken playback
    #[arg(long, env = "PARLANCE_MUTE")]
    mute: bool,

    #[command(subcommand)]
    command: Option<Command>,
}

#[derive(Subcommand)]
enum Command {
    /// List personas in the active catalog
    Personas,
    /// Speak a line through the system TTS command
    Say {
        /// Text to speak
        #[arg(default_value = "Hello! This is a test of the text to speech system.")]
        text: String,
    },
    /// Send one prompt through the active persona and print the reply
    Ask {
        /// Prompt text
        text: String,
    },
}

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();

    // Set up logging based on verbosity
    let filter = match cli.verbose {
        0 => "warn,parlance=info",
        1 => "info,parlance=debug",
        2 => "debug",
        _ => "trace",
    };

    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::new(filter))
        .init();

    match run(cli).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            tracing::error!("fatal: {e}");
            ExitCode::FAILURE
        }
    }
}

async fn run(cli: Cli) -> anyhow::Result<()> {
    let mut config = Config::load();
    if let Some(url) = cli.chat_url {
        config.chat_url = url;
    }
    if let Some(model) = cli.model {
        config.model = model;
    }
    let catalog = config.catalog()?;

    // Handle subcommands
    if let Some(cmd) = cli.command {
        return match cmd {
            Command::Personas => {
                cmd_personas(&catalog);
                Ok(())
            }
            Command::Say { text } => cmd_say(&config, &text).await,
            Command::Ask { text } => {
                cmd_ask(&config, &catalog, cli.persona.as_deref(), &text).await
            }
        };
    }

    let persona = match cli.persona {
        Some(value) => {
            if catalog.find(&value).is_none() {
                anyhow::bail!("unknown persona: {value} (run `parlance personas`)");
            }
            Some(value)
        }
        None => pick_persona(&catalog)?,
    };

    tracing::info!(
        chat_url = %config.chat_url,
        model = %config.model,
        mute = cli.mute,
        "starting parlance session"
    );

    let client = ChatClient::from_config(&config)?;
    let (recognizer, feed) = LineRecognizer::new();

    if cli.mute {
        return run_console(&config, catalog, persona, client, recognizer, &feed, NullSynthesizer)
            .await;
    }

    match CommandSynthesizer::discover() {
        Ok(synthesizer) => {
            run_console(&config, catalog, persona, client, recognizer, &feed, synthesizer).await
        }
        Err(e) => {
            tracing::warn!("{e}, continuing without playback");
            run_console(&config, catalog, persona, client, recognizer, &feed, NullSynthesizer).await
        }
    }
}

/// Pick a persona interactively when running on a terminal
fn pick_persona(catalog: &PersonaCatalog) -> anyhow::Result<Option<String>> {
    if !std::io::stdin().is_terminal() {
        return Ok(None);
    }

    let labels: Vec<&str> = catalog.personas().iter().map(|p| p.label.as_str()).collect();
    let picked = dialoguer::Select::new()
        .with_prompt("persona")
        .items(&labels)
        .default(0)
        .interact_opt()?;

    Ok(picked.map(|index| catalog.personas()[index].value.clone()))
}

/// Run the interactive console session until `/quit` or end of input
async fn run_console<S: SpeechSynthesizer + 'static>(
    config: &Config,
    catalog: PersonaCatalog,
    persona: Option<String>,
    client: ChatClient,
    recognizer: LineRecognizer,
    feed: &LineFeed,
    synthesizer: S,
) -> anyhow::Result<()> {
    let mut session = Session::new(config, catalog, recognizer, synthesizer, client);
    if let Some(value) = persona {
        session.select_persona(&value);
    }

    let mut snapshots = session.subscribe();
    let (commands, command_rx) = mpsc::channel(COMMAND_CHANNEL_CAPACITY);
    let session_task = tokio::spawn(async move {
        session.run(command_rx).await;
    });

    print_help();
    let mut previous = SessionSnapshot::default();
    let current = snapshots.borrow_and_update().clone();
    render(&current, &previous);
    previous = current;

    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    loop {
        tokio::select! {
            line = lines.next_line() => match line {
                Ok(Some(line)) => {
                    if !handle_line(line.trim(), &commands, feed, &previous).await? {
                        break;
                    }
                }
                Ok(None) | Err(_) => {
                    let _ = commands.send(SessionCommand::Shutdown).await;
                    break;
                }
            },
            changed = snapshots.changed() => {
                if changed.is_err() {
                    break;
                }
                let current = snapshots.borrow_and_update().clone();
                render(&current, &previous);
                previous = current;
            }
        }
    }

    session_task.await?;
    Ok(())
}

/// Dispatch one console line; returns `false` when the session should end
async fn handle_line(
    line: &str,
    commands: &mpsc::Sender<SessionCommand>,
    feed: &LineFeed,
    latest: &SessionSnapshot,
) -> anyhow::Result<bool> {
    if line.is_empty() {
        return Ok(true);
    }

    if !line.starts_with('/') {
        if latest.is_recording {
            feed.send(line.to_string()).await?;
        } else {
            println!("(not listening - /start first, /help for commands)");
        }
        return Ok(true);
    }

    let (command, rest) = line.split_once(' ').map_or((line, ""), |(c, r)| (c, r.trim()));
    match command {
        "/start" => commands.send(SessionCommand::StartCapture).await?,
        "/stop" => commands.send(SessionCommand::StopCapture).await?,
        "/persona" if !rest.is_empty() => {
            commands.send(SessionCommand::SelectPersona(rest.to_string())).await?;
        }
        "/persona" => println!("usage: /persona NAME"),
        "/system" => commands.send(SessionCommand::SetSystemText(rest.to_string())).await?,
        "/reset" => commands.send(SessionCommand::Reset).await?,
        "/status" => println!("{}", serde_json::to_string_pretty(latest)?),
        "/help" => print_help(),
        "/quit" | "/exit" => {
            commands.send(SessionCommand::Shutdown).await?;
            return Ok(false);
        }
        other => println!("unknown command: {other} (/help)"),
    }
    Ok(true)
}

/// Print what changed between two snapshots
fn render(snapshot: &SessionSnapshot, previous: &SessionSnapshot) {
    if snapshot.selected_persona != previous.selected_persona {
        match &snapshot.selected_persona {
            Some(value) => println!("(persona: {value})"),
            None => println!("(custom system text)"),
        }
    }

    if snapshot.turns.len() < previous.turns.len() {
        println!("(conversation reset)");
    }

    if snapshot.state != previous.state {
        match snapshot.state {
            SessionState::Listening => println!("(listening - type lines, /stop to send)"),
            SessionState::AwaitingReply => println!("(waiting for the model)"),
            SessionState::Speaking | SessionState::Idle => {}
        }
    }

    if snapshot.live_buffer != previous.live_buffer && !snapshot.live_buffer.is_empty() {
        println!("  ~ {}", snapshot.live_buffer);
    }

    for turn in snapshot.turns.iter().skip(previous.turns.len()) {
        match turn.role {
            Role::User => println!("you: {}", turn.content),
            Role::Assistant => println!("assistant: {}", turn.content),
            Role::System => {}
        }
    }

    if snapshot.last_error != previous.last_error
        && let Some(error) = &snapshot.last_error
    {
        println!("error: {error}");
    }
}

fn print_help() {
    println!("commands:");
    println!("  /start          begin a capture session (typed lines become speech)");
    println!("  /stop           end capture and send the utterance");
    println!("  /persona NAME   switch persona (see `parlance personas`)");
    println!("  /system TEXT    replace the system prompt with custom text");
    println!("  /reset          clear the conversation");
    println!("  /status         show session state");
    println!("  /quit           exit");
}

/// List personas in the active catalog
fn cmd_personas(catalog: &PersonaCatalog) {
    let default = catalog.default_persona().value.clone();
    for persona in catalog.personas() {
        let marker = if persona.value == default { "*" } else { " " };
        println!("{marker} {:<16} {}", persona.value, persona.label);
    }
}

/// Speak a line through the system TTS command
async fn cmd_say(config: &Config, text: &str) -> anyhow::Result<()> {
    let mut synthesizer = CommandSynthesizer::discover()?;
    println!("Speaking \"{text}\"...");
    synthesizer.speak(text, &config.locale).await?;
    Ok(())
}

/// Send one prompt and print the reply
async fn cmd_ask(
    config: &Config,
    catalog: &PersonaCatalog,
    persona: Option<&str>,
    text: &str,
) -> anyhow::Result<()> {
    let persona = match persona {
        Some(value) => catalog
            .find(value)
            .ok_or_else(|| parlance::Error::PersonaNotFound(value.to_string()))?,
        None => catalog.default_persona(),
    };

    let client = ChatClient::from_config(config)?;
    let mut transcript = Transcript::with_system(&persona.content);
    transcript.append_user(text);

    let reply = client.complete(transcript.turns()).await?;
    println!("{}", reply.content);
    Ok(())
}
