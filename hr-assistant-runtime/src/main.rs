use std::sync::Arc;
use std::{io, io::Write};

use hr_assistant_core::error::{Error, Result};
use hr_assistant_core::{
    AssistantConfig, HTTPLlmService, Secret, SendOutcome, SessionUser, StaticSession,
};
use hr_assistant_runtime::ChatSession;
use hr_assistant_runtime::ops::{ChatOp, ChatReply};
use tracing::info;
use tracing_subscriber::EnvFilter;

const HELP: &str = "\
Commands:
  /new [provider] [model]   start a conversation
  /list                     list conversations
  /switch <id>              switch conversation
  /rename <id> <title>      rename a conversation
  /delete <id>              delete a conversation
  /providers                list providers
  /provider <id>            select the current provider
  /key <provider> <key>     store an API key
  /unkey <provider>         remove an API key
  /clear                    clear the last error
  /help                     show this help
  /quit                     exit
Anything else is sent to the current conversation.";

/// What one line of input asks for
enum Command {
    Op(ChatOp),
    Send(String),
    Help,
    Quit,
    Usage(&'static str),
}

fn parse_command(line: &str) -> Command {
    let Some(rest) = line.strip_prefix('/') else {
        return Command::Send(line.to_string());
    };
    let mut parts = rest.splitn(3, ' ');
    let command = parts.next().unwrap_or_default();
    let first = parts.next().map(str::to_string);
    let second = parts.next().map(str::to_string);

    match (command, first, second) {
        ("new", provider_id, model) => Command::Op(ChatOp::CreateConversation { provider_id, model }),
        ("list", ..) => Command::Op(ChatOp::ListConversations),
        ("switch", Some(conversation_id), _) => {
            Command::Op(ChatOp::SwitchConversation { conversation_id })
        }
        ("rename", Some(conversation_id), Some(title)) => Command::Op(ChatOp::RenameConversation {
            conversation_id,
            title,
        }),
        ("delete", Some(conversation_id), _) => {
            Command::Op(ChatOp::DeleteConversation { conversation_id })
        }
        ("providers", ..) => Command::Op(ChatOp::ListProviders),
        ("provider", Some(provider_id), _) => Command::Op(ChatOp::SetProvider { provider_id }),
        ("key", Some(provider_id), Some(key)) => Command::Op(ChatOp::SetApiKey {
            provider_id,
            api_key: Secret(key.trim().to_string()),
        }),
        ("unkey", Some(provider_id), _) => Command::Op(ChatOp::RemoveApiKey { provider_id }),
        ("clear", ..) => Command::Op(ChatOp::ClearError),
        ("help", ..) => Command::Help,
        ("quit" | "exit", ..) => Command::Quit,
        ("switch" | "delete" | "unkey" | "provider", ..) => Command::Usage("missing id"),
        ("rename", ..) => Command::Usage("usage: /rename <id> <title>"),
        ("key", ..) => Command::Usage("usage: /key <provider> <key>"),
        _ => Command::Usage("unknown command, try /help"),
    }
}

fn print_reply(reply: &ChatReply) {
    match reply {
        ChatReply::Created(id) => println!("Started conversation {id}"),
        ChatReply::Done => println!("ok"),
        ChatReply::Sent(SendOutcome::Replied(message)) => {
            println!("Assistant: {}", message.content);
        }
        ChatReply::Sent(SendOutcome::Failed(reason)) => {
            println!("! Send failed: {reason}");
        }
        ChatReply::Conversations(list) if list.is_empty() => println!("No conversations yet."),
        ChatReply::Conversations(list) => {
            for c in list {
                let marker = if c.is_current { '*' } else { ' ' };
                let failed = if c.failed { " (failed)" } else { "" };
                println!("{marker} {}  {}  [{} messages]{failed}", c.id, c.title, c.message_count);
            }
        }
        ChatReply::Providers(list) => {
            for p in list {
                let marker = if p.is_current { '*' } else { ' ' };
                let key = match (p.requires_api_key, p.has_api_key) {
                    (false, _) => "no key needed",
                    (true, true) => "key stored",
                    (true, false) => "no key",
                };
                println!(
                    "{marker} {}  {}  ({key}; models: {})",
                    p.id,
                    p.name,
                    p.models.join(", ")
                );
            }
        }
        ChatReply::Snapshot(state) => {
            println!(
                "{} conversations, current: {}",
                state.conversations().len(),
                state.current_conversation_id().unwrap_or("none")
            );
        }
    }
}

/// Sends to the current conversation, starting one first if needed
async fn send(session: &ChatSession<HTTPLlmService>, content: String) -> Result<ChatReply> {
    let current = match session.run(ChatOp::Snapshot).await? {
        ChatReply::Snapshot(state) => state.current_conversation_id().map(str::to_string),
        _ => None,
    };
    let conversation_id = match current {
        Some(id) => id,
        None => match session
            .run(ChatOp::CreateConversation {
                provider_id: None,
                model: None,
            })
            .await?
        {
            ChatReply::Created(id) => id,
            other => return Err(Error::Other(format!("unexpected reply {other:?}"))),
        },
    };
    session
        .run(ChatOp::SendMessage {
            conversation_id,
            content,
        })
        .await
}

/// Line-oriented chat over the runtime pipeline
async fn run_chat() -> Result<()> {
    let config = AssistantConfig::from_env();
    let user_id = config.user.clone().unwrap_or_else(|| "local".to_string());
    let user = SessionUser {
        email: format!("{user_id}@localhost"),
        id: user_id,
        name: None,
    };

    let service = HTTPLlmService::new(config.request_timeout)?;
    let session = ChatSession::start(
        &config,
        Arc::new(StaticSession::signed_in(user)),
        service,
    )?;

    println!("=== HR Assistant ===");
    println!("Signed in as {}. Type /help for commands.", session.user().id);
    println!();

    let stdin = io::stdin();
    loop {
        print!("> ");
        io::stdout().flush()?;

        let mut input = String::new();
        if stdin.read_line(&mut input)? == 0 {
            break;
        }
        let input = input.trim();
        if input.is_empty() {
            continue;
        }

        let result = match parse_command(input) {
            Command::Quit => break,
            Command::Help => {
                println!("{HELP}");
                continue;
            }
            Command::Usage(text) => {
                println!("{text}");
                continue;
            }
            Command::Op(op) => session.run(op).await,
            Command::Send(content) => send(&session, content).await,
        };

        match result {
            Ok(reply) => print_reply(&reply),
            Err(e) if e.needs_provider_selection() => {
                println!("! {e}. Pick a provider with /provider and store a key with /key.");
            }
            Err(e) => println!("! {e}"),
        }
        println!();
    }

    println!("Goodbye!");
    Ok(())
}

#[tokio::main]
pub async fn main() {
    let _ = dotenvy::dotenv();

    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new("hr_assistant_core=info,hr_assistant_runtime=info"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(io::stderr)
        .init();

    info!("Starting HR Assistant");

    if let Err(e) = run_chat().await {
        eprintln!("Error: {}", e);
    }
}
