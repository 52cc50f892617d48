//! Interactive terminal chat with the AI tutor.
//!
//! # Usage
//!
//! ```bash
//! # Talk to a completion server on the default endpoint
//! tutor-chat
//!
//! # Point at another server and keep chats elsewhere
//! tutor-chat --endpoint http://tutor.local:3000/api/chat --data-dir ./chats
//!
//! # Show replies at once
//! tutor-chat --reveal-delay-ms 0
//! ```
//!
//! # Commands
//!
//! - `/new` - Start a new chat
//! - `/sessions` - List chats
//! - `/switch <n|id>` - Switch chats
//! - `/rename <title>` - Rename the active chat
//! - `/history` - Show the active chat again
//! - `/export <file>` - Save the active chat as HTML
//! - `/quit` - Exit the application

use arrrg::CommandLine;
use rustyline::DefaultEditor;
use rustyline::error::ReadlineError;
use tokio::sync::watch;
use tracing_subscriber::EnvFilter;

use tutorchat::chat::{
    ChatArgs, ChatCommand, ChatConfig, PlainTextRenderer, Renderer, export_html, help_text,
    parse_command, resolve_session,
};
use tutorchat::render::RenderPipeline;
use tutorchat::{
    CompletionClient, DirStore, IgnoreReason, SessionStore, SubmitOutcome, ViewController, is_error_message,
};

type Controller = ViewController<DirStore, CompletionClient>;

/// Main entry point for the tutor-chat application.
#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    init_logging();
    let (args, _) = ChatArgs::from_command_line_relaxed("tutor-chat [OPTIONS]");
    let config = ChatConfig::from(args);

    let backend = DirStore::open(&config.data_dir)?;
    let store = SessionStore::open(backend);
    let client = CompletionClient::with_options(&config.endpoint, Some(config.timeout), None)?;
    let mut ctl = ViewController::new(store, client);
    let mut pipeline = RenderPipeline::with_delay(config.reveal_delay);
    let mut renderer = PlainTextRenderer::with_color(config.use_color);
    let mut rl = DefaultEditor::new()?;

    // Every Ctrl+C bumps the counter; a running reveal skips to the end.
    let (skip_tx, mut skip_rx) = watch::channel(0u64);
    ctrlc::set_handler(move || {
        skip_tx.send_modify(|n| *n = n.wrapping_add(1));
    })?;

    println!("Tutor Chat (endpoint: {})", config.endpoint);
    println!("Chats are saved in {}", config.data_dir.display());
    println!("Type /help for commands, /quit to exit\n");
    show_active(&ctl, &mut pipeline, &mut renderer);

    loop {
        let readline = rl.readline("You: ");

        match readline {
            Ok(line) => {
                if line.trim().is_empty() {
                    continue;
                }
                let _ = rl.add_history_entry(line.as_str());

                if let Some(cmd) = parse_command(&line) {
                    match cmd {
                        ChatCommand::Quit => {
                            println!("Goodbye!");
                            break;
                        }
                        ChatCommand::Help => {
                            for line in help_text().lines() {
                                println!("    {line}");
                            }
                        }
                        ChatCommand::New => {
                            ctl.new_session();
                            pipeline.bind_session(ctl.store().active_id());
                            if let Some(session) = ctl.active_session() {
                                renderer.print_info(&format!("Started {}.", session.title));
                            }
                        }
                        ChatCommand::Sessions => {
                            let active = ctl.store().active_id().map(|id| id.as_str());
                            renderer.print_sessions(ctl.store().sessions(), active);
                        }
                        ChatCommand::Switch(target) => {
                            match resolve_session(ctl.store().sessions(), &target) {
                                Some(id) => {
                                    ctl.select_session(&id);
                                    show_active(&ctl, &mut pipeline, &mut renderer);
                                }
                                None => renderer.print_error(&format!("No chat matches {target}")),
                            }
                        }
                        ChatCommand::Rename(title) => {
                            let Some(id) = ctl.store().active_id().cloned() else {
                                renderer.print_error("No active chat; /new starts one");
                                continue;
                            };
                            match ctl.rename_session(&id, &title) {
                                Ok(()) => renderer.print_info(&format!("Renamed to {}", title.trim())),
                                Err(err) => renderer.print_error(&err.to_string()),
                            }
                        }
                        ChatCommand::History => {
                            show_active(&ctl, &mut pipeline, &mut renderer);
                        }
                        ChatCommand::Export(path) => match ctl.active_session() {
                            Some(session) => match std::fs::write(&path, export_html(session)) {
                                Ok(()) => renderer.print_info(&format!("Exported to {path}")),
                                Err(err) => {
                                    renderer.print_error(&format!("Failed to export: {err}"))
                                }
                            },
                            None => renderer.print_error("No active chat to export"),
                        },
                        ChatCommand::Invalid(message) => {
                            renderer.print_error(&message);
                        }
                    }
                    continue;
                }

                renderer.show_loading();
                match ctl.submit(&line).await {
                    SubmitOutcome::Ignored(reason) => {
                        renderer.clear_loading();
                        match reason {
                            IgnoreReason::NoActiveSession => {
                                renderer.print_info("No active chat. Type /new to start one.")
                            }
                            _ => renderer.print_info(&format!("Not sent: {reason}")),
                        }
                    }
                    SubmitOutcome::Succeeded | SubmitOutcome::Failed(_) => {
                        reveal_reply(&ctl, &mut pipeline, &mut renderer, &mut skip_rx).await;
                    }
                }
            }
            Err(ReadlineError::Interrupted) => {
                // Ctrl+C at prompt - soft interrupt
                println!();
                continue;
            }
            Err(ReadlineError::Eof) => {
                // Ctrl+D - exit
                println!("\nGoodbye!");
                break;
            }
            Err(err) => {
                renderer.print_error(&format!("Input error: {err}"));
                break;
            }
        }
    }

    Ok(())
}

fn init_logging() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .init();
}

/// Reprint the active chat in full and remount its messages.
fn show_active(ctl: &Controller, pipeline: &mut RenderPipeline, renderer: &mut impl Renderer) {
    pipeline.clear();
    pipeline.bind_session(ctl.store().active_id());
    let Some(session) = ctl.active_session() else {
        renderer.print_info("No active chat. Type /new to start one.");
        return;
    };
    renderer.print_info(&format!("--- {} ---", session.title));
    for message in &session.messages {
        renderer.print_message(message);
    }
    pipeline.sync(&ctl.messages());
}

/// Print the newest reply as it is revealed; Ctrl+C shows the rest at once.
async fn reveal_reply(
    ctl: &Controller,
    pipeline: &mut RenderPipeline,
    renderer: &mut impl Renderer,
    skip: &mut watch::Receiver<u64>,
) {
    let views = ctl.messages();
    pipeline.bind_session(ctl.store().active_id());
    pipeline.sync(&views);
    let Some(reply) = views.iter().rev().find(|v| v.is_new).map(|v| v.message) else {
        renderer.clear_loading();
        return;
    };
    let Some(component) = pipeline.components().last() else {
        return;
    };
    let mut frames = component.reveal().subscribe();

    skip.borrow_and_update();
    renderer.start_reply(is_error_message(reply));
    let mut shown = 0;
    loop {
        let frame = frames.borrow_and_update().clone();
        let delta: String = frame.text.chars().skip(shown).collect();
        if !delta.is_empty() {
            renderer.print_text(&delta);
        }
        shown = frame.revealed;
        if frame.is_complete() {
            break;
        }
        tokio::select! {
            changed = frames.changed() => {
                if changed.is_err() {
                    break;
                }
            }
            Ok(()) = skip.changed() => {
                tracing::debug!("skipping reveal");
                pipeline.skip_reveals();
            }
        }
    }
    renderer.finish_reply();
}
