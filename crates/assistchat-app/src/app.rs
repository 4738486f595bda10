//! Interactive loop wiring the session, the channel, and the hint timer.

use anyhow::{Context, Result};
use colored::Colorize;
use rustyline::error::ReadlineError;
use rustyline::DefaultEditor;
use std::sync::Arc;
use tokio::sync::{mpsc, watch, Mutex};
use tokio_util::sync::CancellationToken;

use assistchat_client::{
    channel_url, run_channel, run_hint_timer, ChannelConfig, ChannelEvent, ChatSession,
    HintConfig, HintEvent, HttpApi, IdentifierStore, TranscriptLogger,
};
use assistchat_types::ClientFrame;

use crate::cli::{Cli, Transport};
use crate::panel::TerminalPanel;

pub struct App {
    cli: Cli,
    session: Arc<Mutex<ChatSession<HttpApi>>>,
    visible_tx: watch::Sender<bool>,
    visible_rx: watch::Receiver<bool>,
    cancel: CancellationToken,
    outbound_tx: Option<mpsc::UnboundedSender<ClientFrame>>,
    channel_url_tx: Option<watch::Sender<String>>,
}

impl App {
    pub async fn new(cli: Cli) -> Result<Self> {
        let store = match &cli.store_path {
            Some(path) => IdentifierStore::new(path.clone()),
            None => IdentifierStore::default_location()?,
        };
        if cli.reset {
            store
                .clear()
                .context("failed to forget the stored conversation")?;
            println!("{}", "🗑️  Stored conversation forgotten.".yellow());
        }

        let api = HttpApi::new(&cli.base_url)?;
        let logger = if cli.no_log {
            None
        } else {
            match TranscriptLogger::new(&std::env::current_dir()?).await {
                Ok(logger) => Some(logger),
                Err(e) => {
                    eprintln!(
                        "{}",
                        format!("⚠️  Transcript log unavailable: {}", e).yellow()
                    );
                    None
                }
            }
        };

        let session = ChatSession::new(api, store, Box::new(TerminalPanel::new()))
            .with_logger(logger);
        let (visible_tx, visible_rx) = watch::channel(false);
        let cancel = CancellationToken::new();

        let app = Self {
            cli,
            session: Arc::new(Mutex::new(session)),
            visible_tx,
            visible_rx,
            cancel,
            outbound_tx: None,
            channel_url_tx: None,
        };
        if !app.cli.no_hints {
            app.start_hints();
        }
        Ok(app)
    }

    fn start_hints(&self) {
        let (hint_tx, mut hint_rx) = mpsc::unbounded_channel();
        tokio::spawn(run_hint_timer(
            HintConfig::default(),
            self.visible_rx.clone(),
            hint_tx,
            self.cancel.clone(),
        ));
        tokio::spawn(async move {
            while let Some(event) = hint_rx.recv().await {
                match event {
                    HintEvent::Show(text) => println!("\n💡 {}", text.yellow()),
                    HintEvent::Dismiss => println!("{}", "(hint faded)".bright_black()),
                }
            }
        });
    }

    /// Start the channel task and the consumer that feeds its events
    /// back into the session. Called once, on the first successful open;
    /// afterwards the task follows panel visibility on its own and picks
    /// up endpoint changes through the url watch.
    fn start_channel(&mut self, url: String) {
        let (outbound_tx, outbound_rx) = mpsc::unbounded_channel();
        let (events_tx, mut events_rx) = mpsc::unbounded_channel();
        let (url_tx, url_rx) = watch::channel(url);

        let visible_rx = self.visible_rx.clone();
        let cancel = self.cancel.clone();
        tokio::spawn(async move {
            if let Err(e) = run_channel(
                url_rx,
                ChannelConfig::default(),
                outbound_rx,
                events_tx,
                visible_rx,
                cancel,
            )
            .await
            {
                eprintln!("{}", format!("Channel task ended: {}", e).bright_black());
            }
        });

        let session = self.session.clone();
        tokio::spawn(async move {
            while let Some(event) = events_rx.recv().await {
                let mut session = session.lock().await;
                match event {
                    ChannelEvent::Opened => session.channel_opened(),
                    ChannelEvent::Closed => session.channel_closed(),
                    ChannelEvent::Frame(frame) => {
                        session.render_incoming(frame.into_message()).await
                    }
                }
            }
        });

        self.outbound_tx = Some(outbound_tx);
        self.channel_url_tx = Some(url_tx);
    }

    async fn open(&mut self) -> Result<()> {
        let mut session = self.session.lock().await;
        if session.state().panel_visible() {
            return Ok(());
        }
        match session.open().await {
            Ok(()) => {
                let conversation_id = session.conversation_id().unwrap_or("").to_string();
                drop(session);
                let _ = self.visible_tx.send(true);
                if self.cli.transport == Transport::Channel {
                    let url = channel_url(&self.cli.base_url, &conversation_id);
                    match &self.channel_url_tx {
                        // The identifier may have been re-created while
                        // the panel was closed; the next dial must use it.
                        Some(url_tx) => {
                            let _ = url_tx.send(url);
                        }
                        None => self.start_channel(url),
                    }
                }
                Ok(())
            }
            Err(e) => {
                eprintln!(
                    "{}",
                    format!("😔 Chat is temporarily unavailable: {}", e).red()
                );
                Ok(())
            }
        }
    }

    async fn close(&self) {
        self.session.lock().await.close();
        let _ = self.visible_tx.send(false);
        println!("{}", "Chat closed.".bright_black());
    }

    async fn send(&self, text: &str) -> Result<()> {
        let mut session = self.session.lock().await;
        if !session.state().panel_visible() {
            println!("{}", "Open the chat first with /open.".yellow());
            return Ok(());
        }
        match self.cli.transport {
            Transport::Request => session.send_message(text).await?,
            Transport::Channel => {
                if let Some(frame) = session.queue_outbound(text).await {
                    if let Some(tx) = &self.outbound_tx {
                        let _ = tx.send(frame);
                    }
                }
            }
        }
        Ok(())
    }

    pub async fn run_repl(mut self) -> Result<()> {
        println!("{}", "🛍️  Shop assistant chat".bold());
        println!(
            "{}",
            "Commands: /open /close /help /quit. Anything else is sent to the assistant."
                .bright_black()
        );

        if self.cli.open {
            self.open().await?;
        }

        let mut editor = DefaultEditor::new()?;
        loop {
            let line = tokio::task::block_in_place(|| editor.readline("〉 "));
            match line {
                Ok(line) => {
                    let input = line.trim().to_string();
                    if input.is_empty() {
                        continue;
                    }
                    let _ = editor.add_history_entry(&input);
                    match input.as_str() {
                        "/open" => self.open().await?,
                        "/close" => self.close().await,
                        "/help" => print_help(),
                        "/quit" | "/exit" => break,
                        other if other.starts_with('/') => {
                            println!(
                                "{}",
                                format!("Unknown command: {}. Try /help.", other).yellow()
                            );
                        }
                        text => self.send(text).await?,
                    }
                }
                Err(ReadlineError::Interrupted) | Err(ReadlineError::Eof) => break,
                Err(e) => return Err(e.into()),
            }
        }

        self.cancel.cancel();
        let _ = self.visible_tx.send(false);
        self.session.lock().await.shutdown().await;
        println!("{}", "👋 Bye!".bold());
        Ok(())
    }
}

fn print_help() {
    println!("  /open   show the chat panel (loads the conversation history)");
    println!("  /close  hide the chat panel");
    println!("  /help   this text");
    println!("  /quit   leave");
}
