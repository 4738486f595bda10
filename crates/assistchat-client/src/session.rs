//! The chat session: identifier lifecycle, transcript, and send paths.
//!
//! All mutable state lives on [`ChatSession`]; the input loop, the
//! channel reader, and the hint timer all go through it. Rendering is
//! behind [`PanelView`] so tests can record what the panel would show.

use anyhow::Result;

use crate::api::{ApiError, AssistantApi};
use crate::logger::TranscriptLogger;
use crate::store::IdentifierStore;
use assistchat_types::{ClientFrame, Message, Role, SessionState, APOLOGY_TEXT, WELCOME_TEXT};

/// The scrollable message view. `render` appends and auto-scrolls; the
/// placeholder is the transient "Thinking…" indicator of the request
/// transport; `notice` is a dim status line outside the transcript.
pub trait PanelView: Send {
    fn clear(&mut self);
    fn render(&mut self, message: &Message);
    fn show_placeholder(&mut self);
    fn clear_placeholder(&mut self);
    fn set_send_enabled(&mut self, enabled: bool);
    fn notice(&mut self, text: &str);
}

pub struct ChatSession<A: AssistantApi> {
    api: A,
    store: IdentifierStore,
    view: Box<dyn PanelView>,
    state: SessionState,
    conversation_id: Option<String>,
    transcript: Vec<Message>,
    logger: Option<TranscriptLogger>,
}

impl<A: AssistantApi> ChatSession<A> {
    pub fn new(api: A, store: IdentifierStore, view: Box<dyn PanelView>) -> Self {
        Self {
            api,
            store,
            view,
            state: SessionState::Closed,
            conversation_id: None,
            transcript: Vec::new(),
            logger: None,
        }
    }

    pub fn with_logger(mut self, logger: Option<TranscriptLogger>) -> Self {
        self.logger = logger;
        self
    }

    pub fn state(&self) -> SessionState {
        self.state
    }

    pub fn conversation_id(&self) -> Option<&str> {
        self.conversation_id.as_deref()
    }

    pub fn transcript(&self) -> &[Message] {
        &self.transcript
    }

    /// Show the panel: reuse or create the conversation identifier, then
    /// load its history into a cleared view. A stale identifier (server
    /// says not found) is discarded and re-created once.
    pub async fn open(&mut self) -> Result<()> {
        if self.state.panel_visible() {
            return Ok(());
        }
        match self.try_open().await {
            Ok(()) => Ok(()),
            Err(e) => {
                self.state = SessionState::Closed;
                Err(e)
            }
        }
    }

    async fn try_open(&mut self) -> Result<()> {
        self.conversation_id = self.store.load()?;
        if self.conversation_id.is_none() {
            self.state = SessionState::AwaitingIdentifier;
            self.create_identifier().await?;
        }

        if let Err(e) = self.load_history().await {
            match e {
                ApiError::NotFound => {
                    // Stale identifier: forget it and start a fresh
                    // conversation, one retry only.
                    self.store.clear()?;
                    self.conversation_id = None;
                    self.state = SessionState::AwaitingIdentifier;
                    self.create_identifier().await?;
                    self.load_history().await?;
                }
                other => return Err(other.into()),
            }
        }

        self.state = SessionState::HistoryLoaded;
        if self.transcript.is_empty() {
            self.view.notice(WELCOME_TEXT);
        }
        Ok(())
    }

    async fn create_identifier(&mut self) -> Result<()> {
        let id = self.api.create_conversation().await?;
        self.store.save(&id)?;
        self.conversation_id = Some(id);
        Ok(())
    }

    async fn load_history(&mut self) -> Result<(), ApiError> {
        let Some(id) = self.conversation_id.clone() else {
            return Ok(());
        };
        let messages = self.api.fetch_history(&id).await?;
        self.view.clear();
        self.transcript.clear();
        for message in messages {
            self.view.render(&message);
            self.transcript.push(message);
        }
        Ok(())
    }

    /// Hide the panel. The channel task watches panel visibility and
    /// closes its connection cleanly on its own.
    pub fn close(&mut self) {
        self.state = SessionState::Closed;
    }

    /// Request/response transport: one outbound call per message, with an
    /// optimistic render first and a placeholder until the reply lands.
    /// Empty input and a missing identifier are silent no-ops. Failures
    /// append the fixed apology and are never retried.
    pub async fn send_message(&mut self, text: &str) -> Result<()> {
        let text = text.trim();
        if text.is_empty() || !self.state.allows_send() {
            return Ok(());
        }
        let Some(id) = self.conversation_id.clone() else {
            return Ok(());
        };

        self.append(Message::user(text)).await;
        self.view.show_placeholder();

        match self.api.send_message(&id, text).await {
            Ok(reply) => {
                self.view.clear_placeholder();
                self.append(Message::assistant(reply)).await;
            }
            Err(e) => {
                eprintln!("Send failed: {}", e);
                self.view.clear_placeholder();
                self.append(Message::assistant(APOLOGY_TEXT)).await;
            }
        }
        Ok(())
    }

    /// Channel transport: validate, render optimistically, and hand the
    /// frame back for the channel task to push. Returns `None` when the
    /// message must not be sent (empty, no identifier, channel not open).
    pub async fn queue_outbound(&mut self, text: &str) -> Option<ClientFrame> {
        let text = text.trim();
        if text.is_empty() || self.conversation_id.is_none() {
            return None;
        }
        if self.state != SessionState::Connected {
            self.view.notice("Not connected; message not sent.");
            return None;
        }

        self.append(Message::user(text)).await;
        Some(ClientFrame {
            message: text.to_string(),
        })
    }

    /// Render a message pushed by the server. The server echoes the
    /// client's own user messages back to the conversation group; an echo
    /// matching the optimistic render is dropped. System frames become
    /// status notices, not transcript entries.
    pub async fn render_incoming(&mut self, message: Message) {
        if !self.state.panel_visible() {
            return;
        }
        match message.role {
            Role::System => self.view.notice(&message.content),
            Role::User => {
                if self.transcript.last() == Some(&message) {
                    return;
                }
                self.append(message).await;
            }
            Role::Assistant => self.append(message).await,
        }
    }

    pub fn channel_opened(&mut self) {
        if !self.state.panel_visible() {
            return;
        }
        self.state = SessionState::Connected;
        self.view.set_send_enabled(true);
        self.view.notice("Connected.");
    }

    pub fn channel_closed(&mut self) {
        if !self.state.panel_visible() {
            return;
        }
        self.state = SessionState::Disconnected;
        self.view.set_send_enabled(false);
        self.view.notice("Connection lost. Reconnecting…");
    }

    pub async fn shutdown(&mut self) {
        if let Some(logger) = &mut self.logger {
            logger.shutdown().await;
        }
    }

    async fn append(&mut self, message: Message) {
        if let Some(logger) = &mut self.logger {
            logger.log(&message).await;
        }
        self.view.render(&message);
        self.transcript.push(message);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use std::collections::VecDeque;
    use std::sync::{Arc, Mutex};
    use tempfile::TempDir;

    #[derive(Debug, Clone, PartialEq, Eq)]
    enum ApiCall {
        Create,
        History(String),
        Send(String, String),
    }

    #[derive(Default)]
    struct FakeApi {
        calls: Arc<Mutex<Vec<ApiCall>>>,
        create_ids: Mutex<VecDeque<String>>,
        history: Mutex<VecDeque<Result<Vec<Message>, ApiError>>>,
        replies: Mutex<VecDeque<Result<String, ApiError>>>,
    }

    impl FakeApi {
        fn script_create(&self, id: &str) {
            self.create_ids.lock().unwrap().push_back(id.to_string());
        }

        fn script_history(&self, result: Result<Vec<Message>, ApiError>) {
            self.history.lock().unwrap().push_back(result);
        }

        fn script_reply(&self, result: Result<String, ApiError>) {
            self.replies.lock().unwrap().push_back(result);
        }
    }

    #[async_trait]
    impl AssistantApi for FakeApi {
        async fn create_conversation(&self) -> Result<String, ApiError> {
            self.calls.lock().unwrap().push(ApiCall::Create);
            self.create_ids
                .lock()
                .unwrap()
                .pop_front()
                .ok_or_else(|| ApiError::Rejected("no scripted identifier".to_string()))
        }

        async fn fetch_history(&self, conversation_id: &str) -> Result<Vec<Message>, ApiError> {
            self.calls
                .lock()
                .unwrap()
                .push(ApiCall::History(conversation_id.to_string()));
            self.history
                .lock()
                .unwrap()
                .pop_front()
                .unwrap_or_else(|| Ok(Vec::new()))
        }

        async fn send_message(
            &self,
            conversation_id: &str,
            text: &str,
        ) -> Result<String, ApiError> {
            self.calls.lock().unwrap().push(ApiCall::Send(
                conversation_id.to_string(),
                text.to_string(),
            ));
            self.replies
                .lock()
                .unwrap()
                .pop_front()
                .unwrap_or_else(|| Ok(format!("echo: {}", text)))
        }
    }

    #[derive(Debug, Clone, PartialEq, Eq)]
    enum ViewEvent {
        Clear,
        Render(Role, String),
        Placeholder,
        PlaceholderCleared,
        SendEnabled(bool),
        Notice(String),
    }

    struct RecordingView {
        events: Arc<Mutex<Vec<ViewEvent>>>,
    }

    impl PanelView for RecordingView {
        fn clear(&mut self) {
            self.events.lock().unwrap().push(ViewEvent::Clear);
        }
        fn render(&mut self, message: &Message) {
            self.events
                .lock()
                .unwrap()
                .push(ViewEvent::Render(message.role, message.content.clone()));
        }
        fn show_placeholder(&mut self) {
            self.events.lock().unwrap().push(ViewEvent::Placeholder);
        }
        fn clear_placeholder(&mut self) {
            self.events
                .lock()
                .unwrap()
                .push(ViewEvent::PlaceholderCleared);
        }
        fn set_send_enabled(&mut self, enabled: bool) {
            self.events
                .lock()
                .unwrap()
                .push(ViewEvent::SendEnabled(enabled));
        }
        fn notice(&mut self, text: &str) {
            self.events
                .lock()
                .unwrap()
                .push(ViewEvent::Notice(text.to_string()));
        }
    }

    struct Fixture {
        session: ChatSession<Arc<FakeApi>>,
        api: Arc<FakeApi>,
        events: Arc<Mutex<Vec<ViewEvent>>>,
        store_path: std::path::PathBuf,
        _dir: TempDir,
    }

    #[async_trait]
    impl AssistantApi for Arc<FakeApi> {
        async fn create_conversation(&self) -> Result<String, ApiError> {
            self.as_ref().create_conversation().await
        }
        async fn fetch_history(&self, conversation_id: &str) -> Result<Vec<Message>, ApiError> {
            self.as_ref().fetch_history(conversation_id).await
        }
        async fn send_message(
            &self,
            conversation_id: &str,
            text: &str,
        ) -> Result<String, ApiError> {
            self.as_ref().send_message(conversation_id, text).await
        }
    }

    fn fixture() -> Fixture {
        let dir = TempDir::new().unwrap();
        let store_path = dir.path().join("conversation_id");
        let api = Arc::new(FakeApi::default());
        let events = Arc::new(Mutex::new(Vec::new()));
        let view = RecordingView {
            events: events.clone(),
        };
        let session = ChatSession::new(
            api.clone(),
            IdentifierStore::new(store_path.clone()),
            Box::new(view),
        );
        Fixture {
            session,
            api,
            events,
            store_path,
            _dir: dir,
        }
    }

    fn calls(f: &Fixture) -> Vec<ApiCall> {
        f.api.calls.lock().unwrap().clone()
    }

    fn events(f: &Fixture) -> Vec<ViewEvent> {
        f.events.lock().unwrap().clone()
    }

    fn stored_id(f: &Fixture) -> Option<String> {
        IdentifierStore::new(f.store_path.clone()).load().unwrap()
    }

    #[tokio::test]
    async fn test_open_without_identifier_creates_exactly_once_before_history() {
        let mut f = fixture();
        f.api.script_create("abc");

        f.session.open().await.unwrap();

        assert_eq!(
            calls(&f),
            vec![ApiCall::Create, ApiCall::History("abc".to_string())]
        );
        assert_eq!(stored_id(&f), Some("abc".to_string()));
        assert_eq!(f.session.state(), SessionState::HistoryLoaded);
        assert!(events(&f).contains(&ViewEvent::Notice(WELCOME_TEXT.to_string())));
    }

    #[tokio::test]
    async fn test_open_with_stored_identifier_skips_creation() {
        let mut f = fixture();
        IdentifierStore::new(f.store_path.clone())
            .save("xyz")
            .unwrap();
        f.api.script_history(Ok(vec![
            Message::user("hi"),
            Message::assistant("hello"),
        ]));

        f.session.open().await.unwrap();

        assert_eq!(calls(&f), vec![ApiCall::History("xyz".to_string())]);
        assert_eq!(f.session.transcript().len(), 2);
        assert_eq!(f.session.transcript()[0].role, Role::User);
        assert_eq!(f.session.transcript()[1].role, Role::Assistant);
    }

    #[tokio::test]
    async fn test_stale_identifier_is_discarded_and_recreated_once() {
        let mut f = fixture();
        IdentifierStore::new(f.store_path.clone())
            .save("stale")
            .unwrap();
        f.api.script_history(Err(ApiError::NotFound));
        f.api.script_create("fresh");

        f.session.open().await.unwrap();

        assert_eq!(
            calls(&f),
            vec![
                ApiCall::History("stale".to_string()),
                ApiCall::Create,
                ApiCall::History("fresh".to_string()),
            ]
        );
        assert_eq!(stored_id(&f), Some("fresh".to_string()));
        assert_eq!(f.session.conversation_id(), Some("fresh"));
    }

    #[tokio::test]
    async fn test_failed_open_leaves_panel_closed() {
        let mut f = fixture();
        // No scripted identifier: creation is rejected.
        assert!(f.session.open().await.is_err());
        assert_eq!(f.session.state(), SessionState::Closed);
    }

    #[tokio::test]
    async fn test_whitespace_send_makes_no_network_call() {
        let mut f = fixture();
        f.api.script_create("abc");
        f.session.open().await.unwrap();
        let before = calls(&f);

        f.session.send_message("").await.unwrap();
        f.session.send_message("   \t  ").await.unwrap();

        assert_eq!(calls(&f), before);
        assert!(f.session.transcript().is_empty());
    }

    #[tokio::test]
    async fn test_send_without_identifier_is_noop() {
        let mut f = fixture();
        f.session.send_message("hello").await.unwrap();
        assert!(calls(&f).is_empty());
        assert!(f.session.transcript().is_empty());
    }

    #[tokio::test]
    async fn test_optimistic_render_precedes_reply() {
        let mut f = fixture();
        f.api.script_create("abc");
        f.session.open().await.unwrap();
        f.api.script_reply(Ok("yo".to_string()));

        f.session.send_message("hi").await.unwrap();

        assert_eq!(
            f.session.transcript(),
            &[Message::user("hi"), Message::assistant("yo")]
        );
        let evs = events(&f);
        let user_at = evs
            .iter()
            .position(|e| *e == ViewEvent::Render(Role::User, "hi".to_string()))
            .unwrap();
        let placeholder_at = evs.iter().position(|e| *e == ViewEvent::Placeholder).unwrap();
        let cleared_at = evs
            .iter()
            .position(|e| *e == ViewEvent::PlaceholderCleared)
            .unwrap();
        let reply_at = evs
            .iter()
            .position(|e| *e == ViewEvent::Render(Role::Assistant, "yo".to_string()))
            .unwrap();
        assert!(user_at < placeholder_at);
        assert!(placeholder_at < cleared_at);
        assert!(cleared_at < reply_at);
    }

    #[tokio::test]
    async fn test_send_failure_appends_apology_without_retry() {
        let mut f = fixture();
        f.api.script_create("abc");
        f.session.open().await.unwrap();
        f.api
            .script_reply(Err(ApiError::Rejected("boom".to_string())));

        f.session.send_message("hi").await.unwrap();

        let sends = calls(&f)
            .into_iter()
            .filter(|c| matches!(c, ApiCall::Send(_, _)))
            .count();
        assert_eq!(sends, 1);
        assert_eq!(
            f.session.transcript().last(),
            Some(&Message::assistant(APOLOGY_TEXT))
        );
        assert!(events(&f).contains(&ViewEvent::PlaceholderCleared));
    }

    #[tokio::test]
    async fn test_outbound_queue_requires_open_channel() {
        let mut f = fixture();
        f.api.script_create("abc");
        f.session.open().await.unwrap();

        // History is loaded but the channel has not opened yet.
        assert!(f.session.queue_outbound("hi").await.is_none());

        f.session.channel_opened();
        assert_eq!(f.session.state(), SessionState::Connected);
        let frame = f.session.queue_outbound("hi").await.unwrap();
        assert_eq!(frame.message, "hi");

        f.session.channel_closed();
        assert_eq!(f.session.state(), SessionState::Disconnected);
        assert!(f.session.queue_outbound("again").await.is_none());

        let evs = events(&f);
        let enabled_at = evs
            .iter()
            .position(|e| *e == ViewEvent::SendEnabled(true))
            .unwrap();
        let disabled_at = evs
            .iter()
            .position(|e| *e == ViewEvent::SendEnabled(false))
            .unwrap();
        assert!(enabled_at < disabled_at);
    }

    #[tokio::test]
    async fn test_server_echo_of_own_message_is_dropped() {
        let mut f = fixture();
        f.api.script_create("abc");
        f.session.open().await.unwrap();
        f.session.channel_opened();

        f.session.queue_outbound("hi").await.unwrap();
        f.session.render_incoming(Message::user("hi")).await;
        f.session.render_incoming(Message::assistant("yo")).await;

        assert_eq!(
            f.session.transcript(),
            &[Message::user("hi"), Message::assistant("yo")]
        );
    }

    #[tokio::test]
    async fn test_system_frame_becomes_notice_not_transcript() {
        let mut f = fixture();
        f.api.script_create("abc");
        f.session.open().await.unwrap();
        f.session.channel_opened();

        f.session
            .render_incoming(Message::system("processing error"))
            .await;

        assert!(f.session.transcript().is_empty());
        assert!(events(&f).contains(&ViewEvent::Notice("processing error".to_string())));
    }

    #[tokio::test]
    async fn test_history_is_fetched_once_per_open() {
        let mut f = fixture();
        f.api.script_create("abc");

        f.session.open().await.unwrap();
        f.session.open().await.unwrap(); // already open: no-op
        f.session.close();
        f.session.open().await.unwrap();

        let histories = calls(&f)
            .into_iter()
            .filter(|c| matches!(c, ApiCall::History(_)))
            .count();
        assert_eq!(histories, 2);
    }

    #[tokio::test]
    async fn test_incoming_while_closed_is_dropped() {
        let mut f = fixture();
        f.session.render_incoming(Message::assistant("late")).await;
        assert!(f.session.transcript().is_empty());
    }
}
