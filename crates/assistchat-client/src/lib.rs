//! assistchat-client: session logic for the shop assistant chat.
//!
//! The pieces compose like this: an [`IdentifierStore`] remembers the
//! conversation across runs, an [`AssistantApi`] talks to the server
//! over HTTP, and a [`ChatSession`] ties them to a [`PanelView`]. The
//! optional persistent channel ([`run_channel`]) and the hint timer
//! ([`run_hint_timer`]) run as background tasks feeding events back in.

pub mod api;
pub mod channel;
pub mod hints;
pub mod logger;
pub mod session;
pub mod store;

pub use api::{ApiError, AssistantApi, HttpApi};
pub use channel::{channel_url, run_channel, ChannelConfig, ChannelEvent};
pub use hints::{run_hint_timer, HintConfig, HintEvent, HINTS};
pub use logger::TranscriptLogger;
pub use session::{ChatSession, PanelView};
pub use store::IdentifierStore;
