//! Terminal rendering of the chat panel.

use colored::Colorize;
use std::io::{self, Write};

use assistchat_client::PanelView;
use assistchat_types::{Message, Role};

const PLACEHOLDER: &str = "💭 Thinking…";

// CSI EL: erase the whole row, whatever columns the wide glyphs took.
const ERASE_LINE: &str = "\r\x1b[2K";

pub struct TerminalPanel {
    send_enabled: bool,
    placeholder_shown: bool,
}

impl TerminalPanel {
    pub fn new() -> Self {
        Self {
            send_enabled: false,
            placeholder_shown: false,
        }
    }
}

impl Default for TerminalPanel {
    fn default() -> Self {
        Self::new()
    }
}

impl PanelView for TerminalPanel {
    fn clear(&mut self) {
        println!("{}", "────────────────────────────────────".bright_black());
    }

    fn render(&mut self, message: &Message) {
        match message.role {
            Role::User => println!("{} {}", "🧑 You:".cyan().bold(), message.content),
            Role::Assistant => {
                println!("{} {}", "🤖 Assistant:".green().bold(), message.content)
            }
            Role::System => println!("{}", message.content.bright_black()),
        }
    }

    fn show_placeholder(&mut self) {
        print!("{}", PLACEHOLDER.bright_black());
        let _ = io::stdout().flush();
        self.placeholder_shown = true;
    }

    fn clear_placeholder(&mut self) {
        if self.placeholder_shown {
            // The reply follows on the erased line.
            print!("{}", ERASE_LINE);
            let _ = io::stdout().flush();
            self.placeholder_shown = false;
        }
    }

    fn set_send_enabled(&mut self, enabled: bool) {
        self.send_enabled = enabled;
    }

    fn notice(&mut self, text: &str) {
        println!("{}", text.bright_black());
    }
}
