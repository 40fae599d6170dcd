mod admin;
mod menu;
mod reply;
mod service;

pub use admin::{
    AdminCommand, AdminCommandError, created_link_text, partner_stats_text, total_stats_text,
};
pub use menu::{MenuAction, SURVEY_DONE};
pub use reply::{Incoming, Keyboard, Reply, SHARE_CONTACT_LABEL, Sender};
pub use service::ChatService;
