pub mod embeds;
pub mod notifier;
