pub mod app_dirs;
pub mod events;
pub mod settings;
