pub mod core;
pub mod exchange;
pub mod files;
pub mod periods;
pub mod reference;
pub mod reminders;
pub mod reports;
pub mod settings;
pub mod setup;
pub mod teachers;
pub mod works;
