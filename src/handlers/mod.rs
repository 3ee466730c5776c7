pub mod admin;
pub mod announcements;
pub mod assets;
pub mod chat;
pub mod companies;
pub mod health;
pub mod leads;
pub mod roles;
pub mod tasks;
pub mod tickets;
pub mod users;
pub mod workspaces;
