pub mod conversation;
pub mod profile;
pub mod trip;
