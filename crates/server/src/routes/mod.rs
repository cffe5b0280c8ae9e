pub mod email;
pub mod sessions;
pub mod streaks;
pub mod tasks;
