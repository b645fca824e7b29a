pub mod home;
pub mod item;
