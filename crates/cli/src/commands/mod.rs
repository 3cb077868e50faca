pub mod chat;
pub mod docs;
pub mod doctor;
pub mod onboard;
