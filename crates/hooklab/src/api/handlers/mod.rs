pub mod events;
pub mod responses;
pub mod rules;
pub mod system;
pub mod webhook;
