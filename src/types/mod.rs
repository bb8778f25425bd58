pub mod key;
pub mod webhook;
