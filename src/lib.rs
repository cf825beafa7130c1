pub mod error;
pub mod event;
pub mod framebuffer;
pub mod parser;
pub mod pipeline;
pub mod render;
pub mod trace;
