//! Shared building blocks for the mint screen.
pub mod notice_banner;
pub mod pico;
