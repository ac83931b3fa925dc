//! Reference playback infrastructure

mod rodio;

pub use rodio::RodioPlayer;
