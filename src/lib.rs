//! SegmentRelay - segmented audio capture with remote hand-off
//!
//! This crate records the default input device in fixed-length segments while
//! a reference file loops on the output device, writes each segment as a WAV
//! artifact and uploads it to an ingestion endpoint in the background.
//!
//! # Architecture
//!
//! The crate follows hexagonal (ports & adapters) architecture:
//!
//! - **Domain**: Value objects, the capture session state machine, delivery bookkeeping and errors
//! - **Application**: Use cases (scheduler, delivery, orchestrator) and port interfaces (traits)
//! - **Infrastructure**: Adapter implementations (cpal, WAV files, reqwest, rodio, XDG config)
//! - **CLI**: Command-line interface, argument parsing and output formatting

pub mod application;
pub mod cli;
pub mod domain;
pub mod infrastructure;
