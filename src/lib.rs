//! Tablas: multiplication tables drill with spoken questions and voice answers
//!
//! This library provides the core functionality for:
//! - Generating "T x M" questions for a chosen set of tables
//! - Running a quiz session: answers, scoring, mistakes, summary
//! - Speaking questions and feedback through a single FIFO speech queue
//! - Capturing spoken answers via cpal and recognizing them with whisper.cpp
//! - Turning Spanish number words ("veinte y tres") into numbers
//!
//! # Architecture
//!
//! ```text
//!          ┌──────────────┐   EngineCommand    ┌─────────────────────────────┐
//!          │   Console    │ ─────────────────▶ │         QuizEngine          │
//!          │ (front-end)  │ ◀───────────────── │  owns the current Session   │
//!          └──────────────┘     QuizEvent      └─────────────────────────────┘
//!                                                │           ▲            │
//!                              spawn_blocking    │           │ Completion │ enqueue
//!                                                ▼           │ (tagged    ▼
//!                                    ┌────────────────┐      │  with the  ┌──────────────┐
//!                                    │   Question     │ ─────┤  session   │ Speech Queue │
//!                                    │   Generator    │      │  id)       │ (one worker) │
//!                                    └────────────────┘      │            └──────────────┘
//!                                                            │                   │
//!                                    ┌────────────────┐      │                   ▼
//!                                    │ Voice Capture  │ ─────┘            ┌──────────────┐
//!                                    │ cpal + whisper │                   │  espeak-ng   │
//!                                    └────────────────┘                   └──────────────┘
//!                                            │
//!                                            ▼ transcript
//!                                    ┌────────────────┐
//!                                    │  Number-word   │
//!                                    │   normalizer   │
//!                                    └────────────────┘
//! ```

pub mod audio;
pub mod capture;
pub mod cli;
pub mod config;
pub mod console;
pub mod engine;
pub mod error;
pub mod quiz;
pub mod recognize;
pub mod speech;
pub mod state;
pub mod text;

pub use config::Config;
pub use engine::{EngineHandle, EngineParts, QuizEngine, QuizEvent};
pub use error::{Result, TablasError};
