//! ReelBatch Render Engine
//!
//! Batch pipeline that turns each project directory into one composite
//! video: intro still, main clip, outro still, joined by crossfades.
//!
//! # Pipeline Architecture
//!
//! ```text
//! main.mp4 ── loudnorm ──► 02_Work/normalized.mp4
//!                                  │
//!                          probe duration/geometry
//!                                  │
//! intro.png ──┐                    ▼
//!             ├── scale/pad ── xfade(intro→main) ── xfade(→outro) ──► [outv]
//! outro.png ──┘                                                        │
//! normalized audio ── afade ── adelay ─────────────────────────► [aout]
//!                                                                      ▼
//!                                                     03_Final/<name>_final.mp4
//! ```
//!
//! Every encode runs as an external `ffmpeg` process whose diagnostic
//! stream is parsed for `time=` markers to drive progress reporting.

pub mod filter_graph;
pub mod pipeline;
pub mod probe;
pub mod runner;

pub use filter_graph::*;
pub use pipeline::*;
pub use probe::*;
pub use runner::*;
