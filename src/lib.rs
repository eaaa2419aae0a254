//! Swap2 Arena — Bo3 match-orchestration engine, as a library.
//!
//! Exposed as a library (in addition to the `swap2-arena` demo binary)
//! so the three state machines can be embedded in a transport layer —
//! or exercised from the integration test suite — without going
//! through the CLI.

pub mod collaborators;
pub mod disconnect;
pub mod error;
pub mod series;
pub mod swap2;
