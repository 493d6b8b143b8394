//! Behavioral tests for the buffer layer: write/extract semantics, inbound
//! draining, copy-on-write reuse, and capacity-governor trimming.

mod error;
mod inbound;
