//! Behavioral tests for the host-facing shim and its C-vtable adapter.

mod callbacks;
