/// Integration tests for the PulmoPulse sync engine

mod basic_integration;
mod sync_pipeline;
