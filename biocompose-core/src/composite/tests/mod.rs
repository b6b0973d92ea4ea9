//! Integration tests for the composite module.
//!
//! These tests verify the complete build and run workflow: document
//! validation, port wiring, scheduling, state seeding, and failure handling.
