//! DORM Tests
//!
//! Shared fixtures for the integration suites: a couple of registry
//! schemas every suite builds on, plus a prelude pulling the whole stack
//! into scope.
