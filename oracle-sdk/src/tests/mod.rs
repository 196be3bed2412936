//! Unit tests for the Oracle SDK
//!
//! Client behavior is exercised against a WireMock server.
