//! Analyzer and pipeline tests with mocked oracles

mod pipeline_tests;
mod support;
