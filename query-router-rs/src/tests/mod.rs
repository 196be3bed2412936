//! Registry, router and engine tests against in-process fakes

mod router_tests;
mod support;
