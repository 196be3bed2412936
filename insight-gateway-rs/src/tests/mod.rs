//! Router tests driving the HTTP surface with in-process fakes
