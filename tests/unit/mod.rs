/// Unit tests against the public API

mod basic_tests;
mod properties;
