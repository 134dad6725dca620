//! Integration test modules

#[cfg(unix)]
mod lifecycle;
#[cfg(unix)]
mod streaming;
