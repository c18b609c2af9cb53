//! Helpers shared by inline unit tests.

pub mod socket_guard;
