//! End-to-end tests of the Beacon instance with in-process collaborators.

mod dispatch_test;
mod helpers;
mod identity_test;
mod inbox_test;
