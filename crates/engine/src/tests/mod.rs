mod helpers;

mod batch_tests;
mod encryption_tests;
mod recovery_tests;
