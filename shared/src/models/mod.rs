//! Domain models shared between the server and its API clients

pub mod onboarding;
