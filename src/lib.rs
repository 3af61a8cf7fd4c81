//! Trigger to function resolution for the serverless router.
//!
//! [`router::FunctionReferenceResolver`] maps an HTTP trigger to the function,
//! or the weighted set of functions, that should receive its traffic, and
//! caches the answer per trigger resource version.
pub mod handlers;
pub mod router;
