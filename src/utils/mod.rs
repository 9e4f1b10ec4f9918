//! The `utils` module holds the pieces shared by every other module of the
//! interceptor: the error taxonomy and the logging bootstrap.

pub mod error;
pub mod logging;
