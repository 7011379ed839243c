pub(crate) mod errors;
pub(crate) mod greeting;
pub(crate) mod middleware;
pub(crate) mod proxy;
pub(crate) mod state;
