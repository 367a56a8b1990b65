pub mod client;
pub mod common;
pub mod job;
pub mod launch;
pub mod render;

#[cfg(test)]
pub(crate) mod tests;

pub type Error = crate::common::error::JobError;
pub type Result<T> = std::result::Result<T, Error>;

pub const PBSJOB_VERSION: &str = {
    match option_env!("PBSJOB_BUILD_VERSION") {
        Some(version) => version,
        None => const_format::concatcp!(env!("CARGO_PKG_VERSION"), "-dev"),
    }
};
