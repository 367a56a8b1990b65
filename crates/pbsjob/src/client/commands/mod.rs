pub mod inspect;
pub mod job;
pub mod launch;
pub mod render;
pub mod submit;
