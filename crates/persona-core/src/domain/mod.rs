pub mod characteristics;
pub mod feedback_result;
pub mod feedback_session;
pub mod ids;
pub mod persona;
pub mod product;
pub mod user;
