pub mod email;
pub mod text;
