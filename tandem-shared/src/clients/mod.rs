pub mod db;
pub mod email;
pub mod timeout;
