pub mod debug;
pub mod health;
pub mod results;
pub mod submit;
pub mod webhooks;
