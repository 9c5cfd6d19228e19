pub mod audit;
pub mod filter;
pub mod merge;
pub mod post_process;
pub mod resolver;
pub mod service;
pub mod validator;
