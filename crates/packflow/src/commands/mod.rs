pub mod build;
pub mod images;
pub mod test_env;
