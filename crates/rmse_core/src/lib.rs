pub mod codec;
pub mod context;
pub mod core_api;
pub mod document;
pub mod edit;
pub mod field;
pub mod pins;
pub mod root;
pub mod sections;
pub mod store;

#[cfg(test)]
mod test_support;
