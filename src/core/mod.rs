// Core modules: codecs, property tree access, document model, and the tree builder.
pub mod base64;
pub mod builder;
pub mod charset;
pub mod document;
pub mod error;
pub mod tree;
