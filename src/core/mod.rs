// Protocol core: reference normalization, ACL model, envelope decoding, and errors.
pub mod acl;
pub mod envelope;
pub mod error;
pub mod path;
