// Job backends

pub mod http;

pub use http::HttpJobBackend;
