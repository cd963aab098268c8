/// Errors produced by the `portico-core` crate.
#[derive(Debug, thiserror::Error)]
#[non_exhaustive]
pub enum CoreError {
    /// The request path yielded no endpoint segment after trimming.
    #[error("malformed path '{path}': no endpoint segment")]
    MalformedPath { path: String },
}
