//! Collaborators around the token pipeline: sources that stream a
//! paginated remote collection as a JSON token sequence, and a sink that
//! renders a token stream into a file.

mod pager;
mod sink;
mod source;

pub use pager::{HttpPager, Page, Pager, PagerConfig};
pub use sink::write_json_file;
pub use source::{
    attachment_content_bytes_stream, attachments_stream, collection_stream, lists_stream,
    tasks_stream,
};

#[derive(Debug, thiserror::Error)]
pub enum ExportError {
    #[error("fetching page: {0}")]
    Http(#[from] reqwest::Error),

    #[error("invalid page url: {0}")]
    Url(#[from] url::ParseError),

    #[error("unexpected page shape: {0}")]
    PageShape(&'static str),

    #[error(transparent)]
    Codec(#[from] codec::CodecError),

    #[error("writing output: {0}")]
    Io(#[from] std::io::Error),
}
