use crate::{ExportError, Pager};
use futures::{Stream, StreamExt};
use tokens::{tokenize_value, Token};

/// Stream a paginated collection as one JSON array of its items, followed
/// by [`Token::Finish`] so sinks know the source is exhausted.
pub fn collection_stream<P>(
    collection: &'static str,
    mut pager: P,
) -> impl Stream<Item = Result<Token, ExportError>> + Send
where
    P: Pager + 'static,
{
    coroutines::try_coroutine(move |mut co| async move {
        co.yield_(Token::StartArray).await;

        let mut cursor: Option<String> = None;
        let mut pages = 0u64;
        let mut items = 0u64;
        let mut buf = Vec::new();
        loop {
            let page = pager.fetch_page(cursor.as_deref()).await?;
            pages += 1;
            items += page.items.len() as u64;
            for item in &page.items {
                tokenize_value(item, &mut buf);
            }
            co.yield_all(buf.drain(..)).await;
            match page.next {
                Some(next) => cursor = Some(next),
                None => break,
            }
        }

        co.yield_(Token::EndArray).await;
        co.yield_(Token::Finish).await;
        tracing::debug!(collection, pages, items, "source exhausted");
        Ok(())
    })
}

pub fn lists_stream<P>(pager: P) -> impl Stream<Item = Result<Token, ExportError>> + Send
where
    P: Pager + 'static,
{
    collection_stream("lists", pager)
}

pub fn tasks_stream<P>(pager: P) -> impl Stream<Item = Result<Token, ExportError>> + Send
where
    P: Pager + 'static,
{
    collection_stream("tasks", pager)
}

pub fn attachments_stream<P>(pager: P) -> impl Stream<Item = Result<Token, ExportError>> + Send
where
    P: Pager + 'static,
{
    collection_stream("attachments", pager)
}

/// Stream raw attachment content as a single streamed string value of
/// base64 text, without ever holding the whole content in memory, followed
/// by [`Token::Finish`].
pub fn attachment_content_bytes_stream<S, B>(
    content: S,
) -> impl Stream<Item = Result<Token, ExportError>> + Send
where
    S: Stream<Item = Result<B, ExportError>> + Send + 'static,
    B: AsRef<[u8]> + Send + 'static,
{
    coroutines::try_coroutine(move |mut co| async move {
        co.yield_(Token::StartString).await;

        // Base64 emits in 3-byte groups; carry the remainder across chunks
        // so the concatenated fragments decode as one value.
        let mut carry: Vec<u8> = Vec::new();
        let mut content = std::pin::pin!(content);
        while let Some(chunk) = content.next().await {
            let chunk = chunk?;
            carry.extend_from_slice(chunk.as_ref());
            let aligned = carry.len() - carry.len() % 3;
            if aligned > 0 {
                let encoded = base64::encode(&carry[..aligned]);
                carry.drain(..aligned);
                co.yield_(Token::StringChunk(encoded)).await;
            }
        }
        if !carry.is_empty() {
            co.yield_(Token::StringChunk(base64::encode(&carry))).await;
        }

        co.yield_(Token::EndString).await;
        co.yield_(Token::Finish).await;
        Ok(())
    })
}
