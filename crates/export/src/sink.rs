use crate::ExportError;
use codec::{Emitter, EmitterConfig};
use futures::{Stream, StreamExt};
use std::path::{Path, PathBuf};
use tokens::Token;
use tokio::io::AsyncWriteExt;

const WRITE_BUFFER: usize = 64 * 1024;

/// Drive a token stream through the emitter into a file. On any error the
/// partial output is renamed with a `-partial` suffix so a later run cannot
/// mistake it for a complete export, and the error is propagated.
#[tracing::instrument(skip_all, fields(path = %path.display()))]
pub async fn write_json_file<S>(
    tokens: S,
    path: &Path,
    config: EmitterConfig,
) -> Result<u64, ExportError>
where
    S: Stream<Item = Result<Token, ExportError>> + Send,
{
    match write_inner(tokens, path, config).await {
        Ok(written) => {
            tracing::info!(bytes = written, "export complete");
            Ok(written)
        }
        Err(error) => {
            let partial = partial_path(path);
            match tokio::fs::rename(path, &partial).await {
                Ok(()) => tracing::warn!(partial = %partial.display(), "kept partial output"),
                Err(rename_error) => {
                    tracing::warn!(%rename_error, "could not preserve partial output")
                }
            }
            Err(error)
        }
    }
}

async fn write_inner<S>(
    tokens: S,
    path: &Path,
    config: EmitterConfig,
) -> Result<u64, ExportError>
where
    S: Stream<Item = Result<Token, ExportError>> + Send,
{
    let mut file = tokio::fs::File::create(path).await?;
    let mut emitter = Emitter::new(config);
    let mut buf = Vec::with_capacity(WRITE_BUFFER);
    let mut written = 0u64;

    let mut tokens = std::pin::pin!(tokens);
    while let Some(next) = tokens.next().await {
        let token = next?;
        emitter.write(&token, &mut buf)?;
        if buf.len() >= WRITE_BUFFER {
            file.write_all(&buf).await?;
            written += buf.len() as u64;
            buf.clear();
        }
    }
    emitter.finish(&mut buf);
    buf.push(b'\n');
    file.write_all(&buf).await?;
    written += buf.len() as u64;
    file.flush().await?;
    Ok(written)
}

fn partial_path(path: &Path) -> PathBuf {
    let name = path
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_default();
    path.with_file_name(format!("{name}-partial"))
}
