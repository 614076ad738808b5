use anyhow::Result;
use tokio::io::{AsyncBufRead, AsyncBufReadExt, AsyncWrite, AsyncWriteExt};

const PROMPT: &str = ">>> ";

/// Prompts and reads one line. `None` once the input is exhausted.
pub async fn read_user_input<R, W>(reader: &mut R, output: &mut W) -> Result<Option<String>>
where
    R: AsyncBufRead + Unpin,
    W: AsyncWrite + Unpin,
{
    let mut buffer = String::new();
    output.write_all(PROMPT.as_bytes()).await?;
    output.flush().await?;
    if reader.read_line(&mut buffer).await? == 0 {
        return Ok(None);
    }
    Ok(Some(buffer))
}

pub async fn write_line<W>(output: &mut W, text: &str) -> Result<()>
where
    W: AsyncWrite + Unpin,
{
    output.write_all(text.as_bytes()).await?;
    output.write_all(b"\n").await?;
    output.flush().await?;
    Ok(())
}
