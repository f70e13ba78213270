//! Stdio transport: newline-delimited JSON-RPC on stdin/stdout
//!
//! Stdout carries protocol frames only; logs go to stderr.

use serde_json::Value;
use tokio::io::{AsyncBufRead, AsyncBufReadExt, AsyncWrite, AsyncWriteExt, BufReader};
use tracing::{debug, info};

use crate::mcp::rpc::json_rpc_error;
use crate::mcp::server::handle_json_rpc_payload;
use crate::AppState;

pub async fn serve_stdio(state: AppState) -> std::io::Result<()> {
    info!("stdio transport ready");
    serve_lines(
        &state,
        BufReader::new(tokio::io::stdin()),
        tokio::io::stdout(),
    )
    .await
}

/// Answers each non-empty input line with at most one output line, until EOF.
pub async fn serve_lines<R, W>(state: &AppState, reader: R, mut writer: W) -> std::io::Result<()>
where
    R: AsyncBufRead + Unpin,
    W: AsyncWrite + Unpin,
{
    let mut lines = reader.lines();
    while let Some(line) = lines.next_line().await? {
        let line = line.trim();
        if line.is_empty() {
            continue;
        }

        let response = match serde_json::from_str::<Value>(line) {
            Ok(payload) => handle_json_rpc_payload(state, payload).await,
            Err(_) => Some(json_rpc_error(None, -32700, "Parse error")),
        };

        let Some(response) = response else {
            continue;
        };

        let mut frame = serde_json::to_vec(&response).map_err(std::io::Error::other)?;
        frame.push(b'\n');
        writer.write_all(&frame).await?;
        writer.flush().await?;
    }

    debug!("stdin closed");
    Ok(())
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use serde_json::Value;
    use tokio::io::BufReader;

    use super::serve_lines;
    use crate::domain::aggregate::FanOutLimits;
    use crate::test_support::{sample_universe, FakeRootData};
    use crate::AppState;

    fn state() -> AppState {
        AppState::new(
            Arc::new(FakeRootData::new(sample_universe)),
            FanOutLimits::default(),
            None,
        )
    }

    async fn run(input: &str) -> Vec<Value> {
        let mut output = Vec::new();
        serve_lines(&state(), BufReader::new(input.as_bytes()), &mut output)
            .await
            .expect("stdio loop");

        String::from_utf8(output)
            .expect("utf8 output")
            .lines()
            .map(|line| serde_json::from_str(line).expect("json frame"))
            .collect()
    }

    #[tokio::test]
    async fn answers_requests_line_by_line() {
        let responses = run(concat!(
            r#"{"jsonrpc":"2.0","id":1,"method":"ping"}"#,
            "\n\n",
            r#"{"jsonrpc":"2.0","method":"notifications/initialized"}"#,
            "\n",
            r#"{"jsonrpc":"2.0","id":2,"method":"tools/call","params":{"name":"searchEntities","arguments":{"query":"paradigm"}}}"#,
            "\n",
        ))
        .await;

        assert_eq!(responses.len(), 2);
        assert_eq!(responses[0]["id"], 1);
        assert_eq!(responses[1]["id"], 2);
        assert_eq!(
            responses[1]["result"]["structuredContent"]["data"][0]["name"],
            "Paradigm"
        );
    }

    #[tokio::test]
    async fn invalid_json_yields_parse_error() {
        let responses = run("{not json}\n").await;

        assert_eq!(responses.len(), 1);
        assert_eq!(responses[0]["error"]["code"], -32700);
    }
}
