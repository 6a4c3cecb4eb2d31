use std::time::Duration;

use anyhow::{anyhow, Result};
use chromiumoxide::async_process::Child;
use futures::io::{AsyncBufReadExt, BufReader};
use futures::stream::StreamExt;

/// Reads Chromium's stderr until it announces the DevTools websocket endpoint.
pub async fn extract_ws_url(child: &mut Child, limit: Duration) -> Result<String> {
    let stderr = child
        .stderr
        .take()
        .ok_or_else(|| anyhow!("chromium process missing stderr handle"))?;
    let mut lines = BufReader::new(stderr).lines();
    let mut preview = Vec::new();

    let reader = async {
        while let Some(line) = lines.next().await {
            let line = line?;
            if let Some(ws) = devtools_url(&line) {
                return Ok(ws);
            }
            if preview.len() < 8 {
                preview.push(line);
            }
        }
        Err(anyhow!(
            "chromium exited before exposing a devtools url; stderr: {}",
            preview.join(" | ")
        ))
    };

    tokio::time::timeout(limit, reader)
        .await
        .map_err(|_| anyhow!("timed out waiting for chromium devtools url"))?
}

fn devtools_url(line: &str) -> Option<String> {
    let (_, ws) = line.rsplit_once("listening on ")?;
    let ws = ws.trim();
    (ws.starts_with("ws") && ws.contains("devtools/browser")).then(|| ws.to_string())
}

#[cfg(test)]
mod tests {
    use super::devtools_url;

    #[test]
    fn parses_devtools_banner() {
        let line = "DevTools listening on ws://127.0.0.1:9222/devtools/browser/abc";
        assert_eq!(
            devtools_url(line).as_deref(),
            Some("ws://127.0.0.1:9222/devtools/browser/abc")
        );
        assert!(devtools_url("something else").is_none());
    }
}
