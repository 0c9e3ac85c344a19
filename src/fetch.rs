use std::path::{Path, PathBuf};

use reqwest::StatusCode;
use tracing::{debug, warn};

use crate::Error;

/// Store `source` as `<dir>/<filename>`.
///
/// `http://` and `https://` sources are downloaded; anything else is taken
/// as a local path and copied. A non-200 response or any transport or copy
/// failure is an [`Error::Fetch`].
pub async fn fetch(
    client: &reqwest::Client,
    source: &str,
    dir: &Path,
    filename: &str,
) -> Result<PathBuf, Error> {
    let name = Path::new(filename)
        .file_name()
        .ok_or_else(|| Error::Fetch(format!("invalid file name {filename:?}")))?;
    let dest = dir.join(name);

    if source.starts_with("http://") || source.starts_with("https://") {
        let resp = client
            .get(source)
            .send()
            .await
            .map_err(|e| Error::Fetch(e.to_string()))?;
        if resp.status() != StatusCode::OK {
            warn!(status = %resp.status(), source, "image download failed");
            return Err(Error::Fetch(format!("status {}", resp.status())));
        }
        let body = resp.bytes().await.map_err(|e| Error::Fetch(e.to_string()))?;
        tokio::fs::write(&dest, &body).await?;
        debug!(bytes = body.len(), path = %dest.display(), "image downloaded");
    } else {
        tokio::fs::copy(source, &dest)
            .await
            .map_err(|e| Error::Fetch(format!("{source}: {e}")))?;
        debug!(path = %dest.display(), "image copied");
    }

    Ok(dest)
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::io::{AsyncReadExt, AsyncWriteExt};
    use tokio::net::TcpListener;

    fn client() -> reqwest::Client {
        reqwest::Client::builder().no_proxy().build().unwrap()
    }

    /// Serve one canned HTTP response and return the URL.
    async fn serve_once(status: &'static str, body: &'static [u8]) -> String {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            let (mut sock, _) = listener.accept().await.unwrap();
            let mut req = [0u8; 1024];
            let _ = sock.read(&mut req).await;
            let head = format!(
                "HTTP/1.1 {status}\r\nContent-Length: {}\r\nConnection: close\r\n\r\n",
                body.len()
            );
            sock.write_all(head.as_bytes()).await.unwrap();
            sock.write_all(body).await.unwrap();
            sock.shutdown().await.unwrap();
        });
        format!("http://{addr}/image.png")
    }

    #[tokio::test]
    async fn downloads_on_200() {
        let url = serve_once("200 OK", b"pixels").await;
        let dir = tempfile::tempdir().unwrap();
        let path = fetch(&client(), &url, dir.path(), "image.png")
            .await
            .unwrap();
        assert_eq!(path, dir.path().join("image.png"));
        assert_eq!(std::fs::read(&path).unwrap(), b"pixels");
    }

    #[tokio::test]
    async fn non_200_is_a_fetch_error() {
        let url = serve_once("404 Not Found", b"").await;
        let dir = tempfile::tempdir().unwrap();
        let err = fetch(&client(), &url, dir.path(), "image.png")
            .await
            .unwrap_err();
        assert!(matches!(err, Error::Fetch(_)), "{err}");
        assert!(!dir.path().join("image.png").exists());
    }

    #[tokio::test]
    async fn local_paths_are_copied() {
        let src_dir = tempfile::tempdir().unwrap();
        let src = src_dir.path().join("in.png");
        std::fs::write(&src, b"data").unwrap();
        let dir = tempfile::tempdir().unwrap();
        let client = client();
        let path = fetch(&client, src.to_str().unwrap(), dir.path(), "../escape.png")
            .await
            .unwrap();
        // Only the final path component is used.
        assert_eq!(path, dir.path().join("escape.png"));
        assert_eq!(std::fs::read(&path).unwrap(), b"data");

        let missing = fetch(&client, "/nonexistent/x.png", dir.path(), "x.png").await;
        assert!(matches!(missing, Err(Error::Fetch(_))));
    }
}
