//! Minimal HTTP/1.1 server for integration tests.
//!
//! Serves a fixed map of paths to bodies; unknown paths get 404. Each
//! connection handles one GET and closes.

use std::collections::HashMap;
use std::io::{Read, Write};
use std::net::TcpListener;
use std::sync::Arc;
use std::thread;
use std::time::Duration;

/// Route table: request path (e.g. "/show/index.m3u8") → body.
#[derive(Debug, Default, Clone)]
pub struct Routes {
    bodies: HashMap<String, Vec<u8>>,
}

impl Routes {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add(mut self, path: &str, body: impl Into<Vec<u8>>) -> Self {
        self.bodies.insert(path.to_string(), body.into());
        self
    }

    /// Adds `<dir>/index.m3u8` listing `segments` (relative URIs) and serves
    /// each segment body under `<dir>/`.
    pub fn stream(mut self, dir: &str, segments: &[(&str, Vec<u8>)]) -> Self {
        let mut playlist = String::from("#EXTM3U\n#EXT-X-TARGETDURATION:4\n");
        for (name, body) in segments {
            playlist.push_str("#EXTINF:4.0,\n");
            playlist.push_str(name);
            playlist.push('\n');
            self.bodies.insert(format!("{}/{}", dir, name), body.clone());
        }
        playlist.push_str("#EXT-X-ENDLIST\n");
        self.bodies.insert(format!("{}/index.m3u8", dir), playlist.into_bytes());
        self
    }
}

/// Starts the server on a background thread. Returns the base URL without a
/// trailing slash (e.g. "http://127.0.0.1:12345"). Runs until the process exits.
pub fn start(routes: Routes) -> String {
    let listener = TcpListener::bind("127.0.0.1:0").expect("bind");
    let port = listener.local_addr().unwrap().port();
    let routes = Arc::new(routes);
    thread::spawn(move || {
        for stream in listener.incoming().flatten() {
            let routes = Arc::clone(&routes);
            thread::spawn(move || handle(stream, &routes));
        }
    });
    format!("http://127.0.0.1:{}", port)
}

fn handle(mut stream: std::net::TcpStream, routes: &Routes) {
    let _ = stream.set_read_timeout(Some(Duration::from_secs(2)));
    let _ = stream.set_write_timeout(Some(Duration::from_secs(2)));
    let mut buf = [0u8; 8192];
    let n = match stream.read(&mut buf) {
        Ok(0) | Err(_) => return,
        Ok(n) => n,
    };
    let request = match std::str::from_utf8(&buf[..n]) {
        Ok(s) => s,
        Err(_) => return,
    };
    let path = request
        .lines()
        .next()
        .and_then(|line| line.split_whitespace().nth(1))
        .unwrap_or("/");

    match routes.bodies.get(path) {
        Some(body) => {
            let head = format!(
                "HTTP/1.1 200 OK\r\nContent-Length: {}\r\nConnection: close\r\n\r\n",
                body.len()
            );
            let _ = stream.write_all(head.as_bytes());
            let _ = stream.write_all(body);
        }
        None => {
            let _ = stream.write_all(
                b"HTTP/1.1 404 Not Found\r\nContent-Length: 0\r\nConnection: close\r\n\r\n",
            );
        }
    }
    let _ = stream.flush();
}
