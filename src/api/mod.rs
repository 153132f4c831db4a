// src/api/mod.rs
//
// Kleiner Dateiserver über dem Ausgabeverzeichnis:
//   GET /videos/list?start=&end=   -> JSON-Array der Dateinamen
//   GET /video/<name>              -> Datei
use std::fs::File;
use std::net::SocketAddr;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::thread::{self, JoinHandle};
use std::time::Duration;

use log::{debug, info, warn};
use serde::Serialize;
use tiny_http::{Header, Method, Request, Response, Server, StatusCode};

use crate::core::StorageError;
use crate::storage::{NameRange, list_filenames};

const POLL_INTERVAL: Duration = Duration::from_millis(100);

/// Running server; dropping it stops the accept loop.
pub struct FileServer {
    addr: SocketAddr,
    running: Arc<AtomicBool>,
    handle: Option<JoinHandle<()>>,
}

impl FileServer {
    pub fn addr(&self) -> SocketAddr {
        self.addr
    }

    pub fn stop(mut self) {
        self.shutdown();
    }

    fn shutdown(&mut self) {
        self.running.store(false, Ordering::Relaxed);
        if let Some(handle) = self.handle.take() {
            let _ = handle.join();
        }
    }
}

impl Drop for FileServer {
    fn drop(&mut self) {
        self.shutdown();
    }
}

pub fn start_file_server(bind: &str, dir: PathBuf) -> anyhow::Result<FileServer> {
    let server = Server::http(bind).map_err(|e| anyhow::anyhow!(e))?;
    let addr = server
        .server_addr()
        .to_ip()
        .ok_or_else(|| anyhow::anyhow!("{} is not an IP listener", bind))?;

    info!("[http] serving {:?} on {}", dir, addr);

    let running = Arc::new(AtomicBool::new(true));
    let handle = {
        let running = running.clone();
        thread::spawn(move || serve(server, &dir, &running))
    };

    Ok(FileServer {
        addr,
        running,
        handle: Some(handle),
    })
}

fn serve(server: Server, dir: &Path, running: &AtomicBool) {
    while running.load(Ordering::Relaxed) {
        let req = match server.recv_timeout(POLL_INTERVAL) {
            Ok(Some(req)) => req,
            Ok(None) => continue,
            Err(e) => {
                warn!("[http] accept failed: {}", e);
                continue;
            }
        };

        if req.method() != &Method::Get {
            let _ = req.respond(Response::empty(StatusCode(405)));
            continue;
        }

        let url = req.url().to_string();
        let (path, query) = url.split_once('?').unwrap_or((&url, ""));
        debug!("[http] GET {}", url);

        if path == "/videos/list" {
            handle_list(req, dir, query);
        } else if let Some(name) = path.strip_prefix("/video/") {
            let name = name.to_string();
            handle_video(req, dir, &name);
        } else {
            let _ = req.respond(Response::empty(StatusCode(404)));
        }
    }
    debug!("[http] server loop stopped");
}

#[derive(Serialize)]
struct ErrorBody {
    error: String,
}

fn handle_list(req: Request, dir: &Path, query: &str) {
    let range = parse_range(query);
    match list_filenames(dir, &range) {
        Ok(names) => respond_json(req, StatusCode(200), names),
        Err(e @ StorageError::DirectoryNotFound(_)) => respond_json(
            req,
            StatusCode(404),
            ErrorBody {
                error: e.to_string(),
            },
        ),
        Err(e) => {
            warn!("[http] listing failed: {}", e);
            respond_json(
                req,
                StatusCode(500),
                ErrorBody {
                    error: e.to_string(),
                },
            )
        }
    }
}

fn handle_video(req: Request, dir: &Path, raw_name: &str) {
    let path = match resolve_video(dir, raw_name) {
        Ok(p) => p,
        Err(status) => {
            let _ = req.respond(Response::empty(status));
            return;
        }
    };

    let file = match File::open(&path) {
        Ok(f) => f,
        Err(_) => {
            let _ = req.respond(Response::empty(StatusCode(404)));
            return;
        }
    };

    let mut response = Response::from_file(file);
    if let Ok(header) = Header::from_bytes("Content-Type", content_type(&path)) {
        response = response.with_header(header);
    }
    let _ = req.respond(response);
}

fn respond_json<T: Serialize>(req: Request, status: StatusCode, payload: T) {
    let body = serde_json::to_string(&payload).unwrap_or_else(|_| "{}".to_string());
    let mut response = Response::from_string(body).with_status_code(status);
    if let Ok(header) = Header::from_bytes(&b"Content-Type"[..], &b"application/json"[..]) {
        response = response.with_header(header);
    }
    let _ = req.respond(response);
}

/// `start`/`end` query values, percent-decoded. Empty values count as absent.
pub fn parse_range(query: &str) -> NameRange {
    NameRange::new(query_value(query, "start"), query_value(query, "end"))
}

fn query_value(query: &str, key: &str) -> Option<String> {
    query.split('&').find_map(|pair| {
        let (name, value) = pair.split_once('=')?;
        if name != key || value.is_empty() {
            return None;
        }
        let value = value.replace('+', " ");
        urlencoding::decode(&value).ok().map(|v| v.into_owned())
    })
}

/// Maps a requested name onto a file directly inside `dir`.
/// 400 for anything that could leave the directory, 404 if there is no such file.
pub fn resolve_video(dir: &Path, raw_name: &str) -> Result<PathBuf, StatusCode> {
    let name = urlencoding::decode(raw_name).map_err(|_| StatusCode(400))?;

    if name.is_empty() || name.contains('/') || name.contains('\\') || name.contains("..") {
        return Err(StatusCode(400));
    }

    let path = dir.join(name.as_ref());
    if !path.is_file() {
        return Err(StatusCode(404));
    }
    Ok(path)
}

pub fn content_type(path: &Path) -> &'static str {
    let ext = path
        .extension()
        .and_then(|e| e.to_str())
        .map(|e| e.to_ascii_lowercase());

    match ext.as_deref() {
        Some("mp4") => "video/mp4",
        Some("avi") => "video/x-msvideo",
        Some("mov") => "video/quicktime",
        Some("mkv") => "video/x-matroska",
        _ => "application/octet-stream",
    }
}
