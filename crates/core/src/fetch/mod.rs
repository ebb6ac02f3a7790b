//! Byte transport for pack manifests and media.
//!
//! A [`Fetcher`] answers with a [`Response`] whenever the resource location
//! could be reached, including "not found" and other non-success statuses.
//! Only transport-level failures are reported as `Err`.

use std::{cell::RefCell, collections::HashMap, future::Future, io::ErrorKind};

use url::Url;

use crate::{HuesError, Result};

/// Status line and body of a fetch.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Response {
    pub status: u16,
    pub reason: String,
    pub body: Vec<u8>,
}

impl Response {
    pub fn ok(body: impl Into<Vec<u8>>) -> Self {
        Self {
            status: 200,
            reason: "OK".to_string(),
            body: body.into(),
        }
    }

    pub fn not_found() -> Self {
        Self::with_status(404, "Not Found")
    }

    pub fn with_status(status: u16, reason: impl Into<String>) -> Self {
        Self {
            status,
            reason: reason.into(),
            body: Vec::new(),
        }
    }

    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status)
    }

    pub fn is_not_found(&self) -> bool {
        self.status == 404
    }

    pub fn into_text(self) -> Result<String> {
        String::from_utf8(self.body).map_err(|e| HuesError::msg(format!("body is not UTF-8: {e}")))
    }
}

/// Source of pack resources.
pub trait Fetcher {
    fn fetch(&self, url: &Url) -> impl Future<Output = Result<Response>>;
}

/// Serves `file:` URLs from the local file system. A missing file answers
/// 404, the way a static file server would.
#[derive(Debug, Default, Clone, Copy)]
pub struct FileFetcher;

impl Fetcher for FileFetcher {
    async fn fetch(&self, url: &Url) -> Result<Response> {
        if url.scheme() != "file" {
            return Err(HuesError::UnsupportedUrl(url.to_string()));
        }
        let path = url
            .to_file_path()
            .map_err(|_| HuesError::UnsupportedUrl(url.to_string()))?;

        match tokio::fs::read(&path).await {
            Ok(body) => Ok(Response::ok(body)),
            Err(err) if err.kind() == ErrorKind::NotFound => Ok(Response::not_found()),
            Err(err) if err.kind() == ErrorKind::PermissionDenied => {
                Ok(Response::with_status(403, "Forbidden"))
            }
            Err(err) => Err(err.into()),
        }
    }
}

/// In-memory resource map keyed by URL. Anything not inserted answers 404.
/// Every request is recorded, which makes probing order observable.
#[derive(Debug, Default)]
pub struct MemoryFetcher {
    responses: HashMap<String, Response>,
    requests: RefCell<Vec<Url>>,
}

impl MemoryFetcher {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, url: &Url, body: impl Into<Vec<u8>>) {
        self.responses.insert(url.to_string(), Response::ok(body));
    }

    pub fn insert_response(&mut self, url: &Url, response: Response) {
        self.responses.insert(url.to_string(), response);
    }

    /// URLs requested so far, in request order.
    pub fn requests(&self) -> Vec<Url> {
        self.requests.borrow().clone()
    }
}

impl Fetcher for MemoryFetcher {
    async fn fetch(&self, url: &Url) -> Result<Response> {
        self.requests.borrow_mut().push(url.clone());
        Ok(self
            .responses
            .get(url.as_str())
            .cloned()
            .unwrap_or_else(Response::not_found))
    }
}

/// Normalises a pack location so that relative joins land inside it.
pub fn pack_url(url: &Url) -> Result<Url> {
    let mut url = url.clone();
    if !url.path().ends_with('/') {
        let path = format!("{}/", url.path());
        url.set_path(&path);
    }
    Ok(url)
}

/// Resolves a child pack of `base` by name, or returns `name` itself when it
/// is already an absolute URL. Only names with a `scheme://` prefix count as
/// URLs, so pack names containing a colon stay names.
pub fn respack_url(base: &Url, name: &str) -> Result<Url> {
    if name.contains("://") {
        if let Ok(absolute) = Url::parse(name) {
            return pack_url(&absolute);
        }
    }
    let mut url = pack_url(base)?;
    segments(&mut url)?.pop_if_empty().push(name).push("");
    Ok(url)
}

/// `<pack>/<directory>/<file>` with every segment percent-encoded.
pub fn media_url(pack: &Url, directory: &str, file: &str) -> Result<Url> {
    let mut url = pack_url(pack)?;
    segments(&mut url)?.pop_if_empty().push(directory).push(file);
    Ok(url)
}

/// `<pack>/Animations/<name>/<name>_NN.png`, frames numbered from 1.
pub fn animation_frame_url(pack: &Url, name: &str, frame: usize) -> Result<Url> {
    let mut url = pack_url(pack)?;
    segments(&mut url)?
        .pop_if_empty()
        .push("Animations")
        .push(name)
        .push(&format!("{name}_{frame:02}.png"));
    Ok(url)
}

fn segments(url: &mut Url) -> Result<url::PathSegmentsMut<'_>> {
    let display = url.to_string();
    url.path_segments_mut()
        .map_err(|_| HuesError::UnsupportedUrl(display))
}
