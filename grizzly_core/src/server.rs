//! The serving layer hands test case files to the target over a local transport.
//!
//! The actual server is external, see [`Server`]. This module holds the types crossing
//! that boundary: the [`ServerMap`] route table, the [`Served`] record of what was
//! requested and the [`ServeStatus`].

use core::fmt::{self, Debug, Formatter};
use std::path::{Path, PathBuf};

use hashbrown::HashMap;

use crate::Error;

/// How a [`Server::serve_path`] call ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ServeStatus {
    /// Every required file was served.
    All,
    /// The target requested nothing.
    None,
    /// The continue callback stopped serving before all required files were requested.
    Request,
    /// The server gave up waiting.
    Timeout,
}

/// Files served during one delivery, in request order.
///
/// Maps the requested path (relative, no leading `/`) to the local file that answered it.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Served {
    entries: Vec<(String, PathBuf)>,
}

impl Served {
    /// An empty record
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Records that `url` was answered with `local`.
    ///
    /// A second request for the same path keeps the position of the first one.
    pub fn insert<U, P>(&mut self, url: U, local: P)
    where
        U: Into<String>,
        P: Into<PathBuf>,
    {
        let url = url.into();
        let local = local.into();
        if let Some(entry) = self.entries.iter_mut().find(|(known, _)| *known == url) {
            entry.1 = local;
        } else {
            self.entries.push((url, local));
        }
    }

    /// `true` if `url` was requested.
    #[must_use]
    pub fn contains(&self, url: &str) -> bool {
        self.entries.iter().any(|(known, _)| known == url)
    }

    /// The local file served for `url`.
    #[must_use]
    pub fn get(&self, url: &str) -> Option<&Path> {
        self.entries
            .iter()
            .find(|(known, _)| known == url)
            .map(|(_, local)| local.as_path())
    }

    /// Iterates requested paths and local files in request order.
    pub fn iter(&self) -> impl Iterator<Item = (&str, &Path)> {
        self.entries
            .iter()
            .map(|(url, local)| (url.as_str(), local.as_path()))
    }

    /// Number of served files
    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// `true` if nothing was served
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

impl<U, P> FromIterator<(U, P)> for Served
where
    U: Into<String>,
    P: Into<PathBuf>,
{
    fn from_iter<I: IntoIterator<Item = (U, P)>>(iter: I) -> Self {
        let mut served = Served::new();
        for (url, local) in iter {
            served.insert(url, local);
        }
        served
    }
}

/// Callback producing the body of a dynamic response.
pub type DynamicCallback = Box<dyn FnMut() -> Vec<u8>>;

/// A response generated on request.
pub struct DynamicResource {
    callback: DynamicCallback,
    mime: String,
}

impl DynamicResource {
    /// The mime type of the response
    #[must_use]
    pub fn mime(&self) -> &str {
        &self.mime
    }

    /// Produces the response body.
    pub fn respond(&mut self) -> Vec<u8> {
        (self.callback)()
    }
}

impl Debug for DynamicResource {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        f.debug_struct("DynamicResource")
            .field("mime", &self.mime)
            .finish_non_exhaustive()
    }
}

/// A redirect to another served path.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RedirectResource {
    /// Path the redirect points at
    pub target: String,
    /// Whether the server has to see this redirect requested before it is done.
    pub required: bool,
}

/// Route table handed to the server alongside the test case root.
///
/// * dynamic: paths answered by a callback
/// * include: url prefixes served from a local directory outside the test case
/// * redirect: paths redirected to other served paths
#[derive(Debug, Default)]
pub struct ServerMap {
    dynamic: HashMap<String, DynamicResource>,
    include: HashMap<String, PathBuf>,
    redirect: HashMap<String, RedirectResource>,
}

fn check_url(url: &str) -> Result<String, Error> {
    let url = url.trim_matches('/');
    let valid = url
        .chars()
        .all(|c| c.is_ascii_alphanumeric() || matches!(c, '_' | '-' | '.' | '~' | '/'));
    if !valid || url.split('/').any(|part| part == "..") {
        return Err(Error::illegal_argument(format!("invalid url {url:?}")));
    }
    Ok(url.to_string())
}

impl ServerMap {
    /// An empty route table
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Answers `url` with the output of `callback`.
    pub fn set_dynamic_response<F>(
        &mut self,
        url: &str,
        callback: F,
        mime: &str,
    ) -> Result<(), Error>
    where
        F: FnMut() -> Vec<u8> + 'static,
    {
        let url = check_url(url)?;
        if url.is_empty() {
            return Err(Error::illegal_argument("dynamic response needs a url"));
        }
        if self.include.contains_key(&url) || self.redirect.contains_key(&url) {
            return Err(Error::illegal_argument(format!("{url:?} is already in use")));
        }
        self.dynamic.insert(
            url,
            DynamicResource {
                callback: Box::new(callback),
                mime: mime.to_string(),
            },
        );
        Ok(())
    }

    /// Serves the contents of `target_path` below the `url` prefix.
    pub fn set_include<P>(&mut self, url: &str, target_path: P) -> Result<(), Error>
    where
        P: AsRef<Path>,
    {
        let url = check_url(url)?;
        let target_path = target_path.as_ref();
        if !target_path.is_dir() {
            return Err(Error::illegal_argument(format!(
                "include path {} is not a directory",
                target_path.display()
            )));
        }
        if self.dynamic.contains_key(&url) || self.redirect.contains_key(&url) {
            return Err(Error::illegal_argument(format!("{url:?} is already in use")));
        }
        self.include.insert(url, target_path.to_path_buf());
        Ok(())
    }

    /// Redirects `url` to `target`, replacing an existing redirect of the same url.
    pub fn set_redirect(&mut self, url: &str, target: &str, required: bool) -> Result<(), Error> {
        let url = check_url(url)?;
        if url.is_empty() || target.is_empty() {
            return Err(Error::illegal_argument("redirect needs a url and a target"));
        }
        if self.dynamic.contains_key(&url) || self.include.contains_key(&url) {
            return Err(Error::illegal_argument(format!("{url:?} is already in use")));
        }
        self.redirect.insert(
            url,
            RedirectResource {
                target: target.to_string(),
                required,
            },
        );
        Ok(())
    }

    /// Dynamic responses by url
    #[must_use]
    pub fn dynamic(&self) -> &HashMap<String, DynamicResource> {
        &self.dynamic
    }

    /// Looks up the dynamic response for `url`.
    pub fn dynamic_mut(&mut self, url: &str) -> Option<&mut DynamicResource> {
        self.dynamic.get_mut(url.trim_matches('/'))
    }

    /// Included directories by url prefix
    #[must_use]
    pub fn include(&self) -> &HashMap<String, PathBuf> {
        &self.include
    }

    /// Redirects by url
    #[must_use]
    pub fn redirect(&self) -> &HashMap<String, RedirectResource> {
        &self.redirect
    }
}

/// The local server that answers the target's requests.
pub trait Server {
    /// The port the server listens on.
    fn port(&self) -> u16;

    /// Drops queued requests left over from an earlier delivery.
    fn clear_backlog(&mut self);

    /// Serves the files below `path` until every required file was requested, the
    /// server times out, or `continue_cb` returns `false`.
    ///
    /// `continue_cb` is polled frequently from the serving loop. With `forever` set the
    /// server ignores its own timeout and only stops once `continue_cb` says so.
    /// Files in `optional_files` are served if requested but never waited for.
    fn serve_path(
        &mut self,
        path: &Path,
        continue_cb: &mut dyn FnMut() -> bool,
        forever: bool,
        optional_files: &[String],
        server_map: &mut ServerMap,
    ) -> Result<(ServeStatus, Served), Error>;
}
