//! A test case is the set of files making up one generated input.

use core::time::Duration;
use std::{
    fs,
    path::{Component, Path},
};

use crate::{server::Served, Error};

/// A single file of a [`TestCase`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TestFile {
    file_name: String,
    data: Vec<u8>,
    required: bool,
}

fn check_file_name(file_name: &str) -> Result<String, Error> {
    let normalized = file_name.replace('\\', "/");
    let path = Path::new(&normalized);
    let valid = !normalized.is_empty()
        && path
            .components()
            .all(|component| matches!(component, Component::Normal(_)));
    if !valid {
        return Err(Error::illegal_argument(format!(
            "invalid test file name {file_name:?}"
        )));
    }
    Ok(normalized)
}

impl TestFile {
    /// A test file holding `data`, stored as `file_name` relative to the test case root.
    pub fn from_data<D>(data: D, file_name: &str, required: bool) -> Result<Self, Error>
    where
        D: Into<Vec<u8>>,
    {
        Ok(Self {
            file_name: check_file_name(file_name)?,
            data: data.into(),
            required,
        })
    }

    /// Reads `path` into an optional test file named `file_name`.
    pub fn from_file<P>(path: P, file_name: &str) -> Result<Self, Error>
    where
        P: AsRef<Path>,
    {
        Self::from_data(fs::read(path)?, file_name, false)
    }

    /// Name relative to the test case root
    #[must_use]
    pub fn file_name(&self) -> &str {
        &self.file_name
    }

    /// File contents
    #[must_use]
    pub fn data(&self) -> &[u8] {
        &self.data
    }

    /// Required files have to be served before a delivery counts as complete.
    #[must_use]
    pub fn required(&self) -> bool {
        self.required
    }
}

/// One generated input: a landing page plus everything it pulls in.
#[derive(Debug, Clone)]
pub struct TestCase {
    adapter_name: String,
    duration: Option<Duration>,
    files: Vec<TestFile>,
    input_fname: Option<String>,
    landing_page: String,
    meta: Vec<TestFile>,
}

impl TestCase {
    /// An empty test case that opens `landing_page` first.
    #[must_use]
    pub fn new(landing_page: &str, adapter_name: &str) -> Self {
        Self {
            adapter_name: adapter_name.to_string(),
            duration: None,
            files: Vec::new(),
            input_fname: None,
            landing_page: landing_page.trim_start_matches('/').to_string(),
            meta: Vec::new(),
        }
    }

    /// Adds a data file. Adding a name twice is an error.
    pub fn add_file(&mut self, file: TestFile) -> Result<(), Error> {
        if self.contains(file.file_name()) {
            return Err(Error::illegal_argument(format!(
                "{:?} exists in test case",
                file.file_name()
            )));
        }
        self.files.push(file);
        Ok(())
    }

    /// Adds `data` as a data file.
    pub fn add_from_data<D>(
        &mut self,
        data: D,
        file_name: &str,
        required: bool,
    ) -> Result<(), Error>
    where
        D: Into<Vec<u8>>,
    {
        self.add_file(TestFile::from_data(data, file_name, required)?)
    }

    /// Adds a metadata file, replacing one of the same name. Metadata is kept with the
    /// test case but never served.
    pub fn add_meta(&mut self, file: TestFile) {
        self.meta.retain(|known| known.file_name() != file.file_name());
        self.meta.push(file);
    }

    /// Adds every file in `served` that was answered from below `path`, as an optional
    /// file named `<prefix>/<path relative to path>`.
    ///
    /// Files already in the test case are left alone.
    pub fn add_batch<P>(&mut self, path: P, served: &Served, prefix: &str) -> Result<(), Error>
    where
        P: AsRef<Path>,
    {
        let path = path.as_ref();
        for (_, local) in served.iter() {
            let Ok(relative) = local.strip_prefix(path) else {
                continue;
            };
            let relative = relative.to_string_lossy();
            let file_name = if prefix.is_empty() {
                relative.into_owned()
            } else {
                format!("{}/{relative}", prefix.trim_matches('/'))
            };
            if self.contains(&file_name) {
                continue;
            }
            self.add_file(TestFile::from_file(local, &file_name)?)?;
        }
        Ok(())
    }

    /// `true` if a data file named `file_name` is part of this test case.
    #[must_use]
    pub fn contains(&self, file_name: &str) -> bool {
        let file_name = file_name.trim_start_matches('/');
        self.files.iter().any(|file| file.file_name() == file_name)
    }

    /// Writes the data files below `dst`.
    pub fn dump<P>(&self, dst: P) -> Result<(), Error>
    where
        P: AsRef<Path>,
    {
        let dst = dst.as_ref();
        for file in &self.files {
            let target = dst.join(file.file_name());
            if let Some(parent) = target.parent() {
                fs::create_dir_all(parent)?;
            }
            fs::write(target, file.data())?;
        }
        Ok(())
    }

    /// Names of the files whose absence must not hold up a delivery.
    #[must_use]
    pub fn optional(&self) -> Vec<String> {
        self.files
            .iter()
            .filter(|file| !file.required())
            .map(|file| file.file_name().to_string())
            .collect()
    }

    /// Drops optional files that are not in `keep`.
    pub fn purge_optional(&mut self, keep: &Served) {
        self.files
            .retain(|file| file.required() || keep.contains(file.file_name()));
    }

    /// The entry point of the test case
    #[must_use]
    pub fn landing_page(&self) -> &str {
        &self.landing_page
    }

    /// Name of the adapter that generated this test case
    #[must_use]
    pub fn adapter_name(&self) -> &str {
        &self.adapter_name
    }

    /// Name of the input file the adapter built this test case from
    #[must_use]
    pub fn input_fname(&self) -> Option<&str> {
        self.input_fname.as_deref()
    }

    /// Sets the input file name
    pub fn set_input_fname(&mut self, input_fname: &str) {
        self.input_fname = Some(input_fname.to_string());
    }

    /// How long the delivery of this test case took
    #[must_use]
    pub fn duration(&self) -> Option<Duration> {
        self.duration
    }

    /// Sets the delivery duration
    pub fn set_duration(&mut self, duration: Duration) {
        self.duration = Some(duration);
    }

    /// Data files
    #[must_use]
    pub fn files(&self) -> &[TestFile] {
        &self.files
    }

    /// Metadata files
    #[must_use]
    pub fn meta(&self) -> &[TestFile] {
        &self.meta
    }
}
