//! Bundles the external collaborators (spec §6) that statement executors
//! need, plus the shared output writer (spec §5: "writes must be
//! individually line-atomic" — serialized through a mutex, never held across
//! an `await`).

use std::io::Write;
use std::sync::{Arc, Mutex};

use crate::traits::{Detector, IncludeCache, RemoteFetcher, SecretsStore, ShellRunner};

pub struct Services {
    pub shell: Arc<dyn ShellRunner>,
    pub secrets: Arc<dyn SecretsStore>,
    pub detector: Arc<dyn Detector>,
    pub fetcher: Arc<dyn RemoteFetcher>,
    pub cache: Arc<dyn IncludeCache>,
    pub writer: Arc<Mutex<dyn Write + Send>>,
    pub verbose: bool,
}

impl Services {
    /// Formats and writes one complete line, holding the writer lock only
    /// for the write itself.
    pub fn emit(&self, line: impl AsRef<str>) {
        let mut w = self.writer.lock().unwrap();
        let _ = writeln!(w, "{}", line.as_ref());
    }
}
