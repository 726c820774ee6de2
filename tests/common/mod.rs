#![allow(dead_code)]

use std::io::{Cursor, Write};
use std::path::{Path, PathBuf};
use std::sync::Mutex;

use roadrunners::contract::{BuildState, Invocation, ProcessOutput, StatusReporter};
use zip::write::FileOptions;

/// A zip with the given `(name, body)` files.
pub fn zip_bytes(files: &[(&str, &[u8])]) -> Vec<u8> {
    let mut writer = zip::ZipWriter::new(Cursor::new(Vec::new()));
    for (name, body) in files {
        writer.start_file(*name, FileOptions::default()).unwrap();
        writer.write_all(body).unwrap();
    }
    writer.finish().unwrap().into_inner()
}

/// What the repository serves for `/complete`: one `{id}_{version}_complete`
/// directory.
pub fn complete_zip(entry: &str) -> Vec<u8> {
    let collection = format!("{entry}/collection.xml");
    let module = format!("{entry}/m10000/index.cnxml");
    zip_bytes(&[
        (collection.as_str(), b"<collection/>".as_slice()),
        (module.as_str(), b"<document/>".as_slice()),
    ])
}

/// What the repository serves for `/offline`: the collection lives under
/// `content/`.
pub fn offline_zip(entry: &str) -> Vec<u8> {
    let collection = format!("{entry}/content/collection.xml");
    let index = format!("{entry}/index.html");
    zip_bytes(&[
        (collection.as_str(), b"<collection/>".as_slice()),
        (index.as_str(), b"<html/>".as_slice()),
    ])
}

/// Collects every status update for later assertions.
#[derive(Default)]
pub struct RecordingReporter {
    updates: Mutex<Vec<(BuildState, String)>>,
}

impl RecordingReporter {
    pub fn updates(&self) -> Vec<(BuildState, String)> {
        self.updates.lock().unwrap().clone()
    }

    pub fn states(&self) -> Vec<BuildState> {
        self.updates().into_iter().map(|(state, _)| state).collect()
    }

    pub fn last(&self) -> (BuildState, String) {
        self.updates().last().cloned().expect("at least one status update")
    }
}

impl StatusReporter for RecordingReporter {
    fn set_status(&self, state: BuildState, message: &str) {
        self.updates.lock().unwrap().push((state, message.to_string()));
    }
}

pub fn ok(stdout: &str) -> ProcessOutput {
    ProcessOutput {
        code: Some(0),
        stdout: stdout.to_string(),
        stderr: String::new(),
    }
}

pub fn failed(code: i32, stderr: &str) -> ProcessOutput {
    ProcessOutput {
        code: Some(code),
        stdout: String::new(),
        stderr: stderr.to_string(),
    }
}

/// The argument following `flag`.
pub fn arg_after(invocation: &Invocation, flag: &str) -> PathBuf {
    let index = invocation
        .args
        .iter()
        .position(|a| a == flag)
        .unwrap_or_else(|| panic!("{flag} missing from {}", invocation.display()));
    PathBuf::from(&invocation.args[index + 1])
}

pub fn last_arg(invocation: &Invocation) -> PathBuf {
    PathBuf::from(invocation.args.last().expect("arguments"))
}

pub fn write_file(path: &Path, body: &[u8]) {
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent).unwrap();
    }
    std::fs::write(path, body).unwrap();
}
