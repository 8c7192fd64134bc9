use anyhow::{anyhow, Context, Result};
use std::fs;
use std::path::{Path, PathBuf};
use std::process::Command;

/// A configured external command: program plus leading arguments.
///
/// Parsed from a shell-words string so `"sh /tmp/fake-launch.sh"` works as well
/// as a bare binary name.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CommandLine {
    pub program: String,
    pub args: Vec<String>,
}

impl CommandLine {
    pub fn parse(input: &str) -> Result<Self> {
        let mut words =
            shell_words::split(input).with_context(|| format!("parse command: {input}"))?;
        if words.is_empty() {
            return Err(anyhow!("command is empty"));
        }
        let program = words.remove(0);
        Ok(Self {
            program,
            args: words,
        })
    }

    /// Build a `Command` with the leading arguments already applied.
    pub fn command(&self) -> Command {
        let mut cmd = Command::new(&self.program);
        cmd.args(&self.args);
        cmd
    }

    /// Full argv (program, leading args, then `extra`).
    pub fn argv(&self, extra: &[String]) -> Vec<String> {
        let mut argv = Vec::with_capacity(1 + self.args.len() + extra.len());
        argv.push(self.program.clone());
        argv.extend(self.args.iter().cloned());
        argv.extend(extra.iter().cloned());
        argv
    }

    /// Shell-quoted command line, suitable for reproducing a run by hand.
    pub fn display_with(&self, extra: &[String]) -> String {
        shell_words::join(self.argv(extra))
    }

    /// Resolve the program on PATH (or as given when it contains a separator).
    pub fn locate(&self) -> Result<PathBuf> {
        which::which(&self.program).with_context(|| format!("locate {}", self.program))
    }
}

/// Resolve a command string: explicit value, then environment variable, then default.
pub fn resolve_command(explicit: Option<&str>, env_var: &str, default: &str) -> String {
    explicit
        .map(|s| s.to_string())
        .or_else(|| std::env::var(env_var).ok().filter(|v| !v.trim().is_empty()))
        .unwrap_or_else(|| default.to_string())
}

/// Create a directory and its parents; an existing directory is fine.
pub fn mkdir(dir: &Path) -> Result<()> {
    fs::create_dir_all(dir).with_context(|| format!("create {}", dir.display()))
}

pub fn is_uri(value: &str) -> bool {
    match value.split_once("://") {
        Some((scheme, _)) => {
            !scheme.is_empty()
                && scheme
                    .chars()
                    .all(|ch| ch.is_ascii_alphanumeric() || matches!(ch, '+' | '-' | '.'))
        }
        None => false,
    }
}

/// Convert a filesystem path into a `file://` URI, percent-encoding as needed.
pub fn path_to_uri(path: &Path) -> String {
    let text = path.to_string_lossy().replace('\\', "/");
    let mut encoded = String::with_capacity(text.len() + 8);
    encoded.push_str("file://");
    if !text.starts_with('/') {
        encoded.push('/');
    }
    for byte in text.bytes() {
        match byte {
            b'a'..=b'z'
            | b'A'..=b'Z'
            | b'0'..=b'9'
            | b'/'
            | b'-'
            | b'_'
            | b'.'
            | b'~'
            | b':'
            | b'@'
            | b'+'
            | b'=' => encoded.push(byte as char),
            _ => encoded.push_str(&format!("%{byte:02X}")),
        }
    }
    encoded
}

/// Convert a `file://` URI back into a path. Non-file URIs are returned as paths verbatim.
pub fn uri_to_path(uri: &str) -> PathBuf {
    let Some(rest) = uri.strip_prefix("file://") else {
        return PathBuf::from(uri);
    };
    let bytes = rest.as_bytes();
    let mut decoded = Vec::with_capacity(bytes.len());
    let mut idx = 0;
    while idx < bytes.len() {
        if bytes[idx] == b'%' && idx + 2 < bytes.len() {
            let hex = std::str::from_utf8(&bytes[idx + 1..idx + 3]).ok();
            if let Some(value) = hex.and_then(|hex| u8::from_str_radix(hex, 16).ok()) {
                decoded.push(value);
                idx += 3;
                continue;
            }
        }
        decoded.push(bytes[idx]);
        idx += 1;
    }
    let text = String::from_utf8_lossy(&decoded).into_owned();
    if cfg!(windows) {
        if let Some(stripped) = text.strip_prefix('/') {
            return PathBuf::from(stripped);
        }
    }
    PathBuf::from(text)
}

/// Quote a path or URI for GES: normalise separators and re-encode.
pub fn quote_uri(value: &str) -> String {
    let path = if is_uri(value) {
        uri_to_path(value)
    } else {
        PathBuf::from(value.replace('\\', "/"))
    };
    path_to_uri(&path)
}

pub fn collect_files_recursive(root: &Path) -> Result<Vec<PathBuf>> {
    let mut files = Vec::new();
    let mut stack = vec![root.to_path_buf()];
    while let Some(dir) = stack.pop() {
        let entries = fs::read_dir(&dir).with_context(|| format!("read {}", dir.display()))?;
        for entry in entries {
            let entry = entry.with_context(|| format!("read entry in {}", dir.display()))?;
            let path = entry.path();
            let file_type = entry
                .file_type()
                .with_context(|| format!("stat {}", path.display()))?;
            if file_type.is_dir() {
                stack.push(path);
            } else if file_type.is_file() {
                files.push(path);
            }
        }
    }
    files.sort();
    Ok(files)
}
