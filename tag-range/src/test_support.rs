//! Test-only helpers: scripted collaborators and a throwaway git repository.

use std::cell::RefCell;
use std::collections::{HashMap, HashSet};
use std::io::{BufRead, BufReader, ErrorKind, Write};
use std::net::{TcpListener, TcpStream};
use std::path::Path;
use std::process::Command;
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};

use anyhow::{Context, Result, anyhow, bail};
use chrono::{DateTime, Utc};
use tempfile::TempDir;

use crate::core::types::{CommitId, RunQuery, RunRecord};
use crate::io::actions::OutputSink;
use crate::io::git::VersionControl;
use crate::io::github::RunHistory;

/// In-memory version-control collaborator.
///
/// Records every tag-membership check so tests can assert scan order.
#[derive(Debug, Default)]
pub struct FakeVcs {
    head: Option<CommitId>,
    refs: HashMap<String, CommitId>,
    root: Option<CommitId>,
    root_error: Option<String>,
    tags: HashSet<CommitId>,
    tag_checks: RefCell<Vec<String>>,
}

impl FakeVcs {
    pub fn new(head: &str) -> Self {
        Self {
            head: Some(CommitId::new(head)),
            ..Self::default()
        }
    }

    /// A repository whose HEAD cannot be resolved.
    pub fn headless() -> Self {
        Self::default()
    }

    pub fn with_ref(mut self, reference: &str, commit: &str) -> Self {
        self.refs
            .insert(reference.to_string(), CommitId::new(commit));
        self
    }

    pub fn with_root(mut self, commit: &str) -> Self {
        self.root = Some(CommitId::new(commit));
        self
    }

    pub fn with_root_error(mut self, message: &str) -> Self {
        self.root_error = Some(message.to_string());
        self
    }

    pub fn with_tags(mut self, commits: &[&str]) -> Self {
        self.tags.extend(commits.iter().map(CommitId::new));
        self
    }

    /// Commits passed to `is_exact_tag_match`, in call order.
    pub fn tag_checks(&self) -> Vec<String> {
        self.tag_checks.borrow().clone()
    }
}

impl VersionControl for FakeVcs {
    fn resolve_ref(&self, reference: &str) -> Result<CommitId> {
        self.refs
            .get(reference)
            .cloned()
            .ok_or_else(|| anyhow!("unknown revision '{reference}'"))
    }

    fn head_commit(&self) -> Result<CommitId> {
        self.head
            .clone()
            .ok_or_else(|| anyhow!("ambiguous argument 'HEAD'"))
    }

    fn root_commit(&self) -> Result<Option<CommitId>> {
        if let Some(message) = &self.root_error {
            bail!("{message}");
        }
        Ok(self.root.clone())
    }

    fn is_exact_tag_match(&self, commit: &CommitId) -> bool {
        self.tag_checks
            .borrow_mut()
            .push(commit.as_str().to_string());
        self.tags.contains(commit)
    }
}

/// Run-history collaborator that returns a fixed response.
#[derive(Debug)]
pub struct ScriptedHistory {
    response: std::result::Result<Vec<RunRecord>, String>,
    queries: RefCell<Vec<RunQuery>>,
}

impl ScriptedHistory {
    pub fn new(runs: Vec<RunRecord>) -> Self {
        Self {
            response: Ok(runs),
            queries: RefCell::new(Vec::new()),
        }
    }

    pub fn failing(message: &str) -> Self {
        Self {
            response: Err(message.to_string()),
            queries: RefCell::new(Vec::new()),
        }
    }

    /// Queries received so far.
    pub fn queries(&self) -> Vec<RunQuery> {
        self.queries.borrow().clone()
    }
}

impl RunHistory for ScriptedHistory {
    fn list_runs(&self, query: &RunQuery) -> Result<Vec<RunRecord>> {
        self.queries.borrow_mut().push(query.clone());
        self.response.clone().map_err(|message| anyhow!(message))
    }
}

/// Output sink that keeps outputs in memory and rejects a second write.
#[derive(Debug, Default)]
pub struct MemoryOutputs {
    entries: Vec<(String, String)>,
}

impl MemoryOutputs {
    pub fn get(&self, name: &str) -> Option<&str> {
        self.entries
            .iter()
            .find(|(key, _)| key == name)
            .map(|(_, value)| value.as_str())
    }

    pub fn names(&self) -> Vec<&str> {
        self.entries.iter().map(|(key, _)| key.as_str()).collect()
    }
}

impl OutputSink for MemoryOutputs {
    fn set_output(&mut self, name: &str, value: &str) -> Result<()> {
        if self.get(name).is_some() {
            bail!("output {name} already set");
        }
        self.entries.push((name.to_string(), value.to_string()));
        Ok(())
    }
}

/// Query used by resolver tests.
pub fn run_query() -> RunQuery {
    RunQuery {
        owner: "octo".to_string(),
        repo: "widgets".to_string(),
        workflow: "release.yml".to_string(),
        event: "push".to_string(),
        status: "success".to_string(),
    }
}

/// Successful push run without a timestamp.
pub fn run_record(id: u64, sha: &str) -> RunRecord {
    RunRecord {
        id,
        name: Some("Release".to_string()),
        head_sha: CommitId::new(sha),
        event: Some("push".to_string()),
        status: Some("completed".to_string()),
        conclusion: Some("success".to_string()),
        created_at: None,
    }
}

/// Successful push run created at an RFC 3339 timestamp.
pub fn run_record_at(id: u64, sha: &str, created_at: &str) -> RunRecord {
    let created_at: DateTime<Utc> = created_at.parse().expect("valid RFC 3339 timestamp");
    RunRecord {
        created_at: Some(created_at),
        ..run_record(id, sha)
    }
}

/// Throwaway git repository in a temp directory.
pub struct TestRepo {
    dir: TempDir,
}

impl TestRepo {
    /// `git init` with a local identity and signing disabled.
    pub fn new() -> Result<Self> {
        let dir = tempfile::tempdir().context("create temp repo dir")?;
        let repo = Self { dir };
        repo.git(&["init", "-q"])?;
        repo.git(&["config", "user.name", "Tag Range Tests"])?;
        repo.git(&["config", "user.email", "tests@example.com"])?;
        repo.git(&["config", "commit.gpgsign", "false"])?;
        repo.git(&["config", "tag.gpgsign", "false"])?;
        Ok(repo)
    }

    pub fn path(&self) -> &Path {
        self.dir.path()
    }

    /// Create an empty commit and return its id.
    pub fn commit(&self, message: &str) -> Result<CommitId> {
        self.git(&["commit", "-q", "--allow-empty", "-m", message])?;
        Ok(CommitId::new(self.git(&["rev-parse", "HEAD"])?))
    }

    /// Lightweight tag at HEAD.
    pub fn tag(&self, name: &str) -> Result<()> {
        self.git(&["tag", name])?;
        Ok(())
    }

    /// Annotated tag at HEAD.
    pub fn annotated_tag(&self, name: &str) -> Result<()> {
        self.git(&["tag", "-a", name, "-m", name])?;
        Ok(())
    }

    pub fn git(&self, args: &[&str]) -> Result<String> {
        let output = Command::new("git")
            .args(args)
            .current_dir(self.dir.path())
            .output()
            .with_context(|| format!("spawn git {}", args.join(" ")))?;
        if !output.status.success() {
            bail!(
                "git {} failed: {}",
                args.join(" "),
                String::from_utf8_lossy(&output.stderr).trim()
            );
        }
        Ok(String::from_utf8_lossy(&output.stdout).trim().to_string())
    }
}

/// Loopback HTTP server that answers exactly one request with a canned
/// response and hands back the raw request head.
pub struct MockGithub {
    url: String,
    handle: JoinHandle<Result<String>>,
}

impl MockGithub {
    const ACCEPT_TIMEOUT: Duration = Duration::from_secs(10);

    pub fn serve(status: u16, body: &str) -> Result<Self> {
        let listener = TcpListener::bind("127.0.0.1:0").context("bind mock listener")?;
        listener.set_nonblocking(true).context("set mock listener nonblocking")?;
        let url = format!("http://{}", listener.local_addr()?);
        let response = format!(
            "HTTP/1.1 {status} {reason}\r\n\
             Content-Type: application/json\r\n\
             Content-Length: {length}\r\n\
             Connection: close\r\n\r\n{body}",
            reason = reason_phrase(status),
            length = body.len()
        );
        let handle = thread::spawn(move || answer_once(&listener, &response));
        Ok(Self { url, handle })
    }

    /// Base URL to use as the API root.
    pub fn url(&self) -> &str {
        &self.url
    }

    /// Wait for the request and return its request line and headers.
    pub fn request(self) -> Result<String> {
        self.handle
            .join()
            .map_err(|_| anyhow!("mock server thread panicked"))?
    }
}

fn answer_once(listener: &TcpListener, response: &str) -> Result<String> {
    let deadline = Instant::now() + MockGithub::ACCEPT_TIMEOUT;
    let mut stream = loop {
        match listener.accept() {
            Ok((stream, _)) => break stream,
            Err(err) if err.kind() == ErrorKind::WouldBlock => {
                if Instant::now() > deadline {
                    bail!("no request reached the mock server");
                }
                thread::sleep(Duration::from_millis(10));
            }
            Err(err) => return Err(err).context("accept mock connection"),
        }
    };
    stream.set_nonblocking(false)?;
    stream.set_read_timeout(Some(Duration::from_secs(5)))?;
    let head = read_request_head(&mut stream)?;
    stream.write_all(response.as_bytes()).context("write mock response")?;
    stream.flush()?;
    Ok(head)
}

fn read_request_head(stream: &mut TcpStream) -> Result<String> {
    let mut reader = BufReader::new(stream);
    let mut head = String::new();
    loop {
        let mut line = String::new();
        let read = reader.read_line(&mut line).context("read mock request")?;
        if read == 0 || line == "\r\n" {
            return Ok(head);
        }
        head.push_str(&line);
    }
}

fn reason_phrase(status: u16) -> &'static str {
    match status {
        200 => "OK",
        401 => "Unauthorized",
        404 => "Not Found",
        500 => "Internal Server Error",
        _ => "Status",
    }
}
