// Integration test utilities and fixtures for patchcheck.

use std::cell::Cell;
use std::path::{Path, PathBuf};
use std::process::Command;

use patchcheck_core::error::MailError;
use patchcheck_core::mail::{MailMessage, MailSource, mbox};

/// A commit id that no fixture repository contains.
pub const DANGLING_ID: &str = "deadbeefdeadbeefdeadbeefdeadbeefdeadbeef";

/// A test fixture with a temporary git repository.
#[derive(Debug)]
pub struct TestRepo {
    pub dir: tempfile::TempDir,
    commits: Cell<u32>,
}

impl Default for TestRepo {
    fn default() -> Self {
        Self::new()
    }
}

impl TestRepo {
    /// An empty repository with a committer identity configured.
    pub fn new() -> Self {
        let dir = tempfile::tempdir().expect("create tempdir");
        let root = dir.path();
        git(root, &["init", "-q"]);
        git(root, &["config", "user.email", "test@patchcheck.dev"]);
        git(root, &["config", "user.name", "Test"]);
        git(root, &["config", "commit.gpgsign", "false"]);
        Self {
            dir,
            commits: Cell::new(0),
        }
    }

    pub fn path(&self) -> &Path {
        self.dir.path()
    }

    /// Sets a repository-local config value.
    pub fn config(&self, key: &str, value: &str) {
        git(self.path(), &["config", key, value]);
    }

    pub fn write(&self, rel: &str, content: &str) {
        let path = self.path().join(rel);
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent).unwrap();
        }
        std::fs::write(path, content).unwrap();
    }

    /// Commits the whole working tree and returns the new HEAD id.
    ///
    /// Each commit is dated one minute after the previous one.
    pub fn commit(&self, message: &str) -> String {
        let n = self.commits.get();
        self.commits.set(n + 1);
        let date = format!("2025-01-15T10:{n:02}:00+00:00");
        git(self.path(), &["add", "-A"]);
        let output = Command::new("git")
            .args(["commit", "-q", "-m", message])
            .current_dir(self.path())
            .env("GIT_AUTHOR_DATE", &date)
            .env("GIT_COMMITTER_DATE", &date)
            .output()
            .expect("run git commit");
        assert!(
            output.status.success(),
            "git commit failed: {}",
            String::from_utf8_lossy(&output.stderr)
        );
        self.head()
    }

    pub fn head(&self) -> String {
        git(self.path(), &["rev-parse", "HEAD"]).trim().to_string()
    }

    /// `git diff <id>~1 <id>`, the text a backport email carries.
    pub fn diff_of(&self, id: &str) -> String {
        git(self.path(), &["diff", &format!("{id}~1"), id])
    }

    /// Upstream history with two files and follow-up work on one of them.
    pub fn upstream() -> Upstream {
        let repo = Self::new();

        repo.write("net/foo.c", FOO_C);
        repo.write("net/bar.c", BAR_C);
        repo.write("README", "Upstream tree\n");
        let base = repo.commit("Initial import");

        repo.write("net/foo.c", &FOO_C.replace("return y;", "return y + 1;"));
        let foo_change = repo.commit("net: foo: return one more\n\nCallers expect the offset.\n");

        repo.write("net/bar.c", &BAR_C.replace("return 2;", "return 3;"));
        let bar_change = repo.commit("net: bar: return three\n");

        let fixed = FOO_C
            .replace("return y;", "return y + 1;")
            .replace("return 0;", "return -1;");
        repo.write("net/foo.c", &fixed);
        let foo_fix = repo.commit("net: foo: report failure from foo_other\n");

        repo.write("README", "Upstream tree\n\nSee net/ for sources.\n");
        repo.commit("README: point at net/\n");

        repo.write("net/foo.c", &format!("/* foo helpers */\n{fixed}"));
        let foo_backref = repo.commit(&format!(
            "net: foo: add header comment\n\ncommit {DANGLING_ID} upstream.\n"
        ));

        Upstream {
            repo,
            base,
            foo_change,
            bar_change,
            foo_fix,
            foo_backref,
        }
    }
}

const FOO_C: &str = "#include \"foo.h\"

int foo(int x)
{
    int y = x * 2;
    return y;
}

int foo_other(void)
{
    return 0;
}
";

const BAR_C: &str = "int bar(void)
{
    return 2;
}
";

/// Commits of [`TestRepo::upstream`], oldest first.
///
/// `foo_fix` and `foo_backref` touch `net/foo.c` after `foo_change`;
/// `foo_backref` names [`DANGLING_ID`] as its upstream commit. An unrelated
/// README commit sits between them.
#[derive(Debug)]
pub struct Upstream {
    pub repo: TestRepo,
    pub base: String,
    pub foo_change: String,
    pub bar_change: String,
    pub foo_fix: String,
    pub foo_backref: String,
}

/// A stable backport email claiming `upstream` and carrying `diff`.
pub fn backport_email(subject: &str, upstream: &str, diff: &str) -> String {
    format!(
        "From: Backporter <stable@example.com>
Subject: {subject}
Date: Mon, 2 Jan 2023 15:04:05 +0000

commit {upstream} upstream.

Backported to the stable tree.

Signed-off-by: Backporter <stable@example.com>
---
{diff}"
    )
}

/// A review reply without a diff.
pub fn reply_email(subject: &str) -> String {
    format!(
        "From: Reviewer <review@example.com>
Subject: Re: {subject}

Looks good to me.
"
    )
}

/// Concatenates messages into one mbox stream.
pub fn mbox(messages: &[String]) -> String {
    messages
        .iter()
        .map(|message| format!("From stable@example.com Mon Jan  2 15:04:05 2023\n{message}\n"))
        .collect()
}

/// [`MailSource`] answering every query with a fixed mbox.
#[derive(Debug, Default)]
pub struct FakeMailSource {
    mbox: String,
}

impl FakeMailSource {
    pub fn new(mbox: impl Into<String>) -> Self {
        Self { mbox: mbox.into() }
    }
}

impl MailSource for FakeMailSource {
    fn query(&self, _terms: &[String]) -> Result<Vec<MailMessage>, MailError> {
        mbox::split(self.mbox.as_bytes())
    }
}

/// Writes a script standing in for `notmuch` that prints `mbox`.
#[cfg(unix)]
pub fn fake_notmuch(dir: &Path, mbox: &str) -> PathBuf {
    let mbox_path = dir.join("series.mbox");
    std::fs::write(&mbox_path, mbox).unwrap();
    script(dir, &format!("#!/bin/sh\ncat '{}'\n", mbox_path.display()))
}

/// Writes a script standing in for `notmuch` that fails.
#[cfg(unix)]
pub fn failing_notmuch(dir: &Path) -> PathBuf {
    script(dir, "#!/bin/sh\necho 'database locked' >&2\nexit 1\n")
}

#[cfg(unix)]
fn script(dir: &Path, body: &str) -> PathBuf {
    use std::os::unix::fs::PermissionsExt;

    let path = dir.join("notmuch");
    std::fs::write(&path, body).unwrap();
    std::fs::set_permissions(&path, std::fs::Permissions::from_mode(0o755)).unwrap();
    path
}

fn git(dir: &Path, args: &[&str]) -> String {
    let output = Command::new("git")
        .args(args)
        .current_dir(dir)
        .output()
        .unwrap_or_else(|e| panic!("git {}: {e}", args.join(" ")));
    if !output.status.success() {
        let stderr = String::from_utf8_lossy(&output.stderr);
        panic!("git {} failed: {stderr}", args.join(" "));
    }
    String::from_utf8_lossy(&output.stdout).into_owned()
}
