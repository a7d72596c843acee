//! `${git:branch}`, `${git:sha1}`, ...: values derived from the repository around the source
//! directory
//!
//! Commands run through a [GitRunner] so tests can swap out the real `git` binary. Results are
//! memoized per request; a command that fails, is missing or outlasts [Options::git_timeout] is
//! "not found".
//!
//! [Options::git_timeout]: crate::options::Options::git_timeout
use super::{Outcome, Request, ResolverFailure, ResolverResult};
use crate::cache::CacheKey;
use futures::future::BoxFuture;
use futures::FutureExt;
use std::path::Path;

/// Runs git commands
pub trait GitRunner: Send + Sync + std::fmt::Debug {
    /// Trimmed stdout of `git <args>` run in `directory`, `None` on any failure
    fn run<'a>(
        &'a self,
        directory: &'a Path,
        args: &'a [&'a str],
    ) -> BoxFuture<'a, Option<String>>;
}

/// Spawns the `git` binary found on `PATH`
///
/// The child is killed when the returned future is dropped.
#[derive(Debug, Default, Clone, Copy)]
pub struct CommandGitRunner;

impl GitRunner for CommandGitRunner {
    fn run<'a>(
        &'a self,
        directory: &'a Path,
        args: &'a [&'a str],
    ) -> BoxFuture<'a, Option<String>> {
        async move {
            let mut command = tokio::process::Command::new("git");
            command.args(args).current_dir(directory).kill_on_drop(true);

            let output = match command.output().await {
                Err(error) => {
                    tracing::debug!(?args, %error, "unable to run git");
                    return None;
                }
                Ok(output) => output,
            };

            if !output.status.success() {
                tracing::debug!(?args, status = %output.status, "git command failed");
                return None;
            }

            let stdout = String::from_utf8_lossy(&output.stdout).trim().to_string();
            (!stdout.is_empty()).then_some(stdout)
        }
        .boxed()
    }
}

/// The values `git:` can produce
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GitKey {
    Branch,
    Sha1,
    Commit,
    Message,
    Remote,
    Repository,
    Tag,
    Dir,
    User,
    Email,
    Timestamp,
}

impl GitKey {
    pub const ALL: [GitKey; 11] = [
        GitKey::Branch,
        GitKey::Sha1,
        GitKey::Commit,
        GitKey::Message,
        GitKey::Remote,
        GitKey::Repository,
        GitKey::Tag,
        GitKey::Dir,
        GitKey::User,
        GitKey::Email,
        GitKey::Timestamp,
    ];

    pub fn name(&self) -> &'static str {
        match self {
            GitKey::Branch => "branch",
            GitKey::Sha1 => "sha1",
            GitKey::Commit => "commit",
            GitKey::Message => "message",
            GitKey::Remote => "remote",
            GitKey::Repository => "repository",
            GitKey::Tag => "tag",
            GitKey::Dir => "dir",
            GitKey::User => "user",
            GitKey::Email => "email",
            GitKey::Timestamp => "timestamp",
        }
    }

    fn args(&self) -> &'static [&'static str] {
        match self {
            GitKey::Branch => &["rev-parse", "--abbrev-ref", "HEAD"],
            GitKey::Sha1 => &["rev-parse", "--short", "HEAD"],
            GitKey::Commit => &["rev-parse", "HEAD"],
            GitKey::Message => &["log", "-1", "--pretty=%B"],
            GitKey::Remote | GitKey::Repository => &["config", "--get", "remote.origin.url"],
            GitKey::Tag => &["describe", "--tags", "--abbrev=0"],
            GitKey::Dir => &["rev-parse", "--show-toplevel"],
            GitKey::User => &["config", "user.name"],
            GitKey::Email => &["config", "user.email"],
            GitKey::Timestamp => &["log", "-1", "--format=%cI"],
        }
    }
}

impl std::str::FromStr for GitKey {
    type Err = ResolverFailure;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        GitKey::ALL
            .into_iter()
            .find(|key| key.name().eq_ignore_ascii_case(s))
            .ok_or_else(|| {
                let known: Vec<&str> = GitKey::ALL.iter().map(GitKey::name).collect();
                ResolverFailure::Syntax(format!(
                    "unknown git value `{s}`, expected one of {}",
                    known.join(", ")
                ))
            })
    }
}

/// `owner/name` out of `git@host:owner/name.git` or `https://host/owner/name.git`
pub fn repository_name(remote: &str) -> Option<String> {
    let trimmed = remote.trim().trim_end_matches('/');
    let trimmed = trimmed.strip_suffix(".git").unwrap_or(trimmed);
    let mut parts = trimmed.rsplit(['/', ':']);
    let name = parts.next().filter(|s| !s.is_empty())?;
    let owner = parts.next().filter(|s| !s.is_empty())?;
    Some(format!("{owner}/{name}"))
}

pub(crate) async fn resolve(request: Request<'_>) -> ResolverResult {
    let key: GitKey = request.key("git")?.parse()?;
    let context = request.context;
    let directory = &context.source_directory;

    let cache_key = CacheKey::new(directory, "git", key.name());
    if let Some(cached) = context.cache.get(&cache_key) {
        return Ok(found_or_missing(key, directory, cached));
    }

    let command = context.git.run(directory, key.args());
    let output = match tokio::time::timeout(context.git_timeout, command).await {
        Ok(output) => output,
        Err(_) => {
            tracing::debug!(key = key.name(), timeout = ?context.git_timeout, "git timed out");
            None
        }
    };

    let value = match key {
        GitKey::Repository => output.as_deref().and_then(repository_name),
        _ => output,
    }
    .map(crate::value::Value::from);

    context.cache.insert(cache_key, value.clone());
    Ok(found_or_missing(key, directory, value))
}

fn found_or_missing(
    key: GitKey,
    directory: &Path,
    value: Option<crate::value::Value>,
) -> Outcome {
    match value {
        Some(value) => Outcome::Found(value),
        None => Outcome::NotFound(format!(
            "git {} is not available in {}",
            key.name(),
            directory.display()
        )),
    }
}

#[cfg(test)]
pub(crate) mod test {
    use super::*;
    use crate::engine::Context;
    use crate::options::Options;
    use crate::resolvers::test::request;
    use crate::value::Value;
    use pretty_assertions::assert_eq;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;
    use std::time::Duration;

    /// Answers from a fixed table and counts invocations
    #[derive(Debug, Default)]
    pub(crate) struct FakeGit {
        pub answers: Vec<(&'static str, &'static str)>,
        pub calls: Arc<AtomicUsize>,
    }

    impl GitRunner for FakeGit {
        fn run<'a>(
            &'a self,
            _directory: &'a Path,
            args: &'a [&'a str],
        ) -> BoxFuture<'a, Option<String>> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            let joined = args.join(" ");
            let answer = self
                .answers
                .iter()
                .find(|(command, _)| *command == joined)
                .map(|(_, answer)| answer.to_string());
            futures::future::ready(answer).boxed()
        }
    }

    /// Never answers within any reasonable timeout
    #[derive(Debug)]
    struct SlowGit;

    impl GitRunner for SlowGit {
        fn run<'a>(
            &'a self,
            _directory: &'a Path,
            _args: &'a [&'a str],
        ) -> BoxFuture<'a, Option<String>> {
            async {
                tokio::time::sleep(Duration::from_secs(10)).await;
                Some("late".to_string())
            }
            .boxed()
        }
    }

    #[test]
    fn repository_names() {
        assert_eq!(
            repository_name("git@github.com:owner/project.git").as_deref(),
            Some("owner/project")
        );
        assert_eq!(
            repository_name("https://github.com/owner/project").as_deref(),
            Some("owner/project")
        );
        assert_eq!(repository_name("project"), None);
    }

    #[tokio::test]
    async fn values_are_memoized() {
        let calls = Arc::new(AtomicUsize::new(0));
        let git = FakeGit {
            answers: vec![
                ("rev-parse --abbrev-ref HEAD", "main"),
                ("config --get remote.origin.url", "git@github.com:owner/project.git"),
            ],
            calls: calls.clone(),
        };
        let options = Options::new().with_git(git);
        let context = Context::new(Value::default(), &options, std::env::temp_dir());

        for _ in 0..3 {
            assert_eq!(
                resolve(request("git:branch", &context)).await,
                Ok(Outcome::Found("main".into()))
            );
        }
        assert_eq!(calls.load(Ordering::SeqCst), 1);

        assert_eq!(
            resolve(request("git:repository", &context)).await,
            Ok(Outcome::Found("owner/project".into()))
        );
        assert!(matches!(
            resolve(request("git:tag", &context)).await,
            Ok(Outcome::NotFound(_))
        ));
    }

    #[tokio::test]
    async fn slow_commands_are_not_found() {
        let options = Options::new()
            .with_git(SlowGit)
            .with_git_timeout(Duration::from_millis(20));
        let context = Context::new(Value::default(), &options, std::env::temp_dir());

        let started = std::time::Instant::now();
        assert!(matches!(
            resolve(request("git:branch", &context)).await,
            Ok(Outcome::NotFound(_))
        ));
        assert!(started.elapsed() < Duration::from_secs(5));
    }

    #[tokio::test]
    async fn unknown_keys_are_syntax_errors() {
        let context = Context::new(Value::default(), &Options::default(), std::env::temp_dir());
        assert!(matches!(
            resolve(request("git:favourite-colour", &context)).await,
            Err(ResolverFailure::Syntax(_))
        ));
    }
}
