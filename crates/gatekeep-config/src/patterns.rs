//! Branch and commit-message pattern compilation.
//!
//! Branch patterns use the `+:<glob>` / `-:<glob>` syntax, where `*` matches
//! across `/`. A bare pattern is an include. `<default>` stands for the
//! definition's default branch.
//!
//! Commit-message rules use `+:comment=<glob>:<path-glob>`. The comment glob
//! is unanchored and tried against each line of the message, so `nobuild`
//! matches `"nobuild: skip this"`. A `regex:` prefix (`comment=regex:^docs:**`)
//! searches with a regular expression instead. The path glob is matched
//! against the changed paths of the event.
//!
//! Branch limits use `<branch-pattern>:<max>`, e.g. `release/*:1`.

use gatekeep_core::event::strip_ref_prefix;
use gatekeep_core::{Error, Result};
use globset::{GlobBuilder, GlobMatcher};
use regex::Regex;

const DEFAULT_BRANCH_TOKEN: &str = "<default>";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Polarity {
    Include,
    Exclude,
}

impl Polarity {
    fn split(raw: &str) -> (Polarity, &str) {
        if let Some(rest) = raw.strip_prefix("+:") {
            (Polarity::Include, rest)
        } else if let Some(rest) = raw.strip_prefix("-:") {
            (Polarity::Exclude, rest)
        } else {
            (Polarity::Include, raw)
        }
    }

    pub fn is_include(self) -> bool {
        self == Polarity::Include
    }
}

#[derive(Debug, Clone)]
enum BranchTarget {
    DefaultBranch,
    Glob(GlobMatcher),
}

/// A compiled `+:`/`-:` branch pattern.
#[derive(Debug, Clone)]
pub struct BranchPattern {
    raw: String,
    polarity: Polarity,
    target: BranchTarget,
}

impl BranchPattern {
    pub fn parse(raw: &str) -> Result<Self> {
        let (polarity, body) = Polarity::split(raw.trim());
        let body = strip_ref_prefix(body.trim());
        if body.is_empty() {
            return Err(Error::malformed(raw, "empty branch pattern"));
        }

        let target = if body == DEFAULT_BRANCH_TOKEN {
            BranchTarget::DefaultBranch
        } else {
            let glob = GlobBuilder::new(body)
                .literal_separator(false)
                .build()
                .map_err(|e| Error::malformed(raw, e))?;
            BranchTarget::Glob(glob.compile_matcher())
        };

        Ok(Self {
            raw: raw.to_string(),
            polarity,
            target,
        })
    }

    pub fn raw(&self) -> &str {
        &self.raw
    }

    pub fn polarity(&self) -> Polarity {
        self.polarity
    }

    /// Whether the pattern body matches `branch`, ignoring polarity.
    pub fn matches(&self, branch: &str, default_branch: Option<&str>) -> bool {
        let branch = strip_ref_prefix(branch);
        match &self.target {
            BranchTarget::DefaultBranch => {
                default_branch.is_some_and(|d| strip_ref_prefix(d) == branch)
            }
            BranchTarget::Glob(glob) => glob.is_match(branch),
        }
    }
}

#[derive(Debug, Clone)]
enum CommentMatcher {
    Glob(GlobMatcher),
    Regex(Regex),
}

impl CommentMatcher {
    fn parse(raw: &str, comment: &str) -> Result<Self> {
        if let Some(expr) = comment.strip_prefix(REGEX_PREFIX) {
            if expr.is_empty() {
                return Err(Error::malformed(raw, "empty comment regex"));
            }
            let regex = Regex::new(expr).map_err(|e| Error::malformed(raw, e))?;
            return Ok(Self::Regex(regex));
        }
        let glob = GlobBuilder::new(&format!("*{comment}*"))
            .literal_separator(false)
            .build()
            .map_err(|e| Error::malformed(raw, e))?;
        Ok(Self::Glob(glob.compile_matcher()))
    }

    fn is_match(&self, message: &str) -> bool {
        match self {
            Self::Regex(regex) => regex.is_match(message),
            Self::Glob(glob) if message.is_empty() => glob.is_match(""),
            Self::Glob(glob) => message.lines().any(|line| glob.is_match(line)),
        }
    }
}

const REGEX_PREFIX: &str = "regex:";

/// A compiled `comment=<glob>:<path-glob>` rule.
#[derive(Debug, Clone)]
pub struct CommentRule {
    raw: String,
    polarity: Polarity,
    comment: CommentMatcher,
    paths: GlobMatcher,
}

impl CommentRule {
    pub fn parse(raw: &str) -> Result<Self> {
        let (polarity, body) = Polarity::split(raw.trim());
        let Some(condition) = body.strip_prefix("comment=") else {
            return Err(Error::malformed(
                raw,
                "expected comment=<glob>:<path-glob>",
            ));
        };
        let Some((comment, paths)) = condition.rsplit_once(':') else {
            return Err(Error::malformed(raw, "missing path glob after comment pattern"));
        };
        if comment.is_empty() {
            return Err(Error::malformed(raw, "empty comment pattern"));
        }
        if paths.is_empty() {
            return Err(Error::malformed(raw, "empty path glob"));
        }

        let comment = CommentMatcher::parse(raw, comment)?;
        let paths = GlobBuilder::new(paths)
            .literal_separator(true)
            .build()
            .map_err(|e| Error::malformed(raw, e))?
            .compile_matcher();

        Ok(Self {
            raw: raw.to_string(),
            polarity,
            comment,
            paths,
        })
    }

    pub fn raw(&self) -> &str {
        &self.raw
    }

    pub fn polarity(&self) -> Polarity {
        self.polarity
    }

    /// Whether the rule applies to a commit. An empty path list satisfies
    /// any path glob.
    pub fn matches(&self, message: &str, changed_paths: &[String]) -> bool {
        if !self.comment.is_match(message) {
            return false;
        }
        changed_paths.is_empty() || changed_paths.iter().any(|p| self.paths.is_match(p))
    }
}

/// A compiled `<branch-pattern>:<max>` concurrency ceiling.
#[derive(Debug, Clone)]
pub struct BranchLimit {
    pattern: BranchPattern,
    max: u32,
}

impl BranchLimit {
    pub fn parse(raw: &str) -> Result<Self> {
        let Some((pattern, max)) = raw.trim().rsplit_once(':') else {
            return Err(Error::malformed(raw, "expected <branch-pattern>:<max>"));
        };
        let max = max
            .trim()
            .parse::<u32>()
            .map_err(|e| Error::malformed(raw, e))?;
        let pattern = BranchPattern::parse(pattern)?;
        if !pattern.polarity().is_include() {
            return Err(Error::malformed(raw, "branch limits cannot exclude"));
        }
        Ok(Self { pattern, max })
    }

    pub fn pattern(&self) -> &BranchPattern {
        &self.pattern
    }

    /// Ceiling for matching branches; zero is unlimited.
    pub fn max(&self) -> u32 {
        self.max
    }
}

pub fn parse_branch_patterns(raw: &[String]) -> Result<Vec<BranchPattern>> {
    raw.iter().map(|p| BranchPattern::parse(p)).collect()
}

pub fn parse_comment_rules(raw: &[String]) -> Result<Vec<CommentRule>> {
    raw.iter().map(|p| CommentRule::parse(p)).collect()
}

pub fn parse_branch_limits(raw: &[String]) -> Result<Vec<BranchLimit>> {
    raw.iter().map(|p| BranchLimit::parse(p)).collect()
}
