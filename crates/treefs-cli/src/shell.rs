//! The interactive command loop.
//!
//! Each input line is tokenized with shell-like quoting and parsed by clap
//! into a [`ShellCommand`]. Errors from the filesystem are printed and the
//! loop carries on.

use std::io::{BufRead, Write};

use anyhow::{anyhow, bail, Context, Result};
use chrono::{DateTime, Utc};
use clap::{Parser, Subcommand};
use treefs_core::{DirEntry, FsConfig, FsCore, Metadata, Mode, NodeType, SessionContext};

use crate::search;
use crate::store::{SavedSession, SessionStore};
use crate::users::UserManager;

/// One line of shell input.
#[derive(Parser, Debug)]
#[command(name = "treefs", no_binary_name = true, disable_version_flag = true)]
#[command(help_template = "Commands:\n{subcommands}")]
pub struct ShellLine {
    #[command(subcommand)]
    pub command: ShellCommand,
}

#[derive(Subcommand, Debug, PartialEq, Eq)]
pub enum ShellCommand {
    /// Create an empty file
    Touch { path: String },

    /// Replace a file's content, creating the file if needed
    Write {
        path: String,

        /// Words are joined with single spaces
        #[arg(trailing_var_arg = true, allow_hyphen_values = true)]
        text: Vec<String>,
    },

    /// Print a file
    Cat { path: String },

    /// Remove a file, link or directory tree
    Rm { path: String },

    /// Create a directory
    Mkdir { path: String },

    /// Change the working directory (defaults to /)
    Cd { path: Option<String> },

    /// List a directory
    Ls {
        /// Show mode, owner, group, size and modification time
        #[arg(short)]
        long: bool,

        path: Option<String>,
    },

    /// Print the working directory
    Pwd,

    /// Find entries whose name matches a wildcard
    Find {
        #[arg(value_name = "WILDCARD")]
        pattern: String,

        path: Option<String>,
    },

    /// Search file contents with a regular expression
    Grep {
        #[arg(value_name = "REGEX")]
        pattern: String,

        path: Option<String>,
    },

    /// Create a symbolic link
    Ln {
        /// Required; hard links are not supported
        #[arg(short = 's', long = "symbolic")]
        symbolic: bool,

        target: String,

        #[arg(value_name = "LINK")]
        link: String,
    },

    /// Print a symlink's stored target
    Readlink { path: String },

    /// Move or rename an entry
    Mv { from: String, to: String },

    /// Set permission bits (octal, e.g. 644)
    Chmod {
        #[arg(value_name = "MODE")]
        mode: String,

        path: String,
    },

    /// Change owner and optionally group (root only)
    Chown {
        #[arg(value_name = "OWNER[:GROUP]")]
        owner: String,

        path: String,
    },

    /// Show an entry's attributes
    Stat {
        /// Report the link itself rather than its target
        #[arg(long = "no-follow")]
        no_follow: bool,

        path: String,
    },

    /// Print the current user
    Whoami,

    /// Add a user (root only)
    Useradd {
        name: String,

        /// Extra groups, comma separated
        #[arg(short = 'G', long = "groups", value_delimiter = ',')]
        groups: Vec<String>,
    },

    /// Switch user
    Su { name: String },

    /// List users
    Users,

    /// Save the session under a name
    Save { name: String },

    /// Restore a saved session
    Load { name: String },

    /// Leave the shell
    #[command(alias = "quit")]
    Exit,
}

/// What the loop should do after a command.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Flow {
    Continue,
    Exit,
}

/// Split a line into words. Single quotes are literal, double quotes allow
/// `\"` and `\\`, and a backslash outside quotes escapes the next character.
pub fn tokenize(line: &str) -> Result<Vec<String>> {
    let mut words = Vec::new();
    let mut current = String::new();
    let mut in_word = false;
    let mut chars = line.chars();

    while let Some(ch) = chars.next() {
        match ch {
            c if c.is_whitespace() => {
                if in_word {
                    words.push(std::mem::take(&mut current));
                    in_word = false;
                }
            }
            '\'' => {
                in_word = true;
                loop {
                    match chars.next() {
                        Some('\'') => break,
                        Some(c) => current.push(c),
                        None => bail!("unterminated single quote"),
                    }
                }
            }
            '"' => {
                in_word = true;
                loop {
                    match chars.next() {
                        Some('"') => break,
                        Some('\\') => match chars.next() {
                            Some(c @ ('"' | '\\')) => current.push(c),
                            Some(c) => {
                                current.push('\\');
                                current.push(c);
                            }
                            None => bail!("unterminated double quote"),
                        },
                        Some(c) => current.push(c),
                        None => bail!("unterminated double quote"),
                    }
                }
            }
            '\\' => {
                in_word = true;
                match chars.next() {
                    Some(c) => current.push(c),
                    None => bail!("trailing backslash"),
                }
            }
            c => {
                in_word = true;
                current.push(c);
            }
        }
    }
    if in_word {
        words.push(current);
    }
    Ok(words)
}

pub struct Shell {
    fs: FsCore,
    users: UserManager,
    ctx: SessionContext,
    store: SessionStore,
}

impl Shell {
    pub fn new(config: FsConfig, store: SessionStore) -> Self {
        let fs = FsCore::new(config);
        let users = UserManager::new();
        let ctx = fs.session(users.current().identity());
        Self { fs, users, ctx, store }
    }

    pub fn fs(&self) -> &FsCore {
        &self.fs
    }

    pub fn users(&self) -> &UserManager {
        &self.users
    }

    pub fn context(&self) -> &SessionContext {
        &self.ctx
    }

    /// `<user>:<cwd>$ `, with `?` when the working directory is gone.
    pub fn prompt(&self) -> String {
        let cwd = self.fs.current_path(&self.ctx).unwrap_or_else(|_| "?".to_string());
        format!("{}:{}$ ", self.users.current().name, cwd)
    }

    /// Read commands until `exit` or end of input.
    pub fn run<R: BufRead, W: Write>(&mut self, input: R, mut out: W) -> Result<()> {
        writeln!(out, "TreeFS shell. Type `help` for commands, `exit` to leave.")?;
        let mut lines = input.lines();
        loop {
            write!(out, "{}", self.prompt())?;
            out.flush()?;
            let Some(line) = lines.next() else {
                writeln!(out)?;
                break;
            };
            let line = line.context("failed to read input")?;
            match self.execute_line(&line, &mut out) {
                Ok(Flow::Exit) => break,
                Ok(Flow::Continue) => {}
                Err(err) => writeln!(out, "error: {err:#}")?,
            }
        }
        writeln!(out, "Goodbye!")?;
        Ok(())
    }

    /// Run one line. Help and usage errors from clap are written to `out`.
    pub fn execute_line<W: Write>(&mut self, line: &str, out: &mut W) -> Result<Flow> {
        let words = tokenize(line)?;
        if words.is_empty() {
            return Ok(Flow::Continue);
        }
        let parsed = match ShellLine::try_parse_from(&words) {
            Ok(parsed) => parsed,
            Err(err) => {
                use clap::error::ErrorKind;
                match err.kind() {
                    ErrorKind::DisplayHelp | ErrorKind::DisplayHelpOnMissingArgumentOrSubcommand => {
                        write!(out, "{}", err.render())?;
                        return Ok(Flow::Continue);
                    }
                    _ => bail!("{}", err.render().to_string().trim_end()),
                }
            }
        };
        self.execute(parsed.command, out)
    }

    pub fn execute<W: Write>(&mut self, command: ShellCommand, out: &mut W) -> Result<Flow> {
        tracing::debug!(?command, user = %self.ctx.identity.id, "executing");
        match command {
            ShellCommand::Touch { path } => {
                self.fs.create_file(&self.ctx, &path, "").with_context(|| format!("touch: {path}"))?;
            }
            ShellCommand::Write { path, text } => {
                self.fs
                    .write_file(&self.ctx, &path, &text.join(" "))
                    .with_context(|| format!("write: {path}"))?;
            }
            ShellCommand::Cat { path } => {
                let content = self.fs.read_file(&self.ctx, &path).with_context(|| format!("cat: {path}"))?;
                write!(out, "{content}")?;
                if !content.is_empty() && !content.ends_with('\n') {
                    writeln!(out)?;
                }
            }
            ShellCommand::Rm { path } => {
                self.fs.delete(&self.ctx, &path).with_context(|| format!("rm: {path}"))?;
                self.reset_lost_cwd();
            }
            ShellCommand::Mkdir { path } => {
                self.fs.create_directory(&self.ctx, &path).with_context(|| format!("mkdir: {path}"))?;
            }
            ShellCommand::Cd { path } => {
                let path = path.unwrap_or_else(|| "/".to_string());
                self.fs
                    .change_directory(&mut self.ctx, &path)
                    .with_context(|| format!("cd: {path}"))?;
            }
            ShellCommand::Ls { long, path } => {
                let path = path.unwrap_or_else(|| ".".to_string());
                let entries = self.fs.list_directory(&self.ctx, &path).with_context(|| format!("ls: {path}"))?;
                for entry in &entries {
                    if long {
                        writeln!(out, "{}", format_long_entry(entry))?;
                    } else {
                        writeln!(out, "{}", format_short_entry(entry))?;
                    }
                }
            }
            ShellCommand::Pwd => {
                let cwd = self.fs.current_path(&self.ctx).context("pwd")?;
                writeln!(out, "{cwd}")?;
            }
            ShellCommand::Find { pattern, path } => {
                let path = path.unwrap_or_else(|| ".".to_string());
                for found in search::find(&self.fs, &self.ctx, &path, &pattern).with_context(|| format!("find: {path}"))? {
                    writeln!(out, "{found}")?;
                }
            }
            ShellCommand::Grep { pattern, path } => {
                let path = path.unwrap_or_else(|| ".".to_string());
                let hits = search::grep(&mut self.fs, &self.ctx, &path, &pattern).with_context(|| format!("grep: {path}"))?;
                for hit in hits {
                    writeln!(out, "{}:{}:{}", hit.path, hit.line_number, hit.line)?;
                }
            }
            ShellCommand::Ln { symbolic, target, link } => {
                if !symbolic {
                    bail!("ln: hard links are not supported, use -s");
                }
                self.fs
                    .create_symlink(&self.ctx, &target, &link)
                    .with_context(|| format!("ln: {link}"))?;
            }
            ShellCommand::Readlink { path } => {
                let target = self.fs.read_link(&self.ctx, &path).with_context(|| format!("readlink: {path}"))?;
                writeln!(out, "{target}")?;
            }
            ShellCommand::Mv { from, to } => {
                self.fs.rename(&self.ctx, &from, &to).with_context(|| format!("mv: {from}"))?;
            }
            ShellCommand::Chmod { mode, path } => {
                let mode = Mode::parse_octal(&mode).ok_or_else(|| anyhow!("chmod: invalid mode {mode:?}"))?;
                self.fs.chmod(&self.ctx, &path, mode).with_context(|| format!("chmod: {path}"))?;
            }
            ShellCommand::Chown { owner, path } => {
                let metadata = self.fs.metadata(&self.ctx, &path, true).with_context(|| format!("chown: {path}"))?;
                let (owner, group) = match owner.split_once(':') {
                    Some((owner, group)) => (owner.to_string(), group.to_string()),
                    None => (owner, metadata.group),
                };
                self.fs
                    .chown(&self.ctx, &path, &owner, &group)
                    .with_context(|| format!("chown: {path}"))?;
            }
            ShellCommand::Stat { no_follow, path } => {
                let metadata = self
                    .fs
                    .metadata(&self.ctx, &path, !no_follow)
                    .with_context(|| format!("stat: {path}"))?;
                write!(out, "{}", format_stat(&path, &metadata))?;
            }
            ShellCommand::Whoami => {
                writeln!(out, "{}", self.users.current().name)?;
            }
            ShellCommand::Useradd { name, groups } => {
                let user = self.users.add_user(&name, &groups).context("useradd")?;
                writeln!(out, "added {user}")?;
            }
            ShellCommand::Su { name } => {
                let identity = self.users.switch_user(&name).context("su")?.identity();
                self.ctx.identity = identity;
            }
            ShellCommand::Users => {
                for user in self.users.users() {
                    writeln!(out, "{user}")?;
                }
            }
            ShellCommand::Save { name } => {
                let path = self.save(&name).with_context(|| format!("save: {name}"))?;
                writeln!(out, "saved to {}", path.display())?;
            }
            ShellCommand::Load { name } => {
                self.load(&name).with_context(|| format!("load: {name}"))?;
                writeln!(out, "loaded {name}")?;
            }
            ShellCommand::Exit => return Ok(Flow::Exit),
        }
        Ok(Flow::Continue)
    }

    fn save(&self, name: &str) -> Result<std::path::PathBuf> {
        let snapshot = self.fs.serialize()?;
        let cwd = self.fs.current_path(&self.ctx).unwrap_or_else(|_| "/".to_string());
        let session = SavedSession::new(&snapshot, cwd, self.users.clone());
        self.store.save(name, &session)
    }

    /// Replace tree, users and cwd from a saved session. Nothing changes
    /// unless the file decodes and the snapshot validates.
    fn load(&mut self, name: &str) -> Result<()> {
        let saved = self.store.load(name)?;
        let snapshot = saved.snapshot_bytes()?;
        self.fs.restore(&snapshot)?;

        self.users = saved.users;
        self.ctx = self.fs.session(self.users.current().identity());
        if self.fs.change_directory(&mut self.ctx, &saved.cwd).is_err() {
            tracing::warn!(cwd = %saved.cwd, "saved working directory unavailable, using /");
        }
        Ok(())
    }

    fn reset_lost_cwd(&mut self) {
        if !self.fs.contains(self.ctx.cwd) {
            tracing::info!("working directory removed, returning to /");
            self.ctx.cwd = self.fs.root();
        }
    }
}

fn format_short_entry(entry: &DirEntry) -> String {
    match (&entry.metadata.kind, &entry.link_target) {
        (NodeType::Symlink, Some(target)) => format!("{:<6} {} -> {}", "LINK", entry.name, target),
        (NodeType::Directory, _) => format!("{:<6} {}", "DIR", entry.name),
        _ => format!("{:<6} {}", "FILE", entry.name),
    }
}

fn type_char(kind: NodeType) -> char {
    match kind {
        NodeType::File => '-',
        NodeType::Directory => 'd',
        NodeType::Symlink => 'l',
    }
}

fn format_time(nanos: i64) -> String {
    let secs = nanos.div_euclid(1_000_000_000);
    let sub = nanos.rem_euclid(1_000_000_000) as u32;
    DateTime::<Utc>::from_timestamp(secs, sub)
        .map(|t| t.format("%Y-%m-%d %H:%M").to_string())
        .unwrap_or_else(|| "-".to_string())
}

fn format_long_entry(entry: &DirEntry) -> String {
    let m = &entry.metadata;
    let mut line = format!(
        "{}{} {:<8} {:<8} {:>6} {} {}",
        type_char(m.kind),
        m.mode,
        m.owner,
        m.group,
        m.size,
        format_time(m.times.modified_at),
        entry.name
    );
    if let Some(target) = &entry.link_target {
        line.push_str(" -> ");
        line.push_str(target);
    }
    line
}

fn format_stat(path: &str, m: &Metadata) -> String {
    format!(
        "  Path: {path}\n  Type: {}\n  Size: {}\n  Mode: {:04o} ({}{})\n Owner: {}\n Group: {}\nAccess: {}\nModify: {}\nCreate: {}\n",
        m.kind,
        m.size,
        m.mode,
        type_char(m.kind),
        m.mode,
        m.owner,
        m.group,
        format_time(m.times.accessed_at),
        format_time(m.times.modified_at),
        format_time(m.times.created_at),
    )
}
