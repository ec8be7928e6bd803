//! Backup jobs.
//!
//! A `[backup.<name>]` section lists archives and repositories. Every
//! archive is created and pruned in every repository, repositories first,
//! all in configuration order. Repositories with `rclone.mirrors` are then
//! synced to each mirror.

use std::path::PathBuf;

use tracing::info;

use crate::core::config::Config;
use crate::core::constants::{BORG, BORG_REPO, RCLONE};
use crate::core::context::Context;
use crate::core::env::{expand_home, Environment};
use crate::core::options::{self, CREATE_EXCLUDED, CREATE_FLAGS, PRUNE_FLAGS};
use crate::core::process::{run_checked, Invocation};
use crate::core::repository;
use crate::error::{ConfigError, Result};

/// Key set in the job section while an archive is processed, so that
/// `${archive}` in defaults resolves to the current archive.
pub const ARCHIVE_KEY: &str = "archive";

/// A `[backup.<name>]` section.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Job {
    pub name: String,
    pub section: String,
    pub archives: Vec<String>,
    pub repositories: Vec<String>,
}

impl Job {
    /// Read a job.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError::MissingSection` for an unknown job and
    /// `ConfigError::EmptyList` if it has no archives or no repositories.
    pub fn from_config(config: &Config, name: &str) -> Result<Self> {
        let section = format!("backup.{}", name);
        config.require_section(&section)?;
        Ok(Self {
            name: name.to_string(),
            archives: config.get_list(&section, "archives", false)?,
            repositories: config.get_list(&section, "repositories", false)?,
            section,
        })
    }
}

/// An `[archive.<name>]` section.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ArchiveSpec {
    pub name: String,
    pub basedir: PathBuf,
    pub include: Vec<String>,
    pub exclude: Vec<String>,
}

impl ArchiveSpec {
    pub fn from_config(config: &Config, name: &str) -> Result<Self> {
        let section = format!("archive.{}", name);
        config.require_section(&section)?;
        let basedir = expand_home(config.require(&section, "basedir")?.trim());
        Ok(Self {
            name: name.to_string(),
            basedir: PathBuf::from(basedir),
            include: config.get_list(&section, "include", false)?,
            exclude: config.get_list(&section, "exclude", false)?,
        })
    }
}

/// Mirror settings of a repository.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Mirrors {
    pub targets: Vec<String>,
    pub check: bool,
}

impl Mirrors {
    pub fn from_config(config: &Config, repository: &str) -> Result<Self> {
        let section = repository::section_name(repository);
        Ok(Self {
            targets: config.get_list(&section, "rclone.mirrors", true)?,
            check: config.get_bool(&section, "rclone.check")?.unwrap_or(false),
        })
    }

    pub fn is_empty(&self) -> bool {
        self.targets.is_empty()
    }
}

/// Run backup job `name`.
///
/// `config` is mutated while archives are processed (see [`ARCHIVE_KEY`]).
/// The agent is stopped whether or not the job succeeds.
pub fn run_backup(ctx: &Context<'_>, config: &mut Config, name: &str) -> Result<()> {
    let job = Job::from_config(config, name)?;
    info!(job = %job.name, repositories = job.repositories.len(), archives = job.archives.len(), "starting backup");

    let agent = ctx.open_agent()?;
    for repository in &job.repositories {
        backup_repository(ctx, config, &job, repository, agent.environment())?;
    }
    agent.close()?;

    info!(job = %job.name, "backup finished");
    Ok(())
}

fn backup_repository(
    ctx: &Context<'_>,
    config: &mut Config,
    job: &Job,
    repository: &str,
    base: &Environment,
) -> Result<()> {
    info!(repository = %repository, "backing up");
    let env = repository::build(ctx, config, repository, base)?;
    let mirrors = Mirrors::from_config(config, repository)?;
    let env = if mirrors.is_empty() {
        env
    } else {
        repository::cache_mirror_password(ctx.runner, &env, base)?
    };

    base.scoped(&env, |scope| -> Result<()> {
        for archive in &job.archives {
            config.set(&job.section, ARCHIVE_KEY, archive.as_str());
            let spec = ArchiveSpec::from_config(config, archive)?;
            create(ctx, config, job, &spec, scope)?;
            prune(ctx, config, job, &spec, scope)?;
        }
        if !mirrors.is_empty() {
            sync_mirrors(ctx, &mirrors, scope)?;
        }
        Ok(())
    })
}

/// `borg create` arguments for one archive.
pub fn create_args(config: &Config, job: &Job, spec: &ArchiveSpec) -> Result<Vec<String>> {
    let archive = config
        .get(&job.section, "borg.create.archive")?
        .filter(|name| !name.trim().is_empty())
        .ok_or_else(|| ConfigError::MissingKey {
            section: job.section.clone(),
            key: "borg.create.archive".to_string(),
        })?;

    let mut args = vec!["create".to_string()];
    args.extend(options::extract(
        config,
        "create",
        &job.section,
        CREATE_FLAGS,
        CREATE_EXCLUDED,
    )?);
    for pattern in &spec.exclude {
        args.push("-e".to_string());
        args.push(pattern.clone());
    }
    args.push(format!("::{}", archive));
    args.extend(spec.include.iter().cloned());
    Ok(args)
}

/// `borg prune` arguments for the job.
pub fn prune_args(config: &Config, job: &Job) -> Result<Vec<String>> {
    let mut args = vec!["prune".to_string()];
    args.extend(options::extract(config, "prune", &job.section, PRUNE_FLAGS, &[])?);
    Ok(args)
}

fn create(
    ctx: &Context<'_>,
    config: &Config,
    job: &Job,
    spec: &ArchiveSpec,
    env: &Environment,
) -> Result<()> {
    let invocation = Invocation::new(BORG)
        .args(create_args(config, job, spec)?)
        .env(env)
        .cwd(&spec.basedir);
    info!(archive = %spec.name, "running: {}", invocation);
    run_checked(ctx.runner, &invocation)?;
    Ok(())
}

fn prune(
    ctx: &Context<'_>,
    config: &Config,
    job: &Job,
    spec: &ArchiveSpec,
    env: &Environment,
) -> Result<()> {
    let invocation = Invocation::new(BORG)
        .args(prune_args(config, job)?)
        .env(env)
        .cwd(&spec.basedir);
    info!(archive = %spec.name, "running: {}", invocation);
    run_checked(ctx.runner, &invocation)?;
    Ok(())
}

fn sync_mirrors(ctx: &Context<'_>, mirrors: &Mirrors, env: &Environment) -> Result<()> {
    let repo = env.get(BORG_REPO).unwrap_or_default();

    if mirrors.check {
        let check = Invocation::new(BORG)
            .args(["check", "--verbose", "--progress", "--verify-data"])
            .env(env);
        run_checked(ctx.runner, &check)?;
    }

    for mirror in &mirrors.targets {
        let sync = Invocation::new(RCLONE)
            .args(["sync", "--ask-password=false", "-v", repo, mirror.as_str()])
            .env(env);
        run_checked(ctx.runner, &sync)?;
        info!("synced {} to {}", repo, mirror);
    }
    Ok(())
}
