// # Git Archive
//
// libgit2-backed implementation of ArchiveRepository.
//
// ## Change Detection
//
// `is_modified` asks libgit2 for the status of a single path. A file that
// was rewritten with identical bytes is rehashed and compares clean, so
// the archiver can write every zone unconditionally.
//
// ## Push
//
// Pushes the branch HEAD points at to `origin`. Any reference rejected by
// the remote turns into an error; there is no retry.
//
// ## Credentials
//
// SSH agent for SSH remotes, the git credential helper for HTTPS remotes.
// Local paths and `file://` URLs need none.

use git2::{
    CredentialType, Cred, ErrorCode, FetchOptions, PushOptions, RemoteCallbacks, Repository,
    Signature, Status,
};
use std::path::{Path, PathBuf};
use std::sync::{Mutex, MutexGuard};
use tracing::{debug, info};

use crate::config::ArchiveConfig;
use crate::error::{Error, Result};
use crate::traits::{ArchiveRepository, CommitId};

/// Remote the working copy was cloned from
const ORIGIN: &str = "origin";

/// Give up after this many credential prompts from libgit2
const MAX_CREDENTIAL_ATTEMPTS: usize = 3;

/// Status bits meaning "differs from the last commit"
const CHANGED: Status = Status::WT_NEW
    .union(Status::WT_MODIFIED)
    .union(Status::WT_TYPECHANGE)
    .union(Status::WT_RENAMED)
    .union(Status::WT_DELETED)
    .union(Status::INDEX_NEW)
    .union(Status::INDEX_MODIFIED)
    .union(Status::INDEX_TYPECHANGE)
    .union(Status::INDEX_RENAMED)
    .union(Status::INDEX_DELETED);

/// Git working copy of the archive repository
pub struct GitArchive {
    repo: Mutex<Repository>,
    workdir: PathBuf,
    author_name: String,
    author_email: String,
}

impl std::fmt::Debug for GitArchive {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("GitArchive")
            .field("workdir", &self.workdir)
            .field("author_name", &self.author_name)
            .field("author_email", &self.author_email)
            .finish()
    }
}

impl GitArchive {
    /// Clone `config.repo_url` into the (empty) directory `dest`
    pub fn clone_into(config: &ArchiveConfig, dest: &Path) -> Result<Self> {
        // The URL may embed credentials; only the destination is logged
        info!("Cloning archive repository into {}", dest.display());

        let mut fetch_options = FetchOptions::new();
        fetch_options.remote_callbacks(remote_callbacks());

        let repo = git2::build::RepoBuilder::new()
            .fetch_options(fetch_options)
            .clone(&config.repo_url, dest)?;

        Self::from_repository(repo, config)
    }

    /// Open an existing working copy
    pub fn open(config: &ArchiveConfig, path: &Path) -> Result<Self> {
        let repo = Repository::open(path)?;
        Self::from_repository(repo, config)
    }

    fn from_repository(repo: Repository, config: &ArchiveConfig) -> Result<Self> {
        let workdir = repo
            .workdir()
            .ok_or_else(|| Error::invalid_input("Archive repository has no working directory"))?
            .to_path_buf();

        Ok(Self {
            repo: Mutex::new(repo),
            workdir,
            author_name: config.author_name.clone(),
            author_email: config.author_email.clone(),
        })
    }

    fn repo(&self) -> Result<MutexGuard<'_, Repository>> {
        self.repo
            .lock()
            .map_err(|_| Error::Other("Archive repository lock poisoned".to_string()))
    }

    /// Full name of the branch HEAD points at (e.g. `refs/heads/main`)
    fn head_branch(repo: &Repository) -> Result<String> {
        let head = repo.find_reference("HEAD")?;
        match head.symbolic_target() {
            Some(target) => Ok(target.to_string()),
            None => Err(Error::Git(git2::Error::from_str(
                "HEAD is detached; cannot determine branch to push",
            ))),
        }
    }
}

impl ArchiveRepository for GitArchive {
    fn workdir(&self) -> &Path {
        &self.workdir
    }

    fn is_modified(&self, path: &Path) -> Result<bool> {
        let status = self.repo()?.status_file(path)?;
        Ok(status.intersects(CHANGED))
    }

    fn stage(&self, path: &Path) -> Result<()> {
        let repo = self.repo()?;
        let mut index = repo.index()?;
        index.add_path(path)?;
        index.write()?;
        debug!("Staged {}", path.display());
        Ok(())
    }

    fn stage_removal(&self, path: &Path) -> Result<()> {
        let repo = self.repo()?;
        let mut index = repo.index()?;
        index.remove_path(path)?;
        index.write()?;

        match std::fs::remove_file(self.workdir.join(path)) {
            Ok(()) => {}
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
            Err(e) => return Err(e.into()),
        }
        debug!("Staged removal of {}", path.display());
        Ok(())
    }

    fn tracked_files(&self) -> Result<Vec<PathBuf>> {
        let repo = self.repo()?;
        let index = repo.index()?;

        let files = index
            .iter()
            .filter_map(|entry| String::from_utf8(entry.path).ok())
            .filter(|path| !path.contains('/'))
            .map(PathBuf::from)
            .collect();
        Ok(files)
    }

    fn commit(&self, message: &str) -> Result<CommitId> {
        let repo = self.repo()?;
        let mut index = repo.index()?;
        let tree_id = index.write_tree()?;
        let tree = repo.find_tree(tree_id)?;
        let signature = Signature::now(&self.author_name, &self.author_email)?;

        let parent = match repo.head() {
            Ok(head) => Some(head.peel_to_commit()?),
            Err(e) if matches!(e.code(), ErrorCode::UnbornBranch | ErrorCode::NotFound) => None,
            Err(e) => return Err(e.into()),
        };
        let parents: Vec<&git2::Commit<'_>> = parent.iter().collect();

        let oid = repo.commit(Some("HEAD"), &signature, &signature, message, &tree, &parents)?;
        Ok(oid.to_string())
    }

    fn push(&self) -> Result<()> {
        let repo = self.repo()?;
        let branch = Self::head_branch(&repo)?;
        let refspec = format!("{0}:{0}", branch);
        let mut remote = repo.find_remote(ORIGIN)?;

        let mut rejection: Option<String> = None;
        {
            let mut callbacks = remote_callbacks();
            callbacks.push_update_reference(|refname, status| {
                if let Some(message) = status {
                    rejection = Some(format!("{}: {}", refname, message));
                }
                Ok(())
            });

            let mut options = PushOptions::new();
            options.remote_callbacks(callbacks);
            remote.push(&[refspec.as_str()], Some(&mut options))?;
        }

        if let Some(reason) = rejection {
            return Err(Error::Git(git2::Error::from_str(&format!(
                "Push rejected by remote: {}",
                reason
            ))));
        }

        info!("Pushed {} to {}", branch, ORIGIN);
        Ok(())
    }
}

/// Callbacks shared by clone and push
fn remote_callbacks<'a>() -> RemoteCallbacks<'a> {
    let mut attempts = 0;
    let mut callbacks = RemoteCallbacks::new();
    callbacks.credentials(move |url, username, allowed| {
        attempts += 1;
        if attempts > MAX_CREDENTIAL_ATTEMPTS {
            return Err(git2::Error::from_str(
                "No usable credentials for archive repository",
            ));
        }

        let username = username.unwrap_or("git");
        if allowed.contains(CredentialType::SSH_KEY) {
            Cred::ssh_key_from_agent(username)
        } else if allowed.contains(CredentialType::USER_PASS_PLAINTEXT) {
            let config = git2::Config::open_default()?;
            Cred::credential_helper(&config, url, Some(username))
        } else if allowed.contains(CredentialType::USERNAME) {
            Cred::username(username)
        } else {
            Cred::default()
        }
    });
    callbacks
}
