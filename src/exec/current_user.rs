// src/exec/current_user.rs

//! Files that let a container run as the invoking user.
//!
//! The container gets bind-mounted `passwd` and `group` files that know
//! about the host user, plus an empty home directory. All three are
//! created on the host and reported as temporary paths so that cleanup
//! removes them.

use std::path::PathBuf;

use anyhow::{Context, Result, anyhow};
use tokio::process::Command;

use crate::fs::FileSystem;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UserAndGroup {
    pub user_id: u32,
    pub user_name: String,
    pub group_id: u32,
    pub group_name: String,
}

impl UserAndGroup {
    /// Query the invoking user with `id`.
    pub async fn current() -> Result<Self> {
        Ok(Self {
            user_id: id_output("-u").await?.parse().context("parsing user ID")?,
            user_name: id_output("-un").await?,
            group_id: id_output("-g").await?.parse().context("parsing group ID")?,
            group_name: id_output("-gn").await?,
        })
    }

    /// The `--user` argument for docker.
    pub fn docker_user(&self) -> String {
        format!("{}:{}", self.user_id, self.group_id)
    }
}

async fn id_output(flag: &str) -> Result<String> {
    let output = Command::new("id")
        .arg(flag)
        .kill_on_drop(true)
        .output()
        .await
        .with_context(|| format!("running 'id {flag}'"))?;

    if !output.status.success() {
        return Err(anyhow!(
            "'id {flag}' failed: {}",
            String::from_utf8_lossy(&output.stderr).trim()
        ));
    }

    Ok(String::from_utf8_lossy(&output.stdout).trim().to_string())
}

pub fn passwd_contents(user: &UserAndGroup, home_directory: &str) -> String {
    if user.user_id == 0 {
        return format!("root:x:0:0:root:{home_directory}:/bin/sh\n");
    }

    format!(
        "root:x:0:0:root:/root:/bin/sh\n{name}:x:{uid}:{gid}:{name}:{home_directory}:/bin/sh\n",
        name = user.user_name,
        uid = user.user_id,
        gid = user.group_id,
    )
}

pub fn group_contents(user: &UserAndGroup) -> String {
    let root_group = "root:x:0:root\n";

    if user.group_id == 0 {
        return root_group.to_string();
    }

    format!(
        "{root_group}{group}:x:{gid}:{user}\n",
        group = user.group_name,
        gid = user.group_id,
        user = user.user_name,
    )
}

/// Host paths created for one container.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CurrentUserFiles {
    pub passwd_file: PathBuf,
    pub group_file: PathBuf,
    pub home_directory: PathBuf,
}

impl CurrentUserFiles {
    /// `docker create` volume arguments mounting the files into place.
    pub fn volume_arguments(&self, home_in_container: &str) -> Vec<String> {
        vec![
            "--volume".to_string(),
            format!("{}:/etc/passwd:ro", self.passwd_file.display()),
            "--volume".to_string(),
            format!("{}:/etc/group:ro", self.group_file.display()),
            "--volume".to_string(),
            format!("{}:{home_in_container}:delegated", self.home_directory.display()),
        ]
    }
}

/// Write the files for a container, naming them after `prefix`.
///
/// `on_created` is called for each path as soon as it exists, so a later
/// failure still leaves the earlier paths known to cleanup.
pub fn create_current_user_files(
    fs: &dyn FileSystem,
    prefix: &str,
    user: &UserAndGroup,
    home_in_container: &str,
    mut on_created: impl FnMut(CreatedPath),
) -> Result<CurrentUserFiles> {
    let base = fs.temp_dir();
    let passwd_file = base.join(format!("{prefix}-passwd"));
    let group_file = base.join(format!("{prefix}-group"));
    let home_directory = base.join(format!("{prefix}-home"));

    fs.write(&passwd_file, passwd_contents(user, home_in_container).as_bytes())?;
    on_created(CreatedPath::File(passwd_file.clone()));

    fs.write(&group_file, group_contents(user).as_bytes())?;
    on_created(CreatedPath::File(group_file.clone()));

    fs.create_dir_all(&home_directory)?;
    on_created(CreatedPath::Directory(home_directory.clone()));

    Ok(CurrentUserFiles {
        passwd_file,
        group_file,
        home_directory,
    })
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CreatedPath {
    File(PathBuf),
    Directory(PathBuf),
}
