// src/config/mod.rs

pub mod command;
pub mod loader;
pub mod model;
pub mod validate;

pub use command::{Command, CommandParseError, PortMapping};
pub use loader::{default_config_path, load_and_validate, load_from_path};
pub use model::{
    BuildImageSource, ConfigFile, Container, ContainerName, ImageSource, RawConfigFile,
    RunAsCurrentUser, Task, TaskContainerCustomisation, TaskName, TaskRunConfiguration,
};
