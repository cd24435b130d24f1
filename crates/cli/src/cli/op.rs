use std::error::Error;
use std::io;
use std::path::PathBuf;

use redact::{GitRepo, RepoState, StateError};

#[derive(Debug, Clone)]
pub struct OpContext {
    /// Directory git commands run in (`--repo`, or the current directory)
    pub repo_dir: PathBuf,
}

impl OpContext {
    pub fn new(repo: Option<PathBuf>) -> io::Result<Self> {
        let repo_dir = match repo {
            Some(path) => path,
            None => std::env::current_dir()?,
        };
        Ok(Self { repo_dir })
    }

    pub fn git(&self) -> GitRepo {
        GitRepo::new(&self.repo_dir)
    }

    /// State of the repository containing `repo_dir`
    pub fn repo(&self) -> Result<RepoState, StateError> {
        RepoState::discover(&self.git())
    }
}

pub trait Op {
    type Error: Error + Send + Sync + 'static;
    type Output;

    fn execute(&self, ctx: &OpContext) -> Result<Self::Output, Self::Error>;
}

#[macro_export]
macro_rules! command_enum {
    ($(($variant:ident, $type:ty)),* $(,)?) => {
        #[derive(Subcommand, Debug, Clone)]
        pub enum Command {
            $($variant($type),)*
        }

        #[derive(Debug)]
        pub enum OpOutput {
            $($variant(<$type as $crate::cli::op::Op>::Output),)*
        }

        #[derive(Debug, thiserror::Error)]
        pub enum OpError {
            $(
                #[error(transparent)]
                $variant(<$type as $crate::cli::op::Op>::Error),
            )*
        }

        impl $crate::cli::op::Op for Command {
            type Output = OpOutput;
            type Error = OpError;

            fn execute(&self, ctx: &$crate::cli::op::OpContext) -> Result<Self::Output, Self::Error> {
                match self {
                    $(
                        Command::$variant(op) => {
                            op.execute(ctx)
                                .map(OpOutput::$variant)
                                .map_err(OpError::$variant)
                        },
                    )*
                }
            }
        }

        impl std::fmt::Display for OpOutput {
            fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
                match self {
                    $(
                        OpOutput::$variant(output) => write!(f, "{}", output),
                    )*
                }
            }
        }
    };
}
