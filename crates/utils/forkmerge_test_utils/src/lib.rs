pub use self::workspace::Workspace;

pub mod helper;
pub mod logged_command;
mod workspace;

/// Creates a fresh [`Workspace`] for the calling test.
#[macro_export]
macro_rules! workspace {
    ($name:expr) => {
        $crate::Workspace::new(env!("CARGO_PKG_NAME"), module_path!(), $name)
    };
}
