//!
//! The trigger module describes what happened to the objects a bucket notification is about
//!

/// The [Modification] enum helps articulate the difference between a ObjectCreated and
/// ObjectRemoved type events
#[derive(Clone, Debug, Default, Eq, PartialEq)]
pub enum Modification {
    /// Indicating a file creation
    Create,
    /// Indicating a file deletion
    Delete,
    #[default]
    Unknown,
}

impl From<&str> for Modification {
    fn from(name: &str) -> Self {
        if name.starts_with("ObjectCreated") {
            return Modification::Create;
        }
        if name.starts_with("ObjectRemoved") {
            return Modification::Delete;
        }
        Modification::default()
    }
}
