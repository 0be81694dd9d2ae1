//! Build artifacts handed over for deployment
//!
//! An [`Artifact`] is a repository-relative path plus its contents. Producers
//! push artifacts through [`channel`]; the [`ArtifactCollector`] buffers them
//! until the producer signals the end of input, and [`materialize`] writes the
//! buffered set into a working copy.

mod collect;
mod materialize;

use std::fmt;
use std::io::Read;
use std::path::{Path, PathBuf};

pub use collect::{channel, ArtifactCollector, ArtifactSink};
pub use materialize::{materialize, validate};

/// Contents of an artifact
pub enum Contents {
    /// Fully buffered bytes
    Buffer(Vec<u8>),
    /// A live reader; rejected by the collector and the materializer
    Stream(Box<dyn Read + Send>),
}

impl fmt::Debug for Contents {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Buffer(bytes) => f.debug_tuple("Buffer").field(&bytes.len()).finish(),
            Self::Stream(_) => f.write_str("Stream"),
        }
    }
}

/// A file to publish, addressed relative to the repository root
#[derive(Debug)]
pub struct Artifact {
    pub path: PathBuf,
    pub contents: Contents,
}

impl Artifact {
    /// Artifact with buffered contents
    pub fn new(path: impl Into<PathBuf>, contents: impl Into<Vec<u8>>) -> Self {
        Self {
            path: path.into(),
            contents: Contents::Buffer(contents.into()),
        }
    }

    /// Artifact backed by a reader that has not been drained yet
    pub fn stream(path: impl Into<PathBuf>, reader: impl Read + Send + 'static) -> Self {
        Self {
            path: path.into(),
            contents: Contents::Stream(Box::new(reader)),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn is_stream(&self) -> bool {
        matches!(self.contents, Contents::Stream(_))
    }

    /// The buffered bytes, `None` for streams
    pub fn bytes(&self) -> Option<&[u8]> {
        match &self.contents {
            Contents::Buffer(bytes) => Some(bytes),
            Contents::Stream(_) => None,
        }
    }
}
