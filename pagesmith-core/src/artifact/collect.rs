//! Buffering adapter between an artifact producer and the deployer

use tokio::sync::mpsc;

use super::Artifact;
use crate::{Error, Result};

enum Event {
    Artifact(Artifact),
    End,
}

/// Producer side of the artifact channel
#[derive(Debug, Clone)]
pub struct ArtifactSink {
    tx: mpsc::Sender<Event>,
}

/// Consumer side of the artifact channel
#[derive(Debug)]
pub struct ArtifactCollector {
    rx: mpsc::Receiver<Event>,
}

impl std::fmt::Debug for Event {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Artifact(artifact) => f.debug_tuple("Artifact").field(&artifact.path).finish(),
            Self::End => f.write_str("End"),
        }
    }
}

/// Create a bounded artifact channel
///
/// `capacity` bounds how many artifacts may be in flight before the producer
/// waits for the collector.
pub fn channel(capacity: usize) -> (ArtifactSink, ArtifactCollector) {
    let (tx, rx) = mpsc::channel(capacity.max(1));
    (ArtifactSink { tx }, ArtifactCollector { rx })
}

impl ArtifactSink {
    /// Hand one artifact to the collector
    pub async fn send(&self, artifact: Artifact) -> Result<()> {
        self.tx
            .send(Event::Artifact(artifact))
            .await
            .map_err(|_| Error::Other("Artifact collector stopped receiving".to_string()))
    }

    /// Signal that every artifact has been sent
    pub async fn finish(self) -> Result<()> {
        self.tx
            .send(Event::End)
            .await
            .map_err(|_| Error::Other("Artifact collector stopped receiving".to_string()))
    }
}

impl ArtifactCollector {
    /// Buffer artifacts until the producer signals the end of input
    ///
    /// A streamed artifact fails the collection right away. If every sink is
    /// dropped without [`ArtifactSink::finish`], the input is considered
    /// truncated and [`Error::IncompleteInput`] is returned.
    pub async fn collect(mut self) -> Result<Vec<Artifact>> {
        let mut artifacts = Vec::new();

        while let Some(event) = self.rx.recv().await {
            match event {
                Event::Artifact(artifact) if artifact.is_stream() => {
                    return Err(Error::UnsupportedArtifact {
                        path: artifact.path,
                    });
                }
                Event::Artifact(artifact) => {
                    tracing::trace!(path = %artifact.path.display(), "Collected artifact");
                    artifacts.push(artifact);
                }
                Event::End => {
                    tracing::debug!(count = artifacts.len(), "Artifact input complete");
                    return Ok(artifacts);
                }
            }
        }

        Err(Error::IncompleteInput {
            received: artifacts.len(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_collects_in_order_until_end() {
        let (sink, collector) = channel(4);

        let producer = tokio::spawn(async move {
            for name in ["index.html", "about.html", "css/site.css"] {
                sink.send(Artifact::new(name, name.as_bytes())).await.unwrap();
            }
            sink.finish().await.unwrap();
        });

        let artifacts = collector.collect().await.unwrap();
        producer.await.unwrap();

        let paths: Vec<_> = artifacts
            .iter()
            .map(|a| a.path.to_str().unwrap().to_string())
            .collect();
        assert_eq!(paths, vec!["index.html", "about.html", "css/site.css"]);
    }

    #[tokio::test]
    async fn test_empty_input() {
        let (sink, collector) = channel(1);
        sink.finish().await.unwrap();

        assert!(collector.collect().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_dropped_producer_is_incomplete() {
        let (sink, collector) = channel(4);
        sink.send(Artifact::new("index.html", "A")).await.unwrap();
        drop(sink);

        let err = collector.collect().await.unwrap_err();
        assert!(matches!(err, Error::IncompleteInput { received: 1 }));
    }

    #[tokio::test]
    async fn test_stream_is_rejected() {
        let (sink, collector) = channel(4);
        sink.send(Artifact::stream("video.mp4", std::io::empty()))
            .await
            .unwrap();
        sink.finish().await.unwrap();

        let err = collector.collect().await.unwrap_err();
        assert!(matches!(err, Error::UnsupportedArtifact { .. }));
    }
}
