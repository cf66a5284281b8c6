use std::io;
use std::path::Path;
use std::time::Instant;

use tokio::sync::{mpsc, oneshot};

use crate::model::Event;
use crate::observability::{WAL_FLUSH_BATCH_SIZE, WAL_FLUSH_DURATION_SECONDS};
use crate::wal::Wal;

/// Size of the log since it was last compacted.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct JournalStats {
    pub appends: u64,
    pub bytes: u64,
}

enum Command {
    Append {
        event: Event,
        done: oneshot::Sender<io::Result<()>>,
    },
    Compact {
        snapshot: Vec<Event>,
        done: oneshot::Sender<io::Result<()>>,
    },
    Stats {
        reply: oneshot::Sender<JournalStats>,
    },
}

type Pending = (Event, oneshot::Sender<io::Result<()>>);

/// Handle to the task that owns the [`Wal`]. Concurrent appends that queue up
/// while a flush is in progress are committed together with one fsync.
pub struct Journal {
    tx: mpsc::Sender<Command>,
}

impl Journal {
    /// Open the log at `path` and spawn its writer task. Must be called
    /// inside a tokio runtime.
    pub fn open(path: &Path) -> io::Result<Self> {
        let wal = Wal::open(path)?;
        let (tx, rx) = mpsc::channel(4096);
        tokio::spawn(writer_loop(wal, rx));
        Ok(Self { tx })
    }

    /// Resolves once the record is durable.
    pub async fn append(&self, event: Event) -> io::Result<()> {
        let (done, rx) = oneshot::channel();
        self.request(Command::Append { event, done }).await?;
        rx.await.map_err(|_| writer_gone())?
    }

    /// Replace the whole log with `snapshot`.
    pub async fn compact(&self, snapshot: Vec<Event>) -> io::Result<()> {
        let (done, rx) = oneshot::channel();
        self.request(Command::Compact { snapshot, done }).await?;
        rx.await.map_err(|_| writer_gone())?
    }

    pub async fn stats(&self) -> JournalStats {
        let (reply, rx) = oneshot::channel();
        if self.request(Command::Stats { reply }).await.is_err() {
            return JournalStats::default();
        }
        rx.await.unwrap_or_default()
    }

    async fn request(&self, command: Command) -> io::Result<()> {
        self.tx.send(command).await.map_err(|_| writer_gone())
    }
}

fn writer_gone() -> io::Error {
    io::Error::new(io::ErrorKind::BrokenPipe, "journal writer has shut down")
}

async fn writer_loop(mut wal: Wal, mut rx: mpsc::Receiver<Command>) {
    while let Some(command) = rx.recv().await {
        let Command::Append { event, done } = command else {
            handle_other(&mut wal, command);
            continue;
        };
        let mut batch = vec![(event, done)];
        let mut deferred = None;
        while let Ok(next) = rx.try_recv() {
            match next {
                Command::Append { event, done } => batch.push((event, done)),
                other => {
                    deferred = Some(other);
                    break;
                }
            }
        }
        commit(&mut wal, batch);
        if let Some(other) = deferred {
            handle_other(&mut wal, other);
        }
    }
}

fn commit(wal: &mut Wal, batch: Vec<Pending>) {
    metrics::histogram!(WAL_FLUSH_BATCH_SIZE).record(batch.len() as f64);
    let started = Instant::now();

    let mut result = batch
        .iter()
        .try_for_each(|(event, _)| wal.append_buffered(event));
    // Flush even after a failed append so no half-buffered batch leaks into
    // the next one.
    let flushed = wal.flush_sync();
    if result.is_ok() {
        result = flushed;
    }
    metrics::histogram!(WAL_FLUSH_DURATION_SECONDS).record(started.elapsed().as_secs_f64());

    for (_, done) in batch {
        let reply = match &result {
            Ok(()) => Ok(()),
            Err(e) => Err(io::Error::new(e.kind(), e.to_string())),
        };
        let _ = done.send(reply);
    }
}

fn handle_other(wal: &mut Wal, command: Command) {
    match command {
        Command::Compact { snapshot, done } => {
            let result = Wal::write_compact_file(wal.path(), &snapshot)
                .and_then(|()| wal.swap_compact_file());
            let _ = done.send(result);
        }
        Command::Stats { reply } => {
            let _ = reply.send(JournalStats {
                appends: wal.appends_since_compact(),
                bytes: wal.bytes_since_compact(),
            });
        }
        Command::Append { event, done } => commit(wal, vec![(event, done)]),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::*;
    use std::sync::Arc;
    use ulid::Ulid;

    fn tmp_path(name: &str) -> std::path::PathBuf {
        let dir = std::env::temp_dir().join("courtbook_test_journal");
        std::fs::create_dir_all(&dir).unwrap();
        let path = dir.join(name);
        let _ = std::fs::remove_file(&path);
        path
    }

    #[tokio::test]
    async fn concurrent_appends_are_all_durable() {
        let path = tmp_path("concurrent.wal");
        let journal = Arc::new(Journal::open(&path).unwrap());
        let club = Ulid::new();

        let handles: Vec<_> = (0..32)
            .map(|_| {
                let journal = journal.clone();
                tokio::spawn(async move { journal.append(Event::ScheduleRemoved { club_id: club }).await })
            })
            .collect();
        for h in handles {
            h.await.unwrap().unwrap();
        }

        assert_eq!(journal.stats().await.appends, 32);
        assert_eq!(Wal::replay(&path).unwrap().len(), 32);
    }

    #[tokio::test]
    async fn compact_resets_stats() {
        let path = tmp_path("compact.wal");
        let journal = Journal::open(&path).unwrap();
        let club = Ulid::new();
        for _ in 0..5 {
            journal.append(Event::ScheduleRemoved { club_id: club }).await.unwrap();
        }
        let snapshot = vec![Event::ScheduleSet {
            schedule: Schedule::default_for(club),
        }];
        journal.compact(snapshot.clone()).await.unwrap();
        assert_eq!(journal.stats().await, JournalStats::default());
        assert_eq!(Wal::replay(&path).unwrap(), snapshot);
    }
}
