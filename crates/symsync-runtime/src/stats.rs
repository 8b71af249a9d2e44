//! Node statistics

use std::collections::HashSet;
use std::path::Path;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::SystemTime;

use parking_lot::Mutex;
use tokio::io::AsyncWriteExt;

macro_rules! counters {
    ($( $(#[$doc:meta])* $name:ident ),+ $(,)?) => {
        /// Node-wide counters, cleared on read by the statistics log
        #[derive(Debug, Default)]
        pub struct SyncStats {
            $( $(#[$doc])* pub $name: AtomicU64, )+
            seen_errors: Mutex<HashSet<(&'static str, &'static str)>>,
        }

        impl SyncStats {
            pub fn statistic_title() -> String {
                let names: &[&str] = &[$( stringify!($name) ),+];
                format!("time,{}", names.join(","))
            }

            /// One CSV line; `clear` resets the counters
            pub fn statistic_line(&self, clear: bool) -> String {
                let values: Vec<String> = vec![$( Self::read(&self.$name, clear).to_string() ),+];
                format!("{},{}", humantime::format_rfc3339_millis(SystemTime::now()), values.join(","))
            }
        }
    };
}

counters! {
    msgs_in,
    msgs_out,
    /// General bucket updates
    general_in,
    general_out,
    physics_in,
    physics_out,
    /// Updates of custom buckets
    other_bucket_in,
    other_bucket_out,
    special_in,
    special_out,
    events_in,
    events_out,
    decode_errors,
    /// Malformed messages that produced a warning
    decode_errors_logged,
    /// Local writes overwritten with a newer stored value
    stale_corrections,
    /// Remote batches dropped for lack of a physics actor
    physics_skips,
    unknown_objects,
    event_seq_gaps,
    events_dropped,
}

impl SyncStats {
    pub fn new() -> Self {
        Self::default()
    }

    fn read(counter: &AtomicU64, clear: bool) -> u64 {
        if clear {
            counter.swap(0, Ordering::Relaxed)
        } else {
            counter.load(Ordering::Relaxed)
        }
    }

    #[inline]
    pub fn incr(counter: &AtomicU64) {
        counter.fetch_add(1, Ordering::Relaxed);
    }

    #[inline]
    pub fn add(counter: &AtomicU64, n: u64) {
        counter.fetch_add(n, Ordering::Relaxed);
    }

    #[inline]
    pub fn get(counter: &AtomicU64) -> u64 {
        counter.load(Ordering::Relaxed)
    }

    /// True the first time an error kind is seen for a message type
    pub fn first_occurrence(&self, msg_type: &'static str, kind: &'static str) -> bool {
        self.seen_errors.lock().insert((msg_type, kind))
    }
}

/// Append one line to the statistics file, writing the title first if the
/// file is new
pub async fn append_stats_line(path: &Path, title: &str, line: &str) -> std::io::Result<()> {
    let fresh = tokio::fs::metadata(path).await.is_err();
    let mut file = tokio::fs::OpenOptions::new()
        .create(true)
        .append(true)
        .open(path)
        .await?;
    let mut text = String::with_capacity(title.len() + line.len() + 2);
    if fresh {
        text.push_str(title);
        text.push('\n');
    }
    text.push_str(line);
    text.push('\n');
    file.write_all(text.as_bytes()).await?;
    file.flush().await
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_statistic_line_clear() {
        let stats = SyncStats::new();
        SyncStats::incr(&stats.msgs_in);
        SyncStats::add(&stats.physics_out, 3);

        let title = SyncStats::statistic_title();
        let line = stats.statistic_line(true);
        assert_eq!(title.split(',').count(), line.split(',').count());
        assert!(title.starts_with("time,msgs_in,msgs_out,general_in"));

        let fields: Vec<&str> = line.split(',').collect();
        assert_eq!(fields[1], "1");
        assert_eq!(fields[6], "3");
        assert_eq!(SyncStats::get(&stats.msgs_in), 0);
    }

    #[test]
    fn test_first_occurrence() {
        let stats = SyncStats::new();
        assert!(stats.first_occurrence("UpdatedObject", "MissingField"));
        assert!(!stats.first_occurrence("UpdatedObject", "MissingField"));
        assert!(stats.first_occurrence("UpdatedObject", "InvalidPayload"));
        assert!(stats.first_occurrence("NewObject", "MissingField"));
    }

    #[tokio::test]
    async fn test_append_writes_title_once() {
        let dir = std::env::temp_dir().join(format!("symsync-stats-{}", uuid::Uuid::new_v4()));
        tokio::fs::create_dir_all(&dir).await.unwrap();
        let path = dir.join("stats-a.log");

        append_stats_line(&path, "t", "1").await.unwrap();
        append_stats_line(&path, "t", "2").await.unwrap();

        let text = tokio::fs::read_to_string(&path).await.unwrap();
        assert_eq!(text, "t\n1\n2\n");
        let _ = tokio::fs::remove_dir_all(&dir).await;
    }
}
